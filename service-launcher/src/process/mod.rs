pub mod launcher;
pub mod models;
pub mod reaper;

pub use launcher::ProcessLauncher;
pub use reaper::{LsofLookup, OwnerLookup, PortReaper};
