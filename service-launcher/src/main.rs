use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use service_launcher::args::Cli;
use service_launcher::{LauncherConfig, LauncherError, Orchestrator};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    info!(
        "=== Service Launcher: {} service(s), ports {:?} ===",
        config.services.len(),
        config.effective_ports()
    );

    match Orchestrator::new(config).run().await {
        Ok(report) => ExitCode::from(report.exit_code()),
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn load_config(cli: &Cli) -> Result<LauncherConfig, LauncherError> {
    let mut config = LauncherConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}
