use log::debug;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};

use crate::process::models::{Port, PortProbeResult};

/// Checks ports for a listener by attempting a short-lived TCP connection.
///
/// Both IPv4 and IPv6 loopback are tried since dev servers differ in which
/// one `localhost` binds to. Every failure, including timeouts, reads as
/// "inactive"; probing never errors.
#[derive(Debug, Clone)]
pub struct ReadinessProber {
    connect_timeout: Duration,
}

impl ReadinessProber {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub async fn probe(&self, port: Port) -> PortProbeResult {
        let targets = [
            SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            SocketAddr::from((Ipv6Addr::LOCALHOST, port)),
        ];

        for addr in targets {
            match time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(_stream)) => return PortProbeResult::new(port, true),
                Ok(Err(e)) => debug!("Prober: {} refused: {}", addr, e),
                Err(_) => debug!("Prober: {} timed out", addr),
            }
        }
        PortProbeResult::new(port, false)
    }

    /// One probe per port, in order.
    pub async fn probe_all(&self, ports: &[Port]) -> Vec<PortProbeResult> {
        let mut results = Vec::with_capacity(ports.len());
        for port in ports {
            results.push(self.probe(*port).await);
        }
        results
    }

    /// Re-probes inactive ports every `interval` until all are up or `budget` runs out.
    ///
    /// A budget too large to add to the clock means no deadline.
    pub async fn poll_until_active(
        &self,
        ports: &[Port],
        interval: Duration,
        budget: Duration,
    ) -> Vec<PortProbeResult> {
        let deadline = Instant::now().checked_add(budget);
        let mut results = self.probe_all(ports).await;

        while results.iter().any(|r| !r.is_active()) {
            let now = Instant::now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => break,
                Some(deadline) => interval.min(deadline - now),
                None => interval,
            };
            time::sleep(pause).await;

            for result in results.iter_mut().filter(|r| !r.is_active()) {
                *result = self.probe(result.port()).await;
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn prober() -> ReadinessProber {
        ReadinessProber::new(Duration::from_millis(200))
    }

    fn free_port() -> Port {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_listener_reads_active() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = prober().probe(port).await;
        assert_eq!(result.port(), port);
        assert!(result.is_active());
    }

    #[tokio::test]
    async fn test_nothing_listening_reads_inactive() {
        let port = free_port();
        assert!(!prober().probe(port).await.is_active());
    }

    #[tokio::test]
    async fn test_port_zero_never_raises() {
        assert!(!prober().probe(0).await.is_active());
    }

    #[tokio::test]
    async fn test_poll_picks_up_late_listener() {
        let port = free_port();

        let late = tokio::spawn(async move {
            time::sleep(Duration::from_millis(300)).await;
            let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();
            time::sleep(Duration::from_secs(3)).await;
            drop(listener);
        });

        let results = prober()
            .poll_until_active(&[port], Duration::from_millis(50), Duration::from_secs(3))
            .await;
        assert!(results[0].is_active());

        late.abort();
    }

    #[tokio::test]
    async fn test_poll_with_huge_budget_does_not_overflow() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let results = prober()
            .poll_until_active(&[port], Duration::from_millis(50), Duration::MAX)
            .await;
        assert!(results[0].is_active());

        let results = prober()
            .poll_until_active(
                &[port],
                Duration::from_millis(50),
                Duration::from_secs_f64(1e19),
            )
            .await;
        assert!(results[0].is_active());
    }

    #[tokio::test]
    async fn test_poll_gives_up_after_budget() {
        let port = free_port();
        let started = Instant::now();

        let results = prober()
            .poll_until_active(&[port], Duration::from_millis(50), Duration::from_millis(300))
            .await;

        assert!(!results[0].is_active());
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
