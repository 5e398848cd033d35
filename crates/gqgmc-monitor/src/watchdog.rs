//! Liveness watchdog
//!
//! The polling loop pokes the watchdog once per tick. If a full interval
//! passes without a poke the loop is considered hung and the process exits,
//! leaving restart to the service manager. Under systemd (`NOTIFY_SOCKET`
//! set) every poke is also forwarded as `WATCHDOG=1`.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

pub struct Watchdog {
    interval: Duration,
    last_poke: Mutex<Instant>,
    notify_socket: Option<String>,
}

impl Watchdog {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_poke: Mutex::new(Instant::now()),
            notify_socket: std::env::var("NOTIFY_SOCKET").ok(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record that the polling loop is alive
    pub fn poke(&self) {
        if let Ok(mut last) = self.last_poke.lock() {
            *last = Instant::now();
        }
        if let Some(path) = &self.notify_socket {
            notify_service_manager(path);
        }
    }

    fn since_last_poke(&self) -> Duration {
        self.last_poke
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or_default()
    }

    /// Resolves once an interval has passed without a poke
    pub async fn expired(&self) {
        loop {
            tokio::time::sleep(self.interval).await;
            if self.since_last_poke() > self.interval {
                return;
            }
        }
    }
}

#[cfg(unix)]
fn notify_service_manager(path: &str) {
    use std::os::unix::net::UnixDatagram;

    // Abstract namespace sockets ('@...') are not reachable through a path
    if !path.starts_with('/') {
        return;
    }
    let sent = UnixDatagram::unbound().and_then(|sock| sock.send_to(b"WATCHDOG=1", path));
    if let Err(e) = sent {
        debug!("watchdog notify failed: {}", e);
    }
}

#[cfg(not(unix))]
fn notify_service_manager(_path: &str) {
    debug!("service manager notification is only supported on unix");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn watchdog(secs: u64) -> Watchdog {
        Watchdog {
            interval: Duration::from_secs(secs),
            last_poke: Mutex::new(Instant::now()),
            notify_socket: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_without_pokes() {
        let wd = watchdog(10);
        let result = tokio::time::timeout(Duration::from_secs(25), wd.expired()).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pokes_keep_it_alive() {
        let wd = Arc::new(watchdog(10));
        let poker = {
            let wd = Arc::clone(&wd);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_secs(4)).await;
                    wd.poke();
                }
            })
        };

        let result = tokio::time::timeout(Duration::from_secs(120), wd.expired()).await;
        assert!(result.is_err());
        poker.abort();
    }
}
