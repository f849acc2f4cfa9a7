//! Keep-alive pinger

use crate::error::{PulseError, Result};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Periodically GETs a keep-alive URL; failures are logged and ignored
#[derive(Debug, Clone)]
pub struct Heartbeat {
    client: Client,
    url: String,
    interval: Duration,
}

impl Heartbeat {
    pub fn new(url: impl Into<String>, interval: Duration, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PulseError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            interval,
        })
    }

    /// One ping; returns whether the URL answered with a success status
    pub async fn ping(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url = %self.url, "Heartbeat ok");
                true
            }
            Ok(response) => {
                warn!(url = %self.url, status = %response.status(), "Heartbeat rejected");
                false
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Heartbeat failed");
                false
            }
        }
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(url = %self.url, every_secs = self.interval.as_secs(), "Heartbeat started");
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.ping().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Heartbeat stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ping_unreachable_is_not_fatal() {
        let heartbeat = Heartbeat::new(
            "http://127.0.0.1:9/health",
            Duration::from_secs(60),
            Duration::from_millis(200),
        )
        .unwrap();
        assert!(!heartbeat.ping().await);
    }

    #[tokio::test]
    async fn test_spawn_stops_on_shutdown() {
        let heartbeat = Heartbeat::new(
            "http://127.0.0.1:9/health",
            Duration::from_secs(60),
            Duration::from_millis(200),
        )
        .unwrap();
        let (tx, rx) = watch::channel(false);
        let handle = heartbeat.spawn(rx);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
