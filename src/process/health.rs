use std::time::Duration;
use tracing::debug;

/// Liveness probe against the worker's `/health` endpoint
///
/// Distinct from OS-level process liveness: a worker can be running but not
/// serving. The probe never fails with an error; anything other than a 2xx
/// response within the timeout counts as unhealthy.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HealthProbe {
    /// Probe `http://127.0.0.1:{port}/health`
    ///
    /// The worker binds 0.0.0.0 but is probed over loopback.
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("http://127.0.0.1:{}/health", port),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns true if the worker answered 2xx within the timeout
    pub async fn probe(&self) -> bool {
        match self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(status = %response.status(), url = %self.url, "health probe returned non-success");
                false
            }
            Err(e) => {
                debug!(error = %e, url = %self.url, "health probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP endpoint that answers 200 or 503 depending on the flag
    async fn health_stub(healthy: Arc<AtomicBool>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let healthy = healthy.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let response = if healthy.load(Ordering::SeqCst) {
                        "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok"
                    } else {
                        "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                    };
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        port
    }

    #[tokio::test]
    async fn test_probe_healthy() {
        let port = health_stub(Arc::new(AtomicBool::new(true))).await;
        let probe = HealthProbe::new(port, Duration::from_secs(5));
        assert!(probe.probe().await);
    }

    #[tokio::test]
    async fn test_probe_non_success_status_is_unhealthy() {
        let port = health_stub(Arc::new(AtomicBool::new(false))).await;
        let probe = HealthProbe::new(port, Duration::from_secs(5));
        assert!(!probe.probe().await);
    }

    #[tokio::test]
    async fn test_probe_connection_refused_is_unhealthy() {
        // Bind then drop to get a port nobody is listening on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = HealthProbe::new(port, Duration::from_secs(5));
        assert!(!probe.probe().await);
    }

    #[test]
    fn test_probe_url() {
        let probe = HealthProbe::new(8000, Duration::from_secs(5));
        assert_eq!(probe.url(), "http://127.0.0.1:8000/health");
    }
}
