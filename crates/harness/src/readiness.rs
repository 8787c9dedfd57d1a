//! Waiting for the server under test to come up

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{HarnessError, HarnessResult, TransportError};
use crate::http::{HttpRequest, Method};
use crate::session::Session;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Poll the service root until the server answers with any HTTP response.
///
/// Error statuses count as ready: the server is reachable, and judging the
/// status is the suites' job.
pub async fn wait_until_ready(session: &Session, timeout: Duration) -> HarnessResult<()> {
    let url = session.resolve("");
    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        let request = HttpRequest {
            method: Method::Get,
            url: url.clone(),
            headers: session.default_headers().to_vec(),
            body: None,
        };

        match session.transport().send(request).await {
            Ok(resp) => {
                info!("Server at {} is reachable (status {})", url, resp.status);
                return Ok(());
            }
            Err(TransportError::InvalidUrl(u)) => {
                return Err(HarnessError::InvalidConfig(format!("invalid base url '{}'", u)));
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for server at {}...", url);
                }
                if !matches!(e, TransportError::Connect { .. }) {
                    warn!("Readiness check error: {}", e);
                }
            }
        }

        if start.elapsed() + POLL_INTERVAL > timeout {
            return Err(HarnessError::ServerNotReady { url, attempts });
        }
        sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::config::HarnessConfig;
    use crate::http::{HttpResponse, MockTransport};

    #[tokio::test]
    async fn test_ready_after_connection_refusals() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let transport = MockTransport::new(move |req| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TransportError::Connect {
                    url: req.url.clone(),
                    reason: "connection refused".to_string(),
                })
            } else {
                Ok(HttpResponse::new(503))
            }
        });
        let session = Session::with_transport(&HarnessConfig::default(), Arc::new(transport)).unwrap();

        wait_until_ready(&session, Duration::from_secs(5)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_timeout() {
        let transport = MockTransport::new(|req| {
            Err(TransportError::Connect {
                url: req.url.clone(),
                reason: "connection refused".to_string(),
            })
        });
        let session = Session::with_transport(&HarnessConfig::default(), Arc::new(transport)).unwrap();

        let err = wait_until_ready(&session, Duration::from_millis(600)).await.unwrap_err();
        match err {
            HarnessError::ServerNotReady { attempts, .. } => assert!(attempts >= 2),
            other => panic!("unexpected error: {}", other),
        }
    }
}
