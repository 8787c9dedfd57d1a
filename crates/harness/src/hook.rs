//! Hooks run before each suite, typically to reseed the server under test

use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ReseedConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::http::{HttpRequest, Method};
use crate::session::Session;

/// Invoked by the registry before a suite's first test.
///
/// An error marks every test of that suite as a setup failure; the run
/// continues with the next suite.
#[async_trait]
pub trait SuiteHook: Send + Sync {
    async fn before_suite(&self, session: &Session, suite: &str) -> HarnessResult<()>;
}

pub fn from_config(config: &ReseedConfig) -> Arc<dyn SuiteHook> {
    match config {
        ReseedConfig::Http { url } => Arc::new(HttpReseedHook::new(url.clone())),
        ReseedConfig::Command { command } => Arc::new(CommandReseedHook::new(command.clone())),
    }
}

/// POSTs to a reset endpoint through the session's transport
pub struct HttpReseedHook {
    url: String,
}

impl HttpReseedHook {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl SuiteHook for HttpReseedHook {
    async fn before_suite(&self, session: &Session, suite: &str) -> HarnessResult<()> {
        debug!("Reseeding via POST {} before '{}'", self.url, suite);

        let response = session
            .transport()
            .send(HttpRequest {
                method: Method::Post,
                url: session.resolve(&self.url),
                headers: Vec::new(),
                body: None,
            })
            .await
            .map_err(|e| HarnessError::Hook(format!("reseed request failed: {}", e)))?;

        if !response.is_success() {
            return Err(HarnessError::Hook(format!(
                "reseed endpoint {} returned status {}",
                self.url, response.status
            )));
        }

        info!("Reseeded server before '{}'", suite);
        Ok(())
    }
}

/// Runs a shell command and requires it to exit successfully
pub struct CommandReseedHook {
    command: String,
}

impl CommandReseedHook {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl SuiteHook for CommandReseedHook {
    async fn before_suite(&self, _session: &Session, suite: &str) -> HarnessResult<()> {
        debug!("Reseeding via `{}` before '{}'", self.command, suite);

        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("ODATA_COMPLIANCE_SUITE", suite)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HarnessError::Hook(format!(
                "reseed command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        info!("Reseeded server before '{}'", suite);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::http::MockTransport;

    fn session(transport: MockTransport) -> (Session, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        let session = Session::with_transport(&HarnessConfig::default(), transport.clone()).unwrap();
        (session, transport)
    }

    #[tokio::test]
    async fn test_http_reseed_posts_to_resolved_url() {
        let (session, transport) = session(MockTransport::status(204));
        let hook = HttpReseedHook::new("/reset");

        hook.before_suite(&session, "Entity CRUD").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].url, "http://localhost:9000/odata/reset");
    }

    #[tokio::test]
    async fn test_http_reseed_rejects_error_status() {
        let (session, _) = session(MockTransport::status(500));
        let err = HttpReseedHook::new("/reset")
            .before_suite(&session, "Entity CRUD")
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Hook(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_reseed_exit_status() {
        let (session, _) = session(MockTransport::status(200));

        CommandReseedHook::new("test -n \"$ODATA_COMPLIANCE_SUITE\"")
            .before_suite(&session, "Query Options")
            .await
            .unwrap();

        let err = CommandReseedHook::new("exit 3")
            .before_suite(&session, "Query Options")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("reseed command exited"));
    }
}
