//! Shared run configuration handed to every suite

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::{FilterConfig, HarnessConfig};
use crate::error::HarnessResult;
use crate::hook::{self, SuiteHook};
use crate::http::{ReqwestTransport, Transport};

const DEFAULT_CANCEL_REASON: &str = "run cancelled";

/// Cheaply cloneable handle over everything a run shares: the transport,
/// the base URL and default headers, deadlines, selection, and the
/// cancellation token.
#[derive(Clone)]
pub struct Session {
    base_url: Arc<str>,
    default_headers: Arc<Vec<(String, String)>>,
    transport: Arc<dyn Transport>,
    hook: Option<Arc<dyn SuiteHook>>,
    filter: Arc<TestFilter>,
    run_timeout: Option<Duration>,
    test_timeout: Option<Duration>,
    suite_concurrency: usize,
    cancel: CancellationToken,
    cancel_reason: Arc<Mutex<Option<String>>>,
}

impl Session {
    /// Build a session talking to the configured server over reqwest
    pub fn new(config: &HarnessConfig) -> HarnessResult<Self> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        let mut session = Self::with_transport(config, Arc::new(transport))?;
        if let Some(reseed) = &config.reseed {
            session.hook = Some(hook::from_config(reseed));
        }
        Ok(session)
    }

    /// Build a session over an arbitrary transport; no reseed hook is installed
    pub fn with_transport(config: &HarnessConfig, transport: Arc<dyn Transport>) -> HarnessResult<Self> {
        config.validate()?;

        Ok(Self {
            base_url: Arc::from(config.base_url.trim().trim_end_matches('/')),
            default_headers: Arc::new(
                config
                    .default_headers
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            transport,
            hook: None,
            filter: Arc::new(TestFilter::from_config(&config.filter)?),
            run_timeout: config.run_timeout(),
            test_timeout: config.test_timeout(),
            suite_concurrency: config.suite_concurrency,
            cancel: CancellationToken::new(),
            cancel_reason: Arc::new(Mutex::new(None)),
        })
    }

    pub fn with_hook(mut self, hook: Arc<dyn SuiteHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn hook(&self) -> Option<&Arc<dyn SuiteHook>> {
        self.hook.as_ref()
    }

    pub fn filter(&self) -> &TestFilter {
        &self.filter
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout
    }

    pub fn test_timeout(&self) -> Option<Duration> {
        self.test_timeout
    }

    pub fn suite_concurrency(&self) -> usize {
        self.suite_concurrency
    }

    /// Resolve a test path against the base URL.
    ///
    /// Absolute URLs (next links, delta links) are used unchanged.
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Stop the run: the in-flight test and everything not yet started are
    /// reported as skipped with `reason`. The first reason wins.
    pub fn cancel(&self, reason: impl Into<String>) {
        {
            let mut current = self.cancel_reason.lock();
            if current.is_none() {
                let reason = reason.into();
                warn!("Cancelling run: {}", reason);
                *current = Some(reason);
            }
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel_reason(&self) -> String {
        self.cancel_reason
            .lock()
            .clone()
            .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string())
    }
}

/// Compiled suite/test selection
#[derive(Debug, Default)]
pub struct TestFilter {
    suite: Option<Regex>,
    test: Option<Regex>,
}

impl TestFilter {
    pub fn from_config(config: &FilterConfig) -> HarnessResult<Self> {
        Ok(Self {
            suite: config.suite.as_deref().map(Regex::new).transpose()?,
            test: config.test.as_deref().map(Regex::new).transpose()?,
        })
    }

    pub fn selects_suite(&self, suite: &str) -> bool {
        self.suite.as_ref().map_or(true, |re| re.is_match(suite))
    }

    pub fn selects(&self, suite: &str, test: &str) -> bool {
        self.selects_suite(suite) && self.test.as_ref().map_or(true, |re| re.is_match(test))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockTransport;

    fn session(base_url: &str) -> Session {
        let config = HarnessConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        };
        Session::with_transport(&config, Arc::new(MockTransport::status(200))).unwrap()
    }

    #[test]
    fn test_resolve_joins_paths() {
        let s = session("http://localhost:9000/odata/");
        assert_eq!(s.resolve("/Products"), "http://localhost:9000/odata/Products");
        assert_eq!(s.resolve("$metadata"), "http://localhost:9000/odata/$metadata");
        assert_eq!(s.resolve(""), "http://localhost:9000/odata/");
        assert_eq!(
            s.resolve("https://other.example.com/Products?$skiptoken=5"),
            "https://other.example.com/Products?$skiptoken=5"
        );
    }

    #[test]
    fn test_first_cancel_reason_wins() {
        let s = session("http://localhost:9000");
        assert!(!s.is_cancelled());
        assert_eq!(s.cancel_reason(), DEFAULT_CANCEL_REASON);

        s.cancel("run timeout of 5s exceeded");
        s.clone().cancel("interrupted");
        assert!(s.is_cancelled());
        assert_eq!(s.cancel_reason(), "run timeout of 5s exceeded");
    }

    #[test]
    fn test_filter_selection() {
        let filter = TestFilter::from_config(&FilterConfig {
            suite: Some("^Query".to_string()),
            test: Some("filter".to_string()),
        })
        .unwrap();

        assert!(filter.selects("Query Options", "filter_gt"));
        assert!(!filter.selects("Query Options", "top"));
        assert!(!filter.selects("Service Document", "filter_gt"));
        assert!(TestFilter::default().selects("anything", "at all"));
    }
}
