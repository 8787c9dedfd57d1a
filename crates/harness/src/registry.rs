//! Suite registry and run driver

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use chrono::Utc;
use futures::{FutureExt, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{HarnessError, HarnessResult};
use crate::outcome::{FailureKind, Outcome, RunResult, SuiteResult};
use crate::session::Session;
use crate::suite::{panic_message, TestSuite, DESELECTED_REASON};

/// All suites of one run, assembled at startup and run once.
///
/// Suites must not depend on each other: each gets its own state and,
/// when a hook is configured, a reseeded server.
#[derive(Debug, Default)]
pub struct SuiteRegistry {
    suites: Vec<TestSuite>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, suite: TestSuite) -> HarnessResult<&mut Self> {
        if self.suites.iter().any(|s| s.title() == suite.title()) {
            return Err(HarnessError::DuplicateSuite(suite.title().to_string()));
        }
        self.suites.push(suite);
        Ok(self)
    }

    pub fn suites(&self) -> &[TestSuite] {
        &self.suites
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    pub fn test_count(&self) -> usize {
        self.suites.iter().map(TestSuite::len).sum()
    }

    /// Run every registered suite and collect one result per suite.
    ///
    /// Up to `suite_concurrency` suites run at once; results keep
    /// registration order. The run-level timeout cancels the session, which
    /// marks the in-flight test and everything after it as skipped.
    pub async fn run_all(&self, session: &Session) -> RunResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            "Run {}: {} suite(s), {} test(s) against {}",
            run_id,
            self.suites.len(),
            self.test_count(),
            session.base_url()
        );

        let watchdog = session.run_timeout().map(|timeout| {
            let session = session.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                session.cancel(format!("run timeout of {}s exceeded", timeout.as_secs()));
            })
        });

        let suites: Vec<SuiteResult> = futures::stream::iter(self.suites.iter())
            .map(|suite| run_suite(suite, session))
            .buffered(session.suite_concurrency().max(1))
            .collect()
            .await;

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        let result = RunResult {
            run_id,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            suites,
        };

        info!("Run {}: {} ({} ms)", run_id, result.summary(), result.duration_ms);
        result
    }
}

async fn run_suite(suite: &TestSuite, session: &Session) -> SuiteResult {
    if session.is_cancelled() {
        return suite.uniform_result(Outcome::skipped(session.cancel_reason()));
    }
    if !session.filter().selects_suite(suite.title()) {
        return suite.uniform_result(Outcome::skipped(DESELECTED_REASON));
    }

    if let Some(hook) = session.hook() {
        let cancel = session.cancellation_token();
        let setup = AssertUnwindSafe(hook.before_suite(session, suite.title())).catch_unwind();
        let failure = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return suite.uniform_result(Outcome::skipped(session.cancel_reason()));
            }
            setup = setup => match setup {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(format!("suite setup failed: {}", e)),
                Err(payload) => Some(format!(
                    "suite setup panicked: {}",
                    panic_message(payload.as_ref())
                )),
            },
        };
        if let Some(reason) = failure {
            warn!("Suite '{}': {}", suite.title(), reason);
            return suite.uniform_result(Outcome::failed(FailureKind::Setup, reason));
        }
    }

    match AssertUnwindSafe(suite.run(session)).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            error!("Suite '{}' aborted unexpectedly", suite.title());
            suite.uniform_result(Outcome::failed(
                FailureKind::Panic,
                "suite aborted unexpectedly",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::config::HarnessConfig;
    use crate::error::TestError;
    use crate::hook::SuiteHook;
    use crate::http::MockTransport;
    use crate::outcome::Status;

    fn session(config: HarnessConfig) -> Session {
        Session::with_transport(&config, Arc::new(MockTransport::status(200))).unwrap()
    }

    fn passing_suite(title: &str, tests: usize) -> TestSuite {
        let mut suite = TestSuite::new(title, "", "");
        for i in 0..tests {
            suite.add_test(&format!("t{}", i), "", |_| async { Ok(()) }).unwrap();
        }
        suite
    }

    #[test]
    fn test_duplicate_suite_rejected() {
        let mut registry = SuiteRegistry::new();
        registry.register(passing_suite("Metadata", 1)).unwrap();
        let err = registry.register(passing_suite("Metadata", 2)).unwrap_err();
        assert!(matches!(err, HarnessError::DuplicateSuite(_)));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_faulty_suite_does_not_stop_others() {
        let mut faulty = TestSuite::new("Faulty", "", "");
        faulty
            .add_test("fails", "", |_| async { Err(TestError::assertion("nope")) })
            .unwrap()
            .add_test("panics", "", |_| async {
                let empty: Option<u8> = None;
                let _value = empty.expect("value present");
                Ok(())
            })
            .unwrap();

        let mut registry = SuiteRegistry::new();
        registry
            .register(faulty)
            .unwrap()
            .register(passing_suite("Healthy", 3))
            .unwrap();

        let run = registry.run_all(&session(HarnessConfig::default())).await;

        assert_eq!(run.tests().count(), registry.test_count());
        assert_eq!(run.suite("Faulty").unwrap().statuses(), vec![Status::Failed; 2]);
        assert_eq!(run.suite("Healthy").unwrap().statuses(), vec![Status::Passed; 3]);
        assert!(!run.is_success());
    }

    #[tokio::test]
    async fn test_state_is_not_shared_across_suites() {
        let mut writer = TestSuite::new("Writer", "", "");
        writer
            .add_test("write", "", |ctx| async move { ctx.state().set("token", "abc") })
            .unwrap();
        let mut reader = TestSuite::new("Reader", "", "");
        reader
            .add_test("read", "", |ctx| async move {
                let _: String = ctx.state().require("token")?;
                Ok(())
            })
            .unwrap();

        let mut registry = SuiteRegistry::new();
        registry.register(writer).unwrap().register(reader).unwrap();

        let run = registry.run_all(&session(HarnessConfig::default())).await;
        assert_eq!(run.outcome("Writer", "write"), Some(&Outcome::Passed));
        assert_eq!(run.outcome("Reader", "read").map(Outcome::status), Some(Status::Skipped));
    }

    struct FailFirstHook {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SuiteHook for FailFirstHook {
        async fn before_suite(&self, _session: &Session, _suite: &str) -> HarnessResult<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(HarnessError::Hook("reseed endpoint unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_hook_failure_fails_only_that_suite() {
        let hook = Arc::new(FailFirstHook {
            calls: AtomicUsize::new(0),
        });
        let session = session(HarnessConfig::default()).with_hook(hook.clone());

        let mut registry = SuiteRegistry::new();
        registry
            .register(passing_suite("First", 2))
            .unwrap()
            .register(passing_suite("Second", 2))
            .unwrap();

        let run = registry.run_all(&session).await;

        assert_eq!(hook.calls.load(Ordering::SeqCst), 2);
        let first = run.suite("First").unwrap();
        assert!(first.tests.iter().all(|t| matches!(
            t.outcome,
            Outcome::Failed { kind: FailureKind::Setup, .. }
        )));
        assert_eq!(run.suite("Second").unwrap().statuses(), vec![Status::Passed; 2]);
    }

    struct PanicFirstHook {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SuiteHook for PanicFirstHook {
        async fn before_suite(&self, _session: &Session, _suite: &str) -> HarnessResult<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("reseed hook blew up");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_panicking_hook_fails_only_that_suite() {
        let hook = Arc::new(PanicFirstHook {
            calls: AtomicUsize::new(0),
        });
        let session = session(HarnessConfig::default()).with_hook(hook.clone());

        let mut registry = SuiteRegistry::new();
        registry
            .register(passing_suite("First", 2))
            .unwrap()
            .register(passing_suite("Second", 2))
            .unwrap();

        let run = registry.run_all(&session).await;

        assert_eq!(hook.calls.load(Ordering::SeqCst), 2);
        let first = run.suite("First").unwrap();
        assert!(first.tests.iter().all(|t| matches!(
            &t.outcome,
            Outcome::Failed { kind: FailureKind::Setup, reason } if reason.contains("reseed hook blew up")
        )));
        assert_eq!(run.suite("Second").unwrap().statuses(), vec![Status::Passed; 2]);
    }

    struct HangingHook;

    #[async_trait]
    impl SuiteHook for HangingHook {
        async fn before_suite(&self, _session: &Session, _suite: &str) -> HarnessResult<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hanging_hook_yields_to_run_timeout() {
        let config = HarnessConfig {
            run_timeout_secs: Some(1),
            ..Default::default()
        };
        let session = session(config).with_hook(Arc::new(HangingHook));

        let mut registry = SuiteRegistry::new();
        registry
            .register(passing_suite("First", 2))
            .unwrap()
            .register(passing_suite("Second", 1))
            .unwrap();

        let run = tokio::time::timeout(Duration::from_secs(5), registry.run_all(&session))
            .await
            .expect("run_all should stop at the run timeout");

        assert_eq!(run.summary().skipped, 3);
        assert!(run
            .outcome("First", "t0")
            .and_then(Outcome::reason)
            .unwrap()
            .contains("run timeout"));
    }

    #[tokio::test]
    async fn test_run_timeout_skips_unfinished_work() {
        let config = HarnessConfig {
            run_timeout_secs: Some(1),
            ..Default::default()
        };

        let mut slow = TestSuite::new("Slow", "", "");
        slow.add_test("quick", "", |_| async { Ok(()) })
            .unwrap()
            .add_test("hangs", "", |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .unwrap()
            .add_test("after", "", |_| async { Ok(()) })
            .unwrap();

        let mut registry = SuiteRegistry::new();
        registry
            .register(slow)
            .unwrap()
            .register(passing_suite("Later", 2))
            .unwrap();

        let run = registry.run_all(&session(config)).await;

        assert_eq!(
            run.suite("Slow").unwrap().statuses(),
            vec![Status::Passed, Status::Skipped, Status::Skipped]
        );
        assert_eq!(run.suite("Later").unwrap().statuses(), vec![Status::Skipped; 2]);
        assert!(run
            .outcome("Later", "t0")
            .and_then(Outcome::reason)
            .unwrap()
            .contains("run timeout"));
        assert!(run.is_success());
    }

    #[tokio::test]
    async fn test_concurrent_suites_keep_registration_order() {
        let config = HarnessConfig {
            suite_concurrency: 3,
            ..Default::default()
        };

        let mut registry = SuiteRegistry::new();
        for title in ["A", "B", "C", "D"] {
            registry.register(passing_suite(title, 2)).unwrap();
        }

        let run = registry.run_all(&session(config)).await;
        let titles: Vec<&str> = run.suites.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C", "D"]);
        assert_eq!(run.summary().passed, 8);
    }

    #[tokio::test]
    async fn test_deselected_suite_is_reported_as_skipped() {
        let mut config = HarnessConfig::default();
        config.filter.suite = Some("^Keep".to_string());

        let mut registry = SuiteRegistry::new();
        registry
            .register(passing_suite("Keep", 1))
            .unwrap()
            .register(passing_suite("Other", 2))
            .unwrap();

        let run = registry.run_all(&session(config)).await;
        assert_eq!(run.summary().total, 3);
        assert_eq!(run.suite("Other").unwrap().statuses(), vec![Status::Skipped; 2]);
    }
}
