//! Test suites: ordered, named groups of test cases
//!
//! A suite runs its tests one at a time in registration order. Each test
//! body is spawned on its own task so that a panic is contained and turned
//! into a failed outcome; the next test runs regardless.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::context::TestContext;
use crate::error::{HarnessError, HarnessResult, TestResult};
use crate::outcome::{FailureKind, Outcome, SuiteResult, TestCaseResult};
use crate::session::Session;
use crate::state::SuiteState;

pub const DESELECTED_REASON: &str = "deselected by filter";

type TestFn = Arc<dyn Fn(TestContext) -> BoxFuture<'static, TestResult> + Send + Sync>;

/// A named unit of work run against the server under test
pub struct TestCase {
    name: String,
    description: String,
    func: TestFn,
}

impl TestCase {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Tests covering one section of the protocol specification
#[derive(Debug)]
pub struct TestSuite {
    title: String,
    description: String,
    spec_url: String,
    tests: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        spec_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            spec_url: spec_url.into(),
            tests: Vec::new(),
        }
    }

    /// Append a test. Registration order is execution order.
    ///
    /// A name already used in this suite is a configuration error.
    pub fn add_test<F, Fut>(&mut self, name: &str, description: &str, f: F) -> HarnessResult<&mut Self>
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestResult> + Send + 'static,
    {
        if self.tests.iter().any(|t| t.name == name) {
            return Err(HarnessError::DuplicateTest {
                suite: self.title.clone(),
                test: name.to_string(),
            });
        }

        self.tests.push(TestCase {
            name: name.to_string(),
            description: description.to_string(),
            func: Arc::new(move |ctx| f(ctx).boxed()),
        });
        Ok(self)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn spec_url(&self) -> &str {
        &self.spec_url
    }

    pub fn tests(&self) -> &[TestCase] {
        &self.tests
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Run every test in order with a fresh context and a fresh suite state.
    ///
    /// Produces exactly one result per registered test.
    pub async fn run(&self, session: &Session) -> SuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let state = SuiteState::new();
        let mut results = Vec::with_capacity(self.tests.len());

        info!("Suite '{}': {} test(s)", self.title, self.tests.len());

        for test in &self.tests {
            let result = if session.is_cancelled() {
                self.result_for(test, Outcome::skipped(session.cancel_reason()), 0, Vec::new())
            } else if !session.filter().selects(&self.title, &test.name) {
                self.result_for(test, Outcome::skipped(DESELECTED_REASON), 0, Vec::new())
            } else {
                self.run_test(test, session, &state).await
            };

            log_result(&result);
            results.push(result);
        }

        let result = SuiteResult {
            title: self.title.clone(),
            description: self.description.clone(),
            spec_url: self.spec_url.clone(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            tests: results,
        };
        info!("Suite '{}': {}", self.title, result.summary());
        result
    }

    /// A result giving every test the same outcome without running anything
    pub(crate) fn uniform_result(&self, outcome: Outcome) -> SuiteResult {
        SuiteResult {
            title: self.title.clone(),
            description: self.description.clone(),
            spec_url: self.spec_url.clone(),
            started_at: Utc::now(),
            duration_ms: 0,
            tests: self
                .tests
                .iter()
                .map(|t| self.result_for(t, outcome.clone(), 0, Vec::new()))
                .collect(),
        }
    }

    async fn run_test(&self, test: &TestCase, session: &Session, state: &SuiteState) -> TestCaseResult {
        let logs = Arc::new(Mutex::new(Vec::new()));
        let ctx = TestContext::new(session.clone(), &self.title, &test.name, state.clone(), logs.clone());
        let start = Instant::now();

        debug!("Running {}::{}", self.title, test.name);

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| (test.func)(ctx))) {
            Ok(future) => execute(future, session).await,
            Err(payload) => panicked(payload),
        };

        let logs = logs.lock().clone();
        self.result_for(test, outcome, start.elapsed().as_millis() as u64, logs)
    }

    fn result_for(
        &self,
        test: &TestCase,
        outcome: Outcome,
        duration_ms: u64,
        logs: Vec<String>,
    ) -> TestCaseResult {
        TestCaseResult {
            suite: self.title.clone(),
            name: test.name.clone(),
            description: test.description.clone(),
            outcome,
            duration_ms,
            logs,
        }
    }
}

/// Drive one test body to a single outcome: its own result, a contained
/// panic, the per-test deadline, or run cancellation.
async fn execute(future: BoxFuture<'static, TestResult>, session: &Session) -> Outcome {
    let mut handle = tokio::spawn(future);
    let cancel = session.cancellation_token();
    let test_timeout = session.test_timeout();

    let deadline = async move {
        match test_timeout {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;

        joined = &mut handle => match joined {
            Ok(result) => Outcome::from(result),
            Err(e) if e.is_panic() => panicked(e.into_panic()),
            Err(e) => Outcome::failed(FailureKind::Error, format!("test task ended unexpectedly: {}", e)),
        },
        _ = cancel.cancelled() => {
            handle.abort();
            Outcome::skipped(format!("{} (interrupted while running)", session.cancel_reason()))
        }
        _ = deadline => {
            handle.abort();
            let secs = test_timeout.map(|d| d.as_secs_f64()).unwrap_or_default();
            Outcome::failed(FailureKind::Timeout, format!("test exceeded its {:.1}s deadline", secs))
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> Outcome {
    let message = panic_message(payload.as_ref());
    error!("Test panicked: {}", message);
    Outcome::failed(FailureKind::Panic, format!("panicked: {}", message))
}

fn log_result(result: &TestCaseResult) {
    match &result.outcome {
        Outcome::Passed => info!("✓ {}::{} ({} ms)", result.suite, result.name, result.duration_ms),
        Outcome::Skipped { reason } => info!("○ {}::{} skipped: {}", result.suite, result.name, reason),
        Outcome::Failed { reason, .. } => warn!("✗ {}::{} - {}", result.suite, result.name, reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::assert::{assert_json_field, assert_status_code};
    use crate::config::HarnessConfig;
    use crate::error::TestError;
    use crate::http::{HttpResponse, MockTransport};
    use crate::outcome::Status;
    use serde_json::json;

    fn session_with(config: HarnessConfig) -> Session {
        let transport = MockTransport::new(|req| {
            if req.url.ends_with("/Products?$filter=Price gt 100") {
                Ok(HttpResponse::new(200).with_json(&json!({"value": [{"Price": 150}]})))
            } else {
                Ok(HttpResponse::new(200))
            }
        });
        Session::with_transport(&config, Arc::new(transport)).unwrap()
    }

    fn session() -> Session {
        session_with(HarnessConfig::default())
    }

    #[test]
    fn test_duplicate_name_rejected_at_registration() {
        let mut suite = TestSuite::new("Headers", "", "");
        suite.add_test("odata_version", "", |_| async { Ok(()) }).unwrap();

        let err = suite.add_test("odata_version", "again", |_| async { Ok(()) }).unwrap_err();
        assert!(matches!(err, HarnessError::DuplicateTest { .. }));
        assert_eq!(suite.len(), 1);
    }

    #[tokio::test]
    async fn test_pass_skip_pass_keeps_running() {
        let mut suite = TestSuite::new("Optional Features", "", "");
        suite
            .add_test("first", "", |_| async { Ok(()) })
            .unwrap()
            .add_test("second", "", |ctx| async move { Err(ctx.skip("optional")) })
            .unwrap()
            .add_test("third", "", |_| async { Ok(()) })
            .unwrap();

        let result = suite.run(&session()).await;

        assert_eq!(result.statuses(), vec![Status::Passed, Status::Skipped, Status::Passed]);
        assert_eq!(result.test("second").unwrap().outcome.reason(), Some("optional"));
    }

    #[tokio::test]
    async fn test_failures_and_panics_do_not_stop_the_suite() {
        let mut suite = TestSuite::new("Faults", "", "");
        suite
            .add_test("fails", "", |_| async { Err(TestError::assertion("expected status 200, got 404")) })
            .unwrap()
            .add_test("panics", "", |_| async {
                let ids: Vec<u32> = Vec::new();
                let _first = ids[3];
                Ok(())
            })
            .unwrap()
            .add_test("panics_before_future", "", |_| -> futures::future::Ready<TestResult> {
                panic!("bad setup")
            })
            .unwrap()
            .add_test("passes", "", |_| async { Ok(()) })
            .unwrap();

        let result = suite.run(&session()).await;

        assert_eq!(result.tests.len(), suite.len());
        assert_eq!(
            result.statuses(),
            vec![Status::Failed, Status::Failed, Status::Failed, Status::Passed]
        );
        assert!(matches!(
            result.test("panics").unwrap().outcome,
            Outcome::Failed { kind: FailureKind::Panic, .. }
        ));
        assert!(result
            .test("panics")
            .unwrap()
            .outcome
            .reason()
            .unwrap()
            .starts_with("panicked: index out of bounds"));
        assert_eq!(
            result.test("panics_before_future").unwrap().outcome.reason(),
            Some("panicked: bad setup")
        );
    }

    #[tokio::test]
    async fn test_state_flows_forward_in_order() {
        let mut suite = TestSuite::new("Entity CRUD", "", "");
        suite
            .add_test("create", "", |ctx| async move { ctx.state().set("created_id", 7) })
            .unwrap()
            .add_test("read", "", |ctx| async move {
                let id: i64 = ctx.state().require("created_id")?;
                ctx.log(format!("read entity {}", id));
                if id == 7 {
                    Ok(())
                } else {
                    Err(TestError::assertion(format!("expected id 7, got {}", id)))
                }
            })
            .unwrap();

        let s = session();
        let first = suite.run(&s).await;
        assert_eq!(first.statuses(), vec![Status::Passed, Status::Passed]);
        assert_eq!(first.test("read").unwrap().logs, vec!["read entity 7".to_string()]);

        // a second run starts from empty state
        let mut reader = TestSuite::new("Reader", "", "");
        reader
            .add_test("read", "", |ctx| async move {
                let _: i64 = ctx.state().require("created_id")?;
                Ok(())
            })
            .unwrap();
        let second = reader.run(&s).await;
        assert_eq!(second.statuses(), vec![Status::Skipped]);
    }

    #[tokio::test]
    async fn test_filter_scenario() {
        let mut suite = TestSuite::new("Query Options", "", "");
        suite
            .add_test("filter_gt", "", |ctx| async move {
                let resp = ctx.get("/Products?$filter=Price gt 100", &[]).await?;
                assert_status_code(&resp, 200)?;
                let price = assert_json_field(&resp, "value[0].Price")?;
                match price.as_f64() {
                    Some(p) if p > 100.0 => Ok(()),
                    _ => Err(TestError::assertion(format!("expected Price > 100, got {}", price))),
                }
            })
            .unwrap();

        let result = suite.run(&session()).await;
        assert_eq!(result.statuses(), vec![Status::Passed]);
    }

    #[tokio::test]
    async fn test_deselected_tests_are_skipped() {
        let mut config = HarnessConfig::default();
        config.filter.test = Some("^keep".to_string());

        let mut suite = TestSuite::new("Selection", "", "");
        suite
            .add_test("keep_me", "", |_| async { Ok(()) })
            .unwrap()
            .add_test("drop_me", "", |_| async { Err(TestError::assertion("should not run")) })
            .unwrap();

        let result = suite.run(&session_with(config)).await;
        assert_eq!(result.statuses(), vec![Status::Passed, Status::Skipped]);
        assert_eq!(result.test("drop_me").unwrap().outcome.reason(), Some(DESELECTED_REASON));
    }

    #[tokio::test]
    async fn test_test_timeout_fails_the_test() {
        let config = HarnessConfig {
            test_timeout_secs: Some(1),
            ..Default::default()
        };

        let mut suite = TestSuite::new("Slow", "", "");
        suite
            .add_test("hangs", "", |_| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .unwrap()
            .add_test("after", "", |_| async { Ok(()) })
            .unwrap();

        let result = suite.run(&session_with(config)).await;
        assert!(matches!(
            result.test("hangs").unwrap().outcome,
            Outcome::Failed { kind: FailureKind::Timeout, .. }
        ));
        assert_eq!(result.test("after").unwrap().status(), Status::Passed);
    }

    #[tokio::test]
    async fn test_cancellation_skips_in_flight_and_remaining() {
        let s = session();
        let canceller = s.clone();

        let mut suite = TestSuite::new("Cancelled", "", "");
        suite
            .add_test("done", "", |_| async { Ok(()) })
            .unwrap()
            .add_test("in_flight", "", move |_| {
                let canceller = canceller.clone();
                async move {
                    canceller.cancel("interrupted by operator");
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                }
            })
            .unwrap()
            .add_test("never_started", "", |_| async { Ok(()) })
            .unwrap();

        let result = suite.run(&s).await;
        assert_eq!(
            result.statuses(),
            vec![Status::Passed, Status::Skipped, Status::Skipped]
        );
        assert_eq!(
            result.test("never_started").unwrap().outcome.reason(),
            Some("interrupted by operator")
        );
    }
}
