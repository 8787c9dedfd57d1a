//! OData Compliance Harness
//!
//! The test-orchestration engine behind the OData v4 compliance suites:
//! - Registers suites of named tests, run in registration order
//! - Gives every test a fresh context for HTTP calls, suite state and logs
//! - Classifies each test as passed, failed or skipped, exactly once
//! - Contains panics and errors so one test never stops the rest of the run
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  SuiteRegistry::run_all(&Session) -> RunResult              │
//! │    ├── SuiteHook::before_suite()      (reseed, optional)    │
//! │    └── TestSuite::run(&Session) -> SuiteResult              │
//! │          └── for each TestCase, in order:                   │
//! │                TestContext ──► Transport ──► server         │
//! │                     │                                       │
//! │                     └── assert::* ──► Outcome               │
//! │                          Passed | Failed | Skipped          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod assert;
pub mod config;
pub mod context;
pub mod error;
pub mod hook;
pub mod http;
pub mod outcome;
pub mod readiness;
pub mod registry;
pub mod session;
pub mod state;
pub mod suite;

pub use config::{FilterConfig, HarnessConfig, ReseedConfig};
pub use context::TestContext;
pub use error::{HarnessError, HarnessResult, TestError, TestResult, TransportError};
pub use hook::SuiteHook;
pub use http::{Body, HttpRequest, HttpResponse, Method, MockTransport, ReqwestTransport, Transport};
pub use outcome::{FailureKind, Outcome, RunResult, Status, SuiteResult, Summary, TestCaseResult};
pub use registry::SuiteRegistry;
pub use session::Session;
pub use state::SuiteState;
pub use suite::{TestCase, TestSuite};
