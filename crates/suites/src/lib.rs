//! OData Compliance Suites
//!
//! The OData v4 conformance suites run by the `odata-compliance` binary.
//! Every suite targets the `Products` entity set of the service under test
//! and expects it to expose `ID`, `Name` and `Price`.

pub mod common;
pub mod suites;

use odata_compliance_harness::{HarnessResult, SuiteRegistry, TestSuite};
use tracing::debug;

/// Builds one suite.
pub type SuiteConstructor = fn() -> HarnessResult<TestSuite>;

/// Every suite, in run order.
pub const SUITES: &[SuiteConstructor] = &[
    suites::service_document::suite,
    suites::metadata::suite,
    suites::headers::suite,
    suites::query_filter::suite,
    suites::query_options::suite,
    suites::entity_crud::suite,
    suites::change_tracking::suite,
];

/// Register every suite. Fails on a duplicate suite or test name.
pub fn registry() -> HarnessResult<SuiteRegistry> {
    let mut registry = SuiteRegistry::new();
    for build in SUITES {
        registry.register(build()?)?;
    }
    debug!(
        "Registered {} suite(s) with {} test(s)",
        registry.len(),
        registry.test_count()
    );
    Ok(registry)
}
