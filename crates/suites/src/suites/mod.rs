//! OData v4 suites, one module per area

pub mod change_tracking;
pub mod entity_crud;
pub mod headers;
pub mod metadata;
pub mod query_filter;
pub mod query_options;
pub mod service_document;
