//! Per-test execution handle

use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::TestError;
use crate::http::{Body, HttpRequest, HttpResponse, Method, CONTENT_TYPE};
use crate::session::Session;
use crate::state::SuiteState;

/// Everything one test body needs: request issuance against the server
/// under test, suite-scoped state, the skip signal, and a log sink.
///
/// A fresh context is built for every test execution and is never reused.
pub struct TestContext {
    session: Session,
    suite: String,
    name: String,
    state: SuiteState,
    logs: Arc<Mutex<Vec<String>>>,
}

impl TestContext {
    pub(crate) fn new(
        session: Session,
        suite: &str,
        name: &str,
        state: SuiteState,
        logs: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            session,
            suite: suite.to_string(),
            name: name.to_string(),
            state,
            logs,
        }
    }

    pub fn suite(&self) -> &str {
        &self.suite
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        self.session.base_url()
    }

    /// State shared with the other tests of this suite run
    pub fn state(&self) -> &SuiteState {
        &self.state
    }

    /// The skip signal: `return Err(ctx.skip("..."))`.
    pub fn skip(&self, reason: impl Into<String>) -> TestError {
        TestError::skip(reason)
    }

    /// Attach an informational note to this test's result
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(suite = %self.suite, test = %self.name, "{}", message);
        self.logs.lock().push(message);
    }

    pub fn get_json<T: DeserializeOwned>(&self, resp: &HttpResponse) -> Result<T, TestError> {
        resp.json()
    }

    pub async fn get(&self, path: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, TestError> {
        self.request(Method::Get, path, Body::Empty, headers).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: impl Into<Body>,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, TestError> {
        self.request(Method::Post, path, body.into(), headers).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: impl Into<Body>,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, TestError> {
        self.request(Method::Put, path, body.into(), headers).await
    }

    pub async fn patch(
        &self,
        path: &str,
        body: impl Into<Body>,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, TestError> {
        self.request(Method::Patch, path, body.into(), headers).await
    }

    pub async fn delete(&self, path: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, TestError> {
        self.request(Method::Delete, path, Body::Empty, headers).await
    }

    /// Issue one request. Error statuses come back as `Ok`; only transport
    /// failures are `Err`. Nothing is retried.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Body,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, TestError> {
        let mut merged: Vec<(String, String)> = self
            .session
            .default_headers()
            .iter()
            .filter(|(k, _)| !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case(k)))
            .cloned()
            .collect();
        merged.extend(headers.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let body = match body.encode()? {
            Some((bytes, content_type)) => {
                if !merged.iter().any(|(k, _)| k.eq_ignore_ascii_case(CONTENT_TYPE)) {
                    merged.push(("Content-Type".to_string(), content_type.to_string()));
                }
                Some(bytes)
            }
            None => None,
        };

        let request = HttpRequest {
            method,
            url: self.session.resolve(path),
            headers: merged,
            body,
        };

        debug!(suite = %self.suite, test = %self.name, "{} {}", request.method, request.url);
        Ok(self.session.transport().send(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::error::TransportError;
    use crate::http::MockTransport;
    use serde_json::json;

    fn context(transport: Arc<MockTransport>) -> TestContext {
        let session = Session::with_transport(&HarnessConfig::default(), transport).unwrap();
        TestContext::new(
            session,
            "Entity CRUD",
            "create",
            SuiteState::new(),
            Arc::new(Mutex::new(Vec::new())),
        )
    }

    #[tokio::test]
    async fn test_request_merges_default_headers() {
        let transport = Arc::new(MockTransport::status(201));
        let ctx = context(transport.clone());

        let resp = ctx
            .post("/Products", json!({"Name": "Bread"}), &[("accept", "application/json;odata.metadata=full")])
            .await
            .unwrap();
        assert_eq!(resp.status, 201);

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::Post);
        assert_eq!(sent.url, "http://localhost:9000/odata/Products");
        assert_eq!(sent.header("Accept"), Some("application/json;odata.metadata=full"));
        assert_eq!(sent.header("OData-MaxVersion"), Some("4.01"));
        assert_eq!(sent.header("Content-Type"), Some("application/json"));
        assert_eq!(sent.body.as_deref(), Some(&br#"{"Name":"Bread"}"#[..]));
        // the overridden default is not sent twice
        assert_eq!(
            sent.headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case("accept")).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_explicit_content_type_wins() {
        let transport = Arc::new(MockTransport::status(204));
        let ctx = context(transport.clone());

        ctx.patch("/Products(1)", json!({"Price": 3}), &[("Content-Type", "application/json;odata.metadata=minimal")])
            .await
            .unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.header("content-type"), Some("application/json;odata.metadata=minimal"));
    }

    #[tokio::test]
    async fn test_error_status_is_not_transport_error() {
        let ctx = context(Arc::new(MockTransport::status(404)));
        let resp = ctx.get("/Products(999)", &[]).await.unwrap();
        assert_eq!(resp.status, 404);
    }

    #[tokio::test]
    async fn test_transport_failure_is_distinct() {
        let transport = MockTransport::new(|req| {
            Err(TransportError::Connect {
                url: req.url.clone(),
                reason: "connection refused".to_string(),
            })
        });
        let ctx = context(Arc::new(transport));
        let err = ctx.delete("/Products(1)", &[]).await.unwrap_err();
        assert!(matches!(err, TestError::Transport(_)));
        assert!(err.to_string().starts_with("transport error"));
    }

    #[test]
    fn test_log_and_skip() {
        let ctx = context(Arc::new(MockTransport::status(200)));
        ctx.log("server does not advertise change tracking");
        assert_eq!(ctx.logs.lock().len(), 1);
        assert!(ctx.skip("optional feature").is_skip());
        assert_eq!(ctx.suite(), "Entity CRUD");
        assert_eq!(ctx.name(), "create");
    }
}
