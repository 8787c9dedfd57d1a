//! Error types for the compliance harness

use thiserror::Error;

/// Errors raised while configuring or assembling a run.
///
/// These never describe the server under test; they abort before any
/// request is sent.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Duplicate test '{test}' in suite '{suite}'")]
    DuplicateTest { suite: String, test: String },

    #[error("Duplicate suite '{0}'")]
    DuplicateSuite(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Server not ready at {url} after {attempts} attempts")]
    ServerNotReady { url: String, attempts: usize },

    #[error("Suite hook failed: {0}")]
    Hook(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid filter pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Failures of the HTTP call itself, as opposed to error status codes.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("invalid url '{0}'")]
    InvalidUrl(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(|u| u.to_string()).unwrap_or_default();
        if e.is_timeout() {
            TransportError::Timeout { url }
        } else if e.is_connect() {
            TransportError::Connect {
                url,
                reason: e.to_string(),
            }
        } else if e.is_builder() && (e.url().is_some() || caused_by_url_parse(&e)) {
            TransportError::InvalidUrl(if url.is_empty() { e.to_string() } else { url })
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

fn caused_by_url_parse(e: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if err.is::<url::ParseError>() {
            return true;
        }
        source = err.source();
    }
    false
}

/// Everything a test body can end with besides `Ok(())`.
///
/// `Skipped` is not a failure: it is the cooperative skip signal and is
/// reported as its own outcome.
#[derive(Error, Debug)]
pub enum TestError {
    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("skipped: {0}")]
    Skipped(String),

    #[error("{0}")]
    Other(String),
}

impl TestError {
    pub fn assertion(message: impl Into<String>) -> Self {
        TestError::Assertion(message.into())
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        TestError::Skipped(reason.into())
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, TestError::Skipped(_))
    }
}

impl From<serde_json::Error> for TestError {
    fn from(e: serde_json::Error) -> Self {
        TestError::Decode(e.to_string())
    }
}

/// Return type of every test body.
pub type TestResult = Result<(), TestError>;
