//! Harness configuration

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

/// Settings shared by every suite in a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Service root of the server under test
    pub base_url: String,

    /// Headers sent with every request unless a test overrides them
    pub default_headers: BTreeMap<String, String>,

    /// Whole-run deadline; unfinished tests are reported as skipped
    pub run_timeout_secs: Option<u64>,

    /// Per-request transport timeout
    pub request_timeout_secs: Option<u64>,

    /// Per-test deadline; an overrunning test fails
    pub test_timeout_secs: Option<u64>,

    /// How long to wait for the server to answer before starting
    pub readiness_timeout_secs: u64,

    /// Number of suites allowed to run at the same time
    pub suite_concurrency: usize,

    /// Suite and test selection
    pub filter: FilterConfig,

    /// Reset hook invoked before each suite
    pub reseed: Option<ReseedConfig>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let mut default_headers = BTreeMap::new();
        default_headers.insert("Accept".to_string(), "application/json".to_string());
        default_headers.insert("OData-MaxVersion".to_string(), "4.01".to_string());

        Self {
            base_url: "http://localhost:9000/odata".to_string(),
            default_headers,
            run_timeout_secs: None,
            request_timeout_secs: Some(30),
            test_timeout_secs: None,
            readiness_timeout_secs: 30,
            suite_concurrency: 1,
            filter: FilterConfig::default(),
            reseed: None,
        }
    }
}

/// Regular expressions matched against suite titles and test names
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub suite: Option<String>,
    pub test: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReseedConfig {
    /// POST to this URL; any 2xx counts as reseeded
    Http { url: String },
    /// Run through `sh -c`; exit status 0 counts as reseeded
    Command { command: String },
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> HarnessResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reject settings that would fail only once traffic starts
    pub fn validate(&self) -> HarnessResult<()> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(HarnessError::InvalidConfig("base_url must not be empty".into()));
        }
        let parsed = url::Url::parse(base).map_err(|e| {
            HarnessError::InvalidConfig(format!("base_url '{}' is not a valid URL: {}", base, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HarnessError::InvalidConfig(format!(
                "base_url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if self.suite_concurrency == 0 {
            return Err(HarnessError::InvalidConfig(
                "suite_concurrency must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("run_timeout_secs", self.run_timeout_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("test_timeout_secs", self.test_timeout_secs),
        ] {
            if value == Some(0) {
                return Err(HarnessError::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        for pattern in [&self.filter.suite, &self.filter.test].into_iter().flatten() {
            regex::Regex::new(pattern)?;
        }
        if let Some(ReseedConfig::Http { url }) = &self.reseed {
            url::Url::parse(url).map_err(|e| {
                HarnessError::InvalidConfig(format!("reseed url '{}' is invalid: {}", url, e))
            })?;
        }
        Ok(())
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn test_timeout(&self) -> Option<Duration> {
        self.test_timeout_secs.map(Duration::from_secs)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarnessConfig::default();
        config.validate().unwrap();
        assert_eq!(config.suite_concurrency, 1);
        assert_eq!(
            config.default_headers.get("OData-MaxVersion").map(String::as_str),
            Some("4.01")
        );
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
base_url = "https://services.example.com/TripPin"
run_timeout_secs = 600
suite_concurrency = 2

[default_headers]
Authorization = "Bearer abc"

[filter]
suite = "^Query"

[reseed]
kind = "http"
url = "https://services.example.com/reset"
"#
        )
        .unwrap();

        let config = HarnessConfig::load(file.path()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.base_url, "https://services.example.com/TripPin");
        assert_eq!(config.run_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(config.suite_concurrency, 2);
        assert_eq!(config.filter.suite.as_deref(), Some("^Query"));
        assert_eq!(
            config.reseed,
            Some(ReseedConfig::Http {
                url: "https://services.example.com/reset".to_string()
            })
        );
        // omitted fields keep their defaults
        assert_eq!(config.request_timeout_secs, Some(30));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.base_url, HarnessConfig::default().base_url);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = HarnessConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(HarnessError::InvalidConfig(_))));

        config.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        config.base_url = "http://localhost:9000".to_string();
        config.suite_concurrency = 0;
        assert!(config.validate().is_err());

        config.suite_concurrency = 1;
        config.filter.test = Some("(unclosed".to_string());
        assert!(matches!(config.validate(), Err(HarnessError::Pattern(_))));
    }
}
