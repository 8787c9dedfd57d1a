//! Suite-scoped state shared between the tests of one suite run

use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::TestError;

/// Small key/value store owned by one suite run.
///
/// Tests run one at a time in registration order, so a value set by test N
/// is what test N+1 reads. A fresh store is created for every suite run;
/// nothing leaks between suites.
#[derive(Debug, Clone, Default)]
pub struct SuiteState {
    values: Arc<Mutex<Map<String, Value>>>,
}

impl SuiteState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<(), TestError> {
        let value = serde_json::to_value(value)?;
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    /// `Ok(None)` when the key was never set; `Decode` when it holds another type.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, TestError> {
        let value = self.values.lock().get(key).cloned();
        match value {
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                TestError::Decode(format!("suite state '{}' has an unexpected type: {}", key, e))
            }),
            None => Ok(None),
        }
    }

    /// Like [`get`](Self::get), but a missing key skips the calling test.
    ///
    /// A test that depends on an earlier test which failed or skipped is
    /// reported as skipped instead of piling on another failure.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T, TestError> {
        self.get(key)?.ok_or_else(|| {
            TestError::skip(format!("prerequisite '{}' was not produced by an earlier test", key))
        })
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.lock().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let state = SuiteState::new();
        state.set("created_id", 42).unwrap();
        state.set("delta_link", "Products?$deltatoken=abc").unwrap();

        assert_eq!(state.get::<i64>("created_id").unwrap(), Some(42));
        assert_eq!(
            state.require::<String>("delta_link").unwrap(),
            "Products?$deltatoken=abc"
        );
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_missing_prerequisite_skips() {
        let state = SuiteState::new();
        let err = state.require::<String>("delta_link").unwrap_err();
        assert!(err.is_skip());
        assert!(state.get::<String>("delta_link").unwrap().is_none());
    }

    #[test]
    fn test_wrong_type_is_decode_error() {
        let state = SuiteState::new();
        state.set("created_id", "not-a-number").unwrap();
        assert!(matches!(
            state.get::<i64>("created_id"),
            Err(TestError::Decode(_))
        ));
    }

    #[test]
    fn test_clones_share_values() {
        let state = SuiteState::new();
        let handle = state.clone();
        handle.set("token", "t1").unwrap();
        assert!(state.contains("token"));
        assert!(state.remove("token").is_some());
        assert!(handle.is_empty());
    }
}
