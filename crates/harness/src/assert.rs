//! Assertion primitives over a normalized response
//!
//! Every function is pure: it inspects an [`HttpResponse`] and returns
//! `Ok` or a [`TestError::Assertion`] naming what was expected and what
//! was observed. Test bodies propagate them with `?`.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TestError;
use crate::http::HttpResponse;

/// OData protocol versions a v4 service may answer with
pub const ODATA_VERSIONS: &[&str] = &["4.0", "4.01"];

pub fn assert_status_code(resp: &HttpResponse, expected: u16) -> Result<(), TestError> {
    if resp.status == expected {
        Ok(())
    } else {
        Err(TestError::assertion(format!(
            "expected status {}, got {}",
            expected, resp.status
        )))
    }
}

pub fn assert_status_in(resp: &HttpResponse, expected: &[u16]) -> Result<(), TestError> {
    if expected.contains(&resp.status) {
        Ok(())
    } else {
        Err(TestError::assertion(format!(
            "expected status in {:?}, got {}",
            expected, resp.status
        )))
    }
}

pub fn assert_header_present(resp: &HttpResponse, name: &str) -> Result<(), TestError> {
    match resp.header(name) {
        Some(_) => Ok(()),
        None => Err(TestError::assertion(format!("expected header '{}' to be present", name))),
    }
}

/// Passes when any value of `name` contains `substring`.
pub fn assert_header_contains(
    resp: &HttpResponse,
    name: &str,
    substring: &str,
) -> Result<(), TestError> {
    let values = resp.header_values(name);
    if values.is_empty() {
        return Err(TestError::assertion(format!(
            "expected header '{}' containing '{}', header is missing",
            name, substring
        )));
    }
    if values.iter().any(|v| v.contains(substring)) {
        Ok(())
    } else {
        Err(TestError::assertion(format!(
            "expected header '{}' to contain '{}', got '{}'",
            name,
            substring,
            values.join(", ")
        )))
    }
}

pub fn assert_body_contains(resp: &HttpResponse, substring: &str) -> Result<(), TestError> {
    let text = resp.text();
    if text.contains(substring) {
        Ok(())
    } else {
        Err(TestError::assertion(format!(
            "expected body to contain '{}', got: {}",
            substring,
            excerpt(&text)
        )))
    }
}

/// Asserts a JSON body has a value at `path` and returns it.
pub fn assert_json_field(resp: &HttpResponse, path: &str) -> Result<Value, TestError> {
    let body: Value = resp.json()?;
    match json_field(&body, path) {
        Some(value) => Ok(value.clone()),
        None => Err(TestError::assertion(format!(
            "expected JSON field '{}' to be present",
            path
        ))),
    }
}

pub fn assert_json_field_equals(
    resp: &HttpResponse,
    path: &str,
    expected: &Value,
) -> Result<(), TestError> {
    let actual = assert_json_field(resp, path)?;
    if &actual == expected {
        Ok(())
    } else {
        Err(TestError::assertion(format!(
            "expected JSON field '{}' to equal {}, got {}",
            path, expected, actual
        )))
    }
}

pub fn get_json<T: DeserializeOwned>(resp: &HttpResponse) -> Result<T, TestError> {
    resp.json()
}

/// Requires the `OData-Version` response header to name a v4 version.
pub fn assert_odata_version(resp: &HttpResponse) -> Result<(), TestError> {
    match resp.header("OData-Version") {
        Some(v) if ODATA_VERSIONS.contains(&v.trim()) => Ok(()),
        Some(v) => Err(TestError::assertion(format!(
            "expected OData-Version header in {:?}, got '{}'",
            ODATA_VERSIONS, v
        ))),
        None => Err(TestError::assertion("expected OData-Version header to be present")),
    }
}

pub fn assert_json_content_type(resp: &HttpResponse) -> Result<(), TestError> {
    match resp.content_type() {
        Some(ct) if ct.to_ascii_lowercase().starts_with("application/json") => Ok(()),
        Some(ct) => Err(TestError::assertion(format!(
            "expected Content-Type application/json, got '{}'",
            ct
        ))),
        None => Err(TestError::assertion("expected Content-Type header to be present")),
    }
}

pub fn assert_odata_context(resp: &HttpResponse) -> Result<String, TestError> {
    match assert_json_field(resp, "@odata.context")? {
        Value::String(context) if !context.is_empty() => Ok(context),
        other => Err(TestError::assertion(format!(
            "expected @odata.context to be a non-empty string, got {}",
            other
        ))),
    }
}

/// Asserts the body is an OData collection and returns its `value` array.
pub fn assert_collection(resp: &HttpResponse) -> Result<Vec<Value>, TestError> {
    match assert_json_field(resp, "value")? {
        Value::Array(items) => Ok(items),
        other => Err(TestError::assertion(format!(
            "expected 'value' to be an array, got {}",
            kind_of(&other)
        ))),
    }
}

/// Looks up a dotted path with `[n]` indices, e.g. `value[0].Price`.
///
/// Keys containing dots (`@odata.context`) match whole before the path is
/// split.
pub fn json_field<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    let mut rest = path;

    loop {
        rest = rest.strip_prefix('.').unwrap_or(rest);
        if rest.is_empty() {
            return Some(current);
        }
        if let Some(found) = current.as_object().and_then(|obj| obj.get(rest)) {
            return Some(found);
        }
        let (segment, next) = split_segment(rest)?;
        current = match segment {
            Segment::Key(key) => match current {
                Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                _ => current.as_object()?.get(key)?,
            },
            Segment::Index(i) => current.as_array()?.get(i)?,
        };
        rest = next;
    }
}

enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn split_segment(path: &str) -> Option<(Segment<'_>, &str)> {
    if let Some(inner) = path.strip_prefix('[') {
        let end = inner.find(']')?;
        let index = inner[..end].trim().parse().ok()?;
        return Some((Segment::Index(index), &inner[end + 1..]));
    }

    let end = path.find(['.', '[']).unwrap_or(path.len());
    if end == 0 {
        return None;
    }
    let (key, rest) = path.split_at(end);
    Some((Segment::Key(key), rest))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn excerpt(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let cut: String = text.chars().take(LIMIT).collect();
        format!("{}...", cut)
    }
}
