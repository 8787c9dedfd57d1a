//! Helpers shared by the OData suites

use odata_compliance_harness::assert::{assert_collection, assert_status_code};
use odata_compliance_harness::{HttpResponse, TestContext, TestError};
use serde_json::Value;

/// Entity set every suite exercises on the reference service
pub const PRODUCTS: &str = "Products";

pub const PROTOCOL_SPEC: &str =
    "https://docs.oasis-open.org/odata/odata/v4.01/odata-v4.01-part1-protocol.html";
pub const URL_SPEC: &str =
    "https://docs.oasis-open.org/odata/odata/v4.01/odata-v4.01-part2-url-conventions.html";
pub const JSON_SPEC: &str =
    "https://docs.oasis-open.org/odata/odata-json-format/v4.01/odata-json-format-v4.01.html";
pub const CSDL_XML_SPEC: &str =
    "https://docs.oasis-open.org/odata/odata-csdl-xml/v4.01/odata-csdl-xml-v4.01.html";

/// Link into a section of one of the specification documents
pub fn spec_section(document: &str, anchor: &str) -> String {
    format!("{}#{}", document, anchor)
}

/// Status codes a service uses to say an optional feature is not offered
pub const NOT_IMPLEMENTED: &[u16] = &[405, 406, 415, 501];

/// Skip when the server reports the feature as not implemented.
pub fn skip_if_unsupported(resp: &HttpResponse, feature: &str) -> Result<(), TestError> {
    if NOT_IMPLEMENTED.contains(&resp.status) {
        return Err(TestError::skip(format!(
            "{} not supported (status {})",
            feature, resp.status
        )));
    }
    Ok(())
}

/// Quote `value` as an OData string literal, doubling embedded single
/// quotes, and percent-encode it for use in a query option.
pub fn string_literal(value: &str) -> String {
    urlencoding::encode(&format!("'{}'", value.replace('\'', "''"))).into_owned()
}

pub fn number(item: &Value, field: &str) -> Result<f64, TestError> {
    item.get(field).and_then(Value::as_f64).ok_or_else(|| {
        TestError::assertion(format!("expected numeric '{}' in {}", field, item))
    })
}

pub fn text<'a>(item: &'a Value, field: &str) -> Result<&'a str, TestError> {
    item.get(field).and_then(Value::as_str).ok_or_else(|| {
        TestError::assertion(format!("expected string '{}' in {}", field, item))
    })
}

pub fn entity_id(item: &Value) -> Result<i64, TestError> {
    item.get("ID").and_then(Value::as_i64).ok_or_else(|| {
        TestError::assertion(format!("expected integer key 'ID' in {}", item))
    })
}

/// GET a collection and require a 200 with a `value` array.
pub async fn get_collection(ctx: &TestContext, path: &str) -> Result<Vec<Value>, TestError> {
    let resp = ctx.get(path, &[]).await?;
    assert_status_code(&resp, 200)?;
    assert_collection(&resp)
}

/// Follow `@odata.nextLink` from `path`, returning every item and the
/// final page's `@odata.deltaLink` if any.
pub async fn collect_pages(
    ctx: &TestContext,
    path: &str,
    headers: &[(&str, &str)],
    max_pages: usize,
) -> Result<(Vec<Value>, HttpResponse, Option<String>), TestError> {
    let mut items = Vec::new();
    let mut next = path.to_string();
    let mut pages = 0;

    loop {
        let resp = ctx.get(&next, headers).await?;
        assert_status_code(&resp, 200)?;
        items.extend(assert_collection(&resp)?);
        pages += 1;

        let body: Value = resp.json()?;
        match body.get("@odata.nextLink").and_then(Value::as_str) {
            Some(link) if pages < max_pages => {
                ctx.log(format!("following next link {}", link));
                next = link.to_string();
            }
            Some(_) => {
                return Err(TestError::assertion(format!(
                    "collection did not end within {} pages",
                    max_pages
                )))
            }
            None => {
                let delta = body
                    .get("@odata.deltaLink")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                return Ok((items, resp, delta));
            }
        }
    }
}

/// Require that `values` never decreases (or never increases when `descending`).
pub fn assert_sorted(values: &[f64], descending: bool) -> Result<(), TestError> {
    for pair in values.windows(2) {
        let ordered = if descending {
            pair[0] >= pair[1]
        } else {
            pair[0] <= pair[1]
        };
        if !ordered {
            return Err(TestError::assertion(format!(
                "expected {} order, found {} before {}",
                if descending { "descending" } else { "ascending" },
                pair[0],
                pair[1]
            )));
        }
    }
    Ok(())
}
