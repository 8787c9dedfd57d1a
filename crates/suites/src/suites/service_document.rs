//! Service document: the JSON listing of entity sets at the service root

use odata_compliance_harness::assert::{
    assert_collection, assert_json_content_type, assert_odata_context, assert_odata_version,
    assert_status_code,
};
use odata_compliance_harness::{HarnessResult, TestError, TestSuite};
use serde_json::Value;

use crate::common::{spec_section, text, JSON_SPEC, PRODUCTS};

pub const TITLE: &str = "Service Document";

pub fn suite() -> HarnessResult<TestSuite> {
    let mut suite = TestSuite::new(
        TITLE,
        "The service root returns a JSON service document listing its entity sets",
        spec_section(JSON_SPEC, "sec_ServiceDocument"),
    );

    suite
        .add_test(
            "service_root_ok",
            "GET on the service root returns 200 with a JSON body",
            |ctx| async move {
                let resp = ctx.get("", &[]).await?;
                assert_status_code(&resp, 200)?;
                assert_json_content_type(&resp)?;
                assert_odata_version(&resp)
            },
        )?
        .add_test(
            "context_url",
            "The service document context URL points at $metadata",
            |ctx| async move {
                let resp = ctx.get("", &[]).await?;
                assert_status_code(&resp, 200)?;
                let context = assert_odata_context(&resp)?;
                if context.ends_with("$metadata") {
                    Ok(())
                } else {
                    Err(TestError::assertion(format!(
                        "expected @odata.context ending in $metadata, got '{}'",
                        context
                    )))
                }
            },
        )?
        .add_test(
            "entity_sets_listed",
            "Every entry in value carries a name and a url",
            |ctx| async move {
                let resp = ctx.get("", &[]).await?;
                assert_status_code(&resp, 200)?;
                let entries = assert_collection(&resp)?;
                if entries.is_empty() {
                    return Err(TestError::assertion("expected at least one service document entry"));
                }
                for entry in &entries {
                    text(entry, "name")?;
                    text(entry, "url")?;
                }
                ctx.log(format!("{} entries listed", entries.len()));
                Ok(())
            },
        )?
        .add_test(
            "entry_kinds",
            "Entry kinds, when present, are among the kinds a service document allows",
            |ctx| async move {
                const KINDS: &[&str] = &["EntitySet", "Singleton", "FunctionImport", "ServiceDocument"];
                let resp = ctx.get("", &[]).await?;
                assert_status_code(&resp, 200)?;
                for entry in assert_collection(&resp)? {
                    if let Some(kind) = entry.get("kind").and_then(Value::as_str) {
                        if !KINDS.contains(&kind) {
                            return Err(TestError::assertion(format!(
                                "unexpected kind '{}' for entry {}",
                                kind, entry
                            )));
                        }
                    }
                }
                Ok(())
            },
        )?
        .add_test(
            "products_entity_set",
            "The reference entity set is listed and its url resolves",
            |ctx| async move {
                let resp = ctx.get("", &[]).await?;
                assert_status_code(&resp, 200)?;
                let entries = assert_collection(&resp)?;
                let entry = entries
                    .iter()
                    .find(|e| e.get("name").and_then(Value::as_str) == Some(PRODUCTS))
                    .ok_or_else(|| {
                        TestError::assertion(format!("expected entity set '{}' to be listed", PRODUCTS))
                    })?;
                let url = text(entry, "url")?;
                let resp = ctx.get(url, &[]).await?;
                assert_status_code(&resp, 200)
            },
        )?;

    Ok(suite)
}
