//! Change tracking with delta links
//!
//! Servers that do not apply `odata.track-changes` skip the whole chain:
//! the first test skips and the rest find no delta link in suite state.

use odata_compliance_harness::assert::{assert_collection, assert_status_code};
use odata_compliance_harness::{HarnessResult, TestContext, TestError, TestSuite};
use serde_json::{json, Value};

use crate::common::{collect_pages, entity_id, spec_section, PROTOCOL_SPEC, PRODUCTS};

pub const TITLE: &str = "Change Tracking";

const TRACK_CHANGES: &str = "odata.track-changes";
const DELTA_LINK: &str = "delta_link";
const TRACKED_ID: &str = "tracked_id";
const MAX_PAGES: usize = 50;

/// Fetch the delta link in state and return its changes, storing the next link.
async fn read_delta(ctx: &TestContext) -> Result<Vec<Value>, TestError> {
    let link: String = ctx.state().require(DELTA_LINK)?;
    let (changes, _, next) = collect_pages(ctx, &link, &[], MAX_PAGES).await?;
    let next = next.ok_or_else(|| {
        TestError::assertion("expected a new @odata.deltaLink on the last delta page")
    })?;
    ctx.state().set(DELTA_LINK, next)?;
    Ok(changes)
}

fn is_removal(change: &Value) -> bool {
    change.get("@removed").is_some() || change.get("@odata.removed").is_some()
}

pub fn suite() -> HarnessResult<TestSuite> {
    let mut suite = TestSuite::new(
        TITLE,
        "Delta links report entities added and removed since tracking began",
        spec_section(PROTOCOL_SPEC, "sec_RequestingChanges"),
    );

    suite
        .add_test(
            "request_tracking",
            "Prefer: odata.track-changes yields a delta link on the last page",
            |ctx| async move {
                let prefer = [("Prefer", TRACK_CHANGES)];
                let first = ctx.get(PRODUCTS, &prefer).await?;
                assert_status_code(&first, 200)?;
                let applied = first
                    .header_values("Preference-Applied")
                    .iter()
                    .any(|v| v.contains(TRACK_CHANGES));
                if !applied {
                    return Err(ctx.skip("server does not support change tracking"));
                }

                let (items, _, delta) = collect_pages(&ctx, PRODUCTS, &prefer, MAX_PAGES).await?;
                let delta = delta.ok_or_else(|| {
                    TestError::assertion("expected @odata.deltaLink when change tracking is applied")
                })?;
                ctx.log(format!("tracking {} rows", items.len()));
                ctx.state().set(DELTA_LINK, delta)
            },
        )?
        .add_test(
            "initial_delta_empty",
            "A delta read right after tracking began reports no changes",
            |ctx| async move {
                let changes = read_delta(&ctx).await?;
                if !changes.is_empty() {
                    return Err(TestError::assertion(format!(
                        "expected no changes yet, got {}",
                        changes.len()
                    )));
                }
                Ok(())
            },
        )?
        .add_test(
            "delta_reports_addition",
            "An entity created after tracking began appears in the delta",
            |ctx| async move {
                if !ctx.state().contains(DELTA_LINK) {
                    return Err(ctx.skip("no delta link from a previous test"));
                }
                let resp = ctx
                    .post(PRODUCTS, json!({"Name": "Tracked Tomato", "Price": 1.25}), &[])
                    .await?;
                assert_status_code(&resp, 201)?;
                let id = entity_id(&resp.json()?)?;
                ctx.state().set(TRACKED_ID, id)?;

                let changes = read_delta(&ctx).await?;
                let reported = changes
                    .iter()
                    .any(|c| !is_removal(c) && c.get("ID").and_then(Value::as_i64) == Some(id));
                if !reported {
                    return Err(TestError::assertion(format!(
                        "expected delta to report added entity {}",
                        id
                    )));
                }
                Ok(())
            },
        )?
        .add_test(
            "delta_reports_removal",
            "Deleting the tracked entity shows up as a removed entry",
            |ctx| async move {
                let id: i64 = ctx.state().require(TRACKED_ID)?;
                let resp = ctx.delete(&format!("{}({})", PRODUCTS, id), &[]).await?;
                assert_status_code(&resp, 204)?;

                let changes = read_delta(&ctx).await?;
                let removed: Vec<&Value> = changes.iter().filter(|c| is_removal(c)).collect();
                if removed.is_empty() {
                    return Err(TestError::assertion("expected a removed entry in the delta"));
                }
                let key = format!("({})", id);
                let matches = removed.iter().any(|c| {
                    c.get("@id")
                        .or_else(|| c.get("@odata.id"))
                        .and_then(Value::as_str)
                        .map_or(false, |v| v.ends_with(&key))
                        || c.get("ID").and_then(Value::as_i64) == Some(id)
                });
                if !matches {
                    return Err(TestError::assertion(format!(
                        "expected removed entry for {}({}), got {:?}",
                        PRODUCTS, id, removed
                    )));
                }
                Ok(())
            },
        )?
        .add_test(
            "delta_without_tracking",
            "Without the preference the collection carries no delta link",
            |ctx| async move {
                let resp = ctx.get(PRODUCTS, &[]).await?;
                assert_status_code(&resp, 200)?;
                assert_collection(&resp)?;
                let body: Value = resp.json()?;
                if body.get("@odata.deltaLink").is_some() {
                    return Err(TestError::assertion(
                        "expected no @odata.deltaLink without Prefer: odata.track-changes",
                    ));
                }
                Ok(())
            },
        )?;

    Ok(suite)
}
