//! `$select`, `$orderby`, `$top`, `$skip` and `$count`

use odata_compliance_harness::assert::{assert_json_field, assert_status_code};
use odata_compliance_harness::{HarnessResult, TestError, TestSuite};
use serde_json::Value;

use crate::common::{
    assert_sorted, entity_id, get_collection, number, spec_section, PRODUCTS, URL_SPEC,
};

pub const TITLE: &str = "Query Options $select $orderby $top $skip $count";

pub fn suite() -> HarnessResult<TestSuite> {
    let mut suite = TestSuite::new(
        TITLE,
        "Projection, ordering, paging and counting of collections",
        spec_section(URL_SPEC, "sec_SystemQueryOptions"),
    );

    suite
        .add_test(
            "select_projects",
            "$select=Name returns Name and omits unselected properties",
            |ctx| async move {
                let items = get_collection(&ctx, &format!("{}?$select=Name", PRODUCTS)).await?;
                for item in &items {
                    if item.get("Name").is_none() {
                        return Err(TestError::assertion(format!("expected Name in {}", item)));
                    }
                    if item.get("Price").is_some() {
                        return Err(TestError::assertion(format!(
                            "expected Price to be omitted by $select, got {}",
                            item
                        )));
                    }
                }
                Ok(())
            },
        )?
        .add_test(
            "orderby_asc",
            "$orderby=Price asc sorts ascending",
            |ctx| async move {
                let items = get_collection(&ctx, &format!("{}?$orderby=Price asc", PRODUCTS)).await?;
                let prices = items
                    .iter()
                    .map(|item| number(item, "Price"))
                    .collect::<Result<Vec<_>, _>>()?;
                assert_sorted(&prices, false)
            },
        )?
        .add_test(
            "orderby_desc",
            "$orderby=Price desc sorts descending",
            |ctx| async move {
                let items =
                    get_collection(&ctx, &format!("{}?$orderby=Price desc", PRODUCTS)).await?;
                let prices = items
                    .iter()
                    .map(|item| number(item, "Price"))
                    .collect::<Result<Vec<_>, _>>()?;
                assert_sorted(&prices, true)
            },
        )?
        .add_test(
            "top_limits",
            "$top=2 returns at most two rows",
            |ctx| async move {
                let items = get_collection(&ctx, &format!("{}?$top=2", PRODUCTS)).await?;
                if items.len() > 2 {
                    return Err(TestError::assertion(format!(
                        "expected at most 2 rows, got {}",
                        items.len()
                    )));
                }
                Ok(())
            },
        )?
        .add_test(
            "skip_offsets",
            "$skip=1 drops exactly the first row of a stable ordering",
            |ctx| async move {
                let all = get_collection(&ctx, &format!("{}?$orderby=ID&$top=3", PRODUCTS)).await?;
                if all.len() < 2 {
                    return Err(ctx.skip("need at least two rows to check $skip"));
                }
                let skipped =
                    get_collection(&ctx, &format!("{}?$orderby=ID&$skip=1&$top=2", PRODUCTS)).await?;
                let expected = all[1..]
                    .iter()
                    .map(entity_id)
                    .collect::<Result<Vec<_>, _>>()?;
                let actual = skipped
                    .iter()
                    .map(entity_id)
                    .collect::<Result<Vec<_>, _>>()?;
                if actual != expected {
                    return Err(TestError::assertion(format!(
                        "expected IDs {:?} after $skip=1, got {:?}",
                        expected, actual
                    )));
                }
                Ok(())
            },
        )?
        .add_test(
            "count_inline",
            "$count=true adds @odata.count covering every returned row",
            |ctx| async move {
                let resp = ctx.get(&format!("{}?$count=true", PRODUCTS), &[]).await?;
                assert_status_code(&resp, 200)?;
                let count = assert_json_field(&resp, "@odata.count")?
                    .as_u64()
                    .ok_or_else(|| TestError::assertion("expected @odata.count to be an integer"))?;
                let rows = match assert_json_field(&resp, "value")? {
                    Value::Array(items) => items.len() as u64,
                    _ => return Err(TestError::assertion("expected 'value' to be an array")),
                };
                if count < rows {
                    return Err(TestError::assertion(format!(
                        "expected @odata.count >= {} rows, got {}",
                        rows, count
                    )));
                }
                ctx.state().set("count", count)
            },
        )?
        .add_test(
            "count_segment",
            "/$count returns the same total as plain text",
            |ctx| async move {
                let resp = ctx.get(&format!("{}/$count", PRODUCTS), &[("Accept", "text/plain")]).await?;
                assert_status_code(&resp, 200)?;
                let text = resp.text();
                let count: u64 = text.trim().parse().map_err(|_| {
                    TestError::assertion(format!("expected an integer body, got '{}'", text))
                })?;
                if let Some(inline) = ctx.state().get::<u64>("count")? {
                    if inline != count {
                        return Err(TestError::assertion(format!(
                            "expected /$count {} to equal @odata.count {}",
                            count, inline
                        )));
                    }
                }
                Ok(())
            },
        )?
        .add_test(
            "negative_top_rejected",
            "$top=-1 is rejected with 400",
            |ctx| async move {
                let resp = ctx.get(&format!("{}?$top=-1", PRODUCTS), &[]).await?;
                assert_status_code(&resp, 400)
            },
        )?;

    Ok(suite)
}
