//! `$filter` system query option

use odata_compliance_harness::assert::assert_status_code;
use odata_compliance_harness::{HarnessResult, TestError, TestSuite};

use crate::common::{
    get_collection, number, spec_section, string_literal, text, PRODUCTS, URL_SPEC,
};

pub const TITLE: &str = "Query Option $filter";

const SAMPLE_NAME: &str = "sample_name";

pub fn suite() -> HarnessResult<TestSuite> {
    let mut suite = TestSuite::new(
        TITLE,
        "Comparison, logical and string functions in $filter expressions",
        spec_section(URL_SPEC, "sec_SystemQueryOptionfilter"),
    );

    suite
        .add_test(
            "filter_gt",
            "Price gt 100 returns only rows priced above 100",
            |ctx| async move {
                let items = get_collection(&ctx, &format!("{}?$filter=Price gt 100", PRODUCTS)).await?;
                for item in &items {
                    let price = number(item, "Price")?;
                    if price <= 100.0 {
                        return Err(TestError::assertion(format!(
                            "expected Price > 100, got {}",
                            price
                        )));
                    }
                }
                ctx.log(format!("{} rows matched", items.len()));
                Ok(())
            },
        )?
        .add_test(
            "filter_and",
            "Price ge 10 and Price le 200 bounds both sides",
            |ctx| async move {
                let path = format!("{}?$filter=Price ge 10 and Price le 200", PRODUCTS);
                for item in get_collection(&ctx, &path).await? {
                    let price = number(&item, "Price")?;
                    if !(10.0..=200.0).contains(&price) {
                        return Err(TestError::assertion(format!(
                            "expected 10 <= Price <= 200, got {}",
                            price
                        )));
                    }
                }
                Ok(())
            },
        )?
        .add_test(
            "sample_entity",
            "Pick an existing name to filter on",
            |ctx| async move {
                let items = get_collection(&ctx, &format!("{}?$top=1", PRODUCTS)).await?;
                let first = items
                    .first()
                    .ok_or_else(|| ctx.skip(format!("{} is empty", PRODUCTS)))?;
                ctx.state().set(SAMPLE_NAME, text(first, "Name")?)
            },
        )?
        .add_test(
            "filter_eq_string",
            "Name eq '<sample>' returns only that name and at least one row",
            |ctx| async move {
                let name: String = ctx.state().require(SAMPLE_NAME)?;
                let path = format!("{}?$filter=Name eq {}", PRODUCTS, string_literal(&name));
                let items = get_collection(&ctx, &path).await?;
                if items.is_empty() {
                    return Err(TestError::assertion(format!("expected a row named '{}'", name)));
                }
                for item in &items {
                    let found = text(item, "Name")?;
                    if found != name {
                        return Err(TestError::assertion(format!(
                            "expected Name '{}', got '{}'",
                            name, found
                        )));
                    }
                }
                Ok(())
            },
        )?
        .add_test(
            "filter_contains",
            "contains(Name, ...) matches substrings of the sample name",
            |ctx| async move {
                let name: String = ctx.state().require(SAMPLE_NAME)?;
                let needle: String = name.chars().take(2).collect();
                let path = format!(
                    "{}?$filter=contains(Name,{})",
                    PRODUCTS,
                    string_literal(&needle)
                );
                let items = get_collection(&ctx, &path).await?;
                if items.is_empty() {
                    return Err(TestError::assertion(format!(
                        "expected '{}' to match at least '{}'",
                        needle, name
                    )));
                }
                for item in &items {
                    let found = text(item, "Name")?;
                    if !found.contains(&needle) {
                        return Err(TestError::assertion(format!(
                            "expected Name containing '{}', got '{}'",
                            needle, found
                        )));
                    }
                }
                Ok(())
            },
        )?
        .add_test(
            "invalid_expression",
            "A malformed expression is rejected with 400",
            |ctx| async move {
                let resp = ctx
                    .get(&format!("{}?$filter=Price gtx 100", PRODUCTS), &[])
                    .await?;
                assert_status_code(&resp, 400)
            },
        )?
        .add_test(
            "unknown_property",
            "Filtering on a property the type lacks is rejected with 400",
            |ctx| async move {
                let resp = ctx
                    .get(&format!("{}?$filter=NoSuchProperty eq 1", PRODUCTS), &[])
                    .await?;
                assert_status_code(&resp, 400)
            },
        )?;

    Ok(suite)
}
