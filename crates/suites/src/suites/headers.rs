//! Header and version negotiation

use odata_compliance_harness::assert::{
    assert_collection, assert_json_content_type, assert_odata_version, assert_status_code,
};
use odata_compliance_harness::{HarnessResult, TestError, TestSuite};

use crate::common::{skip_if_unsupported, spec_section, PROTOCOL_SPEC, PRODUCTS};

pub const TITLE: &str = "Headers and Version Negotiation";

pub fn suite() -> HarnessResult<TestSuite> {
    let mut suite = TestSuite::new(
        TITLE,
        "OData-Version, OData-MaxVersion, Accept and metadata level handling",
        spec_section(PROTOCOL_SPEC, "sec_HeaderFields"),
    );

    suite
        .add_test(
            "odata_version_header",
            "Responses carry OData-Version 4.0 or 4.01",
            |ctx| async move {
                let resp = ctx.get(PRODUCTS, &[]).await?;
                assert_status_code(&resp, 200)?;
                assert_odata_version(&resp)
            },
        )?
        .add_test(
            "json_content_type",
            "Entity set responses are application/json",
            |ctx| async move {
                let resp = ctx.get(PRODUCTS, &[]).await?;
                assert_status_code(&resp, 200)?;
                assert_json_content_type(&resp)
            },
        )?
        .add_test(
            "max_version_honoured",
            "With OData-MaxVersion 4.0 the service answers as 4.0",
            |ctx| async move {
                let resp = ctx.get(PRODUCTS, &[("OData-MaxVersion", "4.0")]).await?;
                assert_status_code(&resp, 200)?;
                match resp.header("OData-Version").map(str::trim) {
                    Some("4.0") => Ok(()),
                    other => Err(TestError::assertion(format!(
                        "expected OData-Version 4.0, got {:?}",
                        other
                    ))),
                }
            },
        )?
        .add_test(
            "unsupported_version_rejected",
            "A request declaring an unknown OData-Version is rejected with 400",
            |ctx| async move {
                let resp = ctx.get(PRODUCTS, &[("OData-Version", "99.0")]).await?;
                assert_status_code(&resp, 400)
            },
        )?
        .add_test(
            "metadata_none",
            "odata.metadata=none omits control information",
            |ctx| async move {
                let resp = ctx
                    .get(PRODUCTS, &[("Accept", "application/json;odata.metadata=none")])
                    .await?;
                skip_if_unsupported(&resp, "odata.metadata=none")?;
                assert_status_code(&resp, 200)?;
                let body = resp.text();
                if body.contains("@odata.context") {
                    return Err(TestError::assertion(
                        "expected no @odata.context with odata.metadata=none",
                    ));
                }
                Ok(())
            },
        )?
        .add_test(
            "metadata_full",
            "odata.metadata=full annotates every entity with @odata.id",
            |ctx| async move {
                let resp = ctx
                    .get(PRODUCTS, &[("Accept", "application/json;odata.metadata=full")])
                    .await?;
                skip_if_unsupported(&resp, "odata.metadata=full")?;
                assert_status_code(&resp, 200)?;
                for item in assert_collection(&resp)? {
                    if item.get("@odata.id").is_none() {
                        return Err(TestError::assertion(format!(
                            "expected @odata.id with full metadata in {}",
                            item
                        )));
                    }
                }
                Ok(())
            },
        )?
        .add_test(
            "unacceptable_format",
            "An Accept the service cannot produce yields 406",
            |ctx| async move {
                let resp = ctx.get(PRODUCTS, &[("Accept", "application/x-unknown-format")]).await?;
                assert_status_code(&resp, 406)
            },
        )?;

    Ok(suite)
}
