//! Metadata document: CSDL describing the service's model

use odata_compliance_harness::assert::{
    assert_body_contains, assert_header_contains, assert_json_content_type, assert_status_code,
};
use odata_compliance_harness::{HarnessResult, TestError, TestSuite};
use serde_json::Value;

use crate::common::{skip_if_unsupported, spec_section, CSDL_XML_SPEC, PRODUCTS};

pub const TITLE: &str = "Metadata Document";

const XML: &[(&str, &str)] = &[("Accept", "application/xml")];

pub fn suite() -> HarnessResult<TestSuite> {
    let mut suite = TestSuite::new(
        TITLE,
        "$metadata returns a well-formed CSDL XML document describing the model",
        spec_section(CSDL_XML_SPEC, "sec_CSDLXMLDocument"),
    );

    suite
        .add_test(
            "metadata_xml",
            "GET $metadata returns 200 with an XML content type",
            |ctx| async move {
                let resp = ctx.get("$metadata", XML).await?;
                assert_status_code(&resp, 200)?;
                assert_header_contains(&resp, "Content-Type", "application/xml")
            },
        )?
        .add_test(
            "edmx_root",
            "The document root is edmx:Edmx with a v4 Version attribute",
            |ctx| async move {
                let resp = ctx.get("$metadata", XML).await?;
                assert_status_code(&resp, 200)?;
                assert_body_contains(&resp, "<edmx:Edmx")?;
                let body = resp.text();
                if body.contains("Version=\"4.0\"") || body.contains("Version=\"4.01\"") {
                    Ok(())
                } else {
                    Err(TestError::assertion("expected edmx:Edmx Version of 4.0 or 4.01"))
                }
            },
        )?
        .add_test(
            "data_services",
            "edmx:DataServices holds at least one Schema",
            |ctx| async move {
                let resp = ctx.get("$metadata", XML).await?;
                assert_status_code(&resp, 200)?;
                assert_body_contains(&resp, "<edmx:DataServices")?;
                assert_body_contains(&resp, "<Schema")
            },
        )?
        .add_test(
            "entity_container",
            "A schema declares the entity container with the reference entity set",
            |ctx| async move {
                let resp = ctx.get("$metadata", XML).await?;
                assert_status_code(&resp, 200)?;
                assert_body_contains(&resp, "<EntityContainer")?;
                assert_body_contains(&resp, &format!("<EntitySet Name=\"{}\"", PRODUCTS))
            },
        )?
        .add_test(
            "entity_type_key",
            "Entity types declare their key properties",
            |ctx| async move {
                let resp = ctx.get("$metadata", XML).await?;
                assert_status_code(&resp, 200)?;
                assert_body_contains(&resp, "<EntityType")?;
                assert_body_contains(&resp, "<Key>")?;
                assert_body_contains(&resp, "<PropertyRef")
            },
        )?
        .add_test(
            "metadata_json",
            "CSDL JSON, when offered, carries $Version and $EntityContainer",
            |ctx| async move {
                let resp = ctx.get("$metadata?$format=application/json", &[]).await?;
                skip_if_unsupported(&resp, "CSDL JSON")?;
                assert_status_code(&resp, 200)?;
                assert_json_content_type(&resp)?;
                let doc: Value = resp.json()?;
                for member in ["$Version", "$EntityContainer"] {
                    if doc.get(member).is_none() {
                        return Err(TestError::assertion(format!(
                            "expected CSDL JSON member '{}'",
                            member
                        )));
                    }
                }
                Ok(())
            },
        )?;

    Ok(suite)
}
