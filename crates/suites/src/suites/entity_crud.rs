//! Entity create, read, update and delete
//!
//! The key of the entity created by `create` flows through suite state to
//! the tests after it; when creation fails those tests skip.

use odata_compliance_harness::assert::{
    assert_header_present, assert_json_field_equals, assert_status_code, assert_status_in,
};
use odata_compliance_harness::{Body, HarnessResult, Method, TestSuite};
use serde_json::json;

use crate::common::{entity_id, spec_section, PROTOCOL_SPEC, PRODUCTS};

pub const TITLE: &str = "Entity CRUD";

const CREATED_ID: &str = "created_id";
const DELETED_ID: &str = "deleted_id";

fn entity_path(id: i64) -> String {
    format!("{}({})", PRODUCTS, id)
}

pub fn suite() -> HarnessResult<TestSuite> {
    let mut suite = TestSuite::new(
        TITLE,
        "Creating, reading, updating and deleting a single entity",
        spec_section(PROTOCOL_SPEC, "sec_DataModification"),
    );

    suite
        .add_test(
            "create",
            "POST to the entity set returns 201 with Location and the new entity",
            |ctx| async move {
                let resp = ctx
                    .post(
                        PRODUCTS,
                        json!({"Name": "Compliance Cheese", "Price": 12.5}),
                        &[],
                    )
                    .await?;
                assert_status_code(&resp, 201)?;
                assert_header_present(&resp, "Location")?;
                let id = entity_id(&resp.json()?)?;
                ctx.log(format!("created {}", entity_path(id)));
                ctx.state().set(CREATED_ID, id)
            },
        )?
        .add_test(
            "read_created",
            "GET on the created key returns the entity as posted",
            |ctx| async move {
                let id: i64 = ctx.state().require(CREATED_ID)?;
                let resp = ctx.get(&entity_path(id), &[]).await?;
                assert_status_code(&resp, 200)?;
                assert_json_field_equals(&resp, "Name", &json!("Compliance Cheese"))
            },
        )?
        .add_test(
            "update_patch",
            "PATCH changes only the given properties",
            |ctx| async move {
                let id: i64 = ctx.state().require(CREATED_ID)?;
                let resp = ctx.patch(&entity_path(id), json!({"Price": 99.5}), &[]).await?;
                assert_status_in(&resp, &[200, 204])?;

                let resp = ctx.get(&entity_path(id), &[]).await?;
                assert_status_code(&resp, 200)?;
                assert_json_field_equals(&resp, "Price", &json!(99.5))?;
                assert_json_field_equals(&resp, "Name", &json!("Compliance Cheese"))
            },
        )?
        .add_test(
            "replace_put",
            "PUT replaces the entity",
            |ctx| async move {
                let id: i64 = ctx.state().require(CREATED_ID)?;
                let resp = ctx
                    .put(
                        &entity_path(id),
                        json!({"ID": id, "Name": "Compliance Gouda", "Price": 7.25}),
                        &[],
                    )
                    .await?;
                assert_status_in(&resp, &[200, 204])?;

                let resp = ctx.get(&entity_path(id), &[]).await?;
                assert_status_code(&resp, 200)?;
                assert_json_field_equals(&resp, "Name", &json!("Compliance Gouda"))
            },
        )?
        .add_test(
            "delete",
            "DELETE returns 204",
            |ctx| async move {
                let id: i64 = ctx.state().require(CREATED_ID)?;
                let resp = ctx.delete(&entity_path(id), &[]).await?;
                assert_status_code(&resp, 204)?;
                ctx.state().remove(CREATED_ID);
                ctx.state().set(DELETED_ID, id)
            },
        )?
        .add_test(
            "read_deleted",
            "The deleted key is gone",
            |ctx| async move {
                let id: i64 = ctx.state().require(DELETED_ID)?;
                let resp = ctx.get(&entity_path(id), &[]).await?;
                assert_status_code(&resp, 404)
            },
        )?
        .add_test(
            "create_malformed",
            "A malformed JSON body is rejected with 400",
            |ctx| async move {
                let resp = ctx
                    .request(
                        Method::Post,
                        PRODUCTS,
                        Body::Text("{\"Name\": ".to_string()),
                        &[("Content-Type", "application/json")],
                    )
                    .await?;
                assert_status_code(&resp, 400)
            },
        )?
        .add_test(
            "missing_entity",
            "GET on a key that never existed returns 404",
            |ctx| async move {
                let resp = ctx.get(&entity_path(i64::from(i32::MAX)), &[]).await?;
                assert_status_code(&resp, 404)
            },
        )?;

    Ok(suite)
}
