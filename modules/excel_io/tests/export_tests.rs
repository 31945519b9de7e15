mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use common::{body_bytes, body_json, users, ApiEnvelope, Harness, TestApp, User};
use excel_io::prelude::*;
use excel_io::{ExcelIoModule, TableCodec, XlsxCodec, XLSX_CONTENT_TYPE};
use http::{header, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

fn decode_users(bytes: &[u8]) -> Vec<User> {
    let rows = XlsxCodec::default().decode(bytes, &User::schema()).unwrap();
    rows.into_iter()
        .map(|r| serde_json::from_value(r).unwrap())
        .collect()
}

#[derive(Debug, Deserialize)]
struct AgeFilter {
    min_age: i64,
}

fn user_routes(routes: &mut routekit::RouteTable) -> anyhow::Result<()> {
    OperationBuilder::get("/users")
        .export_handler(ExportSpec::of::<User>().file_name("users"), |_args| async {
            Ok::<_, Problem>(json!({"code": 200, "message": "success", "data": users(10)}))
        })
        .json_response(200, "Users")
        .register(routes)?;

    OperationBuilder::get("/users/list")
        .export_handler(
            ExportSpec::of::<User>()
                .path("/users/download")
                .file_name("用户列表")
                .sheet_name("Users"),
            |_args| async { Ok::<_, Problem>(users(15)) },
        )
        .json_response(200, "Users")
        .register(routes)?;

    OperationBuilder::get("/users/filtered")
        .export_handler(ExportSpec::of::<User>(), |args: RequestArgs| async move {
            let filter: AgeFilter = args.query()?;
            Ok::<_, Problem>(
                users(10)
                    .into_iter()
                    .filter(|u| u.age >= filter.min_age)
                    .collect::<Vec<_>>(),
            )
        })
        .json_response(200, "Users")
        .register(routes)?;

    OperationBuilder::get("/tenants/{tenant}/users")
        .require_header("X-Tenant")
        .export_handler(ExportSpec::of::<User>(), |args: RequestArgs| async move {
            let tenant = args.path_param("tenant").unwrap_or_default().to_string();
            Ok::<_, Problem>(
                users(3)
                    .into_iter()
                    .map(|mut u| {
                        u.email = format!("{}@{tenant}.example.com", u.username);
                        u
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .json_response(200, "Users")
        .register(routes)?;

    OperationBuilder::get("/users/count")
        .export_handler(ExportSpec::of::<User>(), |_args| async {
            Ok::<_, Problem>(json!({"total": 10}))
        })
        .json_response(200, "Count")
        .register(routes)?;

    Ok(())
}

async fn harness(cfg: Value) -> Harness {
    Harness::start(
        ExcelIoModule::new().with_wrapper(Arc::new(ApiEnvelope)),
        TestApp::new(user_routes),
        cfg,
    )
    .await
}

#[tokio::test]
async fn derived_route_exports_the_handler_records() {
    let h = harness(json!({})).await;

    let resp = h.get("/users/export").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], XLSX_CONTENT_TYPE);
    let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.contains("users.xlsx"), "{disposition}");

    let exported = decode_users(&body_bytes(resp).await);
    assert_eq!(exported, users(10));
}

#[tokio::test]
async fn original_route_renders_json_in_the_envelope() {
    let h = harness(json!({})).await;

    let resp = h.get("/users").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"].as_array().unwrap().len(), 10);

    // plain lists get the envelope too
    let body = body_json(h.get("/users/list").await).await;
    assert_eq!(body["message"], "success");
    assert_eq!(body["data"].as_array().unwrap().len(), 15);
}

#[tokio::test]
async fn override_path_replaces_the_suffix() {
    let h = harness(json!({})).await;

    let resp = h.get("/users/download").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"%E7%94%A8%E6%88%B7%E5%88%97%E8%A1%A8.xlsx\""
    );
    assert_eq!(decode_users(&body_bytes(resp).await).len(), 15);

    assert_eq!(h.get("/users/list/export").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn query_and_path_parameters_reach_the_handler() {
    let h = harness(json!({})).await;

    let resp = h.get("/users/filtered/export?min_age=28").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let ages: Vec<i64> = decode_users(&body_bytes(resp).await)
        .iter()
        .map(|u| u.age)
        .collect();
    assert_eq!(ages, vec![28, 29, 30]);

    let resp = h.get("/users/filtered/export?min_age=old").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = h
        .send(
            Request::builder()
                .uri("/tenants/acme/users/export")
                .header("X-Tenant", "acme")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let exported = decode_users(&body_bytes(resp).await);
    assert_eq!(exported[0].email, "user1@acme.example.com");
}

#[tokio::test]
async fn derived_route_keeps_the_match_conditions() {
    let h = harness(json!({})).await;
    let resp = h.get("/tenants/acme/users/export").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_list_result_is_a_contract_violation() {
    let h = harness(json!({})).await;

    let resp = h.get("/users/count/export").await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let problem = body_json(resp).await;
    assert_eq!(problem["code"], "contract_violation");

    // the original route is unaffected
    assert_eq!(h.get("/users/count").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn configured_defaults_name_the_file() {
    let h = harness(json!({"default_file_name": "report", "default_sheet_name": "Data"})).await;
    let resp = h.get("/users/filtered/export?min_age=0").await;
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"report.xlsx\""
    );
}

#[tokio::test]
async fn disabled_module_leaves_routes_alone() {
    let h = harness(json!({"enabled": false})).await;

    assert_eq!(h.get("/users/export").await.status(), StatusCode::NOT_FOUND);

    let body = body_json(h.get("/users/list").await).await;
    assert_eq!(body.as_array().map(Vec::len), Some(15));
}

#[tokio::test]
async fn unknown_config_keys_fail_init() {
    let result = Harness::try_start(
        ExcelIoModule::new(),
        TestApp::new(user_routes),
        json!({"max_file_sise": 1}),
    )
    .await;
    assert!(result.is_err());
}
