//! `example_users`: a small users module exercising spreadsheet export and import.

use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use chrono::{DateTime, NaiveDateTime};
use excel_io::prelude::*;
use excel_io::{Ranked, ResponseWrapper};
use routekit::{Module, ModuleCtx, RestfulModule, RouteTable};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const MODULE_NAME: &str = "example_users";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub age: i64,
    pub create_time: NaiveDateTime,
}

impl Tabular for UserDto {
    fn schema() -> RecordSchema {
        RecordSchema::new("User")
            .column("id", "User ID", ColumnKind::Integer)
            .column("username", "Username", ColumnKind::Text)
            .column("email", "Email", ColumnKind::Text)
            .column("age", "Age", ColumnKind::Integer)
            .column("create_time", "Created At", ColumnKind::DateTime)
    }
}

/// Standard response envelope of the demo API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            data,
        }
    }
}

/// Unwraps [`ApiResponse`] for exports and wraps bare handler results when rendering JSON.
pub struct ApiResponseWrapper;

impl Ranked for ApiResponseWrapper {
    fn id(&self) -> &str {
        "api_response"
    }

    fn priority(&self) -> i32 {
        100
    }
}

impl ResponseWrapper for ApiResponseWrapper {
    fn supports(&self, value: &Value) -> bool {
        value.get("code").is_some() && value.get("message").is_some() && value.get("data").is_some()
    }

    fn unwrap_data(&self, mut value: Value) -> Value {
        value["data"].take()
    }

    fn wrap_data(&self, value: Value) -> Value {
        json!({"code": 200, "message": "success", "data": value})
    }
}

// 2024-01-01T08:00:00Z
const EPOCH_SECS: i64 = 1_704_096_000;

fn generate_users(count: i64) -> Vec<UserDto> {
    (1..=count)
        .map(|i| UserDto {
            id: i,
            username: format!("user_{i}"),
            email: format!("user_{i}@example.com"),
            age: 18 + i % 50,
            create_time: DateTime::from_timestamp(EPOCH_SECS + i * 3_600, 0)
                .map(|t| t.naive_utc())
                .unwrap_or_default(),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct AgeFilter {
    min_age: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ImportSummary {
    imported: usize,
    usernames: Vec<String>,
}

async fn list_users(_args: RequestArgs) -> Result<ApiResponse<Vec<UserDto>>, Problem> {
    Ok(ApiResponse::success(generate_users(10)))
}

async fn list_users_plain(_args: RequestArgs) -> Result<Vec<UserDto>, Problem> {
    Ok(generate_users(15))
}

async fn list_users_slow(_args: RequestArgs) -> Result<Vec<UserDto>, Problem> {
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(generate_users(100))
}

async fn filter_users(args: RequestArgs) -> Result<ApiResponse<Vec<UserDto>>, Problem> {
    let filter: AgeFilter = args.query()?;
    let users = generate_users(20)
        .into_iter()
        .filter(|u| filter.min_age.is_none_or(|min| u.age >= min))
        .collect();
    Ok(ApiResponse::success(users))
}

async fn import_users(SheetImport(users): SheetImport<UserDto>) -> Json<ApiResponse<ImportSummary>> {
    tracing::info!(count = users.len(), "Users imported");
    Json(ApiResponse::success(ImportSummary {
        imported: users.len(),
        usernames: users.into_iter().map(|u| u.username).collect(),
    }))
}

#[derive(Default)]
pub struct ExampleUsersModule;

#[async_trait]
impl Module for ExampleUsersModule {
    async fn init(&self, _ctx: &ModuleCtx) -> anyhow::Result<()> {
        tracing::info!("Initializing example_users module");
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl RestfulModule for ExampleUsersModule {
    fn register_rest(&self, _ctx: &ModuleCtx, routes: &mut RouteTable) -> anyhow::Result<()> {
        OperationBuilder::get("/example/users")
            .operation_id("example_users.list")
            .summary("List users")
            .tag("example")
            .export_handler(
                ExportSpec::of::<UserDto>().file_name("users").sheet_name("Users"),
                list_users,
            )
            .json_response(200, "Users in the standard envelope")
            .register(routes)?;

        OperationBuilder::get("/example/users/list")
            .operation_id("example_users.list_plain")
            .summary("List users without an envelope")
            .tag("example")
            .export_handler(
                ExportSpec::of::<UserDto>()
                    .path("/example/users/download")
                    .file_name("用户列表"),
                list_users_plain,
            )
            .json_response(200, "Users")
            .register(routes)?;

        OperationBuilder::get("/example/users/async")
            .operation_id("example_users.list_slow")
            .summary("List users; the export runs in the background")
            .tag("example")
            .export_handler(
                ExportSpec::of::<UserDto>()
                    .file_name("users_async")
                    .asynchronous(true),
                list_users_slow,
            )
            .json_response(200, "Users")
            .register(routes)?;

        OperationBuilder::get("/example/users/filtered")
            .operation_id("example_users.filter")
            .summary("Users at or above a minimum age")
            .tag("example")
            .export_handler(
                ExportSpec::of::<UserDto>().file_name("filtered_users"),
                filter_users,
            )
            .json_response(200, "Matching users")
            .problem_response(400, "Malformed query")
            .register(routes)?;

        OperationBuilder::post("/example/users/import")
            .operation_id("example_users.import")
            .summary("Import users from an uploaded spreadsheet")
            .tag("example")
            .import(ImportSpec::of::<UserDto>())
            .handler(import_users)
            .json_response(200, "Import summary")
            .problem_response(400, "Missing upload")
            .problem_response(413, "Upload too large")
            .problem_response(422, "Unreadable spreadsheet")
            .register(routes)?;

        Ok(())
    }
}
