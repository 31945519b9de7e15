#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use axum::Router;
use chrono::NaiveDateTime;
use excel_io::{ColumnKind, ExcelIoModule, RecordSchema, Ranked, ResponseWrapper, Tabular};
use routekit::context::ConfigProvider;
use routekit::{HostRuntime, Module, ModuleCtx, RegistryBuilder, RestfulModule, RouteTable};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub age: i64,
    pub create_time: NaiveDateTime,
}

impl Tabular for User {
    fn schema() -> RecordSchema {
        RecordSchema::new("User")
            .column("id", "User ID", ColumnKind::Integer)
            .column("username", "Username", ColumnKind::Text)
            .column("email", "Email", ColumnKind::Text)
            .column("age", "Age", ColumnKind::Integer)
            .column("create_time", "Created At", ColumnKind::DateTime)
    }
}

pub fn users(n: i64) -> Vec<User> {
    (1..=n)
        .map(|i| User {
            id: i,
            username: format!("user{i}"),
            email: format!("user{i}@example.com"),
            age: 20 + i,
            create_time: NaiveDateTime::parse_from_str(
                &format!("2024-01-{:02} 09:30:00", i % 28 + 1),
                "%Y-%m-%d %H:%M:%S",
            )
            .unwrap(),
        })
        .collect()
}

/// `{ code, message, data }` envelope used by the test services.
pub struct ApiEnvelope;

impl Ranked for ApiEnvelope {
    fn id(&self) -> &str {
        "api_response"
    }

    fn priority(&self) -> i32 {
        100
    }
}

impl ResponseWrapper for ApiEnvelope {
    fn supports(&self, value: &Value) -> bool {
        value.get("code").is_some() && value.get("data").is_some()
    }

    fn unwrap_data(&self, mut value: Value) -> Value {
        value["data"].take()
    }

    fn wrap_data(&self, value: Value) -> Value {
        json!({"code": 200, "message": "success", "data": value})
    }
}

struct MapConfig(HashMap<String, Value>);

impl ConfigProvider for MapConfig {
    fn get_module_config(&self, module_name: &str) -> Option<&Value> {
        self.0.get(module_name)
    }

    fn get_config_raw(&self, _key: &str) -> Option<Value> {
        None
    }
}

type RegisterFn = dyn Fn(&mut RouteTable) -> anyhow::Result<()> + Send + Sync;

/// A module whose routes are supplied by the test.
pub struct TestApp {
    register: Box<RegisterFn>,
}

impl TestApp {
    pub fn new(register: impl Fn(&mut RouteTable) -> anyhow::Result<()> + Send + Sync + 'static) -> Self {
        Self {
            register: Box::new(register),
        }
    }
}

#[async_trait]
impl Module for TestApp {
    async fn init(&self, _ctx: &ModuleCtx) -> anyhow::Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl RestfulModule for TestApp {
    fn register_rest(&self, _ctx: &ModuleCtx, routes: &mut RouteTable) -> anyhow::Result<()> {
        (self.register)(routes)
    }
}

pub struct Harness {
    pub host: HostRuntime,
    pub router: Router,
    pub excel: Arc<ExcelIoModule>,
}

impl Harness {
    pub async fn start(excel: ExcelIoModule, app: TestApp, excel_cfg: Value) -> Self {
        Self::try_start(excel, app, excel_cfg).await.unwrap()
    }

    pub async fn try_start(
        excel: ExcelIoModule,
        app: TestApp,
        excel_cfg: Value,
    ) -> anyhow::Result<Self> {
        let excel = Arc::new(excel);
        let app = Arc::new(app);

        let mut b = RegistryBuilder::default();
        b.register_core(ExcelIoModule::NAME, &[], excel.clone())
            .register_rest(ExcelIoModule::NAME, excel.clone())
            .register_stateful(ExcelIoModule::NAME, excel.clone());
        b.register_core("app", &[ExcelIoModule::NAME], app.clone())
            .register_rest("app", app);

        let cfg = MapConfig(HashMap::from([(ExcelIoModule::NAME.to_string(), excel_cfg)]));
        let host = HostRuntime::new(
            b.build_topo_sorted()?,
            Arc::new(cfg),
            CancellationToken::new(),
        );
        let router = host.prepare().await?;
        Ok(Self {
            host,
            router,
            excel,
        })
    }

    pub async fn send(&self, req: Request) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }
}

pub async fn body_bytes(resp: Response) -> bytes::Bytes {
    axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap()
}

pub async fn body_json(resp: Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}
