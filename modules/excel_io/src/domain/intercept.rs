//! Route-layer middleware that tells export requests apart from normal ones.
//!
//! The same endpoint serves an exporting operation and its derived route. The
//! middleware flags a request that arrived on the derived path with an
//! [`ExportInvocation`]; the endpoint then runs the export sequence instead of
//! rendering JSON.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, MatchedPath, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::MethodRouter;
use axum::Extension;
use routekit::api::{PathMatcher, PathTemplate, RouteLayer};
use routekit::RouteTable;

use crate::domain::binding::{ImportSpec, RequestArgs};
use crate::domain::deriver::{derive_export_routes, DerivationReport, DerivedRoute};
use crate::domain::runtime::InterchangeRuntime;

/// Request extension: this request must produce an export.
#[derive(Debug, Clone)]
pub struct ExportInvocation {
    pub args: RequestArgs,
}

#[derive(Debug)]
struct DerivedMatch {
    route: DerivedRoute,
    matcher: PathMatcher,
}

#[derive(Clone)]
struct InterceptState {
    runtime: Arc<InterchangeRuntime>,
    derived: Option<Arc<DerivedMatch>>,
}

async fn intercept(State(state): State<InterceptState>, mut req: Request, next: Next) -> Response {
    req.extensions_mut().insert(state.runtime.clone());

    if let Some(derived) = &state.derived {
        if is_derived_request(&req, derived) {
            let (mut parts, body) = req.into_parts();
            let args = RequestArgs::capture(&mut parts).await;
            tracing::debug!(
                derived = %derived.route.derived_path,
                uri = %parts.uri,
                "Export request intercepted"
            );
            parts.extensions.insert(ExportInvocation { args });
            req = Request::from_parts(parts, body);
        }
    }

    next.run(req).await
}

/// The matched template decides; without one the concrete path is matched against the derived template.
fn is_derived_request(req: &Request, derived: &DerivedMatch) -> bool {
    match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str() == derived.route.derived_path,
        None => derived.matcher.matches(req.uri().path()),
    }
}

fn intercept_layer(state: InterceptState) -> RouteLayer {
    Arc::new(move |mr: MethodRouter| {
        mr.route_layer(middleware::from_fn_with_state(state.clone(), intercept))
    })
}

/// Derive export routes and layer every exporting operation, original and derived.
pub fn install_export_interception(
    routes: &mut RouteTable,
    runtime: &Arc<InterchangeRuntime>,
) -> DerivationReport {
    let report = derive_export_routes(routes);

    for (handler_id, route) in &report.registered {
        let derived = match PathTemplate::parse(&route.derived_path).and_then(|t| t.matcher()) {
            Ok(matcher) => Some(Arc::new(DerivedMatch {
                route: route.clone(),
                matcher,
            })),
            Err(e) => {
                tracing::error!(derived = %route.derived_path, error = %e, "Cannot match derived route");
                None
            }
        };
        let derived_id = format!("{handler_id}:export");
        routes.layer_where(
            |d| d.handler_id() == handler_id.as_str() || d.handler_id() == derived_id,
            intercept_layer(InterceptState {
                runtime: runtime.clone(),
                derived,
            }),
        );
    }

    // no derived twin, but the original still renders through the wrapper chain
    for (handler_id, _) in &report.skipped {
        routes.layer_where(
            |d| d.handler_id() == handler_id.as_str(),
            intercept_layer(InterceptState {
                runtime: runtime.clone(),
                derived: None,
            }),
        );
    }

    report
}

/// Hand the runtime to import routes and lift axum's body limit there.
///
/// The materializer bounds uploads itself with `max_file_size`.
pub fn install_import_support(routes: &mut RouteTable, runtime: &Arc<InterchangeRuntime>) -> usize {
    let runtime = runtime.clone();
    routes.layer_where(
        |d| d.spec.attachment::<ImportSpec>().is_some(),
        Arc::new(move |mr: MethodRouter| {
            mr.layer::<_, Infallible>(Extension(runtime.clone()))
                .layer::<_, Infallible>(DefaultBodyLimit::disable())
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExcelIoConfig;
    use crate::domain::binding::{data_handler, ExportBinding, ExportSpec};
    use crate::domain::record::RecordSchema;
    use axum::body::Body;
    use http::{Method, StatusCode};
    use routekit::{OperationBuilder, Problem};
    use tower::ServiceExt;

    async fn probe(req: Request) -> String {
        let flagged = req.extensions().get::<ExportInvocation>().is_some();
        let runtime = req.extensions().get::<Arc<InterchangeRuntime>>().is_some();
        format!("flagged={flagged} runtime={runtime}")
    }

    fn exporting(path: &str, spec: ExportSpec) -> OperationBuilder<routekit::api::Present, routekit::api::Present> {
        OperationBuilder::get(path)
            .attach(ExportBinding::new(
                spec,
                data_handler(|_args| async { Ok::<_, Problem>(Vec::<u8>::new()) }),
            ))
            .handler(probe)
            .json_response(200, "ok")
    }

    async fn call(router: &axum::Router, uri: &str) -> (StatusCode, String) {
        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn only_the_derived_route_is_flagged() {
        let runtime = Arc::new(InterchangeRuntime::new(ExcelIoConfig::default()));
        let mut routes = RouteTable::new();
        exporting("/users/{id}/orders", ExportSpec::with_schema(RecordSchema::new("Order")))
            .register(&mut routes)
            .unwrap();
        exporting(
            "/users",
            ExportSpec::with_schema(RecordSchema::new("User")).path("/users/download"),
        )
        .register(&mut routes)
        .unwrap();

        let report = install_export_interception(&mut routes, &runtime);
        assert_eq!(report.registered.len(), 2);
        let router = routes.into_router().unwrap();

        assert_eq!(call(&router, "/users/7/orders").await.1, "flagged=false runtime=true");
        assert_eq!(
            call(&router, "/users/7/orders/export").await.1,
            "flagged=true runtime=true"
        );
        assert_eq!(call(&router, "/users").await.1, "flagged=false runtime=true");
        assert_eq!(call(&router, "/users/download").await.1, "flagged=true runtime=true");
        assert_eq!(call(&router, "/users/export").await.0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn concrete_path_is_matched_without_a_matched_template() {
        let derived = DerivedMatch {
            route: DerivedRoute {
                original_path: "/a/{id}".into(),
                derived_path: "/a/{id}/export".into(),
            },
            matcher: PathTemplate::parse("/a/{id}/export")
                .unwrap()
                .matcher()
                .unwrap(),
        };
        let req = Request::builder().uri("/a/42/export").body(Body::empty()).unwrap();
        assert!(is_derived_request(&req, &derived));
        let req = Request::builder().uri("/a/42").body(Body::empty()).unwrap();
        assert!(!is_derived_request(&req, &derived));
    }

    #[tokio::test]
    async fn import_routes_get_the_runtime() {
        let runtime = Arc::new(InterchangeRuntime::new(ExcelIoConfig::default()));
        let mut routes = RouteTable::new();
        OperationBuilder::post("/upload")
            .attach(ImportSpec::with_schema(RecordSchema::new("Row")))
            .handler(probe)
            .json_response(200, "ok")
            .register(&mut routes)
            .unwrap();
        OperationBuilder::post("/plain")
            .handler(probe)
            .json_response(200, "ok")
            .register(&mut routes)
            .unwrap();
        assert_eq!(install_import_support(&mut routes, &runtime), 1);
        let router = routes.into_router().unwrap();

        let resp = router
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/upload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"flagged=false runtime=true");
    }
}
