//! Derived export routes: a GET twin of every exporting operation.

use std::sync::Arc;

use http::Method;
use routekit::api::ResponseSpec;
use routekit::{RouteDescriptor, RouteTable};

use crate::domain::binding::ExportBinding;
use crate::domain::codec::XLSX_CONTENT_TYPE;

const EXPORT_SUFFIX: &str = "export";

/// Attached to a derived route; links it back to the operation it mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedRoute {
    pub original_path: String,
    pub derived_path: String,
}

/// `override_path` verbatim when non-empty, else `<original>/export` with exactly one `/`.
pub fn derive_path(original: &str, override_path: &str) -> String {
    if !override_path.is_empty() {
        return override_path.to_string();
    }
    if original.ends_with('/') {
        format!("{original}{EXPORT_SUFFIX}")
    } else {
        format!("{original}/{EXPORT_SUFFIX}")
    }
}

pub fn derive_route(original: &RouteDescriptor, override_path: &str) -> DerivedRoute {
    DerivedRoute {
        original_path: original.path().to_string(),
        derived_path: derive_path(original.path(), override_path),
    }
}

/// An operation with an export binding that is not itself a derived route.
pub fn is_exporting(route: &RouteDescriptor) -> bool {
    route.spec.attachment::<ExportBinding>().is_some()
        && route.spec.attachment::<DerivedRoute>().is_none()
}

/// Outcome of one derivation pass.
#[derive(Debug, Default)]
pub struct DerivationReport {
    /// `(original handler id, derived route)`
    pub registered: Vec<(String, DerivedRoute)>,
    /// `(original handler id, reason)`
    pub skipped: Vec<(String, String)>,
}

/// Register a derived GET route for every operation carrying an [`ExportBinding`].
///
/// Must run on the complete route table. The derived route reuses the original
/// endpoint and copies its match conditions. A route that cannot be registered
/// is logged and skipped; the others still get theirs.
pub fn derive_export_routes(routes: &mut RouteTable) -> DerivationReport {
    let candidates: Vec<(Arc<RouteDescriptor>, ExportBinding)> = routes
        .descriptors()
        .filter(|d| is_exporting(d))
        .filter_map(|d| {
            d.spec
                .attachment::<ExportBinding>()
                .map(|b| (d.clone(), b.clone()))
        })
        .collect();

    let mut report = DerivationReport::default();
    for (original, binding) in candidates {
        let derived = derive_route(&original, binding.spec().path.as_deref().unwrap_or(""));

        let mut spec = original.spec.clone();
        spec.method = Method::GET;
        spec.path = derived.derived_path.clone();
        spec.handler_id = format!("{}:export", original.handler_id());
        spec.operation_id = original
            .spec
            .operation_id
            .as_ref()
            .map(|id| format!("{id}.export"));
        spec.summary = Some(format!("Spreadsheet export of {}", original.path()));
        spec.responses = vec![ResponseSpec {
            status: 200,
            content_type: XLSX_CONTENT_TYPE,
            description: "Spreadsheet attachment".to_string(),
        }];
        spec.attachments.insert(derived.clone());

        match routes.register(RouteDescriptor::new(spec, original.endpoint.clone())) {
            Ok(()) => {
                tracing::info!(
                    original = %derived.original_path,
                    derived = %derived.derived_path,
                    "Export route registered"
                );
                report
                    .registered
                    .push((original.handler_id().to_string(), derived));
            }
            Err(e) => {
                tracing::error!(
                    handler_id = %original.handler_id(),
                    derived = %derived.derived_path,
                    error = %e,
                    "Failed to register export route"
                );
                report
                    .skipped
                    .push((original.handler_id().to_string(), e.to_string()));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::binding::{data_handler, ExportSpec, RequestArgs};
    use crate::domain::record::RecordSchema;
    use routekit::Problem;

    #[test]
    fn suffix_is_appended_with_one_slash() {
        assert_eq!(derive_path("/users", ""), "/users/export");
        assert_eq!(derive_path("/users/", ""), "/users/export");
        assert_eq!(derive_path("/", ""), "/export");
        assert_eq!(derive_path("/users/{id}/orders", ""), "/users/{id}/orders/export");
    }

    #[test]
    fn override_is_used_verbatim() {
        assert_eq!(derive_path("/users/list", "/users/download"), "/users/download");
        assert_eq!(derive_path("/a", "/b/{id}/x"), "/b/{id}/x");
    }

    fn exporting(method: Method, path: &str, spec: ExportSpec) -> RouteDescriptor {
        let binding = ExportBinding::new(
            spec,
            data_handler(|_args: RequestArgs| async { Ok::<_, Problem>(Vec::<u8>::new()) }),
        );
        let mut op = routekit::OperationBuilder::new(method, path)
            .require_header("X-Tenant")
            .attach(binding)
            .handler(|| async { "ok" })
            .json_response(200, "ok")
            .build();
        op.spec.operation_id = Some("users.list".into());
        op
    }

    fn spec() -> ExportSpec {
        ExportSpec::with_schema(RecordSchema::new("Row"))
    }

    #[test]
    fn derived_route_copies_conditions_and_is_get_only() {
        let mut table = RouteTable::new();
        table.register(exporting(Method::GET, "/users", spec())).unwrap();
        table
            .register(
                routekit::OperationBuilder::get("/plain")
                    .handler(|| async { "ok" })
                    .json_response(200, "ok")
                    .build(),
            )
            .unwrap();

        let report = derive_export_routes(&mut table);
        assert_eq!(report.registered.len(), 1);
        assert!(report.skipped.is_empty());
        assert_eq!(table.len(), 3);

        let derived = table.find(&Method::GET, "/users/export").unwrap();
        assert_eq!(derived.spec.conditions.headers, vec!["X-Tenant".to_string()]);
        assert_eq!(derived.spec.operation_id.as_deref(), Some("users.list.export"));
        assert_eq!(
            derived.spec.attachment::<DerivedRoute>().unwrap().original_path,
            "/users"
        );

        // a second pass does not derive from derived routes or re-register
        let again = derive_export_routes(&mut table);
        assert!(again.registered.is_empty());
        assert_eq!(again.skipped.len(), 1);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn one_failure_does_not_stop_the_others() {
        let mut table = RouteTable::new();
        // override collides with an existing route
        table
            .register(
                routekit::OperationBuilder::get("/taken")
                    .handler(|| async { "ok" })
                    .json_response(200, "ok")
                    .build(),
            )
            .unwrap();
        table
            .register(exporting(Method::GET, "/a", spec().path("/taken")))
            .unwrap();
        table
            .register(exporting(Method::POST, "/b", spec()))
            .unwrap();

        let report = derive_export_routes(&mut table);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.registered.len(), 1);
        assert!(table.find(&Method::GET, "/b/export").is_some());
    }

    #[test]
    fn malformed_override_is_skipped() {
        let mut table = RouteTable::new();
        table
            .register(exporting(Method::GET, "/a", spec().path("no-slash")))
            .unwrap();
        let report = derive_export_routes(&mut table);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn derive_route_links_back_to_the_original() {
        let d = exporting(Method::POST, "/x/", spec());
        assert_eq!(
            derive_route(&d, ""),
            DerivedRoute {
                original_path: "/x/".into(),
                derived_path: "/x/export".into(),
            }
        );
    }
}
