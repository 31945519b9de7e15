//! Route table: the complete set of registered operations, kept open until the
//! router is built so that modules can inspect and extend each other's routes.
use axum::routing::{MethodFilter, MethodRouter};
use axum::{Extension, Router};
use http::Method;
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;

use crate::api::conditions::conditions_guard;
use crate::api::operation_builder::{Endpoint, OperationSpec};
use crate::api::path_template::{PathTemplate, TemplateError};

/// A route layer transforming the bound method router (middleware, extensions, ...).
pub type RouteLayer = Arc<dyn Fn(MethodRouter) -> MethodRouter + Send + Sync>;

/// Immutable description of a registered operation plus the endpoint serving it.
#[derive(Clone, Debug)]
pub struct RouteDescriptor {
    pub spec: OperationSpec,
    pub endpoint: Endpoint,
}

impl RouteDescriptor {
    pub fn new(spec: OperationSpec, endpoint: Endpoint) -> Self {
        Self { spec, endpoint }
    }

    pub fn method(&self) -> &Method {
        &self.spec.method
    }

    pub fn path(&self) -> &str {
        &self.spec.path
    }

    pub fn handler_id(&self) -> &str {
        &self.spec.handler_id
    }
}

/// The descriptor of the route that matched the current request.
///
/// Inserted into request extensions by the router built from a [`RouteTable`].
#[derive(Clone, Debug)]
pub struct RouteInfo(pub Arc<RouteDescriptor>);

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    InvalidTemplate(#[from] TemplateError),
    #[error("duplicate route {method} {path} (already registered as '{existing}')")]
    DuplicateRoute {
        method: Method,
        path: String,
        existing: String,
    },
    #[error("duplicate handler id '{0}'")]
    DuplicateHandler(String),
    #[error("path '{path}' binds variable '{name}' where '{existing_path}' binds '{existing_name}'")]
    VariableConflict {
        path: String,
        name: String,
        existing_path: String,
        existing_name: String,
    },
    #[error("unsupported HTTP method {0}")]
    UnsupportedMethod(Method),
}

struct Entry {
    descriptor: Arc<RouteDescriptor>,
    template: PathTemplate,
    layers: Vec<RouteLayer>,
}

/// Registered operations in registration order.
#[derive(Default)]
pub struct RouteTable {
    entries: Vec<Entry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a descriptor. The first registration wins; conflicting ones are rejected.
    pub fn register(&mut self, descriptor: RouteDescriptor) -> Result<(), RouteError> {
        let template = PathTemplate::parse(descriptor.path())?;
        MethodFilter::try_from(descriptor.method().clone())
            .map_err(|_| RouteError::UnsupportedMethod(descriptor.method().clone()))?;

        for e in &self.entries {
            if e.descriptor.handler_id() == descriptor.handler_id() {
                return Err(RouteError::DuplicateHandler(
                    descriptor.handler_id().to_string(),
                ));
            }
            if e.descriptor.method() == descriptor.method()
                && e.template.collision_key() == template.collision_key()
            {
                return Err(RouteError::DuplicateRoute {
                    method: descriptor.method().clone(),
                    path: descriptor.path().to_string(),
                    existing: e.descriptor.path().to_string(),
                });
            }
            if let Some((existing_name, name)) = e.template.variable_conflict(&template) {
                return Err(RouteError::VariableConflict {
                    path: descriptor.path().to_string(),
                    name,
                    existing_path: e.descriptor.path().to_string(),
                    existing_name,
                });
            }
        }

        tracing::debug!(
            handler_id = %descriptor.handler_id(),
            method = %descriptor.method(),
            path = %descriptor.path(),
            "Registered route"
        );
        self.entries.push(Entry {
            descriptor: Arc::new(descriptor),
            template,
            layers: Vec::new(),
        });
        Ok(())
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<RouteDescriptor>> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Look up a route by method and exact template string.
    pub fn find(&self, method: &Method, path: &str) -> Option<&Arc<RouteDescriptor>> {
        self.descriptors()
            .find(|d| d.method() == method && d.path() == path)
    }

    /// Add a layer to every route accepted by `pred`; returns how many routes were layered.
    ///
    /// Layers apply in insertion order, so the last added one runs first.
    pub fn layer_where(
        &mut self,
        pred: impl Fn(&RouteDescriptor) -> bool,
        layer: RouteLayer,
    ) -> usize {
        let mut n = 0;
        for e in self.entries.iter_mut().filter(|e| pred(&e.descriptor)) {
            e.layers.push(layer.clone());
            n += 1;
        }
        n
    }

    /// Freeze the table into an axum router.
    ///
    /// Each route gets its own layers, then the match-condition guard, then a
    /// [`RouteInfo`] extension as the outermost layer.
    pub fn into_router(self) -> Result<Router, RouteError> {
        let mut router = Router::new();
        for e in self.entries {
            let mut mr = e.descriptor.endpoint.bind(e.descriptor.method())?;
            for layer in &e.layers {
                mr = layer(mr);
            }
            let conditions = &e.descriptor.spec.conditions;
            if !conditions.is_empty() {
                mr = mr.route_layer(axum::middleware::from_fn_with_state(
                    Arc::new(conditions.clone()),
                    conditions_guard,
                ));
            }
            mr = mr.layer::<_, Infallible>(Extension(RouteInfo(e.descriptor.clone())));
            router = router.route(e.template.as_str(), mr);
        }
        Ok(router)
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes: Vec<String> = self
            .entries
            .iter()
            .map(|e| format!("{} {}", e.descriptor.method(), e.descriptor.path()))
            .collect();
        f.debug_struct("RouteTable").field("routes", &routes).finish()
    }
}
