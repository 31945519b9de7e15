//! Type-safe API operation builder with compile-time guarantees
//!
//! This module implements a type-state builder pattern that ensures:
//! - `register()` cannot be called unless a handler is set
//! - `register()` cannot be called unless at least one response is declared
//! - Descriptive methods remain available at any stage
//! - Registration reports template and duplicate problems as `RouteError` instead of panicking
//! - Typed attachments let other modules hang metadata on an operation
//!   (`attach`) and read it back from the route table later
//! - The handler is kept as an [`Endpoint`] factory, so the same handler can be
//!   bound again on a different path or method after registration

use axum::handler::Handler;
use axum::routing::{MethodFilter, MethodRouter};
use http::{Extensions, Method};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::api::conditions::MatchConditions;
use crate::api::problem;
use crate::api::route_table::{RouteDescriptor, RouteError, RouteTable};

/// Type-state markers for compile-time enforcement
pub mod state {
    /// Marker for missing required components
    #[derive(Debug, Clone, Copy)]
    pub struct Missing;

    /// Marker for present required components
    #[derive(Debug, Clone, Copy)]
    pub struct Present;
}

/// Internal trait mapping handler state to the concrete endpoint slot type.
/// For `Missing` there is no endpoint; for `Present` it is an [`Endpoint`].
/// Private sealed trait to enforce the implementation is only visible within this module.
mod sealed {
    pub trait Sealed {}
}

pub trait HandlerSlot: sealed::Sealed {
    type Slot;
}

impl sealed::Sealed for Missing {}
impl sealed::Sealed for Present {}

impl HandlerSlot for Missing {
    type Slot = ();
}
impl HandlerSlot for Present {
    type Slot = Endpoint;
}

pub use state::{Missing, Present};

type BindFn = dyn Fn(MethodFilter) -> MethodRouter + Send + Sync;

/// A handler captured at registration time that can be bound to any method filter.
#[derive(Clone)]
pub struct Endpoint(Arc<BindFn>);

impl Endpoint {
    pub fn from_handler<F, T>(handler: F) -> Self
    where
        F: Handler<T, ()>,
        T: 'static,
    {
        Self(Arc::new(move |filter| axum::routing::on(filter, handler.clone())))
    }

    /// Wrap an arbitrary binding function (useful when the handler needs per-route state).
    pub fn from_fn(bind: impl Fn(MethodFilter) -> MethodRouter + Send + Sync + 'static) -> Self {
        Self(Arc::new(bind))
    }

    /// Bind the endpoint to a single HTTP method.
    pub fn bind(&self, method: &Method) -> Result<MethodRouter, RouteError> {
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| RouteError::UnsupportedMethod(method.clone()))?;
        Ok((self.0)(filter))
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Endpoint(..)")
    }
}

/// Response specification for API operations
#[derive(Clone, Debug)]
pub struct ResponseSpec {
    pub status: u16,
    pub content_type: &'static str,
    pub description: String,
}

/// Operation metadata collected by the builder.
#[derive(Clone, Debug)]
pub struct OperationSpec {
    pub method: Method,
    pub path: String,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub conditions: MatchConditions,
    pub responses: Vec<ResponseSpec>,
    /// Internal handler id; unique across the route table
    pub handler_id: String,
    /// Typed metadata other modules can attach and look up later
    pub attachments: Extensions,
}

impl OperationSpec {
    pub fn attachment<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.attachments.get::<T>()
    }
}

/// Type-safe operation builder with compile-time guarantees.
///
/// Generic parameters:
/// - `H`: Handler state (Missing | Present)
/// - `R`: Response state (Missing | Present)
pub struct OperationBuilder<H = Missing, R = Missing>
where
    H: HandlerSlot,
{
    spec: OperationSpec,
    endpoint: <H as HandlerSlot>::Slot,
    _has_handler: PhantomData<H>,
    _has_response: PhantomData<R>,
}

// -------------------------------------------------------------------------------------------------
// Constructors: starts with both handler and response missing
// -------------------------------------------------------------------------------------------------
impl OperationBuilder<Missing, Missing> {
    /// Create a new operation builder with an HTTP method and path
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path_str = path.into();
        let handler_id = format!(
            "{}:{}",
            method.as_str().to_lowercase(),
            path_str.replace(['/', '{', '}', '*'], "_")
        );

        Self {
            spec: OperationSpec {
                method,
                path: path_str,
                operation_id: None,
                summary: None,
                description: None,
                tags: Vec::new(),
                conditions: MatchConditions::default(),
                responses: Vec::new(),
                handler_id,
                attachments: Extensions::new(),
            },
            endpoint: (),
            _has_handler: PhantomData,
            _has_response: PhantomData,
        }
    }

    /// Convenience constructor for GET requests
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Convenience constructor for POST requests
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Convenience constructor for PUT requests
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Convenience constructor for DELETE requests
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Convenience constructor for PATCH requests
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }
}

// -------------------------------------------------------------------------------------------------
// Descriptive methods: available at any stage
// -------------------------------------------------------------------------------------------------
impl<H, R> OperationBuilder<H, R>
where
    H: HandlerSlot,
{
    /// Inspect the spec (primarily for tests)
    pub fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    /// Set the operation ID
    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.spec.operation_id = Some(id.into());
        self
    }

    /// Override the generated handler id
    pub fn handler_id(mut self, id: impl Into<String>) -> Self {
        self.spec.handler_id = id.into();
        self
    }

    /// Set the operation summary
    pub fn summary(mut self, text: impl Into<String>) -> Self {
        self.spec.summary = Some(text.into());
        self
    }

    /// Set the operation description
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.spec.description = Some(text.into());
        self
    }

    /// Add a tag to the operation
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.spec.tags.push(tag.into());
        self
    }

    /// Require a query parameter expression (`name`, `!name`, `name=value`, `name!=value`).
    pub fn require_param(mut self, expr: impl Into<String>) -> Self {
        self.spec.conditions.params.push(expr.into());
        self
    }

    /// Require a header expression (`name`, `!name`, `name=value`, `name!=value`).
    pub fn require_header(mut self, expr: impl Into<String>) -> Self {
        self.spec.conditions.headers.push(expr.into());
        self
    }

    /// Restrict accepted request media types. Requests with other
    /// Content-Type values get HTTP 415.
    ///
    /// # Example
    /// ```rust,ignore
    /// OperationBuilder::post("/upload")
    ///     .consumes(&["multipart/form-data", "application/octet-stream"])
    ///     .handler(upload_handler)
    ///     .json_response(200, "Upload successful")
    ///     .register(&mut routes)?;
    /// ```
    pub fn consumes(mut self, types: &[&str]) -> Self {
        self.spec
            .conditions
            .consumes
            .extend(types.iter().map(|t| t.to_string()));
        self
    }

    /// Declare produced media types. Requests whose Accept header matches none get HTTP 406.
    pub fn produces(mut self, types: &[&str]) -> Self {
        self.spec
            .conditions
            .produces
            .extend(types.iter().map(|t| t.to_string()));
        self
    }

    /// Replace all match conditions at once.
    pub fn conditions(mut self, conditions: MatchConditions) -> Self {
        self.spec.conditions = conditions;
        self
    }

    /// Attach typed metadata to the operation. A second value of the same type replaces the first.
    pub fn attach<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.spec.attachments.insert(value);
        self
    }
}

// -------------------------------------------------------------------------------------------------
// Handler setting: transitions Missing -> Present for handler
// -------------------------------------------------------------------------------------------------
impl<R> OperationBuilder<Missing, R> {
    /// Set the handler for this operation (function handlers are recommended).
    ///
    /// This transitions the builder from `Missing` to `Present` handler state.
    pub fn handler<F, T>(self, h: F) -> OperationBuilder<Present, R>
    where
        F: Handler<T, ()>,
        T: 'static,
    {
        self.endpoint(Endpoint::from_handler(h))
    }

    /// Alternative path: provide a pre-built [`Endpoint`] yourself
    /// (used by extension traits that wrap the handler).
    pub fn endpoint(self, endpoint: Endpoint) -> OperationBuilder<Present, R> {
        OperationBuilder {
            spec: self.spec,
            endpoint,
            _has_handler: PhantomData::<Present>,
            _has_response: self._has_response,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Response setting: transitions Missing -> Present for response (first response)
// -------------------------------------------------------------------------------------------------
impl<H> OperationBuilder<H, Missing>
where
    H: HandlerSlot,
{
    /// Add a raw response spec (transitions from Missing to Present).
    pub fn response(mut self, resp: ResponseSpec) -> OperationBuilder<H, Present> {
        self.spec.responses.push(resp);
        OperationBuilder {
            spec: self.spec,
            endpoint: self.endpoint,
            _has_handler: self._has_handler,
            _has_response: PhantomData::<Present>,
        }
    }

    /// Add a JSON response (transitions from Missing to Present).
    pub fn json_response(
        self,
        status: u16,
        description: impl Into<String>,
    ) -> OperationBuilder<H, Present> {
        self.response(ResponseSpec {
            status,
            content_type: "application/json",
            description: description.into(),
        })
    }

    /// Add a binary attachment response (transitions from Missing to Present).
    pub fn binary_response(
        self,
        status: u16,
        content_type: &'static str,
        description: impl Into<String>,
    ) -> OperationBuilder<H, Present> {
        self.response(ResponseSpec {
            status,
            content_type,
            description: description.into(),
        })
    }
}

// -------------------------------------------------------------------------------------------------
// Additional responses: for Present response state
// -------------------------------------------------------------------------------------------------
impl<H> OperationBuilder<H, Present>
where
    H: HandlerSlot,
{
    /// Add a JSON response (additional).
    pub fn json_response(mut self, status: u16, description: impl Into<String>) -> Self {
        self.spec.responses.push(ResponseSpec {
            status,
            content_type: "application/json",
            description: description.into(),
        });
        self
    }

    /// Add a binary attachment response (additional).
    pub fn binary_response(
        mut self,
        status: u16,
        content_type: &'static str,
        description: impl Into<String>,
    ) -> Self {
        self.spec.responses.push(ResponseSpec {
            status,
            content_type,
            description: description.into(),
        });
        self
    }

    /// Add an additional RFC 9457 `application/problem+json` response.
    pub fn problem_response(mut self, status: u16, description: impl Into<String>) -> Self {
        self.spec.responses.push(ResponseSpec {
            status,
            content_type: problem::APPLICATION_PROBLEM_JSON,
            description: description.into(),
        });
        self
    }
}

// -------------------------------------------------------------------------------------------------
// Registration: only available when both handler AND response are present
// -------------------------------------------------------------------------------------------------
impl OperationBuilder<Present, Present> {
    /// Turn the builder into an immutable [`RouteDescriptor`] without registering it.
    pub fn build(self) -> RouteDescriptor {
        RouteDescriptor::new(self.spec, self.endpoint)
    }

    /// Register the operation with the route table.
    ///
    /// This method is only available when both handler and response are present,
    /// enforced at compile time by the type system.
    pub fn register(self, routes: &mut RouteTable) -> Result<(), RouteError> {
        routes.register(self.build())
    }
}
