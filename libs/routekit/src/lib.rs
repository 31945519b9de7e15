//! # RouteKit - modular route composition for axum
//!
//! RouteKit lets feature modules describe their HTTP operations declaratively and
//! hand them to a shared [`RouteTable`] instead of mutating an `axum::Router`
//! directly. Keeping the full table around until the very end makes it possible
//! for one module to inspect and extend routes owned by another (for example to
//! mirror a handler on a derived path) before the router is frozen.
//!
//! ## Phases
//!
//! - **init**: modules read their typed config from [`ModuleCtx`]
//! - **rest**: every [`RestfulModule`] registers its operations
//! - **finalize**: modules see the complete table and may add derived routes or layers
//! - **serve**: the table is turned into a `Router` and served until shutdown
//! - **stop**: stateful modules drain their work
//!
//! ## Declaring an operation
//!
//! ```rust,ignore
//! use routekit::api::{OperationBuilder, Problem};
//!
//! async fn list_users() -> Result<axum::Json<Vec<UserDto>>, Problem> { /* ... */ }
//!
//! OperationBuilder::get("/users")
//!     .operation_id("users.list")
//!     .summary("List users")
//!     .handler(list_users)
//!     .json_response(200, "List of users")
//!     .register(&mut routes)?;
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;

// Module system exports
pub use crate::contracts::*;
pub mod context;
pub use context::{ConfigError, ModuleCtx};

pub mod registry;
pub use registry::{ModuleRegistry, RegistryBuilder, RegistryError};

// Core module contracts and traits
pub mod contracts;

// Type-safe API operation builder and route table
pub mod api;
pub use api::problem::{bad_request, internal_error, not_found, Problem};
pub use api::{OperationBuilder, RouteDescriptor, RouteError, RouteInfo, RouteTable};

pub mod runtime;
pub use runtime::{run, HostRuntime, RunOptions, ShutdownOptions};
