pub mod conditions;
pub mod operation_builder;
pub mod path_template;
pub mod problem;
pub mod route_table;

pub use conditions::{conditions_guard, MatchConditions};
pub use operation_builder::{
    Endpoint, HandlerSlot, Missing, OperationBuilder, OperationSpec, Present, ResponseSpec,
};
pub use path_template::{PathMatcher, PathTemplate, Segment, TemplateError};
pub use problem::{Problem, APPLICATION_PROBLEM_JSON};
pub use route_table::{RouteDescriptor, RouteError, RouteInfo, RouteLayer, RouteTable};
