mod host_runtime;
mod runner;

pub use host_runtime::HostRuntime;
pub use runner::{run, RunOptions, ShutdownOptions};
