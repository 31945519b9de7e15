pub mod error;
pub mod export;
pub mod extract;
pub mod import;

pub use error::*;
pub use export::*;
pub use extract::*;
pub use import::*;
