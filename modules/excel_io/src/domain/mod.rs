pub mod binding;
pub mod chain;
pub mod codec;
pub mod deriver;
pub mod dispatcher;
pub mod error;
pub mod export;
pub mod extractor;
pub mod intercept;
pub mod materializer;
pub mod processor;
pub mod reader;
pub mod record;
pub mod runtime;
pub mod sink;
pub mod wrapper;
