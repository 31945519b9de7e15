//! Byte-source strategies for uploaded spreadsheets.
//!
//! Each extractor recognizes one request encoding. Failures inside an
//! extractor never surface: they only mean "not this one, try the next".

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use bytes::Bytes;
use http::{header, Extensions, HeaderMap, Method, Uri, Version};

use crate::domain::chain::{PriorityChain, Ranked};

pub mod base64_json;
pub mod multipart;
pub mod raw_body;

pub use self::base64_json::Base64JsonExtractor;
pub use self::multipart::MultipartExtractor;
pub use self::raw_body::RawBodyExtractor;

pub type ExtractorChain = PriorityChain<dyn StreamExtractor>;

#[async_trait]
pub trait StreamExtractor: Ranked {
    fn supports(&self, request: &InboundRequest, field: &str) -> bool;

    /// Spreadsheet bytes for `field`, or `None` when this encoding carries nothing usable.
    async fn extract(&self, request: &InboundRequest, field: &str) -> Option<Bytes>;
}

/// The built-in extractors: multipart (100), base64 JSON (200), raw body (300).
pub fn default_extractors() -> Vec<Arc<dyn StreamExtractor>> {
    vec![
        Arc::new(MultipartExtractor),
        Arc::new(Base64JsonExtractor),
        Arc::new(RawBodyExtractor),
    ]
}

/// A request whose body has already been buffered, so several extractors can look at it.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
}

impl InboundRequest {
    pub fn new(parts: http::request::Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            extensions: parts.extensions,
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Value of `Content-Length`, if present and numeric.
    pub fn declared_length(&self) -> Option<u64> {
        self.headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    /// Rebuild an owned request (extensions included) for axum extractors.
    pub fn to_request(&self) -> Request {
        let mut req = Request::new(Body::from(self.body.clone()));
        *req.method_mut() = self.method.clone();
        *req.uri_mut() = self.uri.clone();
        *req.version_mut() = self.version;
        *req.headers_mut() = self.headers.clone();
        *req.extensions_mut() = self.extensions.clone();
        req
    }
}
