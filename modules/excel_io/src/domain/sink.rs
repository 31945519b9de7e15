use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::{self, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};

use crate::domain::error::InterchangeError;

/// Where an export processor writes its output.
///
/// A synchronous export writes into the HTTP response. An asynchronous one
/// runs after the response has been sent and gets a detached sink: headers and
/// body are still recorded for logging, but nobody receives them.
#[derive(Debug)]
pub struct ResponseSink {
    detached: Option<String>,
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl ResponseSink {
    pub fn for_response() -> Self {
        Self {
            detached: None,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn detached(label: impl Into<String>) -> Self {
        Self {
            detached: Some(label.into()),
            ..Self::for_response()
        }
    }

    pub fn is_detached(&self) -> bool {
        self.detached.is_some()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn write(&mut self, body: Bytes) {
        if let Some(label) = &self.detached {
            tracing::debug!(export = %label, size = body.len(), "Detached export output discarded");
        }
        self.body = Some(body);
    }

    /// Write `body` as a downloadable file named `<stem>.<extension>`.
    pub fn attachment(
        &mut self,
        content_type: &str,
        stem: &str,
        extension: &str,
        body: Bytes,
    ) -> Result<(), InterchangeError> {
        let content_type = HeaderValue::from_str(content_type)
            .map_err(|e| InterchangeError::encode("invalid content type", e))?;
        let disposition = HeaderValue::from_str(&content_disposition(stem, extension))
            .map_err(|e| InterchangeError::encode("invalid file name", e))?;
        self.set_header(header::CONTENT_TYPE, content_type);
        self.set_header(header::CONTENT_DISPOSITION, disposition);
        self.write(body);
        Ok(())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

impl IntoResponse for ResponseSink {
    fn into_response(self) -> Response {
        let mut resp = Response::new(self.body.map(Body::from).unwrap_or_else(Body::empty));
        *resp.status_mut() = self.status;
        *resp.headers_mut() = self.headers;
        resp
    }
}

/// `attachment; filename="<stem>.<ext>"` with a percent-encoded stem.
///
/// Spaces must come out as `%20`: a `+` is not a space inside this header.
pub fn content_disposition(stem: &str, extension: &str) -> String {
    let encoded = urlencoding::encode(stem).replace('+', "%20");
    format!("attachment; filename=\"{encoded}.{extension}\"")
}
