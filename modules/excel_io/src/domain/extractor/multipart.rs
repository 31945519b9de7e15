use async_trait::async_trait;
use axum::extract::{FromRequest, Multipart};
use bytes::Bytes;

use super::{InboundRequest, StreamExtractor};
use crate::domain::chain::Ranked;

/// Reads the named file part of a `multipart/form-data` upload.
pub struct MultipartExtractor;

impl Ranked for MultipartExtractor {
    fn id(&self) -> &str {
        "multipart"
    }

    fn priority(&self) -> i32 {
        100
    }
}

#[async_trait]
impl StreamExtractor for MultipartExtractor {
    fn supports(&self, request: &InboundRequest, _field: &str) -> bool {
        request
            .content_type()
            .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/"))
            .unwrap_or(false)
    }

    async fn extract(&self, request: &InboundRequest, field: &str) -> Option<Bytes> {
        let mut multipart = match Multipart::from_request(request.to_request(), &()).await {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, "Not a readable multipart body");
                return None;
            }
        };

        loop {
            match multipart.next_field().await {
                Ok(Some(part)) if part.name() == Some(field) => {
                    return match part.bytes().await {
                        Ok(bytes) if !bytes.is_empty() => Some(bytes),
                        Ok(_) => None,
                        Err(e) => {
                            tracing::debug!(field, error = %e, "Failed to read multipart field");
                            None
                        }
                    };
                }
                Ok(Some(_)) => continue,
                Ok(None) => return None,
                Err(e) => {
                    tracing::debug!(field, error = %e, "Malformed multipart body");
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::extractor::test_support::inbound;

    const BOUNDARY: &str = "XBOUNDARYX";

    fn form(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}.xlsx\"\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    #[tokio::test]
    async fn returns_the_named_part() {
        let req = inbound(
            Some(&content_type()),
            form(&[("other", b"nope"), ("file", b"sheet-bytes")]),
        );
        assert!(MultipartExtractor.supports(&req, "file"));
        let bytes = MultipartExtractor.extract(&req, "file").await.unwrap();
        assert_eq!(&bytes[..], b"sheet-bytes");
    }

    #[tokio::test]
    async fn empty_or_missing_part_is_absent() {
        let req = inbound(Some(&content_type()), form(&[("file", b"")]));
        assert!(MultipartExtractor.extract(&req, "file").await.is_none());

        let req = inbound(Some(&content_type()), form(&[("other", b"x")]));
        assert!(MultipartExtractor.extract(&req, "file").await.is_none());
    }

    #[tokio::test]
    async fn non_multipart_requests_are_not_supported() {
        let req = inbound(Some("application/json"), "{}");
        assert!(!MultipartExtractor.supports(&req, "file"));
        // garbage with a multipart content type is swallowed
        let req = inbound(Some(&content_type()), "garbage");
        assert!(MultipartExtractor.extract(&req, "file").await.is_none());
    }
}
