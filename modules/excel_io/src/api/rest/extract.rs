//! axum extractors for spreadsheet uploads.
//!
//! Both read the [`ImportSpec`] attached to the matched route, so the route
//! must be declared with `.import(..)`.

use std::sync::Arc;

use axum::extract::{FromRequest, OptionalFromRequest, Request};
use bytes::Bytes;
use http::header;
use routekit::{Problem, RouteInfo};

use crate::domain::binding::{ImportSpec, ParamKind};
use crate::domain::error::InterchangeError;
use crate::domain::extractor::InboundRequest;
use crate::domain::materializer::{buffer_body, Resolved};
use crate::domain::record::{records_into, Tabular};
use crate::domain::runtime::InterchangeRuntime;

/// Uploaded spreadsheet decoded into records.
///
/// Use `Option<SheetImport<T>>` when the upload may be absent.
#[derive(Debug, Clone)]
pub struct SheetImport<T>(pub Vec<T>);

/// Uploaded spreadsheet bytes, not decoded.
#[derive(Debug, Clone)]
pub struct RawSheet(pub Bytes);

async fn materialize(
    req: Request,
    kind: ParamKind,
    optional: bool,
) -> Result<Option<Resolved>, InterchangeError> {
    let mut spec = req
        .extensions()
        .get::<RouteInfo>()
        .and_then(|RouteInfo(route)| route.spec.attachment::<ImportSpec>().cloned())
        .ok_or_else(|| InterchangeError::contract("route has no import binding"))?;
    let runtime = req
        .extensions()
        .get::<Arc<InterchangeRuntime>>()
        .cloned()
        .ok_or_else(|| InterchangeError::contract("excel_io is not installed on this route"))?;
    if optional {
        spec.required = false;
    }

    let (parts, body) = req.into_parts();
    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok());
    // Oversize bodies fail here, before any extractor looks for the file part.
    let bytes = buffer_body(body, runtime.config().max_file_size, declared).await?;
    let inbound = InboundRequest::new(parts, bytes);

    runtime
        .materializer()
        .resolve_parameter(&inbound, &spec, kind)
        .await
}

fn into_records<T: Tabular>(resolved: Option<Resolved>) -> Result<Option<Vec<T>>, InterchangeError> {
    match resolved {
        Some(Resolved::Records(rows)) => records_into(rows).map(Some),
        Some(Resolved::Raw(_)) => Err(InterchangeError::contract("expected records, got raw bytes")),
        None => Ok(None),
    }
}

fn into_bytes(resolved: Option<Resolved>) -> Result<Option<Bytes>, InterchangeError> {
    match resolved {
        Some(Resolved::Raw(bytes)) => Ok(Some(bytes)),
        Some(Resolved::Records(_)) => Err(InterchangeError::contract("expected raw bytes, got records")),
        None => Ok(None),
    }
}

fn rejected(e: InterchangeError) -> Problem {
    tracing::debug!(error = %e, kind = e.kind(), "Import rejected");
    Problem::from(e)
}

impl<S, T> FromRequest<S> for SheetImport<T>
where
    S: Send + Sync,
    T: Tabular,
{
    type Rejection = Problem;

    /// An absent upload on a non-required binding yields an empty list.
    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let resolved = materialize(req, ParamKind::Records, false)
            .await
            .map_err(rejected)?;
        let rows = into_records(resolved).map_err(rejected)?;
        Ok(Self(rows.unwrap_or_default()))
    }
}

impl<S, T> OptionalFromRequest<S> for SheetImport<T>
where
    S: Send + Sync,
    T: Tabular,
{
    type Rejection = Problem;

    async fn from_request(req: Request, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        let resolved = materialize(req, ParamKind::Records, true)
            .await
            .map_err(rejected)?;
        Ok(into_records(resolved).map_err(rejected)?.map(Self))
    }
}

impl<S> FromRequest<S> for RawSheet
where
    S: Send + Sync,
{
    type Rejection = Problem;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let resolved = materialize(req, ParamKind::Raw, false)
            .await
            .map_err(rejected)?;
        let bytes = into_bytes(resolved).map_err(rejected)?;
        Ok(Self(bytes.unwrap_or_default()))
    }
}

impl<S> OptionalFromRequest<S> for RawSheet
where
    S: Send + Sync,
{
    type Rejection = Problem;

    async fn from_request(req: Request, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        let resolved = materialize(req, ParamKind::Raw, true)
            .await
            .map_err(rejected)?;
        Ok(into_bytes(resolved).map_err(rejected)?.map(Self))
    }
}
