//! Request match conditions (query params, headers, consumed and produced media types)
//! enforced per route by a middleware guard.
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::{header, HeaderMap, Uri};
use mime::Mime;
use std::sync::Arc;

use crate::api::problem::Problem;

/// Conditions a request must satisfy to reach a route's handler.
///
/// `params` and `headers` take expressions of the form `name`, `!name`,
/// `name=value` or `name!=value`. `consumes` lists accepted request media types,
/// `produces` the media types the handler can answer with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchConditions {
    pub params: Vec<String>,
    pub headers: Vec<String>,
    pub consumes: Vec<String>,
    pub produces: Vec<String>,
}

enum Expr<'a> {
    Present(&'a str),
    Absent(&'a str),
    Equals(&'a str, &'a str),
    NotEquals(&'a str, &'a str),
}

fn parse_expr(raw: &str) -> Expr<'_> {
    let raw = raw.trim();
    if let Some((name, value)) = raw.split_once("!=") {
        Expr::NotEquals(name.trim(), value.trim())
    } else if let Some((name, value)) = raw.split_once('=') {
        Expr::Equals(name.trim(), value.trim())
    } else if let Some(name) = raw.strip_prefix('!') {
        Expr::Absent(name.trim())
    } else {
        Expr::Present(raw)
    }
}

fn eval_expr(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> bool {
    match parse_expr(raw) {
        Expr::Present(name) => lookup(name).is_some(),
        Expr::Absent(name) => lookup(name).is_none(),
        Expr::Equals(name, value) => lookup(name).as_deref() == Some(value),
        Expr::NotEquals(name, value) => lookup(name).as_deref() != Some(value),
    }
}

/// `range` may carry wildcards (`*/*`, `text/*`); `concrete` is compared literally.
fn media_matches(range: &Mime, concrete: &Mime) -> bool {
    if range.type_() == mime::STAR {
        return true;
    }
    range.type_() == concrete.type_()
        && (range.subtype() == mime::STAR || range.subtype() == concrete.subtype())
}

fn parse_media_list<'a>(items: impl Iterator<Item = &'a str>) -> Vec<Mime> {
    items
        .filter_map(|raw| match raw.trim().parse::<Mime>() {
            Ok(m) => Some(m),
            Err(_) => {
                tracing::warn!(media_type = raw, "Ignoring unparsable media type in match conditions");
                None
            }
        })
        .collect()
}

impl MatchConditions {
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
            && self.headers.is_empty()
            && self.consumes.is_empty()
            && self.produces.is_empty()
    }

    /// Evaluate all conditions against a request; the first unmet one is returned as a Problem.
    pub fn check(&self, uri: &Uri, headers: &HeaderMap) -> Result<(), Problem> {
        if !self.params.is_empty() {
            let query: Vec<(String, String)> = Query::try_from_uri(uri)
                .map(|Query(q)| q)
                .unwrap_or_default();
            for expr in &self.params {
                let ok = eval_expr(expr, |name| {
                    query
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.clone())
                });
                if !ok {
                    return Err(Problem::new(
                        StatusCode::BAD_REQUEST.as_u16(),
                        "Bad Request",
                        format!("Query parameter condition '{expr}' not met"),
                    ));
                }
            }
        }

        for expr in &self.headers {
            let ok = eval_expr(expr, |name| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            });
            if !ok {
                return Err(Problem::new(
                    StatusCode::BAD_REQUEST.as_u16(),
                    "Bad Request",
                    format!("Header condition '{expr}' not met"),
                ));
            }
        }

        if !self.consumes.is_empty() {
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<Mime>().ok())
                .unwrap_or(mime::APPLICATION_OCTET_STREAM);
            let accepted = parse_media_list(self.consumes.iter().map(String::as_str));
            if !accepted.iter().any(|range| media_matches(range, &content_type)) {
                return Err(Problem::new(
                    StatusCode::UNSUPPORTED_MEDIA_TYPE.as_u16(),
                    "Unsupported Media Type",
                    format!(
                        "Content-Type '{}' is not accepted. Accepted types: {}",
                        content_type.essence_str(),
                        self.consumes.join(", ")
                    ),
                ));
            }
        }

        if !self.produces.is_empty() {
            if let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
                let wanted = parse_media_list(accept.split(','));
                let offered = parse_media_list(self.produces.iter().map(String::as_str));
                let ok = wanted.is_empty()
                    || wanted.iter().any(|w| {
                        offered
                            .iter()
                            .any(|o| media_matches(w, o) || media_matches(o, w))
                    });
                if !ok {
                    return Err(Problem::new(
                        StatusCode::NOT_ACCEPTABLE.as_u16(),
                        "Not Acceptable",
                        format!(
                            "None of the accepted media types is produced. Produced types: {}",
                            self.produces.join(", ")
                        ),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Route-level guard rejecting requests whose shape does not satisfy the route conditions.
pub async fn conditions_guard(
    State(conditions): State<Arc<MatchConditions>>,
    req: Request,
    next: Next,
) -> Response {
    if let Err(problem) = conditions.check(req.uri(), req.headers()) {
        tracing::warn!(
            method = %req.method(),
            path = %req.uri().path(),
            detail = %problem.detail,
            "Request does not satisfy route match conditions"
        );
        return problem.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn empty_conditions_accept_everything() {
        let c = MatchConditions::default();
        assert!(c.is_empty());
        assert!(c.check(&"/x".parse().unwrap(), &HeaderMap::new()).is_ok());
    }

    #[test]
    fn param_expressions() {
        let c = MatchConditions {
            params: vec!["mode=full".into(), "!debug".into()],
            ..Default::default()
        };
        assert!(c.check(&"/x?mode=full".parse().unwrap(), &HeaderMap::new()).is_ok());
        let err = c
            .check(&"/x?mode=full&debug=1".parse().unwrap(), &HeaderMap::new())
            .unwrap_err();
        assert_eq!(err.status, 400);
        assert!(c.check(&"/x?mode=lite".parse().unwrap(), &HeaderMap::new()).is_err());
    }

    #[test]
    fn header_expressions() {
        let c = MatchConditions {
            headers: vec!["X-Tenant".into(), "X-Mode!=legacy".into()],
            ..Default::default()
        };
        let uri: Uri = "/x".parse().unwrap();
        assert!(c.check(&uri, &headers(&[("x-tenant", "acme")])).is_ok());
        assert!(c.check(&uri, &HeaderMap::new()).is_err());
        assert!(c
            .check(&uri, &headers(&[("x-tenant", "acme"), ("x-mode", "legacy")]))
            .is_err());
    }

    #[test]
    fn consumes_defaults_missing_content_type_to_octet_stream() {
        let c = MatchConditions {
            consumes: vec!["application/json".into()],
            ..Default::default()
        };
        let uri: Uri = "/x".parse().unwrap();
        assert_eq!(c.check(&uri, &HeaderMap::new()).unwrap_err().status, 415);
        assert!(c
            .check(&uri, &headers(&[("content-type", "application/json; charset=utf-8")]))
            .is_ok());
    }

    #[test]
    fn produces_honours_accept_wildcards() {
        let c = MatchConditions {
            produces: vec!["application/json".into()],
            ..Default::default()
        };
        let uri: Uri = "/x".parse().unwrap();
        assert!(c.check(&uri, &HeaderMap::new()).is_ok());
        assert!(c.check(&uri, &headers(&[("accept", "*/*")])).is_ok());
        assert!(c.check(&uri, &headers(&[("accept", "application/*")])).is_ok());
        assert_eq!(
            c.check(&uri, &headers(&[("accept", "text/html")]))
                .unwrap_err()
                .status,
            406
        );
    }
}
