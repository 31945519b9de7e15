//! Path templates in axum 0.8 / OpenAPI syntax (`/users/{id}`, `/static/{*path}`).
//!
//! Templates are validated up front so that a malformed or conflicting path is
//! reported as a [`TemplateError`] instead of panicking inside `Router::route`.

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Param(String),
    Wildcard(String),
}

#[derive(Debug, Clone, Error)]
pub enum TemplateError {
    #[error("path must start with '/': '{0}'")]
    MissingLeadingSlash(String),
    #[error("empty segment in path '{0}'")]
    EmptySegment(String),
    #[error("malformed variable segment '{segment}' in path '{path}'")]
    MalformedVariable { path: String, segment: String },
    #[error("variable '{name}' appears twice in path '{path}'")]
    DuplicateVariable { path: String, name: String },
    #[error("wildcard must be the last segment in path '{0}'")]
    WildcardNotLast(String),
    #[error("cannot compile matcher for '{path}': {source}")]
    Pattern {
        path: String,
        #[source]
        source: regex::Error,
    },
}

/// A parsed and validated path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
    trailing_slash: bool,
}

fn is_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl PathTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(TemplateError::MissingLeadingSlash(raw.to_string()));
        };

        let mut segments = Vec::new();
        let mut trailing_slash = false;
        if !rest.is_empty() {
            let parts: Vec<&str> = rest.split('/').collect();
            let last = parts.len() - 1;
            for (i, part) in parts.into_iter().enumerate() {
                if part.is_empty() {
                    if i == last {
                        trailing_slash = true;
                        continue;
                    }
                    return Err(TemplateError::EmptySegment(raw.to_string()));
                }
                segments.push(Self::parse_segment(raw, part)?);
            }
        }

        let mut seen = Vec::new();
        for (i, seg) in segments.iter().enumerate() {
            match seg {
                Segment::Param(name) | Segment::Wildcard(name) => {
                    if seen.contains(&name) {
                        return Err(TemplateError::DuplicateVariable {
                            path: raw.to_string(),
                            name: name.clone(),
                        });
                    }
                    seen.push(name);
                }
                Segment::Static(_) => {}
            }
            if matches!(seg, Segment::Wildcard(_)) && (i + 1 != segments.len() || trailing_slash) {
                return Err(TemplateError::WildcardNotLast(raw.to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            trailing_slash,
        })
    }

    fn parse_segment(raw: &str, part: &str) -> Result<Segment, TemplateError> {
        let malformed = || TemplateError::MalformedVariable {
            path: raw.to_string(),
            segment: part.to_string(),
        };

        if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            return match inner.strip_prefix('*') {
                Some(name) if is_ident(name) => Ok(Segment::Wildcard(name.to_string())),
                Some(_) => Err(malformed()),
                None if is_ident(inner) => Ok(Segment::Param(inner.to_string())),
                None => Err(malformed()),
            };
        }

        // Legacy `:id` / `*rest` syntax and stray braces are rejected by axum 0.8.
        if part.contains(['{', '}']) || part.starts_with(':') || part.starts_with('*') {
            return Err(malformed());
        }
        Ok(Segment::Static(part.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_trailing_slash(&self) -> bool {
        self.trailing_slash
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(n) | Segment::Wildcard(n) => Some(n.as_str()),
                Segment::Static(_) => None,
            })
            .collect()
    }

    /// Shape of the template with variable names erased (`/users/{}/export`).
    ///
    /// Two templates with the same key route the same concrete paths.
    pub fn collision_key(&self) -> String {
        let mut key = String::new();
        for seg in &self.segments {
            key.push('/');
            match seg {
                Segment::Static(s) => key.push_str(s),
                Segment::Param(_) => key.push_str("{}"),
                Segment::Wildcard(_) => key.push_str("{*}"),
            }
        }
        if self.trailing_slash || self.segments.is_empty() {
            key.push('/');
        }
        key
    }

    /// Returns the pair of clashing variable names when `other` binds a
    /// different name at a position both templates share.
    pub fn variable_conflict(&self, other: &PathTemplate) -> Option<(String, String)> {
        for (a, b) in self.segments.iter().zip(other.segments.iter()) {
            match (a, b) {
                (Segment::Static(x), Segment::Static(y)) if x == y => continue,
                (Segment::Param(x), Segment::Param(y))
                | (Segment::Wildcard(x), Segment::Wildcard(y)) => {
                    if x != y {
                        return Some((x.clone(), y.clone()));
                    }
                }
                _ => return None,
            }
        }
        None
    }

    /// Compiles a matcher accepting concrete request paths for this template.
    pub fn matcher(&self) -> Result<PathMatcher, TemplateError> {
        let mut pattern = String::from("^");
        for seg in &self.segments {
            pattern.push('/');
            match seg {
                Segment::Static(s) => pattern.push_str(&regex::escape(s)),
                Segment::Param(_) => pattern.push_str("[^/]+"),
                Segment::Wildcard(_) => pattern.push_str(".*"),
            }
        }
        if self.trailing_slash || self.segments.is_empty() {
            pattern.push('/');
        }
        pattern.push('$');
        let regex = Regex::new(&pattern).map_err(|source| TemplateError::Pattern {
            path: self.raw.clone(),
            source,
        })?;
        Ok(PathMatcher {
            template: self.raw.clone(),
            regex,
        })
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Matches concrete request paths against a template.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    template: String,
    regex: Regex,
}

impl PathMatcher {
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}
