//! URL path templates.
//!
//! # Responsibilities
//! - Parse templates such as `/v1/faces/{face_id}/{path=**}`
//! - Match request paths and extract percent-decoded captures
//! - Decide whether two templates accept the same paths
//!
//! # Design Decisions
//! - Literals are case-sensitive and compared exactly
//! - Trailing slashes are significant: `/a/` and `/a` are different paths
//! - A multi-segment capture may only close the template

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use thiserror::Error;

/// Template parse failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("template must start with '/'")]
    MissingLeadingSlash,

    #[error("unbalanced braces in segment {0:?}")]
    UnbalancedBrace(String),

    #[error("literal segment {0:?} contains a reserved character")]
    InvalidLiteral(String),

    #[error("invalid capture name {0:?}")]
    InvalidCaptureName(String),

    #[error("unsupported capture {0:?}; expected {{name}}, {{name=*}} or {{name=**}}")]
    UnsupportedCapture(String),

    #[error("capture {0:?} appears more than once")]
    DuplicateCapture(String),

    #[error("multi-segment capture {0:?} must be the last segment")]
    RestNotLast(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`
    Wildcard,
    /// `{name}` / `{name=*}`
    Capture(String),
    /// `{name=**}`
    CaptureRest(String),
}

/// Captured path parameters, in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct PathPattern {
    template: String,
    segments: Vec<Segment>,
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn parse_segment(raw: &str) -> Result<Segment, PatternError> {
    if raw == "*" {
        return Ok(Segment::Wildcard);
    }

    if let Some(inner) = raw.strip_prefix('{') {
        let inner = inner
            .strip_suffix('}')
            .ok_or_else(|| PatternError::UnbalancedBrace(raw.to_string()))?;
        if inner.contains(['{', '}']) {
            return Err(PatternError::UnbalancedBrace(raw.to_string()));
        }

        let (name, kind) = match inner.split_once('=') {
            Some((name, kind)) => (name, Some(kind)),
            None => (inner, None),
        };
        if !valid_name(name) {
            return Err(PatternError::InvalidCaptureName(name.to_string()));
        }

        return match kind {
            None | Some("*") => Ok(Segment::Capture(name.to_string())),
            Some("**") => Ok(Segment::CaptureRest(name.to_string())),
            Some(_) => Err(PatternError::UnsupportedCapture(raw.to_string())),
        };
    }

    if raw.contains(['{', '}']) {
        return Err(PatternError::UnbalancedBrace(raw.to_string()));
    }
    if raw.contains('*') {
        return Err(PatternError::InvalidLiteral(raw.to_string()));
    }
    Ok(Segment::Literal(raw.to_string()))
}

fn decode(raw: &str) -> Cow<'_, str> {
    percent_decode_str(raw)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(raw))
}

impl PathPattern {
    /// Compile a template.
    pub fn parse(template: &str) -> Result<Self, PatternError> {
        let body = template
            .strip_prefix('/')
            .ok_or(PatternError::MissingLeadingSlash)?;

        let raw: Vec<&str> = body.split('/').collect();
        let mut segments = Vec::with_capacity(raw.len());
        let mut names: Vec<String> = Vec::new();

        for (i, part) in raw.iter().enumerate() {
            let segment = parse_segment(part)?;
            match &segment {
                Segment::Capture(name) | Segment::CaptureRest(name) => {
                    if names.contains(name) {
                        return Err(PatternError::DuplicateCapture(name.clone()));
                    }
                    if matches!(segment, Segment::CaptureRest(_)) && i + 1 != raw.len() {
                        return Err(PatternError::RestNotLast(name.clone()));
                    }
                    names.push(name.clone());
                }
                _ => {}
            }
            segments.push(segment);
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Capture names in template order.
    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Capture(n) | Segment::CaptureRest(n) => Some(n.as_str()),
            _ => None,
        })
    }

    /// True when both templates accept exactly the same paths, ignoring
    /// capture names.
    pub fn same_shape(&self, other: &PathPattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| match (a, b) {
                    (Segment::Literal(x), Segment::Literal(y)) => x == y,
                    (
                        Segment::Wildcard | Segment::Capture(_),
                        Segment::Wildcard | Segment::Capture(_),
                    ) => true,
                    (Segment::CaptureRest(_), Segment::CaptureRest(_)) => true,
                    _ => false,
                })
    }

    /// Match a request path (without query string).
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let body = path.strip_prefix('/')?;
        let parts: Vec<&str> = body.split('/').collect();
        let mut params = Vec::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if *parts.get(i)? != lit.as_str() {
                        return None;
                    }
                }
                Segment::Wildcard => {
                    if parts.get(i)?.is_empty() {
                        return None;
                    }
                }
                Segment::Capture(name) => {
                    let part = parts.get(i)?;
                    if part.is_empty() {
                        return None;
                    }
                    params.push((name.clone(), decode(part).into_owned()));
                }
                Segment::CaptureRest(name) => {
                    let rest = parts.get(i..)?;
                    if rest.is_empty() || rest.iter().all(|p| p.is_empty()) {
                        return None;
                    }
                    let value = rest
                        .iter()
                        .map(|p| decode(p))
                        .collect::<Vec<_>>()
                        .join("/");
                    params.push((name.clone(), value));
                    return Some(PathParams { params });
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(PathParams { params })
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.template)
    }
}
