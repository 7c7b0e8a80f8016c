//! # Media Types
//!
//! Minimal RFC 7231 media-type model used by content negotiation.
//!
//! Only the parts the dispatcher needs are modelled: the `type/subtype` pair
//! (lower-cased), the parameter list, wildcard compatibility and a
//! specificity ordering for declared `produces` lists. Quality values are
//! parsed as ordinary parameters and do not influence matching.

use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Wildcard token used for both type and subtype (`*/*`)
pub const WILDCARD: &str = "*";

/// Parameters are rare, two inline slots cover `charset` and `q`
pub type MediaParams = SmallVec<[(String, String); 2]>;

/// Reason a media-type string could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaTypeError {
    #[error("media type is empty")]
    Empty,
    #[error("media type '{0}' is missing a '/' separator")]
    MissingSubtype(String),
    #[error("media type '{0}' contains an invalid token")]
    InvalidToken(String),
    #[error("media type parameter '{0}' is malformed")]
    InvalidParameter(String),
}

/// A parsed media type such as `application/json; charset=utf-8`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    kind: String,
    subtype: String,
    params: MediaParams,
}

impl MediaType {
    /// Build a media type from already validated parts
    #[must_use]
    pub fn new(kind: &str, subtype: &str) -> Self {
        Self {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params: MediaParams::new(),
        }
    }

    /// `*/*`
    #[must_use]
    pub fn wildcard() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }

    /// Parse a single media type (no comma-separated lists)
    pub fn parse(value: &str) -> Result<Self, MediaTypeError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(MediaTypeError::Empty);
        }

        let mut parts = split_params(value).into_iter();
        let essence = parts.next().unwrap_or_default().trim();

        // A bare `*` is accepted by most user agents as shorthand for `*/*`
        let (kind, subtype) = if essence == WILDCARD {
            (WILDCARD, WILDCARD)
        } else {
            essence
                .split_once('/')
                .ok_or_else(|| MediaTypeError::MissingSubtype(value.to_string()))?
        };
        let (kind, subtype) = (kind.trim(), subtype.trim());
        if !is_token(kind) || !is_token(subtype) {
            return Err(MediaTypeError::InvalidToken(value.to_string()));
        }
        if kind == WILDCARD && subtype != WILDCARD {
            return Err(MediaTypeError::InvalidToken(value.to_string()));
        }

        let mut params = MediaParams::new();
        for param in parts {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            let (name, raw) = param
                .split_once('=')
                .ok_or_else(|| MediaTypeError::InvalidParameter(param.to_string()))?;
            let name = name.trim();
            if !is_token(name) {
                return Err(MediaTypeError::InvalidParameter(param.to_string()));
            }
            let raw = raw.trim();
            let value = match raw.strip_prefix('"') {
                Some(quoted) => unquote(quoted)
                    .ok_or_else(|| MediaTypeError::InvalidParameter(param.to_string()))?,
                None if is_token(raw) => raw.to_string(),
                None => return Err(MediaTypeError::InvalidParameter(param.to_string())),
            };
            params.push((name.to_ascii_lowercase(), value));
        }

        Ok(Self {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params,
        })
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[inline]
    #[must_use]
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn is_wildcard_type(&self) -> bool {
        self.kind == WILDCARD
    }

    #[inline]
    #[must_use]
    pub fn is_wildcard_subtype(&self) -> bool {
        self.subtype == WILDCARD
    }

    /// Symmetric wildcard-aware compatibility test.
    ///
    /// Parameters are ignored: `text/plain; charset=utf-8` is compatible with
    /// `text/plain`.
    #[must_use]
    pub fn is_compatible(&self, other: &MediaType) -> bool {
        if self.is_wildcard_type() || other.is_wildcard_type() {
            return true;
        }
        if self.kind != other.kind {
            return false;
        }
        self.is_wildcard_subtype() || other.is_wildcard_subtype() || self.subtype == other.subtype
    }

    /// Higher is more specific: concrete > `type/*` > `*/*`
    #[must_use]
    pub fn specificity(&self) -> u8 {
        match (self.is_wildcard_type(), self.is_wildcard_subtype()) {
            (true, _) => 0,
            (false, true) => 1,
            (false, false) => 2,
        }
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaType::parse(s)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)?;
        for (name, value) in &self.params {
            if is_token(value) {
                write!(f, ";{name}={value}")?;
            } else {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, ";{name}=\"{escaped}\"")?;
            }
        }
        Ok(())
    }
}

/// Sort media types from most to least specific, keeping declaration order
/// between equally specific entries. Types with more parameters win ties.
pub fn sort_by_specificity(types: &mut [MediaType]) {
    types.sort_by(|a, b| {
        b.specificity()
            .cmp(&a.specificity())
            .then_with(|| b.params.len().cmp(&a.params.len()))
    });
}

/// First entry of `desired` that is compatible with any entry of `provided`.
///
/// `desired` is scanned in order, so callers pass their preferred list first.
#[must_use]
pub fn first_match<'a>(desired: &'a [MediaType], provided: &[MediaType]) -> Option<&'a MediaType> {
    desired
        .iter()
        .find(|d| provided.iter().any(|p| d.is_compatible(p)))
}

/// Split on `;` outside quoted strings. An unterminated quote runs to the
/// end of the value and is rejected when the parameter is unquoted.
fn split_params(value: &str) -> SmallVec<[&str; 4]> {
    let mut parts = SmallVec::new();
    let (mut start, mut quoted, mut escaped) = (0, false, false);
    for (idx, b) in value.bytes().enumerate() {
        match b {
            _ if escaped => escaped = false,
            b'\\' if quoted => escaped = true,
            b'"' => quoted = !quoted,
            b';' if !quoted => {
                parts.push(&value[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

/// Body of a quoted string after its opening quote, with `\x` escapes
/// resolved. `None` unless the closing quote ends the input.
fn unquote(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            '"' => return chars.as_str().is_empty().then_some(out),
            c => out.push(c),
        }
    }
    None
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^'
                        | b'_' | b'`' | b'|' | b'~'
                )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let mt = MediaType::parse("Application/JSON").unwrap();
        assert_eq!(mt.kind(), "application");
        assert_eq!(mt.subtype(), "json");
        assert_eq!(mt.to_string(), "application/json");
    }

    #[test]
    fn test_parse_params() {
        let mt = MediaType::parse("text/plain; charset=\"utf-8\"; q=0.5").unwrap();
        assert_eq!(mt.param("charset"), Some("utf-8"));
        assert_eq!(mt.param("Q"), Some("0.5"));
    }

    #[test]
    fn test_parse_quoted_params_keep_separators() {
        let mt = MediaType::parse(r#"text/plain; foo="a;b"; bar="x\"y""#).unwrap();
        assert_eq!(mt.param("foo"), Some("a;b"));
        assert_eq!(mt.param("bar"), Some("x\"y"));
        assert_eq!(mt.to_string(), r#"text/plain;foo="a;b";bar="x\"y""#);

        assert!(matches!(
            MediaType::parse(r#"text/plain; foo="a;b"#),
            Err(MediaTypeError::InvalidParameter(_))
        ));
        assert!(matches!(
            MediaType::parse(r#"text/plain; foo="a"b""#),
            Err(MediaTypeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_parse_bare_star() {
        assert_eq!(MediaType::parse("*").unwrap(), MediaType::wildcard());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(MediaType::parse("   "), Err(MediaTypeError::Empty));
        assert!(matches!(
            MediaType::parse("json"),
            Err(MediaTypeError::MissingSubtype(_))
        ));
        assert!(matches!(
            MediaType::parse("text/"),
            Err(MediaTypeError::InvalidToken(_))
        ));
        assert!(matches!(
            MediaType::parse("*/json"),
            Err(MediaTypeError::InvalidToken(_))
        ));
        assert!(matches!(
            MediaType::parse("text/plain; charset"),
            Err(MediaTypeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_compatibility() {
        let json = MediaType::parse("application/json").unwrap();
        let any_app = MediaType::parse("application/*").unwrap();
        let xml = MediaType::parse("text/xml").unwrap();

        assert!(json.is_compatible(&MediaType::wildcard()));
        assert!(json.is_compatible(&any_app));
        assert!(any_app.is_compatible(&json));
        assert!(!json.is_compatible(&xml));
        assert!(!any_app.is_compatible(&xml));
    }

    #[test]
    fn test_sort_by_specificity() {
        let mut types = vec![
            MediaType::wildcard(),
            MediaType::parse("text/*").unwrap(),
            MediaType::parse("text/plain").unwrap(),
            MediaType::parse("text/html;level=1").unwrap(),
        ];
        sort_by_specificity(&mut types);
        let rendered: Vec<String> = types.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["text/html;level=1", "text/plain", "text/*", "*/*"]
        );
    }

    #[test]
    fn test_first_match_prefers_desired_order() {
        let produces = vec![
            MediaType::parse("application/json").unwrap(),
            MediaType::parse("text/plain").unwrap(),
        ];
        let accepts = vec![MediaType::parse("text/*").unwrap()];
        let found = first_match(&produces, &accepts).unwrap();
        assert_eq!(found.to_string(), "text/plain");
    }
}
