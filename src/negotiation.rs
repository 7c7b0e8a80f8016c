//! Content negotiation helpers shared by the class dispatcher.
//!
//! # JSF Compliance (Rule 206)
//!
//! `accept_header_matches` runs once per `Accept` header on every request
//! whose target declares `produces`. The single-produces shapes scan the raw
//! header in place and never allocate a list of candidates.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use smallvec::SmallVec;

use crate::media::{first_match, MediaType, MediaTypeError};

/// Check a request `Content-Type` against a target's declared `consumes`.
///
/// An empty `consumes` list accepts anything. A content type that does not
/// parse is reported as an error so the caller can answer 415.
pub fn content_type_matches(
    consumes: &[MediaType],
    content_type: &str,
) -> Result<bool, MediaTypeError> {
    if consumes.is_empty() {
        return Ok(true);
    }
    let provided = MediaType::parse(content_type)?;
    Ok(consumes.iter().any(|c| c.is_compatible(&provided)))
}

/// Check one raw `Accept` header value (possibly comma separated) against a
/// target's declared `produces`, most specific first.
///
/// Unparseable entries are skipped; the header matches if any parseable
/// entry is compatible with any produced type.
#[must_use]
pub fn accept_header_matches(produces: &[MediaType], accept: &str) -> bool {
    let accept = accept.trim();
    if produces.is_empty() || accept == "*/*" {
        return true;
    }

    match produces {
        [single] if !accept.contains(',') => MediaType::parse(accept)
            .map(|candidate| single.is_compatible(&candidate))
            .unwrap_or(false),
        [single] => accept.split(',').any(|part| {
            MediaType::parse(part)
                .map(|candidate| single.is_compatible(&candidate))
                .unwrap_or(false)
        }),
        many => {
            let candidates: SmallVec<[MediaType; 4]> = accept
                .split(',')
                .filter_map(|part| MediaType::parse(part).ok())
                .collect();
            first_match(many, &candidates).is_some()
        }
    }
}

/// True when at least one of the request's `Accept` header values matches.
/// An empty list means the client did not negotiate and always matches.
#[must_use]
pub fn any_accept_matches<S: AsRef<str>>(produces: &[MediaType], accepts: &[S]) -> bool {
    accepts.is_empty()
        || accepts
            .iter()
            .any(|accept| accept_header_matches(produces, accept.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(values: &[&str]) -> Vec<MediaType> {
        values.iter().map(|v| MediaType::parse(v).unwrap()).collect()
    }

    #[test]
    fn test_content_type_matching() {
        let consumes = types(&["application/json"]);
        assert_eq!(content_type_matches(&consumes, "application/json"), Ok(true));
        assert_eq!(
            content_type_matches(&consumes, "application/json; charset=utf-8"),
            Ok(true)
        );
        assert_eq!(content_type_matches(&consumes, "text/xml"), Ok(false));
        assert!(content_type_matches(&consumes, "not a type").is_err());
        assert_eq!(content_type_matches(&[], "garbage"), Ok(true));
    }

    #[test]
    fn test_single_produces_single_accept() {
        let produces = types(&["application/json"]);
        assert!(accept_header_matches(&produces, "application/json"));
        assert!(accept_header_matches(&produces, "application/*"));
        assert!(accept_header_matches(&produces, "*/*"));
        assert!(!accept_header_matches(&produces, "text/plain"));
        assert!(!accept_header_matches(&produces, "garbage"));
    }

    #[test]
    fn test_single_produces_comma_list() {
        let produces = types(&["application/json"]);
        assert!(accept_header_matches(&produces, "text/plain, application/json"));
        assert!(accept_header_matches(&produces, "garbage, application/json;q=0.9"));
        assert!(accept_header_matches(&produces, "text/html,*/*;q=0.1"));
        assert!(!accept_header_matches(&produces, "text/plain, text/html,"));
    }

    #[test]
    fn test_multiple_produces() {
        let produces = types(&["application/json", "text/plain"]);
        assert!(accept_header_matches(&produces, "text/plain"));
        assert!(accept_header_matches(&produces, "image/png, text/*"));
        assert!(!accept_header_matches(&produces, "image/png, bogus"));
    }

    #[test]
    fn test_any_accept_matches() {
        let produces = types(&["application/json"]);
        let none: [&str; 0] = [];
        assert!(any_accept_matches(&produces, &none));
        assert!(any_accept_matches(&produces, &["text/plain", "application/json"]));
        assert!(!any_accept_matches(&produces, &["text/plain", "%%%"]));
    }
}
