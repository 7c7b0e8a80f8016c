//! Router core module - hot path for path matching.
//!
//! # JSF Compliance (Rule 206)
//!
//! This module is part of the request hot path. The following clippy lints
//! are denied to enforce "no heap allocations after initialization":
//!
//! - `clippy::inefficient_to_string` - Catches unnecessary allocations
//! - `clippy::format_push_string` - Prevents format! string building
//! - `clippy::unnecessary_to_owned` - Prevents .to_owned() on borrowed data

// JSF Rule 206: Deny heap allocations in the hot path
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use regex::Regex;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

use crate::error::RoutingError;

/// Maximum number of path parameters before heap allocation.
/// Most REST APIs have ≤4 path params (e.g., /users/{id}/posts/{postId}).
/// JSF Rule: No heap allocations in the hot path for common cases.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Ordered path parameter values extracted by a match.
///
/// The vector is as long as the largest template in the mapper; entries past
/// the matched template's own parameters are `None`.
pub type PathParamValues = SmallVec<[Option<String>; MAX_INLINE_PARAMS]>;

/// Default pattern for a `{name}` parameter: one path segment
const DEFAULT_PARAM_PATTERN: &str = "[^/]+";

/// A compiled path template such as `/users/{id}/posts/{post_id: \d+}`.
///
/// The template is anchored at the start of the path only; whether the rest
/// of the path may remain unmatched is decided by the owning [`RequestPath`].
#[derive(Debug, Clone)]
pub struct PathTemplate {
    source: String,
    regex: Regex,
    param_names: Vec<Arc<str>>,
    /// Capture group name per parameter (`p0`, `p1`, ...)
    group_names: Vec<Box<str>>,
    literal_chars: usize,
}

impl PathTemplate {
    /// Compile a template.
    ///
    /// Parameters are written `{name}` or `{name: regex}`. A trailing `/` is
    /// ignored and `/` (or the empty string) is the root template.
    pub fn parse(template: &str) -> Result<Self, RoutingError> {
        let trimmed = template.trim_end_matches('/');
        let normalized = if trimmed.is_empty() || trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };

        let invalid = |reason: &str| RoutingError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut pattern = String::with_capacity(normalized.len() + 16);
        pattern.push('^');
        let mut param_names: Vec<Arc<str>> = Vec::with_capacity(normalized.matches('{').count());
        let mut literal_chars = 0;
        let mut literal = String::new();

        let mut chars = normalized.char_indices();
        while let Some((start, c)) = chars.next() {
            match c {
                '{' => {
                    pattern.push_str(&regex::escape(&literal));
                    literal.clear();

                    // Parameter regexes may contain their own `{m,n}` quantifiers
                    let mut depth = 1;
                    let mut end = None;
                    for (idx, inner) in chars.by_ref() {
                        match inner {
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    end = Some(idx);
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                    let end = end.ok_or_else(|| invalid("unbalanced '{'"))?;
                    let body = &normalized[start + 1..end];
                    let (name, custom) = match body.split_once(':') {
                        Some((name, custom)) => (name.trim(), Some(custom.trim())),
                        None => (body.trim(), None),
                    };
                    if name.is_empty() {
                        return Err(invalid("parameter without a name"));
                    }
                    let group = param_names.len();
                    pattern.push_str("(?P<p");
                    pattern.push_str(&group.to_string());
                    pattern.push('>');
                    pattern.push_str(custom.unwrap_or(DEFAULT_PARAM_PATTERN));
                    pattern.push(')');
                    param_names.push(Arc::from(name));
                }
                '}' => return Err(invalid("unbalanced '}'")),
                other => {
                    literal.push(other);
                    literal_chars += 1;
                }
            }
        }
        pattern.push_str(&regex::escape(&literal));

        let regex = Regex::new(&pattern).map_err(|e| invalid(&e.to_string()))?;
        let group_names = (0..param_names.len())
            .map(|idx| format!("p{idx}").into_boxed_str())
            .collect();

        Ok(Self {
            source: if normalized.is_empty() {
                "/".to_string()
            } else {
                normalized
            },
            regex,
            param_names,
            group_names,
            literal_chars,
        })
    }

    /// Template text as normalized at parse time
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[inline]
    #[must_use]
    pub fn param_names(&self) -> &[Arc<str>] {
        &self.param_names
    }

    #[inline]
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.param_names.len()
    }

    /// Number of literal (non-parameter) characters; more literal text means
    /// a more specific template.
    #[inline]
    #[must_use]
    pub fn literal_chars(&self) -> usize {
        self.literal_chars
    }

    /// Match the template against the start of `path`.
    ///
    /// Returns the byte offset where the match ends and writes the captured
    /// values into `values[..param_count]`.
    fn match_prefix(&self, path: &str, values: &mut PathParamValues) -> Option<usize> {
        let captures = self.regex.captures(path)?;
        for (slot, group) in values.iter_mut().zip(&self.group_names) {
            *slot = captures.name(group).map(|m| m.as_str().to_string());
        }
        captures.get(0).map(|m| m.end())
    }
}

impl PartialEq for PathTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PathTemplate {}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A template registered in a [`RequestMapper`] together with its target
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPath<T> {
    /// Prefix templates leave the unmatched suffix for a later hop
    pub prefix: bool,
    pub template: Arc<PathTemplate>,
    pub value: T,
    /// Copy of an "all methods" template placed behind a concrete method
    pub inherited: bool,
}

impl<T> RequestPath<T> {
    #[must_use]
    pub fn new(prefix: bool, template: Arc<PathTemplate>, value: T) -> Self {
        Self {
            prefix,
            template,
            value,
            inherited: false,
        }
    }

    /// Mark this path as a copy distributed from the "all methods" tier
    #[must_use]
    pub fn into_inherited(mut self) -> Self {
        self.inherited = true;
        self
    }
}

/// Result of a successful [`RequestMapper::map`]
#[derive(Debug, Clone)]
pub struct RequestMatch<T> {
    pub value: T,
    /// Unmatched suffix of the path (empty when fully consumed)
    pub remaining: String,
    pub path_param_values: PathParamValues,
}

/// Ordered collection of path templates for one resource class and method.
///
/// Templates are tried from most to least specific (more literal characters
/// first, then more parameters); equally specific templates keep their
/// registration order. [`RequestMapper::templates`] still exposes the
/// registration order so mappers can be re-joined.
#[derive(Debug, Clone)]
pub struct RequestMapper<T> {
    templates: Vec<RequestPath<T>>,
    order: Vec<usize>,
    max_params: usize,
}

impl<T: Clone> RequestMapper<T> {
    #[must_use]
    pub fn new(templates: Vec<RequestPath<T>>) -> Self {
        let mut order: Vec<usize> = (0..templates.len()).collect();
        order.sort_by(|&a, &b| {
            let (ta, tb) = (&templates[a].template, &templates[b].template);
            tb.literal_chars()
                .cmp(&ta.literal_chars())
                .then_with(|| tb.param_count().cmp(&ta.param_count()))
                .then_with(|| templates[a].prefix.cmp(&templates[b].prefix))
        });
        let max_params = templates
            .iter()
            .map(|t| t.template.param_count())
            .max()
            .unwrap_or(0);

        Self {
            templates,
            order,
            max_params,
        }
    }

    /// Templates in registration order
    #[inline]
    #[must_use]
    pub fn templates(&self) -> &[RequestPath<T>] {
        &self.templates
    }

    /// Largest parameter count of any template; also the length of
    /// [`RequestMatch::path_param_values`].
    #[inline]
    #[must_use]
    pub fn max_params(&self) -> usize {
        self.max_params
    }

    /// Find the most specific template matching `path`.
    ///
    /// Terminal templates must consume the whole path (a single trailing `/`
    /// is tolerated); prefix templates must stop on a segment boundary.
    #[must_use]
    pub fn map(&self, path: &str) -> Option<RequestMatch<T>> {
        let mut values: PathParamValues = SmallVec::from_elem(None, self.max_params);
        for &idx in &self.order {
            let candidate = &self.templates[idx];
            let Some(end) = candidate.template.match_prefix(path, &mut values) else {
                continue;
            };
            let rest = &path[end..];
            let accepted = if candidate.prefix {
                rest.is_empty() || rest.starts_with('/')
            } else {
                rest.is_empty() || rest == "/"
            };
            if !accepted {
                values.iter_mut().for_each(|v| *v = None);
                continue;
            }
            // Drop values written by a longer template that failed earlier
            for slot in values.iter_mut().skip(candidate.template.param_count()) {
                *slot = None;
            }
            return Some(RequestMatch {
                value: candidate.value.clone(),
                remaining: if candidate.prefix {
                    rest.to_string()
                } else {
                    String::new()
                },
                path_param_values: values,
            });
        }
        None
    }

    /// Cheap yes/no variant of [`RequestMapper::map`] used by the 405 scan
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.map(path).is_some()
    }
}

impl<T: PartialEq> PartialEq for RequestMapper<T> {
    fn eq(&self, other: &Self) -> bool {
        self.templates == other.templates
    }
}
