//! Resource method metadata: the values stored in routing tables.

use http::Method;
use std::fmt;
use std::sync::Arc;

use crate::error::RoutingError;
use crate::media::{sort_by_specificity, MediaType};
use crate::router::PathTemplate;

/// Whether a resource method produces a response or hands off to a locator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Terminal method; its template must consume the whole remaining path
    Endpoint,
    /// Sub-resource locator; its template matches a prefix of the path
    Locator,
}

/// One application-defined handler for an HTTP method + path template.
///
/// Read-only once built. `produces` is kept sorted from most to least
/// specific so negotiation can scan it in preference order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceMethod {
    name: Arc<str>,
    http_method: Option<Method>,
    template: Arc<PathTemplate>,
    consumes: Vec<MediaType>,
    produces: Vec<MediaType>,
    kind: ResourceKind,
}

impl ResourceMethod {
    /// Start describing a terminal endpoint
    #[must_use]
    pub fn endpoint(name: &str, method: Method, path: &str) -> ResourceMethodBuilder {
        ResourceMethodBuilder::new(name, Some(method), path, ResourceKind::Endpoint)
    }

    /// Start describing a sub-resource locator. Locators answer every method.
    #[must_use]
    pub fn locator(name: &str, path: &str) -> ResourceMethodBuilder {
        ResourceMethodBuilder::new(name, None, path, ResourceKind::Locator)
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` means the method answers every HTTP method
    #[inline]
    #[must_use]
    pub fn http_method(&self) -> Option<&Method> {
        self.http_method.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn template(&self) -> &Arc<PathTemplate> {
        &self.template
    }

    #[inline]
    #[must_use]
    pub fn consumes(&self) -> &[MediaType] {
        &self.consumes
    }

    #[inline]
    #[must_use]
    pub fn produces(&self) -> &[MediaType] {
        &self.produces
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn is_locator(&self) -> bool {
        self.kind == ResourceKind::Locator
    }

    /// Number of path parameters declared by the template
    #[inline]
    #[must_use]
    pub fn path_param_count(&self) -> usize {
        self.template.param_count()
    }
}

impl fmt::Display for ResourceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.http_method {
            Some(method) => write!(f, "{method} {} -> {}", self.template, self.name),
            None => write!(f, "* {} -> {}", self.template, self.name),
        }
    }
}

/// Builder returned by [`ResourceMethod::endpoint`] and [`ResourceMethod::locator`]
#[derive(Debug, Clone)]
pub struct ResourceMethodBuilder {
    name: String,
    http_method: Option<Method>,
    path: String,
    consumes: Vec<String>,
    produces: Vec<String>,
    kind: ResourceKind,
}

impl ResourceMethodBuilder {
    fn new(name: &str, http_method: Option<Method>, path: &str, kind: ResourceKind) -> Self {
        Self {
            name: name.to_string(),
            http_method,
            path: path.to_string(),
            consumes: Vec::new(),
            produces: Vec::new(),
            kind,
        }
    }

    /// Media types accepted as request bodies
    #[must_use]
    pub fn consumes(mut self, types: &[&str]) -> Self {
        self.consumes.extend(types.iter().map(|t| t.to_string()));
        self
    }

    /// Media types this method can produce
    #[must_use]
    pub fn produces(mut self, types: &[&str]) -> Self {
        self.produces.extend(types.iter().map(|t| t.to_string()));
        self
    }

    /// Validate the template and media types
    pub fn build(self) -> Result<ResourceMethod, RoutingError> {
        let template = PathTemplate::parse(&self.path)?;
        let consumes = parse_all(&self.name, &self.consumes)?;
        let mut produces = parse_all(&self.name, &self.produces)?;
        sort_by_specificity(&mut produces);

        Ok(ResourceMethod {
            name: Arc::from(self.name.as_str()),
            http_method: self.http_method,
            template: Arc::new(template),
            consumes,
            produces,
            kind: self.kind,
        })
    }
}

fn parse_all(method: &str, raw: &[String]) -> Result<Vec<MediaType>, RoutingError> {
    raw.iter()
        .map(|value| {
            MediaType::parse(value).map_err(|source| RoutingError::InvalidMediaType {
                method: method.to_string(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_builder() {
        let method = ResourceMethod::endpoint("get_item", Method::GET, "/items/{id}")
            .produces(&["*/*", "application/json"])
            .consumes(&["application/json"])
            .build()
            .unwrap();

        assert_eq!(method.name(), "get_item");
        assert_eq!(method.http_method(), Some(&Method::GET));
        assert_eq!(method.path_param_count(), 1);
        assert!(!method.is_locator());
        assert_eq!(method.produces()[0].to_string(), "application/json");
        assert_eq!(method.to_string(), "GET /items/{id} -> get_item");
    }

    #[test]
    fn test_locator_builder() {
        let method = ResourceMethod::locator("sub", "/sub/{a}/{b}").build().unwrap();
        assert!(method.is_locator());
        assert_eq!(method.http_method(), None);
        assert_eq!(method.path_param_count(), 2);
    }

    #[test]
    fn test_invalid_media_type_rejected() {
        let err = ResourceMethod::endpoint("bad", Method::POST, "/x")
            .consumes(&["json"])
            .build()
            .unwrap_err();
        assert!(matches!(err, RoutingError::InvalidMediaType { .. }));
    }
}
