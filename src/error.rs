//! Error types for registration and request dispatch.

use http::{Method, StatusCode};
use thiserror::Error;

use crate::media::MediaTypeError;

/// Failures raised while resolving a request to a resource method.
///
/// The first four variants are request-level outcomes surfaced to the client
/// with their HTTP status. The locator variants reflect a deployment problem
/// and map to 500.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Unable to find matching target resource method")]
    NotFound,
    #[error("HTTP method not allowed for this resource")]
    MethodNotAllowed {
        /// Methods that would have matched the request path
        allow: Vec<Method>,
    },
    #[error("The accept header value did not match the value in produces")]
    NotAcceptable,
    #[error("{reason}")]
    UnsupportedMediaType { reason: String },
    #[error("Resource locator returned an object that was not a resource: {type_name}")]
    MisconfiguredLocator { type_name: String },
    #[error("Resource locator chain exceeded {limit} hops")]
    LocatorDepthExceeded { limit: usize },
}

impl DispatchError {
    /// HTTP status this failure is reported with
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NotFound => StatusCode::NOT_FOUND,
            DispatchError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            DispatchError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DispatchError::MisconfiguredLocator { .. }
            | DispatchError::LocatorDepthExceeded { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for the 4xx family; false for deployment errors
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Value of the `Allow` header for 405 responses
    #[must_use]
    pub fn allow_header(&self) -> Option<String> {
        match self {
            DispatchError::MethodNotAllowed { allow } => Some(join_methods(allow)),
            _ => None,
        }
    }

    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        DispatchError::UnsupportedMediaType {
            reason: reason.into(),
        }
    }
}

/// Problems detected while registering resources or building routing tables
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("httpMethod cannot be an empty string which is a reserved value for all HTTP methods")]
    ReservedMethodName,
    #[error("'{0}' is not a valid HTTP method token")]
    InvalidMethod(String),
    #[error("invalid path template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },
    #[error("resource method '{method}' declares an invalid media type: {source}")]
    InvalidMediaType {
        method: String,
        #[source]
        source: MediaTypeError,
    },
}

/// Render methods as a comma separated header value
#[must_use]
pub fn join_methods(methods: &[Method]) -> String {
    let mut out = String::with_capacity(methods.len() * 8);
    for (idx, method) in methods.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        out.push_str(method.as_str());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(DispatchError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(DispatchError::NotAcceptable.status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(
            DispatchError::unsupported("bad").status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        let misconfigured = DispatchError::MisconfiguredLocator {
            type_name: "Foo".into(),
        };
        assert_eq!(misconfigured.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!misconfigured.is_client_error());
        assert!(DispatchError::NotFound.is_client_error());
    }

    #[test]
    fn test_allow_header() {
        let err = DispatchError::MethodNotAllowed {
            allow: vec![Method::GET, Method::POST],
        };
        assert_eq!(err.allow_header().as_deref(), Some("GET, POST"));
        assert_eq!(DispatchError::NotFound.allow_header(), None);
    }
}
