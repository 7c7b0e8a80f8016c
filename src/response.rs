//! Response shapes for dispatch outcomes the engine answers by itself.
//!
//! # JSF Compliance
//!
//! Uses `SmallVec` for headers to avoid heap allocation in the common case.

use http::Method;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;

use crate::error::{join_methods, DispatchError};

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 8;

/// Stack-allocated header storage; names are shared `Arc<str>`
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Status, headers and JSON body of an engine-generated response
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    pub body: Value,
}

impl DispatchResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// JSON response with a `content-type` header
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// `{"error": message}` body
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    /// Empty 200 answer to an automatic `OPTIONS` request
    #[must_use]
    pub fn allow(methods: &[Method]) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("allow"), join_methods(methods)));
        Self {
            status: 200,
            headers,
            body: Value::Null,
        }
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (case-insensitive)
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

impl From<&DispatchError> for DispatchResponse {
    fn from(err: &DispatchError) -> Self {
        let mut response = Self::error(err.status().as_u16(), &err.to_string());
        if let Some(allow) = err.allow_header() {
            response.set_header("allow", allow);
        }
        response
    }
}
