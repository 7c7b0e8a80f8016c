//! Mutable per-request dispatch state.
//!
//! A [`RequestState`] is exclusively owned by the worker processing the
//! request. Dispatchers read the method, headers and remaining path from it
//! and commit the selected target and path parameters back into it.

use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, Method};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::DispatchError;
use crate::ids::RequestId;
use crate::locator::ResourceHandle;
use crate::resource::ResourceMethod;
use crate::router::PathParamValues;
use crate::scope::RequestScope;

/// How a request ended, passed to completion callbacks
#[derive(Debug, Clone, Copy)]
pub enum Completion<'a> {
    Success,
    Failed(&'a DispatchError),
    /// The request was dropped before it completed
    Cancelled,
}

/// Callback run exactly once when the request completes
pub type CompletionCallback = Box<dyn for<'a> FnOnce(Completion<'a>) + Send>;

pub struct RequestState {
    request_id: RequestId,
    method: Method,
    content_type: Option<String>,
    accept: SmallVec<[String; 2]>,
    remaining: String,
    path_params: PathParamValues,
    max_path_params: usize,
    param_offset: usize,
    target: Option<Arc<ResourceMethod>>,
    endpoint_instance: Option<ResourceHandle>,
    produces_checked: bool,
    locator_hops: usize,
    scope: RequestScope,
    completion_callbacks: Vec<CompletionCallback>,
    completed: bool,
}

impl RequestState {
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            content_type: None,
            accept: SmallVec::new(),
            remaining: path.to_string(),
            path_params: SmallVec::new(),
            max_path_params: 0,
            param_offset: 0,
            target: None,
            endpoint_instance: None,
            produces_checked: false,
            locator_hops: 0,
            scope: RequestScope::new(),
            completion_callbacks: Vec::new(),
            completed: false,
        }
    }

    /// Build from a method, path and header map. Every `Accept` header
    /// value is kept; non-UTF-8 `Accept` values are ignored. A non-UTF-8
    /// `Content-Type` is kept lossily so it fails media-type parsing.
    #[must_use]
    pub fn from_headers(method: Method, path: &str, headers: &HeaderMap) -> Self {
        let mut state = Self::new(method, path);
        if let Some(ct) = headers.get(CONTENT_TYPE) {
            state = state.with_content_type(&String::from_utf8_lossy(ct.as_bytes()));
        }
        for value in headers.get_all(ACCEPT) {
            if let Ok(accept) = value.to_str() {
                state = state.with_accept(accept);
            }
        }
        if let Some(id) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
            state.request_id = RequestId::from_header_or_new(Some(id));
        }
        state
    }

    #[must_use]
    pub fn with_request_id(mut self, id: RequestId) -> Self {
        self.request_id = id;
        self
    }

    /// Set the `Content-Type`; blank values are treated as absent
    #[must_use]
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        let trimmed = content_type.trim();
        self.content_type = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Append one `Accept` header value; blank values are dropped
    #[must_use]
    pub fn with_accept(mut self, accept: &str) -> Self {
        let trimmed = accept.trim();
        if !trimmed.is_empty() {
            self.accept.push(trimmed.to_string());
        }
        self
    }

    #[inline]
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[inline]
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn accept(&self) -> &[String] {
        &self.accept
    }

    /// Part of the path not yet consumed by a dispatcher
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> &str {
        &self.remaining
    }

    pub fn set_remaining(&mut self, remaining: String) {
        self.remaining = remaining;
    }

    /// Selected resource method, if any
    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<&Arc<ResourceMethod>> {
        self.target.as_ref()
    }

    /// Select a new target, resetting the per-target flags
    pub fn restart(&mut self, target: Arc<ResourceMethod>) {
        self.target = Some(target);
        self.produces_checked = false;
    }

    /// Value committed at absolute slot `index`
    #[must_use]
    pub fn path_param(&self, index: usize) -> Option<&str> {
        self.path_params.get(index).and_then(|v| v.as_deref())
    }

    /// Committed slots, up to the current maximum
    #[must_use]
    pub fn path_params(&self) -> &[Option<String>] {
        let len = self.max_path_params.min(self.path_params.len());
        &self.path_params[..len]
    }

    pub fn set_path_param(&mut self, index: usize, value: String) {
        if index >= self.path_params.len() {
            self.path_params.resize(index + 1, None);
        }
        self.path_params[index] = Some(value);
        self.max_path_params = self.max_path_params.max(index + 1);
    }

    #[inline]
    #[must_use]
    pub fn max_path_params(&self) -> usize {
        self.max_path_params
    }

    /// Raise the slot count; it never shrinks during a request
    pub fn set_max_path_params(&mut self, max: usize) {
        if max > self.max_path_params {
            self.max_path_params = max;
            if max > self.path_params.len() {
                self.path_params.resize(max, None);
            }
        }
    }

    /// First slot the next dispatch hop writes into
    #[inline]
    #[must_use]
    pub fn param_offset(&self) -> usize {
        self.param_offset
    }

    pub fn set_param_offset(&mut self, offset: usize) {
        self.param_offset = offset;
    }

    #[inline]
    #[must_use]
    pub fn endpoint_instance(&self) -> Option<&ResourceHandle> {
        self.endpoint_instance.as_ref()
    }

    pub fn set_endpoint_instance(&mut self, instance: ResourceHandle) {
        self.endpoint_instance = Some(instance);
    }

    /// True once the target's `produces` was verified against `Accept`
    #[inline]
    #[must_use]
    pub fn produces_checked(&self) -> bool {
        self.produces_checked
    }

    pub fn set_produces_checked(&mut self, checked: bool) {
        self.produces_checked = checked;
    }

    /// Number of locator hops taken so far
    #[inline]
    #[must_use]
    pub fn locator_hops(&self) -> usize {
        self.locator_hops
    }

    /// Count one more locator hop, failing once `limit` is exceeded
    pub fn enter_locator(&mut self, limit: usize) -> Result<usize, DispatchError> {
        if self.locator_hops >= limit {
            return Err(DispatchError::LocatorDepthExceeded { limit });
        }
        self.locator_hops += 1;
        Ok(self.locator_hops)
    }

    #[must_use]
    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut RequestScope {
        &mut self.scope
    }

    /// Register a callback run once when the request completes or is dropped
    pub fn register_completion_callback(&mut self, callback: CompletionCallback) {
        self.completion_callbacks.push(callback);
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Run the completion callbacks (in registration order) and tear down
    /// the request scope. Later calls are no-ops.
    pub fn complete(&mut self, outcome: Completion<'_>) {
        if self.completed {
            return;
        }
        self.completed = true;
        debug!(
            request_id = %self.request_id,
            callbacks = self.completion_callbacks.len(),
            outcome = ?outcome,
            "Request completed"
        );
        for callback in self.completion_callbacks.drain(..) {
            callback(outcome);
        }
        self.scope.destroy_all();
    }
}

impl Drop for RequestState {
    fn drop(&mut self) {
        self.complete(Completion::Cancelled);
    }
}

impl fmt::Debug for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestState")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("remaining", &self.remaining)
            .field("path_params", &self.path_params())
            .field("param_offset", &self.param_offset)
            .field("target", &self.target.as_ref().map(|t| t.name()))
            .field("locator_hops", &self.locator_hops)
            .finish_non_exhaustive()
    }
}
