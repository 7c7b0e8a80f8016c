//! Class dispatcher core - hot path for per-class request dispatch.
//!
//! # JSF Compliance (Rule 206)
//!
//! This module runs once per dispatch hop on every request. The following
//! clippy lints are denied to keep allocation off the matching path:
//!
//! - `clippy::inefficient_to_string` - Catches unnecessary allocations
//! - `clippy::format_push_string` - Prevents format! string building
//! - `clippy::unnecessary_to_owned` - Prevents .to_owned() on borrowed data

// NOTE: The 405 scan and the 415 reasons allocate; they are off the fast path
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use http::Method;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::negotiation;
use crate::request::RequestState;
use crate::router::{MethodKey, RequestMatch, ResourceMapper, RoutingTable};
use crate::resource::ResourceMethod;

/// Dispatch hops slower than this are logged as warnings
const SLOW_DISPATCH: Duration = Duration::from_millis(1);

/// Successful outcome of a dispatch hop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Target, remaining path and path parameters were committed to the
    /// request state
    Matched,
    /// Automatic `OPTIONS` answer listing the allowed methods
    Options(Vec<Method>),
    /// Nothing matched and the dispatcher was configured to let the
    /// enclosing application continue instead of answering 404
    Resume,
}

/// Selects a resource method of one resource class for a request.
///
/// Immutable after construction and shared read-only between requests.
#[derive(Debug, Clone)]
pub struct ClassDispatcher {
    table: Arc<RoutingTable>,
    parameter_offset: usize,
    resume_on_404: bool,
}

impl ClassDispatcher {
    /// `parameter_offset` is the number of path parameter slots already
    /// claimed by enclosing templates (the class-level path of a root
    /// resource, for instance).
    #[must_use]
    pub fn new(table: Arc<RoutingTable>, parameter_offset: usize, resume_on_404: bool) -> Self {
        Self {
            table,
            parameter_offset,
            resume_on_404,
        }
    }

    #[inline]
    #[must_use]
    pub fn table(&self) -> &Arc<RoutingTable> {
        &self.table
    }

    #[inline]
    #[must_use]
    pub fn parameter_offset(&self) -> usize {
        self.parameter_offset
    }

    /// Select a target for `state` and commit it.
    ///
    /// # Errors
    ///
    /// `NotFound`, `MethodNotAllowed`, `UnsupportedMediaType` or
    /// `NotAcceptable` when no target can serve the request.
    pub fn dispatch(&self, state: &mut RequestState) -> Result<Dispatch, DispatchError> {
        dispatch_table(&self.table, state, self.parameter_offset, self.resume_on_404)
    }
}

/// Run one dispatch hop of `table` against `state`, writing path parameters
/// from slot `offset` on. Shared by root dispatchers and locator hops.
pub(crate) fn dispatch_table(
    table: &RoutingTable,
    state: &mut RequestState,
    offset: usize,
    resume_on_404: bool,
) -> Result<Dispatch, DispatchError> {
    let start = Instant::now();
    let request_id = state.request_id();
    let method = state.method().clone();

    // CD1: Method lookup with HEAD and OPTIONS fallbacks
    let mut mapper: Option<&Arc<ResourceMapper>> = table.get_method(&method);
    if mapper.is_none() {
        if method == Method::HEAD {
            mapper = table.get_method(&Method::GET);
        } else if method == Method::OPTIONS {
            let allow = options_allow(table);
            debug!(
                request_id = %request_id,
                allow = ?allow,
                "Automatic OPTIONS response"
            );
            return Ok(Dispatch::Options(allow));
        }
        if mapper.is_none() {
            mapper = table.get(&MethodKey::All);
        }
    }

    let target = {
        let path = match state.remaining() {
            "" => "/",
            remaining => remaining,
        };

        let Some(mapper) = mapper else {
            // CD2: No mapper for the method at all
            return reject(table, path, None, resume_on_404, state);
        };

        let mut target = mapper.map(path);
        if target.is_none() && method == Method::HEAD {
            if let Some(get) = table.get_method(&Method::GET) {
                target = get.map(path);
            }
        }
        match target {
            Some(target) => target,
            // CD3: Method has templates but none match the path
            None => return reject(table, path, Some(&method), resume_on_404, state),
        }
    };

    let produces_checked = check_media_types(&target.value, state)?;
    let written = commit(state, target, offset, produces_checked);

    let elapsed = start.elapsed();
    // CD4: Target committed
    debug!(
        request_id = %request_id,
        method = %method,
        target = %state.target().map_or("", |t| t.name()),
        params_written = written,
        remaining = %state.remaining(),
        duration_us = elapsed.as_micros() as u64,
        "Dispatch target selected"
    );
    if elapsed > SLOW_DISPATCH {
        // CD5: Slow dispatch hop
        warn!(
            request_id = %request_id,
            duration_us = elapsed.as_micros() as u64,
            templates = table.len(),
            "Slow dispatch hop"
        );
    }
    Ok(Dispatch::Matched)
}

/// Allowed methods for the automatic `OPTIONS` answer
fn options_allow(table: &RoutingTable) -> Vec<Method> {
    let mut allow = table.allowed_methods();
    for extra in [Method::OPTIONS, Method::HEAD] {
        if !allow.contains(&extra) {
            allow.push(extra);
        }
    }
    allow.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    allow
}

/// Decide between 405 and 404 by scanning every concrete method's mapper
/// (except `exclude`) for a template matching `path`
fn reject(
    table: &RoutingTable,
    path: &str,
    exclude: Option<&Method>,
    resume_on_404: bool,
    state: &RequestState,
) -> Result<Dispatch, DispatchError> {
    let mut allow: Vec<Method> = Vec::new();
    for (key, mapper) in table.raw_entries() {
        let MethodKey::Method(candidate) = key else {
            continue;
        };
        if exclude == Some(candidate) {
            continue;
        }
        if mapper.matches(path) {
            allow.push(candidate.clone());
        }
    }

    if !allow.is_empty() {
        if allow.contains(&Method::GET) && !allow.contains(&Method::HEAD) {
            allow.push(Method::HEAD);
        }
        allow.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        // CD6: Method not allowed
        warn!(
            request_id = %state.request_id(),
            method = %state.method(),
            path = %path,
            allow = ?allow,
            "Method not allowed"
        );
        return Err(DispatchError::MethodNotAllowed { allow });
    }

    if resume_on_404 {
        debug!(
            request_id = %state.request_id(),
            path = %path,
            "No match, resuming enclosing chain"
        );
        return Ok(Dispatch::Resume);
    }

    // CD7: Not found
    info!(
        request_id = %state.request_id(),
        method = %state.method(),
        path = %path,
        "No matching resource method"
    );
    Err(DispatchError::NotFound)
}

/// Verify `Content-Type` against `consumes` and `Accept` against `produces`.
/// Returns whether `produces` was checked.
fn check_media_types(
    target: &ResourceMethod,
    state: &RequestState,
) -> Result<bool, DispatchError> {
    if let Some(content_type) = state.content_type() {
        match negotiation::content_type_matches(target.consumes(), content_type) {
            Ok(true) => {}
            Ok(false) => {
                return Err(DispatchError::unsupported(
                    "The content-type header value did not match the value in consumes",
                ))
            }
            Err(e) => {
                return Err(DispatchError::unsupported(format!(
                    "The content-type header value did not correspond to a valid media type: {e}"
                )))
            }
        }
    }

    if !target.produces().is_empty() {
        if !negotiation::any_accept_matches(target.produces(), state.accept()) {
            debug!(
                request_id = %state.request_id(),
                target = %target.name(),
                "Accept header rejected"
            );
            return Err(DispatchError::NotAcceptable);
        }
        return Ok(true);
    }
    Ok(false)
}

/// Commit the match: target, remaining path and the leading run of set
/// parameter values at `offset`. Returns how many values were written.
fn commit(
    state: &mut RequestState,
    target: RequestMatch<Arc<ResourceMethod>>,
    offset: usize,
    produces_checked: bool,
) -> usize {
    let RequestMatch {
        value,
        remaining,
        path_param_values,
    } = target;
    state.restart(value);
    state.set_produces_checked(produces_checked);
    state.set_remaining(remaining);
    state.set_max_path_params(offset + path_param_values.len());

    let mut written = 0;
    for value in path_param_values {
        let Some(value) = value else {
            break;
        };
        state.set_path_param(offset + written, value);
        written += 1;
    }
    state.set_param_offset(offset + written);
    written
}
