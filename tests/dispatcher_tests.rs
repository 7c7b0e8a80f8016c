//! Tests for the per-class dispatch state machine
//!
//! # Test Coverage
//!
//! - Method lookup: exact match, `HEAD` via `GET`, automatic `OPTIONS`,
//!   the "all methods" tier
//! - 405 versus 404 decisions and the `Allow` list
//! - `Content-Type` (415) and `Accept` (406) checks
//! - Committing the target, remaining path and parameter slots at an offset

mod common;

use brrtdispatch::dispatcher::{ClassDispatcher, Dispatch};
use brrtdispatch::error::DispatchError;
use brrtdispatch::request::RequestState;
use brrtdispatch::resource::ResourceMethod;
use common::fixtures::{dispatcher, endpoint, locator, table};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method};
use tracing_util::TestTracing;

fn target_name(state: &RequestState) -> &str {
    state.target().map(|t| t.name()).unwrap_or("<none>")
}

#[test]
fn test_exact_method_and_path() {
    let d = dispatcher([
        endpoint("list", Method::GET, "/x"),
        endpoint("show", Method::GET, "/x/{id}"),
    ]);
    let mut state = RequestState::new(Method::GET, "/x/42");
    assert_eq!(d.dispatch(&mut state), Ok(Dispatch::Matched));
    assert_eq!(target_name(&state), "show");
    assert_eq!(state.path_param(0), Some("42"));
    assert_eq!(state.remaining(), "");
    assert_eq!(state.param_offset(), 1);
}

#[test]
fn test_post_only_resource_rejects_get_with_allow_post() {
    let d = dispatcher([endpoint("create", Method::POST, "/x")]);
    let mut state = RequestState::new(Method::GET, "/x");
    assert_eq!(
        d.dispatch(&mut state),
        Err(DispatchError::MethodNotAllowed {
            allow: vec![Method::POST]
        })
    );
    assert!(state.target().is_none());
}

#[test]
fn test_allow_list_collects_every_matching_method() {
    let d = dispatcher([
        endpoint("get", Method::GET, "/x"),
        endpoint("post", Method::POST, "/x"),
        endpoint("other", Method::DELETE, "/y"),
    ]);
    let mut state = RequestState::new(Method::PUT, "/x");
    let err = d.dispatch(&mut state).unwrap_err();
    assert_eq!(
        err,
        DispatchError::MethodNotAllowed {
            allow: vec![Method::GET, Method::HEAD, Method::POST]
        }
    );
    assert_eq!(err.allow_header().as_deref(), Some("GET, HEAD, POST"));
}

#[test]
fn test_method_registered_but_path_only_matches_other_method() {
    let d = dispatcher([
        endpoint("get_y", Method::GET, "/y"),
        endpoint("post_x", Method::POST, "/x"),
    ]);
    let mut state = RequestState::new(Method::GET, "/x");
    assert_eq!(
        d.dispatch(&mut state),
        Err(DispatchError::MethodNotAllowed {
            allow: vec![Method::POST]
        })
    );
}

#[test]
fn test_unknown_path_is_not_found() {
    let d = dispatcher([endpoint("get", Method::GET, "/x")]);
    let mut state = RequestState::new(Method::GET, "/nope");
    assert_eq!(d.dispatch(&mut state), Err(DispatchError::NotFound));

    let mut state = RequestState::new(Method::DELETE, "/nope");
    assert_eq!(d.dispatch(&mut state), Err(DispatchError::NotFound));
}

#[test]
fn test_resume_on_404() {
    let d = ClassDispatcher::new(table([endpoint("get", Method::GET, "/x")]), 0, true);
    let mut state = RequestState::new(Method::GET, "/nope");
    assert_eq!(d.dispatch(&mut state), Ok(Dispatch::Resume));

    // 405 still wins over resuming
    let mut state = RequestState::new(Method::POST, "/x");
    assert!(matches!(
        d.dispatch(&mut state),
        Err(DispatchError::MethodNotAllowed { .. })
    ));
}

#[test]
fn test_head_served_by_get() {
    let d = dispatcher([endpoint("get", Method::GET, "/x")]);
    let mut state = RequestState::new(Method::HEAD, "/x");
    assert_eq!(d.dispatch(&mut state), Ok(Dispatch::Matched));
    assert_eq!(target_name(&state), "get");
}

#[test]
fn test_head_retries_get_when_head_templates_miss() {
    let d = dispatcher([
        endpoint("head_y", Method::HEAD, "/y"),
        endpoint("get_x", Method::GET, "/x"),
    ]);
    let mut state = RequestState::new(Method::HEAD, "/x");
    assert_eq!(d.dispatch(&mut state), Ok(Dispatch::Matched));
    assert_eq!(target_name(&state), "get_x");
}

#[test]
fn test_automatic_options() {
    let d = dispatcher([
        endpoint("get", Method::GET, "/x"),
        endpoint("put", Method::PUT, "/x"),
    ]);
    let mut state = RequestState::new(Method::OPTIONS, "/anything");
    assert_eq!(
        d.dispatch(&mut state),
        Ok(Dispatch::Options(vec![
            Method::GET,
            Method::HEAD,
            Method::OPTIONS,
            Method::PUT
        ]))
    );
    assert!(state.target().is_none());
}

#[test]
fn test_explicit_options_method_wins() {
    let d = dispatcher([endpoint("opts", Method::OPTIONS, "/x")]);
    let mut state = RequestState::new(Method::OPTIONS, "/x");
    assert_eq!(d.dispatch(&mut state), Ok(Dispatch::Matched));
    assert_eq!(target_name(&state), "opts");
}

#[test]
fn test_all_methods_tier_handles_any_method() {
    let d = dispatcher([
        endpoint("get", Method::GET, "/x"),
        locator("sub", "/x/{id}/sub"),
    ]);
    let mut state = RequestState::new(Method::PATCH, "/x/7/sub/deeper");
    assert_eq!(d.dispatch(&mut state), Ok(Dispatch::Matched));
    assert_eq!(target_name(&state), "sub");
    assert_eq!(state.remaining(), "/deeper");
    assert_eq!(state.path_param(0), Some("7"));
}

#[test]
fn test_all_methods_tier_never_listed_in_allow() {
    let d = dispatcher([
        endpoint("get", Method::GET, "/x"),
        locator("sub", "/x/{id}/sub"),
    ]);
    let mut state = RequestState::new(Method::DELETE, "/x");
    assert_eq!(
        d.dispatch(&mut state),
        Err(DispatchError::MethodNotAllowed {
            allow: vec![Method::GET, Method::HEAD]
        })
    );
}

#[test]
fn test_empty_remaining_matches_root_template() {
    let d = dispatcher([endpoint("root", Method::GET, "/")]);
    let mut state = RequestState::new(Method::GET, "");
    assert_eq!(d.dispatch(&mut state), Ok(Dispatch::Matched));
    assert_eq!(target_name(&state), "root");
}

#[test]
fn test_unsupported_content_type() {
    let create = ResourceMethod::endpoint("create", Method::POST, "/x")
        .consumes(&["application/json"])
        .build()
        .unwrap();
    let d = dispatcher([create]);

    let mut state = RequestState::new(Method::POST, "/x").with_content_type("text/plain");
    assert!(matches!(
        d.dispatch(&mut state),
        Err(DispatchError::UnsupportedMediaType { .. })
    ));

    let mut state = RequestState::new(Method::POST, "/x").with_content_type("garbage");
    let err = d.dispatch(&mut state).unwrap_err();
    assert_eq!(err.status(), http::StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(err.to_string().contains("valid media type"));

    let mut state =
        RequestState::new(Method::POST, "/x").with_content_type("application/json; charset=utf-8");
    assert_eq!(d.dispatch(&mut state), Ok(Dispatch::Matched));

    // No Content-Type means nothing to check
    let mut state = RequestState::new(Method::POST, "/x");
    assert_eq!(d.dispatch(&mut state), Ok(Dispatch::Matched));
}

#[test]
fn test_non_utf8_content_type_is_unsupported() {
    let create = ResourceMethod::endpoint("create", Method::POST, "/x")
        .consumes(&["application/json"])
        .build()
        .unwrap();
    let d = dispatcher([create]);

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_bytes(b"text/\xffxml").unwrap());
    let mut state = RequestState::from_headers(Method::POST, "/x", &headers);
    assert!(state.content_type().is_some());

    let err = d.dispatch(&mut state).unwrap_err();
    assert!(matches!(err, DispatchError::UnsupportedMediaType { .. }));
    assert_eq!(err.status(), http::StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(state.target().is_none());
}

#[test]
fn test_not_acceptable() {
    let show = ResourceMethod::endpoint("show", Method::GET, "/x")
        .produces(&["application/json"])
        .build()
        .unwrap();
    let d = dispatcher([show]);

    let mut state = RequestState::new(Method::GET, "/x").with_accept("text/html");
    assert_eq!(d.dispatch(&mut state), Err(DispatchError::NotAcceptable));
    assert!(!state.produces_checked());

    for accept in [
        "*/*",
        "application/*",
        "text/html, application/json",
        "garbage, application/json",
    ] {
        let mut state = RequestState::new(Method::GET, "/x").with_accept(accept);
        assert_eq!(d.dispatch(&mut state), Ok(Dispatch::Matched), "accept: {accept}");
        assert!(state.produces_checked());
    }

    let mut state = RequestState::new(Method::GET, "/x")
        .with_accept("text/html")
        .with_accept("application/json");
    assert_eq!(d.dispatch(&mut state), Ok(Dispatch::Matched));

    let mut state = RequestState::new(Method::GET, "/x");
    assert_eq!(d.dispatch(&mut state), Ok(Dispatch::Matched));
}

#[test]
fn test_params_written_at_offset() {
    let d = ClassDispatcher::new(
        table([endpoint("pair", Method::GET, "/{a}/{b}")]),
        1,
        false,
    );
    let mut state = RequestState::new(Method::GET, "/one/two");
    state.set_path_param(0, "class".to_string());
    assert_eq!(d.dispatch(&mut state), Ok(Dispatch::Matched));
    assert_eq!(state.path_param(0), Some("class"));
    assert_eq!(state.path_param(1), Some("one"));
    assert_eq!(state.path_param(2), Some("two"));
    assert_eq!(state.max_path_params(), 3);
    assert_eq!(state.param_offset(), 3);
}

#[test]
fn test_commit_stops_at_first_unset_value() {
    let d = dispatcher([
        endpoint("two", Method::GET, "/a/{x}/{y}"),
        endpoint("one", Method::GET, "/b/{x}"),
    ]);
    let mut state = RequestState::new(Method::GET, "/b/1");
    assert_eq!(d.dispatch(&mut state), Ok(Dispatch::Matched));
    assert_eq!(target_name(&state), "one");
    assert_eq!(state.path_param(0), Some("1"));
    assert_eq!(state.path_param(1), None);
    assert_eq!(state.max_path_params(), 2);
    assert_eq!(state.param_offset(), 1);
}

#[test]
fn test_method_not_allowed_is_logged() {
    let tracing = TestTracing::init();
    let d = dispatcher([endpoint("create", Method::POST, "/x")]);
    let mut state = RequestState::new(Method::GET, "/x");
    let _ = d.dispatch(&mut state);

    let events = tracing.events("Method not allowed");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["level"], "WARN");
    assert_eq!(
        events[0]["fields"]["request_id"],
        state.request_id().to_string()
    );
}
