//! # Dispatcher Module
//!
//! The dispatcher module selects the resource method of one resource class
//! that serves a request.
//!
//! ## Overview
//!
//! A [`ClassDispatcher`] owns the [`RoutingTable`](crate::router::RoutingTable)
//! of its class. For every request it:
//! - Looks up the mapper for the request method, answering `HEAD` with the
//!   `GET` templates and `OPTIONS` automatically when neither is registered
//! - Falls back to the "all methods" tier (sub-resource locators)
//! - Matches the remaining path, telling 405 apart from 404 on a miss
//! - Verifies `Content-Type` (415) and `Accept` (406) against the target
//! - Commits the target, the unmatched path suffix and the path parameters
//!
//! ## Path Parameter Slots
//!
//! Parameter values are written into the request's slots starting at the
//! dispatcher's offset. Enclosing templates (a root resource's class path or
//! an earlier locator hop) own the slots before it, so each hop appends.
//!
//! ## Request Flow
//!
//! ```text
//! method lookup ─► path match ─► consumes ─► produces ─► commit
//!      │              │             │            │
//!   OPTIONS       405 / 404        415          406
//! ```

mod core;

pub(crate) use core::dispatch_table;
pub use core::{ClassDispatcher, Dispatch};
