//! # brrtdispatch
//!
//! **brrtdispatch** is the per-class request dispatch core of a JAX-RS style
//! HTTP framework: given the resource methods of a class, it selects the one
//! that serves a request, and follows sub-resource locators into the objects
//! they return.
//!
//! ## Overview
//!
//! Resource classes declare methods with an HTTP method, a path template and
//! optional `consumes`/`produces` media types. At startup the methods of each
//! class are compiled into a [`RoutingTable`](router::RoutingTable). At request
//! time the engine:
//!
//! 1. matches the root class by its class-level path,
//! 2. runs the class's [`ClassDispatcher`](dispatcher::ClassDispatcher) on the
//!    rest of the path (405/404/415/406 decisions included),
//! 3. invokes the selected method, and when it is a locator, resolves the
//!    returned object's type to its (possibly inherited) routing table and
//!    dispatches the remaining path again.
//!
//! ## Architecture
//!
//! - **[`router`]** - Path templates, per-method mappers and routing tables
//! - **[`dispatcher`]** - The per-class dispatch state machine
//! - **[`locator`]** - Locator results, type hierarchy and table inheritance
//! - **[`engine`]** - Root resource matching and the dispatch loop
//! - **[`request`]** - Mutable per-request state and completion callbacks
//! - **[`instance`]** / **[`scope`]** - Instance creation and lifecycles
//! - **[`media`]** / **[`negotiation`]** - Media types and content negotiation
//! - **[`config`]** / **[`logging`]** - Runtime configuration and tracing setup
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtdispatch::config::DispatchConfig;
//! use brrtdispatch::engine::{DispatchEngine, Handled, Invocation};
//! use brrtdispatch::request::RequestState;
//! use brrtdispatch::resource::ResourceMethod;
//! use http::Method;
//! use std::sync::Arc;
//!
//! struct Items;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DispatchEngine::builder(DispatchConfig::default())
//!     .root::<Items, _>(
//!         "/items",
//!         [ResourceMethod::endpoint("get_item", Method::GET, "/{id}").build()?],
//!     )?
//!     .build();
//!
//! let invoker = |target: &Arc<ResourceMethod>, state: &RequestState| {
//!     Invocation::Response(format!("{} {}", target.name(), state.path_param(0).unwrap_or("")))
//! };
//! let handled = engine.process(RequestState::new(Method::GET, "/items/7"), &invoker)?;
//! assert!(matches!(handled, Handled::Response(ref body) if body == "get_item 7"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! Routing tables and dispatchers are immutable after startup and shared via
//! `Arc`. The locator table cache is a concurrent map; a
//! [`RequestState`](request::RequestState) is owned by one worker at a time.

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod ids;
pub mod instance;
pub mod locator;
pub mod logging;
pub mod media;
pub mod negotiation;
pub mod request;
pub mod resource;
pub mod response;
pub mod router;
pub mod scope;

pub use config::DispatchConfig;
pub use dispatcher::{ClassDispatcher, Dispatch};
pub use engine::{DispatchEngine, Handled, Invocation, ResourceInvoker};
pub use error::{DispatchError, RoutingError};
pub use locator::{LocatorResolver, LocatorResult, TypeDecl, TypeHierarchy, TypeKey};
pub use request::RequestState;
pub use resource::ResourceMethod;
pub use router::RoutingTable;
