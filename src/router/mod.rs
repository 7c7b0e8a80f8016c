//! # Router Module
//!
//! The router module provides path matching and per-class routing tables for
//! the dispatch engine.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Compiling path templates (`/items/{id}`) into anchored matchers
//! - Grouping templates per HTTP method into a [`RoutingTable`]
//! - Merging tables when a locator's type inherits several method sets
//! - Extracting ordered path parameter values from matched paths
//!
//! ## Architecture
//!
//! 1. **Compilation**: at registration time each template becomes a regex
//!    with one named group per parameter. Templates are ordered from most to
//!    least specific inside a [`RequestMapper`].
//!
//! 2. **Matching**: [`RequestMapper::map`] tries the templates in order and
//!    returns the target, the unmatched suffix (for locator prefixes) and the
//!    parameter values.
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::resource::ResourceMethod;
//! use brrtdispatch::router::{MethodKey, RoutingTable};
//! use http::Method;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = RoutingTable::from_resources([
//!     ResourceMethod::endpoint("get_item", Method::GET, "/items/{id}").build()?,
//! ]);
//! let mapper = table.get(&MethodKey::Method(Method::GET)).unwrap();
//! let matched = mapper.map("/items/42").unwrap();
//! assert_eq!(matched.value.name(), "get_item");
//! assert_eq!(matched.path_param_values[0].as_deref(), Some("42"));
//! # Ok(())
//! # }
//! ```

mod core;
mod table;

pub use core::{
    PathParamValues, PathTemplate, RequestMapper, RequestMatch, RequestPath, MAX_INLINE_PARAMS,
};
pub use table::{MethodKey, ResourceMapper, RoutingEntries, RoutingTable, RoutingTableBuilder};
