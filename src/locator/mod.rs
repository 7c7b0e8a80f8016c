//! # Locator Module
//!
//! Sub-resource locators are resource methods that do not answer a request
//! themselves. They return an object (or a type to instantiate) whose own
//! resource methods handle the rest of the path.
//!
//! ## Resolution
//!
//! 1. The locator result becomes an instance: returned objects are used as
//!    they are, types go through the [`Instantiator`](crate::instance::Instantiator)
//!    and fall back to the type's declared constructor.
//! 2. The instance's type is mapped to a routing table. Types inherit the
//!    tables of the interfaces they implement and, when they declare no
//!    resource methods of their own, of their superclass chain.
//! 3. The remaining path is dispatched against that table, appending path
//!    parameters after the ones already committed.
//!
//! Type relationships come from an explicit [`TypeHierarchy`] since Rust has
//! no runtime class reflection.

mod core;
mod hierarchy;

pub use core::{LocatorResolver, LocatorResult};
pub use hierarchy::{
    Constructor, ResourceHandle, TypeDecl, TypeHierarchy, TypeHierarchyBuilder, TypeKey,
};
