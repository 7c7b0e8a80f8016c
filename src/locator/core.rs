//! Locator resolution: from a locator's return value to the next dispatch hop.

use dashmap::DashMap;
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::hierarchy::{ResourceHandle, TypeHierarchy, TypeKey};
use crate::config::DispatchConfig;
use crate::dispatcher::{dispatch_table, Dispatch};
use crate::error::DispatchError;
use crate::instance::Instantiator;
use crate::request::{Completion, RequestState};
use crate::router::RoutingTable;

/// Value returned by a sub-resource locator
#[derive(Clone)]
pub enum LocatorResult {
    /// A type; the resolver creates the instance
    Type(TypeKey),
    /// An already constructed object
    Instance(ResourceHandle),
}

impl LocatorResult {
    #[must_use]
    pub fn of_type<T: ?Sized + 'static>() -> Self {
        LocatorResult::Type(TypeKey::of::<T>())
    }

    #[must_use]
    pub fn instance<T: Any + Send + Sync>(value: T) -> Self {
        LocatorResult::Instance(Arc::new(value))
    }
}

impl fmt::Debug for LocatorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorResult::Type(ty) => f.debug_tuple("Type").field(ty).finish(),
            LocatorResult::Instance(handle) => f
                .debug_tuple("Instance")
                .field(&TypeKey::of_instance(handle))
                .finish(),
        }
    }
}

/// Resolves locator results to routing tables and re-dispatches into them.
///
/// The per-type table cache is the only state mutated after startup. It is
/// safe to use from many workers at once; concurrent misses for the same type
/// compute equal tables and the last write wins.
pub struct LocatorResolver {
    tables: DashMap<TypeKey, Arc<RoutingTable>>,
    hierarchy: Arc<TypeHierarchy>,
    instantiator: Arc<dyn Instantiator>,
    max_depth: usize,
}

impl LocatorResolver {
    #[must_use]
    pub fn new(
        hierarchy: Arc<TypeHierarchy>,
        instantiator: Arc<dyn Instantiator>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            tables: DashMap::new(),
            hierarchy,
            instantiator,
            max_depth: config.max_locator_depth,
        }
    }

    #[must_use]
    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    /// Register the routing table a type declares directly
    pub fn add_resource(&self, ty: TypeKey, table: Arc<RoutingTable>) {
        info!(
            type_name = %self.hierarchy.name_of(ty),
            methods = table.len(),
            "Resource routing table registered"
        );
        self.tables.insert(ty, table);
    }

    /// Table cached (or registered) for exactly `ty`
    #[must_use]
    pub fn cached(&self, ty: TypeKey) -> Option<Arc<RoutingTable>> {
        // Clone out of the shard guard right away
        self.tables.get(&ty).map(|entry| Arc::clone(entry.value()))
    }

    /// Effective routing table of `ty`.
    ///
    /// A registered type uses its own table as is. Any other type inherits
    /// the tables of its interfaces and superclass chain, where climbing
    /// stops at the first ancestor with its own table. The merged result is
    /// cached under `ty`.
    #[must_use]
    pub fn find_target(&self, ty: TypeKey) -> Option<Arc<RoutingTable>> {
        if let Some(table) = self.cached(ty) {
            return Some(table);
        }

        let mut found: Vec<Arc<RoutingTable>> = Vec::new();
        let mut visited: HashSet<TypeKey> = HashSet::new();
        self.collect(ty, &mut found, &mut visited);

        let merged = match found.len() {
            0 => {
                // LR1: Type declares no resource methods anywhere
                warn!(
                    type_name = %self.hierarchy.name_of(ty),
                    "No routing table found for locator type"
                );
                return None;
            }
            1 => found.pop()?,
            _ => Arc::new(RoutingTable::join(found.iter().map(|t| &**t))),
        };

        // LR2: Inherited table cached
        debug!(
            type_name = %self.hierarchy.name_of(ty),
            visited_types = visited.len(),
            methods = merged.len(),
            "Routing table resolved from type hierarchy"
        );
        self.tables.insert(ty, Arc::clone(&merged));
        Some(merged)
    }

    fn collect(
        &self,
        ty: TypeKey,
        found: &mut Vec<Arc<RoutingTable>>,
        visited: &mut HashSet<TypeKey>,
    ) {
        if !visited.insert(ty) {
            return;
        }
        let mut super_required = true;
        if let Some(table) = self.cached(ty) {
            found.push(table);
            super_required = false;
        }
        for &interface in self.hierarchy.interfaces(ty) {
            self.collect(interface, found, visited);
        }
        if super_required {
            if let Some(parent) = self.hierarchy.superclass(ty) {
                self.collect(parent, found, visited);
            }
        }
    }

    /// Turn a locator result into the next hop and dispatch the remaining
    /// path against it.
    ///
    /// # Errors
    ///
    /// `MisconfiguredLocator` when the instance cannot be created or its type
    /// has no routing table, `LocatorDepthExceeded` past the configured hop
    /// limit, and any error of the nested dispatch.
    pub fn resolve(
        &self,
        state: &mut RequestState,
        locator: LocatorResult,
    ) -> Result<Dispatch, DispatchError> {
        let (instance, ty) = match locator {
            LocatorResult::Instance(handle) => {
                let ty = TypeKey::of_instance(&handle);
                (handle, ty)
            }
            LocatorResult::Type(ty) => (self.instantiate(state, ty)?, ty),
        };

        let Some(table) = self.find_target(ty) else {
            return Err(self.misconfigured(state, ty));
        };

        let hop = state.enter_locator(self.max_depth).map_err(|e| {
            // LR3: Locator chain too deep
            error!(
                request_id = %state.request_id(),
                limit = self.max_depth,
                "Locator depth limit exceeded"
            );
            e
        })?;

        // LR4: Locator hop
        debug!(
            request_id = %state.request_id(),
            type_name = %self.hierarchy.name_of(ty),
            hop = hop,
            remaining = %state.remaining(),
            param_offset = state.param_offset(),
            "Dispatching into locator result"
        );
        state.set_endpoint_instance(instance);
        let offset = state.param_offset();
        dispatch_table(&table, state, offset, false)
    }

    fn instantiate(
        &self,
        state: &mut RequestState,
        ty: TypeKey,
    ) -> Result<ResourceHandle, DispatchError> {
        let (instance, close) = self
            .instantiator
            .instantiate(ty, state.scope_mut())
            .into_parts();
        if let Some(close) = close {
            state.register_completion_callback(Box::new(move |_: Completion<'_>| close()));
        }
        match instance.or_else(|| self.hierarchy.construct(ty)) {
            Some(instance) => Ok(instance),
            None => Err(self.misconfigured(state, ty)),
        }
    }

    fn misconfigured(&self, state: &RequestState, ty: TypeKey) -> DispatchError {
        let type_name = self.hierarchy.name_of(ty).to_string();
        // LR5: Locator returned something that is not a resource
        error!(
            request_id = %state.request_id(),
            type_name = %type_name,
            "Misconfigured resource locator"
        );
        DispatchError::MisconfiguredLocator { type_name }
    }
}

impl fmt::Debug for LocatorResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocatorResolver")
            .field("cached_tables", &self.tables.len())
            .field("hierarchy", &self.hierarchy)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}
