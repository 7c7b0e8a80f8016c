//! Per-resource-class routing table: HTTP method → path mapper.

use http::Method;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use super::core::{RequestMapper, RequestPath};
use crate::error::RoutingError;
use crate::resource::ResourceMethod;

/// Mapper whose targets are resource methods
pub type ResourceMapper = RequestMapper<Arc<ResourceMethod>>;

/// Key of a routing table entry.
///
/// `All` is the reserved "any method" tier. It corresponds to the empty
/// method name and can never be registered explicitly under that name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodKey {
    All,
    Method(Method),
}

impl MethodKey {
    /// Map a registration method name; `None` means "all methods"
    pub fn from_registration(method: Option<&str>) -> Result<Self, RoutingError> {
        match method {
            None => Ok(MethodKey::All),
            Some("") => Err(RoutingError::ReservedMethodName),
            Some(name) => Method::from_bytes(name.as_bytes())
                .map(MethodKey::Method)
                .map_err(|_| RoutingError::InvalidMethod(name.to_string())),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, MethodKey::All)
    }

    /// Method name, or the empty string for the `All` sentinel
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            MethodKey::All => "",
            MethodKey::Method(m) => m.as_str(),
        }
    }
}

impl From<Method> for MethodKey {
    fn from(method: Method) -> Self {
        MethodKey::Method(method)
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodKey::All => f.write_str("*"),
            MethodKey::Method(m) => f.write_str(m.as_str()),
        }
    }
}

/// Read-only snapshot of a table's entries, sorted by method name
pub type RoutingEntries = Vec<(MethodKey, Arc<ResourceMapper>)>;

/// Routing table of one resource class.
///
/// Immutable once built and shared read-only between requests. The read-only
/// entry view is precomputed for tables with at most one entry and computed
/// on first use otherwise.
pub struct RoutingTable {
    mappers: HashMap<MethodKey, Arc<ResourceMapper>>,
    entries: OnceCell<RoutingEntries>,
    /// `All` templates are also reachable through every concrete method
    distributes_all: bool,
}

type GroupedPaths = HashMap<MethodKey, Vec<RequestPath<Arc<ResourceMethod>>>>;

impl RoutingTable {
    #[must_use]
    pub fn builder() -> RoutingTableBuilder {
        RoutingTableBuilder::default()
    }

    /// Build a table straight from resource methods, grouping them by HTTP
    /// method. Locators land in the `All` tier (and behind every concrete
    /// method) and match path prefixes.
    #[must_use]
    pub fn from_resources<I>(methods: I) -> Self
    where
        I: IntoIterator<Item = ResourceMethod>,
    {
        let mut grouped = GroupedPaths::new();
        for method in methods {
            let key = match method.http_method() {
                Some(m) => MethodKey::Method(m.clone()),
                None => MethodKey::All,
            };
            let path = RequestPath::new(
                method.is_locator(),
                Arc::clone(method.template()),
                Arc::new(method),
            );
            grouped.entry(key).or_default().push(path);
        }
        let all = grouped.get(&MethodKey::All).cloned().unwrap_or_default();
        distribute(&mut grouped, &all);
        Self::from_grouped(grouped, true)
    }

    fn from_grouped(grouped: GroupedPaths, distributes_all: bool) -> Self {
        let mappers = grouped
            .into_iter()
            .map(|(key, paths)| (key, Arc::new(RequestMapper::new(paths))))
            .collect();
        Self::from_map(mappers, distributes_all)
    }

    fn from_map(
        mappers: HashMap<MethodKey, Arc<ResourceMapper>>,
        distributes_all: bool,
    ) -> Self {
        let entries = if mappers.len() <= 1 {
            OnceCell::with_value(snapshot(&mappers))
        } else {
            OnceCell::new()
        };
        Self {
            mappers,
            entries,
            distributes_all,
        }
    }

    /// Mapper registered for `key`
    #[inline]
    #[must_use]
    pub fn get(&self, key: &MethodKey) -> Option<&Arc<ResourceMapper>> {
        self.mappers.get(key)
    }

    /// Mapper registered for a concrete HTTP method
    #[inline]
    #[must_use]
    pub fn get_method(&self, method: &Method) -> Option<&Arc<ResourceMapper>> {
        // HashMap lookups need an owned key; Method clones are cheap for
        // the standard methods (no allocation).
        self.mappers.get(&MethodKey::Method(method.clone()))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    /// Live view over the backing map, for crate-internal reuse
    pub(crate) fn raw_entries(
        &self,
    ) -> impl Iterator<Item = (&MethodKey, &Arc<ResourceMapper>)> {
        self.mappers.iter()
    }

    /// Read-only view of all entries, sorted by method name.
    ///
    /// Computed once; concurrent first callers may race but observe equal
    /// snapshots since the table is never mutated after build.
    #[must_use]
    pub fn entries(&self) -> &RoutingEntries {
        self.entries.get_or_init(|| snapshot(&self.mappers))
    }

    /// Every registered method, excluding the `All` sentinel
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        let mut methods: Vec<Method> = self
            .mappers
            .keys()
            .filter_map(|key| match key {
                MethodKey::All => None,
                MethodKey::Method(m) => Some(m.clone()),
            })
            .collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }

    /// Merge tables method by method.
    ///
    /// For each method present in any input, the templates of every table are
    /// concatenated (input order, then registration order) into one mapper.
    /// Copies distributed from an `All` tier are not concatenated; the `All`
    /// templates of distributing inputs are instead copied behind every
    /// concrete method of the result, so each appears once per mapper.
    #[must_use]
    pub fn join<'a, I>(tables: I) -> Self
    where
        I: IntoIterator<Item = &'a RoutingTable>,
    {
        let mut grouped = GroupedPaths::new();
        let mut shared_all = Vec::new();
        let mut joined = 0usize;
        for table in tables {
            joined += 1;
            for (key, mapper) in table.raw_entries() {
                let own: Vec<_> = mapper
                    .templates()
                    .iter()
                    .filter(|t| !t.inherited)
                    .cloned()
                    .collect();
                if key.is_all() && table.distributes_all {
                    shared_all.extend(own.iter().cloned());
                }
                grouped.entry(key.clone()).or_default().extend(own);
            }
        }
        distribute(&mut grouped, &shared_all);
        debug!(
            tables_joined = joined,
            methods = grouped.len(),
            distributed = shared_all.len(),
            "Routing tables joined"
        );
        Self::from_grouped(grouped, !shared_all.is_empty())
    }
}

/// Append copies of `all` behind every concrete method's templates
fn distribute(grouped: &mut GroupedPaths, all: &[RequestPath<Arc<ResourceMethod>>]) {
    if all.is_empty() {
        return;
    }
    for (key, paths) in grouped.iter_mut() {
        if !key.is_all() {
            paths.extend(all.iter().cloned().map(RequestPath::into_inherited));
        }
    }
}

fn snapshot(mappers: &HashMap<MethodKey, Arc<ResourceMapper>>) -> RoutingEntries {
    let mut entries: RoutingEntries = mappers
        .iter()
        .map(|(k, v)| (k.clone(), Arc::clone(v)))
        .collect();
    entries.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));
    entries
}

impl PartialEq for RoutingTable {
    fn eq(&self, other: &Self) -> bool {
        self.mappers == other.mappers
    }
}

impl fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, mapper) in self.entries() {
            let templates: Vec<&str> = mapper
                .templates()
                .iter()
                .map(|t| t.template.as_str())
                .collect();
            map.entry(&key.to_string(), &templates);
        }
        map.finish()
    }
}

/// Accumulating builder for [`RoutingTable`]
#[derive(Default)]
pub struct RoutingTableBuilder {
    mappers: HashMap<MethodKey, Arc<ResourceMapper>>,
}

impl RoutingTableBuilder {
    /// Register the mapper for `method`; `None` registers the "all methods"
    /// tier. An empty method name is reserved and rejected.
    pub fn add_mapper(
        mut self,
        method: Option<&str>,
        mapper: ResourceMapper,
    ) -> Result<Self, RoutingError> {
        let key = MethodKey::from_registration(method)?;
        self.mappers.insert(key, Arc::new(mapper));
        Ok(self)
    }

    #[must_use]
    pub fn build(self) -> RoutingTable {
        let table = RoutingTable::from_map(self.mappers, false);
        info!(
            methods = table.len(),
            has_all_methods_tier = table.get(&MethodKey::All).is_some(),
            "Routing table built"
        );
        table
    }
}
