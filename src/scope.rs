//! Context stores that own instances beyond a single method call.
//!
//! [`RequestScope`] lives inside a request and is torn down when the request
//! completes. [`SharedContext`] is application wide and hands out one instance
//! per type for the lifetime of the engine.

use dashmap::DashMap;
use tracing::debug;

use crate::locator::{ResourceHandle, TypeKey};

/// Destruction callback attached to a context-owned instance
pub type DestroyFn = Box<dyn FnOnce(ResourceHandle) + Send + Sync>;

struct ContextInstance {
    instance: ResourceHandle,
    destroy: Option<DestroyFn>,
}

impl ContextInstance {
    fn destroy(self) {
        if let Some(destroy) = self.destroy {
            destroy(self.instance);
        }
    }
}

/// Per-request instance store.
///
/// Instances are destroyed in reverse creation order when the scope is torn
/// down; a scope dropped without teardown destroys its instances on drop.
#[derive(Default)]
pub struct RequestScope {
    instances: Vec<(TypeKey, ContextInstance)>,
}

impl RequestScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: TypeKey) -> Option<&ResourceHandle> {
        self.instances
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, c)| &c.instance)
    }

    /// Existing instance for `key`, or one created by `create`
    pub fn get_or_create<F>(&mut self, key: TypeKey, create: F) -> ResourceHandle
    where
        F: FnOnce() -> (ResourceHandle, Option<DestroyFn>),
    {
        if let Some(existing) = self.get(key) {
            return ResourceHandle::clone(existing);
        }
        let (instance, destroy) = create();
        self.instances.push((
            key,
            ContextInstance {
                instance: ResourceHandle::clone(&instance),
                destroy,
            },
        ));
        instance
    }

    /// Destroy a single instance; false when none was stored
    pub fn destroy(&mut self, key: TypeKey) -> bool {
        match self.instances.iter().position(|(k, _)| *k == key) {
            Some(idx) => {
                let (_, instance) = self.instances.remove(idx);
                instance.destroy();
                true
            }
            None => false,
        }
    }

    /// Tear down every instance, newest first
    pub fn destroy_all(&mut self) {
        if self.instances.is_empty() {
            return;
        }
        debug!(instances = self.instances.len(), "Destroying request scope");
        while let Some((_, instance)) = self.instances.pop() {
            instance.destroy();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

impl std::fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScope")
            .field("instances", &self.instances.len())
            .finish()
    }
}

/// Application-wide instance store, safe to share between requests.
///
/// Creation for a given key happens at most once even under contention. The
/// `create` closure runs while the key's shard is locked and must not call
/// back into the same context.
#[derive(Default)]
pub struct SharedContext {
    instances: DashMap<TypeKey, ContextInstance>,
}

impl SharedContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: TypeKey) -> Option<ResourceHandle> {
        self.instances
            .get(&key)
            .map(|entry| ResourceHandle::clone(&entry.instance))
    }

    pub fn get_or_create<F>(&self, key: TypeKey, create: F) -> ResourceHandle
    where
        F: FnOnce() -> (ResourceHandle, Option<DestroyFn>),
    {
        let entry = self.instances.entry(key).or_insert_with(|| {
            let (instance, destroy) = create();
            ContextInstance { instance, destroy }
        });
        ResourceHandle::clone(&entry.instance)
    }

    pub fn destroy(&self, key: TypeKey) -> bool {
        match self.instances.remove(&key) {
            Some((_, instance)) => {
                instance.destroy();
                true
            }
            None => false,
        }
    }

    pub fn destroy_all(&self) {
        let keys: Vec<TypeKey> = self.instances.iter().map(|e| *e.key()).collect();
        for key in keys {
            self.destroy(key);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl std::fmt::Debug for SharedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedContext")
            .field("instances", &self.instances.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Tracked(&'static str);

    fn tracked(
        name: &'static str,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> (ResourceHandle, Option<DestroyFn>) {
        let log = Arc::clone(log);
        (
            Arc::new(Tracked(name)),
            Some(Box::new(move |h: ResourceHandle| {
                let name = h.downcast_ref::<Tracked>().map_or("?", |t| t.0);
                log.lock().unwrap().push(name);
            })),
        )
    }

    #[test]
    fn test_request_scope_reuses_and_destroys_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scope = RequestScope::new();
        let a = scope.get_or_create(TypeKey::of::<u8>(), || tracked("a", &log));
        let again = scope.get_or_create(TypeKey::of::<u8>(), || tracked("dup", &log));
        assert!(Arc::ptr_eq(&a, &again));
        scope.get_or_create(TypeKey::of::<u16>(), || tracked("b", &log));
        assert_eq!(scope.len(), 2);

        scope.destroy_all();
        assert!(scope.is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn test_request_scope_destroys_on_drop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let mut scope = RequestScope::new();
            scope.get_or_create(TypeKey::of::<u8>(), || tracked("a", &log));
        }
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_shared_context_single_instance() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ctx = SharedContext::new();
        let a = ctx.get_or_create(TypeKey::of::<u8>(), || tracked("a", &log));
        let b = ctx.get_or_create(TypeKey::of::<u8>(), || tracked("b", &log));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(ctx.destroy(TypeKey::of::<u8>()));
        assert!(!ctx.destroy(TypeKey::of::<u8>()));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }
}
