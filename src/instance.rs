//! Creation of locator instances when a locator returns a type instead of
//! an object.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::locator::{ResourceHandle, TypeKey};
use crate::scope::{DestroyFn, RequestScope, SharedContext};

/// Release action run when the owning request completes
pub type CloseFn = Box<dyn FnOnce() + Send>;

/// An instance produced by an [`Instantiator`] plus its release action
#[derive(Default)]
pub struct BeanInstance {
    instance: Option<ResourceHandle>,
    close: Option<CloseFn>,
}

impl BeanInstance {
    /// Instance whose `close` must run when the request completes
    #[must_use]
    pub fn new<F>(instance: ResourceHandle, close: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            instance: Some(instance),
            close: Some(Box::new(close)),
        }
    }

    /// Instance whose lifecycle is owned elsewhere
    #[must_use]
    pub fn unmanaged(instance: ResourceHandle) -> Self {
        Self {
            instance: Some(instance),
            close: None,
        }
    }

    /// Nothing produced; the caller falls back to default construction
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn instance(&self) -> Option<&ResourceHandle> {
        self.instance.as_ref()
    }

    #[must_use]
    pub fn into_parts(self) -> (Option<ResourceHandle>, Option<CloseFn>) {
        (self.instance, self.close)
    }
}

impl fmt::Debug for BeanInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanInstance")
            .field("has_instance", &self.instance.is_some())
            .field("has_close", &self.close.is_some())
            .finish()
    }
}

/// Produces instances of resource types on behalf of the locator resolver
pub trait Instantiator: Send + Sync {
    fn instantiate(&self, ty: TypeKey, scope: &mut RequestScope) -> BeanInstance;
}

impl<F> Instantiator for F
where
    F: Fn(TypeKey, &mut RequestScope) -> BeanInstance + Send + Sync,
{
    fn instantiate(&self, ty: TypeKey, scope: &mut RequestScope) -> BeanInstance {
        self(ty, scope)
    }
}

/// Instantiator that never produces anything, leaving every type to its
/// default constructor
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConstruction;

impl Instantiator for DefaultConstruction {
    fn instantiate(&self, _ty: TypeKey, _scope: &mut RequestScope) -> BeanInstance {
        BeanInstance::empty()
    }
}

/// Lifetime of instances handed out by a [`BeanFactory`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeanScope {
    /// A fresh instance per lookup, released with the request
    Dependent,
    /// One instance per request, torn down with the request scope
    RequestScoped,
    /// One instance for the whole application
    Singleton,
}

type Factory = Arc<dyn Fn() -> ResourceHandle + Send + Sync>;
type Destroyer = Arc<dyn Fn(&ResourceHandle) + Send + Sync>;

struct BeanRegistration {
    scope: BeanScope,
    create: Factory,
    destroy: Option<Destroyer>,
}

/// Registry-backed [`Instantiator`] with scoped lifecycles
#[derive(Default)]
pub struct BeanFactory {
    beans: HashMap<TypeKey, BeanRegistration>,
    shared: SharedContext,
}

impl BeanFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T, F>(&mut self, scope: BeanScope, create: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.insert::<T, F>(scope, create, None)
    }

    /// Register with a destruction hook run when the instance is released
    pub fn register_with_destroy<T, F, D>(
        &mut self,
        scope: BeanScope,
        create: F,
        destroy: D,
    ) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
        D: Fn(&T) + Send + Sync + 'static,
    {
        let destroyer: Destroyer = Arc::new(move |handle: &ResourceHandle| {
            if let Some(value) = handle.downcast_ref::<T>() {
                destroy(value);
            }
        });
        self.insert::<T, F>(scope, create, Some(destroyer))
    }

    fn insert<T, F>(&mut self, scope: BeanScope, create: F, destroy: Option<Destroyer>) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.beans.insert(
            TypeKey::of::<T>(),
            BeanRegistration {
                scope,
                create: Arc::new(move || Arc::new(create()) as ResourceHandle),
                destroy,
            },
        );
        self
    }

    #[must_use]
    pub fn contains(&self, ty: TypeKey) -> bool {
        self.beans.contains_key(&ty)
    }

    /// Application-wide store backing singleton beans
    #[must_use]
    pub fn shared(&self) -> &SharedContext {
        &self.shared
    }
}

fn context_destroy(destroy: Option<&Destroyer>) -> Option<DestroyFn> {
    destroy.map(|d| {
        let d = Arc::clone(d);
        Box::new(move |handle: ResourceHandle| d(&handle)) as DestroyFn
    })
}

impl Instantiator for BeanFactory {
    fn instantiate(&self, ty: TypeKey, scope: &mut RequestScope) -> BeanInstance {
        let Some(bean) = self.beans.get(&ty) else {
            return BeanInstance::empty();
        };
        debug!(scope = ?bean.scope, "Instantiating bean");
        match bean.scope {
            BeanScope::Dependent => {
                let instance = (bean.create)();
                match &bean.destroy {
                    Some(destroy) => {
                        let destroy = Arc::clone(destroy);
                        let handle = ResourceHandle::clone(&instance);
                        BeanInstance::new(instance, move || destroy(&handle))
                    }
                    None => BeanInstance::unmanaged(instance),
                }
            }
            BeanScope::RequestScoped => {
                let instance = scope.get_or_create(ty, || {
                    ((bean.create)(), context_destroy(bean.destroy.as_ref()))
                });
                BeanInstance::unmanaged(instance)
            }
            BeanScope::Singleton => {
                let instance = self.shared.get_or_create(ty, || {
                    ((bean.create)(), context_destroy(bean.destroy.as_ref()))
                });
                BeanInstance::unmanaged(instance)
            }
        }
    }
}

impl fmt::Debug for BeanFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanFactory")
            .field("beans", &self.beans.len())
            .field("shared", &self.shared)
            .finish()
    }
}
