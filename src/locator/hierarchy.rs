//! Explicit type-relationship registry used to resolve locator types.
//!
//! Rust has no runtime reflection over "implemented interfaces" or
//! "superclass", so resource types declare their relationships once at
//! startup. Traits are registered through their `dyn Trait` type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Shared, type-erased resource object (a locator instance or endpoint)
pub type ResourceHandle = Arc<dyn Any + Send + Sync>;

/// Default no-argument construction strategy for a type
pub type Constructor = Arc<dyn Fn() -> ResourceHandle + Send + Sync>;

const UNREGISTERED: &str = "<unregistered type>";

/// Stable identifier of a resource type, trait object type included
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey(TypeId);

impl TypeKey {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeKey(TypeId::of::<T>())
    }

    /// Runtime (concrete) type of a handle
    #[inline]
    #[must_use]
    pub fn of_instance(handle: &ResourceHandle) -> Self {
        TypeKey(Any::type_id(&**handle))
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({:?})", self.0)
    }
}

/// Declaration of one type and its direct relationships
pub struct TypeDecl {
    key: TypeKey,
    name: &'static str,
    superclass: Option<TypeKey>,
    interfaces: Vec<TypeKey>,
    constructor: Option<Constructor>,
}

impl TypeDecl {
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            name: std::any::type_name::<T>(),
            superclass: None,
            interfaces: Vec::new(),
            constructor: None,
        }
    }

    /// Parent type whose method set is inherited
    #[must_use]
    pub fn extends<S: ?Sized + 'static>(mut self) -> Self {
        self.superclass = Some(TypeKey::of::<S>());
        self
    }

    /// Directly implemented interface (usually `dyn Trait`)
    #[must_use]
    pub fn implements<I: ?Sized + 'static>(mut self) -> Self {
        self.interfaces.push(TypeKey::of::<I>());
        self
    }

    /// Fallback used when the instantiator yields nothing for this type
    #[must_use]
    pub fn constructor<T, F>(mut self, create: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(move || Arc::new(create()) as ResourceHandle));
        self
    }
}

struct TypeNode {
    name: &'static str,
    superclass: Option<TypeKey>,
    interfaces: Vec<TypeKey>,
    constructor: Option<Constructor>,
}

/// Immutable registry of type relationships, built once at startup
#[derive(Default)]
pub struct TypeHierarchy {
    nodes: HashMap<TypeKey, TypeNode>,
}

impl TypeHierarchy {
    #[must_use]
    pub fn builder() -> TypeHierarchyBuilder {
        TypeHierarchyBuilder::default()
    }

    #[must_use]
    pub fn contains(&self, key: TypeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    /// Display name of a registered type
    #[must_use]
    pub fn name_of(&self, key: TypeKey) -> &str {
        self.nodes.get(&key).map_or(UNREGISTERED, |n| n.name)
    }

    #[must_use]
    pub fn superclass(&self, key: TypeKey) -> Option<TypeKey> {
        self.nodes.get(&key).and_then(|n| n.superclass)
    }

    #[must_use]
    pub fn interfaces(&self, key: TypeKey) -> &[TypeKey] {
        self.nodes.get(&key).map_or(&[], |n| n.interfaces.as_slice())
    }

    /// Build an instance with the type's default constructor, if it has one
    #[must_use]
    pub fn construct(&self, key: TypeKey) -> Option<ResourceHandle> {
        self.nodes
            .get(&key)
            .and_then(|n| n.constructor.as_ref())
            .map(|create| create())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Debug for TypeHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.nodes.values().map(|n| n.name))
            .finish()
    }
}

#[derive(Default)]
pub struct TypeHierarchyBuilder {
    nodes: HashMap<TypeKey, TypeNode>,
}

impl TypeHierarchyBuilder {
    /// Add a declaration; declaring a type twice replaces the first one
    #[must_use]
    pub fn declare(mut self, decl: TypeDecl) -> Self {
        self.nodes.insert(
            decl.key,
            TypeNode {
                name: decl.name,
                superclass: decl.superclass,
                interfaces: decl.interfaces,
                constructor: decl.constructor,
            },
        );
        self
    }

    #[must_use]
    pub fn build(self) -> TypeHierarchy {
        TypeHierarchy { nodes: self.nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Shape {}
    #[derive(Default)]
    struct Base;
    #[derive(Default)]
    struct Square;
    impl Shape for Square {}

    #[test]
    fn test_type_keys() {
        let handle: ResourceHandle = Arc::new(Square);
        assert_eq!(TypeKey::of_instance(&handle), TypeKey::of::<Square>());
        assert_ne!(TypeKey::of::<dyn Shape>(), TypeKey::of::<Square>());
    }

    #[test]
    fn test_relationships() {
        let hierarchy = TypeHierarchy::builder()
            .declare(
                TypeDecl::of::<Square>()
                    .extends::<Base>()
                    .implements::<dyn Shape>()
                    .constructor(Square::default),
            )
            .declare(TypeDecl::of::<Base>())
            .build();

        let square = TypeKey::of::<Square>();
        assert_eq!(hierarchy.superclass(square), Some(TypeKey::of::<Base>()));
        assert_eq!(hierarchy.interfaces(square), &[TypeKey::of::<dyn Shape>()]);
        assert!(hierarchy.name_of(square).ends_with("Square"));
        assert_eq!(hierarchy.name_of(TypeKey::of::<u8>()), UNREGISTERED);
        assert!(hierarchy.interfaces(TypeKey::of::<u8>()).is_empty());

        let built = hierarchy.construct(square).unwrap();
        assert!(built.downcast_ref::<Square>().is_some());
        assert!(hierarchy.construct(TypeKey::of::<Base>()).is_none());
    }
}
