//! nestfilter core types: the host object model consulted by the schema builder,
//! runtime type identity, and the flattened projection result handed to serializers.

#![forbid(unsafe_code)]

use std::any::TypeId;
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHashMap;
use serde::ser::{Serialize, Serializer};

pub mod builtins;

pub mod prelude {
    pub use super::{
        Access, AllowedNames, FieldFilter, IncludeAll, ProjectionResult, Property, Reflect, ScalarKind, Shape,
        TypeKey, TypeRef,
    };
    pub use crate::{reflect_object, reflect_scalar};
}

/// Runtime identity of a type.
///
/// Equality and hashing only consider the `TypeId`; the name is carried for logs,
/// errors and serialized output. A `TypeKey` can be looked up in hash maps by `&TypeId`.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: std::any::type_name::<T>() }
    }

    pub fn id(&self) -> TypeId { self.id }

    /// Fully qualified type name, e.g. `my_app::model::Address`.
    pub fn name(&self) -> &'static str { self.name }

    /// Type name without its module path (generic arguments are kept).
    pub fn short_name(&self) -> &'static str {
        let head_end = self.name.find('<').unwrap_or(self.name.len());
        match self.name[..head_end].rfind("::") {
            Some(idx) => &self.name[idx + 2..],
            None => self.name,
        }
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state) }
}

impl Borrow<TypeId> for TypeKey {
    fn borrow(&self) -> &TypeId { &self.id }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}

impl Ord for TypeKey {
    // Name first so that sorted output is readable; the id breaks ties between
    // distinct types that print the same.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(other.name).then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name) }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name) }
}

impl Serialize for TypeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

/// Terminal value categories. Attributes of these kinds are leaves of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Integer,
    Float,
    Char,
    Text,
    Bytes,
    Temporal,
    Uri,
    Locale,
    Uuid,
    Enum,
}

/// Shape of a type as reported by the host object model.
#[derive(Debug, Clone)]
pub enum Shape {
    /// A terminal value.
    Scalar(ScalarKind),
    /// A value that itself identifies a type (e.g. `TypeId`).
    TypeToken,
    /// Array or slice of the element type.
    Sequence(TypeRef),
    /// Generic container with its reified type arguments, e.g. `Vec<T>` or `HashMap<K, V>`.
    Generic { container: &'static str, args: Vec<TypeRef> },
    /// Type with named properties.
    Object(Vec<Property>),
    /// Type the host model cannot look into.
    Opaque,
}

impl Shape {
    pub fn object(properties: impl IntoIterator<Item = Property>) -> Self {
        Shape::Object(properties.into_iter().collect())
    }

    pub fn generic(container: &'static str, args: impl IntoIterator<Item = TypeRef>) -> Self {
        Shape::Generic { container, args: args.into_iter().collect() }
    }

    pub fn is_scalar(&self) -> bool { matches!(self, Shape::Scalar(_)) }
}

/// Introspection entry point implemented by every type that can appear in a schema.
///
/// Implemented for the std scalars and containers in [`builtins`]; user types usually go
/// through [`reflect_object!`] or [`reflect_scalar!`].
pub trait Reflect: 'static {
    fn shape() -> Shape;
}

/// Lazy handle on a reflected type: identity now, shape on demand.
#[derive(Clone, Copy)]
pub struct TypeRef {
    key: TypeKey,
    // Deferred so that declaring a field never walks the field's own type.
    shape: fn() -> Shape,
}

impl TypeRef {
    pub fn of<T: Reflect>() -> Self {
        Self { key: TypeKey::of::<T>(), shape: T::shape }
    }

    pub fn key(&self) -> TypeKey { self.key }

    pub fn shape(&self) -> Shape { (self.shape)() }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.key).finish()
    }
}

/// Accessor presence for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub read: bool,
    pub write: bool,
}

impl Access {
    pub const READ_WRITE: Access = Access { read: true, write: true };
    pub const READ_ONLY: Access = Access { read: true, write: false };
    pub const WRITE_ONLY: Access = Access { read: false, write: true };
}

/// One named property of an object shape.
#[derive(Debug, Clone)]
pub struct Property {
    name: &'static str,
    ty: TypeRef,
    access: Access,
}

impl Property {
    pub fn new<T: Reflect>(name: &'static str) -> Self {
        Self { name, ty: TypeRef::of::<T>(), access: Access::READ_WRITE }
    }

    pub fn read_only<T: Reflect>(name: &'static str) -> Self {
        Self { access: Access::READ_ONLY, ..Self::new::<T>(name) }
    }

    pub fn write_only<T: Reflect>(name: &'static str) -> Self {
        Self { access: Access::WRITE_ONLY, ..Self::new::<T>(name) }
    }

    pub fn name(&self) -> &'static str { self.name }
    pub fn ty(&self) -> &TypeRef { &self.ty }
    pub fn access(&self) -> Access { self.access }

    /// Serializers only emit properties they can read.
    pub fn is_serializable(&self) -> bool { self.access.read }
}

/// Attribute names allowed for one runtime type, in sorted order.
pub type AllowedNames = BTreeSet<&'static str>;

/// Capability consulted by a serializer for every object it visits.
pub trait FieldFilter: Send + Sync {
    /// Whether attribute `name` of a value whose runtime type is `ty` is emitted.
    fn includes(&self, ty: TypeId, name: &str) -> bool;
}

/// Filter that emits every attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeAll;

impl FieldFilter for IncludeAll {
    fn includes(&self, _ty: TypeId, _name: &str) -> bool { true }
}

/// Flattened projection: runtime type → allowed attribute names.
///
/// A type reached at several positions of one projection gets the union of the names
/// selected at each position. Never mutated once handed out by a cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionResult {
    allowed: FxHashMap<TypeKey, AllowedNames>,
}

impl ProjectionResult {
    pub fn new() -> Self { Self::default() }

    /// Register `ty` (possibly with no names) and union `names` into its allowed set.
    pub fn merge(&mut self, ty: TypeKey, names: impl IntoIterator<Item = &'static str>) {
        self.allowed.entry(ty).or_default().extend(names);
    }

    pub fn allowed(&self, ty: TypeId) -> Option<&AllowedNames> { self.allowed.get(&ty) }

    pub fn allowed_for<T: ?Sized + 'static>(&self) -> Option<&AllowedNames> { self.allowed(TypeId::of::<T>()) }

    pub fn contains_type(&self, ty: TypeId) -> bool { self.allowed.contains_key(&ty) }

    pub fn len(&self) -> usize { self.allowed.len() }

    pub fn is_empty(&self) -> bool { self.allowed.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeKey, &AllowedNames)> { self.allowed.iter() }

    /// Entries sorted by type name; handy for logs and snapshots.
    pub fn sorted(&self) -> BTreeMap<TypeKey, &AllowedNames> {
        self.allowed.iter().map(|(k, v)| (*k, v)).collect()
    }
}

impl FieldFilter for ProjectionResult {
    fn includes(&self, ty: TypeId, name: &str) -> bool {
        self.allowed(ty).map(|names| names.contains(name)).unwrap_or(false)
    }
}

impl Serialize for ProjectionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let by_name: BTreeMap<&'static str, &AllowedNames> =
            self.allowed.iter().map(|(k, v)| (k.name(), v)).collect();
        by_name.serialize(serializer)
    }
}

/// Implement [`Reflect`] for a struct by listing its serializable fields.
///
/// ```
/// use nestfilter_core::reflect_object;
///
/// struct Address { city: String, zip: u32 }
/// struct Customer { name: String, addresses: Vec<Address> }
///
/// reflect_object!(Address { city: String, zip: u32 });
/// reflect_object!(Customer { name: String, addresses: Vec<Address> });
/// ```
#[macro_export]
macro_rules! reflect_object {
    ($ty:ty { $($field:ident : $fty:ty),* $(,)? }) => {
        impl $crate::Reflect for $ty {
            fn shape() -> $crate::Shape {
                $crate::Shape::object([
                    $($crate::Property::new::<$fty>(stringify!($field)),)*
                ])
            }
        }
    };
}

/// Mark user types (typically fieldless enums or newtypes over text) as scalars.
#[macro_export]
macro_rules! reflect_scalar {
    ($kind:ident => $($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Reflect for $ty {
                fn shape() -> $crate::Shape { $crate::Shape::Scalar($crate::ScalarKind::$kind) }
            }
        )+
    };
}
