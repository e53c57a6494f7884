//! nestfilter schema engine: classify attributes, expand types into attribute trees, and
//! memoize the trees per type for the lifetime of a [`SchemaCache`].

#![forbid(unsafe_code)]

use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use metrics::counter;
use nestfilter_core::{Reflect, TypeKey, TypeRef};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::ser::{Serialize, Serializer};
use tracing::{debug, warn};

pub mod builder;
pub mod classify;

pub use builder::{build_schema, SchemaBuilder};
pub use classify::{classify, Classification};

/// Shape of one type: its serializable attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeNode {
    owner: TypeKey,
    children: FxHashMap<&'static str, Slot>,
}

/// What an attribute holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Scalar,
    Nested(Arc<TypeNode>),
}

impl Slot {
    pub fn as_nested(&self) -> Option<&Arc<TypeNode>> {
        match self {
            Slot::Nested(node) => Some(node),
            Slot::Scalar => None,
        }
    }

    pub fn is_scalar(&self) -> bool { matches!(self, Slot::Scalar) }
}

impl TypeNode {
    pub fn new(owner: TypeKey) -> Self { Self { owner, children: FxHashMap::default() } }

    pub(crate) fn insert(&mut self, name: &'static str, slot: Slot) { self.children.insert(name, slot); }

    pub fn owner(&self) -> TypeKey { self.owner }

    pub fn child(&self, name: &str) -> Option<&Slot> { self.children.get(name) }

    /// Like [`TypeNode::child`], also returning the attribute name with its static lifetime.
    pub fn child_entry(&self, name: &str) -> Option<(&'static str, &Slot)> {
        self.children.get_key_value(name).map(|(k, v)| (*k, v))
    }

    pub fn children(&self) -> impl Iterator<Item = (&'static str, &Slot)> {
        self.children.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize { self.children.len() }

    pub fn is_empty(&self) -> bool { self.children.is_empty() }

    /// Attribute names, sorted.
    pub fn attribute_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.children.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Every distinct type nested anywhere below this node.
    pub fn nested_types(&self) -> BTreeSet<TypeKey> {
        let mut out = BTreeSet::new();
        let mut seen: FxHashSet<TypeKey> = FxHashSet::default();
        let mut stack: Vec<&TypeNode> = vec![self];
        while let Some(node) = stack.pop() {
            for slot in node.children.values() {
                if let Slot::Nested(child) = slot {
                    out.insert(child.owner);
                    if seen.insert(child.owner) {
                        stack.push(child);
                    }
                }
            }
        }
        out
    }
}

// Scalars serialize as `null`, nested nodes as their attribute map.
impl Serialize for TypeNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let sorted: BTreeMap<&'static str, &Slot> = self.children.iter().map(|(k, v)| (*k, v)).collect();
        sorted.serialize(serializer)
    }
}

impl Serialize for Slot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Slot::Scalar => serializer.serialize_unit(),
            Slot::Nested(node) => node.serialize(serializer),
        }
    }
}

fn join_path(path: &[TypeKey]) -> String {
    path.iter().map(TypeKey::short_name).collect::<Vec<_>>().join(" -> ")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("type `{ty}` cannot be introspected")]
    NotIntrospectable { ty: TypeKey },
    #[error("attribute `{attribute}` of `{owner}` has type `{ty}` which cannot be introspected")]
    Inaccessible { owner: TypeKey, attribute: &'static str, ty: TypeKey },
    #[error("attribute `{attribute}` of `{owner}` uses `{container}` with {arity} type arguments (expected exactly one)")]
    UnsupportedGeneric { owner: TypeKey, attribute: &'static str, container: &'static str, arity: usize },
    #[error("recursive type: {}", join_path(.path))]
    RecursiveType { path: Vec<TypeKey> },
}

/// Full schema of a root type plus the closure of its nested types.
#[derive(Debug)]
pub struct RootSchema {
    tree: Arc<TypeNode>,
    nested: BTreeSet<TypeKey>,
}

impl RootSchema {
    pub fn tree(&self) -> &Arc<TypeNode> { &self.tree }

    pub fn nested_types(&self) -> &BTreeSet<TypeKey> { &self.nested }
}

/// Per-type schema memo shared by concurrent callers.
///
/// Reads are lock-free snapshots. A build publishes its nodes only after the whole tree
/// was constructed, so readers never see a partial tree and failed builds leave no trace.
/// Two threads building the same root concurrently both succeed; the later publish wins.
#[derive(Default)]
pub struct SchemaCache {
    nodes: ArcSwap<FxHashMap<TypeKey, Arc<TypeNode>>>,
    roots: ArcSwap<FxHashMap<TypeKey, Arc<RootSchema>>>,
}

impl SchemaCache {
    pub fn new() -> Self { Self::default() }

    pub fn schema<T: Reflect>(&self) -> Result<Arc<RootSchema>, SchemaError> {
        self.schema_of(&TypeRef::of::<T>())
    }

    pub fn schema_of(&self, root: &TypeRef) -> Result<Arc<RootSchema>, SchemaError> {
        let key = root.key();
        if let Some(found) = self.roots.load().get(&key) {
            return Ok(Arc::clone(found));
        }

        let known = self.nodes.load_full();
        let mut builder = SchemaBuilder::new(&known);
        let tree = match builder.build(root) {
            Ok(tree) => tree,
            Err(e) => {
                warn!(root = %key, error = %e, "schema build failed");
                return Err(e);
            }
        };
        let mut nested = builder.nested_types().clone();
        // A transparent container root builds the element's node, which may already be known.
        nested.extend(tree.nested_types());
        let built = builder.into_built();
        let built_count = built.len();

        self.nodes.rcu(|cur| {
            let mut next = (**cur).clone();
            for (k, v) in built.iter() {
                next.entry(*k).or_insert_with(|| Arc::clone(v));
            }
            next
        });
        let schema = Arc::new(RootSchema { tree, nested });
        self.roots.rcu(|cur| {
            let mut next = (**cur).clone();
            next.insert(key, Arc::clone(&schema));
            next
        });

        counter!("nestfilter_schema_builds_total", 1u64);
        debug!(root = %key, new_types = built_count, nested = schema.nested.len(), "schema built");
        Ok(schema)
    }

    /// The cached node for any type seen by an earlier build, nested or root.
    pub fn node(&self, ty: TypeId) -> Option<Arc<TypeNode>> { self.nodes.load().get(&ty).cloned() }

    /// Every distinct nested type reachable from `T`, building its schema if needed.
    pub fn nested_types<T: Reflect>(&self) -> Result<BTreeSet<TypeKey>, SchemaError> {
        Ok(self.schema::<T>()?.nested.clone())
    }

    /// Number of distinct types with a cached node.
    pub fn type_count(&self) -> usize { self.nodes.load().len() }

    pub fn root_count(&self) -> usize { self.roots.load().len() }
}

#[cfg(test)]
mod tests {
    use nestfilter_core::{reflect_object, Property, Reflect, Shape};

    use super::*;

    struct Leaf;
    struct Mid;
    struct Root;
    struct Other;
    struct Node;
    struct Broken;

    reflect_object!(Leaf { a: String, b: i32 });
    reflect_object!(Mid { a: String, b: i32, c: Leaf });
    reflect_object!(Root { a: String, b: i32, c: Mid });
    reflect_object!(Other { mid: Mid, leaves: Vec<Leaf> });
    reflect_object!(Node { value: u32, children: Vec<Node> });

    impl Reflect for Broken {
        fn shape() -> Shape { Shape::object([Property::new::<String>("ok"), Property::new::<Opaque>("handle")]) }
    }

    struct Opaque;
    impl Reflect for Opaque {
        fn shape() -> Shape { Shape::Opaque }
    }

    #[test]
    fn schema_is_memoized_per_root_and_nodes_are_shared_across_roots() {
        let cache = SchemaCache::new();
        let root = cache.schema::<Root>().unwrap();
        assert!(Arc::ptr_eq(&root, &cache.schema::<Root>().unwrap()));
        assert_eq!(cache.type_count(), 3);

        let other = cache.schema::<Other>().unwrap();
        let mid_from_root = root.tree().child("c").and_then(Slot::as_nested).unwrap();
        let mid_from_other = other.tree().child("mid").and_then(Slot::as_nested).unwrap();
        assert!(Arc::ptr_eq(mid_from_root, mid_from_other));
        assert_eq!(cache.type_count(), 4);
        assert_eq!(cache.root_count(), 2);

        let nested: Vec<_> = other.nested_types().iter().map(TypeKey::short_name).collect();
        assert_eq!(nested, vec!["Leaf", "Mid"]);
        assert!(cache.node(TypeId::of::<Leaf>()).is_some());
    }

    #[test]
    fn schema_serializes_as_nested_attribute_map() {
        let cache = SchemaCache::new();
        let root = cache.schema::<Root>().unwrap();
        assert_eq!(
            serde_json::to_value(root.tree().as_ref()).unwrap(),
            serde_json::json!({
                "a": null, "b": null,
                "c": { "a": null, "b": null, "c": { "a": null, "b": null } }
            })
        );
    }

    #[test]
    fn container_root_is_transparent() {
        let cache = SchemaCache::new();
        let list = cache.schema::<Vec<Root>>().unwrap();
        assert_eq!(list.tree().owner(), TypeKey::of::<Root>());
        assert_eq!(
            list.nested_types().iter().map(TypeKey::short_name).collect::<Vec<_>>(),
            vec!["Leaf", "Mid"]
        );
    }

    #[test]
    fn recursive_types_are_rejected() {
        let cache = SchemaCache::new();
        let err = cache.schema::<Node>().unwrap_err();
        assert_eq!(err.to_string(), "recursive type: Node -> Node");
        assert_eq!(cache.type_count(), 0);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = SchemaCache::new();
        let err = cache.schema::<Broken>().unwrap_err();
        assert!(matches!(err, SchemaError::Inaccessible { attribute: "handle", .. }));
        assert_eq!(cache.type_count(), 0);
        assert_eq!(cache.root_count(), 0);
        // Still failing on retry: nothing partial was published.
        assert!(cache.schema::<Broken>().is_err());
    }
}
