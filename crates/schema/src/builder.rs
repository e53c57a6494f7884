//! Recursive schema construction with per-type deduplication.

use std::collections::BTreeSet;
use std::sync::Arc;

use nestfilter_core::{Shape, TypeKey, TypeRef};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::classify::{classify, Classification};
use crate::{SchemaError, Slot, TypeNode};

/// Expands types into [`TypeNode`] trees.
///
/// Nodes already present in `known` (typically the published contents of a
/// [`SchemaCache`](crate::SchemaCache)) are reused as-is; nodes created by this builder are
/// collected in [`SchemaBuilder::built`] so the caller can publish them once the whole
/// build succeeded.
pub struct SchemaBuilder<'a> {
    known: &'a FxHashMap<TypeKey, Arc<TypeNode>>,
    built: FxHashMap<TypeKey, Arc<TypeNode>>,
    in_progress: Vec<TypeKey>,
    nested: BTreeSet<TypeKey>,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(known: &'a FxHashMap<TypeKey, Arc<TypeNode>>) -> Self {
        Self { known, built: FxHashMap::default(), in_progress: Vec::new(), nested: BTreeSet::new() }
    }

    /// Build the tree for `root`. A container root is transparent like a container attribute;
    /// a scalar root yields a node without attributes.
    pub fn build(&mut self, root: &TypeRef) -> Result<Arc<TypeNode>, SchemaError> {
        match classify(root) {
            Ok(Classification::Structured(ty)) => self.node_for(&ty),
            Ok(_) => Ok(Arc::new(TypeNode::new(root.key()))),
            Err(_) => Err(SchemaError::NotIntrospectable { ty: root.key() }),
        }
    }

    /// Nodes created by this builder, one per type.
    pub fn built(&self) -> &FxHashMap<TypeKey, Arc<TypeNode>> { &self.built }

    pub fn into_built(self) -> FxHashMap<TypeKey, Arc<TypeNode>> { self.built }

    /// Every distinct nested type met so far (attribute value types and collection element types).
    pub fn nested_types(&self) -> &BTreeSet<TypeKey> { &self.nested }

    fn lookup(&self, key: &TypeKey) -> Option<Arc<TypeNode>> {
        self.built.get(key).or_else(|| self.known.get(key)).cloned()
    }

    fn node_for(&mut self, ty: &TypeRef) -> Result<Arc<TypeNode>, SchemaError> {
        let key = ty.key();
        if let Some(node) = self.lookup(&key) {
            return Ok(node);
        }
        if let Some(start) = self.in_progress.iter().position(|k| *k == key) {
            let mut path = self.in_progress[start..].to_vec();
            path.push(key);
            return Err(SchemaError::RecursiveType { path });
        }

        self.in_progress.push(key);
        let expanded = self.expand(ty);
        self.in_progress.pop();

        let node = Arc::new(expanded?);
        self.built.insert(key, Arc::clone(&node));
        Ok(node)
    }

    fn expand(&mut self, ty: &TypeRef) -> Result<TypeNode, SchemaError> {
        let owner = ty.key();
        let mut node = TypeNode::new(owner);
        let properties = match ty.shape() {
            Shape::Object(properties) => properties,
            _ => return Ok(node),
        };

        for prop in properties.iter().filter(|p| p.is_serializable()) {
            let class = classify(prop.ty()).map_err(|e| e.at(owner, prop.name()))?;
            match class {
                Classification::Scalar(_) => {
                    node.insert(prop.name(), Slot::Scalar);
                }
                Classification::Excluded => {
                    trace!(owner = %owner, attribute = prop.name(), "type token attribute excluded");
                }
                Classification::Structured(elem) => {
                    let reused = self.lookup(&elem.key());
                    let child = self.node_for(&elem)?;
                    self.nested.insert(elem.key());
                    if let Some(reused) = reused {
                        // Nodes built in an earlier run bring their own nested types along.
                        self.nested.extend(reused.nested_types());
                    }
                    node.insert(prop.name(), Slot::Nested(child));
                }
            }
        }
        Ok(node)
    }
}

/// Build a schema tree for `root` from scratch, seeding deduplication with `visited`.
/// Newly built nodes are added to `visited`; on error `visited` is left untouched.
pub fn build_schema(
    root: &TypeRef,
    visited: &mut FxHashMap<TypeKey, Arc<TypeNode>>,
) -> Result<Arc<TypeNode>, SchemaError> {
    let mut builder = SchemaBuilder::new(visited);
    let tree = builder.build(root)?;
    let built = builder.into_built();
    visited.extend(built);
    Ok(tree)
}
