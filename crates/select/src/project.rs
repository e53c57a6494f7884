//! Projection of a full schema tree onto the attributes named by a set of selectors.

use nestfilter_core::{ProjectionResult, TypeKey};
use nestfilter_schema::{Slot, TypeNode};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::trace;

use crate::selector::{Segment, Selector};

/// Index of a node inside a [`ProjectedTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectedSlot {
    Leaf,
    Node(NodeId),
}

impl ProjectedSlot {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            ProjectedSlot::Node(id) => Some(*id),
            ProjectedSlot::Leaf => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectedNode {
    owner: TypeKey,
    children: FxHashMap<&'static str, ProjectedSlot>,
}

impl ProjectedNode {
    fn new(owner: TypeKey) -> Self { Self { owner, children: FxHashMap::default() } }

    pub fn owner(&self) -> TypeKey { self.owner }

    pub fn child(&self, name: &str) -> Option<ProjectedSlot> { self.children.get(name).copied() }

    pub fn attribute_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.children.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// How destination nodes are allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharing {
    /// One node per position in the tree.
    Positional,
    /// One node per type; every position of a type contributes to the same node.
    ByType,
}

/// Arena-backed result of a projection. Nodes are only added when attached to a parent,
/// so every node is reachable from the root.
#[derive(Debug, Clone)]
pub struct ProjectedTree {
    nodes: Vec<ProjectedNode>,
    root: NodeId,
    sharing: Sharing,
}

impl ProjectedTree {
    pub fn root(&self) -> NodeId { self.root }

    /// Node `id` of this tree; `None` for an id taken from another tree that is out of range
    /// here.
    pub fn node(&self, id: NodeId) -> Option<&ProjectedNode> { self.nodes.get(id.0) }

    // The root is created with the projector, so it is always at index 0.
    pub fn root_node(&self) -> &ProjectedNode { &self.nodes[self.root.0] }

    pub fn sharing(&self) -> Sharing { self.sharing }

    /// Number of distinct nodes.
    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    /// Follow a dot path from the root, e.g. `"c.c"`.
    pub fn lookup(&self, path: &str) -> Option<ProjectedSlot> {
        let mut slot = ProjectedSlot::Node(self.root);
        for seg in Selector::parse(path).segments() {
            let id = slot.node()?;
            slot = self.node(id)?.child(seg.as_str())?;
        }
        Some(slot)
    }

    /// Node per type. With [`Sharing::ByType`] there is exactly one node per type; with
    /// positional sharing the first node met for a type is returned.
    pub fn type_nodes(&self) -> FxHashMap<TypeKey, NodeId> {
        let mut out = FxHashMap::default();
        for (idx, node) in self.nodes.iter().enumerate() {
            out.entry(node.owner).or_insert(NodeId(idx));
        }
        out
    }

    /// Flatten to runtime type → allowed names, unioning every node of the same type.
    pub fn flatten(&self) -> ProjectionResult {
        let mut result = ProjectionResult::new();
        for node in &self.nodes {
            result.merge(node.owner, node.children.keys().copied());
        }
        result
    }

    fn view(&self, id: NodeId) -> NodeView<'_> { NodeView { tree: self, id } }
}

struct NodeView<'t> {
    tree: &'t ProjectedTree,
    id: NodeId,
}

// Leaves serialize as `null`, nodes as a map of their attributes, which mirrors the shape of
// the filtered output.
impl Serialize for NodeView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Views are only built from ids stored in this tree.
        let node = &self.tree.nodes[self.id.0];
        let names = node.attribute_names();
        let mut map = serializer.serialize_map(Some(names.len()))?;
        for name in names {
            match node.children[name] {
                ProjectedSlot::Leaf => map.serialize_entry(name, &())?,
                ProjectedSlot::Node(id) => map.serialize_entry(name, &self.tree.view(id))?,
            }
        }
        map.end()
    }
}

impl Serialize for ProjectedTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.view(self.root).serialize(serializer)
    }
}

/// Incrementally applies selectors to a full schema tree.
///
/// Selectors accumulate into one destination tree: existing attributes are never
/// overwritten, so applying the same selector twice changes nothing.
pub struct Projector<'s> {
    source: &'s TypeNode,
    sharing: Sharing,
    nodes: Vec<ProjectedNode>,
    by_type: FxHashMap<TypeKey, NodeId>,
    // Nodes already expanded by a wildcard.
    saturated: FxHashSet<NodeId>,
}

impl<'s> Projector<'s> {
    pub fn new(source: &'s TypeNode, sharing: Sharing) -> Self {
        let mut projector = Self {
            source,
            sharing,
            nodes: Vec::new(),
            by_type: FxHashMap::default(),
            saturated: FxHashSet::default(),
        };
        projector.node_for(source.owner());
        projector
    }

    const ROOT: NodeId = NodeId(0);

    pub fn apply(&mut self, selector: &Selector) -> &mut Self {
        let mut src: &'s TypeNode = self.source;
        let mut dest = Self::ROOT;
        for seg in selector.segments() {
            match seg {
                Segment::Field(name) => {
                    let Some((name, src_slot)) = src.child_entry(name) else {
                        trace!(selector = %selector, segment = name.as_str(), owner = %src.owner(), "unknown segment; selector truncated");
                        return self;
                    };
                    let slot = match self.nodes[dest.0].children.get(name) {
                        Some(existing) => *existing,
                        None => {
                            let slot = match src_slot {
                                Slot::Scalar => ProjectedSlot::Leaf,
                                Slot::Nested(child) => ProjectedSlot::Node(self.node_for(child.owner())),
                            };
                            self.nodes[dest.0].children.insert(name, slot);
                            slot
                        }
                    };
                    match (src_slot, slot) {
                        (Slot::Nested(child), ProjectedSlot::Node(id)) => {
                            src = &**child;
                            dest = id;
                        }
                        // Scalar reached: remaining segments have nothing to address.
                        _ => return self,
                    }
                }
                Segment::Wildcard => {
                    self.expand(src, dest);
                    // Segments after a wildcard are not consulted.
                    return self;
                }
            }
        }
        self
    }

    pub fn apply_all<'a>(&mut self, selectors: impl IntoIterator<Item = &'a Selector>) -> &mut Self {
        for selector in selectors {
            self.apply(selector);
        }
        self
    }

    pub fn finish(self) -> ProjectedTree {
        ProjectedTree { nodes: self.nodes, root: Self::ROOT, sharing: self.sharing }
    }

    fn node_for(&mut self, owner: TypeKey) -> NodeId {
        if self.sharing == Sharing::ByType {
            if let Some(id) = self.by_type.get(&owner) {
                return *id;
            }
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(ProjectedNode::new(owner));
        if self.sharing == Sharing::ByType {
            self.by_type.insert(owner, id);
        }
        id
    }

    /// Copy the full subtree of `src` into `dest`, transitively.
    fn expand(&mut self, src: &'s TypeNode, dest: NodeId) {
        if !self.saturated.insert(dest) {
            return;
        }
        for (name, slot) in src.children() {
            match slot {
                Slot::Scalar => {
                    self.nodes[dest.0].children.entry(name).or_insert(ProjectedSlot::Leaf);
                }
                Slot::Nested(child) => {
                    let id = match self.nodes[dest.0].children.get(name) {
                        Some(existing) => match existing.node() {
                            Some(id) => id,
                            None => continue,
                        },
                        None => {
                            let id = self.node_for(child.owner());
                            self.nodes[dest.0].children.insert(name, ProjectedSlot::Node(id));
                            id
                        }
                    };
                    self.expand(child, id);
                }
            }
        }
    }
}

/// Positional projection: one destination node per position of the source tree.
pub fn project(tree: &TypeNode, selectors: &[Selector]) -> ProjectedTree {
    let mut projector = Projector::new(tree, Sharing::Positional);
    projector.apply_all(selectors);
    projector.finish()
}

/// Class-level projection: one destination node per type, shared by every position.
pub fn project_by_type(tree: &TypeNode, selectors: &[Selector]) -> ProjectedTree {
    let mut projector = Projector::new(tree, Sharing::ByType);
    projector.apply_all(selectors);
    projector.finish()
}
