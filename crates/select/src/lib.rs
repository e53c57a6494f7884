//! nestfilter selectors: parse dot-path selectors and project schema trees onto them.
//!
//! ```
//! use nestfilter_core::reflect_object;
//! use nestfilter_schema::SchemaCache;
//! use nestfilter_select::{parse_all, projection};
//!
//! struct Address { city: String, zip: u32 }
//! struct Customer { name: String, address: Address }
//! reflect_object!(Address { city: String, zip: u32 });
//! reflect_object!(Customer { name: String, address: Address });
//!
//! let cache = SchemaCache::new();
//! let schema = cache.schema::<Customer>().unwrap();
//! let result = projection(schema.tree(), &parse_all(["name", "address.city"]));
//! assert!(result.allowed_for::<Address>().unwrap().contains("city"));
//! assert!(!result.allowed_for::<Address>().unwrap().contains("zip"));
//! ```

#![forbid(unsafe_code)]

pub mod project;
pub mod selector;

pub use project::{project, project_by_type, NodeId, ProjectedNode, ProjectedSlot, ProjectedTree, Projector, Sharing};
pub use selector::{parse_all, Segment, Selector, WILDCARD};

use nestfilter_core::ProjectionResult;
use nestfilter_schema::TypeNode;

/// Class-level projection of `tree`, flattened to runtime type → allowed names.
pub fn projection(tree: &TypeNode, selectors: &[Selector]) -> ProjectionResult {
    project_by_type(tree, selectors).flatten()
}
