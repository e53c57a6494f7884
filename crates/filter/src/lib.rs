//! nestfilter public façade.
//!
//! Build a [`NestedPropertyFilter`] for a root type and a list of dot-path selectors, register
//! it in a [`FilterProvider`] under an id, and let the serializer ask the provider which
//! attributes of each visited object to emit. [`filter_json`] applies a filter to a JSON
//! value directly.
//!
//! ```
//! use nestfilter::{reflect_object, NestedPropertyFilter, ProjectionCache};
//!
//! struct Address { city: String, zip: u32 }
//! struct Customer { name: String, address: Address }
//! reflect_object!(Address { city: String, zip: u32 });
//! reflect_object!(Customer { name: String, address: Address });
//!
//! let cache = ProjectionCache::new();
//! let filter = NestedPropertyFilter::filter_out_all_except::<Customer, _>(&cache, &["address.city"]).unwrap();
//! assert!(filter.include(std::any::TypeId::of::<Address>(), "city"));
//! assert!(!filter.include(std::any::TypeId::of::<Customer>(), "name"));
//! ```

#![forbid(unsafe_code)]

use std::any::TypeId;
use std::sync::Arc;

pub mod json;
pub mod provider;

pub use json::{filter_json, to_filtered_value};
pub use provider::{FilterProvider, ResolvedFilter};

pub use nestfilter_core::{
    reflect_object, reflect_scalar, AllowedNames, FieldFilter, IncludeAll, ProjectionResult, Reflect, TypeKey,
};
pub use nestfilter_schema::{RootSchema, SchemaCache, SchemaError};
pub use nestfilter_select::{Selector, WILDCARD};
pub use nestfilter_store::{CacheConfig, CacheStats, KeyOrder, ProjectionCache};

use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("no filter configured with id `{0}`")]
    UnknownFilterId(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("value could not be converted to JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-type allow lists for one root type and selector list.
///
/// Cheap to clone: the projection is shared with the cache that produced it.
#[derive(Debug, Clone)]
pub struct NestedPropertyFilter {
    root: TypeKey,
    selectors: Arc<[String]>,
    result: Arc<ProjectionResult>,
}

impl NestedPropertyFilter {
    /// Keep only the attributes named by `selectors` (plus the attributes on the way to them)
    /// when serializing a `T`.
    pub fn filter_out_all_except<T: Reflect, S: AsRef<str>>(
        cache: &ProjectionCache,
        selectors: &[S],
    ) -> Result<Self, FilterError> {
        let result = cache.get_or_compute::<T, S>(selectors)?;
        let root = TypeKey::of::<T>();
        debug!(root = %root, types = result.len(), "nested property filter created");
        Ok(Self { root, selectors: selectors.iter().map(|s| s.as_ref().to_string()).collect(), result })
    }

    pub fn root(&self) -> TypeKey { self.root }

    pub fn selectors(&self) -> &[String] { &self.selectors }

    pub fn result(&self) -> &Arc<ProjectionResult> { &self.result }

    /// Allowed names for runtime type `ty`; `None` when the projection never reaches it.
    pub fn find(&self, ty: TypeId) -> Option<&AllowedNames> { self.result.allowed(ty) }

    pub fn include(&self, ty: TypeId, name: &str) -> bool { self.result.includes(ty, name) }
}

impl FieldFilter for NestedPropertyFilter {
    fn includes(&self, ty: TypeId, name: &str) -> bool { self.include(ty, name) }
}
