//! Filter lookup by id, as consulted by a serializer for every filtered object.

use std::any::TypeId;
use std::sync::Arc;

use nestfilter_core::{AllowedNames, FieldFilter};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::{FilterError, NestedPropertyFilter};

/// What a serializer applies to one object.
#[derive(Clone, Copy)]
pub enum ResolvedFilter<'a> {
    /// The registered filter reaches this type: emit exactly these names.
    Allowed(&'a AllowedNames),
    /// Fallback filter configured on the provider.
    Default(&'a dyn FieldFilter),
}

impl ResolvedFilter<'_> {
    pub fn includes(&self, ty: TypeId, name: &str) -> bool {
        match self {
            ResolvedFilter::Allowed(names) => names.contains(name),
            ResolvedFilter::Default(filter) => filter.includes(ty, name),
        }
    }
}

impl std::fmt::Debug for ResolvedFilter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedFilter::Allowed(names) => f.debug_tuple("Allowed").field(names).finish(),
            ResolvedFilter::Default(_) => f.write_str("Default"),
        }
    }
}

/// Registry of nested filters keyed by filter id.
///
/// Resolution of `(id, type)`: the registered filter's allow list for that type if it has
/// one, otherwise the default filter, otherwise an error when `fail_on_unknown_id` is set
/// (the default) or `None`.
pub struct FilterProvider {
    filters: FxHashMap<String, NestedPropertyFilter>,
    default: Option<Arc<dyn FieldFilter>>,
    fail_on_unknown_id: bool,
}

impl Default for FilterProvider {
    fn default() -> Self { Self::new() }
}

impl FilterProvider {
    pub fn new() -> Self { Self { filters: FxHashMap::default(), default: None, fail_on_unknown_id: true } }

    /// Register `filter` under `id`, replacing any previous filter with that id.
    pub fn add_filter(&mut self, id: impl Into<String>, filter: NestedPropertyFilter) -> &mut Self {
        self.filters.insert(id.into(), filter);
        self
    }

    pub fn with_filter(mut self, id: impl Into<String>, filter: NestedPropertyFilter) -> Self {
        self.add_filter(id, filter);
        self
    }

    pub fn remove_filter(&mut self, id: &str) -> Option<NestedPropertyFilter> { self.filters.remove(id) }

    pub fn set_default_filter(&mut self, filter: Option<Arc<dyn FieldFilter>>) -> &mut Self {
        self.default = filter;
        self
    }

    pub fn with_default_filter(mut self, filter: Arc<dyn FieldFilter>) -> Self {
        self.default = Some(filter);
        self
    }

    pub fn set_fail_on_unknown_id(&mut self, fail: bool) -> &mut Self {
        self.fail_on_unknown_id = fail;
        self
    }

    pub fn fail_on_unknown_id(&self) -> bool { self.fail_on_unknown_id }

    pub fn filter(&self, id: &str) -> Option<&NestedPropertyFilter> { self.filters.get(id) }

    pub fn len(&self) -> usize { self.filters.len() }

    pub fn is_empty(&self) -> bool { self.filters.is_empty() }

    pub fn find_property_filter(&self, id: &str, ty: TypeId) -> Result<Option<ResolvedFilter<'_>>, FilterError> {
        if let Some(names) = self.filters.get(id).and_then(|f| f.find(ty)) {
            return Ok(Some(ResolvedFilter::Allowed(names)));
        }
        if let Some(default) = self.default.as_deref() {
            trace!(filter_id = id, "falling back to default filter");
            return Ok(Some(ResolvedFilter::Default(default)));
        }
        if self.fail_on_unknown_id {
            return Err(FilterError::UnknownFilterId(id.to_string()));
        }
        Ok(None)
    }
}
