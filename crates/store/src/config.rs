//! Projection cache configuration.

use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How the selector list is turned into a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyOrder {
    /// Key on the parsed selectors in request order; reordered requests miss.
    #[default]
    Preserve,
    /// Sort and deduplicate selectors before keying. Results do not depend on selector
    /// order, so reordered requests share one entry.
    Sorted,
}

impl FromStr for KeyOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" => Ok(KeyOrder::Preserve),
            "sorted" => Ok(KeyOrder::Sorted),
            other => Err(anyhow!("invalid key order `{}` (expected `preserve` or `sorted`)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub key_order: KeyOrder,
    /// Entries kept before new results are served without being cached.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self { Self { key_order: KeyOrder::default(), max_entries: Self::DEFAULT_MAX_ENTRIES } }
}

impl CacheConfig {
    pub const KEY_ORDER_ENV: &'static str = "NESTFILTER_CACHE_KEY_ORDER";
    pub const MAX_ENTRIES_ENV: &'static str = "NESTFILTER_CACHE_MAX_ENTRIES";
    pub const DEFAULT_MAX_ENTRIES: usize = 4096;

    /// Read overrides from the environment; invalid values are logged and ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(raw) = std::env::var(Self::KEY_ORDER_ENV) {
            match raw.parse() {
                Ok(order) => cfg.key_order = order,
                Err(e) => warn!(var = Self::KEY_ORDER_ENV, error = %e, "ignoring invalid cache setting"),
            }
        }
        if let Ok(raw) = std::env::var(Self::MAX_ENTRIES_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) => cfg.max_entries = n,
                Err(e) => warn!(var = Self::MAX_ENTRIES_ENV, error = %e, "ignoring invalid cache setting"),
            }
        }
        cfg
    }

    pub fn with_key_order(mut self, key_order: KeyOrder) -> Self {
        self.key_order = key_order;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}
