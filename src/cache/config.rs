//! Eligible-list cache configuration.
//!
//! Selected through the `[cache]` table of `sponsorship.toml`.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_CAPACITY: usize = 1024;

/// Where eligible-id lists are kept between requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Per-process LRU; entries are not shared between replicas.
    #[default]
    Memory,
    /// The `eligible_cache` table, shared by every process on the database.
    Postgres,
}

impl TryFrom<&str> for CacheBackend {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "postgres" => Ok(CacheBackend::Postgres),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Maximum entries held by the memory backend.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl CacheConfig {
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_clamped() {
        let config = CacheConfig {
            capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.capacity_non_zero().get(), 1);
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!(CacheBackend::try_from("Postgres"), Ok(CacheBackend::Postgres));
        assert_eq!(CacheBackend::try_from("redis"), Err(()));
    }
}
