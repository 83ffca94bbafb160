//! Eligible-list caching.
//!
//! Eligible-id lists are cached per slot for a fixed TTL so the ad-slot
//! service does not query content storage on every page view.
//!
//! ```toml
//! [cache]
//! backend = "memory"   # or "postgres"
//! capacity = 1024
//! ```

pub mod clock;
mod config;
mod keys;
pub(crate) mod lock;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheBackend, CacheConfig};
pub use keys::{ELIGIBLE_KEY_PREFIX, EligibleKey, hash_value};
pub use store::{EligibleCacheStore, MemoryEligibleStore};
