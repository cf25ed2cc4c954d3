//! Store Configuration
//!
//! Constructed by the composing process and injected into
//! [`MessageStore`](crate::MessageStore); there is no global state. The
//! retention threshold is the only knob that bounds storage growth.

use recordhouse_core::FetchOrder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum per-unit footprint in kilobytes. When a write pushes a unit
    /// past this, the oldest rows are evicted down to 80% of it.
    pub max_unit_size_kb: u64,

    /// Order applied when a fetch does not specify one
    pub default_order: FetchOrder,

    /// Limit applied when a fetch does not specify one (`None` = unbounded)
    pub default_limit: Option<u32>,

    /// Connection pool size
    pub max_connections: u32,

    /// Pool acquisition timeout in seconds; a failed acquisition surfaces
    /// as a storage error to the caller
    pub acquire_timeout_secs: u64,
}

impl StoreConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_unit_size_kb: 10 * 1024, // 10 MB per unit
            default_order: FetchOrder::Ascending,
            default_limit: None,
            max_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}
