//! Heap configuration.

use serde::{Deserialize, Serialize};

use crate::error::{GcError, GcResult};

/// Default page size (64KB)
const DEFAULT_PAGE_SIZE: usize = 64 * 1024;
/// Smallest page size accepted by [`HeapConfig::validate`]
const MIN_PAGE_SIZE: usize = 4 * 1024;

/// Configuration for a thread's heap region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// Size of each page acquired from the system, in bytes (power of two)
    pub page_size: usize,
    /// Pages acquired eagerly when the region is initialized
    pub initial_pages: usize,
    /// Upper bound on pages owned by the region (None = unbounded)
    pub max_pages: Option<usize>,
}

impl HeapConfig {
    /// The smallest usable configuration: one lazily acquired page at a time.
    pub fn minimal() -> Self {
        HeapConfig {
            page_size: MIN_PAGE_SIZE,
            initial_pages: 0,
            max_pages: None,
        }
    }

    /// Checks the configuration for values the region cannot work with.
    pub fn validate(&self) -> GcResult<()> {
        if !self.page_size.is_power_of_two() || self.page_size < MIN_PAGE_SIZE {
            return Err(GcError::InvalidConfig(format!(
                "page_size must be a power of two >= {}, got {}",
                MIN_PAGE_SIZE, self.page_size
            )));
        }
        if let Some(max) = self.max_pages {
            if max < self.initial_pages {
                return Err(GcError::InvalidConfig(format!(
                    "max_pages ({}) is below initial_pages ({})",
                    max, self.initial_pages
                )));
            }
        }
        Ok(())
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        HeapConfig {
            page_size: DEFAULT_PAGE_SIZE,
            initial_pages: 1,
            max_pages: None,
        }
    }
}
