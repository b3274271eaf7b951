//! Common pool floorplans.
//!
//! A floorplan is the fixed set of block pools reserved before any pipeline
//! starts. Requests that resolve to the same block size share one pool.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::size::ImageSpec;

/// Maximum number of distinct pools the allocator accepts.
pub const MAX_COMM_POOLS: usize = 16;

/// Per-block metadata reserved alongside each buffer.
pub const POOL_META_SIZE: u64 = 4096;

/// Partition used for pools that are not pinned to a named carve-out.
pub const ANONYMOUS_PARTITION: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("pool floorplan needs {distinct} distinct block sizes, capacity is {capacity}")]
    CapacityExceeded { distinct: usize, capacity: usize },

    #[error("pool of {block_size}-byte blocks needs more than {} blocks", u32::MAX)]
    CountOverflow { block_size: u64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    #[default]
    NonCached,
    Cached,
}

/// One buffer request: an image layout and how many blocks of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSpec {
    #[serde(flatten)]
    pub image: ImageSpec,
    pub block_count: u32,
}

/// One pool in a floorplan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    pub block_size: u64,
    pub block_count: u32,
    pub meta_size: u64,
    pub cache_mode: CacheMode,
    pub partition: String,
}

impl PoolConfig {
    fn anonymous(block_size: u64, block_count: u32) -> Self {
        Self {
            block_size,
            block_count,
            meta_size: POOL_META_SIZE,
            cache_mode: CacheMode::NonCached,
            partition: ANONYMOUS_PARTITION.to_string(),
        }
    }

    /// Bytes reserved by this pool, metadata included.
    pub fn total_bytes(&self) -> u64 {
        (self.block_size + self.meta_size) * u64::from(self.block_count)
    }
}

/// Ordered, capacity-bounded set of pools with unique block sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolFloorplan {
    pools: Vec<PoolConfig>,
}

impl PoolFloorplan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pools(&self) -> &[PoolConfig] {
        &self.pools
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Block count reserved for `block_size`, 0 if no pool has it.
    pub fn count_for(&self, block_size: u64) -> u32 {
        self.pools
            .iter()
            .find(|p| p.block_size == block_size)
            .map_or(0, |p| p.block_count)
    }

    pub fn total_bytes(&self) -> u64 {
        self.pools.iter().map(PoolConfig::total_bytes).sum()
    }

    /// Add `count` blocks of `block_size`, merging into an existing pool of
    /// the same size. A new size is appended after the ones already present.
    pub fn add(&mut self, block_size: u64, count: u32) -> Result<(), PoolError> {
        if let Some(pool) = self.pools.iter_mut().find(|p| p.block_size == block_size) {
            pool.block_count = pool
                .block_count
                .checked_add(count)
                .ok_or(PoolError::CountOverflow { block_size })?;
            return Ok(());
        }
        if self.pools.len() >= MAX_COMM_POOLS {
            return Err(PoolError::CapacityExceeded {
                distinct: self.pools.len() + 1,
                capacity: MAX_COMM_POOLS,
            });
        }
        self.pools.push(PoolConfig::anonymous(block_size, count));
        Ok(())
    }
}

/// Size every spec and merge the results into a floorplan.
pub fn calc_pool_floorplan(specs: &[PoolSpec]) -> Result<PoolFloorplan, PoolError> {
    let mut plan = PoolFloorplan::new();
    for spec in specs {
        plan.add(spec.image.buffer_size(), spec.block_count)?;
    }
    Ok(plan)
}
