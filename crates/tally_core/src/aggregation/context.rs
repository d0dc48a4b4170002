use serde::{Deserialize, Serialize};

use crate::buffer::buffer_manager::{BufferManager, TrackedBufferManager};

/// Configuration shared by all aggregators in a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Upper bound on the number of bucket slots allocated up front.
    ///
    /// Parent aggregators pass an expected bucket count as a sizing hint. The
    /// hint is clamped to this value. Aggregators still grow past it as new
    /// buckets show up.
    pub max_initial_buckets: usize,
    /// Optional limit in bytes for memory reserved by aggregators.
    pub memory_limit: Option<usize>,
}

impl AggregationConfig {
    pub const DEFAULT_MAX_INITIAL_BUCKETS: usize = 1 << 16;

    /// Number of slots to allocate given the expected number of buckets.
    ///
    /// An expected count of 0 means a top-level aggregator with exactly one
    /// bucket.
    pub fn initial_bucket_capacity(&self, expected_buckets: usize) -> usize {
        expected_buckets.min(self.max_initial_buckets).max(1)
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        AggregationConfig {
            max_initial_buckets: Self::DEFAULT_MAX_INITIAL_BUCKETS,
            memory_limit: None,
        }
    }
}

/// Everything an aggregator needs from its environment at construction.
#[derive(Debug, Clone)]
pub struct AggregationContext<B: BufferManager> {
    manager: B,
    config: AggregationConfig,
}

impl<B> AggregationContext<B>
where
    B: BufferManager,
{
    pub fn new(manager: B, config: AggregationConfig) -> Self {
        AggregationContext { manager, config }
    }

    pub fn buffer_manager(&self) -> &B {
        &self.manager
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }
}

impl AggregationContext<TrackedBufferManager> {
    /// Create a context with a tracked buffer manager respecting the
    /// configured memory limit.
    pub fn from_config(config: AggregationConfig) -> Self {
        let manager = TrackedBufferManager::new(config.memory_limit);
        AggregationContext { manager, config }
    }
}
