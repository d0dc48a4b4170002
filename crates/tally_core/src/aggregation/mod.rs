pub mod context;
pub mod result;
pub mod value_count;

use std::fmt::Debug;
use std::sync::Arc;

use context::AggregationContext;
use result::{InternalAggregation, Metadata};
use tally_error::Result;
use tracing::debug;

use crate::buffer::buffer_manager::BufferManager;
use crate::values::{DocId, SegmentContext, ValuesSource, ValuesSourceResolver};

/// Ordinal of a bucket owned by a parent aggregator.
///
/// Ordinal 0 always exists and is the only bucket for top-level aggregators.
pub type BucketOrd = usize;

/// A node in the aggregation tree driven by the scan.
///
/// Lifecycle: `set_next_segment` whenever the scan moves to a new segment,
/// `collect` for every matching (document, bucket) pair, then `build_bucket`
/// for each bucket, and finally `release`.
pub trait Aggregator: Debug + Send {
    fn name(&self) -> &str;

    /// If this aggregator needs to see documents at all.
    ///
    /// The driver may skip calling `collect` when this returns false.
    fn should_collect(&self) -> bool;

    /// Bind to a new segment. Bindings from previous segments are dropped.
    fn set_next_segment(&mut self, segment: &SegmentContext) -> Result<()>;

    /// Collect a document from the current segment into `bucket`.
    fn collect(&mut self, doc: DocId, bucket: BucketOrd) -> Result<()>;

    /// Build the result for a single bucket.
    fn build_bucket(&self, bucket: BucketOrd) -> Result<InternalAggregation>;

    /// Build a result for a branch of the tree that never collected anything.
    fn build_empty(&self) -> InternalAggregation;

    /// Release any memory held by this aggregator.
    ///
    /// Safe to call multiple times. Dropping the aggregator releases as well.
    fn release(&mut self);

    fn as_numeric_metric(&self) -> Option<&dyn NumericMetric> {
        None
    }
}

/// Aggregators producing a single numeric value per bucket.
pub trait NumericMetric {
    fn metric(&self, bucket: BucketOrd) -> f64;
}

/// Creates aggregators for a field, picking the unmapped variant when the
/// field doesn't exist.
pub trait AggregatorFactory<B: BufferManager> {
    /// Name of the aggregation being created.
    fn name(&self) -> &str;

    /// Field the aggregation reads values from.
    fn field(&self) -> &str;

    fn create_unmapped(
        &self,
        context: &AggregationContext<B>,
        metadata: Metadata,
    ) -> Result<Box<dyn Aggregator>>;

    /// Create an aggregator reading from `source`.
    ///
    /// `expected_buckets` is the parent's estimate of how many buckets it
    /// will produce, 0 for a top-level aggregation. Only used for sizing.
    fn create(
        &self,
        source: Arc<dyn ValuesSource>,
        expected_buckets: usize,
        context: &AggregationContext<B>,
        metadata: Metadata,
    ) -> Result<Box<dyn Aggregator>>;

    fn create_for_field(
        &self,
        resolver: &dyn ValuesSourceResolver,
        expected_buckets: usize,
        context: &AggregationContext<B>,
        metadata: Metadata,
    ) -> Result<Box<dyn Aggregator>> {
        match resolver.resolve(self.field()) {
            Some(source) => self.create(source, expected_buckets, context, metadata),
            None => {
                debug!(name = self.name(), field = self.field(), "field unmapped");
                self.create_unmapped(context, metadata)
            }
        }
    }
}
