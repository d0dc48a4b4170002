use std::sync::Arc;

use tally_error::{DbError, Result};
use tracing::{debug, trace};

use super::context::AggregationContext;
use super::result::{InternalAggregation, InternalValueCount, Metadata};
use super::{Aggregator, AggregatorFactory, BucketOrd, NumericMetric};
use crate::buffer::buffer_manager::BufferManager;
use crate::buffer::managed_vec::ManagedVec;
use crate::values::{DocId, SegmentContext, SegmentValues, ValuesSource};

/// Counts the number of values a field has, per bucket.
///
/// A single instance handles every bucket of its parent, counts are stored in
/// a vec indexed by bucket ordinal that grows as new ordinals are collected.
#[derive(Debug)]
pub struct ValueCountAggregator<B: BufferManager> {
    name: String,
    metadata: Metadata,
    state: CountState<B>,
}

#[derive(Debug)]
enum CountState<B: BufferManager> {
    /// Field doesn't exist, every count is zero.
    Unmapped,
    Mapped(MappedState<B>),
    Released,
}

#[derive(Debug)]
struct MappedState<B: BufferManager> {
    source: Arc<dyn ValuesSource>,
    /// Binding for the current segment.
    values: Option<Box<dyn SegmentValues>>,
    counts: ManagedVec<u64, B>,
}

impl<B> ValueCountAggregator<B>
where
    B: BufferManager,
{
    /// Create a new aggregator.
    ///
    /// A `None` source creates an unmapped aggregator that never allocates.
    pub fn try_new(
        name: impl Into<String>,
        expected_buckets: usize,
        source: Option<Arc<dyn ValuesSource>>,
        context: &AggregationContext<B>,
        metadata: Metadata,
    ) -> Result<Self> {
        let name = name.into();

        let state = match source {
            Some(source) => {
                let initial = context.config().initial_bucket_capacity(expected_buckets);
                let counts = ManagedVec::try_with_len(context.buffer_manager(), initial)?;
                debug!(%name, expected_buckets, initial, "created value count aggregator");

                CountState::Mapped(MappedState {
                    source,
                    values: None,
                    counts,
                })
            }
            None => {
                debug!(%name, "created unmapped value count aggregator");
                CountState::Unmapped
            }
        };

        Ok(ValueCountAggregator {
            name,
            metadata,
            state,
        })
    }

    pub fn is_unmapped(&self) -> bool {
        matches!(self.state, CountState::Unmapped)
    }

    /// Number of bucket slots currently allocated.
    pub fn bucket_capacity(&self) -> usize {
        match &self.state {
            CountState::Mapped(state) => state.counts.len(),
            _ => 0,
        }
    }

    fn released_error(&self) -> DbError {
        DbError::new("Value count aggregator used after release").with_field("name", &self.name)
    }

    fn result(&self, value: u64) -> InternalAggregation {
        InternalAggregation::ValueCount(InternalValueCount::new(
            self.name.clone(),
            value,
            self.metadata.clone(),
        ))
    }
}

impl<B> Aggregator for ValueCountAggregator<B>
where
    B: BufferManager + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn should_collect(&self) -> bool {
        matches!(self.state, CountState::Mapped(_))
    }

    fn set_next_segment(&mut self, segment: &SegmentContext) -> Result<()> {
        match &mut self.state {
            CountState::Unmapped => Ok(()),
            CountState::Mapped(state) => {
                // Drop the old binding before creating the new one.
                state.values = None;
                state.values = Some(state.source.bind_segment(segment)?);
                trace!(name = %self.name, segment = segment.segment_ord, "bound segment");
                Ok(())
            }
            CountState::Released => Err(self.released_error()),
        }
    }

    fn collect(&mut self, doc: DocId, bucket: BucketOrd) -> Result<()> {
        let state = match &mut self.state {
            CountState::Unmapped => return Ok(()),
            CountState::Mapped(state) => state,
            CountState::Released => return Err(self.released_error()),
        };

        let min_len = bucket
            .checked_add(1)
            .ok_or_else(|| DbError::invalid_input("Bucket ordinal too large"))?;
        state.counts.grow_to(min_len)?;

        let values = match state.values.as_mut() {
            Some(values) => values,
            None => {
                return Err(DbError::invalid_input(
                    "Collect called before binding to a segment",
                )
                .with_field("name", &self.name));
            }
        };
        let count = values.value_count(doc)?;

        let slot = &mut state.counts.as_slice_mut()[bucket];
        *slot = slot.checked_add(count).ok_or_else(|| {
            DbError::new("Value count overflowed")
                .with_field("name", &self.name)
                .with_field("bucket", bucket)
        })?;

        Ok(())
    }

    fn build_bucket(&self, bucket: BucketOrd) -> Result<InternalAggregation> {
        match &self.state {
            CountState::Unmapped => Ok(self.result(0)),
            CountState::Mapped(state) => {
                let value = state.counts.get(bucket).ok_or_else(|| {
                    DbError::new("Bucket ordinal was never seen by value count aggregator")
                        .with_field("name", &self.name)
                        .with_field("bucket", bucket)
                        .with_field("len", state.counts.len())
                })?;
                Ok(self.result(value))
            }
            CountState::Released => Err(self.released_error()),
        }
    }

    fn build_empty(&self) -> InternalAggregation {
        self.result(0)
    }

    fn release(&mut self) {
        if let CountState::Mapped(state) = std::mem::replace(&mut self.state, CountState::Released)
        {
            debug!(
                name = %self.name,
                buckets = state.counts.len(),
                bytes = state.counts.reserved_bytes(),
                "releasing value count aggregator"
            );
        }
    }

    fn as_numeric_metric(&self) -> Option<&dyn NumericMetric> {
        Some(self)
    }
}

impl<B> NumericMetric for ValueCountAggregator<B>
where
    B: BufferManager,
{
    fn metric(&self, bucket: BucketOrd) -> f64 {
        match &self.state {
            CountState::Mapped(state) => state.counts.get(bucket).unwrap_or(0) as f64,
            CountState::Unmapped | CountState::Released => 0.0,
        }
    }
}

/// Factory for value count aggregators on a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCountAggregatorFactory {
    name: String,
    field: String,
}

impl ValueCountAggregatorFactory {
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        ValueCountAggregatorFactory {
            name: name.into(),
            field: field.into(),
        }
    }
}

impl<B> AggregatorFactory<B> for ValueCountAggregatorFactory
where
    B: BufferManager + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn field(&self) -> &str {
        &self.field
    }

    fn create_unmapped(
        &self,
        context: &AggregationContext<B>,
        metadata: Metadata,
    ) -> Result<Box<dyn Aggregator>> {
        let agg = ValueCountAggregator::try_new(self.name.clone(), 0, None, context, metadata)?;
        Ok(Box::new(agg))
    }

    fn create(
        &self,
        source: Arc<dyn ValuesSource>,
        expected_buckets: usize,
        context: &AggregationContext<B>,
        metadata: Metadata,
    ) -> Result<Box<dyn Aggregator>> {
        let agg = ValueCountAggregator::try_new(
            self.name.clone(),
            expected_buckets,
            Some(source),
            context,
            metadata,
        )?;
        Ok(Box::new(agg))
    }
}
