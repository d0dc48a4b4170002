//! Access to per-document field values.
//!
//! A `ValuesSource` lives for the duration of a query and hands out
//! `SegmentValues` bindings, one per segment. Bindings are only valid for the
//! segment they were created for.

pub mod column;
pub mod memory;

use std::fmt::Debug;
use std::sync::Arc;

use tally_error::Result;

/// Segment-local document identifier.
pub type DocId = u32;

/// Describes the segment the scan is currently positioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentContext {
    /// Ordinal of the segment within the index.
    pub segment_ord: usize,
    /// Exclusive upper bound on document ids within this segment.
    pub max_doc: DocId,
}

pub trait ValuesSource: Debug + Sync + Send {
    /// Create a binding for reading values out of the given segment.
    fn bind_segment(&self, segment: &SegmentContext) -> Result<Box<dyn SegmentValues>>;
}

pub trait SegmentValues: Debug + Send {
    /// Number of values the field holds for `doc`.
    ///
    /// Zero if the field is missing for the document. Errors if `doc` is not
    /// part of the bound segment.
    fn value_count(&mut self, doc: DocId) -> Result<u64>;
}

/// Resolves field names to values sources.
///
/// Returning `None` means the field doesn't exist in this context, and any
/// aggregator on it should be created unmapped.
pub trait ValuesSourceResolver {
    fn resolve(&self, field: &str) -> Option<Arc<dyn ValuesSource>>;
}
