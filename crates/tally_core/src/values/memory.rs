use std::sync::Arc;

use hashbrown::HashMap;
use tally_error::{DbError, OptionExt, Result};

use super::column::MultiValuedColumn;
use super::{DocId, SegmentContext, SegmentValues, ValuesSource, ValuesSourceResolver};

/// Values source backed by in-memory columns, one column per segment.
#[derive(Debug, Clone, Default)]
pub struct MemoryValuesSource {
    segments: Vec<Arc<MultiValuedColumn>>,
}

impl MemoryValuesSource {
    pub fn new(segments: impl IntoIterator<Item = MultiValuedColumn>) -> Self {
        MemoryValuesSource {
            segments: segments.into_iter().map(Arc::new).collect(),
        }
    }

    /// Segment contexts for every segment, in order.
    pub fn segment_contexts(&self) -> impl Iterator<Item = SegmentContext> + '_ {
        self.segments
            .iter()
            .enumerate()
            .map(|(segment_ord, col)| SegmentContext {
                segment_ord,
                max_doc: col.num_docs() as DocId,
            })
    }
}

impl ValuesSource for MemoryValuesSource {
    fn bind_segment(&self, segment: &SegmentContext) -> Result<Box<dyn SegmentValues>> {
        let column = self
            .segments
            .get(segment.segment_ord)
            .required("segment column")?;

        if column.num_docs() != segment.max_doc as usize {
            return Err(
                DbError::invalid_input("Segment context doesn't match column")
                    .with_field("segment", segment.segment_ord)
                    .with_field("max_doc", segment.max_doc)
                    .with_field("num_docs", column.num_docs()),
            );
        }

        Ok(Box::new(MemorySegmentValues {
            segment_ord: segment.segment_ord,
            column: column.clone(),
        }))
    }
}

#[derive(Debug)]
struct MemorySegmentValues {
    segment_ord: usize,
    column: Arc<MultiValuedColumn>,
}

impl SegmentValues for MemorySegmentValues {
    fn value_count(&mut self, doc: DocId) -> Result<u64> {
        self.column
            .value_count(doc)
            .map_err(|e| e.with_field("segment", self.segment_ord))
    }
}

/// Maps field names to their values sources.
#[derive(Debug, Default)]
pub struct FieldCatalog {
    fields: HashMap<String, Arc<dyn ValuesSource>>,
}

impl FieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, field: impl Into<String>, source: Arc<dyn ValuesSource>) {
        self.fields.insert(field.into(), source);
    }
}

impl ValuesSourceResolver for FieldCatalog {
    fn resolve(&self, field: &str) -> Option<Arc<dyn ValuesSource>> {
        self.fields.get(field).cloned()
    }
}
