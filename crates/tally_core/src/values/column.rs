use tally_error::{DbError, Result};

use super::DocId;

/// Multi-valued string column for a single segment.
///
/// Values for document `i` live in `values[offsets[i]..offsets[i + 1]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiValuedColumn {
    offsets: Vec<usize>,
    values: Vec<String>,
}

impl MultiValuedColumn {
    /// Number of documents in the column.
    pub fn num_docs(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of values across all documents.
    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn value_count(&self, doc: DocId) -> Result<u64> {
        let doc = doc as usize;
        if doc >= self.num_docs() {
            return Err(DbError::invalid_input("Document id out of range for segment")
                .with_field("doc", doc)
                .with_field("num_docs", self.num_docs()));
        }

        Ok((self.offsets[doc + 1] - self.offsets[doc]) as u64)
    }
}

#[derive(Debug)]
pub struct MultiValuedColumnBuilder {
    offsets: Vec<usize>,
    values: Vec<String>,
}

impl Default for MultiValuedColumnBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiValuedColumnBuilder {
    pub fn new() -> Self {
        MultiValuedColumnBuilder {
            offsets: vec![0],
            values: Vec::new(),
        }
    }

    /// Append the next document's values. An empty iterator means the field is
    /// missing for the document.
    pub fn push_doc<I, S>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values.extend(values.into_iter().map(Into::into));
        self.offsets.push(self.values.len());
        self
    }

    pub fn finish(self) -> MultiValuedColumn {
        MultiValuedColumn {
            offsets: self.offsets,
            values: self.values,
        }
    }
}
