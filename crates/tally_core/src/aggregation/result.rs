use serde::Serialize;

/// Opaque metadata attached to an aggregation, returned as-is in the result.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Per-bucket result produced by an aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InternalAggregation {
    ValueCount(InternalValueCount),
}

impl InternalAggregation {
    pub fn name(&self) -> &str {
        match self {
            Self::ValueCount(v) => &v.name,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            Self::ValueCount(v) => &v.metadata,
        }
    }

    pub fn try_as_value_count(&self) -> Option<&InternalValueCount> {
        match self {
            Self::ValueCount(v) => Some(v),
        }
    }
}

/// Number of values a field had across the documents of a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InternalValueCount {
    pub name: String,
    pub value: u64,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl InternalValueCount {
    pub fn new(name: impl Into<String>, value: u64, metadata: Metadata) -> Self {
        InternalValueCount {
            name: name.into(),
            value,
            metadata,
        }
    }
}
