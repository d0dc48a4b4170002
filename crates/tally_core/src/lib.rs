pub mod aggregation;
pub mod buffer;
pub mod values;
