//! Synthetic scan driver for the value count aggregator.
//!
//! Generates a multi-segment dataset with a multi-valued field, assigns every
//! document to a random bucket, and drives an aggregator through its full
//! lifecycle, checking the final counts against the generated data.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tally_core::aggregation::context::{AggregationConfig, AggregationContext};
use tally_core::aggregation::result::Metadata;
use tally_core::aggregation::value_count::ValueCountAggregatorFactory;
use tally_core::aggregation::{AggregatorFactory, BucketOrd};
use tally_core::buffer::buffer_manager::TrackedBufferManager;
use tally_core::values::column::MultiValuedColumnBuilder;
use tally_core::values::memory::{FieldCatalog, MemoryValuesSource};
use tally_core::values::DocId;
use tally_error::{DbError, OptionExt, Result};
use tracing::{debug, info, trace};

/// Name of the generated field.
pub const FIELD_NAME: &str = "tags";

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormatArg {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl From<LogFormatArg> for logutil::LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => logutil::LogFormat::HumanReadable,
            LogFormatArg::Compact => logutil::LogFormat::Compact,
            LogFormatArg::Json => logutil::LogFormat::Json,
        }
    }
}

#[derive(Debug, Parser, Clone)]
#[clap(name = "tally_bench")]
pub struct BenchArguments {
    /// Number of segments to generate.
    #[clap(long, default_value_t = 4)]
    pub segments: usize,
    /// Number of documents in each segment.
    #[clap(long, default_value_t = 250_000)]
    pub docs_per_segment: u32,
    /// Number of distinct buckets documents are spread across.
    #[clap(long, default_value_t = 1024)]
    pub buckets: usize,
    /// Bucket count hint passed to the aggregator, 0 for top-level.
    #[clap(long, default_value_t = 0)]
    pub expected_buckets: usize,
    /// Max number of values per document.
    #[clap(long, default_value_t = 4)]
    pub max_values: usize,
    /// Probability that a document has no value for the field.
    #[clap(long, default_value_t = 0.1)]
    pub missing_ratio: f64,
    /// Seed for data generation.
    #[clap(long, default_value_t = 42)]
    pub seed: u64,
    /// Memory limit in bytes for aggregator state.
    #[clap(long)]
    pub memory_limit: Option<usize>,
    /// Aggregate on a field that doesn't exist.
    #[clap(long)]
    pub unmapped: bool,
    /// Log verbosity.
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    #[clap(long, value_enum, default_value_t)]
    pub log_format: LogFormatArg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub documents: u64,
    pub total_values: u64,
    pub nonzero_buckets: usize,
    pub peak_reserved_bytes: usize,
    pub elapsed: Duration,
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "documents\t{}", self.documents)?;
        writeln!(f, "total_values\t{}", self.total_values)?;
        writeln!(f, "nonzero_buckets\t{}", self.nonzero_buckets)?;
        writeln!(f, "peak_reserved_bytes\t{}", self.peak_reserved_bytes)?;
        write!(f, "duration_micros\t{}", self.elapsed.as_micros())
    }
}

/// Generated dataset along with the expected count for every bucket.
#[derive(Debug)]
struct Dataset {
    source: MemoryValuesSource,
    /// Bucket for every document, per segment.
    assignments: Vec<Vec<BucketOrd>>,
    expected: Vec<u64>,
}

fn generate(args: &BenchArguments) -> Result<Dataset> {
    if args.buckets == 0 {
        return Err(DbError::invalid_input("Need at least one bucket"));
    }

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut expected = vec![0; args.buckets];
    let mut assignments = Vec::with_capacity(args.segments);
    let mut columns = Vec::with_capacity(args.segments);

    for _ in 0..args.segments {
        let mut builder = MultiValuedColumnBuilder::new();
        let mut segment_assignments = Vec::with_capacity(args.docs_per_segment as usize);

        for _ in 0..args.docs_per_segment {
            let count = if rng.random_bool(args.missing_ratio.clamp(0.0, 1.0)) {
                0
            } else {
                rng.random_range(1..=args.max_values.max(1))
            };
            builder.push_doc((0..count).map(|idx| format!("tag{idx}")));

            let bucket = rng.random_range(0..args.buckets);
            expected[bucket] += count as u64;
            segment_assignments.push(bucket);
        }

        let column = builder.finish();
        trace!(segment = columns.len(), values = column.num_values(), "generated segment");
        columns.push(column);
        assignments.push(segment_assignments);
    }

    Ok(Dataset {
        source: MemoryValuesSource::new(columns),
        assignments,
        expected,
    })
}

/// Generate the dataset and run a full scan over it.
pub fn run(args: &BenchArguments) -> Result<ScanReport> {
    let dataset = generate(args)?;
    debug!(segments = args.segments, docs_per_segment = args.docs_per_segment, "generated dataset");

    let mut catalog = FieldCatalog::new();
    if !args.unmapped {
        catalog.register(FIELD_NAME, Arc::new(dataset.source.clone()));
    }

    let context = AggregationContext::from_config(AggregationConfig {
        memory_limit: args.memory_limit,
        ..Default::default()
    });
    let factory = ValueCountAggregatorFactory::new("tag_count", FIELD_NAME);

    let start = Instant::now();

    let mut agg = factory.create_for_field(
        &catalog,
        args.expected_buckets,
        &context,
        Metadata::new(),
    )?;

    let mut documents = 0;
    let mut peak = reserved(&context);

    if agg.should_collect() {
        for (segment, buckets) in dataset.source.segment_contexts().zip(&dataset.assignments) {
            agg.set_next_segment(&segment)?;
            for (doc, &bucket) in buckets.iter().enumerate() {
                agg.collect(doc as DocId, bucket)?;
            }
            documents += buckets.len() as u64;
            peak = peak.max(reserved(&context));
        }
    }

    let metric = agg.as_numeric_metric().required("numeric metric")?;
    let mut total_values = 0;
    let mut nonzero_buckets = 0;
    for (bucket, &want) in dataset.expected.iter().enumerate() {
        let got = metric.metric(bucket) as u64;
        let want = if args.unmapped { 0 } else { want };
        if got != want {
            return Err(DbError::new("Bucket count mismatch")
                .with_field("bucket", bucket)
                .with_field("expected", want)
                .with_field("actual", got));
        }
        total_values += got;
        if got > 0 {
            let built = agg
                .build_bucket(bucket)?
                .try_as_value_count()
                .required("value count result")?
                .value;
            if built != got {
                return Err(DbError::new("Finalized bucket doesn't match metric")
                    .with_field("bucket", bucket)
                    .with_field("metric", got)
                    .with_field("finalized", built));
            }
            nonzero_buckets += 1;
        }
    }

    agg.release();
    let elapsed = start.elapsed();

    info!(documents, total_values, nonzero_buckets, ?elapsed, "scan complete");

    Ok(ScanReport {
        documents,
        total_values,
        nonzero_buckets,
        peak_reserved_bytes: peak,
        elapsed,
    })
}

fn reserved(context: &AggregationContext<TrackedBufferManager>) -> usize {
    context.buffer_manager().reserved()
}
