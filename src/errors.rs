//! Error types for treetally computations.

use thiserror::Error;

/// Errors that can occur while scoring partitions or summarizing ensembles.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TallyError {
    /// Malformed caller input.
    ///
    /// Covers shape mismatches (values vs. weights, assignment length vs.
    /// node count), out-of-range labels or quantile levels, and empty
    /// samples. Data is never clamped or dropped to recover.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A partition record is structurally invalid for the graph.
    ///
    /// The main producer of this variant is the weighting engine: a part
    /// whose induced subgraph is disconnected has a singular Laplacian
    /// minor, which signals corrupted chain output rather than "zero
    /// spanning trees".
    #[error("invalid partition: {0}")]
    InvalidPartition(String),

    /// Numerical stability error.
    ///
    /// Raised when a determinant leaves the range where rounding to the
    /// nearest integer is trustworthy, or when a computation produces a
    /// non-finite value.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// I/O failure while reading plan records or writing the output table.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSONL plan record.
    #[error("record error: {0}")]
    Record(#[from] serde_json::Error),

    /// CSV serialization failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
