//! Error types surfaced by the aligner's public, validated mutations.

use thiserror::Error;

/// The two error kinds the core can raise: a rejected configuration value,
/// or a failure to grow the column buffer for a new reference.
#[derive(Debug, Error)]
pub enum AlignerError {
    /// `min_overlap` must be at least 1.
    #[error("min_overlap must be >= 1, got {value}")]
    MinOverlap {
        /// The rejected value.
        value: i64,
    },

    /// `indel_cost` must be at least 1.
    #[error("indel_cost must be >= 1, got {value}")]
    IndelCost {
        /// The rejected value.
        value: i64,
    },

    /// The column buffer could not be grown to fit a reference of this
    /// length; the aligner's previous reference and buffer remain intact.
    #[error("failed to allocate a column buffer for a reference of length {len}")]
    ColumnAllocation {
        /// Length of the reference that was being assigned.
        len: usize,
    },
}
