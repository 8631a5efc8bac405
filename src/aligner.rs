//! The banded semi-global DP engine and the reusable [`Aligner`] it lives
//! behind.

use anyhow::Context;
use log::{debug, trace};

use crate::entry::Entry;
use crate::error::AlignerError;
use crate::matrix::DPMatrix;
use crate::tables::{characters_match, translate_query, translate_reference};
use crate::AlignmentSpan;

/// Construction-time configuration for an [`Aligner`].
///
/// Mirrors the four independent semi-global boundary flags plus the
/// wildcard and debug switches; `reference` and `max_error_rate` are passed
/// to [`Aligner::new`] directly since they are required, not optional.
#[derive(Debug, Clone)]
pub struct AlignerConfig {
    /// Minimum aligned reference length accepted as an overlap. Must be
    /// `>= 1`.
    pub min_overlap: i64,
    /// Whether the alignment may skip a reference prefix for free.
    pub start_in_reference: bool,
    /// Whether the alignment may skip a query prefix for free.
    pub start_in_query: bool,
    /// Whether the alignment may skip a reference suffix for free.
    pub stop_in_reference: bool,
    /// Whether the alignment may skip a query suffix for free.
    pub stop_in_query: bool,
    /// Translate the reference through the IUPAC table instead of ACGT.
    pub wildcard_ref: bool,
    /// Translate the query through the IUPAC table instead of ACGT.
    pub wildcard_query: bool,
    /// Cost charged for each insertion and deletion. Must be `>= 1`;
    /// mismatch cost is fixed at 1, match cost at 0.
    pub indel_cost: i64,
    /// When set, `locate` populates a [`DPMatrix`] with every computed
    /// cell's cost.
    pub debug: bool,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        AlignerConfig {
            min_overlap: 1,
            start_in_reference: true,
            start_in_query: true,
            stop_in_reference: true,
            stop_in_query: true,
            wildcard_ref: false,
            wildcard_query: false,
            indel_cost: 1,
            debug: false,
        }
    }
}

/// A configured, reusable semi-global aligner bound to one reference
/// string.
///
/// Construct once, mutate `reference`/`min_overlap`/`indel_cost` as
/// needed, and call [`Aligner::locate`] for every query. Not safe to share
/// across threads; give each worker thread its own `Aligner`.
pub struct Aligner {
    reference: String,
    translated_reference: Vec<u8>,
    m: usize,
    max_error_rate: f64,
    min_overlap: i64,
    insertion_cost: i64,
    deletion_cost: i64,
    start_in_reference: bool,
    start_in_query: bool,
    stop_in_reference: bool,
    stop_in_query: bool,
    wildcard_ref: bool,
    wildcard_query: bool,
    debug: bool,
    dpmatrix: Option<DPMatrix>,
    column: Vec<Entry>,
}

/// Tracks the best exit found so far while scanning a `locate` call.
#[derive(Debug, Clone, Copy)]
struct Best {
    cost: i64,
    matches: i64,
    origin: i64,
    ref_stop: i64,
    query_stop: i64,
}

impl Best {
    fn beats(&self, cost: i64, matches: i64) -> bool {
        matches > self.matches || (matches == self.matches && cost < self.cost)
    }
}

impl Aligner {
    /// Construct an aligner bound to `reference`. Rejects
    /// `config.min_overlap < 1` or `config.indel_cost < 1`, and any
    /// failure to allocate the column buffer.
    pub fn new(
        reference: impl Into<String>,
        max_error_rate: f64,
        config: AlignerConfig,
    ) -> Result<Self, AlignerError> {
        if config.min_overlap < 1 {
            return Err(AlignerError::MinOverlap {
                value: config.min_overlap,
            });
        }
        if config.indel_cost < 1 {
            return Err(AlignerError::IndelCost {
                value: config.indel_cost,
            });
        }

        let reference = reference.into();
        let translated_reference =
            translate_reference(reference.as_bytes(), config.wildcard_ref, config.wildcard_query);
        let column = allocate_column(translated_reference.len())?;

        debug!(
            "constructed aligner for reference of length {} (max_error_rate={})",
            translated_reference.len(),
            max_error_rate
        );

        Ok(Aligner {
            m: translated_reference.len(),
            reference,
            translated_reference,
            column,
            max_error_rate,
            min_overlap: config.min_overlap,
            insertion_cost: config.indel_cost,
            deletion_cost: config.indel_cost,
            start_in_reference: config.start_in_reference,
            start_in_query: config.start_in_query,
            stop_in_reference: config.stop_in_reference,
            stop_in_query: config.stop_in_query,
            wildcard_ref: config.wildcard_ref,
            wildcard_query: config.wildcard_query,
            debug: config.debug,
            dpmatrix: None,
        })
    }

    /// The configured reference string, as originally given.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Length of the (translated) reference buffer.
    pub fn reference_len(&self) -> usize {
        self.m
    }

    /// Current minimum accepted aligned reference length.
    pub fn min_overlap(&self) -> i64 {
        self.min_overlap
    }

    /// Current insertion cost (equal to the deletion cost).
    pub fn insertion_cost(&self) -> i64 {
        self.insertion_cost
    }

    /// Current deletion cost (equal to the insertion cost).
    pub fn deletion_cost(&self) -> i64 {
        self.deletion_cost
    }

    /// The four boundary flags, in `(start_in_reference, start_in_query,
    /// stop_in_reference, stop_in_query)` order.
    pub fn boundary_flags(&self) -> (bool, bool, bool, bool) {
        (
            self.start_in_reference,
            self.start_in_query,
            self.stop_in_reference,
            self.stop_in_query,
        )
    }

    /// Whether the reference is translated through the IUPAC table.
    pub fn wildcard_ref(&self) -> bool {
        self.wildcard_ref
    }

    /// Whether the query is translated through the IUPAC table.
    pub fn wildcard_query(&self) -> bool {
        self.wildcard_query
    }

    /// Debug matrix populated by the most recent `locate` call, if `debug`
    /// is enabled.
    pub fn dpmatrix(&self) -> Option<&DPMatrix> {
        self.dpmatrix.as_ref()
    }

    /// Replace the reference, reallocating the column buffer. On failure
    /// the aligner's previous reference and buffer are left untouched.
    pub fn set_reference(&mut self, reference: impl Into<String>) -> Result<(), AlignerError> {
        let reference = reference.into();
        let translated_reference =
            translate_reference(reference.as_bytes(), self.wildcard_ref, self.wildcard_query);
        let column = allocate_column(translated_reference.len())?;

        debug!(
            "replaced reference, new length {}",
            translated_reference.len()
        );

        self.m = translated_reference.len();
        self.reference = reference;
        self.translated_reference = translated_reference;
        self.column = column;
        Ok(())
    }

    /// Set the minimum accepted aligned reference length. Rejects values
    /// `< 1`.
    pub fn set_min_overlap(&mut self, min_overlap: i64) -> Result<(), AlignerError> {
        if min_overlap < 1 {
            return Err(AlignerError::MinOverlap { value: min_overlap });
        }
        self.min_overlap = min_overlap;
        Ok(())
    }

    /// Set both the insertion and deletion cost. Rejects values `< 1`.
    pub fn set_indel_cost(&mut self, indel_cost: i64) -> Result<(), AlignerError> {
        if indel_cost < 1 {
            return Err(AlignerError::IndelCost { value: indel_cost });
        }
        self.insertion_cost = indel_cost;
        self.deletion_cost = indel_cost;
        Ok(())
    }

    /// Locate the best semi-global overlap of `query` against the
    /// configured reference, under the error-rate and boundary-flag
    /// constraints. Returns `None` when no overlap satisfies
    /// `min_overlap` and the error-rate budget.
    pub fn locate(&mut self, query: &str) -> Option<AlignmentSpan> {
        let ascii_mode = !self.wildcard_ref && !self.wildcard_query;
        let translated_query =
            translate_query(query.as_bytes(), self.wildcard_ref, self.wildcard_query);

        let m = self.m as i64;
        let n = translated_query.len() as i64;
        let k = (self.max_error_rate * self.m as f64).floor() as i64;

        let min_n = if !self.stop_in_query {
            (n - m - k).max(0)
        } else {
            0
        };
        let max_n = if !self.start_in_query {
            (m + k).min(n)
        } else {
            n
        };

        trace!("locate: m={m} n={n} k={k} min_n={min_n} max_n={max_n}");

        self.dpmatrix = if self.debug {
            Some(DPMatrix::new(&self.reference, query))
        } else {
            None
        };

        self.seed_column(min_n);
        if let Some(dpm) = self.dpmatrix.as_mut() {
            for (i, entry) in self.column.iter().enumerate() {
                dpm.set(i, min_n as usize, entry.cost);
            }
        }

        let mut last: i64 = if !self.start_in_reference {
            m.min(k + 1)
        } else {
            m
        };

        let mut best: Option<Best> = None;

        'columns: for j in (min_n + 1)..=max_n {
            let query_char = translated_query[(j - 1) as usize];
            compute_column(
                &mut self.column,
                &self.translated_reference,
                query_char,
                ascii_mode,
                last,
                j,
                self.start_in_query,
                self.insertion_cost,
                self.deletion_cost,
            );

            if let Some(dpm) = self.dpmatrix.as_mut() {
                for i in 0..=(last.max(0) as usize) {
                    dpm.set(i, j as usize, self.column[i].cost);
                }
            }

            while last >= 0 && self.column[last as usize].cost > k {
                last -= 1;
            }

            if last == m && self.stop_in_query {
                let bottom = self.column[self.m];
                let length = bottom.aligned_length(m);
                if length >= self.min_overlap
                    && bottom.cost as f64 <= length as f64 * self.max_error_rate
                    && best.map(|b| b.beats(bottom.cost, bottom.matches)).unwrap_or(true)
                {
                    best = Some(Best {
                        cost: bottom.cost,
                        matches: bottom.matches,
                        origin: bottom.origin,
                        ref_stop: m,
                        query_stop: j,
                    });
                    if bottom.cost == 0 && bottom.matches == m {
                        debug!("locate: exact match at query column {j}, stopping early");
                        break 'columns;
                    }
                }
            }

            if last < m {
                last += 1;
            }
        }

        if max_n == n {
            let first_i: i64 = if self.stop_in_reference { 0 } else { m };
            for i in first_i..=m {
                let entry = self.column[i as usize];
                let length = entry.aligned_length(i);
                if length >= self.min_overlap
                    && entry.cost as f64 <= length as f64 * self.max_error_rate
                    && best.map(|b| b.beats(entry.cost, entry.matches)).unwrap_or(true)
                {
                    best = Some(Best {
                        cost: entry.cost,
                        matches: entry.matches,
                        origin: entry.origin,
                        ref_stop: i,
                        query_stop: n,
                    });
                }
            }
        }

        let best = best?;
        let (start1, start2) = if best.origin >= 0 {
            (0, best.origin)
        } else {
            (-best.origin, 0)
        };
        Some((start1, best.ref_stop, start2, best.query_stop, best.matches, best.cost))
    }

    fn seed_column(&mut self, min_n: i64) {
        for i in 0..=self.m {
            let ii = i as i64;
            let (cost, origin) = match (self.start_in_reference, self.start_in_query) {
                (false, false) => (ii.max(min_n) * self.insertion_cost, 0),
                (true, false) => (min_n * self.insertion_cost, (min_n - ii).min(0)),
                (false, true) => (ii * self.insertion_cost, (min_n - ii).max(0)),
                (true, true) => (ii.min(min_n) * self.insertion_cost, min_n - ii),
            };
            self.column[i] = Entry {
                cost,
                matches: 0,
                origin,
            };
        }
    }

}

/// Fill `column` (already holding column `j-1`) in place with column `j`,
/// for rows `1..=last`. Row 0 is updated here too, per the boundary-flag
/// rule for a fresh start.
#[allow(clippy::too_many_arguments)]
fn compute_column(
    column: &mut [Entry],
    reference: &[u8],
    query_char: u8,
    ascii_mode: bool,
    last: i64,
    j: i64,
    start_in_query: bool,
    insertion_cost: i64,
    deletion_cost: i64,
) {
    let diag0 = column[0];
    if start_in_query {
        column[0].origin = j;
    } else {
        column[0].cost = j * insertion_cost;
    }
    let mut diag_entry = diag0;

    for i in 1..=last {
        let iu = i as usize;
        let old_i = column[iu];
        let equal = characters_match(ascii_mode, reference[iu - 1], query_char);

        let new_entry = if equal {
            Entry {
                cost: diag_entry.cost,
                matches: diag_entry.matches + 1,
                origin: diag_entry.origin,
            }
        } else {
            let mismatch = Entry {
                cost: diag_entry.cost + 1,
                matches: diag_entry.matches,
                origin: diag_entry.origin,
            };
            // `old_i` is column[i]'s value from column j-1 (same reference
            // row, previous query column): consuming one more query
            // character without advancing the reference row, i.e. insertion.
            let insertion = Entry {
                cost: old_i.cost + insertion_cost,
                matches: old_i.matches,
                origin: old_i.origin,
            };
            // column[i-1] has already been overwritten for column j (previous
            // reference row, same query column): consuming one more
            // reference character without advancing the query column, i.e.
            // deletion.
            let deletion_src = column[iu - 1];
            let deletion = Entry {
                cost: deletion_src.cost + deletion_cost,
                matches: deletion_src.matches,
                origin: deletion_src.origin,
            };

            // Mismatch first, then insertion, then deletion at equal cost.
            // This ordering decides which `matches` count rides along on a
            // tie and therefore which alignment ultimately wins; it must
            // not change.
            if mismatch.cost <= deletion.cost && mismatch.cost <= insertion.cost {
                mismatch
            } else if insertion.cost <= deletion.cost {
                insertion
            } else {
                deletion
            }
        };

        column[iu] = new_entry;
        diag_entry = old_i;
    }
}

/// Not part of the public contract: reports the raw `try_reserve` failure
/// with `anyhow` context before the caller translates it into the typed
/// [`AlignerError::ColumnAllocation`] the public API promises.
fn try_allocate_column(translated_len: usize) -> anyhow::Result<Vec<Entry>> {
    let len = translated_len + 1;
    let mut column = Vec::new();
    column
        .try_reserve(len)
        .with_context(|| format!("reserving {len} DP entries for a column buffer"))?;
    column.resize(len, Entry::default());
    Ok(column)
}

fn allocate_column(translated_len: usize) -> Result<Vec<Entry>, AlignerError> {
    try_allocate_column(translated_len).map_err(|err| {
        debug!("column allocation failed: {err:#}");
        AlignerError::ColumnAllocation { len: translated_len }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn aligner(reference: &str, max_error_rate: f64, config: AlignerConfig) -> Aligner {
        Aligner::new(reference, max_error_rate, config).unwrap()
    }

    #[test]
    fn test_mississippi_sissi() {
        let mut a = aligner(
            "MISSISSIPPI",
            0.1,
            AlignerConfig {
                indel_cost: 1,
                ..Default::default()
            },
        );
        assert_eq!(a.locate("SISSI"), Some((3, 8, 0, 5, 5, 0)));
    }

    #[test]
    fn test_exact_match() {
        let mut a = aligner("ACGTACGT", 0.0, AlignerConfig::default());
        assert_eq!(a.locate("ACGTACGT"), Some((0, 8, 0, 8, 8, 0)));
    }

    #[test]
    fn test_single_mismatch_within_budget() {
        let mut a = aligner("ACGTACGT", 0.2, AlignerConfig::default());
        assert_eq!(a.locate("ACGTTCGT"), Some((0, 8, 0, 8, 7, 1)));
    }

    #[test]
    fn test_wildcard_ref_acgt_matches_plain_query() {
        let mut a = aligner(
            "ACGT",
            0.0,
            AlignerConfig {
                wildcard_ref: true,
                ..Default::default()
            },
        );
        assert_eq!(a.locate("ACGT"), Some((0, 4, 0, 4, 4, 0)));
    }

    #[test]
    fn test_wildcard_ref_n_matches_all() {
        let mut a = aligner(
            "NNNN",
            0.0,
            AlignerConfig {
                wildcard_ref: true,
                ..Default::default()
            },
        );
        let (_, _, _, _, matches, errors) = a.locate("ACGT").unwrap();
        assert_eq!(matches, 4);
        assert_eq!(errors, 0);
    }

    #[test]
    fn test_wildcard_query_x_matches_nothing() {
        let mut a = aligner(
            "ACGT",
            0.0,
            AlignerConfig {
                wildcard_query: true,
                ..Default::default()
            },
        );
        assert_eq!(a.locate("XXXX"), None);
    }

    #[test]
    fn test_exact_match_with_max_error_rate_zero_requires_exact() {
        let mut a = aligner("ACGTACGT", 0.0, AlignerConfig::default());
        assert_eq!(a.locate("ACGTTCGT"), None);
    }

    #[test]
    fn test_min_overlap_rejects_zero() {
        let err = Aligner::new(
            "ACGT",
            0.1,
            AlignerConfig {
                min_overlap: 0,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, AlignerError::MinOverlap { value: 0 }));
    }

    #[test]
    fn test_indel_cost_rejects_zero() {
        let err = Aligner::new(
            "ACGT",
            0.1,
            AlignerConfig {
                indel_cost: 0,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, AlignerError::IndelCost { value: 0 }));
    }

    #[test]
    fn test_set_reference_updates_state() {
        let mut a = aligner("ACGT", 0.1, AlignerConfig::default());
        a.set_reference("TTTTTT").unwrap();
        assert_eq!(a.reference(), "TTTTTT");
        assert_eq!(a.reference_len(), 6);
        assert_eq!(
            a.locate("TTTTTT"),
            Some((0, 6, 0, 6, 6, 0))
        );
    }

    #[test]
    fn test_set_min_overlap_rejects_invalid() {
        let mut a = aligner("ACGT", 0.1, AlignerConfig::default());
        assert!(a.set_min_overlap(0).is_err());
        assert_eq!(a.min_overlap(), 1);
        a.set_min_overlap(3).unwrap();
        assert_eq!(a.min_overlap(), 3);
    }

    #[test]
    fn test_debug_matrix_records_seed_column() {
        let mut a = aligner(
            "AC",
            0.5,
            AlignerConfig {
                debug: true,
                ..Default::default()
            },
        );
        a.locate("AC");
        let dpm = a.dpmatrix().expect("debug matrix populated");
        // Seed column (j=0) under the default (start_in_reference=true,
        // start_in_query=true) rule: cost(i, 0) = min(i, min_n) * insertion_cost
        // = 0 for every row, since min_n = 0 here.
        assert_eq!(dpm.get(0, 0), Some(0));
        assert_eq!(dpm.get(1, 0), Some(0));
        assert_eq!(dpm.get(2, 0), Some(0));
        // "AC" against "AC" is an exact match, so the bottom-right cell (the
        // cost the engine itself used to accept the exit) must be 0 too.
        assert_eq!(dpm.get(2, 2), Some(0));
    }

    #[test]
    fn test_no_alignment_when_min_overlap_too_large() {
        let mut a = aligner(
            "ACGT",
            0.5,
            AlignerConfig {
                min_overlap: 10,
                ..Default::default()
            },
        );
        assert_eq!(a.locate("ACGT"), None);
    }
}
