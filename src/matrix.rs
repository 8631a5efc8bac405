//! The debug-only DP matrix observer.
//!
//! No alignment logic reads from a [`DPMatrix`]; it exists purely so a
//! caller running with `debug` enabled can print the cost matrix that
//! [`crate::Aligner::locate`] computed.

use std::fmt;

/// A sparse `(m+1) x (n+1)` table of optional costs, keyed by reference row
/// and query column, labeled for display by the reference and query
/// characters.
#[derive(Debug, Clone)]
pub struct DPMatrix {
    ref_labels: Vec<char>,
    query_labels: Vec<char>,
    cols: usize,
    cells: Vec<Option<i64>>,
}

impl DPMatrix {
    /// Allocate an absent `(reference.len()+1) x (query.len()+1)` table.
    pub fn new(reference: &str, query: &str) -> Self {
        let ref_labels: Vec<char> = reference.chars().collect();
        let query_labels: Vec<char> = query.chars().collect();
        let rows = ref_labels.len() + 1;
        let cols = query_labels.len() + 1;
        DPMatrix {
            ref_labels,
            query_labels,
            cols,
            cells: vec![None; rows * cols],
        }
    }

    /// Record the cost computed at `(i, j)`.
    pub fn set(&mut self, i: usize, j: usize, cost: i64) {
        if let Some(slot) = self.cells.get_mut(i * self.cols + j) {
            *slot = Some(cost);
        }
    }

    /// Read back the cost recorded at `(i, j)`, if any was computed.
    pub fn get(&self, i: usize, j: usize) -> Option<i64> {
        self.cells.get(i * self.cols + j).copied().flatten()
    }
}

impl fmt::Display for DPMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "     ")?;
        for c in &self.query_labels {
            write!(f, "{c:>5}")?;
        }
        writeln!(f)?;

        for i in 0..=self.ref_labels.len() {
            let label = if i == 0 { ' ' } else { self.ref_labels[i - 1] };
            write!(f, "{label:>3}  ")?;
            for j in 0..=self.query_labels.len() {
                match self.get(i, j) {
                    Some(cost) => write!(f, "{cost:>5}")?,
                    None => write!(f, "{:>5}", "")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_set_and_get_roundtrip() {
        let mut m = DPMatrix::new("AC", "ACG");
        m.set(0, 0, 0);
        m.set(2, 3, 5);
        assert_eq!(m.get(0, 0), Some(0));
        assert_eq!(m.get(2, 3), Some(5));
        assert_eq!(m.get(1, 1), None);
    }

    #[test]
    fn test_out_of_range_set_is_ignored() {
        let mut m = DPMatrix::new("A", "A");
        m.set(5, 5, 1);
        assert_eq!(m.get(5, 5), None);
    }

    #[test]
    fn test_display_renders_labels() {
        let mut m = DPMatrix::new("A", "C");
        m.set(0, 0, 0);
        m.set(1, 1, 1);
        let rendered = format!("{m}");
        assert!(rendered.contains('A'));
        assert!(rendered.contains('C'));
    }
}
