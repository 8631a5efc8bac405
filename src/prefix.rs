//! The stateless, indel-free fast path used when no gaps are allowed.

use crate::tables::{characters_match, translate_query, translate_reference};
use crate::AlignmentSpan;

/// Compare `reference` and `query` position by position over
/// `length = min(|reference|, |query|)`, using the same character-mode
/// selection as [`crate::Aligner::locate`]. No indels are considered.
///
/// Always returns a span; there is no "no alignment" case.
pub fn compare_prefixes(
    reference: &str,
    query: &str,
    wildcard_ref: bool,
    wildcard_query: bool,
) -> AlignmentSpan {
    let ascii_mode = !wildcard_ref && !wildcard_query;
    let r = translate_reference(reference.as_bytes(), wildcard_ref, wildcard_query);
    let q = translate_query(query.as_bytes(), wildcard_ref, wildcard_query);

    let length = r.len().min(q.len());
    let matches = (0..length)
        .filter(|&i| characters_match(ascii_mode, r[i], q[i]))
        .count() as i64;
    let length = length as i64;

    (0, length, 0, length, matches, length - matches)
}
