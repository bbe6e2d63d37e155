//! Applies an edit set to the current file's text.
//!
//! Every entry of the edit map is a splice: the bytes of the current
//! file under the entry's target span are replaced by the bytes of
//! the fragment under the entry's source span. A sentinel source
//! deletes, a zero-width target inserts. Splices are applied back to
//! front so earlier offsets stay valid, and bytes outside the spliced
//! spans are never rewritten.

use std::ops::Range;

use crate::correspondence::CorrespondenceMap;
use crate::error::MergeError;
use crate::location::{LineIndex, Location};

struct Splice {
    start: usize,
    end: usize,
    replacement: Range<usize>,
    target: Location,
}

/// Splice `edits` into `current_text`, drawing replacement bytes from
/// `fragment_text`.
///
/// Entries whose target is the sentinel address nothing and are
/// skipped. Overlapping targets are refused before anything is
/// touched, so the input text is never half-modified.
pub fn apply(
    current_text: &str,
    fragment_text: &str,
    edits: &CorrespondenceMap,
) -> Result<String, MergeError> {
    let current_index = LineIndex::new(current_text);
    let fragment_index = LineIndex::new(fragment_text);

    let mut splices: Vec<Splice> = Vec::with_capacity(edits.len());
    for (_, entry) in edits {
        if entry.to.is_empty() {
            continue;
        }
        let range = current_index.byte_range(&entry.to);
        let replacement = if entry.from.is_empty() {
            0..0
        } else {
            fragment_index.byte_range(&entry.from)
        };
        splices.push(Splice {
            start: range.start,
            end: range.end,
            replacement,
            target: entry.to,
        });
    }

    let mut order: Vec<usize> = (0..splices.len()).collect();
    order.sort_by_key(|&i| (splices[i].start, splices[i].end));
    for pair in order.windows(2) {
        let (a, b) = (&splices[pair[0]], &splices[pair[1]]);
        if a.end > b.start {
            return Err(MergeError::PatchConflict {
                first: a.target,
                second: b.target,
            });
        }
    }

    // Back to front over the sorted order. The sort is stable, so
    // same-point insertions keep their map order in the output.
    let mut out = current_text.to_string();
    for &i in order.iter().rev() {
        let s = &splices[i];
        out.replace_range(s.start..s.end, &fragment_text[s.replacement.clone()]);
    }
    Ok(out)
}
