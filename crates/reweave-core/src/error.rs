//! Failure modes of a full reconcile-and-apply cycle.
//!
//! Collaborator seams keep their own error types; this enum is what
//! the engine's entry points hand back. Note that a missing previous
//! generation is not here: absent history is ordinary data and the
//! engine degrades to insert-only behavior instead of failing.

use thiserror::Error;

use crate::generator::GenerateError;
use crate::location::Location;
use crate::parser::ParseError;

#[derive(Debug, Error)]
pub enum MergeError {
    /// One of the three documents could not be parsed. The inner
    /// error names which one.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Re-expanding the previous template against the previous input
    /// failed, so the previous generation cannot be reconstructed.
    #[error("template generation failed: {0}")]
    Generation(#[from] GenerateError),

    /// Two edits claim overlapping spans of the current file. The
    /// reconciler never produces such a set; this guards hand-built
    /// edit maps and future derivation bugs alike.
    #[error("conflicting edits: {first} overlaps {second}")]
    PatchConflict { first: Location, second: Location },

    /// Declaration granularity was requested without a language to
    /// parse it with.
    #[error("declaration granularity requires a configured language")]
    LanguageRequired,
}
