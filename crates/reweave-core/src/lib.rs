//! # reweave-core
//!
//! Merges freshly regenerated code fragments into files the user may
//! have edited by hand, without losing either side's work.
//!
//! Plain regeneration overwrites hand edits; never regenerating lets
//! generated code rot. This engine threads the needle by comparing
//! three versions of the text: the current file on disk, the new
//! fragment the generator just produced, and the previous generation's
//! output, reconstructed by replaying the previous template over the
//! previous input. What changed between the two generations is the
//! template's business and is carried into the file; what changed
//! between the previous generation and the current file is the user's
//! business and is left alone.
//!
//! ## Pipeline
//!
//! 1. **Parse**: each text becomes a tree of units at the configured
//!    granularity, either the whole file, individual lines, or
//!    syntax-aware declarations and statements via tree-sitter.
//!
//! 2. **Locate**: unit trees are matched pairwise by kind and
//!    signature into correspondence maps, comparing the new fragment
//!    against the current file and the previous generation, and the
//!    current file against the previous generation.
//!
//! 3. **Reconcile**: the maps are compared and every divergence is
//!    classified as an insertion (novel in the new fragment), a
//!    deletion (withdrawn since the previous generation), or a
//!    replacement (same unit, drifted text).
//!
//! 4. **Patch**: the edit set is spliced into the current file as
//!    minimal byte-range edits, so untouched content survives the
//!    merge byte for byte.
//!
//! ## Supported Languages
//!
//! Declaration granularity supports Rust, JavaScript, TypeScript,
//! Python, Java, Go, C, and C++. File and line granularities work on
//! any text.
//!
//! ## Example
//!
//! ```rust
//! use reweave_core::{MergeEngine, MergeGranularity, Settings};
//!
//! let mut settings = Settings::default();
//! settings.granularity = MergeGranularity::Line;
//! let engine = MergeEngine::new(settings);
//!
//! // No previous generation is known, so new lines are added and
//! // nothing is ever removed.
//! let merged = engine
//!     .merge_texts("alpha\nbeta\n", "alpha\nbeta\ngamma\n", None)
//!     .unwrap();
//! assert_eq!(merged, "alpha\nbeta\ngamma\n");
//! ```

pub mod config;
pub mod correspondence;
pub mod document;
pub mod engine;
pub mod error;
pub mod generator;
pub mod history;
pub mod location;
pub mod locator;
pub mod logging;
pub mod parser;
pub mod patch;
pub mod reconcile;

pub use config::{HistorySettings, MergeGranularity, Settings};
pub use correspondence::{CorrespondenceEntry, CorrespondenceMap};
pub use document::{DocRole, Document, Node, NodeId, NodeKind, Signature, UnitKind};
pub use engine::MergeEngine;
pub use error::MergeError;
pub use generator::{GenerateError, HandlebarsGenerator, TemplateExpander};
pub use history::{GitHistory, HistoryError, HistoryResolver, StaticHistory};
pub use location::{LineIndex, Location};
pub use logging::init_logging;
pub use parser::{DocumentParser, Language, ParseError, PlainParser, TreeSitterParser};
pub use reconcile::{reconcile, Reconciliation};
