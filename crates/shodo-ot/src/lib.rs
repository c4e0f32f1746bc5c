//! Operation model and transformation engine for collaborative text
//! documents.
//!
//! The document is a paragraph list addressed in *steps* (caret gap
//! positions); every mutation is a typed [`Operation`] that executes
//! deterministically against a [`DocumentModel`]. Concurrent operations
//! are reconciled by pairwise [transformation](transform::transform):
//! both sites end up applying the same effects in a different order and
//! converge to identical state.
//!
//! Layer map:
//!
//! ```text
//! module     holds
//! ─────────  ─────────────────────────────────────────────────────
//! document   paragraphs, inline items, styles, metadata, members
//! step       raw-position walk + filter = step addressing
//! cursor     per-member carets / selections
//! ops        the typed operation set, execution
//! factory    untyped JSON opspec -> typed Operation boundary
//! transform  pairwise OT, conflict rules, tie-breaks
//! ```
//!
//! Sequencing (who may apply what, in which order) lives one crate up;
//! this crate is purely the state machine and its algebra.

pub mod cursor;
pub mod document;
pub mod error;
pub mod factory;
pub mod ops;
pub mod step;
pub mod transform;

pub use cursor::{Cursor, CursorSet, SelectionType};
pub use document::{DocumentModel, Inline, Paragraph};
pub use error::{OtError, Result};
pub use factory::OperationFactory;
pub use ops::{Operation, OpKind};
pub use step::{StepIterator, StepPosition};
pub use transform::{transform, transform_pair, Transformed};
