//! Step traversal over the document model.
//!
//! Operations address content by step, but the model stores inline items.
//! This module walks the *raw* positions of the item tree (every gap before,
//! inside, and after each item) and filters them down to the accepted step
//! positions. The filter is what gives zero-step items their behavior: an
//! annotation marker contributes raw positions but none of them are
//! accepted, so it is invisible to step arithmetic.
//!
//! Raw positions within a paragraph are walked in item order:
//! `(item 0, offset 0), (item 0, offset 1) .. (item 0, offset len_0),
//! (item 1, offset 0), ..`. Note `(item i, len_i)` and `(item i+1, 0)`
//! denote the same gap; the filter accepts at most one of the two, so each
//! gap counts once.

use crate::document::DocumentModel;

/// A position in the raw item tree: a gap within (or at the edge of) one
/// item of one paragraph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawPosition {
    pub paragraph: usize,
    pub item: usize,
    pub offset: u32,
}

/// Verdict of a [`PositionFilter`] on a raw position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterResult {
    Accept,
    Reject,
}

/// Decides which raw positions are step positions.
pub trait PositionFilter {
    fn accept(&self, doc: &DocumentModel, pos: &RawPosition) -> FilterResult;
}

/// The standard text filter.
///
/// Accepts the paragraph start gap (`item 0, offset 0`) and every gap
/// reached by consuming at least one step unit of an item (`offset > 0`).
/// Zero-step items only ever present `offset 0` gaps past item 0, so they
/// are skipped.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextPositionFilter;

impl PositionFilter for TextPositionFilter {
    fn accept(&self, _doc: &DocumentModel, pos: &RawPosition) -> FilterResult {
        if (pos.item == 0 && pos.offset == 0) || pos.offset > 0 {
            FilterResult::Accept
        } else {
            FilterResult::Reject
        }
    }
}

/// An accepted step position: the paragraph, the step offset within it,
/// and the step count from the iterator's counting origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepPosition {
    pub paragraph: usize,
    /// Step offset within the paragraph, `0 ..= paragraph step_len`. The
    /// boundary gap after a paragraph reports as that paragraph's end.
    pub offset: u32,
    /// Steps advanced since the counting origin (document start for an
    /// iterator made with [`StepIterator::new`]).
    pub step: u32,
}

/// Walks accepted step positions over a document snapshot.
///
/// The iterator holds an immutable borrow of the document, so positions can
/// never go stale mid-walk; mutate the document, make a new iterator.
pub struct StepIterator<'a, F: PositionFilter = TextPositionFilter> {
    doc: &'a DocumentModel,
    filter: F,
    pos: RawPosition,
    step: u32,
    para_offset: u32,
    // Filter verdict for `pos`; recomputing on every query is wasteful, so
    // it is cached and cleared whenever `pos` moves.
    is_step: Option<bool>,
}

impl<'a> StepIterator<'a, TextPositionFilter> {
    /// Iterator at document start (step 0) with the standard text filter.
    pub fn new(doc: &'a DocumentModel) -> Self {
        Self::with_filter(doc, TextPositionFilter)
    }
}

impl<'a, F: PositionFilter> StepIterator<'a, F> {
    pub fn with_filter(doc: &'a DocumentModel, filter: F) -> Self {
        Self {
            doc,
            filter,
            pos: RawPosition {
                paragraph: 0,
                item: 0,
                offset: 0,
            },
            step: 0,
            para_offset: 0,
            is_step: None,
        }
    }

    /// Current raw position.
    pub fn raw_position(&self) -> RawPosition {
        self.pos
    }

    /// Jump to an arbitrary raw position. Resets the step counting origin
    /// to here; callers needing absolute steps should count from a fresh
    /// iterator instead.
    pub fn set_position(&mut self, pos: RawPosition) {
        self.pos = pos;
        self.step = 0;
        self.para_offset = 0;
        self.is_step = None;
    }

    /// Whether the current raw position is an accepted step position.
    pub fn is_step(&mut self) -> bool {
        if let Some(v) = self.is_step {
            return v;
        }
        let v = matches!(
            self.filter.accept(self.doc, &self.pos),
            FilterResult::Accept
        );
        self.is_step = Some(v);
        v
    }

    /// Advance to the next accepted step position. Returns `false` (and
    /// leaves the position unchanged) at the end of the document.
    pub fn next_step(&mut self) -> bool {
        let saved = self.pos;
        let from_para = self.pos.paragraph;
        while self.next_raw() {
            if self.is_step() {
                self.step += 1;
                if self.pos.paragraph != from_para {
                    self.para_offset = 0;
                } else {
                    self.para_offset += 1;
                }
                return true;
            }
        }
        self.pos = saved;
        self.is_step = None;
        false
    }

    /// Move to the previous accepted step position. Returns `false` (and
    /// leaves the position unchanged) at the start of the document.
    pub fn previous_step(&mut self) -> bool {
        let saved = self.pos;
        let from_para = self.pos.paragraph;
        while self.prev_raw() {
            if self.is_step() {
                self.step = self.step.saturating_sub(1);
                if self.pos.paragraph != from_para {
                    self.para_offset = self.doc.paragraphs[self.pos.paragraph].step_len();
                } else {
                    self.para_offset = self.para_offset.saturating_sub(1);
                }
                return true;
            }
        }
        self.pos = saved;
        self.is_step = None;
        false
    }

    /// If the current raw position is rejected, move to the closest
    /// accepted one: backwards first, forwards only when nothing precedes.
    /// Returns `false` only if the filter accepts no position at all.
    pub fn round_to_closest_step(&mut self) -> bool {
        if self.is_step() {
            return true;
        }
        let saved = self.pos;
        while self.prev_raw() {
            if self.is_step() {
                return true;
            }
        }
        self.pos = saved;
        self.is_step = None;
        while self.next_raw() {
            if self.is_step() {
                return true;
            }
        }
        self.pos = saved;
        self.is_step = None;
        false
    }

    /// Snapshot of the current position. Meaningful once the iterator
    /// rests on an accepted position.
    pub fn snapshot(&self) -> StepPosition {
        StepPosition {
            paragraph: self.pos.paragraph,
            offset: self.para_offset,
            step: self.step,
        }
    }

    fn item_len(&self, paragraph: usize, item: usize) -> u32 {
        self.doc.paragraphs[paragraph]
            .items
            .get(item)
            .map(|i| i.step_len())
            .unwrap_or(0)
    }

    fn next_raw(&mut self) -> bool {
        self.is_step = None;
        let para = &self.doc.paragraphs[self.pos.paragraph];
        if !para.items.is_empty() {
            if self.pos.offset < self.item_len(self.pos.paragraph, self.pos.item) {
                self.pos.offset += 1;
                return true;
            }
            if self.pos.item + 1 < para.items.len() {
                self.pos.item += 1;
                self.pos.offset = 0;
                return true;
            }
        }
        if self.pos.paragraph + 1 < self.doc.paragraphs.len() {
            self.pos = RawPosition {
                paragraph: self.pos.paragraph + 1,
                item: 0,
                offset: 0,
            };
            return true;
        }
        false
    }

    fn prev_raw(&mut self) -> bool {
        self.is_step = None;
        if self.pos.offset > 0 {
            self.pos.offset -= 1;
            return true;
        }
        if self.pos.item > 0 {
            self.pos.item -= 1;
            self.pos.offset = self.item_len(self.pos.paragraph, self.pos.item);
            return true;
        }
        if self.pos.paragraph > 0 {
            let paragraph = self.pos.paragraph - 1;
            let items = self.doc.paragraphs[paragraph].items.len();
            let item = items.saturating_sub(1);
            self.pos = RawPosition {
                paragraph,
                item,
                offset: self.item_len(paragraph, item),
            };
            return true;
        }
        false
    }
}

/// Resolve an absolute step to its position, or `None` when past the end.
pub fn position_at_step(doc: &DocumentModel, step: u32) -> Option<StepPosition> {
    let mut iter = StepIterator::new(doc);
    for _ in 0..step {
        if !iter.next_step() {
            return None;
        }
    }
    Some(iter.snapshot())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentModel, Inline};

    #[test]
    fn test_walk_counts_every_gap_once() {
        let doc = DocumentModel::from_paragraphs(&["AB", "C"]);
        let mut iter = StepIterator::new(&doc);
        let mut steps = 1; // position 0
        while iter.next_step() {
            steps += 1;
        }
        assert_eq!(steps, doc.position_count());
        // At the last position, stuck.
        assert!(!iter.next_step());
        assert_eq!(iter.snapshot().step, doc.max_step());
    }

    #[test]
    fn test_markers_are_invisible_to_steps() {
        let mut doc = DocumentModel::from_paragraphs(&["AB"]);
        doc.paragraphs[0]
            .items
            .insert(0, Inline::AnnotationStart { name: "n".into() });
        doc.paragraphs[0]
            .items
            .push(Inline::AnnotationEnd { name: "n".into() });

        assert_eq!(doc.position_count(), 3);
        let end = position_at_step(&doc, 2).unwrap();
        assert_eq!((end.paragraph, end.offset), (0, 2));
        assert!(position_at_step(&doc, 3).is_none());
    }

    #[test]
    fn test_boundary_resolves_to_first_paragraph_end() {
        let doc = DocumentModel::from_paragraphs(&["AB", "CD"]);
        let boundary = position_at_step(&doc, 2).unwrap();
        assert_eq!((boundary.paragraph, boundary.offset), (0, 2));
        let after = position_at_step(&doc, 3).unwrap();
        assert_eq!((after.paragraph, after.offset), (1, 0));
    }

    #[test]
    fn test_previous_step_is_inverse_of_next() {
        let doc = DocumentModel::from_paragraphs(&["AB", "CD"]);
        let mut iter = StepIterator::new(&doc);
        while iter.next_step() {}
        let end = iter.raw_position();

        while iter.previous_step() {}
        assert_eq!(
            iter.raw_position(),
            RawPosition {
                paragraph: 0,
                item: 0,
                offset: 0
            }
        );
        assert!(!iter.previous_step());

        while iter.next_step() {}
        assert_eq!(iter.raw_position(), end);
    }

    #[test]
    fn test_round_to_closest_step_prefers_previous() {
        let mut doc = DocumentModel::from_paragraphs(&["AB"]);
        doc.paragraphs[0]
            .items
            .push(Inline::AnnotationStart { name: "n".into() });

        // The marker's own gap (item 1, offset 0) is rejected; rounding
        // lands on the gap after "AB".
        let mut iter = StepIterator::new(&doc);
        iter.set_position(RawPosition {
            paragraph: 0,
            item: 1,
            offset: 0,
        });
        assert!(!iter.is_step());
        assert!(iter.round_to_closest_step());
        assert_eq!(
            iter.raw_position(),
            RawPosition {
                paragraph: 0,
                item: 0,
                offset: 2
            }
        );
    }

    #[test]
    fn test_empty_paragraph_has_single_step() {
        let doc = DocumentModel::from_paragraphs(&["A", "", "B"]);
        // Steps: 0 |A, 1 A|, 2 empty para, 3 |B, 4 B|
        assert_eq!(doc.position_count(), 5);
        let mid = position_at_step(&doc, 2).unwrap();
        assert_eq!((mid.paragraph, mid.offset), (1, 0));
        let b = position_at_step(&doc, 3).unwrap();
        assert_eq!((b.paragraph, b.offset), (2, 0));
    }
}
