//! Per-member cursor and selection state.
//!
//! Cursors are expressed as step positions and moved only by operations
//! (`AddCursor`, `RemoveCursor`, `MoveCursor`) or shifted transactionally as
//! part of a content operation's execution. They are never mutated out of
//! band, so every replica observes identical cursor state after the same
//! operation sequence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shodo_types::MemberId;

/// Kind of selection a cursor represents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr)]
pub enum SelectionType {
    /// An ordinary text range (possibly collapsed to a caret).
    #[default]
    Range,
    /// A region selection (e.g. an annotation body or an embedded object).
    Region,
}

/// A member's caret / selection, in step coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Owning member. Exactly one cursor per member per document.
    pub memberid: MemberId,
    /// Fixed end of the selection.
    pub anchor: u32,
    /// Moving end of the selection. `anchor == focus` ⇒ collapsed caret.
    pub focus: u32,
    /// Selection kind.
    pub selection_type: SelectionType,
}

impl Cursor {
    /// A collapsed caret at `step`.
    pub fn collapsed(memberid: MemberId, step: u32) -> Self {
        Self {
            memberid,
            anchor: step,
            focus: step,
            selection_type: SelectionType::Range,
        }
    }

    /// Whether the selection is collapsed to a caret.
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Lower end of the selection.
    pub fn start(&self) -> u32 {
        self.anchor.min(self.focus)
    }

    /// Upper end of the selection.
    pub fn end(&self) -> u32 {
        self.anchor.max(self.focus)
    }
}

/// The cursor table: at most one cursor per member.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CursorSet {
    cursors: BTreeMap<MemberId, Cursor>,
}

impl CursorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cursor for a member. Fails (false) if one already exists.
    pub fn add(&mut self, cursor: Cursor) -> bool {
        if self.cursors.contains_key(&cursor.memberid) {
            return false;
        }
        self.cursors.insert(cursor.memberid.clone(), cursor);
        true
    }

    /// Remove a member's cursor. Fails (false) if none exists.
    pub fn remove(&mut self, memberid: &MemberId) -> bool {
        self.cursors.remove(memberid).is_some()
    }

    pub fn get(&self, memberid: &MemberId) -> Option<&Cursor> {
        self.cursors.get(memberid)
    }

    pub fn get_mut(&mut self, memberid: &MemberId) -> Option<&mut Cursor> {
        self.cursors.get_mut(memberid)
    }

    pub fn contains(&self, memberid: &MemberId) -> bool {
        self.cursors.contains_key(memberid)
    }

    /// Iterate cursors in member-id order (deterministic).
    pub fn iter(&self) -> impl Iterator<Item = &Cursor> {
        self.cursors.values()
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Shift all cursor endpoints for an insertion of `length` step units
    /// at `position`. Endpoints at or after the insertion point move right.
    pub fn shift_for_insert(&mut self, position: u32, length: u32) {
        for cursor in self.cursors.values_mut() {
            cursor.anchor = shift_point_insert(cursor.anchor, position, length);
            cursor.focus = shift_point_insert(cursor.focus, position, length);
        }
    }

    /// Shift all cursor endpoints for a removal of `length` step units
    /// starting at `position`. Endpoints inside the removed range clamp to
    /// its start; endpoints past it move left.
    pub fn shift_for_remove(&mut self, position: u32, length: u32) {
        for cursor in self.cursors.values_mut() {
            cursor.anchor = shift_point_remove(cursor.anchor, position, length);
            cursor.focus = shift_point_remove(cursor.focus, position, length);
        }
    }
}

pub(crate) fn shift_point_insert(p: u32, position: u32, length: u32) -> u32 {
    if p >= position {
        p.saturating_add(length)
    } else {
        p
    }
}

pub(crate) fn shift_point_remove(p: u32, position: u32, length: u32) -> u32 {
    if p <= position {
        p
    } else if p < position.saturating_add(length) {
        position
    } else {
        p - length
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn member(s: &str) -> MemberId {
        MemberId::new(s)
    }

    #[test]
    fn test_one_cursor_per_member() {
        let mut set = CursorSet::new();
        assert!(set.add(Cursor::collapsed(member("alice_1"), 0)));
        assert!(!set.add(Cursor::collapsed(member("alice_1"), 5)));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&member("alice_1")).unwrap().anchor, 0);
    }

    #[test]
    fn test_remove_missing_cursor() {
        let mut set = CursorSet::new();
        assert!(!set.remove(&member("ghost_1")));
    }

    #[test]
    fn test_shift_for_insert() {
        let mut set = CursorSet::new();
        set.add(Cursor::collapsed(member("a_1"), 2));
        set.add(Cursor::collapsed(member("b_1"), 5));

        set.shift_for_insert(3, 4);
        assert_eq!(set.get(&member("a_1")).unwrap().anchor, 2); // before insert
        assert_eq!(set.get(&member("b_1")).unwrap().anchor, 9); // after insert
    }

    #[test]
    fn test_shift_for_insert_at_cursor() {
        // A cursor exactly at the insertion point moves past the new text.
        let mut set = CursorSet::new();
        set.add(Cursor::collapsed(member("a_1"), 3));
        set.shift_for_insert(3, 2);
        assert_eq!(set.get(&member("a_1")).unwrap().anchor, 5);
    }

    #[test]
    fn test_shift_for_remove_clamps_inside() {
        let mut set = CursorSet::new();
        set.add(Cursor::collapsed(member("a_1"), 4));
        set.shift_for_remove(2, 5);
        assert_eq!(set.get(&member("a_1")).unwrap().anchor, 2);
    }

    #[test]
    fn test_shift_for_remove_after_range() {
        let mut set = CursorSet::new();
        set.add(Cursor::collapsed(member("a_1"), 10));
        set.shift_for_remove(2, 3);
        assert_eq!(set.get(&member("a_1")).unwrap().anchor, 7);
    }

    #[test]
    fn test_selection_helpers() {
        let mut c = Cursor::collapsed(member("a_1"), 4);
        assert!(c.is_collapsed());
        c.focus = 2;
        assert!(!c.is_collapsed());
        assert_eq!(c.start(), 2);
        assert_eq!(c.end(), 4);
    }
}
