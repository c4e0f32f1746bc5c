//! The replicated document model.
//!
//! A document is a list of paragraphs; a paragraph is a run of inline items.
//! Content is addressed in *steps*, the gap positions a caret can occupy:
//!
//! ```text
//! unit kind            step units
//! ──────────────────── ──────────
//! character            1
//! space (in a run)     1 each
//! tab                  1
//! paragraph boundary   1
//! annotation marker    0
//! ```
//!
//! Paragraph `i` starts at step `Σ_{j<i} (len_j + 1)`; the `+1` is the
//! boundary unit sitting between paragraph `i`'s last content position and
//! paragraph `i+1`'s first. A document whose paragraphs hold `L` content
//! units in total over `k` paragraphs therefore has `L + k` step positions,
//! numbered `0 ..= L + k - 1`.
//!
//! Every mutator here is called from operation execution only, and shifts
//! the cursor table as part of the same mutation, so replicas that apply
//! the same operation sequence hold identical state (including cursors).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shodo_types::{Member, MemberId, MemberProperties};

use crate::cursor::{Cursor, CursorSet};
use crate::step;

/// Metadata keys owned by the session layer. `UpdateMetadata` silently
/// drops writes to these.
pub const PROTECTED_METADATA_KEYS: &[&str] = &["dc:creator", "dc:date", "meta:editing-cycles"];

// ============================================================================
// Inline items
// ============================================================================

/// One inline item inside a paragraph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr)]
pub enum Inline {
    /// A run of non-space text.
    Text(String),
    /// An explicit run of `n` spaces.
    Spaces(usize),
    /// A tab.
    Tab,
    /// Opening marker of a named annotation. Occupies no steps.
    AnnotationStart { name: String },
    /// Closing marker of a named annotation. Occupies no steps.
    AnnotationEnd { name: String },
}

impl Inline {
    /// Step units this item occupies.
    pub fn step_len(&self) -> u32 {
        match self {
            Inline::Text(s) => s.chars().count() as u32,
            Inline::Spaces(n) => *n as u32,
            Inline::Tab => 1,
            Inline::AnnotationStart { .. } | Inline::AnnotationEnd { .. } => 0,
        }
    }

    /// Whether this is a zero-step annotation marker.
    pub fn is_marker(&self) -> bool {
        matches!(
            self,
            Inline::AnnotationStart { .. } | Inline::AnnotationEnd { .. }
        )
    }

    /// Split a step-bearing item at `at` units, returning the tail.
    ///
    /// Only valid for `Text` and `Spaces` with `0 < at < step_len`.
    fn split_at(&mut self, at: u32) -> Inline {
        match self {
            Inline::Text(s) => {
                let byte = s
                    .char_indices()
                    .nth(at as usize)
                    .map(|(i, _)| i)
                    .unwrap_or(s.len());
                Inline::Text(s.split_off(byte))
            }
            Inline::Spaces(n) => {
                let tail = *n - at as usize;
                *n = at as usize;
                Inline::Spaces(tail)
            }
            _ => unreachable!("split_at on unsplittable inline"),
        }
    }
}

// ============================================================================
// Paragraphs
// ============================================================================

/// A paragraph: an optional named style plus a run of inline items.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Named paragraph style, when one is applied.
    pub style_name: Option<String>,
    /// Inline content in document order.
    pub items: Vec<Inline>,
}

impl Paragraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total step units of the paragraph's content (boundary not included).
    pub fn step_len(&self) -> u32 {
        self.items.iter().map(Inline::step_len).sum()
    }

    /// Insert items at step offset `offset`.
    ///
    /// When the offset falls on a gap shared with zero-step markers, the
    /// insertion lands *before* the markers (first reach). Every replica
    /// walks items the same way, so the choice is convergent.
    pub fn insert_items(&mut self, offset: u32, new_items: Vec<Inline>) {
        let mut cum = 0u32;
        let mut idx = 0usize;
        while idx < self.items.len() {
            if cum == offset {
                break;
            }
            let len = self.items[idx].step_len();
            if cum + len > offset {
                let tail = self.items[idx].split_at(offset - cum);
                self.items.insert(idx + 1, tail);
                idx += 1;
                break;
            }
            cum += len;
            idx += 1;
        }
        self.items.splice(idx..idx, new_items);
        self.normalize();
    }

    /// Remove `length` step units starting at step offset `offset`.
    ///
    /// Zero-step markers inside the range are preserved in place; removing
    /// annotated text does not remove the annotation itself.
    pub fn remove_range(&mut self, offset: u32, length: u32) {
        let end = offset + length;
        let mut cum = 0u32;
        let mut kept = Vec::with_capacity(self.items.len());
        for mut item in std::mem::take(&mut self.items) {
            let len = item.step_len();
            if len == 0 {
                kept.push(item);
                continue;
            }
            let (lo, hi) = (cum, cum + len);
            cum = hi;
            if hi <= offset || lo >= end {
                kept.push(item);
                continue;
            }
            // Partial overlap: keep the prefix before `offset` and the
            // suffix after `end`.
            if lo < offset {
                let tail = item.split_at(offset - lo);
                kept.push(item);
                item = tail;
            }
            if hi > end {
                let keep_from = end - lo.max(offset);
                let tail = item.split_at(keep_from.min(item.step_len()));
                kept.push(tail);
            }
        }
        self.items = kept;
        self.normalize();
    }

    /// Split the paragraph at step offset `offset`, returning the tail.
    ///
    /// The tail inherits the style. Markers sitting exactly on the split
    /// gap move to the tail (first reach, same rule as insertion).
    pub fn split_off(&mut self, offset: u32) -> Paragraph {
        let mut cum = 0u32;
        let mut idx = 0usize;
        while idx < self.items.len() {
            if cum == offset {
                break;
            }
            let len = self.items[idx].step_len();
            if cum + len > offset {
                let tail = self.items[idx].split_at(offset - cum);
                self.items.insert(idx + 1, tail);
                idx += 1;
                break;
            }
            cum += len;
            idx += 1;
        }
        let tail_items = self.items.split_off(idx);
        self.normalize();
        let mut tail = Paragraph {
            style_name: self.style_name.clone(),
            items: tail_items,
        };
        tail.normalize();
        tail
    }

    /// Append another paragraph's content (used by paragraph merge).
    pub fn append(&mut self, other: Paragraph) {
        self.items.extend(other.items);
        self.normalize();
    }

    /// Merge adjacent same-kind runs and drop empty ones. Mutators call
    /// this so equal content always has equal item structure.
    pub fn normalize(&mut self) {
        let mut out: Vec<Inline> = Vec::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            match (&item, out.last_mut()) {
                (Inline::Text(s), _) if s.is_empty() => {}
                (Inline::Spaces(0), _) => {}
                (Inline::Text(s), Some(Inline::Text(prev))) => prev.push_str(s),
                (Inline::Spaces(n), Some(Inline::Spaces(prev))) => *prev += n,
                _ => out.push(item),
            }
        }
        self.items = out;
    }

    /// The paragraph text with spaces and tabs expanded, markers dropped.
    pub fn plain_text(&self) -> String {
        let mut s = String::new();
        for item in &self.items {
            match item {
                Inline::Text(t) => s.push_str(t),
                Inline::Spaces(n) => s.extend(std::iter::repeat_n(' ', *n)),
                Inline::Tab => s.push('\t'),
                Inline::AnnotationStart { .. } | Inline::AnnotationEnd { .. } => {}
            }
        }
        s
    }
}

// ============================================================================
// Document
// ============================================================================

/// The full replicated state: content, styles, metadata, members, cursors.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentModel {
    /// Paragraph list. Never empty.
    pub paragraphs: Vec<Paragraph>,
    /// Named paragraph styles (style name to property map).
    pub styles: BTreeMap<String, serde_json::Map<String, Value>>,
    /// Document metadata.
    pub metadata: BTreeMap<String, Value>,
    /// Member registry.
    pub members: BTreeMap<MemberId, Member>,
    /// Cursor table.
    pub cursors: CursorSet,
}

impl Default for DocumentModel {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentModel {
    /// An empty document: one empty paragraph, step position 0 only.
    pub fn new() -> Self {
        Self {
            paragraphs: vec![Paragraph::new()],
            styles: BTreeMap::new(),
            metadata: BTreeMap::new(),
            members: BTreeMap::new(),
            cursors: CursorSet::new(),
        }
    }

    /// Build a document from plain paragraph texts. Test convenience;
    /// whitespace is carried as plain `Text`.
    pub fn from_paragraphs(texts: &[&str]) -> Self {
        let mut doc = Self::new();
        doc.paragraphs = texts
            .iter()
            .map(|t| {
                let mut p = Paragraph::new();
                if !t.is_empty() {
                    p.items.push(Inline::Text((*t).to_string()));
                }
                p
            })
            .collect();
        if doc.paragraphs.is_empty() {
            doc.paragraphs.push(Paragraph::new());
        }
        doc
    }

    /// Number of valid step positions.
    pub fn position_count(&self) -> u32 {
        self.paragraphs.iter().map(Paragraph::step_len).sum::<u32>()
            + self.paragraphs.len() as u32
    }

    /// Largest valid step.
    pub fn max_step(&self) -> u32 {
        self.position_count() - 1
    }

    /// Resolve a step to `(paragraph index, step offset in paragraph)`.
    ///
    /// The paragraph-boundary step after paragraph `i` resolves to
    /// `(i, len_i)`; the next step is `(i + 1, 0)`.
    pub fn locate(&self, step: u32) -> Option<(usize, u32)> {
        step::position_at_step(self, step).map(|p| (p.paragraph, p.offset))
    }

    /// Step at which paragraph `index` starts.
    pub fn paragraph_start_step(&self, index: usize) -> u32 {
        self.paragraphs[..index]
            .iter()
            .map(|p| p.step_len() + 1)
            .sum()
    }

    // ── content mutators ────────────────────────────────────────────────

    /// Insert inline items at `step`. Shifts cursors right of the gap.
    pub fn insert_items_at(&mut self, step: u32, items: Vec<Inline>) -> bool {
        let inserted: u32 = items.iter().map(Inline::step_len).sum();
        let Some((para, offset)) = self.locate(step) else {
            return false;
        };
        self.paragraphs[para].insert_items(offset, items);
        self.cursors.shift_for_insert(step, inserted);
        true
    }

    /// Remove `length` step units at `step`. The range must lie inside a
    /// single paragraph; paragraph boundaries are removed by merge only.
    pub fn remove_text(&mut self, step: u32, length: u32) -> bool {
        if length == 0 {
            return false;
        }
        let Some((para, offset)) = self.locate(step) else {
            return false;
        };
        let Some(end) = offset.checked_add(length) else {
            return false;
        };
        if end > self.paragraphs[para].step_len() {
            return false;
        }
        self.paragraphs[para].remove_range(offset, length);
        self.cursors.shift_for_remove(step, length);
        true
    }

    /// Split the paragraph containing `step` at that gap. Inserts one
    /// boundary step unit.
    pub fn split_paragraph(&mut self, step: u32, style_name: Option<&str>) -> bool {
        let Some((para, offset)) = self.locate(step) else {
            return false;
        };
        let mut tail = self.paragraphs[para].split_off(offset);
        tail.style_name = style_name.map(str::to_string);
        self.paragraphs.insert(para + 1, tail);
        self.cursors.shift_for_insert(step, 1);
        true
    }

    /// Merge the paragraph boundary at `step`. Valid only when `step` is
    /// exactly the boundary unit after a paragraph that has a successor.
    /// Removes one boundary step unit.
    pub fn merge_paragraph_at(&mut self, step: u32) -> bool {
        let Some((para, offset)) = self.locate(step) else {
            return false;
        };
        if offset != self.paragraphs[para].step_len() || para + 1 >= self.paragraphs.len() {
            return false;
        }
        let tail = self.paragraphs.remove(para + 1);
        self.paragraphs[para].append(tail);
        self.cursors.shift_for_remove(step, 1);
        true
    }

    // ── styles and metadata ─────────────────────────────────────────────

    /// Apply a named style to the paragraph containing `step`. An empty
    /// name clears the style.
    pub fn set_paragraph_style_at(&mut self, step: u32, style_name: &str) -> bool {
        let Some((para, _)) = self.locate(step) else {
            return false;
        };
        self.paragraphs[para].style_name = if style_name.is_empty() {
            None
        } else {
            Some(style_name.to_string())
        };
        true
    }

    /// Upsert a named paragraph style: set the given properties, then
    /// delete the removed keys.
    pub fn update_paragraph_style(
        &mut self,
        style_name: &str,
        set: &serde_json::Map<String, Value>,
        removed: &[String],
    ) -> bool {
        let style = self.styles.entry(style_name.to_string()).or_default();
        for (k, v) in set {
            style.insert(k.clone(), v.clone());
        }
        for k in removed {
            style.remove(k);
        }
        true
    }

    /// Update document metadata. Writes to protected keys are dropped
    /// without error.
    pub fn update_metadata(&mut self, set: &serde_json::Map<String, Value>, removed: &[String]) {
        for (k, v) in set {
            if PROTECTED_METADATA_KEYS.contains(&k.as_str()) {
                continue;
            }
            self.metadata.insert(k.clone(), v.clone());
        }
        for k in removed {
            if PROTECTED_METADATA_KEYS.contains(&k.as_str()) {
                continue;
            }
            self.metadata.remove(k);
        }
    }

    // ── annotations ─────────────────────────────────────────────────────

    /// Place annotation markers named `name` around `[start, start + length)`.
    /// Fails if the name is already in use or a position is invalid.
    pub fn add_annotation(&mut self, start: u32, length: u32, name: &str) -> bool {
        if self.annotation_extent(name).is_some() {
            return false;
        }
        let Some(end) = start.checked_add(length) else {
            return false;
        };
        if self.locate(start).is_none() || self.locate(end).is_none() {
            return false;
        }
        // End marker first: inserting it does not move `start` (markers
        // occupy no steps, the walk to `start` is unchanged).
        let Some((ep, eo)) = self.locate(end) else {
            return false;
        };
        self.paragraphs[ep].insert_items(eo, vec![Inline::AnnotationEnd { name: name.into() }]);
        let Some((sp, so)) = self.locate(start) else {
            return false;
        };
        self.paragraphs[sp].insert_items(so, vec![Inline::AnnotationStart { name: name.into() }]);
        true
    }

    /// Remove both markers of the named annotation. Fails when absent.
    pub fn remove_annotation(&mut self, name: &str) -> bool {
        let mut found = false;
        for para in &mut self.paragraphs {
            let before = para.items.len();
            para.items.retain(|item| match item {
                Inline::AnnotationStart { name: n } | Inline::AnnotationEnd { name: n } => {
                    n != name
                }
                _ => true,
            });
            if para.items.len() != before {
                found = true;
                para.normalize();
            }
        }
        found
    }

    /// Step extent `(start, end)` of a named annotation, when present.
    pub fn annotation_extent(&self, name: &str) -> Option<(u32, u32)> {
        let mut start = None;
        let mut end = None;
        let mut step = 0u32;
        for (i, para) in self.paragraphs.iter().enumerate() {
            for item in &para.items {
                match item {
                    Inline::AnnotationStart { name: n } if n == name => start = Some(step),
                    Inline::AnnotationEnd { name: n } if n == name => end = Some(step),
                    _ => {}
                }
                step += item.step_len();
            }
            if i + 1 < self.paragraphs.len() {
                step += 1; // boundary unit
            }
        }
        match (start, end) {
            (Some(s), Some(e)) => Some((s, e)),
            _ => None,
        }
    }

    // ── members and cursors ─────────────────────────────────────────────

    /// Register a member. Fails if the id is taken.
    pub fn add_member(&mut self, member: Member) -> bool {
        if self.members.contains_key(&member.id) {
            return false;
        }
        self.members.insert(member.id.clone(), member);
        true
    }

    /// Merge properties into an existing member. Fails when unknown.
    pub fn update_member(&mut self, memberid: &MemberId, props: &MemberProperties) -> bool {
        match self.members.get_mut(memberid) {
            Some(m) => {
                m.properties.merge(props);
                true
            }
            None => false,
        }
    }

    /// Remove a member and its cursor. Fails when unknown.
    pub fn remove_member(&mut self, memberid: &MemberId) -> bool {
        if self.members.remove(memberid).is_none() {
            return false;
        }
        self.cursors.remove(memberid);
        true
    }

    /// Add a cursor. The member must exist, the position must be valid,
    /// and the member must not already have a cursor.
    pub fn add_cursor(&mut self, cursor: Cursor) -> bool {
        if !self.members.contains_key(&cursor.memberid) {
            return false;
        }
        if cursor.start() > self.max_step() || cursor.end() > self.max_step() {
            return false;
        }
        self.cursors.add(cursor)
    }

    /// Remove a member's cursor.
    pub fn remove_cursor(&mut self, memberid: &MemberId) -> bool {
        self.cursors.remove(memberid)
    }

    /// Move a member's cursor. Positions are clamped to the document.
    pub fn move_cursor(
        &mut self,
        memberid: &MemberId,
        position: u32,
        length: i64,
        selection_type: crate::cursor::SelectionType,
    ) -> bool {
        let max = self.max_step();
        let Some(cursor) = self.cursors.get_mut(memberid) else {
            return false;
        };
        let anchor = position.min(max);
        let focus_raw = position as i64 + length;
        let focus = focus_raw.clamp(0, max as i64) as u32;
        cursor.anchor = anchor;
        cursor.focus = focus;
        cursor.selection_type = selection_type;
        true
    }

    // ── inspection ──────────────────────────────────────────────────────

    /// Document text, paragraphs joined with newlines.
    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// A canonical, deterministic rendering of the full state. Two
    /// replicas converged exactly when their canonical strings are equal.
    pub fn to_canonical_string(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        for para in &self.paragraphs {
            out.push_str("<p");
            if let Some(style) = &para.style_name {
                let _ = write!(out, " style=\"{}\"", style);
            }
            out.push('>');
            for item in &para.items {
                match item {
                    Inline::Text(t) => out.push_str(t),
                    Inline::Spaces(n) => {
                        let _ = write!(out, "[s:{}]", n);
                    }
                    Inline::Tab => out.push_str("[tab]"),
                    Inline::AnnotationStart { name } => {
                        let _ = write!(out, "[a+{}]", name);
                    }
                    Inline::AnnotationEnd { name } => {
                        let _ = write!(out, "[a-{}]", name);
                    }
                }
            }
            out.push_str("</p>");
        }
        // BTreeMap serialization is key-sorted, so these lines are stable.
        let _ = write!(
            out,
            "\nstyles:{}",
            serde_json::to_string(&self.styles).unwrap_or_default()
        );
        let _ = write!(
            out,
            "\nmeta:{}",
            serde_json::to_string(&self.metadata).unwrap_or_default()
        );
        let _ = write!(
            out,
            "\nmembers:{}",
            serde_json::to_string(&self.members).unwrap_or_default()
        );
        let cursors: Vec<&Cursor> = self.cursors.iter().collect();
        let _ = write!(
            out,
            "\ncursors:{}",
            serde_json::to_string(&cursors).unwrap_or_default()
        );
        out
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_has_one_position() {
        let doc = DocumentModel::new();
        assert_eq!(doc.position_count(), 1);
        assert_eq!(doc.max_step(), 0);
        assert_eq!(doc.locate(0), Some((0, 0)));
        assert_eq!(doc.locate(1), None);
    }

    #[test]
    fn test_step_accounting_across_paragraphs() {
        // "AB" | "CD": steps 0,1,2 in para 0, boundary at 2 maps to (0,2),
        // para 1 starts at 3.
        let doc = DocumentModel::from_paragraphs(&["AB", "CD"]);
        assert_eq!(doc.position_count(), 6);
        assert_eq!(doc.locate(0), Some((0, 0)));
        assert_eq!(doc.locate(2), Some((0, 2)));
        assert_eq!(doc.locate(3), Some((1, 0)));
        assert_eq!(doc.locate(5), Some((1, 2)));
        assert_eq!(doc.locate(6), None);
        assert_eq!(doc.paragraph_start_step(1), 3);
    }

    #[test]
    fn test_insert_text_mid_paragraph() {
        let mut doc = DocumentModel::from_paragraphs(&["Held"]);
        assert!(doc.insert_items_at(3, vec![Inline::Text("lo worl".into())]));
        assert_eq!(doc.plain_text(), "Hello world");
    }

    #[test]
    fn test_insert_and_remove_text() {
        let mut doc = DocumentModel::from_paragraphs(&["Hello"]);
        assert!(doc.insert_items_at(5, vec![Inline::Text("!".into())]));
        assert_eq!(doc.plain_text(), "Hello!");
        assert!(doc.remove_text(0, 2));
        assert_eq!(doc.plain_text(), "llo!");
    }

    #[test]
    fn test_remove_cannot_cross_paragraph_boundary() {
        let mut doc = DocumentModel::from_paragraphs(&["AB", "CD"]);
        assert!(!doc.remove_text(1, 3));
        assert_eq!(doc.plain_text(), "AB\nCD");
    }

    #[test]
    fn test_oversized_lengths_are_stale_not_fatal() {
        // Wire-parseable lengths can be arbitrarily large; an absurd
        // target reads as stale, it never aborts the replica.
        let mut doc = DocumentModel::from_paragraphs(&["ab"]);
        let snapshot = doc.clone();
        assert!(!doc.remove_text(1, u32::MAX));
        assert!(!doc.add_annotation(1, u32::MAX, "a_1:n1"));
        assert_eq!(doc, snapshot);
    }

    #[test]
    fn test_split_and_merge_paragraph() {
        let mut doc = DocumentModel::from_paragraphs(&["ABCD"]);
        assert!(doc.split_paragraph(2, None));
        assert_eq!(doc.plain_text(), "AB\nCD");
        assert_eq!(doc.position_count(), 6);

        // Boundary unit sits at step 2; merging there restores the text.
        assert!(doc.merge_paragraph_at(2));
        assert_eq!(doc.plain_text(), "ABCD");
        assert_eq!(doc.position_count(), 5);
    }

    #[test]
    fn test_merge_rejects_non_boundary_position() {
        let mut doc = DocumentModel::from_paragraphs(&["AB", "CD"]);
        assert!(!doc.merge_paragraph_at(1)); // mid-paragraph
        assert!(!doc.merge_paragraph_at(5)); // end of last paragraph
    }

    #[test]
    fn test_split_styles_the_new_paragraph() {
        let mut doc = DocumentModel::from_paragraphs(&["ABCD"]);
        doc.set_paragraph_style_at(0, "Heading");
        doc.split_paragraph(2, Some("Body"));
        assert_eq!(doc.paragraphs[0].style_name.as_deref(), Some("Heading"));
        assert_eq!(doc.paragraphs[1].style_name.as_deref(), Some("Body"));

        // No style given leaves the new paragraph unstyled.
        let mut doc = DocumentModel::from_paragraphs(&["ABCD"]);
        doc.set_paragraph_style_at(0, "Heading");
        doc.split_paragraph(2, None);
        assert_eq!(doc.paragraphs[1].style_name, None);
    }

    #[test]
    fn test_normalization_merges_adjacent_runs() {
        let mut a = DocumentModel::from_paragraphs(&["AC"]);
        a.insert_items_at(1, vec![Inline::Text("B".into())]);

        let b = DocumentModel::from_paragraphs(&["ABC"]);
        assert_eq!(a.to_canonical_string(), b.to_canonical_string());
    }

    #[test]
    fn test_annotation_markers_occupy_no_steps() {
        let mut doc = DocumentModel::from_paragraphs(&["Hello"]);
        let before = doc.position_count();
        assert!(doc.add_annotation(1, 3, "alice_1:n1"));
        assert_eq!(doc.position_count(), before);
        assert_eq!(doc.annotation_extent("alice_1:n1"), Some((1, 4)));
    }

    #[test]
    fn test_annotation_names_are_unique() {
        let mut doc = DocumentModel::from_paragraphs(&["Hello"]);
        assert!(doc.add_annotation(0, 2, "a_1:n1"));
        assert!(!doc.add_annotation(3, 1, "a_1:n1"));
    }

    #[test]
    fn test_remove_annotated_text_keeps_markers() {
        let mut doc = DocumentModel::from_paragraphs(&["Hello"]);
        doc.add_annotation(1, 3, "a_1:n1");
        assert!(doc.remove_text(1, 3));
        assert_eq!(doc.plain_text(), "Ho");
        // Both markers survive, collapsed to the same gap.
        assert_eq!(doc.annotation_extent("a_1:n1"), Some((1, 1)));
    }

    #[test]
    fn test_remove_annotation() {
        let mut doc = DocumentModel::from_paragraphs(&["Hello"]);
        doc.add_annotation(1, 3, "a_1:n1");
        assert!(doc.remove_annotation("a_1:n1"));
        assert!(doc.annotation_extent("a_1:n1").is_none());
        assert!(!doc.remove_annotation("a_1:n1"));
    }

    #[test]
    fn test_metadata_protected_keys_filtered() {
        let mut doc = DocumentModel::new();
        let mut set = serde_json::Map::new();
        set.insert("dc:title".into(), "Notes".into());
        set.insert("dc:creator".into(), "mallory".into());
        doc.update_metadata(&set, &[]);
        assert_eq!(doc.metadata.get("dc:title").and_then(Value::as_str), Some("Notes"));
        assert!(!doc.metadata.contains_key("dc:creator"));
    }

    #[test]
    fn test_update_paragraph_style_upserts() {
        let mut doc = DocumentModel::new();
        let mut set = serde_json::Map::new();
        set.insert("fo:font-weight".into(), "bold".into());
        assert!(doc.update_paragraph_style("Heading", &set, &[]));
        assert!(doc.update_paragraph_style("Heading", &Default::default(), &["fo:font-weight".into()]));
        assert!(doc.styles["Heading"].is_empty());
    }

    #[test]
    fn test_member_lifecycle() {
        let mut doc = DocumentModel::new();
        let id = MemberId::new("alice_1");
        assert!(doc.add_member(Member::new(id.clone(), MemberProperties::default())));
        assert!(!doc.add_member(Member::new(id.clone(), MemberProperties::default())));
        assert!(doc.add_cursor(Cursor::collapsed(id.clone(), 0)));
        assert!(doc.remove_member(&id));
        // Cursor went with the member.
        assert!(doc.cursors.get(&id).is_none());
    }

    #[test]
    fn test_cursor_requires_member_and_valid_position() {
        let mut doc = DocumentModel::new();
        let id = MemberId::new("alice_1");
        assert!(!doc.add_cursor(Cursor::collapsed(id.clone(), 0)));
        doc.add_member(Member::new(id.clone(), MemberProperties::default()));
        assert!(!doc.add_cursor(Cursor::collapsed(id.clone(), 9)));
        assert!(doc.add_cursor(Cursor::collapsed(id, 0)));
    }

    #[test]
    fn test_content_ops_shift_cursors() {
        let mut doc = DocumentModel::from_paragraphs(&["Hello"]);
        let id = MemberId::new("alice_1");
        doc.add_member(Member::new(id.clone(), MemberProperties::default()));
        doc.add_cursor(Cursor::collapsed(id.clone(), 4));

        doc.insert_items_at(1, vec![Inline::Text("xy".into())]);
        assert_eq!(doc.cursors.get(&id).unwrap().anchor, 6);

        doc.remove_text(0, 3);
        assert_eq!(doc.cursors.get(&id).unwrap().anchor, 3);
    }
}
