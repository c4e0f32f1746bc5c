//! The typed operation set.
//!
//! Every mutation of a [`DocumentModel`] is an [`Operation`]: a member id,
//! a timestamp, and one of the [`OpKind`] variants. Opspecs travel as JSON
//! with an `optype` tag and camelCase field names; [`OpKind`] is the typed
//! form, so an unknown or malformed opspec fails at the deserialization
//! boundary instead of deep inside execution.
//!
//! `execute` returns `bool`, not `Result`: a `false` means the operation's
//! target no longer exists (stale by the time it arrived) and the caller
//! skips it. Sequenced peers applying the same log get the same sequence
//! of `false`s, so skipping is convergent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shodo_types::{wire::de, Member, MemberId, MemberProperties};

use crate::cursor::{Cursor, SelectionType};
use crate::document::{DocumentModel, Inline};

/// One document operation: author, wall-clock stamp, payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Authoring member.
    pub memberid: MemberId,
    /// Author wall-clock time in ms. Used only as a tie-break component;
    /// never trusted for ordering.
    #[serde(default, deserialize_with = "de::timestamp")]
    pub timestamp: u64,
    /// The operation payload, tagged with `optype` on the wire.
    #[serde(flatten)]
    pub kind: OpKind,
}

/// Operation payloads. The serde tag is the wire `optype`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, strum::AsRefStr)]
#[serde(tag = "optype")]
pub enum OpKind {
    /// Register a member in the document.
    AddMember {
        #[serde(rename = "setProperties", default)]
        set_properties: MemberProperties,
    },
    /// Merge display properties into an existing member.
    UpdateMember {
        #[serde(rename = "setProperties", default)]
        set_properties: MemberProperties,
    },
    /// Remove a member (and its cursor, if any).
    RemoveMember {},
    /// Add the author's cursor, collapsed at step 0.
    AddCursor {},
    /// Remove the author's cursor.
    RemoveCursor {},
    /// Move the author's cursor / selection.
    MoveCursor {
        #[serde(deserialize_with = "de::step")]
        position: u32,
        /// Selection extent from `position`; negative selects backwards.
        #[serde(default, deserialize_with = "de::length")]
        length: i64,
        #[serde(rename = "selectionType", default)]
        selection_type: SelectionType,
    },
    /// Insert text at a step position.
    InsertText {
        #[serde(deserialize_with = "de::step")]
        position: u32,
        text: String,
        /// Collapse the author's cursor after the inserted run.
        #[serde(rename = "moveCursor", default)]
        move_cursor: bool,
    },
    /// Remove a run of step units inside one paragraph.
    RemoveText {
        #[serde(deserialize_with = "de::step")]
        position: u32,
        #[serde(deserialize_with = "de::step")]
        length: u32,
    },
    /// Split the paragraph at a step position.
    SplitParagraph {
        #[serde(deserialize_with = "de::step")]
        position: u32,
        /// Style for the new (second) paragraph; none clears it.
        #[serde(rename = "styleName", default, skip_serializing_if = "Option::is_none")]
        style_name: Option<String>,
        /// Collapse the author's cursor at the start of the new paragraph.
        #[serde(rename = "moveCursor", default)]
        move_cursor: bool,
    },
    /// Remove the paragraph boundary at a step position. `position` is the
    /// boundary unit at the end of the first of the two paragraphs.
    MergeParagraph {
        #[serde(deserialize_with = "de::step")]
        position: u32,
    },
    /// Apply a named style to the paragraph containing a step position.
    SetParagraphStyle {
        #[serde(deserialize_with = "de::step")]
        position: u32,
        #[serde(rename = "styleName")]
        style_name: String,
    },
    /// Upsert a named paragraph style definition.
    UpdateParagraphStyle {
        #[serde(rename = "styleName")]
        style_name: String,
        #[serde(rename = "setProperties", default)]
        set_properties: serde_json::Map<String, Value>,
        /// Comma-separated keys to delete.
        #[serde(rename = "removedProperties", default)]
        removed_properties: Option<String>,
    },
    /// Update document metadata.
    UpdateMetadata {
        #[serde(rename = "setProperties", default)]
        set_properties: serde_json::Map<String, Value>,
        #[serde(rename = "removedProperties", default)]
        removed_properties: Option<String>,
    },
    /// Place annotation markers around a step range.
    AddAnnotation {
        #[serde(deserialize_with = "de::step")]
        position: u32,
        #[serde(default, deserialize_with = "de::length")]
        length: i64,
        name: String,
    },
    /// Remove a named annotation's markers.
    RemoveAnnotation { name: String },
}

impl Operation {
    pub fn new(memberid: MemberId, timestamp: u64, kind: OpKind) -> Self {
        Self {
            memberid,
            timestamp,
            kind,
        }
    }

    /// Wire name of the payload (`"InsertText"` etc). The strum-derived
    /// variant name matches the serde tag.
    pub fn optype(&self) -> &str {
        self.kind.as_ref()
    }

    /// The JSON opspec for this operation.
    pub fn spec(&self) -> Value {
        // Serialization of a fully typed value cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Apply the operation to a document.
    ///
    /// Returns `false` when the target is gone (stale operation): unknown
    /// member, vanished position, missing annotation. The document is left
    /// untouched in that case.
    pub fn execute(&self, doc: &mut DocumentModel) -> bool {
        match &self.kind {
            OpKind::AddMember { set_properties } => {
                doc.add_member(Member::new(self.memberid.clone(), set_properties.clone()))
            }
            OpKind::UpdateMember { set_properties } => {
                doc.update_member(&self.memberid, set_properties)
            }
            OpKind::RemoveMember {} => doc.remove_member(&self.memberid),
            OpKind::AddCursor {} => doc.add_cursor(Cursor::collapsed(self.memberid.clone(), 0)),
            OpKind::RemoveCursor {} => doc.remove_cursor(&self.memberid),
            OpKind::MoveCursor {
                position,
                length,
                selection_type,
            } => doc.move_cursor(&self.memberid, *position, *length, *selection_type),
            OpKind::InsertText {
                position,
                text,
                move_cursor,
            } => {
                if text.is_empty() {
                    return false;
                }
                let items = materialize_text(text);
                let inserted: u32 = items.iter().map(Inline::step_len).sum();
                if !doc.insert_items_at(*position, items) {
                    return false;
                }
                if *move_cursor {
                    doc.move_cursor(&self.memberid, position + inserted, 0, SelectionType::Range);
                }
                true
            }
            OpKind::RemoveText { position, length } => doc.remove_text(*position, *length),
            OpKind::SplitParagraph {
                position,
                style_name,
                move_cursor,
            } => {
                if !doc.split_paragraph(*position, style_name.as_deref()) {
                    return false;
                }
                if *move_cursor {
                    doc.move_cursor(&self.memberid, position + 1, 0, SelectionType::Range);
                }
                true
            }
            OpKind::MergeParagraph { position } => doc.merge_paragraph_at(*position),
            OpKind::SetParagraphStyle {
                position,
                style_name,
            } => doc.set_paragraph_style_at(*position, style_name),
            OpKind::UpdateParagraphStyle {
                style_name,
                set_properties,
                removed_properties,
            } => doc.update_paragraph_style(
                style_name,
                set_properties,
                &split_removed(removed_properties),
            ),
            OpKind::UpdateMetadata {
                set_properties,
                removed_properties,
            } => {
                doc.update_metadata(set_properties, &split_removed(removed_properties));
                true
            }
            OpKind::AddAnnotation {
                position,
                length,
                name,
            } => doc.add_annotation(*position, (*length).max(0) as u32, name),
            OpKind::RemoveAnnotation { name } => doc.remove_annotation(name),
        }
    }
}

/// Split a comma-separated removed-keys field into owned keys.
pub(crate) fn split_removed(removed: &Option<String>) -> Vec<String> {
    removed
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Turn inserted text into inline items, materializing whitespace.
///
/// Tabs always become [`Inline::Tab`]. A run of two or more spaces becomes
/// a [`Inline::Spaces`] carrier, as does a single space at the very start
/// or end of the insertion (it may end up adjacent to other whitespace
/// already in the document). An isolated single space between words stays
/// inside the text run.
pub fn materialize_text(text: &str) -> Vec<Inline> {
    #[derive(PartialEq)]
    enum Seg {
        Word(String),
        Spaces(usize),
        Tab,
    }

    let mut segs: Vec<Seg> = Vec::new();
    for ch in text.chars() {
        match ch {
            '\t' => segs.push(Seg::Tab),
            ' ' => match segs.last_mut() {
                Some(Seg::Spaces(n)) => *n += 1,
                _ => segs.push(Seg::Spaces(1)),
            },
            _ => match segs.last_mut() {
                Some(Seg::Word(w)) => w.push(ch),
                _ => segs.push(Seg::Word(ch.to_string())),
            },
        }
    }

    let last = segs.len().saturating_sub(1);
    let mut out: Vec<Inline> = Vec::new();
    for (i, seg) in segs.into_iter().enumerate() {
        match seg {
            Seg::Tab => out.push(Inline::Tab),
            Seg::Spaces(n) if n >= 2 || i == 0 || i == last => out.push(Inline::Spaces(n)),
            Seg::Spaces(_) => match out.last_mut() {
                // Interior single space joins the surrounding text flow.
                Some(Inline::Text(t)) => t.push(' '),
                _ => out.push(Inline::Text(" ".into())),
            },
            Seg::Word(w) => match out.last_mut() {
                Some(Inline::Text(t)) => t.push_str(&w),
                _ => out.push(Inline::Text(w)),
            },
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
