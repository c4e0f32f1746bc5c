//! Pairwise operational transformation.
//!
//! Two sites that applied concurrent operations `a` and `b` converge by
//! each applying the other's operation *transformed*: `transform(a, b)`
//! yields `(a', b')` such that `apply(apply(S, a), b')` equals
//! `apply(apply(S, b), a')` for every state `S` both operations are valid
//! in. Transformation can fragment an operation (a remove crossed by an
//! insert becomes two removes) or drop it entirely (two removes of the
//! same range cancel), so each side of the result is a list.
//!
//! Positional reasoning happens on *edit effects*: the step-range footprint
//! of an operation (`InsertText` and `SplitParagraph` insert units,
//! `RemoveText` and `MergeParagraph` remove them). Operations without a
//! footprint either carry positions that get shifted (cursors, annotations,
//! paragraph styling) or touch named resources with their own conflict
//! rules (style definitions, metadata, annotations by name).
//!
//! All tie-breaks resolve by member id string order, smaller id wins. Ids
//! are unique per member and compare identically on every site, so the
//! winner is the same everywhere.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::cursor::{shift_point_insert, shift_point_remove};
use crate::error::{OtError, Result};
use crate::ops::{split_removed, OpKind, Operation};

/// Result of transforming two concurrent operation lists against each
/// other. `local` is rewritten to apply on a site that already executed
/// `remote`'s originals, and vice versa.
#[derive(Clone, Debug, PartialEq)]
pub struct Transformed {
    pub local: Vec<Operation>,
    pub remote: Vec<Operation>,
}

/// Transform two concurrent operation lists.
pub fn transform(local: Vec<Operation>, remote: Vec<Operation>) -> Result<Transformed> {
    let (local, remote) = transform_lists(local, remote)?;
    Ok(Transformed { local, remote })
}

/// List-against-list transformation.
///
/// Splits on the head of whichever side has more than one element and
/// threads the other side through both halves. Fragmentation can grow a
/// list mid-recursion; each fragment only ever meets operations it has not
/// been transformed against yet, so the recursion bottoms out.
fn transform_lists(
    mut a: Vec<Operation>,
    mut b: Vec<Operation>,
) -> Result<(Vec<Operation>, Vec<Operation>)> {
    if a.is_empty() || b.is_empty() {
        return Ok((a, b));
    }
    if a.len() == 1 && b.len() == 1 {
        let (a0, b0) = (a.remove(0), b.remove(0));
        return transform_pair(a0, b0);
    }
    if a.len() > 1 {
        let tail = a.split_off(1);
        let (mut head, b1) = transform_lists(a, b)?;
        let (tail, b2) = transform_lists(tail, b1)?;
        head.extend(tail);
        Ok((head, b2))
    } else {
        let tail = b.split_off(1);
        let (a1, mut head) = transform_lists(a, b)?;
        let (a2, tail) = transform_lists(a1, tail)?;
        head.extend(tail);
        Ok((a2, head))
    }
}

/// Transform one operation against one concurrent operation.
pub fn transform_pair(
    a: Operation,
    b: Operation,
) -> Result<(Vec<Operation>, Vec<Operation>)> {
    // A member's own operations are totally ordered by its session, so two
    // from the same member can never be concurrent.
    if a.memberid == b.memberid {
        return Err(OtError::TransformConflict {
            a: describe(&a),
            b: describe(&b),
        });
    }
    if let Some(resolved) = transform_same_resource(&a, &b) {
        return Ok(resolved);
    }
    match (edit_effect(&a), edit_effect(&b)) {
        (Some(ea), Some(eb)) => Ok(content_vs_content(a, ea, b, eb)),
        (Some(ea), None) => {
            let b = shift_positions(b, ea);
            Ok((vec![a], vec![b]))
        }
        (None, Some(eb)) => {
            let a = shift_positions(a, eb);
            Ok((vec![a], vec![b]))
        }
        (None, None) => Ok((vec![a], vec![b])),
    }
}

fn describe(op: &Operation) -> String {
    format!("{} by {}", op.optype(), op.memberid)
}

/// `true` when `a` beats `b` in a symmetric conflict.
fn wins(a: &Operation, b: &Operation) -> bool {
    (a.memberid.as_str(), a.timestamp) < (b.memberid.as_str(), b.timestamp)
}

// ============================================================================
// Named-resource conflicts
// ============================================================================

/// Conflict rules for operations targeting the same named resource.
/// Returns `None` when the pair is not such a conflict.
fn transform_same_resource(
    a: &Operation,
    b: &Operation,
) -> Option<(Vec<Operation>, Vec<Operation>)> {
    match (&a.kind, &b.kind) {
        (
            OpKind::UpdateParagraphStyle { style_name: sa, .. },
            OpKind::UpdateParagraphStyle { style_name: sb, .. },
        ) if sa == sb => Some(resolve_property_conflict(a, b)),
        (OpKind::UpdateMetadata { .. }, OpKind::UpdateMetadata { .. }) => {
            Some(resolve_property_conflict(a, b))
        }
        (
            OpKind::RemoveAnnotation { name: na },
            OpKind::RemoveAnnotation { name: nb },
        ) if na == nb => {
            // Each already did the other's work; both transformed copies
            // vanish.
            Some((Vec::new(), Vec::new()))
        }
        (
            OpKind::SetParagraphStyle { position: pa, .. },
            OpKind::SetParagraphStyle { position: pb, .. },
        ) if pa == pb => {
            // Winner's style lands last on both sites.
            if wins(a, b) {
                Some((vec![a.clone()], Vec::new()))
            } else {
                Some((Vec::new(), vec![b.clone()]))
            }
        }
        _ => None,
    }
}

/// Two concurrent property updates of one resource: the loser forgets
/// every key the winner touches, so the winner's values land on both
/// sites. A loser left with nothing to say disappears.
fn resolve_property_conflict(
    a: &Operation,
    b: &Operation,
) -> (Vec<Operation>, Vec<Operation>) {
    let (winner, loser, a_won) = if wins(a, b) { (a, b, true) } else { (b, a, false) };

    let shadow: BTreeSet<String> = {
        let (set, removed) = property_fields(winner);
        set.keys()
            .cloned()
            .chain(split_removed(removed))
            .collect()
    };

    let mut loser = loser.clone();
    {
        let (set, removed) = property_fields_mut(&mut loser);
        set.retain(|k, _| !shadow.contains(k));
        let kept: Vec<String> = split_removed(removed)
            .into_iter()
            .filter(|k| !shadow.contains(k))
            .collect();
        *removed = if kept.is_empty() {
            None
        } else {
            Some(kept.join(","))
        };
    }
    let loser_out = {
        let (set, removed) = property_fields(&loser);
        if set.is_empty() && removed.is_none() {
            Vec::new()
        } else {
            vec![loser]
        }
    };

    if a_won {
        (vec![winner.clone()], loser_out)
    } else {
        (loser_out, vec![winner.clone()])
    }
}

fn property_fields(op: &Operation) -> (&serde_json::Map<String, Value>, &Option<String>) {
    match &op.kind {
        OpKind::UpdateParagraphStyle {
            set_properties,
            removed_properties,
            ..
        }
        | OpKind::UpdateMetadata {
            set_properties,
            removed_properties,
        } => (set_properties, removed_properties),
        _ => unreachable!("property conflict on non-property op"),
    }
}

fn property_fields_mut(
    op: &mut Operation,
) -> (&mut serde_json::Map<String, Value>, &mut Option<String>) {
    match &mut op.kind {
        OpKind::UpdateParagraphStyle {
            set_properties,
            removed_properties,
            ..
        }
        | OpKind::UpdateMetadata {
            set_properties,
            removed_properties,
        } => (set_properties, removed_properties),
        _ => unreachable!("property conflict on non-property op"),
    }
}

// ============================================================================
// Edit effects
// ============================================================================

/// Step-range footprint of a content operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EditEffect {
    Insert { position: u32, length: u32 },
    Remove { position: u32, length: u32 },
}

fn edit_effect(op: &Operation) -> Option<EditEffect> {
    match &op.kind {
        OpKind::InsertText { position, text, .. } => Some(EditEffect::Insert {
            position: *position,
            length: text.chars().count() as u32,
        }),
        OpKind::RemoveText { position, length } => Some(EditEffect::Remove {
            position: *position,
            length: *length,
        }),
        OpKind::SplitParagraph { position, .. } => Some(EditEffect::Insert {
            position: *position,
            length: 1,
        }),
        OpKind::MergeParagraph { position } => Some(EditEffect::Remove {
            position: *position,
            length: 1,
        }),
        _ => None,
    }
}

/// Rewrite an operation to carry a (possibly moved, possibly shrunk)
/// footprint.
fn with_effect(mut op: Operation, eff: EditEffect) -> Operation {
    match (&mut op.kind, eff) {
        (OpKind::InsertText { position, .. }, EditEffect::Insert { position: p, .. }) => {
            *position = p;
        }
        (OpKind::SplitParagraph { position, .. }, EditEffect::Insert { position: p, .. }) => {
            *position = p;
        }
        (
            OpKind::RemoveText { position, length },
            EditEffect::Remove {
                position: p,
                length: l,
            },
        ) => {
            *position = p;
            *length = l;
        }
        (OpKind::MergeParagraph { position }, EditEffect::Remove { position: p, .. }) => {
            *position = p;
        }
        _ => unreachable!("effect kind mismatch"),
    }
    op
}

fn content_vs_content(
    a: Operation,
    ea: EditEffect,
    b: Operation,
    eb: EditEffect,
) -> (Vec<Operation>, Vec<Operation>) {
    use EditEffect::*;
    match (ea, eb) {
        (Insert { position: pa, length: la }, Insert { position: pb, length: lb }) => {
            // Strictly ordered inserts shift the later one; inserts at the
            // same gap order by member id, winner's content ends up first.
            let a_first = pa < pb || (pa == pb && wins(&a, &b));
            if a_first {
                let eb = Insert {
                    position: pb.saturating_add(la),
                    length: lb,
                };
                (vec![a], vec![with_effect(b, eb)])
            } else {
                let ea = Insert {
                    position: pa.saturating_add(lb),
                    length: la,
                };
                (vec![with_effect(a, ea)], vec![b])
            }
        }
        (Insert { .. }, Remove { .. }) => {
            let (ins, rms) = insert_vs_remove(a, ea, b, eb);
            (ins, rms)
        }
        (Remove { .. }, Insert { .. }) => {
            let (ins, rms) = insert_vs_remove(b, eb, a, ea);
            (rms, ins)
        }
        (Remove { position: pa, length: la }, Remove { position: pb, length: lb }) => {
            let a_out = surviving_remove(a, pa, la, pb, lb);
            let b_out = surviving_remove(b, pb, lb, pa, la);
            (a_out, b_out)
        }
    }
}

/// Insert against remove. Returns `(insert side, remove side)`.
fn insert_vs_remove(
    ins: Operation,
    ins_eff: EditEffect,
    rm: Operation,
    rm_eff: EditEffect,
) -> (Vec<Operation>, Vec<Operation>) {
    let EditEffect::Insert {
        position: ip,
        length: n,
    } = ins_eff
    else {
        unreachable!()
    };
    let EditEffect::Remove {
        position: rs,
        length: rl,
    } = rm_eff
    else {
        unreachable!()
    };
    let re = rs.saturating_add(rl);

    if ip <= rs {
        // Insert before (or at the head of) the removed range.
        let rm_eff = EditEffect::Remove {
            position: rs.saturating_add(n),
            length: rl,
        };
        (vec![ins], vec![with_effect(rm, rm_eff)])
    } else if ip >= re {
        // Insert past the removed range.
        let ins_eff = EditEffect::Insert {
            position: ip - rl,
            length: n,
        };
        (vec![with_effect(ins, ins_eff)], vec![rm])
    } else {
        // Insert lands inside the removed range: the insert collapses to
        // the range start, the remove fragments around the inserted
        // content. High fragment first so the low fragment's position is
        // still valid when it runs.
        let ins_eff = EditEffect::Insert {
            position: rs,
            length: n,
        };
        let high = EditEffect::Remove {
            position: ip.saturating_add(n),
            length: re - ip,
        };
        let low = EditEffect::Remove {
            position: rs,
            length: ip - rs,
        };
        (
            vec![with_effect(ins, ins_eff)],
            vec![with_effect(rm.clone(), high), with_effect(rm, low)],
        )
    }
}

/// What is left of remove `[s, s+l)` after concurrent remove `[os, os+ol)`
/// already ran. The survivor is contiguous; a fully shadowed remove drops.
fn surviving_remove(
    op: Operation,
    s: u32,
    l: u32,
    os: u32,
    ol: u32,
) -> Vec<Operation> {
    let e = s.saturating_add(l);
    let oe = os.saturating_add(ol);
    let overlap = e.min(oe).saturating_sub(s.max(os));
    let length = l - overlap;
    if length == 0 {
        return Vec::new();
    }
    // Units the other remove took out before our start.
    let preceding = if s <= os { 0 } else { s.min(oe) - os };
    vec![with_effect(
        op,
        EditEffect::Remove {
            position: s - preceding,
            length,
        },
    )]
}

// ============================================================================
// Position shifting for footprint-free operations
// ============================================================================

/// Shift the step positions an operation carries past a concurrent edit.
fn shift_positions(mut op: Operation, eff: EditEffect) -> Operation {
    let shift = |p: u32| match eff {
        EditEffect::Insert { position, length } => shift_point_insert(p, position, length),
        EditEffect::Remove { position, length } => shift_point_remove(p, position, length),
    };
    match &mut op.kind {
        OpKind::MoveCursor {
            position, length, ..
        } => {
            let anchor = shift(*position);
            let focus_raw = (*position as i64 + *length).clamp(0, u32::MAX as i64) as u32;
            let focus = shift(focus_raw);
            *position = anchor;
            *length = focus as i64 - anchor as i64;
        }
        OpKind::SetParagraphStyle { position, .. } => {
            *position = shift(*position);
        }
        OpKind::AddAnnotation {
            position, length, ..
        } => {
            let start = shift(*position);
            let end_raw = (*position).saturating_add((*length).clamp(0, u32::MAX as i64) as u32);
            let end = shift(end_raw);
            *position = start;
            *length = (end - start) as i64;
        }
        // No step positions to adjust.
        OpKind::AddMember { .. }
        | OpKind::UpdateMember { .. }
        | OpKind::RemoveMember {}
        | OpKind::AddCursor {}
        | OpKind::RemoveCursor {}
        | OpKind::UpdateParagraphStyle { .. }
        | OpKind::UpdateMetadata { .. }
        | OpKind::RemoveAnnotation { .. } => {}
        // Footprint ops never reach here.
        OpKind::InsertText { .. }
        | OpKind::RemoveText { .. }
        | OpKind::SplitParagraph { .. }
        | OpKind::MergeParagraph { .. } => unreachable!("footprint op in shift_positions"),
    }
    op
}

// ============================================================================
// Tests
// ============================================================================
