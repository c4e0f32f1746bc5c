//! End-to-end convergence: multiple sessions on one in-process arbiter.

use shodo_ot::ops::OpKind;
use shodo_session::{EditingSession, LocalClient, LocalHub, SessionContext, SessionEvent};
use shodo_types::{DocumentId, MemberId, MemberProperties};

type Session = EditingSession<LocalClient>;

fn join(hub: &LocalHub, document_id: DocumentId, name: &str) -> Session {
    let ctx = SessionContext::new(document_id, MemberId::new(name));
    let mut session = EditingSession::new(ctx, hub.connect());
    session.request_replay().unwrap();
    session
        .enqueue_local(vec![
            OpKind::AddMember {
                set_properties: MemberProperties {
                    full_name: name.to_string(),
                    color: "#336699".into(),
                    image_url: None,
                },
            },
            OpKind::AddCursor {},
        ])
        .unwrap();
    session
}

/// Pump every session until the whole hub is quiescent.
fn pump_all(sessions: &mut [&mut Session]) {
    loop {
        let mut moved = 0;
        for s in sessions.iter_mut() {
            moved += s.pump().unwrap();
        }
        if moved == 0 {
            break;
        }
    }
}

fn assert_converged(sessions: &[&Session]) {
    let reference = sessions[0].document().to_canonical_string();
    for s in &sessions[1..] {
        assert_eq!(
            s.document().to_canonical_string(),
            reference,
            "session {} diverged",
            s.memberid()
        );
        assert_eq!(s.pending_len(), 0, "session {} has unacked ops", s.memberid());
    }
}

fn insert(position: u32, text: &str) -> OpKind {
    OpKind::InsertText {
        position,
        text: text.into(),
        move_cursor: false,
    }
}

#[test]
fn test_concurrent_inserts_at_same_position() {
    let hub = LocalHub::new();
    let doc_id = DocumentId::new();
    let mut a = join(&hub, doc_id, "alice_1");
    let mut b = join(&hub, doc_id, "bob_1");
    pump_all(&mut [&mut a, &mut b]);

    a.enqueue_local(vec![insert(0, "hello")]).unwrap();
    b.enqueue_local(vec![insert(0, "world")]).unwrap();
    pump_all(&mut [&mut a, &mut b]);

    assert_converged(&[&a, &b]);
    // alice_1 < bob_1, so her text sits first.
    assert_eq!(a.document().plain_text(), "helloworld");
}

#[test]
fn test_insert_inside_concurrent_remove_fragments() {
    let hub = LocalHub::new();
    let doc_id = DocumentId::new();
    let mut a = join(&hub, doc_id, "alice_1");
    let mut b = join(&hub, doc_id, "bob_1");
    pump_all(&mut [&mut a, &mut b]);

    a.enqueue_local(vec![insert(0, "abcdef")]).unwrap();
    pump_all(&mut [&mut a, &mut b]);

    a.enqueue_local(vec![insert(3, "XY")]).unwrap();
    b.enqueue_local(vec![OpKind::RemoveText {
        position: 1,
        length: 4,
    }])
    .unwrap();
    pump_all(&mut [&mut a, &mut b]);

    assert_converged(&[&a, &b]);
    assert_eq!(a.document().plain_text(), "aXYf");
}

#[test]
fn test_chained_unacked_ops_converge() {
    let hub = LocalHub::new();
    let doc_id = DocumentId::new();
    let mut a = join(&hub, doc_id, "alice_1");
    let mut b = join(&hub, doc_id, "bob_1");
    pump_all(&mut [&mut a, &mut b]);

    a.enqueue_local(vec![insert(0, "abcdef")]).unwrap();
    pump_all(&mut [&mut a, &mut b]);

    // bob's insert reaches the arbiter first; alice sends two causally
    // chained ops without waiting for acknowledgments, the second one
    // expressed in coordinates that already include the first.
    b.enqueue_local(vec![insert(1, "Z")]).unwrap();
    a.enqueue_local(vec![
        OpKind::RemoveText {
            position: 0,
            length: 2,
        },
        insert(1, "X"),
    ])
    .unwrap();
    pump_all(&mut [&mut a, &mut b]);

    assert_converged(&[&a, &b]);
    assert_eq!(a.document().plain_text(), "ZcXdef");
}

#[test]
fn test_split_vs_concurrent_insert() {
    let hub = LocalHub::new();
    let doc_id = DocumentId::new();
    let mut a = join(&hub, doc_id, "alice_1");
    let mut b = join(&hub, doc_id, "bob_1");
    pump_all(&mut [&mut a, &mut b]);

    a.enqueue_local(vec![insert(0, "abcd")]).unwrap();
    pump_all(&mut [&mut a, &mut b]);

    a.enqueue_local(vec![OpKind::SplitParagraph {
        position: 2,
        style_name: None,
        move_cursor: false,
    }])
    .unwrap();
    b.enqueue_local(vec![insert(3, "Z")]).unwrap();
    pump_all(&mut [&mut a, &mut b]);

    assert_converged(&[&a, &b]);
    assert_eq!(a.document().plain_text(), "ab\ncZd");
}

#[test]
fn test_identical_concurrent_removes_cancel() {
    let hub = LocalHub::new();
    let doc_id = DocumentId::new();
    let mut a = join(&hub, doc_id, "alice_1");
    let mut b = join(&hub, doc_id, "bob_1");
    pump_all(&mut [&mut a, &mut b]);

    a.enqueue_local(vec![insert(0, "abcdef")]).unwrap();
    pump_all(&mut [&mut a, &mut b]);

    a.enqueue_local(vec![OpKind::RemoveText {
        position: 2,
        length: 3,
    }])
    .unwrap();
    b.enqueue_local(vec![OpKind::RemoveText {
        position: 2,
        length: 3,
    }])
    .unwrap();
    pump_all(&mut [&mut a, &mut b]);

    assert_converged(&[&a, &b]);
    assert_eq!(a.document().plain_text(), "abf");
}

#[test]
fn test_annotation_name_collision_is_skipped_not_fatal() {
    let hub = LocalHub::new();
    let doc_id = DocumentId::new();
    let mut a = join(&hub, doc_id, "alice_1");
    let mut b = join(&hub, doc_id, "bob_1");
    pump_all(&mut [&mut a, &mut b]);

    a.enqueue_local(vec![insert(0, "review this")]).unwrap();
    pump_all(&mut [&mut a, &mut b]);

    let mut events_a = a.subscribe();

    let annotate = || OpKind::AddAnnotation {
        position: 0,
        length: 6,
        name: "note:1".into(),
    };
    a.enqueue_local(vec![annotate()]).unwrap();
    b.enqueue_local(vec![annotate()]).unwrap();
    pump_all(&mut [&mut a, &mut b]);

    assert_converged(&[&a, &b]);
    assert!(!a.is_desynced());
    assert!(!b.is_desynced());
    assert_eq!(a.document().annotation_extent("note:1"), Some((0, 6)));

    let mut skipped = false;
    while let Ok(event) = events_a.try_recv() {
        if matches!(event, SessionEvent::OperationSkipped { .. }) {
            skipped = true;
        }
    }
    assert!(skipped, "the colliding annotation should be skipped");
}

#[test]
fn test_late_joiner_replays_to_identical_state() {
    let hub = LocalHub::new();
    let doc_id = DocumentId::new();
    let mut a = join(&hub, doc_id, "alice_1");
    let mut b = join(&hub, doc_id, "bob_1");
    pump_all(&mut [&mut a, &mut b]);

    a.enqueue_local(vec![insert(0, "shared history")]).unwrap();
    b.enqueue_local(vec![OpKind::SetParagraphStyle {
        position: 0,
        style_name: "Body".into(),
    }])
    .unwrap();
    pump_all(&mut [&mut a, &mut b]);

    let mut c = join(&hub, doc_id, "carol_1");
    pump_all(&mut [&mut a, &mut b, &mut c]);

    assert_converged(&[&a, &b, &c]);
    assert_eq!(c.document().plain_text(), "shared history");
    assert_eq!(c.document().members.len(), 3);
}

#[test]
fn test_rejoin_with_same_memberid_rebuilds_own_history() {
    let hub = LocalHub::new();
    let doc_id = DocumentId::new();
    let mut a = join(&hub, doc_id, "alice_1");
    let mut b = join(&hub, doc_id, "bob_1");
    pump_all(&mut [&mut a, &mut b]);

    a.enqueue_local(vec![insert(0, "hello")]).unwrap();
    pump_all(&mut [&mut a, &mut b]);
    drop(a);

    // The fresh session never issued the nonces in the log, so even its
    // own past operations replay as ordinary history.
    let ctx = SessionContext::new(doc_id, MemberId::new("alice_1"));
    let mut a2 = EditingSession::new(ctx, hub.connect());
    a2.request_replay().unwrap();
    assert_eq!(a2.document().plain_text(), "hello");
    assert_eq!(a2.document().members.len(), 2);

    pump_all(&mut [&mut a2, &mut b]);
    assert_converged(&[&a2, &b]);
}

#[test]
fn test_member_events_are_emitted() {
    let hub = LocalHub::new();
    let doc_id = DocumentId::new();
    let mut a = join(&hub, doc_id, "alice_1");
    pump_all(&mut [&mut a]);

    let mut events = a.subscribe();
    let mut b = join(&hub, doc_id, "bob_1");
    pump_all(&mut [&mut a, &mut b]);

    let mut joined = false;
    while let Ok(event) = events.try_recv() {
        if event == SessionEvent::MemberJoined(MemberId::new("bob_1")) {
            joined = true;
        }
    }
    assert!(joined);
}

#[test]
fn test_three_way_concurrent_editing() {
    let hub = LocalHub::new();
    let doc_id = DocumentId::new();
    let mut a = join(&hub, doc_id, "alice_1");
    let mut b = join(&hub, doc_id, "bob_1");
    let mut c = join(&hub, doc_id, "carol_1");
    pump_all(&mut [&mut a, &mut b, &mut c]);

    a.enqueue_local(vec![insert(0, "the quick brown fox")])
        .unwrap();
    pump_all(&mut [&mut a, &mut b, &mut c]);

    // Three concurrent edits on the same sentence.
    a.enqueue_local(vec![OpKind::RemoveText {
        position: 4,
        length: 6,
    }])
    .unwrap(); // drop "quick "
    b.enqueue_local(vec![insert(10, "lazy ")]).unwrap(); // before "brown"
    c.enqueue_local(vec![insert(19, "!")]).unwrap(); // at the end
    pump_all(&mut [&mut a, &mut b, &mut c]);

    assert_converged(&[&a, &b, &c]);
    assert_eq!(a.document().plain_text(), "the lazy brown fox!");
}
