mod fixtures;

use crm_event_bus::EventReceiverExt;
use crm_pipeline::dom::{BoardDom, DataTransfer, DragEventKind};
use crm_pipeline::session::{GesturePhase, InertReason};
use crm_pipeline::{DropOutcome, PersistOutcome};
use fixtures::{Harness, declared, labelled};
use tokio::sync::broadcast::error::TryRecvError;

#[tokio::test]
async fn moving_a_card_persists_and_announces_once() {
    let mut h = Harness::new(&[labelled("New"), labelled("Qualified")]);
    let card = h.card(0, "42", "new");
    assert!(h.wire());

    let gesture = h.drag(card, 1).await;
    assert_eq!(gesture.start.delivered, 1);
    assert!(gesture.over.default_prevented, "a resolvable lane accepts the drag");

    assert_eq!(
        h.last_outcome(),
        Some(DropOutcome::Moved { id: "42".into(), stage: "qualified".into(), write: PersistOutcome::Written })
    );
    assert_eq!(h.stored_stage("42").as_deref(), Some("qualified"));
    assert!(h.port.record("42").and_then(|r| r.updated_at).is_some());

    assert_eq!(h.doc.closest_lane(card), Some(h.lanes[1]));
    assert_eq!(h.doc.stage_attr(card).as_deref(), Some("qualified"));
    let controller = h.board.wiring().controller().expect("wired");
    assert_eq!(controller.phase(), GesturePhase::Dropped);

    let event = EventReceiverExt::recv(&mut h.changes).await.expect("change event");
    assert_eq!(event.ids, vec!["42".to_owned()]);
    assert_eq!(event.scope.as_str(), "pipeline");
    assert!(matches!(h.changes.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn unresolved_lane_is_not_a_drop_target() {
    let mut h = Harness::new(&[labelled("New"), labelled("Backlog")]);
    let card = h.card(0, "7", "new");
    h.wire();

    let gesture = h.drag(card, 1).await;
    assert!(!gesture.over.default_prevented);
    assert_eq!(h.last_outcome(), Some(DropOutcome::Inert { reason: InertReason::UnresolvedStage }));

    assert_eq!(h.port.read_count(), 0, "persist is never attempted");
    assert_eq!(h.port.write_count(), 0);
    assert_eq!(h.doc.closest_lane(card), Some(h.lanes[0]));
    let controller = h.board.wiring().controller().expect("wired");
    assert_eq!(controller.phase(), GesturePhase::Cancelled, "an inert drop cancels the gesture");

    tokio::task::yield_now().await;
    assert!(h.board.flush().is_none());
    assert!(matches!(h.changes.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn drops_in_one_burst_share_one_event() {
    let mut h = Harness::new(&[labelled("New"), labelled("Won")]);
    let first = h.card(0, "1", "new");
    let second = h.card(0, "2", "new");
    h.wire();

    h.drag(first, 1).await;
    h.drag(second, 1).await;

    let event = EventReceiverExt::recv(&mut h.changes).await.expect("change event");
    let mut ids = event.ids.clone();
    ids.sort();
    assert_eq!(ids, vec!["1".to_owned(), "2".to_owned()]);

    tokio::task::yield_now().await;
    assert!(matches!(h.changes.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn separate_bursts_get_separate_events() {
    let mut h = Harness::new(&[labelled("New"), labelled("Won")]);
    let first = h.card(0, "1", "new");
    let second = h.card(0, "2", "new");
    h.wire();

    h.drag(first, 1).await;
    let one = EventReceiverExt::recv(&mut h.changes).await.expect("first burst");
    h.drag(second, 1).await;
    let two = EventReceiverExt::recv(&mut h.changes).await.expect("second burst");

    assert_eq!(one.ids, vec!["1".to_owned()]);
    assert_eq!(two.ids, vec!["2".to_owned()]);
}

#[tokio::test]
async fn dropping_on_the_current_stage_skips_the_write() {
    let mut h = Harness::new(&[labelled("New"), declared("Qualified")]);
    let card = h.card(0, "5", "qualified");
    h.wire();

    h.drag(card, 1).await;

    assert_eq!(
        h.last_outcome(),
        Some(DropOutcome::Moved { id: "5".into(), stage: "qualified".into(), write: PersistOutcome::Unchanged })
    );
    assert_eq!(h.port.write_count(), 0);
    assert_eq!(h.doc.closest_lane(card), Some(h.lanes[1]), "the card still lands in the lane");

    tokio::task::yield_now().await;
    assert!(matches!(h.changes.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn failed_writes_leave_the_card_in_place() {
    let mut h = Harness::new(&[labelled("New"), labelled("Lost")]);
    let card = h.card(0, "9", "new");
    h.port.fail_writes(true);
    h.wire();

    h.drag(card, 1).await;

    assert!(matches!(h.last_outcome(), Some(DropOutcome::Failed { ref id, .. }) if id == "9"));
    assert_eq!(h.stored_stage("9").as_deref(), Some("new"));
    assert_eq!(h.doc.closest_lane(card), Some(h.lanes[0]));
    assert_eq!(h.doc.stage_attr(card), None);

    tokio::task::yield_now().await;
    assert!(matches!(h.changes.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn foreign_payloads_are_rejected() {
    let h = Harness::new(&[labelled("New"), labelled("Won")]);
    h.card(0, "3", "new");
    h.wire();

    let target = h.doc.lane_list(h.lanes[1]);
    let data = DataTransfer::new();
    data.set_data("text/plain", r#"{"type":"deal","id":"3"}"#);
    let report = h.doc.dispatch(DragEventKind::Drop, target, Some(data)).await;

    assert!(report.default_prevented, "the lane itself is a valid target");
    assert_eq!(h.last_outcome(), Some(DropOutcome::Inert { reason: InertReason::InvalidPayload }));

    h.doc.dispatch(DragEventKind::Drop, target, None).await;
    assert_eq!(h.last_outcome(), Some(DropOutcome::Inert { reason: InertReason::MissingPayload }));
    assert_eq!(h.port.write_count(), 0);
}

#[tokio::test]
async fn dragstart_outside_a_card_sets_no_payload() {
    let h = Harness::new(&[labelled("New")]);
    h.wire();

    let data = DataTransfer::new();
    h.doc.dispatch(DragEventKind::DragStart, h.lanes[0], Some(data.clone())).await;

    assert_eq!(data.get_data("text/plain"), None);
    let controller = h.board.wiring().controller().expect("wired");
    assert_eq!(controller.phase(), GesturePhase::Idle);
}

#[tokio::test]
async fn a_drop_without_a_gesture_leaves_the_phase_alone() {
    let h = Harness::new(&[labelled("New"), labelled("Won")]);
    h.card(0, "5", "new");
    h.wire();

    let data = DataTransfer::new();
    data.set_data("text/plain", r#"{"type":"contact","id":"5"}"#);
    h.doc.dispatch(DragEventKind::Drop, h.doc.lane_list(h.lanes[1]), Some(data)).await;

    let controller = h.board.wiring().controller().expect("wired");
    assert!(h.last_outcome().is_some_and(|o| o.is_moved()));
    assert_eq!(controller.phase(), GesturePhase::Idle);
}

#[tokio::test]
async fn a_new_dragstart_replaces_the_stale_gesture() {
    let h = Harness::new(&[labelled("New")]);
    let first = h.card(0, "1", "new");
    let second = h.card(0, "2", "new");
    h.wire();

    let data = DataTransfer::new();
    h.doc.dispatch(DragEventKind::DragStart, first, Some(data.clone())).await;
    h.doc.dispatch(DragEventKind::DragStart, second, Some(data.clone())).await;

    let controller = h.board.wiring().controller().expect("wired");
    assert_eq!(controller.phase(), GesturePhase::Dragging { id: "2".into() });
    assert_eq!(data.get_data("text/plain").as_deref(), Some(r#"{"type":"contact","id":"2"}"#));
}

#[tokio::test]
async fn a_drop_finishing_after_teardown_still_writes() {
    let h = Harness::new(&[labelled("New"), labelled("Won")]);
    let card = h.card(0, "11", "new");
    h.wire();
    let controller = h.board.wiring().controller().expect("wired");

    h.board.dispose();
    h.doc.remove(card).expect("card removed by re-render");

    let data = DataTransfer::new();
    data.set_data("text/plain", r#"{"type":"contact","id":"11"}"#);
    let event = crm_pipeline::dom::DragEvent::new(DragEventKind::Drop, h.doc.lane_list(h.lanes[1]), Some(data));
    let outcome = controller.drop_card(&event).await;

    assert!(outcome.is_moved());
    assert_eq!(h.stored_stage("11").as_deref(), Some("won"));
    assert_eq!(h.doc.parent(card), None, "the detached card is not re-inserted");
}
