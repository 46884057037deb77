mod fixtures;

use crm_domain::board::{DetachReason, RootState, WiringMetrics};
use crm_pipeline::dom::{BoardDom, DragEventKind, MemoryDocument};
use fixtures::{Harness, declared, labelled, mount};
use std::sync::Arc;

fn assert_balanced(metrics: &WiringMetrics, doc: &MemoryDocument) {
    assert_eq!(metrics.attach - metrics.detach, metrics.active);
    assert_eq!(metrics.active, doc.total_listeners() as u64);
}

#[test]
fn install_binds_three_listeners_once() {
    let h = Harness::new(&[labelled("New")]);

    assert!(h.board.wiring().install(h.root));
    assert!(h.board.wiring().install(h.root));

    let metrics = h.board.metrics();
    assert_eq!((metrics.attach, metrics.detach, metrics.active), (3, 0, 3));
    assert_eq!(metrics.root, RootState::Connected);
    assert_eq!(h.doc.listener_count(h.root), 3);
    assert_balanced(&metrics, &h.doc);

    let events: Vec<_> = h.board.wiring().bindings().iter().map(|b| b.event).collect();
    assert_eq!(events, DragEventKind::ALL.to_vec());
    assert!(h.board.wiring().monitor().is_watching());
}

#[test]
fn moving_to_another_root_tears_the_first_down() {
    let h = Harness::new(&[labelled("New")]);
    let (other, _) = mount(&h.doc, &[labelled("Won")]);

    h.board.wiring().install(h.root);
    let first = h.board.wiring().controller().unwrap();
    assert!(h.board.wiring().install(other));

    let metrics = h.board.metrics();
    assert_eq!((metrics.attach, metrics.detach, metrics.active), (6, 3, 3));
    assert_eq!(metrics.last_detach_reason, Some(DetachReason::RootChanged));
    assert_eq!(h.doc.listener_count(h.root), 0);
    assert_eq!(h.doc.listener_count(other), 3);
    assert_eq!(h.board.wiring().root(), Some(other));
    assert_eq!(h.board.wiring().monitor().root(), Some(other));
    assert!(!Arc::ptr_eq(&first, &h.board.wiring().controller().unwrap()));
    assert_balanced(&metrics, &h.doc);
}

#[test]
fn teardown_without_wiring_is_a_no_op() {
    let h = Harness::new(&[labelled("New")]);

    assert!(!h.board.dispose());
    assert_eq!(h.board.metrics().detach, 0);
    assert_eq!(h.board.metrics().last_detach_reason, None);
}

#[test]
fn dispose_and_navigation_unwire() {
    let h = Harness::new(&[labelled("New")]);

    h.wire();
    assert!(!h.board.navigate("pipeline"), "staying on the board keeps it wired");
    assert!(!h.board.navigate(" Pipeline "), "view names are case-insensitive");
    assert!(!h.board.navigate(""), "an empty view is ignored");
    assert_eq!(h.board.metrics().active, 3);

    assert!(h.board.navigate("contacts"));
    let metrics = h.board.metrics();
    assert_eq!(metrics.active, 0);
    assert_eq!(metrics.root, RootState::None);
    assert_eq!(metrics.last_detach_reason, Some(DetachReason::Navigate));
    assert!(!h.board.wiring().monitor().is_watching());

    h.wire();
    assert!(h.board.dispose());
    let metrics = h.board.metrics();
    assert_eq!((metrics.attach, metrics.detach), (6, 6));
    assert_eq!(metrics.last_detach_reason, Some(DetachReason::Disposed));
    assert_balanced(&metrics, &h.doc);
}

#[test]
fn removing_the_root_unwires_the_board() {
    let h = Harness::new(&[labelled("New"), labelled("Qualified")]);
    h.wire();

    h.doc.remove(h.root).unwrap();
    h.doc.touch(h.doc.document());

    let metrics = h.board.metrics();
    assert_eq!(metrics.active, 0);
    assert_eq!(metrics.root, RootState::Detached);
    assert_eq!(metrics.last_detach_reason, Some(DetachReason::Disconnect));
    assert_eq!(h.doc.observer_count(), 0);
    assert_eq!(h.board.wiring().root(), None);
    assert_balanced(&metrics, &h.doc);
}

#[test]
fn rendering_a_fresh_root_replaces_a_detached_one() {
    let h = Harness::new(&[labelled("New")]);
    h.doc.disable_observers();
    h.wire();

    h.doc.remove(h.root).unwrap();
    assert_eq!(h.board.metrics().active, 3, "nothing noticed without an observer");

    let (fresh, _) = mount(&h.doc, &[labelled("New")]);
    assert!(h.board.wire(Some(fresh)));

    let metrics = h.board.metrics();
    assert_eq!(metrics.last_detach_reason, Some(DetachReason::Disconnect));
    assert_eq!((metrics.attach, metrics.detach, metrics.active), (6, 3, 3));
    assert_eq!(h.board.wiring().root(), Some(fresh));
}

#[test]
fn a_root_outside_the_document_is_not_wired() {
    let h = Harness::new(&[labelled("New")]);
    h.doc.remove(h.root).unwrap();

    assert!(!h.wire());
    let metrics = h.board.metrics();
    assert_eq!((metrics.attach, metrics.active), (0, 0));
    assert_eq!(metrics.root, RootState::Detached);
    assert_eq!(h.doc.total_listeners(), 0);
    assert!(!h.board.wiring().monitor().is_watching());
    assert!(h.board.wiring().controller().is_none());
}

#[test]
fn installing_a_detached_root_drops_the_current_wiring() {
    let h = Harness::new(&[labelled("New")]);
    let (other, _) = mount(&h.doc, &[labelled("Won")]);
    h.doc.remove(other).unwrap();
    h.wire();

    assert!(!h.board.wiring().install(other));
    let metrics = h.board.metrics();
    assert_eq!((metrics.attach, metrics.detach, metrics.active), (3, 3, 0));
    assert_eq!(metrics.root, RootState::Detached);
    assert_eq!(metrics.last_detach_reason, Some(DetachReason::RootChanged));
    assert_eq!(h.doc.listener_count(other), 0);
    assert_balanced(&metrics, &h.doc);
}

#[test]
fn rendering_without_a_root_clears_the_board() {
    let h = Harness::new(&[labelled("New")]);
    h.wire();

    assert!(!h.board.wire(None));
    let metrics = h.board.metrics();
    assert_eq!(metrics.active, 0);
    assert_eq!(metrics.columns, 0);
    assert_eq!(metrics.last_detach_reason, Some(DetachReason::NoRoot));
}

#[test]
fn wire_prepares_lanes_and_cards() {
    let h = Harness::new(&[labelled("Pre-Approved"), declared("won"), labelled("Backlog"), labelled("CTC")]);
    let card = h.card(0, "1", "qualified");

    assert!(h.wire());

    assert_eq!(h.board.metrics().columns, 3);
    assert_eq!(h.doc.stage_attr(h.lanes[0]).as_deref(), Some("qualified"));
    assert_eq!(h.doc.stage_attr(h.lanes[1]).as_deref(), Some("won"));
    assert_eq!(h.doc.stage_attr(h.lanes[2]), None);
    assert_eq!(h.doc.stage_attr(h.lanes[3]).as_deref(), Some("clear_to_close"));
    assert!(h.doc.is_draggable(card));
}

#[test]
fn missing_listener_api_degrades_quietly() {
    let h = Harness::new(&[labelled("New")]);
    h.doc.disable_listeners();

    assert!(!h.wire());
    let metrics = h.board.metrics();
    assert_eq!((metrics.attach, metrics.active), (0, 0));
    assert_eq!(h.doc.total_listeners(), 0);
    assert!(h.board.wiring().controller().is_none());
}

#[test]
fn missing_observer_api_still_wires() {
    let h = Harness::new(&[labelled("New")]);
    h.doc.disable_observers();

    assert!(h.wire());
    assert_eq!(h.board.metrics().active, 3);
    assert!(!h.board.wiring().monitor().is_watching());
}

#[test]
fn metrics_are_published_on_every_change() {
    let h = Harness::new(&[labelled("New"), labelled("Won")]);
    let mut metrics = h.board.subscribe_metrics();
    assert_eq!(*metrics.borrow_and_update(), WiringMetrics::default());

    h.wire();
    assert!(metrics.has_changed().unwrap());
    let wired = metrics.borrow_and_update().clone();
    assert_eq!((wired.active, wired.columns), (3, 2));

    h.board.dispose();
    assert!(metrics.has_changed().unwrap());
    let unwired = metrics.borrow_and_update().clone();
    assert_eq!(unwired.active, 0);
    assert_eq!(unwired.last_detach_reason, Some(DetachReason::Disposed));
}

#[tokio::test(start_paused = true)]
async fn detach_monitor_expires_after_its_window() {
    let h = Harness::new(&[labelled("New")]);
    h.wire();
    assert_eq!(h.doc.observer_count(), 1);

    let window = h.board.config().board.observer_window_ms;
    tokio::time::sleep(std::time::Duration::from_millis(window + 1)).await;

    assert_eq!(h.doc.observer_count(), 0);
    assert!(!h.board.wiring().monitor().is_watching());
    assert_eq!(h.board.metrics().active, 3, "listeners outlive the monitor");
}
