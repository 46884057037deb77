use crm_domain::board::{DetachReason, DragPayload, PipelineChanged, RootState, WiringMetrics};
use crm_domain::config::{BoardConfig, PipelineConfig, StoreConfig};
use crm_domain::stage::{STANDARD_ALIASES, STANDARD_STAGES, StageTone, stage_key_from_label};
use serde_json::json;

#[test]
fn config_defaults_are_sane() {
    let board = BoardConfig::default();
    assert_eq!(board.coalesce_window_ms, 0);
    assert_eq!(board.observer_window_ms, 15_000);

    let store = StoreConfig::default();
    assert_eq!(store.data_dir, std::path::PathBuf::from("./data"));
    assert_eq!(store.collection, "contacts");

    let cfg = PipelineConfig::default();
    assert_eq!(cfg.stages.len(), STANDARD_STAGES.len());
    assert_eq!(cfg.aliases.len(), STANDARD_ALIASES.len());
    assert_eq!(cfg.log.level, "info");
    assert!(cfg.log.directory.is_none());
}

#[test]
fn pipeline_config_deserializes_partial_documents() {
    let raw = json!({
        "board": { "coalesce_window_ms": 25 },
        "store": { "data_dir": "/tmp/crm" },
        "stages": [
            { "key": "open", "label": "Open" },
            { "key": "closed", "label": "Closed", "tone": "success" }
        ]
    });

    let cfg: PipelineConfig = serde_json::from_value(raw).expect("config deserialize");
    assert_eq!(cfg.board.coalesce_window_ms, 25);
    assert_eq!(cfg.board.observer_window_ms, 15_000);
    assert_eq!(cfg.store.collection, "contacts");
    assert_eq!(cfg.stages[0].tone, StageTone::Progress);
    assert_eq!(cfg.stages[1].tone, StageTone::Success);
    assert!(!cfg.aliases.is_empty(), "aliases fall back to the standard table");
}

#[test]
fn config_clones_share_until_mutated() {
    let base = PipelineConfig::default();
    let mut tuned = base.clone();
    tuned.board.coalesce_window_ms = 40;

    assert_eq!(base.board.coalesce_window_ms, 0);
    assert_eq!(tuned.board.coalesce_window_ms, 40);
}

#[test]
fn stage_keys_derive_from_labels() {
    for (key, label, _) in STANDARD_STAGES {
        assert_eq!(stage_key_from_label(label), *key);
    }
    assert_eq!(stage_key_from_label("--Pre   Approved--"), "pre_approved");
    assert_eq!(stage_key_from_label("!!!"), "");
}

#[test]
fn drag_payload_wire_format() {
    let payload = DragPayload::contact("42");
    assert_eq!(serde_json::to_value(&payload).unwrap(), json!({ "type": "contact", "id": "42" }));

    let decoded: DragPayload = serde_json::from_str(r#"{"type":"contact","id":"7"}"#).unwrap();
    assert_eq!(decoded.id(), "7");

    assert!(serde_json::from_str::<DragPayload>(r#"{"type":"deal","id":"7"}"#).is_err());
    assert!(serde_json::from_str::<DragPayload>(r#"{"id":"7"}"#).is_err());
}

#[test]
fn change_event_and_metrics_serialize_as_strings() {
    let event = PipelineChanged::pipeline(vec!["1".into(), "2".into()]);
    assert_eq!(
        serde_json::to_value(&event).unwrap(),
        json!({ "scope": "pipeline", "ids": ["1", "2"] })
    );

    let metrics = WiringMetrics {
        root: RootState::Detached,
        last_detach_reason: Some(DetachReason::RootChanged),
        ..WiringMetrics::default()
    };
    let value = serde_json::to_value(&metrics).unwrap();
    assert_eq!(value["root"], "detached");
    assert_eq!(value["last_detach_reason"], "root_changed");
    assert_eq!(DetachReason::Disconnect.to_string(), "disconnect");
}
