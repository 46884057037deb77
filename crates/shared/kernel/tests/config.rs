use crm_kernel::config::{ConfigError, load_config};
use crm_kernel::domain::config::PipelineConfig;
use std::io::Write;

fn write_config(extension: &str, body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(extension).tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[test]
fn loads_toml_over_defaults() {
    let file = write_config(
        ".toml",
        r#"
        [board]
        coalesce_window_ms = 10

        [store]
        collection = "leads"

        [log]
        level = "debug"
        json = true

        [aliases]
        hot_lead = "qualified"
        "#,
    );

    let cfg: PipelineConfig = load_config(Some(file.path())).unwrap();
    assert_eq!(cfg.board.coalesce_window_ms, 10);
    assert_eq!(cfg.board.observer_window_ms, 15_000);
    assert_eq!(cfg.store.collection, "leads");
    assert_eq!(cfg.log.level, "debug");
    assert!(cfg.log.json);
    assert_eq!(cfg.aliases.get("hot_lead").map(String::as_str), Some("qualified"));
    assert_eq!(cfg.stages.len(), 6, "stages fall back to the standard registry");
}

#[test]
fn loads_json_stage_registry() {
    let file = write_config(
        ".json",
        r#"{ "stages": [ { "key": "todo", "label": "To Do" }, { "key": "done", "label": "Done", "tone": "success" } ] }"#,
    );

    let cfg: PipelineConfig = load_config(Some(file.path())).unwrap();
    let keys: Vec<_> = cfg.stages.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(keys, ["todo", "done"]);
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config::<PipelineConfig>(Some(dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Config { context: Some(_), .. }));
}

#[test]
fn malformed_values_are_an_error() {
    let file = write_config(".toml", "[board]\ncoalesce_window_ms = \"soon\"\n");
    assert!(load_config::<PipelineConfig>(Some(file.path())).is_err());
}
