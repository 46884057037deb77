use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::Path;
use tracing::info;

/// Prefix of environment overrides, e.g. `CRM__BOARD__COALESCE_WINDOW_MS`.
pub const ENV_PREFIX: &str = "CRM";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_CONFIG: &str = "board";

/// Custom error type for config loading.
#[crm_derive::crm_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Loads configuration from a file layered with environment overrides.
///
/// 1. **Base file**: any format the `config` crate detects from the extension
///    (`board.toml`, `board.json`, ...). Without a path, `board` in the working
///    directory is tried with every supported extension. The file is required.
/// 2. **Environment**: variables prefixed with `CRM__` override file values.
///    Nested keys use double underscores (`CRM__STORE__DATA_DIR` maps to `store.data_dir`).
///
/// # Errors
/// Returns [`ConfigError::Config`] if the file is missing or malformed, or if
/// the merged values do not deserialize into `T`.
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let source = match path {
        Some(path) => {
            let path = path.as_ref();
            info!(path = %path.display(), "Loading config");
            File::from(path).required(true)
        },
        None => {
            info!(name = DEFAULT_CONFIG, "Loading config");
            File::with_name(DEFAULT_CONFIG).required(true)
        },
    };

    Config::builder()
        .add_source(source)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        )
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")
}
