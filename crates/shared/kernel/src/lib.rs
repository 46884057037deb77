//! Kernel utilities shared across slices.
//! Keep this crate lightweight: layered config loading and a wall clock.
//!
//! ## Config loading
//! ```rust,no_run
//! use crm_kernel::config::load_config;
//! use crm_kernel::domain::config::PipelineConfig;
//!
//! let cfg: PipelineConfig = load_config(Some("board.toml")).unwrap_or_default();
//! assert!(!cfg.stages.is_empty());
//! ```

pub mod clock;
pub mod config;

pub use crm_domain as domain;
