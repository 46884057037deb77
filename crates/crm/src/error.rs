use std::borrow::Cow;

/// Failures while composing a board from configuration.
#[crm_derive::crm_error]
pub enum InitError {
    #[error("Board composition failed{}: {source}", format_context(.context))]
    Pipeline { source: crm_pipeline::PipelineError, context: Option<Cow<'static, str>> },

    #[error("Logger setup failed{}: {source}", format_context(.context))]
    Logger { source: crm_logger::LoggerError, context: Option<Cow<'static, str>> },

    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: crm_kernel::config::ConfigError, context: Option<Cow<'static, str>> },
}
