use crate::dom::DomError;
use crate::port::PortError;
use std::borrow::Cow;

/// Failures of the board engine. None of them escape a drop or a render pass;
/// they are logged and degrade to `false` or a no-op.
#[crm_derive::crm_error]
pub enum PipelineError {
    #[error("Stage label is not registered{}: '{label}'", format_context(.context))]
    NormalizationFailure { label: String, context: Option<Cow<'static, str>> },

    #[error("No record port can serve the request{}: {message}", format_context(.context))]
    PersistenceUnavailable { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Record not found{}: '{id}'", format_context(.context))]
    RecordNotFound { id: String, context: Option<Cow<'static, str>> },

    #[error("Record write failed{}: {source}", format_context(.context))]
    WriteFailure { source: PortError, context: Option<Cow<'static, str>> },

    #[error("Listener binding failed{}: {source}", format_context(.context))]
    ListenerBinding { source: DomError, context: Option<Cow<'static, str>> },

    #[error("Invalid drag payload{}: {source}", format_context(.context))]
    InvalidPayload { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Invalid stage registry{}: {message}", format_context(.context))]
    InvalidRegistry { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal pipeline error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
