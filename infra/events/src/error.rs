use std::borrow::Cow;

/// Errors that can occur during event bus operations.
#[crm_derive::crm_error]
pub enum EventBusError {
    /// An internal dynamic cast failed. Indicates a broken type registry.
    #[error("Type mismatch{}: {message}", format_context(.context))]
    TypeMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
