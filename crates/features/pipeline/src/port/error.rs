use std::borrow::Cow;

/// Failures reported by a [`RecordPort`](super::RecordPort).
#[crm_derive::crm_error]
pub enum PortError {
    #[error("Record port unavailable{}: {message}", format_context(.context))]
    Unavailable { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid record key{}: '{key}'", format_context(.context))]
    InvalidKey { key: String, context: Option<Cow<'static, str>> },

    #[error("Storage failure{}: {source}", format_context(.context))]
    Storage { source: crm_storage::StorageError, context: Option<Cow<'static, str>> },

    #[error("Record codec failure{}: {source}", format_context(.context))]
    Codec { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Internal record port error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
