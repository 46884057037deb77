use crate::dom::NodeId;
use std::borrow::Cow;

/// Failures reported by a [`BoardDom`](super::BoardDom) host.
#[crm_derive::crm_error]
pub enum DomError {
    #[error("Host API unavailable{}: {api}", format_context(.context))]
    Unsupported { api: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Node not found{}: {node}", format_context(.context))]
    NodeNotFound { node: NodeId, context: Option<Cow<'static, str>> },
}
