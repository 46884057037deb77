#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the infrastructure and feature crates.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! crm-derive = { path = "../infra/derive" }
//! thiserror = "2"
//! ```
//!
//! The generated code refers to `::thiserror`, so consumers must depend on it too.

mod error;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Attribute macro for domain error enums.
///
/// # Features
///
/// * **Automatic Derives**: Injects `Debug` and `thiserror::Error` unless already derived.
/// * **Context Support**: Generates a companion `<Name>Ext` trait adding `.context(...)`
///   to `Result<T, Name>` and to `Result<T, Source>` for every wrapped source type.
/// * **Conversions**: Implements `From<Source>` for variants with a `source` field
///   (or a field marked `#[source]` / `#[from]`), enabling `?` on upstream errors.
/// * **Internal Fallback**: Implements `From<&'static str>` and `From<String>` when an
///   `Internal { message, context }` variant is present.
/// * **Formatting**: Emits a module-local `format_context` helper for `#[error(...)]`
///   strings, rendering ` (context)` or nothing.
///
/// # Requirements
///
/// 1. Applied to an **enum** whose variants use named fields or no fields.
/// 2. A `context` field must be `Option<Cow<'static, str>>`.
/// 3. Variants wrapping a source must also have a `context` field.
///
/// # Example
///
/// ```rust,ignore
/// use crm_derive::crm_error;
/// use std::borrow::Cow;
///
/// #[crm_error]
/// pub enum StoreError {
///     #[error("IO error{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn load(path: &str) -> Result<Vec<u8>, StoreError> {
///     std::fs::read(path).context("Reading snapshot")
/// }
/// ```
#[proc_macro_attribute]
pub fn crm_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    error::expand(input).into()
}
