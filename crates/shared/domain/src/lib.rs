//! # Domain Models
//!
//! Pure pipeline-board types with minimal dependencies (`serde`, `bitflags`).
//! Keep it lean: no I/O, no async, no engine logic. Just data and small helpers.

pub mod board;
pub mod config;
pub mod constants;
pub mod stage;
