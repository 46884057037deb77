//! # Event Bus
//!
//! A small, type-safe, asynchronous event bus used to announce board changes
//! to whoever renders or records them.
//!
//! ## Overview
//!
//! Channels are keyed by the Rust type of the event and fan out to every
//! subscriber. Receivers that fall behind skip ahead through
//! [`EventReceiverExt::recv`] instead of failing.
//!
//! # Example
//!
//! ```rust
//! use crm_event_bus::{EventBus, EventBusError, EventReceiverExt};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct StageMoved { id: String }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), EventBusError> {
//!     let bus = EventBus::new();
//!
//!     let mut rx = bus.subscribe::<StageMoved>()?;
//!     bus.publish(StageMoved { id: "c-1".into() })?;
//!
//!     if let Some(event) = EventReceiverExt::recv(&mut rx).await {
//!         assert_eq!(event.id, "c-1");
//!     }
//!     Ok(())
//! }
//! ```

mod bus;
mod error;
mod receiver;

pub use bus::{Event, EventBus};
pub use error::{EventBusError, EventBusErrorExt};
pub use receiver::EventReceiverExt;
