//! `rsched-events`: per-client publish/subscribe registry for webhook
//! deliveries.
//!
//! Subscribers are called in registration order, synchronously, against a
//! snapshot of the registry taken when dispatch starts. A subscriber that
//! unsubscribes itself (or another) mid-dispatch still sees the event in
//! flight; it is gone for the next one.

pub mod error;
pub mod registry;
pub mod types;

pub use error::SubscriberError;
pub use registry::EventRegistry;
pub use types::{DispatchReport, Subscriber, SubscriptionId, WebhookEvent, DATA_EVENT};
