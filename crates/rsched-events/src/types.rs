use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SubscriberError;

/// Name of the only event the registry carries.
pub const DATA_EVENT: &str = "data";

/// One authenticated webhook delivery, handed to subscribers and then dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Local correlation ID; the service does not send one.
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    /// Body of the delivery. Its shape is whatever was scheduled.
    pub payload: serde_json::Value,
}

impl WebhookEvent {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            payload,
        }
    }

    /// Decode the payload into the type the caller scheduled it with.
    pub fn payload_as<T: DeserializeOwned>(&self) -> rsched_core::Result<T> {
        Ok(T::deserialize(&self.payload)?)
    }
}

/// Opaque handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receives `data` events.
///
/// Called synchronously on the delivering task, so handlers should be quick
/// and hand heavy work off (e.g. through a channel). Plain closures
/// `Fn(&WebhookEvent)` implement this trait.
pub trait Subscriber: Send + Sync {
    fn on_event(&self, event: &WebhookEvent) -> Result<(), SubscriberError>;
}

impl<F> Subscriber for F
where
    F: Fn(&WebhookEvent) + Send + Sync,
{
    fn on_event(&self, event: &WebhookEvent) -> Result<(), SubscriberError> {
        self(event);
        Ok(())
    }
}

/// Outcome of one dispatch, mostly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}
