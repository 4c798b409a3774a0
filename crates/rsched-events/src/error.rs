use thiserror::Error;

/// Returned by a subscriber that could not handle an event. Logged by the
/// registry; never stops delivery to the remaining subscribers.
#[derive(Debug, Error)]
#[error("Subscriber failed: {0}")]
pub struct SubscriberError(pub String);

impl SubscriberError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
