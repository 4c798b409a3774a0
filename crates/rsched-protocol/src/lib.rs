//! `rsched-protocol`: the response envelope shared by every scheduler
//! endpoint, and the acknowledgment body of the webhook listener.

pub mod envelope;

pub use envelope::{decode, Envelope, Outcome, WebhookAck, SUCCESS_STATUS};
