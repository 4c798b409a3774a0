//! `rsched-webhook`: inbound listener through which the scheduler service
//! delivers elapsed schedules.
//!
//! # States
//!
//! | State       | When                                   |
//! |-------------|----------------------------------------|
//! | `Disabled`  | no listen port in the client config    |
//! | `Listening` | bound; lasts until shutdown or drop    |

pub mod handler;
pub mod receiver;

pub use handler::{authorized, router, Delivery, ReceiverState};
pub use receiver::{WebhookReceiver, WebhookStatus};
