//! `rsched-client`: async client for a remote scheduler instance.
//!
//! # Overview
//!
//! [`SchedulerClient::connect`] validates the config, probes the instance
//! and, when a webhook port is set, starts a listener whose authenticated
//! deliveries are published to [`SchedulerClient::events`].
//!
//! | Operation              | HTTP                       | Result                  |
//! |------------------------|----------------------------|-------------------------|
//! | `schedule`             | `POST /schedule`           | assigned key            |
//! | `get_schedule`         | `GET /schedule/{key}`      | `ScheduleRecord<T>`     |
//! | `get_all_schedules`    | `GET /schedules`           | `Vec<ScheduleRecord<T>>`|
//! | `update_schedule`      | `PATCH /schedule/{key}`    | `bool`                  |
//! | `delete_schedule`      | `DELETE /schedule/{key}`   | `bool`                  |
//! | `delete_all_schedules` | `DELETE /schedules`        | `bool`                  |
//! | `get_stats`            | `GET /stats`               | `Stats`                 |
//!
//! Every call sends `Authorization: <token>` and `Content-Type:
//! application/json`, and fails with the error the response envelope
//! produced. Nothing is retried or cached.

pub mod client;

pub use client::SchedulerClient;
pub use rsched_core::{
    ClientConfig, Result, RschedError, ScheduleRecord, ScheduleRequest, ScheduleUpdate, Stats,
};
pub use rsched_events::{EventRegistry, Subscriber, SubscriberError, SubscriptionId, WebhookEvent};
pub use rsched_webhook::WebhookStatus;
