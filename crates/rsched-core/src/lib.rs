//! `rsched-core`: configuration, error taxonomy and data types shared by
//! every rsched crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::ClientConfig;
pub use error::{Result, RschedError};
pub use types::{ScheduleRecord, ScheduleRequest, ScheduleUpdate, Stats};
