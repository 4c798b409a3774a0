use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task to register with the scheduler.
///
/// Has no retry field: the service owns the retry counter and resets it to
/// zero on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRequest<T> {
    /// URL the service POSTs `payload` to once the TTL elapses.
    pub webhook: String,
    /// Delay before delivery, in seconds.
    #[serde(rename = "ttl")]
    pub ttl_secs: u64,
    #[serde(rename = "data")]
    pub payload: T,
}

impl<T> ScheduleRequest<T> {
    pub fn new(webhook: impl Into<String>, ttl_secs: u64, payload: T) -> Self {
        Self {
            webhook: webhook.into(),
            ttl_secs,
            payload,
        }
    }
}

/// Fields to change on an existing schedule. Omitted fields keep their
/// current value on the service side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleUpdate<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    #[serde(rename = "ttl", default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
}

impl<T> Default for ScheduleUpdate<T> {
    fn default() -> Self {
        Self {
            webhook: None,
            ttl_secs: None,
            retry: None,
            payload: None,
        }
    }
}

impl<T> ScheduleUpdate<T> {
    pub fn webhook(mut self, webhook: impl Into<String>) -> Self {
        self.webhook = Some(webhook.into());
        self
    }

    pub fn ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn payload(mut self, payload: T) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl<T> From<ScheduleRequest<T>> for ScheduleUpdate<T> {
    fn from(req: ScheduleRequest<T>) -> Self {
        Self {
            webhook: Some(req.webhook),
            ttl_secs: Some(req.ttl_secs),
            retry: None,
            payload: Some(req.payload),
        }
    }
}

/// Success payload of `POST /schedule`. Older service builds return the key
/// as a bare string, newer ones wrap it in an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScheduledKey {
    Object { key: String },
    Bare(String),
}

impl ScheduledKey {
    pub fn into_key(self) -> String {
        match self {
            ScheduledKey::Object { key } | ScheduledKey::Bare(key) => key,
        }
    }
}

/// A schedule as stored by the service. `key` is the only stable identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawScheduleRecord<T>")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ScheduleRecord<T> {
    pub key: String,
    pub ttl_secs: u64,
    pub retry_count: u32,
    pub webhook: String,
    pub expires_at: DateTime<Utc>,
    pub payload: T,
}

/// Wire shape of a schedule record: `{info: {...}, data}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawScheduleRecord<T> {
    pub info: RawScheduleInfo,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawScheduleInfo {
    pub key: String,
    pub ttl: u64,
    #[serde(default)]
    pub retry: u32,
    pub webhook: String,
    pub expires: DateTime<Utc>,
}

impl<T> From<RawScheduleRecord<T>> for ScheduleRecord<T> {
    fn from(raw: RawScheduleRecord<T>) -> Self {
        Self {
            key: raw.info.key,
            ttl_secs: raw.info.ttl,
            retry_count: raw.info.retry,
            webhook: raw.info.webhook,
            expires_at: raw.info.expires,
            payload: raw.data,
        }
    }
}

/// `GET /stats` payload exactly as the service sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStats {
    pub total_redis_keys: u64,
    pub running_schedules: u64,
    pub cpu_usage: f64,
    pub ram_usage: String,
    pub ram_usage_bytes: u64,
    pub system_uptime: String,
    pub go_routines: u64,
}

/// Point-in-time service statistics. Values are passed through from
/// [`RawStats`] untouched; only the names change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_keys: u64,
    pub running_schedules: u64,
    pub cpu_usage_percent: f64,
    /// Pre-formatted by the service, e.g. "30%" or "1.50MB".
    pub ram_usage_percent: String,
    pub ram_usage_bytes: u64,
    pub system_uptime: String,
    pub worker_count: u64,
}

impl From<RawStats> for Stats {
    fn from(raw: RawStats) -> Self {
        Self {
            total_keys: raw.total_redis_keys,
            running_schedules: raw.running_schedules,
            cpu_usage_percent: raw.cpu_usage,
            ram_usage_percent: raw.ram_usage,
            ram_usage_bytes: raw.ram_usage_bytes,
            system_uptime: raw.system_uptime,
            worker_count: raw.go_routines,
        }
    }
}

/// Loose truthiness of a success payload: null, false, 0, "" and NaN are
/// false, everything else (including empty arrays and objects) is true.
///
/// Update and delete operations report their result this way, so an empty
/// but successful body reads as `false`.
pub fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
