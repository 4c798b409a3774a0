use rsched_core::{Result, RschedError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// The only status code the service uses for success envelopes.
pub const SUCCESS_STATUS: u16 = 200;

/// Uniform wrapper around every response body.
/// Wire: `{ "status": 200, "data": ... }` or `{ "status": 404, "error": "..." }`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Success { status: u16, data: T },
    Failure { status: u16, error: String },
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Envelope::Success {
            status: SUCCESS_STATUS,
            data,
        }
    }

    pub fn err(status: u16, error: impl Into<String>) -> Self {
        Envelope::Failure {
            status,
            error: error.into(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Envelope::Success { status, .. } | Envelope::Failure { status, .. } => *status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }

    /// Unwrap the payload, turning a failure envelope into [`RschedError::Remote`].
    pub fn into_result(self) -> Result<T> {
        match self {
            Envelope::Success { data, .. } => Ok(data),
            Envelope::Failure { status, error } => Err(RschedError::Remote {
                status,
                message: error,
            }),
        }
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Interpret a response body as an envelope.
    ///
    /// `http_status` only fills in the status of a failure whose body omits
    /// it; the body's own `status` field is the discriminant.
    ///
    /// Rules, in order:
    ///   1. an `error` field makes it a failure, whatever `status` says
    ///   2. a `status` other than 200, or none at all, is a failure; a
    ///      missing status is taken from the HTTP response and the message
    ///      falls back to a string `data`, a string `message`, then a
    ///      generic text
    ///   3. success without `data`, or `data` of the wrong shape, is a
    ///      protocol violation
    pub fn from_slice(http_status: u16, body: &[u8]) -> Result<Self> {
        if body.is_empty() {
            return Err(RschedError::Protocol(format!(
                "empty response body (HTTP {http_status})"
            )));
        }

        let mut fields: Map<String, Value> = serde_json::from_slice(body).map_err(|e| {
            RschedError::Protocol(format!("response is not a JSON envelope (HTTP {http_status}): {e}"))
        })?;

        let status = fields
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok());

        if let Some(error) = fields.remove("error") {
            return Ok(Envelope::Failure {
                status: status.unwrap_or(http_status),
                error: message_of(error),
            });
        }

        let status = match status {
            Some(SUCCESS_STATUS) => SUCCESS_STATUS,
            other => {
                let status = other.unwrap_or(http_status);
                let error = ["data", "message"]
                    .into_iter()
                    .find_map(|field| match fields.remove(field) {
                        Some(Value::String(s)) if !s.is_empty() => Some(s),
                        _ => None,
                    })
                    .unwrap_or_else(|| format!("request failed with status {status}"));
                return Ok(Envelope::Failure { status, error });
            }
        };

        let data = fields
            .remove("data")
            .ok_or_else(|| RschedError::Protocol("success envelope has no data field".into()))?;

        let data = serde_json::from_value(data)
            .map_err(|e| RschedError::Protocol(format!("unexpected data shape: {e}")))?;

        Ok(Envelope::Success { status, data })
    }
}

/// What the transport produced for one request.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    /// A response arrived, whatever its HTTP status.
    Received { http_status: u16, body: &'a [u8] },
    /// No response reached us (connect failure, reset, body read aborted).
    Unreached { reason: &'a str },
}

/// Turn a transport outcome into the declared payload type or a single
/// normalized error. Pure; never retries.
pub fn decode<T: DeserializeOwned>(outcome: Outcome<'_>) -> Result<T> {
    match outcome {
        Outcome::Unreached { reason } => Err(RschedError::Transport(reason.to_string())),
        Outcome::Received { http_status, body } => {
            let envelope = Envelope::<T>::from_slice(http_status, body).inspect_err(|e| {
                warn!(http_status, error = %e, "malformed response envelope");
            })?;
            if let Envelope::Failure { status, ref error } = envelope {
                warn!(status, error = %error, "remote returned failure envelope");
            }
            envelope.into_result()
        }
    }
}

fn message_of(error: Value) -> String {
    match error {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Body the webhook listener answers every delivery with.
/// Wire: `{ "status": 200, "message": "Webhook received successfully." }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct WebhookAck {
    pub status: u16,
    pub message: String,
}

impl WebhookAck {
    pub const MESSAGE: &'static str = "Webhook received successfully.";

    pub fn received() -> Self {
        Self {
            status: SUCCESS_STATUS,
            message: Self::MESSAGE.to_string(),
        }
    }
}
