//! Webhook ingress endpoint: POST /webhook.
//!
//! The scheduler service calls this when a schedule's TTL elapses, sending
//! the scheduled payload as JSON and the shared token in `Authorization`.
//! Every request gets the same 200 acknowledgment: a caller cannot tell an
//! accepted delivery from a rejected one.

use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    routing::post,
    Json, Router,
};
use rsched_core::config::WEBHOOK_PATH;
use rsched_events::{DispatchReport, EventRegistry, WebhookEvent};
use rsched_protocol::WebhookAck;
use serde_json::Value;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

/// Shared by every request the listener serves. Read-only apart from the
/// registry, which does its own locking.
pub struct ReceiverState {
    token: String,
    registry: Arc<EventRegistry>,
}

impl ReceiverState {
    pub fn new(token: impl Into<String>, registry: Arc<EventRegistry>) -> Self {
        Self {
            token: token.into(),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    /// Authenticate, then dispatch. Shared by the HTTP handler and by callers
    /// injecting deliveries directly.
    pub fn deliver(&self, authorization: Option<&[u8]>, payload: Value) -> Delivery {
        if !authorized(&self.token, authorization) {
            debug!("webhook delivery rejected");
            return Delivery::Rejected;
        }
        let event = WebhookEvent::new(payload);
        info!(event_id = %event.id, "webhook delivery accepted");
        Delivery::Dispatched(self.registry.dispatch(&event))
    }
}

/// What happened to one inbound delivery. Never reported to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Dispatched(DispatchReport),
    Rejected,
    Malformed,
}

impl Delivery {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Delivery::Dispatched(_))
    }
}

/// Byte-for-byte comparison of the inbound header against the stored token,
/// in constant time.
pub fn authorized(token: &str, authorization: Option<&[u8]>) -> bool {
    match authorization {
        Some(header) => token.as_bytes().ct_eq(header).into(),
        None => false,
    }
}

/// Build the listener's router.
pub fn router(state: Arc<ReceiverState>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(webhook_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// POST /webhook
async fn webhook_handler(
    State(state): State<Arc<ReceiverState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<WebhookAck> {
    let outcome = handle_delivery(&state, &headers, &body);
    debug!(?outcome, bytes = body.len(), "webhook handled");
    Json(WebhookAck::received())
}

fn handle_delivery(state: &ReceiverState, headers: &HeaderMap, body: &[u8]) -> Delivery {
    let payload: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "webhook body is not JSON, dropped");
            return Delivery::Malformed;
        }
    };

    let authorization = headers.get(AUTHORIZATION).map(|v| v.as_bytes());
    state.deliver(authorization, payload)
}
