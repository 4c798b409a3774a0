use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Url};
use rsched_core::types::{is_truthy, RawStats, ScheduledKey};
use rsched_core::{
    ClientConfig, Result, RschedError, ScheduleRecord, ScheduleRequest, ScheduleUpdate, Stats,
};
use rsched_events::EventRegistry;
use rsched_protocol::{decode, Outcome};
use rsched_webhook::{ReceiverState, WebhookReceiver, WebhookStatus};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Typed client for one scheduler instance.
///
/// Owns its own subscriber registry and, when a webhook port is configured,
/// its own listener. Nothing is shared between two clients.
pub struct SchedulerClient {
    http: reqwest::Client,
    base_url: Url,
    authorization: HeaderValue,
    inbound: Arc<ReceiverState>,
    receiver: Option<WebhookReceiver>,
}

impl SchedulerClient {
    /// Validate `config`, probe the instance, and start the webhook listener
    /// if a port is configured. The client is only returned once all three
    /// succeeded.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        Self::connect_with(config, reqwest::Client::new()).await
    }

    /// Like [`SchedulerClient::connect`], over a caller-built HTTP client
    /// (timeouts, proxies, TLS roots).
    pub async fn connect_with(config: ClientConfig, http: reqwest::Client) -> Result<Self> {
        config.validate()?;
        let base_url = config.base_url()?;

        let mut authorization = HeaderValue::from_str(&config.authorization)
            .map_err(|e| RschedError::Config(format!("authorization token is not a valid header: {e}")))?;
        authorization.set_sensitive(true);

        let registry = Arc::new(EventRegistry::new());
        let inbound = Arc::new(ReceiverState::new(config.authorization.clone(), registry));

        let mut client = Self {
            http,
            base_url,
            authorization,
            inbound,
            receiver: None,
        };

        client.probe().await?;

        if let Some(port) = config.webhook_port {
            let receiver =
                WebhookReceiver::start(&config.webhook_bind, port, Arc::clone(&client.inbound))
                    .await?;
            client.receiver = Some(receiver);
        }

        info!(instance = %client.base_url, webhook = ?client.webhook_status(), "scheduler client ready");
        Ok(client)
    }

    /// Register a task. Returns the key the service assigned to it.
    pub async fn schedule<T: Serialize>(&self, request: &ScheduleRequest<T>) -> Result<String> {
        let url = self.endpoint(&["schedule"])?;
        let key: ScheduledKey = self.send(Method::POST, url, Some(request)).await?;
        Ok(key.into_key())
    }

    pub async fn get_schedule<T: DeserializeOwned>(&self, key: &str) -> Result<ScheduleRecord<T>> {
        let url = self.endpoint(&["schedule", key])?;
        self.send(Method::GET, url, None::<&()>).await
    }

    pub async fn get_all_schedules<T: DeserializeOwned>(&self) -> Result<Vec<ScheduleRecord<T>>> {
        let url = self.endpoint(&["schedules"])?;
        self.send(Method::GET, url, None::<&()>).await
    }

    /// Change an existing schedule.
    ///
    /// The result is the truthiness of the service's success payload, not an
    /// existence check: a missing key fails with a remote error instead.
    pub async fn update_schedule<T: Serialize>(
        &self,
        key: &str,
        update: &ScheduleUpdate<T>,
    ) -> Result<bool> {
        let url = self.endpoint(&["schedule", key])?;
        let data: Value = self.send(Method::PATCH, url, Some(update)).await?;
        Ok(is_truthy(&data))
    }

    /// Same result convention as [`SchedulerClient::update_schedule`].
    pub async fn delete_schedule(&self, key: &str) -> Result<bool> {
        let url = self.endpoint(&["schedule", key])?;
        let data: Value = self.send(Method::DELETE, url, None::<&()>).await?;
        Ok(is_truthy(&data))
    }

    /// Remove every schedule on the instance. Safe to repeat.
    pub async fn delete_all_schedules(&self) -> Result<bool> {
        let url = self.endpoint(&["schedules"])?;
        let data: Value = self.send(Method::DELETE, url, None::<&()>).await?;
        Ok(is_truthy(&data))
    }

    pub async fn get_stats(&self) -> Result<Stats> {
        let url = self.endpoint(&["stats"])?;
        let raw: RawStats = self.send(Method::GET, url, None::<&()>).await?;
        Ok(raw.into())
    }

    /// Subscribers for deliveries received by this client.
    pub fn events(&self) -> &Arc<EventRegistry> {
        self.inbound.registry()
    }

    /// Feed a delivery in as if it had arrived over HTTP. Returns whether it
    /// was dispatched, i.e. whether `authorization` matched.
    pub fn on_webhook(&self, payload: Value, authorization: &str) -> bool {
        self.inbound
            .deliver(Some(authorization.as_bytes()), payload)
            .is_dispatched()
    }

    pub fn webhook_status(&self) -> WebhookStatus {
        self.receiver
            .as_ref()
            .map_or(WebhookStatus::Disabled, WebhookReceiver::status)
    }

    pub fn instance_url(&self) -> &Url {
        &self.base_url
    }

    /// Stop the webhook listener, waiting for in-flight deliveries. Dropping
    /// the client also stops it, without waiting.
    pub async fn shutdown(mut self) -> Result<()> {
        match self.receiver.take() {
            Some(receiver) => receiver.shutdown().await,
            None => Ok(()),
        }
    }

    /// GET against the base URL; anything but a success envelope is fatal.
    async fn probe(&self) -> Result<()> {
        let url = self.base_url.clone();
        match self.send::<Value, ()>(Method::GET, url, None).await {
            Ok(_) => Ok(()),
            Err(RschedError::Remote { status, message }) => Err(RschedError::Config(format!(
                "instance rejected liveness probe ({status}): {message}"
            ))),
            Err(RschedError::Transport(reason)) => Err(RschedError::Config(format!(
                "instance unreachable: {reason}"
            ))),
            Err(RschedError::Protocol(reason)) => Err(RschedError::Config(format!(
                "instance is not a scheduler: {reason}"
            ))),
            Err(other) => Err(other),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RschedError::Config("instance URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(AUTHORIZATION, self.authorization.clone())
            .header(CONTENT_TYPE, "application/json")
    }

    async fn send<T, B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!(method = %method, url = %url, "sending request");

        let mut req = self.request(method.clone(), url.clone());
        if let Some(body) = body {
            req = req.body(serde_json::to_vec(body)?);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(method = %method, url = %url, error = %e, "request failed before a response");
                return decode(Outcome::Unreached {
                    reason: &e.to_string(),
                });
            }
        };

        let http_status = resp.status().as_u16();
        match resp.bytes().await {
            Ok(body) => decode(Outcome::Received {
                http_status,
                body: &body,
            }),
            Err(e) => {
                warn!(method = %method, url = %url, http_status, error = %e, "response body lost");
                decode(Outcome::Unreached {
                    reason: &e.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for SchedulerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerClient")
            .field("instance_url", &self.base_url.as_str())
            .field("webhook", &self.webhook_status())
            .finish_non_exhaustive()
    }
}
