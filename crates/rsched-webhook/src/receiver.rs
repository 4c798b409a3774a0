use std::net::SocketAddr;
use std::sync::Arc;

use rsched_core::{Result, RschedError};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::handler::{router, ReceiverState};

/// Whether a client has a webhook listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookStatus {
    /// No listen port was configured.
    Disabled,
    Listening(SocketAddr),
}

/// Background HTTP listener that turns authenticated deliveries into events.
///
/// Runs until [`WebhookReceiver::shutdown`] is awaited or the receiver is
/// dropped.
pub struct WebhookReceiver {
    local_addr: SocketAddr,
    state: Arc<ReceiverState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl WebhookReceiver {
    /// Bind `bind:port` and start serving POST /webhook.
    pub async fn start(bind: &str, port: u16, state: Arc<ReceiverState>) -> Result<Self> {
        let listener = TcpListener::bind((bind, port)).await.map_err(|e| {
            RschedError::Config(format!("failed to bind webhook listener on {bind}:{port}: {e}"))
        })?;
        let local_addr = listener.local_addr()?;

        let app = router(Arc::clone(&state));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(error = %err, "webhook listener error");
            }
        });

        info!(addr = %local_addr, "webhook listener started");

        Ok(Self {
            local_addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn status(&self) -> WebhookStatus {
        WebhookStatus::Listening(self.local_addr)
    }

    pub fn state(&self) -> &Arc<ReceiverState> {
        &self.state
    }

    /// Stop accepting deliveries and wait for in-flight ones to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    return Err(RschedError::Io(std::io::Error::other(format!(
                        "webhook listener panicked: {err}"
                    ))));
                }
            }
        }

        info!(addr = %self.local_addr, "webhook listener stopped");
        Ok(())
    }
}

impl Drop for WebhookReceiver {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl std::fmt::Debug for WebhookReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookReceiver")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}
