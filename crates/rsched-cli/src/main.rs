use anyhow::Context;
use clap::{Parser, Subcommand};
use figment::providers::Serialized;
use rsched_client::{ClientConfig, ScheduleRecord, ScheduleRequest, ScheduleUpdate, SchedulerClient};
use rsched_events::WebhookEvent;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Command-line client for a scheduler instance.
#[derive(Debug, Parser)]
#[command(name = "rsched", version, about)]
struct Cli {
    /// Config file (default: $RSCHED_CONFIG, then ~/.rsched/rsched.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Overrides `instance_url` from config and environment
    #[arg(long, global = true)]
    instance_url: Option<String>,

    /// Overrides `authorization` from config and environment
    #[arg(long, global = true)]
    authorization: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Schedule a payload to be posted to a webhook after a TTL
    Schedule {
        #[arg(long)]
        webhook: String,
        /// Seconds until the webhook fires
        #[arg(long)]
        ttl: u64,
        /// Payload as JSON
        #[arg(long, default_value = "{}")]
        data: String,
    },
    /// Show one schedule
    Get { key: String },
    /// List every schedule
    List,
    /// Change fields of an existing schedule; omitted fields are kept
    Update {
        key: String,
        #[arg(long)]
        webhook: Option<String>,
        #[arg(long)]
        ttl: Option<u64>,
        #[arg(long)]
        retry: Option<u32>,
        #[arg(long)]
        data: Option<String>,
    },
    /// Delete one schedule
    Delete { key: String },
    /// Delete every schedule on the instance
    Purge,
    /// Show instance statistics
    Stats,
    /// Run the webhook listener and print each delivery as a JSON line
    Listen {
        /// Overrides `webhook_port`
        #[arg(long)]
        port: Option<u16>,
        /// Overrides `webhook_bind`
        #[arg(long)]
        bind: Option<String>,
    },
}

/// Flag values layered over the file and environment. Unset flags are
/// skipped so they don't mask lower layers.
#[derive(Debug, Default, Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    instance_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook_bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rsched=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut overrides = Overrides {
        instance_url: cli.instance_url,
        authorization: cli.authorization,
        ..Default::default()
    };
    if let Command::Listen { port, bind } = &cli.command {
        overrides.webhook_port = *port;
        overrides.webhook_bind = bind.clone();
    }

    let config: ClientConfig = ClientConfig::figment(cli.config.as_deref())
        .merge(Serialized::defaults(overrides))
        .extract()
        .context("failed to load configuration")?;

    if matches!(cli.command, Command::Listen { .. }) && !config.webhook_enabled() {
        anyhow::bail!("listen needs a webhook port (--port, webhook_port or RSCHED_WEBHOOK_PORT)");
    }

    let client = SchedulerClient::connect(config).await?;

    match cli.command {
        Command::Schedule { webhook, ttl, data } => {
            let request = ScheduleRequest::new(webhook, ttl, parse_json(&data)?);
            let key = client.schedule(&request).await?;
            print_json(&serde_json::json!({ "key": key }))?;
        }
        Command::Get { key } => {
            let record: ScheduleRecord<Value> = client.get_schedule(&key).await?;
            print_json(&record)?;
        }
        Command::List => {
            let records: Vec<ScheduleRecord<Value>> = client.get_all_schedules().await?;
            print_json(&records)?;
        }
        Command::Update {
            key,
            webhook,
            ttl,
            retry,
            data,
        } => {
            let update = ScheduleUpdate {
                webhook,
                ttl_secs: ttl,
                retry,
                payload: data.as_deref().map(parse_json).transpose()?,
            };
            let updated = client.update_schedule(&key, &update).await?;
            print_json(&serde_json::json!({ "updated": updated }))?;
        }
        Command::Delete { key } => {
            let deleted = client.delete_schedule(&key).await?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }
        Command::Purge => {
            let purged = client.delete_all_schedules().await?;
            print_json(&serde_json::json!({ "purged": purged }))?;
        }
        Command::Stats => {
            print_json(&client.get_stats().await?)?;
        }
        Command::Listen { .. } => listen(client).await?,
    }

    Ok(())
}

async fn listen(client: SchedulerClient) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<WebhookEvent>();
    client.events().subscribe(move |event: &WebhookEvent| {
        if tx.send(event.clone()).is_err() {
            warn!(event_id = %event.id, "printer gone, event dropped");
        }
    });

    info!(status = ?client.webhook_status(), "listening for deliveries, Ctrl-C to stop");

    let printed = forward_until(&mut rx, tokio::signal::ctrl_c(), |event| {
        println!("{}", serde_json::to_string(event)?);
        Ok(())
    })
    .await?;
    info!(printed, "shutting down");

    client.shutdown().await?;
    Ok(())
}

/// Hand queued events to `emit` until `shutdown` resolves. The shutdown
/// future is created once and polled across iterations, so a signal that
/// lands while an event is being emitted is still seen. Returns how many
/// events were emitted.
async fn forward_until<S, E>(
    rx: &mut mpsc::UnboundedReceiver<WebhookEvent>,
    shutdown: S,
    mut emit: E,
) -> anyhow::Result<usize>
where
    S: std::future::Future,
    E: FnMut(&WebhookEvent) -> anyhow::Result<()>,
{
    tokio::pin!(shutdown);
    let mut emitted = 0;

    loop {
        tokio::select! {
            biased;
            Some(event) = rx.recv() => {
                emit(&event)?;
                emitted += 1;
            }
            _ = &mut shutdown => break,
        }
    }
    Ok(emitted)
}

fn parse_json(raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("--data is not valid JSON: {raw}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
