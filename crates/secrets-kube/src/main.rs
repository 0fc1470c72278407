use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use nkeys::XKey;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use wasmcloud_secrets_server::ServerBuilder;

mod handler;
mod kube;

use crate::handler::KubeSecretsHandler;
use crate::kube::KubeClient;

const SERVICE_NAME: &str = "kube";

#[derive(Parser, Debug)]
struct Args {
    /// NATS URL
    #[arg(long, default_value = "nats://127.0.0.1:4222")]
    nats_url: String,
    /// NATS credentials file path
    #[arg(long)]
    nats_creds: Option<PathBuf>,
    /// NKeys curve seed. Leave blank for an ephemeral key, only recommended
    /// for development use
    #[arg(long)]
    backend_seed: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    info!(nats_url = %args.nats_url, "starting");

    let client = match &args.nats_creds {
        Some(path) => {
            async_nats::ConnectOptions::with_credentials_file(path.clone())
                .await
                .with_context(|| {
                    format!("failed to load NATS credentials from {}", path.display())
                })?
                .connect(&args.nats_url)
                .await
        }
        None => async_nats::connect(&args.nats_url).await,
    }
    .with_context(|| format!("failed to connect to NATS at {}", args.nats_url))?;

    let key = match args.backend_seed.as_deref().filter(|seed| !seed.is_empty()) {
        Some(seed) => XKey::from_seed(seed).context("failed to parse backend seed")?,
        None => {
            warn!("creating ephemeral curve keys, do not use this in production");
            XKey::new()
        }
    };

    let kube = KubeClient::from_cluster_env().context("failed to configure cluster access")?;

    let server = ServerBuilder::new()
        .name(SERVICE_NAME)
        .client(client)
        .handler(KubeSecretsHandler::new(kube))
        .key_pair(key)
        .error_callback(|msg, err| error!(subject = %msg.subject, %err, "server error"))
        .build()
        .context("failed to set up secrets server")?;

    server.run().await.context("failed to start secrets server")?;
    info!("server is up");

    wait_for_shutdown().await?;
    info!("signal received, draining");
    server.shutdown(true).await;
    info!("drained all messages");

    Ok(())
}

/// Completes when any of the usual termination signals fires.
async fn wait_for_shutdown() -> anyhow::Result<()> {
    let kinds = [
        SignalKind::interrupt(),
        SignalKind::terminate(),
        SignalKind::user_defined1(),
        SignalKind::user_defined2(),
        SignalKind::hangup(),
    ];
    let mut signals = Vec::with_capacity(kinds.len());
    for kind in kinds {
        signals.push(signal(kind).context("failed to install signal handler")?);
    }
    futures::future::select_all(signals.iter_mut().map(|s| Box::pin(s.recv()))).await;
    Ok(())
}
