// Radar presence gateway: sensor acquisition to cloud telemetry.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use presence_core::classifier::MotionClassifier;
use presence_gateway::config::GatewayConfig;
use presence_gateway::constants::TRANSPORT_EVENT_CAPACITY;
use presence_gateway::http;
use presence_gateway::pipeline::{Components, Pipeline};
use presence_gateway::sensor::{FrameSource, ReplaySource, SyntheticSource};
use presence_gateway::transport::{DatagramTransport, InterfaceLink};

async fn frame_source(config: &GatewayConfig) -> anyhow::Result<Box<dyn FrameSource>> {
    match &config.frame_file {
        Some(path) => {
            let source = ReplaySource::open(path, config.frame_layout)
                .await
                .with_context(|| format!("failed to load frame recording {}", path.display()))?
                .looping(config.frame_loop);
            Ok(Box::new(source))
        }
        None => {
            info!(period_ms = config.frame_period.as_millis() as u64, "using synthetic frame source");
            Ok(Box::new(SyntheticSource::new(config.frame_layout, config.frame_period)))
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("invalid gateway configuration")?;
    let source = frame_source(&config).await?;
    let classifier =
        MotionClassifier::for_layout(config.frame_layout).context("default classifier configuration rejected")?;

    let (events_tx, events_rx) = mpsc::channel(TRANSPORT_EVENT_CAPACITY);
    let transport = Arc::new(DatagramTransport::new(config.broker_addr, events_tx));
    let link = Arc::new(InterfaceLink::new(config.broker_addr.ip().is_loopback()));

    let pipeline = Pipeline::start(
        &config,
        Components {
            link,
            transport,
            transport_events: events_rx,
            source,
            classifier: Box::new(classifier),
        },
    )
    .context("failed to derive topics")?;

    let app = http::router(pipeline.status());
    let addr = config.http_addr;
    tokio::spawn(async move {
        info!(%addr, "starting status server");
        if let Err(err) = axum::Server::bind(&addr).serve(app.into_make_service()).await {
            warn!(?err, "status server exited");
        }
    });

    pipeline.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
