mod alarm;
mod broker;
mod config;
mod detect;
mod hardware;

use anyhow::Result;
use clap::Parser;
use rumqttc::AsyncClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::alarm::{AlarmRunner, CommandSound, Spray};
use crate::config::ClientConfig;
use crate::detect::{run_detection, CommandDetector};
use crate::hardware::SysfsRelay;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plays wake-up alarms delivered over MQTT")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "ALARM_CONFIG", default_value = "alarm-client.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alarm_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = ClientConfig::load(&cli.config)?;

    tracing::info!(
        endpoint = %config.broker.endpoint,
        client_id = %config.broker.client_id,
        "Starting alarm client"
    );

    let options = broker::mqtt_options(&config.broker).await?;
    let (client, eventloop) = AsyncClient::new(options, 10);

    let spray = config.relay.as_ref().map(|relay| Spray {
        relay: Arc::new(SysfsRelay::new(relay)),
        duration: Duration::from_secs(relay.pulse_secs),
    });
    let runner = AlarmRunner::new(
        Arc::new(CommandSound::new(&config.alarm)),
        spray,
        config.alarm.clone(),
    );

    let (alarm_tx, alarm_rx) = mpsc::channel(16);
    let subscription_handle = tokio::spawn(broker::run_subscription(
        client.clone(),
        eventloop,
        config.broker.client_id.clone(),
        alarm_tx,
    ));
    let runner_handle = tokio::spawn(runner.run(alarm_rx));

    let detection_handle = config.detection.as_ref().map(|detection| {
        let detector = Arc::new(CommandDetector::new(detection.command.clone()));
        tokio::spawn(run_detection(
            detector,
            Duration::from_secs(detection.interval_secs),
        ))
    });

    // Wait for shutdown signal
    tracing::info!("Alarm client running. Press Ctrl+C to stop.");
    signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping...");

    // Dropping the subscription closes the alarm channel, which stops the runner
    subscription_handle.abort();
    if let Some(handle) = detection_handle {
        handle.abort();
    }
    if let Err(e) = runner_handle.await {
        tracing::error!("Alarm runner task error: {:?}", e);
    }
    if let Err(e) = client.disconnect().await {
        tracing::debug!("MQTT disconnect failed: {}", e);
    }

    tracing::info!("Alarm client stopped");
    Ok(())
}
