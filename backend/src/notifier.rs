//! Alarm notifier: invoked by the scheduler at trigger time, forwards the
//! alarm message to the device topic on the IoT broker.

use alarm_shared::{alarm_topic, AlarmMessage};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, Transport};
use std::env;
use std::time::Duration;
use uuid::Uuid;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const ACK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub endpoint: String,
    pub port: u16,
    pub device_id: String,
    pub cert_path: String,
    pub key_path: String,
    pub ca_path: String,
}

impl NotifierConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            endpoint: env::var("IOT_ENDPOINT").context("IOT_ENDPOINT must be set")?,
            port: env::var("IOT_PORT")
                .unwrap_or_else(|_| "8883".to_string())
                .parse()
                .context("IOT_PORT must be a valid number")?,
            device_id: env::var("DEVICE_ID").context("DEVICE_ID must be set")?,
            cert_path: env::var("IOT_CERT_PATH").context("IOT_CERT_PATH must be set")?,
            key_path: env::var("IOT_KEY_PATH").context("IOT_KEY_PATH must be set")?,
            ca_path: env::var("IOT_CA_PATH").context("IOT_CA_PATH must be set")?,
        })
    }
}

#[async_trait]
pub trait AlarmPublisher: Send + Sync {
    /// Publish `payload` to `topic` and wait for the broker to acknowledge it.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// Publishes over MQTT with mutual TLS, one connection per call.
pub struct MqttPublisher {
    endpoint: String,
    port: u16,
    transport_files: (String, String, String),
}

impl MqttPublisher {
    pub fn new(config: &NotifierConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            port: config.port,
            transport_files: (
                config.ca_path.clone(),
                config.cert_path.clone(),
                config.key_path.clone(),
            ),
        }
    }

    async fn options(&self) -> Result<MqttOptions> {
        let (ca_path, cert_path, key_path) = &self.transport_files;
        let ca = tokio::fs::read(ca_path)
            .await
            .with_context(|| format!("Failed to read CA certificate {}", ca_path))?;
        let cert = tokio::fs::read(cert_path)
            .await
            .with_context(|| format!("Failed to read device certificate {}", cert_path))?;
        let key = tokio::fs::read(key_path)
            .await
            .with_context(|| format!("Failed to read private key {}", key_path))?;

        let client_id = format!("alarm-notifier-{}", Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, &self.endpoint, self.port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);
        options.set_transport(Transport::tls(ca, Some((cert, key)), None));
        Ok(options)
    }
}

#[async_trait]
impl AlarmPublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let (client, mut eventloop) = AsyncClient::new(self.options().await?, 10);
        client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .context("Failed to queue publish")?;

        let acked = tokio::time::timeout(ACK_TIMEOUT, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::PubAck(_))) => return Ok(()),
                    Ok(event) => tracing::trace!("MQTT event: {:?}", event),
                    Err(e) => return Err(anyhow::Error::new(e).context("MQTT connection failed")),
                }
            }
        })
        .await;

        if let Err(e) = client.disconnect().await {
            tracing::debug!("MQTT disconnect failed: {}", e);
        }

        match acked {
            Ok(result) => result,
            Err(_) => bail!("Broker did not acknowledge publish within {:?}", ACK_TIMEOUT),
        }
    }
}

/// Forward one alarm to the device topic.
pub async fn notify(
    publisher: &dyn AlarmPublisher,
    device_id: &str,
    message: &AlarmMessage,
) -> Result<()> {
    let topic = alarm_topic(device_id);
    let payload = serde_json::to_vec(message).context("Failed to encode alarm message")?;

    publisher.publish(&topic, payload).await?;

    tracing::info!(
        topic = %topic,
        user_id = %message.user_id,
        event_id = %message.event_id,
        "Alarm published"
    );
    Ok(())
}
