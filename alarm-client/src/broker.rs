//! MQTT subscription to the device alarm topic.

use alarm_shared::{alarm_topic, AlarmMessage};
use anyhow::{Context, Result};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::BrokerConfig;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Connection options for mutual TLS against the broker.
pub async fn mqtt_options(config: &BrokerConfig) -> Result<MqttOptions> {
    let ca = tokio::fs::read(&config.ca_path)
        .await
        .with_context(|| format!("Failed to read CA certificate {}", config.ca_path.display()))?;
    let cert = tokio::fs::read(&config.cert_path).await.with_context(|| {
        format!("Failed to read device certificate {}", config.cert_path.display())
    })?;
    let key = tokio::fs::read(&config.key_path)
        .await
        .with_context(|| format!("Failed to read private key {}", config.key_path.display()))?;

    let mut options = MqttOptions::new(&config.client_id, &config.endpoint, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    options.set_clean_session(true);
    options.set_transport(Transport::tls(ca, Some((cert, key)), None));
    Ok(options)
}

/// Decode an alarm payload; anything else is logged and dropped.
pub fn decode_alarm(topic: &str, payload: &[u8]) -> Option<AlarmMessage> {
    match serde_json::from_slice::<AlarmMessage>(payload) {
        Ok(message) => {
            tracing::info!(
                topic = %topic,
                user_id = %message.user_id,
                event_id = %message.event_id,
                "Alarm received"
            );
            Some(message)
        }
        Err(e) => {
            tracing::warn!(
                topic = %topic,
                payload = %String::from_utf8_lossy(payload),
                "Dropping invalid alarm payload: {}",
                e
            );
            None
        }
    }
}

/// Drive the MQTT event loop, forwarding alarms to `alarms`.
///
/// The session is clean, so the topic is subscribed again after every
/// connection acknowledgement. Connection errors are logged and polling
/// resumes after a pause, which makes rumqttc reconnect.
pub async fn run_subscription(
    client: AsyncClient,
    mut eventloop: EventLoop,
    device_id: String,
    alarms: mpsc::Sender<AlarmMessage>,
) {
    let topic = alarm_topic(&device_id);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("Connected to broker, subscribing to {}", topic);
                if let Err(e) = client.subscribe(&topic, QoS::AtLeastOnce).await {
                    tracing::error!("Failed to subscribe to {}: {}", topic, e);
                }
            }
            Ok(Event::Incoming(Packet::SubAck(_))) => {
                tracing::info!("Subscribed to {}", topic);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if let Some(message) = decode_alarm(&publish.topic, &publish.payload) {
                    if alarms.send(message).await.is_err() {
                        tracing::warn!("Alarm runner stopped, ending subscription");
                        return;
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("MQTT connection error: {}", e);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_decode_alarm_with_defaults() {
        let message = decode_alarm(
            "pi/alarm",
            br#"{"user_id":"u","event_id":"e","spray_flag":true}"#,
        )
        .unwrap();

        assert!(message.spray_flag);
        assert_eq!(message.alarm_repeat_times, None);
        assert!(message.receivers.is_empty());
    }

    #[test]
    fn test_decode_alarm_rejects_garbage() {
        assert!(decode_alarm("pi/alarm", b"ring ring").is_none());
        assert!(decode_alarm("pi/alarm", br#"{"spray_flag":true}"#).is_none());
    }

    #[tokio::test]
    async fn test_mqtt_options_from_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["ca.crt", "cert.pem", "private.key"] {
            std::fs::write(dir.path().join(name), b"pem").unwrap();
        }

        let config = BrokerConfig {
            endpoint: "example-ats.iot.us-east-1.amazonaws.com".to_string(),
            port: 8883,
            client_id: "pi".to_string(),
            cert_path: dir.path().join("cert.pem"),
            key_path: dir.path().join("private.key"),
            ca_path: dir.path().join("ca.crt"),
            keep_alive_secs: 30,
        };

        let options = mqtt_options(&config).await.unwrap();
        assert_eq!(options.client_id(), "pi");
        assert_eq!(
            options.broker_address(),
            ("example-ats.iot.us-east-1.amazonaws.com".to_string(), 8883)
        );
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        assert!(options.clean_session());
    }

    #[tokio::test]
    async fn test_mqtt_options_missing_certificate() {
        let config = BrokerConfig {
            endpoint: "localhost".to_string(),
            port: 8883,
            client_id: "pi".to_string(),
            cert_path: PathBuf::from("/nonexistent/cert.pem"),
            key_path: PathBuf::from("/nonexistent/private.key"),
            ca_path: PathBuf::from("/nonexistent/ca.crt"),
            keep_alive_secs: 30,
        };

        assert!(mqtt_options(&config).await.is_err());
    }
}
