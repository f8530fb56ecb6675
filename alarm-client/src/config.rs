use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `ALARM__BROKER__ENDPOINT`.
const ENV_PREFIX: &str = "ALARM";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub broker: BrokerConfig,

    #[serde(default)]
    pub alarm: AlarmConfig,

    /// Spray relay; spraying is skipped when absent
    #[serde(default)]
    pub relay: Option<RelayConfig>,

    /// Person detection loop; disabled when absent
    #[serde(default)]
    pub detection: Option<DetectionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// AWS IoT data endpoint hostname
    pub endpoint: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// MQTT client id; also the first segment of the alarm topic
    #[serde(default = "default_client_id")]
    pub client_id: String,

    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub ca_path: PathBuf,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    #[serde(default = "default_sound_path")]
    pub sound_path: PathBuf,

    /// Program invoked with the sound file as its only argument
    #[serde(default = "default_player")]
    pub player: String,

    /// Used when an alarm message carries no repeat count
    #[serde(default = "default_repeat_times")]
    pub repeat_times: u32,

    /// Minutes between plays, used when an alarm message carries none
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            sound_path: default_sound_path(),
            player: default_player(),
            repeat_times: default_repeat_times(),
            interval_minutes: default_interval_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// BCM pin number
    #[serde(default = "default_relay_pin")]
    pub pin: u32,

    #[serde(default = "default_pulse_secs")]
    pub pulse_secs: u64,

    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_detection_interval")]
    pub interval_secs: u64,

    /// Detector command line; it must print `true` or `false`
    pub command: Vec<String>,
}

fn default_port() -> u16 {
    8883
}

fn default_client_id() -> String {
    "pi".to_string()
}

fn default_keep_alive() -> u64 {
    30
}

fn default_sound_path() -> PathBuf {
    PathBuf::from("./sound.wav")
}

fn default_player() -> String {
    "aplay".to_string()
}

fn default_repeat_times() -> u32 {
    3
}

fn default_interval_minutes() -> u32 {
    5
}

fn default_relay_pin() -> u32 {
    17
}

fn default_pulse_secs() -> u64 {
    5
}

fn default_gpio_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

fn default_detection_interval() -> u64 {
    1
}

impl ClientConfig {
    /// Load `path` (TOML) and apply `ALARM__SECTION__KEY` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?
            .try_deserialize()
            .context("Invalid client configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(detection) = &self.detection {
            ensure!(
                detection.interval_secs > 0,
                "detection.interval_secs must be greater than zero"
            );
            ensure!(
                !detection.command.is_empty(),
                "detection.command must name a program"
            );
        }
        Ok(())
    }
}
