//! GPIO relay driving the water spray.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::RelayConfig;

#[async_trait]
pub trait Relay: Send + Sync {
    async fn set(&self, on: bool) -> Result<()>;
}

/// Relay on a BCM pin, driven through the sysfs GPIO interface.
pub struct SysfsRelay {
    root: PathBuf,
    pin: u32,
}

impl SysfsRelay {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            root: config.gpio_root.clone(),
            pin: config.pin,
        }
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    /// Export the pin and make it an output.
    async fn ensure_output(&self) -> Result<()> {
        if !tokio::fs::try_exists(self.pin_dir()).await.unwrap_or(false) {
            tokio::fs::write(self.root.join("export"), self.pin.to_string())
                .await
                .with_context(|| format!("Failed to export GPIO {}", self.pin))?;
        }

        tokio::fs::write(self.pin_dir().join("direction"), "out")
            .await
            .with_context(|| format!("Failed to set GPIO {} as output", self.pin))
    }
}

#[async_trait]
impl Relay for SysfsRelay {
    async fn set(&self, on: bool) -> Result<()> {
        self.ensure_output().await?;
        tokio::fs::write(self.pin_dir().join("value"), if on { "1" } else { "0" })
            .await
            .with_context(|| format!("Failed to write GPIO {}", self.pin))?;

        tracing::debug!(pin = self.pin, on, "Relay switched");
        Ok(())
    }
}

/// Switch the relay on for `duration`, then off again. The off write is
/// attempted even when switching on failed.
pub async fn pulse(relay: &dyn Relay, duration: Duration) -> Result<()> {
    tracing::info!("Relay ON for {:?}", duration);
    let switched_on = relay.set(true).await;
    if switched_on.is_ok() {
        tokio::time::sleep(duration).await;
    }

    tracing::info!("Relay OFF");
    let switched_off = relay.set(false).await;
    switched_on.and(switched_off)
}
