//! Person detection loop.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("detector command is empty")]
    EmptyCommand,

    #[error("failed to run detector: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("detector exited with {0}")]
    Failed(std::process::ExitStatus),

    #[error("unrecognised detector output '{0}'")]
    UnrecognisedOutput(String),
}

#[async_trait]
pub trait PresenceDetector: Send + Sync {
    /// Capture a frame and report whether a person is in it.
    async fn detect(&self) -> Result<bool, DetectError>;
}

/// Runs an external capture-and-classify program that prints `true` or
/// `false` on stdout.
pub struct CommandDetector {
    command: Vec<String>,
}

impl CommandDetector {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl PresenceDetector for CommandDetector {
    async fn detect(&self) -> Result<bool, DetectError> {
        let (program, args) = self.command.split_first().ok_or(DetectError::EmptyCommand)?;

        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(DetectError::Failed(output.status));
        }

        parse_verdict(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_verdict(stdout: &str) -> Result<bool, DetectError> {
    match stdout.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "person" => Ok(true),
        "false" | "0" | "none" => Ok(false),
        other => Err(DetectError::UnrecognisedOutput(other.to_string())),
    }
}

pub async fn run_detection(detector: Arc<dyn PresenceDetector>, interval: Duration) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    tracing::info!("Detection loop started (interval: {:?})", interval);

    loop {
        ticker.tick().await;

        match detector.detect().await {
            Ok(true) => tracing::info!("Person detected!"),
            Ok(false) => tracing::info!("No person."),
            // Continue detecting even on error
            Err(e) => tracing::error!("Detection error: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyDetector {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PresenceDetector for FlakyDetector {
        async fn detect(&self) -> Result<bool, DetectError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                Err(DetectError::UnrecognisedOutput("camera busy".to_string()))
            } else {
                Ok(true)
            }
        }
    }

    #[test]
    fn test_parse_verdict() {
        assert!(parse_verdict("true\n").unwrap());
        assert!(!parse_verdict(" 0 ").unwrap());
        assert!(matches!(
            parse_verdict("maybe"),
            Err(DetectError::UnrecognisedOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let detector = CommandDetector::new(Vec::new());
        assert!(matches!(
            detector.detect().await,
            Err(DetectError::EmptyCommand)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_keeps_running_after_errors() {
        let detector = Arc::new(FlakyDetector {
            calls: AtomicUsize::new(0),
        });

        let handle = tokio::spawn(run_detection(detector.clone(), Duration::from_secs(1)));
        time::sleep(Duration::from_millis(4500)).await;
        handle.abort();

        // Ticks at 0, 1, 2, 3 and 4 seconds
        assert_eq!(detector.calls.load(Ordering::SeqCst), 5);
    }
}
