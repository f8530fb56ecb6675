//! Alarm playback.
//!
//! One alarm plays at a time. A newer alarm cancels the one in progress, and
//! receiving messages never waits on playback.

use alarm_shared::AlarmMessage;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::AlarmConfig;
use crate::hardware::{pulse, Relay};

#[async_trait]
pub trait SoundOutput: Send + Sync {
    /// Play the alarm sound once, returning when it has finished.
    async fn play(&self) -> Result<()>;
}

/// Plays a sound file through an external player such as `aplay`.
pub struct CommandSound {
    player: String,
    sound_path: PathBuf,
}

impl CommandSound {
    pub fn new(config: &AlarmConfig) -> Self {
        Self {
            player: config.player.clone(),
            sound_path: config.sound_path.clone(),
        }
    }
}

#[async_trait]
impl SoundOutput for CommandSound {
    async fn play(&self) -> Result<()> {
        let status = Command::new(&self.player)
            .arg(&self.sound_path)
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("Failed to start {}", self.player))?;

        if !status.success() {
            bail!("{} exited with {}", self.player, status);
        }
        Ok(())
    }
}

/// Spray relay and how long to hold it on.
#[derive(Clone)]
pub struct Spray {
    pub relay: Arc<dyn Relay>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmPlan {
    pub repeat_times: u32,
    pub interval: Duration,
    pub spray: bool,
}

impl AlarmPlan {
    /// Message settings, falling back to the device defaults.
    pub fn for_message(message: &AlarmMessage, defaults: &AlarmConfig) -> Self {
        let minutes = message.alarm_interval.unwrap_or(defaults.interval_minutes);
        Self {
            repeat_times: message.alarm_repeat_times.unwrap_or(defaults.repeat_times),
            interval: Duration::from_secs(u64::from(minutes) * 60),
            spray: message.spray_flag,
        }
    }
}

pub struct AlarmRunner {
    sound: Arc<dyn SoundOutput>,
    spray: Option<Spray>,
    defaults: AlarmConfig,
    current: Option<JoinHandle<()>>,
    // Owns the relay; outlives the alarm it was started for
    relay_task: Option<JoinHandle<()>>,
}

impl AlarmRunner {
    pub fn new(sound: Arc<dyn SoundOutput>, spray: Option<Spray>, defaults: AlarmConfig) -> Self {
        Self {
            sound,
            spray,
            defaults,
            current: None,
            relay_task: None,
        }
    }

    /// Start playing `message`, cancelling any alarm still in progress.
    pub fn trigger(&mut self, message: &AlarmMessage) {
        if let Some(previous) = self.current.take() {
            if !previous.is_finished() {
                tracing::info!("New alarm received, cancelling the one in progress");
            }
            previous.abort();
        }

        let plan = AlarmPlan::for_message(message, &self.defaults);
        tracing::info!(
            user_id = %message.user_id,
            event_id = %message.event_id,
            repeat_times = plan.repeat_times,
            interval = ?plan.interval,
            spray = plan.spray,
            user_prompt = %message.user_prompt,
            "Alarm started"
        );

        let sound = self.sound.clone();
        let sprayed = self.hand_over_relay(plan.spray);
        self.current = Some(tokio::spawn(play_alarm(sound, sprayed, plan)));
    }

    /// Give the relay to the newest alarm.
    ///
    /// A pulse still running for an older alarm is cancelled first. The new
    /// alarm then either starts its own pulse or switches the relay off.
    /// Returns a receiver that resolves once the new pulse is over.
    fn hand_over_relay(&mut self, spray_now: bool) -> Option<oneshot::Receiver<()>> {
        let spray = self.spray.clone()?;
        let previous = self.relay_task.take().filter(|task| !task.is_finished());
        if !spray_now && previous.is_none() {
            return None;
        }

        let (done_tx, done_rx) = oneshot::channel();
        self.relay_task = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                previous.abort();
                let _ = previous.await;
            }

            let result = if spray_now {
                pulse(spray.relay.as_ref(), spray.duration).await
            } else {
                spray.relay.set(false).await
            };
            if let Err(e) = result {
                tracing::error!("Relay update failed: {:?}", e);
            }
            let _ = done_tx.send(());
        }));

        spray_now.then_some(done_rx)
    }

    pub async fn run(mut self, mut alarms: mpsc::Receiver<AlarmMessage>) {
        while let Some(message) = alarms.recv().await {
            self.trigger(&message);
        }
        self.shutdown().await;
    }

    /// Cancel playback and make sure the relay is off.
    pub async fn shutdown(&mut self) {
        if let Some(current) = self.current.take() {
            current.abort();
        }
        if let Some(relay_task) = self.relay_task.take() {
            relay_task.abort();
            let _ = relay_task.await;
        }
        if let Some(spray) = &self.spray {
            if let Err(e) = spray.relay.set(false).await {
                tracing::error!("Failed to switch relay off: {:?}", e);
            }
        }
    }
}

async fn play_alarm(
    sound: Arc<dyn SoundOutput>,
    sprayed: Option<oneshot::Receiver<()>>,
    plan: AlarmPlan,
) {
    if let Some(sprayed) = sprayed {
        if sprayed.await.is_err() {
            tracing::warn!("Spray pulse was cancelled");
        }
    }

    for round in 1..=plan.repeat_times {
        tracing::info!("Playing alarm sound ({}/{})", round, plan.repeat_times);
        if let Err(e) = sound.play().await {
            tracing::error!("Alarm sound failed: {:?}", e);
        }
        tokio::time::sleep(plan.interval).await;
    }

    tracing::info!("Alarm sound finished playing.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::{self, Instant};

    #[derive(Default)]
    struct CountingSound {
        plays: AtomicUsize,
    }

    #[async_trait]
    impl SoundOutput for CountingSound {
        async fn play(&self) -> Result<()> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            time::sleep(Duration::from_secs(2)).await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingRelay {
        states: Mutex<Vec<(bool, Instant)>>,
    }

    #[async_trait]
    impl Relay for RecordingRelay {
        async fn set(&self, on: bool) -> Result<()> {
            self.states.lock().unwrap().push((on, Instant::now()));
            Ok(())
        }
    }

    fn message(repeat_times: Option<u32>, interval: Option<u32>, spray_flag: bool) -> AlarmMessage {
        AlarmMessage {
            user_id: "user-1".to_string(),
            event_id: "evt-1".to_string(),
            spray_flag,
            user_prompt: String::new(),
            receivers: Vec::new(),
            alarm_repeat_times: repeat_times,
            alarm_interval: interval,
        }
    }

    fn runner(sound: Arc<CountingSound>, relay: Option<Arc<RecordingRelay>>) -> AlarmRunner {
        let spray = relay.map(|relay| Spray {
            relay,
            duration: Duration::from_secs(5),
        });
        AlarmRunner::new(sound, spray, AlarmConfig::default())
    }

    #[test]
    fn test_plan_falls_back_to_defaults() {
        let defaults = AlarmConfig::default();

        let plan = AlarmPlan::for_message(&message(None, None, false), &defaults);
        assert_eq!(plan.repeat_times, 3);
        assert_eq!(plan.interval, Duration::from_secs(5 * 60));

        let plan = AlarmPlan::for_message(&message(Some(1), Some(2), true), &defaults);
        assert_eq!(plan.repeat_times, 1);
        assert_eq!(plan.interval, Duration::from_secs(120));
        assert!(plan.spray);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_repeat_times() {
        let sound = Arc::new(CountingSound::default());
        let mut runner = runner(sound.clone(), None);

        runner.trigger(&message(Some(3), Some(1), false));
        time::sleep(Duration::from_secs(30 * 60)).await;

        assert_eq!(sound.plays.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_alarm_preempts_older() {
        let sound = Arc::new(CountingSound::default());
        let mut runner = runner(sound.clone(), None);

        runner.trigger(&message(Some(5), Some(1), false));
        // First alarm plays at 0s and 62s
        time::sleep(Duration::from_secs(90)).await;
        assert_eq!(sound.plays.load(Ordering::SeqCst), 2);

        runner.trigger(&message(Some(1), Some(1), false));
        time::sleep(Duration::from_secs(30 * 60)).await;

        assert_eq!(sound.plays.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spray_pulses_before_playing() {
        let sound = Arc::new(CountingSound::default());
        let relay = Arc::new(RecordingRelay::default());
        let mut runner = runner(sound.clone(), Some(relay.clone()));
        let start = Instant::now();

        runner.trigger(&message(Some(1), Some(1), true));
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sound.plays.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(sound.plays.load(Ordering::SeqCst), 1);

        let states = relay.states.lock().unwrap().clone();
        assert_eq!(states.len(), 2);
        assert!(states[0].0);
        assert!(!states[1].0);
        assert_eq!(states[1].1 - start, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_spray_still_switches_off() {
        let sound = Arc::new(CountingSound::default());
        let relay = Arc::new(RecordingRelay::default());
        let mut runner = runner(sound.clone(), Some(relay.clone()));

        runner.trigger(&message(Some(1), Some(1), true));
        time::sleep(Duration::from_secs(1)).await;
        runner.trigger(&message(Some(1), Some(1), false));
        time::sleep(Duration::from_secs(10)).await;

        let states: Vec<bool> = relay.states.lock().unwrap().iter().map(|s| s.0).collect();
        assert_eq!(states, vec![true, false]);
        // Only the second alarm gets to play
        assert_eq!(sound.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preempting_spray_keeps_relay_on_for_full_pulse() {
        let sound = Arc::new(CountingSound::default());
        let relay = Arc::new(RecordingRelay::default());
        let mut runner = runner(sound.clone(), Some(relay.clone()));
        let start = Instant::now();

        runner.trigger(&message(Some(1), Some(1), true));
        time::sleep(Duration::from_secs(1)).await;
        runner.trigger(&message(Some(1), Some(1), true));
        time::sleep(Duration::from_secs(4)).await;
        // The first pulse would have ended here
        assert_eq!(sound.plays.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(10)).await;

        let states: Vec<(bool, Duration)> = relay
            .states
            .lock()
            .unwrap()
            .iter()
            .map(|(on, at)| (*on, *at - start))
            .collect();
        assert_eq!(
            states,
            vec![
                (true, Duration::from_secs(0)),
                (true, Duration::from_secs(1)),
                (false, Duration::from_secs(6)),
            ]
        );
        assert_eq!(sound.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_running_pulse() {
        let sound = Arc::new(CountingSound::default());
        let relay = Arc::new(RecordingRelay::default());
        let mut runner = runner(sound.clone(), Some(relay.clone()));

        runner.trigger(&message(Some(1), Some(1), true));
        time::sleep(Duration::from_secs(1)).await;
        runner.shutdown().await;
        time::sleep(Duration::from_secs(10)).await;

        let states: Vec<bool> = relay.states.lock().unwrap().iter().map(|s| s.0).collect();
        assert_eq!(states, vec![true, false]);
        assert_eq!(sound.plays.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spray_skipped_when_flag_unset() {
        let sound = Arc::new(CountingSound::default());
        let relay = Arc::new(RecordingRelay::default());
        let mut runner = runner(sound.clone(), Some(relay.clone()));

        runner.trigger(&message(Some(1), Some(1), false));
        time::sleep(Duration::from_secs(10)).await;

        assert!(relay.states.lock().unwrap().is_empty());
        assert_eq!(sound.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_channel_closes() {
        let sound = Arc::new(CountingSound::default());
        let relay = Arc::new(RecordingRelay::default());
        let (tx, rx) = mpsc::channel(4);

        let handle = tokio::spawn(runner(sound.clone(), Some(relay.clone())).run(rx));
        tx.send(message(Some(2), Some(1), false)).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        // Shutdown leaves the relay off
        let states: Vec<bool> = relay.states.lock().unwrap().iter().map(|s| s.0).collect();
        assert_eq!(states, vec![false]);
    }
}
