//! Alarm controller
//!
//! Owns the "alarm is sounding" mirror of one siren. Starting an alarm writes
//! `alarmDuration`/`alarmVolume` first and only then sends `startWarning`,
//! because the device samples those attributes when the command arrives.
//! The device never reports the end of an alarm, so a reset timer flips the
//! `alarmToggle` capability back once the configured duration has elapsed.

use crate::error::SirenError;
use crate::event::SirenEvent;
use crate::host::{CapabilityStore, ClusterClient, ALARM_TOGGLE};
use crate::mode::AlarmMode;
use iaswd_cluster::{Attribute, AttributeWrite, Command};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Alarm duration used when none is configured
pub const DEFAULT_DURATION_SECS: u16 = 60;

/// Alarm volume used when none is configured
pub const DEFAULT_VOLUME: u8 = 100;

/// Largest accepted volume
pub const MAX_VOLUME: u8 = 100;

/// Resolved parameters of one alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmParameters {
    /// Seconds, always at least 1
    pub duration: u16,
    /// Percent, 0-100
    pub volume: u8,
    pub mode: AlarmMode,
}

impl Default for AlarmParameters {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION_SECS,
            volume: DEFAULT_VOLUME,
            mode: AlarmMode::default(),
        }
    }
}

impl AlarmParameters {
    /// Build parameters from loosely typed inputs.
    ///
    /// A missing or zero duration falls back to the default, anything else is
    /// clamped into `1..=u16::MAX`. A missing volume falls back to the default,
    /// anything else is clamped into `0..=100`.
    #[must_use]
    pub fn resolve(mode: Option<AlarmMode>, duration: Option<i64>, volume: Option<i64>) -> Self {
        Self {
            duration: clamp_duration(duration),
            volume: volume.map_or(DEFAULT_VOLUME, clamp_volume),
            mode: mode.unwrap_or_default(),
        }
    }

    /// Reset timer length
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration))
    }
}

/// Clamp a duration in seconds; `None` and zero mean "use the default"
#[must_use]
pub fn clamp_duration(duration: Option<i64>) -> u16 {
    match duration {
        None | Some(0) => DEFAULT_DURATION_SECS,
        Some(secs) => u16::try_from(secs.max(1)).unwrap_or(u16::MAX),
    }
}

/// Clamp a volume percentage into `0..=100`
#[must_use]
pub fn clamp_volume(volume: i64) -> u8 {
    u8::try_from(volume.clamp(0, i64::from(MAX_VOLUME))).unwrap_or(MAX_VOLUME)
}

/// A running alarm as seen from the UI
struct AlarmSession {
    id: u64,
    armed_at: Instant,
    expires_after: Duration,
    timer: JoinHandle<()>,
}

impl AlarmSession {
    fn cancel(self) {
        self.timer.abort();
        tracing::debug!(
            "Cancelled alarm session {} after {:?}",
            self.id,
            self.armed_at.elapsed()
        );
    }

    fn remaining(&self) -> Duration {
        self.expires_after.saturating_sub(self.armed_at.elapsed())
    }
}

/// State shared with the reset timer task
struct Shared {
    device_id: String,
    capabilities: Arc<dyn CapabilityStore>,
    /// At most one live session (and therefore one live timer)
    session: Mutex<Option<AlarmSession>>,
    event_tx: broadcast::Sender<SirenEvent>,
}

impl Shared {
    /// Mirror the alarm state into the capability. Failures only get logged.
    async fn set_toggle(&self, value: bool) {
        if let Err(e) = self.capabilities.set_capability(ALARM_TOGGLE, value).await {
            tracing::warn!("Failed to set {} on {}: {}", ALARM_TOGGLE, self.device_id, e);
        }
    }

    /// Timer expiry: repair the local mirror, leave the device alone
    async fn reset_ui(&self, session_id: u64) {
        let mut session = self.session.lock().await;
        if session.as_ref().map(|s| s.id) != Some(session_id) {
            // Superseded or stopped while waiting for the lock
            return;
        }
        *session = None;
        self.set_toggle(false).await;
        drop(session);

        tracing::info!("Alarm on {} expired", self.device_id);
        let _ = self.event_tx.send(SirenEvent::AlarmExpired {
            device_id: self.device_id.clone(),
        });
    }
}

/// Alarm state machine of one siren (`Idle` / `Sounding`)
pub struct AlarmController {
    cluster: Arc<dyn ClusterClient>,
    shared: Arc<Shared>,
    /// Serializes starts so write-then-command pairs never interleave
    sequence: Mutex<()>,
    /// Bumped by every stop; a start that sees it move gives up
    stop_epoch: AtomicU64,
    next_session: AtomicU64,
}

impl AlarmController {
    /// Create a controller for one device instance
    pub fn new(
        device_id: impl Into<String>,
        cluster: Arc<dyn ClusterClient>,
        capabilities: Arc<dyn CapabilityStore>,
        event_tx: broadcast::Sender<SirenEvent>,
    ) -> Self {
        Self {
            cluster,
            shared: Arc::new(Shared {
                device_id: device_id.into(),
                capabilities,
                session: Mutex::new(None),
                event_tx,
            }),
            sequence: Mutex::new(()),
            stop_epoch: AtomicU64::new(0),
            next_session: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.shared.device_id
    }

    /// Start an alarm.
    ///
    /// On failure nothing local changes: a running session keeps its timer and
    /// an idle controller stays idle. A stop issued while the start is still
    /// in flight wins; the start then returns [`SirenError::Cancelled`].
    pub async fn start(&self, params: AlarmParameters) -> Result<(), SirenError> {
        let epoch = self.stop_epoch.load(Ordering::SeqCst);
        let _sequence = self.sequence.lock().await;
        let device_id = self.device_id();

        tracing::info!(
            "Starting alarm on {}: mode={} duration={}s volume={}",
            device_id,
            params.mode,
            params.duration,
            params.volume
        );

        let writes = [
            AttributeWrite::new(Attribute::AlarmDuration, params.duration)?,
            AttributeWrite::new(Attribute::AlarmVolume, u16::from(params.volume))?,
        ];
        if let Err(e) = self.cluster.write_attributes(&writes).await {
            tracing::error!("Failed to write alarm attributes on {}: {}", device_id, e);
            return Err(e.into());
        }

        if self.stopped_since(epoch) {
            tracing::info!("Alarm start on {} abandoned: stopped before startWarning", device_id);
            return Err(SirenError::Cancelled(device_id.to_string()));
        }

        let command = Command::StartWarning {
            warning_info: params.mode.warning_info(),
            warning_duration: params.duration,
        };
        if let Err(e) = self.cluster.invoke_command(command).await {
            tracing::error!("Failed to send startWarning to {}: {}", device_id, e);
            return Err(e.into());
        }

        if !self.arm(params.timeout(), epoch).await {
            // The all-off may have reached the device before our startWarning
            tracing::warn!("Alarm start on {} raced a stop, re-sending all-off", device_id);
            if let Err(e) = self.cluster.invoke_command(Command::STOP).await {
                tracing::error!("Failed to send all-off startWarning to {}: {}", device_id, e);
            }
            return Err(SirenError::Cancelled(device_id.to_string()));
        }

        let _ = self.shared.event_tx.send(SirenEvent::AlarmStarted {
            device_id: device_id.to_string(),
            mode: params.mode,
            duration_secs: params.duration,
        });
        Ok(())
    }

    fn stopped_since(&self, epoch: u64) -> bool {
        self.stop_epoch.load(Ordering::SeqCst) != epoch
    }

    /// Replace any running session with a fresh one expiring after `timeout`.
    ///
    /// Returns false without touching anything if a stop arrived after `epoch`.
    /// The check happens under the session lock, which stop also takes.
    async fn arm(&self, timeout: Duration, epoch: u64) -> bool {
        let mut session = self.shared.session.lock().await;
        if self.stopped_since(epoch) {
            return false;
        }
        if let Some(previous) = session.take() {
            previous.cancel();
        }

        self.shared.set_toggle(true).await;

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            shared.reset_ui(id).await;
        });

        tracing::debug!(
            "Armed alarm session {} on {} for {:?}",
            id,
            self.shared.device_id,
            timeout
        );
        *session = Some(AlarmSession {
            id,
            armed_at: Instant::now(),
            expires_after: timeout,
            timer,
        });
        true
    }

    /// Stop the alarm.
    ///
    /// The session is torn down and `alarmToggle` cleared before the all-off
    /// command goes out, so neither a rejected command nor a start stuck on
    /// the transport can leave the toggle on. Stop never waits for a pending
    /// start; that start gives up instead. The command error is still returned.
    pub async fn stop(&self) -> Result<(), SirenError> {
        self.stop_epoch.fetch_add(1, Ordering::SeqCst);
        let device_id = self.device_id();
        tracing::info!("Stopping alarm on {}", device_id);

        let mut session = self.shared.session.lock().await;
        if let Some(previous) = session.take() {
            previous.cancel();
        }
        self.shared.set_toggle(false).await;
        drop(session);

        let result = self.cluster.invoke_command(Command::STOP).await;
        if let Err(e) = &result {
            tracing::error!("Failed to send all-off startWarning to {}: {}", device_id, e);
        }

        let _ = self.shared.event_tx.send(SirenEvent::AlarmStopped {
            device_id: device_id.to_string(),
        });
        result.map_err(Into::into)
    }

    /// Write `alarmVolume` only; running alarms and the toggle are untouched
    pub async fn set_volume(&self, volume: i64) -> Result<(), SirenError> {
        let volume = clamp_volume(volume);
        tracing::info!("Setting alarm volume on {} to {}", self.device_id(), volume);
        self.write_attribute(AttributeWrite::new(
            Attribute::AlarmVolume,
            u16::from(volume),
        )?)
        .await
    }

    /// Single-attribute pass-through write
    pub async fn write_attribute(&self, write: AttributeWrite) -> Result<(), SirenError> {
        self.cluster.write_attributes(&[write]).await.map_err(|e| {
            tracing::error!(
                "Failed to write {}={} on {}: {}",
                write.attribute,
                write.value,
                self.device_id(),
                e
            );
            SirenError::from(e)
        })
    }

    /// Whether an alarm session is active
    pub async fn is_sounding(&self) -> bool {
        self.shared.session.lock().await.is_some()
    }

    /// Time left until the running session expires
    pub async fn remaining(&self) -> Option<Duration> {
        self.shared
            .session
            .lock()
            .await
            .as_ref()
            .map(AlarmSession::remaining)
    }
}

impl Drop for AlarmController {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.shared.session.try_lock() {
            if let Some(session) = guard.take() {
                session.timer.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Call, RecordingCapabilities, RecordingCluster};
    use tokio::time::sleep;

    struct Harness {
        cluster: Arc<RecordingCluster>,
        capabilities: Arc<RecordingCapabilities>,
        events: broadcast::Receiver<SirenEvent>,
        alarm: AlarmController,
    }

    fn harness() -> Harness {
        let cluster = Arc::new(RecordingCluster::new());
        let capabilities = Arc::new(RecordingCapabilities::new());
        let (event_tx, events) = broadcast::channel(16);
        let alarm = AlarmController::new(
            "siren",
            cluster.clone(),
            capabilities.clone(),
            event_tx,
        );
        Harness {
            cluster,
            capabilities,
            events,
            alarm,
        }
    }

    fn sound(duration: u16, volume: u8) -> AlarmParameters {
        AlarmParameters {
            duration,
            volume,
            mode: AlarmMode::Sound,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_writes_before_command_and_expires() {
        let mut h = harness();
        h.alarm.start(sound(10, 50)).await.unwrap();

        assert_eq!(
            h.cluster.calls(),
            vec![
                Call::Write(vec![(Attribute::AlarmDuration, 10), (Attribute::AlarmVolume, 50)]),
                Call::start_warning(0x11, 10),
            ]
        );
        assert_eq!(h.capabilities.toggle(), Some(true));
        assert!(h.alarm.is_sounding().await);

        sleep(Duration::from_secs(9)).await;
        assert_eq!(h.capabilities.toggle(), Some(true));

        sleep(Duration::from_secs(2)).await;
        assert_eq!(h.capabilities.toggle(), Some(false));
        assert!(!h.alarm.is_sounding().await);

        // Expiry never talks to the device
        assert_eq!(h.cluster.calls().len(), 2);

        assert!(matches!(
            h.events.try_recv(),
            Ok(SirenEvent::AlarmStarted { duration_secs: 10, .. })
        ));
        assert!(matches!(
            h.events.try_recv(),
            Ok(SirenEvent::AlarmExpired { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_with_defaults() {
        let h = harness();
        h.alarm.start(AlarmParameters::default()).await.unwrap();

        assert_eq!(
            h.cluster.calls(),
            vec![
                Call::Write(vec![(Attribute::AlarmDuration, 60), (Attribute::AlarmVolume, 100)]),
                Call::start_warning(0x31, 60),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_timer() {
        let h = harness();
        h.alarm.start(sound(10, 50)).await.unwrap();

        sleep(Duration::from_secs(5)).await;
        h.alarm.start(sound(10, 50)).await.unwrap();

        // Past the first session's deadline
        sleep(Duration::from_secs(6)).await;
        assert_eq!(h.capabilities.toggle(), Some(true));
        assert!(h.alarm.is_sounding().await);

        // Past the second session's deadline
        sleep(Duration::from_secs(5)).await;
        assert_eq!(h.capabilities.toggle(), Some(false));
        assert_eq!(h.capabilities.history(), vec![true, true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_sends_all_off_and_cancels_timer() {
        let mut h = harness();
        h.alarm.start(sound(10, 50)).await.unwrap();
        h.cluster.clear();

        h.alarm.stop().await.unwrap();
        assert_eq!(h.cluster.calls(), vec![Call::start_warning(0x00, 0)]);
        assert_eq!(h.capabilities.toggle(), Some(false));
        assert!(!h.alarm.is_sounding().await);

        sleep(Duration::from_secs(20)).await;
        assert_eq!(h.capabilities.history(), vec![true, false]);

        let _started = h.events.try_recv();
        assert!(matches!(
            h.events.try_recv(),
            Ok(SirenEvent::AlarmStopped { .. })
        ));
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_toggle_when_transport_fails() {
        let h = harness();
        h.alarm.start(sound(30, 100)).await.unwrap();
        h.cluster.fail_commands(true);

        let result = h.alarm.stop().await;
        assert!(matches!(result, Err(SirenError::Transport(_))));
        assert_eq!(h.capabilities.toggle(), Some(false));
        assert!(!h.alarm.is_sounding().await);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(h.capabilities.history(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_skips_command() {
        let h = harness();
        h.cluster.fail_writes(true);

        let result = h.alarm.start(sound(10, 50)).await;
        assert!(matches!(result, Err(SirenError::Transport(_))));
        assert_eq!(h.cluster.calls().len(), 1);
        assert_eq!(h.capabilities.toggle(), None);
        assert!(!h.alarm.is_sounding().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_restart_keeps_running_session() {
        let h = harness();
        h.alarm.start(sound(10, 50)).await.unwrap();

        sleep(Duration::from_secs(5)).await;
        h.cluster.fail_commands(true);
        assert!(h.alarm.start(sound(30, 50)).await.is_err());
        assert!(h.alarm.is_sounding().await);

        // Original deadline still applies
        sleep(Duration::from_secs(6)).await;
        assert_eq!(h.capabilities.toggle(), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_pending_start_cancels_it() {
        let h = harness();
        h.cluster.delay_writes(Duration::from_millis(100));

        let stop_later = async {
            sleep(Duration::from_millis(10)).await;
            h.alarm.stop().await
        };
        let (started, stopped) = tokio::join!(h.alarm.start(sound(10, 50)), stop_later);
        assert!(matches!(started, Err(SirenError::Cancelled(_))));
        stopped.unwrap();

        assert_eq!(
            h.cluster.calls(),
            vec![
                Call::Write(vec![(Attribute::AlarmDuration, 10), (Attribute::AlarmVolume, 50)]),
                Call::start_warning(0x00, 0),
            ]
        );
        assert_eq!(h.capabilities.toggle(), Some(false));
        assert!(!h.alarm.is_sounding().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_not_blocked_by_hung_start() {
        let h = harness();
        h.alarm.start(sound(600, 100)).await.unwrap();
        h.cluster.clear();
        h.cluster.delay_writes(Duration::from_secs(3600));

        let stop_soon = async {
            sleep(Duration::from_secs(1)).await;
            let stopped = tokio::time::timeout(Duration::from_secs(30), h.alarm.stop()).await;
            (stopped, h.capabilities.toggle(), h.cluster.calls())
        };
        let (restarted, (stopped, toggle, calls)) =
            tokio::join!(h.alarm.start(sound(600, 100)), stop_soon);

        assert!(matches!(stopped, Ok(Ok(()))));
        assert_eq!(toggle, Some(false));
        assert_eq!(calls.last(), Some(&Call::start_warning(0x00, 0)));

        // Once the hung write returns, the start gives up without re-arming
        assert!(matches!(restarted, Err(SirenError::Cancelled(_))));
        assert_eq!(h.cluster.calls().len(), 2);
        assert!(!h.alarm.is_sounding().await);
        assert_eq!(h.capabilities.history(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_are_serialized() {
        let h = harness();
        h.cluster.delay_writes(Duration::from_millis(100));

        let (first, second) = tokio::join!(h.alarm.start(sound(10, 50)), h.alarm.start(sound(20, 60)));
        first.unwrap();
        second.unwrap();

        assert_eq!(
            h.cluster.calls(),
            vec![
                Call::Write(vec![(Attribute::AlarmDuration, 10), (Attribute::AlarmVolume, 50)]),
                Call::start_warning(0x11, 10),
                Call::Write(vec![(Attribute::AlarmDuration, 20), (Attribute::AlarmVolume, 60)]),
                Call::start_warning(0x11, 20),
            ]
        );
        assert_eq!(h.alarm.remaining().await, Some(Duration::from_secs(20)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let h = harness();
        assert_eq!(h.alarm.remaining().await, None);

        h.alarm.start(sound(10, 50)).await.unwrap();
        sleep(Duration::from_secs(4)).await;
        assert_eq!(h.alarm.remaining().await, Some(Duration::from_secs(6)));
    }

    #[tokio::test]
    async fn test_set_volume_is_clamped_single_write() {
        let h = harness();
        h.alarm.set_volume(150).await.unwrap();
        h.alarm.set_volume(-4).await.unwrap();

        assert_eq!(
            h.cluster.calls(),
            vec![
                Call::Write(vec![(Attribute::AlarmVolume, 100)]),
                Call::Write(vec![(Attribute::AlarmVolume, 0)]),
            ]
        );
        assert_eq!(h.capabilities.toggle(), None);
    }

    #[tokio::test]
    async fn test_set_volume_propagates_failure() {
        let h = harness();
        h.cluster.fail_writes(true);
        assert!(matches!(
            h.alarm.set_volume(40).await,
            Err(SirenError::Transport(_))
        ));
    }

    #[test]
    fn test_resolve_parameters() {
        assert_eq!(
            AlarmParameters::resolve(None, None, None),
            AlarmParameters::default()
        );

        let params = AlarmParameters::resolve(Some(AlarmMode::Strobe), Some(0), Some(0));
        assert_eq!(params.duration, 60);
        assert_eq!(params.volume, 0);
        assert_eq!(params.mode, AlarmMode::Strobe);

        let params = AlarmParameters::resolve(None, Some(-5), Some(101));
        assert_eq!(params.duration, 1);
        assert_eq!(params.volume, 100);

        let params = AlarmParameters::resolve(None, Some(100_000), Some(-1));
        assert_eq!(params.duration, u16::MAX);
        assert_eq!(params.volume, 0);
    }
}
