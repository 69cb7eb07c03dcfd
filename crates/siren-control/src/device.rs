//! Siren device glue
//!
//! Binds one accessory's controllers to the host: the `alarmToggle`
//! capability listener, the flow actions and live settings changes.

use crate::alarm::{AlarmController, AlarmParameters};
use crate::doorbell::DoorbellController;
use crate::error::SirenError;
use crate::event::SirenEvent;
use crate::host::{CapabilityStore, ClusterClient, ALARM_TOGGLE};
use crate::mode::AlarmMode;
use crate::settings::{apply_settings_change, SettingsPatch, SirenSettings};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Flow actions exposed to the automation layer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FlowAction {
    /// Start an alarm; missing arguments fall back to settings, then defaults
    StartAlarm {
        #[serde(default)]
        mode: Option<AlarmMode>,
        #[serde(default)]
        duration: Option<i64>,
        #[serde(default)]
        volume: Option<i64>,
    },
    StopAlarm,
    SetVolume { volume: i64 },
    TriggerDoorbell,
}

/// One siren accessory instance
pub struct SirenDevice {
    id: String,
    alarm: AlarmController,
    doorbell: DoorbellController,
    capabilities: Arc<dyn CapabilityStore>,
    settings: RwLock<SirenSettings>,
    event_tx: broadcast::Sender<SirenEvent>,
}

impl SirenDevice {
    /// Create a device; it owns its own alarm session and timer
    pub fn new(
        id: impl Into<String>,
        cluster: Arc<dyn ClusterClient>,
        capabilities: Arc<dyn CapabilityStore>,
        settings: SirenSettings,
    ) -> Self {
        let id = id.into();
        let (event_tx, _) = broadcast::channel(64);
        Self {
            alarm: AlarmController::new(
                id.clone(),
                Arc::clone(&cluster),
                Arc::clone(&capabilities),
                event_tx.clone(),
            ),
            doorbell: DoorbellController::new(id.clone(), cluster, event_tx.clone()),
            capabilities,
            settings: RwLock::new(settings),
            event_tx,
            id,
        }
    }

    /// Initialise the device. A first init clears the alarm toggle.
    pub async fn init(&self, first_init: bool) -> Result<(), SirenError> {
        tracing::info!("Siren {} initialised (first init: {})", self.id, first_init);
        if first_init {
            self.capabilities.set_capability(ALARM_TOGGLE, false).await?;
        }
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn alarm(&self) -> &AlarmController {
        &self.alarm
    }

    /// Subscribe to alarm and doorbell events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SirenEvent> {
        self.event_tx.subscribe()
    }

    /// Current value of the alarm toggle capability
    pub async fn alarm_toggle(&self) -> bool {
        self.capabilities
            .capability(ALARM_TOGGLE)
            .await
            .unwrap_or(false)
    }

    pub async fn settings(&self) -> SirenSettings {
        self.settings.read().await.clone()
    }

    /// Capability listener for `alarmToggle`
    pub async fn on_alarm_toggle(&self, value: bool) -> Result<(), SirenError> {
        tracing::info!("Alarm toggle on {}: {}", self.id, if value { "ON" } else { "OFF" });
        if value {
            let params = self.settings.read().await.alarm_parameters();
            self.alarm.start(params).await
        } else {
            self.alarm.stop().await
        }
    }

    /// Run a flow action
    pub async fn run_action(&self, action: FlowAction) -> Result<(), SirenError> {
        tracing::debug!("Running flow action on {}: {:?}", self.id, action);
        match action {
            FlowAction::StartAlarm {
                mode,
                duration,
                volume,
            } => {
                let params = self.explicit_parameters(mode, duration, volume).await;
                self.alarm.start(params).await
            }
            FlowAction::StopAlarm => self.alarm.stop().await,
            FlowAction::SetVolume { volume } => self.alarm.set_volume(volume).await,
            FlowAction::TriggerDoorbell => self.doorbell.trigger().await,
        }
    }

    /// Explicit arguments win over stored settings
    async fn explicit_parameters(
        &self,
        mode: Option<AlarmMode>,
        duration: Option<i64>,
        volume: Option<i64>,
    ) -> AlarmParameters {
        let stored = self.settings.read().await.alarm_parameters();
        AlarmParameters {
            mode: mode.unwrap_or_default(),
            duration: match duration {
                Some(secs) => AlarmParameters::resolve(None, Some(secs), None).duration,
                None => stored.duration,
            },
            volume: match volume {
                Some(v) => AlarmParameters::resolve(None, None, Some(v)).volume,
                None => stored.volume,
            },
        }
    }

    /// Merge a settings update, push changed values to the device and return
    /// the resulting settings for the host to persist.
    ///
    /// The write lock is held until the device writes finish, so overlapping
    /// updates reach the device in the same order they are stored.
    pub async fn on_settings(&self, patch: &SettingsPatch) -> SirenSettings {
        let mut settings = self.settings.write().await;
        let new = settings.merged(patch);
        let changed = settings.changed_keys(&new);
        *settings = new.clone();

        if changed.is_empty() {
            tracing::debug!("Settings update on {} changed nothing", self.id);
            return new;
        }

        let keys: Vec<&str> = changed.iter().map(|k| k.name()).collect();
        tracing::info!("Settings changed on {}: {:?}", self.id, keys);
        apply_settings_change(&self.alarm, &new, &changed).await;
        drop(settings);
        new
    }
}
