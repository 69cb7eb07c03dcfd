//! Events broadcast by the siren controllers

use crate::mode::AlarmMode;

/// Siren events, consumed by the host's trigger registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SirenEvent {
    /// Start sequence completed and the reset timer is armed
    AlarmStarted {
        device_id: String,
        mode: AlarmMode,
        duration_secs: u16,
    },
    /// Explicit stop was issued
    AlarmStopped { device_id: String },
    /// Reset timer fired; the device is expected to be silent again
    AlarmExpired { device_id: String },
    /// Doorbell chime was triggered
    DoorbellRung { device_id: String },
}
