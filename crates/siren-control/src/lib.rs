//! Alarm and doorbell control for IAS WD siren accessories
//!
//! Turns high-level intents (start/stop alarm, set volume, ring the doorbell)
//! into correctly ordered attribute writes and commands against the warning
//! device cluster, and keeps the `alarmToggle` capability in step with the
//! alarm the device is expected to be sounding.

pub mod alarm;
pub mod device;
pub mod doorbell;
pub mod error;
pub mod event;
pub mod host;
pub mod mode;
pub mod settings;

#[cfg(test)]
pub(crate) mod test_support;

pub use alarm::{AlarmController, AlarmParameters};
pub use device::{FlowAction, SirenDevice};
pub use doorbell::DoorbellController;
pub use error::{HostError, SirenError, TransportError};
pub use event::SirenEvent;
pub use host::{CapabilityStore, ClusterClient, ALARM_TOGGLE};
pub use mode::{map_mode, AlarmMode};
pub use settings::{SettingKey, SettingValue, SettingsPatch, SirenSettings};
