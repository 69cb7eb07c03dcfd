//! Device settings and live application of settings changes

use crate::alarm::{clamp_duration, clamp_volume, AlarmController, AlarmParameters};
use crate::mode::AlarmMode;
use iaswd_cluster::{Attribute, AttributeWrite};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A setting value as entered by the user: a number or free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SettingValue {
    /// Parse as an integer. Text is trimmed, fractions are truncated.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            Self::Float(_) => None,
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .map(|v| v.trunc() as i64)
                })
            }
        }
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Settings keys recognized by the siren
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    AlarmDuration,
    AlarmVolume,
    BellVolume,
    DefaultAlarm,
}

impl SettingKey {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::AlarmDuration => "alarmDuration",
            Self::AlarmVolume => "alarmVolume",
            Self::BellVolume => "bellVolume",
            Self::DefaultAlarm => "defaultAlarm",
        }
    }

    /// Attribute a changed numeric setting is written to
    #[must_use]
    pub fn attribute(self) -> Option<Attribute> {
        match self {
            Self::AlarmDuration => Some(Attribute::AlarmDuration),
            Self::AlarmVolume => Some(Attribute::AlarmVolume),
            Self::BellVolume => Some(Attribute::DoorbellVolume),
            Self::DefaultAlarm => None,
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Persisted per-device settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SirenSettings {
    /// Alarm duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_duration: Option<SettingValue>,
    /// Alarm volume, 0-100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_volume: Option<SettingValue>,
    /// Doorbell volume, 0-100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bell_volume: Option<SettingValue>,
    /// Mode used when the alarm is started from the toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_alarm: Option<AlarmMode>,
}

/// A partial settings update.
///
/// An absent key keeps the stored value, an explicit `null` clears it so the
/// setting falls back to its default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, deserialize_with = "present")]
    pub alarm_duration: Option<Option<SettingValue>>,
    #[serde(default, deserialize_with = "present")]
    pub alarm_volume: Option<Option<SettingValue>>,
    #[serde(default, deserialize_with = "present")]
    pub bell_volume: Option<Option<SettingValue>>,
    #[serde(default, deserialize_with = "present")]
    pub default_alarm: Option<Option<AlarmMode>>,
}

/// Marks a key that was present in the input, even when its value is `null`
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl From<SirenSettings> for SettingsPatch {
    fn from(settings: SirenSettings) -> Self {
        Self {
            alarm_duration: settings.alarm_duration.map(Some),
            alarm_volume: settings.alarm_volume.map(Some),
            bell_volume: settings.bell_volume.map(Some),
            default_alarm: settings.default_alarm.map(Some),
        }
    }
}

impl SirenSettings {
    /// Parameters for an alarm started without explicit arguments
    #[must_use]
    pub fn alarm_parameters(&self) -> AlarmParameters {
        AlarmParameters::resolve(
            self.default_alarm,
            self.alarm_duration.as_ref().and_then(SettingValue::as_integer),
            self.alarm_volume.as_ref().and_then(SettingValue::as_integer),
        )
    }

    /// Apply `patch` on top of these settings
    #[must_use]
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        Self {
            alarm_duration: patch
                .alarm_duration
                .clone()
                .unwrap_or_else(|| self.alarm_duration.clone()),
            alarm_volume: patch
                .alarm_volume
                .clone()
                .unwrap_or_else(|| self.alarm_volume.clone()),
            bell_volume: patch
                .bell_volume
                .clone()
                .unwrap_or_else(|| self.bell_volume.clone()),
            default_alarm: patch.default_alarm.unwrap_or(self.default_alarm),
        }
    }

    /// Keys whose value differs between `self` and `new`
    #[must_use]
    pub fn changed_keys(&self, new: &Self) -> Vec<SettingKey> {
        let mut changed = Vec::new();
        if self.alarm_duration != new.alarm_duration {
            changed.push(SettingKey::AlarmDuration);
        }
        if self.alarm_volume != new.alarm_volume {
            changed.push(SettingKey::AlarmVolume);
        }
        if self.bell_volume != new.bell_volume {
            changed.push(SettingKey::BellVolume);
        }
        if self.default_alarm != new.default_alarm {
            changed.push(SettingKey::DefaultAlarm);
        }
        changed
    }

    #[must_use]
    pub fn value(&self, key: SettingKey) -> Option<&SettingValue> {
        match key {
            SettingKey::AlarmDuration => self.alarm_duration.as_ref(),
            SettingKey::AlarmVolume => self.alarm_volume.as_ref(),
            SettingKey::BellVolume => self.bell_volume.as_ref(),
            SettingKey::DefaultAlarm => None,
        }
    }
}

/// Clamp a parsed setting into the range of its attribute
fn clamp_for(attribute: Attribute, value: i64) -> u16 {
    match attribute {
        Attribute::AlarmDuration => clamp_duration(Some(value)),
        _ => u16::from(clamp_volume(value)),
    }
}

/// Push changed numeric settings to the device.
///
/// Each recognized key becomes one single-attribute write. Cleared keys and
/// values that do not parse as numbers are skipped; write failures are logged and never returned,
/// and the alarm toggle and timer are left alone. Returns the number of
/// successful writes.
pub async fn apply_settings_change(
    alarm: &AlarmController,
    settings: &SirenSettings,
    changed: &[SettingKey],
) -> usize {
    let mut applied = 0;
    for &key in changed {
        let Some(attribute) = key.attribute() else {
            continue;
        };
        let Some(raw) = settings.value(key) else {
            continue;
        };
        let Some(parsed) = raw.as_integer() else {
            tracing::warn!(
                "Ignoring setting {} on {}: {:?} is not a number",
                key,
                alarm.device_id(),
                raw
            );
            continue;
        };

        let write = AttributeWrite::clamped(attribute, clamp_for(attribute, parsed));
        tracing::info!(
            "Applying setting {} on {}: {}={}",
            key,
            alarm.device_id(),
            attribute,
            write.value
        );
        if alarm.write_attribute(write).await.is_ok() {
            applied += 1;
        }
    }
    applied
}
