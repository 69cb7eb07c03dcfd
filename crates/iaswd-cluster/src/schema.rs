//! Attribute and command schema of the IAS WD cluster

use crate::error::ZclError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// IAS WD cluster ID
pub const CLUSTER_ID: u16 = 0x0502;

/// Cluster name as registered with the host cluster runtime
pub const CLUSTER_NAME: &str = "iasWD";

/// Bitfield values for the `warningInfo` argument of `startWarning`
pub mod warning_info {
    /// All off (the only way to stop a running warning)
    pub const OFF: u8 = 0x00;
    pub const SOUND: u8 = 0x11;
    pub const STROBE: u8 = 0x21;
    pub const BOTH: u8 = 0x31;
}

/// ZCL data types used by this cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    Bitmap8 = 0x18,
    Uint8 = 0x20,
    Uint16 = 0x21,
    Enum8 = 0x30,
}

impl DataType {
    /// Encoded size of a value in bytes
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::Bitmap8 | Self::Uint8 | Self::Enum8 => 1,
            Self::Uint16 => 2,
        }
    }

    /// Largest value representable by the type
    #[must_use]
    pub fn max_value(self) -> u16 {
        match self {
            Self::Bitmap8 | Self::Uint8 | Self::Enum8 => u16::from(u8::MAX),
            Self::Uint16 => u16::MAX,
        }
    }

    /// Append a little-endian encoding of `value` to `buf`
    pub fn encode(self, value: u16, buf: &mut Vec<u8>) {
        match self.size() {
            1 => buf.push(value.to_le_bytes()[0]),
            _ => buf.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

/// Values of the `doorbellTrigger` enum attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DoorbellTrigger {
    Off = 0,
    On = 1,
}

/// Attributes of the warning device cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Attribute {
    /// Alarm duration in seconds
    AlarmDuration,
    /// Strobe duty cycle; accepted but has no observed effect
    StrobeDutyCycle,
    AlarmVolume,
    /// Short fixed siren, resets itself to 0 after firing
    QuickTrigger,
    /// Edge-triggered chime, only `Off`/`On` are valid
    DoorbellTrigger,
    DoorbellVolume,
    /// Vendor-specific, unknown effect
    Specific,
}

impl Attribute {
    /// Attribute identifier on the wire
    #[must_use]
    pub fn id(self) -> u16 {
        match self {
            Self::AlarmDuration => 0x0000,
            Self::StrobeDutyCycle => 0x0001,
            Self::AlarmVolume => 0x0002,
            Self::QuickTrigger => 0x0004,
            Self::DoorbellTrigger => 0x0005,
            Self::DoorbellVolume => 0x0006,
            Self::Specific => 0xE000,
        }
    }

    #[must_use]
    pub fn data_type(self) -> DataType {
        match self {
            Self::AlarmDuration => DataType::Uint16,
            Self::DoorbellTrigger => DataType::Enum8,
            _ => DataType::Uint8,
        }
    }

    /// Schema name of the attribute
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::AlarmDuration => "alarmDuration",
            Self::StrobeDutyCycle => "strobeDutyCycle",
            Self::AlarmVolume => "alarmVolume",
            Self::QuickTrigger => "quickTrigger",
            Self::DoorbellTrigger => "doorbellTrigger",
            Self::DoorbellVolume => "doorbellVolume",
            Self::Specific => "specific",
        }
    }

    /// Largest value the device accepts for this attribute
    #[must_use]
    pub fn max_value(self) -> u16 {
        match self {
            Self::StrobeDutyCycle | Self::AlarmVolume | Self::DoorbellVolume => 100,
            Self::DoorbellTrigger => DoorbellTrigger::On as u16,
            _ => self.data_type().max_value(),
        }
    }

    /// Check that `value` is valid for this attribute
    pub fn validate(self, value: u16) -> Result<(), ZclError> {
        let max = self.max_value();
        if value > max {
            return Err(ZclError::ValueOutOfRange {
                attribute: self.name(),
                value,
                max,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single validated attribute write record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeWrite {
    pub attribute: Attribute,
    pub value: u16,
}

impl AttributeWrite {
    /// Create a write record, rejecting values outside the attribute's range
    pub fn new(attribute: Attribute, value: u16) -> Result<Self, ZclError> {
        attribute.validate(value)?;
        Ok(Self { attribute, value })
    }

    /// Create a write record, clamping the value into the attribute's range
    #[must_use]
    pub fn clamped(attribute: Attribute, value: u16) -> Self {
        Self {
            attribute,
            value: value.min(attribute.max_value()),
        }
    }

    /// Encode as a Write Attributes record: id (LE), data type, value (LE)
    pub fn encode(&self, buf: &mut Vec<u8>) {
        let data_type = self.attribute.data_type();
        buf.extend_from_slice(&self.attribute.id().to_le_bytes());
        buf.push(data_type as u8);
        data_type.encode(self.value, buf);
    }
}

/// Cluster-specific commands of the warning device cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start (or, with `warning_info == 0`, stop) a warning.
    ///
    /// `warning_duration` is part of the command signature but the device
    /// ignores it; `alarmDuration` governs how long the siren runs.
    StartWarning {
        warning_info: u8,
        warning_duration: u16,
    },
}

impl Command {
    /// The all-off `startWarning` used to stop a running alarm
    pub const STOP: Self = Self::StartWarning {
        warning_info: warning_info::OFF,
        warning_duration: 0,
    };

    /// Command identifier on the wire
    #[must_use]
    pub fn id(&self) -> u8 {
        match self {
            Self::StartWarning { .. } => 0x00,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartWarning { .. } => "startWarning",
        }
    }

    /// Encode the command arguments
    #[must_use]
    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            Self::StartWarning {
                warning_info,
                warning_duration,
            } => {
                let mut buf = Vec::with_capacity(3);
                DataType::Bitmap8.encode(u16::from(*warning_info), &mut buf);
                DataType::Uint16.encode(*warning_duration, &mut buf);
                buf
            }
        }
    }
}
