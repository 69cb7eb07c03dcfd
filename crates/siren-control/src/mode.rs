//! Alarm mode to `startWarning` bitfield mapping

use iaswd_cluster::warning_info;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the siren does while an alarm is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum AlarmMode {
    Sound,
    Strobe,
    /// Siren and strobe; also the fallback for anything unrecognized
    #[default]
    Both,
}

impl AlarmMode {
    /// Parse a mode name. Unknown names resolve to `Both` rather than failing.
    #[must_use]
    pub fn parse(mode: &str) -> Self {
        match mode {
            "sound" => Self::Sound,
            "strobe" => Self::Strobe,
            "both" => Self::Both,
            other => {
                if !other.is_empty() {
                    tracing::debug!("Unknown alarm mode {:?}, using both", other);
                }
                Self::Both
            }
        }
    }

    /// Bitfield sent as `warningInfo`
    #[must_use]
    pub fn warning_info(self) -> u8 {
        match self {
            Self::Sound => warning_info::SOUND,
            Self::Strobe => warning_info::STROBE,
            Self::Both => warning_info::BOTH,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sound => "sound",
            Self::Strobe => "strobe",
            Self::Both => "both",
        }
    }
}

impl From<&str> for AlarmMode {
    fn from(mode: &str) -> Self {
        Self::parse(mode)
    }
}

impl From<String> for AlarmMode {
    fn from(mode: String) -> Self {
        Self::parse(&mode)
    }
}

impl fmt::Display for AlarmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a mode name straight to its `warningInfo` bitfield
#[must_use]
pub fn map_mode(mode: &str) -> u8 {
    AlarmMode::parse(mode).warning_info()
}
