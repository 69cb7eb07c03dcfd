//! Error types for cluster encoding

use thiserror::Error;

/// Errors raised while validating or encoding cluster operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZclError {
    /// Value does not fit the attribute's data type or documented range
    #[error("Value {value} out of range for {attribute} (max {max})")]
    ValueOutOfRange {
        attribute: &'static str,
        value: u16,
        max: u16,
    },
}
