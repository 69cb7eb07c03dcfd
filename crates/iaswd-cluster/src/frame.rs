//! ZCL frame encoding for warning device operations

use crate::schema::{AttributeWrite, Command};

/// ZCL global command id of Write Attributes
pub const WRITE_ATTRIBUTES: u8 = 0x02;

/// ZCL frame types (low two bits of the frame control field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Global = 0x00,
    ClusterSpecific = 0x01,
}

/// Client-to-server ZCL frame
///
/// Frame format:
/// ```text
/// [Frame Control: 1 byte]
/// [Transaction Sequence: 1 byte]
/// [Command ID: 1 byte]
/// [Payload: variable]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZclFrame {
    frame_control: u8,
    transaction_seq: u8,
    command_id: u8,
    payload: Vec<u8>,
}

impl ZclFrame {
    /// Build a Write Attributes frame carrying all records in one batch
    #[must_use]
    pub fn write_attributes(transaction_seq: u8, writes: &[AttributeWrite]) -> Self {
        let mut payload = Vec::with_capacity(writes.len() * 5);
        for write in writes {
            write.encode(&mut payload);
        }
        Self {
            frame_control: FrameType::Global as u8,
            transaction_seq,
            command_id: WRITE_ATTRIBUTES,
            payload,
        }
    }

    /// Build a cluster-specific command frame
    #[must_use]
    pub fn cluster_command(transaction_seq: u8, command: &Command) -> Self {
        Self {
            frame_control: FrameType::ClusterSpecific as u8,
            transaction_seq,
            command_id: command.id(),
            payload: command.encode_payload(),
        }
    }

    #[must_use]
    pub fn frame_type(&self) -> FrameType {
        if self.frame_control & 0x03 == FrameType::ClusterSpecific as u8 {
            FrameType::ClusterSpecific
        } else {
            FrameType::Global
        }
    }

    #[must_use]
    pub fn transaction_seq(&self) -> u8 {
        self.transaction_seq
    }

    #[must_use]
    pub fn command_id(&self) -> u8 {
        self.command_id
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serialize to the ASDU bytes handed to the radio link
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(3 + self.payload.len());
        data.push(self.frame_control);
        data.push(self.transaction_seq);
        data.push(self.command_id);
        data.extend_from_slice(&self.payload);
        data
    }
}
