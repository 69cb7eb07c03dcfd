//! Host-side collaborators: capability storage and the cluster link

use async_trait::async_trait;
use dashmap::DashMap;
use iaswd_cluster::{AttributeWrite, Command, ZclFrame, CLUSTER_ID, CLUSTER_NAME};
use siren_control::{CapabilityStore, ClusterClient, HostError, TransportError};
use std::sync::atomic::{AtomicU8, Ordering};

/// In-memory capability values of one siren
#[derive(Default)]
pub struct MemoryCapabilities {
    values: DashMap<String, bool>,
}

impl MemoryCapabilities {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CapabilityStore for MemoryCapabilities {
    async fn set_capability(&self, capability: &str, value: bool) -> Result<(), HostError> {
        let previous = self.values.insert(capability.to_string(), value);
        if previous != Some(value) {
            tracing::debug!("Capability {} -> {}", capability, value);
        }
        Ok(())
    }

    async fn capability(&self, capability: &str) -> Option<bool> {
        self.values.get(capability).map(|v| *v)
    }
}

/// Cluster client that encodes every operation as a ZCL frame for the
/// siren's warning device endpoint and hands it to the radio link.
///
/// The radio link itself is provided by the coordinator integration; this
/// link logs the encoded frames and acknowledges them.
pub struct FrameLogLink {
    device_id: String,
    endpoint: u8,
    sequence: AtomicU8,
}

impl FrameLogLink {
    #[must_use]
    pub fn new(device_id: impl Into<String>, endpoint: u8) -> Self {
        Self {
            device_id: device_id.into(),
            endpoint,
            sequence: AtomicU8::new(1),
        }
    }

    fn next_sequence(&self) -> u8 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn send(&self, operation: &str, frame: &ZclFrame) {
        tracing::info!(
            "Sending {} to {} EP{} cluster {} ({:#06x}) seq={}: {:02X?}",
            operation,
            self.device_id,
            self.endpoint,
            CLUSTER_NAME,
            CLUSTER_ID,
            frame.transaction_seq(),
            frame.serialize()
        );
    }
}

#[async_trait]
impl ClusterClient for FrameLogLink {
    async fn write_attributes(&self, writes: &[AttributeWrite]) -> Result<(), TransportError> {
        if writes.is_empty() {
            return Err(TransportError::Rejected(
                "writeAttributes without records".to_string(),
            ));
        }
        let frame = ZclFrame::write_attributes(self.next_sequence(), writes);
        self.send("writeAttributes", &frame);
        Ok(())
    }

    async fn invoke_command(&self, command: Command) -> Result<(), TransportError> {
        let frame = ZclFrame::cluster_command(self.next_sequence(), &command);
        self.send(command.name(), &frame);
        Ok(())
    }
}
