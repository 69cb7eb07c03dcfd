//! Seams to the cluster runtime and the host device framework

use crate::error::{HostError, TransportError};
use async_trait::async_trait;
use iaswd_cluster::{AttributeWrite, Command};

/// Name of the boolean capability mirroring "alarm is sounding"
pub const ALARM_TOGGLE: &str = "alarmToggle";

/// Write/command primitives against one device's warning device cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Write all records in a single batched Write Attributes request
    async fn write_attributes(&self, writes: &[AttributeWrite]) -> Result<(), TransportError>;

    /// Invoke a cluster-specific command
    async fn invoke_command(&self, command: Command) -> Result<(), TransportError>;
}

/// Capability storage of one device instance
#[async_trait]
pub trait CapabilityStore: Send + Sync {
    async fn set_capability(&self, capability: &str, value: bool) -> Result<(), HostError>;

    async fn capability(&self, capability: &str) -> Option<bool>;
}
