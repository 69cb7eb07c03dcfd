//! Recording doubles for the cluster transport and capability store

use crate::error::{HostError, TransportError};
use crate::host::{CapabilityStore, ClusterClient};
use async_trait::async_trait;
use iaswd_cluster::{Attribute, AttributeWrite, Command};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// One operation seen by the cluster double
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Write(Vec<(Attribute, u16)>),
    Command(Command),
}

impl Call {
    pub fn start_warning(warning_info: u8, warning_duration: u16) -> Self {
        Self::Command(Command::StartWarning {
            warning_info,
            warning_duration,
        })
    }
}

/// Cluster double that records every attempted operation with its timestamp
#[derive(Default)]
pub struct RecordingCluster {
    calls: Mutex<Vec<(Instant, Call)>>,
    fail_writes: AtomicBool,
    fail_commands: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
}

impl RecordingCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    /// Make each write take this long before completing
    pub fn delay_writes(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, Call)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push((Instant::now(), call));
    }
}

#[async_trait]
impl ClusterClient for RecordingCluster {
    async fn write_attributes(&self, writes: &[AttributeWrite]) -> Result<(), TransportError> {
        self.record(Call::Write(
            writes.iter().map(|w| (w.attribute, w.value)).collect(),
        ));
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("writeAttributes".to_string()));
        }
        Ok(())
    }

    async fn invoke_command(&self, command: Command) -> Result<(), TransportError> {
        self.record(Call::Command(command));
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(TransportError::Timeout(command.name().to_string()));
        }
        Ok(())
    }
}

/// Capability store double keeping the current values and the write history
#[derive(Default)]
pub struct RecordingCapabilities {
    values: Mutex<HashMap<String, bool>>,
    history: Mutex<Vec<(String, bool)>>,
}

impl RecordingCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&self) -> Option<bool> {
        self.values
            .lock()
            .unwrap()
            .get(crate::host::ALARM_TOGGLE)
            .copied()
    }

    pub fn history(&self) -> Vec<bool> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == crate::host::ALARM_TOGGLE)
            .map(|(_, value)| *value)
            .collect()
    }
}

#[async_trait]
impl CapabilityStore for RecordingCapabilities {
    async fn set_capability(&self, capability: &str, value: bool) -> Result<(), HostError> {
        self.values
            .lock()
            .unwrap()
            .insert(capability.to_string(), value);
        self.history
            .lock()
            .unwrap()
            .push((capability.to_string(), value));
        Ok(())
    }

    async fn capability(&self, capability: &str) -> Option<bool> {
        self.values.lock().unwrap().get(capability).copied()
    }
}
