//! Doorbell controller

use crate::error::SirenError;
use crate::event::SirenEvent;
use crate::host::ClusterClient;
use iaswd_cluster::{Attribute, AttributeWrite, DoorbellTrigger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Delay before `doorbellTrigger` is written back to `Off`
pub const RESET_DELAY: Duration = Duration::from_millis(1000);

/// Rings the chime by pulsing the edge-triggered `doorbellTrigger` attribute
pub struct DoorbellController {
    device_id: String,
    cluster: Arc<dyn ClusterClient>,
    event_tx: broadcast::Sender<SirenEvent>,
}

impl DoorbellController {
    pub fn new(
        device_id: impl Into<String>,
        cluster: Arc<dyn ClusterClient>,
        event_tx: broadcast::Sender<SirenEvent>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            cluster,
            event_tx,
        }
    }

    /// Write `On`, then `Off` after [`RESET_DELAY`].
    ///
    /// Only the first write is reported. The reset runs detached and is
    /// neither cancellable nor merged with other pulses; if it fails the
    /// attribute stays `On` until the next pulse overwrites it.
    pub async fn trigger(&self) -> Result<(), SirenError> {
        let on = AttributeWrite::new(Attribute::DoorbellTrigger, DoorbellTrigger::On as u16)?;
        let off = AttributeWrite::new(Attribute::DoorbellTrigger, DoorbellTrigger::Off as u16)?;

        tracing::info!("Ringing doorbell on {}", self.device_id);
        if let Err(e) = self.cluster.write_attributes(&[on]).await {
            tracing::error!("Failed to trigger doorbell on {}: {}", self.device_id, e);
            return Err(e.into());
        }

        let cluster = Arc::clone(&self.cluster);
        let device_id = self.device_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RESET_DELAY).await;
            if let Err(e) = cluster.write_attributes(&[off]).await {
                tracing::warn!("Failed to reset doorbell trigger on {}: {}", device_id, e);
            }
        });

        let _ = self.event_tx.send(SirenEvent::DoorbellRung {
            device_id: self.device_id.clone(),
        });
        Ok(())
    }
}
