//! Siren Control - IAS WD siren/doorbell API server

use siren_control::{SirenDevice, SirenEvent};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod host;
mod persistence;

use api::AppState;
use config::Config;
use host::{FrameLogLink, MemoryCapabilities};

/// Endpoint carrying the warning device cluster
const SIREN_ENDPOINT: u8 = 1;

/// Log controller events of one siren
fn spawn_event_logger(siren: &SirenDevice) {
    let mut events = siren.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SirenEvent::AlarmStarted {
                    device_id,
                    mode,
                    duration_secs,
                }) => {
                    tracing::info!("Alarm started on {} ({}, {}s)", device_id, mode, duration_secs);
                }
                Ok(SirenEvent::AlarmStopped { device_id }) => {
                    tracing::info!("Alarm stopped on {}", device_id);
                }
                Ok(SirenEvent::AlarmExpired { device_id }) => {
                    tracing::info!("Alarm toggle reset on {}", device_id);
                }
                Ok(SirenEvent::DoorbellRung { device_id }) => {
                    tracing::info!("Doorbell rung on {}", device_id);
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event logger lagged by {} events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "siren_api=debug,siren_control=debug,iaswd_cluster=debug,info".into()
            }),
        )
        .init();

    tracing::info!("Starting Siren Control API server");

    let config = Config::from_env()?;
    tracing::info!("Configuration: {:?}", config);

    let stored = persistence::load_settings(&config.settings_path()).await;
    let state = AppState::new(config.settings_path());

    let mut first_init = false;
    for id in &config.devices {
        let is_new = !stored.contains_key(id);
        let settings = stored.get(id).cloned().unwrap_or_default();

        let siren = SirenDevice::new(
            id.clone(),
            Arc::new(FrameLogLink::new(id.clone(), SIREN_ENDPOINT)),
            Arc::new(MemoryCapabilities::new()),
            settings,
        );
        siren.init(is_new).await?;
        spawn_event_logger(&siren);

        state.sirens.insert(id.clone(), Arc::new(siren));
        first_init |= is_new;
    }

    // Remember new sirens so the next start is not a first init
    if first_init {
        if let Err(e) = state.persist_settings().await {
            tracing::warn!("Failed to save settings: {}", e);
        }
    }

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Listening on http://{}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
