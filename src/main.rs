use std::sync::Arc;

use async_trait::async_trait;
use deckline_client::{ClientConfig, DeckClient, HandlerRegistry};
use deckline_core::{
    DeckEvent, Handler, HandlerDescriptor, HandlerError, Invocation, InvocationContext,
    TypedValue, ValueKind,
};
use deckline_telemetry::{init_telemetry, TelemetryConfig};

const PLUGIN_ID: &str = "com.example.deckline.demo";

/// Prints whatever text the user typed into the action.
struct SayAction {
    descriptor: HandlerDescriptor,
}

impl SayAction {
    fn new() -> Self {
        Self {
            descriptor: HandlerDescriptor::action(format!("{PLUGIN_ID}.action.say"))
                .data("text", ValueKind::Text),
        }
    }
}

#[async_trait]
impl Handler for SayAction {
    fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    async fn invoke(
        &self,
        invocation: Invocation,
        _ctx: &InvocationContext,
    ) -> Result<(), HandlerError> {
        let text = invocation
            .value(0)
            .and_then(TypedValue::as_str)
            .unwrap_or_default();
        tracing::info!(text, "Say action triggered");
        Ok(())
    }
}

/// Mirrors a volume slider's position into a log line.
struct VolumeConnector {
    descriptor: HandlerDescriptor,
}

impl VolumeConnector {
    fn new() -> Self {
        Self {
            descriptor: HandlerDescriptor::connector(format!("{PLUGIN_ID}.connector.volume"))
                .connector_value(),
        }
    }
}

#[async_trait]
impl Handler for VolumeConnector {
    fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    async fn invoke(
        &self,
        invocation: Invocation,
        _ctx: &InvocationContext,
    ) -> Result<(), HandlerError> {
        let value = invocation.connector_value().unwrap_or(0);
        tracing::info!(value, "Volume connector moved");
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let _telemetry = init_telemetry(TelemetryConfig::default());

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(SayAction::new()));
    registry.register(Arc::new(VolumeConnector::new()));

    let (client, mut events) = DeckClient::new(ClientConfig::new(PLUGIN_ID), registry);

    if let Err(e) = client.connect_and_listen().await {
        tracing::error!(error = %e, "Could not reach the host");
        std::process::exit(1);
    }
    tracing::info!(plugin_id = PLUGIN_ID, "Paired and listening");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(DeckEvent::Info(info)) => {
                    tracing::info!(sdk_version = ?info.sdk_version, "Host info received");
                }
                Some(DeckEvent::Settings(settings)) => {
                    tracing::info!(count = settings.settings_map().len(), "Settings updated");
                }
                Some(DeckEvent::Broadcast(broadcast)) => {
                    tracing::info!(event = %broadcast.event, "Broadcast");
                }
                Some(DeckEvent::Disconnected { reason }) => {
                    match reason {
                        Some(err) => tracing::warn!(reason = %err, "Disconnected"),
                        None => tracing::info!("Host closed the session"),
                    }
                    break;
                }
                Some(other) => {
                    tracing::debug!(event = other.label(), "Session event");
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                client.close().await;
                break;
            }
        }
    }
}
