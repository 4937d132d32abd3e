use std::time::Duration;

use rumqttc::{AsyncClient, MqttOptions, QoS};

use crate::config::Config;
use crate::error::PublishError;

use super::{TelemetryFrame, TelemetrySink};

/// ThingsBoard device telemetry topic
pub const TELEMETRY_TOPIC: &str = "v1/devices/me/telemetry";

/// MQTT delivery of telemetry frames.
///
/// Holds a long-lived connection whose event loop runs in a background task;
/// reconnection and keepalive are that task's business. Each publish is a
/// single acknowledged (QoS 1) attempt with no internal retry — a failed
/// cycle goes to the fallback store instead.
pub struct TelemetryPublisher {
    client: AsyncClient,
}

impl TelemetryPublisher {
    pub fn connect(config: &Config) -> Self {
        let mut options = MqttOptions::new(
            "strainstation-daemon",
            config.mqtt_host.clone(),
            config.mqtt_port,
        );
        // ThingsBoard authenticates with the device access token as username
        options.set_credentials(config.access_token.clone(), "");
        options.set_keep_alive(Duration::from_secs(60));

        let (client, mut eventloop) = AsyncClient::new(options, 16);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(event) => tracing::trace!("mqtt event: {event:?}"),
                    Err(e) => {
                        tracing::warn!("mqtt connection error: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self { client }
    }
}

impl TelemetrySink for TelemetryPublisher {
    async fn publish(&self, frame: &TelemetryFrame) -> Result<(), PublishError> {
        let payload = serde_json::to_string(&frame.flatten())?;
        tracing::debug!(channels = frame.len(), bytes = payload.len(), "publishing telemetry");
        self.client
            .publish(TELEMETRY_TOPIC, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }
}
