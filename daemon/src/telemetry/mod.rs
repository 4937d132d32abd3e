mod fallback;
mod publisher;

pub use fallback::FallbackStore;
pub use publisher::TelemetryPublisher;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::PublishError;
use crate::registry::ChannelHandle;

pub const MEASURE_DV: &str = "Average DV";
pub const MEASURE_V: &str = "Average V";
pub const MEASURE_STRAIN: &str = "Average Strain";

/// One channel's contribution to a cycle's telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelMeasurement {
    pub average_dv: f64,
    pub average_v: f64,
    pub average_strain: f64,
}

/// Per-cycle, per-channel measurements prepared for delivery.
///
/// Built fresh each cycle and released with it; keyed by handle so two
/// distinct slots can never collide.
#[derive(Debug, Clone, Default)]
pub struct TelemetryFrame {
    entries: BTreeMap<ChannelHandle, ChannelMeasurement>,
}

impl TelemetryFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: ChannelHandle, measurement: ChannelMeasurement) {
        self.entries.insert(handle, measurement);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelHandle, &ChannelMeasurement)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten to the sink's wire shape: a single-level map from
    /// `"<channelKey>-<measure>"` to a number.
    pub fn flatten(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut flat = serde_json::Map::new();
        for (handle, m) in &self.entries {
            let key = handle.key();
            flat.insert(format!("{key}-{MEASURE_DV}"), m.average_dv.into());
            flat.insert(format!("{key}-{MEASURE_V}"), m.average_v.into());
            flat.insert(format!("{key}-{MEASURE_STRAIN}"), m.average_strain.into());
        }
        flat
    }
}

/// Delivery endpoint for telemetry frames. Implemented by
/// [`TelemetryPublisher`] over MQTT; tests substitute failing sinks.
pub trait TelemetrySink {
    async fn publish(&self, frame: &TelemetryFrame) -> Result<(), PublishError>;
}
