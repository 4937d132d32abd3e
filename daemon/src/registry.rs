use std::collections::HashSet;
use std::fmt;

use crate::bus::SensorBus;

/// One physical sensor slot: a multiplexer address plus a channel index (0-3).
///
/// Unique key for all per-channel state held anywhere in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelHandle {
    pub mux_addr: u8,
    pub channel: u8,
}

impl ChannelHandle {
    pub fn new(mux_addr: u8, channel: u8) -> Self {
        Self { mux_addr, channel }
    }

    /// Wire key used in telemetry documents and log lines, e.g. `TCA0x70_CH2`
    pub fn key(&self) -> String {
        format!("TCA{:#x}_CH{}", self.mux_addr, self.channel)
    }
}

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TCA{:#x}_CH{}", self.mux_addr, self.channel)
    }
}

/// Static list of sensor slots found at startup. Immutable once built.
pub struct ChannelRegistry {
    channels: Vec<ChannelHandle>,
}

impl ChannelRegistry {
    /// Probe every channel behind every configured multiplexer address.
    ///
    /// A slot that fails to answer is logged and excluded for the process
    /// lifetime; a failed slot never aborts discovery. Duplicate slots
    /// (the same address listed twice) are dropped with a warning since
    /// they would collide in the telemetry frame.
    pub fn discover<B: SensorBus>(bus: &mut B, mux_addrs: &[u8]) -> Self {
        let mut channels = Vec::new();
        let mut seen = HashSet::new();

        for &mux_addr in mux_addrs {
            for channel in 0..4 {
                let handle = ChannelHandle::new(mux_addr, channel);
                if !seen.insert(handle) {
                    tracing::warn!(channel = %handle, "duplicate slot in configuration, skipping");
                    continue;
                }
                match bus.select(handle).and_then(|_| bus.probe(handle)) {
                    Ok(()) => {
                        tracing::info!(channel = %handle, "found ADC");
                        channels.push(handle);
                    }
                    Err(e) => {
                        tracing::warn!(channel = %handle, "slot excluded from registry: {e}");
                    }
                }
            }
        }

        Self { channels }
    }

    pub fn channels(&self) -> &[ChannelHandle] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
