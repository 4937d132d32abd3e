use std::collections::HashMap;

use crate::registry::{ChannelHandle, ChannelRegistry};
use crate::sampling::{Averager, OutlierGuard, Sampler};

/// Zero-reference capture and correction.
///
/// Owns the per-channel baseline strain map. Capture is a one-shot,
/// operator-triggered action; the whole capture completes and replaces the
/// previous map before any baseline is consumed downstream.
pub struct BaselineCalibrator {
    baselines: HashMap<ChannelHandle, f64>,
}

impl BaselineCalibrator {
    pub fn new() -> Self {
        Self {
            baselines: HashMap::new(),
        }
    }

    /// Average every registry channel and record its strain as the unloaded
    /// reference. A channel that cannot be averaged keeps no baseline and
    /// falls back to pass-through adjustment.
    pub async fn capture<S: Sampler>(
        &mut self,
        registry: &ChannelRegistry,
        averager: &Averager,
        guard: &mut OutlierGuard,
        sampler: &mut S,
    ) {
        let mut captured = HashMap::new();
        for &handle in registry.channels() {
            match averager.average(guard, sampler, handle).await {
                Ok(avg) => {
                    tracing::info!(channel = %handle, baseline = avg.strain, "baseline captured");
                    captured.insert(handle, avg.strain);
                }
                Err(e) => {
                    tracing::warn!(channel = %handle, "no baseline captured: {e}");
                }
            }
        }
        self.baselines = captured;
    }

    /// Strain relative to the captured zero reference, or the raw strain
    /// unchanged when the channel has no baseline.
    pub fn adjust(&self, handle: ChannelHandle, strain: f64) -> f64 {
        match self.baselines.get(&handle) {
            Some(baseline) => strain - baseline,
            None => strain,
        }
    }
}

impl Default for BaselineCalibrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SimulatedBus;
    use crate::sampling::{RetryPolicy, SampleReader};

    #[tokio::test]
    async fn capture_then_adjust_reads_near_zero_when_unloaded() {
        let mut bus = SimulatedBus::new(&[0x70]);
        let registry = ChannelRegistry::discover(&mut bus, &[0x70]);
        let mut sampler = SampleReader::new(bus);
        let mut guard = OutlierGuard::new(RetryPolicy::default());
        let averager = Averager::new(50);

        let mut calibrator = BaselineCalibrator::new();
        calibrator
            .capture(&registry, &averager, &mut guard, &mut sampler)
            .await;

        let handle = registry.channels()[0];
        let avg = averager
            .average(&mut guard, &mut sampler, handle)
            .await
            .unwrap();
        let adjusted = calibrator.adjust(handle, avg.strain);
        // within the simulator's noise band
        assert!(adjusted.abs() < 2.0, "adjusted strain {adjusted}");
    }

    #[test]
    fn channel_without_baseline_passes_through() {
        let calibrator = BaselineCalibrator::new();
        let handle = ChannelHandle::new(0x70, 0);
        assert_eq!(calibrator.adjust(handle, 1234.5), 1234.5);
    }

    #[tokio::test]
    async fn recapture_overwrites_the_previous_baseline() {
        let mut bus = SimulatedBus::new(&[0x70]);
        let registry = ChannelRegistry::discover(&mut bus, &[0x70]);
        let handle = registry.channels()[0];
        let mut sampler = SampleReader::new(bus);
        let mut guard = OutlierGuard::new(RetryPolicy::default());
        let averager = Averager::new(20);

        let mut calibrator = BaselineCalibrator::new();
        calibrator
            .capture(&registry, &averager, &mut guard, &mut sampler)
            .await;
        let first = calibrator.adjust(handle, 2000.0);

        // load the sensor, recapture, and the zero point moves with it
        // (the reader now owns the bus, so drive a fresh setup)
        let mut bus = SimulatedBus::new(&[0x70]);
        bus.set_load(handle, 300.0);
        let mut sampler = SampleReader::new(bus);
        calibrator
            .capture(&registry, &averager, &mut guard, &mut sampler)
            .await;
        let second = calibrator.adjust(handle, 2000.0);

        assert!((first - second - 300.0).abs() < 600.0);
        assert!(second < first);
    }
}
