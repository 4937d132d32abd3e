mod average;
mod guard;
mod reader;

pub use average::{AveragedSample, Averager};
pub use guard::{OutlierGuard, RetryPolicy};
pub use reader::SampleReader;

use crate::error::SensorReadError;
use crate::registry::ChannelHandle;

/// 1 V/V of bridge imbalance expressed in microstrain
const MICROSTRAIN_PER_RATIO: f64 = 1e6;
/// Quarter-bridge completion factor
const BRIDGE_FACTOR: f64 = 4.0;
/// Gauge factor of the installed strain gauges
const GAUGE_FACTOR: f64 = 2.1;

/// Quarter-bridge conversion from a gain-switched voltage pair to microstrain.
pub fn strain_from_pair(dv: f64, v: f64) -> f64 {
    dv / v * MICROSTRAIN_PER_RATIO * BRIDGE_FACTOR / GAUGE_FACTOR
}

/// Inverse of [`strain_from_pair`]; used by the bus simulator.
pub fn dv_for_strain(strain: f64, v: f64) -> f64 {
    strain * v * GAUGE_FACTOR / (BRIDGE_FACTOR * MICROSTRAIN_PER_RATIO)
}

/// One gain-switched differential reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// High-gain differential voltage across the bridge
    pub dv: f64,
    /// Low-gain reference voltage feeding the bridge
    pub v: f64,
    /// Derived microstrain
    pub strain: f64,
}

impl RawSample {
    pub fn from_pair(dv: f64, v: f64) -> Self {
        Self {
            dv,
            v,
            strain: strain_from_pair(dv, v),
        }
    }
}

/// Source of raw samples. Implemented by [`SampleReader`] over the real bus;
/// tests substitute scripted implementations.
pub trait Sampler {
    fn sample(&mut self, handle: ChannelHandle) -> Result<RawSample, SensorReadError>;
}
