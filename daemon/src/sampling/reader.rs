use crate::bus::{Gain, SensorBus, VoltagePair};
use crate::error::SensorReadError;
use crate::registry::ChannelHandle;

use super::{RawSample, Sampler};

/// Performs one gain-switched differential read on a sensor slot.
///
/// The excitation and reference pairs must be converted back-to-back with the
/// gain register switched between them; the gain register is shared by every
/// channel behind the same converter, so the reader takes the bus by value
/// and reads are serialized through its `&mut` access.
pub struct SampleReader<B> {
    bus: B,
}

impl<B: SensorBus> SampleReader<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

impl<B: SensorBus> Sampler for SampleReader<B> {
    fn sample(&mut self, handle: ChannelHandle) -> Result<RawSample, SensorReadError> {
        self.bus.select(handle)?;
        self.bus.set_gain(Gain::X16)?;
        let dv = self.bus.read_differential(VoltagePair::Excitation)?;
        self.bus.set_gain(Gain::X1)?;
        let v = self.bus.read_differential(VoltagePair::Reference)?;
        Ok(RawSample::from_pair(dv, v))
    }
}
