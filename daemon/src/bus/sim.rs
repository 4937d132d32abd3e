//! Hardware-free sensor bus.
//!
//! Stands in for the I2C adapter so the daemon and its tests can run on a
//! desk. Produces a stable reference voltage and an excitation voltage that
//! tracks a configurable per-slot load, with a little deterministic noise on
//! both.

use std::collections::{HashMap, HashSet};

use crate::error::SensorReadError;
use crate::registry::ChannelHandle;
use crate::sampling::dv_for_strain;

use super::{Gain, SensorBus, VoltagePair};

const REFERENCE_VOLTS: f64 = 3.3;
/// Unloaded strain indication of the simulated bridge, in microstrain
const IDLE_STRAIN: f64 = 1169.8;
/// Peak-to-peak noise, in microstrain for the excitation pair
const STRAIN_NOISE: f64 = 2.0;
const REFERENCE_NOISE_VOLTS: f64 = 0.0005;

pub struct SimulatedBus {
    present: HashSet<ChannelHandle>,
    selected: Option<ChannelHandle>,
    gain: Gain,
    /// Applied load per slot, in microstrain on top of the idle indication
    load: HashMap<ChannelHandle, f64>,
    rng: u64,
}

impl SimulatedBus {
    /// All four channels answer behind every listed multiplexer address.
    pub fn new(mux_addrs: &[u8]) -> Self {
        let mut present = HashSet::new();
        for &mux_addr in mux_addrs {
            for channel in 0..4 {
                present.insert(ChannelHandle::new(mux_addr, channel));
            }
        }
        Self {
            present,
            selected: None,
            gain: Gain::X1,
            load: HashMap::new(),
            rng: 0x2545_f491_4f6c_dd1d,
        }
    }

    /// Make a slot stop answering, as an unpopulated or faulty position would.
    pub fn remove(&mut self, handle: ChannelHandle) {
        self.present.remove(&handle);
    }

    /// Apply a mechanical load to a slot, in microstrain.
    pub fn set_load(&mut self, handle: ChannelHandle, microstrain: f64) {
        self.load.insert(handle, microstrain);
    }

    // xorshift64, uniform in [-1, 1)
    fn noise(&mut self) -> f64 {
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 7;
        self.rng ^= self.rng << 17;
        (self.rng >> 11) as f64 / (1u64 << 52) as f64 - 1.0
    }
}

impl SensorBus for SimulatedBus {
    fn select(&mut self, handle: ChannelHandle) -> Result<(), SensorReadError> {
        self.selected = Some(handle);
        Ok(())
    }

    fn probe(&mut self, handle: ChannelHandle) -> Result<(), SensorReadError> {
        if self.present.contains(&handle) {
            Ok(())
        } else {
            Err(SensorReadError::Unresponsive {
                mux_addr: handle.mux_addr,
                channel: handle.channel,
            })
        }
    }

    fn set_gain(&mut self, gain: Gain) -> Result<(), SensorReadError> {
        if self.selected.is_none() {
            return Err(SensorReadError::Bus("no channel routed".into()));
        }
        self.gain = gain;
        Ok(())
    }

    fn read_differential(&mut self, pair: VoltagePair) -> Result<f64, SensorReadError> {
        let handle = self
            .selected
            .ok_or_else(|| SensorReadError::Bus("no channel routed".into()))?;
        if !self.present.contains(&handle) {
            return Err(SensorReadError::Unresponsive {
                mux_addr: handle.mux_addr,
                channel: handle.channel,
            });
        }
        match pair {
            VoltagePair::Reference => {
                Ok(REFERENCE_VOLTS + self.noise() * REFERENCE_NOISE_VOLTS)
            }
            VoltagePair::Excitation => {
                // the millivolt bridge signal is below the LSB at low gain
                if self.gain != Gain::X16 {
                    return Ok(0.0);
                }
                let load = self.load.get(&handle).copied().unwrap_or(0.0);
                let strain = IDLE_STRAIN + load + self.noise() * STRAIN_NOISE;
                Ok(dv_for_strain(strain, REFERENCE_VOLTS))
            }
        }
    }
}
