mod sim;

pub use sim::SimulatedBus;

use crate::error::SensorReadError;
use crate::registry::ChannelHandle;

/// ADC amplification setting.
///
/// Gain is a device-scoped register shared by every channel behind the same
/// converter, which is why bus access is `&mut` and reads are never
/// interleaved across channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gain {
    /// x1, used for the low-voltage reference pair
    X1,
    /// x16, used for the millivolt-level excitation pair
    X16,
}

/// Which differential input pair to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoltagePair {
    /// Strain excitation signal (inputs P2/P3)
    Excitation,
    /// Bridge reference voltage (inputs P0/P1)
    Reference,
}

/// Transactions against the multiplexed sensor bus.
///
/// The wire protocol behind this trait (TCA9548A routing, ADS1115 register
/// access) lives in a hardware adapter outside this crate; the daemon ships
/// with [`SimulatedBus`] for hardware-free operation and tests.
pub trait SensorBus {
    /// Route the shared bus to the slot's multiplexer channel.
    fn select(&mut self, handle: ChannelHandle) -> Result<(), SensorReadError>;

    /// Check that a converter answers behind the slot. Used at enumeration.
    fn probe(&mut self, handle: ChannelHandle) -> Result<(), SensorReadError>;

    /// Write the gain register of the converter behind the selected slot.
    fn set_gain(&mut self, gain: Gain) -> Result<(), SensorReadError>;

    /// Convert one differential input pair and return volts.
    fn read_differential(&mut self, pair: VoltagePair) -> Result<f64, SensorReadError>;
}
