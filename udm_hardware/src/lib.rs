//! Peripheral backends for the distance meter.
//!
//! The simulation backend is always built; the Raspberry Pi GPIO backend is
//! behind the `hardware` feature.
pub mod eeprom;
pub mod error;
#[cfg(feature = "hardware")]
pub mod gpio;
pub mod sim;
pub mod util;

pub use eeprom::{FileEeprom, MemoryEeprom};
pub use sim::{SensorFault, SimTrigger, SimulatedButtons, SimulatedPanel, SimulatedSensor};
