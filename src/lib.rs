#![cfg_attr(not(any(test, feature = "std")), no_std)]
//! # INA3221 Triple-Channel Power Monitor Interface
//!
//! This crate provides a bisync-based driver for the TI INA3221 triple-channel
//! shunt and bus voltage monitor, built upon the `device-driver` crate for
//! declarative register definitions via a YAML manifest. It supports both
//! asynchronous (`async`) and blocking operation through a unified API, using the
//! [`bisync`](https://docs.rs/bisync) crate for compatibility with both
//! `embedded-hal` and `embedded-hal-async` traits.
//!
//! ## Features
//!
//! *   **Declarative Register Map:** Full device register map defined in `device.yaml`.
//! *   **Unified Async/Blocking Support:** One driver source, usable from both contexts.
//! *   **Physical Units:** Shunt voltage, bus voltage, current, power and supply voltage
//!     in volts, amps and watts, scaled by host-side shunt calibration.
//! *   **Alerting:** Critical/warning limits, power-valid window, shunt-voltage summation
//!     and decoding of the status flags.
//! *   **`defmt` and `log` Integration:** Optional support for logging and debugging.
//!
//! ## Getting Started
//!
//! Instantiate `Ina3221` (blocking) or `Ina3221Async` (async) with your I2C bus and
//! a delay provider. Construction probes the manufacturer and die ID registers and
//! fails if the part is not an INA3221.
//!
//! ```rust,no_run
//! # use embedded_hal::{i2c::I2c, delay::DelayNs};
//! # use ina3221_dd::{Channel, Ina3221, DEFAULT_ADDRESS};
//! # fn demo<I: I2c, D: DelayNs>(i2c: I, delay: D) -> Result<(), ina3221_dd::Ina3221Error<I::Error>> {
//! let mut ina = Ina3221::new(i2c, DEFAULT_ADDRESS, delay)?;
//! ina.set_shunt_resistor(Channel::Ch1, 0.1);
//! ina.trigger_measurement(true)?;
//! if let Some(amps) = ina.read_shunt_current(Channel::Ch1)? {
//!     // ...
//! #   let _ = amps;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! For async environments, use `Ina3221Async` the same way and `.await` each call.
//!
//! ## Read-to-clear status
//!
//! ***Caution!*** Reading the mask/enable register (0x0F) clears the conversion-ready,
//! warning, critical and summation flags. Every method that reads a flag performs
//! such a read, and so does every method that modifies summation or latch settings.
//! Use [`Ina3221::read_alert_flags`] to capture all flags at once.

#[macro_use]
pub(crate) mod fmt;

pub mod alert;
pub mod field;
pub mod units;

use thiserror::Error;

pub use alert::{AlertFlags, PowerValidWindow};
pub use units::{Channel, ShuntCalibration};

device_driver::create_device!(device_name: Ina3221LowLevel, manifest: "device.yaml");

/// Expected content of the manufacturer ID register ("TI").
pub const MANUFACTURER_ID: u16 = 0x5449;
/// Expected device ID in bits 15:4 of the die ID register.
pub const DIE_ID: u16 = 0x322;
/// Bus address with A0 tied to ground.
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Bus address selected by the A0 strap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Address {
    Gnd = 0x40,
    Vs = 0x41,
    Sda = 0x42,
    Scl = 0x43,
}

impl From<Address> for u8 {
    fn from(address: Address) -> u8 {
        address as u8
    }
}

#[derive(Debug, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ina3221Error<I2cErr> {
    #[error("I2C error")]
    I2c(I2cErr),
    #[error("unexpected manufacturer ID {0:#06x}")]
    ManufacturerIdMismatch(u16),
    #[error("unexpected die ID {0:#05x}")]
    DieIdMismatch(u16),
    #[error("summation needs the same shunt resistance on every channel")]
    ShuntMismatch,
}

pub struct Ina3221Interface<I2cBus> {
    i2c: I2cBus,
    address: u8,
}

impl<I2cBus> Ina3221Interface<I2cBus> {
    pub fn new(i2c: I2cBus, address: u8) -> Self {
        Self { i2c, address }
    }
}

#[path = "."]
mod asynchronous {
    use bisync::asynchronous::*;
    use device_driver::AsyncRegisterInterface as RegisterInterface;
    use embedded_hal_async::delay::DelayNs;
    use embedded_hal_async::i2c::I2c;
    mod driver;
    pub use driver::*;
}
pub use asynchronous::Ina3221 as Ina3221Async;

#[path = "."]
mod blocking {
    use bisync::synchronous::*;
    use device_driver::RegisterInterface;
    use embedded_hal::delay::DelayNs;
    use embedded_hal::i2c::I2c;
    #[allow(clippy::duplicate_mod)]
    mod driver;
    pub use driver::*;
}
pub use blocking::Ina3221;
