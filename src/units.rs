use crate::{Averaging, ConversionTime, OperatingMode};

/// Shunt-voltage resolution in volts per count.
pub const SHUNT_VOLTAGE_LSB: f32 = 40e-6;
/// Bus-voltage resolution in volts per count.
pub const BUS_VOLTAGE_LSB: f32 = 8e-3;
/// Full-scale shunt-voltage range in volts.
pub const SHUNT_FULL_SCALE_VOLTAGE: f32 = 0.1638;
/// Largest code accepted by the warning limit registers. Warning limits are
/// clamped to `0..=WARNING_LIMIT_MAX_CODE`.
pub const WARNING_LIMIT_MAX_CODE: i32 = 4095;
/// Shunt resistance assumed for every channel until configured.
pub const DEFAULT_SHUNT_OHMS: f32 = 0.1;

/// Added on top of the datasheet conversion time, in percent.
const CONVERSION_MARGIN_PERCENT: u32 = 10;

/// One of the three monitor channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Ch1,
    Ch2,
    Ch3,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Ch1, Channel::Ch2, Channel::Ch3];

    /// Channel from its 1-based number.
    ///
    /// # Panics
    ///
    /// If `number` is not in `1..=3`.
    pub const fn from_index(number: u8) -> Self {
        match number {
            1 => Channel::Ch1,
            2 => Channel::Ch2,
            3 => Channel::Ch3,
            _ => panic!("channel must be in 1..=3"),
        }
    }

    /// 1-based channel number.
    pub const fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    /// 0-based index, as used by the repeated register blocks.
    pub const fn index(self) -> usize {
        match self {
            Channel::Ch1 => 0,
            Channel::Ch2 => 1,
            Channel::Ch3 => 2,
        }
    }
}

impl TryFrom<u8> for Channel {
    type Error = u8;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        match number {
            1..=3 => Ok(Channel::from_index(number)),
            other => Err(other),
        }
    }
}

/// Host-side scaling for one channel's shunt resistor.
///
/// The part has no calibration register; these figures only live in the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ShuntCalibration {
    resistance_ohms: f32,
    current_per_count: f32,
    full_scale_current: f32,
}

impl ShuntCalibration {
    /// # Panics
    ///
    /// If `resistance_ohms` is not a positive, finite number.
    pub fn new(resistance_ohms: f32) -> Self {
        assert!(
            resistance_ohms.is_finite() && resistance_ohms > 0.0,
            "shunt resistance must be positive"
        );
        Self {
            resistance_ohms,
            current_per_count: SHUNT_VOLTAGE_LSB / resistance_ohms,
            full_scale_current: SHUNT_FULL_SCALE_VOLTAGE / resistance_ohms,
        }
    }

    pub fn resistance_ohms(&self) -> f32 {
        self.resistance_ohms
    }

    /// Amps represented by one shunt-voltage count.
    pub fn current_per_count(&self) -> f32 {
        self.current_per_count
    }

    /// Current at which the shunt voltage reaches full scale.
    pub fn full_scale_current(&self) -> f32 {
        self.full_scale_current
    }
}

impl Default for ShuntCalibration {
    fn default() -> Self {
        Self::new(DEFAULT_SHUNT_OHMS)
    }
}

/// Round half away from zero to the nearest register code.
pub fn round_to_code(value: f32) -> i32 {
    if value >= 0.0 {
        (value + 0.5) as i32
    } else {
        (value - 0.5) as i32
    }
}

impl OperatingMode {
    pub const fn is_power_down(self) -> bool {
        matches!(self, OperatingMode::PowerDown | OperatingMode::PowerDownAlt)
    }

    pub const fn measures_shunt(self) -> bool {
        matches!(
            self,
            OperatingMode::ShuntTriggered
                | OperatingMode::ShuntBusTriggered
                | OperatingMode::ShuntContinuous
                | OperatingMode::ShuntBusContinuous
        )
    }

    pub const fn measures_bus(self) -> bool {
        matches!(
            self,
            OperatingMode::BusTriggered
                | OperatingMode::ShuntBusTriggered
                | OperatingMode::BusContinuous
                | OperatingMode::ShuntBusContinuous
        )
    }

    pub const fn is_continuous(self) -> bool {
        matches!(
            self,
            OperatingMode::ShuntContinuous
                | OperatingMode::BusContinuous
                | OperatingMode::ShuntBusContinuous
        )
    }
}

impl ConversionTime {
    /// Conversion time of one sample in microseconds.
    pub const fn micros(self) -> u32 {
        match self {
            ConversionTime::Us140 => 140,
            ConversionTime::Us204 => 204,
            ConversionTime::Us332 => 332,
            ConversionTime::Us588 => 588,
            ConversionTime::Us1100 => 1100,
            ConversionTime::Us2116 => 2116,
            ConversionTime::Us4156 => 4156,
            ConversionTime::Us8244 => 8244,
        }
    }
}

impl Averaging {
    pub const fn samples(self) -> u32 {
        match self {
            Averaging::Samples1 => 1,
            Averaging::Samples4 => 4,
            Averaging::Samples16 => 16,
            Averaging::Samples64 => 64,
            Averaging::Samples128 => 128,
            Averaging::Samples256 => 256,
            Averaging::Samples512 => 512,
            Averaging::Samples1024 => 1024,
        }
    }
}

/// Worst-case time for one full conversion cycle, in whole milliseconds.
///
/// Sums the shunt and/or bus conversion time selected by `mode`, scales by the
/// averaging count and the number of enabled channels, adds a 10% margin and
/// rounds up. Never returns less than 1.
pub fn conversion_time_estimate_ms(
    mode: OperatingMode,
    averaging: Averaging,
    shunt_time: ConversionTime,
    bus_time: ConversionTime,
    enabled_channels: u32,
) -> u32 {
    let mut per_sample_us = 0u64;
    if mode.measures_shunt() {
        per_sample_us += u64::from(shunt_time.micros());
    }
    if mode.measures_bus() {
        per_sample_us += u64::from(bus_time.micros());
    }
    let cycle_us = per_sample_us * u64::from(averaging.samples()) * u64::from(enabled_channels);
    let with_margin_us = cycle_us * u64::from(100 + CONVERSION_MARGIN_PERCENT);
    let ms = with_margin_us.div_ceil(100 * 1000).max(1);
    u32::try_from(ms).unwrap_or(u32::MAX)
}
