use crate::units::Channel;

/// Power-valid upper limit after reset, in volts.
pub const DEFAULT_POWER_VALID_UPPER: f32 = 10.0;
/// Power-valid lower limit after reset, in volts.
pub const DEFAULT_POWER_VALID_LOWER: f32 = 9.0;

/// Every flag of the mask/enable register, decoded from a single read.
///
/// The conversion-ready, warning, critical and summation flags are cleared by
/// the read that produced this snapshot. The power-valid and timing-control
/// flags follow the physical condition and are not cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlertFlags {
    pub conversion_ready: bool,
    pub timing_control: bool,
    pub power_valid: bool,
    pub summation: bool,
    /// Indexed by [`Channel::index`].
    pub warning: [bool; 3],
    /// Indexed by [`Channel::index`].
    pub critical: [bool; 3],
}

impl AlertFlags {
    pub fn critical(&self, channel: Channel) -> bool {
        self.critical[channel.index()]
    }

    pub fn warning(&self, channel: Channel) -> bool {
        self.warning[channel.index()]
    }

    pub fn power_invalid(&self) -> bool {
        !self.power_valid
    }

    /// True if any alert condition (not counting conversion-ready) is flagged.
    pub fn any_alert(&self) -> bool {
        self.summation
            || self.timing_control
            || self.power_invalid()
            || self.warning.iter().any(|&f| f)
            || self.critical.iter().any(|&f| f)
    }
}

/// Model of the on-chip power-valid comparator.
///
/// The output becomes valid only once all three bus voltages are at or above
/// the upper limit, and stays valid until any of them falls below the lower
/// limit. Disabled channels take part like any other.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerValidWindow {
    upper: f32,
    lower: f32,
    valid: bool,
}

impl PowerValidWindow {
    /// Starts out invalid.
    pub fn new(upper: f32, lower: f32) -> Self {
        Self {
            upper,
            lower,
            valid: false,
        }
    }

    pub fn upper(&self) -> f32 {
        self.upper
    }

    pub fn lower(&self) -> f32 {
        self.lower
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Feed one set of bus voltages (volts) and return the resulting state.
    pub fn update(&mut self, bus_voltages: [f32; 3]) -> bool {
        if self.valid {
            if bus_voltages.iter().any(|&v| v < self.lower) {
                self.valid = false;
            }
        } else if bus_voltages.iter().all(|&v| v >= self.upper) {
            self.valid = true;
        }
        self.valid
    }
}

impl Default for PowerValidWindow {
    fn default() -> Self {
        Self::new(DEFAULT_POWER_VALID_UPPER, DEFAULT_POWER_VALID_LOWER)
    }
}
