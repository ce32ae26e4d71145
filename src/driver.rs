use super::{DelayNs, I2c, RegisterInterface, bisync, only_async, only_sync};
use crate::alert::{AlertFlags, PowerValidWindow};
use crate::field::{self, FULL_MASK};
use crate::units::{
    self, BUS_VOLTAGE_LSB, Channel, SHUNT_VOLTAGE_LSB, ShuntCalibration, WARNING_LIMIT_MAX_CODE,
};
use crate::{
    Averaging, ConversionTime, DIE_ID, Ina3221Error, Ina3221Interface, Ina3221LowLevel,
    MANUFACTURER_ID, OperatingMode,
};

/// Width of the per-channel limit and power-valid fields.
const LIMIT_BITS: u32 = 13;
/// Width of the shunt-voltage sum limit field.
const SUM_LIMIT_BITS: u32 = 15;

/// Interval between conversion-ready polls.
const READY_POLL_INTERVAL_MS: u32 = 50;

#[bisync]
impl<I2cBus, E> RegisterInterface for Ina3221Interface<I2cBus>
where
    I2cBus: I2c<Error = E>,
    E: core::fmt::Debug,
{
    type AddressType = u8;
    type Error = Ina3221Error<E>;

    async fn read_register(
        &mut self,
        address: u8,
        _size_bits: u32,
        data: &mut [u8],
    ) -> Result<(), Self::Error> {
        // Register pointer write, then the big-endian word
        self.i2c
            .write_read(self.address, &[address], data)
            .await
            .map_err(Ina3221Error::I2c)?;
        trace!("read register {:#x}", address);
        Ok(())
    }

    async fn write_register(
        &mut self,
        address: u8,
        _size_bits: u32,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        let mut frame = [address, 0, 0];
        let len = data.len().min(2);
        frame[1..=len].copy_from_slice(&data[..len]);
        self.i2c
            .write(self.address, &frame[..=len])
            .await
            .map_err(Ina3221Error::I2c)?;
        trace!("wrote register {:#x}", address);
        Ok(())
    }
}

pub struct Ina3221<Ifc, D, E> {
    pub ll: Ina3221LowLevel<Ifc>,
    delay: D,
    shunts: [ShuntCalibration; 3],
    /// Mode to restore on [`Ina3221::power_on`]; the part forgets it when powered down.
    last_mode: OperatingMode,
    _marker: core::marker::PhantomData<E>,
}

impl<I2cBus, D, E> Ina3221<Ina3221Interface<I2cBus>, D, E>
where
    I2cBus: I2c<Error = E>,
    D: DelayNs,
    E: core::fmt::Debug,
{
    /// Probe the part at `address` and build a driver for it.
    ///
    /// Fails with [`Ina3221Error::ManufacturerIdMismatch`] or
    /// [`Ina3221Error::DieIdMismatch`] if the device does not identify as an INA3221.
    /// Every channel starts out calibrated for a 0.1 Ω shunt.
    #[bisync]
    pub async fn new(i2c: I2cBus, address: u8, delay: D) -> Result<Self, Ina3221Error<E>> {
        let mut ina = Self {
            ll: Ina3221LowLevel::new(Ina3221Interface::new(i2c, address)),
            delay,
            shunts: [ShuntCalibration::default(); 3],
            last_mode: OperatingMode::ShuntBusContinuous,
            _marker: core::marker::PhantomData,
        };
        ina.verify_identity().await?;
        let mode = ina.get_mode().await?;
        if !mode.is_power_down() {
            ina.last_mode = mode;
        }
        debug!("INA3221 found at {:#x}, mode {:?}", address, mode);
        Ok(ina)
    }
}

pub trait Ina3221RegisterInterface<E>:
    RegisterInterface<AddressType = u8, Error = Ina3221Error<E>>
{
}

impl<T, E> Ina3221RegisterInterface<E> for T
where
    T: RegisterInterface<AddressType = u8, Error = Ina3221Error<E>>,
    E: core::fmt::Debug,
{
}

include!("bisync_helpers.rs");

// Register access
impl<Ifc, D, E> Ina3221<Ifc, D, E>
where
    Ifc: Ina3221RegisterInterface<E>,
    D: DelayNs,
    E: core::fmt::Debug,
{
    /// Read a whole 16-bit register.
    #[bisync]
    pub async fn read_register_raw(&mut self, address: u8) -> Result<u16, Ina3221Error<E>> {
        let mut data = [0u8; 2];
        self.ll
            .interface()
            .read_register(address, 16, &mut data)
            .await?;
        Ok(u16::from_be_bytes(data))
    }

    /// Write a whole 16-bit register.
    #[bisync]
    pub async fn write_register_raw(
        &mut self,
        address: u8,
        value: u16,
    ) -> Result<(), Ina3221Error<E>> {
        self.ll
            .interface()
            .write_register(address, 16, &value.to_be_bytes())
            .await
    }

    /// Read the field selected by `mask`, shifted down to bit 0.
    ///
    /// With `signed` set the field is sign-extended from its top bit.
    #[bisync]
    pub async fn read_register_field(
        &mut self,
        address: u8,
        mask: u16,
        signed: bool,
    ) -> Result<i32, Ina3221Error<E>> {
        let raw = self.read_register_raw(address).await?;
        Ok(field::extract_field(raw, mask, signed))
    }

    /// Replace the field selected by `mask` with `value`.
    ///
    /// Anything narrower than the full word is a read-modify-write.
    ///
    /// # Panics
    ///
    /// If `value` does not fit in the field.
    #[bisync]
    pub async fn write_register_field(
        &mut self,
        address: u8,
        value: u16,
        mask: u16,
    ) -> Result<(), Ina3221Error<E>> {
        let word = if mask == FULL_MASK {
            value
        } else {
            let current = self.read_register_raw(address).await?;
            field::insert_field(current, value, mask)
        };
        self.write_register_raw(address, word).await
    }

    /// Content of the manufacturer ID register, 0x5449 ("TI") on a genuine part.
    #[bisync]
    pub async fn manufacturer_id(&mut self) -> Result<u16, Ina3221Error<E>> {
        let mut op = self.ll.manufacturer_id();
        let reg = read_internal(&mut op).await?;
        Ok(reg.id())
    }

    /// Device ID, bits 15:4 of the die ID register.
    #[bisync]
    pub async fn die_id(&mut self) -> Result<u16, Ina3221Error<E>> {
        let mut op = self.ll.die_id();
        let reg = read_internal(&mut op).await?;
        Ok(reg.device_id())
    }

    /// Die revision, bits 3:0 of the die ID register.
    #[bisync]
    pub async fn die_revision(&mut self) -> Result<u8, Ina3221Error<E>> {
        let mut op = self.ll.die_id();
        let reg = read_internal(&mut op).await?;
        Ok(reg.revision())
    }

    #[bisync]
    async fn verify_identity(&mut self) -> Result<(), Ina3221Error<E>> {
        let manufacturer = self.manufacturer_id().await?;
        if manufacturer != MANUFACTURER_ID {
            error!("manufacturer ID {:#x} is not TI", manufacturer);
            return Err(Ina3221Error::ManufacturerIdMismatch(manufacturer));
        }
        let die = self.die_id().await?;
        if die != DIE_ID {
            error!("die ID {:#x} is not an INA3221", die);
            return Err(Ina3221Error::DieIdMismatch(die));
        }
        Ok(())
    }
}

// Configuration
impl<Ifc, D, E> Ina3221<Ifc, D, E>
where
    Ifc: Ina3221RegisterInterface<E>,
    D: DelayNs,
    E: core::fmt::Debug,
{
    /// Restore power-on defaults. The reset bit clears itself.
    ///
    /// Shunt calibration and the requested mode are host-side and survive the
    /// reset, so a later [`power_on`](Self::power_on) brings the requested mode back.
    #[bisync]
    pub async fn reset(&mut self) -> Result<(), Ina3221Error<E>> {
        let mut op = self.ll.configuration();
        write_internal(&mut op, |r| r.set_reset(true)).await?;
        debug!("reset to power-on defaults");
        Ok(())
    }

    /// Record the shunt resistor fitted to `channel`. No bus traffic.
    ///
    /// # Panics
    ///
    /// If `ohms` is not a positive, finite number.
    pub fn set_shunt_resistor(&mut self, channel: Channel, ohms: f32) {
        self.shunts[channel.index()] = ShuntCalibration::new(ohms);
    }

    /// Host-side scaling in use for `channel`.
    pub fn shunt_calibration(&self, channel: Channel) -> ShuntCalibration {
        self.shunts[channel.index()]
    }

    /// Mode that [`power_on`](Self::power_on) will restore.
    pub fn requested_mode(&self) -> OperatingMode {
        self.last_mode
    }

    /// Write the operating mode.
    ///
    /// Measuring modes are remembered for [`power_on`](Self::power_on); a
    /// power-down request behaves like [`power_off`](Self::power_off).
    #[bisync]
    pub async fn set_mode(&mut self, mode: OperatingMode) -> Result<(), Ina3221Error<E>> {
        self.write_mode(mode).await?;
        if !mode.is_power_down() {
            self.last_mode = mode;
        }
        Ok(())
    }

    /// Operating mode currently held by the device.
    #[bisync]
    pub async fn get_mode(&mut self) -> Result<OperatingMode, Ina3221Error<E>> {
        let mut op = self.ll.configuration();
        let config = read_internal(&mut op).await?;
        Ok(config.mode())
    }

    #[bisync]
    async fn write_mode(&mut self, mode: OperatingMode) -> Result<(), Ina3221Error<E>> {
        let mut op = self.ll.configuration();
        modify_internal(&mut op, |r| r.set_mode(mode)).await?;
        debug!("operating mode {:?}", mode);
        Ok(())
    }

    /// Re-apply the last requested mode and wait for its first conversion to land.
    #[bisync]
    pub async fn power_on(&mut self) -> Result<(), Ina3221Error<E>> {
        let mode = self.last_mode;
        self.write_mode(mode).await?;
        let settle_ms = self.estimate_conversion_time_ms().await?;
        self.delay.delay_ms(settle_ms).await;
        Ok(())
    }

    /// Enter power-down, keeping the requested mode for [`power_on`](Self::power_on).
    #[bisync]
    pub async fn power_off(&mut self) -> Result<(), Ina3221Error<E>> {
        self.write_mode(OperatingMode::PowerDown).await
    }

    /// Select the per-sample bus-voltage conversion time.
    #[bisync]
    pub async fn set_bus_conversion_time(
        &mut self,
        time: ConversionTime,
    ) -> Result<(), Ina3221Error<E>> {
        let mut op = self.ll.configuration();
        modify_internal(&mut op, |r| r.set_bus_conversion_time(time)).await
    }

    /// Per-sample bus-voltage conversion time.
    #[bisync]
    pub async fn bus_conversion_time(&mut self) -> Result<ConversionTime, Ina3221Error<E>> {
        let mut op = self.ll.configuration();
        let config = read_internal(&mut op).await?;
        Ok(config.bus_conversion_time())
    }

    /// Select the per-sample shunt-voltage conversion time.
    #[bisync]
    pub async fn set_shunt_conversion_time(
        &mut self,
        time: ConversionTime,
    ) -> Result<(), Ina3221Error<E>> {
        let mut op = self.ll.configuration();
        modify_internal(&mut op, |r| r.set_shunt_conversion_time(time)).await
    }

    /// Per-sample shunt-voltage conversion time.
    #[bisync]
    pub async fn shunt_conversion_time(&mut self) -> Result<ConversionTime, Ina3221Error<E>> {
        let mut op = self.ll.configuration();
        let config = read_internal(&mut op).await?;
        Ok(config.shunt_conversion_time())
    }

    /// Set how many samples are averaged into each result.
    #[bisync]
    pub async fn set_sampling_rate(&mut self, averaging: Averaging) -> Result<(), Ina3221Error<E>> {
        let mut op = self.ll.configuration();
        modify_internal(&mut op, |r| r.set_averaging(averaging)).await
    }

    /// Number of samples averaged into each result.
    #[bisync]
    pub async fn sampling_rate(&mut self) -> Result<Averaging, Ina3221Error<E>> {
        let mut op = self.ll.configuration();
        let config = read_internal(&mut op).await?;
        Ok(config.averaging())
    }

    /// Include `channel` in the conversion cycle.
    #[bisync]
    pub async fn enable_channel(&mut self, channel: Channel) -> Result<(), Ina3221Error<E>> {
        self.set_channel_enabled(channel, true).await
    }

    /// Skip `channel` in the conversion cycle. Its result registers keep their last value.
    #[bisync]
    pub async fn disable_channel(&mut self, channel: Channel) -> Result<(), Ina3221Error<E>> {
        self.set_channel_enabled(channel, false).await
    }

    #[bisync]
    async fn set_channel_enabled(
        &mut self,
        channel: Channel,
        enabled: bool,
    ) -> Result<(), Ina3221Error<E>> {
        let mut op = self.ll.configuration();
        modify_internal(&mut op, |r| match channel {
            Channel::Ch1 => r.set_ch_1_enable(enabled),
            Channel::Ch2 => r.set_ch_2_enable(enabled),
            Channel::Ch3 => r.set_ch_3_enable(enabled),
        })
        .await
    }

    /// Whether `channel` takes part in conversions.
    #[bisync]
    pub async fn channel_enabled(&mut self, channel: Channel) -> Result<bool, Ina3221Error<E>> {
        let mut op = self.ll.configuration();
        let config = read_internal(&mut op).await?;
        Ok(match channel {
            Channel::Ch1 => config.ch_1_enable(),
            Channel::Ch2 => config.ch_2_enable(),
            Channel::Ch3 => config.ch_3_enable(),
        })
    }

    /// Number of channels taking part in conversions, 0 to 3.
    #[bisync]
    pub async fn enabled_channel_count(&mut self) -> Result<u32, Ina3221Error<E>> {
        let mut op = self.ll.configuration();
        let config = read_internal(&mut op).await?;
        Ok([config.ch_1_enable(), config.ch_2_enable(), config.ch_3_enable()]
            .into_iter()
            .filter(|&enabled| enabled)
            .count() as u32)
    }
}

// Measurement
impl<Ifc, D, E> Ina3221<Ifc, D, E>
where
    Ifc: Ina3221RegisterInterface<E>,
    D: DelayNs,
    E: core::fmt::Debug,
{
    /// Start a fresh conversion cycle.
    ///
    /// Reads the mask/enable register once to clear a stale conversion-ready
    /// flag, then rewrites the current mode to re-arm the converter. In
    /// continuous mode this restarts the cycle immediately. With `wait` set,
    /// blocks in [`wait_until_ready`](Self::wait_until_ready) with the estimated budget.
    #[bisync]
    pub async fn trigger_measurement(&mut self, wait: bool) -> Result<(), Ina3221Error<E>> {
        self.clear_alert().await?;
        let mut op = self.ll.configuration();
        modify_internal(&mut op, |r| {
            let mode = r.mode();
            r.set_mode(mode);
        })
        .await?;
        if wait {
            self.wait_until_ready(None).await?;
        }
        Ok(())
    }

    /// Conversion-ready flag.
    ///
    /// The read clears the flag: a second call right after a `true` reports
    /// `false` until another conversion completes.
    #[bisync]
    pub async fn is_conversion_ready(&mut self) -> Result<bool, Ina3221Error<E>> {
        let mut op = self.ll.mask_enable();
        let status = read_internal(&mut op).await?;
        Ok(status.conversion_ready())
    }

    /// Poll the conversion-ready flag every 50 ms until it is set or
    /// `max_wait_ms` has elapsed. `None` uses
    /// [`estimate_conversion_time_ms`](Self::estimate_conversion_time_ms).
    ///
    /// Returns whether the conversion was seen to complete. Giving up is not an
    /// error; results read afterwards may be stale.
    #[bisync]
    pub async fn wait_until_ready(
        &mut self,
        max_wait_ms: Option<u32>,
    ) -> Result<bool, Ina3221Error<E>> {
        let budget_ms = match max_wait_ms {
            Some(ms) => ms,
            None => self.estimate_conversion_time_ms().await?,
        };
        let mut waited_ms = 0;
        loop {
            if self.is_conversion_ready().await? {
                return Ok(true);
            }
            if waited_ms >= budget_ms {
                warn!("conversion not ready after {} ms", waited_ms);
                return Ok(false);
            }
            let step = READY_POLL_INTERVAL_MS.min(budget_ms - waited_ms);
            self.delay.delay_ms(step).await;
            waited_ms += step;
        }
    }

    /// Worst-case duration of one conversion cycle for the current configuration.
    #[bisync]
    pub async fn estimate_conversion_time_ms(&mut self) -> Result<u32, Ina3221Error<E>> {
        let mut op = self.ll.configuration();
        let config = read_internal(&mut op).await?;
        let channels = [config.ch_1_enable(), config.ch_2_enable(), config.ch_3_enable()]
            .into_iter()
            .filter(|&enabled| enabled)
            .count() as u32;
        Ok(units::conversion_time_estimate_ms(
            config.mode(),
            config.averaging(),
            config.shunt_conversion_time(),
            config.bus_conversion_time(),
            channels,
        ))
    }

    /// Signed shunt-voltage count, or `None` if the channel is disabled.
    #[bisync]
    pub async fn read_shunt_voltage_raw(
        &mut self,
        channel: Channel,
    ) -> Result<Option<i16>, Ina3221Error<E>> {
        if !self.channel_enabled(channel).await? {
            return Ok(None);
        }
        let mut op = self.ll.shunt_voltage(channel.index());
        let reg = read_internal(&mut op).await?;
        Ok(Some(reg.value()))
    }

    /// Signed bus-voltage count, or `None` if the channel is disabled.
    #[bisync]
    pub async fn read_bus_voltage_raw(
        &mut self,
        channel: Channel,
    ) -> Result<Option<i16>, Ina3221Error<E>> {
        if !self.channel_enabled(channel).await? {
            return Ok(None);
        }
        let mut op = self.ll.bus_voltage(channel.index());
        let reg = read_internal(&mut op).await?;
        Ok(Some(reg.value()))
    }

    /// Shunt voltage in volts.
    #[bisync]
    pub async fn read_shunt_voltage(
        &mut self,
        channel: Channel,
    ) -> Result<Option<f32>, Ina3221Error<E>> {
        let count = self.read_shunt_voltage_raw(channel).await?;
        Ok(count.map(|c| f32::from(c) * SHUNT_VOLTAGE_LSB))
    }

    /// Bus voltage in volts.
    #[bisync]
    pub async fn read_bus_voltage(
        &mut self,
        channel: Channel,
    ) -> Result<Option<f32>, Ina3221Error<E>> {
        let count = self.read_bus_voltage_raw(channel).await?;
        Ok(count.map(|c| f32::from(c) * BUS_VOLTAGE_LSB))
    }

    /// Current through the shunt in amps.
    #[bisync]
    pub async fn read_shunt_current(
        &mut self,
        channel: Channel,
    ) -> Result<Option<f32>, Ina3221Error<E>> {
        let count = self.read_shunt_voltage_raw(channel).await?;
        let per_count = self.shunts[channel.index()].current_per_count();
        Ok(count.map(|c| f32::from(c) * per_count))
    }

    /// Load power in watts: bus voltage times shunt current.
    #[bisync]
    pub async fn read_power(&mut self, channel: Channel) -> Result<Option<f32>, Ina3221Error<E>> {
        let bus = self.read_bus_voltage(channel).await?;
        let current = self.read_shunt_current(channel).await?;
        Ok(bus.zip(current).map(|(volts, amps)| volts * amps))
    }

    /// Voltage on the supply side of the shunt: bus voltage plus shunt voltage.
    #[bisync]
    pub async fn read_supply_voltage(
        &mut self,
        channel: Channel,
    ) -> Result<Option<f32>, Ina3221Error<E>> {
        let bus = self.read_bus_voltage(channel).await?;
        let shunt = self.read_shunt_voltage(channel).await?;
        Ok(bus.zip(shunt).map(|(bus, shunt)| bus + shunt))
    }

    /// Sum of the shunt voltages of the summation channels, in volts.
    #[bisync]
    pub async fn read_shunt_voltage_sum(&mut self) -> Result<f32, Ina3221Error<E>> {
        let count = self.read_shunt_voltage_sum_count().await?;
        Ok(f32::from(count) * SHUNT_VOLTAGE_LSB)
    }

    /// Summed current of the summation channels, in amps.
    ///
    /// Fails with [`Ina3221Error::ShuntMismatch`] unless every channel has the
    /// same shunt resistance.
    #[bisync]
    pub async fn read_shunt_current_sum(&mut self) -> Result<f32, Ina3221Error<E>> {
        let per_count = self.uniform_current_per_count()?;
        let count = self.read_shunt_voltage_sum_count().await?;
        Ok(f32::from(count) * per_count)
    }

    #[bisync]
    async fn read_shunt_voltage_sum_count(&mut self) -> Result<i16, Ina3221Error<E>> {
        let mut op = self.ll.shunt_voltage_sum();
        let reg = read_internal(&mut op).await?;
        Ok(reg.value())
    }
}

// Alerting
impl<Ifc, D, E> Ina3221<Ifc, D, E>
where
    Ifc: Ina3221RegisterInterface<E>,
    D: DelayNs,
    E: core::fmt::Debug,
{
    /// Set the critical limit as a shunt voltage.
    ///
    /// Shares its register with [`set_critical_threshold_current`](Self::set_critical_threshold_current):
    /// the last write wins. The value is not clamped.
    ///
    /// # Panics
    ///
    /// If the value is outside the register's signed range.
    #[bisync]
    pub async fn set_critical_threshold_voltage(
        &mut self,
        channel: Channel,
        volts: f32,
    ) -> Result<(), Ina3221Error<E>> {
        let code = units::round_to_code(volts / SHUNT_VOLTAGE_LSB);
        self.write_critical_code(channel, code).await
    }

    /// Set the critical limit as a current through the channel's shunt.
    ///
    /// # Panics
    ///
    /// If the value is outside the register's signed range.
    #[bisync]
    pub async fn set_critical_threshold_current(
        &mut self,
        channel: Channel,
        amps: f32,
    ) -> Result<(), Ina3221Error<E>> {
        let per_count = self.shunts[channel.index()].current_per_count();
        let code = units::round_to_code(amps / per_count);
        self.write_critical_code(channel, code).await
    }

    #[bisync]
    async fn write_critical_code(
        &mut self,
        channel: Channel,
        code: i32,
    ) -> Result<(), Ina3221Error<E>> {
        let code = field::fit_signed(code, LIMIT_BITS);
        let mut op = self.ll.critical_limit(channel.index());
        modify_internal(&mut op, |r| r.set_value(code)).await
    }

    #[bisync]
    async fn read_critical_code(&mut self, channel: Channel) -> Result<i16, Ina3221Error<E>> {
        let mut op = self.ll.critical_limit(channel.index());
        let reg = read_internal(&mut op).await?;
        Ok(reg.value())
    }

    /// Critical limit of `channel` as a shunt voltage.
    #[bisync]
    pub async fn critical_threshold_voltage(
        &mut self,
        channel: Channel,
    ) -> Result<f32, Ina3221Error<E>> {
        let code = self.read_critical_code(channel).await?;
        Ok(f32::from(code) * SHUNT_VOLTAGE_LSB)
    }

    /// Critical limit of `channel` as a current through its shunt.
    #[bisync]
    pub async fn critical_threshold_current(
        &mut self,
        channel: Channel,
    ) -> Result<f32, Ina3221Error<E>> {
        let code = self.read_critical_code(channel).await?;
        Ok(f32::from(code) * self.shunts[channel.index()].current_per_count())
    }

    /// Set the warning limit as a shunt voltage, clamped to the register's
    /// `0..=4095` count range.
    #[bisync]
    pub async fn set_warning_threshold_voltage(
        &mut self,
        channel: Channel,
        volts: f32,
    ) -> Result<(), Ina3221Error<E>> {
        let code = units::round_to_code(volts / SHUNT_VOLTAGE_LSB);
        self.write_warning_code(channel, code).await
    }

    /// Set the warning limit as a current, clamped like
    /// [`set_warning_threshold_voltage`](Self::set_warning_threshold_voltage).
    #[bisync]
    pub async fn set_warning_threshold_current(
        &mut self,
        channel: Channel,
        amps: f32,
    ) -> Result<(), Ina3221Error<E>> {
        let per_count = self.shunts[channel.index()].current_per_count();
        let code = units::round_to_code(amps / per_count);
        self.write_warning_code(channel, code).await
    }

    #[bisync]
    async fn write_warning_code(
        &mut self,
        channel: Channel,
        code: i32,
    ) -> Result<(), Ina3221Error<E>> {
        let clamped = code.clamp(0, WARNING_LIMIT_MAX_CODE);
        if clamped != code {
            debug!("warning limit {} clamped to {}", code, clamped);
        }
        let code = field::fit_signed(clamped, LIMIT_BITS);
        let mut op = self.ll.warning_limit(channel.index());
        modify_internal(&mut op, |r| r.set_value(code)).await
    }

    #[bisync]
    async fn read_warning_code(&mut self, channel: Channel) -> Result<i16, Ina3221Error<E>> {
        let mut op = self.ll.warning_limit(channel.index());
        let reg = read_internal(&mut op).await?;
        Ok(reg.value())
    }

    /// Warning limit of `channel` as a shunt voltage.
    #[bisync]
    pub async fn warning_threshold_voltage(
        &mut self,
        channel: Channel,
    ) -> Result<f32, Ina3221Error<E>> {
        let code = self.read_warning_code(channel).await?;
        Ok(f32::from(code) * SHUNT_VOLTAGE_LSB)
    }

    /// Warning limit of `channel` as a current through its shunt.
    #[bisync]
    pub async fn warning_threshold_current(
        &mut self,
        channel: Channel,
    ) -> Result<f32, Ina3221Error<E>> {
        let code = self.read_warning_code(channel).await?;
        Ok(f32::from(code) * self.shunts[channel.index()].current_per_count())
    }

    /// Bus voltage all three channels must reach for power to become valid.
    ///
    /// # Panics
    ///
    /// If the value is outside the register's signed range.
    #[bisync]
    pub async fn set_power_valid_upper_limit(&mut self, volts: f32) -> Result<(), Ina3221Error<E>> {
        let code = field::fit_signed(units::round_to_code(volts / BUS_VOLTAGE_LSB), LIMIT_BITS);
        let mut op = self.ll.power_valid_upper_limit();
        modify_internal(&mut op, |r| r.set_value(code)).await
    }

    /// Power-valid upper limit in volts.
    #[bisync]
    pub async fn power_valid_upper_limit(&mut self) -> Result<f32, Ina3221Error<E>> {
        let mut op = self.ll.power_valid_upper_limit();
        let reg = read_internal(&mut op).await?;
        Ok(f32::from(reg.value()) * BUS_VOLTAGE_LSB)
    }

    /// Bus voltage below which any channel drops power-valid.
    ///
    /// # Panics
    ///
    /// If the value is outside the register's signed range.
    #[bisync]
    pub async fn set_power_valid_lower_limit(&mut self, volts: f32) -> Result<(), Ina3221Error<E>> {
        let code = field::fit_signed(units::round_to_code(volts / BUS_VOLTAGE_LSB), LIMIT_BITS);
        let mut op = self.ll.power_valid_lower_limit();
        modify_internal(&mut op, |r| r.set_value(code)).await
    }

    /// Power-valid lower limit in volts.
    #[bisync]
    pub async fn power_valid_lower_limit(&mut self) -> Result<f32, Ina3221Error<E>> {
        let mut op = self.ll.power_valid_lower_limit();
        let reg = read_internal(&mut op).await?;
        Ok(f32::from(reg.value()) * BUS_VOLTAGE_LSB)
    }

    /// Host-side model of the power-valid comparator, loaded with the
    /// device's current limits. Starts out invalid.
    #[bisync]
    pub async fn power_valid_window(&mut self) -> Result<PowerValidWindow, Ina3221Error<E>> {
        let upper = self.power_valid_upper_limit().await?;
        let lower = self.power_valid_lower_limit().await?;
        Ok(PowerValidWindow::new(upper, lower))
    }

    /// The sum register adds raw shunt-voltage counts, so it only maps to a
    /// current when every shunt has the same resistance.
    fn uniform_current_per_count(&self) -> Result<f32, Ina3221Error<E>> {
        let reference = self.shunts[0];
        if self
            .shunts
            .iter()
            .all(|s| s.resistance_ohms() == reference.resistance_ohms())
        {
            Ok(reference.current_per_count())
        } else {
            warn!("summation rejected, shunt resistances differ");
            Err(Ina3221Error::ShuntMismatch)
        }
    }

    /// Set the shunt-voltage sum limit in volts.
    ///
    /// Fails with [`Ina3221Error::ShuntMismatch`], without touching the
    /// device, unless every channel has the same shunt resistance.
    ///
    /// # Panics
    ///
    /// If the value is outside the register's signed range.
    #[bisync]
    pub async fn set_summation_limit_voltage(&mut self, volts: f32) -> Result<(), Ina3221Error<E>> {
        self.uniform_current_per_count()?;
        let code = units::round_to_code(volts / SHUNT_VOLTAGE_LSB);
        self.write_summation_code(code).await
    }

    /// Set the shunt-voltage sum limit as a total current.
    ///
    /// Same preconditions as [`set_summation_limit_voltage`](Self::set_summation_limit_voltage).
    #[bisync]
    pub async fn set_summation_limit_current(&mut self, amps: f32) -> Result<(), Ina3221Error<E>> {
        let per_count = self.uniform_current_per_count()?;
        let code = units::round_to_code(amps / per_count);
        self.write_summation_code(code).await
    }

    #[bisync]
    async fn write_summation_code(&mut self, code: i32) -> Result<(), Ina3221Error<E>> {
        let code = field::fit_signed(code, SUM_LIMIT_BITS);
        let mut op = self.ll.shunt_voltage_sum_limit();
        modify_internal(&mut op, |r| r.set_value(code)).await
    }

    #[bisync]
    async fn read_summation_code(&mut self) -> Result<i16, Ina3221Error<E>> {
        let mut op = self.ll.shunt_voltage_sum_limit();
        let reg = read_internal(&mut op).await?;
        Ok(reg.value())
    }

    /// Shunt-voltage sum limit in volts. Needs uniform shunts like the setters.
    #[bisync]
    pub async fn summation_limit_voltage(&mut self) -> Result<f32, Ina3221Error<E>> {
        self.uniform_current_per_count()?;
        let code = self.read_summation_code().await?;
        Ok(f32::from(code) * SHUNT_VOLTAGE_LSB)
    }

    /// Shunt-voltage sum limit as a total current.
    #[bisync]
    pub async fn summation_limit_current(&mut self) -> Result<f32, Ina3221Error<E>> {
        let per_count = self.uniform_current_per_count()?;
        let code = self.read_summation_code().await?;
        Ok(f32::from(code) * per_count)
    }

    /// Include `channel` in the shunt-voltage sum.
    ///
    /// This is a read-modify-write of the mask/enable register and so clears
    /// any pending read-to-clear flags.
    #[bisync]
    pub async fn enable_summation(&mut self, channel: Channel) -> Result<(), Ina3221Error<E>> {
        self.set_summation_enabled(channel, true).await
    }

    /// Exclude `channel` from the shunt-voltage sum. Clears read-to-clear flags.
    #[bisync]
    pub async fn disable_summation(&mut self, channel: Channel) -> Result<(), Ina3221Error<E>> {
        self.set_summation_enabled(channel, false).await
    }

    #[bisync]
    async fn set_summation_enabled(
        &mut self,
        channel: Channel,
        enabled: bool,
    ) -> Result<(), Ina3221Error<E>> {
        let mut op = self.ll.mask_enable();
        modify_internal(&mut op, |r| match channel {
            Channel::Ch1 => r.set_summation_ch_1(enabled),
            Channel::Ch2 => r.set_summation_ch_2(enabled),
            Channel::Ch3 => r.set_summation_ch_3(enabled),
        })
        .await
    }

    /// Whether `channel` takes part in summation. Clears read-to-clear flags.
    #[bisync]
    pub async fn channel_summation_enabled(
        &mut self,
        channel: Channel,
    ) -> Result<bool, Ina3221Error<E>> {
        let mut op = self.ll.mask_enable();
        let status = read_internal(&mut op).await?;
        Ok(match channel {
            Channel::Ch1 => status.summation_ch_1(),
            Channel::Ch2 => status.summation_ch_2(),
            Channel::Ch3 => status.summation_ch_3(),
        })
    }

    /// Keep critical flags and the critical pin asserted until the status register is read.
    #[bisync]
    pub async fn enable_critical_alert_latching(&mut self) -> Result<(), Ina3221Error<E>> {
        let mut op = self.ll.mask_enable();
        modify_internal(&mut op, |r| r.set_critical_latch(true)).await
    }

    /// Let critical flags follow each conversion result.
    #[bisync]
    pub async fn disable_critical_alert_latching(&mut self) -> Result<(), Ina3221Error<E>> {
        let mut op = self.ll.mask_enable();
        modify_internal(&mut op, |r| r.set_critical_latch(false)).await
    }

    /// Keep warning flags and the warning pin asserted until the status register is read.
    #[bisync]
    pub async fn enable_warning_alert_latching(&mut self) -> Result<(), Ina3221Error<E>> {
        let mut op = self.ll.mask_enable();
        modify_internal(&mut op, |r| r.set_warning_latch(true)).await
    }

    /// Let warning flags follow each averaged result.
    #[bisync]
    pub async fn disable_warning_alert_latching(&mut self) -> Result<(), Ina3221Error<E>> {
        let mut op = self.ll.mask_enable();
        modify_internal(&mut op, |r| r.set_warning_latch(false)).await
    }

    /// Decode every flag of the mask/enable register from one read.
    ///
    /// The read clears the conversion-ready, warning, critical and summation flags.
    ///
    /// # Example
    /// ```rust,no_run
    /// # use embedded_hal::{i2c::I2c, delay::DelayNs};
    /// # use ina3221_dd::{Channel, Ina3221, DEFAULT_ADDRESS};
    /// # fn demo<I: I2c, D: DelayNs>(i2c: I, delay: D) -> Result<(), ina3221_dd::Ina3221Error<I::Error>> {
    /// # let mut ina = Ina3221::new(i2c, DEFAULT_ADDRESS, delay)?;
    /// let flags = ina.read_alert_flags()?;
    /// if flags.critical(Channel::Ch1) {
    ///     // Overcurrent on channel 1
    /// }
    /// if flags.power_invalid() {
    ///     // A rail dropped below the power-valid window
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[bisync]
    pub async fn read_alert_flags(&mut self) -> Result<AlertFlags, Ina3221Error<E>> {
        let mut op = self.ll.mask_enable();
        let status = read_internal(&mut op).await?;
        Ok(AlertFlags {
            conversion_ready: status.conversion_ready(),
            timing_control: status.timing_control(),
            power_valid: status.power_valid(),
            summation: status.summation_alert(),
            warning: [status.warning_ch_1(), status.warning_ch_2(), status.warning_ch_3()],
            critical: [
                status.critical_ch_1(),
                status.critical_ch_2(),
                status.critical_ch_3(),
            ],
        })
    }

    /// Critical-alert flag of `channel`. Clears read-to-clear flags.
    #[bisync]
    pub async fn critical_alert(&mut self, channel: Channel) -> Result<bool, Ina3221Error<E>> {
        Ok(self.read_alert_flags().await?.critical(channel))
    }

    /// Warning-alert flag of `channel`. Clears read-to-clear flags.
    #[bisync]
    pub async fn current_warning_alert(
        &mut self,
        channel: Channel,
    ) -> Result<bool, Ina3221Error<E>> {
        Ok(self.read_alert_flags().await?.warning(channel))
    }

    /// Summation-alert flag. Clears read-to-clear flags.
    #[bisync]
    pub async fn summation_alert(&mut self) -> Result<bool, Ina3221Error<E>> {
        Ok(self.read_alert_flags().await?.summation)
    }

    /// True while the power-valid flag is low. Not cleared by reading.
    #[bisync]
    pub async fn power_invalid_alert(&mut self) -> Result<bool, Ina3221Error<E>> {
        Ok(self.read_alert_flags().await?.power_invalid())
    }

    /// Timing-control flag. Not cleared by reading.
    #[bisync]
    pub async fn timing_control_alert(&mut self) -> Result<bool, Ina3221Error<E>> {
        Ok(self.read_alert_flags().await?.timing_control)
    }

    /// Read and discard the mask/enable register, clearing the read-to-clear flags.
    #[bisync]
    pub async fn clear_alert(&mut self) -> Result<(), Ina3221Error<E>> {
        let mut op = self.ll.mask_enable();
        read_internal(&mut op).await?;
        Ok(())
    }
}
