mod common;

use common::RecordingDelay;
use embedded_hal::i2c::ErrorKind;
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
use ina3221_dd::{Address, Channel, Ina3221, Ina3221Error, OperatingMode};

const ADDR: u8 = 0x40;

fn probe() -> Vec<I2cTransaction> {
    vec![
        I2cTransaction::write_read(ADDR, vec![0xFE], vec![0x54, 0x49]),
        I2cTransaction::write_read(ADDR, vec![0xFF], vec![0x32, 0x20]),
        I2cTransaction::write_read(ADDR, vec![0x00], vec![0x71, 0x27]),
    ]
}

fn with_probe(rest: Vec<I2cTransaction>) -> Vec<I2cTransaction> {
    let mut expectations = probe();
    expectations.extend(rest);
    expectations
}

#[test]
fn probe_sequence() {
    let mut i2c = I2cMock::new(&probe());
    let ina = Ina3221::new(i2c.clone(), Address::Gnd.into(), RecordingDelay::new()).unwrap();
    assert_eq!(ina.requested_mode(), OperatingMode::ShuntBusContinuous);
    i2c.done();
}

#[test]
fn wrong_manufacturer_stops_the_probe() {
    let expectations = [I2cTransaction::write_read(ADDR, vec![0xFE], vec![0x12, 0x34])];
    let mut i2c = I2cMock::new(&expectations);
    let result = Ina3221::new(i2c.clone(), ADDR, RecordingDelay::new());
    assert!(matches!(result, Err(Ina3221Error::ManufacturerIdMismatch(0x1234))));
    i2c.done();
}

#[test]
fn wrong_die_stops_the_probe() {
    let expectations = [
        I2cTransaction::write_read(ADDR, vec![0xFE], vec![0x54, 0x49]),
        I2cTransaction::write_read(ADDR, vec![0xFF], vec![0x22, 0x60]),
    ];
    let mut i2c = I2cMock::new(&expectations);
    let result = Ina3221::new(i2c.clone(), ADDR, RecordingDelay::new());
    assert!(matches!(result, Err(Ina3221Error::DieIdMismatch(0x226))));
    i2c.done();
}

#[test]
fn bus_error_during_probe() {
    let expectations =
        [I2cTransaction::write_read(ADDR, vec![0xFE], vec![0x00, 0x00]).with_error(ErrorKind::Other)];
    let mut i2c = I2cMock::new(&expectations);
    let result = Ina3221::new(i2c.clone(), ADDR, RecordingDelay::new());
    assert!(matches!(result, Err(Ina3221Error::I2c(ErrorKind::Other))));
    i2c.done();
}

#[test]
fn alternate_address() {
    let expectations = [
        I2cTransaction::write_read(0x43, vec![0xFE], vec![0x54, 0x49]),
        I2cTransaction::write_read(0x43, vec![0xFF], vec![0x32, 0x20]),
        I2cTransaction::write_read(0x43, vec![0x00], vec![0x71, 0x27]),
    ];
    let mut i2c = I2cMock::new(&expectations);
    Ina3221::new(i2c.clone(), Address::Scl.into(), RecordingDelay::new()).unwrap();
    i2c.done();
}

#[test]
fn critical_limit_write_is_big_endian() {
    let mut i2c = I2cMock::new(&with_probe(vec![
        I2cTransaction::write_read(ADDR, vec![0x07], vec![0x7F, 0xF8]),
        I2cTransaction::write(ADDR, vec![0x07, 0x4E, 0x20]),
    ]));
    let mut ina = Ina3221::new(i2c.clone(), ADDR, RecordingDelay::new()).unwrap();
    ina.set_shunt_resistor(Channel::Ch1, 0.1);
    ina.set_critical_threshold_current(Channel::Ch1, 1.0).unwrap();
    i2c.done();
}

#[test]
fn shunt_read_checks_channel_enable_first() {
    let mut i2c = I2cMock::new(&with_probe(vec![
        I2cTransaction::write_read(ADDR, vec![0x00], vec![0x71, 0x27]),
        I2cTransaction::write_read(ADDR, vec![0x03], vec![0x0F, 0xF8]),
        // channel 2 disabled: no value register access
        I2cTransaction::write_read(ADDR, vec![0x00], vec![0x51, 0x27]),
    ]));
    let mut ina = Ina3221::new(i2c.clone(), ADDR, RecordingDelay::new()).unwrap();
    assert_eq!(ina.read_shunt_voltage_raw(Channel::Ch2).unwrap(), Some(511));
    assert_eq!(ina.read_shunt_voltage_raw(Channel::Ch2).unwrap(), None);
    i2c.done();
}

#[test]
fn conversion_ready_is_read_from_the_device_each_time() {
    let mut i2c = I2cMock::new(&with_probe(vec![
        I2cTransaction::write_read(ADDR, vec![0x0F], vec![0x00, 0x03]),
        I2cTransaction::write_read(ADDR, vec![0x0F], vec![0x00, 0x02]),
    ]));
    let mut ina = Ina3221::new(i2c.clone(), ADDR, RecordingDelay::new()).unwrap();
    assert!(ina.is_conversion_ready().unwrap());
    assert!(!ina.is_conversion_ready().unwrap());
    i2c.done();
}

#[test]
fn summation_mismatch_stays_off_the_bus() {
    let mut i2c = I2cMock::new(&probe());
    let mut ina = Ina3221::new(i2c.clone(), ADDR, RecordingDelay::new()).unwrap();
    ina.set_shunt_resistor(Channel::Ch3, 0.02);
    assert!(matches!(
        ina.set_summation_limit_current(1.0),
        Err(Ina3221Error::ShuntMismatch)
    ));
    i2c.done();
}

#[test]
fn power_off_clears_only_mode_bits() {
    let mut i2c = I2cMock::new(&with_probe(vec![
        I2cTransaction::write_read(ADDR, vec![0x00], vec![0x7D, 0x2D]),
        I2cTransaction::write(ADDR, vec![0x00, 0x7D, 0x28]),
    ]));
    let mut ina = Ina3221::new(i2c.clone(), ADDR, RecordingDelay::new()).unwrap();
    ina.power_off().unwrap();
    assert_eq!(ina.requested_mode(), OperatingMode::ShuntBusContinuous);
    i2c.done();
}
