#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};

pub const ADDRESS: u8 = 0x40;

const MASK_ENABLE: u8 = 0x0F;
const CONVERSION_READY: u16 = 1 << 0;
/// Flags cleared by reading the mask/enable register.
const READ_TO_CLEAR: u16 = 0b11_1111_1001;
/// Bits of the mask/enable register the host can write.
const MASK_ENABLE_WRITABLE: u16 = 0x7C00;

fn power_on_registers() -> [u16; 256] {
    let mut regs = [0u16; 256];
    regs[0x00] = 0x7127;
    for limit in [0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C] {
        regs[limit] = 0x7FF8;
    }
    regs[0x0E] = 0x7FFE;
    regs[0x0F] = 0x0002;
    regs[0x10] = 0x2710;
    regs[0x11] = 0x2328;
    regs[0xFE] = 0x5449;
    regs[0xFF] = 0x3220;
    regs
}

pub struct State {
    pub regs: [u16; 256],
    pointer: u8,
    /// Mask/enable reads that report "not ready" after a conversion starts.
    pub conversion_polls: u32,
    pending_conversion: Option<u32>,
    pub fail_transfers: bool,
    pub writes: Vec<(u8, u16)>,
    pub status_reads: u32,
}

/// Register-level stand-in for an INA3221 on the bus.
#[derive(Clone)]
pub struct SimulatedIna3221 {
    state: Rc<RefCell<State>>,
}

impl SimulatedIna3221 {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                regs: power_on_registers(),
                pointer: 0,
                conversion_polls: 0,
                pending_conversion: None,
                fail_transfers: false,
                writes: Vec::new(),
                status_reads: 0,
            })),
        }
    }

    pub fn state(&self) -> std::cell::RefMut<'_, State> {
        self.state.borrow_mut()
    }

    pub fn reg(&self, address: u8) -> u16 {
        self.state.borrow().regs[address as usize]
    }

    pub fn set_reg(&self, address: u8, value: u16) {
        self.state.borrow_mut().regs[address as usize] = value;
    }

    /// Raise flag bits in the mask/enable register as a conversion would.
    pub fn raise_flags(&self, bits: u16) {
        self.state.borrow_mut().regs[MASK_ENABLE as usize] |= bits;
    }

    pub fn lower_flags(&self, bits: u16) {
        self.state.borrow_mut().regs[MASK_ENABLE as usize] &= !bits;
    }

    pub fn writes(&self) -> Vec<(u8, u16)> {
        self.state.borrow().writes.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.state.borrow_mut();
        state.writes.clear();
        state.status_reads = 0;
    }

    pub fn status_reads(&self) -> u32 {
        self.state.borrow().status_reads
    }
}

impl State {
    fn read(&mut self) -> u16 {
        let address = self.pointer;
        if address == MASK_ENABLE {
            self.status_reads += 1;
            match self.pending_conversion {
                Some(0) => {
                    self.regs[MASK_ENABLE as usize] |= CONVERSION_READY;
                    self.pending_conversion = None;
                }
                Some(left) => self.pending_conversion = Some(left - 1),
                None => {}
            }
            let value = self.regs[MASK_ENABLE as usize];
            self.regs[MASK_ENABLE as usize] &= !READ_TO_CLEAR;
            return value;
        }
        self.regs[address as usize]
    }

    fn write(&mut self, address: u8, value: u16) {
        self.writes.push((address, value));
        match address {
            0x00 if value & 0x8000 != 0 => {
                self.regs = power_on_registers();
                self.pending_conversion = None;
            }
            0x00 => {
                self.regs[0x00] = value;
                self.regs[MASK_ENABLE as usize] &= !CONVERSION_READY;
                let powered_down = matches!(value & 0b111, 0 | 4);
                self.pending_conversion = if powered_down {
                    None
                } else {
                    Some(self.conversion_polls)
                };
            }
            0x01..=0x06 | 0x0D | 0xFE | 0xFF => {}
            MASK_ENABLE => {
                let flags = self.regs[MASK_ENABLE as usize] & !MASK_ENABLE_WRITABLE;
                self.regs[MASK_ENABLE as usize] = flags | (value & MASK_ENABLE_WRITABLE);
            }
            _ => self.regs[address as usize] = value,
        }
    }
}

impl ErrorType for SimulatedIna3221 {
    type Error = ErrorKind;
}

impl I2c for SimulatedIna3221 {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if state.fail_transfers {
            return Err(ErrorKind::Other);
        }
        if address != ADDRESS {
            return Err(ErrorKind::NoAcknowledge(
                embedded_hal::i2c::NoAcknowledgeSource::Address,
            ));
        }
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    if let Some((&pointer, payload)) = bytes.split_first() {
                        state.pointer = pointer;
                        if let [msb, lsb] = payload {
                            state.write(pointer, u16::from_be_bytes([*msb, *lsb]));
                        }
                    }
                }
                Operation::Read(buffer) => {
                    let value = state.read().to_be_bytes();
                    for (slot, byte) in buffer.iter_mut().zip(value) {
                        *slot = byte;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Delay provider that only adds up the requested time.
#[derive(Clone, Default)]
pub struct RecordingDelay {
    total_ns: Rc<Cell<u64>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ns.get() / 1_000_000
    }

    pub fn reset(&self) {
        self.total_ns.set(0);
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns.set(self.total_ns.get() + u64::from(ns));
    }
}

impl embedded_hal_async::delay::DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns.set(self.total_ns.get() + u64::from(ns));
    }
}
