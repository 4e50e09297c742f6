//! Behavioural model of a HD44780 controller for the unit tests. The model watches the lines it
//! is connected to and reacts on enable edges the way the real controller does: writes latch on
//! the falling edge, reads drive the data lines while enable is high. Pins, an 8-bit port and a
//! PCF8574 expander wired to the model implement the `embedded-hal` traits, so the adapters can
//! be exercised end to end.

extern crate std;

use core::{cell::RefCell, convert::Infallible};
use std::{rc::Rc, vec::Vec};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, InputPin, OutputPin},
    i2c::{self, Operation},
};

use crate::driver::hd44780::adapter::data_bus::{
    DataPort, EightBitDataBus, FourBitDataBus, PortDataBus, ReadableDataPort,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    EnableRise { rs: bool, rw: bool },
    /// `data` holds the lines driven by the host at the falling edge
    EnableFall { rs: bool, rw: bool, data: u8 },
    Delay(u32),
    /// byte written to the PCF8574 outputs, logged before its enable edge
    ExpanderWrite(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Rs,
    Rw,
    Enable,
    Data(u8),
}

pub struct Hd44780Model {
    pub ddram: [u8; 128],
    pub cgram: [u8; 64],
    pub address_counter: u8,
    pub cgram_selected: bool,
    pub four_bit: bool,
    pub display_function: u8,
    pub display_control: u8,
    pub entry_mode: u8,
    pub display_shift: i8,
    /// every completed transfer as `(rs, byte)`
    pub instructions: Vec<(bool, u8)>,
    pub events: Vec<Event>,
    pub status_reads: usize,
    /// how many status reads report busy after each instruction
    pub busy_reads_per_instruction: usize,
    pub expander_writes: usize,
    pub backlight: bool,
    pub rs: bool,
    pub rw: bool,
    pub enable: bool,
    busy_remaining: usize,
    data: u8,
    output: u8,
    pending_nibble: Option<u8>,
    read_low_next: bool,
}

pub type SharedModel = Rc<RefCell<Hd44780Model>>;

pub fn shared_model() -> SharedModel {
    Rc::new(RefCell::new(Hd44780Model::new()))
}

impl Hd44780Model {
    pub fn new() -> Self {
        Self {
            ddram: [0x20; 128],
            cgram: [0; 64],
            address_counter: 0,
            cgram_selected: false,
            // the controller powers up in 8-bit mode
            four_bit: false,
            display_function: 0,
            display_control: 0,
            entry_mode: 0x02,
            display_shift: 0,
            instructions: Vec::new(),
            events: Vec::new(),
            status_reads: 0,
            busy_reads_per_instruction: 0,
            expander_writes: 0,
            backlight: false,
            rs: false,
            rw: false,
            enable: false,
            busy_remaining: 0,
            data: 0,
            output: 0,
            pending_nibble: None,
            read_low_next: false,
        }
    }

    /// Only the instruction bytes (RS = 0) that were executed.
    pub fn commands(&self) -> Vec<u8> {
        self.instructions
            .iter()
            .filter(|(rs, _)| !rs)
            .map(|(_, value)| *value)
            .collect()
    }

    pub fn ddram_slice(&self, address: u8, len: usize) -> &[u8] {
        let start = address as usize;
        &self.ddram[start..start + len]
    }

    pub fn set_line(&mut self, line: Line, level: bool) {
        match line {
            Line::Rs => self.rs = level,
            Line::Rw => self.rw = level,
            Line::Data(bit) => {
                if level {
                    self.data |= 1 << bit;
                } else {
                    self.data &= !(1 << bit);
                }
            }
            Line::Enable => {
                if level && !self.enable {
                    self.enable = true;
                    self.enable_rise();
                } else if !level && self.enable {
                    self.enable = false;
                    self.enable_fall();
                }
            }
        }
    }

    pub fn set_data(&mut self, value: u8) {
        self.data = value;
    }

    /// Level seen on the data lines: the controller drives them during a read strobe.
    pub fn data_lines(&self) -> u8 {
        if self.rw && self.enable {
            self.output
        } else {
            self.data
        }
    }

    pub fn line_level(&self, line: Line) -> bool {
        match line {
            Line::Rs => self.rs,
            Line::Rw => self.rw,
            Line::Enable => self.enable,
            Line::Data(bit) => self.data_lines() & (1 << bit) != 0,
        }
    }

    /// Applies a PCF8574 output byte. Every other line settles before E changes.
    pub fn apply_expander_byte(&mut self, value: u8) {
        self.expander_writes += 1;
        self.events.push(Event::ExpanderWrite(value));
        self.rs = value & 0x01 != 0;
        self.rw = value & 0x02 != 0;
        self.backlight = value & 0x08 != 0;
        self.data = (self.data & 0x0F) | (value & 0xF0);
        self.set_line(Line::Enable, value & 0x04 != 0);
    }

    /// What a PCF8574 read returns: the output latches, with D4..D7 pulled by the controller
    /// during a read strobe.
    pub fn expander_byte(&self) -> u8 {
        (self.data_lines() & 0xF0)
            | ((self.backlight as u8) << 3)
            | ((self.enable as u8) << 2)
            | ((self.rw as u8) << 1)
            | (self.rs as u8)
    }

    fn enable_rise(&mut self) {
        self.events.push(Event::EnableRise {
            rs: self.rs,
            rw: self.rw,
        });
        if self.rw {
            let value = self.read_value();
            self.output = if !self.four_bit {
                value
            } else if !self.read_low_next {
                value & 0xF0
            } else {
                value << 4
            };
        }
    }

    fn enable_fall(&mut self) {
        self.events.push(Event::EnableFall {
            rs: self.rs,
            rw: self.rw,
            data: self.data,
        });
        if self.rw {
            self.finish_read_strobe();
        } else {
            self.latch();
        }
    }

    fn read_value(&self) -> u8 {
        if self.rs {
            if self.cgram_selected {
                self.cgram[(self.address_counter & 0x3F) as usize]
            } else {
                self.ddram[(self.address_counter & 0x7F) as usize]
            }
        } else {
            let busy = if self.busy_remaining > 0 { 0x80 } else { 0 };
            busy | (self.address_counter & 0x7F)
        }
    }

    fn finish_read_strobe(&mut self) {
        if self.four_bit && !self.read_low_next {
            self.read_low_next = true;
            return;
        }
        self.read_low_next = false;
        if self.rs {
            self.step_address();
        } else {
            self.status_reads += 1;
            self.busy_remaining = self.busy_remaining.saturating_sub(1);
        }
    }

    fn latch(&mut self) {
        let value = self.data;
        if self.four_bit {
            let nibble = value >> 4;
            match self.pending_nibble.take() {
                None => self.pending_nibble = Some(nibble),
                Some(high) => self.execute(self.rs, (high << 4) | nibble),
            }
        } else {
            self.execute(self.rs, value);
        }
    }

    fn step_address(&mut self) {
        let mask = if self.cgram_selected { 0x3F } else { 0x7F };
        self.address_counter = if self.entry_mode & 0x02 != 0 {
            self.address_counter.wrapping_add(1) & mask
        } else {
            self.address_counter.wrapping_sub(1) & mask
        };
    }

    fn execute(&mut self, rs: bool, value: u8) {
        self.instructions.push((rs, value));
        self.busy_remaining = self.busy_reads_per_instruction;
        if rs {
            if self.cgram_selected {
                self.cgram[(self.address_counter & 0x3F) as usize] = value;
            } else {
                self.ddram[(self.address_counter & 0x7F) as usize] = value;
            }
            self.step_address();
            return;
        }
        if value & 0x80 != 0 {
            self.address_counter = value & 0x7F;
            self.cgram_selected = false;
        } else if value & 0x40 != 0 {
            self.address_counter = value & 0x3F;
            self.cgram_selected = true;
        } else if value & 0x20 != 0 {
            self.display_function = value;
            self.four_bit = value & 0x10 == 0;
            self.pending_nibble = None;
        } else if value & 0x10 != 0 {
            let right = value & 0x04 != 0;
            if value & 0x08 != 0 {
                self.display_shift += if right { 1 } else { -1 };
            } else if right {
                self.address_counter = self.address_counter.wrapping_add(1) & 0x7F;
            } else {
                self.address_counter = self.address_counter.wrapping_sub(1) & 0x7F;
            }
        } else if value & 0x08 != 0 {
            self.display_control = value & 0x07;
        } else if value & 0x04 != 0 {
            self.entry_mode = value & 0x03;
        } else if value & 0x02 != 0 {
            self.address_counter = 0;
            self.display_shift = 0;
            self.cgram_selected = false;
        } else if value & 0x01 != 0 {
            self.ddram = [0x20; 128];
            self.address_counter = 0;
            self.display_shift = 0;
            self.entry_mode |= 0x02;
            self.cgram_selected = false;
        }
    }
}

/// One host pin wired to a controller line.
pub struct SimPin {
    model: SharedModel,
    line: Line,
}

impl SimPin {
    pub fn new(model: &SharedModel, line: Line) -> Self {
        Self {
            model: model.clone(),
            line,
        }
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.model.borrow_mut().set_line(self.line, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.model.borrow_mut().set_line(self.line, true);
        Ok(())
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.model.borrow().line_level(self.line))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// 8-bit port wired to D0..D7.
pub struct SimPort {
    model: SharedModel,
}

impl ErrorType for SimPort {
    type Error = Infallible;
}

impl DataPort for SimPort {
    fn write_port(&mut self, value: u8) -> Result<(), Self::Error> {
        self.model.borrow_mut().set_data(value);
        Ok(())
    }
}

impl ReadableDataPort for SimPort {
    fn read_port(&mut self) -> Result<u8, Self::Error> {
        Ok(self.model.borrow().data_lines())
    }
}

/// PCF8574 expander wired to the model, answering on one address.
pub struct SimExpander {
    model: SharedModel,
    address: u8,
}

impl SimExpander {
    pub fn new(model: &SharedModel, address: u8) -> Self {
        Self {
            model: model.clone(),
            address,
        }
    }
}

impl i2c::ErrorType for SimExpander {
    type Error = i2c::ErrorKind;
}

impl i2c::I2c for SimExpander {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != self.address {
            return Err(i2c::ErrorKind::NoAcknowledge(
                i2c::NoAcknowledgeSource::Address,
            ));
        }
        let mut model = self.model.borrow_mut();
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    for byte in bytes.iter() {
                        model.apply_expander_byte(*byte);
                    }
                }
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = model.expander_byte();
                    }
                }
            }
        }
        Ok(())
    }
}

/// Delay provider that records the requested waits in the model's event log.
pub struct SimDelay {
    model: SharedModel,
}

impl SimDelay {
    pub fn new(model: &SharedModel) -> Self {
        Self {
            model: model.clone(),
        }
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.model.borrow_mut().events.push(Event::Delay(ns));
    }
}

pub fn four_bit_pins(
    model: &SharedModel,
) -> (
    SimPin,
    SimPin,
    SimPin,
    FourBitDataBus<SimPin, SimPin, SimPin, SimPin>,
) {
    (
        SimPin::new(model, Line::Rs),
        SimPin::new(model, Line::Rw),
        SimPin::new(model, Line::Enable),
        FourBitDataBus::new(
            SimPin::new(model, Line::Data(4)),
            SimPin::new(model, Line::Data(5)),
            SimPin::new(model, Line::Data(6)),
            SimPin::new(model, Line::Data(7)),
        ),
    )
}

pub type SimEightBitBus =
    EightBitDataBus<SimPin, SimPin, SimPin, SimPin, SimPin, SimPin, SimPin, SimPin>;

pub fn eight_bit_pins(model: &SharedModel) -> (SimPin, SimPin, SimPin, SimEightBitBus) {
    (
        SimPin::new(model, Line::Rs),
        SimPin::new(model, Line::Rw),
        SimPin::new(model, Line::Enable),
        EightBitDataBus::new(
            SimPin::new(model, Line::Data(0)),
            SimPin::new(model, Line::Data(1)),
            SimPin::new(model, Line::Data(2)),
            SimPin::new(model, Line::Data(3)),
            SimPin::new(model, Line::Data(4)),
            SimPin::new(model, Line::Data(5)),
            SimPin::new(model, Line::Data(6)),
            SimPin::new(model, Line::Data(7)),
        ),
    )
}

pub fn port_pins(model: &SharedModel) -> (SimPin, SimPin, SimPin, PortDataBus<SimPort>) {
    (
        SimPin::new(model, Line::Rs),
        SimPin::new(model, Line::Rw),
        SimPin::new(model, Line::Enable),
        PortDataBus::new(SimPort {
            model: model.clone(),
        }),
    )
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;

    #[test]
    fn test_model_nibble_assembly() {
        let mut model = Hd44780Model::new();
        model.four_bit = true;
        for nibble in [0x4, 0x8] {
            model.set_data(nibble << 4);
            model.set_line(Line::Enable, true);
            model.set_line(Line::Enable, false);
        }
        // 0x48 sets the CGRAM address 0x08
        assert_eq!(model.instructions, std::vec![(false, 0x48)]);
        assert!(model.cgram_selected);
        assert_eq!(model.address_counter, 0x08);
    }

    #[test]
    fn test_model_data_write_and_clear() {
        let mut model = Hd44780Model::new();
        model.rs = true;
        model.set_data(b'X');
        model.set_line(Line::Enable, true);
        model.set_line(Line::Enable, false);
        assert_eq!(model.ddram[0], b'X');
        assert_eq!(model.address_counter, 1);

        model.rs = false;
        model.set_data(0x01);
        model.set_line(Line::Enable, true);
        model.set_line(Line::Enable, false);
        assert_eq!(model.ddram[0], b' ');
        assert_eq!(model.address_counter, 0);
    }
}
