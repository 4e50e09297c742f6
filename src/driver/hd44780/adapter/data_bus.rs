//! Data line groups for the parallel adapter. Pin errors from differently typed pins are
//! reported through their common [`ErrorKind`].

use embedded_hal::digital::{Error as _, ErrorKind, ErrorType, InputPin, OutputPin, PinState};

use crate::config::Wiring;

/// Data lines of a parallel bus.
pub trait DataBus {
    const WIRING: Wiring;

    /// Drives the data lines. A 4-bit bus uses the low nibble of `value`.
    fn write(&mut self, value: u8) -> Result<(), ErrorKind>;
}

/// Data lines that can also be sampled.
pub trait ReadableDataBus: DataBus {
    /// Drives every data line high so the controller can pull them down. Needed for
    /// quasi-bidirectional ports and open-drain pins.
    fn release(&mut self) -> Result<(), ErrorKind>;

    /// Samples the data lines. A 4-bit bus returns its value in the low nibble.
    fn read(&mut self) -> Result<u8, ErrorKind>;
}

/// An 8-bit port that is written in a single operation, such as an 8051 `P0`..`P3` SFR.
pub trait DataPort: ErrorType {
    fn write_port(&mut self, value: u8) -> Result<(), Self::Error>;
}

pub trait ReadableDataPort: DataPort {
    fn read_port(&mut self) -> Result<u8, Self::Error>;
}

fn set_bit<P: OutputPin>(pin: &mut P, value: u8, bit: u8) -> Result<(), ErrorKind> {
    pin.set_state(PinState::from(value & (1 << bit) != 0))
        .map_err(|e| e.kind())
}

fn read_bit<P: InputPin>(pin: &mut P, bit: u8) -> Result<u8, ErrorKind> {
    let high = pin.is_high().map_err(|e| e.kind())?;
    Ok((high as u8) << bit)
}

/// D4..D7 on individual pins.
pub struct FourBitDataBus<D4, D5, D6, D7> {
    d4: D4,
    d5: D5,
    d6: D6,
    d7: D7,
}

impl<D4, D5, D6, D7> FourBitDataBus<D4, D5, D6, D7>
where
    D4: OutputPin,
    D5: OutputPin,
    D6: OutputPin,
    D7: OutputPin,
{
    pub fn new(d4: D4, d5: D5, d6: D6, d7: D7) -> Self {
        Self { d4, d5, d6, d7 }
    }

    pub fn release_pins(self) -> (D4, D5, D6, D7) {
        (self.d4, self.d5, self.d6, self.d7)
    }
}

impl<D4, D5, D6, D7> DataBus for FourBitDataBus<D4, D5, D6, D7>
where
    D4: OutputPin,
    D5: OutputPin,
    D6: OutputPin,
    D7: OutputPin,
{
    const WIRING: Wiring = Wiring::Parallel4Bit;

    fn write(&mut self, value: u8) -> Result<(), ErrorKind> {
        set_bit(&mut self.d4, value, 0)?;
        set_bit(&mut self.d5, value, 1)?;
        set_bit(&mut self.d6, value, 2)?;
        set_bit(&mut self.d7, value, 3)
    }
}

impl<D4, D5, D6, D7> ReadableDataBus for FourBitDataBus<D4, D5, D6, D7>
where
    D4: OutputPin + InputPin,
    D5: OutputPin + InputPin,
    D6: OutputPin + InputPin,
    D7: OutputPin + InputPin,
{
    fn release(&mut self) -> Result<(), ErrorKind> {
        self.write(0x0F)
    }

    fn read(&mut self) -> Result<u8, ErrorKind> {
        Ok(read_bit(&mut self.d4, 0)?
            | read_bit(&mut self.d5, 1)?
            | read_bit(&mut self.d6, 2)?
            | read_bit(&mut self.d7, 3)?)
    }
}

/// D0..D7 on individual pins.
pub struct EightBitDataBus<D0, D1, D2, D3, D4, D5, D6, D7> {
    d0: D0,
    d1: D1,
    d2: D2,
    d3: D3,
    d4: D4,
    d5: D5,
    d6: D6,
    d7: D7,
}

impl<D0, D1, D2, D3, D4, D5, D6, D7> EightBitDataBus<D0, D1, D2, D3, D4, D5, D6, D7>
where
    D0: OutputPin,
    D1: OutputPin,
    D2: OutputPin,
    D3: OutputPin,
    D4: OutputPin,
    D5: OutputPin,
    D6: OutputPin,
    D7: OutputPin,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(d0: D0, d1: D1, d2: D2, d3: D3, d4: D4, d5: D5, d6: D6, d7: D7) -> Self {
        Self {
            d0,
            d1,
            d2,
            d3,
            d4,
            d5,
            d6,
            d7,
        }
    }

    pub fn release_pins(self) -> (D0, D1, D2, D3, D4, D5, D6, D7) {
        (
            self.d0, self.d1, self.d2, self.d3, self.d4, self.d5, self.d6, self.d7,
        )
    }
}

impl<D0, D1, D2, D3, D4, D5, D6, D7> DataBus for EightBitDataBus<D0, D1, D2, D3, D4, D5, D6, D7>
where
    D0: OutputPin,
    D1: OutputPin,
    D2: OutputPin,
    D3: OutputPin,
    D4: OutputPin,
    D5: OutputPin,
    D6: OutputPin,
    D7: OutputPin,
{
    const WIRING: Wiring = Wiring::Parallel8Bit;

    fn write(&mut self, value: u8) -> Result<(), ErrorKind> {
        set_bit(&mut self.d0, value, 0)?;
        set_bit(&mut self.d1, value, 1)?;
        set_bit(&mut self.d2, value, 2)?;
        set_bit(&mut self.d3, value, 3)?;
        set_bit(&mut self.d4, value, 4)?;
        set_bit(&mut self.d5, value, 5)?;
        set_bit(&mut self.d6, value, 6)?;
        set_bit(&mut self.d7, value, 7)
    }
}

impl<D0, D1, D2, D3, D4, D5, D6, D7> ReadableDataBus
    for EightBitDataBus<D0, D1, D2, D3, D4, D5, D6, D7>
where
    D0: OutputPin + InputPin,
    D1: OutputPin + InputPin,
    D2: OutputPin + InputPin,
    D3: OutputPin + InputPin,
    D4: OutputPin + InputPin,
    D5: OutputPin + InputPin,
    D6: OutputPin + InputPin,
    D7: OutputPin + InputPin,
{
    fn release(&mut self) -> Result<(), ErrorKind> {
        self.write(0xFF)
    }

    fn read(&mut self) -> Result<u8, ErrorKind> {
        Ok(read_bit(&mut self.d0, 0)?
            | read_bit(&mut self.d1, 1)?
            | read_bit(&mut self.d2, 2)?
            | read_bit(&mut self.d3, 3)?
            | read_bit(&mut self.d4, 4)?
            | read_bit(&mut self.d5, 5)?
            | read_bit(&mut self.d6, 6)?
            | read_bit(&mut self.d7, 7)?)
    }
}

/// D0..D7 on a whole 8-bit port.
pub struct PortDataBus<P> {
    port: P,
}

impl<P: DataPort> PortDataBus<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    pub fn release_port(self) -> P {
        self.port
    }
}

impl<P: DataPort> DataBus for PortDataBus<P> {
    const WIRING: Wiring = Wiring::Parallel8BitPort;

    fn write(&mut self, value: u8) -> Result<(), ErrorKind> {
        self.port.write_port(value).map_err(|e| e.kind())
    }
}

impl<P: ReadableDataPort> ReadableDataBus for PortDataBus<P> {
    fn release(&mut self) -> Result<(), ErrorKind> {
        self.write(0xFF)
    }

    fn read(&mut self) -> Result<u8, ErrorKind> {
        self.port.read_port().map_err(|e| e.kind())
    }
}
