use embedded_hal::{
    delay::DelayNs,
    digital::{Error as _, ErrorKind, OutputPin, PinState},
};

use crate::{
    config::{Access, BusWidth, Wiring},
    timing::{Clock, Wait},
    CharacterDisplayError,
};

use super::{
    data_bus::{DataBus, ReadableDataBus},
    AccessMode, HD44780AdapterTrait, ReadableAdapterTrait, WriteOnly,
};

/// R/W line of a parallel bus.
pub trait ReadWriteLine: AccessMode {
    fn set_read(&mut self, read: bool) -> Result<(), ErrorKind>;
}

impl ReadWriteLine for WriteOnly {
    fn set_read(&mut self, read: bool) -> Result<(), ErrorKind> {
        if read {
            // the line is tied to ground
            return Err(ErrorKind::Other);
        }
        Ok(())
    }
}

/// R/W line driven by a host pin.
pub struct ReadWritePin<P>(P);

impl<P> ReadWritePin<P> {
    pub fn release(self) -> P {
        self.0
    }
}

impl<P> AccessMode for ReadWritePin<P> {
    const ACCESS: Access = Access::ReadWrite;
}

impl<P: OutputPin> ReadWriteLine for ReadWritePin<P> {
    fn set_read(&mut self, read: bool) -> Result<(), ErrorKind> {
        self.0
            .set_state(PinState::from(read))
            .map_err(|e| e.kind())
    }
}

fn pin_error<E: embedded_hal::digital::Error>(err: E) -> CharacterDisplayError<ErrorKind> {
    CharacterDisplayError::BusError(err.kind())
}

/// Adapter for a controller wired directly to host pins, M68 style (RS, R/W, E). The data lines
/// are one of the [`DataBus`] implementations and decide between 4-bit, 8-bit and 8-bit port
/// wiring. Without an R/W pin every wait is a blind delay; with one, instruction waits poll the
/// busy flag.
pub struct ParallelAdapter<RS, E, DATA, RW = WriteOnly> {
    rs: RS,
    enable: E,
    data: DATA,
    rw: RW,
}

impl<RS, E, DATA> ParallelAdapter<RS, E, DATA, WriteOnly>
where
    RS: OutputPin,
    E: OutputPin,
    DATA: DataBus,
{
    /// Create an adapter whose R/W line is tied to ground.
    pub fn new(rs: RS, enable: E, data: DATA) -> Self {
        Self {
            rs,
            enable,
            data,
            rw: WriteOnly,
        }
    }
}

impl<RS, E, DATA, RWP> ParallelAdapter<RS, E, DATA, ReadWritePin<RWP>>
where
    RS: OutputPin,
    E: OutputPin,
    DATA: ReadableDataBus,
    RWP: OutputPin,
{
    /// Create an adapter that drives the R/W line and can read from the controller.
    pub fn new_read_write(rs: RS, rw: RWP, enable: E, data: DATA) -> Self {
        Self {
            rs,
            enable,
            data,
            rw: ReadWritePin(rw),
        }
    }

    /// One read strobe. Returns whatever the data bus samples while E is high.
    fn strobe_read<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
    ) -> Result<u8, CharacterDisplayError<ErrorKind>> {
        self.enable.set_high().map_err(pin_error)?;
        clock.wait(Wait::ReadDataReady);
        let value = self.data.read().map_err(CharacterDisplayError::BusError);
        // drop E even if the sample failed
        self.enable.set_low().map_err(pin_error)?;
        clock.wait(Wait::ReadSettle);
        value
    }
}

impl<RS, E, DATA, RW> ParallelAdapter<RS, E, DATA, RW>
where
    RS: OutputPin,
    E: OutputPin,
    DATA: DataBus,
    RW: ReadWriteLine,
{
    /// Returns the pins and data bus used to create the adapter.
    pub fn release(self) -> (RS, E, DATA, RW) {
        (self.rs, self.enable, self.data, self.rw)
    }

    fn strobe_write<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        rs_setting: bool,
        value: u8,
    ) -> Result<(), CharacterDisplayError<ErrorKind>> {
        self.rs
            .set_state(PinState::from(rs_setting))
            .map_err(pin_error)?;
        self.rw
            .set_read(false)
            .map_err(CharacterDisplayError::BusError)?;
        self.data
            .write(value)
            .map_err(CharacterDisplayError::BusError)?;
        self.enable.set_high().map_err(pin_error)?;
        clock.wait(Wait::EnableHigh);
        self.enable.set_low().map_err(pin_error)?;
        clock.wait(Wait::EnableSettle);
        Ok(())
    }
}

impl<RS, E, DATA> HD44780AdapterTrait for ParallelAdapter<RS, E, DATA, WriteOnly>
where
    RS: OutputPin,
    E: OutputPin,
    DATA: DataBus,
{
    type Error = ErrorKind;
    const WIRING: Wiring = DATA::WIRING;
    const ACCESS: Access = Access::WriteOnly;

    fn init<DELAY: DelayNs>(
        &mut self,
        _clock: &mut Clock<DELAY>,
        _backlight: bool,
    ) -> Result<(), CharacterDisplayError<Self::Error>> {
        self.enable.set_low().map_err(pin_error)
    }

    fn write_frame<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        rs_setting: bool,
        value: u8,
    ) -> Result<(), CharacterDisplayError<Self::Error>> {
        self.strobe_write(clock, rs_setting, value)
    }
}

impl<RS, E, DATA, RWP> HD44780AdapterTrait for ParallelAdapter<RS, E, DATA, ReadWritePin<RWP>>
where
    RS: OutputPin,
    E: OutputPin,
    DATA: ReadableDataBus,
    RWP: OutputPin,
{
    type Error = ErrorKind;
    const WIRING: Wiring = DATA::WIRING;
    const ACCESS: Access = Access::ReadWrite;

    fn init<DELAY: DelayNs>(
        &mut self,
        _clock: &mut Clock<DELAY>,
        _backlight: bool,
    ) -> Result<(), CharacterDisplayError<Self::Error>> {
        self.enable.set_low().map_err(pin_error)?;
        self.rw
            .set_read(false)
            .map_err(CharacterDisplayError::BusError)
    }

    fn write_frame<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        rs_setting: bool,
        value: u8,
    ) -> Result<(), CharacterDisplayError<Self::Error>> {
        self.strobe_write(clock, rs_setting, value)
    }

    fn wait_ready<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        wait: Wait,
    ) -> Result<(), CharacterDisplayError<Self::Error>> {
        if wait.is_pollable() {
            self.wait_while_busy(clock)
        } else {
            clock.wait(wait);
            Ok(())
        }
    }
}

impl<RS, E, DATA, RWP> ReadableAdapterTrait for ParallelAdapter<RS, E, DATA, ReadWritePin<RWP>>
where
    RS: OutputPin,
    E: OutputPin,
    DATA: ReadableDataBus,
    RWP: OutputPin,
{
    fn read_byte<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        rs_setting: bool,
    ) -> Result<u8, CharacterDisplayError<Self::Error>> {
        self.rs
            .set_state(PinState::from(rs_setting))
            .map_err(pin_error)?;
        self.data
            .release()
            .map_err(CharacterDisplayError::BusError)?;
        self.rw
            .set_read(true)
            .map_err(CharacterDisplayError::BusError)?;
        clock.wait(Wait::ReadSetup);
        let value = match DATA::WIRING.bus_width() {
            BusWidth::Four => {
                let high = self.strobe_read(clock)?;
                let low = self.strobe_read(clock)?;
                (high << 4) | (low & 0x0F)
            }
            BusWidth::Eight => self.strobe_read(clock)?,
        };
        self.rw
            .set_read(false)
            .map_err(CharacterDisplayError::BusError)?;
        Ok(value)
    }
}
