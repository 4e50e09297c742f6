use bitfield::bitfield;
use core::marker::PhantomData;
use embedded_hal::{delay::DelayNs, i2c};

use crate::{
    config::{Access, Wiring},
    timing::{Clock, Wait},
    CharacterDisplayError,
};

use super::{AccessMode, HD44780AdapterTrait, ReadCapable, ReadableAdapterTrait, WriteOnly};

// Pin assignment of the common PCF8574T backpacks
bitfield! {
    pub struct GenericPCF8574TBitField(u8);
    impl Debug;
    pub rs, set_rs: 0, 0;
    pub rw, set_rw: 1, 1;
    pub enable, set_enable: 2, 2;
    pub backlight, set_backlight: 3, 3;
    pub data, set_data: 7, 4;
}

impl Clone for GenericPCF8574TBitField {
    fn clone(&self) -> Self {
        Self(self.0)
    }
}

/// Adapter based on the PCF8574T I2C GPIO expander interfacing with the HD44780 LCD controller
/// via a 4-bit interface. The expander has no way to change a single line, so the adapter keeps a
/// shadow of the output byte and every line change rewrites the whole byte.
///
/// `M` selects whether the R/W line is used. Boards that tie R/W to ground must use
/// [`WriteOnly`]; with [`ReadCapable`] the busy flag replaces the blind instruction delays.
pub struct GenericPCF8574TAdapter<I2C, M = WriteOnly> {
    i2c: I2C,
    address: u8,
    bits: GenericPCF8574TBitField,
    _mode: PhantomData<M>,
}

impl<I2C> GenericPCF8574TAdapter<I2C, WriteOnly>
where
    I2C: i2c::I2c,
{
    /// Create an adapter using the default I2C address.
    pub fn new(i2c: I2C) -> Self {
        Self::new_with_address(i2c, Self::default_i2c_address())
    }

    pub fn new_with_address(i2c: I2C, address: u8) -> Self {
        Self::build(i2c, address)
    }
}

impl<I2C> GenericPCF8574TAdapter<I2C, ReadCapable>
where
    I2C: i2c::I2c,
{
    /// Create a read capable adapter using the default I2C address.
    pub fn new_read_capable(i2c: I2C) -> Self {
        Self::new_read_capable_with_address(i2c, Self::default_i2c_address())
    }

    pub fn new_read_capable_with_address(i2c: I2C, address: u8) -> Self {
        Self::build(i2c, address)
    }
}

impl<I2C, M> GenericPCF8574TAdapter<I2C, M>
where
    I2C: i2c::I2c,
    M: AccessMode,
{
    fn build(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            bits: GenericPCF8574TBitField(0),
            _mode: PhantomData,
        }
    }

    pub fn default_i2c_address() -> u8 {
        0x27
    }

    pub fn i2c_address(&self) -> u8 {
        self.address
    }

    /// Returns the shadow of the expander output byte
    pub fn bits(&self) -> u8 {
        self.bits.0
    }

    /// returns a reference to the I2C peripheral. mostly needed for testing
    pub fn i2c(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn write_raw(&mut self, value: u8) -> Result<(), CharacterDisplayError<I2C::Error>> {
        self.i2c
            .write(self.address, &[value])
            .map_err(CharacterDisplayError::BusError)
    }

    fn read_raw(&mut self) -> Result<u8, CharacterDisplayError<I2C::Error>> {
        let mut data = [0];
        self.i2c
            .read(self.address, &mut data)
            .map_err(CharacterDisplayError::BusError)?;
        Ok(data[0])
    }

    fn write_bits_to_gpio(&mut self) -> Result<(), CharacterDisplayError<I2C::Error>> {
        self.write_raw(self.bits.0)
    }

    /// Sets RS, R/W and data with E low, then pulses E. Three expander writes per frame.
    fn pulse_frame<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        rs_setting: bool,
        nibble: u8,
    ) -> Result<(), CharacterDisplayError<I2C::Error>> {
        self.bits.set_rs(rs_setting as u8);
        self.bits.set_rw(0);
        self.bits.set_data(nibble & 0x0F);
        self.bits.set_enable(0);
        self.write_bits_to_gpio()?;
        self.bits.set_enable(1);
        self.write_bits_to_gpio()?;
        clock.wait(Wait::EnableHigh);
        self.bits.set_enable(0);
        self.write_bits_to_gpio()?;
        clock.wait(Wait::EnableSettle);
        Ok(())
    }

    /// Prepares the expander for a read: data lines high so the quasi-bidirectional outputs can
    /// be pulled down by the controller, R/W high, E low.
    fn read_setup<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        rs_setting: bool,
    ) -> Result<GenericPCF8574TBitField, CharacterDisplayError<I2C::Error>> {
        let mut setup = self.bits.clone();
        setup.set_data(0b1111);
        setup.set_rs(rs_setting as u8);
        setup.set_rw(1);
        setup.set_enable(0);
        self.write_raw(setup.0)?;
        clock.wait(Wait::ReadSetup);
        Ok(setup)
    }

    /// One read strobe. When `sample` is false the enable pulse is issued without reading the
    /// expander back.
    fn read_strobe<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        setup: &mut GenericPCF8574TBitField,
        sample: bool,
    ) -> Result<u8, CharacterDisplayError<I2C::Error>> {
        setup.set_enable(1);
        self.write_raw(setup.0)?;
        clock.wait(Wait::ReadDataReady);
        let nibble = if sample {
            GenericPCF8574TBitField(self.read_raw()?).data()
        } else {
            0
        };
        setup.set_enable(0);
        self.write_raw(setup.0)?;
        clock.wait(Wait::ReadSettle);
        Ok(nibble)
    }

    /// Returns R/W to write, restoring the shadow byte.
    fn read_finish(&mut self) -> Result<(), CharacterDisplayError<I2C::Error>> {
        self.bits.set_rw(0);
        self.bits.set_enable(0);
        self.write_bits_to_gpio()
    }

    fn read_byte_from_controller<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        rs_setting: bool,
    ) -> Result<u8, CharacterDisplayError<I2C::Error>> {
        let mut setup = self.read_setup(clock, rs_setting)?;
        let high = self.read_strobe(clock, &mut setup, true)?;
        let low = self.read_strobe(clock, &mut setup, true)?;
        self.read_finish()?;
        Ok((high << 4) | (low & 0x0F))
    }

    fn poll_busy<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
    ) -> Result<bool, CharacterDisplayError<I2C::Error>> {
        let mut setup = self.read_setup(clock, false)?;
        // the busy flag is the top bit of the first nibble. The second strobe still has to
        // happen to keep the 4-bit transfer in step.
        let high = self.read_strobe(clock, &mut setup, true)?;
        self.read_strobe(clock, &mut setup, false)?;
        self.read_finish()?;
        Ok(high & 0b1000 != 0)
    }
}

impl<I2C, M> HD44780AdapterTrait for GenericPCF8574TAdapter<I2C, M>
where
    I2C: i2c::I2c,
    M: AccessMode,
{
    type Error = I2C::Error;
    const WIRING: Wiring = Wiring::I2cExpander;
    const ACCESS: Access = M::ACCESS;

    fn init<DELAY: DelayNs>(
        &mut self,
        _clock: &mut Clock<DELAY>,
        backlight: bool,
    ) -> Result<(), CharacterDisplayError<Self::Error>> {
        self.bits = GenericPCF8574TBitField(0);
        self.bits.set_backlight(backlight as u8);
        self.write_bits_to_gpio()
    }

    fn write_frame<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        rs_setting: bool,
        value: u8,
    ) -> Result<(), CharacterDisplayError<Self::Error>> {
        self.pulse_frame(clock, rs_setting, value)
    }

    fn wait_ready<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        wait: Wait,
    ) -> Result<(), CharacterDisplayError<Self::Error>> {
        if M::ACCESS == Access::ReadWrite && wait.is_pollable() {
            while self.poll_busy(clock)? {
                // wait
            }
        } else {
            clock.wait(wait);
        }
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), CharacterDisplayError<Self::Error>> {
        self.bits.set_backlight(on as u8);
        self.bits.set_enable(0);
        self.write_bits_to_gpio()
    }
}

impl<I2C> ReadableAdapterTrait for GenericPCF8574TAdapter<I2C, ReadCapable>
where
    I2C: i2c::I2c,
{
    fn read_byte<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        rs_setting: bool,
    ) -> Result<u8, CharacterDisplayError<Self::Error>> {
        self.read_byte_from_controller(clock, rs_setting)
    }

    fn is_busy<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
    ) -> Result<bool, CharacterDisplayError<Self::Error>> {
        self.poll_busy(clock)
    }
}
