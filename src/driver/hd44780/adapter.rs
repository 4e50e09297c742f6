pub mod data_bus;
pub mod generic_pcf8574t;
pub mod parallel;

use core::fmt::Debug;

use embedded_hal::delay::DelayNs;

use crate::{
    config::{Access, BusWidth, Wiring},
    timing::{Clock, Wait},
    CharacterDisplayError,
};

/// Busy flag bit of the status byte returned by a RS = 0 read.
pub const BUSY_FLAG: u8 = 0x80;

/// Type level marker describing whether an adapter can read from the controller.
pub trait AccessMode {
    const ACCESS: Access;
}

/// The R/W line is tied to ground. Every wait is a blind delay.
#[derive(Debug, Default, Copy, Clone)]
pub struct WriteOnly;

impl AccessMode for WriteOnly {
    const ACCESS: Access = Access::WriteOnly;
}

/// The R/W line is driven by the adapter, so the busy flag can be polled.
#[derive(Debug, Default, Copy, Clone)]
pub struct ReadCapable;

impl AccessMode for ReadCapable {
    const ACCESS: Access = Access::ReadWrite;
}

/// Byte transfer engine for a HD44780 controller. Implementations own the physical lines and know
/// how to frame a value onto them; the framing of a byte into one or two strobes and the choice of
/// waiting strategy are shared here.
pub trait HD44780AdapterTrait {
    /// Error reported by the underlying bus
    type Error: Debug;

    /// Wiring implemented by the adapter
    const WIRING: Wiring;

    /// Whether the adapter drives the R/W line
    const ACCESS: Access;

    /// Perform adapter specific initialization. Called once after the power-on wait and before
    /// the first frame is sent. `backlight` is the initial backlight state for adapters that
    /// control one.
    fn init<DELAY: DelayNs>(
        &mut self,
        _clock: &mut Clock<DELAY>,
        _backlight: bool,
    ) -> Result<(), CharacterDisplayError<Self::Error>> {
        Ok(())
    }

    /// Sends a single frame with one enable strobe. On a 4-bit bus the low nibble of `value` is
    /// placed on D4..D7, on an 8-bit bus the whole byte is placed on D0..D7. If `rs_setting` is
    /// `true` the frame goes to the data register, otherwise to the instruction register.
    fn write_frame<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        rs_setting: bool,
        value: u8,
    ) -> Result<(), CharacterDisplayError<Self::Error>>;

    /// writes a full byte to the controller. On a 4-bit bus the high nibble is sent first.
    fn write_byte<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        rs_setting: bool,
        value: u8,
    ) -> Result<(), CharacterDisplayError<Self::Error>> {
        #[cfg(feature = "defmt")]
        defmt::trace!("HD44780 write rs={} value={:#04x}", rs_setting, value);
        match Self::WIRING.bus_width() {
            BusWidth::Four => {
                self.write_frame(clock, rs_setting, value >> 4)?;
                self.write_frame(clock, rs_setting, value & 0x0F)
            }
            BusWidth::Eight => self.write_frame(clock, rs_setting, value),
        }
    }

    /// Waits until the controller can accept the next instruction. Write-only adapters always
    /// use the blind delay.
    fn wait_ready<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        wait: Wait,
    ) -> Result<(), CharacterDisplayError<Self::Error>> {
        clock.wait(wait);
        Ok(())
    }

    /// Sets the backlight. Only adapters with a backlight line support this.
    fn set_backlight(&mut self, _on: bool) -> Result<(), CharacterDisplayError<Self::Error>> {
        Err(CharacterDisplayError::UnsupportedOperation)
    }
}

/// Adapters with a wired R/W line.
pub trait ReadableAdapterTrait: HD44780AdapterTrait {
    /// Reads one byte using the same framing as writes. If `rs_setting` is `false` the status
    /// byte (busy flag and address counter) is read, otherwise the DDRAM or CGRAM byte at the
    /// address counter, depending on which address was last set.
    fn read_byte<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
        rs_setting: bool,
    ) -> Result<u8, CharacterDisplayError<Self::Error>>;

    fn is_busy<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
    ) -> Result<bool, CharacterDisplayError<Self::Error>> {
        Ok(self.read_byte(clock, false)? & BUSY_FLAG != 0)
    }

    /// Polls the busy flag until it clears. There is no timeout: a controller that never
    /// reports ready blocks here forever.
    fn wait_while_busy<DELAY: DelayNs>(
        &mut self,
        clock: &mut Clock<DELAY>,
    ) -> Result<(), CharacterDisplayError<Self::Error>> {
        while self.is_busy(clock)? {
            // wait
        }
        Ok(())
    }
}
