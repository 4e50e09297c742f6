// HD44780 Support
// The HD44780 struct is the controller command layer. It maps display operations onto instruction
// bytes, keeps the shadow copies of the cumulative registers (function set, display control and
// entry mode) and tracks the initialization state. Bytes reach the controller through an object
// implementing HD44780AdapterTrait, which owns the physical wiring:
//      * ParallelAdapter, for 4-bit, 8-bit and 8-bit port parallel wiring
//      * GenericPCF8574TAdapter, for PCF8574T based I2C backpacks
//

pub mod adapter;

use embedded_hal::delay::DelayNs;

use crate::{
    config::{BusWidth, DisplayConfig, VfdType, Wiring},
    driver::hd44780::adapter::{HD44780AdapterTrait, ReadableAdapterTrait, BUSY_FLAG},
    timing::{Clock, Wait},
    CharacterDisplayError, LcdDisplayType,
};

// commands
pub const LCD_CMD_CLEARDISPLAY: u8 = 0x01; //  Clear display, set cursor position to zero
pub const LCD_CMD_RETURNHOME: u8 = 0x02; //  Set cursor position to zero
pub const LCD_CMD_ENTRYMODESET: u8 = 0x04; //  Sets the entry mode
pub const LCD_CMD_DISPLAYCONTROL: u8 = 0x08; //  Controls the display; does stuff like turning it off and on
pub const LCD_CMD_CURSORSHIFT: u8 = 0x10; //  Lets you move the cursor
pub const LCD_CMD_FUNCTIONSET: u8 = 0x20; //  Used to send the function to set to the display
pub const LCD_CMD_SETCGRAMADDR: u8 = 0x40; //  Used to set the CGRAM (character generator RAM) with characters
pub const LCD_CMD_SETDDRAMADDR: u8 = 0x80; //  Used to set the DDRAM (Display Data RAM)

// flags for display entry mode
pub const LCD_FLAG_ENTRYRIGHT: u8 = 0x00; //  Used to set text to flow from right to left
pub const LCD_FLAG_ENTRYLEFT: u8 = 0x02; //  Used to set text to flow from left to right
pub const LCD_FLAG_ENTRYSHIFTINCREMENT: u8 = 0x01; //  Used to 'right justify' text from the cursor
pub const LCD_FLAG_ENTRYSHIFTDECREMENT: u8 = 0x00; //  Used to 'left justify' text from the cursor

// flags for display on/off control
pub const LCD_FLAG_DISPLAYON: u8 = 0x04; //  Turns the display on
pub const LCD_FLAG_DISPLAYOFF: u8 = 0x00; //  Turns the display off
pub const LCD_FLAG_CURSORON: u8 = 0x02; //  Turns the cursor on
pub const LCD_FLAG_CURSOROFF: u8 = 0x00; //  Turns the cursor off
pub const LCD_FLAG_BLINKON: u8 = 0x01; //  Turns on the blinking cursor
pub const LCD_FLAG_BLINKOFF: u8 = 0x00; //  Turns off the blinking cursor

// flags for display/cursor shift
pub const LCD_FLAG_DISPLAYMOVE: u8 = 0x08; //  Flag for moving the display
pub const LCD_FLAG_CURSORMOVE: u8 = 0x00; //  Flag for moving the cursor
pub const LCD_FLAG_MOVERIGHT: u8 = 0x04; //  Flag for moving right
pub const LCD_FLAG_MOVELEFT: u8 = 0x00; //  Flag for moving left

// flags for function set
pub const LCD_FLAG_8BITMODE: u8 = 0x10; //  LCD 8 bit mode
pub const LCD_FLAG_4BITMODE: u8 = 0x00; //  LCD 4 bit mode
pub const LCD_FLAG_2LINE: u8 = 0x08; //  LCD 2 line mode
pub const LCD_FLAG_1LINE: u8 = 0x00; //  LCD 1 line mode
pub const LCD_FLAG_5x10_DOTS: u8 = 0x04; //  10 pixel high font mode
pub const LCD_FLAG_5x8_DOTS: u8 = 0x00; //  8 pixel high font mode
const LCD_FLAG_BRIGHTNESS_MASK: u8 = 0x03; //  VFD brightness bits of function set

const ENTRY_MODE_MASK: u8 = LCD_FLAG_ENTRYLEFT | LCD_FLAG_ENTRYSHIFTINCREMENT;
const DISPLAY_CONTROL_MASK: u8 = LCD_FLAG_DISPLAYON | LCD_FLAG_CURSORON | LCD_FLAG_BLINKON;

/// Shadow copy of the write-only controller registers. The controller cannot report these back,
/// so every operation that changes one bit has to resend the whole register from here.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct DisplayState {
    /// Function set flags (data length, lines, font, VFD brightness)
    pub display_function: u8,
    /// Display control flags (display, cursor, blink)
    pub display_control: u8,
    /// Entry mode flags (direction, shift)
    pub display_mode: u8,
    /// Backlight state. Only used by adapters with a backlight line.
    pub backlight: bool,
}

impl DisplayState {
    /// Initial state for a display: display on, cursor off, left to right without shift,
    /// 5x8 font, backlight on.
    pub const fn for_display(lcd_type: LcdDisplayType, wiring: Wiring) -> Self {
        let data_length = match wiring.bus_width() {
            BusWidth::Four => LCD_FLAG_4BITMODE,
            BusWidth::Eight => LCD_FLAG_8BITMODE,
        };
        let lines = if lcd_type.rows() > 1 {
            LCD_FLAG_2LINE
        } else {
            LCD_FLAG_1LINE
        };
        Self {
            display_function: data_length | lines | LCD_FLAG_5x8_DOTS,
            display_control: LCD_FLAG_DISPLAYON | LCD_FLAG_CURSOROFF | LCD_FLAG_BLINKOFF,
            display_mode: LCD_FLAG_ENTRYLEFT | LCD_FLAG_ENTRYSHIFTDECREMENT,
            backlight: true,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Lifecycle {
    Uninitialized,
    /// Initialization started but has not completed. Also the state left behind by a failed
    /// initialization.
    Initializing,
    Ready,
}

/// VFD brightness levels.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Brightness {
    Percent100,
    Percent75,
    Percent50,
    Percent25,
}

impl Brightness {
    pub const fn bits(self) -> u8 {
        match self {
            Brightness::Percent100 => 0b00,
            Brightness::Percent75 => 0b01,
            Brightness::Percent50 => 0b10,
            Brightness::Percent25 => 0b11,
        }
    }
}

/// Controller command layer for one HD44780.
#[derive(Debug, Clone)]
pub struct HD44780 {
    lcd_type: LcdDisplayType,
    vfd: Option<VfdType>,
    state: DisplayState,
    lifecycle: Lifecycle,
}

impl HD44780 {
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            lcd_type: config.lcd_type(),
            vfd: config.vfd(),
            state: DisplayState::for_display(config.lcd_type(), config.wiring()),
            lifecycle: Lifecycle::Uninitialized,
        }
    }

    pub fn state(&self) -> DisplayState {
        self.state
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn lcd_type(&self) -> LcdDisplayType {
        self.lcd_type
    }

    fn ensure_ready<E>(&self) -> Result<(), CharacterDisplayError<E>> {
        if self.lifecycle == Lifecycle::Ready {
            Ok(())
        } else {
            Err(CharacterDisplayError::NotInitialized)
        }
    }

    fn send_command<A, DELAY>(
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        command: u8,
        wait: Wait,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        adapter.write_byte(clock, false, command)?;
        adapter.wait_ready(clock, wait)
    }

    fn send_data<A, DELAY>(
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        value: u8,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        adapter.write_byte(clock, true, value)?;
        adapter.wait_ready(clock, Wait::Command)
    }

    /// Runs the initialization by instruction sequence and applies `initial`. The data length
    /// flag of `initial` is replaced by the one matching the adapter's wiring.
    pub fn init<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        initial: DisplayState,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        #[cfg(feature = "defmt")]
        defmt::debug!("Initializing HD44780 for a {} display", self.lcd_type);
        self.lifecycle = Lifecycle::Initializing;

        let mut state = initial;
        let width = A::WIRING.bus_width();
        match width {
            BusWidth::Four => state.display_function &= !LCD_FLAG_8BITMODE,
            BusWidth::Eight => state.display_function |= LCD_FLAG_8BITMODE,
        }
        // the sync nibble travels on D4..D7
        let sync_frame = |nibble: u8| match width {
            BusWidth::Four => nibble,
            BusWidth::Eight => nibble << 4,
        };

        clock.wait(Wait::PowerOn);
        adapter.init(clock, state.backlight)?;

        // the busy flag cannot be checked until the interface width is set
        adapter.write_frame(clock, false, sync_frame(0x03))?;
        clock.wait(Wait::InitPhase1);
        adapter.write_frame(clock, false, sync_frame(0x03))?;
        clock.wait(Wait::InitPhase2);
        adapter.write_frame(clock, false, sync_frame(0x03))?;
        clock.wait(Wait::Command);
        if width == BusWidth::Four {
            adapter.write_frame(clock, false, 0x02)?;
            clock.wait(Wait::Command);
        }

        Self::send_command(
            adapter,
            clock,
            LCD_CMD_FUNCTIONSET | state.display_function,
            Wait::Command,
        )?;
        Self::send_command(
            adapter,
            clock,
            LCD_CMD_DISPLAYCONTROL | (state.display_control & DISPLAY_CONTROL_MASK),
            Wait::Command,
        )?;
        Self::send_command(adapter, clock, LCD_CMD_CLEARDISPLAY, Wait::Clear)?;
        Self::send_command(
            adapter,
            clock,
            LCD_CMD_ENTRYMODESET | (state.display_mode & ENTRY_MODE_MASK),
            Wait::Command,
        )?;
        Self::send_command(adapter, clock, LCD_CMD_RETURNHOME, Wait::Clear)?;

        if A::WIRING == Wiring::I2cExpander {
            adapter.set_backlight(state.backlight)?;
        }

        state.display_control &= DISPLAY_CONTROL_MASK;
        state.display_mode &= ENTRY_MODE_MASK;
        self.state = state;
        self.lifecycle = Lifecycle::Ready;
        #[cfg(feature = "defmt")]
        defmt::debug!("HD44780 ready");
        Ok(())
    }

    /// Clear the display and return the cursor home.
    pub fn clear<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.ensure_ready()?;
        Self::send_command(adapter, clock, LCD_CMD_CLEARDISPLAY, Wait::Clear)
    }

    /// Return the cursor home and undo any display shift.
    pub fn home<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.ensure_ready()?;
        Self::send_command(adapter, clock, LCD_CMD_RETURNHOME, Wait::Clear)
    }

    /// Set the cursor position at specified column and row. Columns and rows are zero-indexed.
    pub fn set_cursor<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        col: u8,
        row: u8,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        if row >= self.lcd_type.rows() {
            return Err(CharacterDisplayError::RowOutOfRange);
        }
        if col >= self.lcd_type.cols() {
            return Err(CharacterDisplayError::ColumnOutOfRange);
        }
        let address = self.lcd_type.ddram_address(col, row);
        self.set_ddram_address(adapter, clock, address)
    }

    /// Set the DDRAM address (0x00..=0x7F). Following data goes to display memory.
    pub fn set_ddram_address<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        address: u8,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.ensure_ready()?;
        if address > 0x7F {
            return Err(CharacterDisplayError::AddressOutOfRange);
        }
        Self::send_command(adapter, clock, LCD_CMD_SETDDRAMADDR | address, Wait::Command)
    }

    /// Set the CGRAM address (0x00..=0x3F). Following data goes to the custom character patterns.
    pub fn set_cgram_address<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        address: u8,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.ensure_ready()?;
        if address > 0x3F {
            return Err(CharacterDisplayError::AddressOutOfRange);
        }
        Self::send_command(adapter, clock, LCD_CMD_SETCGRAMADDR | address, Wait::Command)
    }

    /// Sends a new display control register and commits it to the shadow state once the
    /// controller accepted it.
    fn update_display_control<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        control: u8,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.ensure_ready()?;
        let control = control & DISPLAY_CONTROL_MASK;
        Self::send_command(
            adapter,
            clock,
            LCD_CMD_DISPLAYCONTROL | control,
            Wait::Command,
        )?;
        self.state.display_control = control;
        Ok(())
    }

    fn update_entry_mode<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        mode: u8,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.ensure_ready()?;
        let mode = mode & ENTRY_MODE_MASK;
        Self::send_command(adapter, clock, LCD_CMD_ENTRYMODESET | mode, Wait::Command)?;
        self.state.display_mode = mode;
        Ok(())
    }

    fn toggled(register: u8, flag: u8, on: bool) -> u8 {
        if on {
            register | flag
        } else {
            register & !flag
        }
    }

    pub fn show_display<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        show_display: bool,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        let control = Self::toggled(
            self.state.display_control,
            LCD_FLAG_DISPLAYON,
            show_display,
        );
        self.update_display_control(adapter, clock, control)
    }

    pub fn show_cursor<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        show_cursor: bool,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        let control = Self::toggled(self.state.display_control, LCD_FLAG_CURSORON, show_cursor);
        self.update_display_control(adapter, clock, control)
    }

    pub fn blink_cursor<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        blink_cursor: bool,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        let control = Self::toggled(self.state.display_control, LCD_FLAG_BLINKON, blink_cursor);
        self.update_display_control(adapter, clock, control)
    }

    /// Replace the whole display control register with `flags`.
    pub fn set_display_control<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        flags: u8,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.update_display_control(adapter, clock, flags)
    }

    /// Replace the whole entry mode register with `flags`.
    pub fn set_entry_mode<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        flags: u8,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.update_entry_mode(adapter, clock, flags)
    }

    pub fn left_to_right<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        let mode = self.state.display_mode | LCD_FLAG_ENTRYLEFT;
        self.update_entry_mode(adapter, clock, mode)
    }

    pub fn right_to_left<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        let mode = self.state.display_mode & !LCD_FLAG_ENTRYLEFT;
        self.update_entry_mode(adapter, clock, mode)
    }

    /// Shift the display instead of the cursor on every write.
    pub fn autoscroll<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        autoscroll: bool,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        let mode = Self::toggled(
            self.state.display_mode,
            LCD_FLAG_ENTRYSHIFTINCREMENT,
            autoscroll,
        );
        self.update_entry_mode(adapter, clock, mode)
    }

    fn shift<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        flags: u8,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.ensure_ready()?;
        Self::send_command(adapter, clock, LCD_CMD_CURSORSHIFT | flags, Wait::Command)
    }

    pub fn scroll_display_left<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.shift(adapter, clock, LCD_FLAG_DISPLAYMOVE | LCD_FLAG_MOVELEFT)
    }

    pub fn scroll_display_right<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.shift(adapter, clock, LCD_FLAG_DISPLAYMOVE | LCD_FLAG_MOVERIGHT)
    }

    pub fn move_cursor_left<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.shift(adapter, clock, LCD_FLAG_CURSORMOVE | LCD_FLAG_MOVELEFT)
    }

    pub fn move_cursor_right<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.shift(adapter, clock, LCD_FLAG_CURSORMOVE | LCD_FLAG_MOVERIGHT)
    }

    /// Write one byte to DDRAM or CGRAM at the address counter, depending on which address was
    /// set last.
    pub fn write_char<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        value: u8,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.ensure_ready()?;
        Self::send_data(adapter, clock, value)
    }

    pub fn write_bytes<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        data: &[u8],
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.ensure_ready()?;
        for value in data {
            Self::send_data(adapter, clock, *value)?;
        }
        Ok(())
    }

    /// Writes the bytes of `text` unchanged. Characters outside the controller's ROM font show
    /// whatever glyph their byte values select.
    pub fn print<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        text: &str,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.write_bytes(adapter, clock, text.as_bytes())
    }

    /// Copy `data` into CGRAM starting at `address`. The address counter is left in CGRAM, so set
    /// a DDRAM address (for example with `set_cursor`) before writing text again.
    pub fn write_cgram<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        address: u8,
        data: &[u8],
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.set_cgram_address(adapter, clock, address)?;
        self.write_bytes(adapter, clock, data)
    }

    /// Define custom character `location` (0-7) from eight rows of 5 pixel bitmaps.
    pub fn create_char<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        location: u8,
        charmap: [u8; 8],
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        if location > 7 {
            return Err(CharacterDisplayError::AddressOutOfRange);
        }
        self.write_cgram(adapter, clock, location << 3, &charmap)
    }

    pub fn set_backlight<A>(
        &mut self,
        adapter: &mut A,
        on: bool,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
    {
        self.ensure_ready()?;
        adapter.set_backlight(on)?;
        self.state.backlight = on;
        Ok(())
    }

    /// Set the brightness of a VFD. The PT6314 takes the level in the low bits of function set,
    /// the Noritake CU20045 takes it as a data byte following a function set.
    pub fn set_brightness<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        brightness: Brightness,
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: HD44780AdapterTrait,
        DELAY: DelayNs,
    {
        self.ensure_ready()?;
        match self.vfd {
            None => Err(CharacterDisplayError::UnsupportedOperation),
            Some(VfdType::Pt6314) => {
                let function =
                    (self.state.display_function & !LCD_FLAG_BRIGHTNESS_MASK) | brightness.bits();
                Self::send_command(
                    adapter,
                    clock,
                    LCD_CMD_FUNCTIONSET | function,
                    Wait::Command,
                )?;
                self.state.display_function = function;
                Ok(())
            }
            Some(VfdType::NoritakeCu20045) => {
                Self::send_command(
                    adapter,
                    clock,
                    LCD_CMD_FUNCTIONSET | (self.state.display_function & !LCD_FLAG_BRIGHTNESS_MASK),
                    Wait::Command,
                )?;
                Self::send_data(adapter, clock, brightness.bits())
            }
        }
    }

    /// Reads the address counter. The busy bit is masked off.
    pub fn read_address_counter<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
    ) -> Result<u8, CharacterDisplayError<A::Error>>
    where
        A: ReadableAdapterTrait,
        DELAY: DelayNs,
    {
        self.ensure_ready()?;
        adapter.wait_while_busy(clock)?;
        Ok(adapter.read_byte(clock, false)? & !BUSY_FLAG)
    }

    /// Reads the address counter and maps it back to a `(col, row)` position. Returns `None`
    /// when the address is not visible on the display, or when the counter points into CGRAM.
    pub fn cursor_position<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
    ) -> Result<Option<(u8, u8)>, CharacterDisplayError<A::Error>>
    where
        A: ReadableAdapterTrait,
        DELAY: DelayNs,
    {
        let address = self.read_address_counter(adapter, clock)?;
        Ok(self.lcd_type.position_of(address))
    }

    /// Reads into the buffer from either CGRAM or DDRAM at the address counter, whichever was
    /// set last. The amount of data read is determined by the length of the buffer.
    pub fn read_device_data<A, DELAY>(
        &mut self,
        adapter: &mut A,
        clock: &mut Clock<DELAY>,
        buffer: &mut [u8],
    ) -> Result<(), CharacterDisplayError<A::Error>>
    where
        A: ReadableAdapterTrait,
        DELAY: DelayNs,
    {
        self.ensure_ready()?;
        for byte in buffer.iter_mut() {
            adapter.wait_while_busy(clock)?;
            *byte = adapter.read_byte(clock, true)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use crate::{
        config::Access,
        driver::hd44780::adapter::{
            data_bus::FourBitDataBus,
            parallel::{ParallelAdapter, ReadWritePin},
        },
        sim::{self, Event, SharedModel, SimDelay, SimPin},
        timing::ClockConfig,
    };
    use std::vec::Vec;

    const CLOCK: ClockConfig = ClockConfig::new(22_118_400, 12);

    type SimAdapter = ParallelAdapter<
        SimPin,
        SimPin,
        FourBitDataBus<SimPin, SimPin, SimPin, SimPin>,
        ReadWritePin<SimPin>,
    >;

    fn ready_controller(
        config: DisplayConfig,
    ) -> (SharedModel, HD44780, SimAdapter, Clock<SimDelay>) {
        let model = sim::shared_model();
        let (rs, rw, enable, data) = sim::four_bit_pins(&model);
        let mut adapter = ParallelAdapter::new_read_write(rs, rw, enable, data);
        let mut clock = Clock::new(config.timing(), SimDelay::new(&model));
        let mut controller = HD44780::new(&config);
        let initial = controller.state();
        controller.init(&mut adapter, &mut clock, initial).unwrap();
        {
            let mut m = model.borrow_mut();
            m.instructions.clear();
            m.events.clear();
            m.status_reads = 0;
        }
        (model, controller, adapter, clock)
    }

    fn lcd(lcd_type: LcdDisplayType) -> (SharedModel, HD44780, SimAdapter, Clock<SimDelay>) {
        ready_controller(
            DisplayConfig::new(Wiring::Parallel4Bit, Access::ReadWrite, lcd_type, CLOCK).unwrap(),
        )
    }

    fn delays(events: &[Event]) -> Vec<u32> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::Delay(ns) => Some(*ns),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_init_sequence_four_bit() {
        let model = sim::shared_model();
        let (rs, _, enable, data) = sim::four_bit_pins(&model);
        let mut adapter = ParallelAdapter::new(rs, enable, data);
        let config = DisplayConfig::new(
            Wiring::Parallel4Bit,
            Access::WriteOnly,
            LcdDisplayType::Lcd16x2,
            CLOCK,
        )
        .unwrap();
        let timing = config.timing();
        let mut clock = Clock::new(timing, SimDelay::new(&model));
        let mut controller = HD44780::new(&config);
        assert_eq!(controller.lifecycle(), Lifecycle::Uninitialized);

        let initial = controller.state();
        assert!(controller.init(&mut adapter, &mut clock, initial).is_ok());
        assert_eq!(controller.lifecycle(), Lifecycle::Ready);

        let m = model.borrow();
        assert_eq!(
            m.commands(),
            std::vec![0x30, 0x30, 0x30, 0x20, 0x28, 0x0C, 0x01, 0x06, 0x02]
        );
        assert!(m.four_bit);
        assert_eq!(m.display_control, LCD_FLAG_DISPLAYON);
        assert_eq!(m.entry_mode, LCD_FLAG_ENTRYLEFT);
        assert_eq!(
            delays(&m.events),
            std::vec![
                timing.wait_ns(Wait::PowerOn),
                timing.wait_ns(Wait::InitPhase1),
                timing.wait_ns(Wait::InitPhase2),
                timing.wait_ns(Wait::Command),
                timing.wait_ns(Wait::Command),
                timing.wait_ns(Wait::Command), // function set
                timing.wait_ns(Wait::Command), // display control
                timing.wait_ns(Wait::Clear),
                timing.wait_ns(Wait::Command), // entry mode
                timing.wait_ns(Wait::Clear),   // home
            ]
        );
        // the power-on wait comes before any line activity
        assert_eq!(m.events[0], Event::Delay(timing.wait_ns(Wait::PowerOn)));
    }

    #[test]
    fn test_init_sequence_eight_bit_forces_data_length() {
        let model = sim::shared_model();
        let (rs, _, enable, data) = sim::eight_bit_pins(&model);
        let mut adapter = ParallelAdapter::new(rs, enable, data);
        let config = DisplayConfig::new(
            Wiring::Parallel8Bit,
            Access::WriteOnly,
            LcdDisplayType::Lcd20x4,
            CLOCK,
        )
        .unwrap();
        let mut clock = Clock::new(config.timing(), SimDelay::new(&model));
        let mut controller = HD44780::new(&config);
        let initial = DisplayState {
            display_function: LCD_FLAG_2LINE,
            display_control: LCD_FLAG_DISPLAYON | LCD_FLAG_CURSORON,
            display_mode: LCD_FLAG_ENTRYLEFT | LCD_FLAG_ENTRYSHIFTINCREMENT,
            backlight: false,
        };
        assert!(controller.init(&mut adapter, &mut clock, initial).is_ok());

        assert_eq!(
            model.borrow().commands(),
            std::vec![0x30, 0x30, 0x30, 0x38, 0x0E, 0x01, 0x07, 0x02]
        );
        assert_eq!(
            controller.state().display_function,
            LCD_FLAG_8BITMODE | LCD_FLAG_2LINE
        );
        assert_eq!(controller.state().display_mode, 0x03);
    }

    #[test]
    fn test_init_one_line_display() {
        let config = DisplayConfig::new(
            Wiring::Parallel4Bit,
            Access::ReadWrite,
            LcdDisplayType::Lcd20x1,
            CLOCK,
        )
        .unwrap();
        let (model, controller, _, _) = ready_controller(config);
        assert_eq!(controller.state().display_function, LCD_FLAG_1LINE);
        assert_eq!(model.borrow().display_function, LCD_CMD_FUNCTIONSET);
    }

    #[test]
    fn test_operations_before_init() {
        let model = sim::shared_model();
        let (rs, rw, enable, data) = sim::four_bit_pins(&model);
        let mut adapter = ParallelAdapter::new_read_write(rs, rw, enable, data);
        let config = DisplayConfig::new(
            Wiring::Parallel4Bit,
            Access::ReadWrite,
            LcdDisplayType::Lcd16x2,
            CLOCK,
        )
        .unwrap();
        let mut clock = Clock::new(config.timing(), SimDelay::new(&model));
        let mut controller = HD44780::new(&config);

        assert_eq!(
            controller.clear(&mut adapter, &mut clock),
            Err(CharacterDisplayError::NotInitialized)
        );
        assert_eq!(
            controller.print(&mut adapter, &mut clock, "x"),
            Err(CharacterDisplayError::NotInitialized)
        );
        assert_eq!(
            controller.read_address_counter(&mut adapter, &mut clock),
            Err(CharacterDisplayError::NotInitialized)
        );
        assert!(model.borrow().events.is_empty());
    }

    #[test]
    fn test_set_cursor_addresses() {
        let (model, mut controller, mut adapter, mut clock) = lcd(LcdDisplayType::Lcd16x2);
        controller.set_cursor(&mut adapter, &mut clock, 0, 0).unwrap();
        controller.set_cursor(&mut adapter, &mut clock, 5, 1).unwrap();
        assert_eq!(model.borrow().commands(), std::vec![0x80, 0xC5]);
        assert_eq!(model.borrow().address_counter, 0x45);
        assert_eq!(
            controller.set_cursor(&mut adapter, &mut clock, 0, 2),
            Err(CharacterDisplayError::RowOutOfRange)
        );
        assert_eq!(
            controller.set_cursor(&mut adapter, &mut clock, 16, 0),
            Err(CharacterDisplayError::ColumnOutOfRange)
        );

        let (model, mut controller, mut adapter, mut clock) = lcd(LcdDisplayType::Lcd20x4);
        controller.set_cursor(&mut adapter, &mut clock, 0, 2).unwrap();
        controller.set_cursor(&mut adapter, &mut clock, 0, 3).unwrap();
        controller.set_cursor(&mut adapter, &mut clock, 19, 1).unwrap();
        assert_eq!(model.borrow().commands(), std::vec![0x94, 0xD4, 0xD3]);
    }

    #[test]
    fn test_address_out_of_range() {
        let (model, mut controller, mut adapter, mut clock) = lcd(LcdDisplayType::Lcd16x2);
        assert_eq!(
            controller.set_ddram_address(&mut adapter, &mut clock, 0x80),
            Err(CharacterDisplayError::AddressOutOfRange)
        );
        assert_eq!(
            controller.set_cgram_address(&mut adapter, &mut clock, 0x40),
            Err(CharacterDisplayError::AddressOutOfRange)
        );
        assert_eq!(
            controller.create_char(&mut adapter, &mut clock, 8, [0; 8]),
            Err(CharacterDisplayError::AddressOutOfRange)
        );
        assert!(model.borrow().instructions.is_empty());
        assert!(controller.set_ddram_address(&mut adapter, &mut clock, 0x7F).is_ok());
        assert!(controller.set_cgram_address(&mut adapter, &mut clock, 0x3F).is_ok());
    }

    #[test]
    fn test_display_control_flags() {
        let (model, mut controller, mut adapter, mut clock) = lcd(LcdDisplayType::Lcd16x2);
        controller.show_display(&mut adapter, &mut clock, false).unwrap();
        assert_eq!(controller.state().display_control, 0x00);
        controller.show_display(&mut adapter, &mut clock, true).unwrap();
        assert_eq!(controller.state().display_control, LCD_FLAG_DISPLAYON);
        controller.show_cursor(&mut adapter, &mut clock, true).unwrap();
        controller.blink_cursor(&mut adapter, &mut clock, true).unwrap();
        controller.show_cursor(&mut adapter, &mut clock, false).unwrap();
        assert_eq!(
            model.borrow().commands(),
            std::vec![0x08, 0x0C, 0x0E, 0x0F, 0x0D]
        );
        assert_eq!(
            controller.state().display_control,
            LCD_FLAG_DISPLAYON | LCD_FLAG_BLINKON
        );
        assert_eq!(model.borrow().display_control, 0x05);

        controller
            .set_display_control(&mut adapter, &mut clock, LCD_FLAG_CURSORON)
            .unwrap();
        assert_eq!(controller.state().display_control, LCD_FLAG_CURSORON);
    }

    #[test]
    fn test_entry_mode_round_trip() {
        let (model, mut controller, mut adapter, mut clock) = lcd(LcdDisplayType::Lcd16x2);
        let flags = LCD_FLAG_ENTRYLEFT | LCD_FLAG_ENTRYSHIFTDECREMENT;
        controller.set_entry_mode(&mut adapter, &mut clock, flags).unwrap();
        let first = controller.state();
        assert_eq!(first.display_mode, flags);
        controller.set_entry_mode(&mut adapter, &mut clock, flags).unwrap();
        assert_eq!(controller.state(), first);
        // the transfer is still issued each time
        assert_eq!(model.borrow().commands(), std::vec![0x06, 0x06]);
    }

    #[test]
    fn test_text_direction_and_autoscroll() {
        let (model, mut controller, mut adapter, mut clock) = lcd(LcdDisplayType::Lcd16x2);
        controller.right_to_left(&mut adapter, &mut clock).unwrap();
        controller.autoscroll(&mut adapter, &mut clock, true).unwrap();
        controller.left_to_right(&mut adapter, &mut clock).unwrap();
        controller.autoscroll(&mut adapter, &mut clock, false).unwrap();
        assert_eq!(model.borrow().commands(), std::vec![0x04, 0x05, 0x07, 0x06]);
        assert_eq!(controller.state().display_mode, LCD_FLAG_ENTRYLEFT);
    }

    #[test]
    fn test_shift_commands() {
        let (model, mut controller, mut adapter, mut clock) = lcd(LcdDisplayType::Lcd16x2);
        controller.scroll_display_left(&mut adapter, &mut clock).unwrap();
        controller.scroll_display_left(&mut adapter, &mut clock).unwrap();
        controller.scroll_display_right(&mut adapter, &mut clock).unwrap();
        controller.move_cursor_right(&mut adapter, &mut clock).unwrap();
        controller.move_cursor_right(&mut adapter, &mut clock).unwrap();
        controller.move_cursor_left(&mut adapter, &mut clock).unwrap();
        let m = model.borrow();
        assert_eq!(m.commands(), std::vec![0x18, 0x18, 0x1C, 0x14, 0x14, 0x10]);
        assert_eq!(m.display_shift, -1);
        assert_eq!(m.address_counter, 1);
    }

    #[test]
    fn test_write_and_read_back() {
        let (model, mut controller, mut adapter, mut clock) = lcd(LcdDisplayType::Lcd16x2);
        controller.clear(&mut adapter, &mut clock).unwrap();
        controller.print(&mut adapter, &mut clock, "HI").unwrap();
        assert_eq!(
            controller.cursor_position(&mut adapter, &mut clock).unwrap(),
            Some((2, 0))
        );
        controller.set_cursor(&mut adapter, &mut clock, 0, 1).unwrap();
        controller.write_char(&mut adapter, &mut clock, b'L').unwrap();
        controller.write_bytes(&mut adapter, &mut clock, b"O").unwrap();

        assert_eq!(model.borrow().ddram_slice(0x00, 2), b"HI");
        assert_eq!(model.borrow().ddram_slice(0x40, 2), b"LO");
        assert_eq!(
            controller.read_address_counter(&mut adapter, &mut clock).unwrap(),
            0x42
        );

        let mut buffer = [0u8; 2];
        controller.set_ddram_address(&mut adapter, &mut clock, 0x40).unwrap();
        controller
            .read_device_data(&mut adapter, &mut clock, &mut buffer)
            .unwrap();
        assert_eq!(&buffer, b"LO");
        controller.home(&mut adapter, &mut clock).unwrap();
        controller
            .read_device_data(&mut adapter, &mut clock, &mut buffer)
            .unwrap();
        assert_eq!(&buffer, b"HI");
    }

    #[test]
    fn test_create_char() {
        let (model, mut controller, mut adapter, mut clock) = lcd(LcdDisplayType::Lcd16x2);
        let smiley = [0x00, 0x0A, 0x0A, 0x00, 0x11, 0x0E, 0x00, 0x00];
        controller
            .create_char(&mut adapter, &mut clock, 1, smiley)
            .unwrap();
        let m = model.borrow();
        assert_eq!(m.commands(), std::vec![0x48]);
        assert_eq!(&m.cgram[8..16], &smiley);
        assert!(m.cgram_selected);
    }

    #[test]
    fn test_busy_flag_replaces_clear_delay() {
        let (model, mut controller, mut adapter, mut clock) = lcd(LcdDisplayType::Lcd16x2);
        model.borrow_mut().busy_reads_per_instruction = 2;
        controller.clear(&mut adapter, &mut clock).unwrap();
        let m = model.borrow();
        assert_eq!(m.status_reads, 3);
        assert!(delays(&m.events).is_empty());
    }

    #[test]
    fn test_backlight_unsupported_on_parallel() {
        let (_, mut controller, mut adapter, _) = lcd(LcdDisplayType::Lcd16x2);
        assert_eq!(
            controller.set_backlight(&mut adapter, false),
            Err(CharacterDisplayError::UnsupportedOperation)
        );
        assert!(controller.state().backlight);
    }

    #[test]
    fn test_vfd_brightness() {
        let config = DisplayConfig::new(
            Wiring::Parallel4Bit,
            Access::ReadWrite,
            LcdDisplayType::Lcd20x2,
            CLOCK,
        )
        .unwrap();

        let (model, mut controller, mut adapter, mut clock) =
            ready_controller(config.with_vfd(VfdType::Pt6314));
        controller
            .set_brightness(&mut adapter, &mut clock, Brightness::Percent50)
            .unwrap();
        assert_eq!(model.borrow().commands(), std::vec![0x2A]);
        assert_eq!(controller.state().display_function, 0x0A);
        controller
            .set_brightness(&mut adapter, &mut clock, Brightness::Percent25)
            .unwrap();
        assert_eq!(controller.state().display_function, 0x0B);

        let (model, mut controller, mut adapter, mut clock) =
            ready_controller(config.with_vfd(VfdType::NoritakeCu20045));
        controller
            .set_brightness(&mut adapter, &mut clock, Brightness::Percent75)
            .unwrap();
        assert_eq!(
            model.borrow().instructions,
            std::vec![(false, 0x28), (true, 0x01)]
        );

        let (_, mut controller, mut adapter, mut clock) = ready_controller(config);
        assert_eq!(
            controller.set_brightness(&mut adapter, &mut clock, Brightness::Percent100),
            Err(CharacterDisplayError::UnsupportedOperation)
        );
    }

    struct FlakyAdapter {
        fail: bool,
        frames: Vec<(bool, u8)>,
    }

    impl HD44780AdapterTrait for FlakyAdapter {
        type Error = ();
        const WIRING: Wiring = Wiring::Parallel8Bit;
        const ACCESS: Access = Access::WriteOnly;

        fn write_frame<DELAY: DelayNs>(
            &mut self,
            _clock: &mut Clock<DELAY>,
            rs_setting: bool,
            value: u8,
        ) -> Result<(), CharacterDisplayError<Self::Error>> {
            if self.fail {
                return Err(CharacterDisplayError::BusError(()));
            }
            self.frames.push((rs_setting, value));
            Ok(())
        }
    }

    #[test]
    fn test_shadow_state_unchanged_on_bus_error() {
        let config = DisplayConfig::new(
            Wiring::Parallel8Bit,
            Access::WriteOnly,
            LcdDisplayType::Lcd16x2,
            CLOCK,
        )
        .unwrap();
        let mut adapter = FlakyAdapter {
            fail: true,
            frames: Vec::new(),
        };
        let mut clock = Clock::new(config.timing(), embedded_hal_mock::eh1::delay::NoopDelay);
        let mut controller = HD44780::new(&config);
        let initial = controller.state();

        // a failed init leaves the controller unusable
        assert_eq!(
            controller.init(&mut adapter, &mut clock, initial),
            Err(CharacterDisplayError::BusError(()))
        );
        assert_eq!(controller.lifecycle(), Lifecycle::Initializing);

        adapter.fail = false;
        controller.init(&mut adapter, &mut clock, initial).unwrap();
        assert_eq!(adapter.frames.len(), 8);

        let before = controller.state();
        adapter.fail = true;
        assert_eq!(
            controller.show_cursor(&mut adapter, &mut clock, true),
            Err(CharacterDisplayError::BusError(()))
        );
        assert_eq!(
            controller.autoscroll(&mut adapter, &mut clock, true),
            Err(CharacterDisplayError::BusError(()))
        );
        assert_eq!(controller.state(), before);
    }
}
