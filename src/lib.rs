//! This Rust `embedded-hal`-based library drives [HD44780](https://en.wikipedia.org/wiki/Hitachi_HD44780_LCD_controller)
//! compatible character LCD and VFD displays in an embedded, `no_std` environment. The controller can be connected in several ways:
//!
//! - **Parallel 4-bit** - D4..D7, RS and E on individual pins, with or without the R/W line.
//! - **Parallel 8-bit** - D0..D7, RS and E on individual pins, with or without the R/W line.
//! - **Parallel 8-bit port** - D0..D7 on one 8-bit port that is written as a whole, such as an 8051 `P0`..`P3`.
//! - **PCF8574-based I2C adapter** - The ubiquitous "I2C backpack", with the display 4-bit data pins connected to P4-P7
//!   and RS, R/W, E and the backlight on P0-P3.
//!
//! When the R/W line is wired the driver polls the controller's busy flag. Otherwise it waits blindly, using delays computed
//! from the datasheet minimums and the host's instruction clock and always rounded up.
//!
//! Key features include:
//! - Convenient high-level API for controlling the display
//! - Support for custom characters
//! - Backlight control on I2C adapters, brightness control on Noritake CU20045 and PT6314 VFDs
//! - `core::fmt::Write` implementation for easy use with the `write!` macro
//! - Compatible with the `embedded-hal` traits v1.0 and later
//! - Optional support for the `defmt` and `ufmt` logging frameworks
//! - Reading the address counter and display memory back on adapters with the R/W line wired
//!
//! ## Usage
//! Add this to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! hd44780-bus-display = { version = "0.1", features = ["defmt"] }
//! ```
//! The `features = ["defmt"]` line is optional and enables the `defmt` feature, which allows the library's errors to be used with the `defmt` logging
//! framework. Another optional feature is `features = ["ufmt"]`, which enables the `ufmt` feature, allowing the `uwriteln!` and `uwrite!` macros to be used.
//!
//! Then select the adapter matching your wiring and describe the host clock:
//! ```rust
//! use hd44780_bus_display::{
//!     CharacterDisplay, ClockConfig, FourBitDataBus, GenericPCF8574TAdapter, LcdDisplayType, ParallelAdapter,
//! };
//!
//! // board setup
//! let i2c = ...; // I2C peripheral
//! let delay = ...; // DelayNs implementation
//! let clock = ClockConfig::new(22_118_400, 12);
//!
//! // PCF8574T adapter
//! let mut lcd = CharacterDisplay::from_adapter(GenericPCF8574TAdapter::new(i2c), LcdDisplayType::Lcd16x2, clock, delay)?;
//! // 4-bit parallel bus, R/W tied to ground
//! let data = FourBitDataBus::new(d4, d5, d6, d7);
//! let mut lcd = CharacterDisplay::from_adapter(ParallelAdapter::new(rs, e, data), LcdDisplayType::Lcd20x4, clock, delay)?;
//! ```
//! When creating the display object, you can choose the display type from the `LcdDisplayType` enum. The display type should match the physical
//! display you are using. This display type configures the number of rows and columns, and the internal row offsets for the display.
//!
//! Initialize the display:
//! ```rust
//! if let Err(e) = lcd.init() {
//!    panic!("Error initializing LCD: {}", e);
//! }
//! ```
//! Use the display:
//! ```rust
//! // set up the display
//! lcd.backlight(true)?.clear()?.home()?;
//! // print a message
//! lcd.print("Hello, world!")?;
//! // can also use the `core::fmt::write!` macro
//! use core::fmt::Write;
//!
//! write!(lcd, "Hello, world!")?;
//! ```
//!
//! The various methods for controlling the LCD are also available. Each returns a `Result` that wraps the display object in `Ok()`, allowing for easy chaining
//! of commands. For example:
//! ```rust
//! lcd.clear()?.set_cursor(0, 1)?.print("Hello, world!")?;
//! ```
//! ### Reading from the display
//! Adapters created with the R/W line (`ParallelAdapter::new_read_write`, `GenericPCF8574TAdapter::new_read_capable`) can read from the
//! controller. The `read_device_data` method reads from either the CGRAM or DDRAM at the current cursor position, `read_address_counter`
//! reads the address counter and `cursor_position` turns it back into a column and row. These methods do not exist on write-only adapters.
//!
#![no_std]
#![allow(non_upper_case_globals)]
use core::fmt::Display;

use embedded_hal::delay::DelayNs;

pub mod config;
mod driver;
#[cfg(test)]
mod sim;
pub mod timing;

pub use config::{Access, BusWidth, ConfigError, DisplayConfig, VfdType, Wiring};
pub use driver::hd44780::{
    adapter::{
        data_bus::{
            DataBus, DataPort, EightBitDataBus, FourBitDataBus, PortDataBus, ReadableDataBus,
            ReadableDataPort,
        },
        generic_pcf8574t::GenericPCF8574TAdapter,
        parallel::{ParallelAdapter, ReadWriteLine, ReadWritePin},
        AccessMode, HD44780AdapterTrait, ReadCapable, ReadableAdapterTrait, WriteOnly, BUSY_FLAG,
    },
    Brightness, DisplayState, Lifecycle, HD44780, LCD_FLAG_1LINE, LCD_FLAG_2LINE,
    LCD_FLAG_4BITMODE, LCD_FLAG_5x10_DOTS, LCD_FLAG_5x8_DOTS, LCD_FLAG_8BITMODE,
    LCD_FLAG_BLINKOFF, LCD_FLAG_BLINKON, LCD_FLAG_CURSOROFF, LCD_FLAG_CURSORON,
    LCD_FLAG_DISPLAYOFF, LCD_FLAG_DISPLAYON, LCD_FLAG_ENTRYLEFT, LCD_FLAG_ENTRYRIGHT,
    LCD_FLAG_ENTRYSHIFTDECREMENT, LCD_FLAG_ENTRYSHIFTINCREMENT,
};
pub use timing::{ClockConfig, Clock, CycleDelay, Granularity, Timing, Wait};

/// HD44780 based character display using a generic PCF8574T I2C adapter.
pub type CharacterDisplayPCF8574T<I2C, DELAY, M = WriteOnly> =
    CharacterDisplay<GenericPCF8574TAdapter<I2C, M>, DELAY>;

/// HD44780 based character display wired directly to host pins.
pub type CharacterDisplayParallel<RS, E, DATA, DELAY, RW = WriteOnly> =
    CharacterDisplay<ParallelAdapter<RS, E, DATA, RW>, DELAY>;

#[derive(Debug, PartialEq, Copy, Clone)]
/// Errors that can occur when using the display
pub enum CharacterDisplayError<E> {
    /// Error returned from the underlying bus, I2C or GPIO
    BusError(E),
    /// Row is out of range
    RowOutOfRange,
    /// Column is out of range
    ColumnOutOfRange,
    /// DDRAM, CGRAM or custom character address is out of range
    AddressOutOfRange,
    /// Formatting error
    FormattingError(core::fmt::Error),
    /// The operation is not supported by the adapter or display
    UnsupportedOperation,
    /// The display has not been initialized
    NotInitialized,
    /// The configuration does not describe the adapter's wiring
    ConfigMismatch,
    /// The configuration is invalid
    InvalidConfig(ConfigError),
}

impl<E> From<core::fmt::Error> for CharacterDisplayError<E> {
    fn from(err: core::fmt::Error) -> Self {
        CharacterDisplayError::FormattingError(err)
    }
}

impl<E> From<ConfigError> for CharacterDisplayError<E> {
    fn from(err: ConfigError) -> Self {
        CharacterDisplayError::InvalidConfig(err)
    }
}

impl<E> From<&CharacterDisplayError<E>> for &'static str {
    fn from(err: &CharacterDisplayError<E>) -> Self {
        match err {
            CharacterDisplayError::BusError(_) => "Bus error",
            CharacterDisplayError::RowOutOfRange => "Row out of range",
            CharacterDisplayError::ColumnOutOfRange => "Column out of range",
            CharacterDisplayError::AddressOutOfRange => "Address out of range",
            CharacterDisplayError::FormattingError(_) => "Formatting error",
            CharacterDisplayError::UnsupportedOperation => "Unsupported operation",
            CharacterDisplayError::NotInitialized => "Display not initialized",
            CharacterDisplayError::ConfigMismatch => "Configuration does not match adapter",
            CharacterDisplayError::InvalidConfig(e) => From::from(e),
        }
    }
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for CharacterDisplayError<E> {
    fn format(&self, fmt: defmt::Formatter) {
        let msg: &'static str = From::from(self);
        defmt::write!(fmt, "{}", msg);
    }
}

#[cfg(feature = "ufmt")]
impl<E> ufmt::uDisplay for CharacterDisplayError<E> {
    fn fmt<W>(&self, w: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        let msg: &'static str = From::from(self);
        ufmt::uwrite!(w, "{}", msg)
    }
}

impl<E> Display for CharacterDisplayError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg: &'static str = From::from(self);
        write!(f, "{}", msg)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
/// The type of LCD display. This is used to determine the number of rows and columns, and the row offsets.
pub enum LcdDisplayType {
    /// 20x4 display
    Lcd20x4,
    /// 20x2 display
    Lcd20x2,
    /// 20x1 display
    Lcd20x1,
    /// 16x2 display
    Lcd16x2,
    /// 16x4 display
    Lcd16x4,
    /// 8x2 display
    Lcd8x2,
    /// 8x1 display
    Lcd8x1,
    /// 40x2 display
    Lcd40x2,
}

impl From<&LcdDisplayType> for &'static str {
    fn from(display_type: &LcdDisplayType) -> Self {
        match display_type {
            LcdDisplayType::Lcd20x4 => "20x4",
            LcdDisplayType::Lcd20x2 => "20x2",
            LcdDisplayType::Lcd20x1 => "20x1",
            LcdDisplayType::Lcd16x2 => "16x2",
            LcdDisplayType::Lcd16x4 => "16x4",
            LcdDisplayType::Lcd8x2 => "8x2",
            LcdDisplayType::Lcd8x1 => "8x1",
            LcdDisplayType::Lcd40x2 => "40x2",
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LcdDisplayType {
    fn format(&self, fmt: defmt::Formatter) {
        let msg: &'static str = From::from(self);
        defmt::write!(fmt, "{}", msg);
    }
}

#[cfg(feature = "ufmt")]
impl ufmt::uDisplay for LcdDisplayType {
    fn fmt<W>(&self, w: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        let msg: &'static str = From::from(self);
        ufmt::uwrite!(w, "{}", msg)
    }
}

impl Display for LcdDisplayType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg: &'static str = From::from(self);
        write!(f, "{}", msg)
    }
}

impl LcdDisplayType {
    /// Get the number of rows for the display type
    pub const fn rows(&self) -> u8 {
        match self {
            LcdDisplayType::Lcd20x4 => 4,
            LcdDisplayType::Lcd20x2 => 2,
            LcdDisplayType::Lcd20x1 => 1,
            LcdDisplayType::Lcd16x2 => 2,
            LcdDisplayType::Lcd16x4 => 4,
            LcdDisplayType::Lcd8x2 => 2,
            LcdDisplayType::Lcd8x1 => 1,
            LcdDisplayType::Lcd40x2 => 2,
        }
    }

    /// Get the number of columns for the display type
    pub const fn cols(&self) -> u8 {
        match self {
            LcdDisplayType::Lcd20x4 => 20,
            LcdDisplayType::Lcd20x2 => 20,
            LcdDisplayType::Lcd20x1 => 20,
            LcdDisplayType::Lcd16x2 => 16,
            LcdDisplayType::Lcd16x4 => 16,
            LcdDisplayType::Lcd8x2 => 8,
            LcdDisplayType::Lcd8x1 => 8,
            LcdDisplayType::Lcd40x2 => 40,
        }
    }

    /// Get the row offsets for the display type. This always returns an array of length 4.
    /// For displays with less than 4 rows, the unused rows repeat the used ones.
    pub const fn row_offsets(&self) -> [u8; 4] {
        match self {
            LcdDisplayType::Lcd20x4 => [0x00, 0x40, 0x14, 0x54],
            LcdDisplayType::Lcd16x4 => [0x00, 0x40, 0x10, 0x50],
            LcdDisplayType::Lcd20x1 | LcdDisplayType::Lcd8x1 => [0x00, 0x00, 0x00, 0x00],
            _ => [0x00, 0x40, 0x00, 0x40],
        }
    }

    /// DDRAM address of a position. Four row displays use their row offset table, two row
    /// displays put the second row at 0x40, wrapping inside the 7-bit address space. The column
    /// and row are not range checked.
    pub const fn ddram_address(&self, col: u8, row: u8) -> u8 {
        match self.rows() {
            4 => col.wrapping_add(self.row_offsets()[(row & 0x03) as usize]) & 0x7F,
            2 => col.wrapping_add(row.wrapping_mul(0x40)) & 0x7F,
            _ => col & 0x7F,
        }
    }

    /// Position shown at a DDRAM address, or `None` if the address is off screen.
    pub const fn position_of(&self, address: u8) -> Option<(u8, u8)> {
        let mut row = 0;
        while row < self.rows() {
            let start = self.ddram_address(0, row);
            if address >= start && address - start < self.cols() {
                return Some((address - start, row));
            }
            row += 1;
        }
        None
    }
}

/// A character display session: one adapter, one delay provider and the controller state.
pub struct CharacterDisplay<ADAPTER, DELAY>
where
    ADAPTER: HD44780AdapterTrait,
    DELAY: DelayNs,
{
    adapter: ADAPTER,
    clock: Clock<DELAY>,
    config: DisplayConfig,
    controller: HD44780,
}

impl<ADAPTER, DELAY> CharacterDisplay<ADAPTER, DELAY>
where
    ADAPTER: HD44780AdapterTrait,
    DELAY: DelayNs,
{
    /// Create a new character display object. Fails with `ConfigMismatch` if the configuration's
    /// wiring or access mode differ from the adapter's.
    pub fn new(
        adapter: ADAPTER,
        config: DisplayConfig,
        delay: DELAY,
    ) -> Result<Self, CharacterDisplayError<ADAPTER::Error>> {
        if config.wiring() != ADAPTER::WIRING || config.access() != ADAPTER::ACCESS {
            return Err(CharacterDisplayError::ConfigMismatch);
        }
        Ok(Self {
            adapter,
            clock: Clock::new(config.timing(), delay),
            controller: HD44780::new(&config),
            config,
        })
    }

    /// Create a new character display object, taking wiring and access mode from the adapter.
    pub fn from_adapter(
        adapter: ADAPTER,
        lcd_type: LcdDisplayType,
        clock: ClockConfig,
        delay: DELAY,
    ) -> Result<Self, CharacterDisplayError<ADAPTER::Error>> {
        let config = DisplayConfig::new(ADAPTER::WIRING, ADAPTER::ACCESS, lcd_type, clock)?;
        Self::new(adapter, config, delay)
    }

    /// Initialize the display with the default state for its type. This must be called before
    /// using the display.
    pub fn init(&mut self) -> Result<(), CharacterDisplayError<ADAPTER::Error>> {
        let initial = DisplayState::for_display(self.config.lcd_type(), self.config.wiring());
        self.init_with_state(initial)
    }

    /// Initialize the display with an explicit function set, display control, entry mode and
    /// backlight state.
    pub fn init_with_state(
        &mut self,
        initial: DisplayState,
    ) -> Result<(), CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .init(&mut self.adapter, &mut self.clock, initial)
    }

    /// returns a reference to the adapter. mostly needed for testing
    pub fn adapter(&mut self) -> &mut ADAPTER {
        &mut self.adapter
    }

    /// returns the `LcdDisplayType` used to create the display
    pub fn display_type(&self) -> LcdDisplayType {
        self.config.lcd_type()
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Shadow copy of the controller registers
    pub fn state(&self) -> DisplayState {
        self.controller.state()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.controller.lifecycle()
    }

    /// Supports the ability to read from the display.
    pub fn supports_reads() -> bool {
        ADAPTER::ACCESS == Access::ReadWrite
    }

    /// Returns the adapter and delay provider.
    pub fn release(self) -> (ADAPTER, DELAY) {
        (self.adapter, self.clock.release())
    }

    //--------------------------------------------------------------------------------------------------
    // high level commands, for the user!
    //--------------------------------------------------------------------------------------------------

    /// Clear the display
    pub fn clear(&mut self) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller.clear(&mut self.adapter, &mut self.clock)?;
        Ok(self)
    }

    /// Set the cursor to the home position.
    pub fn home(&mut self) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller.home(&mut self.adapter, &mut self.clock)?;
        Ok(self)
    }

    /// Set the cursor position at specified column and row. Columns and rows are zero-indexed.
    pub fn set_cursor(
        &mut self,
        col: u8,
        row: u8,
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .set_cursor(&mut self.adapter, &mut self.clock, col, row)?;
        Ok(self)
    }

    /// Set the DDRAM address directly.
    pub fn set_ddram_address(
        &mut self,
        address: u8,
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .set_ddram_address(&mut self.adapter, &mut self.clock, address)?;
        Ok(self)
    }

    /// Set the CGRAM address. Following writes and reads go to CGRAM until a DDRAM address is set.
    pub fn set_cgram_address(
        &mut self,
        address: u8,
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .set_cgram_address(&mut self.adapter, &mut self.clock, address)?;
        Ok(self)
    }

    /// Set the cursor visibility.
    pub fn show_cursor(
        &mut self,
        show_cursor: bool,
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .show_cursor(&mut self.adapter, &mut self.clock, show_cursor)?;
        Ok(self)
    }

    /// Set the cursor blinking.
    pub fn blink_cursor(
        &mut self,
        blink_cursor: bool,
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .blink_cursor(&mut self.adapter, &mut self.clock, blink_cursor)?;
        Ok(self)
    }

    /// Set the display visibility.
    pub fn show_display(
        &mut self,
        show_display: bool,
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .show_display(&mut self.adapter, &mut self.clock, show_display)?;
        Ok(self)
    }

    /// Replace the display control flags (`LCD_FLAG_DISPLAYON`, `LCD_FLAG_CURSORON`, `LCD_FLAG_BLINKON`).
    pub fn set_display_control(
        &mut self,
        flags: u8,
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .set_display_control(&mut self.adapter, &mut self.clock, flags)?;
        Ok(self)
    }

    /// Replace the entry mode flags (`LCD_FLAG_ENTRYLEFT`, `LCD_FLAG_ENTRYSHIFTINCREMENT`).
    pub fn set_entry_mode(
        &mut self,
        flags: u8,
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .set_entry_mode(&mut self.adapter, &mut self.clock, flags)?;
        Ok(self)
    }

    /// Scroll the display to the left.
    pub fn scroll_display_left(&mut self) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .scroll_display_left(&mut self.adapter, &mut self.clock)?;
        Ok(self)
    }

    /// Scroll the display to the right.
    pub fn scroll_display_right(
        &mut self,
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .scroll_display_right(&mut self.adapter, &mut self.clock)?;
        Ok(self)
    }

    /// Move the cursor one position to the left.
    pub fn move_cursor_left(&mut self) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .move_cursor_left(&mut self.adapter, &mut self.clock)?;
        Ok(self)
    }

    /// Move the cursor one position to the right.
    pub fn move_cursor_right(&mut self) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .move_cursor_right(&mut self.adapter, &mut self.clock)?;
        Ok(self)
    }

    /// Set the text flow direction to left to right.
    pub fn left_to_right(&mut self) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .left_to_right(&mut self.adapter, &mut self.clock)?;
        Ok(self)
    }

    /// Set the text flow direction to right to left.
    pub fn right_to_left(&mut self) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .right_to_left(&mut self.adapter, &mut self.clock)?;
        Ok(self)
    }

    /// Set the auto scroll mode.
    pub fn autoscroll(
        &mut self,
        autoscroll: bool,
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .autoscroll(&mut self.adapter, &mut self.clock, autoscroll)?;
        Ok(self)
    }

    /// Create a new custom character.
    pub fn create_char(
        &mut self,
        location: u8,
        charmap: [u8; 8],
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .create_char(&mut self.adapter, &mut self.clock, location, charmap)?;
        Ok(self)
    }

    /// Copy bytes into CGRAM starting at `address`.
    pub fn write_cgram(
        &mut self,
        address: u8,
        data: &[u8],
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .write_cgram(&mut self.adapter, &mut self.clock, address, data)?;
        Ok(self)
    }

    /// Writes a single character code at the current cursor position.
    pub fn write_char(&mut self, value: u8) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .write_char(&mut self.adapter, &mut self.clock, value)?;
        Ok(self)
    }

    /// Writes raw character codes starting at the current cursor position.
    pub fn write_bytes(
        &mut self,
        data: &[u8],
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .write_bytes(&mut self.adapter, &mut self.clock, data)?;
        Ok(self)
    }

    /// Prints a string to the LCD at the current cursor position.
    pub fn print(&mut self, text: &str) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .print(&mut self.adapter, &mut self.clock, text)?;
        Ok(self)
    }

    /// Turn the backlight on or off. Only I2C adapters have a backlight line.
    pub fn backlight(&mut self, on: bool) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller.set_backlight(&mut self.adapter, on)?;
        Ok(self)
    }

    /// Set the brightness of a VFD configured with `DisplayConfig::with_vfd`.
    pub fn set_brightness(
        &mut self,
        brightness: Brightness,
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .set_brightness(&mut self.adapter, &mut self.clock, brightness)?;
        Ok(self)
    }
}

impl<ADAPTER, DELAY> CharacterDisplay<ADAPTER, DELAY>
where
    ADAPTER: ReadableAdapterTrait,
    DELAY: DelayNs,
{
    /// Reads into the buffer data from the display device either the CGRAM or DDRAM at the current cursor position.
    /// The amount of data read is determined by the length of the buffer.
    pub fn read_device_data(
        &mut self,
        buffer: &mut [u8],
    ) -> Result<&mut Self, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .read_device_data(&mut self.adapter, &mut self.clock, buffer)?;
        Ok(self)
    }

    /// Reads the address counter from the display device. The busy bit is masked off.
    pub fn read_address_counter(&mut self) -> Result<u8, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .read_address_counter(&mut self.adapter, &mut self.clock)
    }

    /// Reads the cursor position back from the controller. `None` if the cursor is off screen.
    pub fn cursor_position(
        &mut self,
    ) -> Result<Option<(u8, u8)>, CharacterDisplayError<ADAPTER::Error>> {
        self.controller
            .cursor_position(&mut self.adapter, &mut self.clock)
    }

    /// Reads the busy flag once.
    pub fn is_busy(&mut self) -> Result<bool, CharacterDisplayError<ADAPTER::Error>> {
        self.adapter.is_busy(&mut self.clock)
    }
}

/// Implement the `core::fmt::Write` trait for the display, allowing it to be used with the `write!` macro.
impl<ADAPTER, DELAY> core::fmt::Write for CharacterDisplay<ADAPTER, DELAY>
where
    ADAPTER: HD44780AdapterTrait,
    DELAY: DelayNs,
{
    fn write_str(&mut self, s: &str) -> Result<(), core::fmt::Error> {
        if let Err(_e) = self.print(s) {
            return Err(core::fmt::Error);
        }
        Ok(())
    }
}

#[cfg(feature = "ufmt")]
/// Implement the `ufmt::uWrite` trait for the display, allowing it to be used with the `uwriteln!` and `uwrite!` macros.
impl<ADAPTER, DELAY> ufmt::uWrite for CharacterDisplay<ADAPTER, DELAY>
where
    ADAPTER: HD44780AdapterTrait,
    DELAY: DelayNs,
{
    fn write_str(&mut self, s: &str) -> Result<(), CharacterDisplayError<ADAPTER::Error>> {
        self.print(s)?;
        Ok(())
    }

    type Error = CharacterDisplayError<ADAPTER::Error>;
}
