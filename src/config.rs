//! Build-time description of how a display is wired and clocked.
//!
//! A [`DisplayConfig`] is created with a `const fn`, so an invalid combination can be rejected
//! while compiling:
//! ```rust
//! use hd44780_bus_display::{Access, ClockConfig, DisplayConfig, LcdDisplayType, Wiring};
//!
//! const CONFIG: DisplayConfig = DisplayConfig::validated(
//!     Wiring::Parallel4Bit,
//!     Access::WriteOnly,
//!     LcdDisplayType::Lcd16x2,
//!     ClockConfig::new(22_118_400, 12),
//! );
//! ```

use core::fmt::Display;

use crate::{
    timing::{ClockConfig, Timing},
    LcdDisplayType,
};

/// How the controller's data and control lines reach the host.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Wiring {
    /// D4..D7 on individual pins
    Parallel4Bit,
    /// D0..D7 on individual pins
    Parallel8Bit,
    /// D0..D7 on one 8-bit port written as a whole
    Parallel8BitPort,
    /// PCF8574 style I2C expander driving a 4-bit bus
    I2cExpander,
}

impl Wiring {
    pub const fn bus_width(self) -> BusWidth {
        match self {
            Wiring::Parallel4Bit | Wiring::I2cExpander => BusWidth::Four,
            Wiring::Parallel8Bit | Wiring::Parallel8BitPort => BusWidth::Eight,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BusWidth {
    Four,
    Eight,
}

/// Whether the R/W line is wired, which decides between busy flag polling and blind delays.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Access {
    ReadWrite,
    WriteOnly,
}

/// HD44780 compatible VFD controllers with a brightness setting.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum VfdType {
    NoritakeCu20045,
    Pt6314,
}

/// Errors found while validating a configuration.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ConfigError {
    /// Clock frequency is zero
    ZeroClockFrequency,
    /// Cycles per instruction is zero
    ZeroCyclesPerInstruction,
    /// The instruction period truncates to zero nanoseconds
    InstructionPeriodTooShort,
    /// The instruction period does not fit in a u32 nanosecond count
    InstructionPeriodTooLong,
    /// A delay derived from the clock does not fit in a u32 nanosecond count
    DelayOutOfRange,
}

impl From<&ConfigError> for &'static str {
    fn from(err: &ConfigError) -> Self {
        match err {
            ConfigError::ZeroClockFrequency => "Clock frequency is zero",
            ConfigError::ZeroCyclesPerInstruction => "Cycles per instruction is zero",
            ConfigError::InstructionPeriodTooShort => "Instruction period too short",
            ConfigError::InstructionPeriodTooLong => "Instruction period too long",
            ConfigError::DelayOutOfRange => "Delay out of range",
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, fmt: defmt::Formatter) {
        let msg: &'static str = From::from(self);
        defmt::write!(fmt, "{}", msg);
    }
}

#[cfg(feature = "ufmt")]
impl ufmt::uDisplay for ConfigError {
    fn fmt<W>(&self, w: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        let msg: &'static str = From::from(self);
        ufmt::uwrite!(w, "{}", msg)
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg: &'static str = From::from(self);
        write!(f, "{}", msg)
    }
}

/// Validated wiring, geometry and timing for one display.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct DisplayConfig {
    wiring: Wiring,
    access: Access,
    lcd_type: LcdDisplayType,
    timing: Timing,
    vfd: Option<VfdType>,
}

impl DisplayConfig {
    pub const fn new(
        wiring: Wiring,
        access: Access,
        lcd_type: LcdDisplayType,
        clock: ClockConfig,
    ) -> Result<Self, ConfigError> {
        match Timing::new(clock) {
            Ok(timing) => Ok(Self {
                wiring,
                access,
                lcd_type,
                timing,
                vfd: None,
            }),
            Err(e) => Err(e),
        }
    }

    /// Same as [`DisplayConfig::new`], but panics on an invalid configuration. Used in a `const`
    /// item this turns a bad clock into a compile error.
    pub const fn validated(
        wiring: Wiring,
        access: Access,
        lcd_type: LcdDisplayType,
        clock: ClockConfig,
    ) -> Self {
        match Self::new(wiring, access, lcd_type, clock) {
            Ok(config) => config,
            Err(ConfigError::ZeroClockFrequency) => panic!("clock frequency is zero"),
            Err(ConfigError::ZeroCyclesPerInstruction) => panic!("cycles per instruction is zero"),
            Err(ConfigError::InstructionPeriodTooShort) => panic!("instruction period too short"),
            Err(ConfigError::InstructionPeriodTooLong) => panic!("instruction period too long"),
            Err(ConfigError::DelayOutOfRange) => panic!("delay out of range"),
        }
    }

    /// Marks the display as a VFD with a brightness setting.
    pub const fn with_vfd(mut self, vfd: VfdType) -> Self {
        self.vfd = Some(vfd);
        self
    }

    pub const fn wiring(&self) -> Wiring {
        self.wiring
    }

    pub const fn access(&self) -> Access {
        self.access
    }

    pub const fn lcd_type(&self) -> LcdDisplayType {
        self.lcd_type
    }

    pub const fn timing(&self) -> Timing {
        self.timing
    }

    pub const fn vfd(&self) -> Option<VfdType> {
        self.vfd
    }
}
