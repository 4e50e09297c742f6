//! Timing primitives for the HD44780 protocol engine.
//!
//! The HD44780 datasheet gives every wait as a minimum duration. Host MCUs that count instruction
//! cycles (the classic 8051 targets with 1T, 6T or 12T cores) can only wait in whole multiples of
//! a delay loop, so each named [`Wait`] is translated into a [`CycleDelay`]: a loop granularity and
//! an iteration count derived from the configured [`ClockConfig`]. Counts are always rounded up,
//! so the loop is never shorter than the datasheet minimum. [`Timing::wait_ns`] converts the same
//! count back into nanoseconds for hosts that wait through an `embedded-hal` [`DelayNs`]
//! implementation, which is what [`Clock`] does.
//!
//! When the instruction period is above [`FAST_MCU_THRESHOLD_NS`], the per-transfer waits (enable
//! pulse width, settle and read setup times) are shorter than the I/O overhead of toggling a pin,
//! so they collapse to nothing. On faster clocks they are inserted explicitly.

use embedded_hal::delay::DelayNs;

use crate::config::ConfigError;

/// Instruction periods at or below this many nanoseconds need explicit transfer waits.
pub const FAST_MCU_THRESHOLD_NS: u32 = 500;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Host clock description used to derive every protocol delay.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct ClockConfig {
    /// Oscillator frequency in Hz
    pub frequency_hz: u32,
    /// Oscillator cycles per machine instruction, e.g. 12 for a classic 8051, 1 for a 1T core
    pub cycles_per_instruction: u32,
}

impl ClockConfig {
    pub const fn new(frequency_hz: u32, cycles_per_instruction: u32) -> Self {
        Self {
            frequency_hz,
            cycles_per_instruction,
        }
    }

    /// Length of one machine instruction in whole nanoseconds. Truncated rather than rounded, so
    /// cycle counts computed from it come out longer, never shorter. Returns 0 for a zero frequency.
    pub const fn instruction_period_ns(&self) -> u64 {
        if self.frequency_hz == 0 {
            return 0;
        }
        self.cycles_per_instruction as u64 * NANOS_PER_SECOND / self.frequency_hz as u64
    }

    /// Whether the clock is fast enough that transfer waits must be inserted explicitly.
    pub const fn is_fast(&self) -> bool {
        self.instruction_period_ns() <= FAST_MCU_THRESHOLD_NS as u64
    }
}

/// Delay loop granularity, in instruction cycles per loop iteration.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Granularity {
    /// 2 cycles per iteration
    X2,
    /// 2 * 256 cycles per iteration
    X512,
    /// 2 * 65536 cycles per iteration
    X65536,
}

impl Granularity {
    /// Instruction cycles consumed by one iteration of the delay loop.
    pub const fn cycles(self) -> u64 {
        match self {
            Granularity::X2 => 2,
            Granularity::X512 => 512,
            Granularity::X65536 => 131_072,
        }
    }
}

/// A delay expressed as loop iterations of a given granularity.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct CycleDelay {
    pub granularity: Granularity,
    pub count: u32,
}

impl CycleDelay {
    /// Total instruction cycles spent by this delay.
    pub const fn total_cycles(&self) -> u64 {
        self.count as u64 * self.granularity.cycles()
    }
}

/// Named minimum waits from the HD44780 timing tables.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Wait {
    /// Power supply rise to first instruction
    PowerOn,
    /// After the first interface synchronisation write
    InitPhase1,
    /// After the second interface synchronisation write
    InitPhase2,
    /// Clear display and return home execution time
    Clear,
    /// Execution time of every other instruction and of data writes
    Command,
    /// Enable pulse width (high level)
    EnableHigh,
    /// Enable low time / hold after a write strobe
    EnableSettle,
    /// RS and R/W setup before enable rises on a read
    ReadSetup,
    /// Enable rise to data valid on a read
    ReadDataReady,
    /// Hold after a read strobe
    ReadSettle,
}

impl Wait {
    pub const ALL: [Wait; 10] = [
        Wait::PowerOn,
        Wait::InitPhase1,
        Wait::InitPhase2,
        Wait::Clear,
        Wait::Command,
        Wait::EnableHigh,
        Wait::EnableSettle,
        Wait::ReadSetup,
        Wait::ReadDataReady,
        Wait::ReadSettle,
    ];

    /// Datasheet minimum for this wait, in nanoseconds.
    pub const fn min_ns(self) -> u32 {
        match self {
            Wait::PowerOn => 15_000_000,
            Wait::InitPhase1 => 4_100_000,
            Wait::InitPhase2 => 100_000,
            Wait::Clear => 1_520_000,
            Wait::Command => 37_000,
            Wait::EnableHigh => 450,
            Wait::EnableSettle => 400,
            Wait::ReadSetup => 60,
            Wait::ReadDataReady => 360,
            Wait::ReadSettle => 400,
        }
    }

    /// Whether a read-capable bus may replace this wait with busy flag polling. The busy flag is
    /// meaningless until the interface width is established, so the init phases never qualify.
    pub const fn is_pollable(self) -> bool {
        matches!(self, Wait::Clear | Wait::Command)
    }

    /// Whether this wait belongs to a single strobe rather than to instruction execution.
    pub const fn is_transfer(self) -> bool {
        matches!(
            self,
            Wait::EnableHigh
                | Wait::EnableSettle
                | Wait::ReadSetup
                | Wait::ReadDataReady
                | Wait::ReadSettle
        )
    }
}

/// Delay table for one validated clock.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Timing {
    clock: ClockConfig,
    period_ns: u32,
}

impl Timing {
    /// Validates the clock and checks that every wait is representable as a `u32` nanosecond
    /// delay.
    pub const fn new(clock: ClockConfig) -> Result<Self, ConfigError> {
        if clock.frequency_hz == 0 {
            return Err(ConfigError::ZeroClockFrequency);
        }
        if clock.cycles_per_instruction == 0 {
            return Err(ConfigError::ZeroCyclesPerInstruction);
        }
        let period = clock.instruction_period_ns();
        if period == 0 {
            return Err(ConfigError::InstructionPeriodTooShort);
        }
        if period > u32::MAX as u64 {
            return Err(ConfigError::InstructionPeriodTooLong);
        }
        let timing = Self {
            clock,
            period_ns: period as u32,
        };
        let mut i = 0;
        while i < Wait::ALL.len() {
            if timing.wait_ns_wide(Wait::ALL[i]) > u32::MAX as u64 {
                return Err(ConfigError::DelayOutOfRange);
            }
            i += 1;
        }
        Ok(timing)
    }

    /// Host clock the waits were computed for.
    pub const fn clock(&self) -> ClockConfig {
        self.clock
    }

    /// Instruction period in nanoseconds, rounded down.
    pub const fn period_ns(&self) -> u32 {
        self.period_ns
    }

    /// True when the transfer waits have to be inserted explicitly.
    pub const fn is_fast(&self) -> bool {
        self.period_ns <= FAST_MCU_THRESHOLD_NS
    }

    /// Loop granularity used for `wait`, or `None` if the wait collapses on this clock.
    pub const fn granularity(&self, wait: Wait) -> Option<Granularity> {
        if self.is_fast() {
            Some(match wait {
                Wait::PowerOn | Wait::InitPhase1 => Granularity::X65536,
                Wait::InitPhase2 | Wait::Clear | Wait::Command => Granularity::X512,
                _ => Granularity::X2,
            })
        } else {
            match wait {
                Wait::PowerOn | Wait::InitPhase1 | Wait::Clear => Some(Granularity::X512),
                Wait::InitPhase2 | Wait::Command => Some(Granularity::X2),
                _ => None,
            }
        }
    }

    /// Loop form of `wait`: `ceil(min_ns / (period * granularity)) + 1` iterations.
    pub const fn cycles(&self, wait: Wait) -> Option<CycleDelay> {
        match self.granularity(wait) {
            None => None,
            Some(granularity) => {
                let step = self.period_ns as u64 * granularity.cycles();
                let count = div_ceil(wait.min_ns() as u64, step) + 1;
                Some(CycleDelay {
                    granularity,
                    count: count as u32,
                })
            }
        }
    }

    /// Duration of the loop form of `wait` in nanoseconds; 0 if the wait collapses.
    pub const fn wait_ns(&self, wait: Wait) -> u32 {
        // `new` has checked every wait against u32::MAX
        self.wait_ns_wide(wait) as u32
    }

    const fn wait_ns_wide(&self, wait: Wait) -> u64 {
        match self.cycles(wait) {
            None => 0,
            Some(delay) => delay.total_cycles() * self.period_ns as u64,
        }
    }
}

const fn div_ceil(value: u64, divisor: u64) -> u64 {
    (value + divisor - 1) / divisor
}

/// Executes named waits against an `embedded-hal` delay provider.
pub struct Clock<DELAY> {
    timing: Timing,
    delay: DELAY,
}

impl<DELAY> Clock<DELAY>
where
    DELAY: DelayNs,
{
    pub fn new(timing: Timing, delay: DELAY) -> Self {
        Self { timing, delay }
    }

    /// Blocks for at least the minimum of `wait`. Collapsed waits return without touching the
    /// delay provider.
    pub fn wait(&mut self, wait: Wait) {
        let ns = self.timing.wait_ns(wait);
        if ns > 0 {
            self.delay.delay_ns(ns);
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// returns the delay object. mostly used for testing
    pub fn delay(&mut self) -> &mut DELAY {
        &mut self.delay
    }

    pub fn release(self) -> DELAY {
        self.delay
    }
}
