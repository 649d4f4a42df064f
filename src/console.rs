//! A diagnostic console shared by every core
//!
//! Lines are formatted into a buffer on the caller's stack first. Only the
//! finished line is written out, under a [`Lock`], so lines from different
//! cores never interleave.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::fmt::{self, Write as _};

use crate::{CoreId, Lock, config::CONSOLE_LINE_LEN};

/// Somewhere to put finished lines, e.g. a UART
pub trait Sink: Sync {
    /// Write out some text
    fn write_str(&self, text: &str);
}

/// How important a console line is
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// Something failed
    Error = 1,
    /// Something looks wrong, but we carry on
    Warning = 2,
    /// Results and progress
    Info = 3,
    /// Everything else
    Debug = 4,
}

impl Level {
    /// The prefix used for lines at this level
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One formatted console line
pub type Line = heapless::String<CONSOLE_LINE_LEN>;

/// A [`Sink`] that any core may write to, one line at a time
pub struct Console<S, L> {
    sink: S,
    lock: L,
    max_level: Level,
}

impl<S: Sink, L: Lock> Console<S, L> {
    /// Make a console that drops anything less important than `max_level`
    pub const fn new(sink: S, lock: L, max_level: Level) -> Console<S, L> {
        Console {
            sink,
            lock,
            max_level,
        }
    }

    /// Would a line at `level` be written?
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.max_level
    }

    /// Write `"<LEVEL>: <origin>(): <args>"` as `core`
    ///
    /// Returns `true` if the line fitted in the buffer. An overlong line is
    /// cut short but still written.
    pub fn log(&self, core: CoreId, level: Level, origin: &str, args: fmt::Arguments<'_>) -> bool {
        if !self.enabled(level) {
            return true;
        }
        let mut line = Line::new();
        let mut body = Truncating {
            line: &mut line,
            limit: CONSOLE_LINE_LEN - 2,
            overflowed: false,
        };
        // Truncating never fails, it records overflow instead
        let _ = write!(body, "{}: {}(): {}", level, origin, args);
        let fitted = !body.overflowed;
        let _ = line.push_str("\r\n");
        self.write_line(core, &line);
        fitted
    }

    /// Write a pre-formatted line as `core`, under the lock
    pub fn write_line(&self, core: CoreId, line: &str) {
        let _guard = self.lock.guard(core);
        self.sink.write_str(line);
    }
}

/// Writes as much as fits, stopping on a char boundary
struct Truncating<'a> {
    line: &'a mut Line,
    limit: usize,
    overflowed: bool,
}

impl fmt::Write for Truncating<'_> {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        for c in text.chars() {
            if self.line.len() + c.len_utf8() > self.limit {
                self.overflowed = true;
                return Ok(());
            }
            // cannot fail, we checked the length
            let _ = self.line.push(c);
        }
        Ok(())
    }
}

/// The per-iteration result line a measurement task reports
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport<'a> {
    /// Identifies the experiment
    pub label: &'a str,
    /// How many cores take part
    pub cores: usize,
    /// The core that did the measuring
    pub core: CoreId,
    /// Cycles spent in the measured section
    pub cycle_count: u32,
    /// Which iteration this is, counting from zero
    pub iteration: u32,
    /// Start offset, in ticks, this core ran with
    pub offset: u32,
}

impl fmt::Display for CycleReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CYCLECOUNT label: {} cores: {} core: {} cycle_count: {:>12} iteration: {} offset: {}",
            self.label, self.cores, self.core, self.cycle_count, self.iteration, self.offset
        )
    }
}


// End of File
