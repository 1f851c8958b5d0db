// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Console output routed into the `log` facade, and the host clocks.

use std::sync::Mutex;
use std::time::Instant;

use chrono::{Datelike, Local, Timelike};
use refresh_core::host::{Clock, Diagnostics, PrintLevel, RealTime};
use refresh_core::{ErrorLevel, FatalError};

const CONSOLE_TARGET: &str = "refresh::console";

/// Routes renderer prints to `log` and records fatal errors.
#[derive(Debug, Default)]
pub struct ConsoleLog {
    fatal: Mutex<Option<FatalError>>,
}

impl ConsoleLog {
    /// Creates an empty console.
    pub fn new() -> Self {
        Self::default()
    }

    /// The first fatal error raised since the last [`clear_fatal`], if any.
    ///
    /// [`clear_fatal`]: ConsoleLog::clear_fatal
    pub fn last_fatal(&self) -> Option<FatalError> {
        self.fatal.lock().ok().and_then(|slot| slot.clone())
    }

    /// Forgets the recorded fatal error.
    pub fn clear_fatal(&self) {
        if let Ok(mut slot) = self.fatal.lock() {
            *slot = None;
        }
    }
}

impl Diagnostics for ConsoleLog {
    fn print(&self, level: PrintLevel, message: &str) {
        let message = message.trim_end();
        match level {
            PrintLevel::All => log::info!(target: CONSOLE_TARGET, "{message}"),
            PrintLevel::Developer => log::debug!(target: CONSOLE_TARGET, "{message}"),
            PrintLevel::Warning => log::warn!(target: CONSOLE_TARGET, "{message}"),
            PrintLevel::Error => log::error!(target: CONSOLE_TARGET, "{message}"),
        }
    }

    fn error(&self, level: ErrorLevel, message: &str) -> FatalError {
        let err = FatalError::new(level, message.trim_end());
        log::error!(target: CONSOLE_TARGET, "{err}");
        if let Ok(mut slot) = self.fatal.lock() {
            slot.get_or_insert_with(|| err.clone());
        }
        err
    }
}

/// Clocks anchored at host start-up.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Starts the clocks now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn milliseconds(&self) -> i32 {
        // Wraps after ~24 days like the classic 32-bit counter.
        self.start.elapsed().as_millis() as i32
    }

    fn microseconds(&self) -> i64 {
        self.start.elapsed().as_micros() as i64
    }

    fn real_time(&self) -> RealTime {
        let now = Local::now();
        RealTime {
            year: now.year(),
            month: now.month(),
            day: now.day(),
            hour: now.hour(),
            minute: now.minute(),
            second: now.second(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fatal_error_is_kept() {
        let console = ConsoleLog::new();
        let first = console.error(ErrorLevel::Drop, "first\n");
        let _second = console.error(ErrorLevel::Fatal, "second");
        assert_eq!(first.message, "first");
        assert_eq!(console.last_fatal(), Some(first));
        console.clear_fatal();
        assert!(console.last_fatal().is_none());
    }

    #[test]
    fn clocks_are_monotonic() {
        let clock = SystemClock::new();
        let a = clock.microseconds();
        let b = clock.microseconds();
        assert!(b >= a);
        assert!(clock.milliseconds() >= 0);
    }

    #[test]
    fn real_time_fields_are_in_range() {
        let now = SystemClock::new().real_time();
        assert!((1..=12).contains(&now.month));
        assert!((1..=31).contains(&now.day));
        assert!(now.hour < 24);
        assert!(now.year >= 2024);
    }
}
