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

//! Profiling timers. Never use these for anything gameplay-related; the
//! authoritative time always comes from the refdef.

use std::time::{Duration, Instant};

/// A running wall-clock stopwatch.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    /// Creates a stopwatch that starts immediately.
    #[inline]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time elapsed since creation or the last [`restart`](Self::restart).
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time in whole milliseconds.
    #[inline]
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// Elapsed time in whole microseconds.
    #[inline]
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed().as_micros() as u64
    }

    /// Returns the elapsed time and starts over.
    #[inline]
    pub fn restart(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now - self.start;
        self.start = now;
        elapsed
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Sums the durations of several disjoint timed sections, e.g. all the
/// front-end work of one frame spread over several render calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionTimer {
    total: Duration,
}

impl SectionTimer {
    /// Runs `f` and adds its duration to the total.
    pub fn time<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let watch = Stopwatch::new();
        let result = f();
        self.total += watch.elapsed();
        result
    }

    /// Adds an externally measured duration.
    pub fn add(&mut self, d: Duration) {
        self.total += d;
    }

    /// Returns the accumulated milliseconds and resets the total.
    pub fn take_ms(&mut self) -> u32 {
        let ms = self.total.as_millis().min(u32::MAX as u128) as u32;
        self.total = Duration::ZERO;
        ms
    }

    /// The accumulated duration so far.
    pub fn total(&self) -> Duration {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn stopwatch_elapsed_time_after_delay() {
        let watch = Stopwatch::new();
        thread::sleep(Duration::from_millis(20));
        assert!(watch.elapsed_ms() >= 20);
        assert!(watch.elapsed_us() >= 20_000);
    }

    #[test]
    fn restart_resets_the_origin() {
        let mut watch = Stopwatch::new();
        thread::sleep(Duration::from_millis(10));
        let first = watch.restart();
        assert!(first >= Duration::from_millis(10));
        assert!(watch.elapsed() < first);
    }

    #[test]
    fn section_timer_accumulates_and_resets() {
        let mut sections = SectionTimer::default();
        sections.add(Duration::from_millis(3));
        let value = sections.time(|| 7);
        assert_eq!(value, 7);
        sections.add(Duration::from_millis(4));
        assert!(sections.total() >= Duration::from_millis(7));
        assert!(sections.take_ms() >= 7);
        assert_eq!(sections.total(), Duration::ZERO);
    }
}
