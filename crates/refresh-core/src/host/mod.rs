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

//! The host service table: every facility a renderer module may use.
//!
//! The table is handed to the module exactly once, as an
//! `Arc<dyn HostServices>`, and the module keeps it for its whole lifetime.
//! Services are grouped behind accessor methods so an implementation can be
//! assembled from independent parts.
//!
//! The host makes no promise about concurrent calls. A renderer that runs
//! work on several threads must serialize its own calls into the table.

mod collision;
mod command;
mod cvar;
mod filesystem;
mod media;
mod memory;
mod platform;

pub use collision::*;
pub use command::*;
pub use cvar::*;
pub use filesystem::*;
pub use media::*;
pub use memory::*;
pub use platform::*;

use crate::error::{ErrorLevel, FatalError};

/// Verbosity of a console print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrintLevel {
    /// Always shown.
    All,
    /// Only shown when developer output is enabled.
    Developer,
    /// A recoverable problem.
    Warning,
    /// An error that does not abort anything by itself.
    Error,
}

/// Console output and the non-returning error call.
pub trait Diagnostics: Send + Sync {
    /// Prints a message on the host console.
    fn print(&self, level: PrintLevel, message: &str);

    /// Raises an unrecoverable error.
    ///
    /// The host records the failure and returns the value that the caller must
    /// propagate immediately. Nothing else may run on the renderer side after
    /// this call.
    fn error(&self, level: ErrorLevel, message: &str) -> FatalError;
}

/// A broken-down wall-clock time, local to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RealTime {
    /// Full year, e.g. 2026.
    pub year: i32,
    /// Month in `1..=12`.
    pub month: u32,
    /// Day of month in `1..=31`.
    pub day: u32,
    /// Hour in `0..=23`.
    pub hour: u32,
    /// Minute in `0..=59`.
    pub minute: u32,
    /// Second in `0..=60`.
    pub second: u32,
}

/// Profiling clocks and the wall clock.
///
/// The millisecond and microsecond counters are only meant for profiling and
/// must never drive anything that affects the simulation.
pub trait Clock: Send + Sync {
    /// Milliseconds since the host started.
    fn milliseconds(&self) -> i32;
    /// Microseconds since the host started.
    fn microseconds(&self) -> i64;
    /// The current local date and time.
    fn real_time(&self) -> RealTime;
}

/// The full service table exposed by a host.
pub trait HostServices: Send + Sync {
    /// Console output and fatal errors.
    fn diagnostics(&self) -> &dyn Diagnostics;
    /// Profiling and wall clocks.
    fn clock(&self) -> &dyn Clock;
    /// Level-lifetime arena memory.
    fn hunk(&self) -> &dyn HunkAllocator;
    /// General purpose memory with individual frees.
    fn heap(&self) -> &dyn HeapAllocator;
    /// Console variables.
    fn cvars(&self) -> &dyn ConsoleVars;
    /// Console commands.
    fn commands(&self) -> &dyn Commands;
    /// The virtual file system.
    fn fs(&self) -> &dyn FileSystem;
    /// Cluster visibility and collision debugging.
    fn collision(&self) -> &dyn CollisionMap;
    /// Cinematic decoding and playback.
    fn cinematics(&self) -> &dyn Cinematics;
    /// JPEG encode/decode for captures and textures.
    fn images(&self) -> &dyn ImageCodec;
    /// Client-side capture sinks and window state.
    fn client(&self) -> &dyn ClientServices;
    /// Windowing and graphics API bootstrap.
    fn platform(&self) -> &dyn Platform;

    /// Shorthand for `self.diagnostics().print(..)`.
    fn print(&self, level: PrintLevel, message: &str) {
        self.diagnostics().print(level, message);
    }

    /// Shorthand for `self.diagnostics().error(..)`.
    fn error(&self, level: ErrorLevel, message: &str) -> FatalError {
        self.diagnostics().error(level, message)
    }
}
