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

//! Defines the error types that cross the host/renderer boundary.
//!
//! There are two channels. Recoverable conditions (a missing asset, an
//! unavailable feature) are reported with sentinels such as [`Handle::NONE`]
//! or `None`, and never show up here. Unrecoverable conditions are raised
//! through the host's fatal-error service, which hands back a [`FatalError`]
//! that the renderer must propagate straight to its caller.
//!
//! [`Handle::NONE`]: crate::handle::Handle::NONE

use thiserror::Error;

/// The severity attached to a fatal error raised through the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorLevel {
    /// The process cannot continue at all.
    Fatal,
    /// The current level/session is dropped; the host may return to a menu.
    Drop,
    /// The server ended the session.
    ServerDisconnect,
    /// The client ended the session.
    Disconnect,
    /// Required game data is missing.
    NeedCd,
}

impl ErrorLevel {
    /// Returns `true` if the host must terminate the process rather than
    /// recover to an idle state.
    pub fn is_terminal(self) -> bool {
        matches!(self, ErrorLevel::Fatal | ErrorLevel::NeedCd)
    }
}

/// The value produced by the host's non-returning error call.
///
/// Once a renderer obtains one of these it must not perform any further work:
/// the only valid thing to do is return it to the caller (usually with `?`).
/// The top-level driver turns it into a controlled shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{level:?}: {message}")]
#[must_use = "a fatal error must be propagated, no code may run after it"]
pub struct FatalError {
    /// How severe the failure is.
    pub level: ErrorLevel,
    /// Human readable description.
    pub message: String,
}

impl FatalError {
    /// Creates a new fatal error.
    pub fn new(level: ErrorLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Result type of every renderer operation that may hit the fatal channel.
pub type RefResult<T> = Result<T, FatalError>;

/// Returned by [`negotiate`](crate::version::negotiate) when the host asks for
/// an interface revision the module was not compiled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("mismatched renderer API version: expected {expected}, got {requested}")]
pub struct VersionMismatch {
    /// The revision this module implements.
    pub expected: u32,
    /// The revision the host asked for.
    pub requested: u32,
}

/// An error raised by one of the host's allocator capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The arena cannot satisfy the request until it is cleared.
    #[error("hunk exhausted: requested {requested} bytes, {available} available")]
    HunkExhausted {
        /// Size of the failed request.
        requested: usize,
        /// Bytes still free in the arena.
        available: usize,
    },
    /// The general heap refused the request.
    #[error("heap budget exceeded: requested {requested} bytes, {available} available")]
    HeapExhausted {
        /// Size of the failed request.
        requested: usize,
        /// Bytes still free in the heap budget.
        available: usize,
    },
    /// A block was handed back to an allocator that does not own it.
    #[error("block {0} is not owned by this allocator")]
    ForeignBlock(u64),
    /// A temp block was released out of stack order.
    #[error("temp block {0} released out of order")]
    TempOutOfOrder(u64),
}

/// An error raised by the host's virtual file system on write.
///
/// Reads never fail loudly: a missing file is simply `None`.
#[derive(Debug, Error)]
pub enum FsError {
    /// The path tried to escape the writable root (`..`, absolute paths, ...).
    #[error("refusing unsafe path '{0}'")]
    UnsafePath(String),
    /// No writable root is configured.
    #[error("the file system has no writable root")]
    ReadOnly,
    /// The underlying I/O failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// Path that was being written.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}
