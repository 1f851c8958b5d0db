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

//! # Refresh Core
//!
//! Foundational crate containing the two interface objects exchanged between a
//! host application and a renderer module, the plain data types that cross the
//! boundary, and the version negotiation that guards the exchange.
//!
//! - [`host::HostServices`] is what the renderer may call on the host.
//! - [`exports::RendererExports`] is what the host may call on the renderer.
//! - [`version::negotiate`] decides whether the two sides may talk at all.
//!
//! Nothing in this crate knows how a host or a renderer is implemented; concrete
//! implementations live in `refresh-infra`.

#![warn(missing_docs)]

pub mod error;
pub mod exports;
pub mod handle;
pub mod host;
pub mod math;
pub mod utils;
pub mod version;

pub use error::{AllocError, ErrorLevel, FatalError, FsError, RefResult, VersionMismatch};
pub use exports::{RendererExports, ShutdownCode, StereoFrame};
pub use handle::{Handle, HandleKind};
pub use host::HostServices;
pub use utils::timer::Stopwatch;
pub use version::{negotiate, RefEntryPoint, REF_API_VERSION};
