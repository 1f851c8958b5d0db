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

//! # Refresh Infra
//!
//! Concrete implementations of the contracts defined in `refresh-core`.
//!
//! - [`host`] assembles a complete [`HostServices`](refresh_core::HostServices)
//!   table over a virtual file system, a memory arena, a cvar store and a
//!   headless platform layer.
//! - [`reference`] is a renderer module, exported for both graphics families.
//! - [`loader`] is the host side of module loading: a registry of entry
//!   points and the session that owns a negotiated operation table.

pub mod host;
pub mod loader;
pub mod reference;

pub use host::{HostConfig, StandardHost};
pub use loader::{LoadError, ModuleRegistry, RendererSession, SessionError};
