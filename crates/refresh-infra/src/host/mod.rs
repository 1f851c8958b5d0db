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

//! The standard host service table.
//!
//! [`StandardHost`] assembles one implementation of every service group from
//! a [`HostConfig`] and exposes the host-only controls (clearing the hunk on
//! level change, installing visibility data, pumping the command buffer)
//! that the renderer never sees.

mod collision;
mod commands;
mod config;
mod console;
mod cvars;
mod media;
mod memory;
mod platform;
mod vfs;

pub use collision::WorldVis;
pub use commands::CommandTable;
pub use config::{ConfigError, HostConfig, WindowConfig};
pub use console::{ConsoleLog, SystemClock};
pub use cvars::{validate, CvarStore};
pub use media::{
    encode_cinematic, encode_jpeg, CinematicPlayer, ClientState, JpegCodec, MediaError,
    CINEMATIC_MAGIC,
};
pub use memory::{Hunk, TrackedHeap};
pub use platform::HeadlessPlatform;
pub use vfs::{normalize_path, MountError, VirtualFileSystem};

use std::sync::Arc;

use refresh_core::host::{
    Cinematics, ClientServices, Clock, CollisionMap, Commands, ConsoleVars, Diagnostics,
    FileSystem, HeapAllocator, HostServices, HunkAllocator, ImageCodec, Platform,
};
use thiserror::Error;

/// Errors raised while assembling a [`StandardHost`].
#[derive(Debug, Error)]
pub enum HostError {
    /// A search path could not be mounted.
    #[error(transparent)]
    Mount(#[from] MountError),
}

/// The host service table used by the runtime and the tests.
#[derive(Debug)]
pub struct StandardHost {
    config: HostConfig,
    console: Arc<ConsoleLog>,
    clock: Arc<SystemClock>,
    hunk: Hunk,
    heap: TrackedHeap,
    cvars: Arc<CvarStore>,
    commands: Arc<CommandTable>,
    fs: Arc<VirtualFileSystem>,
    world: WorldVis,
    cinematics: CinematicPlayer,
    images: JpegCodec,
    client: ClientState,
    platform: HeadlessPlatform,
}

impl StandardHost {
    /// Builds every service from `config`, mounting its search paths and
    /// applying its initial cvar values.
    pub fn new(config: HostConfig) -> Result<Self, HostError> {
        let mut fs = VirtualFileSystem::new();
        for path in &config.search_paths {
            fs.mount(path)?;
        }
        if let Some(dir) = &config.write_dir {
            fs.set_write_dir(dir.clone());
        }
        let fs = Arc::new(fs);

        let console = Arc::new(ConsoleLog::new());
        let clock = Arc::new(SystemClock::new());
        let cvars = Arc::new(CvarStore::new());
        for (name, value) in &config.cvars {
            cvars.set(name, value);
        }
        let commands = Arc::new(CommandTable::new(cvars.clone()));

        log::info!(
            "Host ready: {} search paths, hunk {} MB, heap {} MB",
            fs.search_path_count(),
            config.hunk_megs,
            config.heap_megs
        );

        Ok(Self {
            hunk: Hunk::new(config.hunk_bytes()),
            heap: TrackedHeap::new(config.heap_bytes()),
            cinematics: CinematicPlayer::new(fs.clone(), clock.clone()),
            images: JpegCodec::new(fs.clone()),
            client: ClientState::new(),
            platform: HeadlessPlatform::new(config.window.clone(), console.clone()),
            world: WorldVis::new(),
            config,
            console,
            clock,
            cvars,
            commands,
            fs,
        })
    }

    /// The configuration the host was built from.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The console, to inspect fatal errors.
    pub fn console(&self) -> &ConsoleLog {
        &self.console
    }

    /// The arena, to clear it on level change.
    pub fn hunk_arena(&self) -> &Hunk {
        &self.hunk
    }

    /// The heap, for statistics.
    pub fn heap_tracker(&self) -> &TrackedHeap {
        &self.heap
    }

    /// The cvar store with its host-only operations.
    pub fn cvar_store(&self) -> &Arc<CvarStore> {
        &self.cvars
    }

    /// The command table with its host-only operations.
    pub fn command_table(&self) -> &Arc<CommandTable> {
        &self.commands
    }

    /// The file system with its mount operations.
    pub fn vfs(&self) -> &Arc<VirtualFileSystem> {
        &self.fs
    }

    /// The current map's visibility holder.
    pub fn world_vis(&self) -> &WorldVis {
        &self.world
    }

    /// The client sinks.
    pub fn client_state(&self) -> &ClientState {
        &self.client
    }

    /// The platform layer with its inspection helpers.
    pub fn headless(&self) -> &HeadlessPlatform {
        &self.platform
    }

    /// Releases level-lifetime state: clears the hunk and the visibility data.
    pub fn clear_level(&self) {
        self.hunk.clear();
        self.world.clear();
    }

    /// Loads the visibility file that accompanies `world` (same path with a
    /// `.vis` extension) and installs it. Returns the shared bytes to lend to
    /// the renderer.
    pub fn load_map_vis(&self, world: &str) -> Option<Arc<[u8]>> {
        let stem = world.rsplit_once('.').map_or(world, |(stem, _)| stem);
        let file = self.fs.read_file(&format!("{stem}.vis"))?;
        let vis: Arc<[u8]> = Arc::from(file.into_bytes());
        self.world.set_vis(vis.clone()).then_some(vis)
    }

    /// Runs everything queued in the command buffer.
    pub fn pump_commands(&self) -> usize {
        self.commands.execute_pending()
    }
}

impl HostServices for StandardHost {
    fn diagnostics(&self) -> &dyn Diagnostics {
        self.console.as_ref()
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn hunk(&self) -> &dyn HunkAllocator {
        &self.hunk
    }

    fn heap(&self) -> &dyn HeapAllocator {
        &self.heap
    }

    fn cvars(&self) -> &dyn ConsoleVars {
        self.cvars.as_ref()
    }

    fn commands(&self) -> &dyn Commands {
        self.commands.as_ref()
    }

    fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    fn collision(&self) -> &dyn CollisionMap {
        &self.world
    }

    fn cinematics(&self) -> &dyn Cinematics {
        &self.cinematics
    }

    fn images(&self) -> &dyn ImageCodec {
        &self.images
    }

    fn client(&self) -> &dyn ClientServices {
        &self.client
    }

    fn platform(&self) -> &dyn Platform {
        &self.platform
    }
}
