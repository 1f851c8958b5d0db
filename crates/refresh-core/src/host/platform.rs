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

//! Windowing and graphics API bootstrap.
//!
//! The host owns the window and the graphics context; the renderer asks for
//! them here. Two API families are covered: an immediate-mode family (GL) that
//! needs a current context and function pointers, and an explicit family
//! (Vulkan) that needs an instance loader and a presentation surface.

use std::num::NonZeroUsize;

use crate::error::RefResult;
use crate::exports::GraphicsConfig;

/// An address returned by a function loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcAddress(pub NonZeroUsize);

/// An opaque Vulkan instance handle created by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VkInstance(pub u64);

/// An opaque Vulkan surface handle created by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VkSurface(pub u64);

/// How much of the window system the host should tear down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Teardown {
    /// Destroy the graphics context, keep the window.
    Context,
    /// Destroy the context and the window.
    Window,
    /// Destroy everything, including the video subsystem.
    Unload,
}

/// A hardware gamma ramp, one table per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GammaRamp {
    /// Red channel.
    pub red: [u8; 256],
    /// Green channel.
    pub green: [u8; 256],
    /// Blue channel.
    pub blue: [u8; 256],
}

impl GammaRamp {
    /// The identity ramp.
    pub fn identity() -> Self {
        let mut table = [0u8; 256];
        for (i, v) in table.iter_mut().enumerate() {
            *v = i as u8;
        }
        Self {
            red: table,
            green: table,
            blue: table,
        }
    }
}

impl Default for GammaRamp {
    fn default() -> Self {
        Self::identity()
    }
}

/// The window system and graphics API loader.
pub trait Platform: Send + Sync {
    /// Probes hardware gamma support and records it in `config`.
    fn init_gamma(&self, config: &mut GraphicsConfig);

    /// Uploads a gamma ramp. Ignored when gamma is unsupported.
    fn set_gamma(&self, ramp: &GammaRamp);

    /// Creates the window and a GL context, filling in `config`.
    fn gl_init(&self, config: &mut GraphicsConfig) -> RefResult<()>;

    /// Releases the GL context and, depending on `teardown`, the window.
    fn gl_shutdown(&self, teardown: Teardown);

    /// Presents the back buffer.
    fn gl_end_frame(&self);

    /// Resolves a GL entry point.
    fn gl_get_proc_address(&self, name: &str) -> Option<ProcAddress>;

    /// Creates the window and loads the Vulkan library, filling in `config`.
    fn vk_init(&self, config: &mut GraphicsConfig) -> RefResult<()>;

    /// Unloads Vulkan and, depending on `teardown`, the window.
    fn vk_shutdown(&self, teardown: Teardown);

    /// Resolves a Vulkan instance-level entry point.
    fn vk_get_instance_proc_addr(&self, instance: VkInstance, name: &str) -> Option<ProcAddress>;

    /// Creates a presentation surface for the window.
    fn vk_create_surface(&self, instance: VkInstance) -> Option<VkSurface>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ramp_maps_each_level_to_itself() {
        let ramp = GammaRamp::identity();
        assert_eq!(ramp.red[0], 0);
        assert_eq!(ramp.green[128], 128);
        assert_eq!(ramp.blue[255], 255);
    }

    #[test]
    fn teardown_levels_are_ordered() {
        assert!(Teardown::Context < Teardown::Window);
        assert!(Teardown::Window < Teardown::Unload);
    }
}
