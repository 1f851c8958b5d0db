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

//! A windowless platform layer.
//!
//! It tracks the window and context lifecycle the renderer drives, hands out
//! stable synthetic function addresses, and counts presented frames. This is
//! enough for a software renderer and for verifying teardown levels.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use refresh_core::exports::{DriverType, GraphicsConfig, GraphicsFamily, TextureCompression};
use refresh_core::host::{
    Diagnostics, GammaRamp, Platform, ProcAddress, Teardown, VkInstance, VkSurface,
};
use refresh_core::{ErrorLevel, RefResult};

use super::config::WindowConfig;
use super::console::ConsoleLog;

#[derive(Debug, Default)]
struct PlatformState {
    window_open: bool,
    gl_context: bool,
    vk_loaded: bool,
    gamma: Option<GammaRamp>,
    frames_presented: u64,
    next_surface: u64,
    teardowns: Vec<Teardown>,
}

/// Platform layer without a real window.
#[derive(Debug)]
pub struct HeadlessPlatform {
    window: WindowConfig,
    console: Arc<ConsoleLog>,
    state: Mutex<PlatformState>,
}

/// Derives a stable non-zero fake address from a symbol name.
fn synthetic_address(name: &str) -> Option<ProcAddress> {
    let hash = name
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x100_0000_01b3));
    NonZeroUsize::new((hash as usize) | 0x1000).map(ProcAddress)
}

impl HeadlessPlatform {
    /// Creates a platform with the given display settings.
    pub fn new(window: WindowConfig, console: Arc<ConsoleLog>) -> Self {
        Self {
            window,
            console,
            state: Mutex::new(PlatformState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fill_config(&self, config: &mut GraphicsConfig, family: GraphicsFamily) {
        let w = &self.window;
        config.family = family;
        config.vendor_string = "refresh".to_owned();
        config.max_texture_size = 4096;
        config.num_texture_units = 4;
        config.color_bits = 32;
        config.depth_bits = 24;
        config.stencil_bits = 8;
        config.driver_type = DriverType::Software;
        config.texture_compression = TextureCompression::None;
        config.texture_env_add_available = true;
        config.vid_width = w.width;
        config.vid_height = w.height;
        config.window_aspect = w.width as f32 / w.height.max(1) as f32;
        config.display_frequency = w.refresh_rate;
        config.is_fullscreen = w.fullscreen;
        config.stereo_enabled = w.stereo;
        match family {
            GraphicsFamily::OpenGl => {
                config.renderer_string = "headless software rasterizer".to_owned();
                config.version_string = "1.4 headless".to_owned();
                config.extensions_string =
                    "GL_ARB_multitexture GL_EXT_texture_env_add GL_ARB_texture_non_power_of_two"
                        .to_owned();
            }
            GraphicsFamily::Vulkan => {
                config.renderer_string = "headless software device".to_owned();
                config.version_string = "1.1 headless".to_owned();
                config.extensions_string = "VK_KHR_surface VK_KHR_swapchain".to_owned();
            }
        }
    }

    fn open_window(&self, family: GraphicsFamily) -> RefResult<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(self.console.error(
                ErrorLevel::Fatal,
                &format!("could not create a {family:?} window of 0 pixels"),
            ));
        }
        let mut state = self.lock();
        if !state.window_open {
            log::info!(
                "Opening {}x{} {} window",
                self.window.width,
                self.window.height,
                if self.window.fullscreen { "fullscreen" } else { "windowed" }
            );
        }
        state.window_open = true;
        Ok(())
    }

    fn teardown(&self, teardown: Teardown) {
        let mut state = self.lock();
        state.gl_context = false;
        state.vk_loaded = false;
        if teardown >= Teardown::Window {
            state.window_open = false;
            state.gamma = None;
        }
        state.teardowns.push(teardown);
        log::debug!("Platform teardown: {teardown:?}");
    }

    /// `true` while a window exists.
    pub fn window_open(&self) -> bool {
        self.lock().window_open
    }

    /// `true` while a GL context or a Vulkan loader is active.
    pub fn context_active(&self) -> bool {
        let state = self.lock();
        state.gl_context || state.vk_loaded
    }

    /// Number of presented frames.
    pub fn frames_presented(&self) -> u64 {
        self.lock().frames_presented
    }

    /// The gamma ramp last uploaded.
    pub fn gamma(&self) -> Option<GammaRamp> {
        self.lock().gamma.clone()
    }

    /// Every teardown requested so far, oldest first.
    pub fn teardowns(&self) -> Vec<Teardown> {
        self.lock().teardowns.clone()
    }
}

impl Platform for HeadlessPlatform {
    fn init_gamma(&self, config: &mut GraphicsConfig) {
        config.device_supports_gamma = self.window.gamma;
    }

    fn set_gamma(&self, ramp: &GammaRamp) {
        if self.window.gamma {
            self.lock().gamma = Some(ramp.clone());
        }
    }

    fn gl_init(&self, config: &mut GraphicsConfig) -> RefResult<()> {
        self.open_window(GraphicsFamily::OpenGl)?;
        self.fill_config(config, GraphicsFamily::OpenGl);
        self.lock().gl_context = true;
        Ok(())
    }

    fn gl_shutdown(&self, teardown: Teardown) {
        self.teardown(teardown);
    }

    fn gl_end_frame(&self) {
        let mut state = self.lock();
        if state.gl_context || state.vk_loaded {
            state.frames_presented += 1;
        }
    }

    fn gl_get_proc_address(&self, name: &str) -> Option<ProcAddress> {
        let active = self.lock().gl_context;
        (active && name.starts_with("gl"))
            .then(|| synthetic_address(name))
            .flatten()
    }

    fn vk_init(&self, config: &mut GraphicsConfig) -> RefResult<()> {
        self.open_window(GraphicsFamily::Vulkan)?;
        self.fill_config(config, GraphicsFamily::Vulkan);
        self.lock().vk_loaded = true;
        Ok(())
    }

    fn vk_shutdown(&self, teardown: Teardown) {
        self.teardown(teardown);
    }

    fn vk_get_instance_proc_addr(&self, instance: VkInstance, name: &str) -> Option<ProcAddress> {
        let active = self.lock().vk_loaded;
        (active && instance.0 != 0 && name.starts_with("vk"))
            .then(|| synthetic_address(name))
            .flatten()
    }

    fn vk_create_surface(&self, instance: VkInstance) -> Option<VkSurface> {
        let mut state = self.lock();
        if !state.vk_loaded || !state.window_open || instance.0 == 0 {
            return None;
        }
        state.next_surface += 1;
        Some(VkSurface(state.next_surface))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform() -> HeadlessPlatform {
        HeadlessPlatform::new(WindowConfig::default(), Arc::new(ConsoleLog::new()))
    }

    #[test]
    fn gl_init_fills_the_config() {
        let platform = platform();
        let mut config = GraphicsConfig::default();
        platform.gl_init(&mut config).expect("window opens");
        assert_eq!(config.vid_width, 640);
        assert_eq!(config.family, GraphicsFamily::OpenGl);
        assert!(platform.context_active());
        assert!(platform.gl_get_proc_address("glBindTexture").is_some());
        assert_eq!(
            platform.gl_get_proc_address("glBindTexture"),
            platform.gl_get_proc_address("glBindTexture")
        );
        assert!(platform.gl_get_proc_address("not_gl").is_none());
    }

    #[test]
    fn context_teardown_keeps_the_window() {
        let platform = platform();
        platform.gl_init(&mut GraphicsConfig::default()).expect("opens");
        platform.gl_shutdown(Teardown::Context);
        assert!(platform.window_open());
        assert!(!platform.context_active());
        platform.gl_shutdown(Teardown::Window);
        assert!(!platform.window_open());
        assert_eq!(platform.teardowns(), vec![Teardown::Context, Teardown::Window]);
    }

    #[test]
    fn zero_sized_window_is_fatal() {
        let console = Arc::new(ConsoleLog::new());
        let window = WindowConfig {
            width: 0,
            ..Default::default()
        };
        let platform = HeadlessPlatform::new(window, console.clone());
        let err = platform.vk_init(&mut GraphicsConfig::default()).unwrap_err();
        assert_eq!(err.level, ErrorLevel::Fatal);
        assert_eq!(console.last_fatal(), Some(err));
    }

    #[test]
    fn vulkan_surface_requires_an_instance() {
        let platform = platform();
        platform.vk_init(&mut GraphicsConfig::default()).expect("opens");
        assert!(platform.vk_create_surface(VkInstance(0)).is_none());
        assert_eq!(platform.vk_create_surface(VkInstance(7)), Some(VkSurface(1)));
        assert!(platform
            .vk_get_instance_proc_addr(VkInstance(7), "vkCreateDevice")
            .is_some());
    }
}
