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

//! The reference renderer module.
//!
//! A complete implementation of [`RendererExports`] over a software back
//! end. It is exported twice, once per graphics family, through
//! [`get_ref_api_gl`] and [`get_ref_api_vk`]; the families differ only in
//! which platform bootstrap calls they make.

mod assets;
mod cvars;
mod frame;
mod marks;
mod registry;
mod scene;
mod view;
mod world;

pub use cvars::RendererCvars;
pub use frame::{avi_frame, color_mappings, ColorMappings, ScreenshotFormat};
pub use registry::{normalize_name, MAX_QPATH};
pub use scene::{ScenePhase, MAX_DLIGHTS, MAX_REF_ENTITIES};

use std::sync::Arc;

use image::ImageFormat;
use refresh_core::exports::{
    FontInfo, FrameTimings, GraphicsConfig, GraphicsFamily, LightSample, MarkFragment,
    Orientation, PolyVert, RawFrame, RdFlags, RefDef, RefEntity, RefEntityType, RenderFx,
    ScreenRect, StretchPic,
};
use refresh_core::host::{CommandArgs, GammaRamp, PrintLevel, Teardown, VkInstance};
use refresh_core::math::{Aabb, Plane, Vec3};
use refresh_core::{
    negotiate, ErrorLevel, Handle, HandleKind, HostServices, RefResult, RendererExports,
    ShutdownCode, StereoFrame, Stopwatch,
};

use self::assets::{Model, Shader, ShaderImage, Skin, Texture};
use self::frame::{Backend, DrawCommand, ScratchImage, TextureLookup, VideoCapture};
use self::registry::{EpochTracker, Lookup, ResourceTable, ShaderRemap};
use self::cvars::{MIN_POLYS, MIN_POLY_VERTS};
use self::scene::{DynamicLight, LightKind, SceneBuilder, SceneLimits};
use self::world::World;

const MAX_MOD_KNOWN: usize = 1024;
const MAX_SKINS: usize = 1024;
const MAX_SHADERS: usize = 16384;
/// Most fonts registered at once.
pub const MAX_FONTS: usize = 6;
const DEFAULT_FONT_SIZE: i32 = 12;
const LEVELSHOT_SIZE: u32 = 128;
const AVI_JPEG_QUALITY: u8 = 90;

/// Console commands the renderer owns while initialized.
pub const RENDERER_COMMANDS: [&str; 6] = [
    "screenshot",
    "screenshotJPEG",
    "screenshotBMP",
    "modellist",
    "shaderlist",
    "gfxinfo",
];

/// Entry point of the OpenGL flavour.
pub fn get_ref_api_gl(api_version: u32, host: Arc<dyn HostServices>) -> Option<Box<dyn RendererExports>> {
    get_ref_api(GraphicsFamily::OpenGl, api_version, host)
}

/// Entry point of the Vulkan flavour.
pub fn get_ref_api_vk(api_version: u32, host: Arc<dyn HostServices>) -> Option<Box<dyn RendererExports>> {
    get_ref_api(GraphicsFamily::Vulkan, api_version, host)
}

fn get_ref_api(
    family: GraphicsFamily,
    api_version: u32,
    host: Arc<dyn HostServices>,
) -> Option<Box<dyn RendererExports>> {
    if let Err(mismatch) = negotiate(api_version) {
        // The host table is dropped here, never stored.
        log::warn!("Reference renderer refused: {mismatch}");
        return None;
    }
    Some(Box::new(ReferenceRenderer::new(host, family)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ShotTarget {
    Numbered,
    Named(String),
    Levelshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleRequest {
    Screenshot {
        format: ScreenshotFormat,
        target: ShotTarget,
        silent: bool,
        clipboard: bool,
    },
    ModelList,
    ShaderList,
    GfxInfo,
}

fn screenshot_request(args: &CommandArgs, format: ScreenshotFormat) -> ConsoleRequest {
    let arg = args.argv(1);
    let (target, silent, clipboard) = match arg {
        "" => (ShotTarget::Numbered, false, false),
        "silent" => (ShotTarget::Numbered, true, false),
        "levelshot" => (ShotTarget::Levelshot, false, false),
        "clipboard" if format == ScreenshotFormat::Bmp => (ShotTarget::Numbered, true, true),
        name => (
            ShotTarget::Named(registry::strip_extension(name).to_owned()),
            false,
            false,
        ),
    };
    ConsoleRequest::Screenshot {
        format,
        target,
        silent,
        clipboard,
    }
}

/// Every resource table of the current epoch.
#[derive(Debug)]
struct Resources {
    epoch: EpochTracker,
    models: ResourceTable<Model>,
    skins: ResourceTable<Skin>,
    shaders: ResourceTable<Shader>,
    fonts: ResourceTable<FontInfo>,
}

impl Resources {
    fn new() -> Self {
        Self {
            epoch: EpochTracker::default(),
            models: ResourceTable::new(HandleKind::Model, MAX_MOD_KNOWN),
            skins: ResourceTable::new(HandleKind::Skin, MAX_SKINS),
            shaders: ResourceTable::new(HandleKind::Shader, MAX_SHADERS),
            fonts: ResourceTable::new(HandleKind::Font, MAX_FONTS),
        }
    }

    fn clear(&mut self) {
        self.models.clear();
        self.skins.clear();
        self.shaders.clear();
        self.fonts.clear();
    }

    fn begin_epoch(&mut self) -> Option<u32> {
        self.clear();
        self.epoch.advance()
    }

    fn epoch(&self) -> u32 {
        self.epoch.current()
    }

    /// Follows a remap of `handle` once; stale handles resolve to nothing.
    fn resolve_shader(&self, handle: Handle) -> Option<(Handle, &Shader)> {
        let epoch = self.epoch();
        let name = self.shaders.name(epoch, handle)?;
        let target = self
            .epoch
            .remap(name)
            .map_or(handle, |remap| remap.target);
        self.shaders
            .get(epoch, target)
            .map(|shader| (target, shader))
    }
}

impl TextureLookup for Resources {
    fn texture(&self, shader: Handle) -> Option<&Texture> {
        match self.resolve_shader(shader) {
            Some((_, Shader {
                image: ShaderImage::Texture(texture),
                ..
            })) => Some(texture),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct FrameStats {
    views: usize,
    entities: usize,
    culled: usize,
    bad_models: usize,
    polys: usize,
    lights: usize,
}

/// The software reference renderer.
pub struct ReferenceRenderer {
    host: Arc<dyn HostServices>,
    family: GraphicsFamily,
    config: GraphicsConfig,
    cvars: Option<RendererCvars>,
    context_up: bool,
    registered: bool,
    unloaded: bool,
    res: Resources,
    world: Option<World>,
    vis: Option<Arc<[u8]>>,
    scene: SceneBuilder,
    backend: Option<Backend>,
    mappings: Option<ColorMappings>,
    requests_tx: flume::Sender<ConsoleRequest>,
    requests_rx: flume::Receiver<ConsoleRequest>,
    frame_open: bool,
    frame_count: u64,
    frustum: [Plane; 4],
    vertex_light_allowed: bool,
    stats: FrameStats,
}

impl std::fmt::Debug for ReferenceRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceRenderer")
            .field("family", &self.family)
            .field("registered", &self.registered)
            .field("epoch", &self.res.epoch())
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

impl ReferenceRenderer {
    /// Binds `host` for the renderer's whole lifetime. Nothing is initialized
    /// until the first `begin_registration`.
    pub fn new(host: Arc<dyn HostServices>, family: GraphicsFamily) -> Self {
        let (requests_tx, requests_rx) = flume::unbounded();
        Self {
            host,
            family,
            config: GraphicsConfig::default(),
            cvars: None,
            context_up: false,
            registered: false,
            unloaded: false,
            res: Resources::new(),
            world: None,
            vis: None,
            scene: SceneBuilder::default(),
            backend: None,
            mappings: None,
            requests_tx,
            requests_rx,
            frame_open: false,
            frame_count: 0,
            frustum: [Plane::default(); 4],
            vertex_light_allowed: true,
            stats: FrameStats::default(),
        }
    }

    /// Where the scene protocol stands.
    pub fn scene_phase(&self) -> ScenePhase {
        self.scene.phase()
    }

    fn print(&self, level: PrintLevel, message: &str) {
        self.host.print(level, message);
    }

    fn register_commands(&self) {
        let commands = self.host.commands();
        let formats = [
            ("screenshot", ScreenshotFormat::Tga),
            ("screenshotJPEG", ScreenshotFormat::Jpeg),
            ("screenshotBMP", ScreenshotFormat::Bmp),
        ];
        for (name, format) in formats {
            let tx = self.requests_tx.clone();
            commands.add_command(
                name,
                Arc::new(move |args: &CommandArgs| {
                    let _ = tx.send(screenshot_request(args, format));
                }),
            );
        }
        let simple = [
            ("modellist", ConsoleRequest::ModelList),
            ("shaderlist", ConsoleRequest::ShaderList),
            ("gfxinfo", ConsoleRequest::GfxInfo),
        ];
        for (name, request) in simple {
            let tx = self.requests_tx.clone();
            commands.add_command(
                name,
                Arc::new(move |_: &CommandArgs| {
                    let _ = tx.send(request.clone());
                }),
            );
        }
    }

    fn init_context(&mut self, cvars: &RendererCvars) -> RefResult<()> {
        let platform = self.host.platform();
        let mut config = GraphicsConfig::default();
        match self.family {
            GraphicsFamily::OpenGl => {
                platform.gl_init(&mut config)?;
                if platform.gl_get_proc_address("glGetString").is_none() {
                    return Err(self.host.error(
                        ErrorLevel::Fatal,
                        "GLimp_Init: could not resolve glGetString",
                    ));
                }
            }
            GraphicsFamily::Vulkan => {
                platform.vk_init(&mut config)?;
                let instance = VkInstance(1);
                if platform
                    .vk_get_instance_proc_addr(instance, "vkGetInstanceProcAddr")
                    .is_none()
                    || platform.vk_create_surface(instance).is_none()
                {
                    return Err(self.host.error(
                        ErrorLevel::Fatal,
                        "VK_Init: could not create a presentation surface",
                    ));
                }
            }
        }
        platform.init_gamma(&mut config);
        if cvars.stereo.enabled() && !config.stereo_enabled {
            log::warn!("r_stereoEnabled is set but the window has no stereo pair");
        }
        log::info!(
            "{} context up: {}x{} ({})",
            match self.family {
                GraphicsFamily::OpenGl => "GL",
                GraphicsFamily::Vulkan => "Vulkan",
            },
            config.vid_width,
            config.vid_height,
            config.renderer_string
        );
        self.backend = Some(Backend::new(config.vid_width, config.vid_height));
        self.config = config;
        self.context_up = true;
        Ok(())
    }

    fn init(&mut self) -> RefResult<()> {
        let cvars = RendererCvars::register(self.host.cvars());
        if self.host.client().low_physical_memory() && cvars.picmip.integer() == 0 {
            self.print(PrintLevel::All, "Low physical memory, forcing r_picmip 1\n");
            self.host.cvars().set("r_picmip", "1");
        }
        self.register_commands();
        if !self.context_up {
            self.init_context(&cvars)?;
        }
        self.scene = SceneBuilder::new(SceneLimits {
            polys: cvars.max_polys.integer().max(MIN_POLYS) as usize,
            poly_verts: cvars.max_poly_verts.integer().max(MIN_POLY_VERTS) as usize,
            ..Default::default()
        });
        self.cvars = Some(cvars);
        self.set_color_mappings();
        self.registered = true;
        Ok(())
    }

    /// Normalizes `name` or explains why it cannot be a resource name.
    fn checked_name(&self, caller: &str, name: &str) -> Option<String> {
        if name.is_empty() {
            self.print(PrintLevel::Warning, &format!("{caller}: NULL name\n"));
            return None;
        }
        if name.len() >= MAX_QPATH {
            self.print(PrintLevel::Warning, &format!("{caller}: name exceeds MAX_QPATH\n"));
            return None;
        }
        Some(normalize_name(name))
    }

    fn register_shader_impl(&mut self, name: &str, mip: bool) -> RefResult<Handle> {
        if !self.registered {
            return Ok(Handle::NONE);
        }
        let Some(key) = self.checked_name("RE_RegisterShader", name) else {
            return Ok(Handle::NONE);
        };
        let key = registry::strip_extension(&key).to_owned();
        let epoch = self.res.epoch();
        match self.res.shaders.lookup(epoch, &key) {
            Lookup::Found(handle) => return Ok(handle),
            Lookup::Missing => return Ok(Handle::NONE),
            Lookup::Unknown => {}
        }
        if self.res.shaders.is_full() {
            self.print(PrintLevel::Warning, "RE_RegisterShader: MAX_SHADERS hit\n");
            return Ok(Handle::NONE);
        }
        let picmip = self
            .cvars
            .as_ref()
            .map_or(0, |c| c.picmip.integer().max(0) as u32);
        let screen = (self.config.vid_width, self.config.vid_height);
        match assets::load_shader(self.host.as_ref(), &key, mip, picmip, screen)? {
            Some(shader) => Ok(self.res.shaders.insert(epoch, &key, shader)),
            None => {
                self.print(PrintLevel::Developer, &format!("WARNING: shader '{name}' not found\n"));
                self.res.shaders.remember_missing(&key);
                Ok(Handle::NONE)
            }
        }
    }

    fn load_world_impl(&mut self, name: &str) -> RefResult<()> {
        if self.world.is_some() {
            return Err(self.host.error(
                ErrorLevel::Drop,
                "ERROR: attempted to redundantly load world map",
            ));
        }
        let Some(file) = self.host.fs().read_file(name) else {
            return Err(self.host.error(
                ErrorLevel::Drop,
                &format!("RE_LoadWorldMap: {name} not found"),
            ));
        };
        let storage = assets::hunk_copy(self.host.as_ref(), name, &file)?;
        let shift = self.cvars.as_ref().map_or(0, |c| {
            let overbright = self.mappings.as_ref().map_or(0, |m| m.overbright_bits as i32);
            (c.map_overbright_bits.integer() - overbright).max(0) as u32
        });
        let world = World::parse(name, &file, storage, shift).map_err(|err| {
            self.host.error(
                ErrorLevel::Drop,
                &format!("RE_LoadWorldMap: {name} is not a valid world: {}", err.0),
            )
        })?;

        let mut shaders: Vec<String> = world
            .surfaces
            .iter()
            .map(|s| s.shader.clone())
            .filter(|s| !s.is_empty())
            .collect();
        shaders.sort();
        shaders.dedup();
        for shader in shaders {
            self.register_shader_impl(&shader, true)?;
        }
        // Inline models only appear once nothing else can fail.
        let epoch = self.res.epoch();
        for (index, bounds) in world.submodels.iter().enumerate() {
            let key = format!("*{index}");
            if self.res.models.lookup(epoch, &key) == Lookup::Unknown {
                self.res.models.insert(
                    epoch,
                    &key,
                    Model::Brush {
                        submodel: index,
                        bounds: *bounds,
                    },
                );
            }
        }
        log::info!(
            "Loaded world {name}: {} surfaces, {} leaves, {} inline models",
            world.surfaces.len(),
            world.leaves.len(),
            world.submodels.len()
        );
        self.world = Some(world);
        Ok(())
    }

    /// Classifies and projects one scene into a view command.
    fn build_view(&mut self, fd: &RefDef, contents: scene::SceneContents) -> DrawCommand {
        let projection = view::ViewProjection::new(fd);
        self.frustum = view::frustum_planes(fd);
        let epoch = self.res.epoch();
        let view_pvs = self.world.as_ref().and_then(|world| {
            let cluster = world.point_cluster(fd.vieworg)?;
            world::lent_pvs(self.vis.as_ref()?, cluster)
        });
        let mut points = Vec::new();
        let mut stats = FrameStats {
            views: 1,
            ..Default::default()
        };

        for item in &contents.entities {
            let ent = &item.entity;
            if ent.renderfx.contains(RenderFx::THIRD_PERSON) || ent.re_type == RefEntityType::PortalSurface {
                continue;
            }
            let radius = match ent.re_type {
                RefEntityType::Model => match self.res.models.get(epoch, ent.model) {
                    Some(model) => model.radius(ent.frame),
                    None => {
                        stats.bad_models += 1;
                        continue;
                    }
                },
                _ => ent.radius.max(1.0),
            };
            if view::cull_sphere(&self.frustum, ent.origin, radius) {
                stats.culled += 1;
                continue;
            }
            if let (Some(world), Some(pvs)) = (&self.world, &view_pvs) {
                if let Some(leaf) = world.point_leaf(ent.origin) {
                    let area = usize::try_from(leaf.area).unwrap_or(0);
                    let area_hidden = fd
                        .areamask
                        .get(area >> 3)
                        .is_some_and(|bits| bits & (1 << (area & 7)) != 0);
                    if area_hidden || !pvs.is_visible(leaf.cluster) {
                        stats.culled += 1;
                        continue;
                    }
                }
            }
            stats.entities += 1;
            if let Some(pixel) = projection.project(ent.origin) {
                points.push((pixel, ent.shader_rgba));
            }
        }

        for poly in &contents.polys {
            if self.res.resolve_shader(poly.shader).is_none() {
                continue;
            }
            stats.polys += 1;
            for vert in &contents.poly_verts[poly.verts.clone()] {
                if let Some(pixel) = projection.project(Vec3::from_array(vert.xyz)) {
                    points.push((pixel, vert.modulate));
                }
            }
        }

        for light in &contents.lights {
            stats.lights += 1;
            if let Some(pixel) = projection.project(light.origin) {
                let c = light.color * 255.0;
                points.push((pixel, [c.x as u8, c.y as u8, c.z as u8, 255]));
            }
        }

        if self.cvars.as_ref().is_some_and(|c| c.debug_surface.enabled()) {
            self.host.collision().draw_debug_surfaces(&mut |color, surface| {
                let rgba = [
                    if color & 1 != 0 { 255 } else { 0 },
                    if color & 2 != 0 { 255 } else { 0 },
                    if color & 4 != 0 { 255 } else { 0 },
                    255,
                ];
                points.extend(surface.iter().filter_map(|p| projection.project(*p)).map(|px| (px, rgba)));
            });
        }

        let clear = if fd.rdflags.contains(RdFlags::HYPERSPACE) {
            let c = (fd.time & 255) as u8;
            [c, c, c, 255]
        } else {
            [0, 0, 0, 255]
        };
        self.stats.views += stats.views;
        self.stats.entities += stats.entities;
        self.stats.culled += stats.culled;
        self.stats.bad_models += stats.bad_models;
        self.stats.polys += stats.polys;
        self.stats.lights += stats.lights;
        DrawCommand::View {
            rect: ScreenRect {
                x: fd.x,
                y: fd.y,
                w: fd.width,
                h: fd.height,
            },
            clear,
            points,
        }
    }

    fn execute_commands(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.execute(&self.res);
        }
    }

    fn drain_console(&mut self) {
        let requests: Vec<_> = self.requests_rx.try_iter().collect();
        for request in requests {
            match request {
                ConsoleRequest::Screenshot {
                    format,
                    target,
                    silent,
                    clipboard,
                } => self.screenshot(format, &target, silent, clipboard),
                ConsoleRequest::ModelList => self.model_list(),
                ConsoleRequest::ShaderList => self.shader_list(),
                ConsoleRequest::GfxInfo => self.gfx_info(),
            }
        }
    }

    /// Reads the framebuffer into arena temp memory and hands it to `f`.
    fn with_readback<R>(&self, width: u32, height: u32, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        let backend = self.backend.as_ref()?;
        let Some(size) = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(3))
        else {
            self.print(PrintLevel::Warning, &format!("readback of {width}x{height} is too large\n"));
            return None;
        };
        let mut block = match self.host.hunk().alloc_temp(size) {
            Ok(block) => block,
            Err(err) => {
                self.print(PrintLevel::Warning, &format!("readback failed: {err}\n"));
                return None;
            }
        };
        backend.read_rgb(width, height, block.as_mut_slice());
        let result = f(block.as_slice());
        if let Err(err) = self.host.hunk().free_temp(block) {
            log::error!("readback temp block: {err}");
        }
        Some(result)
    }

    fn screenshot_name(&self, format: ScreenshotFormat, target: &ShotTarget) -> Option<String> {
        let ext = format.extension();
        match target {
            ShotTarget::Named(name) => Some(format!("screenshots/{name}.{ext}")),
            ShotTarget::Levelshot => {
                let world = self.world.as_ref()?;
                let base = world.name.rsplit('/').next().unwrap_or(&world.name);
                Some(format!("levelshots/{}.tga", registry::strip_extension(base)))
            }
            ShotTarget::Numbered => (0..10_000)
                .map(|n| format!("screenshots/shot{n:04}.{ext}"))
                .find(|name| !self.host.fs().file_exists(name)),
        }
    }

    fn screenshot(&mut self, format: ScreenshotFormat, target: &ShotTarget, silent: bool, clipboard: bool) {
        // A screenshot shows the finished frame.
        self.execute_commands();
        let Some(size) = self.backend.as_ref().map(Backend::size) else {
            return;
        };
        let (width, height) = if *target == ShotTarget::Levelshot {
            (LEVELSHOT_SIZE, LEVELSHOT_SIZE)
        } else {
            size
        };
        let format = if *target == ShotTarget::Levelshot {
            ScreenshotFormat::Tga
        } else {
            format
        };
        let Some(name) = self.screenshot_name(format, target) else {
            self.print(PrintLevel::All, "ScreenShot: Couldn't create a file\n");
            return;
        };
        let host = self.host.clone();
        let quality = self
            .cvars
            .as_ref()
            .map_or(90, |c| c.screenshot_jpeg_quality.integer().clamp(10, 100) as u8);
        let written = self.with_readback(width, height, |rgb| match format {
            ScreenshotFormat::Jpeg => host.images().save_jpeg(&name, quality, width, height, rgb, 0),
            ScreenshotFormat::Tga | ScreenshotFormat::Bmp => {
                let image_format = if format == ScreenshotFormat::Tga {
                    ImageFormat::Tga
                } else {
                    ImageFormat::Bmp
                };
                match frame::encode_rgb(rgb, width, height, image_format) {
                    Ok(bytes) if clipboard => {
                        host.client().set_clipboard_bitmap(&bytes[frame::BMP_FILE_HEADER..]);
                        true
                    }
                    Ok(bytes) => host.fs().write_file(&name, &bytes).is_ok(),
                    Err(err) => {
                        log::warn!("screenshot encode failed: {err}");
                        false
                    }
                }
            }
        });
        match written {
            Some(true) if clipboard => self.print(PrintLevel::All, "Copied screenshot to clipboard\n"),
            Some(true) if !silent => self.print(PrintLevel::All, &format!("Wrote {name}\n")),
            Some(true) => {}
            _ => self.print(PrintLevel::Warning, &format!("ScreenShot: failed to write {name}\n")),
        }
    }

    fn capture_video(&mut self, capture: VideoCapture) {
        let Some((fb_width, fb_height)) = self.backend.as_ref().map(Backend::size) else {
            return;
        };
        let width = if capture.width == 0 { fb_width } else { capture.width };
        let height = if capture.height == 0 { fb_height } else { capture.height };
        if (width, height) != (fb_width, fb_height) {
            self.host
                .client()
                .set_scaling(width as f32 / fb_width.max(1) as f32, width, height);
        }
        let host = self.host.clone();
        self.with_readback(width, height, |rgb| {
            if capture.motion_jpeg {
                match host.images().encode_jpeg(AVI_JPEG_QUALITY, width, height, rgb, 0) {
                    Some(jpeg) => host.client().write_avi_frame(&jpeg),
                    None => log::warn!("video frame JPEG encode failed"),
                }
            } else {
                host.client().write_avi_frame(&avi_frame(rgb, width, height));
            }
        });
    }

    fn model_list(&self) {
        let epoch = self.res.epoch();
        for (name, model) in self.res.models.iter() {
            let line = match model {
                Model::Mesh(mesh) => format!("{:>4} frames {name}\n", mesh.frames.len()),
                Model::Brush { submodel, .. } => format!("brush #{submodel:<3} {name}\n"),
            };
            self.print(PrintLevel::All, &line);
        }
        self.print(
            PrintLevel::All,
            &format!("{} total models (epoch {epoch})\n", self.res.models.len()),
        );
    }

    fn shader_list(&self) {
        for (name, shader) in self.res.shaders.iter() {
            let kind = match &shader.image {
                ShaderImage::Solid(_) => "solid".to_owned(),
                ShaderImage::Texture(t) => format!("{}x{}", t.width, t.height),
                ShaderImage::Cinematic(h) => format!("cin {}", h.0),
            };
            let remap = self.res.epoch.remap(name).map_or(String::new(), |r| {
                format!(" -> {} (+{:.2}s)", r.target, r.time_offset)
            });
            let mip = if shader.mip { "M" } else { " " };
            self.print(PrintLevel::All, &format!("{mip} {kind:<10} {name}{remap}\n"));
        }
        self.print(PrintLevel::All, &format!("{} total shaders\n", self.res.shaders.len()));
    }

    fn gfx_info(&self) {
        let c = &self.config;
        let vertex_light = self.vertex_light_allowed
            && self.cvars.as_ref().is_some_and(|cv| cv.vertex_light.enabled());
        let lines = [
            format!("RENDERER: {}\n", c.renderer_string),
            format!("VENDOR: {}\n", c.vendor_string),
            format!("VERSION: {}\n", c.version_string),
            format!("EXTENSIONS: {}\n", c.extensions_string),
            format!("MAX_TEXTURE_SIZE: {}\n", c.max_texture_size),
            format!("PIXELFORMAT: color({}-bits) Z({}-bit) stencil({}-bits)\n", c.color_bits, c.depth_bits, c.stencil_bits),
            format!("MODE: {}x{} {}hz {}\n", c.vid_width, c.vid_height, c.display_frequency, if c.is_fullscreen { "fullscreen" } else { "windowed" }),
            format!("GAMMA: {}, overbright bits: {}\n", if c.device_supports_gamma { "hardware" } else { "none" }, self.mappings.as_ref().map_or(0, |m| m.overbright_bits)),
            format!("vertex lighting: {}\n", if vertex_light { "enabled" } else { "disabled" }),
            format!("stereo: {}\n", if c.stereo_enabled { "enabled" } else { "disabled" }),
        ];
        for line in lines {
            self.print(PrintLevel::All, &line);
        }
    }

    fn upload_scratch(&mut self, frame: RawFrame<'_>, client: usize, dirty: bool) {
        if client >= frame::MAX_VIDEO_HANDLES {
            self.print(PrintLevel::Warning, &format!("upload_cinematic: bad client {client}\n"));
            return;
        }
        let needed = frame.cols as usize * frame.rows as usize * 4;
        if needed == 0 || frame.data.len() < needed {
            self.print(PrintLevel::Warning, "upload_cinematic: short frame\n");
            return;
        }
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        let slot = &mut backend.scratch[client];
        let reuse = slot
            .as_ref()
            .is_some_and(|img| img.width == frame.cols && img.height == frame.rows);
        if reuse && !dirty {
            return;
        }
        if !reuse {
            if let Some(old) = slot.take() {
                if let Err(err) = self.host.heap().free(old.into_block()) {
                    log::error!("scratch image: {err}");
                }
            }
            match self.host.heap().alloc(needed) {
                Ok(block) => *slot = Some(ScratchImage::new(frame.cols, frame.rows, block)),
                Err(err) => {
                    log::warn!("upload_cinematic: {err}");
                    return;
                }
            }
        }
        if let Some(image) = slot.as_mut() {
            image.pixels_mut().copy_from_slice(&frame.data[..needed]);
        }
    }

    fn release_scratch(&mut self) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        for slot in &mut backend.scratch {
            if let Some(image) = slot.take() {
                if let Err(err) = self.host.heap().free(image.into_block()) {
                    log::error!("scratch image: {err}");
                }
            }
        }
    }

    fn color(&self) -> [f32; 4] {
        self.backend.as_ref().map_or([1.0; 4], |b| b.color)
    }

    fn push_command(&mut self, command: DrawCommand) {
        if let Some(backend) = self.backend.as_mut() {
            backend.push(command);
        }
    }
}

impl RendererExports for ReferenceRenderer {
    fn shutdown(&mut self, code: ShutdownCode) {
        if self.unloaded {
            return;
        }
        log::info!("RE_Shutdown( {code:?} )");
        for name in RENDERER_COMMANDS {
            self.host.commands().remove_command(name);
        }
        self.requests_rx.drain().for_each(drop);
        self.release_scratch();
        self.scene.reset();
        self.world = None;
        self.vis = None;
        self.res.clear();
        self.registered = false;
        self.frame_open = false;

        let teardown = match code {
            ShutdownCode::KeepContext => None,
            ShutdownCode::KeepWindow => Some(Teardown::Context),
            ShutdownCode::DestroyWindow => Some(Teardown::Window),
            ShutdownCode::UnloadModule => Some(Teardown::Unload),
        };
        if let Some(teardown) = teardown {
            if self.context_up {
                match self.family {
                    GraphicsFamily::OpenGl => self.host.platform().gl_shutdown(teardown),
                    GraphicsFamily::Vulkan => self.host.platform().vk_shutdown(teardown),
                }
            }
            self.context_up = false;
            self.backend = None;
            self.config = GraphicsConfig::default();
        }
        if code == ShutdownCode::UnloadModule {
            self.host.heap().free_all();
            self.cvars = None;
            self.unloaded = true;
        }
    }

    fn begin_registration(&mut self) -> RefResult<GraphicsConfig> {
        if self.unloaded {
            return Err(self.host.error(ErrorLevel::Fatal, "renderer called after unload"));
        }
        if !self.registered {
            self.init()?;
        }
        let Some(epoch) = self.res.begin_epoch() else {
            return Err(self.host.error(
                ErrorLevel::Fatal,
                "RE_BeginRegistration: registration epochs exhausted",
            ));
        };
        self.world = None;
        self.vis = None;
        self.scene.reset();
        log::debug!("Registration epoch {epoch} begins");
        Ok(self.config.clone())
    }

    fn register_model(&mut self, name: &str) -> RefResult<Handle> {
        if !self.registered {
            return Ok(Handle::NONE);
        }
        let Some(key) = self.checked_name("RE_RegisterModel", name) else {
            return Ok(Handle::NONE);
        };
        let epoch = self.res.epoch();
        match self.res.models.lookup(epoch, &key) {
            Lookup::Found(handle) => return Ok(handle),
            Lookup::Missing => return Ok(Handle::NONE),
            Lookup::Unknown => {}
        }
        if self.res.models.is_full() {
            self.print(PrintLevel::Warning, "RE_RegisterModel: Too many models\n");
            return Ok(Handle::NONE);
        }
        let host = self.host.clone();
        let model = if key.starts_with('*') {
            None
        } else {
            assets::load_model(host.as_ref(), &key, &mut |shader| self.register_shader_impl(shader, true))?
        };
        match model {
            Some(model) => Ok(self.res.models.insert(epoch, &key, model)),
            None => {
                self.print(PrintLevel::Developer, &format!("RE_RegisterModel: couldn't load {name}\n"));
                // Inline models may still arrive with the world.
                if !key.starts_with('*') {
                    self.res.models.remember_missing(&key);
                }
                Ok(Handle::NONE)
            }
        }
    }

    fn register_skin(&mut self, name: &str) -> RefResult<Handle> {
        if !self.registered {
            return Ok(Handle::NONE);
        }
        let Some(key) = self.checked_name("RE_RegisterSkin", name) else {
            return Ok(Handle::NONE);
        };
        let epoch = self.res.epoch();
        match self.res.skins.lookup(epoch, &key) {
            Lookup::Found(handle) => return Ok(handle),
            Lookup::Missing => return Ok(Handle::NONE),
            Lookup::Unknown => {}
        }
        if self.res.skins.is_full() {
            self.print(PrintLevel::Warning, "RE_RegisterSkin: MAX_SKINS hit\n");
            return Ok(Handle::NONE);
        }
        let host = self.host.clone();
        match assets::load_skin(host.as_ref(), &key, &mut |shader| self.register_shader_impl(shader, true))? {
            Some(skin) => Ok(self.res.skins.insert(epoch, &key, skin)),
            None => {
                self.res.skins.remember_missing(&key);
                Ok(Handle::NONE)
            }
        }
    }

    fn register_shader(&mut self, name: &str) -> RefResult<Handle> {
        self.register_shader_impl(name, true)
    }

    fn register_shader_no_mip(&mut self, name: &str) -> RefResult<Handle> {
        self.register_shader_impl(name, false)
    }

    fn load_world(&mut self, name: &str) -> RefResult<()> {
        if !self.registered {
            return Err(self.host.error(
                ErrorLevel::Drop,
                "RE_LoadWorldMap: called before registration",
            ));
        }
        self.load_world_impl(name)
    }

    fn set_world_vis_data(&mut self, vis: Arc<[u8]>) {
        self.vis = Some(vis);
    }

    fn end_registration(&mut self) {
        if !self.registered {
            return;
        }
        log::debug!(
            "Registration done: {} models, {} skins, {} shaders, {} fonts",
            self.res.models.len(),
            self.res.skins.len(),
            self.res.shaders.len(),
            self.res.fonts.len()
        );
    }

    fn clear_scene(&mut self) {
        if self.registered {
            self.scene.clear();
        }
    }

    fn add_entity(&mut self, entity: &RefEntity, int_shader_time: bool) {
        if self.registered {
            self.scene.add_entity(entity, int_shader_time);
        }
    }

    fn add_poly(&mut self, shader: Handle, verts: &[PolyVert], num_polys: usize) {
        if self.registered {
            self.scene.add_polys(shader, verts, num_polys);
        }
    }

    fn light_for_point(&self, point: Vec3) -> Option<LightSample> {
        let cvars = self.cvars.as_ref()?;
        self.world.as_ref()?.light_for_point(
            point,
            cvars.ambient_scale.value(),
            cvars.directed_scale.value(),
        )
    }

    fn add_light(&mut self, origin: Vec3, intensity: f32, r: f32, g: f32, b: f32) {
        if self.registered {
            self.scene.add_light(DynamicLight {
                origin,
                end: origin,
                radius: intensity,
                color: Vec3::new(r, g, b),
                kind: LightKind::Modulated,
            });
        }
    }

    fn add_additive_light(&mut self, origin: Vec3, intensity: f32, r: f32, g: f32, b: f32) {
        if self.registered {
            self.scene.add_light(DynamicLight {
                origin,
                end: origin,
                radius: intensity,
                color: Vec3::new(r, g, b),
                kind: LightKind::Additive,
            });
        }
    }

    fn add_linear_light(&mut self, start: Vec3, end: Vec3, intensity: f32, r: f32, g: f32, b: f32) {
        if self.registered {
            self.scene.add_light(DynamicLight {
                origin: start,
                end,
                radius: intensity,
                color: Vec3::new(r, g, b),
                kind: LightKind::Linear,
            });
        }
    }

    fn render_scene(&mut self, fd: &RefDef) -> RefResult<()> {
        if !self.registered {
            return Ok(());
        }
        let contents = self.scene.take();
        if self.cvars.as_ref().is_some_and(|c| c.norefresh.enabled()) {
            self.scene.finish();
            return Ok(());
        }
        if self.world.is_none() && !fd.rdflags.contains(RdFlags::NO_WORLD_MODEL) {
            self.scene.finish();
            return Err(self.host.error(ErrorLevel::Drop, "R_RenderScene: NULL worldmodel"));
        }
        let watch = Stopwatch::new();
        let command = self.build_view(fd, contents);
        self.push_command(command);
        if let Some(backend) = self.backend.as_mut() {
            backend.front_end.add(watch.elapsed());
        }
        self.scene.finish();
        Ok(())
    }

    fn set_color(&mut self, rgba: Option<[f32; 4]>) {
        if let Some(backend) = self.backend.as_mut() {
            backend.color = rgba.unwrap_or([1.0; 4]);
        }
    }

    fn draw_stretch_pic(&mut self, pic: &StretchPic) {
        if !self.registered {
            return;
        }
        let color = self.color();
        let cinematic = match self.res.resolve_shader(pic.shader) {
            Some((_, Shader {
                image: ShaderImage::Cinematic(handle),
                ..
            })) => Some(*handle),
            _ => None,
        };
        let Some(handle) = cinematic else {
            let shader = self
                .res
                .resolve_shader(pic.shader)
                .map_or(Handle::NONE, |(target, _)| target);
            self.push_command(DrawCommand::StretchPic {
                pic: StretchPic { shader, ..*pic },
                color,
            });
            return;
        };
        let cinematics = self.host.cinematics();
        cinematics.run(handle);
        let client = handle.0 as usize % frame::MAX_VIDEO_HANDLES;
        if let Some(current) = self.host.cinematics().frame(handle) {
            let image = current.image;
            self.upload_scratch(
                RawFrame {
                    cols: image.width,
                    rows: image.height,
                    data: &image.rgba,
                },
                client,
                current.dirty,
            );
        }
        self.push_command(DrawCommand::StretchRaw {
            dest: ScreenRect {
                x: pic.x as i32,
                y: pic.y as i32,
                w: pic.w as i32,
                h: pic.h as i32,
            },
            client,
            color,
        });
    }

    fn draw_stretch_raw(&mut self, dest: ScreenRect, frame: RawFrame<'_>, client: usize, dirty: bool) {
        if !self.registered {
            return;
        }
        self.upload_scratch(frame, client, dirty);
        let color = self.color();
        self.push_command(DrawCommand::StretchRaw { dest, client, color });
    }

    fn upload_cinematic(&mut self, frame: RawFrame<'_>, client: usize, dirty: bool) {
        if self.registered {
            self.upload_scratch(frame, client, dirty);
        }
    }

    fn begin_frame(&mut self, stereo: StereoFrame) -> RefResult<()> {
        if !self.registered {
            return Ok(());
        }
        if self.config.stereo_enabled {
            if stereo == StereoFrame::Center {
                return Err(self.host.error(
                    ErrorLevel::Fatal,
                    "RE_BeginFrame: Stereo is enabled, but stereoFrame was Center",
                ));
            }
        } else if stereo != StereoFrame::Center {
            return Err(self.host.error(
                ErrorLevel::Fatal,
                &format!("RE_BeginFrame: Stereo is disabled, but stereoFrame was {stereo:?}"),
            ));
        }
        if self.frame_open {
            log::debug!("RE_BeginFrame without RE_EndFrame");
        }
        if self.cvars.as_ref().is_some_and(|c| c.gamma.is_modified()) {
            self.set_color_mappings();
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.begin();
        }
        self.stats = FrameStats::default();
        self.frame_open = true;
        self.frame_count += 1;
        Ok(())
    }

    fn end_frame(&mut self, timings: Option<&mut FrameTimings>) -> RefResult<()> {
        if !self.registered {
            return Ok(());
        }
        self.execute_commands();
        let bloom = self.cvars.as_ref().and_then(|c| {
            c.bloom
                .enabled()
                .then(|| (c.bloom_threshold.value(), c.bloom_intensity.value()))
        });
        if let (Some(backend), Some((threshold, intensity))) = (self.backend.as_mut(), bloom) {
            if backend.views_this_frame > 0 && !backend.bloom_done {
                backend.bloom(threshold, intensity);
            }
        }
        if let Some(capture) = self.backend.as_mut().and_then(|b| b.capture.take()) {
            self.capture_video(capture);
        }
        self.drain_console();

        let throttled = self.backend.as_ref().is_some_and(|b| b.throttled);
        let hidden = self.host.client().is_minimized() && !self.can_minimize();
        if !throttled && !hidden {
            self.host.platform().gl_end_frame();
        }

        let (front, back) = self
            .backend
            .as_mut()
            .map_or((0, 0), |b| (b.front_end.take_ms(), b.back_end.take_ms()));
        if let Some(timings) = timings {
            timings.front_end_ms = front;
            timings.back_end_ms = back;
        }
        if self.cvars.as_ref().is_some_and(|c| c.speeds.enabled()) {
            let s = self.stats;
            self.print(
                PrintLevel::All,
                &format!(
                    "{} views {} ents ({} culled, {} bad) {} polys {} dlights, fe {front}ms be {back}ms\n",
                    s.views, s.entities, s.culled, s.bad_models, s.polys, s.lights
                ),
            );
        }
        self.frame_open = false;
        Ok(())
    }

    fn mark_fragments(
        &self,
        points: &[Vec3],
        projection: Vec3,
        max_points: usize,
        point_buffer: &mut [Vec3],
        max_fragments: usize,
        fragment_buffer: &mut [MarkFragment],
    ) -> usize {
        let Some(world) = &self.world else {
            return 0;
        };
        marks::mark_fragments(
            world,
            points,
            projection,
            max_points,
            point_buffer,
            max_fragments,
            fragment_buffer,
        )
    }

    fn lerp_tag(
        &self,
        model: Handle,
        start_frame: i32,
        end_frame: i32,
        frac: f32,
        tag_name: &str,
    ) -> Option<Orientation> {
        let Model::Mesh(mesh) = self.res.models.get(self.res.epoch(), model)? else {
            return None;
        };
        let start = mesh.tag(tag_name, start_frame)?;
        let end = mesh.tag(tag_name, end_frame)?;
        Some(assets::lerp_orientation(&start, &end, frac))
    }

    fn model_bounds(&self, model: Handle) -> Aabb {
        self.res
            .models
            .get(self.res.epoch(), model)
            .map_or(Aabb::ZERO, Model::bounds)
    }

    fn register_font(&mut self, name: &str, point_size: i32) -> RefResult<Handle> {
        if !self.registered {
            return Ok(Handle::NONE);
        }
        let point_size = if point_size <= 0 { DEFAULT_FONT_SIZE } else { point_size };
        let key = assets::font_file_name(point_size).to_ascii_lowercase();
        let epoch = self.res.epoch();
        match self.res.fonts.lookup(epoch, &key) {
            Lookup::Found(handle) => return Ok(handle),
            Lookup::Missing => return Ok(Handle::NONE),
            Lookup::Unknown => {}
        }
        if self.res.fonts.is_full() {
            self.print(PrintLevel::Warning, "RE_RegisterFont: Too many fonts registered already.\n");
            return Ok(Handle::NONE);
        }
        let host = self.host.clone();
        match assets::load_font(host.as_ref(), point_size, &mut |shader| self.register_shader_impl(shader, false))? {
            Some(font) => {
                log::debug!("Registered font {name} at {point_size}pt");
                Ok(self.res.fonts.insert(epoch, &key, font))
            }
            None => {
                self.res.fonts.remember_missing(&key);
                Ok(Handle::NONE)
            }
        }
    }

    fn font_info(&self, font: Handle) -> Option<FontInfo> {
        self.res.fonts.get(self.res.epoch(), font).cloned()
    }

    fn remap_shader(&mut self, old: &str, new: &str, offset_time: Option<f32>) {
        if !self.registered {
            return;
        }
        let Ok(old_handle) = self.register_shader_impl(old, true) else {
            return;
        };
        if old_handle.is_none() {
            self.print(PrintLevel::Warning, &format!("WARNING: R_RemapShader: shader {old} not found\n"));
            return;
        }
        let old_key = registry::strip_extension(&normalize_name(old)).to_owned();
        let new_key = registry::strip_extension(&normalize_name(new)).to_owned();
        if old_key == new_key {
            self.res.epoch.set_remap(&old_key, None);
            return;
        }
        let target = match self.register_shader_impl(new, true) {
            Ok(handle) if handle.is_some() => handle,
            _ => {
                self.print(PrintLevel::Warning, &format!("WARNING: R_RemapShader: new shader {new} not found\n"));
                return;
            }
        };
        self.res.epoch.set_remap(
            &old_key,
            Some(ShaderRemap {
                target,
                time_offset: offset_time.unwrap_or(0.0),
            }),
        );
    }

    fn get_entity_token(&mut self) -> Option<String> {
        self.world.as_mut()?.next_entity_token()
    }

    fn in_pvs(&self, p1: Vec3, p2: Vec3) -> bool {
        let Some(world) = &self.world else {
            return false;
        };
        let (Some(from), Some(to)) = (world.point_cluster(p1), world.point_cluster(p2)) else {
            return false;
        };
        self.host
            .collision()
            .cluster_pvs(from)
            .map_or(true, |row| row.is_visible(to))
    }

    fn take_video_frame(&mut self, width: u32, height: u32, motion_jpeg: bool) {
        if !self.registered {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.capture = Some(VideoCapture {
                width,
                height,
                motion_jpeg,
            });
        }
    }

    fn throttle_backend(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.throttled = true;
        }
    }

    fn finish_bloom(&mut self) {
        let Some((threshold, intensity)) = self.cvars.as_ref().and_then(|c| {
            c.bloom
                .enabled()
                .then(|| (c.bloom_threshold.value(), c.bloom_intensity.value()))
        }) else {
            return;
        };
        self.execute_commands();
        if let Some(backend) = self.backend.as_mut() {
            backend.bloom(threshold, intensity);
        }
    }

    fn set_color_mappings(&mut self) {
        let Some(cvars) = &self.cvars else {
            return;
        };
        let mappings = color_mappings(
            cvars.gamma.value(),
            cvars.intensity.value(),
            cvars.overbright_bits.integer(),
            self.config.device_supports_gamma,
            self.config.is_fullscreen,
        );
        cvars.gamma.clear_modified();
        if self.config.device_supports_gamma {
            self.host.platform().set_gamma(&GammaRamp {
                red: mappings.gamma,
                green: mappings.gamma,
                blue: mappings.gamma,
            });
        }
        self.mappings = Some(mappings);
    }

    fn can_minimize(&self) -> bool {
        self.cvars.as_ref().is_some_and(|c| c.fbo.enabled())
    }

    fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    fn vertex_lighting(&mut self, allowed: bool) {
        self.vertex_light_allowed = allowed;
    }

    fn sync_render(&mut self) {
        self.execute_commands();
        self.drain_console();
    }

    fn frustum(&self) -> [Plane; 4] {
        self.frustum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostConfig, StandardHost};

    fn renderer() -> (tempfile::TempDir, Arc<StandardHost>, ReferenceRenderer) {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = HostConfig {
            search_paths: vec![dir.path().to_path_buf()],
            write_dir: Some(dir.path().to_path_buf()),
            hunk_megs: 8,
            heap_megs: 8,
            ..Default::default()
        };
        let host = Arc::new(StandardHost::new(config).expect("host"));
        let renderer = ReferenceRenderer::new(host.clone(), GraphicsFamily::OpenGl);
        (dir, host, renderer)
    }

    #[test]
    fn construction_touches_no_host_state() {
        let (_dir, host, renderer) = renderer();
        assert!(!host.headless().window_open());
        assert!(!host.command_table().contains("screenshot"));
        assert_eq!(renderer.scene_phase(), ScenePhase::Idle);
    }

    #[test]
    fn registration_brings_up_the_context_and_commands() {
        let (_dir, host, mut renderer) = renderer();
        let config = renderer.begin_registration().expect("registration");
        assert_eq!(config.family, GraphicsFamily::OpenGl);
        assert!(config.vid_width > 0);
        assert!(host.headless().context_active());
        for name in RENDERER_COMMANDS {
            assert!(host.command_table().contains(name), "{name}");
        }
        renderer.shutdown(ShutdownCode::UnloadModule);
        for name in RENDERER_COMMANDS {
            assert!(!host.command_table().contains(name), "{name}");
        }
    }

    #[test]
    fn scene_phase_follows_the_protocol() {
        let (_dir, _host, mut renderer) = renderer();
        renderer.begin_registration().expect("registration");
        renderer.clear_scene();
        assert_eq!(renderer.scene_phase(), ScenePhase::Composing);
        let fd = RefDef {
            width: 64,
            height: 48,
            rdflags: RdFlags::NO_WORLD_MODEL,
            ..Default::default()
        };
        renderer.render_scene(&fd).expect("render");
        assert_eq!(renderer.scene_phase(), ScenePhase::Idle);
    }

    #[test]
    fn console_screenshot_is_written_at_end_of_frame() {
        let (dir, host, mut renderer) = renderer();
        renderer.begin_registration().expect("registration");
        host.command_table().execute_line("screenshot");
        renderer.begin_frame(StereoFrame::Center).expect("begin");
        renderer.end_frame(None).expect("end");
        assert!(dir.path().join("screenshots/shot0000.tga").exists());
    }

    #[test]
    fn screenshot_arguments_are_parsed() {
        let req = |line: &str, format| screenshot_request(&CommandArgs::tokenize(line), format);
        assert_eq!(
            req("screenshot", ScreenshotFormat::Tga),
            ConsoleRequest::Screenshot {
                format: ScreenshotFormat::Tga,
                target: ShotTarget::Numbered,
                silent: false,
                clipboard: false
            }
        );
        assert_eq!(
            req("screenshotJPEG mine.jpg", ScreenshotFormat::Jpeg),
            ConsoleRequest::Screenshot {
                format: ScreenshotFormat::Jpeg,
                target: ShotTarget::Named("mine".into()),
                silent: false,
                clipboard: false
            }
        );
        assert!(matches!(
            req("screenshotBMP clipboard", ScreenshotFormat::Bmp),
            ConsoleRequest::Screenshot { clipboard: true, .. }
        ));
        assert!(matches!(
            req("screenshot clipboard", ScreenshotFormat::Tga),
            ConsoleRequest::Screenshot { target: ShotTarget::Named(_), .. }
        ));
    }
}
