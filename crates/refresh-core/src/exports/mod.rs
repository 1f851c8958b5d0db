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

//! The operation table a renderer module exposes to its host.
//!
//! The host drives the module through four phases:
//!
//! 1. **Registration**: [`begin_registration`] opens a new epoch, the
//!    `register_*` calls resolve names to [`Handle`]s and
//!    [`end_registration`] closes the epoch.
//! 2. **Composition**: [`clear_scene`] starts a scene, the `add_*` calls
//!    accumulate draw requests, [`render_scene`] consumes them.
//! 3. **Frame**: [`begin_frame`] and [`end_frame`] bracket the render calls
//!    of one displayed frame.
//! 4. **Teardown**: [`shutdown`] with a [`ShutdownCode`].
//!
//! [`begin_registration`]: RendererExports::begin_registration
//! [`end_registration`]: RendererExports::end_registration
//! [`clear_scene`]: RendererExports::clear_scene
//! [`render_scene`]: RendererExports::render_scene
//! [`begin_frame`]: RendererExports::begin_frame
//! [`end_frame`]: RendererExports::end_frame
//! [`shutdown`]: RendererExports::shutdown

mod types;

pub use types::*;

use std::sync::Arc;

use crate::error::RefResult;
use crate::handle::Handle;
use crate::math::{Aabb, Plane, Vec3};

/// How much state a shutdown releases. Each level includes everything the
/// lower levels release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShutdownCode {
    /// Scene and resource state only; the graphics context survives.
    KeepContext,
    /// Also the graphics context; the window survives.
    KeepWindow,
    /// Also the window.
    DestroyWindow,
    /// Everything. The host makes no further call on the module.
    UnloadModule,
}

/// Which buffer a frame draws into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StereoFrame {
    /// A single, non-stereo target.
    #[default]
    Center,
    /// The left eye of a stereo pair.
    Left,
    /// The right eye of a stereo pair.
    Right,
}

/// The operation table of a renderer module.
///
/// Operations returning [`RefResult`] may hit the host's fatal-error channel;
/// when they return `Err` the module has stopped doing work and the caller
/// must not continue the current sequence. Every other miss is reported with
/// a sentinel.
pub trait RendererExports: Send {
    /// Releases state according to `code`. Safe from any partial state.
    fn shutdown(&mut self, code: ShutdownCode);

    /// Opens a new registration epoch, initializing the graphics context on
    /// first use. All handles from earlier epochs become invalid.
    fn begin_registration(&mut self) -> RefResult<GraphicsConfig>;

    /// Resolves a model. [`Handle::NONE`] if it cannot be loaded.
    fn register_model(&mut self, name: &str) -> RefResult<Handle>;

    /// Resolves a skin file.
    fn register_skin(&mut self, name: &str) -> RefResult<Handle>;

    /// Resolves a mipmapped shader.
    fn register_shader(&mut self, name: &str) -> RefResult<Handle>;

    /// Resolves a shader without mipmaps, for 2D use.
    fn register_shader_no_mip(&mut self, name: &str) -> RefResult<Handle>;

    /// Loads the world geometry, light grid and entity string.
    fn load_world(&mut self, name: &str) -> RefResult<()>;

    /// Lends the cluster visibility data of the current world.
    fn set_world_vis_data(&mut self, vis: Arc<[u8]>);

    /// Closes the registration epoch.
    fn end_registration(&mut self);

    /// Starts a new scene, discarding anything pending.
    fn clear_scene(&mut self);

    /// Adds an entity to the pending scene.
    fn add_entity(&mut self, entity: &RefEntity, int_shader_time: bool);

    /// Adds `num_polys` polygons of `verts.len() / num_polys` vertices each.
    fn add_poly(&mut self, shader: Handle, verts: &[PolyVert], num_polys: usize);

    /// Samples static lighting at `point`; `None` without a light grid.
    fn light_for_point(&self, point: Vec3) -> Option<LightSample>;

    /// Adds a dynamic light.
    fn add_light(&mut self, origin: Vec3, intensity: f32, r: f32, g: f32, b: f32);

    /// Adds an additive dynamic light.
    fn add_additive_light(&mut self, origin: Vec3, intensity: f32, r: f32, g: f32, b: f32);

    /// Adds a light along the segment `start..end`.
    #[allow(clippy::too_many_arguments)]
    fn add_linear_light(
        &mut self,
        start: Vec3,
        end: Vec3,
        intensity: f32,
        r: f32,
        g: f32,
        b: f32,
    );

    /// Renders the pending scene from `fd` and empties it.
    fn render_scene(&mut self, fd: &RefDef) -> RefResult<()>;

    /// Sets the modulation color of 2D draws; `None` is opaque white.
    fn set_color(&mut self, rgba: Option<[f32; 4]>);

    /// Queues a textured screen-space quad.
    fn draw_stretch_pic(&mut self, pic: &StretchPic);

    /// Uploads `frame` into the scratch image of `client` and draws it.
    fn draw_stretch_raw(&mut self, dest: ScreenRect, frame: RawFrame<'_>, client: usize, dirty: bool);

    /// Uploads `frame` into the scratch image of `client` without drawing.
    fn upload_cinematic(&mut self, frame: RawFrame<'_>, client: usize, dirty: bool);

    /// Starts a frame for `stereo`.
    fn begin_frame(&mut self, stereo: StereoFrame) -> RefResult<()>;

    /// Presents the frame and optionally reports its timings.
    fn end_frame(&mut self, timings: Option<&mut FrameTimings>) -> RefResult<()>;

    /// Clips the polygon `points` projected along `projection` against the
    /// world and writes the resulting fragments. Returns the fragment count.
    ///
    /// At most `max_points` points and `max_fragments` fragments are written
    /// (further bounded by the buffer lengths); the rest is dropped.
    #[allow(clippy::too_many_arguments)]
    fn mark_fragments(
        &self,
        points: &[Vec3],
        projection: Vec3,
        max_points: usize,
        point_buffer: &mut [Vec3],
        max_fragments: usize,
        fragment_buffer: &mut [MarkFragment],
    ) -> usize;

    /// Interpolates the tag `tag_name` of `model` between two frames.
    fn lerp_tag(
        &self,
        model: Handle,
        start_frame: i32,
        end_frame: i32,
        frac: f32,
        tag_name: &str,
    ) -> Option<Orientation>;

    /// Bounds of `model`; a zero box if unknown.
    fn model_bounds(&self, model: Handle) -> Aabb;

    /// Resolves a bitmap font at `point_size` (`<= 0` means 12).
    fn register_font(&mut self, name: &str, point_size: i32) -> RefResult<Handle>;

    /// The glyph table of a registered font.
    fn font_info(&self, font: Handle) -> Option<FontInfo>;

    /// Redirects `old` to `new` for future resolution, with a time offset in
    /// seconds.
    fn remap_shader(&mut self, old: &str, new: &str, offset_time: Option<f32>);

    /// The next token of the world entity string. `None` at the end, after
    /// which parsing starts over.
    fn get_entity_token(&mut self) -> Option<String>;

    /// `true` if `p2` is potentially visible from `p1`.
    fn in_pvs(&self, p1: Vec3, p2: Vec3) -> bool;

    /// Captures the next presented frame for the video writer.
    fn take_video_frame(&mut self, width: u32, height: u32, motion_jpeg: bool);

    /// Waits for the back end to catch up with the front end.
    fn throttle_backend(&mut self);

    /// Runs the bloom pass now instead of at the end of the frame.
    fn finish_bloom(&mut self);

    /// Rebuilds the gamma and overbright tables from the cvars.
    fn set_color_mappings(&mut self);

    /// `true` if rendering may continue while the window is minimized.
    fn can_minimize(&self) -> bool;

    /// The current capabilities snapshot.
    fn config(&self) -> &GraphicsConfig;

    /// Allows or forbids vertex lighting.
    fn vertex_lighting(&mut self, allowed: bool);

    /// Blocks until all queued back-end work is done.
    fn sync_render(&mut self);

    /// Side planes of the last rendered view: left, right, bottom, top.
    fn frustum(&self) -> [Plane; 4];
}
