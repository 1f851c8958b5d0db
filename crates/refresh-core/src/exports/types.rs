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

//! Plain data passed through the operation table.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::handle::Handle;
use crate::math::{Axis, Vec3};
use crate::refresh_bitflags;

/// The graphics API family a renderer drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsFamily {
    /// Immediate-mode API with a current context.
    #[default]
    OpenGl,
    /// Explicit API with instances and surfaces.
    Vulkan,
}

/// How the driver was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DriverType {
    /// Installable client driver.
    #[default]
    Icd,
    /// A standalone driver library.
    Standalone,
    /// Software rasterizer.
    Software,
}

/// Texture compression support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextureCompression {
    /// None available.
    #[default]
    None,
    /// S3TC (DXT) formats.
    S3tc,
}

/// Snapshot of display and driver capabilities.
///
/// Returned by [`begin_registration`](super::RendererExports::begin_registration)
/// and read-only for the host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// Renderer name reported by the driver.
    pub renderer_string: String,
    /// Vendor name.
    pub vendor_string: String,
    /// Driver version.
    pub version_string: String,
    /// Space separated extension names.
    pub extensions_string: String,
    /// API family.
    pub family: GraphicsFamily,
    /// Largest texture edge in pixels.
    pub max_texture_size: u32,
    /// Number of texture units.
    pub num_texture_units: u32,
    /// Bits per color sample.
    pub color_bits: u8,
    /// Depth buffer bits.
    pub depth_bits: u8,
    /// Stencil buffer bits.
    pub stencil_bits: u8,
    /// Driver kind.
    pub driver_type: DriverType,
    /// Hardware gamma ramps are supported.
    pub device_supports_gamma: bool,
    /// Texture compression support.
    pub texture_compression: TextureCompression,
    /// Additive texture environment is available.
    pub texture_env_add_available: bool,
    /// Render width in pixels.
    pub vid_width: u32,
    /// Render height in pixels.
    pub vid_height: u32,
    /// Width over height of the window.
    pub window_aspect: f32,
    /// Refresh rate in Hz, `0` if unknown.
    pub display_frequency: u32,
    /// The window covers the screen.
    pub is_fullscreen: bool,
    /// A stereo pixel format was obtained.
    pub stereo_enabled: bool,
}

/// What an entity draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefEntityType {
    /// A registered model.
    #[default]
    Model,
    /// Polygons supplied elsewhere.
    Poly,
    /// A camera-facing quad.
    Sprite,
    /// A beam between `origin` and `old_origin`.
    Beam,
    /// The core of a rail trail.
    RailCore,
    /// The rings of a rail trail.
    RailRings,
    /// A lightning bolt.
    Lightning,
    /// Marks the view of a portal surface.
    PortalSurface,
}

refresh_bitflags! {
    /// Per-entity rendering effects.
    pub struct RenderFx: u32 {
        /// Always have some light.
        const MINLIGHT = 1 << 0;
        /// Don't draw through eyes, only mirrors.
        const THIRD_PERSON = 1 << 1;
        /// Only draw through eyes.
        const FIRST_PERSON = 1 << 2;
        /// Hack the depth range so the entity never pokes into walls.
        const DEPTHHACK = 1 << 3;
        /// Don't cast a shadow.
        const NOSHADOW = 1 << 6;
        /// Use `lighting_origin` instead of `origin` for lighting.
        const LIGHTING_ORIGIN = 1 << 7;
        /// Use `shadow_plane` for the projected shadow.
        const SHADOW_PLANE = 1 << 8;
        /// Wrap frame numbers past the end of the animation.
        const WRAP_FRAMES = 1 << 9;
    }
}

/// One entity submitted with [`add_entity`](super::RendererExports::add_entity).
#[derive(Debug, Clone, PartialEq)]
pub struct RefEntity {
    /// What to draw.
    pub re_type: RefEntityType,
    /// Effects.
    pub renderfx: RenderFx,
    /// The model, for model entities.
    pub model: Handle,
    /// Light sampling point when `LIGHTING_ORIGIN` is set.
    pub lighting_origin: Vec3,
    /// Height of the projected shadow plane.
    pub shadow_plane: f32,
    /// Orientation.
    pub axis: Axis,
    /// `axis` contains scaling.
    pub non_normalized_axes: bool,
    /// Position in world space.
    pub origin: Vec3,
    /// Current animation frame.
    pub frame: i32,
    /// Previous position, for interpolation and beams.
    pub old_origin: Vec3,
    /// Previous animation frame.
    pub old_frame: i32,
    /// `0.0` is the current frame, `1.0` the previous one.
    pub backlerp: f32,
    /// Index into the model's default skins.
    pub skin_num: i32,
    /// Overrides the model skins.
    pub custom_skin: Handle,
    /// Overrides every surface shader.
    pub custom_shader: Handle,
    /// Color passed to the shader.
    pub shader_rgba: [u8; 4],
    /// Texture coordinate offset passed to the shader.
    pub shader_texcoord: [f32; 2],
    /// Shader time offset, in seconds.
    pub shader_time: f32,
    /// Sprite radius.
    pub radius: f32,
    /// Sprite rotation in degrees.
    pub rotation: f32,
}

impl Default for RefEntity {
    fn default() -> Self {
        Self {
            re_type: RefEntityType::Model,
            renderfx: RenderFx::EMPTY,
            model: Handle::NONE,
            lighting_origin: Vec3::ZERO,
            shadow_plane: 0.0,
            axis: Axis::IDENTITY,
            non_normalized_axes: false,
            origin: Vec3::ZERO,
            frame: 0,
            old_origin: Vec3::ZERO,
            old_frame: 0,
            backlerp: 0.0,
            skin_num: 0,
            custom_skin: Handle::NONE,
            custom_shader: Handle::NONE,
            shader_rgba: [255; 4],
            shader_texcoord: [0.0; 2],
            shader_time: 0.0,
            radius: 0.0,
            rotation: 0.0,
        }
    }
}

/// A polygon vertex as laid out on the wire.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PolyVert {
    /// Position.
    pub xyz: [f32; 3],
    /// Texture coordinates.
    pub st: [f32; 2],
    /// Vertex color.
    pub modulate: [u8; 4],
}

refresh_bitflags! {
    /// Flags of a view.
    pub struct RdFlags: u32 {
        /// Used for player configuration screens: no world is drawn.
        const NO_WORLD_MODEL = 1 << 0;
        /// Teleportation effect.
        const HYPERSPACE = 1 << 2;
    }
}

/// Size of the area visibility mask.
pub const MAX_MAP_AREA_BYTES: usize = 32;

/// Describes one view to render.
#[derive(Debug, Clone, PartialEq)]
pub struct RefDef {
    /// Viewport left edge in pixels.
    pub x: i32,
    /// Viewport top edge in pixels.
    pub y: i32,
    /// Viewport width.
    pub width: i32,
    /// Viewport height.
    pub height: i32,
    /// Horizontal field of view in degrees.
    pub fov_x: f32,
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    /// Eye position.
    pub vieworg: Vec3,
    /// Eye orientation.
    pub viewaxis: Axis,
    /// Game time in milliseconds, the only time shaders animate with.
    pub time: i32,
    /// View flags.
    pub rdflags: RdFlags,
    /// One bit per area; a set bit hides the area.
    pub areamask: [u8; MAX_MAP_AREA_BYTES],
}

impl Default for RefDef {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            fov_x: 90.0,
            fov_y: 73.74,
            vieworg: Vec3::ZERO,
            viewaxis: Axis::IDENTITY,
            time: 0,
            rdflags: RdFlags::EMPTY,
            areamask: [0; MAX_MAP_AREA_BYTES],
        }
    }
}

/// Static lighting sampled at a point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightSample {
    /// Non-directional light, `0..=255` per channel.
    pub ambient: Vec3,
    /// Directional light, `0..=255` per channel.
    pub directed: Vec3,
    /// Unit vector pointing toward the light.
    pub direction: Vec3,
}

/// A run of points in the output buffer of
/// [`mark_fragments`](super::RendererExports::mark_fragments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarkFragment {
    /// Index of the first point.
    pub first_point: usize,
    /// Number of points.
    pub num_points: usize,
}

/// A position and orientation, e.g. of a model tag.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    /// Position.
    pub origin: Vec3,
    /// Rotation.
    pub axis: Axis,
}

/// Number of glyphs in a font.
pub const GLYPHS_PER_FONT: usize = 256;

/// One glyph of a registered font.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlyphInfo {
    /// Glyph height in pixels.
    pub height: i32,
    /// Distance from the baseline to the top.
    pub top: i32,
    /// Distance from the baseline to the bottom.
    pub bottom: i32,
    /// Bitmap width.
    pub pitch: i32,
    /// Horizontal advance.
    pub x_skip: i32,
    /// Width of the glyph image.
    pub image_width: i32,
    /// Height of the glyph image.
    pub image_height: i32,
    /// Left texture coordinate.
    pub s: f32,
    /// Top texture coordinate.
    pub t: f32,
    /// Right texture coordinate.
    pub s2: f32,
    /// Bottom texture coordinate.
    pub t2: f32,
    /// The shader holding the glyph page, filled in on registration.
    #[serde(skip)]
    pub glyph: Handle,
    /// Name of the glyph page shader.
    pub shader_name: String,
}

/// A registered bitmap font.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FontInfo {
    /// Name of the font file it was loaded from.
    pub name: String,
    /// Point size actually used.
    pub point_size: i32,
    /// Scale from the loaded size to the requested one.
    pub glyph_scale: f32,
    /// Glyph table indexed by character code.
    pub glyphs: Vec<GlyphInfo>,
}

/// Screen-space rectangle of a 2D draw.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StretchPic {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
    /// Left texture coordinate.
    pub s1: f32,
    /// Top texture coordinate.
    pub t1: f32,
    /// Right texture coordinate.
    pub s2: f32,
    /// Bottom texture coordinate.
    pub t2: f32,
    /// Shader; [`Handle::NONE`] draws solid color.
    pub shader: Handle,
}

/// A raw RGBA frame supplied by the host, e.g. a cinematic.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    /// Columns in pixels.
    pub cols: u32,
    /// Rows in pixels.
    pub rows: u32,
    /// `cols * rows * 4` bytes.
    pub data: &'a [u8],
}

/// Integer screen rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub w: i32,
    /// Height.
    pub h: i32,
}

/// Split timings reported by [`end_frame`](super::RendererExports::end_frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTimings {
    /// Milliseconds spent building draw lists.
    pub front_end_ms: u32,
    /// Milliseconds spent executing them.
    pub back_end_ms: u32,
}
