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

//! Loading of models, skins, shader images and fonts through the host.
//!
//! Models are JSON manifests (`<name>` or `<stem>.json`) carrying per-frame
//! bounds and attachment tags. Shader images are looked up as `.tga`, `.jpg`
//! and `.bmp`; JPEG goes through the host codec, the rest through `image`.
//! Anything under `video/` is played as a looping cinematic.

use image::ImageFormat;
use refresh_core::exports::{FontInfo, GlyphInfo, Orientation, GLYPHS_PER_FONT};
use refresh_core::host::{
    CinematicFlags, CinematicHandle, DecodedImage, HunkBlock, HunkPreference,
};
use refresh_core::math::{Aabb, Axis, Vec3};
use refresh_core::{ErrorLevel, Handle, HostServices, RefResult};
use serde::Deserialize;

use super::registry::strip_extension;

/// Most surfaces a skin may map.
pub const MAX_SKIN_SURFACES: usize = 256;

/// Copies `bytes` into a level-lifetime block of the host arena. Running out
/// of arena is a `Drop` error.
pub fn hunk_copy(host: &dyn HostServices, what: &str, bytes: &[u8]) -> RefResult<HunkBlock> {
    match host.hunk().alloc(bytes.len(), HunkPreference::Low) {
        Ok(mut block) => {
            block.as_mut_slice().copy_from_slice(bytes);
            Ok(block)
        }
        Err(err) => Err(host.error(
            ErrorLevel::Drop,
            &format!("Hunk_Alloc failed for {what}: {err}"),
        )),
    }
}

// --- models -----------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ManifestFrame {
    bounds: Aabb,
    #[serde(default)]
    radius: f32,
}

#[derive(Debug, Deserialize)]
struct ManifestTag {
    name: String,
    frames: Vec<Orientation>,
}

#[derive(Debug, Deserialize)]
struct ManifestSurface {
    name: String,
    #[serde(default)]
    shader: String,
}

#[derive(Debug, Deserialize)]
struct ModelManifest {
    frames: Vec<ManifestFrame>,
    #[serde(default)]
    tags: Vec<ManifestTag>,
    #[serde(default)]
    surfaces: Vec<ManifestSurface>,
}

/// One animation frame of a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshFrame {
    pub bounds: Aabb,
    pub radius: f32,
}

/// An animated mesh.
#[derive(Debug)]
pub struct MeshModel {
    pub frames: Vec<MeshFrame>,
    pub tags: Vec<(String, Vec<Orientation>)>,
    pub surfaces: Vec<(String, Handle)>,
    _storage: HunkBlock,
}

impl MeshModel {
    fn clamp_frame(&self, frame: i32) -> usize {
        usize::try_from(frame)
            .unwrap_or(0)
            .min(self.frames.len().saturating_sub(1))
    }

    /// Bounds of `frame`, clamped to the animation.
    pub fn frame(&self, frame: i32) -> Option<&MeshFrame> {
        self.frames.get(self.clamp_frame(frame))
    }

    /// The tag `name` at `frame`, clamped to the animation.
    pub fn tag(&self, name: &str, frame: i32) -> Option<Orientation> {
        let frame = self.clamp_frame(frame);
        self.tags
            .iter()
            .find(|(tag, _)| tag.eq_ignore_ascii_case(name))
            .and_then(|(_, frames)| frames.get(frame).or_else(|| frames.last()))
            .copied()
    }
}

/// What a model handle refers to.
#[derive(Debug)]
pub enum Model {
    /// A loaded mesh.
    Mesh(MeshModel),
    /// An inline model of the world (`*N`).
    Brush { submodel: usize, bounds: Aabb },
}

impl Model {
    /// Frame-0 bounds for meshes, the submodel box for brushes.
    pub fn bounds(&self) -> Aabb {
        match self {
            Model::Mesh(mesh) => mesh.frame(0).map_or(Aabb::ZERO, |f| f.bounds),
            Model::Brush { bounds, .. } => *bounds,
        }
    }

    /// Culling radius at `frame`.
    pub fn radius(&self, frame: i32) -> f32 {
        match self {
            Model::Mesh(mesh) => mesh.frame(frame).map_or(0.0, |f| {
                if f.radius > 0.0 {
                    f.radius
                } else {
                    f.bounds.min.length().max(f.bounds.max.length())
                }
            }),
            Model::Brush { bounds, .. } => bounds.min.length().max(bounds.max.length()),
        }
    }
}

/// Loads the mesh manifest for `name`. Returns `Ok(None)` when no readable
/// manifest exists; surface shaders are registered through `register_shader`.
pub fn load_model(
    host: &dyn HostServices,
    name: &str,
    register_shader: &mut dyn FnMut(&str) -> RefResult<Handle>,
) -> RefResult<Option<Model>> {
    let manifest_name = format!("{}.json", strip_extension(name));
    let Some(file) = host
        .fs()
        .read_file(name)
        .or_else(|| host.fs().read_file(&manifest_name))
    else {
        return Ok(None);
    };
    let manifest: ModelManifest = match serde_json::from_slice(&file) {
        Ok(manifest) => manifest,
        Err(err) => {
            log::warn!("R_RegisterModel: {} is not a valid model: {err}", file.name());
            return Ok(None);
        }
    };
    if manifest.frames.is_empty() {
        log::warn!("R_RegisterModel: {} has no frames", file.name());
        return Ok(None);
    }
    let storage = hunk_copy(host, name, &file)?;
    let mut surfaces = Vec::with_capacity(manifest.surfaces.len());
    for surface in manifest.surfaces {
        let shader = if surface.shader.is_empty() {
            Handle::NONE
        } else {
            register_shader(&surface.shader)?
        };
        surfaces.push((surface.name.to_ascii_lowercase(), shader));
    }
    Ok(Some(Model::Mesh(MeshModel {
        frames: manifest
            .frames
            .into_iter()
            .map(|f| MeshFrame {
                bounds: f.bounds,
                radius: f.radius,
            })
            .collect(),
        tags: manifest.tags.into_iter().map(|t| (t.name, t.frames)).collect(),
        surfaces,
        _storage: storage,
    })))
}

// --- skins ------------------------------------------------------------------

/// A surface-name to shader table.
#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    pub surfaces: Vec<(String, Handle)>,
}

impl Skin {
    /// The shader mapped to `surface`; an empty surface name matches all.
    pub fn shader_for(&self, surface: &str) -> Option<Handle> {
        self.surfaces
            .iter()
            .find(|(name, _)| name.is_empty() || name.eq_ignore_ascii_case(surface))
            .map(|(_, shader)| *shader)
    }
}

/// Parses `surface,shader` lines. Tag lines and malformed lines are skipped.
pub fn parse_skin(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let line = line.split("//").next().unwrap_or_default();
            let (surface, shader) = line.split_once(',')?;
            let surface = surface.trim().trim_matches('"').to_ascii_lowercase();
            let shader = shader.trim().trim_matches('"');
            (!surface.is_empty() && !surface.starts_with("tag_")).then(|| (surface, shader.to_owned()))
        })
        .take(MAX_SKIN_SURFACES)
        .collect()
}

/// Loads the skin `name`. A name without the `.skin` extension is a single
/// shader applied to every surface.
pub fn load_skin(
    host: &dyn HostServices,
    name: &str,
    register_shader: &mut dyn FnMut(&str) -> RefResult<Handle>,
) -> RefResult<Option<Skin>> {
    if !name.ends_with(".skin") {
        let shader = register_shader(name)?;
        return Ok(Some(Skin {
            surfaces: vec![(String::new(), shader)],
        }));
    }
    let Some(file) = host.fs().read_file(name) else {
        return Ok(None);
    };
    let Some(text) = file.as_text() else {
        log::warn!("RE_RegisterSkin: {name} is not text");
        return Ok(None);
    };
    let mut surfaces = Vec::new();
    for (surface, shader) in parse_skin(text) {
        surfaces.push((surface, register_shader(&shader)?));
    }
    Ok((!surfaces.is_empty()).then_some(Skin { surfaces }))
}

// --- shaders ----------------------------------------------------------------

/// An RGBA8 texture stored in the host arena.
#[derive(Debug)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pixels: HunkBlock,
}

impl Texture {
    /// Nearest sample with wrapping coordinates.
    pub fn sample(&self, s: f32, t: f32) -> [u8; 4] {
        let wrap = |v: f32, size: u32| {
            let f = v - v.floor();
            ((f * size as f32) as u32).min(size.saturating_sub(1))
        };
        let x = wrap(s, self.width);
        let y = wrap(t, self.height);
        let offset = ((y * self.width + x) * 4) as usize;
        let px = &self.pixels.as_slice()[offset..offset + 4];
        [px[0], px[1], px[2], px[3]]
    }

    /// Raw RGBA rows.
    pub fn pixels(&self) -> &[u8] {
        self.pixels.as_slice()
    }
}

/// Where a shader's colors come from.
#[derive(Debug)]
pub enum ShaderImage {
    /// A flat color.
    Solid([u8; 4]),
    /// A loaded picture.
    Texture(Texture),
    /// A cinematic stream, sampled at draw time.
    Cinematic(CinematicHandle),
}

/// A registered shader.
#[derive(Debug)]
pub struct Shader {
    pub mip: bool,
    pub image: ShaderImage,
}

/// Halves `image` `levels` times by nearest sampling.
fn reduce(image: DecodedImage, levels: u32) -> DecodedImage {
    let step = 1u32 << levels.min(16);
    if step == 1 {
        return image;
    }
    let width = (image.width / step).max(1);
    let height = (image.height / step).max(1);
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let sx = (x * step).min(image.width - 1);
            let sy = (y * step).min(image.height - 1);
            let offset = ((sy * image.width + sx) * 4) as usize;
            rgba.extend_from_slice(&image.rgba[offset..offset + 4]);
        }
    }
    DecodedImage { width, height, rgba }
}

fn decode_with_image(bytes: &[u8], format: ImageFormat) -> Option<DecodedImage> {
    match image::load_from_memory_with_format(bytes, format) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            Some(DecodedImage {
                width: rgba.width(),
                height: rgba.height(),
                rgba: rgba.into_raw(),
            })
        }
        Err(err) => {
            log::warn!("Image decode failed: {err}");
            None
        }
    }
}

fn find_image(host: &dyn HostServices, stem: &str) -> Option<DecodedImage> {
    let tga = format!("{stem}.tga");
    if let Some(file) = host.fs().read_file(&tga) {
        return decode_with_image(&file, ImageFormat::Tga);
    }
    if let Some(img) = host.images().load_jpeg(&format!("{stem}.jpg")) {
        return Some(img);
    }
    let bmp = format!("{stem}.bmp");
    host.fs()
        .read_file(&bmp)
        .and_then(|file| decode_with_image(&file, ImageFormat::Bmp))
}

/// Loads the shader `key` (normalized, extension stripped). Returns
/// `Ok(None)` when no image backs it.
pub fn load_shader(
    host: &dyn HostServices,
    key: &str,
    mip: bool,
    picmip: u32,
    screen: (u32, u32),
) -> RefResult<Option<Shader>> {
    if key == "white" || key == "<white>" || key == "*white" {
        return Ok(Some(Shader {
            mip,
            image: ShaderImage::Solid([255; 4]),
        }));
    }
    if key.starts_with("video/") {
        let rect = [0, 0, screen.0 as i32, screen.1 as i32];
        let flags = CinematicFlags::SHADER | CinematicFlags::LOOP | CinematicFlags::SILENT;
        return Ok(host.cinematics().play(key, rect, flags).map(|handle| Shader {
            mip,
            image: ShaderImage::Cinematic(handle),
        }));
    }
    let Some(image) = find_image(host, key) else {
        return Ok(None);
    };
    let image = if mip { reduce(image, picmip) } else { image };
    let pixels = hunk_copy(host, key, &image.rgba)?;
    Ok(Some(Shader {
        mip,
        image: ShaderImage::Texture(Texture {
            width: image.width,
            height: image.height,
            pixels,
        }),
    }))
}

// --- fonts ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FontFile {
    #[serde(default = "default_glyph_scale")]
    glyph_scale: f32,
    glyphs: Vec<GlyphInfo>,
}

fn default_glyph_scale() -> f32 {
    1.0
}

/// Path of the prerendered font image for `point_size`.
pub fn font_file_name(point_size: i32) -> String {
    format!("fonts/fontImage_{point_size}.dat")
}

/// Loads the prerendered font for `point_size`, registering one shader per
/// distinct glyph page.
pub fn load_font(
    host: &dyn HostServices,
    point_size: i32,
    register_shader: &mut dyn FnMut(&str) -> RefResult<Handle>,
) -> RefResult<Option<FontInfo>> {
    let path = font_file_name(point_size);
    let Some(file) = host.fs().read_file(&path) else {
        log::warn!("RE_RegisterFont: {path} not found");
        return Ok(None);
    };
    let parsed: FontFile = match serde_json::from_slice(&file) {
        Ok(parsed) => parsed,
        Err(err) => {
            log::warn!("RE_RegisterFont: {path} is corrupt: {err}");
            return Ok(None);
        }
    };
    let mut glyphs = parsed.glyphs;
    glyphs.resize(GLYPHS_PER_FONT, GlyphInfo::default());
    for glyph in &mut glyphs {
        if !glyph.shader_name.is_empty() {
            glyph.glyph = register_shader(&glyph.shader_name)?;
        }
    }
    Ok(Some(FontInfo {
        name: path,
        point_size,
        glyph_scale: parsed.glyph_scale,
        glyphs,
    }))
}

/// Interpolates two tag orientations. The axes are renormalized.
pub fn lerp_orientation(start: &Orientation, end: &Orientation, frac: f32) -> Orientation {
    let back = 1.0 - frac;
    let mix = |a: Vec3, b: Vec3| a * back + b * frac;
    Orientation {
        origin: mix(start.origin, end.origin),
        axis: Axis([
            mix(start.axis.0[0], end.axis.0[0]).normalize(),
            mix(start.axis.0[1], end.axis.0[1]).normalize(),
            mix(start.axis.0[2], end.axis.0[2]).normalize(),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skin_lines_skip_tags_and_garbage() {
        let text = "h_head,models/players/sarge/head\ntag_head,\nbroken line\nu_torso , models/players/sarge/torso // comment\n";
        assert_eq!(
            parse_skin(text),
            vec![
                ("h_head".to_owned(), "models/players/sarge/head".to_owned()),
                ("u_torso".to_owned(), "models/players/sarge/torso".to_owned()),
            ]
        );
    }

    #[test]
    fn reduce_halves_dimensions_per_level() {
        let image = DecodedImage {
            width: 4,
            height: 2,
            rgba: (0..32).collect(),
        };
        let out = reduce(image, 1);
        assert_eq!((out.width, out.height), (2, 1));
        assert_eq!(out.rgba, vec![0, 1, 2, 3, 8, 9, 10, 11]);
    }

    #[test]
    fn lerp_orientation_blends_origins() {
        let start = Orientation {
            origin: Vec3::ZERO,
            axis: Axis::IDENTITY,
        };
        let end = Orientation {
            origin: Vec3::new(10.0, 0.0, 0.0),
            axis: Axis::IDENTITY,
        };
        let mid = lerp_orientation(&start, &end, 0.25);
        assert_eq!(mid.origin, Vec3::new(2.5, 0.0, 0.0));
        assert_eq!(mid.axis, Axis::IDENTITY);
    }
}
