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

//! The software back end.
//!
//! The front end records [`DrawCommand`]s during a frame; `end_frame` (or
//! `sync_render`) executes them into an RGBA framebuffer. Capture helpers
//! read that framebuffer back for screenshots and video.

use std::io::Cursor;

use image::{ImageFormat, RgbImage};
use refresh_core::exports::{ScreenRect, StretchPic};
use refresh_core::host::HeapBlock;
use refresh_core::utils::timer::SectionTimer;
use refresh_core::Handle;

use super::assets::Texture;

/// Per-client scratch images for cinematics.
pub const MAX_VIDEO_HANDLES: usize = 16;

/// Resolves shader handles to pixels at execution time.
pub trait TextureLookup {
    fn texture(&self, shader: Handle) -> Option<&Texture>;
}

/// One recorded drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// A textured screen rectangle; `shader` NONE draws flat color.
    StretchPic { pic: StretchPic, color: [f32; 4] },
    /// A rectangle showing a client's scratch image.
    StretchRaw { dest: ScreenRect, client: usize, color: [f32; 4] },
    /// A 3D view: clears its viewport and plots projected points.
    View {
        rect: ScreenRect,
        clear: [u8; 4],
        points: Vec<([i32; 2], [u8; 4])>,
    },
}

/// A cinematic frame uploaded for one client.
#[derive(Debug)]
pub struct ScratchImage {
    pub width: u32,
    pub height: u32,
    pixels: HeapBlock,
}

impl ScratchImage {
    pub fn new(width: u32, height: u32, pixels: HeapBlock) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.pixels.as_mut_slice()
    }

    /// Releases the backing heap block.
    pub fn into_block(self) -> HeapBlock {
        self.pixels
    }

    fn sample(&self, s: f32, t: f32) -> [u8; 4] {
        let x = ((s.clamp(0.0, 1.0) * self.width as f32) as u32).min(self.width.saturating_sub(1));
        let y = ((t.clamp(0.0, 1.0) * self.height as f32) as u32).min(self.height.saturating_sub(1));
        let offset = ((y * self.width + x) * 4) as usize;
        let px = &self.pixels.as_slice()[offset..offset + 4];
        [px[0], px[1], px[2], px[3]]
    }
}

/// A queued video capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoCapture {
    pub width: u32,
    pub height: u32,
    pub motion_jpeg: bool,
}

/// The framebuffer and everything executed into it.
#[derive(Debug)]
pub struct Backend {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    commands: Vec<DrawCommand>,
    pub color: [f32; 4],
    pub scratch: Vec<Option<ScratchImage>>,
    pub front_end: SectionTimer,
    pub back_end: SectionTimer,
    pub capture: Option<VideoCapture>,
    pub throttled: bool,
    pub bloom_done: bool,
    pub views_this_frame: usize,
}

fn blend(dst: &mut [u8], src: [u8; 4], color: [f32; 4]) {
    let a = (f32::from(src[3]) / 255.0 * color[3]).clamp(0.0, 1.0);
    for c in 0..3 {
        let s = f32::from(src[c]) * color[c].clamp(0.0, 1.0);
        dst[c] = (s * a + f32::from(dst[c]) * (1.0 - a)).round() as u8;
    }
    dst[3] = 255;
}

impl Backend {
    /// Allocates a black framebuffer of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        let mut pixels = vec![0; (width * height * 4) as usize];
        pixels.chunks_exact_mut(4).for_each(|px| px[3] = 255);
        Self {
            width,
            height,
            pixels,
            commands: Vec::new(),
            color: [1.0; 4],
            scratch: (0..MAX_VIDEO_HANDLES).map(|_| None).collect(),
            front_end: SectionTimer::default(),
            back_end: SectionTimer::default(),
            capture: None,
            throttled: false,
            bloom_done: false,
            views_this_frame: 0,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// RGBA rows, top to bottom.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn push(&mut self, command: DrawCommand) {
        if matches!(command, DrawCommand::View { .. }) {
            self.views_this_frame += 1;
        }
        self.commands.push(command);
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Resets per-frame state at `begin_frame`.
    pub fn begin(&mut self) {
        self.commands.clear();
        self.color = [1.0; 4];
        self.throttled = false;
        self.bloom_done = false;
        self.views_this_frame = 0;
    }

    /// Clips `rect` to the framebuffer; `None` when nothing remains.
    fn clip(&self, x: i32, y: i32, w: i32, h: i32) -> Option<(u32, u32, u32, u32)> {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x.saturating_add(w)).min(self.width as i32);
        let y1 = (y.saturating_add(h)).min(self.height as i32);
        (x1 > x0 && y1 > y0).then(|| (x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    fn fill_rect(&mut self, rect: (i32, i32, i32, i32), mut texel: impl FnMut(f32, f32) -> [u8; 4], color: [f32; 4]) {
        let (x, y, w, h) = rect;
        let Some((x0, y0, x1, y1)) = self.clip(x, y, w, h) else {
            return;
        };
        for py in y0..y1 {
            let v = (py as f32 + 0.5 - y as f32) / h as f32;
            for px in x0..x1 {
                let u = (px as f32 + 0.5 - x as f32) / w as f32;
                let offset = ((py * self.width + px) * 4) as usize;
                blend(&mut self.pixels[offset..offset + 4], texel(u, v), color);
            }
        }
    }

    /// Executes every recorded command, in order.
    pub fn execute(&mut self, textures: &dyn TextureLookup) {
        let commands = std::mem::take(&mut self.commands);
        let mut timer = std::mem::take(&mut self.back_end);
        timer.time(|| {
            for command in commands {
                self.execute_one(command, textures);
            }
        });
        self.back_end = timer;
    }

    fn execute_one(&mut self, command: DrawCommand, textures: &dyn TextureLookup) {
        match command {
            DrawCommand::StretchPic { pic, color } => {
                let rect = (pic.x as i32, pic.y as i32, pic.w as i32, pic.h as i32);
                match textures.texture(pic.shader) {
                    Some(tex) => self.fill_rect(
                        rect,
                        |u, v| tex.sample(pic.s1 + (pic.s2 - pic.s1) * u, pic.t1 + (pic.t2 - pic.t1) * v),
                        color,
                    ),
                    None => self.fill_rect(rect, |_, _| [255; 4], color),
                }
            }
            DrawCommand::StretchRaw { dest, client, color } => {
                let Some(Some(image)) = self.scratch.get_mut(client).map(Option::take) else {
                    return;
                };
                self.fill_rect((dest.x, dest.y, dest.w, dest.h), |u, v| image.sample(u, v), color);
                self.scratch[client] = Some(image);
            }
            DrawCommand::View { rect, clear, points } => {
                self.fill_rect((rect.x, rect.y, rect.w, rect.h), |_, _| clear, [1.0; 4]);
                for ([x, y], rgba) in points {
                    if let Some((px, py, _, _)) = self.clip(x, y, 1, 1) {
                        let offset = ((py * self.width + px) * 4) as usize;
                        self.pixels[offset..offset + 4].copy_from_slice(&rgba);
                    }
                }
            }
        }
    }

    /// Brightens pixels whose luminance exceeds `threshold`.
    pub fn bloom(&mut self, threshold: f32, intensity: f32) {
        for px in self.pixels.chunks_exact_mut(4) {
            let [r, g, b] = [px[0], px[1], px[2]].map(|c| f32::from(c) / 255.0);
            let luma = 0.2126 * r + 0.7152 * g + 0.0722 * b;
            if luma > threshold {
                let boost = 1.0 + intensity * (luma - threshold) / (1.0 - threshold).max(1e-3);
                for c in &mut px[..3] {
                    *c = (f32::from(*c) * boost).min(255.0) as u8;
                }
            }
        }
        self.bloom_done = true;
    }

    /// Reads the framebuffer as packed RGB, resampled to `width`x`height`.
    pub fn read_rgb(&self, width: u32, height: u32, out: &mut [u8]) {
        let row = width as usize * 3;
        for y in 0..height {
            let sy = (u64::from(y) * u64::from(self.height) / u64::from(height.max(1))) as u32;
            for x in 0..width {
                let sx = (u64::from(x) * u64::from(self.width) / u64::from(width.max(1))) as u32;
                let src = ((sy * self.width + sx) * 4) as usize;
                let dst = y as usize * row + x as usize * 3;
                out[dst..dst + 3].copy_from_slice(&self.pixels[src..src + 3]);
            }
        }
    }
}

/// Gamma and intensity lookup tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorMappings {
    pub gamma: [u8; 256],
    pub intensity: [u8; 256],
    pub overbright_bits: u32,
}

/// Builds the gamma ramp for `gamma` with `overbright_bits` of shift, and the
/// texture intensity table. Overbright needs hardware gamma and fullscreen.
pub fn color_mappings(
    gamma: f32,
    intensity: f32,
    overbright_bits: i32,
    device_supports_gamma: bool,
    fullscreen: bool,
) -> ColorMappings {
    let shift = if device_supports_gamma && fullscreen {
        overbright_bits.clamp(0, 1) as u32
    } else {
        0
    };
    let g = gamma.clamp(0.5, 3.0);
    let mut mappings = ColorMappings {
        gamma: [0; 256],
        intensity: [0; 256],
        overbright_bits: shift,
    };
    for i in 0..256usize {
        let v = if g == 1.0 {
            i as f32
        } else {
            255.0 * (i as f32 / 255.0).powf(1.0 / g) + 0.5
        };
        mappings.gamma[i] = ((v as u32) << shift).min(255) as u8;
        mappings.intensity[i] = (i as f32 * intensity.max(1.0)).min(255.0) as u8;
    }
    mappings
}

/// Image encodings for screenshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotFormat {
    Tga,
    Jpeg,
    Bmp,
}

impl ScreenshotFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ScreenshotFormat::Tga => "tga",
            ScreenshotFormat::Jpeg => "jpg",
            ScreenshotFormat::Bmp => "bmp",
        }
    }
}

/// Encodes packed RGB as TGA or BMP.
pub fn encode_rgb(rgb: &[u8], width: u32, height: u32, format: ImageFormat) -> Result<Vec<u8>, image::ImageError> {
    let image = RgbImage::from_raw(width, height, rgb.to_vec()).ok_or_else(|| {
        image::ImageError::Parameter(image::error::ParameterError::from_kind(
            image::error::ParameterErrorKind::DimensionMismatch,
        ))
    })?;
    let mut out = Vec::new();
    image.write_to(&mut Cursor::new(&mut out), format)?;
    Ok(out)
}

/// Size of the BMP file header dropped for clipboard bitmaps.
pub const BMP_FILE_HEADER: usize = 14;

/// Converts top-down RGB to the bottom-up BGR with 4-byte aligned rows that
/// uncompressed AVI frames use.
pub fn avi_frame(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let row = width as usize * 3;
    let padded = (row + 3) & !3;
    let mut out = vec![0; padded * height as usize];
    for y in 0..height as usize {
        let src = &rgb[y * row..(y + 1) * row];
        let dst_row = height as usize - 1 - y;
        let dst = &mut out[dst_row * padded..dst_row * padded + row];
        for (d, s) in dst.chunks_exact_mut(3).zip(src.chunks_exact(3)) {
            d.copy_from_slice(&[s[2], s[1], s[0]]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoTextures;
    impl TextureLookup for NoTextures {
        fn texture(&self, _: Handle) -> Option<&Texture> {
            None
        }
    }

    fn pixel(backend: &Backend, x: u32, y: u32) -> [u8; 4] {
        let (w, _) = backend.size();
        let o = ((y * w + x) * 4) as usize;
        let p = &backend.pixels()[o..o + 4];
        [p[0], p[1], p[2], p[3]]
    }

    #[test]
    fn stretch_pic_without_shader_fills_with_the_color() {
        let mut backend = Backend::new(8, 8);
        backend.push(DrawCommand::StretchPic {
            pic: StretchPic {
                x: 2.0,
                y: 2.0,
                w: 4.0,
                h: 4.0,
                ..Default::default()
            },
            color: [1.0, 0.0, 0.0, 1.0],
        });
        backend.execute(&NoTextures);
        assert_eq!(pixel(&backend, 3, 3), [255, 0, 0, 255]);
        assert_eq!(pixel(&backend, 0, 0), [0, 0, 0, 255]);
        assert_eq!(backend.pending_commands(), 0);
    }

    #[test]
    fn rectangles_are_clipped_to_the_framebuffer() {
        let mut backend = Backend::new(4, 4);
        backend.push(DrawCommand::StretchPic {
            pic: StretchPic {
                x: -10.0,
                y: 2.0,
                w: 100.0,
                h: 100.0,
                ..Default::default()
            },
            color: [1.0; 4],
        });
        backend.execute(&NoTextures);
        assert_eq!(pixel(&backend, 3, 3), [255; 4]);
        assert_eq!(pixel(&backend, 3, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn view_clears_and_plots_points() {
        let mut backend = Backend::new(4, 4);
        backend.push(DrawCommand::View {
            rect: ScreenRect { x: 0, y: 0, w: 4, h: 4 },
            clear: [10, 10, 10, 255],
            points: vec![([1, 1], [0, 255, 0, 255]), ([9, 9], [1, 1, 1, 1])],
        });
        assert_eq!(backend.views_this_frame, 1);
        backend.execute(&NoTextures);
        assert_eq!(pixel(&backend, 1, 1), [0, 255, 0, 255]);
        assert_eq!(pixel(&backend, 2, 2), [10, 10, 10, 255]);
    }

    #[test]
    fn gamma_ramp_is_identity_at_one_without_overbright() {
        let m = color_mappings(1.0, 1.0, 1, true, false);
        assert_eq!(m.overbright_bits, 0);
        assert!(m.gamma.iter().enumerate().all(|(i, &v)| v as usize == i));
        let bright = color_mappings(1.0, 2.0, 1, true, true);
        assert_eq!(bright.overbright_bits, 1);
        assert_eq!(bright.gamma[100], 200);
        assert_eq!(bright.gamma[200], 255);
        assert_eq!(bright.intensity[100], 200);
    }

    #[test]
    fn avi_frames_are_bottom_up_bgr_with_padded_rows() {
        let rgb = [1, 2, 3, 4, 5, 6];
        let out = avi_frame(&rgb, 1, 2);
        assert_eq!(out, vec![6, 5, 4, 0, 3, 2, 1, 0]);
    }

    #[test]
    fn read_rgb_resamples() {
        let mut backend = Backend::new(4, 4);
        backend.push(DrawCommand::StretchPic {
            pic: StretchPic {
                x: 0.0,
                y: 0.0,
                w: 2.0,
                h: 4.0,
                ..Default::default()
            },
            color: [1.0; 4],
        });
        backend.execute(&NoTextures);
        let mut out = vec![0; 2 * 2 * 3];
        backend.read_rgb(2, 2, &mut out);
        assert_eq!(out, vec![255, 255, 255, 0, 0, 0, 255, 255, 255, 0, 0, 0]);
    }

    #[test]
    fn rgb_encodes_to_bmp_and_tga() {
        let rgb = vec![0u8; 2 * 2 * 3];
        let bmp = encode_rgb(&rgb, 2, 2, ImageFormat::Bmp).expect("bmp");
        assert_eq!(&bmp[..2], b"BM");
        assert!(bmp.len() > BMP_FILE_HEADER);
        assert!(encode_rgb(&rgb, 2, 2, ImageFormat::Tga).is_ok());
        assert!(encode_rgb(&rgb, 3, 2, ImageFormat::Tga).is_err());
    }
}
