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

//! Console variables owned by the reference renderer.

use std::sync::Arc;

use refresh_core::host::{ConsoleVars, Cvar, CvarFlags, CvarGroup, CvarValidator};

/// Smallest accepted `r_maxpolys`.
pub const MIN_POLYS: i32 = 600;
/// Smallest accepted `r_maxpolyverts`.
pub const MIN_POLY_VERTS: i32 = 3000;

/// Handles to every renderer cvar, fetched once at init.
#[derive(Debug, Clone)]
pub struct RendererCvars {
    pub gamma: Arc<Cvar>,
    pub intensity: Arc<Cvar>,
    pub overbright_bits: Arc<Cvar>,
    pub map_overbright_bits: Arc<Cvar>,
    pub ambient_scale: Arc<Cvar>,
    pub directed_scale: Arc<Cvar>,
    pub max_polys: Arc<Cvar>,
    pub max_poly_verts: Arc<Cvar>,
    pub fbo: Arc<Cvar>,
    pub picmip: Arc<Cvar>,
    pub vertex_light: Arc<Cvar>,
    pub stereo: Arc<Cvar>,
    pub bloom: Arc<Cvar>,
    pub bloom_threshold: Arc<Cvar>,
    pub bloom_intensity: Arc<Cvar>,
    pub debug_surface: Arc<Cvar>,
    pub norefresh: Arc<Cvar>,
    pub speeds: Arc<Cvar>,
    pub screenshot_jpeg_quality: Arc<Cvar>,
}

struct Registrar<'a> {
    cvars: &'a dyn ConsoleVars,
}

impl Registrar<'_> {
    fn var(&self, name: &str, default: &str, flags: CvarFlags, help: &str) -> Arc<Cvar> {
        let cvar = self.cvars.get(name, default, flags);
        self.cvars.set_description(&cvar, help);
        if flags.contains(CvarFlags::LATCH) {
            self.cvars.set_group(&cvar, CvarGroup::Renderer);
        }
        cvar
    }

    fn ranged(
        &self,
        name: &str,
        default: &str,
        flags: CvarFlags,
        (min, max, validator): (&str, &str, CvarValidator),
        help: &str,
    ) -> Arc<Cvar> {
        let cvar = self.var(name, default, flags, help);
        self.cvars.check_range(&cvar, min, max, validator);
        cvar
    }
}

impl RendererCvars {
    /// Fetches (creating if needed) and validates every renderer cvar.
    pub fn register(cvars: &dyn ConsoleVars) -> Self {
        use CvarValidator::{Float, Integer};
        let r = Registrar { cvars };
        let archive = CvarFlags::ARCHIVE;
        let latched = CvarFlags::ARCHIVE | CvarFlags::LATCH;
        Self {
            gamma: r.ranged("r_gamma", "1", archive, ("0.5", "3", Float), "Gamma correction factor."),
            intensity: r.ranged("r_intensity", "1", latched, ("1", "255", Float), "Global texture lighting scale."),
            overbright_bits: r.ranged("r_overBrightBits", "1", latched, ("0", "2", Integer), "Sets the intensity of overall brightness of texture pixels."),
            map_overbright_bits: r.ranged("r_mapOverBrightBits", "2", latched, ("0", "4", Integer), "Sets the number of overbright bits baked into all lightmaps and map data."),
            ambient_scale: r.ranged("r_ambientScale", "0.6", CvarFlags::CHEAT, ("0", "", Float), "Light grid ambient light scaling on entity models."),
            directed_scale: r.ranged("r_directedScale", "1", CvarFlags::CHEAT, ("0", "", Float), "Light grid direct light scaling on entity models."),
            max_polys: r.ranged("r_maxpolys", "600", latched, ("600", "", Integer), "Maximum number of polygons per scene."),
            max_poly_verts: r.ranged("r_maxpolyverts", "3000", latched, ("3000", "", Integer), "Maximum number of polygon vertices per scene."),
            fbo: r.ranged("r_fbo", "0", latched, ("0", "1", Integer), "Use framebuffer objects; allows rendering while minimized."),
            picmip: r.ranged("r_picmip", "0", latched, ("0", "16", Integer), "Texture quality reduction in powers of two."),
            vertex_light: r.ranged("r_vertexLight", "0", latched, ("0", "1", Integer), "Use vertex lighting instead of lightmaps."),
            stereo: r.ranged("r_stereoEnabled", "0", latched, ("0", "1", Integer), "Requests a stereo pair; takes effect when the window is recreated."),
            bloom: r.ranged("r_bloom", "0", archive, ("0", "1", Integer), "Enables the bloom post-processing pass."),
            bloom_threshold: r.ranged("r_bloom_threshold", "0.6", archive, ("0.01", "1", Float), "Luminance above which pixels bloom."),
            bloom_intensity: r.ranged("r_bloom_intensity", "0.5", archive, ("0", "2", Float), "Strength of the bloom pass."),
            debug_surface: r.var("r_debugSurface", "0", CvarFlags::CHEAT, "Draws the collision debug surfaces."),
            norefresh: r.var("r_norefresh", "0", CvarFlags::CHEAT, "Skips all 3D rendering."),
            speeds: r.var("r_speeds", "0", CvarFlags::CHEAT, "Prints per-frame rendering statistics."),
            screenshot_jpeg_quality: r.ranged("r_screenshotJpegQuality", "90", archive, ("10", "100", Integer), "Quality of JPEG screenshots."),
        }
    }
}
