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

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use refresh_core::REF_API_VERSION;
use refresh_infra::host::{HostConfig, StandardHost, WindowConfig, WorldVis};
use refresh_infra::{ModuleRegistry, RendererSession};
use tempfile::TempDir;

/// A floor at z = 0 split into two clusters along x, one inline model and a
/// single-sample light grid.
pub const WORLD_JSON: &str = r#"{
    "surfaces": [
        {
            "shader": "textures/floor",
            "points": [
                {"x": -512, "y": -512, "z": 0},
                {"x": -512, "y": 512, "z": 0},
                {"x": 512, "y": 512, "z": 0},
                {"x": 512, "y": -512, "z": 0}
            ]
        }
    ],
    "leaves": [
        {"cluster": 0, "area": 0, "bounds": {"min": {"x": -512, "y": -512, "z": -16}, "max": {"x": 0, "y": 512, "z": 512}}},
        {"cluster": 1, "area": 1, "bounds": {"min": {"x": 0, "y": -512, "z": -16}, "max": {"x": 512, "y": 512, "z": 512}}}
    ],
    "submodels": [
        {"bounds": {"min": {"x": -512, "y": -512, "z": -16}, "max": {"x": 512, "y": 512, "z": 512}}},
        {"bounds": {"min": {"x": 0, "y": 0, "z": 0}, "max": {"x": 32, "y": 32, "z": 64}}}
    ],
    "light_grid": {
        "origin": {"x": -512, "y": -512, "z": 0},
        "bounds": [1, 1, 1],
        "samples": [{"ambient": [40, 40, 40], "directed": [80, 80, 80], "lat": 0, "lng": 0}]
    },
    "entities": "{ \"classname\" \"worldspawn\" }\n{ \"classname\" \"info_player_start\" \"origin\" \"0 0 24\" }"
}"#;

/// A two-frame mesh with one tag.
pub const MODEL_JSON: &str = r#"{
    "frames": [
        {"bounds": {"min": {"x": -16, "y": -16, "z": 0}, "max": {"x": 16, "y": 16, "z": 32}}, "radius": 24},
        {"bounds": {"min": {"x": -16, "y": -16, "z": 0}, "max": {"x": 16, "y": 16, "z": 48}}, "radius": 30}
    ],
    "tags": [
        {
            "name": "tag_weapon",
            "frames": [
                {"origin": {"x": 0, "y": 0, "z": 0}, "axis": [{"x": 1, "y": 0, "z": 0}, {"x": 0, "y": 1, "z": 0}, {"x": 0, "y": 0, "z": 1}]},
                {"origin": {"x": 10, "y": 0, "z": 20}, "axis": [{"x": 1, "y": 0, "z": 0}, {"x": 0, "y": 1, "z": 0}, {"x": 0, "y": 0, "z": 1}]}
            ]
        }
    ],
    "surfaces": [{"name": "body", "shader": "models/crate/skin"}]
}"#;

/// A font whose glyph `A` lives on one page shader.
pub const FONT_JSON: &str = r#"{
    "glyph_scale": 0.5,
    "glyphs": [{"height": 12, "shader_name": "fonts/page0"}]
}"#;

/// Writes `bytes` at `rel` under `root`, creating directories.
pub fn write(root: &Path, rel: &str, bytes: &[u8]) -> Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Writes a solid `size`x`size` TGA.
pub fn write_tga(root: &Path, rel: &str, size: u32, rgba: [u8; 4]) -> Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    image::RgbaImage::from_pixel(size, size, image::Rgba(rgba)).save(path)?;
    Ok(())
}

/// A game directory on disk with a standard host over it.
pub struct Fixture {
    pub dir: TempDir,
    pub host: Arc<StandardHost>,
}

impl Fixture {
    pub fn new() -> Result<Self> {
        Self::with(WindowConfig::default(), BTreeMap::new())
    }

    pub fn with(window: WindowConfig, cvars: BTreeMap<String, String>) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        write(root, "maps/test.json", WORLD_JSON.as_bytes())?;
        write(root, "maps/broken.json", b"{ not json")?;
        write(root, "models/crate.json", MODEL_JSON.as_bytes())?;
        write(root, "fonts/fontImage_12.dat", FONT_JSON.as_bytes())?;
        write(root, "models/crate/default.skin", b"body,models/crate/skin\ntag_weapon,\n")?;
        write_tga(root, "textures/floor.tga", 8, [200, 200, 200, 255])?;
        write_tga(root, "textures/red.tga", 4, [255, 0, 0, 255])?;
        write_tga(root, "models/crate/skin.tga", 4, [120, 80, 40, 255])?;
        write_tga(root, "fonts/page0.tga", 16, [255, 255, 255, 255])?;
        // Cluster 0 sees only itself; cluster 1 sees both.
        write(root, "maps/test.vis", &WorldVis::encode(&[vec![0b01], vec![0b11]]))?;

        let config = HostConfig {
            window,
            search_paths: vec![root.to_path_buf()],
            write_dir: Some(root.to_path_buf()),
            hunk_megs: 16,
            heap_megs: 16,
            cvars,
            ..Default::default()
        };
        let host = Arc::new(StandardHost::new(config)?);
        Ok(Self { dir, host })
    }

    /// Loads `module` from the built-in registry.
    pub fn session(&self, module: &str) -> Result<RendererSession> {
        Ok(ModuleRegistry::with_builtins().load(module, REF_API_VERSION, self.host.clone())?)
    }

    /// Registers, loads the test world and lends its visibility data.
    pub fn session_with_world(&self) -> Result<RendererSession> {
        let mut session = self.session("reference-gl")?;
        let exports = session.exports()?;
        exports.begin_registration()?;
        exports.load_world("maps/test.json")?;
        if let Some(vis) = self.host.load_map_vis("maps/test.json") {
            exports.set_world_vis_data(vis);
        }
        exports.end_registration();
        Ok(session)
    }
}
