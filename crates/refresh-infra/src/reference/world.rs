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

//! The loaded world map.
//!
//! Worlds are JSON documents describing drawable surfaces, the leaf boxes
//! used for point classification, inline models, the light grid and the
//! entity string.

use std::sync::Arc;

use refresh_core::exports::LightSample;
use refresh_core::host::{HunkBlock, PvsRow};
use refresh_core::math::{Aabb, Plane, Vec3};
use serde::Deserialize;

/// How a surface's points are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    /// One planar convex polygon.
    #[default]
    Face,
    /// A triangle list.
    Triangles,
}

/// A drawable world surface.
#[derive(Debug, Clone, Deserialize)]
pub struct WorldSurface {
    #[serde(default)]
    pub shader: String,
    #[serde(default)]
    pub kind: SurfaceKind,
    pub points: Vec<Vec3>,
    #[serde(skip)]
    pub bounds: Aabb,
    #[serde(skip)]
    pub plane: Option<Plane>,
}

impl WorldSurface {
    fn finish(&mut self) {
        self.bounds = Aabb::INVALID;
        for p in &self.points {
            self.bounds.add_point(*p);
        }
        self.plane = match self.points.as_slice() {
            [a, b, c, ..] => {
                let normal = (*c - *a).cross(*b - *a).normalize();
                (normal.length_squared() > 0.0).then(|| Plane::from_normal_point(normal, *a))
            }
            _ => None,
        };
    }

    /// Triangles of the surface, fanned for faces.
    pub fn triangles(&self) -> Vec<[Vec3; 3]> {
        match self.kind {
            SurfaceKind::Face => self
                .points
                .windows(2)
                .skip(1)
                .map(|w| [self.points[0], w[0], w[1]])
                .collect(),
            SurfaceKind::Triangles => self
                .points
                .chunks_exact(3)
                .map(|t| [t[0], t[1], t[2]])
                .collect(),
        }
    }
}

/// A leaf of the world: a box classified into a visibility cluster.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Leaf {
    pub cluster: i32,
    #[serde(default)]
    pub area: i32,
    pub bounds: Aabb,
}

/// One light grid sample.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct GridSample {
    pub ambient: [u8; 3],
    pub directed: [u8; 3],
    /// Direction as byte angles.
    pub lat: u8,
    pub lng: u8,
}

fn default_grid_size() -> Vec3 {
    Vec3::new(64.0, 64.0, 128.0)
}

/// Precomputed lighting on a regular lattice.
#[derive(Debug, Clone, Deserialize)]
pub struct LightGrid {
    pub origin: Vec3,
    #[serde(default = "default_grid_size")]
    pub size: Vec3,
    pub bounds: [u32; 3],
    pub samples: Vec<GridSample>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Submodel {
    bounds: Aabb,
}

#[derive(Debug, Deserialize)]
struct WorldFile {
    #[serde(default)]
    surfaces: Vec<WorldSurface>,
    #[serde(default)]
    leaves: Vec<Leaf>,
    #[serde(default)]
    submodels: Vec<Submodel>,
    #[serde(default)]
    light_grid: Option<LightGrid>,
    #[serde(default)]
    entities: String,
}

/// Scales a map color byte triple by `shift` overbright bits, normalizing so
/// the brightest channel stays within range.
pub fn color_shift(rgb: [u8; 3], shift: u32) -> [u8; 3] {
    let scaled = rgb.map(|c| u32::from(c) << shift.min(8));
    let max = scaled.iter().copied().max().unwrap_or(0);
    if max > 255 {
        scaled.map(|c| (c * 255 / max) as u8)
    } else {
        scaled.map(|c| c as u8)
    }
}

/// The world of the current registration epoch.
#[derive(Debug)]
pub struct World {
    pub name: String,
    pub surfaces: Vec<WorldSurface>,
    pub leaves: Vec<Leaf>,
    pub submodels: Vec<Aabb>,
    pub light_grid: Option<LightGrid>,
    entities: String,
    entity_cursor: usize,
    _storage: HunkBlock,
}

/// Why a world file was refused.
#[derive(Debug)]
pub struct WorldFormatError(pub String);

impl World {
    /// Parses `bytes`; `storage` is the arena copy backing the level data and
    /// `light_shift` the overbright bits to bake into the grid.
    pub fn parse(
        name: &str,
        bytes: &[u8],
        storage: HunkBlock,
        light_shift: u32,
    ) -> Result<Self, WorldFormatError> {
        let mut file: WorldFile =
            serde_json::from_slice(bytes).map_err(|e| WorldFormatError(e.to_string()))?;
        for surface in &mut file.surfaces {
            surface.finish();
        }
        if let Some(grid) = &mut file.light_grid {
            let expected: u32 = grid.bounds.iter().product();
            if grid.samples.len() != expected as usize {
                return Err(WorldFormatError(format!(
                    "light grid has {} samples, expected {expected}",
                    grid.samples.len()
                )));
            }
            for sample in &mut grid.samples {
                sample.ambient = color_shift(sample.ambient, light_shift);
                sample.directed = color_shift(sample.directed, light_shift);
            }
        }
        Ok(Self {
            name: name.to_owned(),
            surfaces: file.surfaces,
            leaves: file.leaves,
            submodels: file.submodels.into_iter().map(|s| s.bounds).collect(),
            light_grid: file.light_grid,
            entities: file.entities,
            entity_cursor: 0,
            _storage: storage,
        })
    }

    /// The leaf containing `point`.
    pub fn point_leaf(&self, point: Vec3) -> Option<&Leaf> {
        self.leaves.iter().find(|leaf| leaf.bounds.contains_point(point))
    }

    /// The cluster containing `point`, or `None` outside every leaf.
    pub fn point_cluster(&self, point: Vec3) -> Option<i32> {
        self.point_leaf(point).map(|leaf| leaf.cluster)
    }

    /// Surfaces whose bounds touch `bounds`.
    pub fn surfaces_in(&self, bounds: &Aabb) -> impl Iterator<Item = &WorldSurface> + '_ {
        let bounds = *bounds;
        self.surfaces
            .iter()
            .filter(move |s| s.bounds.is_valid() && s.bounds.intersects(&bounds))
    }

    /// Returns the next token of the entity string, or `None` (rewinding to
    /// the start) once it is exhausted.
    pub fn next_entity_token(&mut self) -> Option<String> {
        match parse_token(&self.entities, self.entity_cursor) {
            Some((token, next)) => {
                self.entity_cursor = next;
                Some(token)
            }
            None => {
                self.entity_cursor = 0;
                None
            }
        }
    }

    /// Samples the light grid at `point`. `None` without a grid.
    pub fn light_for_point(&self, point: Vec3, ambient_scale: f32, directed_scale: f32) -> Option<LightSample> {
        self.light_grid
            .as_ref()
            .map(|grid| grid.sample(point, ambient_scale, directed_scale))
    }
}

impl LightGrid {
    fn at(&self, pos: [u32; 3]) -> &GridSample {
        let [bx, by, _] = self.bounds;
        let index = pos[0] + pos[1] * bx + pos[2] * bx * by;
        &self.samples[index as usize]
    }

    /// Trilinear blend of the eight surrounding samples. Samples whose ambient
    /// light is black are inside solid geometry and skipped.
    pub fn sample(&self, point: Vec3, ambient_scale: f32, directed_scale: f32) -> LightSample {
        let local = point - self.origin;
        let mut pos = [0u32; 3];
        let mut frac = [0.0f32; 3];
        for i in 0..3 {
            let v = local[i] / self.size[i].max(1.0);
            let cell = v.floor();
            frac[i] = v - cell;
            let max = self.bounds[i].saturating_sub(1) as f32;
            pos[i] = cell.clamp(0.0, max) as u32;
        }

        let mut ambient = Vec3::ZERO;
        let mut directed = Vec3::ZERO;
        let mut direction = Vec3::ZERO;
        let mut total = 0.0;
        'corners: for corner in 0..8u32 {
            let mut factor = 1.0;
            let mut at = pos;
            for axis in 0..3 {
                if corner & (1 << axis) != 0 {
                    if pos[axis] + 1 > self.bounds[axis].saturating_sub(1) {
                        continue 'corners;
                    }
                    factor *= frac[axis];
                    at[axis] += 1;
                } else {
                    factor *= 1.0 - frac[axis];
                }
            }
            let data = self.at(at);
            if data.ambient.iter().all(|&c| c == 0) {
                continue;
            }
            total += factor;
            let rgb = |c: [u8; 3]| Vec3::new(f32::from(c[0]), f32::from(c[1]), f32::from(c[2]));
            ambient += rgb(data.ambient) * factor;
            directed += rgb(data.directed) * factor;
            let lat = f32::from(data.lat) * std::f32::consts::TAU / 256.0;
            let lng = f32::from(data.lng) * std::f32::consts::TAU / 256.0;
            let normal = Vec3::new(lat.cos() * lng.sin(), lat.sin() * lng.sin(), lng.cos());
            direction += normal * factor;
        }

        if total > 0.0 && total < 0.99 {
            ambient = ambient * (1.0 / total);
            directed = directed * (1.0 / total);
        }
        LightSample {
            ambient: ambient * ambient_scale,
            directed: directed * directed_scale,
            direction: direction.normalize(),
        }
    }
}

/// The row of `cluster` in visibility data lent by the host: two
/// little-endian `i32`s (cluster count, row size) followed by the rows.
pub fn lent_pvs(vis: &Arc<[u8]>, cluster: i32) -> Option<PvsRow> {
    let word = |i: usize| {
        vis.get(i..i + 4)
            .and_then(|b| <[u8; 4]>::try_from(b).ok())
            .map(i32::from_le_bytes)
            .and_then(|v| usize::try_from(v).ok())
    };
    let (num_clusters, row_bytes) = (word(0)?, word(4)?);
    let cluster = usize::try_from(cluster).ok().filter(|&c| c < num_clusters)?;
    PvsRow::new(vis.clone(), 8 + cluster * row_bytes, row_bytes)
}

/// Reads one token from `text` starting at `from`: skips whitespace and
/// comments, honours double quotes. Returns the token and the resume offset.
pub fn parse_token(text: &str, from: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let mut i = from.min(bytes.len());
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes[i..].starts_with(b"//") {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if bytes[i..].starts_with(b"/*") {
            i = text[i + 2..].find("*/").map_or(bytes.len(), |end| i + 2 + end + 2);
        } else {
            break;
        }
    }
    if i >= bytes.len() {
        return None;
    }
    if bytes[i] == b'"' {
        let start = i + 1;
        let end = text[start..].find('"').map_or(bytes.len(), |e| start + e);
        return Some((text[start..end].to_owned(), (end + 1).min(bytes.len())));
    }
    let start = i;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    Some((text[start..i].to_owned(), i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn world(json: &str) -> World {
        World::parse("maps/test.json", json.as_bytes(), HunkBlock::new(1, 0), 0).expect("valid")
    }

    #[test]
    fn entity_tokens_rewind_after_the_end() {
        let mut w = world(r#"{"entities": "{ \"classname\" \"worldspawn\" } // done"}"#);
        let tokens: Vec<_> = std::iter::from_fn(|| w.next_entity_token()).collect();
        assert_eq!(tokens, vec!["{", "classname", "worldspawn", "}"]);
        assert_eq!(w.next_entity_token().as_deref(), Some("{"));
    }

    #[test]
    fn point_outside_every_leaf_has_no_cluster() {
        let w = world(
            r#"{"leaves": [{"cluster": 3, "bounds": {"min": {"x":0,"y":0,"z":0}, "max": {"x":10,"y":10,"z":10}}}]}"#,
        );
        assert_eq!(w.point_cluster(Vec3::new(5.0, 5.0, 5.0)), Some(3));
        assert_eq!(w.point_cluster(Vec3::new(50.0, 5.0, 5.0)), None);
    }

    #[test]
    fn light_grid_blends_and_skips_solid_samples() {
        let grid = LightGrid {
            origin: Vec3::ZERO,
            size: Vec3::new(64.0, 64.0, 128.0),
            bounds: [2, 1, 1],
            samples: vec![
                GridSample {
                    ambient: [100, 100, 100],
                    directed: [0, 0, 0],
                    lat: 0,
                    lng: 0,
                },
                GridSample::default(),
            ],
        };
        let sample = grid.sample(Vec3::new(32.0, 0.0, 0.0), 1.0, 1.0);
        // Half the weight falls on the solid sample; the rest is renormalized.
        assert_relative_eq!(sample.ambient.x, 100.0, epsilon = 1e-3);
        assert_relative_eq!(sample.direction.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn grid_with_wrong_sample_count_is_refused() {
        let json = r#"{"light_grid": {"origin": {"x":0,"y":0,"z":0}, "bounds": [2,2,2], "samples": []}}"#;
        assert!(World::parse("w", json.as_bytes(), HunkBlock::new(1, 0), 0).is_err());
    }

    #[test]
    fn lent_vis_rows_are_addressed_by_cluster() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&[0b01, 0b10]);
        let vis: Arc<[u8]> = Arc::from(bytes);
        assert!(lent_pvs(&vis, 0).expect("row 0").is_visible(0));
        assert!(lent_pvs(&vis, 1).expect("row 1").is_visible(1));
        assert!(!lent_pvs(&vis, 1).expect("row 1").is_visible(0));
        assert!(lent_pvs(&vis, 2).is_none());
    }

    #[test]
    fn color_shift_saturates_preserving_hue() {
        assert_eq!(color_shift([10, 20, 30], 1), [20, 40, 60]);
        assert_eq!(color_shift([200, 100, 0], 1), [255, 127, 0]);
    }
}
