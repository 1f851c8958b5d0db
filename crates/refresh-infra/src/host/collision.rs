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

//! The host's view of the loaded map for visibility queries.
//!
//! Visibility data uses the classic layout: two little-endian `i32`s (cluster
//! count, bytes per row) followed by one bitset row per cluster.

use std::sync::{Arc, RwLock};

use refresh_core::host::{CollisionMap, PvsRow};
use refresh_core::math::Vec3;

const VIS_HEADER: usize = 8;

#[derive(Debug, Default)]
struct MapState {
    vis: Option<Arc<[u8]>>,
    num_clusters: usize,
    cluster_bytes: usize,
    debug_surfaces: Vec<(u32, Vec<Vec3>)>,
}

/// Visibility and debug geometry of the current map.
#[derive(Debug, Default)]
pub struct WorldVis {
    state: RwLock<MapState>,
}

impl WorldVis {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs visibility data. Malformed data is ignored with a warning and
    /// `false` is returned.
    pub fn set_vis(&self, vis: Arc<[u8]>) -> bool {
        let header = |i: usize| {
            vis.get(i..i + 4)
                .and_then(|b| <[u8; 4]>::try_from(b).ok())
                .map(i32::from_le_bytes)
        };
        let (Some(num_clusters), Some(cluster_bytes)) = (header(0), header(4)) else {
            log::warn!("Visibility data too short ({} bytes)", vis.len());
            return false;
        };
        let (Ok(num_clusters), Ok(cluster_bytes)) =
            (usize::try_from(num_clusters), usize::try_from(cluster_bytes))
        else {
            log::warn!("Visibility header is negative");
            return false;
        };
        if VIS_HEADER + num_clusters * cluster_bytes > vis.len() {
            log::warn!("Visibility data truncated");
            return false;
        }
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.vis = Some(vis);
        state.num_clusters = num_clusters;
        state.cluster_bytes = cluster_bytes;
        true
    }

    /// The installed visibility data, shared.
    pub fn vis(&self) -> Option<Arc<[u8]>> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .vis
            .clone()
    }

    /// Forgets the visibility data, e.g. on map change.
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = MapState::default();
    }

    /// Adds a polygon reported by the collision debug view.
    pub fn add_debug_surface(&self, color: u32, points: Vec<Vec3>) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .debug_surfaces
            .push((color, points));
    }

    /// Builds visibility data in the layout [`WorldVis::set_vis`] expects.
    pub fn encode(rows: &[Vec<u8>]) -> Arc<[u8]> {
        let cluster_bytes = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut out = Vec::with_capacity(VIS_HEADER + rows.len() * cluster_bytes);
        out.extend_from_slice(&(rows.len() as i32).to_le_bytes());
        out.extend_from_slice(&(cluster_bytes as i32).to_le_bytes());
        for row in rows {
            out.extend_from_slice(row);
            out.resize(out.len() + cluster_bytes - row.len(), 0);
        }
        Arc::from(out)
    }
}

impl CollisionMap for WorldVis {
    fn cluster_pvs(&self, cluster: i32) -> Option<PvsRow> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let vis = state.vis.clone()?;
        let cluster = usize::try_from(cluster).ok()?;
        if cluster >= state.num_clusters {
            return None;
        }
        PvsRow::new(vis, VIS_HEADER + cluster * state.cluster_bytes, state.cluster_bytes)
    }

    fn draw_debug_surfaces(&self, draw: &mut dyn FnMut(u32, &[Vec3])) {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        for (color, points) in &state.debug_surfaces {
            draw(*color, points);
        }
    }
}
