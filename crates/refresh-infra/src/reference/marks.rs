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

//! Projection of decal polygons onto world geometry.
//!
//! The decal polygon is extruded along the projection direction into a
//! convex volume (one side plane per edge plus a near and a far cap). Every
//! world triangle facing against the projection is clipped by that volume
//! and what survives becomes a fragment.

use refresh_core::exports::MarkFragment;
use refresh_core::math::{Aabb, Vec3};

use super::world::{SurfaceKind, World};

/// Largest polygon the clipper handles.
pub const MAX_VERTS_ON_POLY: usize = 64;
const ON_EPSILON: f32 = 0.5;
const NEAR_CAP: f32 = 32.0;
const FAR_CAP: f32 = 20.0;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Front,
    Back,
    On,
}

/// Keeps the part of `input` in front of the plane (`normal`, `dist`).
fn chop_behind_plane(input: &[Vec3], normal: Vec3, dist: f32) -> Vec<Vec3> {
    if input.len() >= MAX_VERTS_ON_POLY - 2 {
        return Vec::new();
    }
    let dists: Vec<f32> = input.iter().map(|p| p.dot(normal) - dist).collect();
    let sides: Vec<Side> = dists
        .iter()
        .map(|&d| {
            if d > ON_EPSILON {
                Side::Front
            } else if d < -ON_EPSILON {
                Side::Back
            } else {
                Side::On
            }
        })
        .collect();

    if !sides.contains(&Side::Front) {
        return Vec::new();
    }
    if !sides.contains(&Side::Back) {
        return input.to_vec();
    }

    let mut out = Vec::with_capacity(input.len() + 2);
    for i in 0..input.len() {
        let next = (i + 1) % input.len();
        let p1 = input[i];
        match sides[i] {
            Side::On => {
                out.push(p1);
                continue;
            }
            Side::Front => out.push(p1),
            Side::Back => {}
        }
        if sides[next] == Side::On || sides[next] == sides[i] {
            continue;
        }
        let p2 = input[next];
        let d = dists[i] - dists[next];
        let t = if d == 0.0 { 0.0 } else { dists[i] / d };
        out.push(p1 + (p2 - p1) * t);
    }
    out
}

/// Where fragments are written and how much room is left.
struct FragmentSink<'a> {
    points: &'a mut [Vec3],
    fragments: &'a mut [MarkFragment],
    max_points: usize,
    max_fragments: usize,
    num_points: usize,
    num_fragments: usize,
}

impl FragmentSink<'_> {
    fn is_full(&self) -> bool {
        self.num_fragments >= self.max_fragments
    }

    fn clip_and_add(&mut self, triangle: [Vec3; 3], planes: &[(Vec3, f32)]) {
        let mut poly = triangle.to_vec();
        for &(normal, dist) in planes {
            poly = chop_behind_plane(&poly, normal, dist);
            if poly.is_empty() {
                return;
            }
        }
        if self.num_points + poly.len() > self.max_points {
            return;
        }
        self.fragments[self.num_fragments] = MarkFragment {
            first_point: self.num_points,
            num_points: poly.len(),
        };
        self.points[self.num_points..self.num_points + poly.len()].copy_from_slice(&poly);
        self.num_points += poly.len();
        self.num_fragments += 1;
    }
}

/// Clips the decal `points` projected along `projection` against `world`.
/// Returns the number of fragments written.
pub fn mark_fragments(
    world: &World,
    points: &[Vec3],
    projection: Vec3,
    max_points: usize,
    point_buffer: &mut [Vec3],
    max_fragments: usize,
    fragment_buffer: &mut [MarkFragment],
) -> usize {
    let max_points = max_points.min(point_buffer.len());
    let max_fragments = max_fragments.min(fragment_buffer.len());
    if points.len() < 3 || points.len() > MAX_VERTS_ON_POLY - 2 || max_fragments == 0 {
        return 0;
    }
    let dir = projection.normalize();
    if dir == Vec3::ZERO {
        return 0;
    }

    let mut bounds = Aabb::INVALID;
    for &p in points {
        bounds.add_point(p);
        bounds.add_point(p + projection);
    }

    let mut planes = Vec::with_capacity(points.len() + 2);
    for (i, &p) in points.iter().enumerate() {
        let edge = points[(i + 1) % points.len()] - p;
        let normal = edge.cross(dir).normalize();
        planes.push((normal, p.dot(normal)));
    }
    planes.push((dir, dir.dot(points[0]) - NEAR_CAP));
    planes.push((-dir, (-dir).dot(points[0]) - FAR_CAP));

    let mut sink = FragmentSink {
        points: point_buffer,
        fragments: fragment_buffer,
        max_points,
        max_fragments,
        num_points: 0,
        num_fragments: 0,
    };

    for surface in world.surfaces_in(&bounds) {
        match surface.kind {
            SurfaceKind::Face => {
                let Some(plane) = surface.plane else { continue };
                if plane.normal.dot(dir) > -0.5 {
                    continue;
                }
                for triangle in surface.triangles() {
                    sink.clip_and_add(triangle, &planes);
                    if sink.is_full() {
                        return sink.num_fragments;
                    }
                }
            }
            SurfaceKind::Triangles => {
                for triangle in surface.triangles() {
                    let [a, b, c] = triangle;
                    let normal = (c - a).cross(b - a).normalize();
                    if normal.dot(dir) >= -0.1 {
                        continue;
                    }
                    sink.clip_and_add(triangle, &planes);
                    if sink.is_full() {
                        return sink.num_fragments;
                    }
                }
            }
        }
    }
    sink.num_fragments
}
