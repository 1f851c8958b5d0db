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

//! Bounding boxes and planes used for culling and decal clipping.

use serde::{Deserialize, Serialize};

use super::Vec3;

/// An Axis-Aligned Bounding Box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// The corner with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Aabb {
    /// An empty box: merging any point into it yields that point.
    pub const INVALID: Self = Self {
        min: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
        max: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
    };

    /// A degenerate box at the origin; what bounds queries return on a miss.
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    /// Creates a box from two corners in any order.
    #[inline]
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Grows the box to include `point`.
    #[inline]
    pub fn add_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Returns `true` if the box has been grown at least once.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Returns `true` if `point` is inside or on the boundary.
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        (point.x >= self.min.x && point.x <= self.max.x)
            && (point.y >= self.min.y && point.y <= self.max.y)
            && (point.z >= self.min.z && point.z <= self.max.z)
    }

    /// Returns `true` if the two boxes overlap (touching counts).
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        (self.min.x <= other.max.x && self.max.x >= other.min.x)
            && (self.min.y <= other.max.y && self.max.y >= other.min.y)
            && (self.min.z <= other.max.z && self.max.z >= other.min.z)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::ZERO
    }
}

/// A plane `dot(normal, p) == dist`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Plane {
    /// Unit normal.
    pub normal: Vec3,
    /// Distance from the origin along `normal`.
    pub dist: f32,
}

impl Plane {
    /// Builds the plane with the given normal passing through `point`.
    #[inline]
    pub fn from_normal_point(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal,
            dist: normal.dot(point),
        }
    }

    /// Signed distance from the plane; positive on the side `normal` points to.
    #[inline]
    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_box_becomes_point_box() {
        let mut b = Aabb::INVALID;
        assert!(!b.is_valid());
        b.add_point(Vec3::ONE);
        assert!(b.is_valid());
        assert_eq!(b.min, Vec3::ONE);
        assert_eq!(b.max, Vec3::ONE);
    }

    #[test]
    fn intersection_and_containment() {
        let a = Aabb::from_min_max(Vec3::ZERO, Vec3::new(2.0, 2.0, 2.0));
        let b = Aabb::from_min_max(Vec3::ONE, Vec3::new(3.0, 3.0, 3.0));
        let c = Aabb::from_min_max(Vec3::new(5.0, 5.0, 5.0), Vec3::new(6.0, 6.0, 6.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.contains_point(Vec3::ONE));
        assert!(!a.contains_point(Vec3::new(-0.1, 1.0, 1.0)));
    }

    #[test]
    fn plane_distance_is_signed() {
        let p = Plane::from_normal_point(Vec3::Z, Vec3::new(0.0, 0.0, 10.0));
        assert_eq!(p.distance_to(Vec3::new(4.0, 4.0, 12.0)), 2.0);
        assert_eq!(p.distance_to(Vec3::ZERO), -10.0);
    }
}
