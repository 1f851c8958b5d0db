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

//! View setup for the front end: frustum planes, sphere culling and the
//! projection used by the software back end.

use refresh_core::exports::{RefDef, ScreenRect};
use refresh_core::math::{Axis, Plane, Vec3};

/// Builds the four side planes of the view frustum, ordered left, right,
/// bottom, top. Normals point into the frustum.
pub fn frustum_planes(fd: &RefDef) -> [Plane; 4] {
    let axis = &fd.viewaxis;
    let half_x = (fd.fov_x * 0.5).to_radians();
    let half_y = (fd.fov_y * 0.5).to_radians();
    let (xs, xc) = half_x.sin_cos();
    let (ys, yc) = half_y.sin_cos();
    let normals = [
        axis.forward() * xs + axis.left() * xc,
        axis.forward() * xs + axis.left() * -xc,
        axis.forward() * ys + axis.up() * yc,
        axis.forward() * ys + axis.up() * -yc,
    ];
    normals.map(|normal| Plane::from_normal_point(normal, fd.vieworg))
}

/// `true` when the sphere lies entirely outside one of the planes.
pub fn cull_sphere(frustum: &[Plane; 4], center: Vec3, radius: f32) -> bool {
    frustum.iter().any(|plane| plane.distance_to(center) < -radius)
}

/// Maps world points to framebuffer pixels for one view.
#[derive(Debug, Clone, Copy)]
pub struct ViewProjection {
    origin: Vec3,
    axis: Axis,
    tan_x: f32,
    tan_y: f32,
    rect: ScreenRect,
}

impl ViewProjection {
    pub fn new(fd: &RefDef) -> Self {
        Self {
            origin: fd.vieworg,
            axis: fd.viewaxis,
            tan_x: (fd.fov_x * 0.5).to_radians().tan().max(1e-3),
            tan_y: (fd.fov_y * 0.5).to_radians().tan().max(1e-3),
            rect: ScreenRect {
                x: fd.x,
                y: fd.y,
                w: fd.width,
                h: fd.height,
            },
        }
    }

    /// The pixel `point` lands on, or `None` behind the eye or off the view.
    pub fn project(&self, point: Vec3) -> Option<[i32; 2]> {
        let d = point - self.origin;
        let depth = d.dot(self.axis.forward());
        if depth <= 0.0 {
            return None;
        }
        let sx = -d.dot(self.axis.left()) / (depth * self.tan_x);
        let sy = -d.dot(self.axis.up()) / (depth * self.tan_y);
        if !(-1.0..=1.0).contains(&sx) || !(-1.0..=1.0).contains(&sy) {
            return None;
        }
        let x = self.rect.x + ((sx + 1.0) * 0.5 * self.rect.w as f32) as i32;
        let y = self.rect.y + ((sy + 1.0) * 0.5 * self.rect.h as f32) as i32;
        Some([x.min(self.rect.x + self.rect.w - 1), y.min(self.rect.y + self.rect.h - 1)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn view() -> RefDef {
        RefDef {
            width: 640,
            height: 480,
            fov_x: 90.0,
            fov_y: 90.0,
            ..Default::default()
        }
    }

    #[test]
    fn frustum_normals_point_inwards() {
        let planes = frustum_planes(&view());
        let ahead = Vec3::new(100.0, 0.0, 0.0);
        assert!(planes.iter().all(|p| p.distance_to(ahead) > 0.0));
        // Left plane leans toward +left.
        assert_relative_eq!(planes[0].normal.y, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-5);
        assert_relative_eq!(planes[3].normal.z, -std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-5);
    }

    #[test]
    fn spheres_behind_the_eye_are_culled() {
        let planes = frustum_planes(&view());
        assert!(cull_sphere(&planes, Vec3::new(-100.0, 0.0, 0.0), 10.0));
        assert!(!cull_sphere(&planes, Vec3::new(100.0, 0.0, 0.0), 10.0));
        assert!(!cull_sphere(&planes, Vec3::new(-5.0, 0.0, 0.0), 10.0));
    }

    #[test]
    fn center_of_view_projects_to_the_middle() {
        let proj = ViewProjection::new(&view());
        assert_eq!(proj.project(Vec3::new(10.0, 0.0, 0.0)), Some([320, 240]));
        assert_eq!(proj.project(Vec3::new(-10.0, 0.0, 0.0)), None);
        // Left of the eye lands on the left half of the screen.
        let [x, _] = proj.project(Vec3::new(10.0, 5.0, 0.0)).expect("visible");
        assert!(x < 320);
    }
}
