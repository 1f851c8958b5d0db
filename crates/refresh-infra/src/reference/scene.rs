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

//! Scene composition.
//!
//! Entities, polygons and lights accumulate between `clear_scene` and
//! `render_scene`. Rendering consumes the pending lists, so a second render
//! without new adds draws an empty scene.

use std::ops::Range;

use refresh_core::exports::{PolyVert, RefEntity};
use refresh_core::math::Vec3;
use refresh_core::Handle;

/// Most entities per scene.
pub const MAX_REF_ENTITIES: usize = 1023;
/// Most dynamic lights per scene.
pub const MAX_DLIGHTS: usize = 32;

/// Where the scene protocol stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScenePhase {
    /// Nothing pending.
    #[default]
    Idle,
    /// Adds are being accumulated.
    Composing,
    /// A render is consuming the pending lists.
    Rendering,
}

/// An entity waiting to be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneEntity {
    pub entity: RefEntity,
    pub int_shader_time: bool,
}

/// A polygon waiting to be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePoly {
    pub shader: Handle,
    pub verts: Range<usize>,
}

/// How a dynamic light contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Modulated,
    Additive,
    /// A capsule from `origin` to the given end point.
    Linear,
}

/// A dynamic light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicLight {
    pub origin: Vec3,
    pub end: Vec3,
    pub radius: f32,
    pub color: Vec3,
    pub kind: LightKind,
}

/// Capacities of one scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneLimits {
    pub entities: usize,
    pub dlights: usize,
    pub polys: usize,
    pub poly_verts: usize,
}

impl Default for SceneLimits {
    fn default() -> Self {
        Self {
            entities: MAX_REF_ENTITIES,
            dlights: MAX_DLIGHTS,
            polys: super::cvars::MIN_POLYS as usize,
            poly_verts: super::cvars::MIN_POLY_VERTS as usize,
        }
    }
}

/// Everything one `render_scene` call draws.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SceneContents {
    pub entities: Vec<SceneEntity>,
    pub polys: Vec<ScenePoly>,
    pub poly_verts: Vec<PolyVert>,
    pub lights: Vec<DynamicLight>,
}

/// Accumulates scene submissions.
#[derive(Debug, Default)]
pub struct SceneBuilder {
    phase: ScenePhase,
    limits: SceneLimits,
    pending: SceneContents,
}

impl SceneBuilder {
    /// Creates a builder with the given capacities.
    pub fn new(limits: SceneLimits) -> Self {
        Self {
            limits,
            ..Default::default()
        }
    }

    pub fn phase(&self) -> ScenePhase {
        self.phase
    }

    pub fn limits(&self) -> SceneLimits {
        self.limits
    }

    /// What has been added since the last clear or render.
    pub fn pending(&self) -> &SceneContents {
        &self.pending
    }

    /// Discards pending submissions and starts composing.
    pub fn clear(&mut self) {
        self.pending = SceneContents::default();
        self.phase = ScenePhase::Composing;
    }

    /// Drops all state, back to idle.
    pub fn reset(&mut self) {
        self.pending = SceneContents::default();
        self.phase = ScenePhase::Idle;
    }

    fn compose(&mut self) {
        self.phase = ScenePhase::Composing;
    }

    /// Queues an entity. Returns `false` if it was dropped.
    pub fn add_entity(&mut self, entity: &RefEntity, int_shader_time: bool) -> bool {
        self.compose();
        if self.pending.entities.len() >= self.limits.entities {
            log::debug!("RE_AddRefEntityToScene: Dropping refEntity, reached MAX_REFENTITIES");
            return false;
        }
        if !entity.origin.is_finite() {
            log::warn!("RE_AddRefEntityToScene passed a refEntity which has an origin with a NaN component");
            return false;
        }
        self.pending.entities.push(SceneEntity {
            entity: entity.clone(),
            int_shader_time,
        });
        true
    }

    /// Queues `num_polys` polygons sharing `verts` evenly. Returns how many
    /// were accepted.
    pub fn add_polys(&mut self, shader: Handle, verts: &[PolyVert], num_polys: usize) -> usize {
        self.compose();
        if shader.is_none() {
            log::warn!("RE_AddPolyToScene: NULL poly shader");
            return 0;
        }
        if num_polys == 0 || verts.is_empty() || verts.len() % num_polys != 0 {
            log::warn!(
                "RE_AddPolyToScene: {} verts cannot form {num_polys} polygons",
                verts.len()
            );
            return 0;
        }
        let per_poly = verts.len() / num_polys;
        let mut accepted = 0;
        for chunk in verts.chunks_exact(per_poly) {
            if self.pending.polys.len() >= self.limits.polys
                || self.pending.poly_verts.len() + per_poly > self.limits.poly_verts
            {
                log::debug!("RE_AddPolyToScene: r_maxpolys or r_maxpolyverts reached");
                break;
            }
            let start = self.pending.poly_verts.len();
            self.pending.poly_verts.extend_from_slice(chunk);
            self.pending.polys.push(ScenePoly {
                shader,
                verts: start..start + per_poly,
            });
            accepted += 1;
        }
        accepted
    }

    /// Queues a dynamic light. Non-positive intensity is ignored.
    pub fn add_light(&mut self, light: DynamicLight) -> bool {
        self.compose();
        if self.pending.lights.len() >= self.limits.dlights || !light.radius.is_finite() || light.radius <= 0.0 {
            return false;
        }
        self.pending.lights.push(light);
        true
    }

    /// Hands the pending lists to a render.
    pub fn take(&mut self) -> SceneContents {
        self.phase = ScenePhase::Rendering;
        std::mem::take(&mut self.pending)
    }

    /// Marks the render started by [`SceneBuilder::take`] as complete.
    pub fn finish(&mut self) {
        if self.phase == ScenePhase::Rendering {
            self.phase = ScenePhase::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(radius: f32) -> DynamicLight {
        DynamicLight {
            origin: Vec3::ZERO,
            end: Vec3::ZERO,
            radius,
            color: Vec3::ONE,
            kind: LightKind::Modulated,
        }
    }

    #[test]
    fn adds_while_idle_start_composing() {
        let mut scene = SceneBuilder::default();
        assert_eq!(scene.phase(), ScenePhase::Idle);
        assert!(scene.add_entity(&RefEntity::default(), false));
        assert_eq!(scene.phase(), ScenePhase::Composing);
    }

    #[test]
    fn render_consumes_pending_lists() {
        let mut scene = SceneBuilder::default();
        scene.clear();
        scene.add_entity(&RefEntity::default(), false);
        assert_eq!(scene.take().entities.len(), 1);
        assert_eq!(scene.phase(), ScenePhase::Rendering);
        scene.finish();
        assert_eq!(scene.phase(), ScenePhase::Idle);
        assert!(scene.take().entities.is_empty());
    }

    #[test]
    fn nan_origin_is_dropped() {
        let mut scene = SceneBuilder::default();
        let entity = RefEntity {
            origin: Vec3::new(f32::NAN, 0.0, 0.0),
            ..Default::default()
        };
        assert!(!scene.add_entity(&entity, false));
        assert!(scene.pending().entities.is_empty());
    }

    #[test]
    fn entity_cap_is_enforced() {
        let mut scene = SceneBuilder::new(SceneLimits {
            entities: 2,
            ..Default::default()
        });
        for _ in 0..5 {
            scene.add_entity(&RefEntity::default(), false);
        }
        assert_eq!(scene.pending().entities.len(), 2);
    }

    #[test]
    fn polys_need_a_shader_and_respect_vertex_budget() {
        let mut scene = SceneBuilder::new(SceneLimits {
            poly_verts: 7,
            ..Default::default()
        });
        let verts = [PolyVert::default(); 9];
        assert_eq!(scene.add_polys(Handle::NONE, &verts, 3), 0);
        let shader = Handle::compose(1, 1);
        assert_eq!(scene.add_polys(shader, &verts, 3), 2);
        assert_eq!(scene.pending().polys[1].verts, 3..6);
        assert_eq!(scene.add_polys(shader, &verts[..8], 3), 0);
    }

    #[test]
    fn lights_need_positive_intensity() {
        let mut scene = SceneBuilder::default();
        assert!(!scene.add_light(light(0.0)));
        assert!(!scene.add_light(light(-3.0)));
        assert!(!scene.add_light(light(f32::NAN)));
        for _ in 0..MAX_DLIGHTS {
            assert!(scene.add_light(light(100.0)));
        }
        assert!(!scene.add_light(light(100.0)));
    }
}
