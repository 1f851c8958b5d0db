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

mod common;

use anyhow::Result;
use approx::assert_relative_eq;
use common::{write, Fixture};
use refresh_core::exports::{
    MarkFragment, RawFrame, RdFlags, RefDef, RefEntity, RefEntityType, RenderFx, ScreenRect,
    StretchPic,
};
use refresh_core::math::Vec3;
use refresh_core::StereoFrame;
use refresh_infra::host::encode_cinematic;
use refresh_infra::RendererSession;

fn view_from(origin: Vec3) -> RefDef {
    RefDef {
        width: 640,
        height: 480,
        vieworg: origin,
        time: 1000,
        ..Default::default()
    }
}

fn sprite(origin: Vec3, rgba: [u8; 4]) -> RefEntity {
    RefEntity {
        re_type: RefEntityType::Sprite,
        origin,
        radius: 8.0,
        shader_rgba: rgba,
        ..Default::default()
    }
}

/// Ends the open frame with a named screenshot and reads it back.
fn end_with_shot(fixture: &Fixture, session: &mut RendererSession, name: &str) -> Result<image::RgbImage> {
    fixture.host.command_table().execute_line(&format!("screenshot {name}"));
    session.end_frame()?;
    let path = fixture.dir.path().join(format!("screenshots/{name}.tga"));
    Ok(image::open(path)?.to_rgb8())
}

#[test]
fn visible_entities_are_drawn_and_third_person_ones_skipped() -> Result<()> {
    // --- Arrange ---
    let fixture = Fixture::new()?;
    let mut session = fixture.session_with_world()?;
    session.begin_frame(StereoFrame::Center)?;

    // --- Act ---
    let exports = session.exports()?;
    exports.clear_scene();
    exports.add_entity(&sprite(Vec3::new(400.0, 0.0, 10.0), [0, 255, 0, 255]), false);
    let mut hidden = sprite(Vec3::new(400.0, 50.0, 10.0), [255, 0, 255, 255]);
    hidden.renderfx = RenderFx::THIRD_PERSON;
    exports.add_entity(&hidden, false);
    exports.render_scene(&view_from(Vec3::new(100.0, 0.0, 10.0)))?;
    let shot = end_with_shot(&fixture, &mut session, "entities")?;

    // --- Assert ---
    assert_eq!(shot.get_pixel(320, 240).0, [0, 255, 0]);
    assert_eq!(shot.get_pixel(280, 240).0, [0, 0, 0]);
    Ok(())
}

#[test]
fn entities_in_clusters_the_view_cannot_see_are_culled() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session_with_world()?;
    session.begin_frame(StereoFrame::Center)?;

    let exports = session.exports()?;
    exports.add_entity(&sprite(Vec3::new(300.0, 0.0, 10.0), [0, 255, 0, 255]), false);
    // Cluster 0 does not see cluster 1.
    exports.render_scene(&view_from(Vec3::new(-400.0, 0.0, 10.0)))?;
    let shot = end_with_shot(&fixture, &mut session, "culled")?;

    assert_eq!(shot.get_pixel(320, 240).0, [0, 0, 0]);
    Ok(())
}

#[test]
fn a_second_render_without_adds_is_empty() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session_with_world()?;
    session.begin_frame(StereoFrame::Center)?;

    let exports = session.exports()?;
    exports.add_entity(&sprite(Vec3::new(400.0, 0.0, 10.0), [0, 255, 0, 255]), false);
    exports.render_scene(&view_from(Vec3::new(100.0, 0.0, 10.0)))?;
    exports.render_scene(&view_from(Vec3::new(100.0, 0.0, 10.0)))?;
    let shot = end_with_shot(&fixture, &mut session, "twice")?;

    assert_eq!(shot.get_pixel(320, 240).0, [0, 0, 0]);
    Ok(())
}

#[test]
fn hyperspace_views_clear_to_gray() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session_with_world()?;
    session.begin_frame(StereoFrame::Center)?;

    let fd = RefDef {
        rdflags: RdFlags::HYPERSPACE,
        time: 100,
        ..view_from(Vec3::new(100.0, 0.0, 10.0))
    };
    session.exports()?.render_scene(&fd)?;
    let shot = end_with_shot(&fixture, &mut session, "hyperspace")?;

    assert_eq!(shot.get_pixel(10, 10).0, [100, 100, 100]);
    Ok(())
}

#[test]
fn pvs_queries_use_the_host_visibility() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session("reference-gl")?;
    let cluster0 = Vec3::new(-100.0, 0.0, 10.0);
    let cluster1 = Vec3::new(100.0, 0.0, 10.0);
    session.exports()?.begin_registration()?;
    assert!(!session.exports()?.in_pvs(cluster0, cluster1));

    let mut session = fixture.session_with_world()?;
    let exports = session.exports()?;

    assert!(!exports.in_pvs(cluster0, cluster1));
    assert!(exports.in_pvs(cluster1, cluster0));
    assert!(exports.in_pvs(cluster0, cluster0));
    assert!(!exports.in_pvs(cluster0, Vec3::new(0.0, 0.0, 5000.0)));
    Ok(())
}

#[test]
fn light_grid_is_sampled_for_entities() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session_with_world()?;

    let light = session
        .exports()?
        .light_for_point(Vec3::new(0.0, 0.0, 10.0))
        .expect("world has a grid");

    // 40 << 2 overbright bits, scaled by r_ambientScale 0.6.
    assert_relative_eq!(light.ambient.x, 96.0, epsilon = 1e-2);
    assert_relative_eq!(light.directed.x, 255.0, epsilon = 1e-2);
    assert_relative_eq!(light.direction.z, 1.0, epsilon = 1e-5);
    Ok(())
}

#[test]
fn entity_tokens_walk_the_entity_string_and_rewind() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session_with_world()?;
    let exports = session.exports()?;

    let tokens: Vec<String> = std::iter::from_fn(|| exports.get_entity_token()).collect();

    assert_eq!(tokens.len(), 10);
    assert_eq!(tokens[1], "classname");
    assert_eq!(tokens[8], "0 0 24");
    assert_eq!(exports.get_entity_token().as_deref(), Some("{"));
    Ok(())
}

#[test]
fn decals_are_clipped_to_world_surfaces() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session_with_world()?;
    let decal = [
        Vec3::new(-8.0, -8.0, 8.0),
        Vec3::new(8.0, -8.0, 8.0),
        Vec3::new(8.0, 8.0, 8.0),
        Vec3::new(-8.0, 8.0, 8.0),
    ];
    let mut points = [Vec3::ZERO; 32];
    let mut fragments = [MarkFragment::default(); 4];

    let n = session.exports()?.mark_fragments(
        &decal,
        Vec3::new(0.0, 0.0, -16.0),
        32,
        &mut points,
        4,
        &mut fragments,
    );

    assert!(n >= 1);
    for fragment in &fragments[..n] {
        let run = &points[fragment.first_point..fragment.first_point + fragment.num_points];
        assert!(run.iter().all(|p| p.z.abs() < 1e-3 && p.x.abs() <= 8.0 + 1e-3));
    }
    Ok(())
}

#[test]
fn cinematic_shaders_stream_into_scratch_images() -> Result<()> {
    let fixture = Fixture::new()?;
    let blue = [0u8, 0, 255, 255].repeat(4);
    write(fixture.dir.path(), "video/intro", &encode_cinematic(2, 2, 10, &[blue]))?;
    let mut session = fixture.session("reference-gl")?;
    session.exports()?.begin_registration()?;
    let shader = session.exports()?.register_shader("video/intro.roq")?;
    assert!(shader.is_some());

    session.begin_frame(StereoFrame::Center)?;
    session.exports()?.draw_stretch_pic(&StretchPic {
        w: 640.0,
        h: 480.0,
        s2: 1.0,
        t2: 1.0,
        shader,
        ..Default::default()
    });
    let shot = end_with_shot(&fixture, &mut session, "cinematic")?;

    assert_eq!(shot.get_pixel(320, 240).0, [0, 0, 255]);
    assert_eq!(fixture.host.heap_tracker().live_blocks(), 1);
    session.shutdown(refresh_core::ShutdownCode::KeepContext);
    assert_eq!(fixture.host.heap_tracker().live_blocks(), 0);
    Ok(())
}

#[test]
fn raw_frames_are_drawn_per_client() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session("reference-gl")?;
    session.exports()?.begin_registration()?;
    session.begin_frame(StereoFrame::Center)?;

    let magenta = [255u8, 0, 255, 255].repeat(16);
    let exports = session.exports()?;
    exports.set_color(Some([1.0, 1.0, 1.0, 1.0]));
    exports.draw_stretch_raw(
        ScreenRect {
            x: 0,
            y: 0,
            w: 320,
            h: 240,
        },
        RawFrame {
            cols: 4,
            rows: 4,
            data: &magenta,
        },
        3,
        true,
    );
    // Out-of-range clients are ignored.
    exports.upload_cinematic(
        RawFrame {
            cols: 4,
            rows: 4,
            data: &magenta,
        },
        99,
        true,
    );
    let shot = end_with_shot(&fixture, &mut session, "raw")?;

    assert_eq!(shot.get_pixel(100, 100).0, [255, 0, 255]);
    assert_eq!(shot.get_pixel(500, 400).0, [0, 0, 0]);
    Ok(())
}

#[test]
fn video_frames_are_captured_at_end_of_frame() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session("reference-gl")?;
    session.exports()?.begin_registration()?;

    session.begin_frame(StereoFrame::Center)?;
    session.exports()?.take_video_frame(0, 0, false);
    session.end_frame()?;
    assert_eq!(fixture.host.client_state().video_frame_count(), 1);
    assert_eq!(fixture.host.client_state().last_video_frame().len(), 640 * 480 * 3);

    session.begin_frame(StereoFrame::Center)?;
    session.exports()?.take_video_frame(320, 240, true);
    session.end_frame()?;
    let jpeg = fixture.host.client_state().last_video_frame();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    assert_eq!(fixture.host.client_state().scaling(), (0.5, 320, 240));
    Ok(())
}

#[test]
fn oversized_video_frames_are_refused_without_capture() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session("reference-gl")?;
    session.exports()?.begin_registration()?;

    for (width, height) in [(40_000, 40_000), (u32::MAX, u32::MAX)] {
        session.begin_frame(StereoFrame::Center)?;
        session.exports()?.take_video_frame(width, height, false);
        session.end_frame()?;
    }

    assert_eq!(fixture.host.client_state().video_frame_count(), 0);
    session.begin_frame(StereoFrame::Center)?;
    session.exports()?.take_video_frame(0, 0, false);
    session.end_frame()?;
    assert_eq!(fixture.host.client_state().video_frame_count(), 1);
    Ok(())
}

#[test]
fn presentation_respects_minimize_and_throttle() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session("reference-gl")?;
    session.exports()?.begin_registration()?;

    session.begin_frame(StereoFrame::Center)?;
    let timings = session.end_frame()?;
    assert_eq!(fixture.host.headless().frames_presented(), 1);
    assert!(timings.front_end_ms < 1000);

    session.begin_frame(StereoFrame::Center)?;
    session.exports()?.throttle_backend();
    session.end_frame()?;
    assert_eq!(fixture.host.headless().frames_presented(), 1);

    fixture.host.client_state().set_minimized(true);
    assert!(!session.exports()?.can_minimize());
    session.begin_frame(StereoFrame::Center)?;
    session.end_frame()?;
    assert_eq!(fixture.host.headless().frames_presented(), 1);
    assert_eq!(session.frames(), 3);
    Ok(())
}

#[test]
fn console_screenshot_variants() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session_with_world()?;
    let commands = fixture.host.command_table();

    session.begin_frame(StereoFrame::Center)?;
    commands.execute_line("screenshotJPEG");
    commands.execute_line("screenshotBMP clipboard");
    commands.execute_line("screenshot levelshot");
    session.end_frame()?;

    let root = fixture.dir.path();
    assert!(root.join("screenshots/shot0000.jpg").exists());
    assert!(fixture.host.client_state().clipboard().is_some());
    let levelshot = image::open(root.join("levelshots/test.tga"))?;
    assert_eq!((levelshot.width(), levelshot.height()), (128, 128));

    // Numbered names skip files that already exist.
    session.begin_frame(StereoFrame::Center)?;
    commands.execute_line("screenshotJPEG");
    session.end_frame()?;
    assert!(root.join("screenshots/shot0001.jpg").exists());
    Ok(())
}

#[test]
fn gamma_changes_are_pushed_to_the_platform() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session("reference-gl")?;
    session.exports()?.begin_registration()?;
    let initial = fixture.host.headless().gamma().expect("gamma uploaded");

    fixture.host.command_table().execute_line("r_gamma 2");
    session.begin_frame(StereoFrame::Center)?;
    session.end_frame()?;

    let brighter = fixture.host.headless().gamma().expect("gamma uploaded");
    assert_ne!(initial, brighter);
    assert!(brighter.red[64] > initial.red[64]);
    Ok(())
}
