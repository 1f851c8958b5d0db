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

use std::sync::Arc;

use anyhow::Result;
use common::Fixture;
use refresh_core::exports::StretchPic;
use refresh_core::host::Teardown;
use refresh_core::{ShutdownCode, StereoFrame};
use refresh_infra::reference::RENDERER_COMMANDS;
use refresh_infra::SessionError;

fn assert_commands_removed(fixture: &Fixture) {
    for name in RENDERER_COMMANDS {
        assert!(!fixture.host.command_table().contains(name), "{name} still registered");
    }
}

#[test]
fn each_level_tears_down_as_far_as_it_names() -> Result<()> {
    let cases = [
        (ShutdownCode::KeepContext, None),
        (ShutdownCode::KeepWindow, Some(Teardown::Context)),
        (ShutdownCode::DestroyWindow, Some(Teardown::Window)),
        (ShutdownCode::UnloadModule, Some(Teardown::Unload)),
    ];
    for (code, expected) in cases {
        // --- Arrange ---
        let fixture = Fixture::new()?;
        let mut session = fixture.session_with_world()?;

        // --- Act ---
        session.shutdown(code);

        // --- Assert ---
        assert_eq!(fixture.host.headless().teardowns().last().copied(), expected, "{code:?}");
        assert_commands_removed(&fixture);
        assert_eq!(fixture.host.headless().context_active(), code == ShutdownCode::KeepContext);
        assert_eq!(fixture.host.headless().window_open(), code < ShutdownCode::DestroyWindow);
    }
    Ok(())
}

#[test]
fn keep_context_drops_level_data_only() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session_with_world()?;
    let model = session.exports()?.register_model("models/crate.md3")?;

    session.shutdown(ShutdownCode::KeepContext);
    let config = session.exports()?.begin_registration()?;

    assert_eq!(config.vid_width, 640);
    assert!(fixture.host.headless().teardowns().is_empty());
    assert!(session.exports()?.get_entity_token().is_none());
    assert!(session.exports()?.lerp_tag(model, 0, 0, 0.0, "tag_weapon").is_none());
    assert!(fixture.host.command_table().contains("gfxinfo"));
    Ok(())
}

#[test]
fn registration_after_keep_window_brings_the_context_back() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session_with_world()?;

    session.shutdown(ShutdownCode::KeepWindow);
    assert!(!fixture.host.headless().context_active());
    assert!(fixture.host.headless().window_open());
    let config = session.exports()?.begin_registration()?;
    session.begin_frame(StereoFrame::Center)?;
    session.end_frame()?;

    assert!(fixture.host.headless().context_active());
    assert_eq!(config.vid_height, 480);
    assert_eq!(fixture.host.headless().frames_presented(), 1);
    Ok(())
}

#[test]
fn unloading_releases_the_host_and_its_memory() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session("reference-gl")?;
    session.exports()?.begin_registration()?;
    let raw = [9u8; 4 * 4 * 4];
    session.exports()?.upload_cinematic(
        refresh_core::exports::RawFrame {
            cols: 4,
            rows: 4,
            data: &raw,
        },
        0,
        true,
    );
    assert_eq!(fixture.host.heap_tracker().live_blocks(), 1);
    assert!(Arc::strong_count(&fixture.host) > 1);

    session.shutdown(ShutdownCode::UnloadModule);

    assert_eq!(fixture.host.heap_tracker().live_blocks(), 0);
    assert_eq!(Arc::strong_count(&fixture.host), 1);
    assert!(!session.is_loaded());
    assert!(matches!(session.exports(), Err(SessionError::Unloaded)));
    // A second unload is a no-op.
    session.shutdown(ShutdownCode::UnloadModule);
    assert_eq!(fixture.host.headless().teardowns(), [Teardown::Unload]);
    Ok(())
}

#[test]
fn dropping_a_session_unloads_the_module() -> Result<()> {
    let fixture = Fixture::new()?;
    {
        let mut session = fixture.session("reference-vk")?;
        session.exports()?.begin_registration()?;
    }

    assert_eq!(fixture.host.headless().teardowns(), [Teardown::Unload]);
    assert_eq!(Arc::strong_count(&fixture.host), 1);
    assert_commands_removed(&fixture);
    Ok(())
}

#[test]
fn drawing_between_shutdown_and_registration_is_ignored() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session_with_world()?;
    session.shutdown(ShutdownCode::KeepContext);

    let exports = session.exports()?;
    exports.begin_frame(StereoFrame::Center)?;
    exports.draw_stretch_pic(&StretchPic {
        w: 64.0,
        h: 64.0,
        ..Default::default()
    });
    exports.end_frame(None)?;

    assert_eq!(fixture.host.headless().frames_presented(), 0);
    Ok(())
}
