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

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use common::Fixture;
use refresh_core::exports::{GraphicsFamily, RdFlags, RefDef};
use refresh_core::{
    ErrorLevel, HostServices, RendererExports, StereoFrame, REF_API_VERSION,
};
use refresh_infra::reference::{get_ref_api_gl, get_ref_api_vk};
use refresh_infra::{LoadError, ModuleRegistry, SessionError};

static PROBE_CALLS: AtomicUsize = AtomicUsize::new(0);
static PROBE_VERSION: AtomicU32 = AtomicU32::new(0);

fn probe_entry(api_version: u32, _host: Arc<dyn HostServices>) -> Option<Box<dyn RendererExports>> {
    PROBE_CALLS.fetch_add(1, Ordering::SeqCst);
    PROBE_VERSION.store(api_version, Ordering::SeqCst);
    None
}

#[test]
fn refused_version_keeps_no_reference_to_the_host() -> Result<()> {
    // --- Arrange ---
    let fixture = Fixture::new()?;
    let host: Arc<dyn HostServices> = fixture.host.clone();
    let before = Arc::strong_count(&fixture.host);

    // --- Act ---
    let gl = get_ref_api_gl(REF_API_VERSION - 1, host.clone());
    let vk = get_ref_api_vk(REF_API_VERSION + 1, host.clone());
    drop(host);

    // --- Assert ---
    assert!(gl.is_none());
    assert!(vk.is_none());
    assert_eq!(Arc::strong_count(&fixture.host), before - 1);
    assert!(!fixture.host.headless().window_open());
    Ok(())
}

#[test]
fn accepted_table_is_inert_until_registration() -> Result<()> {
    let fixture = Fixture::new()?;
    let exports = get_ref_api_gl(REF_API_VERSION, fixture.host.clone());

    assert!(exports.is_some());
    assert!(!fixture.host.headless().window_open());
    assert!(!fixture.host.command_table().contains("gfxinfo"));
    assert!(fixture.host.cvar_store().find("r_gamma").is_none());
    Ok(())
}

#[test]
fn registry_passes_the_requested_version_to_the_entry_point() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut registry = ModuleRegistry::new();
    registry.register("probe", probe_entry);

    let err = registry.load("probe", 42, fixture.host.clone()).unwrap_err();

    assert_eq!(PROBE_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(PROBE_VERSION.load(Ordering::SeqCst), 42);
    assert_eq!(
        err,
        LoadError::Refused {
            name: "probe".into(),
            version: 42
        }
    );
    assert_eq!(Arc::strong_count(&fixture.host), 1);
    Ok(())
}

#[test]
fn each_family_reports_itself_in_the_config() -> Result<()> {
    for (module, family) in [
        ("reference-gl", GraphicsFamily::OpenGl),
        ("reference-vk", GraphicsFamily::Vulkan),
    ] {
        let fixture = Fixture::new()?;
        let mut session = fixture.session(module)?;
        let config = session.exports()?.begin_registration()?;

        assert_eq!(config.family, family);
        assert_eq!((config.vid_width, config.vid_height), (640, 480));
        assert_eq!(session.exports()?.config(), &config);
        assert!(fixture.host.headless().context_active());
    }
    Ok(())
}

#[test]
fn fatal_errors_travel_through_the_host_channel() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session("reference-gl")?;
    session.exports()?.begin_registration()?;

    // A view of the world with no world loaded.
    let err = session
        .exports()?
        .render_scene(&RefDef {
            width: 640,
            height: 480,
            ..Default::default()
        })
        .unwrap_err();

    assert_eq!(err.level, ErrorLevel::Drop);
    assert!(!err.level.is_terminal());
    assert_eq!(fixture.host.console().last_fatal(), Some(err));

    // NO_WORLD_MODEL views are fine without a world.
    session.exports()?.render_scene(&RefDef {
        width: 640,
        height: 480,
        rdflags: RdFlags::NO_WORLD_MODEL,
        ..Default::default()
    })?;
    Ok(())
}

#[test]
fn stereo_frames_are_validated() -> Result<()> {
    let fixture = Fixture::new()?;
    let mut session = fixture.session("reference-gl")?;
    session.exports()?.begin_registration()?;

    let err = session.begin_frame(StereoFrame::Left).unwrap_err();

    match err {
        SessionError::Fatal(fatal) => assert_eq!(fatal.level, ErrorLevel::Fatal),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!session.in_frame());
    Ok(())
}

#[test]
fn missing_module_is_an_error_not_a_panic() {
    let registry = ModuleRegistry::with_builtins();
    let host = Arc::new(
        refresh_infra::StandardHost::new(Default::default()).expect("default host"),
    );
    let err = registry.load("software", REF_API_VERSION, host).unwrap_err();
    assert_eq!(err, LoadError::UnknownModule("software".into()));
}
