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

//! Headless runtime.
//!
//! Usage: `refresh-runtime [config.json]`. Loads the configured renderer
//! module over a [`StandardHost`], optionally loads a world, renders
//! `frames` frames from the player start and unloads the module.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use refresh_core::exports::{RdFlags, RefDef};
use refresh_core::math::Vec3;
use refresh_core::{RendererExports, ShutdownCode, StereoFrame, REF_API_VERSION};
use refresh_infra::{HostConfig, ModuleRegistry, RendererSession, SessionError, StandardHost};

/// Eye height above the spawn origin.
const VIEW_HEIGHT: f32 = 26.0;

/// Finds the `origin` of the first `info_player_start` in the entity string.
fn spawn_origin(exports: &mut dyn RendererExports) -> Option<Vec3> {
    let mut spawn = None;
    let mut origin = None;
    let mut is_spawn = false;
    let mut key: Option<String> = None;
    // Walks the whole string so the next reader starts from the top.
    while let Some(token) = exports.get_entity_token() {
        match token.as_str() {
            "{" => {
                origin = None;
                is_spawn = false;
            }
            "}" => {
                if is_spawn && spawn.is_none() {
                    spawn = origin;
                }
            }
            _ => match key.take() {
                None => key = Some(token),
                Some(k) if k == "classname" => is_spawn = token == "info_player_start",
                Some(k) if k == "origin" => {
                    let v: Vec<f32> = token.split_whitespace().filter_map(|s| s.parse().ok()).collect();
                    if let [x, y, z] = v[..] {
                        origin = Some(Vec3::new(x, y, z));
                    }
                }
                Some(_) => {}
            },
        }
    }
    spawn
}

/// Registers, loads the configured world and returns the view origin when a
/// world is up.
fn load_level(host: &StandardHost, session: &mut RendererSession, map: Option<&str>) -> Result<Option<Vec3>, SessionError> {
    if map.is_some() {
        host.clear_level();
    }
    let exports = session.exports()?;
    let config = exports.begin_registration()?;
    log::info!(
        "{} {}x{} ({:?})",
        config.renderer_string,
        config.vid_width,
        config.vid_height,
        config.family
    );
    let mut eye = None;
    if let Some(map) = map {
        match exports.load_world(map) {
            Ok(()) => {
                if let Some(vis) = host.load_map_vis(map) {
                    exports.set_world_vis_data(vis);
                }
                let origin = spawn_origin(exports).unwrap_or(Vec3::ZERO);
                eye = Some(origin + Vec3::new(0.0, 0.0, VIEW_HEIGHT));
            }
            Err(err) => log::warn!("Running without a world: {err}"),
        }
    }
    exports.end_registration();
    Ok(eye)
}

fn render_frame(session: &mut RendererSession, fd: &RefDef) -> Result<(), SessionError> {
    session.begin_frame(StereoFrame::Center)?;
    let exports = session.exports()?;
    exports.clear_scene();
    exports.render_scene(fd)?;
    let timings = session.end_frame()?;
    log::debug!(
        "frame {}: fe {}ms be {}ms",
        session.frames(),
        timings.front_end_ms,
        timings.back_end_ms
    );
    Ok(())
}

fn run(config: &HostConfig, host: &Arc<StandardHost>, session: &mut RendererSession) -> Result<(), SessionError> {
    let mut eye = load_level(host, session, config.map.as_deref())?;
    host.command_table().execute_line("gfxinfo");

    for frame in 0..config.frames {
        host.pump_commands();
        let (width, height) = {
            let gl = session.exports()?.config();
            (gl.vid_width as i32, gl.vid_height as i32)
        };
        let fd = RefDef {
            width,
            height,
            vieworg: eye.unwrap_or(Vec3::ZERO),
            time: frame as i32 * 16,
            rdflags: if eye.is_some() { RdFlags::EMPTY } else { RdFlags::NO_WORLD_MODEL },
            ..Default::default()
        };
        match render_frame(session, &fd) {
            Ok(()) => {}
            Err(SessionError::Fatal(err)) if !err.level.is_terminal() => {
                log::warn!("Level dropped: {err}");
                session.shutdown(ShutdownCode::KeepContext);
                host.console().clear_fatal();
                eye = load_level(host, session, None)?;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    let config = match std::env::args_os().nth(1) {
        Some(path) => HostConfig::load(Path::new(&path))?,
        None => HostConfig::default(),
    };
    Builder::from_env(Env::default().default_filter_or(config.log_filter.as_str())).init();

    let host = Arc::new(StandardHost::new(config.clone())?);
    let mut session = ModuleRegistry::with_builtins()
        .load(&config.renderer, REF_API_VERSION, host.clone())
        .with_context(|| format!("loading renderer '{}'", config.renderer))?;

    let result = run(&config, &host, &mut session);
    session.shutdown(ShutdownCode::UnloadModule);
    match result {
        Ok(()) => {
            log::info!("Rendered {} frames", session.frames());
            Ok(())
        }
        Err(err) => {
            log::error!("{err}");
            std::process::exit(1);
        }
    }
}
