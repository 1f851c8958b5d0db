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

//! Host-side module loading.
//!
//! Renderer modules are known by name through a [`ModuleRegistry`]. Loading
//! one negotiates the interface revision and yields a [`RendererSession`],
//! which owns the operation table until the module is unloaded.

use std::collections::BTreeMap;
use std::sync::Arc;

use refresh_core::exports::FrameTimings;
use refresh_core::{
    FatalError, HostServices, RefEntryPoint, RendererExports, ShutdownCode, StereoFrame,
};
use thiserror::Error;

use crate::reference;

/// Errors raised while loading a renderer module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// No module is registered under that name.
    #[error("no renderer module named '{0}'")]
    UnknownModule(String),
    /// The entry point returned no operation table.
    #[error("renderer module '{name}' refused API version {version}")]
    Refused {
        /// Module name.
        name: String,
        /// The revision the host asked for.
        version: u32,
    },
}

/// Errors raised by a [`RendererSession`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The module was shut down with [`ShutdownCode::UnloadModule`].
    #[error("the renderer module has been unloaded")]
    Unloaded,
    /// `begin_frame`/`end_frame` were not called in pairs.
    #[error("frame bracket violated: {0}")]
    Bracket(&'static str),
    /// The renderer raised a fatal error.
    #[error(transparent)]
    Fatal(#[from] FatalError),
}

/// Named renderer entry points.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, RefEntryPoint>,
}

impl ModuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the reference renderer in both graphics families,
    /// as `reference-gl` and `reference-vk`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("reference-gl", reference::get_ref_api_gl);
        registry.register("reference-vk", reference::get_ref_api_vk);
        registry
    }

    /// Adds or replaces a module.
    pub fn register(&mut self, name: &str, entry: RefEntryPoint) {
        if self.modules.insert(name.to_owned(), entry).is_some() {
            log::debug!("Renderer module '{name}' replaced");
        }
    }

    /// Registered module names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Calls the entry point of `name` with `api_version`.
    ///
    /// On refusal the module has dropped `host` without keeping a clone.
    pub fn load(
        &self,
        name: &str,
        api_version: u32,
        host: Arc<dyn HostServices>,
    ) -> Result<RendererSession, LoadError> {
        let entry = self
            .modules
            .get(name)
            .ok_or_else(|| LoadError::UnknownModule(name.to_owned()))?;
        match entry(api_version, host) {
            Some(exports) => {
                log::info!("Loaded renderer module '{name}' (API {api_version})");
                Ok(RendererSession {
                    name: name.to_owned(),
                    exports: Some(exports),
                    in_frame: false,
                    frames: 0,
                })
            }
            None => {
                log::warn!("Renderer module '{name}' refused API version {api_version}");
                Err(LoadError::Refused {
                    name: name.to_owned(),
                    version: api_version,
                })
            }
        }
    }
}

/// A loaded renderer module.
///
/// Dropping a session that is still loaded unloads the module.
pub struct RendererSession {
    name: String,
    exports: Option<Box<dyn RendererExports>>,
    in_frame: bool,
    frames: u64,
}

impl std::fmt::Debug for RendererSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererSession")
            .field("name", &self.name)
            .field("loaded", &self.is_loaded())
            .field("in_frame", &self.in_frame)
            .field("frames", &self.frames)
            .finish()
    }
}

impl RendererSession {
    /// Name the module was loaded under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `false` once the module has been unloaded.
    pub fn is_loaded(&self) -> bool {
        self.exports.is_some()
    }

    /// `true` between `begin_frame` and `end_frame`.
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Frames completed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// The operation table.
    pub fn exports(&mut self) -> Result<&mut dyn RendererExports, SessionError> {
        match self.exports.as_deref_mut() {
            Some(exports) => Ok(exports),
            None => Err(SessionError::Unloaded),
        }
    }

    /// Opens a frame.
    pub fn begin_frame(&mut self, stereo: StereoFrame) -> Result<(), SessionError> {
        if self.in_frame {
            return Err(SessionError::Bracket("begin_frame inside an open frame"));
        }
        self.exports()?.begin_frame(stereo)?;
        self.in_frame = true;
        Ok(())
    }

    /// Closes the open frame and returns its timings.
    pub fn end_frame(&mut self) -> Result<FrameTimings, SessionError> {
        if !self.in_frame {
            return Err(SessionError::Bracket("end_frame without begin_frame"));
        }
        let mut timings = FrameTimings::default();
        // The bracket closes even when the frame failed.
        self.in_frame = false;
        self.exports()?.end_frame(Some(&mut timings))?;
        self.frames += 1;
        Ok(timings)
    }

    /// Shuts the module down at `code`. After
    /// [`ShutdownCode::UnloadModule`] the operation table is released and
    /// every further call fails with [`SessionError::Unloaded`].
    pub fn shutdown(&mut self, code: ShutdownCode) {
        let Some(exports) = self.exports.as_deref_mut() else {
            return;
        };
        exports.shutdown(code);
        self.in_frame = false;
        if code == ShutdownCode::UnloadModule {
            self.exports = None;
            log::info!("Renderer module '{}' unloaded", self.name);
        }
    }
}

impl Drop for RendererSession {
    fn drop(&mut self) {
        self.shutdown(ShutdownCode::UnloadModule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refresh_core::REF_API_VERSION;

    use crate::host::{HostConfig, StandardHost};

    fn host() -> Arc<StandardHost> {
        Arc::new(StandardHost::new(HostConfig::default()).expect("host"))
    }

    #[test]
    fn builtins_are_listed() {
        let registry = ModuleRegistry::with_builtins();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["reference-gl", "reference-vk"]);
    }

    #[test]
    fn unknown_module_is_reported() {
        let registry = ModuleRegistry::new();
        let err = registry.load("nope", REF_API_VERSION, host()).unwrap_err();
        assert_eq!(err, LoadError::UnknownModule("nope".into()));
    }

    #[test]
    fn mismatched_version_is_refused() {
        let registry = ModuleRegistry::with_builtins();
        let err = registry
            .load("reference-gl", REF_API_VERSION + 1, host())
            .unwrap_err();
        assert!(matches!(err, LoadError::Refused { version, .. } if version == REF_API_VERSION + 1));
    }

    #[test]
    fn frame_bracket_is_enforced() {
        let registry = ModuleRegistry::with_builtins();
        let mut session = registry.load("reference-gl", REF_API_VERSION, host()).expect("load");
        session.exports().expect("exports").begin_registration().expect("registration");
        assert_eq!(
            session.end_frame().unwrap_err(),
            SessionError::Bracket("end_frame without begin_frame")
        );
        session.begin_frame(StereoFrame::Center).expect("begin");
        assert!(session.begin_frame(StereoFrame::Center).is_err());
        session.end_frame().expect("end");
        assert_eq!(session.frames(), 1);
    }

    #[test]
    fn unloaded_session_refuses_calls() {
        let registry = ModuleRegistry::with_builtins();
        let mut session = registry.load("reference-vk", REF_API_VERSION, host()).expect("load");
        session.shutdown(ShutdownCode::UnloadModule);
        assert!(!session.is_loaded());
        assert!(matches!(session.exports(), Err(SessionError::Unloaded)));
        assert_eq!(
            session.begin_frame(StereoFrame::Center).unwrap_err(),
            SessionError::Unloaded
        );
    }
}
