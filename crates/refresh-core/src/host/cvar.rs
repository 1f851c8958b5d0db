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

//! Console variables.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::refresh_bitflags;

refresh_bitflags! {
    /// Behaviour flags of a console variable.
    pub struct CvarFlags: u32 {
        /// Saved to the configuration file.
        const ARCHIVE = 1 << 0;
        /// Sent to the server on connect.
        const USERINFO = 1 << 1;
        /// Sent in response to front-end requests.
        const SERVERINFO = 1 << 2;
        /// Duplicated on all clients.
        const SYSTEMINFO = 1 << 3;
        /// Only settable from the command line.
        const INIT = 1 << 4;
        /// Changes are held until the subsystem restarts.
        const LATCH = 1 << 5;
        /// Read-only for the user.
        const ROM = 1 << 6;
        /// Created by a `set` command rather than by code.
        const USER_CREATED = 1 << 7;
        /// Never saved.
        const TEMP = 1 << 8;
        /// Only changeable when cheats are enabled.
        const CHEAT = 1 << 9;
        /// Not cleared on a subsystem restart.
        const NORESTART = 1 << 10;
        /// Only visible in developer mode.
        const DEVELOPER = 1 << 11;
    }
}

/// Restart group a variable belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CvarGroup {
    /// Not part of any group.
    #[default]
    None,
    /// Changing it requires a renderer restart.
    Renderer,
    /// Changing it requires a server restart.
    Server,
    /// Affects localisation.
    Language,
}

/// How values written into a variable are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CvarValidator {
    /// Any string.
    #[default]
    None,
    /// A floating point number, optionally clamped.
    Float,
    /// An integer, optionally clamped.
    Integer,
    /// A relative file-system path.
    FsPath,
}

#[derive(Debug)]
struct CvarState {
    string: String,
    reset_string: String,
    latched: Option<String>,
    description: Option<String>,
    group: CvarGroup,
    validator: CvarValidator,
    range: Option<(f32, f32)>,
}

/// A console variable shared between the host store and its users.
///
/// The renderer keeps the `Arc<Cvar>` it got from [`ConsoleVars::get`] and
/// reads it every frame. Writes from the renderer should go through
/// [`ConsoleVars::set`] so the host can validate them and track groups; the
/// raw setters here are for host implementations.
#[derive(Debug)]
pub struct Cvar {
    name: String,
    flags: CvarFlags,
    state: RwLock<CvarState>,
    modified: AtomicBool,
    modification_count: AtomicU32,
}

impl Cvar {
    /// Creates a variable holding `default`.
    pub fn new(name: &str, default: &str, flags: CvarFlags) -> Self {
        Self {
            name: name.to_owned(),
            flags,
            state: RwLock::new(CvarState {
                string: default.to_owned(),
                reset_string: default.to_owned(),
                latched: None,
                description: None,
                group: CvarGroup::None,
                validator: CvarValidator::None,
                range: None,
            }),
            modified: AtomicBool::new(true),
            modification_count: AtomicU32::new(1),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CvarState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CvarState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// The variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flags given at creation.
    pub fn flags(&self) -> CvarFlags {
        self.flags
    }

    /// The current value as text.
    pub fn string(&self) -> String {
        self.read().string.clone()
    }

    /// The current value parsed as a float, `0.0` if it is not a number.
    pub fn value(&self) -> f32 {
        self.read().string.trim().parse().unwrap_or(0.0)
    }

    /// The current value parsed as an integer.
    ///
    /// Like `atoi`, a fractional value is truncated and junk is `0`.
    pub fn integer(&self) -> i32 {
        let state = self.read();
        let text = state.string.trim();
        text.parse::<i32>()
            .or_else(|_| text.parse::<f32>().map(|f| f as i32))
            .unwrap_or(0)
    }

    /// `true` when the integer value is non-zero.
    pub fn enabled(&self) -> bool {
        self.integer() != 0
    }

    /// The value the variable was created with.
    pub fn reset_string(&self) -> String {
        self.read().reset_string.clone()
    }

    /// A value waiting for the next restart, for latched variables.
    pub fn latched(&self) -> Option<String> {
        self.read().latched.clone()
    }

    /// The help text, if any.
    pub fn description(&self) -> Option<String> {
        self.read().description.clone()
    }

    /// The restart group.
    pub fn group(&self) -> CvarGroup {
        self.read().group
    }

    /// The validator and optional clamp range.
    pub fn validation(&self) -> (CvarValidator, Option<(f32, f32)>) {
        let state = self.read();
        (state.validator, state.range)
    }

    /// `true` if the value changed since the last [`clear_modified`].
    ///
    /// [`clear_modified`]: Cvar::clear_modified
    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::Acquire)
    }

    /// Acknowledges a change.
    pub fn clear_modified(&self) {
        self.modified.store(false, Ordering::Release);
    }

    /// Number of times the value changed.
    pub fn modification_count(&self) -> u32 {
        self.modification_count.load(Ordering::Acquire)
    }

    /// Stores an already validated value. Returns `true` if it differs from
    /// the previous one.
    pub fn store(&self, value: &str) -> bool {
        let mut state = self.write();
        if state.string == value {
            state.latched = None;
            return false;
        }
        state.string = value.to_owned();
        state.latched = None;
        drop(state);
        self.modified.store(true, Ordering::Release);
        self.modification_count.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Holds a value until the owning subsystem restarts.
    pub fn store_latched(&self, value: &str) {
        let mut state = self.write();
        state.latched = if state.string == value {
            None
        } else {
            Some(value.to_owned())
        };
    }

    /// Promotes a latched value, if any. Returns `true` if the value changed.
    pub fn apply_latched(&self) -> bool {
        let latched = self.write().latched.take();
        match latched {
            Some(value) => self.store(&value),
            None => false,
        }
    }

    /// Sets the help text.
    pub fn store_description(&self, description: &str) {
        self.write().description = Some(description.to_owned());
    }

    /// Sets the restart group.
    pub fn store_group(&self, group: CvarGroup) {
        self.write().group = group;
    }

    /// Sets the validator and clamp range.
    pub fn store_validation(&self, validator: CvarValidator, range: Option<(f32, f32)>) {
        let mut state = self.write();
        state.validator = validator;
        state.range = range;
    }
}

/// The console variable store.
pub trait ConsoleVars: Send + Sync {
    /// Returns the variable `name`, creating it with `default` if needed.
    ///
    /// If the variable already exists its value is kept and `flags` are only
    /// used for newly created variables.
    fn get(&self, name: &str, default: &str, flags: CvarFlags) -> Arc<Cvar>;

    /// Sets a variable by name, creating it as user-created if missing.
    fn set(&self, name: &str, value: &str);

    /// Sets a numeric value.
    fn set_value(&self, name: &str, value: f32);

    /// Installs a validator and an optional `[min, max]` range given as text
    /// (an empty bound means unbounded), then re-validates the current value.
    fn check_range(&self, cvar: &Cvar, min: &str, max: &str, validator: CvarValidator);

    /// Attaches help text.
    fn set_description(&self, cvar: &Cvar, description: &str);

    /// Puts the variable in a restart group.
    fn set_group(&self, cvar: &Cvar, group: CvarGroup);

    /// `true` if any variable of `group` changed since the last reset.
    fn check_group(&self, group: CvarGroup) -> bool;

    /// Clears the modified state of `group`, and optionally of each member.
    fn reset_group(&self, group: CvarGroup, reset_modified_flags: bool);

    /// Value of `name` as text, empty if it does not exist.
    fn variable_string(&self, name: &str) -> String;

    /// Value of `name` as an integer, `0` if it does not exist.
    fn variable_integer(&self, name: &str) -> i32;
}
