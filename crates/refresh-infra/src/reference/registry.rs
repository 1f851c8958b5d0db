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

//! Name-keyed resource tables with epoch-tagged handles.
//!
//! Every table is cleared when a registration epoch begins. Handles carry the
//! epoch they were issued in, so a handle kept across a level change resolves
//! to nothing instead of to whatever now occupies its slot.

use std::collections::HashMap;

use refresh_core::{Handle, HandleKind};

/// Longest accepted resource name, terminator included.
pub const MAX_QPATH: usize = 64;

/// Lowercases and turns backslashes into slashes.
pub fn normalize_name(name: &str) -> String {
    name.replace('\\', "/").to_ascii_lowercase()
}

/// Strips a trailing extension, keeping directory dots intact.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if !name[dot..].contains('/') => &name[..dot],
        _ => name,
    }
}

/// What a lookup found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Registered in this epoch.
    Found(Handle),
    /// Already tried in this epoch and known to be missing.
    Missing,
    /// Never asked for in this epoch.
    Unknown,
}

#[derive(Debug)]
struct Slot<T> {
    name: String,
    value: T,
}

/// One kind of resource.
#[derive(Debug)]
pub struct ResourceTable<T> {
    kind: HandleKind,
    capacity: usize,
    slots: Vec<Slot<T>>,
    by_name: HashMap<String, Option<u32>>,
}

impl<T> ResourceTable<T> {
    /// Creates an empty table that holds at most `capacity` entries.
    pub fn new(kind: HandleKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity: capacity.min(Handle::MAX_INDEX as usize),
            slots: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// What kind of resource lives here.
    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// Looks `key` up (already normalized) among this epoch's entries.
    pub fn lookup(&self, epoch: u32, key: &str) -> Lookup {
        match self.by_name.get(key) {
            Some(Some(index)) => Lookup::Found(Handle::compose(epoch, *index)),
            Some(None) => Lookup::Missing,
            None => Lookup::Unknown,
        }
    }

    /// `true` once no further entry fits.
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Stores `value` under `key` and returns its handle, or
    /// [`Handle::NONE`] if the table is full.
    pub fn insert(&mut self, epoch: u32, key: &str, value: T) -> Handle {
        if self.is_full() {
            return Handle::NONE;
        }
        self.slots.push(Slot {
            name: key.to_owned(),
            value,
        });
        let index = self.slots.len() as u32;
        self.by_name.insert(key.to_owned(), Some(index));
        Handle::compose(epoch, index)
    }

    /// Remembers that `key` could not be loaded this epoch.
    pub fn remember_missing(&mut self, key: &str) {
        self.by_name.entry(key.to_owned()).or_insert(None);
    }

    fn position(epoch: u32, handle: Handle) -> Option<usize> {
        if !handle.belongs_to(epoch) {
            return None;
        }
        (handle.index() as usize).checked_sub(1)
    }

    fn slot(&self, epoch: u32, handle: Handle) -> Option<&Slot<T>> {
        self.slots.get(Self::position(epoch, handle)?)
    }

    /// The entry behind `handle`, if it was issued in `epoch`.
    pub fn get(&self, epoch: u32, handle: Handle) -> Option<&T> {
        self.slot(epoch, handle).map(|s| &s.value)
    }

    /// The mutable entry behind `handle`, if it was issued in `epoch`.
    pub fn get_mut(&mut self, epoch: u32, handle: Handle) -> Option<&mut T> {
        let position = Self::position(epoch, handle)?;
        self.slots.get_mut(position).map(|s| &mut s.value)
    }

    /// The registered name behind `handle`.
    pub fn name(&self, epoch: u32, handle: Handle) -> Option<&str> {
        self.slot(epoch, handle).map(|s| s.name.as_str())
    }

    /// Number of loaded entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// `true` when nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Loaded entries in registration order with their names.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.slots.iter().map(|s| (s.name.as_str(), &s.value))
    }

    /// Forgets every entry and every cached miss.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.by_name.clear();
    }
}

/// A redirection installed by `remap_shader`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderRemap {
    /// The shader drawn instead.
    pub target: Handle,
    /// Added to the shader clock of the target.
    pub time_offset: f32,
}

/// Tracks the current registration epoch and the shader remaps made in it.
#[derive(Debug, Default)]
pub struct EpochTracker {
    epoch: u32,
    remaps: HashMap<String, ShaderRemap>,
}

impl EpochTracker {
    /// The current epoch.
    pub fn current(&self) -> u32 {
        self.epoch
    }

    /// Opens a new epoch; every handle issued so far goes stale.
    ///
    /// Returns `None` once the counter is exhausted. The counter never wraps,
    /// so no earlier handle can match a later epoch.
    pub fn advance(&mut self) -> Option<u32> {
        self.epoch = self.epoch.checked_add(1)?;
        self.remaps.clear();
        Some(self.epoch)
    }

    /// Redirects `old` (a normalized key) to `remap`, or removes the
    /// redirection when `remap` is `None`.
    pub fn set_remap(&mut self, old: &str, remap: Option<ShaderRemap>) {
        match remap {
            Some(remap) => {
                self.remaps.insert(old.to_owned(), remap);
            }
            None => {
                self.remaps.remove(old);
            }
        }
    }

    /// The redirection of `key`, if any.
    pub fn remap(&self, key: &str) -> Option<&ShaderRemap> {
        self.remaps.get(key)
    }
}
