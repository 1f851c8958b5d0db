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

//! Opaque resource handles.

use std::fmt;

use serde::{Deserialize, Serialize};

const INDEX_BITS: u32 = 32;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// The kind of resource a handle was issued for.
///
/// Each kind has its own namespace: a model handle and a shader handle may
/// carry the same integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// A mesh or brush model.
    Model,
    /// A surface-to-shader mapping for a model.
    Skin,
    /// A material, mipmapped or not.
    Shader,
    /// A bitmap font.
    Font,
}

/// An opaque, non-zero identifier for a registered resource.
///
/// Zero ([`Handle::NONE`]) means "not found". A handle is only meaningful within
/// the registration epoch that issued it: the low bits carry a slot index and
/// the high bits carry the full counter of the issuing epoch, so a renderer can
/// recognise a stale handle instead of silently resolving it to whatever now
/// occupies the same slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u64);

impl Handle {
    /// The "not found" sentinel.
    pub const NONE: Self = Self(0);

    /// Largest slot index that fits in a handle.
    pub const MAX_INDEX: u32 = u32::MAX;

    /// Builds a handle from an epoch counter and a 1-based slot index.
    ///
    /// Returns [`Handle::NONE`] for index `0`.
    pub const fn compose(epoch: u32, index: u32) -> Self {
        if index == 0 {
            return Self::NONE;
        }
        Self(((epoch as u64) << INDEX_BITS) | index as u64)
    }

    /// Reinterprets a raw integer received from the other side of the boundary.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// `true` for anything but the sentinel.
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    /// `true` for the sentinel.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// The 1-based slot index.
    pub const fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    /// The epoch counter the handle was issued in.
    pub const fn epoch(self) -> u32 {
        (self.0 >> INDEX_BITS) as u32
    }

    /// Returns `true` if this handle was issued during `epoch`.
    ///
    /// A raw value with a zero index never belongs to any epoch.
    pub const fn belongs_to(self, epoch: u32) -> bool {
        self.index() != 0 && self.epoch() == epoch
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "Handle(NONE)")
        } else {
            write!(
                f,
                "Handle(epoch {}, #{})",
                self.epoch(),
                self.index()
            )
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_index_is_the_sentinel() {
        assert_eq!(Handle::compose(3, 0), Handle::NONE);
        assert!(Handle::NONE.is_none());
        assert!(!Handle::NONE.belongs_to(0));
    }

    #[test]
    fn composed_handle_is_non_zero_even_in_epoch_zero() {
        let h = Handle::compose(0, 1);
        assert!(h.is_some());
        assert_eq!(h.index(), 1);
        assert!(h.belongs_to(0));
    }

    #[test]
    fn handle_from_previous_epoch_is_recognised() {
        let old = Handle::compose(4, 7);
        let new = Handle::compose(5, 7);
        assert_ne!(old, new);
        assert_eq!(old.index(), new.index());
        assert!(!old.belongs_to(5));
        assert!(new.belongs_to(5));
    }

    #[test]
    fn largest_index_and_epoch_survive_packing() {
        let h = Handle::compose(u32::MAX, Handle::MAX_INDEX);
        assert_eq!(h.index(), Handle::MAX_INDEX);
        assert_eq!(h.epoch(), u32::MAX);
    }

    #[test]
    fn raw_value_without_an_index_belongs_nowhere() {
        let h = Handle::from_raw(1 << INDEX_BITS);
        assert!(h.is_some());
        assert_eq!(h.index(), 0);
        assert!(!h.belongs_to(1));
    }

    #[test]
    fn distant_epochs_never_alias() {
        let old = Handle::compose(1, 1);
        assert!(!old.belongs_to(1 + 4096));
        assert!(!old.belongs_to(1 + (1 << 20)));
    }
}
