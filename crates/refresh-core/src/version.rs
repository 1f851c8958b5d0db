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

//! Load-time capability negotiation.
//!
//! A renderer module exposes exactly one [`RefEntryPoint`]. The host calls it
//! with the revision it was compiled against and its service table; the module
//! either hands back a complete [`RendererExports`] or nothing at all.

use std::sync::Arc;

use crate::error::VersionMismatch;
use crate::exports::RendererExports;
use crate::host::HostServices;

/// Revision of the host/renderer contract.
///
/// Must be incremented whenever the shape of either [`HostServices`] or
/// [`RendererExports`] changes.
pub const REF_API_VERSION: u32 = 8;

/// The single entry point a renderer module exports.
///
/// Returns `None` when the module refuses the requested revision or cannot
/// reach a valid state. In that case the module must not have kept any clone
/// of the service table.
pub type RefEntryPoint =
    fn(api_version: u32, host: Arc<dyn HostServices>) -> Option<Box<dyn RendererExports>>;

/// Checks a requested revision against [`REF_API_VERSION`].
///
/// This is pure: it never touches the host, so a mismatch has no side effects.
pub fn negotiate(requested: u32) -> Result<(), VersionMismatch> {
    if requested == REF_API_VERSION {
        Ok(())
    } else {
        Err(VersionMismatch {
            expected: REF_API_VERSION,
            requested,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_version_is_accepted() {
        assert!(negotiate(REF_API_VERSION).is_ok());
    }

    #[test]
    fn any_other_version_is_rejected() {
        for requested in [0, 1, REF_API_VERSION - 1, REF_API_VERSION + 1, u32::MAX] {
            let err = negotiate(requested).unwrap_err();
            assert_eq!(err.expected, REF_API_VERSION);
            assert_eq!(err.requested, requested);
        }
    }
}
