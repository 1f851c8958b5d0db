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

//! The two allocator capabilities offered by the host.
//!
//! - The **hunk** is a bump arena for data that lives exactly as long as a
//!   level. The renderer can never free a hunk block; the host reclaims the
//!   whole arena at once when the level changes. A small temp tier sits on the
//!   opposite end of the arena and is released in stack order.
//! - The **heap** is a general allocator with individual frees, plus a
//!   `free_all` used on module unload.
//!
//! Blocks own their bytes, so dropping a block can never dangle; the
//! allocators only do the budgeting and bookkeeping.

use crate::error::AllocError;

/// Where in the arena a hunk allocation should come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HunkPreference {
    /// The allocator picks.
    #[default]
    DontCare,
    /// The low end of the arena.
    Low,
    /// The high end of the arena.
    High,
}

macro_rules! define_block {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Debug)]
        pub struct $name {
            id: u64,
            bytes: Box<[u8]>,
        }

        impl $name {
            /// Creates a zeroed block. Only allocator implementations should
            /// call this.
            pub fn new(id: u64, size: usize) -> Self {
                Self {
                    id,
                    bytes: vec![0u8; size].into_boxed_slice(),
                }
            }

            /// The allocator-assigned identifier.
            pub fn id(&self) -> u64 {
                self.id
            }

            /// Size in bytes.
            pub fn len(&self) -> usize {
                self.bytes.len()
            }

            /// `true` for a zero-sized block.
            pub fn is_empty(&self) -> bool {
                self.bytes.is_empty()
            }

            /// Read access to the block.
            pub fn as_slice(&self) -> &[u8] {
                &self.bytes
            }

            /// Write access to the block.
            pub fn as_mut_slice(&mut self) -> &mut [u8] {
                &mut self.bytes
            }
        }
    };
}

define_block!(
    /// Level-lifetime memory from the hunk. Never freed individually.
    HunkBlock
);
define_block!(
    /// Short-lived scratch memory from the hunk's temp tier.
    TempBlock
);
define_block!(
    /// Memory from the general heap.
    HeapBlock
);

/// Counters reported by either allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Total budget in bytes.
    pub capacity: usize,
    /// Bytes currently accounted as in use.
    pub used: usize,
    /// Highest value `used` ever reached.
    pub peak: usize,
    /// Number of successful allocations.
    pub allocations: u64,
    /// Number of individual frees.
    pub frees: u64,
}

impl MemoryStats {
    /// Bytes still available.
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.used)
    }
}

/// The level-lifetime arena.
pub trait HunkAllocator: Send + Sync {
    /// Reserves `size` bytes that stay accounted until the host clears the
    /// arena.
    fn alloc(&self, size: usize, pref: HunkPreference) -> Result<HunkBlock, AllocError>;

    /// Reserves scratch memory. Must be released with [`free_temp`] in the
    /// reverse order of allocation.
    ///
    /// [`free_temp`]: HunkAllocator::free_temp
    fn alloc_temp(&self, size: usize) -> Result<TempBlock, AllocError>;

    /// Releases the most recent temp block.
    fn free_temp(&self, block: TempBlock) -> Result<(), AllocError>;

    /// Current counters.
    fn stats(&self) -> MemoryStats;
}

/// The general purpose heap.
pub trait HeapAllocator: Send + Sync {
    /// Allocates `size` bytes.
    fn alloc(&self, size: usize) -> Result<HeapBlock, AllocError>;

    /// Returns a block to the heap.
    fn free(&self, block: HeapBlock) -> Result<(), AllocError>;

    /// Forgets every outstanding block. Used when the module is unloaded.
    fn free_all(&self);

    /// Current counters.
    fn stats(&self) -> MemoryStats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_zeroed_and_writable() {
        let mut block = HeapBlock::new(9, 4);
        assert_eq!(block.id(), 9);
        assert_eq!(block.as_slice(), &[0, 0, 0, 0]);
        block.as_mut_slice()[2] = 7;
        assert_eq!(block.as_slice()[2], 7);
        assert!(!block.is_empty());
    }

    #[test]
    fn available_never_underflows() {
        let stats = MemoryStats {
            capacity: 10,
            used: 12,
            ..Default::default()
        };
        assert_eq!(stats.available(), 0);
    }
}
