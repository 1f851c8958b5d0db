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

//! Budgeted allocators backing the hunk and heap services.
//!
//! Both allocators hand out owned blocks and only keep the accounting, in
//! the spirit of a tracking allocator: every allocation updates the live and
//! peak counters, and exceeding the configured budget fails the request.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use refresh_core::host::{
    HeapAllocator, HeapBlock, HunkAllocator, HunkBlock, HunkPreference, MemoryStats, TempBlock,
};
use refresh_core::AllocError;

/// Hunk allocations are accounted in multiples of this size.
const HUNK_ALIGN: usize = 32;

fn round_up(size: usize) -> usize {
    size.div_ceil(HUNK_ALIGN).saturating_mul(HUNK_ALIGN)
}

#[derive(Debug, Default)]
struct HunkState {
    low: usize,
    high: usize,
    temp: Vec<(u64, usize)>,
    next_id: u64,
    stats: MemoryStats,
}

impl HunkState {
    fn used(&self) -> usize {
        self.low + self.high + self.temp.iter().map(|(_, size)| size).sum::<usize>()
    }

    fn refresh(&mut self) {
        self.stats.used = self.used();
        self.stats.peak = self.stats.peak.max(self.stats.used);
    }
}

/// The level-lifetime arena.
///
/// Permanent allocations are reclaimed only by [`Hunk::clear`], which the
/// host calls when the level changes.
#[derive(Debug)]
pub struct Hunk {
    state: Mutex<HunkState>,
}

impl Hunk {
    /// Creates an arena with a budget of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(HunkState {
                stats: MemoryStats {
                    capacity,
                    ..Default::default()
                },
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HunkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reserve(state: &mut HunkState, size: usize) -> Result<(u64, usize), AllocError> {
        let rounded = round_up(size);
        let available = state.stats.capacity.saturating_sub(state.used());
        if rounded > available {
            return Err(AllocError::HunkExhausted {
                requested: size,
                available,
            });
        }
        state.next_id += 1;
        state.stats.allocations += 1;
        Ok((state.next_id, rounded))
    }

    /// Reclaims the whole arena, including any outstanding temp blocks.
    pub fn clear(&self) {
        let mut state = self.lock();
        log::debug!(
            "Clearing hunk: {} low, {} high, {} temp blocks",
            state.low,
            state.high,
            state.temp.len()
        );
        state.low = 0;
        state.high = 0;
        state.temp.clear();
        state.refresh();
    }

    /// Bytes of permanent allocations on each end, `(low, high)`.
    pub fn permanent_usage(&self) -> (usize, usize) {
        let state = self.lock();
        (state.low, state.high)
    }
}

impl HunkAllocator for Hunk {
    fn alloc(&self, size: usize, pref: HunkPreference) -> Result<HunkBlock, AllocError> {
        let mut state = self.lock();
        let (id, rounded) = Self::reserve(&mut state, size)?;
        match pref {
            HunkPreference::High => state.high += rounded,
            HunkPreference::Low | HunkPreference::DontCare => state.low += rounded,
        }
        state.refresh();
        Ok(HunkBlock::new(id, size))
    }

    fn alloc_temp(&self, size: usize) -> Result<TempBlock, AllocError> {
        let mut state = self.lock();
        let (id, rounded) = Self::reserve(&mut state, size)?;
        state.temp.push((id, rounded));
        state.refresh();
        Ok(TempBlock::new(id, size))
    }

    fn free_temp(&self, block: TempBlock) -> Result<(), AllocError> {
        let mut state = self.lock();
        match state.temp.last() {
            Some(&(id, _)) if id == block.id() => {
                state.temp.pop();
                state.stats.frees += 1;
                state.refresh();
                Ok(())
            }
            _ if state.temp.iter().any(|&(id, _)| id == block.id()) => {
                Err(AllocError::TempOutOfOrder(block.id()))
            }
            _ => Err(AllocError::ForeignBlock(block.id())),
        }
    }

    fn stats(&self) -> MemoryStats {
        self.lock().stats
    }
}

#[derive(Debug, Default)]
struct HeapState {
    live: HashMap<u64, usize>,
    next_id: u64,
    stats: MemoryStats,
}

/// A general heap with a byte budget.
#[derive(Debug)]
pub struct TrackedHeap {
    state: Mutex<HeapState>,
}

impl TrackedHeap {
    /// Creates a heap with a budget of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(HeapState {
                stats: MemoryStats {
                    capacity,
                    ..Default::default()
                },
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HeapState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of blocks currently outstanding.
    pub fn live_blocks(&self) -> usize {
        self.lock().live.len()
    }
}

impl HeapAllocator for TrackedHeap {
    fn alloc(&self, size: usize) -> Result<HeapBlock, AllocError> {
        let mut state = self.lock();
        let available = state.stats.available();
        if size > available {
            return Err(AllocError::HeapExhausted {
                requested: size,
                available,
            });
        }
        state.next_id += 1;
        let id = state.next_id;
        state.live.insert(id, size);
        state.stats.used += size;
        state.stats.peak = state.stats.peak.max(state.stats.used);
        state.stats.allocations += 1;
        Ok(HeapBlock::new(id, size))
    }

    fn free(&self, block: HeapBlock) -> Result<(), AllocError> {
        let mut state = self.lock();
        let size = state
            .live
            .remove(&block.id())
            .ok_or(AllocError::ForeignBlock(block.id()))?;
        state.stats.used -= size;
        state.stats.frees += 1;
        Ok(())
    }

    fn free_all(&self) {
        let mut state = self.lock();
        if !state.live.is_empty() {
            log::debug!("Releasing {} outstanding heap blocks", state.live.len());
        }
        state.live.clear();
        state.stats.used = 0;
    }

    fn stats(&self) -> MemoryStats {
        self.lock().stats
    }
}
