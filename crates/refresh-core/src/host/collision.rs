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

use std::sync::Arc;

use crate::math::Vec3;

/// One row of the cluster visibility matrix, borrowed from the host's shared
/// visibility data without copying.
#[derive(Debug, Clone)]
pub struct PvsRow {
    data: Arc<[u8]>,
    offset: usize,
    len: usize,
}

impl PvsRow {
    /// A view of `len` bytes of `data` starting at `offset`.
    ///
    /// Returns `None` if the range does not fit.
    pub fn new(data: Arc<[u8]>, offset: usize, len: usize) -> Option<Self> {
        let end = offset.checked_add(len)?;
        (end <= data.len()).then_some(Self { data, offset, len })
    }

    /// The raw bitset.
    pub fn bytes(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.len]
    }

    /// `true` if `cluster` is potentially visible from the row's cluster.
    /// Out-of-range clusters are not visible.
    pub fn is_visible(&self, cluster: i32) -> bool {
        if cluster < 0 {
            return false;
        }
        let cluster = cluster as usize;
        self.bytes()
            .get(cluster >> 3)
            .is_some_and(|byte| byte & (1 << (cluster & 7)) != 0)
    }
}

/// Queries answered by the host's collision model.
pub trait CollisionMap: Send + Sync {
    /// The visibility row of `cluster`, or `None` when the host has no
    /// visibility data for it.
    fn cluster_pvs(&self, cluster: i32) -> Option<PvsRow>;

    /// Feeds every collision debug polygon to `draw` as `(color, points)`.
    fn draw_debug_surfaces(&self, draw: &mut dyn FnMut(u32, &[Vec3]));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pvs_row_reads_bits_of_its_own_range() {
        let data: Arc<[u8]> = Arc::from(vec![0xff, 0b0000_0101, 0b1000_0000]);
        let row = PvsRow::new(data, 1, 2).expect("row fits");
        assert!(row.is_visible(0));
        assert!(!row.is_visible(1));
        assert!(row.is_visible(2));
        assert!(row.is_visible(15));
        assert!(!row.is_visible(16));
        assert!(!row.is_visible(-1));
    }

    #[test]
    fn out_of_bounds_row_is_refused() {
        let data: Arc<[u8]> = Arc::from(vec![0u8; 4]);
        assert!(PvsRow::new(data.clone(), 3, 2).is_none());
        assert!(PvsRow::new(data, usize::MAX, 2).is_none());
    }
}
