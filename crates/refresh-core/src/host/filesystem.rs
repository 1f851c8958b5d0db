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

//! The virtual file system as seen from the renderer.

use std::ops::Deref;

use crate::error::FsError;

/// The contents of a file read through the VFS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBuffer {
    name: String,
    bytes: Vec<u8>,
}

impl FileBuffer {
    /// Wraps bytes read for `name`.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// The virtual path the buffer was read from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Takes the bytes out of the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The contents as UTF-8 text, if valid.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

impl Deref for FileBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Read/write access to game data.
///
/// Paths are virtual, `/`-separated and case-insensitive.
pub trait FileSystem: Send + Sync {
    /// Reads a whole file. `None` if it does not exist.
    fn read_file(&self, name: &str) -> Option<FileBuffer>;

    /// Releases a buffer obtained from [`read_file`](FileSystem::read_file).
    fn free_file(&self, file: FileBuffer) {
        drop(file);
    }

    /// Lists the files directly under `dir` ending in `extension`, sorted and
    /// without duplicates. Returned names are relative to `dir`.
    fn list_files(&self, dir: &str, extension: &str) -> Vec<String>;

    /// Writes a whole file under the writable root.
    fn write_file(&self, name: &str, data: &[u8]) -> Result<(), FsError>;

    /// `true` if `name` exists in any search path.
    fn file_exists(&self, name: &str) -> bool;
}
