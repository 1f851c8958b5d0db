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

//! A layered virtual file system over directories and `.pk3` archives.
//!
//! Search paths are stacked: the most recently mounted one is searched
//! first. Mounting a directory also mounts every `.pk3` inside it, in name
//! order, above the directory itself, so packed data overrides loose files.
//! The optional write directory sits on top of everything.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use refresh_core::host::{FileBuffer, FileSystem};
use refresh_core::FsError;
use thiserror::Error;

/// Errors raised while mounting a search path.
#[derive(Debug, Error)]
pub enum MountError {
    /// The path does not exist or cannot be listed.
    #[error("cannot mount '{path}': {source}")]
    Io {
        /// The search path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The archive is not a valid zip file.
    #[error("invalid archive '{path}': {source}")]
    Archive {
        /// The archive path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: zip::result::ZipError,
    },
}

/// Normalizes a virtual path: `/` separators, no leading slash, no `.`
/// components. Returns `None` for paths that try to climb out with `..` or
/// carry a drive letter.
pub fn normalize_path(name: &str) -> Option<String> {
    let name = name.replace('\\', "/");
    if name.contains(':') {
        return None;
    }
    let mut parts = Vec::new();
    for part in name.split('/') {
        match part {
            "" | "." => {}
            ".." => return None,
            other => parts.push(other),
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}

#[derive(Debug)]
struct PakFile {
    path: PathBuf,
    // lowercase virtual name -> name stored in the archive
    entries: HashMap<String, String>,
}

impl PakFile {
    fn open(path: &Path) -> Result<Self, MountError> {
        let file = File::open(path).map_err(|source| MountError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let archive = zip::ZipArchive::new(file).map_err(|source| MountError::Archive {
            path: path.to_path_buf(),
            source,
        })?;
        let entries = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .filter_map(|name| {
                normalize_path(name).map(|key| (key.to_ascii_lowercase(), name.to_owned()))
            })
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    fn read(&self, key: &str) -> Option<Vec<u8>> {
        let stored = self.entries.get(key)?;
        let file = File::open(&self.path).ok()?;
        let mut archive = zip::ZipArchive::new(file).ok()?;
        let mut entry = archive.by_name(stored).ok()?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        match entry.read_to_end(&mut bytes) {
            Ok(_) => Some(bytes),
            Err(e) => {
                log::warn!("Failed to read '{stored}' from {}: {e}", self.path.display());
                None
            }
        }
    }
}

#[derive(Debug)]
enum SearchPath {
    Directory(PathBuf),
    Pak(PakFile),
}

impl SearchPath {
    fn read(&self, key: &str, original: &str) -> Option<Vec<u8>> {
        match self {
            SearchPath::Directory(root) => {
                let exact = root.join(original);
                std::fs::read(&exact)
                    .or_else(|_| std::fs::read(root.join(key)))
                    .ok()
            }
            SearchPath::Pak(pak) => pak.read(key),
        }
    }

    fn exists(&self, key: &str, original: &str) -> bool {
        match self {
            SearchPath::Directory(root) => root.join(original).is_file() || root.join(key).is_file(),
            SearchPath::Pak(pak) => pak.entries.contains_key(key),
        }
    }

    fn list(&self, dir: &str, out: &mut BTreeMap<String, String>, extension: &str) {
        let mut add = |name: &str| {
            out.entry(name.to_ascii_lowercase())
                .or_insert_with(|| name.to_owned());
        };
        let matches = |name: &str| {
            extension.is_empty() || name.to_ascii_lowercase().ends_with(extension)
        };
        match self {
            SearchPath::Directory(root) => {
                let Ok(entries) = std::fs::read_dir(root.join(dir)) else {
                    return;
                };
                for entry in entries.flatten() {
                    if entry.path().is_file() {
                        let name = entry.file_name().to_string_lossy().into_owned();
                        if matches(&name) {
                            add(&name);
                        }
                    }
                }
            }
            SearchPath::Pak(pak) => {
                let prefix = if dir.is_empty() {
                    String::new()
                } else {
                    format!("{}/", dir.to_ascii_lowercase())
                };
                for (key, stored) in &pak.entries {
                    let Some(relative) = key.strip_prefix(&prefix) else {
                        continue;
                    };
                    if relative.contains('/') || !matches(relative) {
                        continue;
                    }
                    let original = stored.rsplit('/').next().unwrap_or(relative);
                    add(original);
                }
            }
        }
    }
}

/// The host's file system service.
#[derive(Debug, Default)]
pub struct VirtualFileSystem {
    search: Vec<SearchPath>,
    write_dir: Option<PathBuf>,
    write_layer: Option<SearchPath>,
}

impl VirtualFileSystem {
    /// Creates an empty, read-only file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts a directory and the `.pk3` archives it contains.
    pub fn mount_directory(&mut self, root: &Path) -> Result<(), MountError> {
        let entries = std::fs::read_dir(root).map_err(|source| MountError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let mut paks: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pk3"))
            })
            .collect();
        paks.sort();
        self.search.push(SearchPath::Directory(root.to_path_buf()));
        log::info!("Mounted directory {}", root.display());
        for pak in paks {
            self.mount_pak(&pak)?;
        }
        Ok(())
    }

    /// Mounts a single archive.
    pub fn mount_pak(&mut self, path: &Path) -> Result<(), MountError> {
        let pak = PakFile::open(path)?;
        log::info!("Mounted {} ({} files)", path.display(), pak.entries.len());
        self.search.push(SearchPath::Pak(pak));
        Ok(())
    }

    /// Mounts `path` as an archive or a directory depending on what it is.
    pub fn mount(&mut self, path: &Path) -> Result<(), MountError> {
        if path.is_file() {
            self.mount_pak(path)
        } else {
            self.mount_directory(path)
        }
    }

    /// Sets the writable root. It is also searched before anything else.
    pub fn set_write_dir(&mut self, root: PathBuf) {
        self.write_layer = Some(SearchPath::Directory(root.clone()));
        self.write_dir = Some(root);
    }

    /// Number of mounted search paths, write directory excluded.
    pub fn search_path_count(&self) -> usize {
        self.search.len()
    }

    /// Search order: write directory, then the most recent mount first.
    fn layers(&self) -> impl Iterator<Item = &SearchPath> {
        self.write_layer.iter().chain(self.search.iter().rev())
    }

    fn find_map<T>(
        &self,
        name: &str,
        mut f: impl FnMut(&SearchPath, &str, &str) -> Option<T>,
    ) -> Option<T> {
        let original = normalize_path(name)?;
        let key = original.to_ascii_lowercase();
        self.layers().find_map(|layer| f(layer, &key, &original))
    }
}

impl FileSystem for VirtualFileSystem {
    fn read_file(&self, name: &str) -> Option<FileBuffer> {
        let bytes = self.find_map(name, |layer, key, original| layer.read(key, original))?;
        log::trace!("Read '{name}' ({} bytes)", bytes.len());
        Some(FileBuffer::new(name, bytes))
    }

    fn list_files(&self, dir: &str, extension: &str) -> Vec<String> {
        let dir = normalize_path(dir).unwrap_or_default();
        let extension = extension.to_ascii_lowercase();
        let mut out = BTreeMap::new();
        for layer in self.layers() {
            layer.list(&dir, &mut out, &extension);
        }
        out.into_values().collect()
    }

    fn write_file(&self, name: &str, data: &[u8]) -> Result<(), FsError> {
        let root = self.write_dir.as_ref().ok_or(FsError::ReadOnly)?;
        let relative = normalize_path(name).ok_or_else(|| FsError::UnsafePath(name.to_owned()))?;
        let path = root.join(&relative);
        let io_err = |source| FsError::Io {
            path: relative.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&path, data).map_err(io_err)?;
        log::debug!("Wrote '{relative}' ({} bytes)", data.len());
        Ok(())
    }

    fn file_exists(&self, name: &str) -> bool {
        self.find_map(name, |layer, key, original| layer.exists(key, original).then_some(()))
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_pak(path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(path).expect("create pak");
        let mut zip = zip::ZipWriter::new(file);
        for (name, data) in files {
            zip.start_file(*name, SimpleFileOptions::default())
                .expect("start entry");
            zip.write_all(data).expect("write entry");
        }
        zip.finish().expect("finish pak");
    }

    #[test]
    fn normalize_rejects_escapes() {
        assert_eq!(normalize_path("\\models//a/./b.md3").as_deref(), Some("models/a/b.md3"));
        assert_eq!(normalize_path("../secret"), None);
        assert_eq!(normalize_path("c:/windows"), None);
        assert_eq!(normalize_path("/"), None);
    }

    #[test]
    fn archives_override_loose_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("scripts")).expect("mkdir");
        std::fs::write(dir.path().join("scripts/a.txt"), b"loose").expect("write");
        std::fs::write(dir.path().join("scripts/only_loose.txt"), b"x").expect("write");
        write_pak(&dir.path().join("pak0.pk3"), &[("scripts/A.txt", b"packed")]);

        let mut vfs = VirtualFileSystem::new();
        vfs.mount(dir.path()).expect("mount");
        assert_eq!(vfs.search_path_count(), 2);

        let file = vfs.read_file("scripts/a.txt").expect("exists");
        assert_eq!(&*file, b"packed");
        assert!(vfs.file_exists("SCRIPTS/only_loose.txt"));
        assert!(vfs.read_file("scripts/missing.txt").is_none());
        assert_eq!(
            vfs.list_files("scripts", ".txt"),
            vec!["A.txt", "only_loose.txt"]
        );
    }

    #[test]
    fn writes_require_a_safe_path_and_a_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut vfs = VirtualFileSystem::new();
        assert!(matches!(vfs.write_file("a.txt", b"1"), Err(FsError::ReadOnly)));
        vfs.set_write_dir(dir.path().to_path_buf());
        assert!(matches!(
            vfs.write_file("../a.txt", b"1"),
            Err(FsError::UnsafePath(_))
        ));
        vfs.write_file("screenshots/shot0000.tga", b"img").expect("write");
        assert_eq!(&*vfs.read_file("screenshots/shot0000.tga").expect("readable"), b"img");
    }
}
