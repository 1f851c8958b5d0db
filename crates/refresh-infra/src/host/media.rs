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

//! Image codec, cinematic playback and client capture sinks.
//!
//! Cinematics use a raw frame stream so the host needs no video codec: a
//! 16-byte little-endian header (`b"RCIN"`, width, height, frames per second)
//! followed by as many `width * height * 4` RGBA frames as the file holds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat};
use refresh_core::host::{
    CinematicFlags, CinematicFrame, CinematicHandle, CinematicStatus, Cinematics, ClientServices,
    Clock, DecodedImage, FileSystem, ImageCodec,
};
use sysinfo::System;
use thiserror::Error;

use super::vfs::VirtualFileSystem;

/// Magic bytes opening a cinematic stream.
pub const CINEMATIC_MAGIC: &[u8; 4] = b"RCIN";

/// Below this much available memory the host reports low memory.
const LOW_MEMORY_BYTES: u64 = 96 * 1024 * 1024;

/// Errors raised by the media services.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Image encoding or decoding failed.
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
    /// The pixel buffer is smaller than its dimensions require.
    #[error("pixel buffer too small: {got} bytes for {width}x{height}")]
    ShortBuffer {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
        /// Bytes supplied.
        got: usize,
    },
    /// The cinematic stream header is malformed.
    #[error("malformed cinematic '{0}'")]
    BadCinematic(String),
}

/// Removes the per-row padding from packed RGB rows.
fn strip_padding(
    width: u32,
    height: u32,
    rgb: &[u8],
    padding: usize,
) -> Result<Vec<u8>, MediaError> {
    let row = width as usize * 3;
    let stride = row + padding;
    let needed = stride * (height as usize).saturating_sub(1) + row;
    if height == 0 || rgb.len() < needed {
        return Err(MediaError::ShortBuffer {
            width,
            height,
            got: rgb.len(),
        });
    }
    if padding == 0 {
        return Ok(rgb[..row * height as usize].to_vec());
    }
    Ok(rgb
        .chunks(stride)
        .take(height as usize)
        .flat_map(|line| &line[..row])
        .copied()
        .collect())
}

/// Encodes packed RGB rows as a JPEG.
pub fn encode_jpeg(
    quality: u8,
    width: u32,
    height: u32,
    rgb: &[u8],
    padding: usize,
) -> Result<Vec<u8>, MediaError> {
    let pixels = strip_padding(width, height, rgb, padding)?;
    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder.encode(&pixels, width, height, ExtendedColorType::Rgb8)?;
    }
    Ok(out)
}

/// JPEG service reading and writing through the VFS.
#[derive(Debug)]
pub struct JpegCodec {
    fs: Arc<VirtualFileSystem>,
}

impl JpegCodec {
    /// Creates the codec over `fs`.
    pub fn new(fs: Arc<VirtualFileSystem>) -> Self {
        Self { fs }
    }
}

impl ImageCodec for JpegCodec {
    fn encode_jpeg(
        &self,
        quality: u8,
        width: u32,
        height: u32,
        rgb: &[u8],
        padding: usize,
    ) -> Option<Vec<u8>> {
        encode_jpeg(quality, width, height, rgb, padding)
            .map_err(|e| log::warn!("JPEG encode failed: {e}"))
            .ok()
    }

    fn save_jpeg(
        &self,
        name: &str,
        quality: u8,
        width: u32,
        height: u32,
        rgb: &[u8],
        padding: usize,
    ) -> bool {
        let Some(bytes) = self.encode_jpeg(quality, width, height, rgb, padding) else {
            return false;
        };
        match self.fs.write_file(name, &bytes) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to save '{name}': {e}");
                false
            }
        }
    }

    fn load_jpeg(&self, name: &str) -> Option<DecodedImage> {
        let file = self.fs.read_file(name)?;
        match image::load_from_memory_with_format(&file, ImageFormat::Jpeg) {
            Ok(decoded) => {
                let rgba = decoded.to_rgba8();
                Some(DecodedImage {
                    width: rgba.width(),
                    height: rgba.height(),
                    rgba: rgba.into_raw(),
                })
            }
            Err(e) => {
                log::warn!("Failed to decode '{name}': {e}");
                None
            }
        }
    }
}

#[derive(Debug)]
struct CinematicStream {
    width: u32,
    height: u32,
    fps: u32,
    frames: Vec<Vec<u8>>,
}

impl CinematicStream {
    fn parse(name: &str, bytes: &[u8]) -> Result<Self, MediaError> {
        let bad = || MediaError::BadCinematic(name.to_owned());
        if bytes.len() < 16 || &bytes[..4] != CINEMATIC_MAGIC {
            return Err(bad());
        }
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let (width, height, fps) = (word(4), word(8), word(12));
        let frame_size = (width as usize) * (height as usize) * 4;
        if frame_size == 0 || fps == 0 {
            return Err(bad());
        }
        let frames: Vec<Vec<u8>> = bytes[16..]
            .chunks_exact(frame_size)
            .map(<[u8]>::to_vec)
            .collect();
        if frames.is_empty() {
            return Err(bad());
        }
        Ok(Self {
            width,
            height,
            fps,
            frames,
        })
    }
}

#[derive(Debug)]
struct Playback {
    stream: CinematicStream,
    flags: CinematicFlags,
    started_ms: i32,
    current: usize,
    uploaded: Option<usize>,
    status: CinematicStatus,
}

/// Plays raw frame streams from the VFS, paced by the host clock.
pub struct CinematicPlayer {
    fs: Arc<VirtualFileSystem>,
    clock: Arc<dyn Clock>,
    playing: Mutex<HashMap<u32, Playback>>,
    next_handle: AtomicU32,
}

impl std::fmt::Debug for CinematicPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CinematicPlayer")
            .field("playing", &self.lock().len())
            .finish()
    }
}

impl CinematicPlayer {
    /// Creates a player reading from `fs` and paced by `clock`.
    pub fn new(fs: Arc<VirtualFileSystem>, clock: Arc<dyn Clock>) -> Self {
        Self {
            fs,
            clock,
            playing: Mutex::new(HashMap::new()),
            next_handle: AtomicU32::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Playback>> {
        self.playing.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn resolve(name: &str) -> String {
        if name.contains('/') {
            name.to_owned()
        } else {
            format!("video/{name}")
        }
    }
}

impl Cinematics for CinematicPlayer {
    fn play(&self, name: &str, rect: [i32; 4], flags: CinematicFlags) -> Option<CinematicHandle> {
        let path = Self::resolve(name);
        let file = self.fs.read_file(&path)?;
        let stream = match CinematicStream::parse(&path, &file) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("{e}");
                return None;
            }
        };
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "Playing {path} ({}x{} @ {} fps, {} frames) in {rect:?}",
            stream.width,
            stream.height,
            stream.fps,
            stream.frames.len()
        );
        self.lock().insert(
            id,
            Playback {
                stream,
                flags,
                started_ms: self.clock.milliseconds(),
                current: 0,
                uploaded: None,
                status: CinematicStatus::Play,
            },
        );
        Some(CinematicHandle(id))
    }

    fn run(&self, handle: CinematicHandle) -> CinematicStatus {
        let now = self.clock.milliseconds();
        let mut playing = self.lock();
        let Some(playback) = playing.get_mut(&handle.0) else {
            return CinematicStatus::Idle;
        };
        if playback.status == CinematicStatus::Eof {
            return CinematicStatus::Eof;
        }
        let elapsed = now.wrapping_sub(playback.started_ms).max(0) as u64;
        let index = (elapsed * u64::from(playback.stream.fps) / 1000) as usize;
        let count = playback.stream.frames.len();
        if index < count {
            playback.current = index;
            playback.status = CinematicStatus::Play;
        } else if playback.flags.contains(CinematicFlags::LOOP) {
            playback.current = index % count;
            playback.status = CinematicStatus::Looped;
        } else {
            playback.current = count - 1;
            playback.status = CinematicStatus::Eof;
        }
        playback.status
    }

    fn frame(&self, handle: CinematicHandle) -> Option<CinematicFrame> {
        let mut playing = self.lock();
        let playback = playing.get_mut(&handle.0)?;
        let dirty = playback.uploaded != Some(playback.current);
        playback.uploaded = Some(playback.current);
        Some(CinematicFrame {
            image: DecodedImage {
                width: playback.stream.width,
                height: playback.stream.height,
                rgba: playback.stream.frames[playback.current].clone(),
            },
            dirty,
        })
    }

    fn stop(&self, handle: CinematicHandle) {
        self.lock().remove(&handle.0);
    }
}

/// Client-side sinks: video capture, clipboard and window state.
#[derive(Debug, Default)]
pub struct ClientState {
    minimized: AtomicBool,
    video_frames: AtomicU64,
    last_video_frame: Mutex<Vec<u8>>,
    clipboard: Mutex<Option<Vec<u8>>>,
    scaling: Mutex<(f32, u32, u32)>,
}

impl ClientState {
    /// Creates a restored, non-capturing client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the window being minimized or restored.
    pub fn set_minimized(&self, minimized: bool) {
        self.minimized.store(minimized, Ordering::Relaxed);
    }

    /// Number of frames handed to the video writer.
    pub fn video_frame_count(&self) -> u64 {
        self.video_frames.load(Ordering::Relaxed)
    }

    /// The last frame handed to the video writer.
    pub fn last_video_frame(&self) -> Vec<u8> {
        self.last_video_frame
            .lock()
            .map(|frame| frame.clone())
            .unwrap_or_default()
    }

    /// The bitmap last placed on the clipboard.
    pub fn clipboard(&self) -> Option<Vec<u8>> {
        self.clipboard.lock().ok().and_then(|slot| slot.clone())
    }

    /// The last reported capture scaling.
    pub fn scaling(&self) -> (f32, u32, u32) {
        self.scaling.lock().map(|s| *s).unwrap_or((1.0, 0, 0))
    }
}

impl ClientServices for ClientState {
    fn write_avi_frame(&self, frame: &[u8]) {
        self.video_frames.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_video_frame.lock() {
            last.clear();
            last.extend_from_slice(frame);
        }
    }

    fn is_minimized(&self) -> bool {
        self.minimized.load(Ordering::Relaxed)
    }

    fn set_scaling(&self, factor: f32, capture_width: u32, capture_height: u32) {
        if let Ok(mut scaling) = self.scaling.lock() {
            *scaling = (factor, capture_width, capture_height);
        }
    }

    fn set_clipboard_bitmap(&self, bitmap: &[u8]) {
        log::debug!("Clipboard bitmap set ({} bytes)", bitmap.len());
        if let Ok(mut slot) = self.clipboard.lock() {
            *slot = Some(bitmap.to_vec());
        }
    }

    fn low_physical_memory(&self) -> bool {
        let mut system = System::new();
        system.refresh_memory();
        let available = system.available_memory();
        available != 0 && available < LOW_MEMORY_BYTES
    }
}

/// Builds a cinematic stream from frames, the inverse of what
/// [`CinematicPlayer`] reads.
pub fn encode_cinematic(width: u32, height: u32, fps: u32, frames: &[Vec<u8>]) -> Vec<u8> {
    let frame_bytes: usize = frames.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(16 + frame_bytes);
    out.extend_from_slice(CINEMATIC_MAGIC);
    for word in [width, height, fps] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    for frame in frames {
        out.extend_from_slice(frame);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[derive(Debug, Default)]
    struct ManualClock(AtomicI32);

    impl Clock for ManualClock {
        fn milliseconds(&self) -> i32 {
            self.0.load(Ordering::Relaxed)
        }
        fn microseconds(&self) -> i64 {
            i64::from(self.milliseconds()) * 1000
        }
        fn real_time(&self) -> refresh_core::host::RealTime {
            Default::default()
        }
    }

    fn vfs_with_cinematic(frames: usize) -> (tempfile::TempDir, Arc<VirtualFileSystem>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let frames: Vec<Vec<u8>> = (0..frames).map(|i| vec![i as u8; 2 * 2 * 4]).collect();
        std::fs::create_dir_all(dir.path().join("video")).expect("mkdir");
        std::fs::write(
            dir.path().join("video/intro.roq"),
            encode_cinematic(2, 2, 10, &frames),
        )
        .expect("write");
        let mut vfs = VirtualFileSystem::new();
        vfs.mount_directory(dir.path()).expect("mount");
        (dir, Arc::new(vfs))
    }

    #[test]
    fn padding_is_stripped_per_row() {
        let rgb = [1, 2, 3, 0, 4, 5, 6, 0];
        assert_eq!(strip_padding(1, 2, &rgb, 1).expect("fits"), vec![1, 2, 3, 4, 5, 6]);
        assert!(matches!(
            strip_padding(2, 2, &rgb, 0),
            Err(MediaError::ShortBuffer { .. })
        ));
    }

    #[test]
    fn jpeg_round_trips_dimensions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut vfs = VirtualFileSystem::new();
        vfs.set_write_dir(dir.path().to_path_buf());
        let codec = JpegCodec::new(Arc::new(vfs));
        let rgb = vec![200u8; 8 * 4 * 3];
        assert!(codec.save_jpeg("shots/a.jpg", 90, 8, 4, &rgb, 0));
        let decoded = codec.load_jpeg("shots/a.jpg").expect("decodes");
        assert_eq!((decoded.width, decoded.height), (8, 4));
        assert_eq!(decoded.rgba.len(), 8 * 4 * 4);
    }

    #[test]
    fn cinematic_advances_with_the_clock_and_stops_at_the_end() {
        let (_dir, vfs) = vfs_with_cinematic(3);
        let clock = Arc::new(ManualClock::default());
        let player = CinematicPlayer::new(vfs, clock.clone());
        let handle = player
            .play("intro.roq", [0, 0, 640, 480], CinematicFlags::EMPTY)
            .expect("plays");

        assert_eq!(player.run(handle), CinematicStatus::Play);
        let first = player.frame(handle).expect("frame");
        assert!(first.dirty);
        assert_eq!(first.image.rgba[0], 0);
        assert!(!player.frame(handle).expect("frame").dirty);

        clock.0.store(150, Ordering::Relaxed);
        player.run(handle);
        assert_eq!(player.frame(handle).expect("frame").image.rgba[0], 1);

        clock.0.store(1000, Ordering::Relaxed);
        assert_eq!(player.run(handle), CinematicStatus::Eof);
        assert_eq!(player.frame(handle).expect("frame").image.rgba[0], 2);

        player.stop(handle);
        assert_eq!(player.run(handle), CinematicStatus::Idle);
    }

    #[test]
    fn looping_cinematic_wraps() {
        let (_dir, vfs) = vfs_with_cinematic(2);
        let clock = Arc::new(ManualClock::default());
        let player = CinematicPlayer::new(vfs, clock.clone());
        let handle = player
            .play("intro.roq", [0; 4], CinematicFlags::LOOP)
            .expect("plays");
        clock.0.store(300, Ordering::Relaxed);
        assert_eq!(player.run(handle), CinematicStatus::Looped);
        assert_eq!(player.frame(handle).expect("frame").image.rgba[0], 1);
    }

    #[test]
    fn client_state_records_sinks() {
        let client = ClientState::new();
        client.write_avi_frame(&[1, 2, 3]);
        client.set_clipboard_bitmap(b"BM");
        client.set_minimized(true);
        assert_eq!(client.video_frame_count(), 1);
        assert_eq!(client.last_video_frame(), vec![1, 2, 3]);
        assert_eq!(client.clipboard().as_deref(), Some(&b"BM"[..]));
        assert!(client.is_minimized());
    }
}
