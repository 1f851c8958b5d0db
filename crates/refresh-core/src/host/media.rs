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

//! Cinematics, image codecs and client-side capture sinks.

use crate::refresh_bitflags;

/// Identifies a cinematic opened with [`Cinematics::play`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CinematicHandle(pub u32);

refresh_bitflags! {
    /// Playback options of a cinematic.
    pub struct CinematicFlags: u32 {
        /// Owned by the system rather than a game module.
        const SYSTEM = 1 << 0;
        /// Restart at the end instead of stopping.
        const LOOP = 1 << 1;
        /// Keep the last frame on screen at the end.
        const HOLD_AT_END = 1 << 2;
        /// No audio.
        const SILENT = 1 << 3;
        /// Drawn as a shader texture rather than full screen.
        const SHADER = 1 << 4;
    }
}

/// Playback state reported by [`Cinematics::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CinematicStatus {
    /// Not started.
    Idle,
    /// Frames are advancing.
    Play,
    /// The last frame was reached.
    Eof,
    /// Restarted from the first frame.
    Looped,
}

/// A decoded RGBA8 picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes, rows top to bottom.
    pub rgba: Vec<u8>,
}

/// The current frame of a cinematic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CinematicFrame {
    /// The pixels.
    pub image: DecodedImage,
    /// `true` if it differs from the previously uploaded frame.
    pub dirty: bool,
}

/// Cinematic decoding and playback.
pub trait Cinematics: Send + Sync {
    /// Opens `name` for playback in the given screen rectangle.
    fn play(
        &self,
        name: &str,
        rect: [i32; 4],
        flags: CinematicFlags,
    ) -> Option<CinematicHandle>;

    /// Advances playback to the current host time.
    fn run(&self, handle: CinematicHandle) -> CinematicStatus;

    /// The frame to upload, `None` if the handle is unknown.
    fn frame(&self, handle: CinematicHandle) -> Option<CinematicFrame>;

    /// Closes the cinematic.
    fn stop(&self, handle: CinematicHandle);
}

/// JPEG encode/decode used for captures and textures.
pub trait ImageCodec: Send + Sync {
    /// Encodes tightly packed RGB rows (each followed by `padding` bytes).
    /// `None` on failure.
    fn encode_jpeg(
        &self,
        quality: u8,
        width: u32,
        height: u32,
        rgb: &[u8],
        padding: usize,
    ) -> Option<Vec<u8>>;

    /// Encodes and writes a JPEG through the VFS. Returns `true` on success.
    fn save_jpeg(
        &self,
        name: &str,
        quality: u8,
        width: u32,
        height: u32,
        rgb: &[u8],
        padding: usize,
    ) -> bool;

    /// Reads and decodes a JPEG from the VFS.
    fn load_jpeg(&self, name: &str) -> Option<DecodedImage>;
}

/// Client-side sinks and window state queried by the renderer.
pub trait ClientServices: Send + Sync {
    /// Appends an encoded video frame to the running AVI capture.
    fn write_avi_frame(&self, frame: &[u8]);

    /// `true` if the main window is minimized.
    fn is_minimized(&self) -> bool;

    /// Reports the capture scaling so the client can map input coordinates.
    fn set_scaling(&self, factor: f32, capture_width: u32, capture_height: u32);

    /// Places a BMP image on the system clipboard.
    fn set_clipboard_bitmap(&self, bitmap: &[u8]);

    /// `true` if the machine is short on physical memory.
    fn low_physical_memory(&self) -> bool;
}
