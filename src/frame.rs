// SPDX-License-Identifier: GPL-3.0-only

//! Host-owned video frames
//!
//! A frame is one plane of packed 32-bit pixels. `pitch` is the true row
//! stride of `pixels`; the visible row (`visible_pitch`) may be shorter.

use crate::constants::BYTES_PER_PIXEL;
use std::time::Duration;

/// Pixel formats a host may negotiate
///
/// Only `Bgra8` is processed; the others exist so mismatching frames can be
/// described and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Packed 32-bit B, G, R, A bytes
    Bgra8,
    /// Packed 32-bit R, G, B, A bytes
    Rgba8,
    /// Semi-planar 4:2:0
    Nv12,
    /// Planar 4:2:0
    I420,
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelFormat::Bgra8 => write!(f, "BGRA8"),
            PixelFormat::Rgba8 => write!(f, "RGBA8"),
            PixelFormat::Nv12 => write!(f, "NV12"),
            PixelFormat::I420 => write!(f, "I420"),
        }
    }
}

/// Negotiated video format of a filter's input or output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub chroma: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub visible_width: u32,
    pub visible_height: u32,
}

impl VideoFormat {
    /// Packed BGRA format whose visible area is the whole image
    pub fn bgra(width: u32, height: u32) -> Self {
        Self {
            chroma: PixelFormat::Bgra8,
            width,
            height,
            visible_width: width,
            visible_height: height,
        }
    }

    /// Same chroma and dimensions
    pub fn is_similar(&self, other: &VideoFormat) -> bool {
        self == other
    }
}

/// Texture size fixed when a filter instance opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn of(format: &VideoFormat) -> Self {
        Self {
            width: format.width,
            height: format.height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Descriptive properties carried alongside the pixels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameMetadata {
    /// Presentation timestamp
    pub pts: Option<Duration>,
    /// Display duration
    pub duration: Option<Duration>,
    pub keyframe: bool,
    pub progressive: bool,
    pub top_field_first: bool,
    pub field_count: u32,
}

/// One video frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub format: PixelFormat,
    pub visible_width: u32,
    pub visible_height: u32,
    /// Row stride of `pixels` in bytes
    pub pitch: usize,
    pub pixels: Vec<u8>,
    pub metadata: FrameMetadata,
}

impl Frame {
    /// Allocate a zeroed frame for `format` with rows aligned to `pitch_alignment`
    pub fn alloc(format: &VideoFormat, pitch_alignment: usize) -> Self {
        let row = format.width as usize * BYTES_PER_PIXEL;
        let pitch = row.next_multiple_of(pitch_alignment.max(1));
        Self {
            format: format.chroma,
            visible_width: format.visible_width,
            visible_height: format.visible_height,
            pitch,
            pixels: vec![0; pitch * format.height as usize],
            metadata: FrameMetadata::default(),
        }
    }

    /// Meaningful bytes per row
    pub fn visible_pitch(&self) -> usize {
        self.visible_width as usize * BYTES_PER_PIXEL
    }

    /// Rows holding meaningful data
    pub fn visible_lines(&self) -> usize {
        self.visible_height as usize
    }

    /// Bytes the visible area spans inside `pixels`, `None` if that overflows
    pub fn required_len(&self) -> Option<usize> {
        match self.visible_lines() {
            0 => Some(0),
            lines => self
                .pitch
                .checked_mul(lines - 1)?
                .checked_add(self.visible_pitch()),
        }
    }

    /// Visible row `y`, if it lies inside the buffer
    pub fn row(&self, y: usize) -> Option<&[u8]> {
        let start = y.checked_mul(self.pitch)?;
        let end = start.checked_add(self.visible_pitch())?;
        self.pixels.get(start..end)
    }

    /// Copy pixels and metadata from `src`, row by row, honouring both pitches
    pub fn copy_from(&mut self, src: &Frame) {
        let row_len = self.visible_pitch().min(src.visible_pitch());
        let rows = self.visible_lines().min(src.visible_lines());
        copy_rows(
            &mut self.pixels,
            self.pitch,
            &src.pixels,
            src.pitch,
            row_len,
            rows,
        );
        self.metadata.clone_from(&src.metadata);
    }
}

/// Copy `rows` rows of `row_len` bytes between buffers with independent strides
///
/// Rows that would run past either buffer are shortened or skipped.
pub fn copy_rows(
    dst: &mut [u8],
    dst_pitch: usize,
    src: &[u8],
    src_pitch: usize,
    row_len: usize,
    rows: usize,
) {
    if dst_pitch == 0 || src_pitch == 0 {
        return;
    }
    for (dst_row, src_row) in dst
        .chunks_mut(dst_pitch)
        .zip(src.chunks(src_pitch))
        .take(rows)
    {
        let len = row_len.min(dst_row.len()).min(src_row.len());
        dst_row[..len].copy_from_slice(&src_row[..len]);
    }
}

/// Repeat the last visible column and row once past the visible area
///
/// A frame smaller than its texture leaves stale texels beyond its edge.
/// The sharpening taps reach one pixel out, so one repeated pixel is enough
/// to make them see the frame's own border instead.
pub fn extend_edges(
    buf: &mut [u8],
    pitch: usize,
    row_len: usize,
    rows: usize,
    full_row_len: usize,
    full_rows: usize,
) {
    if row_len < BYTES_PER_PIXEL || rows == 0 {
        return;
    }

    if row_len < full_row_len {
        for y in 0..rows {
            let edge = y * pitch + row_len;
            if edge + BYTES_PER_PIXEL > buf.len() {
                break;
            }
            buf.copy_within(edge - BYTES_PER_PIXEL..edge, edge);
        }
    }

    if rows < full_rows {
        let extended = (row_len + BYTES_PER_PIXEL).min(full_row_len);
        let src = (rows - 1) * pitch;
        let dst = rows * pitch;
        if dst + extended <= buf.len() {
            buf.copy_within(src..src + extended, dst);
        }
    }
}
