// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the sharpening stage
//!
//! Open-time errors are fatal to one filter instance. Frame errors never
//! leave the frame processor: they select the copy fallback for that frame.

use std::fmt;

/// Result type alias for open-time operations
pub type OpenResult<T> = Result<T, OpenError>;

/// Status reported to the host when open fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenStatus {
    /// Any failure other than memory exhaustion
    GenericFailure,
    /// The device or host ran out of memory
    OutOfMemory,
}

/// GPU objects created while opening a filter instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuResource {
    InputTexture,
    UploadBuffer,
    OutputTexture,
    StagingBuffer,
    ConstantBuffer,
    InputView,
    OutputView,
    BindGroup,
}

impl fmt::Display for GpuResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GpuResource::InputTexture => "input texture",
            GpuResource::UploadBuffer => "upload buffer",
            GpuResource::OutputTexture => "output texture",
            GpuResource::StagingBuffer => "staging buffer",
            GpuResource::ConstantBuffer => "constant buffer",
            GpuResource::InputView => "input view",
            GpuResource::OutputView => "output view",
            GpuResource::BindGroup => "bind group",
        };
        f.write_str(name)
    }
}

/// Errors that make `open` fail
#[derive(Debug, Clone)]
pub enum OpenError {
    /// Input chroma is not the packed 32-bit format
    UnsupportedFormat(String),
    /// Input and output formats differ
    FormatMismatch,
    /// Configured geometry has a zero dimension
    EmptyGeometry,
    /// No adapter could be obtained along the selected path
    AdapterUnavailable(String),
    /// The adapter refused to create a device
    DeviceCreation(String),
    /// A texture, buffer, view or binding could not be created
    ResourceCreation { resource: GpuResource, reason: String },
    /// Neither kernel variant could be loaded
    NoKernel,
    /// The device ran out of memory while creating a resource
    OutOfMemory(GpuResource),
}

impl OpenError {
    /// Status code handed back to the host
    pub fn status(&self) -> OpenStatus {
        match self {
            OpenError::OutOfMemory(_) => OpenStatus::OutOfMemory,
            _ => OpenStatus::GenericFailure,
        }
    }
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenError::UnsupportedFormat(chroma) => {
                write!(f, "Input video format {} is not packed BGRA", chroma)
            }
            OpenError::FormatMismatch => write!(f, "Input and output formats are different"),
            OpenError::EmptyGeometry => write!(f, "Video geometry has a zero dimension"),
            OpenError::AdapterUnavailable(msg) => write!(f, "No adapter available: {}", msg),
            OpenError::DeviceCreation(msg) => write!(f, "Failed to create GPU device: {}", msg),
            OpenError::ResourceCreation { resource, reason } => {
                write!(f, "Failed to create {}: {}", resource, reason)
            }
            OpenError::NoKernel => {
                write!(f, "Failed to create compute kernel (standard and reduced precision)")
            }
            OpenError::OutOfMemory(resource) => {
                write!(f, "Out of memory while creating {}", resource)
            }
        }
    }
}

impl std::error::Error for OpenError {}

/// Per-frame failures; each one routes the frame to the copy fallback
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Frame format differs from the configured one
    InvalidFormat,
    /// Visible area exceeds the configured geometry
    TooLarge {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },
    /// Pixel buffer is too short for its declared pitch and lines
    Truncated { needed: usize, actual: usize },
    /// Upload buffer could not be mapped for writing
    UploadMap(String),
    /// Staging buffer could not be mapped for reading
    ReadbackMap(String),
    /// Readback was requested without recorded GPU work
    NothingRecorded,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::InvalidFormat => write!(f, "Invalid frame format"),
            FrameError::TooLarge {
                width,
                height,
                max_width,
                max_height,
            } => write!(
                f,
                "Frame {}x{} exceeds configured {}x{}",
                width, height, max_width, max_height
            ),
            FrameError::Truncated { needed, actual } => {
                write!(f, "Frame buffer holds {} bytes, needs {}", actual, needed)
            }
            FrameError::UploadMap(msg) => write!(f, "Failed to map upload buffer: {}", msg),
            FrameError::ReadbackMap(msg) => write!(f, "Failed to map staging buffer: {}", msg),
            FrameError::NothingRecorded => write!(f, "No GPU work recorded for this frame"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}
