// SPDX-License-Identifier: MPL-2.0

//! GPU contrast adaptive sharpening for video streams
//!
//! A host opens one [`CasFilter`] per stream. Opening selects a GPU
//! adapter, builds a fixed set of textures and buffers sized to the
//! negotiated format, and binds a sharpening compute kernel. Every frame is
//! then uploaded, sharpened and read back; a frame that cannot be processed
//! is delivered as an exact copy of its input instead of being dropped.
//!
//! # Architecture
//!
//! - [`gpu`]: adapter selection, device creation and the per-instance resource set
//! - [`shaders`]: kernel constants and precision variant selection
//! - [`processor`]: the per-frame pipeline and its fallback
//! - [`filter`]: the host-facing lifecycle
//! - [`config`]: user configuration handling
//! - [`params`]: runtime sharpness shared with the host's callback

pub mod config;
pub mod constants;
pub mod errors;
pub mod filter;
pub mod frame;
pub mod gpu;
pub mod params;
pub mod processor;
pub mod shaders;

// Re-export commonly used types
pub use config::FilterConfig;
pub use errors::{FrameError, OpenError, OpenStatus};
pub use filter::{CasFilter, FilterHost, ParameterRegistry, ParameterWatchers, VideoFilter};
pub use frame::{Frame, FrameMetadata, PixelFormat, VideoFormat};
pub use processor::{FrameAllocator, FrameProcessor, FrameStats, SharpenBackend};
