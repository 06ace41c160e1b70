// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame sharpening pipeline
//!
//! validate → upload → constants → dispatch → resolve → readback.
//! Any failure degrades to a straight copy of the input so the stream never
//! loses a frame.

use crate::errors::FrameError;
use crate::frame::{Frame, Geometry, PixelFormat};
use crate::params::ParameterStore;
use crate::shaders::{CasConstants, DispatchSize};
use std::sync::Arc;
use tracing::{debug, info};

/// The GPU steps the pipeline drives
///
/// Implemented by `GpuResources`; tests substitute a recording backend.
pub trait SharpenBackend {
    /// Size of the input and output textures
    fn geometry(&self) -> Geometry;

    /// Copy the visible area of `frame` into the input texture
    fn upload(&mut self, frame: &Frame) -> Result<(), FrameError>;

    /// Update the constant buffer
    fn write_arguments(&mut self, constants: &CasConstants);

    /// Record the compute dispatch
    fn dispatch(&mut self, size: DispatchSize);

    /// Record the copy of the output texture into the staging area
    fn resolve(&mut self);

    /// Submit recorded work and copy the staging area into `output`
    fn readback(&mut self, output: &mut Frame) -> Result<(), FrameError>;

    /// Drop any work recorded for the current frame
    fn discard(&mut self);
}

/// Source of output frames
pub trait FrameAllocator {
    /// A fresh output frame, or `None` if the host has none to give
    fn new_output_frame(&mut self) -> Option<Frame>;
}

/// Frame counters reported when the filter closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames that went through the kernel
    pub sharpened: u64,
    /// Frames delivered as a copy of the input
    pub fallbacks: u64,
    /// Ticks that delivered nothing
    pub skipped: u64,
}

impl std::fmt::Display for FrameStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} sharpened, {} copied, {} skipped",
            self.sharpened, self.fallbacks, self.skipped
        )
    }
}

pub struct FrameProcessor<B> {
    backend: B,
    params: Arc<ParameterStore>,
    stats: FrameStats,
}

impl<B: SharpenBackend> FrameProcessor<B> {
    pub fn new(backend: B, params: Arc<ParameterStore>) -> Self {
        Self {
            backend,
            params,
            stats: FrameStats::default(),
        }
    }

    /// Turn one input frame into one output frame
    ///
    /// Returns `None` only when there is nothing to deliver: no input, or
    /// no output frame from the host.
    pub fn process<A>(&mut self, input: Option<Frame>, allocator: &mut A) -> Option<Frame>
    where
        A: FrameAllocator + ?Sized,
    {
        let Some(input) = input else {
            info!("No input frame, nothing to deliver");
            self.stats.skipped += 1;
            return None;
        };

        let Some(mut output) = allocator.new_output_frame() else {
            info!("Host could not provide an output frame");
            self.stats.skipped += 1;
            return None;
        };

        match self.sharpen(&input, &mut output) {
            Ok(()) => {
                output.metadata.clone_from(&input.metadata);
                self.stats.sharpened += 1;
            }
            Err(e) => {
                info!(error = %e, "Delivering unsharpened frame");
                self.backend.discard();
                output.copy_from(&input);
                self.stats.fallbacks += 1;
            }
        }
        Some(output)
    }

    fn sharpen(&mut self, input: &Frame, output: &mut Frame) -> Result<(), FrameError> {
        let geometry = self.backend.geometry();
        validate(input, geometry)?;

        self.backend.upload(input)?;

        let sharpness = self.params.get();
        // Input and output share the texture size, so the scale terms are 1
        let (width, height) = (geometry.width as f32, geometry.height as f32);
        let constants = CasConstants::new(sharpness, width, height, width, height);
        self.backend.write_arguments(&constants);

        let size = DispatchSize::for_image(geometry.width, geometry.height);
        debug!(sharpness, x = size.x, y = size.y, "Sharpening frame");
        self.backend.dispatch(size);
        self.backend.resolve();

        self.backend.readback(output)
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn params(&self) -> &Arc<ParameterStore> {
        &self.params
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Give up the backend, releasing its resources when the caller drops it
    pub fn into_parts(self) -> (B, FrameStats) {
        (self.backend, self.stats)
    }
}

/// Accept only packed BGRA frames that fit inside the configured textures
pub fn validate(frame: &Frame, geometry: Geometry) -> Result<(), FrameError> {
    if frame.format != PixelFormat::Bgra8 {
        return Err(FrameError::InvalidFormat);
    }
    if frame.visible_width > geometry.width || frame.visible_height > geometry.height {
        return Err(FrameError::TooLarge {
            width: frame.visible_width,
            height: frame.visible_height,
            max_width: geometry.width,
            max_height: geometry.height,
        });
    }
    let actual = frame.pixels.len();
    match frame.required_len() {
        Some(needed) if needed <= actual && frame.pitch >= frame.visible_pitch() => Ok(()),
        needed => Err(FrameError::Truncated {
            needed: needed.unwrap_or(usize::MAX),
            actual,
        }),
    }
}
