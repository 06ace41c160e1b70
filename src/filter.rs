// SPDX-License-Identifier: GPL-3.0-only

//! Host-facing sharpening filter
//!
//! The host negotiates formats, opens one `CasFilter` per stream, feeds it
//! frames and closes it when the stream ends.

use crate::config::FilterConfig;
use crate::constants::OPTION_SHARPNESS;
use crate::errors::{OpenError, OpenResult};
use crate::frame::{Frame, Geometry, PixelFormat, VideoFormat};
use crate::gpu::{self, GpuResources};
use crate::params::ParameterStore;
use crate::processor::{FrameProcessor, FrameStats};
use crate::shaders::EmbeddedKernels;
use std::sync::Arc;
use tracing::{debug, error, info};

pub use crate::processor::FrameAllocator;

/// Callback invoked with the new value of a watched parameter
pub type ParameterCallback = Box<dyn Fn(f32) + Send + Sync>;

/// Handle returned by `watch_parameter`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Change notification for named host parameters
pub trait ParameterRegistry {
    fn watch_parameter(&mut self, name: &str, callback: ParameterCallback) -> WatchId;
    fn unwatch_parameter(&mut self, id: WatchId);
}

/// Everything a filter needs from its host
pub trait FilterHost: FrameAllocator + ParameterRegistry {}

impl<T: FrameAllocator + ParameterRegistry> FilterHost for T {}

/// Registry hosts can embed to implement `ParameterRegistry`
#[derive(Default)]
pub struct ParameterWatchers {
    next_id: u64,
    watchers: Vec<(WatchId, String, ParameterCallback)>,
}

impl ParameterWatchers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke every callback watching `name`; returns how many ran
    pub fn notify(&self, name: &str, value: f32) -> usize {
        let mut count = 0;
        for (_, watched, callback) in &self.watchers {
            if watched == name {
                callback(value);
                count += 1;
            }
        }
        count
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}

impl ParameterRegistry for ParameterWatchers {
    fn watch_parameter(&mut self, name: &str, callback: ParameterCallback) -> WatchId {
        let id = WatchId(self.next_id);
        self.next_id += 1;
        self.watchers.push((id, name.to_string(), callback));
        id
    }

    fn unwatch_parameter(&mut self, id: WatchId) {
        self.watchers.retain(|(watch, _, _)| *watch != id);
    }
}

/// Lifecycle every video filter exposes to its host
pub trait VideoFilter: Sized {
    fn open(
        host: &mut dyn FilterHost,
        config: &FilterConfig,
        input: &VideoFormat,
        output: &VideoFormat,
    ) -> OpenResult<Self>;

    /// Release all resources; the instance is gone afterwards
    fn close(self, host: &mut dyn FilterHost);

    /// Turn one input frame into at most one output frame
    fn filter(&mut self, host: &mut dyn FilterHost, input: Option<Frame>) -> Option<Frame>;

    /// Apply a parameter change pushed by the host
    fn parameter_changed(&self, name: &str, value: f32);
}

/// Contrast adaptive sharpening on the GPU
pub struct CasFilter {
    processor: FrameProcessor<GpuResources>,
    watch: Option<WatchId>,
}

impl CasFilter {
    pub fn stats(&self) -> FrameStats {
        self.processor.stats()
    }

    pub fn sharpness(&self) -> f32 {
        self.processor.params().get()
    }

    pub fn resources(&self) -> &GpuResources {
        self.processor.backend()
    }
}

/// Reject formats the filter cannot process, returning the texture size
pub fn check_formats(input: &VideoFormat, output: &VideoFormat) -> OpenResult<Geometry> {
    if input.chroma != PixelFormat::Bgra8 {
        return Err(OpenError::UnsupportedFormat(input.chroma.to_string()));
    }
    if !input.is_similar(output) {
        return Err(OpenError::FormatMismatch);
    }
    let geometry = Geometry::of(input);
    if geometry.is_empty() {
        return Err(OpenError::EmptyGeometry);
    }
    Ok(geometry)
}

impl VideoFilter for CasFilter {
    fn open(
        host: &mut dyn FilterHost,
        config: &FilterConfig,
        input: &VideoFormat,
        output: &VideoFormat,
    ) -> OpenResult<Self> {
        let result = open_resources(config, input, output);
        let resources = match result {
            Ok(resources) => resources,
            Err(e) => {
                error!(error = %e, status = ?e.status(), "Open failed");
                return Err(e);
            }
        };

        let config = config.clone().sanitized();
        let params = Arc::new(ParameterStore::new(config.sharpness));
        let watched = Arc::clone(&params);
        let watch = host.watch_parameter(
            OPTION_SHARPNESS,
            Box::new(move |value| watched.set(value)),
        );

        info!(
            adapter = %resources.device_info().adapter_name,
            path = %resources.device_info().path,
            kernel = %resources.variant(),
            sharpness = config.sharpness,
            "Open success"
        );

        Ok(Self {
            processor: FrameProcessor::new(resources, params),
            watch: Some(watch),
        })
    }

    fn close(mut self, host: &mut dyn FilterHost) {
        if let Some(watch) = self.watch.take() {
            host.unwatch_parameter(watch);
        }
        let (resources, stats) = self.processor.into_parts();
        info!(%stats, "Frame statistics");
        drop(resources);
        info!("Close success");
    }

    fn filter(&mut self, host: &mut dyn FilterHost, input: Option<Frame>) -> Option<Frame> {
        self.processor.process(input, host)
    }

    fn parameter_changed(&self, name: &str, value: f32) {
        if name == OPTION_SHARPNESS {
            debug!(value, "Sharpness changed");
            self.processor.params().set(value);
        }
    }
}

fn open_resources(
    config: &FilterConfig,
    input: &VideoFormat,
    output: &VideoFormat,
) -> OpenResult<GpuResources> {
    let geometry = check_formats(input, output)?;
    let device = gpu::create_device(config.adapter_index())?;
    GpuResources::new(device, geometry, &EmbeddedKernels, config.fp16_prefer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_check_formats_rejects_other_chroma() {
        let mut format = VideoFormat::bgra(64, 64);
        format.chroma = PixelFormat::I420;
        assert!(matches!(
            check_formats(&format, &format),
            Err(OpenError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_check_formats_rejects_dissimilar_output() {
        let input = VideoFormat::bgra(64, 64);
        let output = VideoFormat::bgra(64, 32);
        assert!(matches!(
            check_formats(&input, &output),
            Err(OpenError::FormatMismatch)
        ));
    }

    #[test]
    fn test_check_formats_rejects_empty() {
        let format = VideoFormat::bgra(0, 64);
        assert!(matches!(
            check_formats(&format, &format),
            Err(OpenError::EmptyGeometry)
        ));
    }

    #[test]
    fn test_check_formats_returns_geometry() {
        let format = VideoFormat::bgra(1920, 1080);
        assert_eq!(
            check_formats(&format, &format).ok(),
            Some(Geometry {
                width: 1920,
                height: 1080
            })
        );
    }

    #[test]
    fn test_watchers_notify_and_unwatch() {
        let seen = Arc::new(AtomicU32::new(0));
        let mut watchers = ParameterWatchers::new();

        let sink = Arc::clone(&seen);
        let id = watchers.watch_parameter(
            OPTION_SHARPNESS,
            Box::new(move |v| sink.store(v.to_bits(), Ordering::Relaxed)),
        );
        watchers.watch_parameter("other", Box::new(|_| {}));

        assert_eq!(watchers.notify(OPTION_SHARPNESS, 0.25), 1);
        assert_eq!(f32::from_bits(seen.load(Ordering::Relaxed)), 0.25);

        watchers.unwatch_parameter(id);
        assert_eq!(watchers.notify(OPTION_SHARPNESS, 0.75), 0);
        assert_eq!(watchers.len(), 1);
    }
}
