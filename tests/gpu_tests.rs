// SPDX-License-Identifier: MPL-2.0

//! Tests against a real adapter; each one skips when no GPU is reachable

use cas_sharpen::constants::{HOST_PITCH_ALIGNMENT, OPTION_SHARPNESS};
use cas_sharpen::filter::{ParameterCallback, WatchId};
use cas_sharpen::gpu;
use cas_sharpen::{
    CasFilter, FilterConfig, Frame, FrameAllocator, ParameterRegistry, ParameterWatchers,
    VideoFilter, VideoFormat,
};

struct TestHost {
    format: VideoFormat,
    watchers: ParameterWatchers,
}

impl TestHost {
    fn new(format: VideoFormat) -> Self {
        Self {
            format,
            watchers: ParameterWatchers::new(),
        }
    }
}

impl FrameAllocator for TestHost {
    fn new_output_frame(&mut self) -> Option<Frame> {
        Some(Frame::alloc(&self.format, HOST_PITCH_ALIGNMENT))
    }
}

impl ParameterRegistry for TestHost {
    fn watch_parameter(&mut self, name: &str, callback: ParameterCallback) -> WatchId {
        self.watchers.watch_parameter(name, callback)
    }

    fn unwatch_parameter(&mut self, id: WatchId) {
        self.watchers.unwatch_parameter(id);
    }
}

/// Open a filter, or `None` when this machine has no usable adapter
fn open(host: &mut TestHost, config: &FilterConfig) -> Option<CasFilter> {
    let format = host.format;
    match CasFilter::open(host, config, &format, &format) {
        Ok(filter) => Some(filter),
        Err(e) => {
            println!("Skipping GPU test: {}", e);
            None
        }
    }
}

fn uniform_frame(format: &VideoFormat, pixel: [u8; 4]) -> Frame {
    let mut frame = Frame::alloc(format, HOST_PITCH_ALIGNMENT);
    let row_len = frame.visible_pitch();
    let pitch = frame.pitch;
    for row in frame.pixels.chunks_mut(pitch) {
        for px in row[..row_len].chunks_exact_mut(4) {
            px.copy_from_slice(&pixel);
        }
    }
    frame
}

#[test]
fn test_list_adapters_does_not_panic() {
    for adapter in gpu::list_adapters() {
        assert!(!adapter.name.is_empty() || adapter.is_software());
    }
}

#[test]
fn test_missing_adapter_index_opens_default_hardware() {
    let format = VideoFormat::bgra(64, 64);
    let mut host = TestHost::new(format);
    let config = FilterConfig {
        adapter: 1_000,
        sharpness: 0.8,
        fp16_prefer: false,
    };

    let Some(filter) = open(&mut host, &config) else {
        return;
    };
    assert_eq!(
        filter.resources().device_info().path,
        gpu::AdapterPath::DefaultHardware
    );
    assert_eq!(
        filter.resources().variant(),
        cas_sharpen::shaders::KernelVariant::Standard
    );
    assert_eq!(host.watchers.len(), 1);

    filter.close(&mut host);
    assert!(host.watchers.is_empty(), "close should unwatch sharpness");
}

#[test]
fn test_uniform_frame_is_unchanged() {
    let format = VideoFormat::bgra(100, 60);
    let mut host = TestHost::new(format);
    let config = FilterConfig {
        sharpness: 0.0,
        ..Default::default()
    };

    let Some(mut filter) = open(&mut host, &config) else {
        return;
    };

    let input = uniform_frame(&format, [40, 120, 200, 255]);
    let output = filter.filter(&mut host, Some(input.clone())).unwrap();

    for y in 0..output.visible_lines() {
        assert_eq!(output.row(y), input.row(y), "row {} differs", y);
    }
    assert_eq!(filter.stats().sharpened, 1);

    // A runtime change reaches the filter through the host's callback
    host.watchers.notify(OPTION_SHARPNESS, 1.0);
    assert_eq!(filter.sharpness(), 1.0);
    let output = filter.filter(&mut host, Some(input.clone())).unwrap();
    for y in 0..output.visible_lines() {
        assert_eq!(output.row(y), input.row(y), "row {} differs", y);
    }

    filter.close(&mut host);
}

#[test]
fn test_edge_is_sharpened() {
    let format = VideoFormat::bgra(32, 32);
    let mut host = TestHost::new(format);
    let config = FilterConfig {
        sharpness: 1.0,
        ..Default::default()
    };

    let Some(mut filter) = open(&mut host, &config) else {
        return;
    };

    // Dark left half, light right half
    let mut input = uniform_frame(&format, [64, 64, 64, 255]);
    let pitch = input.pitch;
    for row in input.pixels.chunks_mut(pitch) {
        for px in row[16 * 4..32 * 4].chunks_exact_mut(4) {
            px.copy_from_slice(&[192, 192, 192, 255]);
        }
    }

    let output = filter.filter(&mut host, Some(input.clone())).unwrap();
    let row = output.row(8).unwrap();
    // Contrast across the edge grows, alpha is untouched
    assert!(row[15 * 4 + 1] < 64);
    assert!(row[16 * 4 + 1] > 192);
    assert_eq!(row[15 * 4 + 3], 255);
    // Far from the edge nothing changes
    assert_eq!(row[4 * 4 + 1], 64);

    filter.close(&mut host);
}
