// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing GPU adapters
//! - Sharpening still images through the same filter a video host would open

use cas_sharpen::constants::{HOST_PITCH_ALIGNMENT, OPTION_SHARPNESS};
use cas_sharpen::filter::{ParameterCallback, WatchId};
use cas_sharpen::gpu;
use cas_sharpen::{
    CasFilter, FilterConfig, Frame, FrameAllocator, ParameterRegistry, ParameterWatchers,
    VideoFilter, VideoFormat,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Arguments of the `sharpen` command
pub struct SharpenArgs {
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub config: Option<PathBuf>,
    pub adapter: Option<i64>,
    pub sharpness: Option<f32>,
    pub fp16: bool,
    pub sharpness_step: Option<f32>,
}

/// List all enumerated GPU adapters
pub fn list_adapters() -> Result<(), Box<dyn std::error::Error>> {
    let adapters = gpu::list_adapters();

    if adapters.is_empty() {
        println!("No GPU adapters found.");
        return Ok(());
    }

    println!("Available adapters:");
    println!();
    for (index, adapter) in adapters.iter().enumerate() {
        let software = if adapter.is_software() {
            " (software)"
        } else {
            ""
        };
        println!("  [{}] {}{}", index, adapter.name, software);
        println!(
            "      Type: {:?}, Backend: {:?}",
            adapter.device_type, adapter.backend
        );
        println!();
    }

    Ok(())
}

/// Host that hands out output frames sized like the image being filtered
///
/// A smaller image is sharpened as a sub-rectangle and a larger one is
/// copied, so in both cases the output keeps the input's own size.
struct ImageHost {
    output_format: VideoFormat,
    watchers: ParameterWatchers,
}

impl ImageHost {
    fn new(stream_format: VideoFormat) -> Self {
        Self {
            output_format: stream_format,
            watchers: ParameterWatchers::new(),
        }
    }

    /// Size the next output frame after `input`
    fn prepare_output(&mut self, input: Option<&Frame>) {
        if let Some(frame) = input {
            self.output_format = VideoFormat::bgra(frame.visible_width, frame.visible_height);
        }
    }
}

impl FrameAllocator for ImageHost {
    fn new_output_frame(&mut self) -> Option<Frame> {
        Some(Frame::alloc(&self.output_format, HOST_PITCH_ALIGNMENT))
    }
}

impl ParameterRegistry for ImageHost {
    fn watch_parameter(&mut self, name: &str, callback: ParameterCallback) -> WatchId {
        self.watchers.watch_parameter(name, callback)
    }

    fn unwatch_parameter(&mut self, id: WatchId) {
        self.watchers.unwatch_parameter(id);
    }
}

/// Run every input image through one filter instance and write PNGs
pub fn sharpen_images(args: SharpenArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => FilterConfig::from_json_file(path)?,
        None => FilterConfig::default(),
    };
    if let Some(adapter) = args.adapter {
        config.adapter = adapter;
    }
    if let Some(sharpness) = args.sharpness {
        config.sharpness = sharpness;
    }
    if args.fp16 {
        config.fp16_prefer = true;
    }
    let config = config.sanitized();

    let Some(first) = args.inputs.first() else {
        return Err("No input images given".into());
    };
    let (width, height) = image::image_dimensions(first)?;
    let format = VideoFormat::bgra(width, height);

    std::fs::create_dir_all(&args.output_dir)?;

    let mut host = ImageHost::new(format);

    println!("Opening filter for {}x{}...", width, height);
    let mut filter = CasFilter::open(&mut host, &config, &format, &format)?;
    let info = filter.resources().device_info();
    println!(
        "Using {} ({:?}, {}), {} kernel",
        info.adapter_name,
        info.backend,
        info.path,
        filter.resources().variant()
    );

    let mut sharpness = config.sharpness;
    for input in &args.inputs {
        let frame = match load_frame(input) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(path = %input.display(), error = %e, "Failed to load image");
                None
            }
        };

        host.prepare_output(frame.as_ref());
        if let Some(output) = filter.filter(&mut host, frame) {
            let path = output_path(&args.output_dir, input);
            save_frame(&output, &path)?;
            println!("  {} -> {}", input.display(), path.display());
        } else {
            println!("  {} skipped", input.display());
        }

        if let Some(step) = args.sharpness_step {
            sharpness = (sharpness + step).clamp(0.0, 1.0);
            let notified = host.watchers.notify(OPTION_SHARPNESS, sharpness);
            info!(sharpness, notified, "Sharpness stepped");
        }
    }

    let stats = filter.stats();
    filter.close(&mut host);
    println!("Done: {}", stats);

    Ok(())
}

/// Decode an image into a packed BGRA frame
fn load_frame(path: &Path) -> Result<Frame, image::ImageError> {
    let rgba = image::open(path)?.to_rgba8();
    let format = VideoFormat::bgra(rgba.width(), rgba.height());
    let mut frame = Frame::alloc(&format, HOST_PITCH_ALIGNMENT);
    let row_len = frame.visible_pitch();
    let pitch = frame.pitch;

    for (dst_row, src_row) in frame
        .pixels
        .chunks_mut(pitch)
        .zip(rgba.as_raw().chunks(row_len))
    {
        for (dst, src) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
            dst.copy_from_slice(&[src[2], src[1], src[0], src[3]]);
        }
    }
    Ok(frame)
}

/// Encode the visible area of a BGRA frame as PNG
fn save_frame(frame: &Frame, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut rgba = Vec::with_capacity(frame.visible_pitch() * frame.visible_lines());
    for y in 0..frame.visible_lines() {
        let row = frame.row(y).ok_or("Frame buffer shorter than its visible area")?;
        for px in row.chunks_exact(4) {
            rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        }
    }

    let image = image::RgbaImage::from_raw(frame.visible_width, frame.visible_height, rgba)
        .ok_or("Failed to build output image")?;
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

fn output_path(dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    dir.join(format!("{}_sharpened.png", stem))
}
