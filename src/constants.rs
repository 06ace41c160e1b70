// SPDX-License-Identifier: GPL-3.0-only

//! Filter-wide constants

/// Zero-based adapter index option
pub const OPTION_ADAPTER: &str = "cas-adapter";

/// Sharpness option, also the only parameter watched at runtime
pub const OPTION_SHARPNESS: &str = "cas-sharpness";

/// Reduced-precision preference option
pub const OPTION_FP16_PREFER: &str = "cas-fp16prefer";

/// Default adapter index
pub const DEFAULT_ADAPTER: u32 = 0;

/// Default sharpness
pub const DEFAULT_SHARPNESS: f32 = 0.8;

/// Lowest accepted sharpness
pub const SHARPNESS_MIN: f32 = 0.0;

/// Highest accepted sharpness
pub const SHARPNESS_MAX: f32 = 1.0;

/// Size of the kernel argument block: two vectors of four 32-bit words
pub const ARGUMENT_BUFFER_SIZE: u64 = 32;

/// Pixels covered by one workgroup along each axis
pub const GROUP_DIMENSION: u32 = 16;

/// Bytes per pixel of the packed 32-bit frame format
pub const BYTES_PER_PIXEL: usize = 4;

/// Row alignment used when the CLI host allocates frames
pub const HOST_PITCH_ALIGNMENT: usize = 64;
