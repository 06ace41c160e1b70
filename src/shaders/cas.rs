// SPDX-License-Identifier: GPL-3.0-only

//! Kernel argument setup for contrast adaptive sharpening
//!
//! Packs sharpness and image sizes into the two 4-word vectors the kernels
//! read from their uniform block.

use crate::constants::{ARGUMENT_BUFFER_SIZE, GROUP_DIMENSION};

/// Uniform block shared by both kernel variants
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CasConstants {
    /// Scale and offset terms (f32 bit patterns)
    pub const0: [u32; 4],
    /// Peak (f32), peak packed as two halves, scaled width term, unused
    pub const1: [u32; 4],
}

const _: () = assert!(std::mem::size_of::<CasConstants>() as u64 == ARGUMENT_BUFFER_SIZE);

impl CasConstants {
    /// Compute the argument block for one dispatch
    ///
    /// `sharpness` 0 gives the mildest filter, 1 the strongest.
    pub fn new(
        sharpness: f32,
        input_width: f32,
        input_height: f32,
        output_width: f32,
        output_height: f32,
    ) -> Self {
        let scale_x = input_width / output_width;
        let scale_y = input_height / output_height;
        let sharp = -1.0 / lerp(8.0, 5.0, saturate(sharpness));

        Self {
            const0: [
                scale_x.to_bits(),
                scale_y.to_bits(),
                (0.5 * scale_x - 0.5).to_bits(),
                (0.5 * scale_y - 0.5).to_bits(),
            ],
            const1: [
                sharp.to_bits(),
                pack_half2(sharp, 0.0),
                (8.0 * scale_x).to_bits(),
                0,
            ],
        }
    }

    /// The eight words in uniform-buffer order
    pub fn words(&self) -> [u32; 8] {
        let mut words = [0u32; 8];
        words[..4].copy_from_slice(&self.const0);
        words[4..].copy_from_slice(&self.const1);
        words
    }

    /// Filter peak as the kernels see it
    pub fn peak(&self) -> f32 {
        f32::from_bits(self.const1[0])
    }
}

/// Workgroup counts for one dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl DispatchSize {
    /// Groups needed to cover a `width` x `height` image with 16x16 tiles
    pub fn for_image(width: u32, height: u32) -> Self {
        Self {
            x: compute_dispatch_size(width, GROUP_DIMENSION),
            y: compute_dispatch_size(height, GROUP_DIMENSION),
            z: 1,
        }
    }
}

/// Number of workgroups needed to cover `dimension`
#[inline]
pub fn compute_dispatch_size(dimension: u32, workgroup_size: u32) -> u32 {
    dimension.div_ceil(workgroup_size)
}

fn saturate(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn lerp(x: f32, y: f32, t: f32) -> f32 {
    x + (y - x) * t
}

/// Same layout as WGSL `pack2x16float`: `low` in bits 0..16
fn pack_half2(low: f32, high: f32) -> u32 {
    u32::from(f32_to_f16_bits(low)) | (u32::from(f32_to_f16_bits(high)) << 16)
}

/// Convert to IEEE 754 binary16, rounding to nearest with ties to even
pub fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exponent = ((bits >> 23) & 0xff) as i32;
    let mantissa = bits & 0x007f_ffff;

    if exponent == 0xff {
        let nan = if mantissa != 0 { 0x0200 } else { 0 };
        return sign | 0x7c00 | nan;
    }

    let half_exponent = exponent - 127 + 15;
    if half_exponent >= 0x1f {
        return sign | 0x7c00;
    }

    if half_exponent <= 0 {
        // Subnormal half, or flushes to zero
        if half_exponent < -10 {
            return sign;
        }
        let full = mantissa | 0x0080_0000;
        let shift = (14 - half_exponent) as u32;
        let half = round_shift(full, shift);
        return sign | half as u16;
    }

    let kept = ((half_exponent as u32) << 10) | (mantissa >> 13);
    // Carry may ripple into the exponent, which is the correct result
    let half = kept + round_increment(mantissa & 0x1fff, 0x1000, kept);
    sign | half as u16
}

/// `value >> shift`, rounded to nearest with ties to even
fn round_shift(value: u32, shift: u32) -> u32 {
    let kept = value >> shift;
    let dropped = value & ((1 << shift) - 1);
    kept + round_increment(dropped, 1 << (shift - 1), kept)
}

fn round_increment(dropped: u32, halfway: u32, kept: u32) -> u32 {
    if dropped > halfway || (dropped == halfway && kept & 1 == 1) {
        1
    } else {
        0
    }
}
