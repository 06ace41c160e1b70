// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use cas_sharpen::constants::*;
use cas_sharpen::shaders::{CasConstants, DispatchSize};

#[test]
fn test_default_sharpness_in_range() {
    assert!((SHARPNESS_MIN..=SHARPNESS_MAX).contains(&DEFAULT_SHARPNESS));
}

#[test]
fn test_argument_buffer_holds_constants() {
    assert_eq!(
        std::mem::size_of::<CasConstants>() as u64,
        ARGUMENT_BUFFER_SIZE
    );
}

#[test]
fn test_dispatch_covers_image() {
    // Each group covers a square tile of GROUP_DIMENSION pixels
    for (width, height) in [(1, 1), (16, 16), (17, 15), (1920, 1080), (3840, 2160)] {
        let size = DispatchSize::for_image(width, height);
        assert!(size.x * GROUP_DIMENSION >= width);
        assert!(size.y * GROUP_DIMENSION >= height);
        assert!((size.x - 1) * GROUP_DIMENSION < width);
        assert!((size.y - 1) * GROUP_DIMENSION < height);
        assert_eq!(size.z, 1);
    }
}
