// SPDX-License-Identifier: GPL-3.0-only

//! Runtime-tunable sharpness
//!
//! Written by the host's parameter callback at arbitrary times and read once
//! per frame by the processor. A single atomic word holds the f32 bits, so a
//! reader always observes some complete value written by `set`.

use crate::constants::{DEFAULT_SHARPNESS, SHARPNESS_MAX, SHARPNESS_MIN};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

#[derive(Debug)]
pub struct ParameterStore {
    sharpness: AtomicU32,
}

impl ParameterStore {
    /// Create a store holding `sharpness` (clamped; NaN becomes the default)
    pub fn new(sharpness: f32) -> Self {
        let initial = if sharpness.is_nan() {
            DEFAULT_SHARPNESS
        } else {
            sharpness.clamp(SHARPNESS_MIN, SHARPNESS_MAX)
        };
        Self {
            sharpness: AtomicU32::new(initial.to_bits()),
        }
    }

    /// Store a new sharpness, clamped to [0, 1]. NaN is ignored.
    pub fn set(&self, value: f32) {
        if value.is_nan() {
            debug!("Ignoring NaN sharpness");
            return;
        }
        let clamped = value.clamp(SHARPNESS_MIN, SHARPNESS_MAX);
        self.sharpness.store(clamped.to_bits(), Ordering::Relaxed);
    }

    /// Most recently stored sharpness
    pub fn get(&self) -> f32 {
        f32::from_bits(self.sharpness.load(Ordering::Relaxed))
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(DEFAULT_SHARPNESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_clamps_out_of_range() {
        let store = ParameterStore::new(0.5);
        for (input, expected) in [
            (-1.0, 0.0),
            (-0.0001, 0.0),
            (1.0001, 1.0),
            (42.0, 1.0),
            (f32::INFINITY, 1.0),
            (f32::NEG_INFINITY, 0.0),
            (0.25, 0.25),
        ] {
            store.set(input);
            assert_eq!(store.get(), expected, "set({})", input);
        }
    }

    #[test]
    fn test_nan_keeps_previous_value() {
        let store = ParameterStore::new(0.3);
        store.set(f32::NAN);
        assert_eq!(store.get(), 0.3);
    }

    #[test]
    fn test_nan_initial_value_matches_config_default() {
        let store = ParameterStore::new(f32::NAN);
        let config = crate::config::FilterConfig {
            sharpness: f32::NAN,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(store.get(), DEFAULT_SHARPNESS);
        assert_eq!(store.get(), config.sharpness);
    }

    #[test]
    fn test_concurrent_writer_never_tears() {
        let store = Arc::new(ParameterStore::new(0.0));
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..10_000 {
                    store.set(if i % 2 == 0 { 0.125 } else { 0.875 });
                }
            })
        };

        for _ in 0..10_000 {
            let value = store.get();
            assert!(value == 0.0 || value == 0.125 || value == 0.875);
        }
        writer.join().unwrap();
    }
}
