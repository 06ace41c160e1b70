// SPDX-License-Identifier: GPL-3.0-only

//! Compute kernels and variant selection
//!
//! Two builds of the sharpening kernel ship inside the binary: a full
//! precision one that every device runs, and a half precision one for
//! devices with `SHADER_F16`. Selection walks an ordered candidate list and
//! keeps the first kernel that compiles.

pub mod cas;

use crate::errors::{OpenError, OpenResult};
use rust_embed::RustEmbed;
use std::borrow::Cow;
use tracing::{debug, error, info, warn};

pub use cas::{CasConstants, DispatchSize, compute_dispatch_size};

/// Kernel builds, addressed by fixed resource names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelVariant {
    /// 32-bit float arithmetic
    Standard,
    /// 16-bit float arithmetic
    Reduced,
}

impl KernelVariant {
    /// Name of the embedded resource holding this variant
    pub fn resource_name(&self) -> &'static str {
        match self {
            KernelVariant::Standard => "cas32.wgsl",
            KernelVariant::Reduced => "cas16.wgsl",
        }
    }
}

impl std::fmt::Display for KernelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelVariant::Standard => write!(f, "standard-precision"),
            KernelVariant::Reduced => write!(f, "reduced-precision"),
        }
    }
}

/// Where kernel sources come from
///
/// Injected into selection so the embedded set can be swapped in tests.
pub trait KernelSource {
    /// WGSL text of the named resource
    fn load(&self, name: &str) -> Result<Cow<'static, str>, String>;
}

#[derive(RustEmbed)]
#[folder = "kernels/"]
struct KernelAssets;

/// Kernels bundled into the binary at build time
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedKernels;

impl KernelSource for EmbeddedKernels {
    fn load(&self, name: &str) -> Result<Cow<'static, str>, String> {
        let file = KernelAssets::get(name).ok_or_else(|| format!("no embedded kernel {}", name))?;
        match file.data {
            Cow::Borrowed(bytes) => std::str::from_utf8(bytes)
                .map(Cow::Borrowed)
                .map_err(|e| format!("kernel {} is not UTF-8: {}", name, e)),
            Cow::Owned(bytes) => String::from_utf8(bytes)
                .map(Cow::Owned)
                .map_err(|e| format!("kernel {} is not UTF-8: {}", name, e)),
        }
    }
}

/// Turns kernel source into something the device can dispatch
pub trait KernelCompiler {
    type Kernel;

    /// Whether the device can run half precision arithmetic
    fn supports_reduced_precision(&self) -> bool;

    fn compile(&self, variant: KernelVariant, source: &str) -> Result<Self::Kernel, String>;
}

/// Kernel chosen for a filter instance
pub struct SelectedKernel<K> {
    pub variant: KernelVariant,
    pub kernel: K,
}

/// Candidate order for the given preference
pub fn candidate_order(prefer_reduced: bool) -> [KernelVariant; 2] {
    if prefer_reduced {
        [KernelVariant::Reduced, KernelVariant::Standard]
    } else {
        [KernelVariant::Standard, KernelVariant::Reduced]
    }
}

/// Pick the active kernel
///
/// The capability probe only runs when the reduced candidate is reached.
/// Fails only when no candidate compiles.
pub fn select_kernel<C: KernelCompiler>(
    compiler: &C,
    source: &dyn KernelSource,
    prefer_reduced: bool,
) -> OpenResult<SelectedKernel<C::Kernel>> {
    for variant in candidate_order(prefer_reduced) {
        if variant == KernelVariant::Reduced && !compiler.supports_reduced_precision() {
            debug!("Device lacks half precision support, skipping reduced kernel");
            continue;
        }

        let text = match source.load(variant.resource_name()) {
            Ok(text) => text,
            Err(e) => {
                error!(%variant, error = %e, "Failed to load kernel resource");
                continue;
            }
        };

        match compiler.compile(variant, &text) {
            Ok(kernel) => {
                info!(%variant, "Compute kernel ready");
                return Ok(SelectedKernel { variant, kernel });
            }
            Err(e) => warn!(%variant, error = %e, "Failed to create compute kernel"),
        }
    }

    error!("Failed to create compute kernel (standard and reduced precision)");
    Err(OpenError::NoKernel)
}
