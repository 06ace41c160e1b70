// SPDX-License-Identifier: MPL-2.0

//! Offline validation of the embedded sharpening kernels

use cas_sharpen::shaders::{EmbeddedKernels, KernelSource, KernelVariant};

fn validate(variant: KernelVariant) -> naga::Module {
    let source = EmbeddedKernels
        .load(variant.resource_name())
        .expect("kernel should be embedded");
    let module = naga::front::wgsl::parse_str(&source)
        .unwrap_or_else(|e| panic!("{} failed to parse: {}", variant, e.emit_to_string(&source)));

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .unwrap_or_else(|e| panic!("{} failed validation: {:?}", variant, e));

    module
}

fn entry_point(module: &naga::Module) -> &naga::EntryPoint {
    module
        .entry_points
        .iter()
        .find(|ep| ep.name == "main")
        .expect("kernel should have a main entry point")
}

#[test]
fn test_standard_kernel_validates() {
    let module = validate(KernelVariant::Standard);
    let ep = entry_point(&module);
    assert_eq!(ep.stage, naga::ShaderStage::Compute);
    assert_eq!(ep.workgroup_size, [8, 8, 1]);
}

#[test]
fn test_reduced_kernel_validates() {
    let module = validate(KernelVariant::Reduced);
    let ep = entry_point(&module);
    assert_eq!(ep.stage, naga::ShaderStage::Compute);
    assert_eq!(ep.workgroup_size, [8, 8, 1]);
}

#[test]
fn test_kernels_share_bindings() {
    for variant in [KernelVariant::Standard, KernelVariant::Reduced] {
        let module = validate(variant);
        let mut bindings: Vec<u32> = module
            .global_variables
            .iter()
            .filter_map(|(_, var)| var.binding.as_ref())
            .map(|binding| {
                assert_eq!(binding.group, 0);
                binding.binding
            })
            .collect();
        bindings.sort_unstable();
        assert_eq!(bindings, vec![0, 1, 2], "{} bindings", variant);
    }
}
