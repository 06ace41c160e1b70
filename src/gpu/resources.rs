// SPDX-License-Identifier: GPL-3.0-only

//! GPU resource set of one filter instance
//!
//! Everything is created at open and lives until close:
//!
//! 1. Input texture plus the CPU-writable upload buffer that feeds it
//! 2. Output storage texture written by the kernel
//! 3. Staging buffer the output is copied into for CPU readback
//! 4. The selected compute kernel
//! 5. 32-byte constant buffer
//! 6. Input and output views, bound once in a single bind group

use super::{GpuDevice, GpuDeviceInfo, checked};
use crate::constants::{ARGUMENT_BUFFER_SIZE, BYTES_PER_PIXEL};
use crate::errors::{FrameError, GpuResource, OpenResult};
use crate::frame::{Frame, Geometry, copy_rows, extend_edges};
use crate::processor::SharpenBackend;
use crate::shaders::{
    CasConstants, DispatchSize, KernelCompiler, KernelSource, KernelVariant, SelectedKernel,
    select_kernel,
};
use std::borrow::Cow;
use std::num::NonZeroU64;
use tracing::{debug, info, trace};

/// Textures hold the packed 32-bit pixels byte for byte
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Row pitch of the upload and staging buffers for `width` pixels
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL as u32;
    unpadded.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
}

/// Compiles kernels into compute pipelines against the shared layout
pub struct WgpuKernelCompiler<'a> {
    pub device: &'a wgpu::Device,
    pub layout: &'a wgpu::PipelineLayout,
}

impl KernelCompiler for WgpuKernelCompiler<'_> {
    type Kernel = wgpu::ComputePipeline;

    fn supports_reduced_precision(&self) -> bool {
        self.device.features().contains(wgpu::Features::SHADER_F16)
    }

    fn compile(&self, variant: KernelVariant, source: &str) -> Result<Self::Kernel, String> {
        let label = format!("cas_{}", variant);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&label),
                layout: Some(self.layout),
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });

        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        match out_of_memory.or(validation) {
            Some(e) => Err(e.to_string()),
            None => Ok(pipeline),
        }
    }
}

/// GPU objects owned by one filter instance
///
/// Fields drop top to bottom, which is the reverse of creation order.
pub struct GpuResources {
    pending: Option<wgpu::CommandEncoder>,
    bind_group: wgpu::BindGroup,
    // Views stay alive as long as the bind group that references them
    #[allow(dead_code)]
    output_view: wgpu::TextureView,
    #[allow(dead_code)]
    input_view: wgpu::TextureView,
    constant_buffer: wgpu::Buffer,
    kernel: wgpu::ComputePipeline,
    staging_buffer: wgpu::Buffer,
    output_texture: wgpu::Texture,
    upload_buffer: wgpu::Buffer,
    input_texture: wgpu::Texture,
    queue: wgpu::Queue,
    device: wgpu::Device,
    variant: KernelVariant,
    geometry: Geometry,
    padded_row: u32,
    info: GpuDeviceInfo,
}

impl GpuResources {
    /// Build the full resource set on `gpu`, failing on the first step that errors
    pub fn new(
        gpu: GpuDevice,
        geometry: Geometry,
        kernels: &dyn KernelSource,
        prefer_reduced: bool,
    ) -> OpenResult<Self> {
        let GpuDevice {
            device,
            queue,
            info,
        } = gpu;

        debug!(
            width = geometry.width,
            height = geometry.height,
            "Allocating sharpening resources"
        );

        let extent = extent(geometry);
        let padded_row = padded_bytes_per_row(geometry.width);
        let buffer_size = u64::from(padded_row) * u64::from(geometry.height);

        let input_texture = checked(&device, GpuResource::InputTexture, || {
            device.create_texture(&texture_descriptor(
                "cas_input_texture",
                extent,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            ))
        })?;

        let upload_buffer = checked(&device, GpuResource::UploadBuffer, || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("cas_upload_buffer"),
                size: buffer_size,
                usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        })?;

        let output_texture = checked(&device, GpuResource::OutputTexture, || {
            device.create_texture(&texture_descriptor(
                "cas_output_texture",
                extent,
                wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
            ))
        })?;

        // The CPU cannot read a storage texture; the output is copied here first
        let staging_buffer = checked(&device, GpuResource::StagingBuffer, || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("cas_staging_buffer"),
                size: buffer_size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;

        let bind_group_layout = create_bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("cas_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let compiler = WgpuKernelCompiler {
            device: &device,
            layout: &pipeline_layout,
        };
        let SelectedKernel { variant, kernel } =
            select_kernel(&compiler, kernels, prefer_reduced)?;

        let constant_buffer = checked(&device, GpuResource::ConstantBuffer, || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("cas_constant_buffer"),
                size: ARGUMENT_BUFFER_SIZE,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;

        let input_view = checked(&device, GpuResource::InputView, || {
            input_texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("cas_input_view"),
                ..Default::default()
            })
        })?;

        let output_view = checked(&device, GpuResource::OutputView, || {
            output_texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("cas_output_view"),
                ..Default::default()
            })
        })?;

        let bind_group = checked(&device, GpuResource::BindGroup, || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("cas_bind_group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: constant_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&input_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&output_view),
                    },
                ],
            })
        })?;

        info!(
            adapter = %info.adapter_name,
            %variant,
            width = geometry.width,
            height = geometry.height,
            "Sharpening resources ready"
        );

        Ok(Self {
            pending: None,
            bind_group,
            output_view,
            input_view,
            constant_buffer,
            kernel,
            staging_buffer,
            output_texture,
            upload_buffer,
            input_texture,
            queue,
            device,
            variant,
            geometry,
            padded_row,
            info,
        })
    }

    /// Kernel variant bound for this instance
    pub fn variant(&self) -> KernelVariant {
        self.variant
    }

    pub fn device_info(&self) -> &GpuDeviceInfo {
        &self.info
    }
}

impl SharpenBackend for GpuResources {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn upload(&mut self, frame: &Frame) -> Result<(), FrameError> {
        map_blocking(&self.device, &self.upload_buffer, wgpu::MapMode::Write)
            .map_err(FrameError::UploadMap)?;
        {
            let mut mapped = self.upload_buffer.slice(..).get_mapped_range_mut();
            copy_rows(
                &mut mapped,
                self.padded_row as usize,
                &frame.pixels,
                frame.pitch,
                frame.visible_pitch(),
                frame.visible_lines(),
            );
            extend_edges(
                &mut mapped,
                self.padded_row as usize,
                frame.visible_pitch(),
                frame.visible_lines(),
                self.geometry.width as usize * BYTES_PER_PIXEL,
                self.geometry.height as usize,
            );
        }
        self.upload_buffer.unmap();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("cas_frame_encoder"),
            });
        encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer: &self.upload_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_row),
                    rows_per_image: Some(self.geometry.height),
                },
            },
            texture_copy(&self.input_texture),
            extent(self.geometry),
        );
        self.pending = Some(encoder);
        Ok(())
    }

    fn write_arguments(&mut self, constants: &CasConstants) {
        let words = constants.words();
        trace!(?words, "Writing kernel arguments");
        self.queue
            .write_buffer(&self.constant_buffer, 0, bytemuck::cast_slice(&words));
    }

    fn dispatch(&mut self, size: DispatchSize) {
        let Some(encoder) = self.pending.as_mut() else {
            return;
        };
        trace!(x = size.x, y = size.y, z = size.z, "Dispatching sharpening kernel");

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("cas_compute_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.kernel);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(size.x, size.y, size.z);
    }

    fn resolve(&mut self) {
        let Some(encoder) = self.pending.as_mut() else {
            return;
        };
        encoder.copy_texture_to_buffer(
            texture_copy(&self.output_texture),
            wgpu::TexelCopyBufferInfo {
                buffer: &self.staging_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_row),
                    rows_per_image: Some(self.geometry.height),
                },
            },
            extent(self.geometry),
        );
    }

    fn readback(&mut self, output: &mut Frame) -> Result<(), FrameError> {
        let encoder = self.pending.take().ok_or(FrameError::NothingRecorded)?;
        self.queue.submit(std::iter::once(encoder.finish()));

        map_blocking(&self.device, &self.staging_buffer, wgpu::MapMode::Read)
            .map_err(FrameError::ReadbackMap)?;
        {
            let mapped = self.staging_buffer.slice(..).get_mapped_range();
            let row_len = output
                .visible_pitch()
                .min(self.geometry.width as usize * BYTES_PER_PIXEL);
            let rows = output.visible_lines().min(self.geometry.height as usize);
            let pitch = output.pitch;
            copy_rows(
                &mut output.pixels,
                pitch,
                &mapped,
                self.padded_row as usize,
                row_len,
                rows,
            );
        }
        self.staging_buffer.unmap();
        Ok(())
    }

    fn discard(&mut self) {
        if self.pending.take().is_some() {
            debug!("Discarded recorded frame work");
        }
    }
}

impl Drop for GpuResources {
    fn drop(&mut self) {
        debug!(adapter = %self.info.adapter_name, "Releasing sharpening resources");
    }
}

/// Map a whole buffer and block until the GPU has released it
fn map_blocking(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
    mode: wgpu::MapMode,
) -> Result<(), String> {
    let (sender, receiver) = futures::channel::oneshot::channel();
    buffer.slice(..).map_async(mode, move |result| {
        let _ = sender.send(result);
    });

    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| format!("Failed to poll device: {}", e))?;

    pollster::block_on(receiver)
        .map_err(|_| "Failed to receive buffer mapping".to_string())?
        .map_err(|e| e.to_string())
}

fn extent(geometry: Geometry) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: geometry.width,
        height: geometry.height,
        depth_or_array_layers: 1,
    }
}

fn texture_copy(texture: &wgpu::Texture) -> wgpu::TexelCopyTextureInfo<'_> {
    wgpu::TexelCopyTextureInfo {
        texture,
        mip_level: 0,
        origin: wgpu::Origin3d::ZERO,
        aspect: wgpu::TextureAspect::All,
    }
}

fn texture_descriptor(
    label: &'static str,
    size: wgpu::Extent3d,
    usage: wgpu::TextureUsages,
) -> wgpu::TextureDescriptor<'static> {
    wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage,
        view_formats: &[],
    }
}

/// Uniform block, input texture, output storage texture
fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("cas_bind_group_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(ARGUMENT_BUFFER_SIZE),
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: TEXTURE_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
        ],
    })
}
