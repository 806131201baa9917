//! The wgpu implementation behind [`Device`](crate::gpu::Device).
//!
//! Buffers are storage buffers of `vec4<f32>` texels, programs are WGSL
//! compute pipelines sharing one bind group layout (see
//! `shaders/common.wgsl`). Allocation, compilation, dispatch and readback
//! run inside validation and out-of-memory error scopes, so their failures
//! surface as render errors instead of reaching the uncaptured-error handler.

use bytemuck::{Pod, Zeroable};
use std::sync::mpsc;
use strata_core::{StrataError, StrataResult};
use wgpu::util::DeviceExt;

use crate::gpu::{Kernel, ProgramDesc};

const COMMON: &str = include_str!("shaders/common.wgsl");
const MAP_ENTRY: &str = include_str!("shaders/map_entry.wgsl");
const BLEND_ENTRY: &str = include_str!("shaders/blend_entry.wgsl");

/// Texels per workgroup side, matching `@workgroup_size` in the entry points.
const WORKGROUP_SIZE: u32 = 8;

/// Mirrors `Dims` in `shaders/common.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct DispatchDims {
    pub width: u32,
    pub height: u32,
    pub source_width: u32,
    pub source_height: u32,
    pub frame: i32,
    pub _pad: [u32; 3],
}

impl DispatchDims {
    pub fn new(target: (u32, u32), source: (u32, u32), frame: i64) -> Self {
        Self {
            width: target.0,
            height: target.1,
            source_width: source.0,
            source_height: source.1,
            frame: frame.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
            _pad: [0; 3],
        }
    }
}

/// Full WGSL module for a program: shared bindings, the kernel body and the
/// entry point for its kind.
pub(crate) fn shader_source(desc: &ProgramDesc) -> String {
    let entry = match desc.kernel {
        Kernel::Map(_) => MAP_ENTRY,
        Kernel::Blend(_) => BLEND_ENTRY,
    };
    format!("{}\n{}\n{}", COMMON, desc.wgsl, entry)
}

fn buffer_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    adapter: wgpu::AdapterInfo,
}

impl WgpuDevice {
    /// Open a headless device on the best available adapter.
    pub fn init() -> StrataResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| StrataError::render("no suitable wgpu adapter found"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("strata.device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))
        .map_err(|e| StrataError::render(format!("failed to open wgpu device: {}", e)))?;

        device.on_uncaptured_error(Box::new(|error| {
            tracing::error!(%error, "uncaptured wgpu error");
        }));

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("strata.bind_group_layout"),
            entries: &[
                buffer_entry(0, wgpu::BufferBindingType::Uniform),
                buffer_entry(1, wgpu::BufferBindingType::Storage { read_only: true }),
                buffer_entry(2, wgpu::BufferBindingType::Storage { read_only: false }),
                buffer_entry(3, wgpu::BufferBindingType::Storage { read_only: true }),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("strata.pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "wgpu device opened");

        Ok(Self {
            device,
            queue,
            bind_group_layout,
            pipeline_layout,
            adapter: info,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter.name
    }

    /// Run `f` inside validation and out-of-memory error scopes, turning any
    /// captured error into a render error prefixed with `context`.
    fn scoped<T>(&self, context: &str, f: impl FnOnce(&wgpu::Device) -> T) -> StrataResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        match validation.or(out_of_memory) {
            Some(error) => Err(StrataError::render(format!("{}: {}", context, error))),
            None => Ok(value),
        }
    }

    /// A zero-initialized texel buffer of `bytes` bytes.
    pub fn create_texels(&self, bytes: u64) -> StrataResult<wgpu::Buffer> {
        let max = u64::from(self.device.limits().max_storage_buffer_binding_size);
        if bytes > max {
            return Err(StrataError::render(format!(
                "buffer of {} bytes exceeds the adapter's storage binding limit of {}",
                bytes, max
            )));
        }
        self.scoped("buffer allocation failed", |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("strata.texels"),
                size: bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })
    }

    /// Compile `desc` into a compute pipeline. WGSL parse and validation
    /// failures are returned as render errors.
    pub fn compile(&self, desc: &ProgramDesc) -> StrataResult<wgpu::ComputePipeline> {
        let source = shader_source(desc);
        let context = format!("failed to compile program '{}'", desc.label);
        self.scoped(&context, |device| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&self.pipeline_layout),
                module: &module,
                entry_point: "main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            })
        })
    }

    /// Dispatch `pipeline` over every texel of `target`.
    pub fn dispatch(
        &self,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        dims: DispatchDims,
        source: &wgpu::Buffer,
        target: &wgpu::Buffer,
        uniforms: &[f32],
    ) -> StrataResult<()> {
        let context = format!("dispatch of '{}' failed", label);
        self.scoped(&context, |device| {
            let dims_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("strata.dims"),
                contents: bytemuck::bytes_of(&dims),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            // A storage binding cannot be empty.
            let params: &[u8] = if uniforms.is_empty() {
                &[0u8; 4]
            } else {
                bytemuck::cast_slice(uniforms)
            };
            let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("strata.params"),
                contents: params,
                usage: wgpu::BufferUsages::STORAGE,
            });

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: dims_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: source.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: target.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: params_buffer.as_entire_binding(),
                    },
                ],
            });

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(label),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(label),
                    timestamp_writes: None,
                });
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(
                    dims.width.div_ceil(WORKGROUP_SIZE),
                    dims.height.div_ceil(WORKGROUP_SIZE),
                    1,
                );
            }
            self.queue.submit(Some(encoder.finish()));
        })
    }

    pub fn clear(&self, buffer: &wgpu::Buffer) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("strata.clear"),
            });
        encoder.clear_buffer(buffer, 0, None);
        self.queue.submit(Some(encoder.finish()));
    }

    pub fn fill(&self, buffer: &wgpu::Buffer, texels: usize, px: [f32; 4]) {
        let data = vec![px; texels];
        self.queue.write_buffer(buffer, 0, bytemuck::cast_slice(&data));
    }

    /// Copy `bytes` bytes of `buffer` into host memory as f32s.
    pub fn read_back(&self, buffer: &wgpu::Buffer, bytes: u64) -> StrataResult<Vec<f32>> {
        let staging = self.scoped("readback failed", |device| {
            let staging = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("strata.readback"),
                size: bytes,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("strata.readback"),
            });
            encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, bytes);
            self.queue.submit(Some(encoder.finish()));
            staging
        })?;

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| StrataError::render("readback was cancelled"))?
            .map_err(|e| StrataError::render(format!("failed to map readback buffer: {}", e)))?;

        let data = slice
            .get_mapped_range()
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        staging.unmap();
        Ok(data)
    }
}
