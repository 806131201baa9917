//! The device context every render runs against.
//!
//! Buffers are RGBA32F texel arrays owned through [`GpuBuffer`] handles, and
//! programs are data-parallel kernels dispatched over every texel of a target
//! buffer. A buffer is released the moment its handle is dropped, so every
//! exit path of a render, including `?` on an error, returns its memory.
//!
//! Programs run on wgpu compute pipelines when an adapter is available. Each
//! program also carries a host kernel with the same arithmetic, which the CPU
//! backend dispatches through rayon when no adapter can be opened or when the
//! configuration asks for it.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use strata_core::{Color, DeviceBackend, DeviceConfig, Image, StrataError, StrataResult};

use crate::wgpu_device::{DispatchDims, WgpuDevice};

/// Bytes per RGBA32F texel.
pub const TEXEL_BYTES: u64 = 16;

#[derive(Debug, Default)]
struct Counters {
    live_buffers: AtomicUsize,
    live_bytes: AtomicU64,
    peak_buffers: AtomicUsize,
    peak_bytes: AtomicU64,
    allocations: AtomicU64,
}

/// Snapshot of device resource usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceStats {
    pub live_buffers: usize,
    pub live_bytes: u64,
    pub peak_buffers: usize,
    pub peak_bytes: u64,
    /// Buffers allocated over the device lifetime.
    pub allocations: u64,
    /// Compiled programs held by the cache.
    pub programs: usize,
}

enum Texels {
    Host(Vec<[f32; 4]>),
    Device {
        buffer: wgpu::Buffer,
        backend: Arc<WgpuDevice>,
    },
}

/// A device-resident RGBA32F buffer.
pub struct GpuBuffer {
    width: u32,
    height: u32,
    texels: Texels,
    counters: Arc<Counters>,
}

impl GpuBuffer {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    pub fn byte_size(&self) -> u64 {
        self.texel_count() as u64 * TEXEL_BYTES
    }

    pub fn fill(&mut self, color: &Color) {
        let px = color.to_array();
        let texels = self.texel_count();
        match &mut self.texels {
            Texels::Host(data) => data.iter_mut().for_each(|t| *t = px),
            Texels::Device { buffer, backend } => backend.fill(buffer, texels, px),
        }
    }

    /// Reset every texel to transparent black.
    pub fn clear(&mut self) {
        match &mut self.texels {
            Texels::Host(data) => data.iter_mut().for_each(|t| *t = [0.0; 4]),
            Texels::Device { buffer, backend } => backend.clear(buffer),
        }
    }

    /// Copy the buffer back into host memory.
    pub fn read_back(&self) -> StrataResult<Image> {
        match &self.texels {
            Texels::Host(data) => Ok(Image::from_texels(self.width, self.height, data)),
            Texels::Device { buffer, backend } => {
                let floats = backend.read_back(buffer, self.byte_size())?;
                let texels: Vec<[f32; 4]> = floats
                    .chunks_exact(4)
                    .map(|c| [c[0], c[1], c[2], c[3]])
                    .collect();
                Ok(Image::from_texels(self.width, self.height, &texels))
            }
        }
    }

    pub fn is_device_resident(&self) -> bool {
        matches!(self.texels, Texels::Device { .. })
    }

    fn host_texel(data: &[[f32; 4]], width: u32, height: u32, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= width || y >= height {
            return None;
        }
        data.get((y as usize) * (width as usize) + (x as usize)).copied()
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("device_resident", &self.is_device_resident())
            .finish()
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        if let Texels::Device { buffer, .. } = &self.texels {
            buffer.destroy();
        }
        let bytes = self.byte_size();
        self.counters.live_buffers.fetch_sub(1, Ordering::Relaxed);
        self.counters.live_bytes.fetch_sub(bytes, Ordering::Relaxed);
        tracing::trace!(width = self.width, height = self.height, "buffer released");
    }
}

/// Per-texel view handed to a host map kernel.
pub struct Invocation<'a> {
    pub x: u32,
    pub y: u32,
    /// Dimensions of the target buffer.
    pub width: u32,
    pub height: u32,
    /// The frame being rendered.
    pub frame: i64,
    source: &'a [[f32; 4]],
    source_width: u32,
    source_height: u32,
    uniforms: &'a [f32],
}

impl<'a> Invocation<'a> {
    /// The source texel at this invocation's coordinates, transparent when
    /// the source is smaller than the target.
    pub fn texel(&self) -> [f32; 4] {
        self.fetch(self.x, self.y)
    }

    fn fetch(&self, x: u32, y: u32) -> [f32; 4] {
        GpuBuffer::host_texel(self.source, self.source_width, self.source_height, x, y)
            .unwrap_or([0.0; 4])
    }

    /// Source texel with coordinates clamped to the edge.
    pub fn fetch_clamped(&self, x: i64, y: i64) -> [f32; 4] {
        let sx = x.clamp(0, i64::from(self.source_width) - 1) as u32;
        let sy = y.clamp(0, i64::from(self.source_height) - 1) as u32;
        self.fetch(sx, sy)
    }

    /// Source texel, transparent outside the buffer.
    pub fn fetch_border(&self, x: i64, y: i64) -> [f32; 4] {
        if x < 0 || y < 0 || x > i64::from(u32::MAX) || y > i64::from(u32::MAX) {
            return [0.0; 4];
        }
        self.fetch(x as u32, y as u32)
    }

    pub fn source_size(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }

    /// Decode the uniform block as a parameter struct.
    pub fn params<T: bytemuck::Pod>(&self) -> T {
        bytemuck::try_pod_read_unaligned(bytemuck::cast_slice(self.uniforms))
            .unwrap_or_else(|_| T::zeroed())
    }
}

/// Computes one target texel.
pub type MapKernel = fn(&Invocation<'_>) -> [f32; 4];

/// Combines a target texel (`dst`) with the matching source texel (`src`).
pub type BlendKernel = fn(dst: [f32; 4], src: [f32; 4]) -> [f32; 4];

#[derive(Clone, Copy)]
pub enum Kernel {
    Map(MapKernel),
    Blend(BlendKernel),
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kernel::Map(_) => write!(f, "Kernel::Map"),
            Kernel::Blend(_) => write!(f, "Kernel::Blend"),
        }
    }
}

/// Everything needed to compile a program. `label` is the stage identity the
/// program cache is keyed on.
///
/// `wgsl` holds the device kernel: a map program defines
/// `fn kernel(x: u32, y: u32) -> vec4<f32>` and a blend program defines
/// `fn blend(dst: vec4<f32>, src: vec4<f32>) -> vec4<f32>`, both against the
/// bindings of `shaders/common.wgsl`. `kernel` is the host equivalent.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc {
    pub label: &'static str,
    pub kernel: Kernel,
    pub wgsl: &'static str,
    /// Number of f32 uniforms the kernel expects.
    pub uniform_len: usize,
}

impl ProgramDesc {
    pub const fn map(
        label: &'static str,
        kernel: MapKernel,
        wgsl: &'static str,
        uniform_len: usize,
    ) -> Self {
        Self {
            label,
            kernel: Kernel::Map(kernel),
            wgsl,
            uniform_len,
        }
    }

    pub const fn blend(label: &'static str, kernel: BlendKernel, wgsl: &'static str) -> Self {
        Self {
            label,
            kernel: Kernel::Blend(kernel),
            wgsl,
            uniform_len: 0,
        }
    }
}

/// A compiled program.
#[derive(Debug)]
pub struct Program {
    desc: ProgramDesc,
    pipeline: Option<wgpu::ComputePipeline>,
}

impl Program {
    pub fn label(&self) -> &'static str {
        self.desc.label
    }
}

/// f32 count of a uniform block.
pub const fn uniform_len<T>() -> usize {
    std::mem::size_of::<T>() / std::mem::size_of::<f32>()
}

/// View a parameter struct as the uniform slice a dispatch takes. A struct
/// that is not a whole number of f32s yields an empty slice, which dispatch
/// then rejects.
pub fn uniforms<T: bytemuck::Pod>(params: &T) -> &[f32] {
    bytemuck::try_cast_slice(std::slice::from_ref(params)).unwrap_or(&[])
}

/// The single device context a render runs against.
pub struct Device {
    limits: DeviceConfig,
    backend: Option<Arc<WgpuDevice>>,
    counters: Arc<Counters>,
    programs: DashMap<&'static str, Arc<Program>>,
}

impl Device {
    /// Open the device `limits.backend` asks for. `Auto` falls back to the
    /// CPU backend when no wgpu adapter can be opened.
    pub fn new(limits: DeviceConfig) -> StrataResult<Self> {
        let backend = match limits.backend {
            DeviceBackend::Cpu => None,
            DeviceBackend::Gpu => Some(Arc::new(WgpuDevice::init()?)),
            DeviceBackend::Auto => match WgpuDevice::init() {
                Ok(backend) => Some(Arc::new(backend)),
                Err(error) => {
                    tracing::warn!(%error, "no GPU available, rendering on the CPU");
                    None
                }
            },
        };
        Ok(Self::with_backend(limits, backend))
    }

    /// A device that always runs on the CPU backend.
    pub fn cpu(limits: DeviceConfig) -> Self {
        Self::with_backend(limits, None)
    }

    fn with_backend(limits: DeviceConfig, backend: Option<Arc<WgpuDevice>>) -> Self {
        Self {
            limits,
            backend,
            counters: Arc::new(Counters::default()),
            programs: DashMap::new(),
        }
    }

    pub fn limits(&self) -> &DeviceConfig {
        &self.limits
    }

    pub fn is_gpu(&self) -> bool {
        self.backend.is_some()
    }

    /// Name of the adapter programs run on, `"cpu"` for the CPU backend.
    pub fn adapter_name(&self) -> &str {
        self.backend.as_ref().map_or("cpu", |b| b.adapter_name())
    }

    /// Allocate a transparent `width`×`height` buffer.
    pub fn allocate(&self, width: u32, height: u32) -> StrataResult<GpuBuffer> {
        if width == 0 || height == 0 {
            return Err(StrataError::render(format!(
                "cannot allocate a {}x{} buffer",
                width, height
            )));
        }
        let max_dim = self.limits.max_texture_dimension;
        if width > max_dim || height > max_dim {
            return Err(StrataError::render(format!(
                "buffer {}x{} exceeds the device limit of {}",
                width, height, max_dim
            )));
        }

        let bytes = u64::from(width) * u64::from(height) * TEXEL_BYTES;
        let live = self.counters.live_bytes.load(Ordering::Relaxed);
        if let Some(budget) = self.limits.max_live_bytes {
            if live + bytes > budget {
                return Err(StrataError::render(format!(
                    "out of device memory: {} bytes live, {} requested, budget {}",
                    live, bytes, budget
                )));
            }
        }

        let texels = match &self.backend {
            Some(backend) => Texels::Device {
                buffer: backend.create_texels(bytes)?,
                backend: Arc::clone(backend),
            },
            None => Texels::Host(vec![[0.0; 4]; (width as usize) * (height as usize)]),
        };

        let buffers = self.counters.live_buffers.fetch_add(1, Ordering::Relaxed) + 1;
        let live = self.counters.live_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.counters.peak_buffers.fetch_max(buffers, Ordering::Relaxed);
        self.counters.peak_bytes.fetch_max(live, Ordering::Relaxed);
        self.counters.allocations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(width, height, live_buffers = buffers, "buffer allocated");

        Ok(GpuBuffer {
            width,
            height,
            texels,
            counters: Arc::clone(&self.counters),
        })
    }

    /// Look up or compile the program for `desc`. Programs are compiled once
    /// per stage identity and kept for the device lifetime.
    pub fn program(&self, desc: &ProgramDesc) -> StrataResult<Arc<Program>> {
        if let Some(program) = self.programs.get(desc.label) {
            return Ok(Arc::clone(program.value()));
        }
        if self.programs.len() >= self.limits.max_programs {
            return Err(StrataError::render(format!(
                "cannot compile '{}': program cache is full ({} programs)",
                desc.label, self.limits.max_programs
            )));
        }
        match self.programs.entry(desc.label) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let pipeline = match &self.backend {
                    Some(backend) => Some(backend.compile(desc)?),
                    None => None,
                };
                tracing::trace!(label = desc.label, gpu = pipeline.is_some(), "program compiled");
                let program = Arc::new(Program {
                    desc: *desc,
                    pipeline,
                });
                entry.insert(Arc::clone(&program));
                Ok(program)
            }
        }
    }

    /// Run a map program over every texel of `target`, reading from `source`.
    pub fn dispatch(
        &self,
        program: &Program,
        source: &GpuBuffer,
        target: &mut GpuBuffer,
        uniforms: &[f32],
        frame: i64,
    ) -> StrataResult<()> {
        let Kernel::Map(kernel) = program.desc.kernel else {
            return Err(StrataError::render(format!(
                "'{}' is not a map program",
                program.label()
            )));
        };
        self.check_uniforms(program, uniforms)?;

        let (width, height) = (target.width, target.height);
        let (source_width, source_height) = (source.width, source.height);
        match (&source.texels, &mut target.texels) {
            (Texels::Host(src), Texels::Host(dst)) => {
                dst.par_chunks_mut(width as usize)
                    .enumerate()
                    .for_each(|(y, row)| {
                        for (x, out) in row.iter_mut().enumerate() {
                            let inv = Invocation {
                                x: x as u32,
                                y: y as u32,
                                width,
                                height,
                                frame,
                                source: src,
                                source_width,
                                source_height,
                                uniforms,
                            };
                            *out = kernel(&inv);
                        }
                    });
                Ok(())
            }
            (Texels::Device { buffer: src, backend }, Texels::Device { buffer: dst, .. }) => {
                let pipeline = Self::pipeline(program)?;
                let dims = DispatchDims::new((width, height), (source_width, source_height), frame);
                backend.dispatch(program.label(), pipeline, dims, src, dst, uniforms)
            }
            _ => Err(Self::mixed_backends(program)),
        }
    }

    /// Blend `source` into `target` in place. Both buffers must match in size.
    pub fn blend(&self, program: &Program, target: &mut GpuBuffer, source: &GpuBuffer) -> StrataResult<()> {
        let Kernel::Blend(kernel) = program.desc.kernel else {
            return Err(StrataError::render(format!(
                "'{}' is not a blend program",
                program.label()
            )));
        };
        if (target.width, target.height) != (source.width, source.height) {
            return Err(StrataError::render(format!(
                "cannot blend a {}x{} buffer into a {}x{} buffer",
                source.width, source.height, target.width, target.height
            )));
        }

        let size = (target.width, target.height);
        match (&mut target.texels, &source.texels) {
            (Texels::Host(dst), Texels::Host(src)) => {
                dst.par_iter_mut()
                    .zip(src.par_iter())
                    .for_each(|(d, s)| *d = kernel(*d, *s));
                Ok(())
            }
            (Texels::Device { buffer: dst, backend }, Texels::Device { buffer: src, .. }) => {
                let pipeline = Self::pipeline(program)?;
                let dims = DispatchDims::new(size, size, 0);
                backend.dispatch(program.label(), pipeline, dims, src, dst, &[])
            }
            _ => Err(Self::mixed_backends(program)),
        }
    }

    fn pipeline(program: &Program) -> StrataResult<&wgpu::ComputePipeline> {
        program.pipeline.as_ref().ok_or_else(|| {
            StrataError::render(format!(
                "'{}' was compiled without a GPU pipeline",
                program.label()
            ))
        })
    }

    fn mixed_backends(program: &Program) -> StrataError {
        StrataError::render(format!(
            "'{}' was given buffers from different backends",
            program.label()
        ))
    }

    fn check_uniforms(&self, program: &Program, uniforms: &[f32]) -> StrataResult<()> {
        if uniforms.len() != program.desc.uniform_len {
            return Err(StrataError::render(format!(
                "'{}' expects {} uniforms, got {}",
                program.label(),
                program.desc.uniform_len,
                uniforms.len()
            )));
        }
        Ok(())
    }

    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            live_buffers: self.counters.live_buffers.load(Ordering::Relaxed),
            live_bytes: self.counters.live_bytes.load(Ordering::Relaxed),
            peak_buffers: self.counters.peak_buffers.load(Ordering::Relaxed),
            peak_bytes: self.counters.peak_bytes.load(Ordering::Relaxed),
            allocations: self.counters.allocations.load(Ordering::Relaxed),
            programs: self.programs.len(),
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("adapter", &self.adapter_name())
            .field("limits", &self.limits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
    struct GainParams {
        gain: f32,
        bias: f32,
    }

    fn gain(inv: &Invocation<'_>) -> [f32; 4] {
        let p: GainParams = inv.params();
        let t = inv.texel();
        [t[0] * p.gain + p.bias, t[1], t[2], t[3]]
    }

    fn add(dst: [f32; 4], src: [f32; 4]) -> [f32; 4] {
        [dst[0] + src[0], dst[1] + src[1], dst[2] + src[2], dst[3] + src[3]]
    }

    const GAIN: ProgramDesc = ProgramDesc::map(
        "test.gain",
        gain,
        "fn kernel(x: u32, y: u32) -> vec4<f32> {
            let t = texel_at(x, y);
            return vec4<f32>(t.r * param_f32(0u) + param_f32(1u), t.g, t.b, t.a);
        }",
        uniform_len::<GainParams>(),
    );
    const ADD: ProgramDesc = ProgramDesc::blend(
        "test.add",
        add,
        "fn blend(dst: vec4<f32>, src: vec4<f32>) -> vec4<f32> { return dst + src; }",
    );
    const BROKEN: ProgramDesc = ProgramDesc::map(
        "test.broken",
        gain,
        "fn kernel(x: u32, y: u32) -> vec4<f32> { return undefined_helper(x); }",
        0,
    );

    fn cpu() -> Device {
        Device::cpu(DeviceConfig::default())
    }

    /// A wgpu device, or None on machines without an adapter.
    fn gpu() -> Option<Device> {
        Device::new(DeviceConfig {
            backend: DeviceBackend::Gpu,
            ..DeviceConfig::default()
        })
        .ok()
    }

    fn pixels(buffer: &GpuBuffer) -> Vec<[f32; 4]> {
        buffer.read_back().unwrap().pixels().collect()
    }

    #[test]
    fn test_buffers_release_on_drop() {
        let device = cpu();
        {
            let _a = device.allocate(4, 4).unwrap();
            let _b = device.allocate(2, 8).unwrap();
            let stats = device.stats();
            assert_eq!(stats.live_buffers, 2);
            assert_eq!(stats.live_bytes, 2 * 16 * TEXEL_BYTES);
        }
        let stats = device.stats();
        assert_eq!(stats.live_buffers, 0);
        assert_eq!(stats.live_bytes, 0);
        assert_eq!(stats.peak_buffers, 2);
        assert_eq!(stats.allocations, 2);
    }

    #[test]
    fn test_allocation_limits() {
        let device = Device::cpu(DeviceConfig {
            max_live_bytes: Some(4 * 4 * TEXEL_BYTES),
            max_texture_dimension: 8,
            max_programs: 1,
            ..DeviceConfig::default()
        });
        assert!(device.allocate(0, 4).is_err());
        assert!(device.allocate(9, 1).is_err());
        let held = device.allocate(4, 4).unwrap();
        let err = device.allocate(1, 1).unwrap_err();
        assert!(err.is_render_failure());
        drop(held);
        assert!(device.allocate(1, 1).is_ok());
    }

    #[test]
    fn test_programs_are_memoized() {
        let device = Device::cpu(DeviceConfig {
            max_programs: 1,
            ..DeviceConfig::default()
        });
        let a = device.program(&GAIN).unwrap();
        let b = device.program(&GAIN).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(device.stats().programs, 1);
        assert!(device.program(&ADD).is_err());
    }

    #[test]
    fn test_cpu_backend_is_explicit() {
        let device = Device::new(DeviceConfig {
            backend: DeviceBackend::Cpu,
            ..DeviceConfig::default()
        })
        .unwrap();
        assert!(!device.is_gpu());
        assert_eq!(device.adapter_name(), "cpu");
        assert!(!device.allocate(1, 1).unwrap().is_device_resident());
    }

    #[test]
    fn test_dispatch_map_kernel() {
        let device = cpu();
        let mut src = device.allocate(3, 2).unwrap();
        src.fill(&Color::rgba(0.25, 0.5, 0.5, 1.0));
        let mut dst = device.allocate(3, 2).unwrap();
        let program = device.program(&GAIN).unwrap();
        let params = GainParams { gain: 2.0, bias: 0.25 };
        device
            .dispatch(&program, &src, &mut dst, uniforms(&params), 0)
            .unwrap();
        assert!(pixels(&dst).iter().all(|t| *t == [0.75, 0.5, 0.5, 1.0]));
    }

    #[test]
    fn test_dispatch_checks_uniforms_and_kind() {
        let device = cpu();
        let src = device.allocate(1, 1).unwrap();
        let mut dst = device.allocate(1, 1).unwrap();
        let gain = device.program(&GAIN).unwrap();
        assert!(device.dispatch(&gain, &src, &mut dst, &[1.0], 0).is_err());
        let add = device.program(&ADD).unwrap();
        assert!(device.dispatch(&add, &src, &mut dst, &[], 0).is_err());
        assert!(device.blend(&gain, &mut dst, &src).is_err());
    }

    #[test]
    fn test_blend_in_place() {
        let device = cpu();
        let mut target = device.allocate(2, 2).unwrap();
        target.fill(&Color::rgba(0.5, 0.0, 0.0, 0.5));
        let mut src = device.allocate(2, 2).unwrap();
        src.fill(&Color::rgba(0.25, 0.0, 1.0, 0.25));
        let add = device.program(&ADD).unwrap();
        device.blend(&add, &mut target, &src).unwrap();
        assert_eq!(
            target.read_back().unwrap().pixel(1, 1),
            Some([0.75, 0.0, 1.0, 0.75])
        );

        let other = device.allocate(3, 2).unwrap();
        assert!(device.blend(&add, &mut target, &other).is_err());
    }

    #[test]
    fn test_read_back() {
        let device = cpu();
        let mut buffer = device.allocate(2, 1).unwrap();
        buffer.fill(&Color::GREEN);
        let image = buffer.read_back().unwrap();
        assert_eq!(image.width, 2);
        assert_eq!(image.pixel(1, 0), Some([0.0, 1.0, 0.0, 1.0]));
    }

    #[test]
    fn test_gpu_matches_cpu_backend() {
        let Some(gpu) = gpu() else {
            eprintln!("no wgpu adapter, skipping");
            return;
        };
        assert!(gpu.is_gpu());
        let params = GainParams { gain: 2.0, bias: 0.25 };
        let run = |device: &Device| {
            let mut src = device.allocate(9, 5).unwrap();
            src.fill(&Color::rgba(0.25, 0.5, 0.125, 0.5));
            let mut dst = device.allocate(9, 5).unwrap();
            let gain = device.program(&GAIN).unwrap();
            device.dispatch(&gain, &src, &mut dst, uniforms(&params), 0).unwrap();
            let add = device.program(&ADD).unwrap();
            device.blend(&add, &mut dst, &src).unwrap();
            pixels(&dst)
        };
        let expected = run(&cpu());
        let actual = run(&gpu);
        assert_eq!(actual.len(), 45);
        for (a, e) in actual.iter().zip(&expected) {
            for c in 0..4 {
                assert!((a[c] - e[c]).abs() < 1e-6, "{:?} != {:?}", a, e);
            }
        }
    }

    #[test]
    fn test_gpu_buffers_are_device_resident_and_released() {
        let Some(gpu) = gpu() else {
            eprintln!("no wgpu adapter, skipping");
            return;
        };
        {
            let mut buffer = gpu.allocate(4, 4).unwrap();
            assert!(buffer.is_device_resident());
            assert_eq!(pixels(&buffer), vec![[0.0; 4]; 16]);
            buffer.fill(&Color::BLUE);
            buffer.clear();
            assert_eq!(pixels(&buffer), vec![[0.0; 4]; 16]);
        }
        assert_eq!(gpu.stats().live_buffers, 0);
    }

    #[test]
    fn test_invalid_wgsl_is_a_render_error() {
        let Some(gpu) = gpu() else {
            eprintln!("no wgpu adapter, skipping");
            return;
        };
        let err = gpu.program(&BROKEN).unwrap_err();
        assert!(err.is_render_failure());
        assert!(err.to_string().contains("test.broken"));
        assert_eq!(gpu.stats().programs, 0);
    }
}
