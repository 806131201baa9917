//! # strata-render
//!
//! The Strata rendering core. Given a [`Sequence`](strata_ir::Sequence) and a
//! frame number it evaluates every animated parameter, runs each visible
//! layer's effect chain, maps the layer into sequence space and composites
//! the stack bottom to top into one RGBA32F image.
//!
//! All work runs against a single [`Device`], one frame at a time. The device
//! is a wgpu compute device when an adapter is available and a rayon-backed
//! CPU device otherwise. Buffers are scoped handles, so nothing allocated for
//! a frame outlives it, whether the frame succeeds or fails.

pub mod compositor;
pub mod context;
pub mod effects;
pub mod gpu;
pub mod pipeline;
pub mod registry;
pub mod renderer;
pub mod transform;
mod wgpu_device;

pub use compositor::FrameCompositor;
pub use context::RenderContext;
pub use gpu::{Device, DeviceStats, GpuBuffer, Program, ProgramDesc};
pub use pipeline::{first_live_stage, EffectPipeline};
pub use registry::{Effect, EffectArgs, EffectRegistry};
pub use renderer::Renderer;
pub use transform::{LayerTransformer, Placement};
