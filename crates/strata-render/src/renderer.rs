use strata_core::{Image, StrataConfig, StrataResult, Value};
use strata_ir::{AnimationEvaluator, Parameter, Sequence};

use crate::compositor::FrameCompositor;
use crate::gpu::{Device, DeviceStats};
use crate::registry::EffectRegistry;

/// Entry point of the rendering core.
///
/// Owns the device context and the effect registry. Rendering borrows the
/// renderer mutably, so only one frame is ever in flight on its device.
pub struct Renderer {
    config: StrataConfig,
    device: Device,
    registry: EffectRegistry,
    evaluator: AnimationEvaluator,
}

impl Renderer {
    /// A renderer with the built-in effects registered.
    pub fn new(config: StrataConfig) -> StrataResult<Self> {
        Self::with_registry(config, EffectRegistry::with_builtin()?)
    }

    /// A renderer over a caller-built registry. Fails when the configured
    /// device backend cannot be opened.
    pub fn with_registry(config: StrataConfig, registry: EffectRegistry) -> StrataResult<Self> {
        let device = Device::new(config.device.clone())?;
        tracing::info!(
            effects = registry.len(),
            adapter = device.adapter_name(),
            elide_dead_stages = config.render.elide_dead_stages,
            "renderer initialized"
        );
        Ok(Self {
            device,
            config,
            registry,
            evaluator: AnimationEvaluator::new(),
        })
    }

    /// Render `frame` of `sequence` into a new image. On error no image is
    /// produced and every buffer allocated for the frame has been released.
    pub fn render_frame(&mut self, sequence: &Sequence, frame: i64) -> StrataResult<Image> {
        let span = tracing::info_span!("render_frame", sequence = %sequence.id, frame);
        let _enter = span.enter();

        let compositor = FrameCompositor::new(&self.registry, self.config.render.elide_dead_stages);
        let result = compositor.composite(&self.device, sequence, frame);
        match &result {
            Ok(_) => tracing::debug!(
                peak_buffers = self.device.stats().peak_buffers,
                "frame rendered"
            ),
            Err(e) => tracing::warn!(error = %e, "frame aborted"),
        }
        result
    }

    /// The value of `parameter` at `frame`.
    pub fn get_value_at_frame(&self, parameter: &Parameter, frame: i64) -> Value {
        self.evaluator.value_at(parameter, frame)
    }

    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EffectRegistry {
        &mut self.registry
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_stats(&self) -> DeviceStats {
        self.device.stats()
    }
}
