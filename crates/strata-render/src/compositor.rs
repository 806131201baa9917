use strata_core::{Image, StrataResult};
use strata_ir::Sequence;

use crate::context::RenderContext;
use crate::gpu::{Device, ProgramDesc};
use crate::registry::EffectRegistry;
use crate::transform::LayerTransformer;

/// Straight-alpha "over": `top` composited onto `bottom`.
///
/// Fully transparent and fully opaque tops return an operand unchanged, as
/// does an empty bottom, so those cases are bit-exact.
pub fn over(bottom: [f32; 4], top: [f32; 4]) -> [f32; 4] {
    let a_top = top[3];
    let a_bottom = bottom[3];
    if a_top <= 0.0 {
        return bottom;
    }
    if a_top >= 1.0 || a_bottom <= 0.0 {
        return top;
    }

    let keep = a_bottom * (1.0 - a_top);
    let a_out = a_top + keep;
    if a_out <= 0.0 {
        return [0.0; 4];
    }
    let mut out = [0.0, 0.0, 0.0, a_out];
    for i in 0..3 {
        out[i] = (top[i] * a_top + bottom[i] * keep) / a_out;
    }
    out
}

const OVER: ProgramDesc = ProgramDesc::blend("composite.over", over, include_str!("shaders/over.wgsl"));

/// Accumulates a sequence's visible layers into one image.
pub struct FrameCompositor<'r> {
    transformer: LayerTransformer<'r>,
}

impl<'r> FrameCompositor<'r> {
    pub fn new(registry: &'r EffectRegistry, elide_dead_stages: bool) -> Self {
        Self {
            transformer: LayerTransformer::new(registry, elide_dead_stages),
        }
    }

    /// Composite every layer visible at `frame`, bottom to top, over a
    /// transparent background.
    pub fn composite(&self, device: &Device, sequence: &Sequence, frame: i64) -> StrataResult<Image> {
        // Source accumulates; each layer is transformed into the destination.
        let mut acc = RenderContext::new(device, sequence.width, sequence.height, frame)?;
        let over_program = device.program(&OVER)?;

        for (index, layer) in sequence.visible_layers(frame).enumerate() {
            tracing::debug!(
                index,
                layer = %layer.title,
                effects = layer.effects.len(),
                "compositing layer"
            );
            acc.destination_buffer_mut().clear();
            self.transformer
                .render(device, layer, sequence, frame, acc.destination_buffer_mut())?;
            acc.blend_into_source(&over_program)?;
        }

        acc.source_buffer().read_back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: [f32; 4] = [0.1, 0.2, 0.3, 0.6];

    #[test]
    fn test_transparent_top_keeps_bottom() {
        assert_eq!(over(BASE, [0.9, 0.9, 0.9, 0.0]), BASE);
    }

    #[test]
    fn test_opaque_top_replaces_bottom() {
        let top = [0.7, 0.1, 0.4, 1.0];
        assert_eq!(over(BASE, top), top);
    }

    #[test]
    fn test_empty_bottom_yields_top() {
        let top = [0.7, 0.1, 0.4, 0.25];
        assert_eq!(over([0.5, 0.5, 0.5, 0.0], top), top);
    }

    #[test]
    fn test_half_over_opaque() {
        let out = over([0.0, 0.0, 1.0, 1.0], [1.0, 0.0, 0.0, 0.5]);
        assert_eq!(out, [0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_alpha_accumulates() {
        let out = over([1.0, 1.0, 1.0, 0.5], [1.0, 1.0, 1.0, 0.5]);
        assert_eq!(out[3], 0.75);
        assert!((out[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_sequence_is_transparent() {
        let registry = EffectRegistry::new();
        let device = Device::cpu(strata_core::DeviceConfig::default());
        let seq = Sequence::new(3, 2, 30.0, 10);
        let image = FrameCompositor::new(&registry, true)
            .composite(&device, &seq, 0)
            .unwrap();
        assert_eq!((image.width, image.height), (3, 2));
        assert!(image.data.iter().all(|v| *v == 0.0));
        assert_eq!(device.stats().live_buffers, 0);
    }
}
