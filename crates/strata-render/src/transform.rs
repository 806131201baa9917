use bytemuck::{Pod, Zeroable};
use strata_core::{Affine2, StrataError, StrataResult, Value};
use strata_ir::layer::param;
use strata_ir::{AnimationEvaluator, Layer, LayerContent, Sequence};

use crate::context::RenderContext;
use crate::gpu::{uniform_len, uniforms, Device, GpuBuffer, Invocation, ProgramDesc};
use crate::pipeline::EffectPipeline;
use crate::registry::EffectRegistry;

/// Sample offsets closer than this to a texel center snap onto it.
const SNAP: f32 = 1e-4;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct TransformParams {
    /// Sequence pixel → content pixel, as `[a, b, c, d, e, f]`.
    inverse: [f32; 6],
    opacity: f32,
    _pad: f32,
}

fn snap(v: f32) -> (i64, f32) {
    let base = v.floor();
    let frac = v - base;
    if frac < SNAP {
        (base as i64, 0.0)
    } else if frac > 1.0 - SNAP {
        (base as i64 + 1, 0.0)
    } else {
        (base as i64, frac)
    }
}

/// Bilinear sample at continuous texel coordinates, transparent outside.
/// Interpolates in premultiplied space and returns straight alpha.
fn sample_bilinear(inv: &Invocation<'_>, sx: f32, sy: f32) -> [f32; 4] {
    let (x0, fx) = snap(sx);
    let (y0, fy) = snap(sy);
    if fx == 0.0 && fy == 0.0 {
        return inv.fetch_border(x0, y0);
    }

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];
    let mut acc = [0.0f32; 4];
    for (x, y, w) in taps {
        if w == 0.0 {
            continue;
        }
        let t = inv.fetch_border(x, y);
        let wa = w * t[3];
        acc[0] += t[0] * wa;
        acc[1] += t[1] * wa;
        acc[2] += t[2] * wa;
        acc[3] += wa;
    }
    if acc[3] <= 0.0 {
        return [0.0; 4];
    }
    [acc[0] / acc[3], acc[1] / acc[3], acc[2] / acc[3], acc[3]]
}

fn transform_kernel(inv: &Invocation<'_>) -> [f32; 4] {
    let p = inv.params::<TransformParams>();
    let [a, b, c, d, e, f] = p.inverse;
    let px = inv.x as f32 + 0.5;
    let py = inv.y as f32 + 0.5;
    let qx = a * px + c * py + e;
    let qy = b * px + d * py + f;
    let mut out = sample_bilinear(inv, qx - 0.5, qy - 0.5);
    out[3] *= p.opacity;
    out
}

const TRANSFORM: ProgramDesc = ProgramDesc::map(
    "layer.transform",
    transform_kernel,
    include_str!("shaders/transform.wgsl"),
    uniform_len::<TransformParams>(),
);

/// A layer's geometric parameters evaluated at one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Fraction of the sequence size.
    pub position: [f64; 2],
    /// Fraction of the content size.
    pub anchor: [f64; 2],
    pub scale: [f64; 2],
    /// Radians.
    pub rotation: f64,
    pub opacity: f64,
}

impl Placement {
    pub fn evaluate(layer: &Layer, frame: i64, evaluator: &AnimationEvaluator) -> StrataResult<Self> {
        let value = |name: &str| -> StrataResult<Value> {
            Ok(evaluator.value_at(layer.require(name)?, frame))
        };
        let vector = |name: &str| -> StrataResult<[f64; 2]> {
            value(name)?
                .as_vector2()
                .ok_or_else(|| wrong_type(layer, name, "vector2"))
        };
        let number = |name: &str| -> StrataResult<f64> {
            value(name)?
                .as_number()
                .ok_or_else(|| wrong_type(layer, name, "number"))
        };
        Ok(Self {
            position: vector(param::POSITION)?,
            anchor: vector(param::ANCHOR)?,
            scale: vector(param::SCALE)?,
            rotation: number(param::ROTATION)?,
            opacity: number(param::OPACITY)?.clamp(0.0, 1.0),
        })
    }

    /// Content pixel → sequence pixel: move the anchor to the origin, scale,
    /// rotate, then move the origin to `position`.
    pub fn content_to_sequence(&self, content: (u32, u32), sequence: (u32, u32)) -> Affine2 {
        let (cw, ch) = (f64::from(content.0), f64::from(content.1));
        let (sw, sh) = (f64::from(sequence.0), f64::from(sequence.1));
        Affine2::translate(-self.anchor[0] * cw, -self.anchor[1] * ch)
            .then(&Affine2::scale(self.scale[0], self.scale[1]))
            .then(&Affine2::rotate(self.rotation))
            .then(&Affine2::translate(self.position[0] * sw, self.position[1] * sh))
    }
}

fn wrong_type(layer: &Layer, name: &str, expected: &str) -> StrataError {
    StrataError::configuration(format!(
        "layer '{}': parameter '{}' must be a {}",
        layer.title, name, expected
    ))
}

/// Renders a layer's content, runs its effect chain and maps the result into
/// sequence space.
pub struct LayerTransformer<'r> {
    pipeline: EffectPipeline<'r>,
    evaluator: AnimationEvaluator,
}

impl<'r> LayerTransformer<'r> {
    pub fn new(registry: &'r EffectRegistry, elide_dead_stages: bool) -> Self {
        Self {
            pipeline: EffectPipeline::new(registry, elide_dead_stages),
            evaluator: AnimationEvaluator::new(),
        }
    }

    /// Native resolution of the layer's content at `frame`.
    pub fn content_size(&self, layer: &Layer, sequence: &Sequence, frame: i64) -> StrataResult<(u32, u32)> {
        match layer.content {
            LayerContent::Empty => Ok((sequence.width, sequence.height)),
            LayerContent::Solid => {
                let dim = |name: &str| -> StrataResult<u32> {
                    let v = self
                        .evaluator
                        .value_at(layer.require(name)?, frame)
                        .as_integer()
                        .ok_or_else(|| wrong_type(layer, name, "integer"))?;
                    Ok(v.clamp(1, i64::from(u32::MAX)) as u32)
                };
                Ok((dim(param::WIDTH)?, dim(param::HEIGHT)?))
            }
        }
    }

    fn draw_content(&self, layer: &Layer, frame: i64, ctx: &mut RenderContext<'_>) -> StrataResult<()> {
        if layer.content == LayerContent::Solid {
            let color = self
                .evaluator
                .value_at(layer.require(param::COLOR)?, frame)
                .as_color()
                .ok_or_else(|| wrong_type(layer, param::COLOR, "color"))?;
            ctx.source_buffer_mut().fill(&color);
        }
        Ok(())
    }

    /// Render `layer` at `frame` into `target`, a sequence-sized buffer.
    /// Texels the layer does not cover are left transparent.
    pub fn render(
        &self,
        device: &Device,
        layer: &Layer,
        sequence: &Sequence,
        frame: i64,
        target: &mut GpuBuffer,
    ) -> StrataResult<()> {
        let size = self.content_size(layer, sequence, frame)?;
        let mut content = RenderContext::new(device, size.0, size.1, frame)?;
        self.draw_content(layer, frame, &mut content)?;
        self.pipeline.execute(&mut content, &layer.effects, frame)?;

        let placement = Placement::evaluate(layer, frame, &self.evaluator)?;
        let matrix = placement.content_to_sequence(size, (sequence.width, sequence.height));
        let Some(inverse) = matrix.invert() else {
            tracing::debug!(layer = %layer.title, "degenerate transform, layer covers nothing");
            target.clear();
            return Ok(());
        };

        let params = TransformParams {
            inverse: [
                inverse.a as f32,
                inverse.b as f32,
                inverse.c as f32,
                inverse.d as f32,
                inverse.e as f32,
                inverse.f as f32,
            ],
            opacity: placement.opacity as f32,
            _pad: 0.0,
        };
        let program = device.program(&TRANSFORM)?;
        device.dispatch(&program, content.source_buffer(), target, uniforms(&params), frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{Color, DeviceConfig, Point2D};
    use strata_ir::KeyframeKind;

    fn render(layer: &Layer, sequence: &Sequence, frame: i64) -> Vec<[f32; 4]> {
        let registry = EffectRegistry::with_builtin().unwrap();
        let device = Device::cpu(DeviceConfig::default());
        let mut target = device.allocate(sequence.width, sequence.height).unwrap();
        LayerTransformer::new(&registry, true)
            .render(&device, layer, sequence, frame, &mut target)
            .unwrap();
        target.read_back().unwrap().pixels().collect()
    }

    fn at(texels: &[[f32; 4]], width: u32, x: u32, y: u32) -> [f32; 4] {
        texels[(y * width + x) as usize]
    }

    #[test]
    fn test_identity_placement_is_exact() {
        let seq = Sequence::new(16, 8, 30.0, 10);
        let layer = Layer::solid("s", 0, 10, 16, 8, Color::rgba(0.3, 0.6, 0.9, 0.7));
        let out = render(&layer, &seq, 0);
        assert!(out.iter().all(|t| *t == [0.3, 0.6, 0.9, 0.7]));
    }

    #[test]
    fn test_small_solid_is_centered() {
        let seq = Sequence::new(10, 10, 30.0, 10);
        let layer = Layer::solid("s", 0, 10, 4, 4, Color::RED);
        let out = render(&layer, &seq, 0);
        // Covers [3, 7) on both axes.
        assert_eq!(at(&out, 10, 2, 2), [0.0; 4]);
        assert_eq!(at(&out, 10, 3, 3), Color::RED.to_array());
        assert_eq!(at(&out, 10, 6, 6), Color::RED.to_array());
        assert_eq!(at(&out, 10, 7, 7), [0.0; 4]);
        assert_eq!(out.iter().filter(|t| t[3] > 0.0).count(), 16);
    }

    #[test]
    fn test_position_and_anchor() {
        let seq = Sequence::new(10, 10, 30.0, 10);
        let layer = Layer::solid("s", 0, 10, 2, 2, Color::BLUE)
            .with_value(param::ANCHOR, Value::Vector2([0.0, 0.0]))
            .unwrap()
            .with_value(param::POSITION, Value::Vector2([0.0, 0.0]))
            .unwrap();
        let out = render(&layer, &seq, 0);
        assert_eq!(at(&out, 10, 0, 0), Color::BLUE.to_array());
        assert_eq!(at(&out, 10, 1, 1), Color::BLUE.to_array());
        assert_eq!(at(&out, 10, 2, 2), [0.0; 4]);
    }

    #[test]
    fn test_opacity_scales_alpha_only() {
        let seq = Sequence::new(4, 4, 30.0, 10);
        let layer = Layer::solid("s", 0, 10, 4, 4, Color::rgb(0.2, 0.4, 0.8))
            .with_value(param::OPACITY, 0.5)
            .unwrap();
        let out = render(&layer, &seq, 0);
        assert!(out.iter().all(|t| *t == [0.2, 0.4, 0.8, 0.5]));
    }

    #[test]
    fn test_zero_scale_covers_nothing() {
        let seq = Sequence::new(4, 4, 30.0, 10);
        let layer = Layer::solid("s", 0, 10, 4, 4, Color::RED)
            .with_value(param::SCALE, Value::Vector2([0.0, 1.0]))
            .unwrap();
        let out = render(&layer, &seq, 0);
        assert!(out.iter().all(|t| *t == [0.0; 4]));
    }

    #[test]
    fn test_animated_position() {
        let seq = Sequence::new(10, 2, 30.0, 10);
        let mut layer = Layer::solid("s", 0, 10, 2, 2, Color::GREEN)
            .with_value(param::ANCHOR, Value::Vector2([0.0, 0.0]))
            .unwrap();
        let position = layer.parameter_mut(param::POSITION).unwrap();
        position
            .set_keyframe(0, Value::Vector2([0.0, 0.0]), KeyframeKind::Linear)
            .unwrap();
        position
            .set_keyframe(8, Value::Vector2([0.8, 0.0]), KeyframeKind::Linear)
            .unwrap();
        let end = render(&layer, &seq, 8);
        assert_eq!(at(&end, 10, 8, 0), Color::GREEN.to_array());
        assert_eq!(at(&end, 10, 0, 0), [0.0; 4]);
    }

    #[test]
    fn test_placement_matrix() {
        let placement = Placement {
            position: [0.5, 0.5],
            anchor: [0.5, 0.5],
            scale: [2.0, 2.0],
            rotation: std::f64::consts::FRAC_PI_2,
            opacity: 1.0,
        };
        let m = placement.content_to_sequence((10, 10), (100, 100));
        // The content's anchor lands on the sequence position.
        let center = m.apply(Point2D::new(5.0, 5.0));
        assert!((center.x - 50.0).abs() < 1e-9 && (center.y - 50.0).abs() < 1e-9);
        // +x in content becomes +y on screen after a quarter turn.
        let right = m.apply(Point2D::new(6.0, 5.0));
        assert!((right.x - 50.0).abs() < 1e-9 && (right.y - 52.0).abs() < 1e-9);
    }

    #[test]
    fn test_half_pixel_offset_blends_with_border() {
        let seq = Sequence::new(4, 1, 30.0, 10);
        let layer = Layer::solid("s", 0, 10, 1, 1, Color::WHITE)
            .with_value(param::ANCHOR, Value::Vector2([0.0, 0.0]))
            .unwrap()
            .with_value(param::POSITION, Value::Vector2([0.125, 0.0]))
            .unwrap();
        // Content occupies x in [0.5, 1.5): half covers texel 0, half texel 1.
        let out = render(&layer, &seq, 0);
        assert_eq!(out[0], [1.0, 1.0, 1.0, 0.5]);
        assert_eq!(out[1], [1.0, 1.0, 1.0, 0.5]);
        assert_eq!(out[2], [0.0; 4]);
    }
}
