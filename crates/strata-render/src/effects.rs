//! Built-in effects.
//!
//! Each effect owns one map program. Parameter values are packed into a
//! `#[repr(C)]` uniform block and the program runs once per destination
//! texel. Colors stay straight-alpha throughout.

use bytemuck::{Pod, Zeroable};
use strata_core::{Color, StrataResult, Value};
use strata_ir::{EffectFlags, ParameterSpec};

use crate::context::RenderContext;
use crate::gpu::{uniform_len, uniforms, Invocation, ProgramDesc};
use crate::registry::{Effect, EffectArgs, EffectRegistry};

/// Largest blur radius, in pixels.
pub const MAX_BLUR_RADIUS: i64 = 64;

/// Largest noise seed. Seeds are 32-bit on the device.
pub const MAX_NOISE_SEED: i64 = u32::MAX as i64;

/// Register every built-in effect.
pub fn register_builtin(registry: &mut EffectRegistry) -> StrataResult<()> {
    registry.register(Fill)?;
    registry.register(Noise)?;
    registry.register(Invert)?;
    registry.register(BrightnessContrast)?;
    registry.register(Tint)?;
    registry.register(BoxBlur)?;
    Ok(())
}

fn run<T: Pod>(ctx: &mut RenderContext<'_>, desc: &ProgramDesc, params: &T) -> StrataResult<()> {
    let program = ctx.device_handle().program(desc)?;
    ctx.run(&program, uniforms(params))
}

fn color_uniform(color: Color) -> [f32; 4] {
    color.to_array()
}

fn luminance(px: [f32; 4]) -> f32 {
    0.2126 * px[0] + 0.7152 * px[1] + 0.0722 * px[2]
}

// --- fill -----------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct FillParams {
    color: [f32; 4],
}

fn fill_kernel(inv: &Invocation<'_>) -> [f32; 4] {
    inv.params::<FillParams>().color
}

const FILL: ProgramDesc = ProgramDesc::map(
    "effect.fill",
    fill_kernel,
    include_str!("shaders/fill.wgsl"),
    uniform_len::<FillParams>(),
);

/// Replaces the layer with a flat color.
pub struct Fill;

impl Effect for Fill {
    fn id(&self) -> &str {
        "fill"
    }

    fn declare_parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::new("color", Color::WHITE)]
    }

    fn flags(&self) -> EffectFlags {
        EffectFlags::WRITEONLY
    }

    fn apply(&self, ctx: &mut RenderContext<'_>, args: &EffectArgs<'_>) -> StrataResult<()> {
        let params = FillParams {
            color: color_uniform(args.color("color")?),
        };
        run(ctx, &FILL, &params)
    }
}

// --- noise ----------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct NoiseParams {
    color: [f32; 4],
    seed: u32,
    frame: u32,
    _pad: [u32; 2],
}

fn mix(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^= h >> 16;
    h
}

fn noise_kernel(inv: &Invocation<'_>) -> [f32; 4] {
    let p = inv.params::<NoiseParams>();
    let h = mix(inv.x ^ mix(inv.y ^ mix(p.frame ^ mix(p.seed))));
    let n = (h >> 8) as f32 / (1u32 << 24) as f32;
    [n * p.color[0], n * p.color[1], n * p.color[2], p.color[3]]
}

const NOISE: ProgramDesc = ProgramDesc::map(
    "effect.noise",
    noise_kernel,
    include_str!("shaders/noise.wgsl"),
    uniform_len::<NoiseParams>(),
);

/// Per-pixel white noise that changes every frame.
pub struct Noise;

impl Effect for Noise {
    fn id(&self) -> &str {
        "noise"
    }

    fn declare_parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("seed", Value::Integer(0))
                .range(Value::Integer(0), Value::Integer(MAX_NOISE_SEED))
                .static_only(),
            ParameterSpec::new("color", Color::WHITE),
        ]
    }

    fn flags(&self) -> EffectFlags {
        EffectFlags::WRITEONLY
    }

    fn apply(&self, ctx: &mut RenderContext<'_>, args: &EffectArgs<'_>) -> StrataResult<()> {
        let params = NoiseParams {
            color: color_uniform(args.color("color")?),
            seed: args.integer("seed")?.clamp(0, MAX_NOISE_SEED) as u32,
            frame: ctx.current_frame() as u32,
            _pad: [0; 2],
        };
        run(ctx, &NOISE, &params)
    }
}

// --- invert ---------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct InvertParams {
    amount: f32,
}

fn invert_kernel(inv: &Invocation<'_>) -> [f32; 4] {
    let amount = inv.params::<InvertParams>().amount;
    let t = inv.texel();
    let mut out = t;
    for c in out.iter_mut().take(3) {
        *c += (1.0 - 2.0 * *c) * amount;
    }
    out
}

const INVERT: ProgramDesc = ProgramDesc::map(
    "effect.invert",
    invert_kernel,
    include_str!("shaders/invert.wgsl"),
    uniform_len::<InvertParams>(),
);

/// Inverts color channels, leaving alpha alone.
pub struct Invert;

impl Effect for Invert {
    fn id(&self) -> &str {
        "invert"
    }

    fn declare_parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::new("amount", 1.0).range(0.0, 1.0)]
    }

    fn apply(&self, ctx: &mut RenderContext<'_>, args: &EffectArgs<'_>) -> StrataResult<()> {
        let params = InvertParams {
            amount: args.number("amount")? as f32,
        };
        run(ctx, &INVERT, &params)
    }
}

// --- brightness / contrast ------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct BrightnessContrastParams {
    brightness: f32,
    contrast: f32,
}

fn brightness_contrast_kernel(inv: &Invocation<'_>) -> [f32; 4] {
    let p = inv.params::<BrightnessContrastParams>();
    let t = inv.texel();
    let mut out = t;
    for c in out.iter_mut().take(3) {
        *c = ((*c - 0.5) * (1.0 + p.contrast) + 0.5 + p.brightness).max(0.0);
    }
    out
}

const BRIGHTNESS_CONTRAST: ProgramDesc = ProgramDesc::map(
    "effect.brightness_contrast",
    brightness_contrast_kernel,
    include_str!("shaders/brightness_contrast.wgsl"),
    uniform_len::<BrightnessContrastParams>(),
);

/// Shifts brightness and scales contrast around mid-grey.
pub struct BrightnessContrast;

impl Effect for BrightnessContrast {
    fn id(&self) -> &str {
        "brightness_contrast"
    }

    fn declare_parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("brightness", 0.0).range(-1.0, 1.0),
            ParameterSpec::new("contrast", 0.0).range(-1.0, 1.0),
        ]
    }

    fn apply(&self, ctx: &mut RenderContext<'_>, args: &EffectArgs<'_>) -> StrataResult<()> {
        let params = BrightnessContrastParams {
            brightness: args.number("brightness")? as f32,
            contrast: args.number("contrast")? as f32,
        };
        run(ctx, &BRIGHTNESS_CONTRAST, &params)
    }
}

// --- tint -----------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct TintParams {
    color: [f32; 4],
    amount: f32,
    _pad: [f32; 3],
}

fn tint_kernel(inv: &Invocation<'_>) -> [f32; 4] {
    let p = inv.params::<TintParams>();
    let t = inv.texel();
    let l = luminance(t);
    let mut out = t;
    for (o, c) in out.iter_mut().zip(p.color).take(3) {
        *o += (l * c - *o) * p.amount;
    }
    out
}

const TINT: ProgramDesc = ProgramDesc::map(
    "effect.tint",
    tint_kernel,
    include_str!("shaders/tint.wgsl"),
    uniform_len::<TintParams>(),
);

/// Maps luminance onto a color.
pub struct Tint;

impl Effect for Tint {
    fn id(&self) -> &str {
        "tint"
    }

    fn declare_parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("color", Color::WHITE),
            ParameterSpec::new("amount", 1.0).range(0.0, 1.0),
        ]
    }

    fn apply(&self, ctx: &mut RenderContext<'_>, args: &EffectArgs<'_>) -> StrataResult<()> {
        let params = TintParams {
            color: color_uniform(args.color("color")?),
            amount: args.number("amount")? as f32,
            _pad: [0.0; 3],
        };
        run(ctx, &TINT, &params)
    }
}

// --- box blur -------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct BoxBlurParams {
    radius: u32,
}

fn box_blur_kernel(inv: &Invocation<'_>) -> [f32; 4] {
    let r = i64::from(inv.params::<BoxBlurParams>().radius);
    if r == 0 {
        return inv.texel();
    }
    let (cx, cy) = (i64::from(inv.x), i64::from(inv.y));
    // Average in premultiplied space so transparent texels carry no color.
    let mut sum = [0.0f32; 4];
    for y in cy - r..=cy + r {
        for x in cx - r..=cx + r {
            let t = inv.fetch_clamped(x, y);
            sum[0] += t[0] * t[3];
            sum[1] += t[1] * t[3];
            sum[2] += t[2] * t[3];
            sum[3] += t[3];
        }
    }
    if sum[3] <= 0.0 {
        return [0.0; 4];
    }
    let n = ((2 * r + 1) * (2 * r + 1)) as f32;
    [sum[0] / sum[3], sum[1] / sum[3], sum[2] / sum[3], sum[3] / n]
}

const BOX_BLUR: ProgramDesc = ProgramDesc::map(
    "effect.box_blur",
    box_blur_kernel,
    include_str!("shaders/box_blur.wgsl"),
    uniform_len::<BoxBlurParams>(),
);

/// Square box blur with edge clamping.
pub struct BoxBlur;

impl Effect for BoxBlur {
    fn id(&self) -> &str {
        "box_blur"
    }

    fn declare_parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::new("radius", Value::Integer(2))
            .range(Value::Integer(0), Value::Integer(MAX_BLUR_RADIUS))]
    }

    fn apply(&self, ctx: &mut RenderContext<'_>, args: &EffectArgs<'_>) -> StrataResult<()> {
        let params = BoxBlurParams {
            radius: args.integer("radius")?.clamp(0, MAX_BLUR_RADIUS) as u32,
        };
        run(ctx, &BOX_BLUR, &params)
    }
}
