use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strata_core::{Color, StrataConfig, Value};
use strata_ir::layer::param;
use strata_ir::{get_value_at_frame, Keyframe, KeyframeKind, Layer, Parameter, Sequence};
use strata_render::Renderer;

fn create_sequence(renderer: &Renderer) -> Sequence {
    let registry = renderer.registry();
    let mut title = Layer::solid("title", 0, 120, 320, 90, Color::WHITE)
        .with_effect(
            registry
                .instantiate("tint")
                .unwrap()
                .with_value("color", Color::rgb(1.0, 0.6, 0.2))
                .unwrap(),
        );
    let rotation = title.parameter_mut(param::ROTATION).unwrap();
    rotation.set_keyframe(0, 0.0, KeyframeKind::Bezier).unwrap();
    rotation.set_keyframe(120, 0.5, KeyframeKind::Bezier).unwrap();

    let blur = registry.instantiate("box_blur").unwrap();
    let grain = registry.instantiate("noise").unwrap();

    Sequence::new(640, 360, 30.0, 120)
        .with_layer(Layer::solid("bg", 0, 120, 640, 360, Color::rgb(0.05, 0.05, 0.1)))
        .with_layer(Layer::solid("card", 0, 120, 400, 200, Color::rgb(0.2, 0.3, 0.8)).with_effect(blur))
        .with_layer(title)
        .with_layer(
            Layer::empty("grain", 0, 120)
                .with_effect(grain)
                .with_value(param::OPACITY, 0.1)
                .unwrap(),
        )
}

fn bench_render_frame(c: &mut Criterion) {
    let mut renderer = Renderer::new(StrataConfig::default()).unwrap();
    let sequence = create_sequence(&renderer);

    c.bench_function("render_frame_640x360_4_layers", |b| {
        let mut frame = 0;
        b.iter(|| {
            let image = renderer.render_frame(black_box(&sequence), frame).unwrap();
            frame = (frame + 1) % 120;
            image
        })
    });
}

fn bench_bezier_evaluation(c: &mut Criterion) {
    let mut p = Parameter::new("x", 0.0);
    for (i, v) in [0.0, 3.0, -2.0, 8.0, 1.0].into_iter().enumerate() {
        p.insert_keyframe(Keyframe::bezier(i as i64 * 25, v)).unwrap();
    }
    let mut vector = Parameter::new("position", Value::Vector2([0.0, 0.0]));
    vector
        .set_keyframe(0, Value::Vector2([0.0, 0.0]), KeyframeKind::Bezier)
        .unwrap();
    vector
        .set_keyframe(100, Value::Vector2([1.0, 0.5]), KeyframeKind::Bezier)
        .unwrap();

    c.bench_function("get_value_at_frame_bezier_scalar", |b| {
        b.iter(|| (0..100).map(|f| get_value_at_frame(black_box(&p), f)).count())
    });
    c.bench_function("get_value_at_frame_bezier_vector2", |b| {
        b.iter(|| (0..100).map(|f| get_value_at_frame(black_box(&vector), f)).count())
    });
}

criterion_group!(benches, bench_render_frame, bench_bezier_evaluation);
criterion_main!(benches);
