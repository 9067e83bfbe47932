use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec2;
use lottie_core::animatable::{solve_cubic_bezier, Track};
use lottie_core::{Document, EmbeddedOnly, SceneGraphBuilder};
use serde_json::json;

/// `rows * cols` animated stars inside nested groups.
fn grid_doc(rows: usize, cols: usize) -> Document {
    let mut layers = Vec::new();
    for r in 0..rows {
        let mut shapes = Vec::new();
        for c in 0..cols {
            shapes.push(json!({
                "ty": "gr", "nm": format!("cell {r}.{c}"),
                "it": [
                    { "ty": "sr", "sy": 1, "p": { "a": 0, "k": [c as f32 * 20.0, 0] },
                      "pt": { "a": 0, "k": 5 }, "r": { "a": 1, "k": [ { "t": 0, "s": [0] }, { "t": 59, "s": [360] } ] },
                      "or": { "a": 0, "k": 8 }, "os": { "a": 0, "k": 0 },
                      "ir": { "a": 0, "k": 4 }, "is": { "a": 0, "k": 0 } },
                    { "ty": "fl", "c": { "a": 0, "k": [1, 0.5, 0, 1] }, "o": { "a": 0, "k": 100 } },
                    { "ty": "tr", "o": { "a": 1, "k": [ { "t": 0, "s": [0] }, { "t": 30, "s": [100] } ] } }
                ]
            }));
        }
        layers.push(json!({
            "ty": 4, "nm": format!("row {r}"), "ip": 0, "op": 60,
            "ks": { "p": { "a": 0, "k": [0, r as f32 * 20.0] } },
            "shapes": shapes
        }));
    }
    let doc = json!({ "v": "5.7.0", "fr": 60, "ip": 0, "op": 60, "w": 512, "h": 512, "layers": layers });
    Document::from_bytes(&serde_json::to_vec(&doc).unwrap(), &EmbeddedOnly).unwrap()
}

fn bench_solver(c: &mut Criterion) {
    c.bench_function("solve_cubic_bezier", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for i in 0..100 {
                acc += solve_cubic_bezier(
                    Vec2::new(0.42, 0.0),
                    Vec2::new(0.58, 1.0),
                    black_box(i as f32 / 100.0),
                );
            }
            acc
        })
    });
}

fn bench_track(c: &mut Criterion) {
    let doc = grid_doc(1, 1);
    let track: &Track<f32> = &doc.layers[0].transform.opacity;
    c.bench_function("track_value_at", |b| {
        b.iter(|| track.value_at(black_box(17.5)))
    });
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene_build");
    for size in [4, 16] {
        let doc = grid_doc(size, size);
        let builder = SceneGraphBuilder::new(&doc);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{size}x{size}")),
            &size,
            |b, _| b.iter(|| builder.build(black_box(24.0))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_solver, bench_track, bench_build);
criterion_main!(benches);
