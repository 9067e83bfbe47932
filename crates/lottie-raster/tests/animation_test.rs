// Multi-frame rendering: frames must change over time and repeat exactly.

use lottie_core::{Document, EmbeddedOnly, SceneGraphBuilder};
use lottie_raster::{render, RenderTarget};
use serde_json::json;

fn fading_square() -> Document {
    let json = json!({
        "v": "5.7.0", "fr": 30, "ip": 0, "op": 20, "w": 32, "h": 32,
        "layers": [{
            "ty": 4, "nm": "square", "ip": 0, "op": 20,
            "ks": {
                "o": { "a": 1, "k": [ { "t": 0, "s": [0] }, { "t": 10, "s": [100] } ] },
                "p": { "a": 1, "k": [ { "t": 0, "s": [0, 0] }, { "t": 19, "s": [16, 0] } ] }
            },
            "shapes": [
                { "ty": "rc", "p": { "a": 0, "k": [8, 16] }, "s": { "a": 0, "k": [16, 32] } },
                { "ty": "fl", "c": { "a": 0, "k": [1, 0, 0, 1] }, "o": { "a": 0, "k": 100 } }
            ]
        }]
    });
    Document::from_bytes(&serde_json::to_vec(&json).unwrap(), &EmbeddedOnly).unwrap()
}

fn frame(doc: &Document, f: f32) -> Vec<u8> {
    let tree = SceneGraphBuilder::new(doc).build(f).unwrap();
    let mut buf = vec![0u8; 32 * 32 * 4];
    render(&tree, &mut buf, &RenderTarget::default()).unwrap();
    buf
}

/// Fraction of pixels differing by more than 2 in any channel.
fn difference(a: &[u8], b: &[u8]) -> f64 {
    let changed = a
        .chunks_exact(4)
        .zip(b.chunks_exact(4))
        .filter(|(p, q)| p.iter().zip(q.iter()).any(|(x, y)| x.abs_diff(*y) > 2))
        .count();
    changed as f64 / (a.len() / 4) as f64
}

#[test]
fn frames_differ_over_time() {
    let doc = fading_square();
    let first = frame(&doc, 0.0);
    let later = frame(&doc, 12.0);
    let last = frame(&doc, 19.0);
    assert!(first.iter().all(|b| *b == 0), "opacity 0 draws nothing");
    assert!(difference(&first, &later) > 0.3);
    assert!(difference(&later, &last) > 0.1);
}

#[test]
fn opacity_halfway_is_half_alpha() {
    let doc = fading_square();
    let buf = frame(&doc, 5.0);
    // the square has moved about 4 px right; (12, 8) is well inside
    let i = (8 * 32 + 12) * 4;
    let alpha = buf[i + 3];
    assert!((127..=129).contains(&alpha), "alpha {alpha}");
    assert_eq!(buf[i + 2], alpha);
}

#[test]
fn rendering_is_deterministic() {
    let doc = fading_square();
    for f in [0.0, 7.0, 13.5, 19.0] {
        assert_eq!(frame(&doc, f), frame(&doc, f), "frame {f}");
    }
}

#[test]
fn frames_render_on_many_threads() {
    let doc = fading_square();
    let expected: Vec<_> = (0..20).map(|f| frame(&doc, f as f32)).collect();
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..20)
            .map(|f| {
                let doc = &doc;
                s.spawn(move || frame(doc, f as f32))
            })
            .collect();
        for (f, h) in handles.into_iter().enumerate() {
            assert_eq!(h.join().unwrap(), expected[f]);
        }
    });
}
