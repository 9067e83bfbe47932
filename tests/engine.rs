//! Facade behaviour end to end: load, query, render.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use lottie_engine::{
    Compose, LottieAnimation, LottieError, LottiePlayer, Region, RenderOptions,
};
use serde_json::{json, Value};

/// 512x512, 30fps, 60 frames, one opaque red rectangle over the canvas.
fn red_square() -> Value {
    json!({
        "v": "5.7.0", "fr": 30, "ip": 0, "op": 60, "w": 512, "h": 512, "nm": "red",
        "layers": [{
            "ty": 4, "ind": 1, "nm": "square", "ip": 0, "op": 60, "st": 0,
            "ks": {
                "o": { "a": 0, "k": 100 },
                "p": { "a": 0, "k": [256, 256, 0] },
                "a": { "a": 0, "k": [0, 0, 0] },
                "s": { "a": 0, "k": [100, 100, 100] }
            },
            "shapes": [{
                "ty": "gr", "nm": "Group",
                "it": [
                    { "ty": "rc", "nm": "Rect", "p": { "a": 0, "k": [0, 0] }, "s": { "a": 0, "k": [512, 512] }, "r": { "a": 0, "k": 0 } },
                    { "ty": "fl", "nm": "Fill", "c": { "a": 0, "k": [1, 0, 0, 1] }, "o": { "a": 0, "k": 100 } },
                    { "ty": "tr", "p": { "a": 0, "k": [0, 0] }, "a": { "a": 0, "k": [0, 0] }, "s": { "a": 0, "k": [100, 100] }, "r": { "a": 0, "k": 0 }, "o": { "a": 0, "k": 100 } }
                ]
            }]
        }]
    })
}

fn load(doc: &Value) -> LottieAnimation {
    LottieAnimation::from_data(&serde_json::to_vec(doc).unwrap()).expect("document loads")
}

fn full_buffer(anim: &LottieAnimation) -> Vec<u8> {
    let (w, h) = anim.size();
    vec![0u8; (w * h * 4) as usize]
}

#[test]
fn red_square_scenario() {
    let anim = load(&red_square());
    assert_eq!(anim.size(), (512, 512));
    assert_eq!(anim.total_frames(), 60);
    assert_eq!(anim.frame_rate(), 30.0);
    assert!((anim.duration() - 2.0).abs() < 1e-6);

    let mut buf = full_buffer(&anim);
    anim.render(0, &mut buf).unwrap();
    assert!(buf.chunks_exact(4).all(|p| p == [0, 0, 255, 255]));

    let err = anim.render(60, &mut buf).unwrap_err();
    assert!(matches!(
        err.as_lottie(),
        Some(LottieError::FrameOutOfRange { total_frames: 60, .. })
    ));
}

#[test]
fn every_frame_renders_and_repeats_exactly() {
    let mut doc = red_square();
    doc["layers"][0]["ks"]["r"] = json!({ "a": 1, "k": [{ "t": 0, "s": [0] }, { "t": 59, "s": [90] }] });
    doc["layers"][0]["ks"]["s"] = json!({ "a": 0, "k": [50, 50, 100] });
    let anim = load(&doc);
    for frame in (0..anim.total_frames()).step_by(7) {
        let mut a = full_buffer(&anim);
        let mut b = full_buffer(&anim);
        anim.render(frame, &mut a).unwrap();
        anim.render(frame, &mut b).unwrap();
        assert_eq!(a, b, "frame {frame}");
    }
}

#[test]
fn frame_at_pos_endpoints() {
    for op in [1, 2, 60, 97] {
        let mut doc = red_square();
        doc["op"] = json!(op);
        let anim = load(&doc);
        assert_eq!(anim.frame_at_pos(0.0), 0);
        assert_eq!(anim.frame_at_pos(1.0), anim.total_frames() - 1);
    }
}

#[test]
fn missing_frame_rate_is_a_parse_error() {
    let mut doc = red_square();
    doc.as_object_mut().unwrap().remove("fr");
    let err = LottieAnimation::from_data(&serde_json::to_vec(&doc).unwrap()).unwrap_err();
    assert!(matches!(err.as_lottie(), Some(LottieError::Parse(_))));
}

#[test]
fn layer_out_point_hides_it() {
    let mut doc = red_square();
    doc["layers"][0]["op"] = json!(5);
    let anim = load(&doc);
    let mut buf = full_buffer(&anim);
    anim.render(4, &mut buf).unwrap();
    assert!(buf.chunks_exact(4).all(|p| p[3] == 255));
    for frame in [5, 6, 30, 59] {
        anim.render(frame, &mut buf).unwrap();
        assert!(buf.iter().all(|b| *b == 0), "frame {frame}");
    }
}

#[test]
fn opacity_ramp_scenario() {
    let mut doc = red_square();
    doc["layers"][0]["ks"]["o"] = json!({ "a": 1, "k": [{ "t": 0, "s": [0] }, { "t": 10, "s": [100] }] });
    let anim = load(&doc);
    let alpha_at = |frame| {
        let mut buf = full_buffer(&anim);
        anim.render(frame, &mut buf).unwrap();
        buf[(256 * 512 + 256) * 4 + 3]
    };
    assert_eq!(alpha_at(0), 0);
    assert!((126..=129).contains(&alpha_at(5)));
    assert_eq!(alpha_at(10), 255);
}

#[test]
fn gzip_data_loads_like_json() {
    let raw = serde_json::to_vec(&red_square()).unwrap();
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&raw).unwrap();
    let tgs = LottieAnimation::from_data(&enc.finish().unwrap()).unwrap();
    let json = LottieAnimation::from_data(&raw).unwrap();
    assert_eq!(tgs.total_frames(), json.total_frames());
    assert_eq!(
        tgs.render_to_vec(3, &RenderOptions::default()).unwrap(),
        json.render_to_vec(3, &RenderOptions::default()).unwrap()
    );
}

#[test]
fn sub_rectangle_matches_full_render() {
    let mut doc = red_square();
    doc["layers"][0]["shapes"][0]["it"][0]["s"] = json!({ "a": 0, "k": [100, 60] });
    let anim = load(&doc);
    let full = anim.render_to_vec(0, &RenderOptions::default()).unwrap();

    let region = Region::new(190, 220, 40, 20);
    let stride = 40 * 4 + 12;
    let opts = RenderOptions::default()
        .with_region(region)
        .with_bytes_per_line(stride);
    let mut part = vec![0x55u8; opts.buffer_len(anim.size())];
    anim.render_with(0, &mut part, &opts).unwrap();

    for row in 0..20usize {
        let src = ((220 + row) * 512 + 190) * 4;
        let dst = row * stride;
        assert_eq!(&part[dst..dst + 160], &full[src..src + 160], "row {row}");
    }
    assert!(part[160..stride].iter().all(|b| *b == 0x55));
}

#[test]
fn over_keeps_the_backdrop_where_nothing_is_drawn() {
    let mut doc = red_square();
    doc["layers"][0]["shapes"][0]["it"][0]["s"] = json!({ "a": 0, "k": [256, 512] });
    let anim = load(&doc);
    let mut buf: Vec<u8> = [0xFF, 0x00, 0x00, 0xFF].repeat(512 * 512);
    anim.render_with(0, &mut buf, &RenderOptions::default().with_compose(Compose::Over))
        .unwrap();
    let px = |x: usize, y: usize| &buf[(y * 512 + x) * 4..(y * 512 + x) * 4 + 4];
    assert_eq!(px(256, 10), [0, 0, 255, 255]);
    assert_eq!(px(10, 10), [255, 0, 0, 255]);
}

#[test]
fn scaled_viewport() {
    let anim = load(&red_square());
    let buf = anim.render_to_vec(0, &RenderOptions::sized(64, 32)).unwrap();
    assert_eq!(buf.len(), 64 * 32 * 4);
    assert!(buf.chunks_exact(4).all(|p| p == [0, 0, 255, 255]));
}

#[test]
fn render_tree_is_a_snapshot() {
    let anim = load(&red_square());
    let tree = anim.render_tree(0).unwrap();
    assert_eq!(tree.width, 512.0);
    assert!(tree.find("square").is_some());
    assert_eq!(tree.shape_count(), 1);
    let again = anim.render_tree(0).unwrap();
    assert_eq!(tree.to_string(), again.to_string());
}

#[test]
fn concurrent_renders_share_one_document() {
    let anim = load(&red_square());
    let expected = anim.render_to_vec(0, &RenderOptions::default()).unwrap();
    std::thread::scope(|s| {
        let workers: Vec<_> = (0..4)
            .map(|_| s.spawn(|| anim.render_to_vec(0, &RenderOptions::default()).unwrap()))
            .collect();
        for w in workers {
            assert_eq!(w.join().unwrap(), expected);
        }
    });
}

#[test]
fn async_render_resolves() {
    let anim = load(&red_square());
    let pending = anim.render_async(12, RenderOptions::sized(16, 16));
    assert_eq!(pending.frame(), 12);
    let buf = pending.wait().unwrap();
    assert_eq!(buf.len(), 16 * 16 * 4);
}

#[test]
fn player_loops_through_frames() {
    let mut player = LottiePlayer::new(load(&red_square()));
    player.advance(2.5);
    assert_eq!(player.frame(), 15);
    assert!(player.render_tree().is_ok());
}

#[test]
fn animation_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<LottieAnimation>();
    assert_send_sync::<lottie_engine::RenderTree>();
}
