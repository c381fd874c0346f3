use super::*;
use crate::config::ConfigInput;
use crate::fonts::resolver::FontDbResolver;
use crate::foundation::core::Rgb;

const FIXTURE_FONT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/fonts/Tuffy.ttf");

fn config(text: &str, transparent: bool) -> AnimationConfig {
    let (mut cfg, _) = ConfigInput {
        text: Some(text.to_owned()),
        transparent_background: Some(transparent),
        ..ConfigInput::default()
    }
    .resolve()
    .unwrap();
    cfg.canvas = crate::foundation::core::Canvas::new(160, 96).unwrap();
    cfg.font_size = 48;
    cfg.text_color = Rgb::BLACK;
    cfg.background_color = Rgb::WHITE;
    cfg
}

fn renderer(resolver: FontDbResolver, edge: EdgeMode) -> FrameRenderer {
    let loader = FontLoader::with_timeout(Arc::new(resolver), Duration::from_secs(2));
    FrameRenderer::new(Arc::new(loader)).with_edge_mode(edge)
}

fn fixture_renderer(edge: EdgeMode) -> FrameRenderer {
    let mut resolver = FontDbResolver::empty();
    resolver
        .install_file(std::path::Path::new(FIXTURE_FONT))
        .unwrap();
    renderer(resolver, edge)
}

/// Inclusive `(min_x, min_y, max_x, max_y)` of pixels equal to `ink`.
fn ink_bounds(frame: &Frame, ink: [u8; 4]) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for y in 0..frame.height {
        for x in 0..frame.width {
            if frame.pixel(x, y) != Some(ink) {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
    }
    bounds
}

#[test]
fn without_any_font_the_frame_is_background_only() {
    let mut r = renderer(FontDbResolver::empty(), EdgeMode::hard());
    let cfg = config("ABC", false);
    let mut surface = Surface::new(cfg.canvas).unwrap();

    let outcome = r.render(&cfg, "Inter", &mut surface).unwrap();
    assert_eq!(outcome.font_used, None);
    assert!(outcome.fell_back);
    assert!(
        surface
            .pixels()
            .chunks_exact(4)
            .all(|px| px == [255, 255, 255, 255])
    );

    let transparent = config("ABC", true);
    let frame = r.render_frame(&transparent, "Inter", &mut surface).unwrap();
    assert!(frame.data.iter().all(|&b| b == 0));
    assert_eq!(frame.font.as_deref(), Some("Inter"));
}

#[test]
fn threshold_is_binary() {
    let ink = [1, 2, 3, 255];
    let bg = [0, 0, 0, 0];
    let coverage = [0, 0, 0, 127, 0, 0, 0, 128, 0, 0, 0, 255, 0, 0, 0, 0];
    let mut dst = [9u8; 16];
    threshold_onto(&mut dst, &coverage, ink, bg, 128);
    assert_eq!(&dst[0..4], &bg);
    assert_eq!(&dst[4..8], &ink);
    assert_eq!(&dst[8..12], &ink);
    assert_eq!(&dst[12..16], &bg);
}

#[test]
fn hard_edges_leave_exactly_two_colors_and_are_deterministic() {
    let mut r = fixture_renderer(EdgeMode::hard());
    let cfg = config("ABC", false);
    let mut surface = Surface::new(cfg.canvas).unwrap();

    let a = r.render_frame(&cfg, "Tuffy", &mut surface).unwrap();
    let b = r.render_frame(&cfg, "Tuffy", &mut surface).unwrap();
    assert_eq!(a, b);

    let mut ink = 0usize;
    for px in a.data.chunks_exact(4) {
        match px {
            [0, 0, 0, 255] => ink += 1,
            [255, 255, 255, 255] => {}
            other => panic!("unexpected pixel {other:?}"),
        }
    }
    assert!(ink > 200, "text should leave real ink, got {ink} pixels");
}

#[test]
fn transparent_hard_edges_have_no_partial_alpha() {
    let mut r = fixture_renderer(EdgeMode::hard());
    let cfg = config("ABC", true);
    let mut surface = Surface::new(cfg.canvas).unwrap();
    let frame = r.render_frame(&cfg, "Tuffy", &mut surface).unwrap();
    assert!(
        frame
            .data
            .chunks_exact(4)
            .all(|px| px[3] == 0 || px[3] == 255)
    );
    assert!(frame.data.chunks_exact(4).any(|px| px == [0, 0, 0, 255]));
}

#[test]
fn smooth_edges_blend_into_the_background() {
    let mut r = fixture_renderer(EdgeMode::Smooth);
    let cfg = config("ABC", false);
    let mut surface = Surface::new(cfg.canvas).unwrap();
    let frame = r.render_frame(&cfg, "Tuffy", &mut surface).unwrap();
    let partial = frame
        .data
        .chunks_exact(4)
        .filter(|px| px[0] != 0 && px[0] != 255)
        .count();
    assert!(partial > 0, "anti-aliased edges expected");
}

#[test]
fn missing_font_falls_back_without_failing() {
    let mut r = fixture_renderer(EdgeMode::Smooth);
    let cfg = config("ABC", false);
    let mut surface = Surface::new(cfg.canvas).unwrap();
    let outcome = r
        .render(&cfg, "Definitely Not Installed 9000", &mut surface)
        .unwrap();
    assert!(outcome.fell_back);
    assert_eq!(outcome.font_used.as_deref(), Some("sans-serif"));
    assert!(surface.pixels().chunks_exact(4).any(|px| px[0] < 128));
}

#[test]
fn text_is_centered_on_both_axes() {
    let mut r = fixture_renderer(EdgeMode::hard());
    let cfg = config("ABC", false);
    let mut surface = Surface::new(cfg.canvas).unwrap();
    let frame = r.render_frame(&cfg, "Tuffy", &mut surface).unwrap();
    let (min_x, min_y, max_x, max_y) = ink_bounds(&frame, [0, 0, 0, 255]).unwrap();

    let left = i64::from(min_x);
    let right = i64::from(frame.width - 1 - max_x);
    assert!((left - right).abs() <= 4, "left margin {left}, right margin {right}");

    // The line box (ascent + descent) is centered; caps sit inside it above the baseline.
    let loader = Arc::clone(r.loader());
    let font = loader.resolve("Tuffy", Duration::from_secs(2)).unwrap();
    let brush = TextBrushRgba8 {
        a: 255,
        ..TextBrushRgba8::default()
    };
    let shaped = r
        .engine
        .shape(&cfg.text, &font, cfg.font_size as f32, brush)
        .unwrap();
    let box_top = ((frame.height as f32 - shaped.height()) / 2.0).round();
    let box_bottom = box_top + shaped.height();
    let above = box_top as i64;
    let below = i64::from(frame.height) - box_bottom.round() as i64;
    assert!((above - below).abs() <= 1, "line box {above} above, {below} below");
    assert!(min_y as f32 >= box_top && (max_y as f32) < box_bottom);

    let ink_mid = f64::from(min_y + max_y) / 2.0;
    let canvas_mid = f64::from(frame.height - 1) / 2.0;
    assert!(
        (ink_mid - canvas_mid).abs() <= f64::from(cfg.font_size) / 8.0,
        "ink rows {min_y}..={max_y} in a {}px canvas",
        frame.height
    );
}

#[test]
fn glyphs_advance_instead_of_stacking() {
    let mut r = fixture_renderer(EdgeMode::hard());
    let mut surface = Surface::new(config("A", false).canvas).unwrap();
    let ink = [0, 0, 0, 255];

    let one = r
        .render_frame(&config("A", false), "Tuffy", &mut surface)
        .unwrap();
    let three = r
        .render_frame(&config("ABC", false), "Tuffy", &mut surface)
        .unwrap();
    let (a0, _, a1, _) = ink_bounds(&one, ink).unwrap();
    let (c0, _, c1, _) = ink_bounds(&three, ink).unwrap();

    let single = a1 - a0 + 1;
    let triple = c1 - c0 + 1;
    assert!(
        triple > 2 * single,
        "\"ABC\" ink is {triple}px wide, \"A\" alone is {single}px"
    );
}
