// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for color grading through the full compositing path

use alpha_player::grading::cpu;
use alpha_player::render::{CompositingRenderer, CpuBackend, DrawOutcome, PresentedFrames};
use alpha_player::{ColorGradeParams, FrameSlot, PackedFrame};
use std::sync::Arc;

const TOLERANCE: f32 = 2.0 / 255.0;

/// 2x1 packed frame: one alpha texel on the left, one color texel on the right
fn packed_texel(alpha: u8, color: [u8; 3]) -> PackedFrame {
    PackedFrame::from_rgba(
        2,
        1,
        vec![alpha, 0, 0, 255, color[0], color[1], color[2], 255],
    )
    .unwrap()
}

/// Composite one frame with warm-up disabled; returns the premultiplied texel
fn composite(frame: PackedFrame, params: ColorGradeParams) -> [f32; 4] {
    let slot = FrameSlot::new();
    slot.deliver(frame);
    let frames = PresentedFrames::new();
    let backend = CpuBackend::new(1, 1, frames.clone(), None);
    let mut renderer = CompositingRenderer::new(Box::new(backend), Arc::new(slot), 0);
    renderer.on_surface_created().unwrap();
    renderer.set_grade_params(Arc::new(params));
    renderer.set_clear(false);

    let outcome = renderer.draw_frame();
    assert_eq!(outcome, DrawOutcome::Composited { first: true });
    renderer.present().unwrap();

    let image = frames.latest().expect("a presented frame");
    let px = image.get_pixel(0, 0).0;
    px.map(cpu::from_unorm8)
}

fn assert_close(actual: f32, expected: f32, what: &str) {
    assert!(
        (actual - expected).abs() <= TOLERANCE,
        "{}: expected {:.4}, got {:.4}",
        what,
        expected,
        actual
    );
}

#[test]
fn test_default_grading_of_pure_red_at_half_alpha() {
    let params = ColorGradeParams::default();
    let out = composite(packed_texel(128, [255, 0, 0]), params);
    let alpha = cpu::from_unorm8(128);

    assert_close(out[3], alpha, "alpha");

    // Target tone for hue 0.78 is (0.748, 0, 1.1); luma(1, 0, 0) = 0.299
    let t = cpu::smoothstep(0.0, 1.0, 0.299).powf(0.8);
    assert!((t - 0.2921).abs() < 1e-3, "ramp position {}", t);
    let scale = 0.15 + 0.85 * t;
    let expected = [0.748 * scale, 0.0, (1.1 * scale).min(1.0)];

    for i in 0..3 {
        assert_close(out[i], expected[i] * alpha, "premultiplied color");
    }
}

#[test]
fn test_composite_matches_reference_function() {
    let params = ColorGradeParams::default().with_hue(0.3);
    let color = [40u8, 200, 90];
    let out = composite(packed_texel(255, color), params);

    let reference = cpu::grade(color.map(cpu::from_unorm8), 1.0, &params);
    for i in 0..3 {
        assert_close(out[i], reference[i].clamp(0.0, 1.0), "graded channel");
    }
    assert_close(out[3], 1.0, "alpha");
}

#[test]
fn test_disabled_grading_passes_color_through() {
    let params = ColorGradeParams {
        hue: 0.1,
        sat: 0.2,
        value: 3.0,
        shadow: 0.9,
        gamma: 2.5,
        in_low: 0.4,
        mix_origin: 0.0,
        is_on: false,
    };
    let color = [12u8, 150, 240];
    let out = composite(packed_texel(255, color), params);

    for i in 0..3 {
        assert_close(out[i], cpu::from_unorm8(color[i]), "passthrough color");
    }
    assert_close(out[3], 1.0, "alpha");
}

#[test]
fn test_zero_alpha_is_fully_transparent() {
    let out = composite(packed_texel(0, [255, 255, 255]), ColorGradeParams::default());
    assert_eq!(out, [0.0; 4]);
}

#[test]
fn test_full_origin_mix_restores_source_color() {
    let params = ColorGradeParams::default().with_mix_origin(1.0);
    let color = [200u8, 100, 50];
    let out = composite(packed_texel(255, color), params);
    for i in 0..3 {
        assert_close(out[i], cpu::from_unorm8(color[i]), "origin color");
    }
}
