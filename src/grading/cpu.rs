// SPDX-License-Identifier: GPL-3.0-only

//! CPU reference for the fragment stage
//!
//! Mirrors `composite_fragment.wgsl` operation for operation. The software
//! surface composites with these functions and the tests use them as the
//! ground truth for the GPU path.

use super::ColorGradeParams;
use crate::constants::grading::LUMA_WEIGHTS;

/// Rec.601 luma of a linear RGB triple
pub fn luma(c: [f32; 3]) -> f32 {
    c[0] * LUMA_WEIGHTS[0] + c[1] * LUMA_WEIGHTS[1] + c[2] * LUMA_WEIGHTS[2]
}

/// HSV to RGB, all components in `[0, 1]` except `v`, which may exceed 1
///
/// Branchless form: `v * mix(1, clamp(|fract(h + k) * 6 - 3| - 1, 0, 1), s)`
/// with `k = (1, 2/3, 1/3)`.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let k = [1.0, 2.0 / 3.0, 1.0 / 3.0];
    let mut out = [0.0; 3];
    for (o, k) in out.iter_mut().zip(k) {
        let p = (fract(h + k) * 6.0 - 3.0).abs();
        let ramp = (p - 1.0).clamp(0.0, 1.0);
        *o = v * mix(1.0, ramp, s);
    }
    out
}

/// Hermite step: 0 below `edge0`, 1 at or above `edge1`, smooth in between
///
/// Degenerates to a hard step when the edges meet or cross.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x >= edge1 { 1.0 } else { 0.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Linear interpolation, `t = 0` gives `a`
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// Grade one packed texel: color `c` from the right half, alpha `a` from the
/// left half's red channel. Returns the straight-alpha fragment color.
pub fn grade(c: [f32; 3], a: f32, params: &ColorGradeParams) -> [f32; 4] {
    if !params.is_on {
        return [c[0], c[1], c[2], a];
    }

    let target = hsv_to_rgb(params.hue, params.sat, params.value);
    let t = smoothstep(params.in_low, 1.0, luma(c)).powf(params.gamma);

    let mut out = [0.0, 0.0, 0.0, a];
    for i in 0..3 {
        let shadow = target[i] * params.shadow;
        let graded = mix(shadow, target[i], t);
        out[i] = mix(graded, c[i], params.mix_origin);
    }
    out
}

/// `SrcAlpha, OneMinusSrcAlpha` for color, `One, OneMinusSrcAlpha` for alpha
///
/// Over a transparent clear this yields premultiplied output, which is what
/// the presentation surface expects.
pub fn blend_over(dst: [f32; 4], src: [f32; 4]) -> [f32; 4] {
    let sa = src[3].clamp(0.0, 1.0);
    let inv = 1.0 - sa;
    [
        src[0] * sa + dst[0] * inv,
        src[1] * sa + dst[1] * inv,
        src[2] * sa + dst[2] * inv,
        sa + dst[3] * inv,
    ]
}

/// Normalized channel to 8-bit, saturating like a unorm render target
pub fn to_unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

pub fn from_unorm8(v: u8) -> f32 {
    v as f32 / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [1.0, 0.0, 0.0]);
        let green = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!(close(green[0], 0.0) && close(green[1], 1.0) && close(green[2], 0.0));
        let grey = hsv_to_rgb(0.42, 0.0, 0.5);
        assert!(grey.iter().all(|&c| close(c, 0.5)), "zero saturation is grey");
    }

    #[test]
    fn test_smoothstep_edges() {
        assert_eq!(smoothstep(0.2, 1.0, 0.1), 0.0);
        assert_eq!(smoothstep(0.2, 1.0, 1.0), 1.0);
        assert!(close(smoothstep(0.0, 1.0, 0.5), 0.5));
        assert_eq!(smoothstep(1.0, 1.0, 0.99), 0.0);
        assert_eq!(smoothstep(1.0, 1.0, 1.0), 1.0);
    }

    #[test]
    fn test_grade_preserves_alpha() {
        let out = grade([0.3, 0.6, 0.9], 0.25, &ColorGradeParams::default());
        assert_eq!(out[3], 0.25);
    }

    #[test]
    fn test_grade_disabled_is_passthrough() {
        let params = ColorGradeParams {
            hue: 0.1,
            shadow: 0.9,
            mix_origin: 0.3,
            ..ColorGradeParams::disabled()
        };
        assert_eq!(grade([0.2, 0.4, 0.6], 0.7, &params), [0.2, 0.4, 0.6, 0.7]);
    }

    #[test]
    fn test_full_mix_origin_returns_source_color() {
        let params = ColorGradeParams::default().with_mix_origin(1.0);
        let out = grade([0.2, 0.4, 0.6], 1.0, &params);
        assert!(close(out[0], 0.2) && close(out[1], 0.4) && close(out[2], 0.6));
    }

    #[test]
    fn test_black_maps_to_shadow_color() {
        let params = ColorGradeParams::default();
        let target = hsv_to_rgb(params.hue, params.sat, params.value);
        let out = grade([0.0, 0.0, 0.0], 1.0, &params);
        for i in 0..3 {
            assert!(close(out[i], target[i] * params.shadow));
        }
    }

    #[test]
    fn test_blend_over_transparent_is_premultiplied() {
        let out = blend_over([0.0; 4], [0.8, 0.4, 0.2, 0.5]);
        assert!(close(out[0], 0.4) && close(out[1], 0.2) && close(out[2], 0.1));
        assert!(close(out[3], 0.5));
    }

    #[test]
    fn test_unorm_roundtrip_saturates() {
        assert_eq!(to_unorm8(1.7), 255);
        assert_eq!(to_unorm8(-0.2), 0);
        assert_eq!(to_unorm8(from_unorm8(128)), 128);
    }
}
