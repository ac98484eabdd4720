// SPDX-License-Identifier: GPL-3.0-only

//! Color grading parameters
//!
//! A `ColorGradeParams` value is never mutated once handed to the renderer.
//! Producers build a new value and replace the shared snapshot wholesale, so
//! the render thread always reads one consistent configuration per draw.

use crate::constants::grading as defaults;
use serde::{Deserialize, Serialize};

/// One color grading configuration
///
/// `hue`, `sat`, `value` pick the target tone (HSV), `shadow` lifts the dark
/// end of the ramp, `gamma` bends the ramp, `in_low` is the black point and
/// `mix_origin` blends the graded result back toward the source color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColorGradeParams {
    pub hue: f32,
    pub sat: f32,
    pub value: f32,
    pub shadow: f32,
    pub gamma: f32,
    pub in_low: f32,
    pub mix_origin: f32,
    pub is_on: bool,
}

impl Default for ColorGradeParams {
    fn default() -> Self {
        Self {
            hue: defaults::DEFAULT_HUE,
            sat: defaults::DEFAULT_SAT,
            value: defaults::DEFAULT_VALUE,
            shadow: defaults::DEFAULT_SHADOW,
            gamma: defaults::DEFAULT_GAMMA,
            in_low: defaults::DEFAULT_IN_LOW,
            mix_origin: defaults::DEFAULT_MIX_ORIGIN,
            is_on: true,
        }
    }
}

impl ColorGradeParams {
    /// Grading switched off; the packed color passes through untouched
    pub fn disabled() -> Self {
        Self {
            is_on: false,
            ..Self::default()
        }
    }

    /// Copy with a different target hue
    pub fn with_hue(self, hue: f32) -> Self {
        Self { hue, ..self }
    }

    /// Copy with grading switched on or off
    pub fn with_enabled(self, is_on: bool) -> Self {
        Self { is_on, ..self }
    }

    /// Copy with a different origin mix
    pub fn with_mix_origin(self, mix_origin: f32) -> Self {
        Self { mix_origin, ..self }
    }

    /// Copy with every field forced into a range the shader handles sanely
    ///
    /// `value` and `gamma` may exceed 1.0 (the default `value` is 1.1), so
    /// they get a wider ceiling. NaN falls back to the default for that field.
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        let unit = |v: f32, fallback: f32| {
            if v.is_nan() {
                fallback
            } else {
                v.clamp(0.0, 1.0)
            }
        };
        let wide = |v: f32, min: f32, fallback: f32| {
            if v.is_nan() {
                fallback
            } else {
                v.clamp(min, defaults::MAX_BOOST)
            }
        };

        Self {
            hue: unit(self.hue, d.hue),
            sat: unit(self.sat, d.sat),
            value: wide(self.value, 0.0, d.value),
            shadow: unit(self.shadow, d.shadow),
            gamma: wide(self.gamma, defaults::MIN_GAMMA, d.gamma),
            in_low: unit(self.in_low, d.in_low),
            mix_origin: unit(self.mix_origin, d.mix_origin),
            is_on: self.is_on,
        }
    }

    /// Uniform value for the `tint_on` switch
    pub fn tint_on(&self) -> f32 {
        if self.is_on { 1.0 } else { 0.0 }
    }

    /// Uniform snapshot for the fragment stage
    pub fn uniforms(&self) -> GradeUniforms {
        GradeUniforms {
            hue: self.hue,
            sat: self.sat,
            val: self.value,
            shadow: self.shadow,
            gamma: self.gamma,
            in_low: self.in_low,
            mix_origin: self.mix_origin,
            tint_on: self.tint_on(),
        }
    }
}

/// Grading uniform block, laid out like `Grade` in `composite_fragment.wgsl`
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GradeUniforms {
    pub hue: f32,
    pub sat: f32,
    pub val: f32,
    pub shadow: f32,
    pub gamma: f32,
    pub in_low: f32,
    pub mix_origin: f32,
    pub tint_on: f32,
}

impl GradeUniforms {
    /// Member names in declaration order
    pub const NAMES: [&'static str; 8] = [
        "hue",
        "sat",
        "val",
        "shadow",
        "gamma",
        "in_low",
        "mix_origin",
        "tint_on",
    ];

    /// Uniform member names paired with their values, in declaration order
    pub fn named(&self) -> [(&'static str, f32); 8] {
        let values = [
            self.hue,
            self.sat,
            self.val,
            self.shadow,
            self.gamma,
            self.in_low,
            self.mix_origin,
            self.tint_on,
        ];
        let mut out = [("", 0.0); 8];
        for (slot, (name, value)) in out.iter_mut().zip(Self::NAMES.into_iter().zip(values)) {
            *slot = (name, value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_purple_preset() {
        let p = ColorGradeParams::default();
        assert_eq!(p.hue, 0.78);
        assert_eq!(p.sat, 1.0);
        assert_eq!(p.value, 1.1);
        assert_eq!(p.shadow, 0.15);
        assert_eq!(p.gamma, 0.8);
        assert_eq!(p.in_low, 0.0);
        assert_eq!(p.mix_origin, 0.0);
        assert!(p.is_on);
    }

    #[test]
    fn test_builders_leave_original_untouched() {
        let base = ColorGradeParams::default();
        let tinted = base.with_hue(0.3).with_enabled(false);
        assert_eq!(base.hue, 0.78);
        assert!(base.is_on);
        assert_eq!(tinted.hue, 0.3);
        assert!(!tinted.is_on);
    }

    #[test]
    fn test_sanitized_clamps_and_replaces_nan() {
        let p = ColorGradeParams {
            hue: 1.5,
            sat: -0.2,
            value: 9.0,
            gamma: 0.0,
            shadow: f32::NAN,
            ..ColorGradeParams::default()
        }
        .sanitized();
        assert_eq!(p.hue, 1.0);
        assert_eq!(p.sat, 0.0);
        assert_eq!(p.value, defaults::MAX_BOOST);
        assert_eq!(p.gamma, defaults::MIN_GAMMA);
        assert_eq!(p.shadow, defaults::DEFAULT_SHADOW);
    }

    #[test]
    fn test_uniforms_carry_switch_as_float() {
        let on = ColorGradeParams::default().uniforms();
        let off = ColorGradeParams::disabled().uniforms();
        assert_eq!(on.tint_on, 1.0);
        assert_eq!(off.tint_on, 0.0);
        assert_eq!(on.val, 1.1);
        assert_eq!(std::mem::size_of::<GradeUniforms>(), 32);
        assert_eq!(on.named()[2], ("val", 1.1));
    }

    #[test]
    fn test_json_uses_camel_case_and_defaults() {
        let p: ColorGradeParams = serde_json::from_str(r#"{"hue":0.5,"isOn":false}"#).unwrap();
        assert_eq!(p.hue, 0.5);
        assert!(!p.is_on);
        assert_eq!(p.mix_origin, defaults::DEFAULT_MIX_ORIGIN);

        let json = serde_json::to_string(&ColorGradeParams::default()).unwrap();
        assert!(json.contains("\"mixOrigin\""));
        assert!(json.contains("\"inLow\""));
    }
}
