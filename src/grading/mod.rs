// SPDX-License-Identifier: GPL-3.0-only

//! Color grading: parameters and the CPU reference of the grading function

pub mod cpu;
mod params;

pub use params::{ColorGradeParams, GradeUniforms};
