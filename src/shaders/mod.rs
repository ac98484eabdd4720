// SPDX-License-Identifier: GPL-3.0-only
//! Composite shaders and the full-screen quad they draw
//!
//! The vertex stage passes the quad through untouched; the fragment stage
//! extracts alpha from the left half of the packed frame, color from the
//! right half, and applies the grading function.

mod program;

pub use program::{FRAGMENT_ENTRY, ShaderProgram, UniformBlock, UniformLocation, VERTEX_ENTRY};

use crate::errors::ShaderError;
use crate::grading::GradeUniforms;

/// Pass-through vertex stage
pub const COMPOSITE_VERTEX_WGSL: &str = include_str!("composite_vertex.wgsl");

/// Alpha extraction + color grading fragment stage
pub const COMPOSITE_FRAGMENT_WGSL: &str = include_str!("composite_fragment.wgsl");

/// One corner of the full-screen quad
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub texcoord: [f32; 2],
}

/// Triangle strip covering clip space; texcoords span only the alpha half
///
/// V is flipped so row 0 of the frame lands at the top of the surface.
pub const FULLSCREEN_QUAD: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0],
        texcoord: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        texcoord: [0.5, 1.0],
    },
    QuadVertex {
        position: [-1.0, 1.0],
        texcoord: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        texcoord: [0.5, 0.0],
    },
];

/// Compile the composite program
pub fn compile_composite() -> Result<ShaderProgram, ShaderError> {
    ShaderProgram::compile(COMPOSITE_VERTEX_WGSL, COMPOSITE_FRAGMENT_WGSL)
}

/// Resolved uniform slots of the composite program
///
/// Resolved once per surface generation, then written every draw.
#[derive(Debug, Clone, Copy)]
pub struct GradeSlots {
    slots: [UniformLocation; 8],
}

impl GradeSlots {
    pub fn resolve(program: &ShaderProgram) -> Self {
        Self {
            slots: GradeUniforms::NAMES.map(|name| program.resolve_uniform(name)),
        }
    }

    /// Write a full grading snapshot into `block`
    pub fn write(&self, block: &mut UniformBlock, uniforms: &GradeUniforms) {
        for (slot, (_, value)) in self.slots.iter().zip(uniforms.named()) {
            block.set_f32(*slot, value);
        }
    }

    /// Number of slots the program actually uses
    pub fn resolved(&self) -> usize {
        self.slots.iter().filter(|s| s.is_valid()).count()
    }
}
