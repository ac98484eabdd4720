// SPDX-License-Identifier: GPL-3.0-only

//! Compositing and render scheduling
//!
//! - [`gate`]: anti-flicker gate suppressing unreliable frames after a reset
//! - [`renderer`]: per-surface compositing state machine
//! - [`thread`]: the single thread that owns a surface and draws on demand
//! - [`cpu_backend`] / [`wgpu_backend`]: software and GPU surfaces

pub mod backend;
pub mod cpu_backend;
pub mod gate;
pub mod renderer;
pub mod thread;
pub mod wgpu_backend;

pub use backend::{RenderBackend, SurfaceProvider};
pub use cpu_backend::{CpuBackend, CpuSurface, PresentCallback, PresentedFrames, unpremultiply};
pub use gate::{AntiFlickerGate, GateDecision};
pub use renderer::{CompositingRenderer, DrawOutcome, RendererState};
pub use thread::{
    FrameNotifier, RenderEvent, RenderEventCallback, RenderOptions, RenderStats, RenderThread,
    StopOutcome,
};
pub use wgpu_backend::{GpuOptions, WgpuBackend, WgpuSurface};
