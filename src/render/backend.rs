// SPDX-License-Identifier: GPL-3.0-only

//! Surface abstraction used by the compositing renderer
//!
//! A `SurfaceProvider` stands for a native surface that outlives render
//! threads. Every time a render thread starts it asks the provider for a
//! brand new `RenderBackend`, which then lives and dies on that thread.

use crate::errors::RenderResult;
use crate::media::PackedFrame;
use crate::shaders::{ShaderProgram, UniformBlock};

/// GPU (or software) context bound to one surface generation
///
/// Only ever touched from the render thread that created it.
pub trait RenderBackend {
    /// Build pipeline objects for a compiled program
    ///
    /// Failure is fatal for this surface generation.
    fn prepare(&mut self, program: &ShaderProgram) -> RenderResult<()>;

    /// New viewport size in pixels
    fn resize(&mut self, width: u32, height: u32);

    /// Replace the packed-frame texture contents
    fn upload(&mut self, frame: &PackedFrame) -> RenderResult<()>;

    /// Forget the uploaded frame so the next composite reports no texture
    fn discard_texture(&mut self);

    /// Acquire the next target and clear it to transparent black
    fn begin_frame(&mut self) -> RenderResult<()>;

    /// Draw the full-screen quad with alpha blending
    ///
    /// Returns false when no texture was uploaded since the last discard.
    fn draw_composite(&mut self, uniforms: &UniformBlock) -> RenderResult<bool>;

    /// Show the frame started by `begin_frame`
    fn present(&mut self) -> RenderResult<()>;

    /// Drop texture and pipeline objects; safe to call more than once
    fn release(&mut self);

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// A native surface that can mint a fresh backend per render thread start
pub trait SurfaceProvider: Send + Sync {
    fn create_backend(&self, width: u32, height: u32) -> RenderResult<Box<dyn RenderBackend>>;
}
