// SPDX-License-Identifier: GPL-3.0-only

//! Compositing renderer
//!
//! Draws one composited frame per call: pull the latest packed frame,
//! clear to transparent, ask the anti-flicker gate, then draw the graded
//! quad. Presentation is left to the caller so it can happen after any
//! bookkeeping that must not hold locks.

use super::backend::RenderBackend;
use super::gate::{AntiFlickerGate, GateDecision};
use crate::errors::{RenderError, RenderResult};
use crate::grading::ColorGradeParams;
use crate::media::FrameSource;
use crate::shaders::{self, GradeSlots, UniformBlock};
use std::sync::Arc;
use tracing::{debug, error, info, trace};

/// Lifecycle of a renderer bound to one surface generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    Ready,
    Disposed,
}

/// What `draw_frame` ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// Renderer not ready or the surface target was unavailable
    Skipped,
    /// Clear mode, transparent surface
    Cleared,
    /// Suppressed by the gate, transparent surface
    WarmingUp(u32),
    /// Composite path reached with no frame uploaded since the last clear
    NoFrame,
    /// Quad drawn; `first` is set once per reset
    Composited { first: bool },
}

impl DrawOutcome {
    /// Whether anything was drawn into a target that should be presented
    pub fn needs_present(&self) -> bool {
        !matches!(self, DrawOutcome::Skipped)
    }
}

pub struct CompositingRenderer {
    backend: Box<dyn RenderBackend>,
    source: Arc<dyn FrameSource>,
    state: RendererState,
    gate: AntiFlickerGate,
    params: Arc<ColorGradeParams>,
    slots: Option<GradeSlots>,
    uniforms: Option<UniformBlock>,
}

impl CompositingRenderer {
    pub fn new(
        backend: Box<dyn RenderBackend>,
        source: Arc<dyn FrameSource>,
        warmup_frames: u32,
    ) -> Self {
        Self {
            backend,
            source,
            state: RendererState::Uninitialized,
            gate: AntiFlickerGate::new(warmup_frames),
            params: Arc::new(ColorGradeParams::default()),
            slots: None,
            uniforms: None,
        }
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn gate(&self) -> &AntiFlickerGate {
        &self.gate
    }

    /// Compile the program and build the backend pipeline
    ///
    /// Only valid once per surface generation. Shader and pipeline failures
    /// leave the renderer uninitialized and are returned to the caller.
    pub fn on_surface_created(&mut self) -> RenderResult<()> {
        if self.state != RendererState::Uninitialized {
            return Err(RenderError::InvalidState(
                "surface already created for this generation",
            ));
        }

        let program = shaders::compile_composite().inspect_err(|e| {
            error!(error = %e, "Composite shader failed to compile");
        })?;
        self.backend.prepare(&program).inspect_err(|e| {
            error!(backend = self.backend.name(), error = %e, "Failed to prepare surface");
        })?;

        let slots = GradeSlots::resolve(&program);
        debug!(resolved = slots.resolved(), "Grading uniforms resolved");
        self.slots = Some(slots);
        self.uniforms = Some(program.uniform_block());
        self.state = RendererState::Ready;

        info!(backend = self.backend.name(), "Compositing renderer ready");
        Ok(())
    }

    /// Draw one frame into the backend target (not presented)
    pub fn draw_frame(&mut self) -> DrawOutcome {
        if self.state != RendererState::Ready {
            trace!(state = ?self.state, "draw_frame outside Ready, ignoring");
            return DrawOutcome::Skipped;
        }

        // Decoder delivery races teardown; a failed pull just keeps the old texture
        match self.source.take_latest() {
            Ok(Some(frame)) => {
                if let Err(e) = self.backend.upload(&frame) {
                    debug!(error = %e, "Texture update failed, continuing with previous frame");
                }
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Frame source unavailable"),
        }

        if let Err(e) = self.backend.begin_frame() {
            debug!(error = %e, "Surface target unavailable, skipping frame");
            return DrawOutcome::Skipped;
        }

        match self.gate.admit() {
            GateDecision::ClearOnly => return DrawOutcome::Cleared,
            GateDecision::Warmup(n) => {
                trace!(draw = n, "Warm-up frame suppressed");
                return DrawOutcome::WarmingUp(n);
            }
            GateDecision::Composite => {}
        }

        let (Some(slots), Some(block)) = (self.slots.as_ref(), self.uniforms.as_mut()) else {
            return DrawOutcome::Skipped;
        };
        slots.write(block, &self.params.uniforms());

        match self.backend.draw_composite(block) {
            Ok(true) => DrawOutcome::Composited {
                first: self.gate.mark_composited(),
            },
            Ok(false) => DrawOutcome::NoFrame,
            Err(e) => {
                debug!(error = %e, "Composite draw failed");
                DrawOutcome::NoFrame
            }
        }
    }

    /// Present the frame started by `draw_frame`
    pub fn present(&mut self) -> RenderResult<()> {
        if self.state != RendererState::Ready {
            return Err(RenderError::InvalidState("present outside Ready"));
        }
        self.backend.present()
    }

    /// Enter or leave clear mode
    ///
    /// Entering clear mode also drops the uploaded texture, so a later
    /// composite only ever shows frames pulled after the reset.
    pub fn set_clear(&mut self, clear: bool) {
        if clear {
            self.backend.discard_texture();
        }
        self.gate.set_clear(clear);
    }

    /// Replace the grading snapshot used by the next draw
    pub fn set_grade_params(&mut self, params: Arc<ColorGradeParams>) {
        self.params = params;
    }

    pub fn grade_params(&self) -> &Arc<ColorGradeParams> {
        &self.params
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.state == RendererState::Ready {
            self.backend.resize(width, height);
        }
    }

    /// Release texture and program; idempotent
    pub fn on_surface_destroyed(&mut self) {
        if self.state == RendererState::Disposed {
            return;
        }
        self.backend.release();
        self.slots = None;
        self.uniforms = None;
        self.state = RendererState::Disposed;
        debug!(backend = self.backend.name(), "Compositing renderer disposed");
    }
}

impl Drop for CompositingRenderer {
    fn drop(&mut self) {
        self.on_surface_destroyed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{FrameSlot, PackedFrame};
    use crate::render::cpu_backend::{CpuBackend, PresentedFrames};

    fn packed(alpha: u8, color: [u8; 3]) -> PackedFrame {
        // 2x1: left texel alpha, right texel color
        PackedFrame::from_rgba(2, 1, vec![alpha, 0, 0, 255, color[0], color[1], color[2], 255])
            .unwrap()
    }

    fn renderer(warmup: u32) -> (CompositingRenderer, FrameSlot, PresentedFrames) {
        let slot = FrameSlot::new();
        let frames = PresentedFrames::new();
        let backend = CpuBackend::new(1, 1, frames.clone(), None);
        let r = CompositingRenderer::new(Box::new(backend), Arc::new(slot.clone()), warmup);
        (r, slot, frames)
    }

    #[test]
    fn test_draw_before_surface_created_is_noop() {
        let (mut r, _, _) = renderer(5);
        assert_eq!(r.draw_frame(), DrawOutcome::Skipped);
        assert!(r.present().is_err());
    }

    #[test]
    fn test_surface_created_twice_is_rejected() {
        let (mut r, _, _) = renderer(5);
        r.on_surface_created().unwrap();
        assert!(matches!(
            r.on_surface_created(),
            Err(RenderError::InvalidState(_))
        ));
        assert_eq!(r.state(), RendererState::Ready);
    }

    #[test]
    fn test_warmup_then_composite() {
        let (mut r, slot, _) = renderer(5);
        r.on_surface_created().unwrap();
        r.set_clear(false);
        slot.deliver(packed(255, [255, 0, 0]));

        for n in 1..=5 {
            assert_eq!(r.draw_frame(), DrawOutcome::WarmingUp(n));
        }
        assert_eq!(r.draw_frame(), DrawOutcome::Composited { first: true });
        assert_eq!(r.draw_frame(), DrawOutcome::Composited { first: false });
    }

    #[test]
    fn test_no_frame_does_not_latch_first_frame() {
        let (mut r, slot, _) = renderer(0);
        r.on_surface_created().unwrap();
        r.set_clear(false);
        assert_eq!(r.draw_frame(), DrawOutcome::NoFrame);

        slot.deliver(packed(255, [0, 255, 0]));
        assert_eq!(r.draw_frame(), DrawOutcome::Composited { first: true });
    }

    #[test]
    fn test_closed_source_is_swallowed() {
        let (mut r, slot, _) = renderer(0);
        r.on_surface_created().unwrap();
        r.set_clear(false);
        slot.deliver(packed(255, [0, 0, 255]));
        assert_eq!(r.draw_frame(), DrawOutcome::Composited { first: true });

        slot.close();
        assert_eq!(
            r.draw_frame(),
            DrawOutcome::Composited { first: false },
            "previous texture keeps being composited"
        );
    }

    #[test]
    fn test_reset_does_not_composite_previous_stream() {
        let (mut r, slot, frames) = renderer(5);
        r.on_surface_created().unwrap();
        r.set_clear(false);
        slot.deliver(packed(255, [255, 0, 0]));
        for _ in 0..5 {
            r.draw_frame();
        }
        assert_eq!(r.draw_frame(), DrawOutcome::Composited { first: true });

        r.set_clear(true);
        assert_eq!(r.draw_frame(), DrawOutcome::Cleared);
        slot.reopen();
        r.set_clear(false);

        for n in 1..=5 {
            assert_eq!(r.draw_frame(), DrawOutcome::WarmingUp(n));
        }
        assert_eq!(r.draw_frame(), DrawOutcome::NoFrame);
        r.present().unwrap();
        let image = frames.latest().unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 0]);

        slot.deliver(packed(255, [0, 255, 0]));
        assert_eq!(r.draw_frame(), DrawOutcome::Composited { first: true });
    }

    #[test]
    fn test_destroyed_is_terminal_and_idempotent() {
        let (mut r, _, _) = renderer(0);
        r.on_surface_created().unwrap();
        r.on_surface_destroyed();
        r.on_surface_destroyed();
        assert_eq!(r.state(), RendererState::Disposed);
        assert_eq!(r.draw_frame(), DrawOutcome::Skipped);
        assert!(r.on_surface_created().is_err());
    }
}
