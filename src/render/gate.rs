// SPDX-License-Identifier: GPL-3.0-only

//! Anti-flicker gate
//!
//! Decoders produce unreliable output for the first few frames after a
//! reset. The gate holds the surface transparent while in clear mode and
//! swallows a configurable number of draws once clear mode is lifted.

/// What a draw is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Clear mode: transparent surface only
    ClearOnly,
    /// Still inside the warm-up window; carries the draw count so far
    Warmup(u32),
    /// Composite the packed frame
    Composite,
}

#[derive(Debug, Clone)]
pub struct AntiFlickerGate {
    is_clear: bool,
    draw_count: u32,
    has_presented_first_frame: bool,
    warmup_frames: u32,
}

impl AntiFlickerGate {
    /// Starts in clear mode
    pub fn new(warmup_frames: u32) -> Self {
        Self {
            is_clear: true,
            draw_count: 0,
            has_presented_first_frame: false,
            warmup_frames,
        }
    }

    /// Enter or leave clear mode; entering resets the warm-up window and the
    /// first-frame latch
    pub fn set_clear(&mut self, clear: bool) {
        self.is_clear = clear;
        if clear {
            self.draw_count = 0;
            self.has_presented_first_frame = false;
        }
    }

    /// Decide what the next draw may do, counting it if not in clear mode
    pub fn admit(&mut self) -> GateDecision {
        if self.is_clear {
            return GateDecision::ClearOnly;
        }
        self.draw_count = self.draw_count.saturating_add(1);
        if self.draw_count <= self.warmup_frames {
            GateDecision::Warmup(self.draw_count)
        } else {
            GateDecision::Composite
        }
    }

    /// Record a successful composite. True only for the first one since the
    /// last reset.
    pub fn mark_composited(&mut self) -> bool {
        let first = !self.has_presented_first_frame;
        self.has_presented_first_frame = true;
        first
    }

    pub fn is_clear(&self) -> bool {
        self.is_clear
    }

    pub fn draw_count(&self) -> u32 {
        self.draw_count
    }

    pub fn has_presented_first_frame(&self) -> bool {
        self.has_presented_first_frame
    }

    pub fn warmup_frames(&self) -> u32 {
        self.warmup_frames
    }
}
