// SPDX-License-Identifier: GPL-3.0-only

//! Packed frames and the latest-wins slot they travel through
//!
//! A packed frame carries two logical images side by side: the left half is
//! the alpha mask (red channel), the right half is the color. Both halves
//! share height and timestamp by construction.

use crate::constants::packed;
use crate::errors::{SourceError, SourceResult};
use std::sync::{Arc, Mutex, PoisonError};

/// One decoded packed RGBA frame
#[derive(Debug, Clone)]
pub struct PackedFrame {
    /// Full decoded width (both halves)
    pub width: u32,
    pub height: u32,
    /// Bytes per row, may include padding
    pub stride: u32,
    /// RGBA8 pixels
    pub data: Arc<[u8]>,
}

impl PackedFrame {
    /// Wrap tightly packed RGBA bytes
    ///
    /// Fails when the buffer is too small for `width x height`.
    pub fn from_rgba(width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> SourceResult<Self> {
        let stride = width * packed::BYTES_PER_PIXEL;
        Self::with_stride(width, height, stride, data)
    }

    /// Wrap RGBA bytes with an explicit row stride
    pub fn with_stride(
        width: u32,
        height: u32,
        stride: u32,
        data: impl Into<Arc<[u8]>>,
    ) -> SourceResult<Self> {
        let data = data.into();
        let row = width as usize * packed::BYTES_PER_PIXEL as usize;
        if (stride as usize) < row {
            return Err(SourceError::Decode(format!(
                "stride {} shorter than row of {} bytes",
                stride, row
            )));
        }
        let needed = match height {
            0 => 0,
            h => stride as usize * (h as usize - 1) + row,
        };
        if data.len() < needed {
            return Err(SourceError::Decode(format!(
                "frame buffer holds {} bytes, {}x{} needs {}",
                data.len(),
                width,
                height,
                needed
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Width of one logical half
    pub fn logical_width(&self) -> u32 {
        packed::logical_width(self.width)
    }

    /// RGBA texel at `(x, y)` of the full packed frame, clamped to the edge
    pub fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        if self.width == 0 || self.height == 0 {
            return [0; 4];
        }
        let x = x.min(self.width - 1) as usize;
        let y = y.min(self.height - 1) as usize;
        let i = y * self.stride as usize + x * packed::BYTES_PER_PIXEL as usize;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }
}

/// Where the renderer pulls decoded frames from
///
/// `take_latest` returns the newest frame delivered since the previous call,
/// or `None` when nothing new arrived. Errors are transient from the
/// renderer's point of view.
pub trait FrameSource: Send + Sync {
    fn take_latest(&self) -> SourceResult<Option<PackedFrame>>;
}

#[derive(Debug, Default)]
struct SlotState {
    pending: Option<PackedFrame>,
    closed: bool,
    delivered: u64,
}

/// Single-entry mailbox between a decoder and the renderer
///
/// A delivery overwrites any frame not yet taken.
#[derive(Debug, Default, Clone)]
pub struct FrameSlot {
    inner: Arc<Mutex<SlotState>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a frame, replacing any frame not yet consumed
    ///
    /// Returns false once the slot is closed.
    pub fn deliver(&self, frame: PackedFrame) -> bool {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return false;
        }
        state.pending = Some(frame);
        state.delivered += 1;
        true
    }

    /// Drop any pending frame and refuse further deliveries
    pub fn close(&self) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        state.pending = None;
    }

    /// Accept deliveries again, discarding anything left from before
    pub fn reopen(&self) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = false;
        state.pending = None;
    }

    /// Frames delivered since creation
    pub fn delivered(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .delivered
    }
}

impl FrameSource for FrameSlot {
    fn take_latest(&self) -> SourceResult<Option<PackedFrame>> {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(SourceError::Closed);
        }
        Ok(state.pending.take())
    }
}
