// SPDX-License-Identifier: GPL-3.0-only

//! Decoder wiring
//!
//! A decoder pushes packed frames into a [`DecoderSink`], which stores them
//! in the shared frame slot, pokes the render thread and forwards size,
//! completion and error reports upward. Decoder callbacks may run on any
//! thread; the sink never does more than a slot swap and a condvar signal.

pub mod pipeline;

pub use pipeline::PipelineDecoder;

use super::frame::{FrameSlot, PackedFrame};
use crate::config::DecoderSettings;
use crate::constants::packed;
use crate::errors::SourceResult;
use crate::player::{EventCallback, MediaLocation, PlayerEvent};
use crate::render::FrameNotifier;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

struct SinkInner {
    slot: FrameSlot,
    notifier: FrameNotifier,
    events: EventCallback,
    active: AtomicBool,
    reported_size: Mutex<Option<(u32, u32)>>,
}

/// Where a running decoder reports to
///
/// Cloning is cheap; all clones share one activation flag, so a decoder
/// that outlives `stop` cannot leak frames or events into the next stream.
#[derive(Clone)]
pub struct DecoderSink {
    inner: Arc<SinkInner>,
}

impl DecoderSink {
    pub fn new(slot: FrameSlot, notifier: FrameNotifier, events: EventCallback) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                slot,
                notifier,
                events,
                active: AtomicBool::new(true),
                reported_size: Mutex::new(None),
            }),
        }
    }

    /// Hand over a decoded frame and wake the render thread
    pub fn deliver(&self, frame: PackedFrame) {
        if !self.is_active() {
            return;
        }
        self.video_size(frame.width, frame.height);
        if self.inner.slot.deliver(frame) {
            self.inner.notifier.notify();
        }
    }

    /// Report the packed frame size; emitted only when it changes
    pub fn video_size(&self, packed_width: u32, height: u32) {
        if !self.is_active() {
            return;
        }
        let logical = (packed::logical_width(packed_width), height);
        {
            let mut reported = self
                .inner
                .reported_size
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *reported == Some(logical) {
                return;
            }
            *reported = Some(logical);
        }
        debug!(width = logical.0, height = logical.1, "Video size");
        (self.inner.events)(PlayerEvent::VideoSize {
            width: logical.0,
            height: logical.1,
        });
    }

    /// End of stream
    pub fn finished(&self) {
        if self.is_active() {
            debug!("Decoder reached end of stream");
            (self.inner.events)(PlayerEvent::PlayFinished);
        }
    }

    /// Decoder error, forwarded verbatim
    pub fn error(&self, message: impl Into<String>) {
        if self.is_active() {
            let message = message.into();
            warn!(error = %message, "Decoder error");
            (self.inner.events)(PlayerEvent::Error(message));
        }
    }

    /// Ignore everything reported from now on
    pub fn deactivate(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }
}

/// A running decoder; frames flow into its sink until `stop`
pub trait Decoder: Send {
    /// Stop decoding and release the media; safe to call more than once
    fn stop(&mut self);

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Opens a decoder for a location, reporting into the given sink
pub type DecoderFactory =
    Arc<dyn Fn(&MediaLocation, DecoderSink) -> SourceResult<Box<dyn Decoder>> + Send + Sync>;

/// Factory for GStreamer-backed decoders
pub fn gstreamer_factory(settings: DecoderSettings) -> DecoderFactory {
    Arc::new(move |location: &MediaLocation, sink: DecoderSink| {
        let decoder = PipelineDecoder::open(location, sink, &settings)?;
        Ok(Box::new(decoder) as Box<dyn Decoder>)
    })
}
