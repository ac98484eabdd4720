// SPDX-License-Identifier: GPL-3.0-only

//! Packed frames and the decoders that produce them
//!
//! - [`frame`]: packed `[alpha | color]` frames and the latest-frame slot
//! - [`decoders`]: decoder trait, sink wiring and the GStreamer pipeline

pub mod decoders;
pub mod frame;

pub use decoders::{Decoder, DecoderFactory, DecoderSink, PipelineDecoder, gstreamer_factory};
pub use frame::{FrameSlot, FrameSource, PackedFrame};
