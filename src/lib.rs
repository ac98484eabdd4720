// SPDX-License-Identifier: GPL-3.0-only

//! Alpha Player - transparent video playback from packed frames
//!
//! Videos are encoded with the alpha mask in the left half of every frame
//! and the color image in the right half. This crate decodes such videos,
//! recombines the halves into RGBA on a dedicated render thread, applies an
//! optional color grade and presents the result onto a transparent surface.
//!
//! # Architecture
//!
//! - [`grading`]: grading parameters and the reference grading math
//! - [`shaders`]: WGSL compositing program and uniform reflection
//! - [`media`]: packed frames, the latest-frame slot and decoders
//! - [`render`]: compositing renderer, anti-flicker gate, render thread,
//!   wgpu and software surfaces
//! - [`player`]: playback control surface and upward events
//! - [`config`]: user configuration handling

pub mod config;
pub mod constants;
pub mod errors;
pub mod gpu;
pub mod grading;
pub mod media;
pub mod player;
pub mod render;
pub mod shaders;

// Re-export commonly used types
pub use config::Config;
pub use errors::{PlayerError, RenderError, ShaderError, SourceError};
pub use grading::ColorGradeParams;
pub use media::{FrameSlot, FrameSource, PackedFrame};
pub use player::{AlphaPlayer, EventCallback, MediaLocation, PlayerEvent};
pub use render::{
    CompositingRenderer, CpuSurface, PresentedFrames, RenderThread, StopOutcome, WgpuSurface,
};
