// SPDX-License-Identifier: GPL-3.0-only

//! Events emitted upward to whoever hosts the player

use std::fmt;
use std::sync::Arc;

/// Playback and presentation events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Logical content size; the width is already halved from the packed width
    VideoSize { width: u32, height: u32 },
    /// Decoder reached end of stream
    PlayFinished,
    /// Decoder or surface error, message forwarded verbatim
    Error(String),
    /// First composited frame has been presented since the last reset
    FirstFrameVisible,
}

impl fmt::Display for PlayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerEvent::VideoSize { width, height } => write!(f, "video size {}x{}", width, height),
            PlayerEvent::PlayFinished => write!(f, "play finished"),
            PlayerEvent::Error(msg) => write!(f, "error: {}", msg),
            PlayerEvent::FirstFrameVisible => write!(f, "first frame visible"),
        }
    }
}

/// Event sink; may be invoked from the decoder's threads or the render thread
pub type EventCallback = Arc<dyn Fn(PlayerEvent) + Send + Sync>;

/// Callback that drops every event
pub fn discard_events() -> EventCallback {
    Arc::new(|_: PlayerEvent| {})
}
