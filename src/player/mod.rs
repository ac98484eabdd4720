// SPDX-License-Identifier: GPL-3.0-only

//! Playback control and upward events

mod control;
mod events;
mod location;

pub use control::AlphaPlayer;
pub use events::{EventCallback, PlayerEvent, discard_events};
pub use location::MediaLocation;
