// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Packed-frame layout: `[alpha | color]` side by side
pub mod packed {
    /// Normalized horizontal offset from an alpha sample to its color sample
    pub const COLOR_OFFSET_U: f32 = 0.5;

    /// Number of logical images packed horizontally into one decoded frame
    pub const HALVES: u32 = 2;

    /// Bytes per RGBA texel
    pub const BYTES_PER_PIXEL: u32 = 4;

    /// Logical content width of a packed frame of `decoded_width` pixels
    pub const fn logical_width(decoded_width: u32) -> u32 {
        decoded_width / HALVES
    }
}

/// Color grading constants
pub mod grading {
    /// Rec.601 luma weights used to key the grading ramp
    pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

    pub const DEFAULT_HUE: f32 = 0.78;
    pub const DEFAULT_SAT: f32 = 1.0;
    pub const DEFAULT_VALUE: f32 = 1.1;
    pub const DEFAULT_SHADOW: f32 = 0.15;
    pub const DEFAULT_GAMMA: f32 = 0.8;
    pub const DEFAULT_IN_LOW: f32 = 0.0;
    pub const DEFAULT_MIX_ORIGIN: f32 = 0.0;

    /// Upper bound for `value` and `gamma` when sanitizing user config
    pub const MAX_BOOST: f32 = 4.0;
    /// Smallest gamma accepted (pow(t, 0) would flatten the ramp)
    pub const MIN_GAMMA: f32 = 0.01;
}

/// Render loop timing and gating
pub mod render {
    use super::Duration;

    /// Frames swallowed after every clear before compositing resumes
    pub const DEFAULT_WARMUP_FRAMES: u32 = 5;

    /// How long `stop()` waits for the render thread to tear down the GPU context
    pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(500);

    /// Render thread name (shows up in debuggers and panic messages)
    pub const THREAD_NAME: &str = "alpha-render";

    /// Smallest surface extent ever configured (zero-sized surfaces are invalid)
    pub const MIN_SURFACE_EXTENT: u32 = 1;
}

/// Decoder pipeline tuning
pub mod decoder {
    use super::Duration;

    /// How long to wait for the pipeline to preroll before giving up
    pub const DEFAULT_PREROLL_TIMEOUT: Duration = Duration::from_secs(5);

    /// Bus poll interval for the decoder watch thread
    pub const BUS_POLL_INTERVAL_MS: u64 = 100;

    /// Appsink element name inside the decode pipeline
    pub const SINK_NAME: &str = "packedsink";

    /// Name of the bus watch thread
    pub const BUS_THREAD_NAME: &str = "alpha-decoder-bus";

    /// Upper bound on waiting for the bus watch during stop; a few polls
    pub const STOP_TIMEOUT: Duration = Duration::from_millis(500);
}

/// Config file location
pub mod config {
    /// Directory under the platform config dir
    pub const APP_DIR: &str = "alpha-player";
    /// File name inside [`APP_DIR`]
    pub const FILE_NAME: &str = "config.json";
}
