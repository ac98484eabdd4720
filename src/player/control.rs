// SPDX-License-Identifier: GPL-3.0-only

//! Playback control surface
//!
//! [`AlphaPlayer`] ties one render thread, one frame slot and at most one
//! running decoder together. Hosts drive it with `play`/`stop`/`set_grading`
//! and receive [`PlayerEvent`]s through the callback given at construction.

use super::events::{EventCallback, PlayerEvent};
use super::location::MediaLocation;
use crate::config::Config;
use crate::errors::PlayerResult;
use crate::grading::ColorGradeParams;
use crate::media::{Decoder, DecoderFactory, DecoderSink, FrameSlot, gstreamer_factory};
use crate::render::{
    RenderEvent, RenderOptions, RenderStats, RenderThread, StopOutcome, SurfaceProvider,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct ActiveDecoder {
    decoder: Box<dyn Decoder>,
    sink: DecoderSink,
}

pub struct AlphaPlayer {
    slot: FrameSlot,
    render: RenderThread,
    factory: DecoderFactory,
    decoder: Option<ActiveDecoder>,
    events: EventCallback,
    disposed: bool,
}

impl AlphaPlayer {
    pub fn new(config: &Config, events: EventCallback) -> Self {
        let config = config.clone().validated();
        let slot = FrameSlot::new();

        let forward = Arc::clone(&events);
        let render = RenderThread::new(Arc::new(slot.clone()), RenderOptions::from(&config.render))
            .with_events(Arc::new(move |event: RenderEvent| match event {
                RenderEvent::FirstFrame => forward(PlayerEvent::FirstFrameVisible),
                RenderEvent::SurfaceFailed(e) => forward(PlayerEvent::Error(e.to_string())),
            }));
        render.set_grade_params(config.grading);
        // Nothing to show until the first play
        render.set_clear(true);

        Self {
            slot,
            render,
            factory: gstreamer_factory(config.decoder),
            decoder: None,
            events,
            disposed: false,
        }
    }

    /// Replace how decoders are opened
    pub fn with_decoder_factory(mut self, factory: DecoderFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Start rendering into a new surface, replacing any previous one
    pub fn attach_surface(
        &mut self,
        surface: Arc<dyn SurfaceProvider>,
        width: u32,
        height: u32,
    ) -> PlayerResult<()> {
        self.render.start(surface, width, height)?;
        Ok(())
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.render.update_size(width, height);
    }

    /// Stop rendering; the decoder keeps running into the slot
    pub fn detach_surface(&mut self) -> StopOutcome {
        self.render.stop()
    }

    /// Play a file path or http(s) URL
    ///
    /// The surface is cleared until the new stream delivers frames. A
    /// location that cannot be resolved is reported as an error event and
    /// returned, with nothing left playing.
    pub fn play(&mut self, location: &str) -> PlayerResult<()> {
        self.stop_decoder();
        // Drop the old stream's pending frame before the renderer resets
        self.slot.reopen();
        self.render.set_clear(true);

        let location = match MediaLocation::parse(location) {
            Ok(location) => location,
            Err(e) => {
                warn!(error = %e, "Rejecting media location");
                (self.events)(PlayerEvent::Error(e.to_string()));
                return Err(e.into());
            }
        };

        let sink = DecoderSink::new(
            self.slot.clone(),
            self.render.notifier(),
            Arc::clone(&self.events),
        );
        let decoder = match (self.factory)(&location, sink.clone()) {
            Ok(decoder) => decoder,
            Err(e) => {
                warn!(error = %e, location = %location, "Failed to open decoder");
                (self.events)(PlayerEvent::Error(e.to_string()));
                return Err(e.into());
            }
        };

        info!(location = %location, decoder = decoder.name(), "Playing");
        self.decoder = Some(ActiveDecoder { decoder, sink });
        self.render.set_clear(false);
        Ok(())
    }

    /// `play` with grading set from a hue: `Some` grades with that hue,
    /// `None` turns grading off
    pub fn play_with_hue(&mut self, location: &str, hue: Option<f32>) -> PlayerResult<()> {
        let params = self.render.grade_params();
        let params = match hue {
            Some(hue) => params.with_hue(hue).with_enabled(true),
            None => params.with_enabled(false),
        };
        self.render.set_grade_params(params.sanitized());
        self.play(location)
    }

    /// Stop the decoder and clear the surface
    pub fn stop(&mut self) {
        self.stop_decoder();
        self.render.set_clear(true);
    }

    /// Turn grading on or off; a hue, when given, replaces the current one
    pub fn set_grading(&self, hue: Option<f32>, enabled: bool) {
        let mut params = self.render.grade_params().with_enabled(enabled);
        if let Some(hue) = hue {
            params = params.with_hue(hue);
        }
        self.render.set_grade_params(params.sanitized());
    }

    pub fn set_grade_params(&self, params: ColorGradeParams) {
        self.render.set_grade_params(params.sanitized());
    }

    pub fn grade_params(&self) -> ColorGradeParams {
        self.render.grade_params()
    }

    pub fn is_playing(&self) -> bool {
        self.decoder.is_some()
    }

    pub fn is_rendering(&self) -> bool {
        self.render.is_running()
    }

    pub fn stats(&self) -> RenderStats {
        self.render.stats()
    }

    /// Stop everything and release the surface; safe to call repeatedly
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.stop_decoder();
        self.slot.close();
        let outcome = self.render.stop();
        debug!(?outcome, "Player disposed");
    }

    fn stop_decoder(&mut self) {
        if let Some(mut active) = self.decoder.take() {
            active.sink.deactivate();
            active.decoder.stop();
            debug!(decoder = active.decoder.name(), "Decoder stopped");
        }
    }
}

impl Drop for AlphaPlayer {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{PlayerError, SourceError};
    use crate::player::discard_events;

    struct NullDecoder;

    impl Decoder for NullDecoder {
        fn stop(&mut self) {}

        fn name(&self) -> &'static str {
            "null"
        }
    }

    fn player() -> AlphaPlayer {
        AlphaPlayer::new(&Config::default(), discard_events())
            .with_decoder_factory(Arc::new(|_: &MediaLocation, _: DecoderSink| {
                Ok(Box::new(NullDecoder) as Box<dyn Decoder>)
            }))
    }

    #[test]
    fn test_set_grading_keeps_hue_when_none() {
        let p = player();
        p.set_grading(Some(0.25), true);
        p.set_grading(None, false);
        let params = p.grade_params();
        assert!((params.hue - 0.25).abs() < 1e-6);
        assert!(!params.is_on);
    }

    #[test]
    fn test_play_with_hue_none_disables_grading() {
        let mut p = player();
        p.play_with_hue("https://example.com/a.mp4", None).unwrap();
        assert!(!p.grade_params().is_on);
        assert!(p.is_playing());

        p.play_with_hue("https://example.com/a.mp4", Some(0.1)).unwrap();
        let params = p.grade_params();
        assert!(params.is_on);
        assert!((params.hue - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_does_not_start_decoder() {
        let mut p = player();
        let err = p.play("/no/such/clip.mp4").unwrap_err();
        assert!(matches!(err, PlayerError::Source(SourceError::NotFound(_))));
        assert!(!p.is_playing());
    }

    #[test]
    fn test_dispose_twice() {
        let mut p = player();
        p.dispose();
        p.dispose();
        assert!(!p.is_rendering());
    }
}
