// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer decoder for packed alpha videos
//!
//! Decodes a local file or a network stream to RGBA and pushes every sample
//! into a [`DecoderSink`]. A small watch thread drains the pipeline bus for
//! end-of-stream and error messages, which are forwarded as player events.

use super::{Decoder, DecoderSink};
use crate::config::DecoderSettings;
use crate::constants::decoder as decoder_consts;
use crate::errors::{SourceError, SourceResult};
use crate::media::PackedFrame;
use crate::player::MediaLocation;
use gstreamer::prelude::*;
use gstreamer_video::VideoInfo;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub struct PipelineDecoder {
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    sink: DecoderSink,
    stop_signal: Arc<AtomicBool>,
    bus_watch: Option<BusWatch>,
    stopped: bool,
}

/// How a bus watch wind-down ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchExit {
    Joined,
    /// Stop ran on the watch thread itself, e.g. from an end-of-stream callback
    FromWatchThread,
    TimedOut,
}

/// Sends on drop so the owner can wait for exit with a timeout
struct ExitGuard(mpsc::Sender<()>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

/// The bus watch thread plus what is needed to wind it down safely
struct BusWatch {
    handle: JoinHandle<()>,
    thread_id: ThreadId,
    exited: Receiver<()>,
}

impl BusWatch {
    fn spawn<F>(body: F) -> std::io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (exit_tx, exited) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(decoder_consts::BUS_THREAD_NAME.to_string())
            .spawn(move || {
                let _guard = ExitGuard(exit_tx);
                body();
            })?;
        Ok(Self {
            thread_id: handle.thread().id(),
            handle,
            exited,
        })
    }

    /// Join unless called from the watch thread; never waits past `timeout`
    fn finish(self, timeout: Duration) -> WatchExit {
        if thread::current().id() == self.thread_id {
            debug!("Decoder stopped from its bus watch, not joining");
            return WatchExit::FromWatchThread;
        }
        match self.exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    warn!("Decoder bus watch panicked");
                }
                WatchExit::Joined
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Decoder bus watch did not exit in time, detaching"
                );
                WatchExit::TimedOut
            }
        }
    }
}

impl PipelineDecoder {
    /// Build the pipeline for `location`, start playing and begin delivering
    pub fn open(
        location: &MediaLocation,
        sink: DecoderSink,
        settings: &DecoderSettings,
    ) -> SourceResult<Self> {
        info!(location = %location, "Opening decoder pipeline");

        gstreamer::init()?;

        let description = pipeline_description(location, settings.sync_to_clock);
        debug!(pipeline = %description, "Decoder pipeline");

        let pipeline = gstreamer::parse::launch(&description)?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| SourceError::Pipeline("Failed to downcast to Pipeline".into()))?;

        let appsink = pipeline
            .by_name(decoder_consts::SINK_NAME)
            .ok_or_else(|| SourceError::Pipeline("Failed to find appsink".into()))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| SourceError::Pipeline("Failed to downcast to AppSink".into()))?;

        let sample_sink = sink.clone();
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                    match frame_from_sample(&sample) {
                        Ok(frame) => sample_sink.deliver(frame),
                        // A single bad sample is not worth tearing the stream down
                        Err(e) => debug!(error = %e, "Dropping undecodable sample"),
                    }
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        let bus = pipeline
            .bus()
            .ok_or_else(|| SourceError::Pipeline("No bus on pipeline".into()))?;

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(SourceError::Pipeline(format!(
                "Failed to start pipeline: {:?}",
                e
            )));
        }

        let stop_signal = Arc::new(AtomicBool::new(false));
        let watch_signal = Arc::clone(&stop_signal);
        let watch_sink = sink.clone();
        let preroll_timeout = settings.preroll_timeout();
        let bus_watch =
            BusWatch::spawn(move || watch_bus(bus, watch_sink, watch_signal, preroll_timeout))
                .map_err(|e| {
                    let _ = pipeline.set_state(gstreamer::State::Null);
                    SourceError::Pipeline(format!("Failed to spawn bus watch: {}", e))
                })?;

        Ok(Self {
            pipeline,
            appsink,
            sink,
            stop_signal,
            bus_watch: Some(bus_watch),
            stopped: false,
        })
    }
}

impl Decoder for PipelineDecoder {
    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.sink.deactivate();
        self.stop_signal.store(true, Ordering::SeqCst);

        // Release the callback's references before tearing down
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = ?e, "Failed to stop decoder pipeline");
        }

        if let Some(watch) = self.bus_watch.take() {
            watch.finish(decoder_consts::STOP_TIMEOUT);
        }
        info!("Decoder pipeline stopped");
    }

    fn name(&self) -> &'static str {
        "gstreamer"
    }
}

impl Drop for PipelineDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}

/// gst-launch description for a location
fn pipeline_description(location: &MediaLocation, sync: bool) -> String {
    let source = match location {
        MediaLocation::File(path) => format!(
            "filesrc location=\"{}\" ! decodebin",
            escape(&path.to_string_lossy())
        ),
        MediaLocation::Network(url) => format!("uridecodebin uri=\"{}\"", escape(url)),
    };
    format!(
        "{} ! videoconvert ! video/x-raw,format=RGBA ! \
         appsink name={} max-buffers=1 drop=true sync={}",
        source,
        decoder_consts::SINK_NAME,
        sync
    )
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Copy an RGBA sample into a packed frame
fn frame_from_sample(sample: &gstreamer::Sample) -> SourceResult<PackedFrame> {
    let caps = sample
        .caps()
        .ok_or_else(|| SourceError::Decode("No caps on sample".into()))?;
    let info = VideoInfo::from_caps(caps)
        .map_err(|e| SourceError::Decode(format!("Unusable caps: {}", e)))?;
    let buffer = sample
        .buffer()
        .ok_or_else(|| SourceError::Decode("No buffer in sample".into()))?;
    let map = buffer
        .map_readable()
        .map_err(|_| SourceError::Decode("Failed to map buffer".into()))?;

    let stride = info.stride().first().copied().unwrap_or(0).max(0) as u32;
    PackedFrame::with_stride(info.width(), info.height(), stride, map.as_slice())
}

/// Forward end-of-stream and errors until stopped or the stream ends
fn watch_bus(
    bus: gstreamer::Bus,
    sink: DecoderSink,
    stop_signal: Arc<AtomicBool>,
    preroll_timeout: Duration,
) {
    use gstreamer::MessageView;

    let started = Instant::now();
    let mut prerolled = false;

    while !stop_signal.load(Ordering::SeqCst) {
        if !prerolled && started.elapsed() > preroll_timeout {
            sink.error(format!(
                "Timed out after {} ms waiting for media",
                preroll_timeout.as_millis()
            ));
            // Reported once; keep watching in case the stream recovers
            prerolled = true;
        }

        let Some(msg) = bus.timed_pop(gstreamer::ClockTime::from_mseconds(
            decoder_consts::BUS_POLL_INTERVAL_MS,
        )) else {
            continue;
        };

        match msg.view() {
            MessageView::AsyncDone(_) => {
                if !prerolled {
                    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Decoder prerolled");
                }
                prerolled = true;
            }
            MessageView::Eos(_) => {
                sink.finished();
                break;
            }
            MessageView::Error(err) => {
                error!(
                    error = %err.error(),
                    debug = ?err.debug(),
                    "Decoder pipeline error"
                );
                sink.error(err.error().to_string());
                break;
            }
            MessageView::Warning(w) => {
                warn!(warning = %w.error(), "Decoder pipeline warning");
            }
            _ => {}
        }
    }
    debug!("Decoder bus watch exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_bus_watch_joins_after_exit() {
        let watch = BusWatch::spawn(|| {}).unwrap();
        assert_eq!(watch.finish(Duration::from_secs(5)), WatchExit::Joined);
    }

    #[test]
    fn test_finish_from_watch_thread_does_not_join() {
        let (handoff_tx, handoff_rx) = mpsc::channel::<BusWatch>();
        let (result_tx, result_rx) = mpsc::channel();
        let watch = BusWatch::spawn(move || {
            // Mirrors a player stopping the decoder from its end-of-stream event
            if let Ok(own) = handoff_rx.recv_timeout(Duration::from_secs(5)) {
                let _ = result_tx.send(own.finish(Duration::from_secs(5)));
            }
        })
        .unwrap();
        handoff_tx.send(watch).unwrap();
        assert_eq!(
            result_rx.recv_timeout(Duration::from_secs(5)),
            Ok(WatchExit::FromWatchThread)
        );
    }

    #[test]
    fn test_stuck_bus_watch_is_detached() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let watch = BusWatch::spawn(move || {
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
        })
        .unwrap();
        let started = Instant::now();
        assert_eq!(watch.finish(Duration::from_millis(50)), WatchExit::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
        let _ = release_tx.send(());
    }

    #[test]
    fn test_file_pipeline_description() {
        let location = MediaLocation::File(PathBuf::from("/tmp/clip \"a\".mp4"));
        let desc = pipeline_description(&location, true);
        assert!(desc.starts_with("filesrc location=\"/tmp/clip \\\"a\\\".mp4\" ! decodebin"));
        assert!(desc.contains("format=RGBA"));
        assert!(desc.contains("appsink name=packedsink max-buffers=1 drop=true sync=true"));
    }

    #[test]
    fn test_network_pipeline_description() {
        let location = MediaLocation::Network("https://example.com/a.mp4".into());
        let desc = pipeline_description(&location, false);
        assert!(desc.starts_with("uridecodebin uri=\"https://example.com/a.mp4\""));
        assert!(desc.ends_with("sync=false"));
    }
}
