// SPDX-License-Identifier: GPL-3.0-only
//! Render thread
//!
//! One thread per active surface owns the backend exclusively. Producers
//! (decoder callbacks, resize handlers, the control surface) only touch a
//! small shared signal: a dirty flag, the latest size, the grading snapshot
//! and the clear request, all behind one mutex/condvar pair. The loop sleeps
//! on the condvar while nothing is dirty, so any number of notifications
//! before it wakes collapse into a single draw.
//!
//! Each `start` opens a new generation. A loop keeps running only while its
//! generation is the live one, so a loop abandoned by a timed-out `stop`
//! exits on its own and can never draw for a later surface.

use super::backend::SurfaceProvider;
use super::renderer::{CompositingRenderer, DrawOutcome};
use crate::config::RenderSettings;
use crate::constants::render as render_consts;
use crate::errors::{RenderError, RenderResult};
use crate::grading::ColorGradeParams;
use crate::media::FrameSource;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Render thread tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Draws suppressed after each clear
    pub warmup_frames: u32,
    /// Bound on how long `stop` waits for teardown
    pub stop_timeout: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            warmup_frames: render_consts::DEFAULT_WARMUP_FRAMES,
            stop_timeout: render_consts::DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl From<&RenderSettings> for RenderOptions {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            warmup_frames: settings.warmup_frames,
            stop_timeout: settings.stop_timeout(),
        }
    }
}

/// Notifications from the render thread, delivered without any lock held
#[derive(Debug, Clone)]
pub enum RenderEvent {
    /// First composited frame since the last clear has been presented
    FirstFrame,
    /// Backend or shader setup failed; the surface stays unusable until the
    /// next start
    SurfaceFailed(RenderError),
}

pub type RenderEventCallback = Arc<dyn Fn(RenderEvent) + Send + Sync>;

/// How a `stop` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running
    NotRunning,
    /// Thread tore down and was joined
    Stopped,
    /// Thread did not finish in time and was left to clean up on its own
    TimedOut,
    /// Called from the render thread itself; retired without joining
    FromRenderThread,
}

/// Counters for diagnostics and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub draws: u64,
    pub presents: u64,
    pub last_outcome: Option<DrawOutcome>,
}

struct Signal {
    dirty: bool,
    width: u32,
    height: u32,
    params: Arc<ColorGradeParams>,
    clear: bool,
    clear_epoch: u64,
    live: Option<u64>,
    next_generation: u64,
    stats: RenderStats,
}

struct Shared {
    signal: Mutex<Signal>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Signal> {
        self.signal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_dirty(&self) {
        self.lock().dirty = true;
        self.wake.notify_all();
    }
}

/// Cheap handle for decoder callbacks; `notify` never blocks on rendering
#[derive(Clone)]
pub struct FrameNotifier {
    shared: Arc<Shared>,
}

impl FrameNotifier {
    /// A new frame is available
    pub fn notify(&self) {
        self.shared.mark_dirty();
    }
}

struct Worker {
    handle: JoinHandle<()>,
    exited: mpsc::Receiver<()>,
    thread_id: ThreadId,
    generation: u64,
}

/// Signals the owner when the render thread body ends, panics included
struct ExitGuard(mpsc::Sender<()>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

/// What one wake of the loop works from
struct Snapshot {
    size: (u32, u32),
    params: Arc<ColorGradeParams>,
    clear: bool,
    clear_epoch: u64,
}

pub struct RenderThread {
    shared: Arc<Shared>,
    source: Arc<dyn FrameSource>,
    options: RenderOptions,
    events: Option<RenderEventCallback>,
    worker: Option<Worker>,
}

impl RenderThread {
    pub fn new(source: Arc<dyn FrameSource>, options: RenderOptions) -> Self {
        let signal = Signal {
            dirty: false,
            width: render_consts::MIN_SURFACE_EXTENT,
            height: render_consts::MIN_SURFACE_EXTENT,
            params: Arc::new(ColorGradeParams::default()),
            clear: true,
            clear_epoch: 0,
            live: None,
            next_generation: 1,
            stats: RenderStats::default(),
        };
        Self {
            shared: Arc::new(Shared {
                signal: Mutex::new(signal),
                wake: Condvar::new(),
            }),
            source,
            options,
            events: None,
            worker: None,
        }
    }

    pub fn with_events(mut self, events: RenderEventCallback) -> Self {
        self.events = Some(events);
        self
    }

    /// Spawn a render loop for a fresh backend from `surface`
    ///
    /// Any loop from a previous start is stopped first.
    pub fn start(
        &mut self,
        surface: Arc<dyn SurfaceProvider>,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        if self.worker.is_some() {
            debug!("Render thread already running, stopping it before restart");
            self.stop();
        }

        let generation = {
            let mut s = self.shared.lock();
            let generation = s.next_generation;
            s.next_generation += 1;
            s.live = Some(generation);
            s.width = width;
            s.height = height;
            // First wake paints the transparent surface
            s.dirty = true;
            generation
        };

        let (exit_tx, exit_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let source = Arc::clone(&self.source);
        let events = self.events.clone();
        let options = self.options;

        info!(generation, width, height, "Starting render thread");

        let spawned = thread::Builder::new()
            .name(render_consts::THREAD_NAME.to_string())
            .spawn(move || {
                let _guard = ExitGuard(exit_tx);
                run_loop(
                    shared, generation, surface, source, options, events, width, height,
                );
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.lock().live = None;
                return Err(RenderError::SurfaceCreation(format!(
                    "failed to spawn render thread: {}",
                    e
                )));
            }
        };

        self.worker = Some(Worker {
            thread_id: handle.thread().id(),
            handle,
            exited: exit_rx,
            generation,
        });
        Ok(())
    }

    /// Handle for producers on other threads
    pub fn notifier(&self) -> FrameNotifier {
        FrameNotifier {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn notify_new_frame(&self) {
        self.shared.mark_dirty();
    }

    /// Store the viewport size and force a redraw
    pub fn update_size(&self, width: u32, height: u32) {
        {
            let mut s = self.shared.lock();
            s.width = width;
            s.height = height;
            s.dirty = true;
        }
        self.shared.wake.notify_all();
    }

    /// Enter or leave clear mode; entering also requests one draw so the
    /// transparent state shows without waiting for the decoder
    pub fn set_clear(&self, clear: bool) {
        {
            let mut s = self.shared.lock();
            s.clear = clear;
            if clear {
                s.clear_epoch += 1;
                s.dirty = true;
            }
        }
        if clear {
            self.shared.wake.notify_all();
        }
    }

    /// Replace the grading snapshot; picked up by the next draw
    pub fn set_grade_params(&self, params: ColorGradeParams) {
        self.shared.lock().params = Arc::new(params);
    }

    pub fn grade_params(&self) -> ColorGradeParams {
        *self.shared.lock().params
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|w| !w.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn stats(&self) -> RenderStats {
        self.shared.lock().stats
    }

    /// Retire the current loop and wait, bounded, for it to release the surface
    pub fn stop(&mut self) -> StopOutcome {
        {
            let mut s = self.shared.lock();
            s.live = None;
        }
        self.shared.wake.notify_all();

        let Some(worker) = self.worker.take() else {
            return StopOutcome::NotRunning;
        };

        if thread::current().id() == worker.thread_id {
            debug!(
                generation = worker.generation,
                "Stop requested from the render thread, not joining"
            );
            return StopOutcome::FromRenderThread;
        }

        match worker.exited.recv_timeout(self.options.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    warn!(generation = worker.generation, "Render thread panicked");
                } else {
                    debug!(generation = worker.generation, "Render thread joined");
                }
                StopOutcome::Stopped
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    generation = worker.generation,
                    timeout_ms = self.options.stop_timeout.as_millis() as u64,
                    "Render thread did not stop in time, leaving it to finish teardown"
                );
                StopOutcome::TimedOut
            }
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        if self.worker.is_some() {
            debug!("RenderThread dropped, stopping loop");
            self.stop();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_loop(
    shared: Arc<Shared>,
    generation: u64,
    surface: Arc<dyn SurfaceProvider>,
    source: Arc<dyn FrameSource>,
    options: RenderOptions,
    events: Option<RenderEventCallback>,
    width: u32,
    height: u32,
) {
    debug!(generation, "Render thread started, creating surface backend");

    let emit = |event: RenderEvent| {
        if let Some(callback) = &events {
            callback(event);
        }
    };

    let backend = match surface.create_backend(width, height) {
        Ok(backend) => backend,
        Err(e) => {
            error!(generation, error = %e, "Failed to create surface backend");
            emit(RenderEvent::SurfaceFailed(e));
            return;
        }
    };

    let mut renderer = CompositingRenderer::new(backend, source, options.warmup_frames);
    if let Err(e) = renderer.on_surface_created() {
        emit(RenderEvent::SurfaceFailed(e));
        return;
    }

    let mut size = (width, height);
    let mut seen_epoch = None;

    loop {
        let snapshot = {
            let mut s = shared.lock();
            while s.live == Some(generation) && !s.dirty {
                s = shared.wake.wait(s).unwrap_or_else(PoisonError::into_inner);
            }
            if s.live != Some(generation) {
                break;
            }
            s.dirty = false;
            Snapshot {
                size: (s.width, s.height),
                params: Arc::clone(&s.params),
                clear: s.clear,
                clear_epoch: s.clear_epoch,
            }
        };

        // A clear request since the last wake resets the gate even if it
        // was already lifted again
        if seen_epoch != Some(snapshot.clear_epoch) {
            renderer.set_clear(true);
            seen_epoch = Some(snapshot.clear_epoch);
        }
        if !snapshot.clear {
            renderer.set_clear(false);
        }
        if snapshot.size != size {
            renderer.resize(snapshot.size.0, snapshot.size.1);
            size = snapshot.size;
        }
        if !Arc::ptr_eq(renderer.grade_params(), &snapshot.params) {
            renderer.set_grade_params(snapshot.params);
        }

        let outcome = renderer.draw_frame();
        let presented = outcome.needs_present()
            && match renderer.present() {
                Ok(()) => true,
                Err(e) => {
                    debug!(error = %e, "Present failed");
                    false
                }
            };
        trace!(?outcome, presented, "Frame drawn");

        {
            let mut s = shared.lock();
            s.stats.draws += 1;
            if presented {
                s.stats.presents += 1;
            }
            s.stats.last_outcome = Some(outcome);
        }

        if presented && outcome == (DrawOutcome::Composited { first: true }) {
            emit(RenderEvent::FirstFrame);
        }
    }

    renderer.on_surface_destroyed();
    info!(generation, "Render thread exiting");
}
