// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for render thread scheduling on the software surface

use alpha_player::render::{
    CpuSurface, DrawOutcome, PresentCallback, PresentedFrames, RenderEvent, RenderOptions,
    RenderThread, StopOutcome,
};
use alpha_player::{FrameSlot, PackedFrame};
use image::RgbaImage;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);
const SETTLE: Duration = Duration::from_millis(200);

fn options(warmup_frames: u32) -> RenderOptions {
    RenderOptions {
        warmup_frames,
        ..RenderOptions::default()
    }
}

/// Opaque white packed frame, `width` logical pixels wide
fn white_frame(width: u32, height: u32) -> PackedFrame {
    let packed_width = width * 2;
    let mut data = Vec::with_capacity((packed_width * height * 4) as usize);
    for _ in 0..height {
        for x in 0..packed_width {
            if x < width {
                data.extend_from_slice(&[255, 0, 0, 255]);
            } else {
                data.extend_from_slice(&[255, 255, 255, 255]);
            }
        }
    }
    PackedFrame::from_rgba(packed_width, height, data).unwrap()
}

fn is_transparent(image: &RgbaImage) -> bool {
    image.pixels().all(|p| p.0 == [0, 0, 0, 0])
}

#[test]
fn test_notifications_coalesce_into_one_draw() {
    let slot = FrameSlot::new();
    slot.deliver(white_frame(2, 2));

    // Hold the render thread inside its first present
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);
    let on_present: PresentCallback = Arc::new(move |_: &RgbaImage, count: u64| {
        if count == 1 {
            let _ = entered_tx.lock().unwrap().send(());
            let _ = release_rx.lock().unwrap().recv_timeout(WAIT);
        }
    });
    let frames = PresentedFrames::new();
    let surface = CpuSurface::new(frames.clone()).with_present_callback(on_present);

    let mut thread = RenderThread::new(Arc::new(slot.clone()), options(0));
    thread.set_clear(false);
    thread.start(Arc::new(surface), 2, 2).unwrap();

    entered_rx.recv_timeout(WAIT).expect("first present");
    for _ in 0..10 {
        slot.deliver(white_frame(2, 2));
        thread.notify_new_frame();
    }
    release_tx.send(()).unwrap();

    assert!(frames.wait_for_presents(2, WAIT));
    assert!(
        !frames.wait_for_presents(3, SETTLE),
        "ten notifications during one draw must collapse into one redraw"
    );
    let stats = thread.stats();
    assert_eq!(stats.draws, 2);
    assert_eq!(stats.presents, 2);
    assert_eq!(thread.stop(), StopOutcome::Stopped);
}

#[test]
fn test_idle_thread_does_not_redraw() {
    let frames = PresentedFrames::new();
    let mut thread = RenderThread::new(Arc::new(FrameSlot::new()), options(0));
    thread
        .start(Arc::new(CpuSurface::new(frames.clone())), 2, 2)
        .unwrap();

    assert!(frames.wait_for_presents(1, WAIT));
    assert!(!frames.wait_for_presents(2, SETTLE));
    assert_eq!(thread.stats().draws, 1);
    thread.stop();
}

#[test]
fn test_clear_hides_pending_frame() {
    let slot = FrameSlot::new();
    slot.deliver(white_frame(3, 3));
    let frames = PresentedFrames::new();
    let mut thread = RenderThread::new(Arc::new(slot.clone()), options(0));
    thread.set_clear(false);
    thread
        .start(Arc::new(CpuSurface::new(frames.clone())), 3, 3)
        .unwrap();

    assert!(frames.wait_for_presents(1, WAIT));
    let shown = frames.latest().unwrap();
    assert!(!is_transparent(&shown), "first draw should composite");

    slot.deliver(white_frame(3, 3));
    thread.set_clear(true);
    assert!(frames.wait_for_presents(2, WAIT));

    let cleared = frames.latest().unwrap();
    assert!(is_transparent(&cleared), "clear must win over a pending frame");
    thread.stop();
}

#[test]
fn test_resize_while_clear_redraws_transparent() {
    let frames = PresentedFrames::new();
    let mut thread = RenderThread::new(Arc::new(FrameSlot::new()), options(0));
    thread
        .start(Arc::new(CpuSurface::new(frames.clone())), 2, 2)
        .unwrap();
    assert!(frames.wait_for_presents(1, WAIT));

    thread.update_size(6, 3);
    assert!(frames.wait_for_presents(2, WAIT));

    let image = frames.latest().unwrap();
    assert_eq!(image.dimensions(), (6, 3));
    assert!(is_transparent(&image));
    thread.stop();
}

#[test]
fn test_warmup_suppresses_first_draws() {
    let slot = FrameSlot::new();
    slot.deliver(white_frame(2, 2));
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let frames = PresentedFrames::new();
    let mut thread = RenderThread::new(Arc::new(slot.clone()), options(3)).with_events(Arc::new(
        move |event: RenderEvent| {
            let _ = tx.lock().unwrap().send(event);
        },
    ));
    thread.set_clear(false);
    thread
        .start(Arc::new(CpuSurface::new(frames.clone())), 2, 2)
        .unwrap();

    for count in 1..=3 {
        if count > 1 {
            thread.notify_new_frame();
        }
        assert!(frames.wait_for_presents(count, WAIT));
        assert!(
            is_transparent(&frames.latest().unwrap()),
            "draw {} is inside the warm-up window",
            count
        );
    }
    assert!(rx.try_recv().is_err(), "no first frame during warm-up");

    thread.notify_new_frame();
    assert!(frames.wait_for_presents(4, WAIT));
    assert!(!is_transparent(&frames.latest().unwrap()));
    assert!(matches!(
        rx.recv_timeout(WAIT),
        Ok(RenderEvent::FirstFrame)
    ));

    thread.stop();
    assert_eq!(
        thread.stats().last_outcome,
        Some(DrawOutcome::Composited { first: true })
    );
}

#[test]
fn test_clear_lifted_during_draw_still_restarts_warmup() {
    let slot = FrameSlot::new();
    slot.deliver(white_frame(2, 2));

    // Hold the render thread inside the present of its first composite
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);
    let on_present: PresentCallback = Arc::new(move |_: &RgbaImage, count: u64| {
        if count == 2 {
            let _ = entered_tx.lock().unwrap().send(());
            let _ = release_rx.lock().unwrap().recv_timeout(WAIT);
        }
    });
    let frames = PresentedFrames::new();
    let surface = CpuSurface::new(frames.clone()).with_present_callback(on_present);

    let mut thread = RenderThread::new(Arc::new(slot.clone()), options(1));
    thread.set_clear(false);
    thread.start(Arc::new(surface), 2, 2).unwrap();
    assert!(frames.wait_for_presents(1, WAIT));
    thread.notify_new_frame();
    entered_rx.recv_timeout(WAIT).expect("composite present");

    // Both flips land while the loop is busy; only the epoch records the clear
    thread.set_clear(true);
    thread.set_clear(false);
    release_tx.send(()).unwrap();

    assert!(frames.wait_for_presents(3, WAIT));
    assert!(!frames.wait_for_presents(4, SETTLE));
    assert!(is_transparent(&frames.latest().unwrap()));
    thread.stop();
    assert_eq!(thread.stats().last_outcome, Some(DrawOutcome::WarmingUp(1)));
}

#[test]
fn test_clear_drops_previous_stream_texture() {
    let slot = FrameSlot::new();
    slot.deliver(white_frame(2, 2));
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let frames = PresentedFrames::new();
    let mut thread = RenderThread::new(Arc::new(slot.clone()), options(0)).with_events(Arc::new(
        move |event: RenderEvent| {
            let _ = tx.lock().unwrap().send(event);
        },
    ));
    thread.set_clear(false);
    thread
        .start(Arc::new(CpuSurface::new(frames.clone())), 2, 2)
        .unwrap();
    assert!(matches!(rx.recv_timeout(WAIT), Ok(RenderEvent::FirstFrame)));
    assert!(frames.wait_for_presents(1, WAIT));

    thread.set_clear(true);
    assert!(frames.wait_for_presents(2, WAIT));
    slot.reopen();
    thread.set_clear(false);
    thread.notify_new_frame();
    assert!(frames.wait_for_presents(3, WAIT));

    assert!(is_transparent(&frames.latest().unwrap()));
    assert!(
        rx.recv_timeout(SETTLE).is_err(),
        "no first frame without a new delivery"
    );
    thread.stop();
    assert_eq!(thread.stats().last_outcome, Some(DrawOutcome::NoFrame));
}

#[test]
fn test_stop_twice_and_before_start() {
    let frames = PresentedFrames::new();
    let mut thread = RenderThread::new(Arc::new(FrameSlot::new()), options(0));
    assert_eq!(thread.stop(), StopOutcome::NotRunning);

    thread
        .start(Arc::new(CpuSurface::new(frames.clone())), 2, 2)
        .unwrap();
    // Stop may race the very first draw
    assert_eq!(thread.stop(), StopOutcome::Stopped);
    assert_eq!(thread.stop(), StopOutcome::NotRunning);
    assert!(!thread.is_running());
}

#[test]
fn test_stop_from_first_frame_callback() {
    let holder: Arc<Mutex<Option<RenderThread>>> = Arc::new(Mutex::new(None));
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let inner = Arc::clone(&holder);

    let slot = FrameSlot::new();
    slot.deliver(white_frame(1, 1));
    let thread = RenderThread::new(Arc::new(slot), options(0)).with_events(Arc::new(
        move |event: RenderEvent| {
            if let RenderEvent::FirstFrame = event {
                let outcome = inner.lock().unwrap().as_mut().map(|t| t.stop());
                let _ = tx.lock().unwrap().send(outcome);
            }
        },
    ));
    thread.set_clear(false);

    {
        let mut guard = holder.lock().unwrap();
        let thread = guard.insert(thread);
        thread
            .start(Arc::new(CpuSurface::new(PresentedFrames::new())), 1, 1)
            .unwrap();
    }

    let outcome = rx.recv_timeout(WAIT).expect("first frame callback");
    assert_eq!(outcome, Some(StopOutcome::FromRenderThread));

    let mut guard = holder.lock().unwrap();
    let thread = guard.as_mut().unwrap();
    assert_eq!(thread.stop(), StopOutcome::NotRunning);
    // Break the callback -> holder cycle
    let _ = guard.take();
}
