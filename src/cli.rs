// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Compositing a single packed image
//! - Rendering a packed video to PNG frames
//! - Inspecting the configuration

use alpha_player::config::Config;
use alpha_player::grading::ColorGradeParams;
use alpha_player::render::{
    CompositingRenderer, CpuBackend, CpuSurface, DrawOutcome, PresentCallback, PresentedFrames,
    unpremultiply,
};
use alpha_player::{AlphaPlayer, FrameSlot, PackedFrame, PlayerEvent};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Instant;

/// Grading overrides shared by the commands
pub struct GradeArgs {
    pub hue: Option<f32>,
    pub no_grade: bool,
    pub mix: Option<f32>,
}

impl GradeArgs {
    fn apply(&self, base: ColorGradeParams) -> ColorGradeParams {
        let mut params = base;
        if let Some(hue) = self.hue {
            params = params.with_hue(hue);
        }
        if let Some(mix) = self.mix {
            params = params.with_mix_origin(mix);
        }
        if self.no_grade {
            params = params.with_enabled(false);
        }
        params.sanitized()
    }
}

/// Composite one packed `[alpha | color]` image into an RGBA PNG
pub fn composite_image(
    input: &Path,
    output: &Path,
    grade: &GradeArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default().validated();

    let packed = image::open(input)?.to_rgba8();
    let (width, height) = packed.dimensions();
    let frame = PackedFrame::from_rgba(width, height, packed.into_raw())?;
    let logical_width = frame.logical_width();
    println!(
        "Packed frame: {}x{} -> {}x{}",
        width, height, logical_width, height
    );

    let slot = FrameSlot::new();
    slot.deliver(frame);

    let frames = PresentedFrames::new();
    let backend = CpuBackend::new(logical_width, height, frames.clone(), None);
    let mut renderer = CompositingRenderer::new(Box::new(backend), Arc::new(slot), 0);
    renderer.on_surface_created()?;
    renderer.set_grade_params(Arc::new(grade.apply(config.grading)));
    renderer.set_clear(false);

    let outcome = renderer.draw_frame();
    if !matches!(outcome, DrawOutcome::Composited { .. }) {
        return Err(format!("Nothing was composited ({:?})", outcome).into());
    }
    renderer.present()?;
    renderer.on_surface_destroyed();

    let image = frames
        .latest_straight()
        .ok_or("Software surface presented nothing")?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    image.save(output)?;

    println!("Saved: {}", output.display());
    Ok(())
}

/// Decode a packed video and write every `every`-th presented frame as PNG
pub fn render_video(
    input: &str,
    output_dir: PathBuf,
    every: u64,
    grade: &GradeArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default().validated();
    let every = every.max(1);
    std::fs::create_dir_all(&output_dir)?;

    let (tx, rx) = mpsc::channel();
    let mut player = AlphaPlayer::new(&config, Arc::new(move |event: PlayerEvent| {
        let _ = tx.send(event);
    }));
    player.set_grade_params(grade.apply(config.grading));

    let frame_dir = output_dir.clone();
    let on_present: PresentCallback = Arc::new(move |image: &RgbaImage, index: u64| {
        if index % every != 0 {
            return;
        }
        let path = frame_dir.join(format!("frame_{:06}.png", index));
        if let Err(e) = unpremultiply(image).save(&path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to save frame");
        }
    });
    let surface = CpuSurface::new(PresentedFrames::new()).with_present_callback(on_present);
    let frames = surface.frames().clone();

    player.attach_surface(Arc::new(surface), 1, 1)?;
    println!("Rendering {} to {}", input, output_dir.display());
    let start = Instant::now();
    player.play(input)?;

    let mut failure = None;
    for event in rx.iter() {
        match event {
            PlayerEvent::VideoSize { width, height } => {
                println!("Video size: {}x{}", width, height);
                player.resize(width, height);
            }
            PlayerEvent::FirstFrameVisible => println!("First frame visible"),
            PlayerEvent::PlayFinished => break,
            PlayerEvent::Error(message) => {
                failure = Some(message);
                break;
            }
        }
    }

    player.dispose();
    let stats = player.stats();
    println!();
    println!(
        "Presented {} frames ({} draws) in {:.2}s",
        frames.presents(),
        stats.draws,
        start.elapsed().as_secs_f64()
    );

    match failure {
        Some(message) => Err(message.into()),
        None => Ok(()),
    }
}

/// Print the effective configuration, or where it lives
pub fn show_config(path_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path_only {
        match Config::default_path() {
            Some(path) => println!("{}", path.display()),
            None => return Err("No config directory on this platform".into()),
        }
        return Ok(());
    }

    let config = Config::load()?.validated();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
