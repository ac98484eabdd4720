// SPDX-License-Identifier: GPL-3.0-only

//! Software surface
//!
//! Runs the fragment stage on the CPU: nearest-texel sampling of the packed
//! frame, the reference grading function, and the same blend equation the
//! GPU pipeline uses. The target holds premultiplied RGBA, like a
//! compositor-facing surface would.

use super::backend::{RenderBackend, SurfaceProvider};
use crate::constants::{packed, render as render_consts};
use crate::errors::{RenderError, RenderResult};
use crate::grading::{ColorGradeParams, GradeUniforms, cpu};
use crate::media::PackedFrame;
use crate::shaders::{ShaderProgram, UniformBlock, UniformLocation};
use image::{Rgba, RgbaImage};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::trace;

/// Called after every present with the target image and the present count
pub type PresentCallback = Arc<dyn Fn(&RgbaImage, u64) + Send + Sync>;

#[derive(Debug, Default)]
struct PresentedState {
    latest: Option<RgbaImage>,
    presents: u64,
}

/// Shared view of what a software surface has presented
#[derive(Debug, Clone, Default)]
pub struct PresentedFrames {
    inner: Arc<(Mutex<PresentedState>, Condvar)>,
}

impl PresentedFrames {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self, image: &RgbaImage) -> u64 {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        state.latest = Some(image.clone());
        state.presents += 1;
        cvar.notify_all();
        state.presents
    }

    /// Most recent presented image, premultiplied alpha
    pub fn latest(&self) -> Option<RgbaImage> {
        let (lock, _) = &*self.inner;
        lock.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest
            .clone()
    }

    /// Most recent presented image converted to straight alpha
    pub fn latest_straight(&self) -> Option<RgbaImage> {
        self.latest().map(|img| unpremultiply(&img))
    }

    pub fn presents(&self) -> u64 {
        let (lock, _) = &*self.inner;
        lock.lock().unwrap_or_else(PoisonError::into_inner).presents
    }

    /// Block until at least `count` presents happened or `timeout` elapsed
    pub fn wait_for_presents(&self, count: u64, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while state.presents < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = cvar
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// Premultiplied to straight alpha
pub fn unpremultiply(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        let a = px[3];
        if a == 0 {
            *px = Rgba([0, 0, 0, 0]);
            continue;
        }
        let af = cpu::from_unorm8(a);
        for c in 0..3 {
            px[c] = cpu::to_unorm8(cpu::from_unorm8(px[c]) / af);
        }
    }
    out
}

/// Native-surface stand-in that mints software backends
#[derive(Clone, Default)]
pub struct CpuSurface {
    frames: PresentedFrames,
    on_present: Option<PresentCallback>,
}

impl CpuSurface {
    pub fn new(frames: PresentedFrames) -> Self {
        Self {
            frames,
            on_present: None,
        }
    }

    pub fn with_present_callback(mut self, callback: PresentCallback) -> Self {
        self.on_present = Some(callback);
        self
    }

    pub fn frames(&self) -> &PresentedFrames {
        &self.frames
    }
}

impl SurfaceProvider for CpuSurface {
    fn create_backend(&self, width: u32, height: u32) -> RenderResult<Box<dyn RenderBackend>> {
        Ok(Box::new(CpuBackend::new(
            width,
            height,
            self.frames.clone(),
            self.on_present.clone(),
        )))
    }
}

pub struct CpuBackend {
    target: RgbaImage,
    texture: Option<PackedFrame>,
    slots: Option<[UniformLocation; 8]>,
    frames: PresentedFrames,
    on_present: Option<PresentCallback>,
}

impl CpuBackend {
    pub fn new(
        width: u32,
        height: u32,
        frames: PresentedFrames,
        on_present: Option<PresentCallback>,
    ) -> Self {
        Self {
            target: RgbaImage::new(
                width.max(render_consts::MIN_SURFACE_EXTENT),
                height.max(render_consts::MIN_SURFACE_EXTENT),
            ),
            texture: None,
            slots: None,
            frames,
            on_present,
        }
    }

    /// Read the grading snapshot back out of the uniform block
    fn read_params(&self, block: &UniformBlock) -> ColorGradeParams {
        let mut values = [0.0f32; 8];
        if let Some(slots) = &self.slots {
            for (value, slot) in values.iter_mut().zip(slots) {
                *value = block.get_f32(*slot).unwrap_or(0.0);
            }
        }
        let [hue, sat, value, shadow, gamma, in_low, mix_origin, tint_on] = values;
        ColorGradeParams {
            hue,
            sat,
            value,
            shadow,
            gamma,
            in_low,
            mix_origin,
            is_on: tint_on >= 0.5,
        }
    }
}

impl RenderBackend for CpuBackend {
    fn prepare(&mut self, program: &ShaderProgram) -> RenderResult<()> {
        if program.uniform_binding().is_none() {
            return Err(RenderError::Shader(crate::errors::ShaderError::Link(
                "fragment stage declares no uniform block".into(),
            )));
        }
        self.slots = Some(GradeUniforms::NAMES.map(|name| program.resolve_uniform(name)));
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(render_consts::MIN_SURFACE_EXTENT);
        let height = height.max(render_consts::MIN_SURFACE_EXTENT);
        if self.target.dimensions() != (width, height) {
            self.target = RgbaImage::new(width, height);
        }
    }

    fn upload(&mut self, frame: &PackedFrame) -> RenderResult<()> {
        if frame.width < packed::HALVES || frame.height == 0 {
            return Err(RenderError::Upload(format!(
                "packed frame {}x{} is too small",
                frame.width, frame.height
            )));
        }
        self.texture = Some(frame.clone());
        Ok(())
    }

    fn discard_texture(&mut self) {
        self.texture = None;
    }

    fn begin_frame(&mut self) -> RenderResult<()> {
        for px in self.target.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
        Ok(())
    }

    fn draw_composite(&mut self, uniforms: &UniformBlock) -> RenderResult<bool> {
        let Some(texture) = self.texture.as_ref() else {
            return Ok(false);
        };
        let params = self.read_params(uniforms);
        let (tw, th) = (texture.width as f32, texture.height as f32);
        let (w, h) = self.target.dimensions();

        for y in 0..h {
            // Quad maps the top of the surface to v = 0
            let v = (y as f32 + 0.5) / h as f32;
            let ty = (v * th) as u32;
            for x in 0..w {
                let u = (x as f32 + 0.5) / w as f32 * packed::COLOR_OFFSET_U;
                let alpha_texel = texture.texel((u * tw) as u32, ty);
                let color_texel = texture.texel(((u + packed::COLOR_OFFSET_U) * tw) as u32, ty);

                let a = cpu::from_unorm8(alpha_texel[0]);
                let c = [
                    cpu::from_unorm8(color_texel[0]),
                    cpu::from_unorm8(color_texel[1]),
                    cpu::from_unorm8(color_texel[2]),
                ];
                let src = cpu::grade(c, a, &params).map(|v| v.clamp(0.0, 1.0));

                let px = self.target.get_pixel_mut(x, y);
                let dst = px.0.map(cpu::from_unorm8);
                *px = Rgba(cpu::blend_over(dst, src).map(cpu::to_unorm8));
            }
        }
        Ok(true)
    }

    fn present(&mut self) -> RenderResult<()> {
        let count = self.frames.publish(&self.target);
        trace!(count, "Software surface presented");
        if let Some(callback) = &self.on_present {
            callback(&self.target, count);
        }
        Ok(())
    }

    fn release(&mut self) {
        self.texture = None;
        self.slots = None;
    }

    fn name(&self) -> &'static str {
        "software"
    }
}
