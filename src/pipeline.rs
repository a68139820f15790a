//! The per-arrival tick: acquire → map → align → composite.
//!
//! `Idle → FrameAcquired → DepthMapped → Composited → Idle`. A tick that fails
//! to acquire either frame leaves every surface untouched. Frame handles and
//! surface locks are guards, so they are released on every path out of a
//! tick, including a panic caught at [`AlignmentPipeline::on_frame_arrived`].

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use tracing::{debug, warn};

use crate::align::{align_depth, DepthView, QuantizePolicy};
use crate::error::{FrameKind, SetupError, TickError};
use crate::mapper::CoordinateMapper;
use crate::source::{ColorFrame, DepthFrame, Snapshot};
use crate::stats::TickStats;
use crate::surface::{DisplaySurface, PixelFormat};
use crate::types::{AlignedDepthImage, CoordinateMap, Rect, COLOR_BYTES_PER_PIXEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorWrite {
    Written,
    /// Frame and surface disagree on size; only this tick's color is skipped.
    Skipped {
        frame: (usize, usize),
        surface: (usize, usize),
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Color pixels that received a reliable depth sample this tick.
    pub pixels_sampled: usize,
    pub color: ColorWrite,
}

#[derive(Debug, PartialEq)]
pub enum TickOutcome {
    Completed(TickReport),
    Dropped(TickError),
}

impl TickOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TickOutcome::Completed(_))
    }
}

/// Owns the reusable buffers and the injected mapper and surfaces.
#[derive(Debug)]
pub struct AlignmentPipeline<M, C, D> {
    mapper: M,
    color_surface: C,
    depth_surface: D,
    map: CoordinateMap,
    aligned: AlignedDepthImage,
    policy: QuantizePolicy,
    stats: TickStats,
}

impl<M, C, D> AlignmentPipeline<M, C, D>
where
    M: CoordinateMapper,
    C: DisplaySurface,
    D: DisplaySurface,
{
    /// The color surface fixes the alignment resolution; the depth surface must match it.
    pub fn new(mapper: M, color_surface: C, depth_surface: D, policy: QuantizePolicy) -> Result<Self, SetupError> {
        let (w, h) = (color_surface.width(), color_surface.height());
        if w == 0 || h == 0 {
            return Err(SetupError::EmptySurface);
        }
        if (depth_surface.width(), depth_surface.height()) != (w, h) {
            return Err(SetupError::SurfaceSize {
                color_width: w,
                color_height: h,
                depth_width: depth_surface.width(),
                depth_height: depth_surface.height(),
            });
        }
        if color_surface.format() != PixelFormat::Bgra32 {
            return Err(SetupError::SurfaceFormat {
                surface: FrameKind::Color,
                expected: PixelFormat::Bgra32,
                got: color_surface.format(),
            });
        }
        if depth_surface.format() != PixelFormat::Gray8 {
            return Err(SetupError::SurfaceFormat {
                surface: FrameKind::Depth,
                expected: PixelFormat::Gray8,
                got: depth_surface.format(),
            });
        }

        Ok(Self {
            mapper,
            color_surface,
            depth_surface,
            map: CoordinateMap::new(w, h),
            aligned: AlignedDepthImage::new(w, h),
            policy,
            stats: TickStats::default(),
        })
    }

    pub fn with_stats(mut self, stats: TickStats) -> Self {
        self.stats = stats;
        self
    }

    /// Handle one arrival. Never fails and never panics: anything that goes
    /// wrong becomes a dropped tick.
    pub fn on_frame_arrived<S: Snapshot>(&mut self, mut snapshot: S) -> TickOutcome {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_tick(&mut snapshot)));
        let outcome = match result {
            Ok(Ok(report)) => TickOutcome::Completed(report),
            Ok(Err(err)) => TickOutcome::Dropped(err),
            Err(payload) => TickOutcome::Dropped(TickError::Panicked(panic_message(payload.as_ref()))),
        };
        match &outcome {
            TickOutcome::Dropped(TickError::FrameUnavailable(kind)) => debug!("tick skipped: {kind} frame unavailable"),
            TickOutcome::Dropped(err) => warn!("tick dropped: {err}"),
            TickOutcome::Completed(_) => {}
        }
        self.stats.record(&outcome);
        outcome
    }

    fn run_tick<S: Snapshot>(&mut self, snapshot: &mut S) -> Result<TickReport, TickError> {
        let t0 = Instant::now();

        let depth = snapshot
            .acquire_depth()
            .ok_or(TickError::FrameUnavailable(FrameKind::Depth))?;
        let color = snapshot
            .acquire_color()
            .ok_or(TickError::FrameUnavailable(FrameKind::Color))?;
        // FrameAcquired

        let (dw, dh) = (depth.width(), depth.height());
        if depth.data().len() != dw * dh {
            return Err(TickError::MalformedDepth {
                width: dw,
                height: dh,
                len: depth.data().len(),
            });
        }
        self.mapper.map_color_to_depth(depth.data(), &mut self.map)?;
        // DepthMapped

        let view = DepthView {
            width: dw,
            height: dh,
            min_reliable_distance: depth.min_reliable_distance(),
            data: depth.data(),
        };
        let pixels_sampled = align_depth(&self.map, &view, self.policy, &mut self.aligned.data);
        self.flush_depth()?;
        // The aligned image is on the surface; the raw samples can go.
        drop(depth);

        let color_write = self.write_color(&color)?;
        drop(color);
        // Composited

        debug!("tick sampled depth for {pixels_sampled} px in {:?}", t0.elapsed());
        Ok(TickReport {
            pixels_sampled,
            color: color_write,
        })
    }

    fn flush_depth(&mut self) -> Result<(), TickError> {
        let (w, h) = (self.aligned.width, self.aligned.height);
        let full = Rect::full(w, h);
        let mut guard = self.depth_surface.locked();
        guard.write_pixels(full, &self.aligned.data, w, 0)?;
        guard.mark_dirty(full)?;
        Ok(())
    }

    fn write_color<F: ColorFrame>(&mut self, color: &F) -> Result<ColorWrite, TickError> {
        let frame = (color.width(), color.height());
        let surface = (self.color_surface.width(), self.color_surface.height());
        let expected_len = frame.0 * frame.1 * COLOR_BYTES_PER_PIXEL;
        if frame != surface || color.data().len() != expected_len {
            warn!(
                "color frame {}x{} ({} bytes) does not fit surface {}x{}, skipping color",
                frame.0,
                frame.1,
                color.data().len(),
                surface.0,
                surface.1
            );
            return Ok(ColorWrite::Skipped { frame, surface });
        }

        let full = Rect::full(surface.0, surface.1);
        let mut guard = self.color_surface.locked();
        guard.write_pixels(full, color.data(), surface.0 * COLOR_BYTES_PER_PIXEL, 0)?;
        guard.mark_dirty(full)?;
        Ok(ColorWrite::Written)
    }

    pub fn color_surface(&self) -> &C {
        &self.color_surface
    }

    pub fn depth_surface(&self) -> &D {
        &self.depth_surface
    }

    /// The most recent aligned image (all zero before the first completed tick).
    pub fn aligned(&self) -> &AlignedDepthImage {
        &self.aligned
    }

    pub fn coordinate_map(&self) -> &CoordinateMap {
        &self.map
    }

    pub fn policy(&self) -> QuantizePolicy {
        self.policy
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
