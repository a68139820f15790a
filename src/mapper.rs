//! Color-space → depth-space coordinate mapping.
//!
//! Mappers fill a [`CoordinateMap`] sized to the color resolution. Every entry
//! is written on every call: either a sub-pixel depth coordinate or
//! [`DepthSpacePoint::SENTINEL`].

use nalgebra::Vector3;

use crate::error::MapError;
use crate::types::{CoordinateMap, DepthSpacePoint, Extrinsics, Intrinsics};

/// Millimeters per meter; depth samples are millimeters, the calibration is metric.
const MM_PER_M: f32 = 1000.0;

pub trait CoordinateMapper {
    /// Fill `out` with one depth-space coordinate per color pixel.
    fn map_color_to_depth(&mut self, depth: &[u16], out: &mut CoordinateMap) -> Result<(), MapError>;
}

impl<M: CoordinateMapper + ?Sized> CoordinateMapper for Box<M> {
    fn map_color_to_depth(&mut self, depth: &[u16], out: &mut CoordinateMap) -> Result<(), MapError> {
        (**self).map_color_to_depth(depth, out)
    }
}

fn check_sizes(
    depth: &[u16],
    depth_size: (usize, usize),
    out: &CoordinateMap,
    color_size: (usize, usize),
) -> Result<(), MapError> {
    let expected = depth_size.0 * depth_size.1;
    if depth.len() != expected {
        return Err(MapError::DepthBufferSize { expected, got: depth.len() });
    }
    let expected = color_size.0 * color_size.1;
    if out.len() != expected || out.width() != color_size.0 {
        return Err(MapError::MapSize { expected, got: out.len() });
    }
    Ok(())
}

/// For streams the sensor already registered into one optical frame: the two
/// images differ only in resolution, so color pixel centers scale onto depth.
#[derive(Debug, Clone)]
pub struct RegisteredMapper {
    depth_width: usize,
    depth_height: usize,
    color_width: usize,
    color_height: usize,
}

impl RegisteredMapper {
    pub fn new(depth_width: usize, depth_height: usize, color_width: usize, color_height: usize) -> Self {
        Self {
            depth_width,
            depth_height,
            color_width,
            color_height,
        }
    }
}

impl CoordinateMapper for RegisteredMapper {
    fn map_color_to_depth(&mut self, depth: &[u16], out: &mut CoordinateMap) -> Result<(), MapError> {
        check_sizes(
            depth,
            (self.depth_width, self.depth_height),
            out,
            (self.color_width, self.color_height),
        )?;

        let sx = self.depth_width as f32 / self.color_width as f32;
        let sy = self.depth_height as f32 / self.color_height as f32;
        let width = self.color_width;
        for (i, p) in out.points_mut().iter_mut().enumerate() {
            let (u, v) = (i % width, i / width);
            // Center to center, then back to the depth grid's integer-at-center convention.
            *p = DepthSpacePoint::new((u as f32 + 0.5) * sx - 0.5, (v as f32 + 0.5) * sy - 0.5);
        }
        Ok(())
    }
}

/// Calibrated two-camera rig. Each valid depth pixel is de-projected,
/// moved into the color camera frame and projected; when several land on one
/// color pixel the nearest wins. Color pixels nobody hits stay unmapped.
#[derive(Debug, Clone)]
pub struct PinholeMapper {
    depth_intr: Intrinsics,
    color_intr: Intrinsics,
    extr: Extrinsics,
    // Per-color-pixel z of the current winner, reused across calls.
    zbuf: Vec<f32>,
}

impl PinholeMapper {
    pub fn new(depth_intr: Intrinsics, color_intr: Intrinsics, extr: Extrinsics) -> Self {
        Self {
            depth_intr,
            color_intr,
            extr,
            zbuf: vec![f32::INFINITY; color_intr.width * color_intr.height],
        }
    }
}

impl CoordinateMapper for PinholeMapper {
    fn map_color_to_depth(&mut self, depth: &[u16], out: &mut CoordinateMap) -> Result<(), MapError> {
        let d_intr = self.depth_intr;
        let c_intr = self.color_intr;
        check_sizes(depth, (d_intr.width, d_intr.height), out, (c_intr.width, c_intr.height))?;

        let points = out.points_mut();
        points.fill(DepthSpacePoint::SENTINEL);
        self.zbuf.fill(f32::INFINITY);

        for v in 0..d_intr.height {
            for u in 0..d_intr.width {
                let raw = depth[v * d_intr.width + u];
                if raw == 0 {
                    continue;
                }
                let d = raw as f32 / MM_PER_M;

                // 1. de-project
                let x = (u as f32 - d_intr.ppx) * d / d_intr.fx;
                let y = (v as f32 - d_intr.ppy) * d / d_intr.fy;

                // 2. transform
                let p_c = self.extr.rotation * Vector3::new(x, y, d) + self.extr.translation;
                if p_c.z <= 0.0 {
                    continue;
                }

                // 3. project
                let u_c = ((p_c.x / p_c.z) * c_intr.fx + c_intr.ppx).round();
                let v_c = ((p_c.y / p_c.z) * c_intr.fy + c_intr.ppy).round();
                if !(u_c >= 0.0 && v_c >= 0.0 && u_c < c_intr.width as f32 && v_c < c_intr.height as f32) {
                    continue;
                }

                let idx = v_c as usize * c_intr.width + u_c as usize;
                if p_c.z < self.zbuf[idx] {
                    self.zbuf[idx] = p_c.z;
                    points[idx] = DepthSpacePoint::new(u as f32, v as f32);
                }
            }
        }
        Ok(())
    }
}
