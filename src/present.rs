//! Turns the two front buffers into one window image: color left, depth right.

use itertools::Itertools;

use crate::error::SurfaceError;

/// Window size that fits two `src_w`x`src_h` images side by side in `window_width`.
pub fn window_size(window_width: usize, src_w: usize, src_h: usize) -> (usize, usize) {
    let half = (window_width / 2).max(1);
    let height = (half * src_h / src_w.max(1)).max(1);
    (half * 2, height)
}

/// Nearest-neighbour scale `color` (BGRA) and `depth` (Gray8) into `out` as 0x00RRGGBB.
pub fn compose_side_by_side(
    color: &[u8],
    depth: &[u8],
    src_w: usize,
    src_h: usize,
    out: &mut [u32],
    out_w: usize,
    out_h: usize,
) -> Result<(), SurfaceError> {
    let pixels = src_w * src_h;
    let color: &[[u8; 4]] = bytemuck::try_cast_slice(color).map_err(|_| SurfaceError::SourceTooShort {
        needed: pixels * 4,
        got: color.len(),
    })?;
    if color.len() < pixels {
        return Err(SurfaceError::SourceTooShort {
            needed: pixels * 4,
            got: color.len() * 4,
        });
    }
    if depth.len() < pixels {
        return Err(SurfaceError::SourceTooShort {
            needed: pixels,
            got: depth.len(),
        });
    }
    if out.len() < out_w * out_h {
        return Err(SurfaceError::SourceTooShort {
            needed: out_w * out_h,
            got: out.len(),
        });
    }

    let half = out_w / 2;
    for ((y, x), px) in (0..out_h).cartesian_product(0..out_w).zip(out.iter_mut()) {
        let (hx, is_depth) = if x < half { (x, false) } else { (x - half, true) };
        if half == 0 || hx >= half {
            *px = 0;
            continue;
        }
        let i = (y * src_h / out_h) * src_w + hx * src_w / half;
        *px = if is_depth {
            let g = depth[i] as u32;
            (g << 16) | (g << 8) | g
        } else {
            let [b, g, r, _] = color[i];
            ((r as u32) << 16) | ((g as u32) << 8) | b as u32
        };
    }
    Ok(())
}
