//! Lockable, double-buffered pixel targets.
//!
//! Writers only reach a surface's back buffer through a [`SurfaceGuard`],
//! which locks on creation and unlocks when dropped. Presenting (back → front)
//! happens on unlock when something was marked dirty.

use tracing::trace;

use crate::error::SurfaceError;
use crate::types::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 4 bytes per pixel, blue first.
    Bgra32,
    /// 1 byte per pixel.
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra32 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Hooks a presentation layer implements. Call [`DisplaySurface::locked`]
/// rather than `lock`/`unlock` directly.
pub trait DisplaySurface {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn format(&self) -> PixelFormat;

    fn lock(&mut self);
    fn unlock(&mut self);
    /// Writable pixels; only meaningful between `lock` and `unlock`.
    fn back_buffer_mut(&mut self) -> &mut [u8];
    fn add_dirty_rect(&mut self, rect: Rect);

    /// Bytes per row of the back buffer.
    fn stride(&self) -> usize {
        self.width() * self.format().bytes_per_pixel()
    }

    /// Lock for writing until the guard goes out of scope.
    fn locked(&mut self) -> SurfaceGuard<'_, Self>
    where
        Self: Sized,
    {
        SurfaceGuard::acquire(self)
    }
}

/// Scoped write access. Unlocks exactly once, however the scope is left.
#[derive(Debug)]
pub struct SurfaceGuard<'a, S: DisplaySurface> {
    surface: &'a mut S,
}

impl<'a, S: DisplaySurface> SurfaceGuard<'a, S> {
    fn acquire(surface: &'a mut S) -> Self {
        surface.lock();
        Self { surface }
    }

    pub fn width(&self) -> usize {
        self.surface.width()
    }

    pub fn height(&self) -> usize {
        self.surface.height()
    }

    pub fn buffer_mut(&mut self) -> &mut [u8] {
        self.surface.back_buffer_mut()
    }

    pub fn mark_dirty(&mut self, rect: Rect) -> Result<(), SurfaceError> {
        self.check_rect(rect)?;
        self.surface.add_dirty_rect(rect);
        Ok(())
    }

    /// Copy `rect` worth of pixels from `src`, whose rows are `src_stride`
    /// bytes apart starting at byte `offset`.
    pub fn write_pixels(&mut self, rect: Rect, src: &[u8], src_stride: usize, offset: usize) -> Result<(), SurfaceError> {
        self.check_rect(rect)?;
        if rect.is_empty() {
            return Ok(());
        }
        let bpp = self.surface.format().bytes_per_pixel();
        let row_bytes = rect.width * bpp;
        if src_stride < row_bytes {
            return Err(SurfaceError::StrideTooSmall { stride: src_stride, row_bytes });
        }
        let needed = (rect.height - 1)
            .checked_mul(src_stride)
            .and_then(|n| n.checked_add(offset))
            .and_then(|n| n.checked_add(row_bytes))
            .unwrap_or(usize::MAX);
        if src.len() < needed {
            return Err(SurfaceError::SourceTooShort { needed, got: src.len() });
        }

        let dst_stride = self.surface.stride();
        let dst = self.surface.back_buffer_mut();
        for row in 0..rect.height {
            let s = offset + row * src_stride;
            let d = (rect.y + row) * dst_stride + rect.x * bpp;
            dst[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
        }
        Ok(())
    }

    fn check_rect(&self, rect: Rect) -> Result<(), SurfaceError> {
        let (w, h) = (self.surface.width(), self.surface.height());
        if rect.fits_within(w, h) {
            Ok(())
        } else {
            Err(SurfaceError::RectOutOfBounds {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                surface_width: w,
                surface_height: h,
            })
        }
    }
}

impl<S: DisplaySurface> Drop for SurfaceGuard<'_, S> {
    fn drop(&mut self) {
        self.surface.unlock();
    }
}

/// Lock bookkeeping, readable at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockCounts {
    pub acquired: u64,
    pub released: u64,
}

impl LockCounts {
    pub fn balanced(&self) -> bool {
        self.acquired == self.released
    }
}

/// In-memory surface: back buffer for writers, front buffer for the presenter.
#[derive(Debug, Clone)]
pub struct PixelSurface {
    width: usize,
    height: usize,
    format: PixelFormat,
    back: Vec<u8>,
    front: Vec<u8>,
    locked: bool,
    dirty: Option<Rect>,
    locks: LockCounts,
    presented: u64,
}

impl PixelSurface {
    pub fn new(width: usize, height: usize, format: PixelFormat) -> Self {
        let len = width * height * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            back: vec![0; len],
            front: vec![0; len],
            locked: false,
            dirty: None,
            locks: LockCounts::default(),
            presented: 0,
        }
    }

    /// Last presented pixels.
    pub fn front(&self) -> &[u8] {
        &self.front
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock_counts(&self) -> LockCounts {
        self.locks
    }

    /// How many unlocks carried dirty pixels to the front buffer.
    pub fn presented(&self) -> u64 {
        self.presented
    }

    fn present(&mut self, rect: Rect) {
        let bpp = self.format.bytes_per_pixel();
        let stride = self.width * bpp;
        let row_bytes = rect.width * bpp;
        for y in rect.y..rect.y + rect.height {
            let start = y * stride + rect.x * bpp;
            self.front[start..start + row_bytes].copy_from_slice(&self.back[start..start + row_bytes]);
        }
        self.presented += 1;
        trace!(?rect, presented = self.presented, "surface presented");
    }
}

impl DisplaySurface for PixelSurface {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn lock(&mut self) {
        debug_assert!(!self.locked, "surface locked twice");
        self.locked = true;
        self.locks.acquired += 1;
    }

    fn unlock(&mut self) {
        debug_assert!(self.locked, "surface unlocked while not locked");
        self.locked = false;
        self.locks.released += 1;
        if let Some(rect) = self.dirty.take() {
            self.present(rect);
        }
    }

    fn back_buffer_mut(&mut self) -> &mut [u8] {
        &mut self.back
    }

    fn add_dirty_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        self.dirty = Some(match self.dirty {
            Some(prev) => prev.union(&rect),
            None => rect,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_unlocks_on_drop() {
        let mut s = PixelSurface::new(2, 2, PixelFormat::Gray8);
        {
            let _g = s.locked();
        }
        assert!(!s.is_locked());
        assert_eq!(s.lock_counts(), LockCounts { acquired: 1, released: 1 });
    }

    #[test]
    fn guard_unlocks_on_early_return() {
        fn fails(s: &mut PixelSurface) -> Result<(), SurfaceError> {
            let mut g = s.locked();
            g.write_pixels(Rect::full(3, 3), &[0; 9], 3, 0)?;
            Ok(())
        }
        let mut s = PixelSurface::new(2, 2, PixelFormat::Gray8);
        assert!(matches!(fails(&mut s), Err(SurfaceError::RectOutOfBounds { .. })));
        assert!(s.lock_counts().balanced());
    }

    #[test]
    fn dirty_write_is_presented_on_unlock() {
        let mut s = PixelSurface::new(2, 2, PixelFormat::Gray8);
        {
            let mut g = s.locked();
            g.write_pixels(Rect::full(2, 2), &[1, 2, 3, 4], 2, 0).unwrap();
            g.mark_dirty(Rect::full(2, 2)).unwrap();
        }
        assert_eq!(s.front(), &[1, 2, 3, 4]);
        assert_eq!(s.presented(), 1);
    }

    #[test]
    fn clean_unlock_does_not_present() {
        let mut s = PixelSurface::new(2, 1, PixelFormat::Gray8);
        {
            let mut g = s.locked();
            g.buffer_mut().copy_from_slice(&[9, 9]);
        }
        assert_eq!(s.front(), &[0, 0]);
        assert_eq!(s.presented(), 0);
    }

    #[test]
    fn write_pixels_honours_stride_offset_and_rect() {
        let mut s = PixelSurface::new(3, 2, PixelFormat::Gray8);
        // Source is 4 bytes wide with one byte of header.
        let src = [0xFF, 1, 2, 0xEE, 0xEE, 3, 4, 0xEE];
        {
            let mut g = s.locked();
            g.write_pixels(Rect::new(1, 0, 2, 2), &src, 4, 1).unwrap();
            g.mark_dirty(Rect::new(1, 0, 2, 2)).unwrap();
        }
        assert_eq!(s.front(), &[0, 1, 2, 0, 3, 4]);
    }

    #[test]
    fn write_pixels_bgra_rows() {
        let mut s = PixelSurface::new(1, 2, PixelFormat::Bgra32);
        let src = [1, 2, 3, 4, 5, 6, 7, 8];
        let mut g = s.locked();
        g.write_pixels(Rect::full(1, 2), &src, 4, 0).unwrap();
        assert_eq!(g.buffer_mut(), &src);
    }

    #[test]
    fn write_pixels_rejects_short_source_and_stride() {
        let mut s = PixelSurface::new(2, 2, PixelFormat::Gray8);
        let mut g = s.locked();
        assert_eq!(
            g.write_pixels(Rect::full(2, 2), &[0; 3], 2, 0),
            Err(SurfaceError::SourceTooShort { needed: 4, got: 3 })
        );
        assert_eq!(
            g.write_pixels(Rect::full(2, 2), &[0; 4], 1, 0),
            Err(SurfaceError::StrideTooSmall { stride: 1, row_bytes: 2 })
        );
    }

    #[test]
    fn write_pixels_rejects_overflowing_layout() {
        let mut s = PixelSurface::new(2, 2, PixelFormat::Gray8);
        let mut g = s.locked();
        assert_eq!(
            g.write_pixels(Rect::full(2, 2), &[0; 4], 2, usize::MAX),
            Err(SurfaceError::SourceTooShort { needed: usize::MAX, got: 4 })
        );
        assert_eq!(
            g.write_pixels(Rect::full(2, 2), &[0; 4], usize::MAX, 0),
            Err(SurfaceError::SourceTooShort { needed: usize::MAX, got: 4 })
        );
        assert!(matches!(
            g.write_pixels(Rect::new(usize::MAX, 0, 2, 1), &[0; 4], 2, 0),
            Err(SurfaceError::RectOutOfBounds { .. })
        ));
        drop(g);
        assert_eq!(s.front(), &[0; 4]);
    }

    #[test]
    fn dirty_rects_accumulate() {
        let mut s = PixelSurface::new(4, 1, PixelFormat::Gray8);
        {
            let mut g = s.locked();
            g.buffer_mut().copy_from_slice(&[1, 2, 3, 4]);
            g.mark_dirty(Rect::new(0, 0, 1, 1)).unwrap();
            g.mark_dirty(Rect::new(2, 0, 1, 1)).unwrap();
        }
        // The union covers pixel 1 too.
        assert_eq!(s.front(), &[1, 2, 3, 0]);
    }
}
