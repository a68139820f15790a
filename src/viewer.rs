//! Window that shows the color and aligned depth surfaces side by side.

use anyhow::anyhow;
use minifb::{Key, Window, WindowOptions};

use crate::present::{compose_side_by_side, window_size};
use crate::surface::{DisplaySurface, PixelSurface};

pub struct Viewer {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl Viewer {
    /// Opens a window wide enough for two `src_w`x`src_h` images in `window_width`.
    pub fn new(title: &str, window_width: usize, src_w: usize, src_h: usize) -> anyhow::Result<Self> {
        let (width, height) = window_size(window_width, src_w, src_h);
        let window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| anyhow!("window init: {e}"))?;
        Ok(Self {
            window,
            buffer: vec![0; width * height],
            width,
            height,
        })
    }

    /// False once the window is closed or ESC is held.
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// Show the surfaces' front buffers.
    pub fn present(&mut self, color: &PixelSurface, depth: &PixelSurface) -> anyhow::Result<()> {
        compose_side_by_side(
            color.front(),
            depth.front(),
            color.width(),
            color.height(),
            &mut self.buffer,
            self.width,
            self.height,
        )?;
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| anyhow!("window update: {e}"))
    }

    /// Keep the window responsive between frames.
    pub fn idle(&mut self) {
        self.window.update();
    }
}
