//! Error types for the alignment pipeline and its adapters.

use thiserror::Error;

use crate::surface::PixelFormat;

/// Which half of a snapshot could not be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Depth,
    Color,
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameKind::Depth => f.write_str("depth"),
            FrameKind::Color => f.write_str("color"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum MapError {
    #[error("depth buffer holds {got} samples, mapper expects {expected}")]
    DepthBufferSize { expected: usize, got: usize },
    #[error("coordinate map holds {got} entries, color resolution needs {expected}")]
    MapSize { expected: usize, got: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum SurfaceError {
    #[error("rect {x},{y} {width}x{height} exceeds surface {surface_width}x{surface_height}")]
    RectOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        surface_width: usize,
        surface_height: usize,
    },
    #[error("source buffer too short: need {needed} bytes, got {got}")]
    SourceTooShort { needed: usize, got: usize },
    #[error("stride {stride} is smaller than a row of {row_bytes} bytes")]
    StrideTooSmall { stride: usize, row_bytes: usize },
}

/// Why a tick was dropped.
#[derive(Debug, Error, PartialEq)]
pub enum TickError {
    #[error("{0} frame unavailable")]
    FrameUnavailable(FrameKind),
    #[error("depth frame is {width}x{height} but carries {len} samples")]
    MalformedDepth { width: usize, height: usize, len: usize },
    #[error("coordinate mapping failed: {0}")]
    Mapping(#[from] MapError),
    #[error("surface write failed: {0}")]
    Surface(#[from] SurfaceError),
    #[error("tick panicked: {0}")]
    Panicked(String),
}

/// Surfaces handed to the pipeline do not fit together.
#[derive(Debug, Error, PartialEq)]
pub enum SetupError {
    #[error("depth surface is {depth_width}x{depth_height}, color surface is {color_width}x{color_height}")]
    SurfaceSize {
        color_width: usize,
        color_height: usize,
        depth_width: usize,
        depth_height: usize,
    },
    #[error("{surface} surface must be {expected:?}, got {got:?}")]
    SurfaceFormat {
        surface: FrameKind,
        expected: PixelFormat,
        got: PixelFormat,
    },
    #[error("color surface has no pixels")]
    EmptySurface,
}

/// The producer feeding snapshots to the tick thread has stopped.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("frame source disconnected")]
pub struct SourceClosed;

/// Errors decoding frames received from the network.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("snappy: {0}")]
    Snap(#[from] snap::Error),
    #[error("zstd: {0}")]
    Zstd(#[from] std::io::Error),
    #[error("bincode: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("bincode: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("depth payload has {got} samples, {width}x{height} needs {expected}")]
    PayloadSize {
        width: usize,
        height: usize,
        expected: usize,
        got: usize,
    },
    #[error("empty depth payload")]
    EmptyDepth,
    #[error("jpeg: {0}")]
    Jpeg(String),
}
