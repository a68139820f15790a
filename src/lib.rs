//! Depth-to-color alignment for live RGB-D streams.
//!
//! Each frame arrival runs one tick of [`AlignmentPipeline`]: the depth frame
//! is mapped into the color camera's pixel grid, quantized to one byte per
//! pixel and written to a depth surface, while the color frame is copied to
//! its own surface.

pub mod align;
pub mod cli;
pub mod error;
pub mod mapper;
pub mod pipeline;
pub mod present;
pub mod source;
pub mod stats;
pub mod surface;
pub mod sync;
pub mod types;
pub mod wire;

#[cfg(feature = "viewer")]
pub mod live;
#[cfg(feature = "viewer")]
pub mod viewer;

pub use align::{align_depth, DepthView, QuantizePolicy};
pub use error::{FrameKind, MapError, SetupError, SourceClosed, SurfaceError, TickError, WireError};
pub use mapper::{CoordinateMapper, PinholeMapper, RegisteredMapper};
pub use pipeline::{AlignmentPipeline, ColorWrite, TickOutcome, TickReport};
pub use source::{ColorFrame, DepthFrame, FrameSnapshot, Snapshot, SnapshotReceiver};
pub use surface::{DisplaySurface, LockCounts, PixelFormat, PixelSurface, SurfaceGuard};
pub use types::*;
