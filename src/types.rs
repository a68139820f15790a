use nalgebra::{Matrix3, Vector3};

/// Maps a millimeter sample onto one byte of grayscale: 8000 mm spread over 256 levels.
pub const DEPTH_TO_BYTE_DIVISOR: u16 = 8000 / 256;

/// Bytes per color pixel (BGRA).
pub const COLOR_BYTES_PER_PIXEL: usize = 4;

/// Depth-space coordinate for one color pixel. Sub-pixel, may be out of range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthSpacePoint {
    pub x: f32,
    pub y: f32,
}

impl DepthSpacePoint {
    /// "No depth pixel corresponds to this color pixel."
    pub const SENTINEL: Self = Self {
        x: f32::NEG_INFINITY,
        y: f32::NEG_INFINITY,
    };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_sentinel(&self) -> bool {
        self.x == f32::NEG_INFINITY || self.y == f32::NEG_INFINITY
    }
}

impl Default for DepthSpacePoint {
    fn default() -> Self {
        Self::SENTINEL
    }
}

/// Owned depth frame, row-major millimeters (0 = invalid).
#[derive(Debug, Clone, PartialEq)]
pub struct RawDepthFrame {
    pub width: usize,
    pub height: usize,
    pub min_reliable_distance: u16,
    pub timestamp: f64,
    pub data: Vec<u16>,
}

/// Owned color frame, row-major BGRA.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColorFrame {
    pub width: usize,
    pub height: usize,
    pub timestamp: f64,
    pub data: Vec<u8>,
}

/// One depth-space coordinate per color pixel; allocated once for a color resolution.
#[derive(Debug, Clone)]
pub struct CoordinateMap {
    width: usize,
    height: usize,
    points: Vec<DepthSpacePoint>,
}

impl CoordinateMap {
    pub fn new(color_width: usize, color_height: usize) -> Self {
        Self {
            width: color_width,
            height: color_height,
            points: vec![DepthSpacePoint::SENTINEL; color_width * color_height],
        }
    }

    pub fn from_points(color_width: usize, color_height: usize, points: Vec<DepthSpacePoint>) -> Option<Self> {
        (points.len() == color_width * color_height).then_some(Self {
            width: color_width,
            height: color_height,
            points,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[DepthSpacePoint] {
        &self.points
    }

    /// Length is fixed; only the entries are writable.
    pub fn points_mut(&mut self) -> &mut [DepthSpacePoint] {
        &mut self.points
    }
}

/// Gray8 depth image at color resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedDepthImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl AlignedDepthImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }
}

/// Pinhole intrinsics, pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub width: usize,
    pub height: usize,
    pub fx: f32,
    pub fy: f32,
    pub ppx: f32,
    pub ppy: f32,
}

/// Rigid depth → color transform, meters.
#[derive(Debug, Clone, PartialEq)]
pub struct Extrinsics {
    pub rotation: Matrix3<f32>,
    pub translation: Vector3<f32>,
}

impl Extrinsics {
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::new(x, y, z),
        }
    }

    /// Row-major rotation (9 values) and translation (3 values).
    pub fn from_slices(rotation: &[f32], translation: &[f32]) -> Option<Self> {
        if rotation.len() != 9 || translation.len() != 3 {
            return None;
        }
        Some(Self {
            rotation: Matrix3::from_row_slice(rotation),
            translation: Vector3::new(translation[0], translation[1], translation[2]),
        })
    }
}

/// Pixel rectangle on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Self::new(x, y, right - x, bottom - y)
    }

    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!((right, bottom), (Some(r), Some(b)) if r <= width && b <= height)
    }
}
