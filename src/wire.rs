//! Payloads published by the camera node.
//!
//! `camera/combined` carries a [`CombinedFrameWire`]; the split topics carry
//! snappy-compressed [`DepthFrameSerializable`] and [`ColorFrameWire`].
//! Color stays JPEG here; turning it into pixels is the live adapter's job.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use snap::raw::{Decoder, Encoder};

use crate::error::WireError;

/// Depth in millimeters, row-major.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Encode, Decode)]
pub struct DepthFrameSerializable {
    pub width: usize,
    pub height: usize,
    pub timestamp: f64,
    pub data: Vec<u16>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Encode, Decode)]
pub struct ColorFrameWire {
    pub width: usize,
    pub height: usize,
    pub timestamp: f64,
    pub jpeg: Vec<u8>,
}

/// Depth and color captured together, in one message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Encode, Decode)]
pub struct CombinedFrameWire {
    pub width: u16,
    pub height: u16,
    pub timestamp: f64,
    pub rgb_jpeg: Vec<u8>,
    /// zstd(bincode(DepthFrameSerializable))
    pub depth_zstd: Vec<u8>,
}

impl DepthFrameSerializable {
    pub fn encode_and_compress(&self) -> Result<Vec<u8>, WireError> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())?;
        Ok(Encoder::new().compress_vec(&encoded)?)
    }

    pub fn decode_and_decompress(encoded: &[u8]) -> Result<Self, WireError> {
        let decompressed = Decoder::new().decompress_vec(encoded)?;
        let (frame, _): (Self, usize) = bincode::decode_from_slice(&decompressed, bincode::config::standard())?;
        frame.validated()
    }

    /// zstd flavour used inside [`CombinedFrameWire`].
    pub fn decode_zstd(encoded: &[u8]) -> Result<Self, WireError> {
        let decompressed = zstd::decode_all(encoded)?;
        let (frame, _): (Self, usize) = bincode::decode_from_slice(&decompressed, bincode::config::standard())?;
        frame.validated()
    }

    fn validated(self) -> Result<Self, WireError> {
        if self.data.is_empty() {
            return Err(WireError::EmptyDepth);
        }
        let expected = self.width * self.height;
        if self.data.len() != expected {
            return Err(WireError::PayloadSize {
                width: self.width,
                height: self.height,
                expected,
                got: self.data.len(),
            });
        }
        Ok(self)
    }
}

impl ColorFrameWire {
    pub fn encode_and_compress(&self) -> Result<Vec<u8>, WireError> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())?;
        Ok(Encoder::new().compress_vec(&encoded)?)
    }

    pub fn decode_and_decompress(encoded: &[u8]) -> Result<Self, WireError> {
        let decompressed = Decoder::new().decompress_vec(encoded)?;
        let (frame, _): (Self, usize) = bincode::decode_from_slice(&decompressed, bincode::config::standard())?;
        Ok(frame)
    }
}

impl CombinedFrameWire {
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let (frame, _): (Self, usize) = bincode::decode_from_slice(payload, bincode::config::standard())?;
        Ok(frame)
    }

    pub fn depth(&self) -> Result<DepthFrameSerializable, WireError> {
        DepthFrameSerializable::decode_zstd(&self.depth_zstd)
    }
}

/// Packed RGB8 → BGRA with opaque alpha.
pub fn rgb_to_bgra(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3).flat_map(|p| [p[2], p[1], p[0], 0xff]).collect()
}
