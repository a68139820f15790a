//! Frame handles handed to a tick.
//!
//! A handle is released by dropping it. Implementations that borrow sensor
//! memory return it in `Drop`; the owned frames here simply free their buffer.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::error::SourceClosed;
use crate::types::{RawColorFrame, RawDepthFrame};

pub trait DepthFrame {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn min_reliable_distance(&self) -> u16;
    /// Row-major millimeters.
    fn data(&self) -> &[u16];
}

pub trait ColorFrame {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    /// Row-major BGRA.
    fn data(&self) -> &[u8];
}

/// One arrival: a depth frame and a color frame captured together.
/// Either acquisition may come back empty once the snapshot has expired.
pub trait Snapshot {
    type Depth: DepthFrame;
    type Color: ColorFrame;

    fn acquire_depth(&mut self) -> Option<Self::Depth>;
    fn acquire_color(&mut self) -> Option<Self::Color>;
}

impl DepthFrame for RawDepthFrame {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn min_reliable_distance(&self) -> u16 {
        self.min_reliable_distance
    }

    fn data(&self) -> &[u16] {
        &self.data
    }
}

impl ColorFrame for RawColorFrame {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Owned pair of frames, each acquirable once, optionally expiring.
#[derive(Debug)]
pub struct FrameSnapshot {
    depth: Option<RawDepthFrame>,
    color: Option<RawColorFrame>,
    arrived: Instant,
    max_age: Option<Duration>,
}

impl FrameSnapshot {
    pub fn new(depth: Option<RawDepthFrame>, color: Option<RawColorFrame>) -> Self {
        Self {
            depth,
            color,
            arrived: Instant::now(),
            max_age: None,
        }
    }

    pub fn pair(depth: RawDepthFrame, color: RawColorFrame) -> Self {
        Self::new(Some(depth), Some(color))
    }

    /// Frames become unavailable once `max_age` has passed since arrival.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn age(&self) -> Duration {
        self.arrived.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.max_age.is_some_and(|max| self.age() > max)
    }

    /// Depth timestamp, falling back to color.
    pub fn timestamp(&self) -> Option<f64> {
        self.depth
            .as_ref()
            .map(|d| d.timestamp)
            .or_else(|| self.color.as_ref().map(|c| c.timestamp))
    }
}

impl Snapshot for FrameSnapshot {
    type Depth = RawDepthFrame;
    type Color = RawColorFrame;

    fn acquire_depth(&mut self) -> Option<RawDepthFrame> {
        if self.is_expired() {
            return None;
        }
        self.depth.take()
    }

    fn acquire_color(&mut self) -> Option<RawColorFrame> {
        if self.is_expired() {
            return None;
        }
        self.color.take()
    }
}

/// Tick-thread end of a snapshot channel.
#[derive(Debug)]
pub struct SnapshotReceiver {
    rx: Receiver<FrameSnapshot>,
}

impl SnapshotReceiver {
    pub fn new(rx: Receiver<FrameSnapshot>) -> Self {
        Self { rx }
    }

    /// Next arrival, waiting at most `timeout`. `Ok(None)` means nothing
    /// arrived in time; `Err` means the producer is gone for good.
    pub fn poll(&self, timeout: Duration) -> Result<Option<FrameSnapshot>, SourceClosed> {
        match self.rx.recv_timeout(timeout) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SourceClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth() -> RawDepthFrame {
        RawDepthFrame {
            width: 1,
            height: 1,
            min_reliable_distance: 500,
            timestamp: 2.0,
            data: vec![1000],
        }
    }

    fn color() -> RawColorFrame {
        RawColorFrame {
            width: 1,
            height: 1,
            timestamp: 2.01,
            data: vec![0; 4],
        }
    }

    #[test]
    fn frames_are_acquired_once() {
        let mut s = FrameSnapshot::pair(depth(), color());
        assert!(s.acquire_depth().is_some());
        assert!(s.acquire_depth().is_none());
        assert!(s.acquire_color().is_some());
        assert!(s.acquire_color().is_none());
    }

    #[test]
    fn expired_snapshot_yields_nothing() {
        let mut s = FrameSnapshot::pair(depth(), color()).with_max_age(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        assert!(s.is_expired());
        assert!(s.acquire_depth().is_none());
        assert!(s.acquire_color().is_none());
    }

    #[test]
    fn timestamp_prefers_depth() {
        assert_eq!(FrameSnapshot::pair(depth(), color()).timestamp(), Some(2.0));
        assert_eq!(FrameSnapshot::new(None, Some(color())).timestamp(), Some(2.01));
        assert_eq!(FrameSnapshot::new(None, None).timestamp(), None);
    }

    #[test]
    fn receiver_tells_timeout_from_disconnect() {
        let (tx, rx) = std::sync::mpsc::sync_channel(2);
        let rx = SnapshotReceiver::new(rx);
        assert_eq!(rx.poll(Duration::from_millis(1)).map(|s| s.is_some()), Ok(false));

        tx.send(FrameSnapshot::pair(depth(), color())).unwrap();
        drop(tx);
        // Queued snapshots are still delivered after the sender goes away.
        assert_eq!(rx.poll(Duration::from_millis(1)).map(|s| s.is_some()), Ok(true));
        assert_eq!(rx.poll(Duration::from_millis(1)).map(|s| s.is_some()), Err(SourceClosed));
    }
}
