use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use tracing::debug;

use crate::types::{RawColorFrame, RawDepthFrame};

type Stamp = OrderedFloat<f64>; // seconds

/// A frame from one of the two independent streams.
#[derive(Debug, Clone)]
pub enum Frame {
    Depth(RawDepthFrame),
    Color(RawColorFrame),
}

impl Frame {
    pub fn ts(&self) -> f64 {
        match self {
            Frame::Depth(d) => d.timestamp,
            Frame::Color(c) => c.timestamp,
        }
    }
}

/// Pairs depth and color frames that arrive on separate streams by nearest
/// timestamp. Anything older than an emitted pair is discarded.
#[derive(Debug)]
pub struct FramePairer {
    depth_q: BTreeMap<Stamp, RawDepthFrame>,
    color_q: BTreeMap<Stamp, RawColorFrame>,
    tolerance: f64,
    max_queue: usize,
}

impl FramePairer {
    pub const DEFAULT_MAX_QUEUE: usize = 8;

    pub fn new(tolerance_secs: f64) -> Self {
        Self {
            depth_q: BTreeMap::new(),
            color_q: BTreeMap::new(),
            tolerance: tolerance_secs,
            max_queue: Self::DEFAULT_MAX_QUEUE,
        }
    }

    pub fn with_max_queue(mut self, max_queue: usize) -> Self {
        self.max_queue = max_queue.max(1);
        self
    }

    pub fn pending(&self) -> (usize, usize) {
        (self.depth_q.len(), self.color_q.len())
    }

    /// Queue `frame`; returns a pair once the new frame has a partner within tolerance.
    pub fn push(&mut self, frame: Frame) -> Option<(RawDepthFrame, RawColorFrame)> {
        let ts = Stamp::from(frame.ts());
        let candidate = match frame {
            Frame::Depth(d) => {
                self.depth_q.insert(ts, d);
                nearest(&self.color_q, ts).map(|tc| (ts, tc))
            }
            Frame::Color(c) => {
                self.color_q.insert(ts, c);
                nearest(&self.depth_q, ts).map(|td| (td, ts))
            }
        };

        let tolerance = self.tolerance;
        let Some((td, tc)) = candidate.filter(|(td, tc)| (td.into_inner() - tc.into_inner()).abs() <= tolerance) else {
            self.bound_queues();
            return None;
        };

        let depth = self.depth_q.remove(&td)?;
        let color = self.color_q.remove(&tc)?;
        let dropped = self.discard_before(td.min(tc));
        if dropped > 0 {
            debug!(dropped, "discarded stale unpaired frames");
        }
        Some((depth, color))
    }

    fn discard_before(&mut self, t: Stamp) -> usize {
        let before = self.depth_q.len() + self.color_q.len();
        self.depth_q = self.depth_q.split_off(&t);
        self.color_q = self.color_q.split_off(&t);
        before - self.depth_q.len() - self.color_q.len()
    }

    fn bound_queues(&mut self) {
        while self.depth_q.len() > self.max_queue {
            self.depth_q.pop_first();
        }
        while self.color_q.len() > self.max_queue {
            self.color_q.pop_first();
        }
    }
}

// O(log n) nearest neighbour
fn nearest<T>(map: &BTreeMap<Stamp, T>, t: Stamp) -> Option<Stamp> {
    map.range(..=t)
        .next_back()
        .into_iter()
        .chain(map.range(t..).next())
        .min_by(|a, b| {
            (a.0.into_inner() - t.into_inner())
                .abs()
                .total_cmp(&(b.0.into_inner() - t.into_inner()).abs())
        })
        .map(|(k, _)| *k)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(ts: f64) -> Frame {
        Frame::Depth(RawDepthFrame {
            width: 1,
            height: 1,
            min_reliable_distance: 0,
            timestamp: ts,
            data: vec![0],
        })
    }

    fn color(ts: f64) -> Frame {
        Frame::Color(RawColorFrame {
            width: 1,
            height: 1,
            timestamp: ts,
            data: vec![0; 4],
        })
    }

    #[test]
    fn pairs_within_tolerance() {
        let mut p = FramePairer::new(0.05);
        assert!(p.push(depth(1.000)).is_none());
        let (d, c) = p.push(color(1.020)).unwrap();
        assert_eq!(d.timestamp, 1.000);
        assert_eq!(c.timestamp, 1.020);
        assert_eq!(p.pending(), (0, 0));
    }

    #[test]
    fn far_apart_frames_wait() {
        let mut p = FramePairer::new(0.05);
        assert!(p.push(depth(1.0)).is_none());
        assert!(p.push(color(1.2)).is_none());
        assert_eq!(p.pending(), (1, 1));
        let (d, c) = p.push(depth(1.21)).unwrap();
        assert_eq!((d.timestamp, c.timestamp), (1.21, 1.2));
        // The unmatched depth at 1.0 is older than the pair and goes.
        assert_eq!(p.pending(), (0, 0));
    }

    #[test]
    fn picks_nearest_partner() {
        let mut p = FramePairer::new(0.05);
        p.push(color(2.00));
        p.push(color(2.03));
        let (_, c) = p.push(depth(2.025)).unwrap();
        assert_eq!(c.timestamp, 2.03);
        assert_eq!(p.pending(), (0, 0));
    }

    #[test]
    fn queues_stay_bounded() {
        let mut p = FramePairer::new(0.001).with_max_queue(3);
        for i in 0..10 {
            p.push(depth(i as f64));
        }
        assert_eq!(p.pending(), (3, 0));
    }
}
