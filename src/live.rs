//! Zenoh subscriber that turns camera messages into [`FrameSnapshot`]s.
//!
//! The subscriber runs on its own tokio runtime; snapshots cross to the tick
//! thread through a two-slot channel. When the tick thread falls behind, new
//! snapshots are dropped rather than queued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

use crate::cli::{Settings, Topics};
use crate::error::{SourceClosed, WireError};
use crate::source::{FrameSnapshot, SnapshotReceiver};
use crate::sync::{Frame, FramePairer};
use crate::types::{RawColorFrame, RawDepthFrame};
use crate::wire::{rgb_to_bgra, ColorFrameWire, CombinedFrameWire, DepthFrameSerializable};

const CHANNEL_SLOTS: usize = 2;

/// How incoming payloads become frames.
#[derive(Debug, Clone, Copy)]
struct Decode {
    min_reliable_distance: u16,
    max_age: Duration,
}

impl Decode {
    fn depth(&self, d: DepthFrameSerializable) -> RawDepthFrame {
        RawDepthFrame {
            width: d.width,
            height: d.height,
            min_reliable_distance: self.min_reliable_distance,
            timestamp: d.timestamp,
            data: d.data,
        }
    }

    fn combined(&self, payload: &[u8]) -> Result<FrameSnapshot, WireError> {
        let wire = CombinedFrameWire::decode(payload)?;
        let depth = self.depth(wire.depth()?);
        let color = decode_jpeg(&wire.rgb_jpeg, wire.timestamp)?;
        Ok(FrameSnapshot::pair(depth, color).with_max_age(self.max_age))
    }
}

fn decode_jpeg(jpeg: &[u8], timestamp: f64) -> Result<RawColorFrame, WireError> {
    let img = turbojpeg::decompress_image::<turbojpeg::image::Rgb<u8>>(jpeg).map_err(|e| WireError::Jpeg(e.to_string()))?;
    let (w, h) = img.dimensions();
    Ok(RawColorFrame {
        width: w as usize,
        height: h as usize,
        timestamp,
        data: rgb_to_bgra(&img.into_raw()),
    })
}

/// Live frame source. Dropping it stops the subscriber.
pub struct LiveSource {
    runtime: Option<Runtime>,
    rx: SnapshotReceiver,
    running: Arc<AtomicBool>,
    overflowed: Arc<AtomicU64>,
}

impl LiveSource {
    pub fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let runtime = Runtime::new()?;
        let session = runtime
            .block_on(async { zenoh::open(zenoh::Config::default()).await })
            .map_err(|e| anyhow!("failed to open zenoh session: {e}"))?;

        let (tx, rx) = mpsc::sync_channel(CHANNEL_SLOTS);
        let running = Arc::new(AtomicBool::new(true));
        let overflowed = Arc::new(AtomicU64::new(0));
        let decode = Decode {
            min_reliable_distance: settings.min_reliable_distance,
            max_age: settings.max_frame_age,
        };
        let out = Outbox {
            tx,
            running: running.clone(),
            overflowed: overflowed.clone(),
        };

        match settings.topics.clone() {
            Topics::Combined(topic) => {
                runtime.spawn(async move {
                    if let Err(e) = run_combined(session, topic, decode, out).await {
                        error!("combined subscriber failed: {e:#}");
                    }
                });
            }
            Topics::Split { depth, color } => {
                let tolerance = settings.pair_tolerance_secs;
                runtime.spawn(async move {
                    if let Err(e) = run_split(session, depth, color, tolerance, decode, out).await {
                        error!("split subscriber failed: {e:#}");
                    }
                });
            }
        }

        Ok(Self {
            runtime: Some(runtime),
            rx: SnapshotReceiver::new(rx),
            running,
            overflowed,
        })
    }

    /// Next arrival, waiting at most `timeout`. Fails once the subscriber task has exited.
    pub fn poll(&self, timeout: Duration) -> Result<Option<FrameSnapshot>, SourceClosed> {
        self.rx.poll(timeout)
    }

    /// Snapshots dropped because the tick thread was busy.
    pub fn overflowed(&self) -> u64 {
        self.overflowed.load(Ordering::Relaxed)
    }
}

impl Drop for LiveSource {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(Duration::from_millis(500));
        }
        info!("live source stopped");
    }
}

struct Outbox {
    tx: SyncSender<FrameSnapshot>,
    running: Arc<AtomicBool>,
    overflowed: Arc<AtomicU64>,
}

impl Outbox {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Returns false once the tick side has gone away.
    fn deliver(&self, snapshot: FrameSnapshot) -> bool {
        match self.tx.try_send(snapshot) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.overflowed.fetch_add(1, Ordering::Relaxed);
                debug!("tick thread busy, snapshot dropped");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

async fn run_combined(session: zenoh::Session, topic: String, decode: Decode, out: Outbox) -> anyhow::Result<()> {
    let subscriber = session
        .declare_subscriber(topic.clone())
        .await
        .map_err(|e| anyhow!("subscribe {topic}: {e}"))?;
    info!("Combined frame subscriber started, listening on '{topic}'");

    while out.is_running() {
        let sample = match subscriber.recv_async().await {
            Ok(sample) => sample,
            Err(e) => {
                warn!("combined subscriber closed: {e:?}");
                break;
            }
        };
        match decode.combined(&sample.payload().to_bytes()) {
            Ok(snapshot) => {
                if !out.deliver(snapshot) {
                    break;
                }
            }
            Err(e) => warn!("failed to unpack combined frame: {e}"),
        }
    }
    info!("Combined frame subscriber stopped");
    Ok(())
}

async fn run_split(
    session: zenoh::Session,
    depth_topic: String,
    color_topic: String,
    tolerance_secs: f64,
    decode: Decode,
    out: Outbox,
) -> anyhow::Result<()> {
    let depth_sub = session
        .declare_subscriber(depth_topic.clone())
        .await
        .map_err(|e| anyhow!("subscribe {depth_topic}: {e}"))?;
    let color_sub = session
        .declare_subscriber(color_topic.clone())
        .await
        .map_err(|e| anyhow!("subscribe {color_topic}: {e}"))?;
    info!("Split subscribers started on '{depth_topic}' and '{color_topic}'");

    let mut pairer = FramePairer::new(tolerance_secs);
    while out.is_running() {
        let frame = tokio::select! {
            sample = depth_sub.recv_async() => match sample {
                Ok(s) => DepthFrameSerializable::decode_and_decompress(&s.payload().to_bytes())
                    .map(|d| Frame::Depth(decode.depth(d))),
                Err(e) => {
                    warn!("depth subscriber closed: {e:?}");
                    break;
                }
            },
            sample = color_sub.recv_async() => match sample {
                Ok(s) => ColorFrameWire::decode_and_decompress(&s.payload().to_bytes())
                    .and_then(|c| decode_jpeg(&c.jpeg, c.timestamp))
                    .map(Frame::Color),
                Err(e) => {
                    warn!("color subscriber closed: {e:?}");
                    break;
                }
            },
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!("failed to decode frame: {e}");
                continue;
            }
        };
        if let Some((depth, color)) = pairer.push(frame) {
            let snapshot = FrameSnapshot::pair(depth, color).with_max_age(decode.max_age);
            if !out.deliver(snapshot) {
                break;
            }
        }
    }
    info!("Split subscribers stopped");
    Ok(())
}
