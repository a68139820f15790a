use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rgbd_depth_align::cli::Args;
use rgbd_depth_align::live::LiveSource;
use rgbd_depth_align::stats::TickStats;
use rgbd_depth_align::viewer::Viewer;
use rgbd_depth_align::{AlignmentPipeline, PixelFormat, PixelSurface};

// Upper bound on how long the window goes without pumping events.
const POLL_INTERVAL: Duration = Duration::from_millis(16);

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = Args::parse().settings()?;
    let (w, h) = settings.color_size;

    let mut pipeline = AlignmentPipeline::new(
        settings.build_mapper(),
        PixelSurface::new(w, h, PixelFormat::Bgra32),
        PixelSurface::new(w, h, PixelFormat::Gray8),
        settings.policy,
    )?
    .with_stats(TickStats::new(settings.stats_interval));

    let mut viewer = Viewer::new("RGB-D | aligned depth", settings.window_width, w, h)?;
    let source = LiveSource::connect(&settings)?;
    info!("aligning depth into {w}x{h} color ({:?})", settings.topics);

    while viewer.is_open() {
        let Some(snapshot) = source.poll(POLL_INTERVAL).context("live subscriber stopped")? else {
            viewer.idle();
            continue;
        };
        if pipeline.on_frame_arrived(snapshot).is_completed() {
            viewer.present(pipeline.color_surface(), pipeline.depth_surface())?;
        } else {
            viewer.idle();
        }
    }

    info!(
        "viewer closed after {} ticks ({} dropped, {} snapshots overflowed)",
        pipeline.stats().completed,
        pipeline.stats().dropped(),
        source.overflowed()
    );
    Ok(())
}
