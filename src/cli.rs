use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};

use crate::align::QuantizePolicy;
use crate::mapper::{CoordinateMapper, PinholeMapper, RegisteredMapper};
use crate::types::{Extrinsics, Intrinsics};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Live RGB-D viewer: depth aligned to the color grid")]
pub struct Args {
    /// One combined depth+color topic, or separate depth and color topics paired by timestamp
    #[arg(long, value_enum, default_value_t = TopicMode::Combined)]
    pub topics: TopicMode,

    #[arg(long, default_value = "camera/combined")]
    pub combined_topic: String,

    #[arg(long, default_value = "camera/depth")]
    pub depth_topic: String,

    #[arg(long, default_value = "camera/rgb")]
    pub color_topic: String,

    /// How color pixels find their depth pixel
    #[arg(long, value_enum, default_value_t = MapperKind::Registered)]
    pub mapper: MapperKind,

    #[arg(long, default_value_t = 640)]
    pub color_width: usize,
    #[arg(long, default_value_t = 480)]
    pub color_height: usize,
    #[arg(long, default_value_t = 640)]
    pub depth_width: usize,
    #[arg(long, default_value_t = 480)]
    pub depth_height: usize,

    /// Depth samples closer than this (mm) are shown black
    #[arg(long, default_value_t = 500)]
    pub min_distance: u16,

    /// What to do with depths past 7935 mm
    #[arg(long, value_enum, default_value_t = Overflow::Truncate)]
    pub overflow: Overflow,

    /// Snapshots older than this when the tick runs are dropped
    #[arg(long, default_value_t = 100)]
    pub max_frame_age_ms: u64,

    /// Split topics: max depth/color timestamp difference
    #[arg(long, default_value_t = 50.0)]
    pub pair_tolerance_ms: f64,

    #[arg(long, default_value_t = 5)]
    pub stats_interval_secs: u64,

    /// Window width; both images share it side by side
    #[arg(long, default_value_t = 1280)]
    pub window_width: usize,

    // Pinhole calibration, pixels.
    #[arg(long)]
    pub depth_fx: Option<f32>,
    #[arg(long)]
    pub depth_fy: Option<f32>,
    #[arg(long)]
    pub depth_ppx: Option<f32>,
    #[arg(long)]
    pub depth_ppy: Option<f32>,
    #[arg(long)]
    pub color_fx: Option<f32>,
    #[arg(long)]
    pub color_fy: Option<f32>,
    #[arg(long)]
    pub color_ppx: Option<f32>,
    #[arg(long)]
    pub color_ppy: Option<f32>,

    /// Depth → color translation in meters, as x,y,z
    #[arg(long, value_delimiter = ',', default_values_t = [0.0, 0.0, 0.0], allow_hyphen_values = true)]
    pub baseline: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TopicMode {
    Combined,
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MapperKind {
    Registered,
    Pinhole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Overflow {
    Truncate,
    Clamp,
}

impl From<Overflow> for QuantizePolicy {
    fn from(o: Overflow) -> Self {
        match o {
            Overflow::Truncate => QuantizePolicy::Truncate,
            Overflow::Clamp => QuantizePolicy::Clamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapperSettings {
    Registered,
    Pinhole {
        depth: Intrinsics,
        color: Intrinsics,
        extr: Extrinsics,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Topics {
    Combined(String),
    Split { depth: String, color: String },
}

/// Validated configuration for one viewer run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub topics: Topics,
    pub color_size: (usize, usize),
    pub depth_size: (usize, usize),
    pub min_reliable_distance: u16,
    pub policy: QuantizePolicy,
    pub mapper: MapperSettings,
    pub max_frame_age: Duration,
    pub pair_tolerance_secs: f64,
    pub stats_interval: Duration,
    pub window_width: usize,
}

impl Args {
    pub fn settings(&self) -> anyhow::Result<Settings> {
        for (name, v) in [
            ("color-width", self.color_width),
            ("color-height", self.color_height),
            ("depth-width", self.depth_width),
            ("depth-height", self.depth_height),
            ("window-width", self.window_width),
        ] {
            if v == 0 {
                bail!("--{name} must be positive");
            }
        }
        if !(self.pair_tolerance_ms.is_finite() && self.pair_tolerance_ms >= 0.0) {
            bail!("--pair-tolerance-ms must be a non-negative number");
        }

        let topics = match self.topics {
            TopicMode::Combined => Topics::Combined(self.combined_topic.clone()),
            TopicMode::Split => Topics::Split {
                depth: self.depth_topic.clone(),
                color: self.color_topic.clone(),
            },
        };

        let mapper = match self.mapper {
            MapperKind::Registered => MapperSettings::Registered,
            MapperKind::Pinhole => {
                let depth = intrinsics(
                    "depth",
                    (self.depth_width, self.depth_height),
                    [self.depth_fx, self.depth_fy, self.depth_ppx, self.depth_ppy],
                )?;
                let color = intrinsics(
                    "color",
                    (self.color_width, self.color_height),
                    [self.color_fx, self.color_fy, self.color_ppx, self.color_ppy],
                )?;
                let extr = Extrinsics::from_slices(&[1., 0., 0., 0., 1., 0., 0., 0., 1.], &self.baseline)
                    .context("--baseline takes exactly three values")?;
                MapperSettings::Pinhole { depth, color, extr }
            }
        };

        Ok(Settings {
            topics,
            color_size: (self.color_width, self.color_height),
            depth_size: (self.depth_width, self.depth_height),
            min_reliable_distance: self.min_distance,
            policy: self.overflow.into(),
            mapper,
            max_frame_age: Duration::from_millis(self.max_frame_age_ms),
            pair_tolerance_secs: self.pair_tolerance_ms / 1000.0,
            stats_interval: Duration::from_secs(self.stats_interval_secs),
            window_width: self.window_width,
        })
    }
}

fn intrinsics(camera: &str, (width, height): (usize, usize), values: [Option<f32>; 4]) -> anyhow::Result<Intrinsics> {
    let [Some(fx), Some(fy), Some(ppx), Some(ppy)] = values else {
        bail!("--mapper pinhole needs --{camera}-fx, --{camera}-fy, --{camera}-ppx and --{camera}-ppy");
    };
    if !(fx > 0.0 && fy > 0.0) {
        bail!("{camera} focal lengths must be positive");
    }
    Ok(Intrinsics { width, height, fx, fy, ppx, ppy })
}

impl Settings {
    pub fn build_mapper(&self) -> Box<dyn CoordinateMapper + Send> {
        match &self.mapper {
            MapperSettings::Registered => Box::new(RegisteredMapper::new(
                self.depth_size.0,
                self.depth_size.1,
                self.color_size.0,
                self.color_size.1,
            )),
            MapperSettings::Pinhole { depth, color, extr } => Box::new(PinholeMapper::new(*depth, *color, extr.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Settings> {
        let mut argv = vec!["rgbd-depth-align"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv)?.settings()
    }

    #[test]
    fn defaults() {
        let s = parse(&[]).unwrap();
        assert_eq!(s.topics, Topics::Combined("camera/combined".into()));
        assert_eq!(s.color_size, (640, 480));
        assert_eq!(s.min_reliable_distance, 500);
        assert_eq!(s.policy, QuantizePolicy::Truncate);
        assert_eq!(s.mapper, MapperSettings::Registered);
        assert_eq!(s.max_frame_age, Duration::from_millis(100));
        assert!((s.pair_tolerance_secs - 0.05).abs() < 1e-12);
    }

    #[test]
    fn split_topics_and_clamp() {
        let s = parse(&["--topics", "split", "--overflow", "clamp", "--depth-topic", "d"]).unwrap();
        assert_eq!(
            s.topics,
            Topics::Split {
                depth: "d".into(),
                color: "camera/rgb".into()
            }
        );
        assert_eq!(s.policy, QuantizePolicy::Clamp);
    }

    #[test]
    fn pinhole_needs_full_calibration() {
        let err = parse(&["--mapper", "pinhole", "--depth-fx", "380"]).unwrap_err();
        assert!(err.to_string().contains("--depth-fy"), "{err}");
    }

    #[test]
    fn pinhole_with_calibration() {
        let s = parse(&[
            "--mapper", "pinhole",
            "--depth-fx", "380", "--depth-fy", "380", "--depth-ppx", "320", "--depth-ppy", "240",
            "--color-fx", "610", "--color-fy", "610", "--color-ppx", "321", "--color-ppy", "239",
            "--baseline", "-0.015,0,0",
        ])
        .unwrap();
        let MapperSettings::Pinhole { depth, color, extr } = s.mapper else {
            panic!("expected pinhole");
        };
        assert_eq!(depth.fx, 380.0);
        assert_eq!(color.ppx, 321.0);
        assert_eq!(extr.translation.x, -0.015);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(parse(&["--color-width", "0"]).is_err());
        assert!(parse(&["--pair-tolerance-ms", "-1"]).is_err());
    }
}
