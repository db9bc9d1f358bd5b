//! Vireo CLI tools: session replay and input diagnostics.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use vireo_vr::{axis_sector, Controller, FaceTracker, Hand, VrConfig, VrSystem};
use vireo_vr_replay::{ReplayEyeSensor, ReplayRuntime, Script};

#[derive(Parser, Debug)]
#[command(name = "vireo")]
#[command(about = "Vireo CLI tools")]
struct Args {
    /// JSON file with tracking settings
    #[arg(short, long, env = "VIREO_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a recorded session through the tracking core
    Replay {
        /// Replay script (JSON)
        #[arg(short, long)]
        script: PathBuf,

        /// Also play back the recorded eye samples
        #[arg(long)]
        eye: bool,
    },

    /// Show which sector an axis position falls into
    Sector {
        #[arg(short, long, allow_negative_numbers = true)]
        x: f32,

        #[arg(short, long, allow_negative_numbers = true)]
        y: f32,

        /// Number of sectors (default from config)
        #[arg(short, long)]
        divisions: Option<u32>,

        /// Rotation offset in turns (default from config)
        #[arg(short, long, allow_negative_numbers = true)]
        rotation: Option<f32>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    vireo_common::init_tracing();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => VrConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => VrConfig::default(),
    };

    match args.command {
        Command::Replay { script, eye } => replay(&config, &script, eye)?,
        Command::Sector {
            x,
            y,
            divisions,
            rotation,
        } => {
            let divisions = divisions.unwrap_or(config.sector_divisions);
            let rotation = rotation.unwrap_or(config.sector_rotation);
            let sector = axis_sector([x, y], divisions, rotation);
            if sector < 0 {
                println!("centered");
            } else {
                println!("sector {sector} of {divisions}");
            }
        }
        Command::Version => {
            println!("vireo {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn replay(config: &VrConfig, path: &Path, eye: bool) -> Result<()> {
    let script =
        Script::load(path).with_context(|| format!("loading script {}", path.display()))?;
    let frames = script.frames.len();
    let eye_samples = script.eye_samples.clone();

    let mut vr = VrSystem::new(config.clone());
    vr.connect(Box::new(ReplayRuntime::new(script)))?;
    let dt = 1.0 / vr.frame_rate();
    let (w, h) = vr.render_size();
    println!(
        "{frames} frames at {:.1} Hz, render target {w}x{h}",
        vr.frame_rate()
    );

    let mut face = None;
    if eye {
        let count = eye_samples.len();
        let mut tracker = FaceTracker::new(ReplayEyeSensor::new(eye_samples));
        tracker.set_period(config.sensor_period());
        tracker.start()?;
        face = Some((tracker, count));
    }

    for frame in 0..frames {
        vr.update_poses();
        while let Some(event) = vr.poll_event() {
            println!("[{frame:4}] {event}");
        }
        vr.tick(dt);

        for hand in Hand::BOTH {
            if let Some(clicks) = describe_clicks(vr.controller(hand)) {
                println!("[{frame:4}] {hand} clicks: {clicks}");
            }
        }

        let [x, y, z] = vr.pos_hmd().xyz();
        let worn = if vr.wearing_hmd() { " (worn)" } else { "" };
        println!("[{frame:4}] head {x:7.3} {y:7.3} {z:7.3}{worn}");
    }

    if let Some((mut tracker, count)) = face {
        let deadline =
            Instant::now() + config.sensor_period() * count as u32 + Duration::from_secs(1);
        while tracker.reads() < count as u64 && Instant::now() < deadline {
            thread::sleep(config.sensor_period());
        }
        tracker.stop();
        if tracker.reads() < count as u64 {
            warn!("only {} of {count} eye samples played back", tracker.reads());
        }
        let data = tracker.eye_data();
        debug!("eye snapshot {data:?}");
        let [dx, dy, dz] = data.gaze_dir;
        println!(
            "gaze {dx:6.3} {dy:6.3} {dz:6.3} (valid: {}), openness {:.2} {:.2}",
            data.gaze_dir_valid, data.openness[0], data.openness[1]
        );
    }

    vr.disconnect();
    Ok(())
}

fn describe_clicks(controller: &Controller) -> Option<String> {
    let seq = controller.click_seq_finished();
    if seq.is_empty() {
        return None;
    }
    Some(
        seq.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" "),
    )
}
