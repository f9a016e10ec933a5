mod actors;
mod camera;
mod config;
mod dataset;
mod error;
mod framework;
mod inference;
mod messages;
mod mjpeg;
mod unpack;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use simplelog::*;

use crate::actors::camera_actor::CameraActor;
use crate::actors::detection_actor::DetectionActor;
use crate::actors::keyboard_actor::KeyboardActor;
use crate::actors::stream_actor::StreamActor;
use crate::camera::NokhwaSource;
use crate::config::{AppConfig, KEY_POLL_INTERVAL};
use crate::dataset::DatasetWriter;
use crate::framework::actor::Actor;
use crate::framework::frame_slot::FrameSlot;
use crate::framework::streams::BroadcastStream;
use crate::messages::camera_frame::CameraFrame;
use crate::messages::control_msg::ControlMsg;

#[derive(Parser)]
#[command(name = "gesture-guard", version, about = "Gesture dataset capture and live classification")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract recorded movement archives and drop their metadata
    Unpack {
        /// Folder holding the movement data folders
        #[arg(long, default_value = ".")]
        base: PathBuf,
        /// Folders to process, relative to `base`
        dirs: Vec<String>,
    },
    /// Save labelled camera frames from the keyboard
    Capture,
    /// Like `capture`, with a live MJPEG preview over HTTP
    Stream,
    /// Classify the live camera feed
    Deploy,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::default();

    CombinedLogger::init(
        vec![
            TermLogger::new(config.log_level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
        ]
    ).context("Failed to initialise logging")?;

    match cli.command {
        Command::Unpack { base, dirs } => {
            unpack::unpack_movement_data(&base, &dirs)?;
            Ok(())
        }
        Command::Capture => capture(config.for_capture(false), false),
        Command::Stream => capture(config.for_capture(true), true),
        Command::Deploy => deploy(config.for_deploy()),
    }
}

fn capture(config: AppConfig, stream: bool) -> Result<()> {
    let dataset = DatasetWriter::prepare(&config.output_dir)
        .with_context(|| format!("Failed to prepare {}", config.output_dir.display()))?;

    info!("Starting Camera...");
    let frames: Arc<FrameSlot<CameraFrame>> = Arc::new(FrameSlot::new());
    let control: BroadcastStream<ControlMsg> = BroadcastStream::new(16);
    let (camera, keyboard, viewer) = capture_actors(&config, &frames, &control, dataset, stream);

    let mut threads: Vec<JoinHandle<()>> = Vec::new();
    if let Some(viewer) = viewer {
        threads.push(viewer.start()?);
    }
    threads.push(camera.start()?);

    info!("=== JETSON IMAGE CAPTURE TOOL ===");
    info!("  Press '1' to capture MIDDLE finger gesture");
    info!("  Press '2' to capture PEACE gesture");
    info!("  Press '3' to capture WOENSEL gesture");
    info!("  Press 'q' to quit");
    info!("Ready! Position your hand and press the number key.");
    threads.push(keyboard.start()?);

    join_all(threads);
    Ok(())
}

/// Builds the capture actors. Every control bus subscription exists before
/// any of them is started.
fn capture_actors(
    config: &AppConfig,
    frames: &Arc<FrameSlot<CameraFrame>>,
    control: &BroadcastStream<ControlMsg>,
    dataset: DatasetWriter,
    stream: bool,
) -> (CameraActor<NokhwaSource>, KeyboardActor, Option<StreamActor>) {
    let viewer = stream.then(|| StreamActor::new(config.stream.clone(), frames.clone(), control.clone()));
    let camera = CameraActor::new(config.camera.clone(), frames.clone(), control.clone(), Some(dataset));
    let keyboard = KeyboardActor::new(control.clone(), KEY_POLL_INTERVAL);
    (camera, keyboard, viewer)
}

fn deploy(config: AppConfig) -> Result<()> {
    let frames: Arc<FrameSlot<CameraFrame>> = Arc::new(FrameSlot::new());
    let control: BroadcastStream<ControlMsg> = BroadcastStream::new(16);
    let (detection, camera, viewer, keyboard) = deploy_actors(&config, &frames, &control);

    let threads: Vec<JoinHandle<()>> = vec![
        detection.start()?,
        camera.start()?,
        viewer.start()?,
        keyboard.start()?,
    ];

    join_all(threads);
    Ok(())
}

fn deploy_actors(
    config: &AppConfig,
    frames: &Arc<FrameSlot<CameraFrame>>,
    control: &BroadcastStream<ControlMsg>,
) -> (DetectionActor, CameraActor<NokhwaSource>, StreamActor, KeyboardActor) {
    (
        DetectionActor::new(config.inference.clone(), frames.clone(), control.clone(), config.stream.repeat_backoff),
        CameraActor::new(config.camera.clone(), frames.clone(), control.clone(), None),
        StreamActor::new(config.stream.clone(), frames.clone(), control.clone()),
        KeyboardActor::new(control.clone(), KEY_POLL_INTERVAL),
    )
}

fn join_all(threads: Vec<JoinHandle<()>>) {
    for thread in threads {
        let name = thread.thread().name().unwrap_or("actor").to_string();
        if thread.join().is_err() {
            error!("{} thread panicked", name);
        }
    }
}
