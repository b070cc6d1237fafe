//! Command-line front end
//!
//! Records the primary display and default microphone until a duration
//! expires or Ctrl-C is pressed.

use crate::capture::{default_grabber, primary_region, CpalAudioBackend, FrameCaptureChannel};
use crate::encoder::FfmpegLauncher;
use crate::recorder::{spawn_loop, RecorderEvent, RecordingConfig, RecordingCoordinator};
use crate::utils::format_elapsed;
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::LocalSet;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Output file; defaults to a timestamped file in the recordings directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// JSON recorder configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<RecordingConfig> {
    match path {
        Some(path) => RecordingConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(RecordingConfig::default()),
    }
}

/// Wire the platform capture sources and FFmpeg into a coordinator
pub fn build_coordinator(config: RecordingConfig) -> anyhow::Result<RecordingCoordinator> {
    let region = primary_region().context("Failed to locate the primary display")?;
    tracing::info!(
        "Capturing {}x{} at ({}, {})",
        region.width,
        region.height,
        region.x,
        region.y
    );
    let grabber = default_grabber(&region)?;
    let launcher = FfmpegLauncher::new(config.encoder_binary.clone());

    Ok(RecordingCoordinator::new(
        config,
        Box::new(launcher),
        Box::new(CpalAudioBackend::new()),
        FrameCaptureChannel::new(grabber, region),
    ))
}

/// Run one recording to completion
pub async fn record(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.config.as_ref())?;
    let coordinator = build_coordinator(config)?;
    let (handle, event_loop) = spawn_loop(coordinator);
    let mut events = handle.subscribe();

    LocalSet::new()
        .run_until(async move {
            let loop_task = tokio::task::spawn_local(event_loop);

            let path = handle.start(args.output).await?;
            println!("Recording to {}", path.display());

            let limit = async {
                match args.duration {
                    Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                    None => std::future::pending().await,
                }
            };
            tokio::pin!(limit);
            let interrupted = tokio::signal::ctrl_c();
            tokio::pin!(interrupted);

            loop {
                tokio::select! {
                    _ = &mut limit => {
                        tracing::info!("Duration reached");
                        break;
                    }
                    result = &mut interrupted => {
                        result.context("Failed to listen for Ctrl-C")?;
                        tracing::info!("Interrupted");
                        break;
                    }
                    event = events.recv() => match event {
                        Ok(event) => log_event(&event),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!("Missed {} recorder events", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }

            let output = handle.stop().await?;
            drop(handle);
            loop_task.await?;

            while let Ok(event) = events.try_recv() {
                log_event(&event);
            }

            match output {
                Some(path) => println!("Saved {}", path.display()),
                None => println!("Recording ended without output"),
            }
            Ok::<_, anyhow::Error>(())
        })
        .await
}

fn log_event(event: &RecorderEvent) {
    match event {
        RecorderEvent::TimeUpdated(seconds) => tracing::info!("{}", format_elapsed(*seconds)),
        RecorderEvent::Finished(path) => tracing::info!("Finished {:?}", path),
        RecorderEvent::Error(message) => tracing::warn!("{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_all_flags() {
        let args = Args::try_parse_from([
            "screen-recorder",
            "--output",
            "clip.mp4",
            "--duration",
            "10",
            "--config",
            "recorder.json",
        ])
        .unwrap();

        assert_eq!(args.output, Some(PathBuf::from("clip.mp4")));
        assert_eq!(args.duration, Some(10));
        assert_eq!(args.config, Some(PathBuf::from("recorder.json")));
    }

    #[test]
    fn test_flags_are_optional() {
        let args = Args::try_parse_from(["screen-recorder"]).unwrap();
        assert!(args.output.is_none());
        assert!(args.duration.is_none());
    }

    #[test]
    fn test_rejects_non_numeric_duration() {
        assert!(Args::try_parse_from(["screen-recorder", "--duration", "soon"]).is_err());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = load_config(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }
}
