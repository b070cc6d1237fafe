//! Recorder event loop
//!
//! Runs the coordinator on one task: commands from [`RecorderHandle`], clock
//! deadlines and audio notifications are all handled by the same
//! `tokio::select!` loop. cpal streams are not `Send`, so the loop runs on a
//! current-thread runtime or inside a `LocalSet`.

use super::coordinator::{RecorderEvent, RecordingCoordinator};
use super::state::RecorderState;
use crate::utils::{RecorderError, RecorderResult};
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Requests accepted by the event loop
#[derive(Debug)]
pub enum RecorderCommand {
    Start {
        output_path: Option<PathBuf>,
        reply: oneshot::Sender<RecorderResult<PathBuf>>,
    },
    Stop {
        reply: oneshot::Sender<Option<PathBuf>>,
    },
    Pause {
        reply: oneshot::Sender<bool>,
    },
    Resume {
        reply: oneshot::Sender<RecorderResult<bool>>,
    },
    State {
        reply: oneshot::Sender<(RecorderState, u64)>,
    },
}

/// Cloneable handle to a running recorder loop
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<RecorderCommand>,
    event_tx: broadcast::Sender<RecorderEvent>,
}

impl RecorderHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RecorderCommand,
    ) -> RecorderResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| RecorderError::Closed)?;
        rx.await.map_err(|_| RecorderError::Closed)
    }

    pub async fn start(&self, output_path: Option<PathBuf>) -> RecorderResult<PathBuf> {
        self.request(|reply| RecorderCommand::Start { output_path, reply })
            .await?
    }

    pub async fn stop(&self) -> RecorderResult<Option<PathBuf>> {
        self.request(|reply| RecorderCommand::Stop { reply }).await
    }

    pub async fn pause(&self) -> RecorderResult<bool> {
        self.request(|reply| RecorderCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> RecorderResult<bool> {
        self.request(|reply| RecorderCommand::Resume { reply })
            .await?
    }

    /// Current state and elapsed seconds
    pub async fn state(&self) -> RecorderResult<(RecorderState, u64)> {
        self.request(|reply| RecorderCommand::State { reply }).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }
}

/// Pair a coordinator with a command channel.
///
/// The returned future must be polled for the handle to make progress; it
/// completes once every handle is dropped, stopping any active recording.
pub fn spawn_loop(
    coordinator: RecordingCoordinator,
) -> (RecorderHandle, impl std::future::Future<Output = ()>) {
    let (tx, rx) = mpsc::channel(16);
    let event_tx = coordinator.event_sender();
    let handle = RecorderHandle { tx, event_tx };
    (handle, run(coordinator, rx))
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending::<()>().await,
    }
}

async fn run(mut coordinator: RecordingCoordinator, mut rx: mpsc::Receiver<RecorderCommand>) {
    let audio_ready = coordinator.audio_ready();
    tracing::debug!("Recorder loop started");

    loop {
        let deadline = coordinator.clock().next_deadline();

        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else {
                    break;
                };
                handle_command(&mut coordinator, command);
            }
            _ = sleep_until(deadline) => {
                coordinator.poll_clock(tokio::time::Instant::now().into_std());
            }
            _ = audio_ready.notified() => {
                coordinator.on_audio_ready();
            }
        }
    }

    coordinator.stop();
    tracing::debug!("Recorder loop finished");
}

fn handle_command(coordinator: &mut RecordingCoordinator, command: RecorderCommand) {
    match command {
        RecorderCommand::Start { output_path, reply } => {
            let _ = reply.send(coordinator.start(output_path));
        }
        RecorderCommand::Stop { reply } => {
            let _ = reply.send(coordinator.stop());
        }
        RecorderCommand::Pause { reply } => {
            let _ = reply.send(coordinator.pause());
        }
        RecorderCommand::Resume { reply } => {
            let _ = reply.send(coordinator.resume());
        }
        RecorderCommand::State { reply } => {
            let _ = reply.send((coordinator.state(), coordinator.elapsed_seconds()));
        }
    }
}
