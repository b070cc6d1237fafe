//! Recording coordinator
//!
//! The recorder state machine. Owns the encoder launcher, the audio backend,
//! the frame channel and the capture clock, and routes captured bytes to the
//! encoder only while in [`RecorderState::Recording`].
//!
//! All methods take `&mut self` and are called from a single control loop.
//! Notifications go out through a broadcast channel and never call back into
//! the coordinator, so an operation cannot be re-entered from a handler.

use super::clock::{Clock, Tick};
use super::state::{RecorderState, RecordingConfig, RecordingSession};
use crate::capture::screen::FrameCaptureChannel;
use crate::capture::traits::{AudioBackend, AudioChannel, AudioFormat};
use crate::encoder::types::{EncoderLauncher, EncoderSink, EncoderSpec, ShutdownOutcome};
use crate::utils::{RecorderError, RecorderResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Notify};

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// Elapsed recording time in seconds
    TimeUpdated(u64),
    /// A recording was finalised at this path
    Finished(PathBuf),
    /// Human-readable failure or warning
    Error(String),
}

/// Current time on the tokio clock, which tests may pause
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Resources held between `start()` and `stop()`
struct ActiveSession {
    info: RecordingSession,
    encoder: Box<dyn EncoderSink>,
    audio: Box<dyn AudioChannel>,
}

/// Drives one recording at a time
pub struct RecordingCoordinator {
    state: RecorderState,
    config: RecordingConfig,
    launcher: Box<dyn EncoderLauncher>,
    audio_backend: Box<dyn AudioBackend>,
    frames: FrameCaptureChannel,
    clock: Clock,
    session: Option<ActiveSession>,
    last_output: Option<PathBuf>,
    audio_ready: Arc<Notify>,
    event_tx: broadcast::Sender<RecorderEvent>,
}

impl RecordingCoordinator {
    pub fn new(
        config: RecordingConfig,
        launcher: Box<dyn EncoderLauncher>,
        audio_backend: Box<dyn AudioBackend>,
        frames: FrameCaptureChannel,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let clock = Clock::new(config.frame_period());
        Self {
            state: RecorderState::Stopped,
            config,
            launcher,
            audio_backend,
            frames,
            clock,
            session: None,
            last_output: None,
            audio_ready: Arc::new(Notify::new()),
            event_tx,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Subscribe to recorder notifications
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }

    /// The active session, if any
    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref().map(|s| &s.info)
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.session().map(|s| s.elapsed_seconds).unwrap_or(0)
    }

    /// Output path of the most recently finished recording
    pub fn last_output(&self) -> Option<&Path> {
        self.last_output.as_deref()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Signalled by the audio channel when samples are waiting
    pub fn audio_ready(&self) -> Arc<Notify> {
        self.audio_ready.clone()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<RecorderEvent> {
        self.event_tx.clone()
    }

    fn emit(&self, event: RecorderEvent) {
        let _ = self.event_tx.send(event);
    }

    fn fail<T>(&self, error: RecorderError) -> RecorderResult<T> {
        tracing::error!("{}", error);
        self.emit(RecorderEvent::Error(error.to_string()));
        Err(error)
    }

    /// Start a new recording. Valid only from `Stopped`.
    ///
    /// Every failure leaves the recorder `Stopped` with no encoder running.
    pub fn start(&mut self, output_path: Option<PathBuf>) -> RecorderResult<PathBuf> {
        if self.state != RecorderState::Stopped {
            return self.fail(RecorderError::AlreadyRecording);
        }

        let output_path = match self.config.resolve_output_path(output_path) {
            Ok(path) => path,
            Err(e) => return self.fail(e),
        };
        tracing::info!("Starting recording to: {:?}", output_path);

        if let Err(e) = self.launcher.probe() {
            return self.fail(e);
        }

        let audio_format = match self.audio_backend.negotiate(&AudioFormat::NOMINAL) {
            Ok(format) => format,
            Err(e) => return self.fail(e),
        };

        let spec = EncoderSpec::new(
            &self.config,
            self.frames.region(),
            audio_format,
            output_path.clone(),
        );
        let mut encoder = match self.launcher.launch(&spec) {
            Ok(encoder) => encoder,
            Err(e) => return self.fail(e),
        };

        let audio = self
            .audio_backend
            .open(self.audio_ready.clone())
            .and_then(|audio| {
                if audio.format() == audio_format {
                    Ok(audio)
                } else {
                    Err(RecorderError::AudioInit(format!(
                        "Audio channel delivers {:?}, encoder expects {:?}",
                        audio.format(),
                        audio_format
                    )))
                }
            })
            .and_then(|mut audio| audio.start().map(|_| audio));
        let audio = match audio {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!("Tearing down encoder after audio failure");
                encoder.shutdown(self.config.shutdown_timeout());
                return self.fail(e);
            }
        };

        let info = RecordingSession::new(output_path.clone(), audio_format);
        tracing::info!("Recording session {} started", info.id);
        self.session = Some(ActiveSession {
            info,
            encoder,
            audio,
        });

        self.emit(RecorderEvent::TimeUpdated(0));
        self.clock.start(now());
        self.state = RecorderState::Recording;
        Ok(output_path)
    }

    /// Stop and finalise the recording. A no-op when already stopped.
    ///
    /// Returns the output path of the finished recording.
    pub fn stop(&mut self) -> Option<PathBuf> {
        if self.state == RecorderState::Stopped {
            return None;
        }

        tracing::info!("Stopping recording");
        self.on_audio_ready();
        self.clock.stop();

        let mut output = None;
        if let Some(mut session) = self.session.take() {
            session.audio.stop();
            drop(session.audio);

            let timeout = self.config.shutdown_timeout();
            let problem = match session.encoder.shutdown(timeout) {
                ShutdownOutcome::Exited { success: true, .. } => None,
                ShutdownOutcome::Exited { success: false, code } => {
                    let code = code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
                    let detail = session
                        .encoder
                        .last_output_line()
                        .map(|line| format!(": {}", line))
                        .unwrap_or_default();
                    Some(format!(
                        "Encoder failed with exit code {}{}; {:?} may be unplayable",
                        code, detail, session.info.output_path
                    ))
                }
                ShutdownOutcome::Killed => Some(format!(
                    "Encoder did not finish within {}s and was terminated; {:?} may be incomplete",
                    timeout.as_secs(),
                    session.info.output_path
                )),
            };
            if let Some(message) = problem {
                tracing::warn!("{}", message);
                self.emit(RecorderEvent::Error(message));
            }

            tracing::info!(
                "Recording stopped. Duration: {}s, output: {:?}",
                session.info.elapsed_seconds,
                session.info.output_path
            );
            output = Some(session.info.output_path);
        }

        self.state = RecorderState::Stopped;
        self.last_output = output.clone();
        if let Some(path) = &output {
            self.emit(RecorderEvent::Finished(path.clone()));
        }
        output
    }

    /// Halt capture, keeping the encoder and its input open.
    ///
    /// Returns whether the state changed; a no-op outside `Recording`.
    pub fn pause(&mut self) -> bool {
        if self.state != RecorderState::Recording {
            tracing::debug!("Ignoring pause in state {:?}", self.state);
            return false;
        }

        tracing::info!("Pausing recording");
        self.on_audio_ready();
        self.clock.stop();
        if let Some(session) = self.session.as_mut() {
            session.audio.stop();
        }
        self.state = RecorderState::Paused;
        true
    }

    /// Continue a paused recording into the same encoder.
    ///
    /// Returns whether the state changed; a no-op outside `Paused`. If audio
    /// cannot be restarted the recorder stays paused.
    pub fn resume(&mut self) -> RecorderResult<bool> {
        if self.state != RecorderState::Paused {
            tracing::debug!("Ignoring resume in state {:?}", self.state);
            return Ok(false);
        }

        tracing::info!("Resuming recording");
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.audio.start() {
                return self.fail(e);
            }
        }
        self.clock.start(now());
        self.state = RecorderState::Recording;
        Ok(true)
    }

    /// Deliver every tick that is due at `now`
    pub fn poll_clock(&mut self, now: Instant) {
        while let Some(tick) = self.clock.poll(now) {
            match tick {
                Tick::Frame => {
                    self.on_frame_tick();
                }
                Tick::Second => self.on_time_tick(),
            }
        }
    }

    /// Capture one frame and forward it. Returns whether bytes reached the encoder.
    pub fn on_frame_tick(&mut self) -> bool {
        if self.state != RecorderState::Recording {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.encoder.is_running() {
            tracing::debug!("Encoder not running, dropping frame");
            return false;
        }
        match self.frames.capture() {
            Some(data) => session.encoder.write_video(&data),
            None => false,
        }
    }

    /// Advance elapsed time by one second
    pub fn on_time_tick(&mut self) {
        if self.state != RecorderState::Recording {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.info.elapsed_seconds += 1;
            let seconds = session.info.elapsed_seconds;
            self.emit(RecorderEvent::TimeUpdated(seconds));
        }
    }

    /// Drain buffered audio and forward it. Returns whether bytes reached the encoder.
    pub fn on_audio_ready(&mut self) -> bool {
        if self.state != RecorderState::Recording {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let data = session.audio.read_available();
        if data.is_empty() {
            return false;
        }
        if !session.encoder.is_running() {
            tracing::debug!("Encoder not running, dropping {} audio bytes", data.len());
            return false;
        }
        session.encoder.write_audio(&data)
    }
}

impl Drop for RecordingCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::traits::{Frame, FrameGrabber, ScreenRegion};
    use parking_lot::Mutex;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    const REGION: ScreenRegion = ScreenRegion {
        x: 0,
        y: 0,
        width: 4,
        height: 2,
    };

    /// Shared record of everything the mocks saw
    #[derive(Default)]
    struct Log {
        probes: usize,
        launches: usize,
        alive_encoders: usize,
        video_writes: usize,
        audio_writes: usize,
        shutdowns: usize,
        audio_negotiations: usize,
        audio_opens: usize,
        audio_starts: usize,
        audio_stops: usize,
        launched_specs: Vec<EncoderSpec>,
    }

    #[derive(Default)]
    struct Script {
        probe_fails: bool,
        launch_fails: bool,
        audio_open_fails: bool,
        shutdown_hangs: bool,
        shutdown_fails: bool,
        channel_format: Option<AudioFormat>,
        negotiated: Option<AudioFormat>,
    }

    struct MockLauncher {
        log: Arc<Mutex<Log>>,
        script: Arc<Mutex<Script>>,
    }

    impl EncoderLauncher for MockLauncher {
        fn probe(&self) -> RecorderResult<String> {
            self.log.lock().probes += 1;
            if self.script.lock().probe_fails {
                return Err(RecorderError::EncoderUnavailable("not installed".to_string()));
            }
            Ok("mock version 1".to_string())
        }

        fn launch(&self, spec: &EncoderSpec) -> RecorderResult<Box<dyn EncoderSink>> {
            if self.script.lock().launch_fails {
                return Err(RecorderError::EncoderLaunch("spawn failed".to_string()));
            }
            let mut log = self.log.lock();
            log.launches += 1;
            log.alive_encoders += 1;
            log.launched_specs.push(spec.clone());
            Ok(Box::new(MockEncoder {
                log: self.log.clone(),
                script: self.script.clone(),
                running: true,
            }))
        }
    }

    struct MockEncoder {
        log: Arc<Mutex<Log>>,
        script: Arc<Mutex<Script>>,
        running: bool,
    }

    impl EncoderSink for MockEncoder {
        fn is_running(&mut self) -> bool {
            self.running
        }

        fn last_output_line(&self) -> Option<String> {
            Some("pipe:0: Invalid data found when processing input".to_string())
        }

        fn write_video(&mut self, _data: &[u8]) -> bool {
            if !self.running {
                return false;
            }
            self.log.lock().video_writes += 1;
            true
        }

        fn write_audio(&mut self, _data: &[u8]) -> bool {
            if !self.running {
                return false;
            }
            self.log.lock().audio_writes += 1;
            true
        }

        fn shutdown(&mut self, _timeout: Duration) -> ShutdownOutcome {
            let mut log = self.log.lock();
            log.shutdowns += 1;
            if self.running {
                log.alive_encoders -= 1;
            }
            self.running = false;
            let script = self.script.lock();
            if script.shutdown_hangs {
                ShutdownOutcome::Killed
            } else if script.shutdown_fails {
                ShutdownOutcome::Exited {
                    success: false,
                    code: Some(1),
                }
            } else {
                ShutdownOutcome::Exited {
                    success: true,
                    code: Some(0),
                }
            }
        }
    }

    struct MockAudioBackend {
        log: Arc<Mutex<Log>>,
        script: Arc<Mutex<Script>>,
        pending: Arc<Mutex<Vec<u8>>>,
        format: AudioFormat,
    }

    impl AudioBackend for MockAudioBackend {
        fn negotiate(&mut self, nominal: &AudioFormat) -> RecorderResult<AudioFormat> {
            self.log.lock().audio_negotiations += 1;
            self.format = self.script.lock().negotiated.unwrap_or(*nominal);
            Ok(self.format)
        }

        fn open(&mut self, _ready: Arc<Notify>) -> RecorderResult<Box<dyn AudioChannel>> {
            if self.script.lock().audio_open_fails {
                return Err(RecorderError::AudioInit("no microphone".to_string()));
            }
            self.log.lock().audio_opens += 1;
            Ok(Box::new(MockAudioChannel {
                log: self.log.clone(),
                pending: self.pending.clone(),
                format: self.script.lock().channel_format.unwrap_or(self.format),
            }))
        }
    }

    struct MockAudioChannel {
        log: Arc<Mutex<Log>>,
        pending: Arc<Mutex<Vec<u8>>>,
        format: AudioFormat,
    }

    impl AudioChannel for MockAudioChannel {
        fn format(&self) -> AudioFormat {
            self.format
        }

        fn start(&mut self) -> RecorderResult<()> {
            self.log.lock().audio_starts += 1;
            // anything pushed while halted was never captured
            self.pending.lock().clear();
            Ok(())
        }

        fn stop(&mut self) {
            self.log.lock().audio_stops += 1;
            self.pending.lock().clear();
        }

        fn read_available(&mut self) -> Vec<u8> {
            std::mem::take(&mut *self.pending.lock())
        }
    }

    struct SolidGrabber;

    impl FrameGrabber for SolidGrabber {
        fn grab(&mut self, region: &ScreenRegion) -> Option<Frame> {
            Some(Frame {
                width: region.width,
                height: region.height,
                data: vec![0x80; region.frame_len()],
            })
        }
    }

    struct Harness {
        recorder: RecordingCoordinator,
        events: broadcast::Receiver<RecorderEvent>,
        log: Arc<Mutex<Log>>,
        script: Arc<Mutex<Script>>,
        pending_audio: Arc<Mutex<Vec<u8>>>,
        dir: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let log = Arc::new(Mutex::new(Log::default()));
            let script = Arc::new(Mutex::new(Script::default()));
            let pending_audio = Arc::new(Mutex::new(Vec::new()));
            let config = RecordingConfig {
                recordings_dir: dir.path().join("recordings"),
                ..Default::default()
            };
            let recorder = RecordingCoordinator::new(
                config,
                Box::new(MockLauncher {
                    log: log.clone(),
                    script: script.clone(),
                }),
                Box::new(MockAudioBackend {
                    log: log.clone(),
                    script: script.clone(),
                    pending: pending_audio.clone(),
                    format: AudioFormat::NOMINAL,
                }),
                FrameCaptureChannel::new(Box::new(SolidGrabber), REGION),
            );
            let events = recorder.subscribe();
            Self {
                recorder,
                events,
                log,
                script,
                pending_audio,
                dir,
            }
        }

        fn output(&self) -> PathBuf {
            self.dir.path().join("out.mp4")
        }

        fn push_audio(&self, bytes: usize) {
            self.pending_audio.lock().extend(std::iter::repeat(1u8).take(bytes));
        }

        fn drain_events(&mut self) -> Vec<RecorderEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                events.push(event);
            }
            events
        }
    }

    #[test]
    fn test_start_enters_recording_and_reports_zero() {
        let mut h = Harness::new();
        let path = h.recorder.start(Some(h.output())).unwrap();

        assert_eq!(path, h.output());
        assert_eq!(h.recorder.state(), RecorderState::Recording);
        assert!(h.recorder.clock().is_running());
        assert_eq!(h.drain_events(), vec![RecorderEvent::TimeUpdated(0)]);

        let log = h.log.lock();
        assert_eq!(log.launches, 1);
        assert_eq!(log.audio_opens, 1);
        assert_eq!(log.audio_starts, 1);
        assert_eq!(log.launched_specs[0].width, 4);
        assert_eq!(log.launched_specs[0].height, 2);
    }

    #[test]
    fn test_start_without_path_generates_one() {
        let mut h = Harness::new();
        let path = h.recorder.start(None).unwrap();

        assert!(path.starts_with(h.dir.path().join("recordings")));
        assert!(h.dir.path().join("recordings").is_dir());
        assert_eq!(h.recorder.session().unwrap().output_path, path);
    }

    #[test]
    fn test_second_start_is_rejected_and_keeps_one_encoder() {
        let mut h = Harness::new();
        h.recorder.start(Some(h.output())).unwrap();
        h.drain_events();

        let err = h.recorder.start(Some(h.output())).unwrap_err();

        assert!(matches!(err, RecorderError::AlreadyRecording));
        assert_eq!(h.recorder.state(), RecorderState::Recording);
        assert_eq!(h.log.lock().alive_encoders, 1);
        assert_eq!(h.log.lock().launches, 1);
        assert!(matches!(h.drain_events().as_slice(), [RecorderEvent::Error(_)]));
    }

    #[test]
    fn test_start_while_paused_is_rejected() {
        let mut h = Harness::new();
        h.recorder.start(Some(h.output())).unwrap();
        h.recorder.pause();

        assert!(matches!(
            h.recorder.start(None),
            Err(RecorderError::AlreadyRecording)
        ));
        assert_eq!(h.recorder.state(), RecorderState::Paused);
    }

    #[test]
    fn test_unavailable_encoder_leaves_audio_untouched() {
        let mut h = Harness::new();
        h.script.lock().probe_fails = true;

        let err = h.recorder.start(Some(h.output())).unwrap_err();

        assert!(matches!(err, RecorderError::EncoderUnavailable(_)));
        assert_eq!(h.recorder.state(), RecorderState::Stopped);
        let log = h.log.lock();
        assert_eq!(log.audio_negotiations, 0);
        assert_eq!(log.audio_opens, 0);
        assert_eq!(log.launches, 0);
    }

    #[test]
    fn test_launch_failure_stays_stopped() {
        let mut h = Harness::new();
        h.script.lock().launch_fails = true;

        let err = h.recorder.start(Some(h.output())).unwrap_err();

        assert!(matches!(err, RecorderError::EncoderLaunch(_)));
        assert_eq!(h.recorder.state(), RecorderState::Stopped);
        assert_eq!(h.log.lock().audio_opens, 0);
        assert!(matches!(h.drain_events().as_slice(), [RecorderEvent::Error(_)]));
    }

    #[test]
    fn test_audio_failure_tears_down_encoder() {
        let mut h = Harness::new();
        h.script.lock().audio_open_fails = true;

        let err = h.recorder.start(Some(h.output())).unwrap_err();

        assert!(matches!(err, RecorderError::AudioInit(_)));
        assert_eq!(h.recorder.state(), RecorderState::Stopped);
        assert!(!h.recorder.clock().is_running());
        let log = h.log.lock();
        assert_eq!(log.launches, 1);
        assert_eq!(log.shutdowns, 1);
        assert_eq!(log.alive_encoders, 0);
    }

    #[test]
    fn test_negotiated_format_reaches_encoder() {
        let mut h = Harness::new();
        let downgraded = AudioFormat {
            sample_rate: 48_000,
            channels: 1,
            bits_per_sample: 16,
        };
        h.script.lock().negotiated = Some(downgraded);

        h.recorder.start(Some(h.output())).unwrap();

        assert_eq!(h.log.lock().launched_specs[0].audio, downgraded);
        assert_eq!(h.recorder.session().unwrap().audio_format, downgraded);
    }

    #[test]
    fn test_transitions_outside_valid_states_are_noops() {
        let mut h = Harness::new();

        assert!(!h.recorder.pause());
        assert_eq!(h.recorder.state(), RecorderState::Stopped);
        assert!(!h.recorder.resume().unwrap());
        assert_eq!(h.recorder.state(), RecorderState::Stopped);
        assert!(h.recorder.stop().is_none());
        assert_eq!(h.recorder.state(), RecorderState::Stopped);

        h.recorder.start(Some(h.output())).unwrap();
        assert!(!h.recorder.resume().unwrap());
        assert_eq!(h.recorder.state(), RecorderState::Recording);

        assert!(h.recorder.pause());
        assert!(!h.recorder.pause());
        assert_eq!(h.recorder.state(), RecorderState::Paused);

        assert!(h.recorder.resume().unwrap());
        assert_eq!(h.recorder.state(), RecorderState::Recording);
    }

    #[test]
    fn test_stop_from_paused() {
        let mut h = Harness::new();
        h.recorder.start(Some(h.output())).unwrap();
        h.recorder.pause();

        assert_eq!(h.recorder.stop(), Some(h.output()));
        assert_eq!(h.recorder.state(), RecorderState::Stopped);
        assert_eq!(h.log.lock().alive_encoders, 0);
    }

    #[test]
    fn test_pause_keeps_encoder_alive() {
        let mut h = Harness::new();
        h.recorder.start(Some(h.output())).unwrap();
        h.recorder.pause();

        let log = h.log.lock();
        assert_eq!(log.alive_encoders, 1);
        assert_eq!(log.shutdowns, 0);
        assert_eq!(log.audio_stops, 1);
        drop(log);
        assert!(!h.recorder.clock().is_running());
    }

    #[test]
    fn test_elapsed_time_freezes_on_pause_and_continues() {
        let mut h = Harness::new();
        h.recorder.start(Some(h.output())).unwrap();

        h.recorder.on_time_tick();
        h.recorder.on_time_tick();
        assert_eq!(h.recorder.elapsed_seconds(), 2);

        h.recorder.pause();
        h.recorder.on_time_tick();
        assert_eq!(h.recorder.elapsed_seconds(), 2);

        h.recorder.resume().unwrap();
        h.recorder.on_time_tick();
        assert_eq!(h.recorder.elapsed_seconds(), 3);

        assert_eq!(
            h.drain_events(),
            vec![
                RecorderEvent::TimeUpdated(0),
                RecorderEvent::TimeUpdated(1),
                RecorderEvent::TimeUpdated(2),
                RecorderEvent::TimeUpdated(3),
            ]
        );
    }

    #[test]
    fn test_restart_resets_elapsed_time() {
        let mut h = Harness::new();
        h.recorder.start(Some(h.output())).unwrap();
        h.recorder.on_time_tick();
        h.recorder.stop();

        h.recorder.start(Some(h.output())).unwrap();
        assert_eq!(h.recorder.elapsed_seconds(), 0);
        assert_eq!(h.log.lock().launches, 2);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut h = Harness::new();
        h.recorder.start(Some(h.output())).unwrap();
        h.drain_events();

        assert_eq!(h.recorder.stop(), Some(h.output()));
        assert_eq!(h.recorder.stop(), None);

        assert_eq!(h.drain_events(), vec![RecorderEvent::Finished(h.output())]);
        assert_eq!(h.recorder.last_output(), Some(h.output().as_path()));
        assert_eq!(h.log.lock().shutdowns, 1);
    }

    #[test]
    fn test_shutdown_timeout_is_a_warning() {
        let mut h = Harness::new();
        h.script.lock().shutdown_hangs = true;
        h.recorder.start(Some(h.output())).unwrap();
        h.drain_events();

        assert_eq!(h.recorder.stop(), Some(h.output()));

        let events = h.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], RecorderEvent::Error(_)));
        assert_eq!(events[1], RecorderEvent::Finished(h.output()));
        assert_eq!(h.recorder.state(), RecorderState::Stopped);
    }

    #[test]
    fn test_encoder_failure_is_reported_on_stop() {
        let mut h = Harness::new();
        h.recorder.start(Some(h.output())).unwrap();
        h.drain_events();
        // encoder died mid-recording; writes are dropped silently until stop
        h.script.lock().shutdown_fails = true;
        if let Some(session) = h.recorder.session.as_mut() {
            session.encoder.shutdown(Duration::from_secs(0));
        }
        assert!(!h.recorder.on_frame_tick());
        assert!(h.drain_events().is_empty());

        assert_eq!(h.recorder.stop(), Some(h.output()));

        let events = h.drain_events();
        assert_eq!(events.len(), 2);
        match &events[0] {
            RecorderEvent::Error(message) => {
                assert!(message.contains("exit code 1"));
                assert!(message.contains("Invalid data found"));
            }
            other => panic!("expected an error event, got {:?}", other),
        }
        assert_eq!(events[1], RecorderEvent::Finished(h.output()));
    }

    #[test]
    fn test_buffered_audio_is_flushed_on_pause_and_stop() {
        let mut h = Harness::new();
        h.recorder.start(Some(h.output())).unwrap();

        h.push_audio(64);
        h.recorder.pause();
        assert_eq!(h.log.lock().audio_writes, 1);

        h.recorder.resume().unwrap();
        h.push_audio(64);
        h.recorder.stop();

        let log = h.log.lock();
        assert_eq!(log.audio_writes, 2);
        assert_eq!(log.shutdowns, 1);
    }

    #[test]
    fn test_channel_format_mismatch_aborts_start() {
        let mut h = Harness::new();
        h.script.lock().channel_format = Some(AudioFormat {
            sample_rate: 22_050,
            channels: 1,
            bits_per_sample: 16,
        });

        let err = h.recorder.start(Some(h.output())).unwrap_err();

        assert!(matches!(err, RecorderError::AudioInit(_)));
        assert_eq!(h.recorder.state(), RecorderState::Stopped);
        let log = h.log.lock();
        assert_eq!(log.audio_starts, 0);
        assert_eq!(log.alive_encoders, 0);
    }

    #[test]
    fn test_ticks_outside_recording_are_discarded() {
        let mut h = Harness::new();
        assert!(!h.recorder.on_frame_tick());
        h.push_audio(64);
        assert!(!h.recorder.on_audio_ready());
        assert_eq!(h.log.lock().video_writes, 0);
        assert_eq!(h.log.lock().audio_writes, 0);
    }

    #[test]
    fn test_writes_dropped_when_encoder_died() {
        let mut h = Harness::new();
        h.recorder.start(Some(h.output())).unwrap();
        if let Some(session) = h.recorder.session.as_mut() {
            session.encoder.shutdown(Duration::from_secs(0));
        }

        assert!(!h.recorder.on_frame_tick());
        h.push_audio(16);
        assert!(!h.recorder.on_audio_ready());
        assert_eq!(h.recorder.state(), RecorderState::Recording);
        assert_eq!(h.log.lock().video_writes, 0);
    }

    #[test]
    fn test_empty_audio_notification_writes_nothing() {
        let mut h = Harness::new();
        h.recorder.start(Some(h.output())).unwrap();
        assert!(!h.recorder.on_audio_ready());
        assert_eq!(h.log.lock().audio_writes, 0);
    }

    #[test]
    fn test_pause_resume_scenario_write_counts() {
        let mut h = Harness::new();
        h.recorder.start(Some(h.output())).unwrap();

        for _ in 0..3 {
            assert!(h.recorder.on_frame_tick());
        }
        for _ in 0..2 {
            h.push_audio(128);
            assert!(h.recorder.on_audio_ready());
        }

        h.recorder.pause();
        for _ in 0..5 {
            assert!(!h.recorder.on_frame_tick());
            h.recorder.on_time_tick();
        }
        h.push_audio(128);
        assert!(!h.recorder.on_audio_ready());

        h.recorder.resume().unwrap();
        for _ in 0..2 {
            assert!(h.recorder.on_frame_tick());
        }

        assert_eq!(h.recorder.stop(), Some(h.output()));

        let log = h.log.lock();
        assert_eq!(log.video_writes, 5);
        assert_eq!(log.audio_writes, 2);
        drop(log);

        let finished: Vec<_> = h
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, RecorderEvent::Finished(_)))
            .collect();
        assert_eq!(finished, vec![RecorderEvent::Finished(h.output())]);
    }

    #[test]
    fn test_poll_clock_delivers_due_ticks() {
        let mut h = Harness::new();
        h.recorder.start(Some(h.output())).unwrap();

        h.recorder.poll_clock(Instant::now() + Duration::from_millis(1010));

        assert_eq!(h.recorder.elapsed_seconds(), 1);
        assert_eq!(h.log.lock().video_writes, 1);
    }

    #[test]
    fn test_drop_stops_active_recording() {
        let h = Harness::new();
        let log = h.log.clone();
        let Harness {
            mut recorder,
            dir: _dir,
            ..
        } = h;
        recorder.start(None).unwrap();
        drop(recorder);
        assert_eq!(log.lock().alive_encoders, 0);
    }
}
