//! Microphone capture through cpal
//!
//! The device callback runs on cpal's own I/O thread. It converts whatever
//! sample type the device produces into s16le, appends the bytes to a shared
//! buffer and wakes the control loop through a [`Notify`]. The control loop
//! drains the buffer with [`AudioChannel::read_available`].

use crate::capture::traits::{AudioBackend, AudioChannel, AudioFormat};
use crate::utils::{RecorderError, RecorderResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, StreamConfig,
    SupportedStreamConfig, SupportedStreamConfigRange,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Sample formats the callback knows how to convert, best first
const CONVERTIBLE_FORMATS: [SampleFormat; 4] = [
    SampleFormat::I16,
    SampleFormat::F32,
    SampleFormat::I32,
    SampleFormat::U16,
];

/// Audio backend over the platform's default input device
#[derive(Default)]
pub struct CpalAudioBackend {
    negotiated: Option<(Device, SupportedStreamConfig)>,
}

impl CpalAudioBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioBackend for CpalAudioBackend {
    fn negotiate(&mut self, nominal: &AudioFormat) -> RecorderResult<AudioFormat> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| RecorderError::AudioInit("No default input device".to_string()))?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let ranges: Vec<SupportedStreamConfigRange> = device
            .supported_input_configs()
            .map_err(|e| {
                RecorderError::AudioInit(format!("Failed to query input configs: {}", e))
            })?
            .collect();

        let config = nearest_config(&ranges, nominal).ok_or_else(|| {
            RecorderError::AudioInit(format!(
                "Input device '{}' offers no convertible sample format",
                device_name
            ))
        })?;

        let format = AudioFormat {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            bits_per_sample: 16,
        };

        if format != *nominal {
            tracing::warn!(
                "Input device '{}' does not support {}Hz/{}ch, using {}Hz/{}ch",
                device_name,
                nominal.sample_rate,
                nominal.channels,
                format.sample_rate,
                format.channels
            );
        }

        tracing::info!(
            "Audio negotiated on '{}': {}Hz, {}ch, device samples {:?}",
            device_name,
            format.sample_rate,
            format.channels,
            config.sample_format()
        );

        self.negotiated = Some((device, config));
        Ok(format)
    }

    fn open(&mut self, ready: Arc<Notify>) -> RecorderResult<Box<dyn AudioChannel>> {
        let (device, config) = self
            .negotiated
            .clone()
            .ok_or_else(|| RecorderError::AudioInit("Audio format not negotiated".to_string()))?;

        let channel = MicrophoneChannel::open(device, config, ready)?;
        Ok(Box::new(channel))
    }
}

/// Choose the supported config closest to `nominal`.
///
/// Preference order: convertible sample format, matching channel count,
/// nominal rate inside the range, then the better sample format.
fn nearest_config(
    ranges: &[SupportedStreamConfigRange],
    nominal: &AudioFormat,
) -> Option<SupportedStreamConfig> {
    let best = ranges
        .iter()
        .filter_map(|range| {
            let format_rank = CONVERTIBLE_FORMATS
                .iter()
                .position(|f| *f == range.sample_format())?;
            let channel_miss = range.channels() != nominal.channels;
            let rate_miss = nominal.sample_rate < range.min_sample_rate().0
                || nominal.sample_rate > range.max_sample_rate().0;
            Some(((channel_miss, rate_miss, format_rank), range))
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, range)| range.clone())?;

    let rate = nominal
        .sample_rate
        .clamp(best.min_sample_rate().0, best.max_sample_rate().0);
    Some(best.with_sample_rate(SampleRate(rate)))
}

/// Live microphone stream
pub struct MicrophoneChannel {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<cpal::Stream>,
    buffer: Arc<Mutex<Vec<u8>>>,
    active: Arc<AtomicBool>,
    ready: Arc<Notify>,
}

impl MicrophoneChannel {
    fn open(
        device: Device,
        supported: SupportedStreamConfig,
        ready: Arc<Notify>,
    ) -> RecorderResult<Self> {
        let mut channel = Self {
            device,
            sample_format: supported.sample_format(),
            config: supported.into(),
            stream: None,
            buffer: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(AtomicBool::new(false)),
            ready,
        };
        channel.stream = Some(channel.build_stream()?);
        Ok(channel)
    }

    fn build_stream(&self) -> RecorderResult<cpal::Stream> {
        match self.sample_format {
            SampleFormat::I16 => self.build_typed::<i16>(),
            SampleFormat::F32 => self.build_typed::<f32>(),
            SampleFormat::I32 => self.build_typed::<i32>(),
            SampleFormat::U16 => self.build_typed::<u16>(),
            other => Err(RecorderError::AudioInit(format!(
                "Unsupported sample format {:?}",
                other
            ))),
        }
    }

    fn build_typed<T>(&self) -> RecorderResult<cpal::Stream>
    where
        T: SizedSample,
        i16: FromSample<T>,
    {
        let buffer = self.buffer.clone();
        let active = self.active.clone();
        let ready = self.ready.clone();

        self.device
            .build_input_stream(
                &self.config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    if !active.load(Ordering::Relaxed) {
                        return;
                    }
                    {
                        let mut buffer = buffer.lock();
                        buffer.reserve(data.len() * 2);
                        for &sample in data {
                            buffer.extend_from_slice(&i16::from_sample(sample).to_le_bytes());
                        }
                    }
                    ready.notify_one();
                },
                |err| tracing::error!("Microphone stream error: {}", err),
                None,
            )
            .map_err(|e| RecorderError::AudioInit(format!("Failed to build input stream: {}", e)))
    }
}

impl AudioChannel for MicrophoneChannel {
    fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.config.sample_rate.0,
            channels: self.config.channels,
            bits_per_sample: 16,
        }
    }

    fn start(&mut self) -> RecorderResult<()> {
        if self.stream.is_none() {
            self.stream = Some(self.build_stream()?);
        }
        self.active.store(true, Ordering::SeqCst);
        if let Some(stream) = &self.stream {
            stream.play().map_err(|e| {
                self.active.store(false, Ordering::SeqCst);
                RecorderError::AudioInit(format!("Failed to start input stream: {}", e))
            })?;
        }
        tracing::debug!("Microphone delivery started");
        Ok(())
    }

    fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                tracing::warn!("Failed to pause input stream: {}", e);
            }
        }
        self.buffer.lock().clear();
        tracing::debug!("Microphone delivery stopped");
    }

    fn read_available(&mut self) -> Vec<u8> {
        std::mem::take(&mut *self.buffer.lock())
    }
}
