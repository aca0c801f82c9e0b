//! Audio output: rodio playback on a blocking thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{SpeechClip, SpeechError};

/// Reported once per `play` unless the output is torn down.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Ended { playback_id: u64 },
    Failed { playback_id: u64, error: String },
}

impl PlaybackEvent {
    pub fn playback_id(&self) -> u64 {
        match self {
            Self::Ended { playback_id } | Self::Failed { playback_id, .. } => *playback_id,
        }
    }
}

/// Sink for speech clips. `play` must not block; completion is reported
/// through the event channel the implementation was built with.
pub trait AudioOutput: Send {
    fn play(&mut self, playback_id: u64, clip: Arc<SpeechClip>);

    /// Stop whatever is playing. No event is required for the stopped clip.
    fn stop(&mut self);
}

/// Plays clips through rodio on a blocking thread.
pub struct RodioOutput {
    volume: f32,
    device: Option<String>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    cancel: Option<Arc<AtomicBool>>,
}

impl RodioOutput {
    pub fn new(volume: f32, device: Option<String>) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let output = Self {
            volume,
            device,
            events: tx,
            cancel: None,
        };
        (output, rx)
    }
}

impl AudioOutput for RodioOutput {
    fn play(&mut self, playback_id: u64, clip: Arc<SpeechClip>) {
        self.stop();
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel = Some(cancel.clone());

        let volume = self.volume;
        let device = self.device.clone();
        let events = self.events.clone();

        tokio::task::spawn_blocking(move || {
            let result = play_samples_rodio(&clip, volume, device.as_deref(), &cancel);
            let event = match result {
                Ok(()) => PlaybackEvent::Ended { playback_id },
                Err(e) => {
                    warn!("Speech playback failed: {}", e);
                    PlaybackEvent::Failed {
                        playback_id,
                        error: e.to_string(),
                    }
                }
            };
            let _ = events.send(event);
        });
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.store(true, Ordering::SeqCst);
        }
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Open the named output device, falling back to the default one.
fn open_output_stream(device_name: Option<&str>) -> Result<(OutputStream, OutputStreamHandle), SpeechError> {
    if let Some(name) = device_name {
        let host = cpal::default_host();
        let device = host
            .output_devices()
            .map_err(|e| SpeechError::Playback(format!("failed to enumerate output devices: {}", e)))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false));

        match device {
            Some(dev) => {
                info!(device = %name, "Using configured output device");
                return OutputStream::try_from_device(&dev)
                    .map_err(|e| SpeechError::Playback(format!("failed to open '{}': {}", name, e)));
            }
            None => warn!(device = %name, "Configured output device not found, falling back to default"),
        }
    }
    OutputStream::try_default()
        .map_err(|e| SpeechError::Playback(format!("no audio output device available: {}", e)))
}

/// Blocks until the clip finishes or `cancel` is set (polled every 50ms).
fn play_samples_rodio(
    clip: &SpeechClip,
    volume: f32,
    device_name: Option<&str>,
    cancel: &AtomicBool,
) -> Result<(), SpeechError> {
    let (_stream, handle) = open_output_stream(device_name)?;
    let sink = Sink::try_new(&handle)
        .map_err(|e| SpeechError::Playback(format!("failed to create sink: {}", e)))?;

    sink.set_volume(volume.clamp(0.0, 2.0));
    sink.append(rodio::buffer::SamplesBuffer::new(1, clip.sample_rate, clip.samples.clone()));

    while !sink.empty() {
        if cancel.load(Ordering::SeqCst) {
            info!("Speech playback cancelled");
            sink.stop();
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    sink.sleep_until_end();
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id() {
        assert_eq!(PlaybackEvent::Ended { playback_id: 4 }.playback_id(), 4);
        let failed = PlaybackEvent::Failed {
            playback_id: 9,
            error: "device gone".into(),
        };
        assert_eq!(failed.playback_id(), 9);
    }
}
