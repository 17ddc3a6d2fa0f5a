//! Audio playback backends
//!
//! The synthesis worker hands finished PCM to a [`Playback`] and then polls
//! it until the clip has played out; the control surface pauses, resumes and
//! stops the same backend from the caller's thread.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// A sink for mono float PCM that can be paused and stopped from any thread
pub trait Playback: Send + Sync {
    /// Replace whatever is playing with `samples`. A paused backend stays paused.
    fn play(&self, samples: Vec<f32>, sample_rate: u32) -> crate::Result<()>;

    fn pause(&self);

    fn resume(&self);

    /// Drop the current clip and clear the paused state
    fn stop(&self);

    /// True while a clip still has audio left (including while paused)
    fn is_busy(&self) -> bool;

    fn is_paused(&self) -> bool;
}

#[derive(Debug)]
struct Clip {
    remaining: Duration,
    resumed_at: Option<Instant>,
}

impl Clip {
    fn left(&self) -> Duration {
        match self.resumed_at {
            Some(at) => self.remaining.saturating_sub(at.elapsed()),
            None => self.remaining,
        }
    }
}

#[derive(Debug, Default)]
struct SilentState {
    clip: Option<Clip>,
    paused: bool,
}

/// Playback that keeps real-time pacing but never touches an audio device
///
/// Used when audio output is disabled or no device is available.
#[derive(Debug, Default)]
pub struct SilentPlayback {
    state: Mutex<SilentState>,
}

impl SilentPlayback {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Playback for SilentPlayback {
    fn play(&self, samples: Vec<f32>, sample_rate: u32) -> crate::Result<()> {
        let secs = if sample_rate == 0 {
            0.0
        } else {
            samples.len() as f64 / sample_rate as f64
        };
        let mut state = self.state.lock();
        let resumed_at = if state.paused { None } else { Some(Instant::now()) };
        state.clip = Some(Clip {
            remaining: Duration::from_secs_f64(secs),
            resumed_at,
        });
        debug!("Silent playback of {:.2}s", secs);
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        if state.paused {
            return;
        }
        state.paused = true;
        if let Some(clip) = state.clip.as_mut() {
            clip.remaining = clip.left();
            clip.resumed_at = None;
        }
    }

    fn resume(&self) {
        let mut state = self.state.lock();
        if !state.paused {
            return;
        }
        state.paused = false;
        if let Some(clip) = state.clip.as_mut() {
            clip.resumed_at = Some(Instant::now());
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.clip = None;
        state.paused = false;
    }

    fn is_busy(&self) -> bool {
        self.state
            .lock()
            .clip
            .as_ref()
            .map(|c| !c.left().is_zero())
            .unwrap_or(false)
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }
}

#[cfg(feature = "audio-io")]
pub use rodio_backend::RodioPlayback;

#[cfg(feature = "audio-io")]
mod rodio_backend {
    use super::Playback;
    use crate::{MurmurError, Result};
    use crossbeam_channel::{bounded, Sender};
    use rodio::buffer::SamplesBuffer;
    use rodio::{OutputStream, Sink};
    use std::sync::Arc;
    use std::thread;
    use tracing::{error, info};

    /// Playback through the default output device via rodio
    ///
    /// `OutputStream` is not `Send`, so it is opened and kept alive on its own
    /// thread; only the `Sink` is shared. Dropping this value releases the stream.
    pub struct RodioPlayback {
        sink: Arc<Sink>,
        _keepalive: Sender<()>,
    }

    impl RodioPlayback {
        pub fn open() -> Result<Self> {
            let (ready_tx, ready_rx) = bounded::<Result<Arc<Sink>>>(1);
            let (keepalive_tx, keepalive_rx) = bounded::<()>(0);

            thread::Builder::new()
                .name("murmur-audio".into())
                .spawn(move || {
                    let (stream, handle) = match OutputStream::try_default() {
                        Ok(pair) => pair,
                        Err(e) => {
                            let _ = ready_tx.send(Err(MurmurError::AudioDeviceError(format!(
                                "No output device available: {}",
                                e
                            ))));
                            return;
                        }
                    };

                    match Sink::try_new(&handle) {
                        Ok(sink) => {
                            let _ = ready_tx.send(Ok(Arc::new(sink)));
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(MurmurError::AudioDeviceError(format!(
                                "Failed to create audio sink: {}",
                                e
                            ))));
                            return;
                        }
                    }

                    // Blocks until the owning RodioPlayback is dropped
                    let _ = keepalive_rx.recv();
                    drop(stream);
                    info!("Audio output stream closed");
                })
                .map_err(|e| MurmurError::AudioDeviceError(format!("Failed to spawn audio thread: {}", e)))?;

            let sink = ready_rx.recv().map_err(|_| {
                error!("Audio thread exited before opening the output stream");
                MurmurError::AudioDeviceError("Audio thread exited unexpectedly".into())
            })??;

            info!("Opened default audio output device");

            Ok(Self {
                sink,
                _keepalive: keepalive_tx,
            })
        }
    }

    impl Playback for RodioPlayback {
        fn play(&self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
            if sample_rate == 0 {
                return Err(MurmurError::AudioProcessingError(
                    "Sample rate must be greater than 0".into(),
                ));
            }
            self.sink.stop();
            self.sink.append(SamplesBuffer::new(1, sample_rate, samples));
            Ok(())
        }

        fn pause(&self) {
            self.sink.pause();
        }

        fn resume(&self) {
            self.sink.play();
        }

        fn stop(&self) {
            self.sink.stop();
            self.sink.play();
        }

        fn is_busy(&self) -> bool {
            !self.sink.empty()
        }

        fn is_paused(&self) -> bool {
            self.sink.is_paused()
        }
    }
}
