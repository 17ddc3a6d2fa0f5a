//! Queued speech engine
//!
//! A front end calls [`SpeechEngine::speak`], [`SpeechEngine::pause`],
//! [`SpeechEngine::resume`] and [`SpeechEngine::stop`] from its own thread.
//! Requests go through a bounded queue to a single worker thread that owns
//! the model, synthesizes chunk by chunk, and waits on playback.
//!
//! Every request carries the generation it was issued in. `stop` and `speak`
//! bump the generation, so a request that has been superseded is dropped at
//! the next chunk boundary or playback poll instead of reaching the speaker.
//! The generation and the speaking/paused flags share one lock, which the
//! worker also holds while it hands audio to playback.

use crate::audio::playback::{Playback, SilentPlayback};
use crate::audio::{resample_audio, write_wav};
use crate::config::{clamp_speed, EngineConfig};
use crate::speech::model::{KokoroModel, SpeechModel, SynthesizedAudio};
use crate::speech::text::{normalize_text_for_tts, preview, split_into_chunks};
use crate::voice::{Voice, VoiceCatalog};
use crate::{MurmurError, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How long the worker blocks on the queue before rechecking shutdown
const QUEUE_WAIT: Duration = Duration::from_secs(1);

/// Builds the model on the worker thread
pub type ModelFactory = Box<dyn FnOnce() -> Result<Box<dyn SpeechModel>> + Send>;

/// A queued request to speak text
#[derive(Clone, Debug)]
pub(crate) struct SpeechRequest {
    pub id: Uuid,
    pub text: String,
    pub voice: Voice,
    pub speed: f32,
    generation: u64,
}

/// Commands consumed by the worker thread
pub(crate) enum EngineCommand {
    Speak(SpeechRequest),

    /// Synthesize to a WAV file and report the result
    Export {
        request: SpeechRequest,
        path: PathBuf,
        reply: Sender<Result<PathBuf>>,
    },

    Shutdown,
}

/// Progress notifications for front ends
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// Request accepted into the queue
    Queued { request_id: Uuid },

    /// Audio handed to playback
    Started {
        request_id: Uuid,
        duration_secs: f32,
    },

    /// Playback ran to the end
    Finished { request_id: Uuid },

    /// Playback or synthesis was cut short by `stop` or a newer request
    Stopped { request_id: Option<Uuid> },

    Paused,

    Resumed,

    Error {
        request_id: Option<Uuid>,
        error: String,
    },

    Shutdown,
}

#[derive(Debug, Default)]
struct Flags {
    generation: u64,
    speaking: bool,
    paused: bool,
}

/// State shared between the control surface and the worker
#[derive(Debug, Default)]
struct SharedState {
    flags: Mutex<Flags>,
    shutdown: AtomicBool,
}

impl SharedState {
    fn is_current(&self, generation: u64) -> bool {
        !self.shutdown.load(Ordering::SeqCst) && self.flags.lock().generation == generation
    }

    fn is_speaking(&self) -> bool {
        self.flags.lock().speaking
    }

    fn is_paused(&self) -> bool {
        self.flags.lock().paused
    }

    /// Clear `speaking` unless a newer request has been issued
    ///
    /// Returns whether `generation` was still current.
    fn finish(&self, generation: u64) -> bool {
        let mut flags = self.flags.lock();
        if flags.generation != generation {
            return false;
        }
        flags.speaking = false;
        flags.paused = false;
        true
    }
}

/// The text-to-speech engine behind the front end
pub struct SpeechEngine {
    config: EngineConfig,
    catalog: VoiceCatalog,
    current_voice: Mutex<Option<Voice>>,
    command_tx: Sender<EngineCommand>,
    command_rx: Receiver<EngineCommand>,
    event_rx: Receiver<EngineEvent>,
    event_tx: Sender<EngineEvent>,
    playback: Arc<dyn Playback>,
    state: Arc<SharedState>,
    worker: Mutex<Option<(JoinHandle<()>, Receiver<()>)>>,
    initialized: bool,
}

impl SpeechEngine {
    /// Load the Kokoro model and open the default audio device
    ///
    /// A failed model load leaves the engine constructed but uninitialized;
    /// every `speak` then fails with [`MurmurError::NotInitialized`].
    pub fn new(config: EngineConfig) -> Self {
        let playback = open_playback(&config);
        let model_config = config.model.clone();
        let accelerator = config.accelerator;

        let factory: ModelFactory = Box::new(move || {
            let model = KokoroModel::load(&model_config, accelerator)?;
            info!("Synthesis running on {:?}", model.accelerator());
            Ok(Box::new(model) as Box<dyn SpeechModel>)
        });

        Self::with_backend(config, factory, playback)
    }

    /// Build an engine around a caller-supplied model and playback backend
    pub fn with_backend(
        config: EngineConfig,
        model_factory: ModelFactory,
        playback: Arc<dyn Playback>,
    ) -> Self {
        let catalog = VoiceCatalog::builtin();
        let queue_size = config.queue_size.max(1);
        let (command_tx, command_rx) = bounded(queue_size);
        let (event_tx, event_rx) = bounded(queue_size * 8);
        let state = Arc::new(SharedState::default());

        let initial_voice = config
            .default_voice
            .as_deref()
            .and_then(|wanted| {
                let found = catalog.find(wanted).cloned();
                if found.is_none() {
                    warn!("Configured voice '{}' not found, using default", wanted);
                }
                found
            })
            .or_else(|| catalog.default_voice().cloned());

        let mut engine = Self {
            config,
            catalog,
            current_voice: Mutex::new(initial_voice),
            command_tx,
            command_rx,
            event_rx,
            event_tx,
            playback,
            state,
            worker: Mutex::new(None),
            initialized: false,
        };

        if let Err(e) = engine.config.validate() {
            error!("Invalid engine configuration: {}", e);
            return engine;
        }

        match engine.start_worker(model_factory) {
            Ok(()) => {
                engine.initialized = true;
                info!(
                    "Speech engine initialized with {} voices",
                    engine.catalog.len()
                );
            }
            Err(e) => {
                error!("Failed to initialize speech engine: {}", e);
                send_event(&engine.event_tx, EngineEvent::Error {
                    request_id: None,
                    error: e.to_string(),
                });
            }
        }

        engine
    }

    fn start_worker(&self, model_factory: ModelFactory) -> Result<()> {
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let (done_tx, done_rx) = bounded::<()>(0);

        let worker = Worker {
            command_rx: self.command_rx.clone(),
            event_tx: self.event_tx.clone(),
            playback: Arc::clone(&self.playback),
            state: Arc::clone(&self.state),
            output_sample_rate: self.config.output_sample_rate,
            max_chunk_chars: self.config.max_chunk_chars,
            poll_interval: self.config.poll_interval(),
        };

        let handle = thread::Builder::new()
            .name("murmur-tts".into())
            .spawn(move || {
                let _done = done_tx;

                let mut model = match model_factory() {
                    Ok(model) => model,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                worker.run(model.as_mut());
            })
            .map_err(|e| MurmurError::ChannelError(format!("Failed to spawn TTS worker: {}", e)))?;

        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(MurmurError::ModelLoadError(
                "TTS worker exited during startup".into(),
            ))
        });

        match ready {
            Ok(()) => {
                *self.worker.lock() = Some((handle, done_rx));
                Ok(())
            }
            Err(e) => {
                let _ = handle.join();
                Err(e)
            }
        }
    }

    /// Whether the model loaded and the worker is running
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn available_voices(&self) -> &[Voice] {
        self.catalog.voices()
    }

    pub fn current_voice(&self) -> Option<Voice> {
        self.current_voice.lock().clone()
    }

    /// Select a voice by exact display name; unknown names change nothing
    pub fn set_voice(&self, voice_name: &str) -> bool {
        match self.catalog.find_by_name(voice_name) {
            Some(voice) => {
                *self.current_voice.lock() = Some(voice.clone());
                info!("Voice changed to: {}", voice_name);
                true
            }
            None => {
                debug!("No voice named '{}'", voice_name);
                false
            }
        }
    }

    pub fn set_voice_by_code(&self, code: &str) -> bool {
        match self.catalog.find_by_code(code) {
            Some(voice) => {
                info!("Voice changed to: {}", voice.name);
                *self.current_voice.lock() = Some(voice.clone());
                true
            }
            None => false,
        }
    }

    pub fn default_speed(&self) -> f32 {
        self.config.default_speed
    }

    /// Queue `text` to be spoken, replacing anything already speaking
    ///
    /// Returns the id of the queued request.
    pub fn speak(&self, text: &str, speed: f32) -> Result<Uuid> {
        let request = self.prepare(text, speed)?;
        let request_id = request.id;

        let interrupted = {
            let mut flags = self.state.flags.lock();
            let interrupted = self.interrupt(&mut flags);
            self.enqueue(EngineCommand::Speak(SpeechRequest {
                generation: flags.generation,
                ..request
            }))?;
            flags.speaking = true;
            interrupted
        };

        if interrupted {
            send_event(&self.event_tx, EngineEvent::Stopped { request_id: None });
        }
        info!("Queued speech for: '{}'", preview(text.trim(), 50));
        send_event(&self.event_tx, EngineEvent::Queued { request_id });
        Ok(request_id)
    }

    /// Synthesize `text` with the current voice and write it to a WAV file
    ///
    /// Runs on the worker thread and blocks until the file is written.
    /// Does not interrupt speech already queued ahead of it.
    pub fn export_wav(&self, text: &str, speed: f32, path: impl Into<PathBuf>) -> Result<PathBuf> {
        let request = self.prepare(text, speed)?;
        let (reply_tx, reply_rx) = bounded(1);

        self.enqueue(EngineCommand::Export {
            request,
            path: path.into(),
            reply: reply_tx,
        })?;

        reply_rx.recv().map_err(|_| {
            MurmurError::ChannelError("Export was cancelled before it completed".into())
        })?
    }

    fn prepare(&self, text: &str, speed: f32) -> Result<SpeechRequest> {
        if !self.initialized {
            error!("TTS engine not initialized");
            return Err(MurmurError::NotInitialized);
        }
        if self.state.shutdown.load(Ordering::SeqCst) {
            return Err(MurmurError::ChannelError("Speech worker has stopped".into()));
        }

        let text = text.trim();
        if text.is_empty() {
            warn!("Empty text provided");
            return Err(MurmurError::EmptyText);
        }

        let voice = self
            .current_voice()
            .ok_or_else(|| MurmurError::UnknownVoice("no voice selected".into()))?;

        Ok(SpeechRequest {
            id: Uuid::new_v4(),
            text: text.to_string(),
            voice,
            speed: clamp_speed(speed),
            generation: self.state.flags.lock().generation,
        })
    }

    fn enqueue(&self, command: EngineCommand) -> Result<()> {
        self.command_tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => MurmurError::ChannelError("Speech queue is full".into()),
            TrySendError::Disconnected(_) => {
                MurmurError::ChannelError("Speech worker has stopped".into())
            }
        })
    }

    /// Pause playback; returns false when nothing is speaking
    ///
    /// Pausing while the request is still being synthesized holds the clip
    /// once it reaches playback.
    pub fn pause(&self) -> bool {
        {
            let mut flags = self.state.flags.lock();
            if !flags.speaking || flags.paused {
                return false;
            }
            self.playback.pause();
            flags.paused = true;
        }
        info!("TTS paused");
        send_event(&self.event_tx, EngineEvent::Paused);
        true
    }

    /// Resume paused playback; returns false when not paused
    pub fn resume(&self) -> bool {
        {
            let mut flags = self.state.flags.lock();
            if !flags.paused {
                return false;
            }
            self.playback.resume();
            flags.paused = false;
        }
        info!("TTS resumed");
        send_event(&self.event_tx, EngineEvent::Resumed);
        true
    }

    /// Pause if speaking, resume if paused; returns the new paused state
    pub fn toggle_pause(&self) -> bool {
        if self.is_paused() {
            self.resume();
        } else {
            self.pause();
        }
        self.is_paused()
    }

    /// Stop playback and drop every queued request
    pub fn stop(&self) {
        let interrupted = self.interrupt(&mut self.state.flags.lock());
        if interrupted {
            send_event(&self.event_tx, EngineEvent::Stopped { request_id: None });
        }
    }

    /// Invalidate everything issued so far, drain the queue and silence playback
    ///
    /// Runs under the flags lock. Returns true if speech was active or queued.
    fn interrupt(&self, flags: &mut Flags) -> bool {
        flags.generation += 1;

        let mut requeue_shutdown = false;
        let mut dropped = 0usize;
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                EngineCommand::Shutdown => requeue_shutdown = true,
                EngineCommand::Speak(_) | EngineCommand::Export { .. } => dropped += 1,
            }
        }
        if requeue_shutdown {
            let _ = self.command_tx.try_send(EngineCommand::Shutdown);
        }

        self.playback.stop();

        let was_speaking = flags.speaking;
        flags.speaking = false;
        flags.paused = false;

        if was_speaking || dropped > 0 {
            info!("TTS stopped ({} queued requests dropped)", dropped);
            return true;
        }
        false
    }

    /// True while speech is active and not paused
    pub fn is_speaking_now(&self) -> bool {
        let flags = self.state.flags.lock();
        flags.speaking && !flags.paused
    }

    pub fn is_speaking(&self) -> bool {
        self.state.is_speaking()
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    /// Number of requests waiting behind the one in flight
    pub fn pending(&self) -> usize {
        self.command_rx.len()
    }

    /// Receiver for progress events
    pub fn events(&self) -> Receiver<EngineEvent> {
        self.event_rx.clone()
    }

    /// Block until the current request finishes or `timeout` passes
    ///
    /// Returns true if speech finished in time.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.state.is_speaking() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(self.config.poll_interval().min(Duration::from_millis(20)));
        }
        true
    }

    /// Stop speech and shut the worker down
    ///
    /// Waits up to the configured shutdown timeout for the worker to exit.
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        let Some((handle, done_rx)) = self.worker.lock().take() else {
            return;
        };

        self.stop();
        self.state.shutdown.store(true, Ordering::SeqCst);
        let _ = self.command_tx.try_send(EngineCommand::Shutdown);

        match done_rx.recv_timeout(self.config.shutdown_timeout()) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                if handle.join().is_err() {
                    error!("TTS worker panicked");
                }
                info!("Speech engine shut down");
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("TTS worker did not exit in time, detaching it");
            }
        }

        self.playback.stop();
    }
}

impl Drop for SpeechEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn open_playback(config: &EngineConfig) -> Arc<dyn Playback> {
    if !config.enable_audio_output {
        info!("Audio output disabled, playback is silent");
        return Arc::new(SilentPlayback::new());
    }

    #[cfg(feature = "audio-io")]
    {
        match crate::audio::RodioPlayback::open() {
            Ok(playback) => return Arc::new(playback),
            Err(e) => warn!("{}; continuing without sound", e),
        }
    }

    #[cfg(not(feature = "audio-io"))]
    warn!("Built without audio output support; continuing without sound");

    Arc::new(SilentPlayback::new())
}

fn send_event(event_tx: &Sender<EngineEvent>, event: EngineEvent) {
    if let Err(TrySendError::Full(event)) = event_tx.try_send(event) {
        debug!("Event queue full, dropping {:?}", event);
    }
}

/// The worker side: owns the model, everything else is shared
struct Worker {
    command_rx: Receiver<EngineCommand>,
    event_tx: Sender<EngineEvent>,
    playback: Arc<dyn Playback>,
    state: Arc<SharedState>,
    output_sample_rate: u32,
    max_chunk_chars: usize,
    poll_interval: Duration,
}

/// Result of running a request through the model
enum Outcome {
    Done(SynthesizedAudio),
    Superseded,
}

impl Worker {
    fn run(&self, model: &mut dyn SpeechModel) {
        info!("TTS worker ready");

        while !self.state.shutdown.load(Ordering::SeqCst) {
            let command = match self.command_rx.recv_timeout(QUEUE_WAIT) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Command channel closed");
                    break;
                }
            };

            match command {
                EngineCommand::Speak(request) => self.speak(model, request),
                EngineCommand::Export {
                    request,
                    path,
                    reply,
                } => {
                    let result = self.export(model, &request, path);
                    if let Err(e) = &result {
                        warn!("Export failed: {}", e);
                    }
                    let _ = reply.send(result);
                }
                EngineCommand::Shutdown => break,
            }
        }

        info!("TTS worker stopped");
        send_event(&self.event_tx, EngineEvent::Shutdown);
    }

    fn speak(&self, model: &mut dyn SpeechModel, request: SpeechRequest) {
        let generation = request.generation;
        if !self.state.is_current(generation) {
            debug!("Skipping superseded request {}", request.id);
            return;
        }

        info!(
            "Synthesizing: '{}' using {} (speed: {}x)",
            preview(&request.text, 50),
            request.voice.name,
            request.speed
        );

        let audio = match self.synthesize(model, &request, true) {
            Ok(Outcome::Done(audio)) => audio,
            Ok(Outcome::Superseded) => {
                debug!("Request {} superseded during synthesis", request.id);
                send_event(&self.event_tx, EngineEvent::Stopped {
                    request_id: Some(request.id),
                });
                return;
            }
            Err(e) => {
                error!("Synthesis error: {}", e);
                send_event(&self.event_tx, EngineEvent::Error {
                    request_id: Some(request.id),
                    error: e.to_string(),
                });
                self.state.finish(generation);
                return;
            }
        };

        let duration_secs = audio.duration_secs();
        match self.start_playback(audio, generation) {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                error!("Audio playback error: {}", e);
                send_event(&self.event_tx, EngineEvent::Error {
                    request_id: Some(request.id),
                    error: e.to_string(),
                });
                self.state.finish(generation);
                return;
            }
            None => {
                debug!("Request {} superseded before playback", request.id);
                send_event(&self.event_tx, EngineEvent::Stopped {
                    request_id: Some(request.id),
                });
                return;
            }
        }

        send_event(&self.event_tx, EngineEvent::Started {
            request_id: request.id,
            duration_secs,
        });

        while self.playback.is_busy() && self.state.is_current(generation) {
            thread::sleep(self.poll_interval);
        }

        if self.state.finish(generation) {
            info!("Speech completed ({:.2}s)", duration_secs);
            send_event(&self.event_tx, EngineEvent::Finished {
                request_id: request.id,
            });
        } else {
            send_event(&self.event_tx, EngineEvent::Stopped {
                request_id: Some(request.id),
            });
        }
    }

    /// Hand audio to playback if `generation` is still current
    ///
    /// Holds the flags lock across the check and `play`, so a concurrent
    /// `stop` either prevents playback or stops it afterwards. A pause issued
    /// during synthesis is applied to the new clip. Returns `None` when the
    /// request was superseded.
    fn start_playback(&self, audio: SynthesizedAudio, generation: u64) -> Option<Result<()>> {
        let flags = self.state.flags.lock();
        if flags.generation != generation || self.state.shutdown.load(Ordering::SeqCst) {
            return None;
        }

        let result = self.playback.play(audio.samples, audio.sample_rate);
        if result.is_ok() && flags.paused {
            self.playback.pause();
        }
        Some(result)
    }

    fn export(
        &self,
        model: &mut dyn SpeechModel,
        request: &SpeechRequest,
        path: PathBuf,
    ) -> Result<PathBuf> {
        let audio = match self.synthesize(model, request, false)? {
            Outcome::Done(audio) => audio,
            Outcome::Superseded => {
                return Err(MurmurError::ChannelError("Export was cancelled".into()))
            }
        };
        write_wav(&path, &audio.samples, audio.sample_rate, 1)?;
        info!("Exported {:.2}s of speech to {}", audio.duration_secs(), path.display());
        Ok(path)
    }

    /// Run every chunk through the model and join the results
    ///
    /// With `cancellable`, a newer generation abandons the work between chunks.
    fn synthesize(
        &self,
        model: &mut dyn SpeechModel,
        request: &SpeechRequest,
        cancellable: bool,
    ) -> Result<Outcome> {
        let normalized = normalize_text_for_tts(&request.text);
        let chunks = split_into_chunks(&normalized, self.max_chunk_chars);
        if chunks.is_empty() {
            return Err(MurmurError::EmptyText);
        }

        let started = Instant::now();
        let mut audio = SynthesizedAudio::new(Vec::new(), model.sample_rate());

        for (index, chunk) in chunks.iter().enumerate() {
            if cancellable && !self.state.is_current(request.generation) {
                return Ok(Outcome::Superseded);
            }
            debug!("Chunk {}/{}: {}", index + 1, chunks.len(), preview(chunk, 40));
            audio.append(model.synthesize(chunk, &request.voice, request.speed)?)?;
        }

        if audio.is_empty() {
            return Err(MurmurError::SynthesisError("No audio generated".into()));
        }

        if audio.sample_rate != self.output_sample_rate {
            audio = SynthesizedAudio::new(
                resample_audio(&audio.samples, audio.sample_rate, self.output_sample_rate, 1)?,
                self.output_sample_rate,
            );
        }

        debug!(
            "Synthesized {:.2}s of audio in {:?}",
            audio.duration_secs(),
            started.elapsed()
        );

        Ok(Outcome::Done(audio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ToneModel;

    impl SpeechModel for ToneModel {
        fn synthesize(&mut self, text: &str, _voice: &Voice, _speed: f32) -> Result<SynthesizedAudio> {
            Ok(SynthesizedAudio::new(vec![0.1; text.len() * 10], 24000))
        }

        fn sample_rate(&self) -> u32 {
            24000
        }
    }

    fn engine() -> SpeechEngine {
        let config = EngineConfig::default()
            .without_audio_output()
            .with_poll_interval(Duration::from_millis(5));
        SpeechEngine::with_backend(
            config,
            Box::new(|| Ok(Box::new(ToneModel) as Box<dyn SpeechModel>)),
            Arc::new(SilentPlayback::new()),
        )
    }

    /// What `speak` does to the flags: new generation, speaking
    fn issue(state: &SharedState) -> u64 {
        let mut flags = state.flags.lock();
        flags.generation += 1;
        flags.speaking = true;
        flags.paused = false;
        flags.generation
    }

    #[test]
    fn test_generation_advance_invalidates() {
        let state = SharedState::default();
        assert!(state.is_current(0));
        let next = issue(&state);
        assert_eq!(next, 1);
        assert!(!state.is_current(0));
        assert!(state.is_current(1));

        state.shutdown.store(true, Ordering::SeqCst);
        assert!(!state.is_current(1));
    }

    #[test]
    fn test_finish_ignores_stale_generation() {
        let state = SharedState::default();
        let first = issue(&state);
        let second = issue(&state);
        assert!(!state.finish(first));
        assert!(state.is_speaking());
        assert!(state.finish(second));
        assert!(!state.is_speaking());
    }

    #[test]
    fn test_finish_racing_new_request_keeps_speaking() {
        let state = Arc::new(SharedState::default());
        for _ in 0..500 {
            let old = issue(&state);
            let worker_state = Arc::clone(&state);
            let worker = thread::spawn(move || worker_state.finish(old));
            let newest = issue(&state);
            worker.join().unwrap();

            assert!(state.is_current(newest));
            assert!(state.is_speaking(), "newest request lost its speaking flag");
        }
    }

    #[test]
    fn test_failed_model_leaves_engine_uninitialized() {
        let engine = SpeechEngine::with_backend(
            EngineConfig::default().without_audio_output(),
            Box::new(|| Err(MurmurError::ModelLoadError("missing".into()))),
            Arc::new(SilentPlayback::new()),
        );
        assert!(!engine.is_initialized());
        assert!(matches!(engine.speak("hello", 1.0), Err(MurmurError::NotInitialized)));
        assert!(!engine.is_speaking());
    }

    #[test]
    fn test_rejects_blank_text() {
        let engine = engine();
        assert!(engine.is_initialized());
        assert!(matches!(engine.speak("   \n", 1.0), Err(MurmurError::EmptyText)));
        assert!(!engine.is_speaking());
        assert_eq!(engine.pending(), 0);
    }

    #[test]
    fn test_pause_without_speech_is_noop() {
        let engine = engine();
        assert!(!engine.pause());
        assert!(!engine.resume());
        assert!(!engine.is_paused());
    }

    #[test]
    fn test_configured_default_voice() {
        let engine = SpeechEngine::with_backend(
            EngineConfig::default().without_audio_output().with_voice("bm_lewis"),
            Box::new(|| Ok(Box::new(ToneModel) as Box<dyn SpeechModel>)),
            Arc::new(SilentPlayback::new()),
        );
        assert_eq!(engine.current_voice().unwrap().code, "bm_lewis");
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let engine = engine();
        engine.shutdown();
        engine.shutdown();
        assert!(matches!(
            engine.speak("after shutdown", 1.0),
            Err(MurmurError::ChannelError(_))
        ));
    }
}
