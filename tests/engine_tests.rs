//! End-to-end tests for the speech engine
//!
//! The model and playback are replaced with scripted stand-ins so the
//! queue, cancellation and pause logic run without model files or a device.

use murmur::audio::{read_wav, Playback, SilentPlayback};
use murmur::speech::{SpeechModel, SynthesizedAudio};
use murmur::{EngineConfig, EngineEvent, Language, MurmurError, SpeechEngine, Voice};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Calls = Arc<Mutex<Vec<(String, Voice, f32)>>>;

/// Model that returns a fixed amount of audio per chunk and logs every call
struct ScriptedModel {
    calls: Calls,
    samples_per_chunk: usize,
    delay: Duration,
    fail_on: Option<&'static str>,
}

impl SpeechModel for ScriptedModel {
    fn synthesize(
        &mut self,
        text: &str,
        voice: &Voice,
        speed: f32,
    ) -> murmur::Result<SynthesizedAudio> {
        self.calls
            .lock()
            .push((text.to_string(), voice.clone(), speed));
        thread::sleep(self.delay);
        if let Some(marker) = self.fail_on {
            if text.contains(marker) {
                return Err(MurmurError::SynthesisError("scripted failure".into()));
            }
        }
        Ok(SynthesizedAudio::new(
            vec![0.25; self.samples_per_chunk],
            24000,
        ))
    }

    fn sample_rate(&self) -> u32 {
        24000
    }
}

/// Playback that forwards to `SilentPlayback` and remembers what it was asked to play
///
/// `start_delay` makes `play` slow to return, like a device sink that blocks
/// while it swaps clips.
#[derive(Default)]
struct RecordingPlayback {
    inner: SilentPlayback,
    played: Mutex<Vec<(usize, u32)>>,
    start_delay: Duration,
}

impl RecordingPlayback {
    fn lengths(&self) -> Vec<usize> {
        self.played.lock().iter().map(|(len, _)| *len).collect()
    }
}

impl Playback for RecordingPlayback {
    fn play(&self, samples: Vec<f32>, sample_rate: u32) -> murmur::Result<()> {
        self.played.lock().push((samples.len(), sample_rate));
        thread::sleep(self.start_delay);
        self.inner.play(samples, sample_rate)
    }

    fn pause(&self) {
        self.inner.pause()
    }

    fn resume(&self) {
        self.inner.resume()
    }

    fn stop(&self) {
        self.inner.stop()
    }

    fn is_busy(&self) -> bool {
        self.inner.is_busy()
    }

    fn is_paused(&self) -> bool {
        self.inner.is_paused()
    }
}

struct Harness {
    engine: SpeechEngine,
    calls: Calls,
    playback: Arc<RecordingPlayback>,
}

struct Setup {
    config: EngineConfig,
    samples_per_chunk: usize,
    delay: Duration,
    fail_on: Option<&'static str>,
    start_delay: Duration,
}

impl Setup {
    fn new(samples_per_chunk: usize) -> Self {
        Self {
            config: EngineConfig::default()
                .without_audio_output()
                .with_poll_interval(Duration::from_millis(5)),
            samples_per_chunk,
            delay: Duration::ZERO,
            fail_on: None,
            start_delay: Duration::ZERO,
        }
    }

    fn build(self) -> Harness {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let playback = Arc::new(RecordingPlayback {
            start_delay: self.start_delay,
            ..Default::default()
        });
        let model_calls = Arc::clone(&calls);
        let Setup {
            samples_per_chunk,
            delay,
            fail_on,
            ..
        } = self;

        let engine = SpeechEngine::with_backend(
            self.config,
            Box::new(move || {
                Ok(Box::new(ScriptedModel {
                    calls: model_calls,
                    samples_per_chunk,
                    delay,
                    fail_on,
                }) as Box<dyn SpeechModel>)
            }),
            playback.clone(),
        );

        Harness {
            engine,
            calls,
            playback,
        }
    }
}

fn harness(samples_per_chunk: usize, delay: Duration, fail_on: Option<&'static str>) -> Harness {
    Setup {
        delay,
        fail_on,
        ..Setup::new(samples_per_chunk)
    }
    .build()
}

fn wait_for(events: &crossbeam_channel::Receiver<EngineEvent>, pred: impl Fn(&EngineEvent) -> bool) -> Option<EngineEvent> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Ok(event) = events.recv_timeout(Duration::from_millis(50)) {
            if pred(&event) {
                return Some(event);
            }
        }
    }
    None
}

fn wait_until(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_speak_runs_to_completion() {
    let h = harness(1200, Duration::ZERO, None);
    let events = h.engine.events();

    let id = h.engine.speak("  Hello there. How are you?  ", 1.0).unwrap();
    assert!(h.engine.is_speaking_now());

    let finished = wait_for(&events, |e| matches!(e, EngineEvent::Finished { .. }));
    assert_eq!(finished, Some(EngineEvent::Finished { request_id: id }));
    assert!(h.engine.wait_until_idle(Duration::from_secs(1)));
    assert!(!h.engine.is_speaking());

    let calls = h.calls.lock();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "Hello there.");
    assert_eq!(calls[1].0, "How are you?");
    assert_eq!(calls[0].1.code, "af_heart");

    // Chunks are concatenated into a single clip
    assert_eq!(h.playback.lengths(), vec![2400]);
}

#[test]
fn test_speed_is_clamped() {
    let h = harness(24, Duration::ZERO, None);
    h.engine.speak("Fast", 5.0).unwrap();
    assert!(h.engine.wait_until_idle(Duration::from_secs(2)));
    assert_eq!(h.calls.lock()[0].2, 2.0);
}

#[test]
fn test_selected_voice_is_used() {
    let h = harness(24, Duration::ZERO, None);
    assert!(h.engine.set_voice("George (UK Male)"));
    assert!(!h.engine.set_voice("Nobody"));
    assert_eq!(h.engine.current_voice().unwrap().code, "bm_george");

    h.engine.speak("Cheers", 1.0).unwrap();
    assert!(h.engine.wait_until_idle(Duration::from_secs(2)));
    assert_eq!(h.calls.lock()[0].1.code, "bm_george");
}

#[test]
fn test_voice_language_reaches_model() {
    let h = harness(24, Duration::ZERO, None);

    assert!(h.engine.set_voice_by_code("bf_emma"));
    h.engine.speak("Lovely weather.", 1.0).unwrap();
    assert!(h.engine.wait_until_idle(Duration::from_secs(2)));

    assert!(h.engine.set_voice_by_code("am_adam"));
    h.engine.speak("Sure thing.", 1.0).unwrap();
    assert!(h.engine.wait_until_idle(Duration::from_secs(2)));

    let calls = h.calls.lock();
    assert_eq!(calls[0].1.language, Language::BritishEnglish);
    assert_eq!(calls[1].1.language, Language::AmericanEnglish);
}

#[test]
fn test_new_request_supersedes_old() {
    // Slow synthesis so the first request is still in flight when replaced
    let h = harness(240, Duration::from_millis(80), None);
    let events = h.engine.events();

    let first = h
        .engine
        .speak("One. Two. Three. Four. Five.", 1.0)
        .unwrap();
    thread::sleep(Duration::from_millis(100));
    let second = h.engine.speak("Replacement.", 1.0).unwrap();

    let finished = wait_for(&events, |e| matches!(e, EngineEvent::Finished { .. }));
    assert_eq!(finished, Some(EngineEvent::Finished { request_id: second }));
    assert_ne!(first, second);

    // The first request was abandoned between chunks and never played
    let calls = h.calls.lock();
    assert!(calls.len() < 6, "first request ran all chunks: {:?}", *calls);
    assert_eq!(calls.last().unwrap().0, "Replacement.");
    assert_eq!(h.playback.lengths(), vec![240]);
}

#[test]
fn test_stop_interrupts_playback_and_drains_queue() {
    // 2 seconds of audio
    let h = harness(48000, Duration::ZERO, None);
    let events = h.engine.events();
    let path = std::env::temp_dir().join(format!("murmur_drained_{}.wav", uuid::Uuid::new_v4()));

    let id = h.engine.speak("Long sentence.", 1.0).unwrap();
    assert!(wait_for(&events, |e| matches!(e, EngineEvent::Started { .. })).is_some());

    thread::scope(|scope| {
        // Queued behind the clip that is playing
        let export = scope.spawn(|| h.engine.export_wav("Later.", 1.0, &path));
        assert!(wait_until(|| h.engine.pending() == 1));

        h.engine.stop();
        assert!(!h.engine.is_speaking());
        assert!(!h.engine.is_paused());
        assert_eq!(h.engine.pending(), 0);
        assert!(!h.playback.is_busy());

        assert!(matches!(export.join().unwrap(), Err(MurmurError::ChannelError(_))));
    });

    let stopped = wait_for(&events, |e| {
        matches!(e, EngineEvent::Stopped { request_id: Some(_) })
    });
    assert_eq!(stopped, Some(EngineEvent::Stopped { request_id: Some(id) }));
    assert!(!path.exists());
}

#[test]
fn test_speak_cancels_queued_export() {
    let h = harness(240, Duration::from_millis(60), None);
    let events = h.engine.events();
    let path = std::env::temp_dir().join(format!("murmur_cancelled_{}.wav", uuid::Uuid::new_v4()));

    h.engine.speak("One. Two. Three. Four. Five.", 1.0).unwrap();

    let next = thread::scope(|scope| {
        let export = scope.spawn(|| h.engine.export_wav("Save me.", 1.0, &path));
        assert!(wait_until(|| h.engine.pending() == 1));

        let next = h.engine.speak("Next.", 1.0).unwrap();
        assert!(matches!(export.join().unwrap(), Err(MurmurError::ChannelError(_))));
        next
    });

    let finished = wait_for(&events, |e| matches!(e, EngineEvent::Finished { .. }));
    assert_eq!(finished, Some(EngineEvent::Finished { request_id: next }));
    assert!(h.calls.lock().iter().all(|(text, _, _)| text != "Save me."));
    assert!(!path.exists());
}

#[test]
fn test_stop_while_playback_is_starting() {
    // 1 second clip behind a sink that takes 100 ms to accept it
    let h = Setup {
        start_delay: Duration::from_millis(100),
        ..Setup::new(24000)
    }
    .build();
    let events = h.engine.events();

    let id = h.engine.speak("Hello.", 1.0).unwrap();
    assert!(wait_until(|| !h.playback.played.lock().is_empty()));

    h.engine.stop();
    thread::sleep(Duration::from_millis(300));

    assert!(!h.engine.is_speaking());
    assert!(!h.playback.is_busy(), "stopped request is still playing");
    assert!(!h.engine.pause());

    let stopped = wait_for(&events, |e| {
        matches!(e, EngineEvent::Stopped { request_id: Some(_) })
    });
    assert_eq!(stopped, Some(EngineEvent::Stopped { request_id: Some(id) }));
}

#[test]
fn test_pause_and_resume() {
    // 0.5 seconds of audio
    let h = harness(12000, Duration::ZERO, None);
    let events = h.engine.events();

    h.engine.speak("Pause me.", 1.0).unwrap();
    assert!(wait_for(&events, |e| matches!(e, EngineEvent::Started { .. })).is_some());

    assert!(h.engine.pause());
    assert!(!h.engine.pause());
    assert!(h.engine.is_paused());
    assert!(h.engine.is_speaking());
    assert!(!h.engine.is_speaking_now());

    // Paused audio does not run out
    thread::sleep(Duration::from_millis(600));
    assert!(h.engine.is_speaking());
    assert!(h.playback.is_busy());

    assert!(!h.engine.toggle_pause());
    assert!(h.engine.is_speaking_now());
    assert!(wait_for(&events, |e| matches!(e, EngineEvent::Finished { .. })).is_some());
}

#[test]
fn test_pause_during_synthesis_holds_clip() {
    // 0.2 seconds of audio, produced after 150 ms of synthesis
    let h = harness(4800, Duration::from_millis(150), None);
    let events = h.engine.events();

    h.engine.speak("Wait for it.", 1.0).unwrap();
    assert!(h.engine.pause());

    assert!(wait_for(&events, |e| matches!(e, EngineEvent::Started { .. })).is_some());
    thread::sleep(Duration::from_millis(400));
    assert!(h.playback.is_busy());
    assert!(h.playback.is_paused());
    assert!(h.engine.is_paused());
    assert!(h.engine.is_speaking());

    assert!(h.engine.resume());
    assert!(wait_for(&events, |e| matches!(e, EngineEvent::Finished { .. })).is_some());
    assert!(!h.engine.is_speaking());
}

#[test]
fn test_playback_is_resampled_to_output_rate() {
    let h = Setup {
        config: Setup::new(0).config.with_sample_rate(48000),
        ..Setup::new(1200)
    }
    .build();

    h.engine.speak("Hello there. How are you?", 1.0).unwrap();
    assert!(h.engine.wait_until_idle(Duration::from_secs(2)));

    // Two 1200-sample chunks at 24 kHz become one 4800-sample clip at 48 kHz
    assert_eq!(*h.playback.played.lock(), vec![(4800, 48000)]);
}

#[test]
fn test_synthesis_error_is_reported() {
    let h = harness(24, Duration::ZERO, Some("boom"));
    let events = h.engine.events();

    let id = h.engine.speak("This goes boom.", 1.0).unwrap();
    let error = wait_for(&events, |e| matches!(e, EngineEvent::Error { .. }));
    match error {
        Some(EngineEvent::Error { request_id, error }) => {
            assert_eq!(request_id, Some(id));
            assert!(error.contains("scripted failure"));
        }
        other => panic!("expected error event, got {:?}", other),
    }

    assert!(h.engine.wait_until_idle(Duration::from_secs(1)));
    assert!(h.playback.played.lock().is_empty());

    // The worker keeps serving requests after a failure
    h.engine.speak("Fine again.", 1.0).unwrap();
    assert!(wait_for(&events, |e| matches!(e, EngineEvent::Finished { .. })).is_some());
}

#[test]
fn test_text_without_speakable_content() {
    let h = harness(24, Duration::ZERO, None);
    let events = h.engine.events();

    h.engine.speak("*** ~~~", 1.0).unwrap();
    let error = wait_for(&events, |e| matches!(e, EngineEvent::Error { .. }));
    assert!(error.is_some());
    assert!(h.calls.lock().is_empty());
    assert!(h.engine.wait_until_idle(Duration::from_secs(1)));
}

#[test]
fn test_export_writes_wav() {
    let h = harness(2400, Duration::ZERO, None);
    let path = std::env::temp_dir().join(format!("murmur_export_{}.wav", uuid::Uuid::new_v4()));

    let written = h.engine.export_wav("Save this. And this.", 1.0, &path).unwrap();
    assert_eq!(written, path);
    assert!(h.playback.played.lock().is_empty());

    let (samples, rate, channels) = read_wav(&path).unwrap();
    assert_eq!(rate, 24000);
    assert_eq!(channels, 1);
    assert_eq!(samples.len(), 4800);

    let _ = std::fs::remove_file(path);
}

#[test]
fn test_uninitialized_engine() {
    let engine = SpeechEngine::with_backend(
        EngineConfig::default().without_audio_output(),
        Box::new(|| Err(MurmurError::ModelLoadError("no model".into()))),
        Arc::new(SilentPlayback::new()),
    );

    assert!(!engine.is_initialized());
    assert_eq!(engine.available_voices().len(), 18);
    assert!(matches!(
        engine.speak("hello", 1.0),
        Err(MurmurError::NotInitialized)
    ));
    assert!(matches!(
        engine.export_wav("hello", 1.0, "/tmp/never.wav"),
        Err(MurmurError::NotInitialized)
    ));
}

#[test]
fn test_shutdown_emits_event() {
    let h = harness(24, Duration::ZERO, None);
    let events = h.engine.events();
    h.engine.shutdown();
    assert_eq!(
        wait_for(&events, |e| matches!(e, EngineEvent::Shutdown)),
        Some(EngineEvent::Shutdown)
    );
}
