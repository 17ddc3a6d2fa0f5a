//! The neural model seam
//!
//! [`SpeechModel`] is everything the worker needs from a synthesizer.
//! [`KokoroModel`] implements it over sherpa-rs' Kokoro ONNX runtime, with
//! one runtime per voice language so each phonemizes with its own lexicon.

use crate::config::{clamp_speed, Accelerator, ModelConfig, KOKORO_SAMPLE_RATE};
use crate::voice::{Language, Voice};
use crate::{MurmurError, Result};
use sherpa_rs::tts::{KokoroTts, KokoroTtsConfig};
use sherpa_rs::OnnxConfig;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Mono audio produced by a model
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SynthesizedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SynthesizedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    /// Concatenate another chunk; rates must agree
    pub fn append(&mut self, other: SynthesizedAudio) -> Result<()> {
        if self.samples.is_empty() {
            self.sample_rate = other.sample_rate;
        } else if other.sample_rate != self.sample_rate && !other.samples.is_empty() {
            return Err(MurmurError::AudioProcessingError(format!(
                "Cannot join {} Hz audio onto {} Hz audio",
                other.sample_rate, self.sample_rate
            )));
        }
        self.samples.extend(other.samples);
        Ok(())
    }
}

/// A text-to-speech model the worker thread drives one call at a time
pub trait SpeechModel {
    /// Synthesize one chunk of already-normalized text
    fn synthesize(&mut self, text: &str, voice: &Voice, speed: f32) -> Result<SynthesizedAudio>;

    /// Native output rate
    fn sample_rate(&self) -> u32;
}

/// Kokoro via sherpa-rs
///
/// American English is loaded up front; the British runtime is built on the
/// first request for a British voice, on the same provider.
pub struct KokoroModel {
    config: ModelConfig,
    runtimes: HashMap<Language, KokoroTts>,
    accelerator: Accelerator,
}

impl KokoroModel {
    /// Load the model, preferring the requested accelerator
    ///
    /// With `Auto` or `Cuda`, a GPU load is attempted when the `cuda` feature
    /// is compiled in; if that fails the CPU provider is used instead.
    pub fn load(config: &ModelConfig, accelerator: Accelerator) -> Result<Self> {
        config.validate()?;

        info!("Loading Kokoro model from: {}", config.model_path.display());

        let want_gpu = match accelerator {
            Accelerator::Cpu => false,
            Accelerator::Auto => cuda_compiled(),
            Accelerator::Cuda => {
                if !cuda_compiled() {
                    warn!("CUDA requested but this build has no CUDA support, using CPU");
                }
                cuda_compiled()
            }
        };

        let language = Language::AmericanEnglish;
        let (tts, accelerator) = if want_gpu {
            match build(config, language, Accelerator::Cuda) {
                Ok(tts) => (tts, Accelerator::Cuda),
                Err(e) => {
                    warn!("Failed to load GPU model, falling back to CPU: {}", e);
                    (build(config, language, Accelerator::Cpu)?, Accelerator::Cpu)
                }
            }
        } else {
            (build(config, language, Accelerator::Cpu)?, Accelerator::Cpu)
        };
        info!("Kokoro model loaded on {:?}", accelerator);

        let mut runtimes = HashMap::new();
        runtimes.insert(language, tts);

        Ok(Self {
            config: config.clone(),
            runtimes,
            accelerator,
        })
    }

    /// The provider the model actually runs on (`Cpu` or `Cuda`)
    pub fn accelerator(&self) -> Accelerator {
        self.accelerator
    }

    fn runtime_for(&mut self, language: Language) -> Result<&mut KokoroTts> {
        if !self.runtimes.contains_key(&language) {
            info!("Loading Kokoro runtime for {}", language.label());
            let tts = build(&self.config, language, self.accelerator)?;
            self.runtimes.insert(language, tts);
        }
        self.runtimes
            .get_mut(&language)
            .ok_or_else(|| MurmurError::ModelLoadError(format!("No runtime for {}", language.label())))
    }
}

impl SpeechModel for KokoroModel {
    fn synthesize(&mut self, text: &str, voice: &Voice, speed: f32) -> Result<SynthesizedAudio> {
        if text.trim().is_empty() {
            return Ok(SynthesizedAudio::new(Vec::new(), KOKORO_SAMPLE_RATE));
        }

        debug!("Synthesizing with {}: {}", voice.code, text);

        let audio = self
            .runtime_for(voice.language)?
            .create(text, voice.speaker_id, clamp_speed(speed))
            .map_err(|e| MurmurError::SynthesisError(format!("Synthesis failed: {}", e)))?;

        Ok(SynthesizedAudio::new(audio.samples, audio.sample_rate as u32))
    }

    fn sample_rate(&self) -> u32 {
        KOKORO_SAMPLE_RATE
    }
}

fn provider(accelerator: Accelerator) -> &'static str {
    match accelerator {
        Accelerator::Cuda => "cuda",
        Accelerator::Cpu | Accelerator::Auto => "cpu",
    }
}

fn runtime_config(config: &ModelConfig, language: Language, accelerator: Accelerator) -> KokoroTtsConfig {
    KokoroTtsConfig {
        model: path_string(&config.model_path),
        voices: path_string(&config.voices_path),
        tokens: path_string(&config.tokens_path),
        data_dir: path_string(&config.data_dir),
        dict_dir: config
            .dict_dir
            .as_deref()
            .map(path_string)
            .unwrap_or_default(),
        lexicon: config.lexicon_for(language).unwrap_or_default().to_string(),
        length_scale: 1.0,
        onnx_config: OnnxConfig {
            provider: provider(accelerator).to_string(),
            num_threads: config.num_threads.max(1),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn build(config: &ModelConfig, language: Language, accelerator: Accelerator) -> Result<KokoroTts> {
    let kokoro_config = runtime_config(config, language, accelerator);

    // The native constructor aborts by panicking when the runtime rejects the config
    panic::catch_unwind(AssertUnwindSafe(|| KokoroTts::new(kokoro_config))).map_err(|_| {
        MurmurError::ModelLoadError(format!(
            "Kokoro runtime failed to start on {}",
            provider(accelerator)
        ))
    })
}

fn cuda_compiled() -> bool {
    cfg!(feature = "cuda")
}

fn path_string(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}
