//! Engine configuration
//!
//! Loaded from JSON, overridden from the environment, or built in code.

use crate::voice::Language;
use crate::{MurmurError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Native output rate of Kokoro models
pub const KOKORO_SAMPLE_RATE: u32 = 24000;

pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;

/// Clamp a user-supplied speed multiplier into the supported range
pub fn clamp_speed(speed: f32) -> f32 {
    if speed.is_finite() {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    } else {
        1.0
    }
}

/// Which execution provider the model runs on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accelerator {
    /// GPU when the build supports it, CPU otherwise
    #[default]
    Auto,
    Cpu,
    Cuda,
}

/// Paths to the Kokoro model files
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// ONNX model file
    pub model_path: PathBuf,

    /// Voice pack with the per-speaker style embeddings
    pub voices_path: PathBuf,

    /// Token table
    pub tokens_path: PathBuf,

    /// espeak-ng data directory used for phonemization
    pub data_dir: PathBuf,

    /// American English lexicon files, comma separated as the runtime expects
    pub lexicon_us: Option<String>,

    /// British English lexicon files
    pub lexicon_gb: Option<String>,

    /// Optional dictionary directory
    pub dict_dir: Option<PathBuf>,

    /// ONNX runtime threads
    pub num_threads: i32,
}

impl ModelConfig {
    /// Fill paths from the standard layout of a released model directory
    pub fn from_model_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model_path: dir.join("model.onnx"),
            voices_path: dir.join("voices.bin"),
            tokens_path: dir.join("tokens.txt"),
            data_dir: dir.join("espeak-ng-data"),
            lexicon_us: existing(dir.join("lexicon-us-en.txt")),
            lexicon_gb: existing(dir.join("lexicon-gb-en.txt")),
            dict_dir: None,
            num_threads: 2,
        }
    }

    /// Lexicon the runtime loads for voices of `language`
    pub fn lexicon_for(&self, language: Language) -> Option<&str> {
        match language {
            Language::AmericanEnglish => self.lexicon_us.as_deref(),
            Language::BritishEnglish => self.lexicon_gb.as_deref(),
        }
    }

    /// Check that every required file is present
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("Model", &self.model_path),
            ("Voice pack", &self.voices_path),
            ("Tokens file", &self.tokens_path),
            ("espeak-ng data", &self.data_dir),
        ];

        for (what, path) in required {
            if path.as_os_str().is_empty() {
                return Err(MurmurError::ConfigError(format!("{} path is required", what)));
            }
            if !path.exists() {
                return Err(MurmurError::ModelLoadError(format!(
                    "{} not found: {}",
                    what,
                    path.display()
                )));
            }
        }

        Ok(())
    }
}

fn existing(path: PathBuf) -> Option<String> {
    path.exists().then(|| path.to_string_lossy().into_owned())
}

/// Configuration for the speech engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub model: ModelConfig,

    pub accelerator: Accelerator,

    /// Display name or code of the initially selected voice
    pub default_voice: Option<String>,

    /// Speed used when the front end does not pass one
    pub default_speed: f32,

    /// Output sample rate; audio is resampled when it differs from the model rate
    pub output_sample_rate: u32,

    /// Maximum pending requests in the worker queue
    pub queue_size: usize,

    /// How often the worker checks playback and stop signals
    pub poll_interval_ms: u64,

    /// Upper bound on characters per synthesis chunk
    pub max_chunk_chars: usize,

    /// Whether to open an audio device at all
    pub enable_audio_output: bool,

    /// How long shutdown waits for the worker thread
    pub shutdown_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::from_model_dir("models/kokoro-multi-lang-v1_0"),
            accelerator: Accelerator::Auto,
            default_voice: None,
            default_speed: 1.0,
            output_sample_rate: KOKORO_SAMPLE_RATE,
            queue_size: 16,
            poll_interval_ms: 100,
            max_chunk_chars: 300,
            enable_audio_output: true,
            shutdown_timeout_ms: 2000,
        }
    }
}

impl EngineConfig {
    pub fn with_model_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.model = ModelConfig::from_model_dir(dir);
        self
    }

    pub fn with_accelerator(mut self, accelerator: Accelerator) -> Self {
        self.accelerator = accelerator;
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.default_voice = Some(voice.into());
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.default_speed = clamp_speed(speed);
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.output_sample_rate = sample_rate;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis().max(1) as u64;
        self
    }

    pub fn without_audio_output(mut self) -> Self {
        self.enable_audio_output = false;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Read a JSON config file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `MURMUR_MODEL_DIR`, `MURMUR_VOICE` and `MURMUR_SPEED`
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(dir) = lookup("MURMUR_MODEL_DIR") {
            debug!("Model directory from environment: {}", dir);
            self = self.with_model_dir(dir);
        }
        if let Some(voice) = lookup("MURMUR_VOICE") {
            self.default_voice = Some(voice);
        }
        if let Some(speed) = lookup("MURMUR_SPEED") {
            let speed: f32 = speed.trim().parse().map_err(|_| {
                MurmurError::ConfigError(format!("MURMUR_SPEED is not a number: {}", speed))
            })?;
            self = self.with_speed(speed);
        }
        Ok(self)
    }

    /// Validate everything except the model files, which the worker checks on load
    pub fn validate(&self) -> Result<()> {
        if self.output_sample_rate == 0 {
            return Err(MurmurError::ConfigError(
                "Output sample rate must be greater than 0".into(),
            ));
        }
        if self.queue_size == 0 {
            return Err(MurmurError::ConfigError("Queue size must be at least 1".into()));
        }
        if self.max_chunk_chars < 16 {
            return Err(MurmurError::ConfigError(
                "Chunks must allow at least 16 characters".into(),
            ));
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.default_speed) {
            return Err(MurmurError::ConfigError(format!(
                "Default speed must be between {} and {}",
                MIN_SPEED, MAX_SPEED
            )));
        }
        Ok(())
    }
}
