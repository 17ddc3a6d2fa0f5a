pub mod audio;
pub mod config;
pub mod speech;
pub mod voice;

pub use config::{Accelerator, EngineConfig, ModelConfig};
pub use speech::{EngineEvent, SpeechEngine};
pub use voice::{Gender, Language, Voice, VoiceCatalog};

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum MurmurError {
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    #[error("Model load error: {0}")]
    ModelLoadError(String),

    #[error("Synthesis error: {0}")]
    SynthesisError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Unknown voice: {0}")]
    UnknownVoice(String),

    #[error("Speech engine is not initialized")]
    NotInitialized,

    #[error("Nothing to speak")]
    EmptyText,
}

impl From<std::io::Error> for MurmurError {
    fn from(e: std::io::Error) -> Self {
        MurmurError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for MurmurError {
    fn from(e: serde_json::Error) -> Self {
        MurmurError::ConfigError(e.to_string())
    }
}

impl MurmurError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            MurmurError::AudioDeviceError(_) => false,
            MurmurError::ModelLoadError(_) => false,
            MurmurError::SynthesisError(_) => true,
            MurmurError::IOError(_) => false,
            MurmurError::AudioProcessingError(_) => true,
            MurmurError::ConfigError(_) => false,
            MurmurError::ChannelError(_) => false,
            MurmurError::UnknownVoice(_) => true,
            MurmurError::NotInitialized => false,
            MurmurError::EmptyText => true,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            MurmurError::AudioDeviceError(_) => {
                "Audio device error. Please check your speakers.".to_string()
            }
            MurmurError::ModelLoadError(_) => {
                "Failed to load the voice model. Please verify model files are present.".to_string()
            }
            MurmurError::SynthesisError(_) => "Speech synthesis failed. Please try again.".to_string(),
            MurmurError::IOError(_) => "File system error occurred.".to_string(),
            MurmurError::AudioProcessingError(_) => {
                "Audio processing failed. Please try again.".to_string()
            }
            MurmurError::ConfigError(_) => "Configuration error. Please check settings.".to_string(),
            MurmurError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            MurmurError::UnknownVoice(name) => format!("No voice named '{}'.", name),
            MurmurError::NotInitialized => {
                "The speech engine is not ready. Check the model files and restart.".to_string()
            }
            MurmurError::EmptyText => "Please enter some text to speak.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MurmurError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(MurmurError::SynthesisError("x".into()).is_recoverable());
        assert!(MurmurError::EmptyText.is_recoverable());
        assert!(!MurmurError::NotInitialized.is_recoverable());
        assert!(!MurmurError::ModelLoadError("x".into()).is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: MurmurError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, MurmurError::IOError(ref msg) if msg.contains("gone")));
    }

    #[test]
    fn test_user_message_names_voice() {
        let msg = MurmurError::UnknownVoice("Zed".into()).user_message();
        assert!(msg.contains("Zed"));
    }
}
