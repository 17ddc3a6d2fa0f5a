//! Speech synthesis
//!
//! - `engine`: the queued worker and its control surface
//! - `model`: the neural model seam and the Kokoro implementation
//! - `text`: normalization and chunking ahead of synthesis

pub mod engine;
pub mod model;
pub mod text;

pub use engine::{EngineEvent, ModelFactory, SpeechEngine};
pub use model::{KokoroModel, SpeechModel, SynthesizedAudio};
pub use text::{normalize_text_for_tts, split_into_chunks};
