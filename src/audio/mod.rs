pub mod playback;
pub mod resampler;
pub mod wav;

#[cfg(feature = "audio-io")]
pub use playback::RodioPlayback;
pub use playback::{Playback, SilentPlayback};
pub use resampler::{resample_audio, AudioResampler};
pub use wav::{read_wav, to_pcm_i16, write_wav};
