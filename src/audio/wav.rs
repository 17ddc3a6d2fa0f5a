use crate::{MurmurError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use tracing::{debug, info};

/// Convert float samples (-1.0..=1.0) to 16-bit PCM
///
/// Samples outside the range are clamped before scaling by `i16::MAX`.
pub fn to_pcm_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let s = if s.is_nan() { 0.0 } else { s.clamp(-1.0, 1.0) };
            (s * i16::MAX as f32) as i16
        })
        .collect()
}

/// Write audio samples to a 16-bit PCM WAV file
///
/// # Arguments
/// * `path` - Path to the output WAV file
/// * `samples` - Audio samples (f32, range -1.0 to 1.0)
/// * `sample_rate` - Sample rate in Hz
/// * `channels` - Number of channels
pub fn write_wav<P: AsRef<Path>>(
    path: P,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<()> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)
        .map_err(|e| MurmurError::IOError(format!("Failed to create WAV writer: {}", e)))?;

    for sample in to_pcm_i16(samples) {
        writer
            .write_sample(sample)
            .map_err(|e| MurmurError::IOError(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| MurmurError::IOError(format!("Failed to finalize WAV file: {}", e)))?;

    info!("Wrote {} samples to WAV file: {:?}", samples.len(), path.as_ref());
    Ok(())
}

/// Read a WAV file back into float samples
///
/// Returns `(samples, sample_rate, channels)`.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, u32, u16)> {
    let mut reader = WavReader::open(path.as_ref())
        .map_err(|e| MurmurError::IOError(format!("Failed to open WAV file: {}", e)))?;

    let spec = reader.spec();
    debug!(
        "Reading WAV file: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    let read_err = |e: hound::Error| MurmurError::IOError(format!("Failed to read sample: {}", e));

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(read_err)?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<std::result::Result<_, _>>()
            .map_err(read_err)?,
        (SampleFormat::Int, bits @ (24 | 32)) => {
            let scale = (1u64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(read_err)?
        }
        (_, bits) => {
            return Err(MurmurError::AudioProcessingError(format!(
                "Unsupported bit depth: {}",
                bits
            )));
        }
    };

    Ok((samples, spec.sample_rate, spec.channels))
}
