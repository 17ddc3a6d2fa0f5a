//! Sample rate conversion from the model rate to the output rate
//!
//! Each utterance is converted as a whole: the sinc filter's delay is
//! dropped from the front and the tail is flushed, so the output lines up
//! with the input and has `ceil(frames * ratio)` frames.

use crate::{MurmurError, Result};
use rubato::{
    calculate_cutoff, Resampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use tracing::debug;

const BLOCK_FRAMES: usize = 2048;
const SINC_LEN: usize = 128;
const WINDOW: WindowFunction = WindowFunction::BlackmanHarris2;

pub struct AudioResampler {
    resampler: SincFixedIn<f32>,
    ratio: f64,
    channels: usize,
}

impl AudioResampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: u16) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(MurmurError::ConfigError(format!(
                "Cannot resample {} Hz to {} Hz",
                input_rate, output_rate
            )));
        }
        if channels == 0 {
            return Err(MurmurError::ConfigError("Resampling needs at least one channel".into()));
        }

        let ratio = output_rate as f64 / input_rate as f64;
        let params = SincInterpolationParameters {
            sinc_len: SINC_LEN,
            f_cutoff: calculate_cutoff(SINC_LEN, WINDOW),
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 128,
            window: WINDOW,
        };

        let resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, BLOCK_FRAMES, channels as usize)
            .map_err(|e| MurmurError::AudioProcessingError(format!("Resampler setup: {}", e)))?;

        debug!("Resampler {} Hz -> {} Hz ({} ch)", input_rate, output_rate, channels);

        Ok(Self {
            resampler,
            ratio,
            channels: channels as usize,
        })
    }

    /// Convert one complete interleaved utterance
    pub fn resample(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let frames = input.len() / self.channels;
        if frames == 0 {
            return Ok(Vec::new());
        }

        self.resampler.reset();
        let planar = deinterleave(input, self.channels, frames);
        let wanted = (frames as f64 * self.ratio).ceil() as usize;
        let delay = self.resampler.output_delay();
        let mut lanes: Vec<Vec<f32>> = vec![Vec::with_capacity(delay + wanted); self.channels];

        let mut pos = 0;
        while pos < frames {
            let next = self.resampler.input_frames_next();
            let end = (pos + next).min(frames);
            let block: Vec<&[f32]> = planar.iter().map(|lane| &lane[pos..end]).collect();

            let out = if end - pos == next {
                self.resampler.process(&block[..], None)
            } else {
                self.resampler.process_partial(Some(&block[..]), None)
            }
            .map_err(|e| MurmurError::AudioProcessingError(format!("Resampling failed: {}", e)))?;

            extend_lanes(&mut lanes, out);
            pos = end;
        }

        // Push zeros through until the delayed tail has come out
        while lanes[0].len() < delay + wanted {
            let out = self
                .resampler
                .process_partial(None::<&[&[f32]]>, None)
                .map_err(|e| MurmurError::AudioProcessingError(format!("Resampler flush: {}", e)))?;
            if out[0].is_empty() {
                break;
            }
            extend_lanes(&mut lanes, out);
        }

        let end = (delay + wanted).min(lanes[0].len());
        let start = delay.min(end);
        let mut output = Vec::with_capacity((end - start) * self.channels);
        for frame in start..end {
            for lane in &lanes {
                output.push(lane[frame]);
            }
        }

        debug!("Resampled {} frames -> {} frames", frames, end - start);
        Ok(output)
    }
}

fn deinterleave(input: &[f32], channels: usize, frames: usize) -> Vec<Vec<f32>> {
    (0..channels)
        .map(|ch| (0..frames).map(|f| input[f * channels + ch]).collect())
        .collect()
}

fn extend_lanes(lanes: &mut [Vec<f32>], out: Vec<Vec<f32>>) {
    for (lane, chunk) in lanes.iter_mut().zip(out) {
        lane.extend(chunk);
    }
}

/// Resample in one step; returns the input unchanged when the rates match
pub fn resample_audio(
    input: &[f32],
    input_rate: u32,
    output_rate: u32,
    channels: u16,
) -> Result<Vec<f32>> {
    if input_rate == output_rate {
        return Ok(input.to_vec());
    }

    AudioResampler::new(input_rate, output_rate, channels)?.resample(input)
}
