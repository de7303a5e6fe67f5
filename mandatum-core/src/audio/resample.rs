//! Sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! Capture devices deliver audio at their native rate (commonly 48 kHz); the
//! segmenter and transcription port operate at a fixed 16 kHz. The converter
//! bridges that gap on the non-RT pipeline thread, where allocation is fine.
//! When the rates already match it is a zero-copy passthrough and no rubato
//! session is created at all.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::error;

use crate::error::{MandatumError, Result};

/// Converts f32 mono audio from the capture rate to the pipeline rate.
pub struct SampleRateConverter {
    /// `None` when capture rate == target rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// Holds partial input between calls — rubato consumes fixed-size blocks.
    pending: Vec<f32>,
    /// Input frame count rubato expects per process call.
    block_size: usize,
    /// Pre-allocated rubato output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
}

impl SampleRateConverter {
    /// # Errors
    /// Returns `MandatumError::AudioStream` if rubato fails to initialise.
    pub fn new(capture_rate: u32, target_rate: u32, block_size: usize) -> Result<Self> {
        if capture_rate == target_rate {
            return Ok(Self {
                resampler: None,
                pending: Vec::new(),
                block_size,
                output_buf: Vec::new(),
            });
        }

        let ratio = f64::from(target_rate) / f64::from(capture_rate);
        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio — no dynamic adjustment
            PolynomialDegree::Cubic,
            block_size,
            1, // mono
        )
        .map_err(|e| MandatumError::AudioStream(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        tracing::info!(capture_rate, target_rate, block_size, "resampling enabled");

        Ok(Self {
            resampler: Some(resampler),
            pending: Vec::new(),
            block_size,
            output_buf: vec![vec![0f32; max_out]],
        })
    }

    /// Feed captured samples; returns whatever full blocks produced (possibly
    /// empty while input accumulates). Passthrough mode echoes the input.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            return samples.to_vec();
        };

        self.pending.extend_from_slice(samples);
        let mut out = Vec::new();

        while self.pending.len() >= self.block_size {
            let block = &self.pending[..self.block_size];
            match resampler.process_into_buffer(&[block], &mut self.output_buf, None) {
                Ok((_consumed, produced)) => out.extend_from_slice(&self.output_buf[0][..produced]),
                Err(e) => error!("resampler process error: {e}"),
            }
            self.pending.drain(..self.block_size);
        }

        out
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_identity() {
        let mut rc = SampleRateConverter::new(16_000, 16_000, 960).unwrap();
        assert!(rc.is_passthrough());
        let samples: Vec<f32> = (0..480).map(|i| i as f32 * 0.001).collect();
        assert_eq!(rc.process(&samples), samples);
    }

    #[test]
    fn downsamples_48k_to_16k_by_a_third() {
        let mut rc = SampleRateConverter::new(48_000, 16_000, 960).unwrap();
        assert!(!rc.is_passthrough());
        let out = rc.process(&vec![0.0f32; 960]);
        assert!(!out.is_empty());
        // 960 at 48 kHz → ≈320 at 16 kHz.
        assert!(
            (out.len() as isize - 320).unsigned_abs() <= 10,
            "len={}",
            out.len()
        );
    }

    #[test]
    fn partial_blocks_accumulate_across_calls() {
        let mut rc = SampleRateConverter::new(48_000, 16_000, 960).unwrap();
        assert!(rc.process(&vec![0.0f32; 500]).is_empty());
        // 500 + 500 ≥ 960 → second call produces output.
        assert!(!rc.process(&vec![0.0f32; 500]).is_empty());
    }
}
