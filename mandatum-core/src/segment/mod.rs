//! Phrase segmentation: an energy-gate voice-activity detector that folds a
//! chunked audio stream into discrete utterances.
//!
//! ## Algorithm
//!
//! 1. Compute the peak-to-trough amplitude range of the incoming chunk.
//! 2. If the range exceeds `threshold` → append the chunk to the current run.
//! 3. Otherwise the run (if any) has ended:
//!    - runs of at least `min_chunks` chunks are concatenated — including the
//!      terminating quiet chunk — and emitted as a [`Phrase`];
//!    - shorter runs are discarded (too short to be a real utterance).
//!    The run buffer clears after every run end, emitted or not.
//!
//! A quiet chunk arriving with an empty run buffer is a no-op. No spectral
//! analysis is performed.

use std::time::Instant;

use tracing::debug;

use crate::buffering::chunk::AudioChunk;

/// One detected contiguous utterance, bounded by amplitude threshold crossings.
///
/// Transcription results are cached in place as they arrive: `first_text`
/// from the narrow keyword-vocabulary pass, `refined_text` from the
/// candidate command's full-vocabulary pass. A cached pass is never re-run
/// within the same input cycle.
#[derive(Debug, Clone)]
pub struct Phrase {
    /// Monotonic phrase counter, assigned at detection.
    pub seq: u64,
    /// Concatenated mono i16 samples of the whole run.
    pub audio: Vec<i16>,
    /// When the run ended (phrase became complete).
    pub captured_at: Instant,
    /// Keyword-pass transcription; `"_"` records a transcription miss.
    pub first_text: Option<String>,
    /// Full-vocabulary transcription; `"_"` records a transcription miss.
    pub refined_text: Option<String>,
}

impl Phrase {
    /// Best available text for this phrase: refined if present, else first.
    pub fn best_text(&self) -> Option<&str> {
        self.refined_text
            .as_deref()
            .or(self.first_text.as_deref())
    }

    /// A pseudo-phrase carrying already-final text (the text-input interface).
    /// No audio is attached, so neither transcription pass will run on it.
    pub fn from_text(seq: u64, text: &str) -> Self {
        Self {
            seq,
            audio: Vec::new(),
            captured_at: Instant::now(),
            first_text: Some(text.to_string()),
            refined_text: Some(text.to_string()),
        }
    }
}

/// Configuration for [`PhraseSegmenter`].
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Amplitude-range threshold (0..=65535). Chunks above this are voiced.
    pub amplitude_threshold: u32,
    /// Minimum phrase length in seconds.
    pub min_phrase_secs: f32,
    /// How many chunks the pipeline produces per second.
    pub chunks_per_second: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            amplitude_threshold: 675,
            min_phrase_secs: 0.3,
            chunks_per_second: 5,
        }
    }
}

impl SegmenterConfig {
    /// Minimum run length in chunks for a run to count as a phrase.
    pub fn min_chunks(&self) -> usize {
        ((self.min_phrase_secs * self.chunks_per_second as f32).round() as usize).max(1)
    }
}

/// Stateful energy-gate segmenter. `feed` one chunk at a time; not thread-safe
/// by design — drive it from the single input-director task.
pub struct PhraseSegmenter {
    config: SegmenterConfig,
    run: Vec<AudioChunk>,
    next_seq: u64,
}

impl PhraseSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            run: Vec::new(),
            next_seq: 0,
        }
    }

    /// Fold one chunk into the current run. Returns a completed [`Phrase`]
    /// when a long-enough run just ended.
    pub fn feed(&mut self, chunk: AudioChunk) -> Option<Phrase> {
        let range = chunk.amplitude_range();

        if range > self.config.amplitude_threshold {
            self.run.push(chunk);
            return None;
        }

        if self.run.is_empty() {
            return None;
        }

        let emitted = if self.run.len() >= self.config.min_chunks() {
            // The trailing quiet chunk is included: it carries the decaying
            // tail of the utterance.
            let mut audio =
                Vec::with_capacity(self.run.iter().map(|c| c.samples.len()).sum::<usize>() + chunk.samples.len());
            for c in &self.run {
                audio.extend_from_slice(&c.samples);
            }
            audio.extend_from_slice(&chunk.samples);

            let seq = self.next_seq;
            self.next_seq += 1;
            debug!(seq, chunks = self.run.len() + 1, samples = audio.len(), "phrase detected");

            Some(Phrase {
                seq,
                audio,
                captured_at: Instant::now(),
                first_text: None,
                refined_text: None,
            })
        } else {
            debug!(chunks = self.run.len(), "run below minimum length — discarded");
            None
        };

        self.run.clear();
        emitted
    }

    /// Drop any partial run (e.g. on engine stop).
    pub fn reset(&mut self) {
        self.run.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_chunk() -> AudioChunk {
        AudioChunk::new(vec![0; 3_200], 16_000)
    }

    fn loud_chunk(amplitude: i16) -> AudioChunk {
        let samples: Vec<i16> = (0..3_200)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect();
        AudioChunk::new(samples, 16_000)
    }

    fn segmenter() -> PhraseSegmenter {
        PhraseSegmenter::new(SegmenterConfig::default())
    }

    #[test]
    fn quiet_stream_emits_nothing() {
        let mut seg = segmenter();
        for _ in 0..20 {
            assert!(seg.feed(quiet_chunk()).is_none());
        }
    }

    #[test]
    fn minimum_length_run_emits_one_phrase_with_trailing_chunk() {
        let mut seg = segmenter();
        // Default: 0.3 s at 5 chunks/s ⇒ 2 voiced chunks minimum.
        assert!(seg.feed(loud_chunk(2_000)).is_none());
        assert!(seg.feed(loud_chunk(2_000)).is_none());
        let phrase = seg.feed(quiet_chunk()).expect("phrase should be emitted");
        // Two voiced chunks + the terminating quiet chunk.
        assert_eq!(phrase.audio.len(), 3 * 3_200);
    }

    #[test]
    fn sub_minimum_run_is_discarded_silently() {
        let mut seg = segmenter();
        assert!(seg.feed(loud_chunk(2_000)).is_none());
        assert!(seg.feed(quiet_chunk()).is_none());
        // Buffer must have been cleared: a fresh long run still works.
        assert!(seg.feed(loud_chunk(2_000)).is_none());
        assert!(seg.feed(loud_chunk(2_000)).is_none());
        assert!(seg.feed(quiet_chunk()).is_some());
    }

    #[test]
    fn run_buffer_resets_between_phrases() {
        let mut seg = segmenter();
        for _ in 0..3 {
            seg.feed(loud_chunk(2_000));
        }
        let first = seg.feed(quiet_chunk()).expect("first phrase");
        assert_eq!(first.audio.len(), 4 * 3_200);

        for _ in 0..2 {
            seg.feed(loud_chunk(2_000));
        }
        let second = seg.feed(quiet_chunk()).expect("second phrase");
        assert_eq!(second.audio.len(), 3 * 3_200);
        assert_eq!(second.seq, first.seq + 1);
    }

    #[test]
    fn amplitude_exactly_at_threshold_ends_the_run() {
        let cfg = SegmenterConfig::default();
        let mut seg = PhraseSegmenter::new(cfg.clone());
        seg.feed(loud_chunk(2_000));
        seg.feed(loud_chunk(2_000));
        // Range of ±337 square wave = 674 < 675; but build one at exactly 675:
        let samples: Vec<i16> = (0..3_200).map(|i| if i % 2 == 0 { 675 } else { 0 }).collect();
        let at_threshold = AudioChunk::new(samples, 16_000);
        assert_eq!(at_threshold.amplitude_range(), cfg.amplitude_threshold);
        assert!(seg.feed(at_threshold).is_some(), "at-threshold chunk is not voiced");
    }

    #[test]
    fn quiet_chunk_on_empty_buffer_is_a_no_op() {
        let mut seg = segmenter();
        assert!(seg.feed(quiet_chunk()).is_none());
        assert!(seg.feed(loud_chunk(2_000)).is_none());
        assert!(seg.feed(loud_chunk(2_000)).is_none());
        assert!(seg.feed(quiet_chunk()).is_some());
    }

    #[test]
    fn pseudo_phrase_skips_transcription() {
        let phrase = Phrase::from_text(9, "computer what time is it");
        assert_eq!(phrase.best_text(), Some("computer what time is it"));
        assert!(phrase.audio.is_empty());
        assert_eq!(phrase.refined_text.as_deref(), Some("computer what time is it"));
    }
}
