//! Blocking pipeline loop.
//!
//! ## Pipeline stages (per iteration)
//!
//! ```text
//! 1. Poll the attention window for timeout expiry
//! 2. Drain ring buffer → f32 samples at the capture rate
//! 3. Resample to 16 kHz, quantize to i16, stage into 200 ms chunks
//! 4. PhraseSegmenter folds chunks into phrases
//! 5. Each phrase → (optional WAV dump) → InputDirector::handle_phrase
//!    (keyword pass → attention gate → match → dispatch)
//! ```
//!
//! This entire loop runs in `spawn_blocking`, keeping the Tokio async
//! executor free for host I/O. The director is locked once per phrase and
//! once per timeout poll — the text-input interface shares it through the
//! same mutex, so two partial cycles can never interleave.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    audio::resample::SampleRateConverter,
    buffering::{chunk::AudioChunk, AudioConsumer, Consumer},
    engine::{director::InputDirector, EngineConfig},
    ipc::events::AudioActivityEvent,
    segment::{Phrase, PhraseSegmenter, SegmenterConfig},
};

pub struct PipelineDiagnostics {
    pub samples_in: AtomicUsize,
    pub chunks_segmented: AtomicUsize,
    pub voiced_chunks: AtomicUsize,
    pub phrases_detected: AtomicUsize,
    pub phrases_gated_out: AtomicUsize,
    pub phrases_accepted: AtomicUsize,
    pub commands_matched: AtomicUsize,
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self {
            samples_in: AtomicUsize::new(0),
            chunks_segmented: AtomicUsize::new(0),
            voiced_chunks: AtomicUsize::new(0),
            phrases_detected: AtomicUsize::new(0),
            phrases_gated_out: AtomicUsize::new(0),
            phrases_accepted: AtomicUsize::new(0),
            commands_matched: AtomicUsize::new(0),
        }
    }
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.samples_in.store(0, Ordering::Relaxed);
        self.chunks_segmented.store(0, Ordering::Relaxed);
        self.voiced_chunks.store(0, Ordering::Relaxed);
        self.phrases_detected.store(0, Ordering::Relaxed);
        self.phrases_gated_out.store(0, Ordering::Relaxed);
        self.phrases_accepted.store(0, Ordering::Relaxed);
        self.commands_matched.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            samples_in: self.samples_in.load(Ordering::Relaxed),
            chunks_segmented: self.chunks_segmented.load(Ordering::Relaxed),
            voiced_chunks: self.voiced_chunks.load(Ordering::Relaxed),
            phrases_detected: self.phrases_detected.load(Ordering::Relaxed),
            phrases_gated_out: self.phrases_gated_out.load(Ordering::Relaxed),
            phrases_accepted: self.phrases_accepted.load(Ordering::Relaxed),
            commands_matched: self.commands_matched.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub samples_in: usize,
    pub chunks_segmented: usize,
    pub voiced_chunks: usize,
    pub phrases_detected: usize,
    pub phrases_gated_out: usize,
    pub phrases_accepted: usize,
    pub commands_matched: usize,
}

/// All context the pipeline needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext {
    pub config: EngineConfig,
    pub director: Arc<Mutex<InputDirector>>,
    pub consumer: AudioConsumer,
    pub running: Arc<AtomicBool>,
    pub activity_tx: broadcast::Sender<AudioActivityEvent>,
    pub capture_sample_rate: u32,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Samples drained from the ring buffer per iteration (at the capture rate).
/// 20 ms at 48 kHz; also the resampler's input block size.
const DRAIN_CHUNK: usize = 960;

/// Sleep when the ring is empty (avoids busy-wait burning a core).
const SLEEP_EMPTY_MS: u64 = 5;

/// Run the blocking pipeline until `ctx.running` becomes false.
pub fn run(mut ctx: PipelineContext) {
    info!("pipeline started");

    let mut converter = match SampleRateConverter::new(
        ctx.capture_sample_rate,
        ctx.config.target_sample_rate,
        DRAIN_CHUNK,
    ) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to create resampler: {e}");
            return;
        }
    };

    let mut segmenter = PhraseSegmenter::new(SegmenterConfig {
        amplitude_threshold: ctx.config.amplitude_threshold,
        min_phrase_secs: ctx.config.min_phrase_secs,
        chunks_per_second: ctx.config.chunks_per_second,
    });

    // Segmenter chunk granularity: 200 ms at 16 kHz = 3200 samples.
    let chunk_samples =
        (ctx.config.target_sample_rate / ctx.config.chunks_per_second.max(1)) as usize;

    let mut raw = vec![0f32; DRAIN_CHUNK];
    // i16 samples at the target rate awaiting a full segmenter chunk.
    let mut staging: Vec<i16> = Vec::with_capacity(chunk_samples * 2);
    let mut activity_seq = 0u64;

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        // ── 1. Attention timeout ─────────────────────────────────────────
        ctx.director.lock().poll_timeout(Instant::now());

        // ── 2. Drain ring buffer ─────────────────────────────────────────
        let n = ctx.consumer.pop_slice(&mut raw);
        if n == 0 {
            std::thread::sleep(std::time::Duration::from_millis(SLEEP_EMPTY_MS));
            continue;
        }
        ctx.diagnostics.samples_in.fetch_add(n, Ordering::Relaxed);

        // ── 3. Resample + quantize ───────────────────────────────────────
        let resampled = converter.process(&raw[..n]);
        if resampled.is_empty() {
            // Partial block — waiting for more data to fill the resampler.
            continue;
        }
        staging.extend(
            resampled
                .iter()
                .map(|s| (s.clamp(-1.0, 1.0) * 32_767.0) as i16),
        );

        // ── 4/5. Segment full chunks, hand phrases to the director ───────
        while staging.len() >= chunk_samples {
            let samples: Vec<i16> = staging.drain(..chunk_samples).collect();
            let chunk = AudioChunk::new(samples, ctx.config.target_sample_rate);

            let amplitude_range = chunk.amplitude_range();
            let is_voiced = amplitude_range > ctx.config.amplitude_threshold;
            ctx.diagnostics
                .chunks_segmented
                .fetch_add(1, Ordering::Relaxed);
            if is_voiced {
                ctx.diagnostics.voiced_chunks.fetch_add(1, Ordering::Relaxed);
            }
            let _ = ctx.activity_tx.send(AudioActivityEvent {
                seq: activity_seq,
                amplitude_range,
                is_voiced,
            });
            activity_seq = activity_seq.saturating_add(1);

            if let Some(phrase) = segmenter.feed(chunk) {
                ctx.diagnostics
                    .phrases_detected
                    .fetch_add(1, Ordering::Relaxed);
                dump_phrase(
                    ctx.config.phrase_dump_dir.as_deref(),
                    &phrase,
                    ctx.config.target_sample_rate,
                );

                // Transcription failures are recovered locally: the cycle
                // simply sees no data from this phrase.
                if let Err(e) = ctx.director.lock().handle_phrase(phrase) {
                    error!("phrase handling failed: {e}");
                }
            }
        }
    }

    segmenter.reset();

    let snap = ctx.diagnostics.snapshot();
    info!(
        samples_in = snap.samples_in,
        chunks_segmented = snap.chunks_segmented,
        voiced_chunks = snap.voiced_chunks,
        phrases_detected = snap.phrases_detected,
        phrases_gated_out = snap.phrases_gated_out,
        phrases_accepted = snap.phrases_accepted,
        commands_matched = snap.commands_matched,
        "pipeline stopped — diagnostics"
    );
}

/// Write one phrase buffer as a WAV file for offline inspection. Best effort:
/// failures are logged, never fatal.
fn dump_phrase(dir: Option<&std::path::Path>, phrase: &Phrase, sample_rate: u32) {
    let Some(dir) = dir else {
        return;
    };

    let path = dir.join(format!("phrase-{:05}.wav", phrase.seq));
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let result = hound::WavWriter::create(&path, spec).and_then(|mut writer| {
        for &sample in &phrase.audio {
            writer.write_sample(sample)?;
        }
        writer.finalize()
    });

    match result {
        Ok(()) => debug!(path = %path.display(), samples = phrase.audio.len(), "phrase dumped"),
        Err(e) => warn!(path = %path.display(), "phrase dump failed: {e}"),
    }
}
