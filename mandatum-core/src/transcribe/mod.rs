//! Transcription port abstraction.
//!
//! The `Transcriber` trait decouples the match engine from any specific
//! recognizer (stub echo, Vosk-style grammar decoding, Whisper-style full
//! decoding, remote services, …). The engine treats latency and accuracy as
//! opaque: it only relies on the contract that a narrow `vocabulary`
//! restricts the lexicon and that `None` means full-language decoding.
//!
//! `&mut self` on `transcribe` intentionally expresses that recognizers are
//! stateful — grammar caches, decoder hidden state, etc. All mutation is
//! therefore serialised through `TranscriberHandle`'s `parking_lot::Mutex`.

pub mod stub;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

/// Contract for speech recognition backends.
pub trait Transcriber: Send + 'static {
    /// One-time warm-up: load models, pre-allocate decoder state. Called once
    /// at engine startup.
    ///
    /// # Errors
    /// Returns an error if model files are missing or corrupt.
    fn warm_up(&mut self) -> Result<()>;

    /// Transcribe a phrase buffer of mono i16 samples at 16 kHz.
    ///
    /// # Parameters
    /// - `vocabulary`: whitespace-separated lexicon restriction. `None`
    ///   requests unrestricted full-language decoding (slower).
    ///
    /// # Returns
    /// `Ok(None)` (or an empty string) means "no confident transcription" —
    /// not an error.
    fn transcribe(&mut self, audio: &[i16], vocabulary: Option<&str>) -> Result<Option<String>>;

    /// Reset internal decoder state (e.g. between input cycles).
    fn reset(&mut self);
}

/// Thread-safe reference-counted handle to any `Transcriber` implementor.
///
/// `parking_lot::Mutex` for non-poisoning on panic and a faster uncontended
/// path than the std mutex.
#[derive(Clone)]
pub struct TranscriberHandle(pub Arc<Mutex<dyn Transcriber>>);

impl TranscriberHandle {
    /// Wrap any `Transcriber` in a `TranscriberHandle`.
    pub fn new<T: Transcriber>(transcriber: T) -> Self {
        Self(Arc::new(Mutex::new(transcriber)))
    }
}

impl std::fmt::Debug for TranscriberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriberHandle").finish_non_exhaustive()
    }
}
