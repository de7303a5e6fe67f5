//! `StubTranscriber` — placeholder backend that echoes metadata without any
//! real recognition. Lets the full segment → gate → match → dispatch pipeline
//! be exercised end-to-end before a real recognizer is wired in.

use crate::error::Result;
use crate::transcribe::Transcriber;
use tracing::debug;

/// Echo-style stub backend.
///
/// Returns a deterministic `[stub <K>: <N> samples, vocab <M> words]` line
/// for any non-trivial phrase; too-short buffers report no transcription.
pub struct StubTranscriber {
    phrase_count: u32,
}

impl StubTranscriber {
    pub fn new() -> Self {
        Self { phrase_count: 0 }
    }
}

impl Default for StubTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcriber for StubTranscriber {
    fn warm_up(&mut self) -> Result<()> {
        debug!("StubTranscriber::warm_up — no-op");
        Ok(())
    }

    fn transcribe(&mut self, audio: &[i16], vocabulary: Option<&str>) -> Result<Option<String>> {
        if audio.len() < 160 {
            return Ok(None);
        }

        self.phrase_count += 1;
        let vocab_words = vocabulary
            .map(|v| v.split_whitespace().count())
            .unwrap_or(0);

        Ok(Some(format!(
            "[stub {}: {} samples, vocab {} words]",
            self.phrase_count,
            audio.len(),
            vocab_words
        )))
    }

    fn reset(&mut self) {
        debug!("StubTranscriber::reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_buffers_report_no_transcription() {
        let mut stub = StubTranscriber::new();
        assert_eq!(stub.transcribe(&[0; 100], None).unwrap(), None);
    }

    #[test]
    fn reports_sample_and_vocab_counts() {
        let mut stub = StubTranscriber::new();
        let text = stub
            .transcribe(&[0; 3_200], Some("computer time date"))
            .unwrap()
            .expect("text");
        assert!(text.contains("3200 samples"));
        assert!(text.contains("vocab 3 words"));
    }
}
