//! Match engine: accumulates transcribed phrases across one input cycle and
//! resolves them against the registered command set.
//!
//! ## Protocol per phrase
//!
//! 1. No candidate yet → the phrase is transcribed with the union of every
//!    command's keyword vocabulary (plus the wake words); each command's
//!    keyword requirement is tested against the accumulated keyword text in
//!    registration order, and the first hit becomes the cycle's candidate.
//! 2. Candidate known → phrases are re-transcribed with the candidate's full
//!    vocabulary (unrestricted when it has an open-ended slot) and the full
//!    requirement list is evaluated over all accumulated text.
//! 3. All requirements resolved → the cycle is cleared and the match
//!    returned; the caller stops the attention window.
//!
//! Transcription results are cached per phrase and never recomputed — only
//! the newest phrase costs a recognizer call when a new one arrives. A miss
//! is recorded as the `"_"` placeholder so phrase ordering and text
//! concatenation stay stable for open-slot reconstruction.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::Result;
use crate::grammar::{tokenize, CommandSet, SlotValue, MISS_PLACEHOLDER};
use crate::ipc::events::{RecognitionEvent, RecognitionStage};
use crate::segment::Phrase;
use crate::transcribe::TranscriberHandle;

/// A fully resolved command invocation.
#[derive(Debug, Clone)]
pub struct CommandMatch {
    /// Index into the command set (registration order).
    pub index: usize,
    pub name: String,
    /// One resolved value per requirement, declaration order.
    pub values: Vec<SlotValue>,
}

/// Working state of one input cycle. Exactly one cycle is live at a time.
#[derive(Default)]
struct InputCycle {
    phrases: Vec<Phrase>,
    candidate: Option<usize>,
}

/// Not thread-safe by design — owned by the input director, reached from
/// other interfaces only through the director's mutex.
pub struct MatchEngine {
    commands: Arc<CommandSet>,
    transcriber: TranscriberHandle,
    /// Joined keyword-pass vocabulary (commands' keyword words + wake words).
    keyword_vocabulary: String,
    cycle: InputCycle,
    /// Recognized text is reported here, at the transcription site.
    recognition_tx: broadcast::Sender<RecognitionEvent>,
    recognition_seq: u64,
}

impl MatchEngine {
    pub fn new(
        commands: Arc<CommandSet>,
        transcriber: TranscriberHandle,
        wake_words: &[String],
        recognition_tx: broadcast::Sender<RecognitionEvent>,
    ) -> Self {
        let keyword_vocabulary = commands.keyword_union_vocabulary(wake_words).join(" ");
        Self {
            commands,
            transcriber,
            keyword_vocabulary,
            cycle: InputCycle::default(),
            recognition_tx,
            recognition_seq: 0,
        }
    }

    /// Run (or recall) the narrow keyword pass for a phrase and return its
    /// text. The result is cached on the phrase; a miss is cached as `"_"`.
    pub fn keyword_pass(&mut self, phrase: &mut Phrase) -> Result<String> {
        if let Some(text) = &phrase.first_text {
            return Ok(text.clone());
        }

        let text = self
            .transcriber
            .0
            .lock()
            .transcribe(&phrase.audio, Some(&self.keyword_vocabulary))?
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| MISS_PLACEHOLDER.to_string());

        debug!(phrase_seq = phrase.seq, text = %text, "keyword pass");
        self.emit_recognition(phrase.seq, RecognitionStage::Keyword, &text);
        phrase.first_text = Some(text.clone());
        Ok(text)
    }

    /// Accumulate one in-focus phrase and try to resolve a command.
    ///
    /// Returns `Ok(Some(..))` exactly when every requirement of the cycle's
    /// candidate resolved; the cycle is cleared before returning so trailing
    /// phrases cannot bleed into the completed invocation.
    pub fn submit_phrase(&mut self, mut phrase: Phrase) -> Result<Option<CommandMatch>> {
        // Normally done by the caller for attention gating; run it here too
        // so the engine upholds its own contract.
        self.keyword_pass(&mut phrase)?;
        self.cycle.phrases.push(phrase);

        if self.cycle.candidate.is_none() {
            let keyword_text = self.accumulated_text(|p| p.first_text.as_deref());
            let tokens = tokenize(&keyword_text);
            self.cycle.candidate = self
                .commands
                .commands()
                .iter()
                .position(|c| c.keyword_satisfied(&tokens));

            match self.cycle.candidate {
                Some(index) => {
                    let name = self.commands.commands()[index].name();
                    info!(candidate = name, text = %keyword_text, "candidate command identified");
                }
                None => {
                    debug!(text = %keyword_text, "no keyword requirement satisfied yet");
                    return Ok(None);
                }
            }
        }

        let Some(index) = self.cycle.candidate else {
            return Ok(None);
        };
        // Local clone so `command` does not pin `self` while events are sent.
        let commands = Arc::clone(&self.commands);
        let command = &commands.commands()[index];

        // Widen the vocabulary now that a candidate is known. Cached phrases
        // are not re-transcribed.
        let vocabulary = if command.has_open_slot() {
            None
        } else {
            Some(command.full_vocabulary().join(" "))
        };
        let mut refined = Vec::new();
        for phrase in &mut self.cycle.phrases {
            if phrase.refined_text.is_some() {
                continue;
            }
            let text = self
                .transcriber
                .0
                .lock()
                .transcribe(&phrase.audio, vocabulary.as_deref())?
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| MISS_PLACEHOLDER.to_string());
            debug!(phrase_seq = phrase.seq, text = %text, "full-vocabulary pass");
            refined.push((phrase.seq, text.clone()));
            phrase.refined_text = Some(text);
        }
        for (phrase_seq, text) in refined {
            self.emit_recognition(phrase_seq, RecognitionStage::Full, &text);
        }

        let full_text = self.accumulated_text(Phrase::best_text);
        let tokens = tokenize(&full_text);
        match command.evaluate(&tokens) {
            Some(values) => {
                info!(command = command.name(), text = %full_text, "command fully matched");
                let matched = CommandMatch {
                    index,
                    name: command.name().to_string(),
                    values,
                };
                self.reset_cycle();
                Ok(Some(matched))
            }
            None => {
                debug!(
                    command = command.name(),
                    text = %full_text,
                    "requirements not yet satisfied — waiting for more input"
                );
                Ok(None)
            }
        }
    }

    /// Clear the live cycle (wake-word restart, timeout, or explicit reset).
    pub fn reset_cycle(&mut self) {
        if !self.cycle.phrases.is_empty() || self.cycle.candidate.is_some() {
            debug!(
                phrases = self.cycle.phrases.len(),
                "input cycle reset"
            );
        }
        self.cycle = InputCycle::default();
        self.transcriber.0.lock().reset();
    }

    /// Name of the current candidate command, if one is identified.
    pub fn candidate_name(&self) -> Option<&str> {
        self.cycle
            .candidate
            .and_then(|i| self.commands.get(i))
            .map(|c| c.name())
    }

    /// The joined keyword-pass vocabulary (for hosts that surface it).
    pub fn keyword_vocabulary(&self) -> &str {
        &self.keyword_vocabulary
    }

    fn emit_recognition(&mut self, phrase_seq: u64, stage: RecognitionStage, text: &str) {
        let _ = self.recognition_tx.send(RecognitionEvent {
            seq: self.recognition_seq,
            phrase_seq,
            stage,
            text: text.to_string(),
        });
        self.recognition_seq += 1;
    }

    /// Phrase texts of the cycle joined in arrival order (FIFO — open-slot
    /// reconstruction depends on temporal order).
    fn accumulated_text<'a, F>(&'a self, pick: F) -> String
    where
        F: Fn(&'a Phrase) -> Option<&'a str>,
    {
        let mut out = String::new();
        for phrase in &self.cycle.phrases {
            if let Some(text) = pick(phrase) {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(text);
            }
        }
        out
    }
}
