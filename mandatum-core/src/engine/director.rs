//! Input director: the single owner of the "evaluate one input and advance
//! state" step.
//!
//! Owns the attention window, match engine, and dispatcher. Voice phrases
//! arrive from the pipeline loop, text lines from the host's text interface —
//! both funnel through [`InputDirector::handle_phrase`] under one external
//! mutex, so two partial cycles can never interleave.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::attention::{AttentionWindow, FocusDecision};
use crate::dispatch::Dispatcher;
use crate::engine::pipeline::PipelineDiagnostics;
use crate::error::Result;
use crate::grammar::CommandSet;
use crate::ipc::events::{EngineStatus, EngineStatusEvent};
use crate::matcher::MatchEngine;
use crate::segment::Phrase;

/// Pseudo-phrase sequence numbers for the text interface start here, well
/// clear of anything the segmenter will assign.
const TEXT_PHRASE_SEQ_BASE: u64 = 1 << 32;

pub struct InputDirector {
    window: AttentionWindow,
    matcher: MatchEngine,
    dispatcher: Dispatcher,
    commands: Arc<CommandSet>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    status: Arc<Mutex<EngineStatus>>,
    diagnostics: Arc<PipelineDiagnostics>,
    text_phrase_count: u64,
}

impl InputDirector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut window: AttentionWindow,
        matcher: MatchEngine,
        dispatcher: Dispatcher,
        commands: Arc<CommandSet>,
        status_tx: broadcast::Sender<EngineStatusEvent>,
        status: Arc<Mutex<EngineStatus>>,
        diagnostics: Arc<PipelineDiagnostics>,
    ) -> Self {
        // The "no longer listening" cue.
        let cue_tx = status_tx.clone();
        window.set_timeout_callback(Box::new(move || {
            let _ = cue_tx.send(EngineStatusEvent {
                status: EngineStatus::Listening,
                detail: Some("attention window expired".into()),
            });
        }));

        Self {
            window,
            matcher,
            dispatcher,
            commands,
            status_tx,
            status,
            diagnostics,
            text_phrase_count: 0,
        }
    }

    /// Gate one phrase through the attention window and feed it to the match
    /// engine; dispatch on a full match.
    pub fn handle_phrase(&mut self, mut phrase: Phrase) -> Result<()> {
        let keyword_text = self.matcher.keyword_pass(&mut phrase)?;

        match self.window.observe(&keyword_text, Instant::now()) {
            FocusDecision::Ignored => {
                self.diagnostics
                    .phrases_gated_out
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                debug!(phrase_seq = phrase.seq, "phrase out of focus — dropped");
                return Ok(());
            }
            FocusDecision::Wake => {
                // A wake word always starts a fresh cycle.
                self.matcher.reset_cycle();
                self.set_status(EngineStatus::Focused, None);
            }
            FocusDecision::Held => {}
        }
        self.diagnostics
            .phrases_accepted
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        if let Some(matched) = self.matcher.submit_phrase(phrase)? {
            self.diagnostics
                .commands_matched
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            info!(command = %matched.name, "command matched — dispatching");

            if let Some(command) = self.commands.get(matched.index) {
                self.dispatcher.dispatch(command, matched.values);
            }

            // End the window and cycle so stray trailing phrases cannot
            // bleed into the completed invocation.
            self.window.stop();
            self.set_status(EngineStatus::Listening, None);
        }
        Ok(())
    }

    /// The text-input interface: a typed line follows the identical
    /// gate → match → dispatch path as a spoken phrase.
    pub fn handle_text(&mut self, text: &str) -> Result<()> {
        let seq = TEXT_PHRASE_SEQ_BASE + self.text_phrase_count;
        self.text_phrase_count += 1;
        self.handle_phrase(Phrase::from_text(seq, text))
    }

    /// Expire the attention window if its deadline passed; resets the input
    /// cycle on expiry. Returns `true` when an expiry happened.
    pub fn poll_timeout(&mut self, now: Instant) -> bool {
        if self.window.poll_expired(now) {
            self.matcher.reset_cycle();
            *self.status.lock() = EngineStatus::Listening;
            true
        } else {
            false
        }
    }

    pub fn is_focused(&self) -> bool {
        self.window.is_focused()
    }

    pub fn candidate_name(&self) -> Option<&str> {
        self.matcher.candidate_name()
    }

    fn set_status(&self, status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = status;
        let _ = self.status_tx.send(EngineStatusEvent { status, detail });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{ActionFn, Command, Requirement, SlotValue};
    use crate::ipc::events::CommandOutputEvent;
    use crate::transcribe::{Transcriber, TranscriberHandle};
    use std::time::Duration;

    /// The text interface never transcribes, so a panicking backend proves it.
    struct PanickingTranscriber;

    impl Transcriber for PanickingTranscriber {
        fn warm_up(&mut self) -> crate::error::Result<()> {
            Ok(())
        }

        fn transcribe(
            &mut self,
            _audio: &[i16],
            _vocabulary: Option<&str>,
        ) -> crate::error::Result<Option<String>> {
            panic!("text input must not reach the transcriber");
        }

        fn reset(&mut self) {}
    }

    struct Fixture {
        director: InputDirector,
        command_rx: broadcast::Receiver<CommandOutputEvent>,
        status_rx: broadcast::Receiver<EngineStatusEvent>,
    }

    fn fixture() -> Fixture {
        let action: ActionFn = Arc::new(|args| {
            let minutes = match args.first() {
                Some(SlotValue::Int(n)) => *n,
                _ => 0,
            };
            Ok(format!("{minutes}"))
        });

        let commands = Arc::new(
            CommandSet::new(vec![Command::new(
                "Set Timer",
                vec![Requirement::word("timer"), Requirement::number()],
                action,
                vec![crate::grammar::ArgTemplate::Slot(1)],
                "timer set for [FUNC] minutes",
            )])
            .unwrap(),
        );

        let (recognition_tx, _) = broadcast::channel(32);
        let (command_tx, command_rx) = broadcast::channel(32);
        let (status_tx, status_rx) = broadcast::channel(32);

        let wake_words = vec!["computer".to_string()];
        let matcher = MatchEngine::new(
            Arc::clone(&commands),
            TranscriberHandle::new(PanickingTranscriber),
            &wake_words,
            recognition_tx,
        );
        let window = AttentionWindow::new(wake_words, Duration::from_secs(5));
        let dispatcher = Dispatcher::new(command_tx).unwrap();

        let director = InputDirector::new(
            window,
            matcher,
            dispatcher,
            commands,
            status_tx,
            Arc::new(Mutex::new(EngineStatus::Listening)),
            Arc::new(PipelineDiagnostics::default()),
        );

        Fixture {
            director,
            command_rx,
            status_rx,
        }
    }

    fn recv<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Option<T> {
        let start = Instant::now();
        loop {
            match rx.try_recv() {
                Ok(ev) => return Some(ev),
                Err(broadcast::error::TryRecvError::Empty) => {
                    if start.elapsed() > Duration::from_secs(1) {
                        return None;
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(_) => return None,
            }
        }
    }

    #[test]
    fn text_line_with_wake_word_matches_and_dispatches() {
        let mut f = fixture();
        f.director
            .handle_text("computer set a timer for 15 minutes")
            .unwrap();

        let event = recv(&mut f.command_rx).expect("command dispatched");
        assert_eq!(event.command, "Set Timer");
        assert_eq!(event.output, "timer set for 15 minutes");
        // Window stopped after the match.
        assert!(!f.director.is_focused());
    }

    #[test]
    fn text_line_without_wake_word_is_ignored() {
        let mut f = fixture();
        f.director.handle_text("set a timer for 15").unwrap();
        assert!(recv(&mut f.command_rx).is_none());
        assert!(!f.director.is_focused());
    }

    #[test]
    fn cycle_accumulates_across_text_lines_within_the_window() {
        let mut f = fixture();
        f.director.handle_text("computer timer").unwrap();
        assert!(f.director.is_focused());
        assert_eq!(f.director.candidate_name(), Some("Set Timer"));

        f.director.handle_text("ten minutes").unwrap();
        let event = recv(&mut f.command_rx).expect("command dispatched");
        assert_eq!(event.output, "timer set for 10 minutes");
    }

    #[test]
    fn timeout_expiry_resets_the_cycle_and_reports_the_cue() {
        let mut f = fixture();
        f.director.handle_text("computer timer").unwrap();
        assert_eq!(f.director.candidate_name(), Some("Set Timer"));
        // Drain the Focused status event.
        let first = recv(&mut f.status_rx).expect("status event");
        assert_eq!(first.status, EngineStatus::Focused);

        let expired = f
            .director
            .poll_timeout(Instant::now() + Duration::from_secs(6));
        assert!(expired);
        assert!(f.director.candidate_name().is_none());

        let cue = recv(&mut f.status_rx).expect("timeout cue");
        assert_eq!(cue.status, EngineStatus::Listening);
        assert_eq!(cue.detail.as_deref(), Some("attention window expired"));
    }

    #[test]
    fn wake_word_mid_cycle_restarts_the_cycle() {
        let mut f = fixture();
        f.director.handle_text("computer timer").unwrap();
        assert_eq!(f.director.candidate_name(), Some("Set Timer"));

        // New wake word: previous partial cycle is discarded.
        f.director.handle_text("computer").unwrap();
        assert!(f.director.candidate_name().is_none());
        assert!(f.director.is_focused());
    }
}
