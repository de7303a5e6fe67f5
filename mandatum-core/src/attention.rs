//! Attention window: decides whether a phrase is "in focus" for command input.
//!
//! ## State machine
//!
//! ```text
//! Idle ──(wake word)──► Focused ──(deadline passes / stop)──► Idle
//!                          │  ▲
//!                          └──┘ any in-focus phrase refreshes the deadline
//! ```
//!
//! The window owns a single logical timer: `deadline` is extended in place on
//! every qualifying phrase, never duplicated. Expiry is detected by polling
//! (`poll_expired`) from the input-director loop; the timeout callback fires
//! at most once per focus period.

use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Outcome of observing one phrase's keyword-pass text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusDecision {
    /// Text contained a wake word. In focus; the caller must reset the
    /// input cycle before accumulating this phrase.
    Wake,
    /// No wake word, but a prior in-focus phrase landed within the timeout.
    Held,
    /// Out of focus — the phrase is not command input.
    Ignored,
}

impl FocusDecision {
    pub fn in_focus(self) -> bool {
        !matches!(self, FocusDecision::Ignored)
    }
}

/// Sliding wake/attention window.
///
/// Not thread-safe by design; owned by the input director and reached from
/// other interfaces only through the director's mutex.
pub struct AttentionWindow {
    wake_words: Vec<String>,
    timeout: Duration,
    deadline: Option<Instant>,
    on_timeout: Option<Box<dyn FnMut() + Send>>,
}

impl AttentionWindow {
    /// `wake_words` are matched case-insensitively as substrings of the
    /// keyword-pass text, the same way the narrow recognizer reports them.
    pub fn new(wake_words: Vec<String>, timeout: Duration) -> Self {
        let wake_words = wake_words
            .into_iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self {
            wake_words,
            timeout,
            deadline: None,
            on_timeout: None,
        }
    }

    /// Install the "no longer listening" cue, fired from `poll_expired`.
    pub fn set_timeout_callback(&mut self, cb: Box<dyn FnMut() + Send>) {
        self.on_timeout = Some(cb);
    }

    /// Classify one phrase and refresh the deadline if it qualifies.
    pub fn observe(&mut self, keyword_text: &str, now: Instant) -> FocusDecision {
        let lowered = keyword_text.to_lowercase();
        if self.wake_words.iter().any(|w| lowered.contains(w.as_str())) {
            info!(text = keyword_text, "wake word heard — window (re)opened");
            self.deadline = Some(now + self.timeout);
            return FocusDecision::Wake;
        }

        match self.deadline {
            // Focus holds through the deadline instant itself.
            Some(deadline) if now <= deadline => {
                debug!(text = keyword_text, "follow-up phrase within window");
                self.deadline = Some(now + self.timeout);
                FocusDecision::Held
            }
            _ => FocusDecision::Ignored,
        }
    }

    /// Fire the timeout if the deadline has passed. Returns `true` exactly
    /// once per focus period.
    pub fn poll_expired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now > deadline => {
                info!("attention window expired");
                self.deadline = None;
                if let Some(cb) = self.on_timeout.as_mut() {
                    cb();
                }
                true
            }
            _ => false,
        }
    }

    /// Deliberately cancel the window (after a full command match) so stray
    /// trailing phrases cannot start a new cycle.
    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_focused(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn wake_words(&self) -> &[String] {
        &self.wake_words
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn window() -> AttentionWindow {
        AttentionWindow::new(vec!["computer".into()], Duration::from_secs(5))
    }

    #[test]
    fn wake_word_opens_the_window() {
        let mut w = window();
        let t0 = Instant::now();
        assert_eq!(w.observe("computer create note", t0), FocusDecision::Wake);
        assert!(w.is_focused());
    }

    #[test]
    fn wake_word_match_is_case_insensitive_substring() {
        let mut w = window();
        let t0 = Instant::now();
        assert_eq!(w.observe("hey Computer please", t0), FocusDecision::Wake);
    }

    #[test]
    fn unwaked_phrase_is_ignored() {
        let mut w = window();
        let t0 = Instant::now();
        assert_eq!(w.observe("create note", t0), FocusDecision::Ignored);
        assert!(!w.is_focused());
    }

    #[test]
    fn focus_holds_until_exactly_the_deadline() {
        let mut w = window();
        let t0 = Instant::now();
        w.observe("computer", t0);

        // Exactly at t0 + timeout: still in focus.
        let at_deadline = t0 + Duration::from_secs(5);
        assert_eq!(w.observe("create note", at_deadline), FocusDecision::Held);

        // Strictly past a deadline with no refresh: expired.
        let mut w2 = window();
        w2.observe("computer", t0);
        let past = t0 + Duration::from_secs(5) + Duration::from_millis(1);
        assert!(w2.poll_expired(past));
        assert_eq!(w2.observe("create note", past), FocusDecision::Ignored);
    }

    #[test]
    fn each_qualifying_phrase_refreshes_the_deadline() {
        let mut w = window();
        let t0 = Instant::now();
        let eps = Duration::from_millis(100);

        w.observe("computer", t0);
        // Just inside the first window.
        let t1 = t0 + Duration::from_secs(5) - eps;
        assert_eq!(w.observe("create", t1), FocusDecision::Held);
        // t1's refresh keeps focus alive well past t0's deadline.
        let t2 = t1 + Duration::from_secs(5) - eps;
        assert!(!w.poll_expired(t2));
        assert_eq!(w.observe("note", t2), FocusDecision::Held);
    }

    #[test]
    fn timeout_callback_fires_once_per_focus_period() {
        let mut w = window();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_cb = Arc::clone(&fired);
        w.set_timeout_callback(Box::new(move || {
            fired_cb.fetch_add(1, Ordering::Relaxed);
        }));

        let t0 = Instant::now();
        w.observe("computer", t0);
        let past = t0 + Duration::from_secs(6);
        assert!(w.poll_expired(past));
        assert!(!w.poll_expired(past + Duration::from_secs(1)));
        assert_eq!(fired.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn stop_cancels_without_firing_callback() {
        let mut w = window();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_cb = Arc::clone(&fired);
        w.set_timeout_callback(Box::new(move || {
            fired_cb.fetch_add(1, Ordering::Relaxed);
        }));

        let t0 = Instant::now();
        w.observe("computer", t0);
        w.stop();
        assert!(!w.is_focused());
        assert!(!w.poll_expired(t0 + Duration::from_secs(10)));
        assert_eq!(fired.load(Ordering::Relaxed), 0);
    }
}
