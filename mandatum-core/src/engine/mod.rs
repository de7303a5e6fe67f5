//! `MandatumEngine` — top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! MandatumEngine::new()
//!     └─► warm_up()          → recognizer loaded, status = WarmingUp → Idle
//!         └─► start()        → audio open, pipeline spawned, status = Listening
//!             └─► stop()     → running=false, stream dropped, status = Stopped
//! ```
//!
//! `start()`/`stop()` are idempotent: calling them in the wrong state returns
//! an error rather than panicking.
//!
//! ## Threading
//!
//! `cpal::Stream` is `!Send` on Windows/macOS (COM / CoreAudio thread
//! affinity). `AudioCapture` is therefore created *inside* the
//! `spawn_blocking` closure so it never crosses a thread boundary. A sync
//! oneshot channel propagates any open-device errors back to the `start()`
//! caller.

pub mod director;
pub mod pipeline;

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    attention::AttentionWindow,
    audio::AudioCapture,
    buffering::create_audio_ring,
    dispatch::Dispatcher,
    error::{MandatumError, Result},
    grammar::CommandSet,
    ipc::events::{
        AudioActivityEvent, CommandOutputEvent, EngineStatus, EngineStatusEvent, RecognitionEvent,
    },
    matcher::MatchEngine,
    transcribe::TranscriberHandle,
};

use director::InputDirector;
use pipeline::PipelineDiagnostics;

/// Broadcast channel capacity: events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Configuration for `MandatumEngine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sample rate the segmenter and transcription port operate at (Hz).
    /// Audio captured at other rates is resampled. Default: 16000.
    pub target_sample_rate: u32,
    /// Segmenter chunk granularity. Default: 5 (200 ms chunks).
    pub chunks_per_second: u32,
    /// Peak-to-trough amplitude gate for voiced chunks (0..=65535).
    /// Default: 675.
    pub amplitude_threshold: u32,
    /// Minimum utterance length in seconds. Default: 0.3.
    pub min_phrase_secs: f32,
    /// Words whose presence unconditionally (re)opens the attention window.
    /// Default: `["computer"]`.
    pub wake_words: Vec<String>,
    /// Sliding attention timeout; refreshed by every in-focus phrase.
    /// Default: 5 s.
    pub attention_timeout: Duration,
    /// When set, every emitted phrase buffer is written there as a WAV file.
    pub phrase_dump_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            chunks_per_second: 5,
            amplitude_threshold: 675,
            min_phrase_secs: 0.3,
            wake_words: vec!["computer".into()],
            attention_timeout: Duration::from_secs(5),
            phrase_dump_dir: None,
        }
    }
}

/// The top-level engine handle.
///
/// `MandatumEngine` is `Send + Sync` — all fields use interior mutability.
/// Wrap in `Arc<MandatumEngine>` to share between the host and its
/// event-forwarding tasks.
pub struct MandatumEngine {
    config: EngineConfig,
    transcriber: TranscriberHandle,
    /// The single mutex around "evaluate one input and advance state" —
    /// shared by the voice pipeline and the text-input interface.
    director: Arc<Mutex<InputDirector>>,
    /// `true` while capture + pipeline are active.
    running: Arc<AtomicBool>,
    /// Canonical status (written atomically via Mutex, read from hosts).
    status: Arc<Mutex<EngineStatus>>,
    recognition_tx: broadcast::Sender<RecognitionEvent>,
    command_tx: broadcast::Sender<CommandOutputEvent>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    activity_tx: broadcast::Sender<AudioActivityEvent>,
    /// Shared pipeline diagnostics counters.
    diagnostics: Arc<PipelineDiagnostics>,
}

impl MandatumEngine {
    /// Create a new engine over a validated command set. Does not start
    /// capturing — call `warm_up()` then `start()`.
    ///
    /// # Errors
    /// Fails if the dispatch worker cannot be spawned.
    pub fn new(
        config: EngineConfig,
        transcriber: TranscriberHandle,
        commands: CommandSet,
    ) -> Result<Self> {
        let commands = Arc::new(commands);
        let (recognition_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (command_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (activity_tx, _) = broadcast::channel(BROADCAST_CAP);
        let diagnostics = Arc::new(PipelineDiagnostics::default());
        let status = Arc::new(Mutex::new(EngineStatus::Idle));

        let matcher = MatchEngine::new(
            Arc::clone(&commands),
            transcriber.clone(),
            &config.wake_words,
            recognition_tx.clone(),
        );
        let window = AttentionWindow::new(config.wake_words.clone(), config.attention_timeout);
        let dispatcher = Dispatcher::new(command_tx.clone())?;
        let director = InputDirector::new(
            window,
            matcher,
            dispatcher,
            commands,
            status_tx.clone(),
            Arc::clone(&status),
            Arc::clone(&diagnostics),
        );

        Ok(Self {
            config,
            transcriber,
            director: Arc::new(Mutex::new(director)),
            running: Arc::new(AtomicBool::new(false)),
            status,
            recognition_tx,
            command_tx,
            status_tx,
            activity_tx,
            diagnostics,
        })
    }

    /// Warm up the transcription backend (load models, dummy decode).
    ///
    /// Call once at application startup, before `start()`.
    pub fn warm_up(&self) -> Result<()> {
        self.set_status(EngineStatus::WarmingUp, None);
        info!("warming up transcription backend");
        self.transcriber.0.lock().warm_up()?;
        self.set_status(EngineStatus::Idle, None);
        info!("transcription backend ready");
        Ok(())
    }

    /// Start audio capture and the pipeline.
    ///
    /// Blocks until the audio device is confirmed open (or fails), then
    /// returns. The pipeline continues in a background blocking thread.
    ///
    /// # Errors
    /// - `MandatumError::AlreadyRunning` if already started.
    /// - `MandatumError::NoDefaultInputDevice` / `AudioStream` on device error.
    pub fn start(&self) -> Result<()> {
        self.start_with_device(None)
    }

    /// Start the engine using a preferred input device name. `None` selects
    /// the system default input.
    pub fn start_with_device(&self, preferred_input_device: Option<String>) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(MandatumError::AlreadyRunning);
        }

        self.diagnostics.reset();
        self.running.store(true, Ordering::SeqCst);
        self.set_status(EngineStatus::Listening, None);

        let (producer, consumer) = create_audio_ring();

        let config = self.config.clone();
        let director = Arc::clone(&self.director);
        let running = Arc::clone(&self.running);
        let activity_tx = self.activity_tx.clone();
        let diagnostics = Arc::clone(&self.diagnostics);
        let preferred_input_device = preferred_input_device.clone();

        // Sync oneshot: pipeline thread signals open success/failure to
        // start(); carries the actual capture sample rate on success.
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<u32>>();

        tokio::task::spawn_blocking(move || {
            // Audio device must open on THIS thread — cpal::Stream is !Send.
            let capture = match AudioCapture::open_with_preference(
                producer,
                Arc::clone(&running),
                preferred_input_device.as_deref(),
            ) {
                Ok(c) => {
                    let _ = open_tx.send(Ok(c.sample_rate));
                    c
                }
                Err(e) => {
                    let _ = open_tx.send(Err(e));
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            let capture_sample_rate = capture.sample_rate;

            pipeline::run(pipeline::PipelineContext {
                config,
                director,
                consumer,
                running,
                activity_tx,
                capture_sample_rate,
                diagnostics,
            });

            // Stream drops here, releasing the audio device on this thread.
            drop(capture);
        });

        match open_rx.recv() {
            Ok(Ok(_rate)) => {
                info!("engine started — listening");
                Ok(())
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(EngineStatus::Error, Some(e.to_string()));
                Err(e)
            }
            Err(_) => {
                // Channel closed before a message was sent.
                self.running.store(false, Ordering::SeqCst);
                self.set_status(EngineStatus::Error, Some("pipeline failed to start".into()));
                Err(MandatumError::Other(anyhow::anyhow!(
                    "pipeline task died unexpectedly"
                )))
            }
        }
    }

    /// Stop audio capture and the pipeline.
    ///
    /// # Errors
    /// - `MandatumError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(MandatumError::NotRunning);
        }

        self.running.store(false, Ordering::SeqCst);
        self.set_status(EngineStatus::Stopped, None);
        info!("engine stop requested");
        Ok(())
    }

    /// Submit a typed line through the same gate/match path as voice input.
    /// Usable with or without audio capture running.
    pub fn submit_text(&self, text: &str) -> Result<()> {
        self.director.lock().handle_text(text)
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// Subscribe to recognized-text events.
    pub fn subscribe_recognition(&self) -> broadcast::Receiver<RecognitionEvent> {
        self.recognition_tx.subscribe()
    }

    /// Subscribe to dispatched command output events.
    pub fn subscribe_commands(&self) -> broadcast::Receiver<CommandOutputEvent> {
        self.command_tx.subscribe()
    }

    /// Subscribe to status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Subscribe to live audio level/voicing events.
    pub fn subscribe_activity(&self) -> broadcast::Receiver<AudioActivityEvent> {
        self.activity_tx.subscribe()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn pipeline_diagnostics_snapshot(&self) -> pipeline::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(EngineStatusEvent {
            status: new_status,
            detail,
        });
    }
}
