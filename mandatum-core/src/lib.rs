//! # mandatum-core
//!
//! Reusable voice-command engine SDK.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → AudioCapture → SPSC RingBuffer → Pipeline(spawn_blocking)
//!                                                    │
//!                                            PhraseSegmenter
//!                                                    │
//!                                     AttentionWindow (wake gate)
//!                                                    │
//!                            MatchEngine (Transcriber + CommandGrammar)
//!                                                    │
//!                              Dispatcher ──► action worker thread
//!                                                    │
//!                                broadcast::Sender<CommandOutputEvent>
//! ```
//!
//! The audio callback is zero-alloc. All heap work happens in the pipeline
//! thread; command actions run on a dedicated dispatch worker.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod attention;
pub mod audio;
pub mod buffering;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod grammar;
pub mod ipc;
pub mod matcher;
pub mod segment;
pub mod transcribe;

// Convenience re-exports for downstream crates
pub use attention::{AttentionWindow, FocusDecision};
pub use engine::{EngineConfig, MandatumEngine};
pub use error::MandatumError;
pub use grammar::{ActionFn, ArgTemplate, Command, CommandSet, Requirement, SlotValue, Token};
pub use ipc::events::{
    AudioActivityEvent, CommandOutputEvent, EngineStatus, EngineStatusEvent, RecognitionEvent,
    RecognitionStage,
};
pub use matcher::{CommandMatch, MatchEngine};
pub use segment::{Phrase, PhraseSegmenter, SegmenterConfig};
pub use transcribe::{stub::StubTranscriber, Transcriber, TranscriberHandle};
