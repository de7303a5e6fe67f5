//! Event payloads broadcast by the engine.
//!
//! | Event | Channel |
//! |-------|---------|
//! | `RecognitionEvent` | `subscribe_recognition()` |
//! | `CommandOutputEvent` | `subscribe_commands()` |
//! | `EngineStatusEvent` | `subscribe_status()` |
//! | `AudioActivityEvent` | `subscribe_activity()` |
//!
//! Hosts consume these for presentation only — nothing downstream of a
//! broadcast feeds back into matching decisions.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Recognition events
// ---------------------------------------------------------------------------

/// Emitted whenever a phrase passes the attention gate and is transcribed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Sequence number of the phrase this text came from.
    pub phrase_seq: u64,
    /// Which transcription pass produced the text.
    pub stage: RecognitionStage,
    /// Recognized text; `"_"` marks a transcription miss.
    pub text: String,
}

/// Distinguishes the narrow keyword pass from the candidate's full pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionStage {
    /// Narrow pass over the union of keyword vocabularies.
    Keyword,
    /// Re-transcription with the candidate command's full vocabulary
    /// (or unrestricted, when the command has an open-ended slot).
    Full,
}

// ---------------------------------------------------------------------------
// Command output events
// ---------------------------------------------------------------------------

/// Emitted by the dispatch worker once an action has run (or failed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutputEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Name of the dispatched command.
    pub command: String,
    /// Rendered output template, degraded to an error line on action failure.
    pub output: String,
    /// Whether the action completed without error.
    pub succeeded: bool,
}

// ---------------------------------------------------------------------------
// Audio activity events
// ---------------------------------------------------------------------------

/// Emitted for each processed audio chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioActivityEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Peak-to-trough amplitude range of the chunk (0..=65535).
    pub amplitude_range: u32,
    /// Whether the chunk cleared the segmenter's threshold.
    pub is_voiced: bool,
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

/// Emitted when the engine state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. error message, timeout cue).
    pub detail: Option<String>,
}

/// Current state of the Mandatum engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine created but `start()` not yet called.
    Idle,
    /// Warming up the transcription backend.
    WarmingUp,
    /// Capturing audio, waiting for a wake word.
    Listening,
    /// Attention window open — accumulating command input.
    Focused,
    /// Capture stopped; engine may be restarted.
    Stopped,
    /// Unrecoverable error — restart required.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognition_event_serializes_with_camel_case_and_lowercase_stage() {
        let event = RecognitionEvent {
            seq: 7,
            phrase_seq: 3,
            stage: RecognitionStage::Keyword,
            text: "computer create note".into(),
        };

        let json = serde_json::to_value(&event).expect("serialize recognition event");
        assert_eq!(json["seq"], 7);
        assert_eq!(json["phraseSeq"], 3);
        assert_eq!(json["stage"], "keyword");
        assert_eq!(json["text"], "computer create note");

        let round_trip: RecognitionEvent =
            serde_json::from_value(json).expect("deserialize recognition event");
        assert_eq!(round_trip.stage, RecognitionStage::Keyword);
        assert_eq!(round_trip.phrase_seq, 3);
    }

    #[test]
    fn command_output_event_round_trips() {
        let event = CommandOutputEvent {
            seq: 2,
            command: "Get Time".into(),
            output: "the current time is 4:15 PM".into(),
            succeeded: true,
        };

        let json = serde_json::to_value(&event).expect("serialize command event");
        assert_eq!(json["command"], "Get Time");
        assert_eq!(json["succeeded"], true);

        let round_trip: CommandOutputEvent =
            serde_json::from_value(json).expect("deserialize command event");
        assert!(round_trip.succeeded);
        assert_eq!(round_trip.output, "the current time is 4:15 PM");
    }

    #[test]
    fn engine_status_event_serializes_with_lowercase_status() {
        let event = EngineStatusEvent {
            status: EngineStatus::Focused,
            detail: Some("wake word heard".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "focused");
        assert_eq!(json["detail"], "wake word heard");

        let round_trip: EngineStatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.status, EngineStatus::Focused);
    }

    #[test]
    fn recognition_stage_rejects_non_lowercase_values() {
        let invalid = r#""Keyword""#;
        let err = serde_json::from_str::<RecognitionStage>(invalid);
        assert!(err.is_err(), "expected invalid casing to fail");
    }

    #[test]
    fn audio_activity_event_serializes_with_camel_case_fields() {
        let event = AudioActivityEvent {
            seq: 3,
            amplitude_range: 812,
            is_voiced: true,
        };

        let json = serde_json::to_value(&event).expect("serialize activity event");
        assert_eq!(json["seq"], 3);
        assert_eq!(json["amplitudeRange"], 812);
        assert_eq!(json["isVoiced"], true);

        let round_trip: AudioActivityEvent =
            serde_json::from_value(json).expect("deserialize activity event");
        assert!(round_trip.is_voiced);
    }
}
