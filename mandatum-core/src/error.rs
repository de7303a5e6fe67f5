use thiserror::Error;

/// All errors produced by mandatum-core.
#[derive(Debug, Error)]
pub enum MandatumError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("transcription backend error: {0}")]
    Transcription(String),

    #[error("command `{command}`: must declare at least one requirement")]
    EmptyCommand { command: String },

    #[error("command `{command}`: the keyword requirement cannot contain an open-ended slot")]
    OpenEndedKeyword { command: String },

    #[error("command `{command}`: more than one open-ended requirement")]
    DuplicateOpenEnded { command: String },

    #[error("command `{command}`: open-ended requirement nested inside a combinator")]
    NestedOpenEnded { command: String },

    #[error("command `{command}`: template slot index {index} out of range (command has {slots} slots)")]
    SlotIndexOutOfRange {
        command: String,
        index: usize,
        slots: usize,
    },

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MandatumError>;
