//! Protocol errors

use thiserror::Error;

use super::commands::InitStep;
use super::response::FinalStatus;
use crate::charset::CharsetError;

/// Errors raised by a transport while moving bytes
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no response before the deadline")]
    TimedOut,

    #[error("serial port closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while talking to the modem
#[derive(Error, Debug)]
pub enum ModemError {
    #[error("Modem initialization failed at step '{step}': {source}")]
    Init {
        step: InitStep,
        #[source]
        source: Box<ModemError>,
    },

    #[error("Timed out waiting for response to {command}")]
    Timeout { command: String },

    #[error("Malformed response to {command}: {reason}")]
    MalformedResponse { command: String, reason: String },

    #[error(transparent)]
    Charset(#[from] CharsetError),

    #[error("Failed to delete message {index}: modem answered {status}")]
    DeleteFailed { index: u32, status: FinalStatus },

    #[error("Failed to send message to {number}: modem answered {status}")]
    SendFailed { number: String, status: FinalStatus },

    #[error("{command} failed: modem answered {status}")]
    CommandFailed { command: String, status: FinalStatus },

    #[error("Transport error during {command}: {source}")]
    Transport {
        command: String,
        #[source]
        source: TransportError,
    },

    #[error("Invalid destination number {number:?}")]
    InvalidNumber { number: String },

    #[error("Serial port error: {0}")]
    Serial(String),
}

impl ModemError {
    /// Attribute a transport failure to the command in flight
    pub(crate) fn from_transport(command: &str, err: TransportError) -> Self {
        match err {
            TransportError::TimedOut => ModemError::Timeout {
                command: command.to_string(),
            },
            source => ModemError::Transport {
                command: command.to_string(),
                source,
            },
        }
    }

    pub(crate) fn malformed(command: &str, reason: impl Into<String>) -> Self {
        ModemError::MalformedResponse {
            command: command.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the byte stream can no longer be trusted and the session should be reinitialized
    pub fn desynchronizes_stream(&self) -> bool {
        matches!(
            self,
            ModemError::Init { .. }
                | ModemError::Timeout { .. }
                | ModemError::MalformedResponse { .. }
                | ModemError::Transport { .. }
        )
    }
}
