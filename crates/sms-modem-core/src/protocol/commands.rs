//! AT commands
//!
//! Every command the session issues is an [`AtCommand`] value. Framing lives in
//! one place, [`AtCommand::to_bytes`], so it can be checked without a modem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Command line terminator
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Ends the message body of `AT+CMGS`
pub const CTRL_Z: u8 = 0x1A;

/// Character set name the session selects on the modem
pub const GSM_CHARSET: &str = "GSM";

/// Storage filter for `AT+CMGL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MessageFilter {
    /// Received, not yet read
    ReceivedUnread,
    /// Received and read
    ReceivedRead,
    /// Stored, not yet sent
    StoredUnsent,
    /// Stored and sent
    StoredSent,
    /// Everything in storage
    #[default]
    All,
}

impl MessageFilter {
    /// Status token used by text mode
    pub fn token(&self) -> &'static str {
        match self {
            MessageFilter::ReceivedUnread => "REC UNREAD",
            MessageFilter::ReceivedRead => "REC READ",
            MessageFilter::StoredUnsent => "STO UNSENT",
            MessageFilter::StoredSent => "STO SENT",
            MessageFilter::All => "ALL",
        }
    }
}

/// AT commands used by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtCommand {
    /// `ATZ`
    Reset,
    /// `AT+CMGF=1`
    TextMode,
    /// `AT+CSDH=1`, adds address type and length to text-mode headers
    ShowTextModeParameters,
    /// `AT+CSCS="<charset>"`
    SelectCharacterSet(String),
    /// `AT+CMGL="<filter>"`
    ListMessages(MessageFilter),
    /// `AT+CMGD=<index>`
    DeleteMessage(u32),
    /// `AT+CMGS="<number>"`; the body follows the `> ` prompt
    SendMessage(String),
}

impl AtCommand {
    /// Command text without the terminator, as the modem echoes it
    pub fn line(&self) -> String {
        match self {
            AtCommand::Reset => "ATZ".to_string(),
            AtCommand::TextMode => "AT+CMGF=1".to_string(),
            AtCommand::ShowTextModeParameters => "AT+CSDH=1".to_string(),
            AtCommand::SelectCharacterSet(charset) => format!("AT+CSCS=\"{}\"", charset),
            AtCommand::ListMessages(filter) => format!("AT+CMGL=\"{}\"", filter.token()),
            AtCommand::DeleteMessage(index) => format!("AT+CMGD={}", index),
            AtCommand::SendMessage(number) => format!("AT+CMGS=\"{}\"", number),
        }
    }

    /// Wire bytes, terminated with carriage return
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.line().into_bytes();
        bytes.push(COMMAND_TERMINATOR);
        bytes
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line())
    }
}

/// Initialization sequence, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    Reset,
    TextMode,
    HeaderDetail,
    CharacterSet,
}

impl InitStep {
    /// All steps in the order they run
    pub const SEQUENCE: [InitStep; 4] = [
        InitStep::Reset,
        InitStep::TextMode,
        InitStep::HeaderDetail,
        InitStep::CharacterSet,
    ];

    /// Command issued for this step
    pub fn command(&self) -> AtCommand {
        match self {
            InitStep::Reset => AtCommand::Reset,
            InitStep::TextMode => AtCommand::TextMode,
            InitStep::HeaderDetail => AtCommand::ShowTextModeParameters,
            InitStep::CharacterSet => AtCommand::SelectCharacterSet(GSM_CHARSET.to_string()),
        }
    }
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InitStep::Reset => "reset",
            InitStep::TextMode => "text mode",
            InitStep::HeaderDetail => "header detail",
            InitStep::CharacterSet => "character set",
        };
        write!(f, "{} ({})", name, self.command())
    }
}

/// Check a destination number before it is embedded in `AT+CMGS`
pub fn is_valid_number(number: &str) -> bool {
    let digits = number.strip_prefix('+').unwrap_or(number);
    !digits.is_empty()
        && digits
            .chars()
            .all(|c| c.is_ascii_digit() || c == '*' || c == '#')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_command_framing() {
        assert_eq!(AtCommand::Reset.to_bytes(), b"ATZ\r".to_vec());
        assert_eq!(AtCommand::TextMode.to_bytes(), b"AT+CMGF=1\r".to_vec());
        assert_eq!(
            AtCommand::ShowTextModeParameters.to_bytes(),
            b"AT+CSDH=1\r".to_vec()
        );
        assert_eq!(
            AtCommand::SelectCharacterSet("GSM".into()).to_bytes(),
            b"AT+CSCS=\"GSM\"\r".to_vec()
        );
        assert_eq!(
            AtCommand::ListMessages(MessageFilter::All).to_bytes(),
            b"AT+CMGL=\"ALL\"\r".to_vec()
        );
        assert_eq!(AtCommand::DeleteMessage(5).to_bytes(), b"AT+CMGD=5\r".to_vec());
        assert_eq!(
            AtCommand::SendMessage("12345".into()).to_bytes(),
            b"AT+CMGS=\"12345\"\r".to_vec()
        );
    }

    #[test]
    fn test_filter_tokens() {
        assert_eq!(
            AtCommand::ListMessages(MessageFilter::ReceivedUnread).line(),
            "AT+CMGL=\"REC UNREAD\""
        );
        assert_eq!(MessageFilter::default(), MessageFilter::All);
    }

    #[test]
    fn test_init_sequence_order() {
        let lines: Vec<String> = InitStep::SEQUENCE
            .iter()
            .map(|s| s.command().line())
            .collect();
        assert_eq!(
            lines,
            vec!["ATZ", "AT+CMGF=1", "AT+CSDH=1", "AT+CSCS=\"GSM\""]
        );
    }

    #[test]
    fn test_init_step_display_names_command() {
        assert_eq!(InitStep::TextMode.to_string(), "text mode (AT+CMGF=1)");
    }

    #[test]
    fn test_number_validation() {
        assert!(is_valid_number("12345"));
        assert!(is_valid_number("+491701234567"));
        assert!(is_valid_number("*100#"));
        assert!(!is_valid_number(""));
        assert!(!is_valid_number("+"));
        assert!(!is_valid_number("123\"\rATZ"));
        assert!(!is_valid_number("12 34"));
    }
}
