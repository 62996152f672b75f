//! Modem session
//!
//! Drives the request/response exchange with the modem: every operation
//! writes one command, discards the echo, and reads lines until a terminal
//! status. Listing additionally reads each record's payload by exact length.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{
    commands::{is_valid_number, AtCommand, InitStep, MessageFilter, CTRL_Z},
    response::{FinalStatus, ListHeader, BODY_PROMPT, LIST_PREFIX},
    serial::open_port,
    transport::{SerialTransport, StreamTransport, Transport},
    ModemError, DEFAULT_SEND_TIMEOUT_MS, DEFAULT_TIMEOUT_MS,
};
use crate::charset::{CharsetError, CharsetMapping, Code};
use crate::config::ModemConfig;
use crate::sms::SmsRecord;

/// Command response: informational lines plus the terminal status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub lines: Vec<String>,
    pub status: FinalStatus,
}

/// A session with one modem over an exclusively owned transport
pub struct ModemSession<T: Transport = SerialTransport> {
    transport: T,
    /// Deadline for ordinary commands
    timeout: Duration,
    /// Deadline for `AT+CMGS`, which waits on the network
    send_timeout: Duration,
}

impl ModemSession<SerialTransport> {
    /// Open the configured device and run the initialization sequence
    pub fn open(config: &ModemConfig) -> Result<Self, ModemError> {
        let port = open_port(config)?;
        let mut session = ModemSession::new(StreamTransport::new(port), config.timeout())
            .with_send_timeout(config.send_timeout());
        session.initialize()?;
        info!("modem on {} ready", config.device);
        Ok(session)
    }
}

impl<T: Transport> ModemSession<T> {
    /// Wrap a transport without touching the device
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            send_timeout: timeout.max(Duration::from_millis(DEFAULT_SEND_TIMEOUT_MS)),
        }
    }

    /// Session with the default command deadline
    pub fn with_default_timeout(transport: T) -> Self {
        Self::new(transport, Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    /// Override the deadline used while sending a message
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Reset the modem and select text mode, header detail and the GSM character set
    pub fn initialize(&mut self) -> Result<(), ModemError> {
        for step in InitStep::SEQUENCE {
            let command = step.command();
            let outcome = self.execute(&command).and_then(|response| {
                if response.status.is_success() {
                    Ok(())
                } else {
                    Err(ModemError::CommandFailed {
                        command: command.line(),
                        status: response.status,
                    })
                }
            });

            if let Err(e) = outcome {
                warn!("initialization step {} failed: {}", step, e);
                return Err(ModemError::Init {
                    step,
                    source: Box::new(e),
                });
            }
            debug!("initialization step {} done", step);
        }
        Ok(())
    }

    /// Send a command and collect its response up to the terminal status
    pub fn execute(&mut self, command: &AtCommand) -> Result<Response, ModemError> {
        let deadline = Instant::now() + self.timeout;
        let first = self.send_command(command, deadline)?;
        self.collect_response(command, first, deadline)
    }

    /// All stored messages
    pub fn list_messages(&mut self) -> Result<Vec<SmsRecord>, ModemError> {
        self.list_messages_with(MessageFilter::All)
    }

    /// Stored messages matching `filter`, in the order the modem reports them
    pub fn list_messages_with(
        &mut self,
        filter: MessageFilter,
    ) -> Result<Vec<SmsRecord>, ModemError> {
        let command = AtCommand::ListMessages(filter);
        let deadline = Instant::now() + self.timeout;
        let mut pending = self.send_command(&command, deadline)?;
        let mut records = Vec::new();

        loop {
            let line = match pending.take() {
                Some(line) => line,
                None => self.read_line(&command, deadline)?,
            };

            if let Some(status) = FinalStatus::parse(&line) {
                if !status.is_success() {
                    return Err(ModemError::CommandFailed {
                        command: command.line(),
                        status,
                    });
                }
                debug!("listed {} messages", records.len());
                return Ok(records);
            }

            if !line.trim_start().starts_with(LIST_PREFIX) {
                continue;
            }

            // A bad header leaves the payload unread; the stream can't be followed past it
            let header = ListHeader::parse(&line)
                .map_err(|e| e.to_string())
                .and_then(|h| {
                    h.decode_text_fields(CharsetMapping::gsm())
                        .map_err(|e| e.to_string())
                })
                .map_err(|e| ModemError::malformed(&command.line(), format!("{} in {:?}", e, line)))?;
            let payload = self
                .transport
                .read_exact(header.length, deadline)
                .map_err(|e| ModemError::from_transport(&command.line(), e))?;
            let text = CharsetMapping::gsm().decode(&payload)?;
            records.push(SmsRecord::from_header(header, text));
        }
    }

    /// Delete the message stored at `index`
    pub fn delete_message(&mut self, index: u32) -> Result<(), ModemError> {
        let response = self.execute(&AtCommand::DeleteMessage(index))?;
        if !response.status.is_success() {
            return Err(ModemError::DeleteFailed {
                index,
                status: response.status,
            });
        }
        info!("deleted message {}", index);
        Ok(())
    }

    /// Delete the slot a listed record came from
    pub fn delete_record(&mut self, record: &SmsRecord) -> Result<(), ModemError> {
        self.delete_message(record.index)
    }

    /// Delete records in order, stopping at the first failure
    pub fn delete_records(&mut self, records: &[SmsRecord]) -> Result<usize, ModemError> {
        for record in records {
            self.delete_record(record)?;
        }
        Ok(records.len())
    }

    /// Send `text` to `number`.
    ///
    /// Returns the message reference from `+CMGS: <mr>` when the modem reports one.
    pub fn send_message(&mut self, number: &str, text: &str) -> Result<Option<u32>, ModemError> {
        if !is_valid_number(number) {
            return Err(ModemError::InvalidNumber {
                number: number.to_string(),
            });
        }
        let body = encode_body(text)?;

        let command = AtCommand::SendMessage(number.to_string());
        let deadline = Instant::now() + self.send_timeout;
        let mut pending = self.send_command(&command, deadline)?;

        loop {
            let line = match pending.take() {
                Some(line) => line,
                None => self.read_line(&command, deadline)?,
            };
            if line.trim() == BODY_PROMPT {
                break;
            }
            if let Some(status) = FinalStatus::parse(&line) {
                return Err(ModemError::SendFailed {
                    number: number.to_string(),
                    status,
                });
            }
        }

        self.write(&command, &body)?;
        self.write(&command, &[CTRL_Z])?;

        let mut echoed = body;
        echoed.push(CTRL_Z);
        let first = self.skip_body_echo(&command, &echoed, deadline)?;
        let response = self.collect_response(&command, first, deadline)?;
        if !response.status.is_success() {
            return Err(ModemError::SendFailed {
                number: number.to_string(),
                status: response.status,
            });
        }

        let reference = response
            .lines
            .iter()
            .find_map(|l| l.trim().strip_prefix("+CMGS:"))
            .and_then(|mr| mr.trim().parse::<u32>().ok());
        info!("sent message to {} (reference {:?})", number, reference);
        Ok(reference)
    }

    /// Write a command and consume its echo.
    ///
    /// Returns the first line after the echo if the modem did not echo.
    fn send_command(
        &mut self,
        command: &AtCommand,
        deadline: Instant,
    ) -> Result<Option<String>, ModemError> {
        self.write(command, &command.to_bytes())?;

        let echo = command.line();
        loop {
            let line = self.read_line(command, deadline)?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed == echo {
                return Ok(None);
            }
            warn!("expected echo of {}, got {:?}", echo, line);
            return Ok(Some(line));
        }
    }

    /// Consume the modem's echo of a message body, line by line.
    ///
    /// The echo ends with the line carrying Ctrl-Z. The first line that is not
    /// the next expected body line is returned so a modem without echo still
    /// reports its status.
    fn skip_body_echo(
        &mut self,
        command: &AtCommand,
        echoed: &[u8],
        deadline: Instant,
    ) -> Result<Option<String>, ModemError> {
        let echoed = String::from_utf8_lossy(echoed);
        let mut expected = echoed
            .split('\n')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .peekable();

        while let Some(&want) = expected.peek() {
            let line = self.read_line(command, deadline)?;
            let seen = line.trim();
            if seen.is_empty() || seen == BODY_PROMPT {
                continue;
            }
            let unprompted = seen.strip_prefix(BODY_PROMPT).map(str::trim_start);
            if seen == want || unprompted == Some(want) {
                expected.next();
                continue;
            }
            debug!("body echo ended early at {:?}", line);
            return Ok(Some(line));
        }
        Ok(None)
    }

    fn collect_response(
        &mut self,
        command: &AtCommand,
        mut pending: Option<String>,
        deadline: Instant,
    ) -> Result<Response, ModemError> {
        let mut lines = Vec::new();
        loop {
            let line = match pending.take() {
                Some(line) => line,
                None => self.read_line(command, deadline)?,
            };
            if let Some(status) = FinalStatus::parse(&line) {
                debug!("{} -> {}", command, status);
                return Ok(Response { lines, status });
            }
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
    }

    fn read_line(&mut self, command: &AtCommand, deadline: Instant) -> Result<String, ModemError> {
        self.transport
            .read_line(deadline)
            .map_err(|e| ModemError::from_transport(&command.line(), e))
    }

    fn write(&mut self, command: &AtCommand, bytes: &[u8]) -> Result<(), ModemError> {
        self.transport
            .write_all(bytes)
            .map_err(|e| ModemError::from_transport(&command.line(), e))
    }
}

/// Encode a message body, rejecting glyphs whose code is the end-of-body byte
fn encode_body(text: &str) -> Result<Vec<u8>, ModemError> {
    let gsm = CharsetMapping::gsm();
    if let Some(ch) = text
        .chars()
        .find(|&c| gsm.code_for(c) == Ok(Code::Single(CTRL_Z)))
    {
        return Err(CharsetError::UnencodableCharacter { ch }.into());
    }
    Ok(gsm.encode(text)?)
}

impl<T: Transport> std::fmt::Debug for ModemSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModemSession")
            .field("timeout", &self.timeout)
            .field("send_timeout", &self.send_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_rejects_terminator_glyph() {
        assert!(matches!(
            encode_body("Ξ"),
            Err(ModemError::Charset(CharsetError::UnencodableCharacter { ch: 'Ξ' }))
        ));
        assert_eq!(encode_body("café").unwrap(), vec![b'c', b'a', b'f', 0x05]);
    }
}
