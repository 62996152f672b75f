//! AT Command Protocol
//!
//! Text-mode SMS over the AT command set: command framing, response parsing,
//! the byte transport contract, and the session that ties them together.

pub mod commands;
mod error;
pub mod response;
pub mod serial;
mod session;
pub mod transport;

pub use commands::{AtCommand, InitStep, MessageFilter};
pub use error::{ModemError, TransportError};
pub use response::{FinalStatus, ListHeader};
pub use serial::{configure_port, list_ports, open_port, PortInfo};
pub use session::{ModemSession, Response};
pub use transport::{SerialTransport, StreamTransport, Transport};

/// Default baud rate for modem communication
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default deadline for a command's complete response in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default deadline for `AT+CMGS`, which waits for network submission
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 60000;
