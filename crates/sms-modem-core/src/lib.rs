//! # sms-modem core library
//!
//! Drives a GSM/GPRS modem over a serial line with AT commands to list,
//! delete and send SMS messages.

#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - GSM 7-bit character set transcoding, including the escape extension table
//! - AT command framing and response parsing for text-mode SMS
//! - A synchronous modem session over any line-oriented transport
//! - Serial port helpers and JSON configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_modem_core::{config::ModemConfig, protocol::ModemSession};
//!
//! let config = ModemConfig::load_or_default(None)?;
//! let mut session = ModemSession::open(&config)?;
//!
//! for record in session.list_messages()? {
//!     println!("{}: {}", record.address, record.text);
//! }
//! session.send_message("+491701234567", "Grüße!")?;
//! ```

pub mod charset;
pub mod config;
pub mod protocol;
pub mod sms;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::charset::{CharsetError, CharsetMapping};
    pub use crate::config::ModemConfig;
    pub use crate::protocol::{MessageFilter, ModemError, ModemSession, Transport};
    pub use crate::sms::SmsRecord;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
