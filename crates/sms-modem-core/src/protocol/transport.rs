//! Byte transport
//!
//! The session needs three primitives from the wire: write bytes, read one
//! response line, and read an exact number of raw payload bytes. [`Transport`]
//! captures that contract; [`StreamTransport`] implements it over any
//! `Read + Write` channel with an internal buffer.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::{debug, trace};

use super::error::TransportError;

/// Sleep between polls when the channel reports `WouldBlock`
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Line-oriented duplex byte stream
pub trait Transport {
    /// Write every byte of `bytes`
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read one newline-terminated line with CR/LF trimmed.
    ///
    /// The body prompt `"> "` has no terminator and is returned as a line of its own.
    fn read_line(&mut self, deadline: Instant) -> Result<String, TransportError>;

    /// Read exactly `len` raw bytes
    fn read_exact(&mut self, len: usize, deadline: Instant) -> Result<Vec<u8>, TransportError>;
}

/// Buffered [`Transport`] over a byte channel
pub struct StreamTransport<C> {
    channel: C,
    buffer: Vec<u8>,
}

/// Transport over an open serial port
pub type SerialTransport = StreamTransport<Box<dyn SerialPort>>;

impl<C: Read + Write> StreamTransport<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            buffer: Vec::new(),
        }
    }

    /// Access the underlying channel
    pub fn get_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Consume the transport, returning the channel
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Pull whatever the channel has into the buffer
    fn fill(&mut self, deadline: Instant) -> Result<(), TransportError> {
        if Instant::now() >= deadline {
            return Err(TransportError::TimedOut);
        }

        let mut chunk = [0u8; 256];
        match self.channel.read(&mut chunk) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => {
                trace!("read {} bytes: {:02x?}", n, &chunk[..n]);
                self.buffer.extend_from_slice(&chunk[..n]);
                Ok(())
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
                Ok(())
            }
            // Serial reads time out every poll period; the deadline decides when to stop
            Err(ref e)
                if e.kind() == io::ErrorKind::TimedOut
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(())
            }
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

impl<C: Read + Write> Transport for StreamTransport<C> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        debug!("-> {:?}", String::from_utf8_lossy(bytes));
        self.channel.write_all(bytes)?;
        self.channel.flush()?;
        Ok(())
    }

    fn read_line(&mut self, deadline: Instant) -> Result<String, TransportError> {
        loop {
            if self.buffer.starts_with(b"> ") {
                self.buffer.drain(..2);
                debug!("<- prompt");
                return Ok("> ".to_string());
            }

            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw)
                    .trim_end_matches(&['\r', '\n'][..])
                    .to_string();
                debug!("<- {:?}", line);
                return Ok(line);
            }

            self.fill(deadline)?;
        }
    }

    fn read_exact(&mut self, len: usize, deadline: Instant) -> Result<Vec<u8>, TransportError> {
        while self.buffer.len() < len {
            self.fill(deadline)?;
        }
        let payload: Vec<u8> = self.buffer.drain(..len).collect();
        debug!("<- {} payload bytes", payload.len());
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    /// Reads from a canned script, records writes
    struct Script {
        incoming: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Script {
        fn new(incoming: &[u8]) -> Self {
            Self {
                incoming: Cursor::new(incoming.to_vec()),
                written: Vec::new(),
            }
        }
    }

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.incoming.read(buf)
        }
    }

    impl Write for Script {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(1)
    }

    #[test]
    fn test_lines_are_trimmed() {
        let mut t = StreamTransport::new(Script::new(b"ATZ\r\r\nOK\r\n"));
        assert_eq!(t.read_line(deadline()).unwrap(), "ATZ");
        assert_eq!(t.read_line(deadline()).unwrap(), "OK");
    }

    #[test]
    fn test_exact_read_is_binary_safe() {
        let mut t = StreamTransport::new(Script::new(b"hdr\r\n\x00\n\x05x\r\nOK\r\n"));
        assert_eq!(t.read_line(deadline()).unwrap(), "hdr");
        assert_eq!(t.read_exact(4, deadline()).unwrap(), vec![0x00, b'\n', 0x05, b'x']);
        assert_eq!(t.read_line(deadline()).unwrap(), "");
        assert_eq!(t.read_line(deadline()).unwrap(), "OK");
    }

    #[test]
    fn test_prompt_is_its_own_line() {
        let mut t = StreamTransport::new(Script::new(b"\r\n> hi\x1a\r\nOK\r\n"));
        assert_eq!(t.read_line(deadline()).unwrap(), "");
        assert_eq!(t.read_line(deadline()).unwrap(), "> ");
        assert_eq!(t.read_line(deadline()).unwrap(), "hi\u{1a}");
        assert_eq!(t.read_line(deadline()).unwrap(), "OK");
    }

    #[test]
    fn test_end_of_stream_is_closed() {
        let mut t = StreamTransport::new(Script::new(b"partial"));
        assert!(matches!(
            t.read_line(deadline()),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let mut t = StreamTransport::new(Script::new(b"OK\r\n"));
        let now = Instant::now();
        assert!(matches!(t.read_line(now), Err(TransportError::TimedOut)));
    }

    #[test]
    fn test_writes_reach_channel() {
        let mut t = StreamTransport::new(Script::new(b""));
        t.write_all(b"ATZ\r").unwrap();
        assert_eq!(t.into_inner().written, b"ATZ\r".to_vec());
    }
}
