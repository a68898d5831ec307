//! Byte streams for one client connection, plus the line-oriented reader
//! and writer the worker drives.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use native_tls::TlsStream;

use crate::smtp::error::SmtpError;
use crate::smtp::response::SmtpResponse;

/// Upper bound on one DATA transmission, protecting the in-memory store.
pub const MAX_DATA_SIZE: usize = 10 * 1024 * 1024;

const READ_CHUNK_SIZE: usize = 4096;

/// A bidirectional client stream, plain or TLS-wrapped.
pub enum Connection {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Connection {
    fn tcp(&self) -> &TcpStream {
        match self {
            Connection::Plain(stream) => stream,
            Connection::Tls(stream) => stream.get_ref(),
        }
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.tcp().peer_addr()
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.tcp().set_read_timeout(timeout)
    }

    /// Close both directions of the connection.
    pub fn shutdown(&mut self) -> io::Result<()> {
        match self {
            Connection::Plain(stream) => stream.shutdown(Shutdown::Both),
            Connection::Tls(stream) => stream.shutdown(),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(stream) => stream.read(buf),
            Connection::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(stream) => stream.write(buf),
            Connection::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Plain(stream) => stream.flush(),
            Connection::Tls(stream) => stream.flush(),
        }
    }
}

/// Line-oriented view of a connection. Reads are bounded by a session
/// deadline so a stalled client cannot hold a worker forever.
pub struct SmtpStream {
    conn: Connection,
    buffer: Vec<u8>,
}

impl SmtpStream {
    pub fn new(conn: Connection) -> Self {
        SmtpStream {
            conn,
            buffer: Vec::new(),
        }
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.conn.peer_addr()
    }

    /// Write one reply and flush it.
    pub fn send(&mut self, response: &SmtpResponse) -> Result<(), SmtpError> {
        self.conn.write_all(response.format().as_bytes())?;
        self.conn.flush()?;
        Ok(())
    }

    /// Read one logical line, without its terminator. Invalid UTF-8 is
    /// replaced rather than rejected. Fails with `Timeout` once the
    /// deadline passes and `ConnectionClosed` on EOF.
    pub fn read_line(&mut self, deadline: Instant) -> Result<String, SmtpError> {
        loop {
            if let Some(position) = self.buffer.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=position).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }

                return Ok(String::from_utf8_lossy(&line).into_owned());
            }

            if self.buffer.len() > MAX_DATA_SIZE {
                return Err(SmtpError::TransactionFailed);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SmtpError::Timeout);
            }
            self.conn.set_read_timeout(Some(remaining))?;

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            match self.conn.read(&mut chunk) {
                Ok(0) => return Err(SmtpError::ConnectionClosed),
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(err)
                    if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    return Err(SmtpError::Timeout);
                }
                Err(err) => return Err(SmtpError::Io(err)),
            }
        }
    }

    /// Read a DATA payload: lines up to (not including) the terminating
    /// `.` line, dot-unstuffed and rejoined with CRLF.
    pub fn read_data_block(&mut self, deadline: Instant) -> Result<String, SmtpError> {
        let mut lines: Vec<String> = Vec::new();
        let mut total = 0usize;

        loop {
            let line = self.read_line(deadline)?;

            if line == "." {
                return Ok(lines.join("\r\n"));
            }

            // A leading dot is a dot-stuff escape; drop it.
            let line = match line.strip_prefix('.') {
                Some(rest) => rest.to_string(),
                None => line,
            };

            total += line.len() + 2;
            if total > MAX_DATA_SIZE {
                return Err(SmtpError::TransactionFailed);
            }

            lines.push(line);
        }
    }

    /// Close the underlying connection.
    pub fn close(&mut self) {
        let _ = self.conn.shutdown();
    }
}
