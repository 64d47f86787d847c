use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

use crate::dlog;

mod session;

pub use session::*;

/// Errors for remote oracle sessions
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("remote side closed the connection")]
    Closed,
    #[error("malformed line from remote: {0:?}")]
    MalformedLine(String),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("no unused correlation value after {0} draws")]
    CorrelationExhausted(usize),
    #[error("session already failed")]
    SessionFailed,
    #[error(transparent)]
    Dlog(#[from] dlog::Error),
}

/// Line-oriented request/response channel to a remote oracle
pub trait Transport {
    /// Read one line, without its line terminator
    fn recv_line(&mut self) -> Result<String, Error>;

    /// Write one line, the terminator is appended
    fn send_line(&mut self, line: &str) -> Result<(), Error>;
}

/// Transport over any buffered reader / writer pair
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> LineTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Consume the transport, returning the reader and writer
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl LineTransport<BufReader<TcpStream>, TcpStream> {
    /// Connect to a remote oracle over TCP
    pub fn connect<A: ToSocketAddrs>(addr: A, read_timeout: Option<Duration>) -> Result<Self, Error> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(read_timeout)?;
        let writer = stream.try_clone()?;

        Ok(Self::new(BufReader::new(stream), writer))
    }
}

impl<R: BufRead, W: Write> Transport for LineTransport<R, W> {
    fn recv_line(&mut self) -> Result<String, Error> {
        let mut line = String::new();

        if self.reader.read_line(&mut line)? == 0 {
            return Err(Error::Closed);
        }

        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }

        Ok(line)
    }

    fn send_line(&mut self, line: &str) -> Result<(), Error> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        Ok(())
    }
}
