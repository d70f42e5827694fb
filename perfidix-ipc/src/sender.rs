//! Progress Sender

use crate::framing::{FrameError, FrameSink};
use crate::messages::ProgressEvent;
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

/// Writes progress events to a stream
pub struct ProgressSender<W: Write> {
    sink: FrameSink<W>,
}

impl ProgressSender<TcpStream> {
    /// Open a TCP connection to a progress receiver
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, FrameError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        debug!(peer = ?stream.peer_addr().ok(), "progress sender connected");
        Ok(Self::new(stream))
    }
}

impl<W: Write> ProgressSender<W> {
    /// Wrap any writer
    pub fn new(writer: W) -> Self {
        Self {
            sink: FrameSink::new(writer),
        }
    }

    /// Send one event; the frame is flushed before this returns
    pub fn send(&mut self, event: &ProgressEvent) -> Result<(), FrameError> {
        self.sink.send(&event.to_frame())
    }

    /// Consume the sender and return the underlying writer
    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }
}
