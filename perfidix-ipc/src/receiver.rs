//! Progress Receiver

use crate::framing::{FrameSource, Received};
use crate::messages::ProgressEvent;
use std::io::Read;
use std::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

/// Why a receiver loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverExit {
    /// The sender announced the end of the run
    Finished,
    /// The stream ended or broke before `finished`; the sender may reconnect
    Disconnected,
}

/// Reads progress events from a stream
pub struct ProgressReceiver<R: Read> {
    source: FrameSource<R>,
}

impl ProgressReceiver<TcpStream> {
    /// Wait for one sender on `listener`
    pub fn accept(listener: &TcpListener) -> std::io::Result<Self> {
        let (stream, peer) = listener.accept()?;
        debug!(%peer, "progress sender accepted");
        Ok(Self::new(stream))
    }
}

impl<R: Read> ProgressReceiver<R> {
    /// Wrap any reader
    pub fn new(reader: R) -> Self {
        Self {
            source: FrameSource::new(reader),
        }
    }

    /// Feed events to `handler` until the run finishes or the stream ends.
    ///
    /// Frames with unknown commands or invalid payloads are logged and
    /// skipped.
    pub fn run(&mut self, mut handler: impl FnMut(ProgressEvent)) -> ReceiverExit {
        loop {
            let frame = match self.source.next() {
                Ok(Received::Frame(frame)) => frame,
                Ok(Received::Skipped(reason)) => {
                    warn!(%reason, "skipping unreadable progress frame");
                    continue;
                }
                Ok(Received::Closed) => {
                    debug!("progress stream closed");
                    return ReceiverExit::Disconnected;
                }
                Err(e) => {
                    warn!(error = %e, "progress stream failed");
                    return ReceiverExit::Disconnected;
                }
            };

            match ProgressEvent::from_frame(frame) {
                Ok(ProgressEvent::Finished) => {
                    handler(ProgressEvent::Finished);
                    return ReceiverExit::Finished;
                }
                Ok(event) => handler(event),
                Err(e) => warn!(error = %e, "ignoring progress frame"),
            }
        }
    }
}
