//! Progress Frame Codec
//!
//! Every [`WireFrame`] travels as a 4-byte little-endian length followed by
//! its rkyv archive. Progress frames are small, so the length is capped well
//! below anything a sane sender produces; a larger prefix means the stream is
//! corrupt and cannot be realigned.
//!
//! A payload that fails validation is still consumed in full, so the reader
//! stays on a frame boundary and the stream goes on with the next frame.

use crate::messages::WireFrame;
use rkyv::{AlignedVec, Deserialize, Infallible};
use std::io::{self, BufReader, Read, Write};
use thiserror::Error;

/// Largest payload accepted in either direction
const MAX_PAYLOAD: usize = 1024 * 1024;

/// Errors that end a progress stream
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Frame too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: usize, max: usize },
}

/// Outcome of reading one frame
#[derive(Debug)]
pub(crate) enum Received {
    /// A valid frame
    Frame(WireFrame),
    /// An unreadable payload was consumed; the next read starts on a new frame
    Skipped(String),
    /// The stream ended on a frame boundary
    Closed,
}

/// Writes frames, flushing each one so progress shows up while the run goes
pub(crate) struct FrameSink<W: Write> {
    writer: W,
}

impl<W: Write> FrameSink<W> {
    pub(crate) fn new(writer: W) -> Self {
        Self { writer }
    }

    pub(crate) fn send(&mut self, frame: &WireFrame) -> Result<(), FrameError> {
        let payload =
            rkyv::to_bytes::<_, 256>(frame).map_err(|e| FrameError::Encode(e.to_string()))?;
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::TooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        // One write per frame keeps a frame in a single segment on TCP
        let mut bytes = Vec::with_capacity(4 + payload.len());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&payload);
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        Ok(())
    }

    pub(crate) fn into_inner(self) -> W {
        self.writer
    }
}

/// Reads frames, skipping the ones that do not validate
pub(crate) struct FrameSource<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> FrameSource<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    pub(crate) fn next(&mut self) -> Result<Received, FrameError> {
        let mut header = [0u8; 4];
        match self.reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(Received::Closed),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(header) as usize;
        if len > MAX_PAYLOAD {
            return Err(FrameError::TooLarge {
                size: len,
                max: MAX_PAYLOAD,
            });
        }
        if len == 0 {
            return Ok(Received::Skipped("empty frame".to_string()));
        }

        let mut payload = AlignedVec::with_capacity(len);
        payload.resize(len, 0);
        self.reader.read_exact(&mut payload)?;

        let archived = match rkyv::check_archived_root::<WireFrame>(&payload) {
            Ok(archived) => archived,
            Err(e) => return Ok(Received::Skipped(e.to_string())),
        };
        let frame: Result<WireFrame, std::convert::Infallible> = archived.deserialize(&mut Infallible);
        match frame {
            Ok(frame) => Ok(Received::Frame(frame)),
            Err(never) => match never {},
        }
    }
}
