#![warn(missing_docs)]
//! Perfidix Progress Stream
//!
//! Carries the progress of a running benchmark to another process: the plan,
//! each finished repetition, each error, and the end of the run. Frames are
//! rkyv-encoded and length-prefixed.

mod framing;
mod messages;
mod receiver;
mod sender;

pub use framing::FrameError;
pub use messages::{
    DecodeError, FINISHED, INIT, ProgressEvent, RunTotal, UPDATE_CURRENT_RUN, UPDATE_ERROR,
    WireFrame,
};
pub use receiver::{ProgressReceiver, ReceiverExit};
pub use sender::ProgressSender;
