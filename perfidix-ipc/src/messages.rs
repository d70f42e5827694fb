//! Progress Message Types
//!
//! [`ProgressEvent`] is what code works with; [`WireFrame`] is what travels.
//! A frame names its command with a word so a receiver can skip commands it
//! does not know.

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use thiserror::Error;

/// Command word of [`ProgressEvent::Init`]
pub const INIT: &str = "init";
/// Command word of [`ProgressEvent::UpdateCurrentRun`]
pub const UPDATE_CURRENT_RUN: &str = "updateCurrentRun";
/// Command word of [`ProgressEvent::UpdateError`]
pub const UPDATE_ERROR: &str = "updateError";
/// Command word of [`ProgressEvent::Finished`]
pub const FINISHED: &str = "finished";

/// Planned repetitions of one element
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct RunTotal {
    /// Element id, `Class::method`
    pub element: String,
    /// Planned repetitions
    pub runs: u32,
}

/// One frame as sent over the stream
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct WireFrame {
    /// Command word
    pub command: String,
    /// Planned runs, only for `init`
    pub totals: Vec<RunTotal>,
    /// Element id, for `updateCurrentRun` and `updateError`
    pub element: Option<String>,
    /// Error description, for `updateError`
    pub message: Option<String>,
}

/// Progress of a benchmark run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The run starts with these planned repetitions
    Init(Vec<RunTotal>),
    /// One repetition of the element finished
    UpdateCurrentRun(String),
    /// The element failed
    UpdateError {
        /// Element id
        element: String,
        /// What went wrong
        message: String,
    },
    /// The run is over
    Finished,
}

/// A frame that does not describe a known event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("command '{command}' is missing its {field}")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },
}

impl ProgressEvent {
    /// Command word of the event
    pub fn command(&self) -> &'static str {
        match self {
            ProgressEvent::Init(_) => INIT,
            ProgressEvent::UpdateCurrentRun(_) => UPDATE_CURRENT_RUN,
            ProgressEvent::UpdateError { .. } => UPDATE_ERROR,
            ProgressEvent::Finished => FINISHED,
        }
    }

    /// Wire form of the event
    pub fn to_frame(&self) -> WireFrame {
        let mut frame = WireFrame {
            command: self.command().to_string(),
            totals: Vec::new(),
            element: None,
            message: None,
        };
        match self {
            ProgressEvent::Init(totals) => frame.totals = totals.clone(),
            ProgressEvent::UpdateCurrentRun(element) => frame.element = Some(element.clone()),
            ProgressEvent::UpdateError { element, message } => {
                frame.element = Some(element.clone());
                frame.message = Some(message.clone());
            }
            ProgressEvent::Finished => {}
        }
        frame
    }

    /// Event described by a frame
    pub fn from_frame(frame: WireFrame) -> Result<Self, DecodeError> {
        let element = |command| {
            frame.element.clone().ok_or(DecodeError::MissingField {
                command,
                field: "element",
            })
        };

        match frame.command.as_str() {
            INIT => Ok(ProgressEvent::Init(frame.totals.clone())),
            UPDATE_CURRENT_RUN => Ok(ProgressEvent::UpdateCurrentRun(element(UPDATE_CURRENT_RUN)?)),
            UPDATE_ERROR => Ok(ProgressEvent::UpdateError {
                element: element(UPDATE_ERROR)?,
                message: frame.message.clone().unwrap_or_default(),
            }),
            FINISHED => Ok(ProgressEvent::Finished),
            _ => Err(DecodeError::UnknownCommand(frame.command.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_shapes() {
        let init = ProgressEvent::Init(vec![RunTotal {
            element: "A::b".to_string(),
            runs: 3,
        }])
        .to_frame();
        assert_eq!(init.command, "init");
        assert_eq!(init.totals.len(), 1);
        assert_eq!(init.element, None);

        let error = ProgressEvent::UpdateError {
            element: "A::b".to_string(),
            message: "boom".to_string(),
        }
        .to_frame();
        assert_eq!(error.command, "updateError");
        assert_eq!(error.element.as_deref(), Some("A::b"));
        assert_eq!(error.message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_from_frame() {
        let event = ProgressEvent::UpdateCurrentRun("A::b".to_string());
        assert_eq!(ProgressEvent::from_frame(event.to_frame()), Ok(event));

        let unknown = WireFrame {
            command: "reboot".to_string(),
            totals: Vec::new(),
            element: None,
            message: None,
        };
        assert_eq!(
            ProgressEvent::from_frame(unknown),
            Err(DecodeError::UnknownCommand("reboot".to_string()))
        );

        let incomplete = WireFrame {
            command: UPDATE_CURRENT_RUN.to_string(),
            totals: Vec::new(),
            element: None,
            message: None,
        };
        assert!(matches!(
            ProgressEvent::from_frame(incomplete),
            Err(DecodeError::MissingField { field: "element", .. })
        ));
    }
}
