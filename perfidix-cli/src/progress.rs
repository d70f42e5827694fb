//! Progress listeners
//!
//! [`ProgressBarListener`] draws a terminal bar over all planned repetitions.
//! [`SocketProgressListener`] forwards the same events to a progress
//! receiver in another process, where [`ProgressDisplay`] draws them.

use indicatif::{ProgressBar, ProgressStyle};
use perfidix_core::{BenchListener, BenchmarkResult, Failure, ListenerError, PlannedRuns};
use perfidix_ipc::{FrameError, ProgressEvent, ProgressSender, RunTotal};
use std::collections::HashMap;
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

/// An empty bar on stderr in the run style
pub fn styled_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar
}

/// Terminal progress bar over every planned repetition
pub struct ProgressBarListener {
    bar: ProgressBar,
    planned: HashMap<String, u32>,
    done: HashMap<String, u32>,
}

impl ProgressBarListener {
    /// Bar drawn on stderr
    pub fn new() -> Self {
        Self::with_bar(styled_bar())
    }

    /// Drive an existing bar
    pub fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            planned: HashMap::new(),
            done: HashMap::new(),
        }
    }

    /// The underlying bar
    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl Default for ProgressBarListener {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchListener for ProgressBarListener {
    fn init(&mut self, plan: &[PlannedRuns]) -> Result<(), ListenerError> {
        self.planned = plan.iter().map(|p| (p.method.clone(), p.runs)).collect();
        self.done.clear();
        self.bar
            .set_length(plan.iter().map(|p| u64::from(p.runs)).sum());
        Ok(())
    }

    fn run_completed(
        &mut self,
        method: &str,
        _repetition: u32,
        _samples: &[f64],
    ) -> Result<(), ListenerError> {
        *self.done.entry(method.to_string()).or_default() += 1;
        self.bar.set_message(method.to_string());
        self.bar.inc(1);
        Ok(())
    }

    fn failure(&mut self, failure: &Failure) -> Result<(), ListenerError> {
        self.bar.println(format!(
            "{} [{}] failed: {}",
            failure.method_id(),
            failure.role,
            failure.message
        ));
        Ok(())
    }

    fn skipped(&mut self, method: &str, reason: &str) -> Result<(), ListenerError> {
        let planned = self.planned.get(method).copied().unwrap_or(0);
        let done = self.done.get(method).copied().unwrap_or(0);
        self.bar.inc(u64::from(planned.saturating_sub(done)));
        self.bar.println(format!("{method} skipped: {reason}"));
        Ok(())
    }

    fn finished(&mut self, _result: &BenchmarkResult) -> Result<(), ListenerError> {
        self.bar.finish_with_message("Complete");
        Ok(())
    }
}

/// Forwards engine events to a progress receiver.
///
/// The first write error is reported to the engine; after that the stream is
/// considered gone and later events are dropped.
pub struct SocketProgressListener<W: Write> {
    sender: ProgressSender<W>,
    broken: bool,
}

impl SocketProgressListener<TcpStream> {
    /// Connect to a receiver listening on `addr`
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, FrameError> {
        Ok(Self::new(ProgressSender::connect(addr)?))
    }
}

impl<W: Write> SocketProgressListener<W> {
    /// Forward through an existing sender
    pub fn new(sender: ProgressSender<W>) -> Self {
        Self {
            sender,
            broken: false,
        }
    }

    /// Whether a write has failed
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Consume the listener and return the underlying writer
    pub fn into_inner(self) -> W {
        self.sender.into_inner()
    }

    fn forward(&mut self, event: ProgressEvent) -> Result<(), ListenerError> {
        if self.broken {
            debug!(command = event.command(), "progress stream gone, dropping event");
            return Ok(());
        }
        self.sender.send(&event).map_err(|e| {
            self.broken = true;
            match e {
                FrameError::Io(io) => ListenerError::Io(io),
                other => ListenerError::Other(other.to_string()),
            }
        })
    }
}

impl<W: Write> BenchListener for SocketProgressListener<W> {
    fn init(&mut self, plan: &[PlannedRuns]) -> Result<(), ListenerError> {
        let totals = plan
            .iter()
            .map(|p| RunTotal {
                element: p.method.clone(),
                runs: p.runs,
            })
            .collect();
        self.forward(ProgressEvent::Init(totals))
    }

    fn run_completed(
        &mut self,
        method: &str,
        _repetition: u32,
        _samples: &[f64],
    ) -> Result<(), ListenerError> {
        self.forward(ProgressEvent::UpdateCurrentRun(method.to_string()))
    }

    fn failure(&mut self, failure: &Failure) -> Result<(), ListenerError> {
        self.forward(ProgressEvent::UpdateError {
            element: failure.method_id(),
            message: failure.message.clone(),
        })
    }

    fn skipped(&mut self, method: &str, reason: &str) -> Result<(), ListenerError> {
        self.forward(ProgressEvent::UpdateError {
            element: method.to_string(),
            message: reason.to_string(),
        })
    }

    fn finished(&mut self, _result: &BenchmarkResult) -> Result<(), ListenerError> {
        self.forward(ProgressEvent::Finished)
    }
}

/// Receiving end of the socket listener: draws forwarded events
pub struct ProgressDisplay {
    bar: ProgressBar,
    completed: u64,
    errors: Vec<(String, String)>,
}

impl ProgressDisplay {
    /// Draw on an existing bar
    pub fn new(bar: ProgressBar) -> Self {
        Self {
            bar,
            completed: 0,
            errors: Vec::new(),
        }
    }

    /// Apply one received event
    pub fn apply(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Init(totals) => {
                self.completed = 0;
                self.errors.clear();
                self.bar.reset();
                self.bar
                    .set_length(totals.iter().map(|t| u64::from(t.runs)).sum());
            }
            ProgressEvent::UpdateCurrentRun(element) => {
                self.completed += 1;
                self.bar.set_message(element);
                self.bar.inc(1);
            }
            ProgressEvent::UpdateError { element, message } => {
                self.bar.println(format!("{element}: {message}"));
                self.errors.push((element, message));
            }
            ProgressEvent::Finished => self.bar.finish_with_message("Complete"),
        }
    }

    /// Repetitions reported as completed
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Errors reported so far, as `(element, message)`
    pub fn errors(&self) -> &[(String, String)] {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfidix_core::Role;
    use perfidix_ipc::{ProgressReceiver, ReceiverExit};
    use std::io::{self, Cursor};

    fn plan() -> Vec<PlannedRuns> {
        vec![
            PlannedRuns {
                method: "Sorting::quick".to_string(),
                runs: 3,
            },
            PlannedRuns {
                method: "Sorting::bubble".to_string(),
                runs: 2,
            },
        ]
    }

    fn failure() -> Failure {
        Failure {
            class: "Sorting".to_string(),
            method: "bubble".to_string(),
            invoked: "bubble".to_string(),
            role: Role::Bench,
            repetition: Some(1),
            kind: None,
            message: "too slow".to_string(),
        }
    }

    #[test]
    fn test_bar_counts_repetitions() {
        let mut listener = ProgressBarListener::with_bar(ProgressBar::hidden());
        listener.init(&plan()).unwrap();
        assert_eq!(listener.bar().length(), Some(5));

        listener.run_completed("Sorting::quick", 1, &[1.0]).unwrap();
        listener.run_completed("Sorting::quick", 2, &[1.0]).unwrap();
        assert_eq!(listener.bar().position(), 2);

        // The rest of a skipped method counts as done
        listener.run_completed("Sorting::bubble", 1, &[1.0]).unwrap();
        listener.skipped("Sorting::bubble", "class setup failed").unwrap();
        assert_eq!(listener.bar().position(), 4);

        listener.finished(&BenchmarkResult::new(Vec::new())).unwrap();
        assert!(listener.bar().is_finished());
    }

    #[test]
    fn test_display_applies_events() {
        let mut display = ProgressDisplay::new(ProgressBar::hidden());
        display.apply(ProgressEvent::Init(vec![RunTotal {
            element: "Sorting::quick".to_string(),
            runs: 4,
        }]));
        display.apply(ProgressEvent::UpdateCurrentRun("Sorting::quick".to_string()));
        display.apply(ProgressEvent::UpdateError {
            element: "Sorting::quick".to_string(),
            message: "boom".to_string(),
        });
        assert_eq!(display.completed(), 1);
        assert_eq!(display.errors().len(), 1);

        display.apply(ProgressEvent::Finished);
        assert_eq!(display.completed(), 1);
    }

    #[test]
    fn test_socket_events() {
        let mut listener = SocketProgressListener::new(ProgressSender::new(Vec::new()));
        listener.init(&plan()).unwrap();
        listener.run_completed("Sorting::quick", 1, &[0.5]).unwrap();
        listener.failure(&failure()).unwrap();
        listener.finished(&BenchmarkResult::new(Vec::new())).unwrap();
        let bytes = listener.into_inner();

        let mut events = Vec::new();
        let exit = ProgressReceiver::new(Cursor::new(bytes)).run(|e| events.push(e));
        assert_eq!(exit, ReceiverExit::Finished);
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], ProgressEvent::Init(totals) if totals.len() == 2));
        assert_eq!(
            events[1],
            ProgressEvent::UpdateCurrentRun("Sorting::quick".to_string())
        );
        assert_eq!(
            events[2],
            ProgressEvent::UpdateError {
                element: "Sorting::bubble".to_string(),
                message: "too slow".to_string(),
            }
        );
    }

    struct Unplugged;

    impl Write for Unplugged {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"))
        }
    }

    #[test]
    fn test_broken_stream_drops_later_events() {
        let mut listener = SocketProgressListener::new(ProgressSender::new(Unplugged));
        assert!(listener.init(&plan()).is_err());
        assert!(listener.is_broken());

        assert!(listener.run_completed("Sorting::quick", 1, &[]).is_ok());
        assert!(listener.finished(&BenchmarkResult::new(Vec::new())).is_ok());
    }
}
