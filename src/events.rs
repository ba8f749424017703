//! Progress and log events flowing from the pipeline to the shell.
//!
//! # Why a channel instead of callbacks?
//!
//! The shell owns the subscription lifecycle: it creates the channel, hands
//! the sender to the pipeline, and drains the receiver on its own task. The
//! pipeline stays oblivious to how events are rendered — terminal bar, test
//! collector, or nothing at all. Delivery is fire-and-forget: if the
//! receiver is gone (shell shut down mid-run), events are dropped silently
//! rather than failing the conversion.
//!
//! Events are sent in processing order from a single pipeline task, so the
//! shell observes them in the order they were produced.

use crate::report::{FileOutcome, Summary};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Severity attached to [`JobEvent::Log`] lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One message from the pipeline to the shell.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// Emitted once, after enumeration, before any file is processed.
    Started { total_files: usize },

    /// A human-readable log line for the shell's log pane.
    Log { level: LogLevel, message: String },

    /// A file finished (converted, skipped, or failed).
    /// `completed` counts all finished files including this one.
    FileDone {
        path: PathBuf,
        completed: usize,
        total: usize,
        outcome: FileOutcome,
    },

    /// Emitted once when the run ends, cancelled or not.
    Finished { summary: Summary },
}

/// The sending half handed to [`crate::job::run`].
pub type EventSink = mpsc::UnboundedSender<JobEvent>;

/// The receiving half drained by the shell.
pub type EventStream = mpsc::UnboundedReceiver<JobEvent>;

/// Create a connected event channel.
pub fn channel() -> (EventSink, EventStream) {
    mpsc::unbounded_channel()
}

/// Send an event, ignoring a closed receiver.
pub(crate) fn emit(sink: &EventSink, event: JobEvent) {
    let _ = sink.send(event);
}

/// Send a log line, ignoring a closed receiver.
pub(crate) fn log(sink: &EventSink, level: LogLevel, message: impl Into<String>) {
    emit(
        sink,
        JobEvent::Log {
            level,
            message: message.into(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_send_order() {
        let (tx, mut rx) = channel();

        emit(&tx, JobEvent::Started { total_files: 2 });
        log(&tx, LogLevel::Info, "first");
        log(&tx, LogLevel::Warn, "second");

        assert!(matches!(
            rx.try_recv().unwrap(),
            JobEvent::Started { total_files: 2 }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            JobEvent::Log { level: LogLevel::Info, ref message } if message == "first"
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            JobEvent::Log { level: LogLevel::Warn, ref message } if message == "second"
        ));
    }

    #[test]
    fn closed_receiver_does_not_panic() {
        let (tx, rx) = channel();
        drop(rx);
        // Sends after the shell went away are dropped, not errors.
        emit(&tx, JobEvent::Started { total_files: 1 });
        log(&tx, LogLevel::Error, "nobody listening");
    }
}
