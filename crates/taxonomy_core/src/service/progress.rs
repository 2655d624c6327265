//! Operator-facing progress events.

use crate::repo::taxonomy_repo::AdoptOutcome;
use log::warn;
use std::fmt::{Display, Formatter};
use std::io::Write;

/// One line of operator-visible progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Imported { vocabulary: String, file: String },
    Exported { vocabulary: String, file: String },
    Pruned { vocabulary: String },
    RemovingBelow { context_path: String },
    Removed { context_path: String },
    PopulatingBelow { context_path: String },
    Adopted {
        context_path: String,
        outcome: AdoptOutcome,
    },
    /// A node failed during traversal and was skipped.
    Skipped { context_path: String, reason: String },
    Done,
}

impl Display for ProgressEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Imported { vocabulary, file } => {
                write!(f, "Imported vocabulary {vocabulary} from file {file}")
            }
            Self::Exported { vocabulary, file } => {
                write!(f, "Exported vocabulary {vocabulary} to file {file}")
            }
            Self::Pruned { vocabulary } => write!(f, "Pruned vocabulary {vocabulary}"),
            Self::RemovingBelow { context_path } => {
                write!(f, "Removing content all below {context_path}")
            }
            Self::Removed { context_path } => write!(f, " - remove: {context_path}"),
            Self::PopulatingBelow { context_path } => write!(
                f,
                "Populating taxonomy content from default below {context_path}"
            ),
            Self::Adopted {
                context_path,
                outcome: AdoptOutcome::Created,
            } => write!(f, " - adopt: {context_path}"),
            Self::Adopted {
                context_path,
                outcome: AdoptOutcome::AlreadyPresent,
            } => write!(f, " - adopt: {context_path} (already present)"),
            Self::Skipped {
                context_path,
                reason,
            } => write!(f, " - skipped: {context_path}: {reason}"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// Receiver of progress events.
pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

impl ProgressSink for Vec<ProgressEvent> {
    fn emit(&mut self, event: ProgressEvent) {
        self.push(event);
    }
}

/// Writes each event as one line.
///
/// Write failures are logged and otherwise ignored; progress output never
/// aborts a running operation.
pub struct LineProgress<W: Write> {
    out: W,
}

impl<W: Write> LineProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressSink for LineProgress<W> {
    fn emit(&mut self, event: ProgressEvent) {
        if let Err(err) = writeln!(self.out, "{event}").and_then(|()| self.out.flush()) {
            warn!("event=progress_write module=service status=error error={err}");
        }
    }
}
