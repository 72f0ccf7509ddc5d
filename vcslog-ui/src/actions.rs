use std::fmt;
use std::ops::Range;

/// User interaction with the graph, in visible rows and lane columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphAction {
    Click { row: usize, column: usize },
    Hover { row: usize, column: usize },
    DoubleClick { row: usize },
}

/// What the view has to do after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphAnswer {
    Unchanged,
    /// Visible rows to repaint
    Repaint(Range<usize>),
    /// More history was requested; call `poll` later
    LoadRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Non-blocking message for the user, e.g. a failed background read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        };
        write!(f, "{level}: {}", self.message)
    }
}
