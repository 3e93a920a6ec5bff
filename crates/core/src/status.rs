//! Operation status values
//!
//! Expected failures are modeled as values, never as `Err`:
//! - [`ArchiveStatus`]: outcome of one operation on one dataset
//! - [`BooleanStatus`]: tri-state answer of a check (present, synchronized)
//! - [`ProcessingStatus`]: batch aggregate mapping statuses to dataset codes

use std::fmt;

/// Outcome of a single archive operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArchiveStatus {
    /// Operation succeeded
    Ok,
    /// Operation succeeded and carries an informational message
    Detail(String),
    /// Operation failed
    Error(String),
}

impl ArchiveStatus {
    /// Create an error status.
    pub fn error(message: impl Into<String>) -> Self {
        ArchiveStatus::Error(message.into())
    }

    /// Whether this status is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, ArchiveStatus::Error(_))
    }

    /// Error message, if this status is an error.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ArchiveStatus::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

impl fmt::Display for ArchiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveStatus::Ok => f.write_str("OK"),
            ArchiveStatus::Detail(msg) => write!(f, "OK: \"{}\"", msg),
            ArchiveStatus::Error(msg) if msg.is_empty() => f.write_str("ERROR"),
            ArchiveStatus::Error(msg) => write!(f, "ERROR: \"{}\"", msg),
        }
    }
}

/// Tri-state answer of a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BooleanStatus {
    /// The check holds
    True,
    /// The check does not hold, optionally with an explanation
    False(Option<String>),
    /// The check could not be performed
    Error(String),
}

impl BooleanStatus {
    /// `True` or plain `False`.
    pub fn from_bool(value: bool) -> Self {
        if value {
            BooleanStatus::True
        } else {
            BooleanStatus::False(None)
        }
    }

    /// `False` with an explanation.
    pub fn false_with(message: impl Into<String>) -> Self {
        BooleanStatus::False(Some(message.into()))
    }

    /// Whether the check holds.
    pub fn is_true(&self) -> bool {
        matches!(self, BooleanStatus::True)
    }

    /// Whether the check could not be performed.
    pub fn is_error(&self) -> bool {
        matches!(self, BooleanStatus::Error(_))
    }

    /// Message attached to `False` or `Error`.
    pub fn message(&self) -> Option<&str> {
        match self {
            BooleanStatus::True => None,
            BooleanStatus::False(msg) => msg.as_deref(),
            BooleanStatus::Error(msg) => Some(msg),
        }
    }
}

impl fmt::Display for BooleanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BooleanStatus::True => f.write_str("TRUE"),
            BooleanStatus::False(None) => f.write_str("FALSE"),
            BooleanStatus::False(Some(msg)) => write!(f, "FALSE: {}", msg),
            BooleanStatus::Error(msg) => write!(f, "ERROR: {}", msg),
        }
    }
}

/// Batch aggregate: status to dataset codes.
///
/// Statuses keep the order in which they were first seen, and codes keep the
/// order in which they were added. Built fresh per batch call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingStatus {
    entries: Vec<(ArchiveStatus, Vec<String>)>,
}

impl ProcessingStatus {
    /// Empty aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `status` for dataset `code`.
    pub fn add(&mut self, code: impl Into<String>, status: ArchiveStatus) {
        let code = code.into();
        match self.entries.iter_mut().find(|(s, _)| *s == status) {
            Some((_, codes)) => codes.push(code),
            None => self.entries.push((status, vec![code])),
        }
    }

    /// All distinct statuses.
    pub fn statuses(&self) -> impl Iterator<Item = &ArchiveStatus> {
        self.entries.iter().map(|(s, _)| s)
    }

    /// Only the error statuses.
    pub fn error_statuses(&self) -> Vec<&ArchiveStatus> {
        self.statuses().filter(|s| s.is_error()).collect()
    }

    /// Codes recorded for `status`, empty if none.
    pub fn datasets_by_status(&self, status: &ArchiveStatus) -> &[String] {
        self.entries
            .iter()
            .find(|(s, _)| s == status)
            .map(|(_, codes)| codes.as_slice())
            .unwrap_or(&[])
    }

    /// Status recorded for `code`, if any.
    pub fn status_of(&self, code: &str) -> Option<&ArchiveStatus> {
        self.entries
            .iter()
            .find(|(_, codes)| codes.iter().any(|c| c == code))
            .map(|(s, _)| s)
    }

    /// Codes that completed without error.
    pub fn successful_codes(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(s, _)| !s.is_error())
            .flat_map(|(_, codes)| codes.iter().map(String::as_str))
            .collect()
    }

    /// Codes that completed with an error.
    pub fn failed_codes(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(s, _)| s.is_error())
            .flat_map(|(_, codes)| codes.iter().map(String::as_str))
            .collect()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
