//! Core domain types for Mermake.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the
//! application.

mod history;
mod sanitize;

pub use history::DocumentHistory;
pub use sanitize::strip_mermaid_fences;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// NonEmpty String Type
// ============================================================================

/// A string guaranteed to be non-empty (after trimming).
///
/// Used for instructions and focus hints so that blank input is rejected at
/// the boundary instead of being shipped to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

#[derive(Debug, Error)]
#[error("value must not be empty")]
pub struct EmptyStringError;

impl NonEmptyString {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyStringError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Diagram Domain
// ============================================================================

/// The Mermaid diagram families the generation service can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    Sequence,
    Class,
    Flowchart,
}

impl DiagramKind {
    /// Wire name used by the generation service (`diagramType` field).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DiagramKind::Sequence => "sequence",
            DiagramKind::Class => "class",
            DiagramKind::Flowchart => "flowchart",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown diagram kind {0:?} (expected sequence, class, or flowchart)")]
pub struct UnknownDiagramKind(String);

impl std::str::FromStr for DiagramKind {
    type Err = UnknownDiagramKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequence" => Ok(DiagramKind::Sequence),
            "class" => Ok(DiagramKind::Class),
            "flowchart" => Ok(DiagramKind::Flowchart),
            other => Err(UnknownDiagramKind(other.to_string())),
        }
    }
}

/// One uploaded source file after intake.
///
/// `content` is `None` only when reading the file's text failed; excluded
/// files never become records at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub name: String,
    pub path: String,
    pub content: Option<String>,
}

// ============================================================================
// Operation State
// ============================================================================

/// Lifecycle of the single in-flight generation operation.
///
/// Transitions: `Idle -> InFlight -> {Succeeded, Failed} -> Idle`. The
/// resolved states persist until acknowledged (or until the next operation
/// begins), mirroring an error dialog that stays up until dismissed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OperationState {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed(String),
}

impl OperationState {
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, OperationState::InFlight)
    }
}
