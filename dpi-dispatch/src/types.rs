//! Core types for the DPI dispatch library
//!
//! This module defines the values that flow through the dispatch layer: the
//! setup error type, caller-site descriptors and the per-callback resolution
//! state. Call paths never produce errors; `DispatchError` only covers
//! building and installing an environment.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::panic::Location;
use std::path::PathBuf;

/// Timestamp type used on diagnostic reports
pub type Timestamp = DateTime<Utc>;

/// Result type for dispatch setup operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors that can occur while building or installing a dispatch environment
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Dispatch environment already installed")]
    AlreadyInstalled,

    #[error("Failed to load provider module {path:?}: {reason}")]
    LibraryLoad { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Source location a declared import was called from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CallerSite {
    /// Source file name as reported by the host or the compiler
    pub file: String,
    /// 1-based line number
    pub line: u32,
}

impl CallerSite {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Site of the innermost `#[track_caller]` frame
    #[track_caller]
    pub fn here() -> Self {
        Location::caller().into()
    }
}

impl From<&Location<'_>> for CallerSite {
    fn from(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for CallerSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Observable resolution state of one declared import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionState {
    /// No call has triggered resolution yet
    Unresolved,
    /// An implementation was found and is bound
    Present,
    /// Resolution ran and found nothing; terminal
    Absent,
}

impl ResolutionState {
    /// True once resolution has settled either way
    pub fn is_settled(&self) -> bool {
        !matches!(self, ResolutionState::Unresolved)
    }
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionState::Unresolved => write!(f, "unresolved"),
            ResolutionState::Present => write!(f, "present"),
            ResolutionState::Absent => write!(f, "absent"),
        }
    }
}
