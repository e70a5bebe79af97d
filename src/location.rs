//! Cheap call-site capture for error-reporting and diagnostics.

use std::fmt;

/// A captured source location, used to annotate fatal-path log lines and
/// [`crate::util::HandleErrors`] dispatch with where they were invoked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub file: &'static str,
    pub line: u32,
}

impl Location {
    /// Captures the caller's location. Annotate the calling function with
    /// `#[track_caller]` for this to point at the real call site rather
    /// than at this function's body.
    #[track_caller]
    pub fn caller() -> Self {
        let loc = std::panic::Location::caller();
        Self {
            file: loc.file(),
            line: loc.line(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}
