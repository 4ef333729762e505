//! Error types for the spin cycle
//!
//! Individual attempt failures are recorded as [`AttemptError`] values and
//! never surfaced to the caller one by one; the only error a spinner's
//! terminal callback can receive is the synthesized [`SpinTimeout`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Which side of an attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptErrorKind {
    /// The asynchronous action itself reported failure
    Action,
    /// The action succeeded but the synchronous check rejected its payload
    Check,
}

impl fmt::Display for AttemptErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptErrorKind::Action => write!(f, "action error"),
            AttemptErrorKind::Check => write!(f, "check failure"),
        }
    }
}

/// One failed attempt, recorded in chronological order
///
/// The message is captured eagerly as the full `{:#}` context chain of the
/// underlying [`anyhow::Error`], so the history stays inspectable after the
/// error value itself is gone.
#[derive(Debug, Clone)]
pub struct AttemptError {
    /// Which side of the attempt failed
    pub kind: AttemptErrorKind,
    /// Full diagnostic text of the failure
    pub message: String,
}

impl AttemptError {
    pub(crate) fn action(err: anyhow::Error) -> Self {
        Self {
            kind: AttemptErrorKind::Action,
            message: format!("{err:#}"),
        }
    }

    pub(crate) fn check(err: anyhow::Error) -> Self {
        Self {
            kind: AttemptErrorKind::Check,
            message: format!("{err:#}"),
        }
    }

    /// Whether the action side of the attempt failed
    pub fn is_action(&self) -> bool {
        self.kind == AttemptErrorKind::Action
    }

    /// Whether the check rejected the action's payload
    pub fn is_check(&self) -> bool {
        self.kind == AttemptErrorKind::Check
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// The single terminal error a spin cycle can produce
///
/// Synthesized once the overall deadline has elapsed. Its message embeds the
/// most recent attempt's diagnostic text so a reader seeing only the final
/// failure still learns the proximate cause; the full history remains
/// available through [`Spinner::errors`](crate::Spinner::errors).
#[derive(Debug, Clone, Error)]
#[error("Spin Timeout, most recent error: {most_recent}")]
pub struct SpinTimeout {
    /// Number of attempts made before giving up
    pub attempts: u32,
    /// Time elapsed from construction to the final failed attempt
    pub elapsed: Duration,
    /// Diagnostic text of the last attempt's failure
    pub most_recent: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_attempt_error_kinds() {
        let action = AttemptError::action(anyhow!("socket closed"));
        assert!(action.is_action());
        assert!(!action.is_check());
        assert_eq!(action.to_string(), "action error: socket closed");

        let check = AttemptError::check(anyhow!("value still 0"));
        assert!(check.is_check());
        assert_eq!(check.to_string(), "check failure: value still 0");
    }

    #[test]
    fn test_attempt_error_captures_context_chain() {
        let err = anyhow!("connection refused").context("fetching status");
        let recorded = AttemptError::action(err);
        assert!(recorded.message.contains("fetching status"));
        assert!(recorded.message.contains("connection refused"));
    }

    #[test]
    fn test_timeout_display_embeds_most_recent() {
        let err = SpinTimeout {
            attempts: 5,
            elapsed: Duration::from_millis(4000),
            most_recent: "element not visible".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Spin Timeout, most recent error: element not visible"
        );
    }
}
