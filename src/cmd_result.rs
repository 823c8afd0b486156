use thiserror::Error;

/// The result of executing an ex command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdResult {
    Success,
    /// Success with a message for the frontend, e.g. "3 lines moved".
    Message(String),
    Failure(CmdFailure),
}

/// The reason a command failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CmdFailure {
    /// Begin or end of the range did not resolve, or begin is after end.
    #[error("invalid range")]
    InvalidRange,
    /// The buffer refuses modification.
    #[error("buffer is read-only or binary")]
    ReadOnlyOrBinary,
    /// Malformed command text.
    #[error("{0}")]
    Parse(String),
    /// A search found nothing or a mark is not set.
    #[error("address unresolved: {0}")]
    AddressUnresolved(String),
    /// An external command wrote to stderr or exited with an error.
    #[error("{0}")]
    ExternalProcess(String),
    /// A script or macro tried to run itself.
    #[error("recursion detected: {0}")]
    RecursionDetected(String),
    /// The user or the process layer cancelled the operation.
    #[error("cancelled")]
    Cancelled,
    #[error("{0}")]
    Io(String),
}

impl CmdResult {
    pub fn is_success(&self) -> bool {
        !self.is_failure()
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CmdResult::Failure(_))
    }

    /// The text the frontend should show for this result, if any.
    pub fn message(&self) -> Option<String> {
        match self {
            CmdResult::Success => None,
            CmdResult::Message(msg) => Some(msg.clone()),
            CmdResult::Failure(failure) => Some(failure.to_string()),
        }
    }
}

impl From<CmdFailure> for CmdResult {
    fn from(failure: CmdFailure) -> Self {
        CmdResult::Failure(failure)
    }
}

impl From<Result<(), CmdFailure>> for CmdResult {
    fn from(result: Result<(), CmdFailure>) -> Self {
        match result {
            Ok(()) => CmdResult::Success,
            Err(failure) => CmdResult::Failure(failure),
        }
    }
}

pub(crate) fn parse_error(msg: impl Into<String>) -> CmdFailure {
    CmdFailure::Parse(msg.into())
}

/// "1 line" / "3 lines".
pub(crate) fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_uses_display() {
        let result = CmdResult::Failure(CmdFailure::Parse("unknown command: zz".into()));
        assert!(result.is_failure());
        assert_eq!(result.message().unwrap(), "unknown command: zz");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "line"), "1 line");
        assert_eq!(plural(4, "line"), "4 lines");
    }
}
