use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// A local file awaiting transfer. Lives for one discovery cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    SizeCheck,
    Push,
    TriggerAction,
    LocateControl,
    Activate,
    AwaitCompletion,
    Succeeded,
    Failed,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferState::Idle => "idle",
            TransferState::SizeCheck => "size_check",
            TransferState::Push => "push",
            TransferState::TriggerAction => "trigger_action",
            TransferState::LocateControl => "locate_control",
            TransferState::Activate => "activate",
            TransferState::AwaitCompletion => "await_completion",
            TransferState::Succeeded => "succeeded",
            TransferState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What the completion monitor observed after the confirm control was activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Succeeded,
    Failed(String),
    TimedOut,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    ControlNotFound,
    Rejected(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ControlNotFound => f.write_str("confirm control never appeared"),
            FailureReason::Rejected(msg) => write!(f, "device reported failure: {}", msg),
        }
    }
}

/// Terminal result of one pipeline attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Succeeded { pushed: bool },
    Failed(FailureReason),
    TimedOut,
    Interrupted,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Succeeded { .. })
    }
}

/// State machine instance for a single file.
#[derive(Debug)]
pub struct TransferAttempt {
    file: String,
    state: TransferState,
}

impl TransferAttempt {
    pub fn new(file: &PendingFile) -> Self {
        Self {
            file: file.name.clone(),
            state: TransferState::Idle,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn advance(&mut self, next: TransferState) {
        debug!(file = %self.file, from = %self.state, to = %next, "transfer state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_starts_idle_and_advances() {
        let file = PendingFile {
            path: PathBuf::from("/tmp/a.jpg"),
            name: "a.jpg".to_string(),
            size: 3,
        };
        let mut attempt = TransferAttempt::new(&file);
        assert_eq!(attempt.state(), TransferState::Idle);
        attempt.advance(TransferState::SizeCheck);
        attempt.advance(TransferState::Push);
        assert_eq!(attempt.state(), TransferState::Push);
    }

    #[test]
    fn test_only_succeeded_is_success() {
        assert!(TransferOutcome::Succeeded { pushed: false }.is_success());
        assert!(!TransferOutcome::TimedOut.is_success());
        assert!(!TransferOutcome::Failed(FailureReason::ControlNotFound).is_success());
    }
}
