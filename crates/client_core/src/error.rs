use shared::{
    domain::Step,
    error::{ErrorKind, StepFailure, EMPTY_SELECTION_MESSAGE},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Transport(String),
    #[error("Error {status}: {body}")]
    Server { status: u16, body: String },
    #[error("{0}")]
    Parse(String),
    #[error("primero debes subir un archivo antes de {}", .step.label())]
    MissingSession { step: Step },
    #[error("el resultado aún no ha sido procesado")]
    MissingDownload,
    #[error("ya hay una operación en curso ({})", .in_flight.label())]
    Busy { in_flight: Step },
}

impl WorkflowError {
    pub fn empty_selection() -> Self {
        WorkflowError::Validation(EMPTY_SELECTION_MESSAGE.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Validation(_) => ErrorKind::Validation,
            WorkflowError::Transport(_) => ErrorKind::Transport,
            WorkflowError::Server { .. } => ErrorKind::Server,
            WorkflowError::Parse(_) => ErrorKind::Parse,
            WorkflowError::MissingSession { .. } => ErrorKind::MissingSession,
            WorkflowError::MissingDownload => ErrorKind::MissingDownload,
            WorkflowError::Busy { .. } => ErrorKind::Busy,
        }
    }

    pub fn to_failure(&self, step: Step) -> StepFailure {
        StepFailure::new(step, self.kind(), self.to_string())
    }
}

impl From<reqwest::Error> for WorkflowError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            WorkflowError::Parse(value.to_string())
        } else {
            WorkflowError::Transport(value.to_string())
        }
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(value: serde_json::Error) -> Self {
        WorkflowError::Parse(value.to_string())
    }
}
