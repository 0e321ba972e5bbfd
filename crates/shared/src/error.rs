use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Step;

/// User-facing message when upload is triggered with nothing selected.
pub const EMPTY_SELECTION_MESSAGE: &str = "¡Debes seleccionar al menos un archivo!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Transport,
    Server,
    Parse,
    MissingSession,
    MissingDownload,
    Busy,
}

/// A failed step as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{step}: {message}")]
pub struct StepFailure {
    pub step: Step,
    pub kind: ErrorKind,
    pub message: String,
}

impl StepFailure {
    pub fn new(step: Step, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            step,
            kind,
            message: message.into(),
        }
    }

    /// Text of the blocking notification, prefixed per step.
    ///
    /// Validation failures are shown verbatim.
    pub fn alert_text(&self) -> String {
        match self.kind {
            ErrorKind::Validation => self.message.clone(),
            _ => format!("{}{}", self.step.alert_prefix(), self.message),
        }
    }
}
