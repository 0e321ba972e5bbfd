use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(FileId);

/// Identifiers the backend handed out for the active file set.
///
/// Empty until an upload succeeds. Only a successful upload replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    file_id: Option<FileId>,
    filename: Option<String>,
}

impl Session {
    pub fn established(file_id: FileId, filename: impl Into<String>) -> Self {
        Self {
            file_id: Some(file_id),
            filename: Some(filename.into()),
        }
    }

    pub fn file_id(&self) -> Option<&FileId> {
        self.file_id.as_ref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn is_established(&self) -> bool {
        self.file_id.is_some() && self.filename.is_some()
    }

    /// Both identifiers, or `None` when no upload has succeeded yet.
    pub fn active(&self) -> Option<(&FileId, &str)> {
        match (&self.file_id, &self.filename) {
            (Some(file_id), Some(filename)) => Some((file_id, filename.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Upload,
    Process,
    Preview,
    Download,
}

impl Step {
    pub fn name(self) -> &'static str {
        match self {
            Step::Upload => "upload",
            Step::Process => "process",
            Step::Preview => "preview",
            Step::Download => "download",
        }
    }

    /// Spanish verb used in user-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            Step::Upload => "subir",
            Step::Process => "procesar",
            Step::Preview => "previsualizar",
            Step::Download => "descargar",
        }
    }

    /// Prefix shown in front of every failure notification for this step.
    pub fn alert_prefix(self) -> &'static str {
        match self {
            Step::Upload => "Error subiendo archivos: ",
            Step::Process => "Error procesando archivo: ",
            Step::Preview => "Error generando vista previa: ",
            Step::Download => "Error descargando resultado: ",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    #[default]
    Idle,
    Uploaded,
    Previewed,
    Processed,
}

impl WorkflowStage {
    pub fn after_upload(self) -> Self {
        WorkflowStage::Uploaded
    }

    /// Preview never moves a processed workflow backwards.
    pub fn after_preview(self) -> Self {
        match self {
            WorkflowStage::Processed => WorkflowStage::Processed,
            _ => WorkflowStage::Previewed,
        }
    }

    pub fn after_process(self) -> Self {
        WorkflowStage::Processed
    }

    pub fn after_download(self) -> Self {
        WorkflowStage::Idle
    }
}

/// Which controls the UI should offer right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affordances {
    pub preview_enabled: bool,
    pub process_enabled: bool,
    pub download_visible: bool,
}
