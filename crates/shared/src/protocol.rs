use serde::{Deserialize, Serialize};

use crate::domain::{FileId, Session};

/// Multipart field name every selected file is sent under.
pub const UPLOAD_FIELD_NAME: &str = "files";

pub const UPLOAD_PATH: &str = "/upload/";
pub const PROCESS_PATH: &str = "/process/";
pub const PREVIEW_PATH_PREFIX: &str = "/preview/";
pub const DOWNLOAD_PATH_PREFIX: &str = "/download/";

/// Filename the backend suggests for the processed artifact.
pub const DEFAULT_ARTIFACT_FILENAME: &str = "resultado.zip";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: FileId,
    pub filename: String,
    /// Names the backend stored the parts under.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uploaded_files: Vec<String>,
}

impl UploadResponse {
    pub fn into_session(self) -> Session {
        Session::established(self.file_id, self.filename)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub file_id: FileId,
    pub filename: String,
}

impl ProcessRequest {
    pub fn from_session(session: &Session) -> Option<Self> {
        let (file_id, filename) = session.active()?;
        Some(Self {
            file_id: file_id.clone(),
            filename: filename.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_path: Option<String>,
    /// CRS of the uploaded data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs_inicio: Option<String>,
    /// CRS the data was reprojected to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs_fin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewQuery {
    pub filename: String,
}

pub fn preview_path(file_id: &FileId) -> String {
    format!("{PREVIEW_PATH_PREFIX}{file_id}")
}

pub fn download_path(file_id: &FileId) -> String {
    format!("{DOWNLOAD_PATH_PREFIX}{file_id}")
}
