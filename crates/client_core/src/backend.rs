//! Seam between the controller and the processing backend.

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::{
    header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    multipart::{Form, Part},
    Client, Response,
};
use shared::{
    domain::FileId,
    protocol::{
        download_path, preview_path, PreviewQuery, ProcessRequest, ProcessResponse,
        UploadResponse, DEFAULT_ARTIFACT_FILENAME, PROCESS_PATH, UPLOAD_FIELD_NAME, UPLOAD_PATH,
    },
};
use tracing::debug;
use url::Url;

use crate::{error::WorkflowError, object_url::Blob, selection::SelectedFile};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Link to the processed artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLink {
    /// Backend-relative target, `/download/{file_id}`.
    pub href: String,
    /// `href` resolved against the backend base URL.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait WorkflowBackend: Send + Sync {
    async fn upload(&self, files: Vec<SelectedFile>) -> Result<UploadResponse, WorkflowError>;
    /// Does not inspect the HTTP status; any body is parsed as a process response.
    async fn process(&self, request: &ProcessRequest) -> Result<ProcessResponse, WorkflowError>;
    async fn preview(&self, file_id: &FileId, filename: &str) -> Result<Blob, WorkflowError>;
    fn download_link(&self, file_id: &FileId) -> DownloadLink;
    async fn fetch_artifact(&self, link: &DownloadLink)
        -> Result<DownloadedArtifact, WorkflowError>;
}

pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> anyhow::Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let parsed =
            Url::parse(trimmed).with_context(|| format!("invalid backend url '{base_url}'"))?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            bail!("backend url must be an http(s) base url, got '{base_url}'");
        }
        Ok(Self {
            http,
            base_url: trimmed.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

async fn ensure_success(response: Response) -> Result<Response, WorkflowError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await?;
    Err(WorkflowError::Server {
        status: status.as_u16(),
        body,
    })
}

fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}

/// Extracts `filename` from a `Content-Disposition` header value.
pub fn content_disposition_filename(header: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        let name = value.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(value);
        (!name.is_empty()).then(|| name.to_string())
    })
}

#[async_trait]
impl WorkflowBackend for HttpBackend {
    async fn upload(&self, files: Vec<SelectedFile>) -> Result<UploadResponse, WorkflowError> {
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.bytes)
                .file_name(file.name)
                .mime_str(&file.mime_type)?;
            form = form.part(UPLOAD_FIELD_NAME, part);
        }

        let response = self
            .http
            .post(self.endpoint(UPLOAD_PATH))
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn process(&self, request: &ProcessRequest) -> Result<ProcessResponse, WorkflowError> {
        let response = self
            .http
            .post(self.endpoint(PROCESS_PATH))
            .json(request)
            .send()
            .await?;
        debug!(status = %response.status(), "process response received");
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn preview(&self, file_id: &FileId, filename: &str) -> Result<Blob, WorkflowError> {
        let response = self
            .http
            .get(self.endpoint(&preview_path(file_id)))
            .query(&PreviewQuery {
                filename: filename.to_string(),
            })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let content_type = content_type(&response);
        let bytes = response.bytes().await?;
        Ok(Blob::new(content_type, bytes.to_vec()))
    }

    fn download_link(&self, file_id: &FileId) -> DownloadLink {
        let href = download_path(file_id);
        DownloadLink {
            url: self.endpoint(&href),
            href,
        }
    }

    async fn fetch_artifact(
        &self,
        link: &DownloadLink,
    ) -> Result<DownloadedArtifact, WorkflowError> {
        let response = self.http.get(&link.url).send().await?;
        let response = ensure_success(response).await?;
        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(content_disposition_filename)
            .unwrap_or_else(|| DEFAULT_ARTIFACT_FILENAME.to_string());
        let bytes = response.bytes().await?;
        Ok(DownloadedArtifact {
            filename,
            bytes: bytes.to_vec(),
        })
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
