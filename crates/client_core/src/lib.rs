use std::{
    future::Future,
    sync::{Arc, Mutex as SyncMutex, PoisonError},
};

use shared::{
    domain::{Affordances, Session, Step, WorkflowStage},
    error::StepFailure,
    protocol::{ProcessRequest, ProcessResponse},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod backend;
pub mod error;
pub mod object_url;
pub mod selection;

pub use backend::{DownloadLink, DownloadedArtifact, HttpBackend, WorkflowBackend};
pub use error::WorkflowError;
pub use object_url::{Blob, ObjectUrlRegistry};
pub use selection::{FileSelection, SelectedFile};

const PREVIEW_FRAME_STYLE: &str = "width:100%; height:100%; border:none";
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Inline preview currently shown in the preview container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrame {
    pub object_url: String,
    pub content_type: String,
}

impl PreviewFrame {
    pub fn iframe_html(&self) -> String {
        format!(
            r#"<iframe src="{}" style="{PREVIEW_FRAME_STYLE}"></iframe>"#,
            self.object_url
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub response: ProcessResponse,
    pub download_link: DownloadLink,
}

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// Blocking notification for the user.
    Alert(String),
    StepFailed(StepFailure),
    SessionChanged(Session),
    StageChanged(WorkflowStage),
    AffordancesChanged(Affordances),
    PreviewRendered(PreviewFrame),
    DownloadLinkRevealed(DownloadLink),
}

/// Everything the UI needs to render the workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    pub session: Session,
    pub stage: WorkflowStage,
    pub affordances: Affordances,
    pub in_flight: Option<Step>,
    pub preview: Option<PreviewFrame>,
    pub download_link: Option<DownloadLink>,
    pub last_message: Option<String>,
}

/// Sequences upload, preview, process and download against one backend.
///
/// Steps are triggered individually by the caller. Only one step may be in
/// flight at a time; a step triggered while another is outstanding fails
/// with [`WorkflowError::Busy`] without reaching the backend.
pub struct WorkflowController {
    backend: Arc<dyn WorkflowBackend>,
    object_urls: ObjectUrlRegistry,
    inner: Mutex<WorkflowSnapshot>,
    in_flight: SyncMutex<Option<Step>>,
    events: broadcast::Sender<WorkflowEvent>,
}

/// Holds the controller's single step slot; the slot is released on drop,
/// including when the step future is cancelled mid-request.
struct InFlightSlot<'a> {
    slot: &'a SyncMutex<Option<Step>>,
}

impl<'a> InFlightSlot<'a> {
    fn acquire(slot: &'a SyncMutex<Option<Step>>, step: Step) -> Result<Self, WorkflowError> {
        let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(in_flight) = *current {
            return Err(WorkflowError::Busy { in_flight });
        }
        *current = Some(step);
        Ok(Self { slot })
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl WorkflowController {
    pub fn new(backend: Arc<dyn WorkflowBackend>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            backend,
            object_urls: ObjectUrlRegistry::new(),
            inner: Mutex::new(WorkflowSnapshot::default()),
            in_flight: SyncMutex::new(None),
            events,
        })
    }

    pub fn backend(&self) -> &Arc<dyn WorkflowBackend> {
        &self.backend
    }

    pub fn object_urls(&self) -> &ObjectUrlRegistry {
        &self.object_urls
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot {
        let mut snapshot = self.inner.lock().await.clone();
        snapshot.in_flight = *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        snapshot
    }

    pub async fn session(&self) -> Session {
        self.inner.lock().await.session.clone()
    }

    pub async fn upload(&self, selection: FileSelection) -> Result<Session, WorkflowError> {
        if selection.is_empty() {
            let err = WorkflowError::empty_selection();
            self.report_failure(Step::Upload, &err);
            return Err(err);
        }
        self.run_step(Step::Upload, self.upload_inner(selection))
            .await
    }

    pub async fn process(&self) -> Result<ProcessOutcome, WorkflowError> {
        self.run_step(Step::Process, self.process_inner()).await
    }

    pub async fn preview(&self) -> Result<PreviewFrame, WorkflowError> {
        self.run_step(Step::Preview, self.preview_inner()).await
    }

    /// Follows the download link revealed by a successful process step.
    ///
    /// The artifact itself is fetched by whoever navigates to the link.
    pub async fn download(&self) -> Result<DownloadLink, WorkflowError> {
        self.run_step(Step::Download, self.download_inner()).await
    }

    async fn run_step<T, F>(&self, step: Step, body: F) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, WorkflowError>>,
    {
        let slot = match InFlightSlot::acquire(&self.in_flight, step) {
            Ok(slot) => slot,
            Err(err) => {
                self.report_failure(step, &err);
                return Err(err);
            }
        };

        let outcome = body.await;

        drop(slot);
        if let Err(err) = &outcome {
            self.report_failure(step, err);
        }
        outcome
    }

    fn report_failure(&self, step: Step, err: &WorkflowError) {
        warn!(step = step.name(), kind = ?err.kind(), error = %err, "workflow step failed");
        let failure = err.to_failure(step);
        let _ = self.events.send(WorkflowEvent::Alert(failure.alert_text()));
        let _ = self.events.send(WorkflowEvent::StepFailed(failure));
    }

    async fn upload_inner(&self, selection: FileSelection) -> Result<Session, WorkflowError> {
        debug!(files = selection.len(), "uploading file selection");
        let response = self.backend.upload(selection.into_files()).await?;
        info!(
            file_id = %response.file_id,
            filename = %response.filename,
            stored = ?response.uploaded_files,
            "upload accepted by backend"
        );
        let session = response.into_session();

        let (stale_preview, stage, affordances) = {
            let mut guard = self.inner.lock().await;
            guard.session = session.clone();
            guard.stage = guard.stage.after_upload();
            guard.affordances = Affordances {
                preview_enabled: true,
                process_enabled: false,
                download_visible: false,
            };
            guard.download_link = None;
            guard.last_message = None;
            (guard.preview.take(), guard.stage, guard.affordances)
        };
        if let Some(frame) = stale_preview {
            self.object_urls.revoke(&frame.object_url).await;
        }

        let _ = self
            .events
            .send(WorkflowEvent::SessionChanged(session.clone()));
        let _ = self.events.send(WorkflowEvent::StageChanged(stage));
        let _ = self
            .events
            .send(WorkflowEvent::AffordancesChanged(affordances));
        Ok(session)
    }

    async fn process_inner(&self) -> Result<ProcessOutcome, WorkflowError> {
        let request = {
            let guard = self.inner.lock().await;
            ProcessRequest::from_session(&guard.session)
        }
        .ok_or(WorkflowError::MissingSession {
            step: Step::Process,
        })?;

        debug!(file_id = %request.file_id, filename = %request.filename, "requesting processing");
        let response = self.backend.process(&request).await?;
        let download_link = self.backend.download_link(&request.file_id);

        let (stage, affordances) = {
            let mut guard = self.inner.lock().await;
            guard.last_message = Some(response.message.clone());
            guard.download_link = Some(download_link.clone());
            guard.affordances.download_visible = true;
            guard.stage = guard.stage.after_process();
            (guard.stage, guard.affordances)
        };

        let _ = self
            .events
            .send(WorkflowEvent::Alert(response.message.clone()));
        let _ = self
            .events
            .send(WorkflowEvent::DownloadLinkRevealed(download_link.clone()));
        let _ = self.events.send(WorkflowEvent::StageChanged(stage));
        let _ = self
            .events
            .send(WorkflowEvent::AffordancesChanged(affordances));

        Ok(ProcessOutcome {
            response,
            download_link,
        })
    }

    async fn preview_inner(&self) -> Result<PreviewFrame, WorkflowError> {
        let (file_id, filename) = {
            let guard = self.inner.lock().await;
            guard
                .session
                .active()
                .map(|(file_id, filename)| (file_id.clone(), filename.to_string()))
        }
        .ok_or(WorkflowError::MissingSession {
            step: Step::Preview,
        })?;

        debug!(%file_id, %filename, "requesting preview");
        let blob = self.backend.preview(&file_id, &filename).await?;
        let content_type = blob.content_type.clone();
        let object_url = self.object_urls.create(blob).await;
        let frame = PreviewFrame {
            object_url,
            content_type,
        };

        let (replaced, stage, affordances) = {
            let mut guard = self.inner.lock().await;
            let replaced = guard.preview.replace(frame.clone());
            guard.affordances.process_enabled = true;
            guard.stage = guard.stage.after_preview();
            (replaced, guard.stage, guard.affordances)
        };
        if let Some(old) = replaced {
            self.object_urls.revoke(&old.object_url).await;
        }

        let _ = self
            .events
            .send(WorkflowEvent::PreviewRendered(frame.clone()));
        let _ = self.events.send(WorkflowEvent::StageChanged(stage));
        let _ = self
            .events
            .send(WorkflowEvent::AffordancesChanged(affordances));
        Ok(frame)
    }

    async fn download_inner(&self) -> Result<DownloadLink, WorkflowError> {
        let (link, stage) = {
            let mut guard = self.inner.lock().await;
            let link = guard
                .download_link
                .clone()
                .ok_or(WorkflowError::MissingDownload)?;
            guard.stage = guard.stage.after_download();
            (link, guard.stage)
        };
        info!(href = %link.href, "download link followed");
        let _ = self.events.send(WorkflowEvent::StageChanged(stage));
        Ok(link)
    }
}

#[cfg(test)]
#[path = "tests/mock_backend.rs"]
mod mock_backend;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
