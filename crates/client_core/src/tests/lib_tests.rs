use super::*;
use crate::mock_backend::{MockBackend, Reply, UploadHold};
use axum::http::StatusCode;
use shared::{domain::FileId, error::EMPTY_SELECTION_MESSAGE};
use tokio::sync::oneshot;

async fn controller_with_mock() -> (Arc<WorkflowController>, MockBackend) {
    let mock = MockBackend::new();
    let base_url = mock.spawn().await;
    let backend = HttpBackend::new(&base_url).expect("backend");
    (WorkflowController::new(Arc::new(backend)), mock)
}

fn one_file(name: &str) -> FileSelection {
    FileSelection::new(vec![SelectedFile::new(name, b"geodata".to_vec())])
}

fn drain_alerts(rx: &mut broadcast::Receiver<WorkflowEvent>) -> Vec<String> {
    let mut alerts = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let WorkflowEvent::Alert(text) = event {
            alerts.push(text);
        }
    }
    alerts
}

#[tokio::test]
async fn empty_selection_is_rejected_without_request() {
    let (controller, mock) = controller_with_mock().await;
    let mut rx = controller.subscribe_events();

    let err = controller
        .upload(FileSelection::default())
        .await
        .expect_err("empty selection");

    assert_eq!(err, WorkflowError::Validation(EMPTY_SELECTION_MESSAGE.to_string()));
    assert_eq!(mock.hit_count(), 0);
    assert_eq!(drain_alerts(&mut rx), vec![EMPTY_SELECTION_MESSAGE.to_string()]);
    assert_eq!(controller.session().await, Session::default());
}

#[tokio::test]
async fn successful_upload_establishes_session_and_enables_preview() {
    let (controller, _mock) = controller_with_mock().await;
    assert!(!controller.snapshot().await.affordances.preview_enabled);

    let session = controller.upload(one_file("x.zip")).await.expect("upload");

    let expected = Session::established(FileId::from("abc"), "x.zip");
    assert_eq!(session, expected);
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.session, expected);
    assert_eq!(snapshot.stage, WorkflowStage::Uploaded);
    assert!(snapshot.affordances.preview_enabled);
    assert!(!snapshot.affordances.process_enabled);
    assert!(!snapshot.affordances.download_visible);
    assert_eq!(snapshot.in_flight, None);
}

#[tokio::test]
async fn failed_upload_reports_status_and_keeps_previous_session() {
    let (controller, mock) = controller_with_mock().await;
    controller.upload(one_file("x.zip")).await.expect("first upload");

    mock.set_upload_reply(Reply::text(StatusCode::INTERNAL_SERVER_ERROR, "disk full"))
        .await;
    let mut rx = controller.subscribe_events();
    let err = controller
        .upload(one_file("other.kml"))
        .await
        .expect_err("server error");

    assert_eq!(err.kind(), shared::error::ErrorKind::Server);
    assert_eq!(
        drain_alerts(&mut rx),
        vec!["Error subiendo archivos: Error 500: disk full".to_string()]
    );
    assert_eq!(
        controller.session().await,
        Session::established(FileId::from("abc"), "x.zip")
    );
}

#[tokio::test]
async fn process_sends_session_current_at_call_time() {
    let (controller, mock) = controller_with_mock().await;
    controller.upload(one_file("x.zip")).await.expect("upload");
    controller.preview().await.expect("preview");

    mock.set_upload_reply(Reply::json(
        StatusCode::OK,
        serde_json::json!({"file_id": "def", "filename": "y.kmz"}),
    ))
    .await;
    controller.upload(one_file("y.kmz")).await.expect("second upload");
    controller.process().await.expect("process");

    assert_eq!(
        mock.process_bodies.lock().await.as_slice(),
        &[serde_json::json!({"file_id": "def", "filename": "y.kmz"})]
    );
}

#[tokio::test]
async fn process_success_reveals_download_link_and_shows_message() {
    let (controller, mock) = controller_with_mock().await;
    mock.set_process_reply(Reply::json(
        StatusCode::OK,
        serde_json::json!({"message": "CRS archivo final: EPSG:4686"}),
    ))
    .await;
    controller.upload(one_file("x.zip")).await.expect("upload");
    let mut rx = controller.subscribe_events();

    let outcome = controller.process().await.expect("process");

    assert_eq!(outcome.download_link.href, "/download/abc");
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.download_link, Some(outcome.download_link));
    assert!(snapshot.affordances.download_visible);
    assert_eq!(snapshot.stage, WorkflowStage::Processed);
    assert_eq!(
        snapshot.last_message.as_deref(),
        Some("CRS archivo final: EPSG:4686")
    );
    assert_eq!(
        drain_alerts(&mut rx),
        vec!["CRS archivo final: EPSG:4686".to_string()]
    );
}

#[tokio::test]
async fn process_error_body_surfaces_as_parse_failure() {
    let (controller, mock) = controller_with_mock().await;
    controller.upload(one_file("x.zip")).await.expect("upload");
    mock.set_process_reply(Reply::text(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error",
    ))
    .await;
    let mut rx = controller.subscribe_events();

    let err = controller.process().await.expect_err("not json");

    assert!(matches!(err, WorkflowError::Parse(_)));
    let alerts = drain_alerts(&mut rx);
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].starts_with("Error procesando archivo: "));
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.download_link, None);
    assert!(!snapshot.affordances.download_visible);
    assert_eq!(snapshot.stage, WorkflowStage::Uploaded);
}

#[tokio::test]
async fn process_json_error_without_message_is_parse_failure() {
    let (controller, mock) = controller_with_mock().await;
    controller.upload(one_file("x.zip")).await.expect("upload");
    mock.set_process_reply(Reply::json(
        StatusCode::UNPROCESSABLE_ENTITY,
        serde_json::json!({"detail": "CRS de destino no soportado"}),
    ))
    .await;
    let mut rx = controller.subscribe_events();

    let err = controller.process().await.expect_err("no message field");

    assert!(matches!(err, WorkflowError::Parse(_)));
    let alerts = drain_alerts(&mut rx);
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].starts_with("Error procesando archivo: "));
    assert!(alerts[0].contains("message"));
    assert!(!alerts.iter().any(|alert| alert.contains("undefined")));
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.download_link, None);
    assert!(!snapshot.affordances.download_visible);
    assert_eq!(snapshot.last_message, None);
    assert_eq!(snapshot.stage, WorkflowStage::Uploaded);
}

#[tokio::test]
async fn only_successful_preview_enables_process() {
    let (controller, mock) = controller_with_mock().await;
    controller.upload(one_file("x.zip")).await.expect("upload");

    mock.set_preview_reply(Reply::text(StatusCode::INTERNAL_SERVER_ERROR, "boom"))
        .await;
    controller.preview().await.expect_err("failed preview");
    let snapshot = controller.snapshot().await;
    assert!(!snapshot.affordances.process_enabled);
    assert_eq!(snapshot.preview, None);
    assert_eq!(snapshot.stage, WorkflowStage::Uploaded);

    mock.set_preview_reply(Reply::binary("text/html", b"<html></html>"))
        .await;
    controller.preview().await.expect("preview");
    assert!(controller.snapshot().await.affordances.process_enabled);

    mock.set_preview_reply(Reply::text(StatusCode::INTERNAL_SERVER_ERROR, "boom"))
        .await;
    controller.preview().await.expect_err("failed again");
    let snapshot = controller.snapshot().await;
    assert!(snapshot.affordances.process_enabled);
    assert!(snapshot.preview.is_some());
}

#[tokio::test]
async fn preview_not_found_shows_status_and_body() {
    let (controller, mock) = controller_with_mock().await;
    controller.upload(one_file("x.zip")).await.expect("upload");
    mock.set_preview_reply(Reply::text(StatusCode::NOT_FOUND, "not found"))
        .await;
    let mut rx = controller.subscribe_events();

    controller.preview().await.expect_err("404");

    let alerts = drain_alerts(&mut rx);
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("404"));
    assert!(alerts[0].contains("not found"));
    assert_eq!(
        alerts[0],
        "Error generando vista previa: Error 404: not found"
    );
}

#[tokio::test]
async fn upload_process_preview_download_scenario() {
    let (controller, mock) = controller_with_mock().await;
    mock.set_upload_reply(Reply::json(
        StatusCode::OK,
        serde_json::json!({"file_id": "f1", "filename": "report.gpkg"}),
    ))
    .await;
    mock.set_process_reply(Reply::json(
        StatusCode::OK,
        serde_json::json!({"message": "Reprojected to EPSG:4326"}),
    ))
    .await;
    mock.set_preview_reply(Reply::binary("image/png", b"\x89PNG\r\n"))
        .await;

    controller
        .upload(one_file("report.gpkg"))
        .await
        .expect("upload");
    let uploaded = mock.upload_parts.lock().await.clone();
    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0][0].file_name, "report.gpkg");

    let outcome = controller.process().await.expect("process");
    assert_eq!(outcome.response.message, "Reprojected to EPSG:4326");
    assert_eq!(outcome.download_link.href, "/download/f1");

    let frame = controller.preview().await.expect("preview");
    assert_eq!(frame.content_type, "image/png");
    assert!(frame
        .iframe_html()
        .contains(&format!(r#"src="{}""#, frame.object_url)));
    let blob = controller
        .object_urls()
        .resolve(&frame.object_url)
        .await
        .expect("object url resolves");
    assert_eq!(blob.bytes, b"\x89PNG\r\n");

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.preview, Some(frame));
    assert_eq!(snapshot.stage, WorkflowStage::Processed);
    assert_eq!(
        snapshot.affordances,
        Affordances {
            preview_enabled: true,
            process_enabled: true,
            download_visible: true,
        }
    );

    let link = controller.download().await.expect("download");
    assert_eq!(link.href, "/download/f1");
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.stage, WorkflowStage::Idle);
    assert_eq!(
        snapshot.session,
        Session::established(FileId::from("f1"), "report.gpkg")
    );

    let artifact = controller
        .backend()
        .fetch_artifact(&link)
        .await
        .expect("artifact");
    assert_eq!(artifact.bytes, b"zip-for-f1");
}

#[tokio::test]
async fn steps_before_upload_are_rejected_without_request() {
    let (controller, mock) = controller_with_mock().await;
    let mut rx = controller.subscribe_events();

    assert_eq!(
        controller.process().await.expect_err("no session"),
        WorkflowError::MissingSession {
            step: Step::Process
        }
    );
    assert_eq!(
        controller.preview().await.expect_err("no session"),
        WorkflowError::MissingSession {
            step: Step::Preview
        }
    );
    assert_eq!(
        controller.download().await.expect_err("nothing processed"),
        WorkflowError::MissingDownload
    );

    assert_eq!(mock.hit_count(), 0);
    let alerts = drain_alerts(&mut rx);
    assert_eq!(alerts.len(), 3);
    assert!(alerts[0].starts_with("Error procesando archivo: "));
    assert!(alerts[1].starts_with("Error generando vista previa: "));
    assert_eq!(controller.snapshot().await.in_flight, None);
}

#[tokio::test]
async fn step_triggered_while_another_is_in_flight_is_busy() {
    let (controller, mock) = controller_with_mock().await;
    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    *mock.upload_hold.lock().await = Some(UploadHold {
        entered: entered_tx,
        release: release_rx,
    });

    let first = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.upload(one_file("x.zip")).await })
    };
    entered_rx.await.expect("upload reached backend");
    assert_eq!(controller.snapshot().await.in_flight, Some(Step::Upload));

    let err = controller
        .upload(one_file("y.zip"))
        .await
        .expect_err("busy");
    assert_eq!(
        err,
        WorkflowError::Busy {
            in_flight: Step::Upload
        }
    );
    assert_eq!(
        controller.preview().await.expect_err("busy"),
        WorkflowError::Busy {
            in_flight: Step::Upload
        }
    );
    assert_eq!(mock.upload_parts.lock().await.len(), 1);

    release_tx.send(()).expect("release");
    first.await.expect("join").expect("first upload");
    assert_eq!(controller.snapshot().await.in_flight, None);
    controller.preview().await.expect("preview after upload");
}

#[tokio::test]
async fn cancelled_step_releases_in_flight_slot() {
    let (controller, mock) = controller_with_mock().await;
    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    *mock.upload_hold.lock().await = Some(UploadHold {
        entered: entered_tx,
        release: release_rx,
    });

    let stalled = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            tokio::time::timeout(
                std::time::Duration::from_millis(200),
                controller.upload(one_file("x.zip")),
            )
            .await
        })
    };
    entered_rx.await.expect("upload reached backend");
    assert!(stalled.await.expect("join").is_err(), "upload should time out");
    drop(release_tx);

    assert_eq!(controller.snapshot().await.in_flight, None);
    let session = controller
        .upload(one_file("y.zip"))
        .await
        .expect("upload after cancellation");
    assert_eq!(session.file_id(), Some(&FileId::from("abc")));
    assert_eq!(controller.snapshot().await.in_flight, None);
}

#[tokio::test]
async fn new_upload_resets_downstream_affordances_and_revokes_preview() {
    let (controller, _mock) = controller_with_mock().await;
    controller.upload(one_file("x.zip")).await.expect("upload");
    let frame = controller.preview().await.expect("preview");
    controller.process().await.expect("process");
    assert_eq!(controller.object_urls().len().await, 1);

    controller.upload(one_file("x.zip")).await.expect("re-upload");

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.stage, WorkflowStage::Uploaded);
    assert_eq!(
        snapshot.affordances,
        Affordances {
            preview_enabled: true,
            process_enabled: false,
            download_visible: false,
        }
    );
    assert_eq!(snapshot.preview, None);
    assert_eq!(snapshot.download_link, None);
    assert!(controller
        .object_urls()
        .resolve(&frame.object_url)
        .await
        .is_none());
}

#[tokio::test]
async fn repeated_preview_replaces_prior_frame() {
    let (controller, _mock) = controller_with_mock().await;
    controller.upload(one_file("x.zip")).await.expect("upload");

    let first = controller.preview().await.expect("first preview");
    let second = controller.preview().await.expect("second preview");

    assert_ne!(first.object_url, second.object_url);
    assert!(controller.object_urls().resolve(&first.object_url).await.is_none());
    assert_eq!(controller.object_urls().len().await, 1);
    assert_eq!(controller.snapshot().await.preview, Some(second));
}

#[test]
fn iframe_markup_fills_container() {
    let frame = PreviewFrame {
        object_url: "blob:geoflow/1".to_string(),
        content_type: "text/html".to_string(),
    };
    assert_eq!(
        frame.iframe_html(),
        r#"<iframe src="blob:geoflow/1" style="width:100%; height:100%; border:none"></iframe>"#
    );
}
