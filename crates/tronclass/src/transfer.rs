//! File transfer and homework submission
//!
//! Upload is two strictly ordered phases: register the file's metadata with
//! the portal, then PUT the bytes to the pre-signed URL the portal hands back.
//! The PUT never happens without a `201 Created` registration. Downloads are
//! streamed chunk by chunk into a uniquely named temporary file that is
//! renamed into place only once the whole body has arrived.
//!
//! The PUT and the download body carry no total timeout, only the session
//! client's idle-read limit, so large files are not cut off while data is
//! still flowing.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::client::{self, ApiClient};
use crate::disposition;
use crate::error::{ApiError, ApiResult, Result};
use crate::request::{ApiRequest, ToApiRequest};

const UPLOADS_PATH: &str = "/api/uploads";

fn default_content_type() -> String {
    "application/octet-stream".to_owned()
}

/// Metadata registered before any bytes are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRegistration {
    pub name: String,
    pub size: u64,
    pub parent_type: Option<String>,
    pub parent_id: u64,
    pub is_scorm: bool,
    pub is_wmpkg: bool,
    pub source: String,
    pub is_marked_attachment: bool,
    pub embed_material_type: String,
}

impl UploadRegistration {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            parent_type: None,
            parent_id: 0,
            is_scorm: false,
            is_wmpkg: false,
            source: String::new(),
            is_marked_attachment: false,
            embed_material_type: String::new(),
        }
    }
}

impl ToApiRequest for UploadRegistration {
    fn to_api_request(&self) -> ApiRequest {
        ApiRequest::post_json(UPLOADS_PATH, json!(self))
    }
}

/// Registration reply. Consumed by the PUT phase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadTicket {
    pub upload_url: String,
    pub name: String,
    pub id: u64,
    #[serde(alias = "mime_type", default = "default_content_type")]
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    pub id: u64,
    pub name: String,
    pub size: u64,
    pub content_type: String,
}

/// Register `path` with the portal and stream its bytes to the returned URL.
pub async fn upload(client: &ApiClient, path: &Path) -> Result<UploadOutcome> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ApiError::io(&format!("cannot stat {}", path.display()), e))?;
    if !metadata.is_file() {
        return Err(ApiError::io(&path.display().to_string(), "not a regular file"));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ApiError::io(&path.display().to_string(), "path has no file name"))?;
    let size = metadata.len();

    let registration = UploadRegistration::new(name, size);
    let response = client::send(client.bounded(registration.to_api_request())).await?;
    let status = response.status();
    if status != StatusCode::CREATED {
        warn!(status = status.as_u16(), "upload registration refused");
        return Err(client::http_error(response).await);
    }
    let text = response.text().await.map_err(ApiError::network)?;
    let ticket: UploadTicket = serde_json::from_str(&text).map_err(ApiError::decode)?;
    debug!(id = ticket.id, content_type = %ticket.content_type, "upload registered");

    put(client, ticket, path, size).await
}

async fn put(
    client: &ApiClient,
    ticket: UploadTicket,
    path: &Path,
    size: u64,
) -> Result<UploadOutcome> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| ApiError::io(&format!("cannot open {}", path.display()), e))?;
    let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

    let request = client
        .session()
        .client()
        .put(&ticket.upload_url)
        .header(CONTENT_TYPE, &ticket.content_type)
        .header(CONTENT_LENGTH, size)
        .body(body);
    client::error_for_status(client::send(request).await?).await?;

    info!(id = ticket.id, size, "upload complete");
    Ok(UploadOutcome {
        id: ticket.id,
        name: ticket.name,
        size,
        content_type: ticket.content_type,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub filename: String,
    pub bytes: u64,
}

/// Stream the file behind `reference_id` into `dir`.
///
/// The name comes from `Content-Disposition` (see `disposition`); an existing
/// file of the same name is replaced. Concurrent downloads into the same name
/// each write their own temporary file, and the last one to finish wins.
pub async fn download(
    client: &ApiClient,
    reference_id: u64,
    dir: &Path,
) -> Result<DownloadOutcome> {
    let request = ApiRequest::get(format!("/api/uploads/reference/{reference_id}/blob"));
    let response = client::error_for_status(client::send(client.builder(request)).await?).await?;

    let header = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok());
    let filename = disposition::filename_or_fallback(header);

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ApiError::io(&format!("cannot create {}", dir.display()), e))?;
    let target = dir.join(&filename);
    let partial = tempfile::Builder::new()
        .prefix(&format!(".{filename}."))
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|e| {
            ApiError::io(&format!("cannot create partial file in {}", dir.display()), e)
        })?;
    let (file, partial) = partial.into_parts();

    // Dropping `partial` on error removes the temporary file
    let bytes = write_stream(response, tokio::fs::File::from_std(file)).await?;
    partial
        .persist(&target)
        .map_err(|e| {
            ApiError::io(&format!("cannot move into {}", target.display()), e.error)
        })?;

    info!(reference_id, %filename, bytes, "download complete");
    Ok(DownloadOutcome {
        path: target,
        filename,
        bytes,
    })
}

async fn write_stream(response: reqwest::Response, mut file: tokio::fs::File) -> Result<u64> {
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ApiError::network)?;
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::io("write failed", e))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::io("flush failed", e))?;
    Ok(written)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub activity_id: u64,
    pub upload_ids: Vec<u64>,
    pub comment: String,
}

impl ToApiRequest for SubmissionRequest {
    fn to_api_request(&self) -> ApiRequest {
        ApiRequest::post_json(
            format!("/api/course/activities/{}/submissions", self.activity_id),
            json!({
                "comment": self.comment,
                "uploads": self.upload_ids,
                "slides": [],
                "is_draft": false,
                "mode": "normal",
                "other_resources": [],
                "uploads_in_rich_text": [],
            }),
        )
    }
}

/// Submit homework. The reply body is ignored; a 2xx status is success.
pub async fn submit(client: &ApiClient, request: &SubmissionRequest) -> ApiResult {
    let response = client::send(client.bounded(request.to_api_request())).await?;
    let status = client::error_for_status(response).await?.status();
    info!(activity_id = request.activity_id, status = status.as_u16(), "homework submitted");
    Ok(json!({ "status": status.as_u16() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{MockPortal, Recorded, session_for, session_with_timeout, trickle};
    use axum::body::Bytes;
    use axum::http::StatusCode as MockStatus;
    use axum::response::{IntoResponse, Response};
    use serde_json::Value;
    use std::time::Duration;

    fn portal(hit: &Recorded, base: &str) -> Response {
        match (hit.method.as_str(), hit.path.as_str()) {
            ("POST", "/api/uploads") => (
                MockStatus::CREATED,
                axum::Json(json!({
                    "upload_url": format!("{base}/presigned/bucket-1?sig=abc"),
                    "name": "remote-report.pdf",
                    "id": 31337,
                    "mime_type": "application/pdf",
                })),
            )
                .into_response(),
            ("PUT", "/presigned/bucket-1") => MockStatus::OK.into_response(),
            ("GET", "/api/uploads/reference/5/blob") => (
                [(
                    "content-disposition",
                    "attachment; filename*=UTF-8''%E6%B8%AC%E8%A9%A6.pdf",
                )],
                "x".repeat(200_000),
            )
                .into_response(),
            ("GET", "/api/uploads/reference/6/blob") => "plain bytes".into_response(),
            ("POST", "/api/course/activities/77/submissions") => {
                (MockStatus::CREATED, "{}").into_response()
            }
            _ => (MockStatus::NOT_FOUND, "missing").into_response(),
        }
    }

    /// Two references that resolve to the same filename, streamed slowly
    /// enough for concurrent downloads to overlap.
    fn same_name(hit: &Recorded, _base: &str) -> Response {
        let fill = match hit.path.as_str() {
            "/api/uploads/reference/8/blob" => b'A',
            "/api/uploads/reference/9/blob" => b'B',
            _ => return (MockStatus::NOT_FOUND, "missing").into_response(),
        };
        let chunks = (0..4).map(|_| Ok(Bytes::from(vec![fill; 1000]))).collect();
        (
            [("content-disposition", r#"attachment; filename="same.pdf""#)],
            trickle(chunks, Duration::from_millis(30)),
        )
            .into_response()
    }

    /// Bodies that take longer than the session timeout overall but never
    /// pause longer than it.
    fn slow(hit: &Recorded, _base: &str) -> Response {
        let chunks = (0..6).map(|_| Ok(Bytes::from(vec![b'7'; 100]))).collect();
        let body = trickle(chunks, Duration::from_millis(400));
        match hit.path.as_str() {
            "/api/uploads/reference/12/blob" => {
                ([("content-disposition", "attachment; filename=lecture.mp4")], body).into_response()
            }
            _ => body.into_response(),
        }
    }

    fn refusing(hit: &Recorded, _base: &str) -> Response {
        match hit.method.as_str() {
            "POST" => axum::Json(json!({"upload_url": "x", "name": "n", "id": 1})).into_response(),
            _ => MockStatus::OK.into_response(),
        }
    }

    fn scratch_file(contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn registration_has_fixed_shape() {
        let ApiRequest { url, body, .. } = UploadRegistration::new("a.txt", 12).to_api_request();
        assert_eq!(url, "/api/uploads");
        let crate::request::RequestBody::Json(body) = body else {
            panic!("expected JSON body");
        };
        assert_eq!(
            body,
            json!({
                "name": "a.txt",
                "size": 12,
                "parent_type": null,
                "parent_id": 0,
                "is_scorm": false,
                "is_wmpkg": false,
                "source": "",
                "is_marked_attachment": false,
                "embed_material_type": "",
            })
        );
    }

    #[test]
    fn ticket_content_type_defaults() {
        let ticket: UploadTicket =
            serde_json::from_value(json!({"upload_url": "u", "name": "n", "id": 3})).unwrap();
        assert_eq!(ticket.content_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn upload_registers_then_puts_to_exact_url() {
        let mock = MockPortal::start(portal).await;
        let client = ApiClient::new(session_for(&mock.base));
        let (_dir, path) = scratch_file(b"%PDF-1.4 homework");

        let outcome = upload(&client, &path).await.unwrap();
        assert_eq!(outcome.id, 31337);
        assert_eq!(outcome.name, "remote-report.pdf");
        assert_eq!(outcome.size, 17);

        let hits = mock.hits();
        assert_eq!(hits.len(), 2);
        let registered: Value = serde_json::from_slice(&hits[0].body).unwrap();
        assert_eq!(registered["name"], json!("report.pdf"));
        assert_eq!(registered["size"], json!(17));

        let put = &hits[1];
        assert_eq!(put.method, "PUT");
        assert_eq!(put.path, "/presigned/bucket-1");
        assert_eq!(put.query, "sig=abc");
        assert_eq!(put.header("content-type"), "application/pdf");
        assert_eq!(put.header("content-length"), "17");
        assert_eq!(put.body, b"%PDF-1.4 homework");
    }

    #[tokio::test]
    async fn non_created_registration_sends_no_put() {
        let mock = MockPortal::start(refusing).await;
        let client = ApiClient::new(session_for(&mock.base));
        let (_dir, path) = scratch_file(b"data");

        let err = upload(&client, &path).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Http(200));
        let hits = mock.hits();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].method, "POST");
    }

    #[tokio::test]
    async fn missing_local_file_is_io_before_any_request() {
        let mock = MockPortal::start(portal).await;
        let client = ApiClient::new(session_for(&mock.base));

        let err = upload(&client, Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
        assert!(mock.hits().is_empty());
    }

    #[tokio::test]
    async fn download_uses_extended_filename_and_streams_body() {
        let mock = MockPortal::start(portal).await;
        let client = ApiClient::new(session_for(&mock.base));
        let dir = tempfile::tempdir().unwrap();

        let outcome = download(&client, 5, dir.path()).await.unwrap();
        assert_eq!(outcome.filename, "測試.pdf");
        assert_eq!(outcome.bytes, 200_000);
        assert_eq!(outcome.path, dir.path().join("測試.pdf"));
        assert_eq!(std::fs::read(&outcome.path).unwrap().len(), 200_000);
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("測試.pdf")]);
    }

    #[tokio::test]
    async fn concurrent_downloads_of_one_name_never_mix() {
        let mock = MockPortal::start(same_name).await;
        let first = ApiClient::new(session_for(&mock.base));
        let second = ApiClient::new(session_for(&mock.base));
        let dir = tempfile::tempdir().unwrap();

        let (a, b) = tokio::join!(
            download(&first, 8, dir.path()),
            download(&second, 9, dir.path())
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.bytes, 4000);
        assert_eq!(b.bytes, 4000);
        assert_eq!(a.path, b.path);

        let contents = std::fs::read(dir.path().join("same.pdf")).unwrap();
        assert_eq!(contents.len(), 4000);
        assert!(
            contents.iter().all(|&c| c == b'A') || contents.iter().all(|&c| c == b'B'),
            "downloads were interleaved"
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn slow_download_outlasts_session_timeout() {
        let mock = MockPortal::start(slow).await;
        let client = ApiClient::new(session_with_timeout(&mock.base, Duration::from_secs(1)));
        let dir = tempfile::tempdir().unwrap();

        let outcome = download(&client, 12, dir.path()).await.unwrap();
        assert_eq!(outcome.filename, "lecture.mp4");
        assert_eq!(outcome.bytes, 600);
    }

    #[tokio::test]
    async fn json_calls_keep_total_timeout() {
        let mock = MockPortal::start(slow).await;
        let client = ApiClient::new(session_with_timeout(&mock.base, Duration::from_secs(1)));

        let err = client.call(ApiRequest::get("/api/todos")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
    }

    #[tokio::test]
    async fn interrupted_download_leaves_no_partial_file() {
        let cut = |_: &Recorded, _: &str| {
            let chunks = vec![
                Ok(Bytes::from_static(b"first half")),
                Err(std::io::Error::other("connection dropped")),
            ];
            trickle(chunks, Duration::from_millis(50)).into_response()
        };
        let mock = MockPortal::start(cut).await;
        let client = ApiClient::new(session_for(&mock.base));
        let dir = tempfile::tempdir().unwrap();

        let err = download(&client, 3, dir.path()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn download_without_disposition_uses_fallback() {
        let mock = MockPortal::start(portal).await;
        let client = ApiClient::new(session_for(&mock.base));
        let dir = tempfile::tempdir().unwrap();

        let outcome = download(&client, 6, dir.path()).await.unwrap();
        assert_eq!(outcome.filename, disposition::FALLBACK_FILENAME);
        assert_eq!(std::fs::read(&outcome.path).unwrap(), b"plain bytes");
    }

    #[tokio::test]
    async fn download_error_status_writes_nothing() {
        let mock = MockPortal::start(portal).await;
        let client = ApiClient::new(session_for(&mock.base));
        let dir = tempfile::tempdir().unwrap();

        let err = download(&client, 404, dir.path()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Http(404));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn submission_reports_status_only() {
        let mock = MockPortal::start(portal).await;
        let client = ApiClient::new(session_for(&mock.base));
        let request = SubmissionRequest {
            activity_id: 77,
            upload_ids: vec![31337, 31338],
            comment: "final version".into(),
        };

        let result = submit(&client, &request).await.unwrap();
        assert_eq!(result, json!({"status": 201}));

        let sent: Value = serde_json::from_slice(&mock.hits()[0].body).unwrap();
        assert_eq!(
            sent,
            json!({
                "comment": "final version",
                "uploads": [31337, 31338],
                "slides": [],
                "is_draft": false,
                "mode": "normal",
                "other_resources": [],
                "uploads_in_rich_text": [],
            })
        );
    }

    #[tokio::test]
    async fn submission_to_unknown_activity_is_http_error() {
        let mock = MockPortal::start(portal).await;
        let client = ApiClient::new(session_for(&mock.base));
        let request = SubmissionRequest {
            activity_id: 1,
            upload_ids: vec![],
            comment: String::new(),
        };
        let err = submit(&client, &request).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Http(404));
    }
}
