//! Upload server: a browser form in front of the narration pipeline.
//!
//! | Route | Method | Behaviour |
//! |-------|--------|-----------|
//! | `/` | GET | HTML upload form |
//! | `/` | POST | multipart `file` field → audio attachment |
//! | `/health` | GET | `ok` |
//!
//! Uploads are validated before anything is written: a missing `file`
//! field, an empty filename and a disallowed extension are rejected with
//! `400 No file part`, `400 No selected file` and `415 Invalid file type`.
//! Accepted uploads are staged under the configured upload directory with a
//! UUID prefix, narrated, and deleted again once the response is built.
//!
//! Every failure is a plain-text body with a status chosen from
//! [`Doc2SpeechError::kind`]. Internal errors are logged and not echoed.

use crate::config::{PipelineConfig, ServerConfig};
use crate::convert::narrate;
use crate::error::{Doc2SpeechError, ErrorKind};
use crate::pipeline::input::{allowed_file, extension_of};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared, read-only state of the server.
#[derive(Debug, Clone)]
pub struct AppState {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
}

/// Errors surfaced by the upload endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No file part")]
    NoFilePart,
    #[error("No selected file")]
    NoSelectedFile,
    #[error("Invalid file type")]
    InvalidFileType,
    #[error("{message}")]
    BadUpload { status: StatusCode, message: String },
    #[error(transparent)]
    Pipeline(#[from] Doc2SpeechError),
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::BadUpload {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

/// HTTP status for a pipeline failure.
pub fn status_for(e: &Doc2SpeechError) -> StatusCode {
    match e.kind() {
        ErrorKind::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorKind::Extraction | ErrorKind::EmptyText => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::SynthesisFailed => StatusCode::BAD_GATEWAY,
        ErrorKind::EngineUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::SynthesisTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NoFilePart => (StatusCode::BAD_REQUEST, "No file part".to_string()),
            ApiError::NoSelectedFile => (StatusCode::BAD_REQUEST, "No selected file".to_string()),
            ApiError::InvalidFileType => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Invalid file type".to_string(),
            ),
            ApiError::BadUpload { status, message } => (status, message),
            ApiError::Pipeline(e) => {
                let status = status_for(&e);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!(error = %e, "Narration failed");
                    (status, "Internal server error".to_string())
                } else {
                    warn!(error = %e, "Narration rejected");
                    (status, e.to_string())
                }
            }
        };
        (status, message).into_response()
    }
}

/// Remove path separators, NUL and special characters, strip `..`, cap the
/// length at 100 characters, and fall back to `document`.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|&c| c != '/' && c != '\\' && c != '\0')
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized: String = sanitized.replace("..", "").chars().take(100).collect();

    if sanitized.is_empty() {
        "document".into()
    } else {
        sanitized
    }
}

/// `Content-Disposition` for a download named `{stem}.{extension}`.
///
/// Header values must be ASCII. A non-ASCII stem gets an `_`-substituted
/// `filename` plus the exact name as an RFC 5987 `filename*`.
pub fn content_disposition(stem: &str, extension: &str) -> String {
    let name = format!("{stem}.{extension}");
    if name.is_ascii() {
        return format!("attachment; filename=\"{name}\"");
    }

    let fallback: String = name
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let mut encoded = String::with_capacity(name.len() * 3);
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let limit = state.server.max_upload_bytes;
    Router::new()
        .route("/", get(upload_page).post(handle_upload))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(Arc::new(state))
}

/// Bind and serve until Ctrl-C.
pub async fn serve(server: ServerConfig, pipeline: PipelineConfig) -> Result<(), Doc2SpeechError> {
    tokio::fs::create_dir_all(&server.upload_dir)
        .await
        .map_err(|e| Doc2SpeechError::OutputWriteFailed {
            path: server.upload_dir.clone(),
            source: e,
        })?;

    let listener = tokio::net::TcpListener::bind(server.bind)
        .await
        .map_err(|e| Doc2SpeechError::Internal(format!("bind {}: {e}", server.bind)))?;
    let addr = listener
        .local_addr()
        .map_err(|e| Doc2SpeechError::Internal(e.to_string()))?;
    info!(%addr, upload_dir = %server.upload_dir.display(), "Upload server listening");

    let app = router(AppState { server, pipeline });
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .map_err(|e| Doc2SpeechError::Internal(format!("server error: {e}")))
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn upload_page() -> Html<&'static str> {
    Html(UPLOAD_PAGE_HTML)
}

async fn handle_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("").to_string();
            let bytes = field.bytes().await?;
            upload = Some((filename, bytes.to_vec()));
            break;
        }
    }

    let (filename, bytes) = upload.ok_or(ApiError::NoFilePart)?;
    if filename.is_empty() {
        return Err(ApiError::NoSelectedFile);
    }
    if !allowed_file(&filename, &state.server.allowed_extensions) {
        return Err(ApiError::InvalidFileType);
    }

    // The extension was validated on the raw name; re-attach it after
    // sanitising the stem so the staged file keeps its declared format.
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, _)) => (stem, extension_of(&filename).unwrap_or_default()),
        None => (filename.as_str(), ""),
    };
    let stem = sanitize_filename(stem);
    let ext = ext.to_ascii_lowercase();

    tokio::fs::create_dir_all(&state.server.upload_dir)
        .await
        .map_err(|e| Doc2SpeechError::OutputWriteFailed {
            path: state.server.upload_dir.clone(),
            source: e,
        })?;
    let staged = state
        .server
        .upload_dir
        .join(format!("{}_{}.{}", Uuid::new_v4(), stem, ext));
    tokio::fs::write(&staged, &bytes)
        .await
        .map_err(|e| Doc2SpeechError::OutputWriteFailed {
            path: staged.clone(),
            source: e,
        })?;
    info!(file = %filename, bytes = bytes.len(), "Upload staged");

    let result = narrate(&staged, &state.pipeline).await;
    if let Err(e) = tokio::fs::remove_file(&staged).await {
        warn!("Failed to remove staged upload {}: {e}", staged.display());
    }
    let output = result?;

    let audio = output.audio.read().await?;
    let format = output.audio.format();
    let disposition = content_disposition(&stem, format.extension());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        audio,
    )
        .into_response())
}

const UPLOAD_PAGE_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Document to speech</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 36rem; margin: 4rem auto; padding: 0 1rem; }
  form { display: flex; gap: .5rem; align-items: center; }
  p.hint { color: #555; font-size: .9rem; }
</style>
</head>
<body>
<h1>Document to speech</h1>
<form method="post" enctype="multipart/form-data">
  <input type="file" name="file" accept=".txt,.pdf,.docx">
  <button type="submit">Narrate</button>
</form>
<p class="hint">Plain text, PDF or Word documents. Inline math written as <code>$x^2 + 1$</code> is read out as a description.</p>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn sanitize_path_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etcpasswd");
    }

    #[test]
    fn sanitize_special_chars() {
        assert_eq!(sanitize_filename("my notes (v2)"), "my_notes__v2_");
    }

    #[test]
    fn sanitize_long_name() {
        let long = "é".repeat(150);
        assert_eq!(sanitize_filename(&long).chars().count(), 100);
    }

    #[test]
    fn sanitize_empty_name() {
        assert_eq!(sanitize_filename(""), "document");
        assert_eq!(sanitize_filename("/\\"), "document");
    }

    #[test]
    fn sanitize_null_bytes() {
        assert_eq!(sanitize_filename("a\0b"), "ab");
    }

    #[test]
    fn disposition_plain_ascii() {
        assert_eq!(
            content_disposition("energy_notes", "wav"),
            "attachment; filename=\"energy_notes.wav\""
        );
    }

    #[test]
    fn disposition_non_ascii_is_encoded() {
        let stem = sanitize_filename("café");
        let value = content_disposition(&stem, "mp3");
        assert!(value.is_ascii());
        assert_eq!(
            value,
            "attachment; filename=\"caf_.mp3\"; filename*=UTF-8''caf%C3%A9.mp3"
        );
        assert!(header::HeaderValue::from_str(&value).is_ok());
    }

    #[test]
    fn statuses_per_kind() {
        let path = PathBuf::from("x.pdf");
        assert_eq!(
            status_for(&Doc2SpeechError::UnsupportedFormat {
                extension: "jpg".into()
            }),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            status_for(&Doc2SpeechError::CorruptPdf {
                path,
                detail: "x".into()
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(&Doc2SpeechError::EmptyText), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status_for(&Doc2SpeechError::EngineUnavailable {
                engine: "e".into(),
                detail: "d".into()
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&Doc2SpeechError::SynthesisFailed {
                engine: "e".into(),
                detail: "d".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&Doc2SpeechError::SynthesisTimeout { secs: 1 }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&Doc2SpeechError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
