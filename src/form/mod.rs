//! The interactive web form: one local session served over HTTP.
//!
//! The host owns exactly one [`SessionController`] behind a
//! [`tokio::sync::Mutex`]. Every route maps onto one controller operation and
//! redirects back to `/`, which re-renders the page from the session's view.
//!
//! | Route | Controller operation |
//! |-------|----------------------|
//! | `GET /` | [`SessionController::view`] |
//! | `POST /upload` | [`SessionController::on_upload`] (multipart field `file`) |
//! | `POST /clear` | [`SessionController::on_upload_cleared`] |
//! | `POST /convert` | [`SessionController::on_convert_requested`] |
//! | `POST /convert-again` | [`SessionController::on_convert_again_requested`] |
//! | `GET /download` | [`SessionController::current_artifact`] |
//! | `GET /status` | JSON view + live working flag |
//!
//! Conversion is CPU- or subprocess-bound, so `/convert` runs it on
//! `spawn_blocking` while holding the session lock: other requests for the
//! session wait until it finishes. `/status` and `/` read the shared
//! [`WorkingFlag`] instead of waiting.

pub mod page;

use crate::progress::WorkingFlag;
use crate::session::{SessionController, SessionView, UploadedDocument};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Default largest accepted Markdown upload: 16 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Settings for the web host.
#[derive(Debug, Clone)]
pub struct FormConfig {
    /// Listen address. Default: `127.0.0.1:8501`.
    pub bind: SocketAddr,
    /// Largest accepted upload in bytes. Default: 16 MiB.
    pub max_upload_bytes: usize,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8501)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

struct FormState {
    session: Arc<Mutex<SessionController>>,
    working: WorkingFlag,
    max_upload_bytes: usize,
}

/// Build the router serving `session`.
pub fn router(session: SessionController, config: &FormConfig) -> Router {
    let working = session.working_flag();
    let state = Arc::new(FormState {
        session: Arc::new(Mutex::new(session)),
        working,
        max_upload_bytes: config.max_upload_bytes,
    });

    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/clear", post(clear))
        .route("/convert", post(convert))
        .route("/convert-again", post(convert_again))
        .route("/download", get(download))
        .route("/status", get(status))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(
            config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
        ))
        .with_state(state)
}

/// Bind `config.bind` and serve the form until the process is stopped.
pub async fn serve(session: SessionController, config: FormConfig) -> std::io::Result<()> {
    let app = router(session, &config);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("Form listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn healthz() -> &'static str {
    "ok"
}

async fn index(State(state): State<Arc<FormState>>) -> Html<String> {
    match state.session.try_lock() {
        Ok(session) => Html(page::render(&session.view())),
        Err(_) => Html(page::render_busy()),
    }
}

async fn upload(State(state): State<Arc<FormState>>, mut multipart: Multipart) -> Response {
    let mut received = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return (e.status(), e.body_text()).into_response(),
        };
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().map(base_name).unwrap_or_default();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return (e.status(), e.body_text()).into_response(),
        };
        received = Some((name, bytes));
        break;
    }

    let Some((name, bytes)) = received.filter(|(name, _)| !name.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "No file in field 'file'").into_response();
    };
    if bytes.len() > state.max_upload_bytes {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("Upload exceeds {} bytes", state.max_upload_bytes),
        )
            .into_response();
    }

    let mut session = state.session.lock().await;
    if let Err(e) = session.on_upload(UploadedDocument::new(name, bytes.to_vec())) {
        warn!("Upload rejected: {}", e);
    }
    Redirect::to("/").into_response()
}

async fn clear(State(state): State<Arc<FormState>>) -> Redirect {
    state.session.lock().await.on_upload_cleared();
    Redirect::to("/")
}

async fn convert(State(state): State<Arc<FormState>>) -> Response {
    let session = Arc::clone(&state.session);
    let joined = tokio::task::spawn_blocking(move || {
        let mut session = session.blocking_lock();
        // Failures are recorded as the session's notice.
        let _ = session.on_convert_requested();
    })
    .await;

    match joined {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => {
            error!("Conversion task panicked: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Conversion task failed").into_response()
        }
    }
}

async fn convert_again(State(state): State<Arc<FormState>>) -> Redirect {
    if let Err(e) = state.session.lock().await.on_convert_again_requested() {
        warn!("Convert again rejected: {}", e);
    }
    Redirect::to("/")
}

async fn download(State(state): State<Arc<FormState>>) -> Response {
    let session = state.session.lock().await;
    let Some(artifact) = session.current_artifact() else {
        return (StatusCode::NOT_FOUND, "No PDF has been generated yet").into_response();
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(artifact.media_type),
    );
    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", artifact.filename))
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    (StatusCode::OK, headers, artifact.bytes.clone()).into_response()
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    converting: bool,
    /// `None` while a conversion holds the session.
    session: Option<SessionView>,
}

async fn status(State(state): State<Arc<FormState>>) -> Json<StatusResponse> {
    let session = state.session.try_lock().ok().map(|s| s.view());
    Json(StatusResponse {
        converting: state.working.is_set(),
        session,
    })
}

/// Browsers may send a full client-side path; keep only the file name.
fn base_name(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    Path::new(last)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::convert::Pipeline;
    use crate::error::RenderError;
    use crate::pipeline::render::Renderer;
    use crate::pipeline::template::HtmlDocument;
    use axum::{body, body::Body, http::Request};
    use tower::ServiceExt;

    struct StubRenderer;

    impl Renderer for StubRenderer {
        fn name(&self) -> &str {
            "stub"
        }

        fn render(&self, _document: &HtmlDocument) -> Result<Vec<u8>, RenderError> {
            Ok(b"%PDF-1.7\nstub".to_vec())
        }
    }

    const BOUNDARY: &str = "md2pdf-test-boundary";

    fn test_app() -> Router {
        let pipeline = Pipeline::with_renderer(&ConversionConfig::default(), Arc::new(StubRenderer));
        router(SessionController::new(pipeline), &FormConfig::default())
    }

    fn upload_request(filename: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/markdown\r\n\r\n\
             {content}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::post("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    fn post(path: &str) -> Request<Body> {
        Request::post(path).body(Body::empty()).expect("request")
    }

    fn get(path: &str) -> Request<Body> {
        Request::get(path).body(Body::empty()).expect("request")
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body")
            .to_vec()
    }

    async fn status_json(app: &Router) -> serde_json::Value {
        let response = app.clone().oneshot(get("/status")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        serde_json::from_slice(&body_bytes(response).await).expect("json")
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let response = test_app().oneshot(get("/healthz")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"ok");
    }

    #[tokio::test]
    async fn download_before_convert_is_404() {
        let response = test_app().oneshot(get("/download")).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn full_form_flow() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(upload_request("notes.md", "# Title\n\nHello **world**"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(status_json(&app).await["session"]["state"], "DocumentReady");

        let page = app.clone().oneshot(get("/")).await.expect("response");
        let html = String::from_utf8(body_bytes(page).await).unwrap();
        assert!(html.contains("Convert to PDF"));

        let response = app.clone().oneshot(post("/convert")).await.expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let s = status_json(&app).await;
        assert_eq!(s["session"]["state"], "ArtifactReady");
        assert_eq!(s["converting"], false);

        let response = app.clone().oneshot(get("/download")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/pdf"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"converted.pdf\""
        );
        assert!(body_bytes(response).await.starts_with(b"%PDF-"));

        app.clone()
            .oneshot(post("/convert-again"))
            .await
            .expect("response");
        assert_eq!(status_json(&app).await["session"]["state"], "DocumentReady");

        app.clone().oneshot(post("/clear")).await.expect("response");
        assert_eq!(status_json(&app).await["session"]["state"], "NoDocument");
    }

    #[tokio::test]
    async fn non_markdown_upload_sets_error_notice() {
        let app = test_app();
        app.clone()
            .oneshot(upload_request("picture.png", "not markdown"))
            .await
            .expect("response");
        let s = status_json(&app).await;
        assert_eq!(s["session"]["state"], "NoDocument");
        assert_eq!(s["session"]["notice"]["level"], "error");
    }

    #[tokio::test]
    async fn convert_without_document_keeps_state() {
        let app = test_app();
        let response = app.clone().oneshot(post("/convert")).await.expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let s = status_json(&app).await;
        assert_eq!(s["session"]["state"], "NoDocument");
        assert!(s["session"]["notice"]["message"]
            .as_str()
            .unwrap()
            .contains("Upload"));
    }

    #[tokio::test]
    async fn convert_again_without_pdf_is_rejected_with_notice() {
        let app = test_app();
        app.clone()
            .oneshot(upload_request("notes.md", "# Notes"))
            .await
            .expect("response");

        let response = app
            .clone()
            .oneshot(post("/convert-again"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let s = status_json(&app).await;
        assert_eq!(s["session"]["state"], "DocumentReady");
        assert_eq!(s["session"]["notice"]["level"], "error");
        assert!(s["session"]["notice"]["message"]
            .as_str()
            .unwrap()
            .contains("no PDF"));
    }

    #[test]
    fn base_name_strips_client_paths() {
        assert_eq!(base_name("C:\\Users\\me\\notes.md"), "notes.md");
        assert_eq!(base_name("/home/me/notes.md"), "notes.md");
        assert_eq!(base_name("notes.md"), "notes.md");
        assert_eq!(base_name(""), "");
    }
}
