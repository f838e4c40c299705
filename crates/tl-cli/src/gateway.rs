//! HTTP client for the remote AI service: classify, summarize, compress.
//!
//! Every operation is one request and one response. Nothing is retried and no
//! state is shared between calls beyond the connection pool, so concurrent
//! calls cannot interfere with each other.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tl_core::{ClassificationResult, CompressionResult, SummaryResult};
use tl_store::GatewayConfig;

pub const CLASSIFY_PATH: &str = "/api/classify";
pub const SUMMARIZE_PATH: &str = "/api/summarize";
pub const COMPRESS_PATH: &str = "/api/compress";

/// Multipart field the compress endpoint reads the upload from.
const IMAGE_FIELD: &str = "image";

/// Failures of a gateway call. A failed call never touches caller state.
#[derive(Debug)]
pub enum GatewayError {
    /// Transport failure (`status: None`) or a non-2xx reply.
    Request {
        endpoint: String,
        status: Option<u16>,
        detail: String,
    },
    /// The body did not have the expected shape.
    MalformedResponse { endpoint: String, detail: String },
    /// `compress` was called with no file; the network was not contacted.
    NoFileSelected,
    /// The call was abandoned through its cancellation token.
    Cancelled,
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Request {
                endpoint,
                status: Some(status),
                detail,
            } => write!(f, "{endpoint} returned HTTP {status}: {detail}"),
            GatewayError::Request {
                endpoint,
                status: None,
                detail,
            } => write!(f, "request to {endpoint} failed: {detail}"),
            GatewayError::MalformedResponse { endpoint, detail } => {
                write!(f, "malformed response from {endpoint}: {detail}")
            }
            GatewayError::NoFileSelected => write!(f, "Select an image first."),
            GatewayError::Cancelled => write!(f, "request cancelled"),
        }
    }
}

impl std::error::Error for GatewayError {}

/// An image chosen for upload.
#[derive(Clone, Debug)]
pub struct ImageFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl ImageFile {
    /// Read a file from disk, guessing its content type from the extension.
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            Some("gif") => "image/gif",
            Some("bmp") => "image/bmp",
            _ => "application/octet-stream",
        };
        Ok(Self {
            name,
            bytes,
            content_type: content_type.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for the three AI endpoints. Cheap to clone; clones share the pool.
#[derive(Clone, Debug)]
pub struct AiGateway {
    base_url: String,
    client: reqwest::Client,
}

impl AiGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| GatewayError::Request {
                endpoint: config.base_url.clone(),
                status: None,
                detail: e.to_string(),
            })?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Remote urgency classification. Empty text is sent as-is.
    ///
    /// # Returns
    /// - `Ok(ClassificationResult)` with the service's label, score and
    ///   matched terms, unmodified.
    /// - `Err(GatewayError::Request)` on transport failure or non-2xx.
    /// - `Err(GatewayError::MalformedResponse)` when `label`, `score` or
    ///   `matched` is missing or mistyped.
    pub async fn classify(&self, text: &str) -> Result<ClassificationResult, GatewayError> {
        let result: ClassificationResult = self.post_json(CLASSIFY_PATH, text).await?;
        if !result.score_in_range() {
            warn!(score = result.score, "classifier score outside [0, 1]");
        }
        Ok(result)
    }

    /// Remote extractive summary. Blank text short-circuits to an empty
    /// summary without a request.
    pub async fn summarize(&self, text: &str) -> Result<SummaryResult, GatewayError> {
        if text.trim().is_empty() {
            debug!("summarize: blank input, returning empty summary");
            return Ok(SummaryResult::empty());
        }
        self.post_json(SUMMARIZE_PATH, text).await
    }

    /// Upload one image and return the recompressed payload in full.
    ///
    /// The first file is sent; any others are ignored. An empty selection
    /// fails with [`GatewayError::NoFileSelected`] before any I/O.
    pub async fn compress(&self, files: &[ImageFile]) -> Result<CompressionResult, GatewayError> {
        let Some(file) = files.first() else {
            return Err(GatewayError::NoFileSelected);
        };
        if files.len() > 1 {
            warn!(
                selected = files.len(),
                "compress: only the first file is uploaded"
            );
        }

        let url = self.url(COMPRESS_PATH);
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| GatewayError::Request {
                endpoint: COMPRESS_PATH.to_string(),
                status: None,
                detail: e.to_string(),
            })?;
        let form = reqwest::multipart::Form::new().part(IMAGE_FIELD, part);

        debug!(url = %url, bytes = file.bytes.len(), "POST compress");
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(COMPRESS_PATH, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_error(COMPRESS_PATH, resp).await);
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        // Buffer the whole body; no partial results.
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| transport_error(COMPRESS_PATH, e))?;
            bytes.extend_from_slice(&chunk);
        }
        debug!(bytes = bytes.len(), content_type = %content_type, "compress done");

        Ok(CompressionResult {
            bytes,
            content_type,
        })
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &'static str,
        text: &str,
    ) -> Result<T, GatewayError> {
        let url = self.url(path);
        debug!(url = %url, chars = text.chars().count(), "POST");
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;

        if !resp.status().is_success() {
            return Err(status_error(path, resp).await);
        }

        let bytes = resp.bytes().await.map_err(|e| transport_error(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::MalformedResponse {
            endpoint: path.to_string(),
            detail: e.to_string(),
        })
    }
}

fn transport_error(path: &str, e: reqwest::Error) -> GatewayError {
    GatewayError::Request {
        endpoint: path.to_string(),
        status: None,
        detail: e.to_string(),
    }
}

/// Shape a non-2xx reply. The body is read as `{error}` JSON best-effort;
/// anything else becomes `"unknown"`.
async fn status_error(path: &str, resp: reqwest::Response) -> GatewayError {
    let status = resp.status().as_u16();
    let detail = match resp.bytes().await {
        Ok(body) => match serde_json::from_slice::<ErrorBody>(&body) {
            Ok(ErrorBody { error }) => error,
            Err(e) => {
                warn!(endpoint = path, status, "unreadable error body: {e}");
                "unknown".to_string()
            }
        },
        Err(e) => {
            warn!(endpoint = path, status, "error body not received: {e}");
            "unknown".to_string()
        }
    };
    GatewayError::Request {
        endpoint: path.to_string(),
        status: Some(status),
        detail,
    }
}

/// Race `fut` against `token`. Once the token fires the call resolves to
/// [`GatewayError::Cancelled`] and its eventual result is dropped.
pub async fn with_cancel<T, F>(token: &CancellationToken, fut: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(GatewayError::Cancelled),
        result = fut => result,
    }
}

/// Run a one-shot gateway call under a token that fires on Ctrl-C.
pub async fn interruptible<T, F>(fut: F) -> std::result::Result<T, GatewayError>
where
    F: std::future::Future<Output = std::result::Result<T, GatewayError>>,
{
    let token = CancellationToken::new();
    let trigger = token.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    let result = with_cancel(&token, fut).await;
    watcher.abort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::body::Bytes;
    use axum::http::{StatusCode, header};
    use axum::routing::post;

    fn jpeg_bytes() -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4, 0xFF, 0xD9]
    }

    /// Stub AI service on an ephemeral port. Every request bumps `hits`.
    ///
    /// `/api/*` behaves; `/bad/api/*` returns error JSON or malformed bodies;
    /// `/broken/api/compress` fails with a non-JSON body.
    async fn spawn_stub() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        let classify = post(move |_body: Bytes| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                axum::Json(serde_json::json!({
                    "label": "urgent",
                    "score": 0.92,
                    "matched": ["trapped"],
                }))
            }
        });

        let h = hits.clone();
        let summarize = post(move |_body: Bytes| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                axum::Json(serde_json::json!({
                    "summary": "Bridge out. Shelter open.",
                    "sentences": ["Bridge out.", "Shelter open."],
                }))
            }
        });

        let h = hits.clone();
        let compress = post(move |body: Bytes| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                let has_field = body
                    .windows(b"name=\"image\"".len())
                    .any(|w| w == b"name=\"image\"");
                if has_field {
                    (
                        StatusCode::OK,
                        [(header::CONTENT_TYPE, "image/jpeg")],
                        jpeg_bytes(),
                    )
                } else {
                    (
                        StatusCode::BAD_REQUEST,
                        [(header::CONTENT_TYPE, "application/json")],
                        br#"{"error":"no image bytes provided"}"#.to_vec(),
                    )
                }
            }
        });

        let h = hits.clone();
        let bad_classify = post(move |_body: Bytes| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                axum::Json(serde_json::json!({ "label": "urgent" }))
            }
        });

        let h = hits.clone();
        let bad_summarize = post(move |_body: Bytes| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                (
                    StatusCode::BAD_REQUEST,
                    axum::Json(serde_json::json!({ "error": "missing text" })),
                )
            }
        });

        let h = hits.clone();
        let bad_compress = post(move |_body: Bytes| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                (
                    StatusCode::BAD_REQUEST,
                    axum::Json(serde_json::json!({ "error": "unsupported image" })),
                )
            }
        });

        let h = hits.clone();
        let broken_compress = post(move |_body: Bytes| {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                (StatusCode::INTERNAL_SERVER_ERROR, "Traceback (most recent call last)")
            }
        });

        let app = Router::new()
            .route(CLASSIFY_PATH, classify)
            .route(SUMMARIZE_PATH, summarize)
            .route(COMPRESS_PATH, compress)
            .route("/bad/api/classify", bad_classify)
            .route("/bad/api/summarize", bad_summarize)
            .route("/bad/api/compress", bad_compress)
            .route("/broken/api/compress", broken_compress);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), hits)
    }

    fn gateway(base_url: &str) -> AiGateway {
        AiGateway::new(&GatewayConfig {
            base_url: base_url.to_string(),
            connect_timeout_ms: 1_000,
            request_timeout_ms: 5_000,
        })
        .unwrap()
    }

    fn image() -> ImageFile {
        ImageFile {
            name: "photo.png".into(),
            bytes: vec![0x89, b'P', b'N', b'G', 0, 0, 0, 0],
            content_type: "image/png".into(),
        }
    }

    #[tokio::test]
    async fn test_classify_returns_service_result_unchanged() {
        let (base, hits) = spawn_stub().await;
        let result = gateway(&base).classify("trapped under debris").await.unwrap();
        assert_eq!(
            result,
            ClassificationResult {
                label: "urgent".into(),
                score: 0.92,
                matched: vec!["trapped".into()],
            }
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_classify_empty_text_is_sent() {
        let (base, hits) = spawn_stub().await;
        assert!(gateway(&base).classify("").await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_classify_missing_fields_is_malformed() {
        let (base, _) = spawn_stub().await;
        let err = gateway(&format!("{base}/bad")).classify("x").await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_summarize_with_sentences() {
        let (base, _) = spawn_stub().await;
        let s = gateway(&base).summarize("Bridge out. Shelter open.").await.unwrap();
        assert_eq!(s.summary, "Bridge out. Shelter open.");
        assert_eq!(s.sentences.len(), 2);
    }

    #[tokio::test]
    async fn test_summarize_blank_skips_network() {
        let (base, hits) = spawn_stub().await;
        let s = gateway(&base).summarize("   ").await.unwrap();
        assert!(s.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_summarize_error_status() {
        let (base, _) = spawn_stub().await;
        let err = gateway(&format!("{base}/bad"))
            .summarize("something")
            .await
            .unwrap_err();
        match err {
            GatewayError::Request { status, detail, .. } => {
                assert_eq!(status, Some(400));
                assert_eq!(detail, "missing text");
            }
            other => panic!("expected request error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_compress_no_file_makes_no_request() {
        let (base, hits) = spawn_stub().await;
        let err = gateway(&base).compress(&[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoFileSelected));
        assert_eq!(err.to_string(), "Select an image first.");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_compress_returns_full_payload() {
        let (base, hits) = spawn_stub().await;
        let out = gateway(&base).compress(&[image()]).await.unwrap();
        assert_eq!(out.bytes, jpeg_bytes());
        assert_eq!(out.content_type, "image/jpeg");
        assert_eq!(out.extension(), "jpg");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_compress_uploads_only_first_file() {
        let (base, hits) = spawn_stub().await;
        let out = gateway(&base).compress(&[image(), image()]).await.unwrap();
        assert!(!out.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_compress_error_json_surfaces() {
        let (base, _) = spawn_stub().await;
        let err = gateway(&format!("{base}/bad"))
            .compress(&[image()])
            .await
            .unwrap_err();
        match err {
            GatewayError::Request { status, detail, .. } => {
                assert_eq!(status, Some(400));
                assert_eq!(detail, "unsupported image");
            }
            other => panic!("expected request error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_compress_unparseable_error_becomes_unknown() {
        let (base, _) = spawn_stub().await;
        let err = gateway(&format!("{base}/broken"))
            .compress(&[image()])
            .await
            .unwrap_err();
        match err {
            GatewayError::Request { status, detail, .. } => {
                assert_eq!(status, Some(500));
                assert_eq!(detail, "unknown");
            }
            other => panic!("expected request error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_is_request_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = gateway(&format!("http://{addr}"))
            .classify("help")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Request { status: None, .. }));
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let (base, hits) = spawn_stub().await;
        let gw = gateway(&base);
        let images = [image()];
        let (c, s, x) = tokio::join!(
            gw.classify("fire"),
            gw.summarize("One. Two."),
            gw.compress(&images),
        );
        assert_eq!(c.unwrap().label, "urgent");
        assert_eq!(s.unwrap().sentences.len(), 2);
        assert_eq!(x.unwrap().content_type, "image/jpeg");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_call_resolves_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<(), GatewayError> =
            with_cancel(&token, std::future::pending::<Result<(), GatewayError>>()).await;
        assert!(matches!(result, Err(GatewayError::Cancelled)));
    }

    #[tokio::test]
    async fn test_uncancelled_call_passes_through() {
        let (base, _) = spawn_stub().await;
        let token = CancellationToken::new();
        let gw = gateway(&base);
        let result = with_cancel(&token, gw.classify("help")).await.unwrap();
        assert_eq!(result.matched, vec!["trapped".to_string()]);
    }

    #[tokio::test]
    async fn test_image_file_read_guesses_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Scene.JPG");
        std::fs::write(&path, jpeg_bytes()).unwrap();
        let file = ImageFile::read(&path).await.unwrap();
        assert_eq!(file.name, "Scene.JPG");
        assert_eq!(file.content_type, "image/jpeg");
        assert_eq!(file.bytes.len(), 10);
    }
}
