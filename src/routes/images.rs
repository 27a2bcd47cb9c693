//! Image extraction routes
//!
//! Endpoints:
//! - POST /images - Upload a PDF, extract its images, return download URLs

use std::path::{Path, PathBuf};

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{megabytes, AppError, Result};
use crate::state::AppState;

/// Slack on top of the file size cap for multipart boundaries and headers
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// ============================================================================
// Types
// ============================================================================

/// Download URLs keyed by role
#[derive(Debug, Serialize)]
pub struct ImageUrls {
    #[serde(rename = "user-image")]
    pub user_image: String,

    #[serde(rename = "sign-image", skip_serializing_if = "Option::is_none")]
    pub sign_image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<ImageUrls>,
}

/// The accepted `file` field
struct Upload {
    file_name: String,
    data: axum::body::Bytes,
}

// ============================================================================
// Router
// ============================================================================

/// Create the images router
pub fn router(max_file_size: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/images", post(upload_images))
        .layer(DefaultBodyLimit::max(body_limit))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /images
///
/// Accept a PDF in the `file` field, extract its images, and map the
/// first and last to the user and signature roles.
async fn upload_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ExtractResponse>> {
    let config = state.config();
    let upload = read_upload(&mut multipart, config.upload.max_file_size).await?;
    validate_upload(&upload, config)?;

    let staged = stage_upload(&config.storage.upload_dir, &upload.data).await?;

    tracing::info!(
        file_name = %upload.file_name,
        size = upload.data.len(),
        staged = %staged.display(),
        "PDF staged for extraction"
    );

    let extractor = state.extractor().clone();
    let images_dir = config.storage.images_dir.clone();
    let pdf_path = staged.clone();
    let extracted =
        tokio::task::spawn_blocking(move || extractor.extract(&pdf_path, &images_dir)).await;

    remove_staged(&staged).await;

    let files = extracted.map_err(|e| AppError::Internal(format!("Extraction task failed: {}", e)))?;

    if files.is_empty() {
        return Ok(Json(ExtractResponse {
            message: "No Images Found In The PDF".to_string(),
            images: None,
        }));
    }

    let base_url = base_url(config, &headers);
    let images = role_urls(&files, &base_url);

    Ok(Json(ExtractResponse {
        message: "Images extracted successfully".to_string(),
        images,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Find the `file` field and read it, stopping at the size cap
async fn read_upload(multipart: &mut Multipart, max_file_size: u64) -> Result<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::from_multipart(e, max_file_size))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(AppError::NoSelectedFile);
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::from_multipart(e, max_file_size))?;

        tracing::debug!(file_name = %file_name, size = data.len(), "Received upload");
        return Ok(Upload { file_name, data });
    }

    tracing::warn!("No file field found in multipart upload");
    Err(AppError::NoFilePart)
}

fn validate_upload(upload: &Upload, config: &Config) -> Result<()> {
    let max = config.upload.max_file_size;
    if upload.data.len() as u64 > max {
        return Err(AppError::FileTooLarge {
            limit_mb: megabytes(max),
        });
    }

    let allowed = upload
        .file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .is_some_and(|ext| config.upload.allowed_extensions.contains(&ext));
    if !allowed {
        return Err(AppError::InvalidFileType(upload.file_name.clone()));
    }

    Ok(())
}

/// Write the upload under a random name; a failed write leaves nothing behind
async fn stage_upload(upload_dir: &Path, data: &[u8]) -> Result<PathBuf> {
    let staged = staged_path(upload_dir);
    if let Err(e) = tokio::fs::write(&staged, data).await {
        remove_staged(&staged).await;
        return Err(e.into());
    }
    Ok(staged)
}

async fn remove_staged(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::error!(path = %path.display(), "Failed to delete staged PDF: {}", e);
        }
    }
}

/// Externally reachable base URL for download links
fn base_url(config: &Config, headers: &HeaderMap) -> String {
    if let Some(url) = &config.server.public_url {
        return url.clone();
    }

    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{}", host),
        None => format!("http://{}:{}", config.server.host, config.server.port),
    }
}

/// First file is the user image; the last one, if distinct, the signature
fn role_urls(files: &[String], base_url: &str) -> Option<ImageUrls> {
    let url = |name: &String| format!("{}/images/{}", base_url, name);

    let first = files.first()?;
    let sign_image = match files.last() {
        Some(last) if files.len() > 1 => Some(url(last)),
        _ => None,
    };

    Some(ImageUrls {
        user_image: url(first),
        sign_image,
    })
}

/// Random staging file under `upload_dir`
fn staged_path(upload_dir: &Path) -> PathBuf {
    upload_dir.join(format!("{}.pdf", Uuid::new_v4()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ImageExtractor;
    use crate::test_support::{jpeg_bytes, TestImage, TestPdf};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use serde_json::Value;
    use tempfile::TempDir;

    struct Harness {
        server: TestServer,
        config: Config,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.server.public_url = Some("http://localhost:5000".to_string());
        config.storage.upload_dir = dir.path().join("uploads");
        config.storage.images_dir = dir.path().join("images");
        config.ensure_dirs().unwrap();

        let state = AppState::new(config.clone(), ImageExtractor::new());
        let server = TestServer::new(crate::routes::router(state)).unwrap();

        Harness {
            server,
            config,
            _dir: dir,
        }
    }

    fn pdf_form(file_name: &str, data: Vec<u8>) -> MultipartForm {
        MultipartForm::new().add_part(
            "file",
            Part::bytes(data)
                .file_name(file_name)
                .mime_type("application/pdf"),
        )
    }

    fn dir_count(path: &Path) -> usize {
        std::fs::read_dir(path).unwrap().count()
    }

    #[tokio::test]
    async fn test_two_jpegs_map_to_roles() {
        let h = harness();
        let pdf = TestPdf::new()
            .page(vec![
                TestImage::jpeg(jpeg_bytes([230, 180, 140])),
                TestImage::jpeg(jpeg_bytes([15, 15, 60])),
            ])
            .to_bytes();

        let response = h.server.post("/images").multipart(pdf_form("form.pdf", pdf)).await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["message"], "Images extracted successfully");

        let user = body["images"]["user-image"].as_str().unwrap();
        let sign = body["images"]["sign-image"].as_str().unwrap();
        assert!(user.starts_with("http://localhost:5000/images/user-img-"));
        assert!(sign.starts_with("http://localhost:5000/images/sign-img-"));
        assert!(user.ends_with(".jpg") && sign.ends_with(".jpg"));

        assert_eq!(dir_count(&h.config.storage.images_dir), 2);
        assert_eq!(dir_count(&h.config.storage.upload_dir), 0);
    }

    #[tokio::test]
    async fn test_sign_image_is_last_result() {
        let h = harness();
        let pdf = TestPdf::new()
            .page(vec![
                TestImage::jpeg(jpeg_bytes([255, 0, 0])),
                TestImage::jpeg(jpeg_bytes([0, 255, 0])),
                TestImage::jpeg(jpeg_bytes([0, 0, 255])),
            ])
            .to_bytes();

        let response = h.server.post("/images").multipart(pdf_form("three.pdf", pdf)).await;

        assert_eq!(dir_count(&h.config.storage.images_dir), 3);
        let body: Value = response.json();
        let sign = body["images"]["sign-image"].as_str().unwrap();
        let name = sign.rsplit('/').next().unwrap();
        assert!(!name.starts_with("sign-img-"));
        assert!(h.config.storage.images_dir.join(name).exists());
    }

    #[tokio::test]
    async fn test_single_image_has_no_sign_role() {
        let h = harness();
        let pdf = TestPdf::new()
            .page(vec![TestImage::jpeg(jpeg_bytes([50, 60, 70]))])
            .to_bytes();

        let response = h.server.post("/images").multipart(pdf_form("one.PDF", pdf)).await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert!(body["images"]["user-image"].is_string());
        assert!(body["images"].get("sign-image").is_none());
    }

    #[tokio::test]
    async fn test_no_images_found() {
        let h = harness();
        let pdf = TestPdf::new().page(vec![]).to_bytes();

        let response = h.server.post("/images").multipart(pdf_form("blank.pdf", pdf)).await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["message"], "No Images Found In The PDF");
        assert!(body.get("images").is_none());
        assert_eq!(dir_count(&h.config.storage.upload_dir), 0);
    }

    #[tokio::test]
    async fn test_corrupt_pdf_reports_no_images() {
        let h = harness();

        let response = h
            .server
            .post("/images")
            .multipart(pdf_form("broken.pdf", b"garbage bytes".to_vec()))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["message"], "No Images Found In The PDF");
        assert_eq!(dir_count(&h.config.storage.upload_dir), 0);
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let h = harness();
        let data = vec![b'%'; 3 * 1024 * 1024];

        let response = h.server.post("/images").multipart(pdf_form("big.pdf", data)).await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["message"], "File Size Exceeds 2 MB Limit");
        assert_eq!(dir_count(&h.config.storage.upload_dir), 0);
        assert_eq!(dir_count(&h.config.storage.images_dir), 0);
    }

    #[tokio::test]
    async fn test_just_over_limit_rejected() {
        let h = harness();
        let data = vec![0u8; 2 * 1024 * 1024 + 1];

        let response = h.server.post("/images").multipart(pdf_form("edge.pdf", data)).await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "file_too_large");
    }

    #[tokio::test]
    async fn test_text_file_rejected() {
        let h = harness();
        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"hello".to_vec())
                .file_name("notes.txt")
                .mime_type("text/plain"),
        );

        let response = h.server.post("/images").multipart(form).await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["message"], "Invalid File Type");
        assert_eq!(dir_count(&h.config.storage.upload_dir), 0);
    }

    #[tokio::test]
    async fn test_missing_file_part() {
        let h = harness();
        let form = MultipartForm::new().add_text("comment", "no file here");

        let response = h.server.post("/images").multipart(form).await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["message"], "No file Part");
    }

    #[tokio::test]
    async fn test_file_part_without_name() {
        let h = harness();
        let form = MultipartForm::new().add_part("file", Part::bytes(b"%PDF".to_vec()));

        let response = h.server.post("/images").multipart(form).await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["message"], "No Selected File");
    }

    #[tokio::test]
    async fn test_staging_failure_returns_error() {
        let h = harness();
        std::fs::remove_dir_all(&h.config.storage.upload_dir).unwrap();
        let pdf = TestPdf::new()
            .page(vec![TestImage::jpeg(jpeg_bytes([120, 30, 200]))])
            .to_bytes();

        let response = h.server.post("/images").multipart(pdf_form("lost.pdf", pdf)).await;

        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!h.config.storage.upload_dir.exists());
        assert_eq!(dir_count(&h.config.storage.images_dir), 0);
    }

    #[tokio::test]
    async fn test_stage_upload_cleans_up_failed_write() {
        let dir = TempDir::new().unwrap();
        let staged = stage_upload(dir.path(), b"%PDF-1.5").await.unwrap();
        assert_eq!(std::fs::read(&staged).unwrap(), b"%PDF-1.5");
        assert!(staged.extension().is_some_and(|ext| ext == "pdf"));

        let missing = dir.path().join("gone");
        assert!(stage_upload(&missing, b"%PDF-1.5").await.is_err());
        assert_eq!(dir_count(dir.path()), 1);
    }

    #[test]
    fn test_role_urls() {
        let files = vec!["user-img-a.jpg".to_string(), "sign-img-b.png".to_string()];
        let urls = role_urls(&files, "http://example.test").unwrap();
        assert_eq!(urls.user_image, "http://example.test/images/user-img-a.jpg");
        assert_eq!(
            urls.sign_image.as_deref(),
            Some("http://example.test/images/sign-img-b.png")
        );
        assert!(role_urls(&[], "http://example.test").is_none());
    }

    #[test]
    fn test_base_url_from_host_header() {
        let config = Config::default();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "api.example.test:8080".parse().unwrap());
        assert_eq!(base_url(&config, &headers), "http://api.example.test:8080");
        assert_eq!(base_url(&config, &HeaderMap::new()), "http://0.0.0.0:5000");
    }
}
