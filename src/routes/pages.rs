//! HTML pages

use axum::response::Html;

const UPLOAD_PAGE: &str = include_str!("../../templates/upload.html");

/// GET /upload
pub async fn upload_page() -> Html<&'static str> {
    Html(UPLOAD_PAGE)
}
