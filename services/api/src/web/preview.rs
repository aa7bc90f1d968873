//! services/api/src/web/preview.rs
//!
//! Serves the before/after sample pair shown on the landing page.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::web::state::AppState;

pub const BEFORE_SAMPLE: &str = "before.png";
pub const AFTER_SAMPLE: &str = "after.png";

#[derive(Serialize, ToSchema)]
pub struct PreviewResponse {
    /// `data:` URI of the unrestored sample.
    pub before: String,
    /// `data:` URI of the restored sample.
    pub after: String,
}

/// Get the before/after sample images.
#[utoipa::path(
    get,
    path = "/preview",
    responses(
        (status = 200, description = "Both sample images as data URIs", body = PreviewResponse),
        (status = 500, description = "A sample image is missing")
    )
)]
pub async fn preview_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let dir = &state.config.samples_path;
    let before = load_sample(&dir.join(BEFORE_SAMPLE)).await?;
    let after = load_sample(&dir.join(AFTER_SAMPLE)).await?;
    Ok(Json(PreviewResponse { before, after }))
}

async fn load_sample(path: &Path) -> Result<String, (StatusCode, String)> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        error!("Failed to read sample image {}: {:?}", path.display(), e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "sample image missing".to_string(),
        )
    })?;
    Ok(data_uri(&bytes))
}

pub fn data_uri(bytes: &[u8]) -> String {
    let mime = image::guess_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_uses_detected_mime_type() {
        let png_magic = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        assert!(data_uri(&png_magic).starts_with("data:image/png;base64,"));
        assert!(data_uri(b"plain").starts_with("data:application/octet-stream;base64,"));
    }
}
