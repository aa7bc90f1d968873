//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the restoration workflow and the master
//! definition for the OpenAPI specification.

use crate::web::middleware::persist;
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use restoration_core::domain::{
    BrowserSession, Operation, OperationCounts, PhotoKind, RestorationSession, RestoredImage,
    UploadedPhoto,
};
use restoration_core::ports::{PortError, StoryRequest};
use restoration_core::workflow::UploadOutcome;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::login_handler,
        crate::web::auth::callback_handler,
        crate::web::auth::logout_handler,
        crate::web::auth::me_handler,
        crate::web::preview::preview_handler,
        upload_handler,
        set_mode_handler,
        apply_operation_handler,
        story_handler,
        get_restoration_handler,
        discard_restoration_handler,
        current_image_handler,
        original_image_handler,
        history_image_handler,
    ),
    components(
        schemas(
            crate::web::auth::MeResponse,
            crate::web::preview::PreviewResponse,
            WorkflowState,
            RestorationSummary,
            OperationUsage,
            HistoryItem,
            StorySummary,
            UploadResponse,
            ModeRequest,
            OperationResponse,
            StoryBody,
            StoryResponse,
        )
    ),
    tags(
        (name = "Photo Restoration API", description = "Upload an old photo, restore it step by step and get its story.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Usage of one operation against the current cap.
#[derive(Serialize, ToSchema)]
pub struct OperationUsage {
    pub operation: String,
    pub used: u8,
    pub remaining: u8,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryItem {
    pub index: usize,
    pub operation: String,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct StorySummary {
    pub text: String,
    /// How often each operation had run when the story was written.
    pub steps: Vec<OperationUsage>,
    pub created_at: DateTime<Utc>,
}

/// The uploaded photo and everything done to it so far.
#[derive(Serialize, ToSchema)]
pub struct RestorationSummary {
    pub id: Uuid,
    pub file_name: String,
    pub photo_type: String,
    pub content_hash: String,
    pub width: u32,
    pub height: u32,
    pub usage: Vec<OperationUsage>,
    pub history: Vec<HistoryItem>,
    pub story: Option<StorySummary>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct WorkflowState {
    pub advanced_mode: bool,
    /// Uses allowed per operation in the current mode.
    pub limit: u8,
    pub restoration: Option<RestorationSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    /// One of `started`, `replaced` or `unchanged`.
    pub outcome: String,
    pub reset: bool,
    pub state: WorkflowState,
}

#[derive(Deserialize, ToSchema)]
pub struct ModeRequest {
    pub advanced: bool,
}

#[derive(Serialize, ToSchema)]
pub struct OperationResponse {
    pub operation: String,
    /// `false` when the operation had already reached its cap.
    pub applied: bool,
    pub state: WorkflowState,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct StoryBody {
    #[serde(default)]
    pub hint: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct StoryResponse {
    pub applied: bool,
    pub story: Option<String>,
    pub state: WorkflowState,
}

impl WorkflowState {
    pub fn from_session(session: &BrowserSession) -> Self {
        Self {
            advanced_mode: session.advanced_mode,
            limit: session.limits.cap(session.advanced_mode),
            restoration: session
                .restoration
                .as_ref()
                .map(|r| RestorationSummary::from_restoration(session, r)),
        }
    }
}

impl RestorationSummary {
    fn from_restoration(session: &BrowserSession, restoration: &RestorationSession) -> Self {
        let (width, height) = restoration.current_dimensions();
        Self {
            id: restoration.id,
            file_name: restoration.file_name.clone(),
            photo_type: restoration.photo_kind.slug().to_string(),
            content_hash: restoration.content_hash.clone(),
            width,
            height,
            usage: Operation::ALL
                .into_iter()
                .map(|op| OperationUsage {
                    operation: op.slug().to_string(),
                    used: restoration.counts.get(op),
                    remaining: session.remaining(op),
                })
                .collect(),
            history: restoration
                .history
                .iter()
                .enumerate()
                .map(|(index, entry)| HistoryItem {
                    index,
                    operation: entry.operation.slug().to_string(),
                    label: entry.label.clone(),
                    width: entry.width,
                    height: entry.height,
                    note: entry.note.clone(),
                    created_at: entry.created_at,
                })
                .collect(),
            story: restoration.story.as_ref().map(|story| StorySummary {
                text: story.text.clone(),
                steps: steps_taken(&story.counts_at_generation),
                created_at: story.created_at,
            }),
            created_at: restoration.created_at,
        }
    }
}

fn steps_taken(counts: &OperationCounts) -> Vec<OperationUsage> {
    Operation::ALL
        .into_iter()
        .filter(|op| op.is_image_operation())
        .map(|op| OperationUsage {
            operation: op.slug().to_string(),
            used: counts.get(op),
            remaining: 0,
        })
        .collect()
}

fn outcome_slug(outcome: UploadOutcome) -> &'static str {
    match outcome {
        UploadOutcome::Started => "started",
        UploadOutcome::Replaced => "replaced",
        UploadOutcome::Unchanged => "unchanged",
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Upload a photo to restore.
///
/// Accepts a multipart/form-data request with a `file` part and an optional
/// `photo_type` part (`monochrome` or `color`). Uploading the same bytes again
/// keeps all progress; a different photo starts over.
#[utoipa::path(
    post,
    path = "/restore/upload",
    request_body(content_type = "multipart/form-data", description = "The photo to restore."),
    responses(
        (status = 200, description = "Upload registered", body = UploadResponse),
        (status = 400, description = "Bad request (e.g., missing file)"),
        (status = 415, description = "Unsupported or undecodable image"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(mut session): Extension<BrowserSession>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut photo_kind = PhotoKind::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("photo").to_string();
                let data = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read file bytes: {}", e),
                    )
                })?;
                file = Some((file_name, data.to_vec()));
            }
            Some("photo_type") => {
                let text = field.text().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read photo_type: {}", e),
                    )
                })?;
                photo_kind = text
                    .parse::<PhotoKind>()
                    .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
            }
            _ => {}
        }
    }

    let Some((file_name, bytes)) = file.filter(|(_, bytes)| !bytes.is_empty()) else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include a non-empty file".to_string(),
        ));
    };

    // Decoding is CPU-bound; keep it off the async workers.
    let filters = app_state.filters.clone();
    let (bytes, inspected) = tokio::task::spawn_blocking(move || {
        let inspected = filters.inspect(&bytes);
        (bytes, inspected)
    })
    .await
    .map_err(|e| {
        error!("Image inspection task failed: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to inspect image".to_string(),
        )
    })?;
    let (width, height) = inspected.map_err(|e| match e {
        PortError::InvalidInput(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg),
        other => {
            error!("Failed to inspect uploaded image: {:?}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to inspect image".to_string(),
            )
        }
    })?;

    let outcome = session.ingest_upload(UploadedPhoto {
        file_name,
        bytes,
        width,
        height,
        photo_kind,
    });
    info!(
        "Upload into session {}: {} ({}x{})",
        session.id,
        outcome_slug(outcome),
        width,
        height
    );

    let response = UploadResponse {
        outcome: outcome_slug(outcome).to_string(),
        reset: outcome.did_reset(),
        state: WorkflowState::from_session(&session),
    };
    persist(&app_state, session).await?;
    Ok(Json(response))
}

/// Switch between the basic and advanced caps.
#[utoipa::path(
    put,
    path = "/restore/mode",
    request_body = ModeRequest,
    responses(
        (status = 200, description = "Mode updated", body = WorkflowState),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn set_mode_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(mut session): Extension<BrowserSession>,
    Json(req): Json<ModeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    session.set_advanced_mode(req.advanced);
    let response = WorkflowState::from_session(&session);
    persist(&app_state, session).await?;
    Ok(Json(response))
}

/// Apply one restoration operation to the current image.
///
/// Once an operation has reached its cap the request succeeds with
/// `applied: false` and nothing changes.
#[utoipa::path(
    post,
    path = "/restore/operations/{operation}",
    params(
        ("operation" = String, Path, description = "`colorize`, `upscale` or `denoise`")
    ),
    responses(
        (status = 200, description = "Operation processed", body = OperationResponse),
        (status = 400, description = "Unknown operation"),
        (status = 409, description = "No photo uploaded yet"),
        (status = 422, description = "The image cannot be processed further"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn apply_operation_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(mut session): Extension<BrowserSession>,
    Path(operation): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let op = operation
        .parse::<Operation>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    if !op.is_image_operation() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Use POST /restore/story to generate a story".to_string(),
        ));
    }

    let cap = session.limit_for(op);
    let current = {
        let restoration = session.restoration.as_ref().ok_or_else(no_upload)?;
        if !restoration.can_apply(op, cap) {
            info!("{} already used {} time(s); skipping", op, cap);
            return Ok(Json(OperationResponse {
                operation: op.slug().to_string(),
                applied: false,
                state: WorkflowState::from_session(&session),
            }));
        }
        restoration.current_image().to_vec()
    };

    let restored = run_filter(&app_state, op, current).await?;
    let applied = session
        .restoration
        .as_mut()
        .map(|r| r.record_image(op, restored, cap))
        .unwrap_or(false);

    let response = OperationResponse {
        operation: op.slug().to_string(),
        applied,
        state: WorkflowState::from_session(&session),
    };
    persist(&app_state, session).await?;
    Ok(Json(response))
}

/// Write a short story about the current image.
#[utoipa::path(
    post,
    path = "/restore/story",
    request_body = StoryBody,
    responses(
        (status = 200, description = "Story processed", body = StoryResponse),
        (status = 409, description = "No photo uploaded yet"),
        (status = 502, description = "The story model failed"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn story_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(mut session): Extension<BrowserSession>,
    Json(body): Json<StoryBody>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let cap = session.limit_for(Operation::Story);

    let text = {
        let restoration = session.restoration.as_ref().ok_or_else(no_upload)?;
        if !restoration.can_apply(Operation::Story, cap) {
            return Ok(Json(StoryResponse {
                applied: false,
                story: restoration.story.as_ref().map(|s| s.text.clone()),
                state: WorkflowState::from_session(&session),
            }));
        }

        let request = StoryRequest {
            image: restoration.current_image(),
            photo_kind: restoration.photo_kind,
            counts: restoration.counts,
            hint: body.hint.as_deref(),
        };
        app_state
            .stories
            .generate_story(request)
            .await
            .map_err(|e| {
                error!("Failed to generate story: {:?}", e);
                let status = match e {
                    PortError::Upstream { .. } => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, "Failed to generate story".to_string())
            })?
    };

    let applied = session
        .restoration
        .as_mut()
        .map(|r| r.record_story(text.clone(), cap))
        .unwrap_or(false);

    let response = StoryResponse {
        applied,
        story: Some(text),
        state: WorkflowState::from_session(&session),
    };
    persist(&app_state, session).await?;
    Ok(Json(response))
}

/// Get the counters, caps, history and story for the current photo.
#[utoipa::path(
    get,
    path = "/restore",
    responses(
        (status = 200, description = "Current workflow state", body = WorkflowState)
    )
)]
pub async fn get_restoration_handler(
    Extension(session): Extension<BrowserSession>,
) -> impl IntoResponse {
    Json(WorkflowState::from_session(&session))
}

/// Discard the current photo and all progress on it.
#[utoipa::path(
    delete,
    path = "/restore",
    responses(
        (status = 204, description = "Restoration discarded"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn discard_restoration_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(mut session): Extension<BrowserSession>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if session.discard_restoration() {
        info!("Discarded the restoration of session {}", session.id);
    }
    persist(&app_state, session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Download the image the next operation will start from.
#[utoipa::path(
    get,
    path = "/restore/image/current",
    responses(
        (status = 200, description = "The current image", content_type = "image/png"),
        (status = 409, description = "No photo uploaded yet")
    )
)]
pub async fn current_image_handler(
    Extension(session): Extension<BrowserSession>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let restoration = session.restoration.as_ref().ok_or_else(no_upload)?;
    Ok(image_response(restoration.current_image().to_vec()))
}

/// Download the photo exactly as it was uploaded.
#[utoipa::path(
    get,
    path = "/restore/image/original",
    responses(
        (status = 200, description = "The uploaded image"),
        (status = 409, description = "No photo uploaded yet")
    )
)]
pub async fn original_image_handler(
    Extension(session): Extension<BrowserSession>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let restoration = session.restoration.as_ref().ok_or_else(no_upload)?;
    Ok(image_response(restoration.original.clone()))
}

/// Download the image produced by one history entry.
#[utoipa::path(
    get,
    path = "/restore/history/{index}/image",
    params(
        ("index" = usize, Path, description = "Zero-based position in the history")
    ),
    responses(
        (status = 200, description = "The snapshot", content_type = "image/png"),
        (status = 404, description = "No such history entry"),
        (status = 409, description = "No photo uploaded yet")
    )
)]
pub async fn history_image_handler(
    Extension(session): Extension<BrowserSession>,
    Path(index): Path<usize>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let restoration = session.restoration.as_ref().ok_or_else(no_upload)?;
    let entry = restoration.history_image(index).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("No history entry at index {}", index),
        )
    })?;
    Ok(image_response(entry.image.clone()))
}

//=========================================================================================
// Helpers
//=========================================================================================

fn no_upload() -> (StatusCode, String) {
    (
        StatusCode::CONFLICT,
        "Upload a photo before restoring it".to_string(),
    )
}

async fn run_filter(
    app_state: &AppState,
    op: Operation,
    image: Vec<u8>,
) -> Result<RestoredImage, (StatusCode, String)> {
    let filters = app_state.filters.clone();
    let result = tokio::task::spawn_blocking(move || filters.apply(op, &image))
        .await
        .map_err(|e| {
            error!("Filter task for {} failed: {:?}", op, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to {}", op),
            )
        })?;

    result.map_err(|e| match e {
        PortError::InvalidInput(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        other => {
            error!("Failed to {} image: {:?}", op, other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to {}", op),
            )
        }
    })
}

fn image_response(bytes: Vec<u8>) -> impl IntoResponse {
    let mime = image::guess_format(&bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");
    ([(header::CONTENT_TYPE, mime)], bytes)
}
