//! Allocation note endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use granite_core::models::AllocationNote;

use crate::auth::ActingUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::resource_for_allocation;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct NoteResponse {
    pub id: Uuid,
    pub allocation_id: Uuid,
    pub author: String,
    pub note: String,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AllocationNote> for NoteResponse {
    fn from(n: AllocationNote) -> Self {
        Self {
            id: n.id,
            allocation_id: n.allocation_id,
            author: n.author,
            note: n.note,
            is_private: n.is_private,
            created_at: n.created_at,
            updated_at: n.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateNoteRequest {
    #[validate(length(min = 1, message = "Note must not be empty"))]
    pub note: String,
    #[serde(default)]
    pub is_private: bool,
}

#[utoipa::path(
    post,
    path = "/api/v0/allocations/{allocation_id}/notes",
    tag = "notes",
    params(("allocation_id" = Uuid, Path, description = "Allocation id")),
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note created", body = NoteResponse),
        (status = 403, description = "Private notes are reviewer-only", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_note(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateNoteRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if req.is_private {
        let resource = resource_for_allocation(&state, allocation_id).await?;
        acting.require_reviewer(&resource)?;
    } else {
        // Existence check so non-reviewers still get a 404 for bad ids.
        state.allocations.load_allocation(allocation_id).await?;
    }
    let note = state
        .notes
        .create(&acting.username, allocation_id, &req.note, req.is_private)
        .await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(NoteResponse::from(note)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v0/allocations/{allocation_id}/notes",
    tag = "notes",
    params(("allocation_id" = Uuid, Path, description = "Allocation id")),
    responses(
        (status = 200, description = "Notes, newest first; private notes only for reviewers", body = [NoteResponse])
    )
)]
pub async fn list_notes(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(allocation_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let resource = resource_for_allocation(&state, allocation_id).await?;
    let include_private = acting.can_review(&resource);
    let notes = state.notes.list(allocation_id, include_private).await?;
    let body: Vec<NoteResponse> = notes.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateNoteRequest {
    #[validate(length(min = 1, message = "Note must not be empty"))]
    pub note: String,
    pub is_private: bool,
}

#[utoipa::path(
    put,
    path = "/api/v0/notes/{note_id}",
    tag = "notes",
    params(("note_id" = Uuid, Path, description = "Note id")),
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Note updated", body = NoteResponse),
        (status = 403, description = "Not an administrator", body = crate::error::ErrorResponse),
        (status = 404, description = "Note not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_note(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(note_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateNoteRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    acting.require_superuser()?;
    let note = state.notes.update(note_id, &req.note, req.is_private).await?;
    Ok(Json(NoteResponse::from(note)))
}

#[utoipa::path(
    delete,
    path = "/api/v0/notes/{note_id}",
    tag = "notes",
    params(("note_id" = Uuid, Path, description = "Note id")),
    responses(
        (status = 204, description = "Note deleted"),
        (status = 403, description = "Not an administrator", body = crate::error::ErrorResponse),
        (status = 404, description = "Note not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_note(
    acting: ActingUser,
    State(state): State<Arc<AppState>>,
    Path(note_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    acting.require_superuser()?;
    state.notes.delete(&acting.username, note_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
