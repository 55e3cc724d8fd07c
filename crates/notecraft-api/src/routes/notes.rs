//! Notes CRUD endpoints. Every handler runs behind `require_principal`.

use axum::{body::Bytes, extract::Path, http::StatusCode, Json};
use notecraft_core::{Note, NoteInput};
use serde::Serialize;

use crate::error::{ApiError, Result};
use crate::session::Notes;

#[derive(Debug, Serialize)]
pub struct NotesResponse {
    pub notes: Vec<Note>,
}

#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub note: Note,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// Parse a note body as JSON whatever its declared content type.
fn parse_input(body: &[u8]) -> Result<NoteInput> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Rejected note body: {}", e);
        ApiError::BadRequest
    })
}

/// GET /api/notes
pub async fn list(Notes(notes): Notes) -> Result<Json<NotesResponse>> {
    let notes = notes.list().await?;
    Ok(Json(NotesResponse { notes }))
}

/// GET /api/notes/{id}
pub async fn get(Notes(notes): Notes, Path(id): Path<String>) -> Result<Json<NoteResponse>> {
    let note = notes.get(&id).await?;
    Ok(Json(NoteResponse { note }))
}

/// POST /api/notes
pub async fn create(
    Notes(notes): Notes,
    body: Bytes,
) -> Result<(StatusCode, Json<NoteResponse>)> {
    let input = parse_input(&body)?;
    let note = notes.create(&input).await?;
    Ok((StatusCode::CREATED, Json(NoteResponse { note })))
}

/// PUT /api/notes/{id}
pub async fn update(
    Notes(notes): Notes,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<NoteResponse>> {
    let input = parse_input(&body)?;
    let note = notes.update(&id, &input).await?;
    Ok(Json(NoteResponse { note }))
}

/// DELETE /api/notes/{id}
///
/// Succeeds whether or not an owned note matched.
pub async fn delete(Notes(notes): Notes, Path(id): Path<String>) -> Result<Json<DeleteResponse>> {
    notes.delete(&id).await?;
    Ok(Json(DeleteResponse { success: true }))
}
