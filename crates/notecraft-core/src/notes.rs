//! Notes resource service.
//!
//! Persistence is delegated to the provider, but the ownership predicate lives
//! here: every query is scoped by `user_id` equal to the resolved principal, and
//! every insert stamps it. A note owned by someone else is indistinguishable from
//! one that does not exist.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::principal::Principal;
use crate::provider::{ProviderClient, ProviderError, TableQuery};

/// Default table holding notes.
pub const NOTES_TABLE: &str = "notes";

/// Owner column used by the ownership predicate.
const OWNER_COLUMN: &str = "user_id";

#[derive(Debug, Error)]
pub enum NotesError {
    #[error("Note not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Upstream(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, NotesError>;

/// A stored note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-supplied fields for create and update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl NoteInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: Some(content.into()),
        }
    }

    /// Trim both fields; a title that trims to nothing is rejected.
    fn normalize(&self) -> Result<(String, String)> {
        let title = self.title.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() {
            return Err(NotesError::Validation("Title is required".to_string()));
        }
        let content = self.content.as_deref().map(str::trim).unwrap_or_default();
        Ok((title.to_string(), content.to_string()))
    }
}

/// Note operations on behalf of one principal.
pub struct NotesService {
    client: Arc<dyn ProviderClient>,
    owner: Principal,
    table: String,
}

impl NotesService {
    pub fn new(client: Arc<dyn ProviderClient>, owner: Principal) -> Self {
        Self {
            client,
            owner,
            table: NOTES_TABLE.to_string(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn owner(&self) -> &Principal {
        &self.owner
    }

    fn owned(&self) -> TableQuery {
        TableQuery::table(self.table.as_str()).eq(OWNER_COLUMN, self.owner.id.as_str())
    }

    fn owned_by_id(&self, id: &str) -> TableQuery {
        TableQuery::table(self.table.as_str())
            .eq("id", id)
            .eq(OWNER_COLUMN, self.owner.id.as_str())
    }

    /// All notes owned by the principal, most recent first.
    pub async fn list(&self) -> Result<Vec<Note>> {
        let rows = self
            .client
            .select(&self.owned().order("created_at", false))
            .await?;
        rows.into_iter().map(decode).collect()
    }

    pub async fn get(&self, id: &str) -> Result<Note> {
        let rows = self
            .client
            .select(&self.owned_by_id(id))
            .await
            .map_err(not_found_on_rejection)?;
        rows.into_iter().next().map(decode).unwrap_or(Err(NotesError::NotFound))
    }

    pub async fn create(&self, input: &NoteInput) -> Result<Note> {
        let (title, content) = input.normalize()?;
        let row = self
            .client
            .insert(
                &self.table,
                json!({
                    OWNER_COLUMN: self.owner.id,
                    "title": title,
                    "content": content,
                }),
            )
            .await?;
        let note = decode(row)?;
        tracing::info!(note_id = %note.id, user_id = %self.owner.id, "Created note");
        Ok(note)
    }

    /// Replace title and content, refreshing `updated_at`.
    pub async fn update(&self, id: &str, input: &NoteInput) -> Result<Note> {
        let (title, content) = input.normalize()?;
        let patch = json!({
            "title": title,
            "content": content,
            "updated_at": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        });
        let rows = self
            .client
            .update(&self.owned_by_id(id), patch)
            .await
            .map_err(not_found_on_rejection)?;
        rows.into_iter().next().map(decode).unwrap_or(Err(NotesError::NotFound))
    }

    /// Remove the note if the principal owns it. Returns whether a row went away;
    /// callers report success either way. A provider failure is an error.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let removed = !self.client.delete(&self.owned_by_id(id)).await?.is_empty();
        if !removed {
            tracing::debug!(note_id = %id, user_id = %self.owner.id, "Delete matched no owned note");
        }
        Ok(removed)
    }
}

/// A refused lookup scoped by `(id, owner)` says nothing the caller may know.
fn not_found_on_rejection(err: ProviderError) -> NotesError {
    if err.is_client_error() {
        NotesError::NotFound
    } else {
        NotesError::Upstream(err)
    }
}

fn decode(row: Value) -> Result<Note> {
    serde_json::from_value(row).map_err(|e| ProviderError::Malformed(e.to_string()).into())
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
