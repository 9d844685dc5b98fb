#![warn(clippy::unwrap_in_result)]
#![warn(clippy::unwrap_used)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Metadata record of a single stored file.
///
/// A record belongs to exactly one owner and goes through the lifecycle
/// active -> trashed (soft delete) -> purged. The bytes themselves live
/// wherever `storage_ref` points; the record only describes them.
#[derive(Serialize, Deserialize, Clone, ToSchema)]
pub struct FileRecord {
    /// Unique numeric identifier, assigned at registration
    pub id: i64,
    /// Identifier of the owning account
    pub owner_id: String,
    /// Display name; the only field rename touches
    pub name: String,
    /// Local filesystem path or remote http(s) URL of the file bytes
    pub storage_ref: String,
    /// Byte length recorded at registration, never recomputed afterwards
    pub size: i64,
    /// Optional containing folder
    pub folder_id: Option<i64>,
    /// Favourite flag, independent of the lifecycle state
    pub favourite: bool,
    /// Soft-delete flag; trashed records stay restorable until purged
    pub deleted: bool,
    /// Set once at registration
    pub created_at: DateTime<Utc>,
    /// Touched by every mutation
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Whether reads of this record go over the network rather than the
    /// local filesystem.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.storage_ref.starts_with("http://") || self.storage_ref.starts_with("https://")
    }
}

/// Request body for registering a file whose bytes already live behind a
/// remote URL.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterRemoteFile {
    /// Display name for the new record
    pub name: String,
    /// Remote http(s) URL the bytes are fetched from on read
    pub url: String,
    /// Byte length as reported by the caller
    pub size: i64,
    /// Optional containing folder
    pub folder_id: Option<i64>,
}

/// Request body of the rename operation.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RenameFile {
    /// New display name
    pub new_name: String,
}
