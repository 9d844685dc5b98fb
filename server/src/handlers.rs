#![allow(clippy::unused_async)]
use crate::blob;
use crate::domain::{NewFileRecord, Registry, RegistryError};
use crate::file_reply::FileReply;
use crate::sqlite::{Mode, Sqlite};
use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{Stream, TryStreamExt};
use futures_util::StreamExt;
use kernel::{FileRecord, RegisterRemoteFile, RenameFile};
use serde::Deserialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::io::StreamReader;

use axum::{
    extract::{Multipart, Path},
    http::StatusCode,
};

/// Shared handler state: metadata database path, uploads directory and
/// the HTTP client used for remote reads.
pub struct AppState {
    pub db: PathBuf,
    pub uploads: PathBuf,
    pub http: reqwest::Client,
}

#[derive(Deserialize)]
pub struct FolderQuery {
    folder: Option<i64>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = match &self {
            RegistryError::NotFound => StatusCode::NOT_FOUND,
            RegistryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RegistryError::Io(_) | RegistryError::Fetch(_) | RegistryError::Database(_) => {
                tracing::error!("{self}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

/// Uploads several files from a multipart form for an owner.
#[utoipa::path(
    post,
    path = "/api/{owner}/files",
    responses(
        (status = 201, description = "Files registered successfully", body = [FileRecord]),
        (status = 500, description = "Server error", body = String)
    ),
    tag = "files",
    params(
        ("owner" = String, Path, description = "Owner id"),
        ("folder" = Option<i64>, Query, description = "Folder to place the files into")
    ),
)]
pub async fn upload_many_from_form(
    Path(owner): Path<String>,
    Query(query): Query<FolderQuery>,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, RegistryError> {
    tracing::info!("upload into owner space: {owner}");

    // Bytes are written before any metadata is persisted; a failed write
    // leaves no record behind.
    let mut stored: Vec<NewFileRecord> = vec![];
    while let Ok(Some(field)) = multipart.next_field().await {
        let file_name = field.file_name().unwrap_or_default().to_string();
        let (data, read_bytes) = read_from_stream(field).await?;
        let storage_ref = blob::store(&state.uploads, &file_name, &data).await?;
        tracing::info!("file: {file_name} read: {read_bytes}");
        stored.push(NewFileRecord {
            name: file_name,
            storage_ref,
            size: i64::try_from(data.len()).unwrap_or(i64::MAX),
            folder_id: query.folder,
        });
    }

    let records = execute(&state, Mode::ReadWrite, move |mut repository| {
        let mut records = Vec::with_capacity(stored.len());
        for file in stored {
            records.push(repository.register(&owner, file)?);
        }
        Ok(records)
    })?;

    Ok(created(Json(records)))
}

/// Uploads a single file from a raw request body.
#[utoipa::path(
    post,
    path = "/api/{owner}/files/{file_name}",
    tag = "files",
    responses(
        (status = 201, description = "File registered successfully", body = FileRecord),
        (status = 400, description = "Invalid input", body = String),
        (status = 500, description = "Server error", body = String)
    ),
    params(
        ("owner" = String, Path, description = "Owner id"),
        ("file_name" = String, Path, description = "Display name of the uploaded file"),
        ("folder" = Option<i64>, Query, description = "Folder to place the file into")
    ),
)]
pub async fn upload_file(
    Path((owner, file_name)): Path<(String, String)>,
    Query(query): Query<FolderQuery>,
    State(state): State<Arc<AppState>>,
    body: Body,
) -> Result<impl IntoResponse, RegistryError> {
    let (data, read_bytes) = read_from_stream(body.into_data_stream()).await?;
    let storage_ref = blob::store(&state.uploads, &file_name, &data).await?;
    tracing::info!("file: {file_name} read: {read_bytes}");

    let record = execute(&state, Mode::ReadWrite, move |mut repository| {
        repository.register(
            &owner,
            NewFileRecord {
                name: file_name,
                storage_ref,
                size: i64::try_from(data.len()).unwrap_or(i64::MAX),
                folder_id: query.folder,
            },
        )
    })?;

    Ok(created(Json(record)))
}

/// Registers a file whose bytes live behind a remote URL.
#[utoipa::path(
    post,
    path = "/api/{owner}/remote",
    tag = "files",
    responses(
        (status = 201, description = "Remote file registered successfully", body = FileRecord),
        (status = 400, description = "Invalid input", body = String),
        (status = 500, description = "Server error", body = String)
    ),
    params(
        ("owner" = String, Path, description = "Owner id")
    ),
)]
pub async fn register_remote(
    Path(owner): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRemoteFile>,
) -> Result<impl IntoResponse, RegistryError> {
    let parsed = url::Url::parse(&request.url)
        .map_err(|e| RegistryError::InvalidInput(format!("malformed url: {e}")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(RegistryError::InvalidInput(format!(
            "unsupported url scheme: {}",
            parsed.scheme()
        )));
    }

    let record = execute(&state, Mode::ReadWrite, move |mut repository| {
        repository.register(
            &owner,
            NewFileRecord {
                name: request.name,
                storage_ref: request.url,
                size: request.size,
                folder_id: request.folder_id,
            },
        )
    })?;

    Ok(created(Json(record)))
}

/// Lists an owner's active (non-trashed) files.
#[utoipa::path(
    get,
    path = "/api/{owner}/files",
    responses(
        (status = 200, description = "Active files listed successfully", body = [FileRecord]),
    ),
    tag = "files",
    params(
        ("owner" = String, Path, description = "Owner id"),
        ("folder" = Option<i64>, Query, description = "Restrict listing to one folder")
    ),
)]
pub async fn list_files(
    Path(owner): Path<String>,
    Query(query): Query<FolderQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, RegistryError> {
    let records = execute(&state, Mode::ReadOnly, move |mut repository| {
        repository.list(&owner, query.folder)
    })?;
    Ok(Json(records))
}

/// Lists an owner's trashed files.
#[utoipa::path(
    get,
    path = "/api/{owner}/trash",
    responses(
        (status = 200, description = "Trashed files listed successfully", body = [FileRecord]),
    ),
    tag = "trash",
    params(
        ("owner" = String, Path, description = "Owner id"),
        ("folder" = Option<i64>, Query, description = "Restrict listing to one folder")
    ),
)]
pub async fn list_trash(
    Path(owner): Path<String>,
    Query(query): Query<FolderQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, RegistryError> {
    let records = execute(&state, Mode::ReadOnly, move |mut repository| {
        repository.list_deleted(&owner, query.folder)
    })?;
    Ok(Json(records))
}

/// Searches an owner's active files by name, case-insensitive substring
/// match. An empty query matches everything.
#[utoipa::path(
    get,
    path = "/api/{owner}/search",
    responses(
        (status = 200, description = "Matching files listed successfully", body = [FileRecord]),
    ),
    tag = "files",
    params(
        ("owner" = String, Path, description = "Owner id"),
        ("q" = Option<String>, Query, description = "Substring to match against file names")
    ),
)]
pub async fn search_files(
    Path(owner): Path<String>,
    Query(query): Query<SearchQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, RegistryError> {
    let records = execute(&state, Mode::ReadOnly, move |mut repository| {
        repository.search_by_name(&owner, query.q.as_deref().unwrap_or_default())
    })?;
    Ok(Json(records))
}

/// Gets file binary content. Remote references are fetched over HTTP,
/// local ones read from disk.
#[utoipa::path(
    get,
    path = "/api/{owner}/file/{id}",
    responses(
        (status = 200, description = "File binary content", body = Vec<u8>, content_type = "application/octet-stream"),
        (status = 404, description = "File not found", body = String)
    ),
    tag = "files",
    params(
        ("owner" = String, Path, description = "Owner id"),
        ("id" = i64, Path, description = "File id")
    ),
)]
pub async fn get_file_content(
    Path((owner, id)): Path<(String, i64)>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, RegistryError> {
    let record = execute(&state, Mode::ReadOnly, move |mut repository| {
        repository.find(&owner, id)
    })?;

    let content = blob::fetch(&state.http, &record).await?;
    tracing::info!("file {} size {}", record.id, content.len());

    Ok(FileReply::new(content, record))
}

/// Gets a file's metadata record.
#[utoipa::path(
    get,
    path = "/api/{owner}/file/{id}/meta",
    responses(
        (status = 200, body = FileRecord),
        (status = 404, description = "File not found", body = String)
    ),
    tag = "files",
    params(
        ("owner" = String, Path, description = "Owner id"),
        ("id" = i64, Path, description = "File id")
    ),
)]
pub async fn get_file_meta(
    Path((owner, id)): Path<(String, i64)>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, RegistryError> {
    let record = execute(&state, Mode::ReadOnly, move |mut repository| {
        repository.find(&owner, id)
    })?;
    Ok(Json(record))
}

/// Renames a file. Only the display name changes, never the stored bytes.
#[utoipa::path(
    put,
    path = "/api/{owner}/file/{id}/name",
    responses(
        (status = 200, description = "File renamed successfully", body = FileRecord),
        (status = 400, description = "Invalid input", body = String),
        (status = 404, description = "File not found", body = String)
    ),
    tag = "files",
    params(
        ("owner" = String, Path, description = "Owner id"),
        ("id" = i64, Path, description = "File id")
    ),
)]
pub async fn rename_file(
    Path((owner, id)): Path<(String, i64)>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<RenameFile>,
) -> Result<impl IntoResponse, RegistryError> {
    let record = execute(&state, Mode::ReadWrite, move |mut repository| {
        repository.rename(&owner, id, &request.new_name)
    })?;
    tracing::info!("file {} renamed", record.id);
    Ok(Json(record))
}

/// Flips a file's favourite flag.
#[utoipa::path(
    post,
    path = "/api/{owner}/file/{id}/favourite",
    responses(
        (status = 200, description = "Favourite flag toggled", body = FileRecord),
        (status = 404, description = "File not found", body = String)
    ),
    tag = "files",
    params(
        ("owner" = String, Path, description = "Owner id"),
        ("id" = i64, Path, description = "File id")
    ),
)]
pub async fn toggle_favourite(
    Path((owner, id)): Path<(String, i64)>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, RegistryError> {
    let record = execute(&state, Mode::ReadWrite, move |mut repository| {
        repository.toggle_favourite(&owner, id)
    })?;
    Ok(Json(record))
}

/// Moves a file to the trash. Idempotent.
#[utoipa::path(
    delete,
    path = "/api/{owner}/file/{id}",
    responses(
        (status = 204, description = "File moved to trash"),
        (status = 404, description = "File not found", body = String)
    ),
    tag = "trash",
    params(
        ("owner" = String, Path, description = "Owner id"),
        ("id" = i64, Path, description = "File id")
    ),
)]
pub async fn soft_delete_file(
    Path((owner, id)): Path<(String, i64)>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, RegistryError> {
    execute(&state, Mode::ReadWrite, move |mut repository| {
        repository.soft_delete(&owner, id)
    })?;
    tracing::info!("file {id} trashed");
    Ok(StatusCode::NO_CONTENT)
}

/// Restores a file from the trash. Idempotent.
#[utoipa::path(
    post,
    path = "/api/{owner}/file/{id}/restore",
    responses(
        (status = 204, description = "File restored from trash"),
        (status = 404, description = "File not found", body = String)
    ),
    tag = "trash",
    params(
        ("owner" = String, Path, description = "Owner id"),
        ("id" = i64, Path, description = "File id")
    ),
)]
pub async fn restore_file(
    Path((owner, id)): Path<(String, i64)>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, RegistryError> {
    execute(&state, Mode::ReadWrite, move |mut repository| {
        repository.restore(&owner, id)
    })?;
    tracing::info!("file {id} restored");
    Ok(StatusCode::NO_CONTENT)
}

/// Permanently removes a file's metadata record. No tombstone is kept and
/// the id becomes unresolvable; the underlying bytes are left alone.
#[utoipa::path(
    delete,
    path = "/api/{owner}/file/{id}/purge",
    responses(
        (status = 204, description = "File purged"),
        (status = 404, description = "File not found", body = String)
    ),
    tag = "trash",
    params(
        ("owner" = String, Path, description = "Owner id"),
        ("id" = i64, Path, description = "File id")
    ),
)]
pub async fn purge_file(
    Path((owner, id)): Path<(String, i64)>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, RegistryError> {
    execute(&state, Mode::ReadWrite, move |mut repository| {
        repository.purge(&owner, id)
    })?;
    tracing::info!("file {id} purged");
    Ok(StatusCode::NO_CONTENT)
}

fn execute<F, R>(state: &AppState, mode: Mode, action: F) -> Result<R, RegistryError>
where
    F: FnOnce(Sqlite) -> Result<R, RegistryError>,
{
    let start = Instant::now();
    let repository = Sqlite::open(&state.db, mode)?;
    let result = action(repository);
    let duration = start.elapsed();
    tracing::info!("DB query time: {:?}", duration);
    result
}

fn created<S: IntoResponse>(s: S) -> (StatusCode, Response) {
    (StatusCode::CREATED, s.into_response())
}

async fn read_from_stream<S, E>(stream: S) -> io::Result<(Vec<u8>, usize)>
where
    S: Stream<Item = Result<Bytes, E>> + StreamExt,
    E: Sync + std::error::Error + Send + 'static,
{
    // Convert the stream into an `AsyncRead`.
    let body_with_io_error = stream.map_err(io::Error::other);
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);
    let mut buffer = Vec::new();

    let copied_bytes = tokio::io::copy(&mut body_reader, &mut buffer).await?;
    let copied_bytes = usize::try_from(copied_bytes).unwrap_or(usize::MAX);
    Ok((buffer, copied_bytes))
}
