use std::path::Path;

use chrono::Utc;
use kernel::FileRecord;

use crate::domain::Result;

/// Writes uploaded bytes into the uploads directory and returns the
/// storage reference to persist. The stored filename is prefixed with the
/// current millisecond timestamp so repeated uploads of the same name
/// never collide; path separators from client-supplied names are
/// flattened.
pub async fn store(uploads: &Path, file_name: &str, data: &[u8]) -> Result<String> {
    tokio::fs::create_dir_all(uploads).await?;
    let safe_name = file_name.replace(['/', '\\'], "_");
    let path = uploads.join(format!("{}_{safe_name}", Utc::now().timestamp_millis()));
    tokio::fs::write(&path, data).await?;
    Ok(path.to_string_lossy().into_owned())
}

/// Reads the full byte content a record points at: an HTTP GET for remote
/// references, a filesystem read otherwise.
pub async fn fetch(http: &reqwest::Client, record: &FileRecord) -> Result<Vec<u8>> {
    if record.is_remote() {
        let response = http
            .get(&record.storage_ref)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    } else {
        Ok(tokio::fs::read(&record.storage_ref).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_fetch_round_trip() {
        // Arrange
        let uploads = std::env::temp_dir().join("cloudstore_blob_test");
        let http = reqwest::Client::new();

        // Act
        let storage_ref = store(&uploads, "hello.txt", b"hello").await.unwrap();
        let record = kernel::FileRecord {
            id: 1,
            owner_id: "1".to_owned(),
            name: "hello.txt".to_owned(),
            storage_ref: storage_ref.clone(),
            size: 5,
            folder_id: None,
            favourite: false,
            deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let content = fetch(&http, &record).await.unwrap();

        // Assert
        assert_eq!(content, b"hello");
        assert!(!storage_ref.contains('\\'));
        tokio::fs::remove_file(&storage_ref).await.unwrap_or_default();
    }

    #[tokio::test]
    async fn nested_client_name_is_flattened() {
        // Arrange
        let uploads = std::env::temp_dir().join("cloudstore_blob_test");

        // Act
        let storage_ref = store(&uploads, "d1/f1.txt", b"x").await.unwrap();

        // Assert
        assert!(storage_ref.ends_with("_d1_f1.txt"));
        tokio::fs::remove_file(&storage_ref).await.unwrap_or_default();
    }

    #[tokio::test]
    async fn fetch_missing_local_file_is_io_error() {
        // Arrange
        let http = reqwest::Client::new();
        let record = kernel::FileRecord {
            id: 1,
            owner_id: "1".to_owned(),
            name: "gone".to_owned(),
            storage_ref: "/nonexistent/cloudstore/gone.bin".to_owned(),
            size: 0,
            folder_id: None,
            favourite: false,
            deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        // Act
        let result = fetch(&http, &record).await;

        // Assert
        assert!(matches!(result, Err(crate::domain::RegistryError::Io(_))));
    }
}
