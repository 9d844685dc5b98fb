use kernel::FileRecord;
use thiserror::Error;

/// Error taxonomy of the file registry.
///
/// `NotFound` deliberately covers both "no such record" and "record owned
/// by someone else" so existence never leaks across owners.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Record absent or not visible to the caller.
    #[error("file not found")]
    NotFound,

    /// Malformed request field.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Local blob read/write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote blob fetch failure.
    #[error("fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Underlying metadata store failure.
    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for RegistryError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => RegistryError::NotFound,
            other => RegistryError::Database(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Input of the registration operation. `favourite`, `deleted` and the
/// timestamps are assigned by the registry itself.
pub struct NewFileRecord {
    pub name: String,
    pub storage_ref: String,
    pub size: i64,
    pub folder_id: Option<i64>,
}

/// Authoritative mapping from file identifier to [`FileRecord`].
///
/// Every operation takes the caller's owner id explicitly and only ever
/// sees that owner's records. Mutations are atomic read-modify-writes.
pub trait Registry {
    fn new_database(&self) -> Result<()>;

    fn register(&mut self, owner: &str, file: NewFileRecord) -> Result<FileRecord>;

    fn list(&mut self, owner: &str, folder: Option<i64>) -> Result<Vec<FileRecord>>;

    fn list_deleted(&mut self, owner: &str, folder: Option<i64>) -> Result<Vec<FileRecord>>;

    fn find(&mut self, owner: &str, id: i64) -> Result<FileRecord>;

    fn rename(&mut self, owner: &str, id: i64, new_name: &str) -> Result<FileRecord>;

    fn toggle_favourite(&mut self, owner: &str, id: i64) -> Result<FileRecord>;

    fn soft_delete(&mut self, owner: &str, id: i64) -> Result<()>;

    fn restore(&mut self, owner: &str, id: i64) -> Result<()>;

    fn purge(&mut self, owner: &str, id: i64) -> Result<()>;

    fn search_by_name(&mut self, owner: &str, query: &str) -> Result<Vec<FileRecord>>;
}
