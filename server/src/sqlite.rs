use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, Row, ToSql};

use crate::domain::{NewFileRecord, Registry, RegistryError, Result};

const CACHE_SIZE: &str = "4096";

const COLUMNS: &str =
    "id, owner_id, name, storage_ref, size, folder_id, favourite, deleted, created_at, updated_at";

pub enum Mode {
    ReadWrite,
    ReadOnly,
}

pub struct Sqlite {
    conn: Connection,
}

impl Registry for Sqlite {
    fn new_database(&self) -> Result<()> {
        self.pragma_update("encoding", "UTF-8")?;

        self.conn.execute(
            "CREATE TABLE file (
                  id           INTEGER PRIMARY KEY AUTOINCREMENT,
                  owner_id     TEXT NOT NULL,
                  name         TEXT NOT NULL,
                  storage_ref  TEXT NOT NULL,
                  size         INTEGER NOT NULL,
                  folder_id    INTEGER,
                  favourite    INTEGER NOT NULL DEFAULT 0,
                  deleted      INTEGER NOT NULL DEFAULT 0,
                  created_at   TEXT NOT NULL,
                  updated_at   TEXT NOT NULL
                  )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX owner_visibility_ix ON file(owner_id, deleted)",
            [],
        )?;

        Ok(())
    }

    fn register(&mut self, owner: &str, file: NewFileRecord) -> Result<kernel::FileRecord> {
        if file.name.trim().is_empty() {
            return Err(RegistryError::InvalidInput(
                "file name must not be empty".to_owned(),
            ));
        }

        let now = Utc::now();

        let tx = self.conn.transaction()?;
        tx.prepare_cached(
            "INSERT INTO file (owner_id, name, storage_ref, size, folder_id, favourite, deleted, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6, ?6)",
        )?
        .execute(params![
            owner,
            file.name,
            file.storage_ref,
            file.size,
            file.folder_id,
            now
        ])?;
        let id = tx.last_insert_rowid();
        let record = Self::query_record(&tx, owner, id)?;
        tx.commit()?;

        Ok(record)
    }

    fn list(&mut self, owner: &str, folder: Option<i64>) -> Result<Vec<kernel::FileRecord>> {
        match folder {
            Some(folder) => self.query_files(
                "owner_id = ?1 AND deleted = 0 AND folder_id = ?2",
                &[&owner, &folder],
            ),
            None => self.query_files("owner_id = ?1 AND deleted = 0", &[&owner]),
        }
    }

    fn list_deleted(
        &mut self,
        owner: &str,
        folder: Option<i64>,
    ) -> Result<Vec<kernel::FileRecord>> {
        match folder {
            Some(folder) => self.query_files(
                "owner_id = ?1 AND deleted = 1 AND folder_id = ?2",
                &[&owner, &folder],
            ),
            None => self.query_files("owner_id = ?1 AND deleted = 1", &[&owner]),
        }
    }

    fn find(&mut self, owner: &str, id: i64) -> Result<kernel::FileRecord> {
        Self::query_record(&self.conn, owner, id)
    }

    fn rename(&mut self, owner: &str, id: i64, new_name: &str) -> Result<kernel::FileRecord> {
        if new_name.trim().is_empty() {
            return Err(RegistryError::InvalidInput(
                "file name must not be empty".to_owned(),
            ));
        }

        let now = Utc::now();

        let tx = self.conn.transaction()?;
        let mut record = Self::query_record(&tx, owner, id)?;
        tx.execute(
            "UPDATE file SET name = ?1, updated_at = ?2 WHERE id = ?3 AND owner_id = ?4",
            params![new_name, now, id, owner],
        )?;
        tx.commit()?;

        record.name = new_name.to_owned();
        record.updated_at = now;
        Ok(record)
    }

    fn toggle_favourite(&mut self, owner: &str, id: i64) -> Result<kernel::FileRecord> {
        let now = Utc::now();

        let tx = self.conn.transaction()?;
        let mut record = Self::query_record(&tx, owner, id)?;
        let flipped = !record.favourite;
        tx.execute(
            "UPDATE file SET favourite = ?1, updated_at = ?2 WHERE id = ?3 AND owner_id = ?4",
            params![flipped, now, id, owner],
        )?;
        tx.commit()?;

        record.favourite = flipped;
        record.updated_at = now;
        Ok(record)
    }

    fn soft_delete(&mut self, owner: &str, id: i64) -> Result<()> {
        self.set_deleted(owner, id, true)
    }

    fn restore(&mut self, owner: &str, id: i64) -> Result<()> {
        self.set_deleted(owner, id, false)
    }

    fn purge(&mut self, owner: &str, id: i64) -> Result<()> {
        let affected = self.conn.execute(
            "DELETE FROM file WHERE id = ?1 AND owner_id = ?2",
            params![id, owner],
        )?;
        if affected == 0 {
            Err(RegistryError::NotFound)
        } else {
            Ok(())
        }
    }

    fn search_by_name(&mut self, owner: &str, query: &str) -> Result<Vec<kernel::FileRecord>> {
        let files = self.query_files("owner_id = ?1 AND deleted = 0", &[&owner])?;
        let needle = query.to_lowercase();
        Ok(files
            .into_iter()
            .filter(|f| f.name.to_lowercase().contains(&needle))
            .collect())
    }
}

impl Sqlite {
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode) -> Result<Self> {
        let conn = match mode {
            Mode::ReadWrite => {
                let conn = Connection::open(path)?;
                conn.pragma_update(None, "cache_size", CACHE_SIZE)?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn
            }
            Mode::ReadOnly => {
                Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?
            }
        };
        Ok(Self { conn })
    }

    fn pragma_update(&self, name: &str, value: &str) -> Result<()> {
        self.conn.pragma_update(None, name, value)?;
        Ok(())
    }

    /// Idempotent lifecycle flag update: a record already in the target
    /// state is left completely untouched, including `updated_at`.
    fn set_deleted(&mut self, owner: &str, id: i64, deleted: bool) -> Result<()> {
        let now = Utc::now();

        let tx = self.conn.transaction()?;
        let record = Self::query_record(&tx, owner, id)?;
        if record.deleted != deleted {
            tx.execute(
                "UPDATE file SET deleted = ?1, updated_at = ?2 WHERE id = ?3 AND owner_id = ?4",
                params![deleted, now, id, owner],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn query_record(conn: &Connection, owner: &str, id: i64) -> Result<kernel::FileRecord> {
        let sql = format!("SELECT {COLUMNS} FROM file WHERE id = ?1 AND owner_id = ?2");
        conn.query_row(&sql, params![id, owner], Self::record_from_row)
            .map_err(RegistryError::from)
    }

    fn query_files(
        &self,
        filter: &str,
        parameters: &[&dyn ToSql],
    ) -> Result<Vec<kernel::FileRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM file WHERE {filter} ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(parameters, Self::record_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(RegistryError::from)
    }

    fn record_from_row(row: &Row<'_>) -> rusqlite::Result<kernel::FileRecord> {
        Ok(kernel::FileRecord {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            storage_ref: row.get(3)?,
            size: row.get(4)?,
            folder_id: row.get(5)?,
            favourite: row.get(6)?,
            deleted: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Sqlite {
        let conn = Connection::open_in_memory().unwrap();
        let sqlite = Sqlite { conn };
        sqlite.new_database().unwrap();
        sqlite
    }

    fn new_file(name: &str) -> NewFileRecord {
        NewFileRecord {
            name: name.to_owned(),
            storage_ref: format!("uploads/{name}"),
            size: 500,
            folder_id: None,
        }
    }

    #[test]
    fn register_sets_initial_flags() {
        // Arrange
        let mut registry = registry();

        // Act
        let record = registry.register("1", new_file("report.pdf")).unwrap();

        // Assert
        assert_eq!(record.name, "report.pdf");
        assert_eq!(record.owner_id, "1");
        assert!(!record.favourite);
        assert!(!record.deleted);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn register_empty_name_rejected() {
        // Arrange
        let mut registry = registry();

        // Act
        let result = registry.register("1", new_file("  "));

        // Assert
        assert!(matches!(result, Err(RegistryError::InvalidInput(_))));
        assert!(registry.list("1", None).unwrap().is_empty());
    }

    #[test]
    fn records_invisible_to_other_owners() {
        // Arrange
        let mut registry = registry();
        let record = registry.register("a", new_file("secret.bin")).unwrap();

        // Act & Assert
        assert!(registry.list("b", None).unwrap().is_empty());
        assert!(registry.search_by_name("b", "").unwrap().is_empty());
        assert!(matches!(
            registry.find("b", record.id),
            Err(RegistryError::NotFound)
        ));
        assert!(matches!(
            registry.rename("b", record.id, "stolen"),
            Err(RegistryError::NotFound)
        ));
        assert!(matches!(
            registry.purge("b", record.id),
            Err(RegistryError::NotFound)
        ));
        // still there for the real owner
        assert_eq!(registry.list("a", None).unwrap().len(), 1);
    }

    #[test]
    fn soft_delete_then_restore_round_trip() {
        // Arrange
        let mut registry = registry();
        let record = registry.register("1", new_file("a.txt")).unwrap();

        // Act
        registry.soft_delete("1", record.id).unwrap();

        // Assert
        assert!(registry.list("1", None).unwrap().is_empty());
        assert_eq!(registry.list_deleted("1", None).unwrap().len(), 1);

        // Act
        registry.restore("1", record.id).unwrap();

        // Assert
        assert_eq!(registry.list("1", None).unwrap().len(), 1);
        assert!(registry.list_deleted("1", None).unwrap().is_empty());
    }

    #[test]
    fn soft_delete_twice_is_noop() {
        // Arrange
        let mut registry = registry();
        let record = registry.register("1", new_file("a.txt")).unwrap();

        // Act
        registry.soft_delete("1", record.id).unwrap();
        let first = registry.find("1", record.id).unwrap().updated_at;
        registry.soft_delete("1", record.id).unwrap();
        let second = registry.find("1", record.id).unwrap().updated_at;

        // Assert
        assert_eq!(first, second);
    }

    #[test]
    fn purge_makes_id_unresolvable() {
        // Arrange
        let mut registry = registry();
        let record = registry.register("1", new_file("a.txt")).unwrap();
        registry.soft_delete("1", record.id).unwrap();

        // Act
        registry.purge("1", record.id).unwrap();

        // Assert
        assert!(registry.list_deleted("1", None).unwrap().is_empty());
        assert!(matches!(
            registry.find("1", record.id),
            Err(RegistryError::NotFound)
        ));
        assert!(matches!(
            registry.toggle_favourite("1", record.id),
            Err(RegistryError::NotFound)
        ));
    }

    #[test]
    fn purge_without_soft_delete_is_allowed() {
        // Arrange
        let mut registry = registry();
        let record = registry.register("1", new_file("a.txt")).unwrap();

        // Act
        let result = registry.purge("1", record.id);

        // Assert
        assert!(result.is_ok());
        assert!(registry.list("1", None).unwrap().is_empty());
    }

    #[test]
    fn toggle_favourite_twice_restores_flag() {
        // Arrange
        let mut registry = registry();
        let record = registry.register("1", new_file("a.txt")).unwrap();

        // Act
        let once = registry.toggle_favourite("1", record.id).unwrap();
        let twice = registry.toggle_favourite("1", record.id).unwrap();

        // Assert
        assert!(once.favourite);
        assert!(!twice.favourite);
    }

    #[test]
    fn rename_changes_name_only() {
        // Arrange
        let mut registry = registry();
        let record = registry.register("1", new_file("old.txt")).unwrap();

        // Act
        let renamed = registry.rename("1", record.id, "new.txt").unwrap();

        // Assert
        assert_eq!(renamed.name, "new.txt");
        assert_eq!(renamed.storage_ref, record.storage_ref);
        assert!(renamed.updated_at >= record.updated_at);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        // Arrange
        let mut registry = registry();
        registry.register("1", new_file("Report.PDF")).unwrap();
        registry.register("1", new_file("notes.txt")).unwrap();

        // Act
        let hits = registry.search_by_name("1", "report").unwrap();

        // Assert
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Report.PDF");
    }

    #[test]
    fn empty_search_query_equals_list() {
        // Arrange
        let mut registry = registry();
        registry.register("1", new_file("a.txt")).unwrap();
        let deleted = registry.register("1", new_file("b.txt")).unwrap();
        registry.soft_delete("1", deleted.id).unwrap();

        // Act
        let hits = registry.search_by_name("1", "").unwrap();
        let listed = registry.list("1", None).unwrap();

        // Assert
        assert_eq!(hits.len(), listed.len());
        assert_eq!(hits[0].id, listed[0].id);
    }

    #[test]
    fn folder_filter_applies_to_listings() {
        // Arrange
        let mut registry = registry();
        let mut in_folder = new_file("a.txt");
        in_folder.folder_id = Some(7);
        registry.register("1", in_folder).unwrap();
        registry.register("1", new_file("b.txt")).unwrap();

        // Act
        let filtered = registry.list("1", Some(7)).unwrap();
        let all = registry.list("1", None).unwrap();

        // Assert
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].folder_id, Some(7));
        assert_eq!(all.len(), 2);
    }
}
