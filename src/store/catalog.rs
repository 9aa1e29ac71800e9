use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{types::Type, Connection, Row};
use tracing::debug;
use uuid::Uuid;

use super::asset::AssetRecord;
use crate::error::Result;

/// The Catalog manages the SQLite database of asset records.
///
/// It owns one connection. Background units of work (an import run, a
/// deletion) open their own `Catalog` from the same path instead of sharing
/// this connection across threads; WAL journaling lets those connections
/// commit concurrently.
pub struct Catalog {
    conn: Connection,
    db_path: PathBuf,
}

impl Catalog {
    /// Open the catalog at `db_path`, creating the file and schema if needed.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        // Import and deletion may commit from separate connections.
        conn.busy_timeout(Duration::from_secs(5))?;

        let catalog = Catalog {
            conn,
            db_path: db_path.to_path_buf(),
        };
        catalog.init_schema()?;

        debug!(path = %catalog.db_path.display(), "catalog opened");
        Ok(catalog)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS assets (
                id                  TEXT PRIMARY KEY,
                display_name        TEXT NOT NULL,
                stored_file_name    TEXT NOT NULL UNIQUE,
                imported_at         INTEGER NOT NULL
            )",
            [],
        )?;

        // Newest-first is the only ordering the grid asks for.
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_assets_imported_at
             ON assets(imported_at DESC)",
            [],
        )?;

        Ok(())
    }

    /// Get the path to the database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Get a count of assets in the catalog.
    pub fn asset_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM assets", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Insert the records from one import run in a single transaction.
    ///
    /// All-or-nothing for the records themselves; files that were already
    /// moved stay moved regardless of how the commit goes.
    pub fn insert_assets(&mut self, records: &[AssetRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO assets (id, display_name, stored_file_name, imported_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for record in records {
                stmt.execute(rusqlite::params![
                    record.id.to_string(),
                    record.display_name,
                    record.stored_file_name,
                    record.imported_at,
                ])?;
            }
        }
        tx.commit()?;

        debug!(count = records.len(), "asset records committed");
        Ok(())
    }

    /// Get all assets, ordered by import date (newest first).
    pub fn all_assets(&self) -> Result<Vec<AssetRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, display_name, stored_file_name, imported_at
             FROM assets ORDER BY imported_at DESC, stored_file_name",
        )?;

        let rows = stmt.query_map([], row_to_record)?;

        let mut assets = Vec::new();
        for asset in rows {
            assets.push(asset?);
        }
        Ok(assets)
    }

    /// Look up a single asset by id.
    pub fn asset(&self, id: Uuid) -> Result<Option<AssetRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, display_name, stored_file_name, imported_at
             FROM assets WHERE id = ?1",
        )?;

        let mut rows = stmt.query_map([id.to_string()], row_to_record)?;
        match rows.next() {
            Some(record) => Ok(Some(record?)),
            None => Ok(None),
        }
    }

    /// Change an asset's user-facing name. Returns false for an unknown id.
    pub fn rename_asset(&self, id: Uuid, display_name: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE assets SET display_name = ?1 WHERE id = ?2",
            rusqlite::params![display_name, id.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// Delete the given assets and return the records that were removed.
    ///
    /// The transaction is committed before this returns, so by the time the
    /// caller sees the deleted records they are durably gone from the
    /// catalog. File and thumbnail cleanup happens strictly after that,
    /// never before: a crash in between leaves an orphan file, which is
    /// recoverable, while the reverse order could delete a file whose
    /// record deletion then fails to commit.
    pub fn delete_assets(&mut self, ids: &[Uuid]) -> Result<Vec<AssetRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.conn.transaction()?;
        let mut deleted = Vec::new();
        {
            let mut select = tx.prepare(
                "SELECT id, display_name, stored_file_name, imported_at
                 FROM assets WHERE id = ?1",
            )?;
            let mut delete = tx.prepare("DELETE FROM assets WHERE id = ?1")?;

            for id in ids {
                let id_text = id.to_string();
                let mut rows = select.query_map([&id_text], row_to_record)?;
                if let Some(record) = rows.next() {
                    deleted.push(record?);
                    drop(rows);
                    delete.execute([&id_text])?;
                }
            }
        }
        tx.commit()?;

        debug!(count = deleted.len(), "asset records deleted");
        Ok(deleted)
    }
}

/// Map one `assets` row onto an [`AssetRecord`].
fn row_to_record(row: &Row<'_>) -> rusqlite::Result<AssetRecord> {
    let id_text: String = row.get(0)?;
    let id = Uuid::parse_str(&id_text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

    Ok(AssetRecord {
        id,
        display_name: row.get(1)?,
        stored_file_name: row.get(2)?,
        imported_at: row.get(3)?,
    })
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("db_path", &self.db_path)
            .finish()
    }
}
