//! SQLite-backed catalog of known titles.

use std::{fs, path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::{config::AppConfig, error::CatalogResult, models::GameRecord};

const SCHEMA: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;

    CREATE TABLE IF NOT EXISTS games (
        code TEXT PRIMARY KEY NOT NULL CHECK (code <> ''),
        title TEXT NOT NULL CHECK (title <> ''),
        alias TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_games_alias ON games(alias);
    CREATE INDEX IF NOT EXISTS idx_games_title ON games(title);
";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const COLUMNS: &str = "code, title, alias, created_at";

/// Shared handle to the catalog database.
#[derive(Clone)]
pub struct CatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogStore {
    /// Open the store selected by configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        if config.is_in_memory() {
            info!("using in-memory catalog");
            return Self::open_in_memory().context("failed to open in-memory catalog");
        }
        Self::open(&config.database_path)
    }

    /// Open (and create if needed) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open catalog {}", path.display()))?;
        info!(path = %path.display(), "catalog opened");
        Self::init(conn).with_context(|| format!("failed to initialise catalog {}", path.display()))
    }

    /// Open a transient store.
    pub fn open_in_memory() -> CatalogResult<Self> {
        Ok(Self::init(Connection::open_in_memory()?)?)
    }

    fn init(conn: Connection) -> rusqlite::Result<Self> {
        // Other processes or handles may hold the write lock.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Return the record for `code`, inserting it first when absent.
    ///
    /// Existing rows are never modified; the boolean reports whether a row was inserted.
    pub fn find_or_create(
        &self,
        code: &str,
        title: &str,
        alias: &str,
    ) -> CatalogResult<(GameRecord, bool)> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO games (code, title, alias, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(code) DO NOTHING",
            params![code, title, alias, Utc::now()],
        )?;
        let record = conn.query_row(
            &format!("SELECT {COLUMNS} FROM games WHERE code = ?1"),
            params![code],
            read_record,
        )?;
        Ok((record, inserted > 0))
    }

    /// Exact lookup by identifier.
    pub fn find_by_code(&self, code: &str) -> CatalogResult<Option<GameRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM games WHERE code = ?1"),
                params![code],
                read_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Case-insensitive substring search over titles, ordered by title.
    pub fn find_by_title_fragment(&self, fragment: &str) -> CatalogResult<Vec<GameRecord>> {
        let needle = GameRecord::alias_for(fragment.trim());
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM games WHERE instr(alias, ?1) > 0 ORDER BY title ASC, code ASC"
        ))?;
        let records = stmt
            .query_map(params![needle], read_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Every stored record, ordered by title.
    pub fn list_all(&self) -> CatalogResult<Vec<GameRecord>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {COLUMNS} FROM games ORDER BY title ASC, code ASC"))?;
        let records = stmt
            .query_map([], read_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Number of stored records.
    pub fn count(&self) -> CatalogResult<usize> {
        let conn = self.conn.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<GameRecord> {
    Ok(GameRecord {
        code: row.get(0)?,
        title: row.get(1)?,
        alias: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CatalogError, CatalogResult};
    use tempfile::tempdir;

    #[test]
    fn find_or_create_keeps_first_write() -> Result<()> {
        let store = CatalogStore::open_in_memory()?;
        let (first, created) = store.find_or_create("NPUB31419", "Minecraft", "minecraft")?;
        assert!(created);
        assert_eq!(first.title, "Minecraft");

        let (second, created) = store.find_or_create("NPUB31419", "Renamed", "renamed")?;
        assert!(!created);
        assert_eq!(second, first);
        assert_eq!(store.count()?, 1);
        Ok(())
    }

    #[test]
    fn title_search_is_case_insensitive_substring() -> Result<()> {
        let store = CatalogStore::open_in_memory()?;
        store.find_or_create("NPUB31419", "Minecraft", "minecraft")?;
        store.find_or_create("BLES01976", "Minecraft: Story Mode", "minecraft: story mode")?;
        store.find_or_create("NPEB00001", "Flower", "flower")?;

        let hits = store.find_by_title_fragment("mine")?;
        let codes: Vec<_> = hits.iter().map(|record| record.code.as_str()).collect();
        assert_eq!(codes, ["NPUB31419", "BLES01976"]);

        assert_eq!(store.find_by_title_fragment("MINE")?.len(), 2);
        assert_eq!(store.find_by_title_fragment("story")?.len(), 1);
        assert!(store.find_by_title_fragment("zelda")?.is_empty());
        Ok(())
    }

    #[test]
    fn fragment_wildcards_are_literal() -> Result<()> {
        let store = CatalogStore::open_in_memory()?;
        store.find_or_create("NPUB00001", "100% Orange Juice", "100% orange juice")?;
        store.find_or_create("NPUB00002", "Flower", "flower")?;

        assert_eq!(store.find_by_title_fragment("%")?.len(), 1);
        assert!(store.find_by_title_fragment("_")?.is_empty());
        Ok(())
    }

    #[test]
    fn concurrent_writers_on_separate_connections_insert_once() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("catalog.sqlite");
        let stores = [CatalogStore::open(&path)?, CatalogStore::open(&path)?];

        let results = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|worker| {
                    let store = &stores[worker % 2];
                    scope.spawn(move || {
                        let title = format!("Minecraft {worker}");
                        let alias = GameRecord::alias_for(&title);
                        store.find_or_create("NPUB31419", &title, &alias)
                    })
                })
                .collect();
            workers
                .into_iter()
                .map(|worker| worker.join().expect("worker panicked"))
                .collect::<CatalogResult<Vec<_>>>()
        })?;

        let first = &results[0].0;
        assert!(results.iter().all(|(record, _)| record == first));
        assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);
        assert_eq!(stores[0].count()?, 1);
        assert_eq!(stores[1].count()?, 1);
        Ok(())
    }

    #[test]
    fn list_is_ordered_by_title() -> Result<()> {
        let store = CatalogStore::open_in_memory()?;
        store.find_or_create("C", "Zeta", "zeta")?;
        store.find_or_create("A", "Alpha", "alpha")?;
        store.find_or_create("B", "Mu", "mu")?;

        let titles: Vec<_> = store.list_all()?.into_iter().map(|record| record.title).collect();
        assert_eq!(titles, ["Alpha", "Mu", "Zeta"]);
        Ok(())
    }

    #[test]
    fn find_by_code_is_exact() -> Result<()> {
        let store = CatalogStore::open_in_memory()?;
        store.find_or_create("NPUB31419", "Minecraft", "minecraft")?;
        assert!(store.find_by_code("NPUB31419")?.is_some());
        assert!(store.find_by_code("NPUB3141")?.is_none());
        Ok(())
    }

    #[test]
    fn empty_fields_are_rejected() -> Result<()> {
        let store = CatalogStore::open_in_memory()?;
        assert!(matches!(
            store.find_or_create("", "Title", "title"),
            Err(CatalogError::Storage(_))
        ));
        assert!(matches!(
            store.find_or_create("NPUB00001", "", ""),
            Err(CatalogError::Storage(_))
        ));
        assert_eq!(store.count()?, 0);
        Ok(())
    }

    #[test]
    fn records_persist_across_reopen() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("db").join("catalog.sqlite");
        {
            let store = CatalogStore::open(&path)?;
            store.find_or_create("NPUB31419", "Minecraft", "minecraft")?;
        }
        let reopened = CatalogStore::open(&path)?;
        let record = reopened.find_by_code("NPUB31419")?.expect("record survives reopen");
        assert_eq!(record.alias, "minecraft");
        Ok(())
    }
}
