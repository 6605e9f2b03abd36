//! SQLite storage layer for recorded run entries.
//!
//! Database schema:
//! - One .db file holding a single `run_statistics` table
//! - Columns: id, run_id, tier, wave, coins, cells, time_spent, notes,
//!   end_of_round, datetime_collected
//!
//! Every operation opens its own connection and closes it before returning.
//! Writes run inside a transaction that is rolled back on any error.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use log::{debug, error, info};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use super::models::{NewEntry, RunEntry};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS run_statistics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id INTEGER NOT NULL,
        tier INTEGER NOT NULL,
        wave INTEGER NOT NULL,
        coins REAL NOT NULL,
        cells INTEGER NOT NULL,
        time_spent INTEGER NOT NULL,
        notes TEXT,
        end_of_round INTEGER NOT NULL DEFAULT 0,
        datetime_collected TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_run_statistics_run
        ON run_statistics (run_id, datetime_collected);
";

const ENTRY_COLUMNS: &str = "id, run_id, tier, wave, coins, cells, time_spent, notes, \
                             end_of_round, datetime_collected";

/// Matches the newest entry of the outer row's run; ties go to the higher id
const LATEST_OF_RUN: &str = "r.id = (
        SELECT r2.id FROM run_statistics r2
        WHERE r2.run_id = r.run_id
        ORDER BY r2.datetime_collected DESC, r2.id DESC
        LIMIT 1
    )";

/// Parse a stored timestamp.
///
/// Entries written by this crate are RFC 3339; older databases store naive
/// UTC values such as `2024-11-02 18:04:11.123456`.
fn parse_timestamp(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
                .map(|naive| naive.and_utc())
        })
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Timestamp in a fixed-width form so lexical order matches time order
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn entry_from_row(row: &Row) -> rusqlite::Result<RunEntry> {
    let collected: String = row.get(9)?;
    Ok(RunEntry {
        id: row.get(0)?,
        run_id: row.get(1)?,
        tier: row.get(2)?,
        wave: row.get(3)?,
        coins: row.get(4)?,
        cells: row.get(5)?,
        time_spent: row.get(6)?,
        notes: row.get(7)?,
        end_of_round: row.get(8)?,
        datetime_collected: parse_timestamp(9, &collected)?,
    })
}

/// Storage interface for the run statistics database
pub struct Storage {
    db_path: PathBuf,
}

impl Storage {
    /// Create a Storage pointing at a database file; nothing is opened yet
    pub fn new(db_path: PathBuf) -> Self {
        Storage { db_path }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a connection, creating the file and table on first use
    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {parent:?}"))?;
        }
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open database: {:?}", self.db_path))?;
        conn.execute_batch(SCHEMA)
            .with_context(|| format!("Failed to initialize schema in {:?}", self.db_path))?;
        Ok(conn)
    }

    /// Run `op` in a transaction; any error rolls it back before returning
    fn write_tx<T>(
        &self,
        event: &str,
        op: impl FnOnce(&Transaction) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let started_at = Instant::now();
        let mut conn = self.open()?;
        let tx = conn
            .transaction()
            .with_context(|| format!("Failed to begin transaction for {event}"))?;

        match op(&tx) {
            Ok(value) => {
                tx.commit()
                    .with_context(|| format!("Failed to commit {event}"))?;
                debug!(
                    "event={event} module=storage status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                error!("event={event} module=storage status=error error={err}");
                if let Err(rollback_err) = tx.rollback() {
                    error!("event={event} module=storage status=rollback_failed error={rollback_err}");
                }
                Err(anyhow::Error::new(err).context(format!("{event} failed")))
            }
        }
    }

    /// Persist a new entry and return its id.
    ///
    /// A closing entry marks every entry of its run as ended in the same
    /// transaction.
    pub fn insert_entry(&self, entry: &NewEntry) -> Result<i64> {
        let collected = format_timestamp(Utc::now());
        let id = self.write_tx("entry_insert", |tx| {
            tx.execute(
                "INSERT INTO run_statistics
                    (run_id, tier, wave, coins, cells, time_spent, notes, end_of_round, datetime_collected)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.run_id,
                    entry.tier,
                    entry.wave,
                    entry.coins,
                    entry.cells,
                    entry.time_spent,
                    entry.normalized_notes(),
                    entry.end_of_round,
                    collected,
                ],
            )?;
            let id = tx.last_insert_rowid();
            if entry.end_of_round {
                tx.execute(
                    "UPDATE run_statistics SET end_of_round = 1 WHERE run_id = ?1",
                    [entry.run_id],
                )?;
            }
            Ok(id)
        })?;

        info!(
            "event=entry_insert module=storage status=ok id={id} run_id={} end_of_round={}",
            entry.run_id, entry.end_of_round
        );
        Ok(id)
    }

    pub fn fetch_entry_by_id(&self, id: i64) -> Result<Option<RunEntry>> {
        let conn = self.open()?;
        conn.query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM run_statistics WHERE id = ?1"),
            [id],
            entry_from_row,
        )
        .optional()
        .with_context(|| format!("Failed to fetch entry {id}"))
    }

    /// All entries in insertion order
    pub fn fetch_all_entries(&self) -> Result<Vec<RunEntry>> {
        let conn = self.open()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {ENTRY_COLUMNS} FROM run_statistics ORDER BY id"))?;
        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to fetch entries")?;
        Ok(entries)
    }

    /// Entries of one run, oldest first
    pub fn fetch_all_entries_for_run(&self, run_id: i64) -> Result<Vec<RunEntry>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM run_statistics
             WHERE run_id = ?1
             ORDER BY datetime_collected, id"
        ))?;
        let entries = stmt
            .query_map([run_id], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to fetch entries for run {run_id}"))?;
        Ok(entries)
    }

    /// Distinct run ids, ascending
    pub fn fetch_run_ids(&self) -> Result<Vec<i64>> {
        let conn = self.open()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT run_id FROM run_statistics ORDER BY run_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()
            .context("Failed to fetch run ids")?;
        Ok(ids)
    }

    /// The most recent entry of every run, ordered by run id
    pub fn fetch_latest_per_run(&self) -> Result<Vec<RunEntry>> {
        let conn = self.open()?;
        let columns = ENTRY_COLUMNS
            .split(", ")
            .map(|c| format!("r.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT {columns} FROM run_statistics r WHERE {LATEST_OF_RUN} ORDER BY r.run_id"
        ))?;
        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to fetch latest entries per run")?;
        Ok(entries)
    }

    /// Tier of a run, taken from its first entry
    pub fn get_run_tier(&self, run_id: i64) -> Result<Option<i64>> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT tier FROM run_statistics WHERE run_id = ?1
             ORDER BY datetime_collected, id LIMIT 1",
            [run_id],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to fetch tier for run {run_id}"))
    }

    /// Whether a run has ended; unknown runs have not
    pub fn get_run_status(&self, run_id: i64) -> Result<bool> {
        let conn = self.open()?;
        let ended: Option<bool> = conn
            .query_row(
                "SELECT end_of_round FROM run_statistics WHERE run_id = ?1
                 ORDER BY datetime_collected DESC, id DESC LIMIT 1",
                [run_id],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to fetch status for run {run_id}"))?;
        Ok(ended.unwrap_or(false))
    }

    /// Highest run id whose latest entry has not ended the round
    pub fn get_active_run_id(&self) -> Result<Option<i64>> {
        let conn = self.open()?;
        conn.query_row(
            &format!(
                "SELECT MAX(r.run_id) FROM run_statistics r
                 WHERE r.end_of_round = 0 AND {LATEST_OF_RUN}"
            ),
            [],
            |row| row.get(0),
        )
        .context("Failed to look up the active run")
    }

    /// One past the largest run id, or 1 for an empty database
    pub fn generate_new_run_id(&self) -> Result<i64> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT COALESCE(MAX(run_id), 0) + 1 FROM run_statistics",
            [],
            |row| row.get(0),
        )
        .context("Failed to generate a run id")
    }

    /// Delete one entry. Returns false when no entry has that id.
    pub fn delete_entry(&self, id: i64) -> Result<bool> {
        let removed = self.write_tx("entry_delete", |tx| {
            tx.execute("DELETE FROM run_statistics WHERE id = ?1", [id])
        })?;
        info!("event=entry_delete module=storage status=ok id={id} removed={removed}");
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("stats.db"));
        (dir, storage)
    }

    fn new_entry(run_id: i64, wave: i64, end_of_round: bool) -> NewEntry {
        NewEntry {
            run_id,
            tier: 5,
            wave,
            coins: 1_000_000.0,
            cells: 500,
            time_spent: 3600,
            notes: Some("Test run".to_string()),
            end_of_round,
        }
    }

    #[test]
    fn test_storage_opens_lazily() {
        let (dir, storage) = temp_storage();
        let path = dir.path().join("nested").join("stats.db");
        let lazy = Storage::new(path.clone());
        assert!(!path.exists());
        assert_eq!(lazy.generate_new_run_id().unwrap(), 1);
        assert!(path.exists());
        assert!(storage.fetch_all_entries().unwrap().is_empty());
    }

    #[test]
    fn test_insert_round_trip() {
        let (_dir, storage) = temp_storage();
        let new = NewEntry {
            run_id: 3,
            tier: 7,
            wave: -2,
            coins: 17_090_000.5,
            cells: 0,
            time_spent: 0,
            notes: Some("note".to_string()),
            end_of_round: false,
        };
        let id = storage.insert_entry(&new).unwrap();
        let fetched = storage.fetch_entry_by_id(id).unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.run_id, 3);
        assert_eq!(fetched.tier, 7);
        assert_eq!(fetched.wave, -2);
        assert_eq!(fetched.coins, 17_090_000.5);
        assert_eq!(fetched.cells, 0);
        assert_eq!(fetched.time_spent, 0);
        assert_eq!(fetched.notes.as_deref(), Some("note"));
        assert!(!fetched.end_of_round);
    }

    #[test]
    fn test_blank_notes_stored_as_null() {
        let (_dir, storage) = temp_storage();
        let mut new = new_entry(1, 1, false);
        new.notes = Some(String::new());
        let id = storage.insert_entry(&new).unwrap();
        assert_eq!(storage.fetch_entry_by_id(id).unwrap().unwrap().notes, None);
    }

    #[test]
    fn test_notes_keep_surrounding_whitespace() {
        let (_dir, storage) = temp_storage();
        let mut new = new_entry(1, 1, false);
        new.notes = Some("  boss wave \n".to_string());
        let id = storage.insert_entry(&new).unwrap();
        let fetched = storage.fetch_entry_by_id(id).unwrap().unwrap();
        assert_eq!(fetched.notes, new.notes);
    }

    #[test]
    fn test_closing_entry_ends_whole_run() {
        let (_dir, storage) = temp_storage();
        storage.insert_entry(&new_entry(1, 10, false)).unwrap();
        storage.insert_entry(&new_entry(1, 20, false)).unwrap();
        storage.insert_entry(&new_entry(2, 5, false)).unwrap();
        assert!(!storage.get_run_status(1).unwrap());

        storage.insert_entry(&new_entry(1, 30, true)).unwrap();

        let run = storage.fetch_all_entries_for_run(1).unwrap();
        assert_eq!(run.len(), 3);
        assert!(run.iter().all(|e| e.end_of_round));
        assert_eq!(run.iter().map(|e| e.wave).collect::<Vec<_>>(), vec![10, 20, 30]);
        assert!(storage.get_run_status(1).unwrap());

        let other = storage.fetch_all_entries_for_run(2).unwrap();
        assert!(!other[0].end_of_round);
    }

    #[test]
    fn test_generate_new_run_id() {
        let (_dir, storage) = temp_storage();
        assert_eq!(storage.generate_new_run_id().unwrap(), 1);
        storage.insert_entry(&new_entry(4, 1, false)).unwrap();
        storage.insert_entry(&new_entry(2, 1, false)).unwrap();
        assert_eq!(storage.generate_new_run_id().unwrap(), 5);
    }

    #[test]
    fn test_active_run_id() {
        let (_dir, storage) = temp_storage();
        assert_eq!(storage.get_active_run_id().unwrap(), None);

        storage.insert_entry(&new_entry(1, 10, true)).unwrap();
        assert_eq!(storage.get_active_run_id().unwrap(), None);

        storage.insert_entry(&new_entry(2, 10, false)).unwrap();
        assert_eq!(storage.get_active_run_id().unwrap(), Some(2));

        storage.insert_entry(&new_entry(2, 20, true)).unwrap();
        assert_eq!(storage.get_active_run_id().unwrap(), None);
    }

    #[test]
    fn test_run_queries() {
        let (_dir, storage) = temp_storage();
        storage.insert_entry(&new_entry(2, 10, false)).unwrap();
        let latest_id = storage.insert_entry(&new_entry(2, 25, false)).unwrap();
        storage.insert_entry(&new_entry(1, 3, true)).unwrap();

        assert_eq!(storage.fetch_run_ids().unwrap(), vec![1, 2]);
        assert_eq!(storage.get_run_tier(2).unwrap(), Some(5));
        assert_eq!(storage.get_run_tier(9).unwrap(), None);
        assert!(!storage.get_run_status(9).unwrap());

        let latest = storage.fetch_latest_per_run().unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].run_id, 1);
        assert_eq!(latest[1].id, latest_id);
        assert_eq!(latest[1].wave, 25);
    }

    #[test]
    fn test_delete_entry() {
        let (_dir, storage) = temp_storage();
        let keep = storage.insert_entry(&new_entry(1, 1, false)).unwrap();
        let gone = storage.insert_entry(&new_entry(1, 2, false)).unwrap();

        assert!(!storage.delete_entry(gone + 100).unwrap());
        assert_eq!(storage.fetch_all_entries().unwrap().len(), 2);

        assert!(storage.delete_entry(gone).unwrap());
        assert!(storage.fetch_entry_by_id(gone).unwrap().is_none());
        // Siblings in the same run are untouched
        assert!(storage.fetch_entry_by_id(keep).unwrap().is_some());
    }

    #[test]
    fn test_failed_delete_is_an_error() {
        let (_dir, storage) = temp_storage();
        let id = storage.insert_entry(&new_entry(1, 1, false)).unwrap();

        let conn = Connection::open(storage.db_path()).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER block_delete BEFORE DELETE ON run_statistics
             BEGIN SELECT RAISE(ABORT, 'deletes blocked'); END;",
        )
        .unwrap();
        drop(conn);

        assert!(storage.delete_entry(id).is_err());
        assert!(storage.fetch_entry_by_id(id).unwrap().is_some());
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let (_dir, storage) = temp_storage();
        storage.insert_entry(&new_entry(1, 1, false)).unwrap();

        let result = storage.write_tx("test_write", |tx| {
            tx.execute("DELETE FROM run_statistics", [])?;
            tx.execute("INSERT INTO missing_table VALUES (1)", [])?;
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(storage.fetch_all_entries().unwrap().len(), 1);
    }

    #[test]
    fn test_reads_naive_timestamps() {
        let (_dir, storage) = temp_storage();
        storage.generate_new_run_id().unwrap();
        let conn = Connection::open(storage.db_path()).unwrap();
        conn.execute(
            "INSERT INTO run_statistics
                (run_id, tier, wave, coins, cells, time_spent, notes, end_of_round, datetime_collected)
             VALUES (1, 2, 3, 4.0, 5, 6, NULL, 0, '2024-11-02 18:04:11.123456')",
            [],
        )
        .unwrap();

        let entries = storage.fetch_all_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            format_timestamp(entries[0].datetime_collected),
            "2024-11-02T18:04:11.123456Z"
        );
    }
}
