//! SQLite-backed object store
//!
//! Objects are stored as JSON documents keyed by `(kind, namespace, name)`.
//! Resource versions come from a single counter row so they stay monotonic
//! across process restarts.

use crate::error::{Error, Result};
use crate::meta::{ListParams, ObjectKey, RawObject};
use crate::store::{ObjectStore, apply_patch, next_timestamp, prepare_create, sort_by_creation};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Object store persisted in a SQLite database file
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store database at the given path
    ///
    /// Creates the database file and necessary tables if they don't exist.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(db_path)?)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS objects (
                kind TEXT NOT NULL,
                namespace TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (kind, namespace, name)
            );

            CREATE INDEX IF NOT EXISTS idx_kind_ns ON objects(kind, namespace);

            CREATE TABLE IF NOT EXISTS counters (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                version INTEGER NOT NULL,
                last_created TEXT
            );

            INSERT OR IGNORE INTO counters (id, version, last_created) VALUES (0, 0, NULL);
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::Poisoned)
    }
}

fn decode(data: &str) -> Result<RawObject> {
    RawObject::from_value(serde_json::from_str(data)?)
}

fn load(conn: &Connection, kind: &str, key: &ObjectKey) -> Result<Option<RawObject>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM objects WHERE kind = ?1 AND namespace = ?2 AND name = ?3",
            params![kind, key.namespace, key.name],
            |row| row.get(0),
        )
        .optional()?;
    data.as_deref().map(decode).transpose()
}

fn bump_version(conn: &Connection) -> Result<u64> {
    let version: i64 = conn.query_row(
        "UPDATE counters SET version = version + 1 WHERE id = 0 RETURNING version",
        [],
        |row| row.get(0),
    )?;
    Ok(version as u64)
}

fn last_created(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    let last: Option<String> =
        conn.query_row("SELECT last_created FROM counters WHERE id = 0", [], |row| {
            row.get(0)
        })?;
    Ok(last
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc)))
}

impl ObjectStore for SqliteStore {
    fn get(&self, kind: &str, key: &ObjectKey) -> Result<RawObject> {
        let conn = self.lock()?;
        load(&conn, kind, key)?.ok_or_else(|| Error::NotFound {
            kind: kind.to_string(),
            key: key.clone(),
        })
    }

    fn list(&self, kind: &str, params: &ListParams) -> Result<Vec<RawObject>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT data FROM objects WHERE kind = ?1")?;
        let rows: Vec<String> = stmt
            .query_map([kind], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        let mut objects = Vec::with_capacity(rows.len());
        for data in rows {
            let object = decode(&data)?;
            if params.matches(&object.metadata) {
                objects.push(object);
            }
        }
        sort_by_creation(&mut objects);
        Ok(objects)
    }

    fn list_all(&self) -> Result<Vec<RawObject>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT data FROM objects")?;
        let rows: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        let mut objects = rows
            .iter()
            .map(|data| decode(data))
            .collect::<Result<Vec<_>>>()?;
        sort_by_creation(&mut objects);
        Ok(objects)
    }

    fn create(&self, object: RawObject) -> Result<RawObject> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let created = next_timestamp(last_created(&tx)?);
        let version = bump_version(&tx)?;
        let object = prepare_create(object, version, created)?;
        let key = object.key();
        if load(&tx, &object.kind, &key)?.is_some() {
            return Err(Error::AlreadyExists {
                kind: object.kind.clone(),
                key,
            });
        }

        let stamp = created.to_rfc3339();
        tx.execute(
            "INSERT INTO objects (kind, namespace, name, created_at, data) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                object.kind,
                key.namespace,
                key.name,
                stamp,
                serde_json::to_string(&object)?
            ],
        )?;
        tx.execute(
            "UPDATE counters SET last_created = ?1 WHERE id = 0",
            [&stamp],
        )?;
        tx.commit()?;
        Ok(object)
    }

    fn patch(&self, original: &RawObject, modified: &RawObject) -> Result<RawObject> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let key = original.key();
        let stored = load(&tx, &original.kind, &key)?.ok_or_else(|| Error::NotFound {
            kind: original.kind.clone(),
            key: key.clone(),
        })?;
        let version = bump_version(&tx)?;
        let updated = apply_patch(&stored, original, modified, version)?;

        tx.execute(
            "UPDATE objects SET data = ?1 WHERE kind = ?2 AND namespace = ?3 AND name = ?4",
            params![
                serde_json::to_string(&updated)?,
                original.kind,
                key.namespace,
                key.name
            ],
        )?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete(&self, kind: &str, key: &ObjectKey) -> Result<()> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM objects WHERE kind = ?1 AND namespace = ?2 AND name = ?3",
            params![kind, key.namespace, key.name],
        )?;
        if removed == 0 {
            return Err(Error::NotFound {
                kind: kind.to_string(),
                key: key.clone(),
            });
        }
        Ok(())
    }
}
