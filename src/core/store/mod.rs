//! Path store
//!
//! SQLite persistence for traced cable paths. Besides the path rows the store
//! keeps two indexes:
//!
//! - `path_nodes`: one row per node of each path, so "every path whose nodes
//!   contain X" is a single indexed lookup
//! - `origin_paths`: the back-reference from each origin termination to the
//!   one path it originates
//!
//! Mutating operations are free functions over `&Connection` so they can be
//! composed inside a caller's transaction. `PathStore` wraps them with one
//! transaction per call.

mod serialize;


use std::path::Path;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use thiserror::Error;

use crate::core::node::{NodeParseError, NodeRef};
use crate::core::path::CablePath;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cable_paths (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    nodes TEXT NOT NULL,
    is_complete INTEGER NOT NULL,
    is_active INTEGER NOT NULL,
    is_split INTEGER NOT NULL,
    origin_kind TEXT,
    traced_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS path_nodes (
    path_id INTEGER NOT NULL REFERENCES cable_paths(id) ON DELETE CASCADE,
    seq INTEGER NOT NULL,
    node TEXT NOT NULL,
    PRIMARY KEY (path_id, seq)
);

CREATE INDEX IF NOT EXISTS idx_path_nodes_node ON path_nodes(node);

CREATE TABLE IF NOT EXISTS origin_paths (
    node TEXT PRIMARY KEY,
    path_id INTEGER NOT NULL REFERENCES cable_paths(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_origin_paths_path ON origin_paths(path_id);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const PATH_COLUMNS: &str =
    "p.id, p.path, p.is_complete, p.is_active, p.is_split, p.traced_at";

/// Metadata key holding the fingerprint of the last synced topology
pub const META_TOPOLOGY_FINGERPRINT: &str = "topology_fingerprint";

/// Errors from the path store
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("Database error: {0}")]
    #[diagnostic(code(cabletrace::store::sqlite))]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt path record: {0}")]
    #[diagnostic(
        code(cabletrace::store::json),
        help("Run `cabletrace sync --force` to rebuild the store")
    )]
    Json(#[from] serde_json::Error),

    #[error("Corrupt node reference in store: {0}")]
    #[diagnostic(code(cabletrace::store::node))]
    Node(#[from] NodeParseError),

    #[error("Corrupt timestamp in store: {0}")]
    #[diagnostic(code(cabletrace::store::timestamp))]
    Timestamp(#[from] chrono::ParseError),

    #[error("Cannot store a path with no hops")]
    #[diagnostic(code(cabletrace::store::empty_path))]
    EmptyPath,

    #[error("Failed to create database directory {path}: {source}")]
    #[diagnostic(code(cabletrace::store::io))]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// SQLite-backed store of cable paths
pub struct PathStore {
    conn: Connection,
}

impl PathStore {
    /// Open (or create) a store at a file path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Start a transaction; store functions accept it through `Deref`
    pub fn transaction(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self.conn.transaction()?)
    }

    /// Save a path atomically, assigning its `id` and `traced_at`
    pub fn save(&mut self, path: &mut CablePath) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        let saved = save_path(&tx, path)?;
        tx.commit()?;
        Ok(saved.id)
    }

    /// Delete a path atomically; returns whether a row was removed
    pub fn delete(&mut self, path: &CablePath) -> Result<bool, StoreError> {
        let tx = self.conn.transaction()?;
        let deleted = delete_path(&tx, path)?;
        tx.commit()?;
        Ok(deleted)
    }

    pub fn paths_through(&self, node: NodeRef) -> Result<Vec<CablePath>, StoreError> {
        paths_through(&self.conn, node)
    }

    pub fn get(&self, id: i64) -> Result<Option<CablePath>, StoreError> {
        get_path(&self.conn, id)
    }

    pub fn path_for_origin(&self, node: NodeRef) -> Result<Option<CablePath>, StoreError> {
        path_for_origin(&self.conn, node)
    }

    /// Path ID referenced by an origin termination, if any
    pub fn origin_back_reference(&self, node: NodeRef) -> Result<Option<i64>, StoreError> {
        origin_back_reference(&self.conn, node)
    }

    pub fn all(&self) -> Result<Vec<CablePath>, StoreError> {
        all_paths(&self.conn)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        count_paths(&self.conn)
    }

    pub fn set_inactive_through(&mut self, node: NodeRef) -> Result<usize, StoreError> {
        set_inactive_through(&self.conn, node)
    }

    /// Remove every path; metadata is kept
    pub fn clear(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        clear(&tx)?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>, StoreError> {
        get_meta(&self.conn, key)
    }

    pub fn set_meta(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        set_meta(&self.conn, key, value)
    }
}

// =========================================================================
// Operations on a borrowed connection
// =========================================================================

/// Row written by [`save_path`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedPath {
    pub id: i64,
    /// Paths deleted because they started at one of the same origins
    pub superseded: usize,
}

/// Write a path and point each origin's back-reference at it
///
/// Any other path already originating at one of this path's origins is
/// deleted first, so an origin never references more than one path.
pub fn save_path(conn: &Connection, path: &mut CablePath) -> Result<SavedPath, StoreError> {
    if path.path().is_empty() {
        return Err(StoreError::EmptyPath);
    }

    let mut superseded = 0;
    for origin in path.origins() {
        if let Some(existing) = origin_back_reference(conn, *origin)? {
            if Some(existing) != path.id && delete_path_id(conn, existing)? {
                superseded += 1;
            }
        }
    }

    let traced_at = *path.traced_at.get_or_insert_with(Utc::now);
    let path_json = serde_json::to_string(path.path())?;
    let nodes_json = serde_json::to_string(path.nodes())?;
    let origin_kind = path.origin_kind();

    let existing_row = match path.id {
        Some(id) => conn
            .query_row("SELECT id FROM cable_paths WHERE id = ?1", [id], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?,
        None => None,
    };

    let id = match existing_row {
        Some(id) => {
            conn.execute(
                "UPDATE cable_paths SET path = ?2, nodes = ?3, is_complete = ?4,
                 is_active = ?5, is_split = ?6, origin_kind = ?7, traced_at = ?8
                 WHERE id = ?1",
                params![
                    id,
                    path_json,
                    nodes_json,
                    path.is_complete,
                    path.is_active,
                    path.is_split,
                    origin_kind,
                    traced_at.to_rfc3339(),
                ],
            )?;
            conn.execute("DELETE FROM path_nodes WHERE path_id = ?1", [id])?;
            conn.execute("DELETE FROM origin_paths WHERE path_id = ?1", [id])?;
            id
        }
        None => {
            conn.execute(
                "INSERT INTO cable_paths
                 (path, nodes, is_complete, is_active, is_split, origin_kind, traced_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    path_json,
                    nodes_json,
                    path.is_complete,
                    path.is_active,
                    path.is_split,
                    origin_kind,
                    traced_at.to_rfc3339(),
                ],
            )?;
            conn.last_insert_rowid()
        }
    };

    {
        let mut stmt =
            conn.prepare_cached("INSERT INTO path_nodes (path_id, seq, node) VALUES (?1, ?2, ?3)")?;
        for (seq, node) in path.nodes().iter().enumerate() {
            stmt.execute(params![id, seq as i64, node])?;
        }
    }
    {
        let mut stmt = conn
            .prepare_cached("INSERT OR REPLACE INTO origin_paths (node, path_id) VALUES (?1, ?2)")?;
        for origin in path.origins() {
            stmt.execute(params![origin, id])?;
        }
    }

    path.id = Some(id);
    Ok(SavedPath { id, superseded })
}

/// Remove a path and clear back-references still pointing at it
pub fn delete_path(conn: &Connection, path: &CablePath) -> Result<bool, StoreError> {
    match path.id {
        Some(id) => delete_path_id(conn, id),
        None => Ok(false),
    }
}

pub fn delete_path_id(conn: &Connection, id: i64) -> Result<bool, StoreError> {
    conn.execute("DELETE FROM origin_paths WHERE path_id = ?1", [id])?;
    conn.execute("DELETE FROM path_nodes WHERE path_id = ?1", [id])?;
    let removed = conn.execute("DELETE FROM cable_paths WHERE id = ?1", [id])?;
    Ok(removed > 0)
}

/// Every stored path whose nodes contain `node`, oldest first
pub fn paths_through(conn: &Connection, node: NodeRef) -> Result<Vec<CablePath>, StoreError> {
    let sql = format!(
        "SELECT {PATH_COLUMNS} FROM cable_paths p
         WHERE p.id IN (SELECT path_id FROM path_nodes WHERE node = ?1)
         ORDER BY p.id"
    );
    query_paths(conn, &sql, params![node])
}

pub fn get_path(conn: &Connection, id: i64) -> Result<Option<CablePath>, StoreError> {
    let sql = format!("SELECT {PATH_COLUMNS} FROM cable_paths p WHERE p.id = ?1");
    Ok(query_paths(conn, &sql, params![id])?.into_iter().next())
}

/// The path an origin termination references
pub fn path_for_origin(conn: &Connection, node: NodeRef) -> Result<Option<CablePath>, StoreError> {
    let sql = format!(
        "SELECT {PATH_COLUMNS} FROM cable_paths p
         JOIN origin_paths o ON o.path_id = p.id
         WHERE o.node = ?1"
    );
    Ok(query_paths(conn, &sql, params![node])?.into_iter().next())
}

pub fn origin_back_reference(conn: &Connection, node: NodeRef) -> Result<Option<i64>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT path_id FROM origin_paths WHERE node = ?1",
            params![node],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn all_paths(conn: &Connection) -> Result<Vec<CablePath>, StoreError> {
    let sql = format!("SELECT {PATH_COLUMNS} FROM cable_paths p ORDER BY p.id");
    query_paths(conn, &sql, [])
}

pub fn count_paths(conn: &Connection) -> Result<usize, StoreError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM cable_paths", [], |row| row.get(0))?;
    Ok(count as usize)
}

/// Mark every active path containing `node` inactive; returns how many changed
pub fn set_inactive_through(conn: &Connection, node: NodeRef) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "UPDATE cable_paths SET is_active = 0
         WHERE is_active = 1
           AND id IN (SELECT path_id FROM path_nodes WHERE node = ?1)",
        params![node],
    )?)
}

pub fn clear(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "DELETE FROM origin_paths;
         DELETE FROM path_nodes;
         DELETE FROM cable_paths;",
    )?;
    Ok(())
}

pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?)
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

// =========================================================================
// Row decoding
// =========================================================================

struct PathRow {
    id: i64,
    path: String,
    is_complete: bool,
    is_active: bool,
    is_split: bool,
    traced_at: String,
}

impl PathRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            path: row.get(1)?,
            is_complete: row.get(2)?,
            is_active: row.get(3)?,
            is_split: row.get(4)?,
            traced_at: row.get(5)?,
        })
    }

    fn into_path(self) -> Result<CablePath, StoreError> {
        let hops: Vec<Vec<NodeRef>> = serde_json::from_str(&self.path)?;
        let mut path = CablePath::new(hops, self.is_complete, self.is_active, self.is_split);
        path.id = Some(self.id);
        path.traced_at = Some(DateTime::parse_from_rfc3339(&self.traced_at)?.with_timezone(&Utc));
        Ok(path)
    }
}

fn query_paths<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<CablePath>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, PathRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(PathRow::into_path).collect()
}
