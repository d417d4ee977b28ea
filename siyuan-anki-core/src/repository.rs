//! SQLite-backed [`BlockStore`] over SiYuan's `siyuan.db`.
//!
//! The connection is opened read-only once and held for the life of the store.

use std::path::Path;

use rusqlite::{params_from_iter, Connection, OpenFlags};
use tracing::{debug, info};

use crate::contract::{BlockRow, BlockStore};
use crate::error::SyncResult;

/// Stays well below SQLite's bound-parameter limit, leaving room for the type list.
const ID_CHUNK: usize = 500;

const BLOCK_COLUMNS: &str = "id, parent_id, box, hpath, markdown, hash, updated, type";

pub struct SqliteBlockStore {
    conn: Connection,
}

impl SqliteBlockStore {
    pub fn open(db_path: &Path) -> SyncResult<Self> {
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        info!(db_path = %db_path.display(), "Opened SiYuan block database (read-only)");
        Ok(Self { conn })
    }

    /// Wraps an existing connection; used by tests that build a fixture schema in memory.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn select_blocks(&self, ids: &[String], types: &[String]) -> SyncResult<Vec<BlockRow>> {
        let mut rows = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK) {
            let mut sql = format!(
                "SELECT {BLOCK_COLUMNS} FROM blocks WHERE id IN ({})",
                placeholders(chunk.len())
            );
            if !types.is_empty() {
                sql.push_str(&format!(" AND type IN ({})", placeholders(types.len())));
            }
            let mut stmt = self.conn.prepare(&sql)?;
            let mapped = stmt.query_map(params_from_iter(chunk.iter().chain(types.iter())), |row| {
                Ok(BlockRow {
                    id: row.get(0)?,
                    parent_id: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    box_id: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    hpath: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    markdown: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    hash: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    updated: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                    block_type: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                })
            })?;
            for row in mapped {
                rows.push(row?);
            }
        }
        Ok(rows)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl BlockStore for SqliteBlockStore {
    fn flagged_block_ids(&self, marker: &str) -> SyncResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT block_id FROM refs WHERE content LIKE ?1")?;
        let pattern = format!("%{marker}%");
        let ids = stmt
            .query_map([pattern], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(marker, count = ids.len(), "Queried flagged block ids");
        Ok(ids)
    }

    fn blocks_by_ids(&self, ids: &[String], types: &[String]) -> SyncResult<Vec<BlockRow>> {
        let rows = self.select_blocks(ids, types)?;
        debug!(requested = ids.len(), found = rows.len(), "Loaded flagged blocks");
        Ok(rows)
    }

    fn parent_blocks(&self, ids: &[String], types: &[String]) -> SyncResult<Vec<BlockRow>> {
        // An empty whitelist would otherwise read as "unrestricted".
        if types.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.select_blocks(ids, types)?;
        debug!(requested = ids.len(), eligible = rows.len(), "Loaded eligible parent blocks");
        Ok(rows)
    }
}
