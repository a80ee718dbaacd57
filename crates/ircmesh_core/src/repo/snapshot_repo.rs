//! Persisted internal forms of entity attachments.
//!
//! # Responsibility
//! - Save the internal form of every attachment of one entity.
//! - Restore attachments by resolving stored names through the registry.
//!
//! # Invariants
//! - Saving replaces all rows of the entity in one transaction.
//! - Restoring never invents descriptors: unknown names are skipped.
//! - Rows whose kind differs from the target entity are not applied.
//! - A row counts as applied only if the entity holds a value for its
//!   descriptor afterwards.

use crate::db::DbError;
use crate::extension::{parse_extension_kind, ExtensionError, ExtensionManager, Extensible};
use crate::model::EntityId;
use log::{debug, info};
use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub type RepoResult<T> = Result<T, RepoError>;

/// Snapshot persistence errors.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted snapshot: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ExtensionError> for RepoError {
    fn from(value: ExtensionError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

/// One stored attachment row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    pub item_name: String,
    pub internal_value: String,
}

/// Storage contract for attachment snapshots.
pub trait SnapshotRepository {
    /// Replaces the stored snapshot of `entity_id`. Returns rows written.
    fn save_entity(&self, entity_id: EntityId, container: &Extensible) -> RepoResult<usize>;
    /// Applies the stored snapshot to `container`. Returns rows that left a
    /// value attached; rows the descriptor rejected are not counted.
    fn restore_entity(
        &self,
        entity_id: EntityId,
        manager: &ExtensionManager,
        container: &mut Extensible,
    ) -> RepoResult<usize>;
    fn delete_entity(&self, entity_id: EntityId) -> RepoResult<usize>;
    /// Stored rows of one entity, sorted by item name.
    fn stored_items(&self, entity_id: EntityId) -> RepoResult<Vec<StoredItem>>;
}

/// SQLite-backed snapshot repository.
pub struct SqliteSnapshotRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSnapshotRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SnapshotRepository for SqliteSnapshotRepository<'_> {
    fn save_entity(&self, entity_id: EntityId, container: &Extensible) -> RepoResult<usize> {
        let saved_at = now_epoch_ms();
        let kind = container.kind().as_str();
        let rows: Vec<(String, String)> = container
            .entries()
            .filter_map(|(item, value)| {
                let internal = item.to_internal(container, value);
                (!internal.is_empty()).then(|| (item.meta().name().to_string(), internal))
            })
            .collect();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM extension_snapshots WHERE entity_id = ?1;",
            params![entity_id.to_string()],
        )?;
        for (item_name, internal_value) in &rows {
            tx.execute(
                "INSERT INTO extension_snapshots (
                    entity_id,
                    entity_kind,
                    item_name,
                    internal_value,
                    saved_at
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    entity_id.to_string(),
                    kind,
                    item_name,
                    internal_value,
                    saved_at
                ],
            )?;
        }
        tx.commit()?;

        info!(
            "event=snapshot_save module=snapshot status=ok entity={} kind={} rows={}",
            entity_id,
            kind,
            rows.len()
        );
        Ok(rows.len())
    }

    fn restore_entity(
        &self,
        entity_id: EntityId,
        manager: &ExtensionManager,
        container: &mut Extensible,
    ) -> RepoResult<usize> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_kind, item_name, internal_value
             FROM extension_snapshots
             WHERE entity_id = ?1
             ORDER BY item_name ASC;",
        )?;
        let rows = stmt
            .query_map(params![entity_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut applied = 0;
        for (kind, item_name, internal_value) in rows {
            let kind = parse_extension_kind(&kind)?;
            if kind != container.kind() {
                debug!(
                    "event=snapshot_restore_skip module=snapshot status=ignored entity={} item={} reason=kind_mismatch",
                    entity_id, item_name
                );
                continue;
            }
            let Some(item) = manager.get_item(&item_name) else {
                debug!(
                    "event=snapshot_restore_skip module=snapshot status=ignored entity={} item={} reason=unknown_item",
                    entity_id, item_name
                );
                continue;
            };
            if item.meta().kind() != container.kind() {
                debug!(
                    "event=snapshot_restore_skip module=snapshot status=ignored entity={} item={} reason=descriptor_kind",
                    entity_id, item_name
                );
                continue;
            }
            item.from_internal(container, &internal_value);
            if container.contains(item.as_ref()) {
                applied += 1;
            } else {
                debug!(
                    "event=snapshot_restore_skip module=snapshot status=ignored entity={} item={} reason=rejected",
                    entity_id, item_name
                );
            }
        }

        info!(
            "event=snapshot_restore module=snapshot status=ok entity={} applied={}",
            entity_id, applied
        );
        Ok(applied)
    }

    fn delete_entity(&self, entity_id: EntityId) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM extension_snapshots WHERE entity_id = ?1;",
            params![entity_id.to_string()],
        )?;
        Ok(removed)
    }

    fn stored_items(&self, entity_id: EntityId) -> RepoResult<Vec<StoredItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_name, internal_value
             FROM extension_snapshots
             WHERE entity_id = ?1
             ORDER BY item_name ASC;",
        )?;
        let items = stmt
            .query_map(params![entity_id.to_string()], |row| {
                Ok(StoredItem {
                    item_name: row.get(0)?,
                    internal_value: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}
