use std::path::Path;

use log::debug;
use rusqlite::types::ToSqlOutput;
use rusqlite::{params, Connection, ToSql, Transaction};

use crate::config::{UpsertMode, ValueMode};
use crate::error::IngestError;
use crate::record::{Record, SaleValue};

const SALES_TABLE: &str = "sales";

/// SQLite-backed sales table. The table is created on open if absent and
/// never dropped; `id` is the primary key and the durability boundary
/// across files and runs. The value column is INTEGER or TEXT depending on
/// the configured value mode.
pub struct SalesStore {
    conn: Connection,
    value_mode: ValueMode,
}

impl SalesStore {
    pub fn open(path: &Path, value_mode: ValueMode) -> Result<Self, IngestError> {
        let conn = Connection::open(path).map_err(IngestError::StoreConnection)?;
        let value_type = match value_mode {
            ValueMode::Numeric => "INTEGER",
            ValueMode::Text => "TEXT",
        };
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {SALES_TABLE} \
                 (id INTEGER PRIMARY KEY, address TEXT, suburb TEXT, date DATE, value {value_type})"
            ),
            [],
        )
        .map_err(IngestError::StoreConnection)?;
        Ok(Self { conn, value_mode })
    }

    /// Begins one file's all-or-nothing ingestion transaction. Dropping the
    /// returned handle without calling [`IngestTransaction::commit`] rolls
    /// back every write made through it.
    pub fn begin(&mut self, mode: UpsertMode) -> Result<IngestTransaction<'_>, IngestError> {
        let tx = self.conn.transaction().map_err(IngestError::StoreWrite)?;
        Ok(IngestTransaction {
            tx,
            mode,
            conflicts: Vec::new(),
        })
    }

    /// All stored sales, ordered by id. Read-and-print convenience for the
    /// CLI and for tests.
    pub fn sales(&self) -> Result<Vec<Record>, IngestError> {
        let value_mode = self.value_mode;
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT id, address, suburb, date, value FROM {SALES_TABLE} ORDER BY id"
            ))
            .map_err(IngestError::StoreWrite)?;
        let rows = stmt
            .query_map([], |row| {
                let value = match value_mode {
                    ValueMode::Numeric => SaleValue::Amount(row.get(4)?),
                    ValueMode::Text => SaleValue::Text(row.get(4)?),
                };
                Ok(Record {
                    id: row.get(0)?,
                    address: row.get(1)?,
                    suburb: row.get(2)?,
                    date: row.get(3)?,
                    value,
                })
            })
            .map_err(IngestError::StoreWrite)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(IngestError::StoreWrite)
    }
}

impl ToSql for SaleValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SaleValue::Text(text) => Ok(ToSqlOutput::from(text.as_str())),
            SaleValue::Amount(amount) => Ok(ToSqlOutput::from(*amount)),
        }
    }
}

/// One file's atomic unit of work against the store, applying a single
/// upsert mode for its whole lifetime. Owned exclusively by the writer
/// thread; never shared with filter workers.
pub struct IngestTransaction<'conn> {
    tx: Transaction<'conn>,
    mode: UpsertMode,
    /// Ids whose insert affected zero rows, under purge-on-conflict.
    conflicts: Vec<i64>,
}

impl IngestTransaction<'_> {
    /// Writes one record according to the transaction's upsert mode.
    pub fn upsert(&mut self, rec: &Record) -> Result<(), IngestError> {
        match self.mode {
            UpsertMode::InsertIgnore => {
                self.insert_ignore(rec)?;
            }
            UpsertMode::InsertIgnoreRefreshIfOlder => {
                self.insert_ignore(rec)?;
                // refresh an existing row only when the incoming date is on
                // or before the stored one: the earliest date wins a conflict
                self.tx
                    .prepare_cached(&format!(
                        "UPDATE {SALES_TABLE} SET address = ?1, suburb = ?2, date = ?3, value = ?4 \
                         WHERE id = ?5 AND date >= ?3"
                    ))
                    .and_then(|mut stmt| {
                        stmt.execute(params![rec.address, rec.suburb, rec.date, rec.value, rec.id])
                    })
                    .map_err(IngestError::StoreWrite)?;
            }
            UpsertMode::InsertReplace => {
                self.tx
                    .prepare_cached(&format!(
                        "INSERT OR REPLACE INTO {SALES_TABLE} VALUES (?1, ?2, ?3, ?4, ?5)"
                    ))
                    .and_then(|mut stmt| {
                        stmt.execute(params![rec.id, rec.address, rec.suburb, rec.date, rec.value])
                    })
                    .map_err(IngestError::StoreWrite)?;
            }
            UpsertMode::InsertIgnorePurgeOnConflict => {
                if self.insert_ignore(rec)? == 0 {
                    self.conflicts.push(rec.id);
                }
            }
        }
        Ok(())
    }

    fn insert_ignore(&self, rec: &Record) -> Result<usize, IngestError> {
        self.tx
            .prepare_cached(&format!(
                "INSERT OR IGNORE INTO {SALES_TABLE} VALUES (?1, ?2, ?3, ?4, ?5)"
            ))
            .and_then(|mut stmt| {
                stmt.execute(params![rec.id, rec.address, rec.suburb, rec.date, rec.value])
            })
            .map_err(IngestError::StoreWrite)
    }

    /// Commits the file's effect. Under purge-on-conflict, first deletes
    /// every row whose id collided with a pre-existing one; the insert
    /// pass is complete by the time this runs.
    pub fn commit(self) -> Result<(), IngestError> {
        if !self.conflicts.is_empty() {
            debug!("purging {} conflicting ids", self.conflicts.len());
            let mut stmt = self
                .tx
                .prepare(&format!("DELETE FROM {SALES_TABLE} WHERE id = ?1"))
                .map_err(IngestError::StoreWrite)?;
            for id in &self.conflicts {
                stmt.execute([id]).map_err(IngestError::StoreWrite)?;
            }
            drop(stmt);
        }
        self.tx.commit().map_err(IngestError::StoreWrite)
    }
}
