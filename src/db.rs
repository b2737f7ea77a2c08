// Entry Store - local SQLite adapter for the hosted "lancamentos_diarios" table
// All queries take the owner explicitly; rows are re-validated on the way out

use crate::entry::{EntryDraft, EntryKind, FinancialEntry, KindFilter};
use crate::parser::{parse_records, RawRecord};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, info};

const ENTRY_COLUMNS: &str = "id, owner_id, date, description, amount, kind, category, notes";

/// Counts reported by a bulk import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

// ============================================================================
// ENTRY HISTORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryAction {
    Added,
    Imported,
    Updated,
    Deleted,
}

impl EntryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryAction::Added => "added",
            EntryAction::Imported => "imported",
            EntryAction::Updated => "updated",
            EntryAction::Deleted => "deleted",
        }
    }

    fn from_db(s: &str) -> Option<EntryAction> {
        match s {
            "added" => Some(EntryAction::Added),
            "imported" => Some(EntryAction::Imported),
            "updated" => Some(EntryAction::Updated),
            "deleted" => Some(EntryAction::Deleted),
            _ => None,
        }
    }
}

/// The chart-relevant fields of an entry at the time of a change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub date: NaiveDate,
    pub amount: f64,
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_hash: Option<String>,
}

impl EntrySnapshot {
    fn of_entry(entry: &FinancialEntry) -> Self {
        Self {
            date: entry.date,
            amount: entry.amount,
            kind: entry.kind,
            import_hash: None,
        }
    }

    fn of_draft(draft: &EntryDraft) -> Self {
        Self {
            date: draft.date,
            amount: draft.amount,
            kind: draft.kind,
            import_hash: None,
        }
    }
}

/// One row of an entry's history: who changed it, how, and to what
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: EntryAction,
    pub entry_id: String,
    pub actor: String,
    /// `None` for deletions
    pub snapshot: Option<EntrySnapshot>,
}

impl EntryEvent {
    pub fn new(action: EntryAction, entry_id: &str, actor: &str, snapshot: Option<EntrySnapshot>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action,
            entry_id: entry_id.to_string(),
            actor: actor.to_string(),
            snapshot,
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

fn content_key(entry: &FinancialEntry) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        entry.owner_id, entry.date, entry.amount, entry.kind, entry.description
    )
}

/// Hash used to make repeated imports of the same file idempotent.
///
/// `occurrence` numbers identical rows within one file (0, 1, ...), so two
/// genuine R$5 coffees on the same day hash differently while a re-import
/// of that file hashes exactly as before.
pub fn compute_import_hash(entry: &FinancialEntry, occurrence: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}#{}", content_key(entry), occurrence));
    format!("{:x}", hasher.finalize())
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL is a no-op for in-memory databases
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Entries Table
    // amount is REAL by affinity but SQLite will keep whatever text it is given
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            amount REAL NOT NULL,
            kind TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT '',
            notes TEXT NOT NULL DEFAULT '',
            import_hash TEXT UNIQUE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME
        )",
        [],
    )?;

    // ==========================================================================
    // Entry history
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entry_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            action TEXT NOT NULL,
            entry_id TEXT NOT NULL,
            actor TEXT NOT NULL,
            snapshot TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_owner_date ON entries(owner_id, date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entry_events_entry ON entry_events(entry_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// WRITES
// Each mutation and its history row commit together or not at all
// ============================================================================

fn write_entry(conn: &Connection, entry: &FinancialEntry, import_hash: Option<&str>) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO entries (
            id, owner_id, date, description, amount, kind, category, notes, import_hash
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.id,
            entry.owner_id,
            entry.date.format("%Y-%m-%d").to_string(),
            entry.description,
            entry.amount,
            entry.kind.as_str(),
            entry.category,
            entry.notes,
            import_hash,
        ],
    )
}

/// Insert one entry typed in by the owner
pub fn insert_entry(conn: &Connection, owner_id: &str, draft: &EntryDraft) -> Result<FinancialEntry> {
    draft.validate()?;
    let entry = FinancialEntry::from_draft(owner_id, draft);

    let tx = conn.unchecked_transaction()?;
    write_entry(&tx, &entry, None).context("Failed to insert entry")?;
    record_event(
        &tx,
        &EntryEvent::new(EntryAction::Added, &entry.id, owner_id, Some(EntrySnapshot::of_entry(&entry))),
    )?;
    tx.commit()?;

    info!(owner = owner_id, id = %entry.id, kind = %entry.kind, "entry added");
    Ok(entry)
}

/// Bulk insert (CSV import). Re-importing the same rows is a no-op.
///
/// The whole batch is one transaction: a failure leaves the store untouched.
pub fn insert_entries(conn: &Connection, entries: &[FinancialEntry]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    let mut occurrences: HashMap<String, usize> = HashMap::new();

    let tx = conn.unchecked_transaction()?;
    for entry in entries {
        let seen = occurrences.entry(content_key(entry)).or_insert(0);
        let hash = compute_import_hash(entry, *seen);
        *seen += 1;

        match write_entry(&tx, entry, Some(&hash)) {
            Ok(_) => {
                summary.inserted += 1;

                let mut snapshot = EntrySnapshot::of_entry(entry);
                snapshot.import_hash = Some(hash);
                record_event(
                    &tx,
                    &EntryEvent::new(EntryAction::Imported, &entry.id, "csv_importer", Some(snapshot)),
                )?;
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                summary.duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    tx.commit()?;

    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        "import finished"
    );
    Ok(summary)
}

/// Replace the editable fields of an owner's entry. `false` if no such entry.
pub fn update_entry(conn: &Connection, owner_id: &str, id: &str, draft: &EntryDraft) -> Result<bool> {
    draft.validate()?;

    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute(
        "UPDATE entries
         SET date = ?1, description = ?2, amount = ?3, kind = ?4,
             category = ?5, notes = ?6, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?7 AND owner_id = ?8",
        params![
            draft.date.format("%Y-%m-%d").to_string(),
            draft.description,
            draft.amount,
            draft.kind.as_str(),
            draft.category,
            draft.notes,
            id,
            owner_id,
        ],
    )?;

    if changed == 0 {
        return Ok(false);
    }

    record_event(
        &tx,
        &EntryEvent::new(EntryAction::Updated, id, owner_id, Some(EntrySnapshot::of_draft(draft))),
    )?;
    tx.commit()?;

    info!(owner = owner_id, id, "entry updated");
    Ok(true)
}

/// Delete an owner's entry. `false` if no such entry.
pub fn delete_entry(conn: &Connection, owner_id: &str, id: &str) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute(
        "DELETE FROM entries WHERE id = ?1 AND owner_id = ?2",
        params![id, owner_id],
    )?;

    if removed == 0 {
        return Ok(false);
    }

    record_event(&tx, &EntryEvent::new(EntryAction::Deleted, id, owner_id, None))?;
    tx.commit()?;

    info!(owner = owner_id, id, "entry deleted");
    Ok(true)
}

/// Append a row to an entry's history
pub fn record_event(conn: &Connection, event: &EntryEvent) -> Result<()> {
    let snapshot = event
        .snapshot
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO entry_events (
            event_id, timestamp, action, entry_id, actor, snapshot
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.action.as_str(),
            event.entry_id,
            event.actor,
            snapshot,
        ],
    )
    .context("Failed to record entry event")?;

    Ok(())
}

/// History of one entry, newest first
pub fn events_for_entry(conn: &Connection, entry_id: &str) -> Result<Vec<EntryEvent>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, action, entry_id, actor, snapshot
         FROM entry_events
         WHERE entry_id = ?1
         ORDER BY timestamp DESC, id DESC",
    )?;

    let rows = stmt
        .query_map(params![entry_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(event_id, timestamp, action, entry_id, actor, snapshot)| -> Result<EntryEvent> {
            Ok(EntryEvent {
                event_id,
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .with_context(|| format!("Bad event timestamp '{}'", timestamp))?
                    .with_timezone(&Utc),
                action: EntryAction::from_db(&action)
                    .ok_or_else(|| anyhow!("Unknown entry action '{}'", action))?,
                entry_id,
                actor,
                snapshot: snapshot
                    .as_deref()
                    .map(serde_json::from_str::<EntrySnapshot>)
                    .transpose()
                    .context("Bad event snapshot")?,
            })
        })
        .collect()
}

// ============================================================================
// QUERIES
// ============================================================================

fn sql_to_json(value: SqlValue) -> serde_json::Value {
    match value {
        SqlValue::Null => serde_json::Value::Null,
        SqlValue::Integer(i) => serde_json::json!(i),
        SqlValue::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(f.to_string())),
        SqlValue::Text(s) => serde_json::Value::String(s),
        SqlValue::Blob(_) => serde_json::Value::Null,
    }
}

/// Read a row without trusting its types
fn raw_record_from_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: Some(serde_json::Value::String(row.get(0)?)),
        owner_id: row.get(1)?,
        date: row.get(2)?,
        description: row.get(3)?,
        amount: Some(sql_to_json(row.get(4)?)),
        kind: row.get(5)?,
        category: row.get(6)?,
        notes: row.get(7)?,
    })
}

fn query_entries<P: rusqlite::Params>(
    conn: &Connection,
    owner_id: &str,
    sql: &str,
    params: P,
) -> Result<Vec<FinancialEntry>> {
    let mut stmt = conn.prepare(sql)?;
    let raws = stmt
        .query_map(params, raw_record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let batch = parse_records(owner_id, raws);
    debug!(
        owner = owner_id,
        rows = batch.entries.len(),
        skipped = batch.rejected.len(),
        "loaded entries"
    );
    Ok(batch.entries)
}

/// Entries of one owner for the listing table, newest first
pub fn list_entries(conn: &Connection, owner_id: &str, filter: KindFilter) -> Result<Vec<FinancialEntry>> {
    match filter {
        KindFilter::All => query_entries(
            conn,
            owner_id,
            &format!(
                "SELECT {} FROM entries WHERE owner_id = ?1 ORDER BY date DESC, created_at DESC",
                ENTRY_COLUMNS
            ),
            params![owner_id],
        ),
        KindFilter::Only(kind) => query_entries(
            conn,
            owner_id,
            &format!(
                "SELECT {} FROM entries WHERE owner_id = ?1 AND kind = ?2 ORDER BY date DESC, created_at DESC",
                ENTRY_COLUMNS
            ),
            params![owner_id, kind.as_str()],
        ),
    }
}

/// Entries of one owner dated within `[start, end]`, oldest first
pub fn entries_between(
    conn: &Connection,
    owner_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<FinancialEntry>> {
    query_entries(
        conn,
        owner_id,
        &format!(
            "SELECT {} FROM entries WHERE owner_id = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date ASC",
            ENTRY_COLUMNS
        ),
        params![
            owner_id,
            start.format("%Y-%m-%d").to_string(),
            end.format("%Y-%m-%d").to_string(),
        ],
    )
}

/// Fetch a single entry of an owner
pub fn get_entry(conn: &Connection, owner_id: &str, id: &str) -> Result<FinancialEntry> {
    query_entries(
        conn,
        owner_id,
        &format!("SELECT {} FROM entries WHERE owner_id = ?1 AND id = ?2", ENTRY_COLUMNS),
        params![owner_id, id],
    )?
    .into_iter()
    .next()
    .ok_or_else(|| anyhow!("entry {} not found", id))
}

pub fn count_entries(conn: &Connection, owner_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM entries WHERE owner_id = ?1",
        [owner_id],
        |row| row.get(0),
    )?;

    Ok(count)
}
