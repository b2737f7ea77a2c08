// Record Parser - boundary between the loosely-typed row store and the core
// Coerces raw rows (JSON, SQLite, CSV) into strict FinancialEntry values

use crate::entry::{EntryKind, FinancialEntry};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("amount '{0}' is not a finite number")]
    InvalidAmount(String),

    #[error("amount {0} is negative")]
    NegativeAmount(f64),

    #[error("unknown entry kind '{0}'")]
    UnknownKind(String),

    #[error("record belongs to owner '{found}', expected '{expected}'")]
    ForeignOwner { expected: String, found: String },
}

// ============================================================================
// RAW RECORD
// ============================================================================

/// A row as it arrives from the store, before any validation.
///
/// Accepts the hosted table's column names (`user_id`, `data`, `valor`,
/// `tipo`, ...) as aliases of the English ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub id: Option<Value>,

    #[serde(default, alias = "user_id", alias = "ownerId")]
    pub owner_id: Option<String>,

    #[serde(default, alias = "data")]
    pub date: Option<String>,

    #[serde(default, alias = "valor")]
    pub amount: Option<Value>,

    #[serde(default, alias = "tipo")]
    pub kind: Option<String>,

    #[serde(default, alias = "descricao")]
    pub description: Option<String>,

    #[serde(default, alias = "categoria")]
    pub category: Option<String>,

    #[serde(default, alias = "observacoes")]
    pub notes: Option<String>,
}

/// A record that failed boundary validation, with its position in the batch
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub index: usize,
    pub error: RecordError,
}

/// Result of parsing a batch: the usable entries plus what was skipped
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    pub entries: Vec<FinancialEntry>,
    pub rejected: Vec<RejectedRecord>,
}

// ============================================================================
// FIELD PARSERS
// ============================================================================

/// Interpret an amount the way the store may hand it over.
///
/// JSON numbers pass through. Strings may carry an `R$` prefix and either
/// a decimal point or a single decimal comma.
pub fn parse_amount(value: &Value) -> Result<f64, RecordError> {
    let amount = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| RecordError::InvalidAmount(n.to_string()))?,
        Value::String(s) => parse_amount_text(s)?,
        Value::Null => return Err(RecordError::MissingField("amount")),
        other => return Err(RecordError::InvalidAmount(other.to_string())),
    };

    if !amount.is_finite() {
        return Err(RecordError::InvalidAmount(value.to_string()));
    }
    if amount < 0.0 {
        return Err(RecordError::NegativeAmount(amount));
    }
    Ok(amount)
}

fn parse_amount_text(raw: &str) -> Result<f64, RecordError> {
    let trimmed = raw.trim();
    let without_symbol = trimmed.strip_prefix("R$").unwrap_or(trimmed).trim();
    if without_symbol.is_empty() {
        return Err(RecordError::InvalidAmount(raw.to_string()));
    }

    let normalized = if !without_symbol.contains('.') && without_symbol.matches(',').count() == 1 {
        without_symbol.replace(',', ".")
    } else {
        without_symbol.to_string()
    };

    normalized
        .parse::<f64>()
        .map_err(|_| RecordError::InvalidAmount(raw.to_string()))
}

/// Calendar date in `YYYY-MM-DD`; a trailing time part (`T10:00:00Z` or
/// ` 10:00:00`) is ignored.
pub fn parse_date(raw: &str) -> Result<NaiveDate, RecordError> {
    let trimmed = raw.trim();
    let date_part = match trimmed.find(|c: char| c == 'T' || c == ' ') {
        Some(10) => &trimmed[..10],
        _ => trimmed,
    };
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| RecordError::InvalidDate(raw.to_string()))
}

fn parse_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// RECORD PARSERS
// ============================================================================

/// Validate one raw record into a strict entry
pub fn parse_record(raw: RawRecord) -> Result<FinancialEntry, RecordError> {
    let id = raw
        .id
        .as_ref()
        .and_then(parse_id)
        .ok_or(RecordError::MissingField("id"))?;

    let owner_id = raw
        .owner_id
        .filter(|o| !o.trim().is_empty())
        .ok_or(RecordError::MissingField("owner_id"))?;

    let date = parse_date(raw.date.as_deref().ok_or(RecordError::MissingField("date"))?)?;

    let amount = parse_amount(raw.amount.as_ref().ok_or(RecordError::MissingField("amount"))?)?;

    let kind_label = raw.kind.ok_or(RecordError::MissingField("kind"))?;
    let kind = EntryKind::from_label(&kind_label).ok_or(RecordError::UnknownKind(kind_label))?;

    Ok(FinancialEntry {
        id,
        owner_id,
        date,
        amount,
        kind,
        description: raw.description.unwrap_or_default(),
        category: raw.category.unwrap_or_default(),
        notes: raw.notes.unwrap_or_default(),
    })
}

/// Validate a batch of rows for one owner.
///
/// Bad rows are skipped and logged; they never fail the batch.
pub fn parse_records<I>(owner_id: &str, records: I) -> ParsedBatch
where
    I: IntoIterator<Item = RawRecord>,
{
    let mut batch = ParsedBatch::default();

    for (index, raw) in records.into_iter().enumerate() {
        let result = parse_record(raw).and_then(|entry| {
            if entry.owner_id == owner_id {
                Ok(entry)
            } else {
                Err(RecordError::ForeignOwner {
                    expected: owner_id.to_string(),
                    found: entry.owner_id,
                })
            }
        });

        match result {
            Ok(entry) => batch.entries.push(entry),
            Err(error) => {
                warn!(index, owner = owner_id, %error, "skipping malformed record");
                batch.rejected.push(RejectedRecord { index, error });
            }
        }
    }

    batch
}

/// Parse a JSON array of rows (e.g. a store response body)
pub fn parse_json_rows(owner_id: &str, json: &str) -> Result<ParsedBatch> {
    let rows: Vec<Value> = serde_json::from_str(json).context("Failed to parse JSON rows")?;

    let mut records = Vec::with_capacity(rows.len());
    let mut shape_errors = Vec::new();
    for (index, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<RawRecord>(row) {
            Ok(raw) => records.push((index, raw)),
            Err(e) => {
                warn!(index, error = %e, "row is not an object with entry fields");
                shape_errors.push(RejectedRecord {
                    index,
                    error: RecordError::MissingField("row"),
                });
            }
        }
    }

    let positions: Vec<usize> = records.iter().map(|(i, _)| *i).collect();
    let mut batch = parse_records(owner_id, records.into_iter().map(|(_, raw)| raw));
    for rejected in &mut batch.rejected {
        rejected.index = positions[rejected.index];
    }
    batch.rejected.extend(shape_errors);
    batch.rejected.sort_by_key(|r| r.index);

    Ok(batch)
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// CSV row layout: `date,description,amount,kind,category,notes`
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "data")]
    date: Option<String>,
    #[serde(default, alias = "descricao")]
    description: Option<String>,
    #[serde(alias = "valor")]
    amount: Option<String>,
    #[serde(alias = "tipo")]
    kind: Option<String>,
    #[serde(default, alias = "categoria")]
    category: Option<String>,
    #[serde(default, alias = "observacoes")]
    notes: Option<String>,
}

impl CsvRow {
    fn into_raw(self, owner_id: &str) -> RawRecord {
        RawRecord {
            id: Some(Value::String(uuid::Uuid::new_v4().to_string())),
            owner_id: Some(owner_id.to_string()),
            date: self.date,
            amount: self.amount.map(Value::String),
            kind: self.kind,
            description: self.description,
            category: self.category,
            notes: self.notes,
        }
    }
}

/// Load entries for `owner_id` from a CSV file.
///
/// A structurally broken file is an error; individual rows with bad
/// values are rejected and reported in the batch.
pub fn load_csv(csv_path: &Path, owner_id: &str) -> Result<ParsedBatch> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;

    let mut records = Vec::new();
    for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("Failed to read CSV row {}", line + 1))?;
        records.push(row.into_raw(owner_id));
    }

    let batch = parse_records(owner_id, records);
    info!(
        path = %csv_path.display(),
        accepted = batch.entries.len(),
        rejected = batch.rejected.len(),
        "loaded CSV entries"
    );

    Ok(batch)
}
