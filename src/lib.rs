// Lançamentos - Core Library
// Daily income/expense entries, boundary parsing, and the chart aggregation routine

pub mod entry;
pub mod parser;
pub mod aggregator;
pub mod db;
pub mod currency;
pub mod config;
pub mod logging;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use entry::{EntryDraft, EntryKind, FinancialEntry, KindFilter};
pub use parser::{
    load_csv, parse_amount, parse_date, parse_json_rows, parse_record, parse_records,
    ParsedBatch, RawRecord, RecordError, RejectedRecord,
};
pub use aggregator::{
    aggregate, aggregate_range, series_for_kind, total_for_kind,
    AggregatedPeriodPoint, DateWindow, KindPoint, PeriodTotals, TimeRange,
};
pub use db::{
    EntryAction, EntryEvent, EntrySnapshot, ImportSummary,
    setup_database, insert_entry, insert_entries, update_entry, delete_entry,
    get_entry, list_entries, entries_between, count_entries,
    compute_import_hash, record_event, events_for_entry,
};
pub use currency::format_brl;
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
