use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use lancamentos::{
    aggregate, count_entries, delete_entry, entries_between, format_brl, insert_entries,
    insert_entry, list_entries, load_csv, logging, parse_date, series_for_kind, setup_database,
    total_for_kind, update_entry, Config, EntryDraft, EntryKind, KindFilter, PeriodTotals,
    TimeRange,
};

#[derive(Parser)]
#[command(name = "lancamentos")]
#[command(about = "Daily income/expense entries and chart series", long_about = None)]
struct Cli {
    /// SQLite database path (overrides LANCAMENTOS_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import entries from a CSV file (date,description,amount,kind,category,notes)
    Import {
        csv: PathBuf,
        #[arg(long)]
        owner: String,
    },

    /// List entries, newest first
    List {
        #[arg(long)]
        owner: String,
        /// all, income/receita or expense/despesa
        #[arg(long, default_value = "all")]
        kind: KindFilter,
    },

    /// Record a new entry
    Add {
        #[arg(long)]
        owner: String,
        #[command(flatten)]
        fields: DraftArgs,
    },

    /// Replace the fields of an existing entry
    Edit {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        id: String,
        #[command(flatten)]
        fields: DraftArgs,
    },

    /// Delete an entry
    Delete {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        id: String,
    },

    /// Print the gap-filled daily series for a window
    Chart {
        #[arg(long)]
        owner: String,
        #[command(flatten)]
        window: WindowArgs,
        /// Only show one kind
        #[arg(long)]
        kind: Option<String>,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Totals for a window plus all-time income
    Summary {
        #[arg(long)]
        owner: String,
        #[command(flatten)]
        window: WindowArgs,
    },
}

#[derive(Args)]
struct DraftArgs {
    /// YYYY-MM-DD
    #[arg(long)]
    date: String,
    #[arg(long)]
    amount: f64,
    /// income/receita or expense/despesa
    #[arg(long)]
    kind: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "")]
    category: String,
    #[arg(long, default_value = "")]
    notes: String,
}

impl DraftArgs {
    fn into_draft(self) -> Result<EntryDraft> {
        Ok(EntryDraft {
            date: parse_date(&self.date)?,
            amount: self.amount,
            kind: parse_kind(&self.kind)?,
            description: self.description,
            category: self.category,
            notes: self.notes,
        })
    }
}

#[derive(Args)]
struct WindowArgs {
    /// 7d, 30d, 90d or 180d (defaults to LANCAMENTOS_RANGE)
    #[arg(long)]
    range: Option<TimeRange>,
    /// Last day of the window, defaults to today
    #[arg(long)]
    end: Option<String>,
}

impl WindowArgs {
    fn resolve(&self, default_range: TimeRange) -> Result<(TimeRange, NaiveDate, NaiveDate)> {
        let range = self.range.unwrap_or(default_range);
        let end = match &self.end {
            Some(e) => parse_date(e)?,
            None => Local::now().date_naive(),
        };
        let window = range.window(end);
        Ok((range, window.start, window.end))
    }
}

fn parse_kind(label: &str) -> Result<EntryKind> {
    EntryKind::from_label(label).ok_or_else(|| anyhow!("unknown kind '{}'", label))
}

fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

fn main() -> Result<()> {
    logging::init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let conn = open_database(&config.db_path)?;

    match cli.command {
        Commands::Import { csv, owner } => run_import(&conn, &csv, &owner),
        Commands::List { owner, kind } => run_list(&conn, &owner, kind),
        Commands::Add { owner, fields } => {
            let entry = insert_entry(&conn, &owner, &fields.into_draft()?)?;
            println!("✓ Added {} ({})", entry.id, format_brl(entry.amount));
            Ok(())
        }
        Commands::Edit { owner, id, fields } => {
            if !update_entry(&conn, &owner, &id, &fields.into_draft()?)? {
                return Err(anyhow!("entry {} not found for owner {}", id, owner));
            }
            println!("✓ Updated {}", id);
            Ok(())
        }
        Commands::Delete { owner, id } => {
            if !delete_entry(&conn, &owner, &id)? {
                return Err(anyhow!("entry {} not found for owner {}", id, owner));
            }
            println!("✓ Deleted {}", id);
            Ok(())
        }
        Commands::Chart { owner, window, kind, json } => {
            let (_, start, end) = window.resolve(config.default_range)?;
            let kind = kind.as_deref().map(parse_kind).transpose()?;
            run_chart(&conn, &owner, start, end, kind, json)
        }
        Commands::Summary { owner, window } => {
            let (range, start, end) = window.resolve(config.default_range)?;
            run_summary(&conn, &owner, range, start, end)
        }
    }
}

fn run_import(conn: &Connection, csv: &Path, owner: &str) -> Result<()> {
    println!("📂 Loading {}...", csv.display());
    let batch = load_csv(csv, owner)?;
    for rejected in &batch.rejected {
        eprintln!("  ⚠ row {} skipped: {}", rejected.index + 1, rejected.error);
    }

    let summary = insert_entries(conn, &batch.entries)?;
    println!("✓ Inserted: {} entries", summary.inserted);
    println!("✓ Skipped duplicates: {}", summary.duplicates);
    println!("✓ Owner {} now has {} entries", owner, count_entries(conn, owner)?);
    Ok(())
}

fn run_list(conn: &Connection, owner: &str, filter: KindFilter) -> Result<()> {
    let entries = list_entries(conn, owner, filter)?;
    if entries.is_empty() {
        println!("No entries.");
        return Ok(());
    }

    println!("{:<10}  {:<8}  {:>14}  {:<12}  {}", "Date", "Kind", "Amount", "Category", "Description");
    for e in &entries {
        println!(
            "{:<10}  {:<8}  {:>14}  {:<12}  {}",
            e.date,
            e.kind,
            format_brl(e.amount),
            e.category,
            e.description
        );
    }
    println!("{} entries", entries.len());
    Ok(())
}

fn run_chart(
    conn: &Connection,
    owner: &str,
    start: NaiveDate,
    end: NaiveDate,
    kind: Option<EntryKind>,
    json: bool,
) -> Result<()> {
    let entries = entries_between(conn, owner, start, end)?;
    let points = aggregate(&entries, start, end);

    match (kind, json) {
        (Some(k), true) => println!("{}", serde_json::to_string_pretty(&series_for_kind(&points, k))?),
        (None, true) => println!("{}", serde_json::to_string_pretty(&points)?),
        (Some(k), false) => {
            for p in series_for_kind(&points, k) {
                println!("{}  {:>14}", p.date, format_brl(p.total));
            }
        }
        (None, false) => {
            println!("{:<10}  {:>14}  {:>14}", "Date", "Income", "Expense");
            for p in &points {
                println!(
                    "{:<10}  {:>14}  {:>14}",
                    p.date,
                    format_brl(p.income_total),
                    format_brl(p.expense_total)
                );
            }
        }
    }
    Ok(())
}

fn run_summary(conn: &Connection, owner: &str, range: TimeRange, start: NaiveDate, end: NaiveDate) -> Result<()> {
    let entries = entries_between(conn, owner, start, end)?;
    let totals = PeriodTotals::from_points(&aggregate(&entries, start, end));
    let income = list_entries(conn, owner, KindFilter::Only(EntryKind::Income))?;

    println!("📊 {} ({} → {})", range, start, end);
    println!("   Income:  {}", format_brl(totals.income));
    println!("   Expense: {}", format_brl(totals.expense));
    println!("   Balance: {}", format_brl(totals.balance));
    println!("   All-time income: {}", format_brl(total_for_kind(&income, EntryKind::Income)));
    Ok(())
}
