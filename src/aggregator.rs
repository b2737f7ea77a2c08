// Period Aggregator - per-day income/expense series for the dashboard charts
// Pure functions: no I/O, no state kept between calls

use crate::entry::{EntryKind, FinancialEntry};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// OUTPUT TYPES
// ============================================================================

/// Totals of one calendar day inside the aggregation window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedPeriodPoint {
    pub date: NaiveDate,
    pub income_total: f64,
    pub expense_total: f64,
}

/// One day of a single-kind series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindPoint {
    pub date: NaiveDate,
    pub total: f64,
}

/// Sums over a whole window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

impl PeriodTotals {
    pub fn from_points(points: &[AggregatedPeriodPoint]) -> Self {
        let income: f64 = points.iter().map(|p| p.income_total).sum();
        let expense: f64 = points.iter().map(|p| p.expense_total).sum();
        PeriodTotals {
            income,
            expense,
            balance: income - expense,
        }
    }
}

// ============================================================================
// WINDOWS
// ============================================================================

/// Inclusive calendar-day window `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateWindow { start, end }
    }

    /// Number of days in the window, 0 when `start > end`
    pub fn days(&self) -> usize {
        if self.start > self.end {
            0
        } else {
            (self.end - self.start).num_days() as usize + 1
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// The dashboard's preset look-back ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
    #[default]
    #[serde(rename = "180d")]
    Last180Days,
}

impl TimeRange {
    pub fn days(&self) -> i64 {
        match self {
            TimeRange::Last7Days => 7,
            TimeRange::Last30Days => 30,
            TimeRange::Last90Days => 90,
            TimeRange::Last180Days => 180,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::Last7Days => "7d",
            TimeRange::Last30Days => "30d",
            TimeRange::Last90Days => "90d",
            TimeRange::Last180Days => "180d",
        }
    }

    /// `[today - N days, today]`, i.e. N + 1 calendar days
    pub fn window(&self, today: NaiveDate) -> DateWindow {
        let start = today
            .checked_sub_signed(Duration::days(self.days()))
            .unwrap_or(NaiveDate::MIN);
        DateWindow::new(start, today)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "7d" => Ok(TimeRange::Last7Days),
            "30d" => Ok(TimeRange::Last30Days),
            "90d" => Ok(TimeRange::Last90Days),
            "180d" => Ok(TimeRange::Last180Days),
            other => Err(format!("unknown time range '{}' (expected 7d, 30d, 90d or 180d)", other)),
        }
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Group entries by day and emit one point per day of `[start, end]`.
///
/// Days without entries yield zero totals. Entries whose amount is not a
/// finite non-negative number are skipped; the rest of their day is still
/// summed. Returns an empty series when `start > end`.
pub fn aggregate(
    entries: &[FinancialEntry],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<AggregatedPeriodPoint> {
    let window = DateWindow::new(start, end);
    if window.days() == 0 {
        return Vec::new();
    }

    let mut by_day: HashMap<NaiveDate, (f64, f64)> = HashMap::new();
    for entry in entries {
        let Some(amount) = entry.usable_amount() else {
            continue;
        };
        if !window.contains(entry.date) {
            continue;
        }
        let totals = by_day.entry(entry.date).or_insert((0.0, 0.0));
        match entry.kind {
            EntryKind::Income => totals.0 += amount,
            EntryKind::Expense => totals.1 += amount,
        }
    }

    let mut points = Vec::with_capacity(window.days());
    for date in start.iter_days().take_while(|d| *d <= end) {
        let (income_total, expense_total) = by_day.get(&date).copied().unwrap_or((0.0, 0.0));
        points.push(AggregatedPeriodPoint {
            date,
            income_total,
            expense_total,
        });
    }
    points
}

/// Aggregate over a preset range ending at `today`
pub fn aggregate_range(
    entries: &[FinancialEntry],
    range: TimeRange,
    today: NaiveDate,
) -> Vec<AggregatedPeriodPoint> {
    let window = range.window(today);
    aggregate(entries, window.start, window.end)
}

/// Project an aggregated series onto one kind
pub fn series_for_kind(points: &[AggregatedPeriodPoint], kind: EntryKind) -> Vec<KindPoint> {
    points
        .iter()
        .map(|p| KindPoint {
            date: p.date,
            total: match kind {
                EntryKind::Income => p.income_total,
                EntryKind::Expense => p.expense_total,
            },
        })
        .collect()
}

/// All-time total of one kind, skipping unusable amounts
pub fn total_for_kind(entries: &[FinancialEntry], kind: EntryKind) -> f64 {
    entries
        .iter()
        .filter(|e| e.kind == kind)
        .filter_map(FinancialEntry::usable_amount)
        .sum()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn entry(date: &str, amount: f64, kind: EntryKind) -> FinancialEntry {
        FinancialEntry {
            id: format!("{}-{}-{}", date, kind, amount),
            owner_id: "user-1".to_string(),
            date: day(date),
            amount,
            kind,
            description: String::new(),
            category: String::new(),
            notes: String::new(),
        }
    }

    fn sample_entries() -> Vec<FinancialEntry> {
        vec![
            entry("2024-01-03", 10.0, EntryKind::Income),
            entry("2024-01-01", 100.0, EntryKind::Income),
            entry("2024-01-01", 40.0, EntryKind::Expense),
            entry("2023-12-31", 999.0, EntryKind::Income),
            entry("2024-01-02", 2.25, EntryKind::Expense),
            entry("2024-01-05", 0.5, EntryKind::Expense),
        ]
    }

    #[test]
    fn test_scenario_gap_filled_window() {
        let entries = vec![
            entry("2024-01-01", 100.0, EntryKind::Income),
            entry("2024-01-01", 40.0, EntryKind::Expense),
            entry("2024-01-03", 10.0, EntryKind::Income),
        ];

        let points = aggregate(&entries, day("2024-01-01"), day("2024-01-03"));

        assert_eq!(
            points,
            vec![
                AggregatedPeriodPoint { date: day("2024-01-01"), income_total: 100.0, expense_total: 40.0 },
                AggregatedPeriodPoint { date: day("2024-01-02"), income_total: 0.0, expense_total: 0.0 },
                AggregatedPeriodPoint { date: day("2024-01-03"), income_total: 10.0, expense_total: 0.0 },
            ]
        );
    }

    #[test]
    fn test_malformed_amount_skipped_not_fatal() {
        let entries = vec![
            entry("2024-01-01", 100.0, EntryKind::Income),
            entry("2024-01-01", f64::NAN, EntryKind::Income),
            entry("2024-01-01", f64::INFINITY, EntryKind::Expense),
            entry("2024-01-01", -3.0, EntryKind::Expense),
            entry("2024-01-01", 40.0, EntryKind::Expense),
        ];

        let points = aggregate(&entries, day("2024-01-01"), day("2024-01-01"));

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].income_total, 100.0);
        assert_eq!(points[0].expense_total, 40.0);
    }

    #[test]
    fn test_empty_entries_single_day() {
        let points = aggregate(&[], day("2024-01-01"), day("2024-01-01"));

        assert_eq!(
            points,
            vec![AggregatedPeriodPoint { date: day("2024-01-01"), income_total: 0.0, expense_total: 0.0 }]
        );
    }

    #[test]
    fn test_start_after_end_is_empty() {
        let points = aggregate(&sample_entries(), day("2024-01-05"), day("2024-01-01"));
        assert!(points.is_empty());
    }

    #[test]
    fn test_length_matches_window() {
        let entries = sample_entries();
        let start = day("2023-12-20");
        for span in [0, 1, 6, 30, 59, 365] {
            let end = start + Duration::days(span);
            let points = aggregate(&entries, start, end);
            assert_eq!(points.len(), span as usize + 1, "span of {} days", span);
        }
    }

    #[test]
    fn test_window_across_leap_day() {
        let points = aggregate(&[], day("2024-02-27"), day("2024-03-01"));
        let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
        assert_eq!(
            dates,
            vec![day("2024-02-27"), day("2024-02-28"), day("2024-02-29"), day("2024-03-01")]
        );
    }

    #[test]
    fn test_dates_strictly_ascending_without_gaps() {
        let points = aggregate(&sample_entries(), day("2023-12-25"), day("2024-01-10"));

        assert_eq!(points.first().unwrap().date, day("2023-12-25"));
        assert_eq!(points.last().unwrap().date, day("2024-01-10"));
        for pair in points.windows(2) {
            assert_eq!(pair[1].date - pair[0].date, Duration::days(1));
        }
    }

    #[test]
    fn test_totals_non_negative() {
        let mut entries = sample_entries();
        entries.push(entry("2024-01-04", -50.0, EntryKind::Income));

        for p in aggregate(&entries, day("2023-12-01"), day("2024-01-31")) {
            assert!(p.income_total >= 0.0 && p.expense_total >= 0.0, "{:?}", p);
        }
    }

    #[test]
    fn test_idempotent() {
        let entries = sample_entries();
        let first = aggregate(&entries, day("2024-01-01"), day("2024-01-07"));
        let second = aggregate(&entries, day("2024-01-01"), day("2024-01-07"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_sum_preserved_within_window() {
        let entries = sample_entries();
        let (start, end) = (day("2024-01-01"), day("2024-01-03"));
        let points = aggregate(&entries, start, end);

        let in_window = |k: EntryKind| -> f64 {
            entries
                .iter()
                .filter(|e| e.kind == k && e.date >= start && e.date <= end)
                .map(|e| e.amount)
                .sum()
        };

        let totals = PeriodTotals::from_points(&points);
        assert_eq!(totals.income, in_window(EntryKind::Income));
        assert_eq!(totals.expense, in_window(EntryKind::Expense));
        assert_eq!(totals.income, 110.0, "entry from 2023-12-31 is outside the window");
        assert_eq!(totals.balance, 110.0 - 42.25);
    }

    #[test]
    fn test_inputs_untouched() {
        let entries = sample_entries();
        let before = entries.clone();
        let _ = aggregate(&entries, day("2024-01-01"), day("2024-01-31"));
        assert_eq!(entries, before);
    }

    #[test]
    fn test_serialized_point_shape() {
        let point = AggregatedPeriodPoint {
            date: day("2024-01-01"),
            income_total: 100.0,
            expense_total: 0.0,
        };
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"date": "2024-01-01", "incomeTotal": 100.0, "expenseTotal": 0.0})
        );
    }

    #[test]
    fn test_time_range_windows() {
        let today = day("2024-07-31");

        let w = TimeRange::Last30Days.window(today);
        assert_eq!(w.start, day("2024-07-01"));
        assert_eq!(w.end, today);
        assert_eq!(w.days(), 31);

        assert_eq!(TimeRange::Last7Days.window(today).days(), 8);
        assert_eq!(aggregate_range(&[], TimeRange::Last90Days, today).len(), 91);
        assert_eq!(TimeRange::default(), TimeRange::Last180Days);
    }

    #[test]
    fn test_time_range_parse() {
        assert_eq!("7d".parse::<TimeRange>().unwrap(), TimeRange::Last7Days);
        assert_eq!("180D".parse::<TimeRange>().unwrap(), TimeRange::Last180Days);
        assert!("1y".parse::<TimeRange>().is_err());
        assert_eq!(TimeRange::Last90Days.to_string(), "90d");
    }

    #[test]
    fn test_date_window_contains() {
        let w = DateWindow::new(day("2024-01-01"), day("2024-01-03"));
        assert!(w.contains(day("2024-01-01")));
        assert!(w.contains(day("2024-01-03")));
        assert!(!w.contains(day("2024-01-04")));
        assert_eq!(DateWindow::new(day("2024-01-03"), day("2024-01-01")).days(), 0);
    }

    #[test]
    fn test_series_for_kind() {
        let points = aggregate(&sample_entries(), day("2024-01-01"), day("2024-01-03"));

        let income = series_for_kind(&points, EntryKind::Income);
        let totals: Vec<f64> = income.iter().map(|p| p.total).collect();
        assert_eq!(totals, vec![100.0, 0.0, 10.0]);

        let expense = series_for_kind(&points, EntryKind::Expense);
        assert_eq!(expense[1].total, 2.25);
    }

    #[test]
    fn test_total_for_kind_ignores_window_and_bad_amounts() {
        let mut entries = sample_entries();
        entries.push(entry("2024-01-01", f64::NAN, EntryKind::Income));

        assert_eq!(total_for_kind(&entries, EntryKind::Income), 1109.0);
        assert_eq!(total_for_kind(&entries, EntryKind::Expense), 42.75);
        assert_eq!(total_for_kind(&[], EntryKind::Income), 0.0);
    }
}
