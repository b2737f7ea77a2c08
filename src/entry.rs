// Entry Model - daily financial entries ("lançamentos")
// Strictly typed shapes handed to the aggregator and the store

use crate::parser::RecordError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENTRY KIND
// ============================================================================

/// Income ("receita") or expense ("despesa"). Mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[serde(alias = "receita")]
    Income,
    #[serde(alias = "despesa")]
    Expense,
}

impl EntryKind {
    /// Parse a kind label, accepting the store's Portuguese labels too.
    pub fn from_label(label: &str) -> Option<EntryKind> {
        match label.trim().to_lowercase().as_str() {
            "income" | "receita" => Some(EntryKind::Income),
            "expense" | "despesa" => Some(EntryKind::Expense),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Income => "income",
            EntryKind::Expense => "expense",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// FINANCIAL ENTRY
// ============================================================================

/// One recorded transaction of a single owner on a calendar day.
///
/// `amount` is in currency units (BRL), not minor units. Entries built by
/// `parser::parse_record` always carry a finite, non-negative amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialEntry {
    pub id: String,
    pub owner_id: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub kind: EntryKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub notes: String,
}

impl FinancialEntry {
    /// Build a new entry with a fresh UUID from user-supplied fields
    pub fn from_draft(owner_id: &str, draft: &EntryDraft) -> Self {
        FinancialEntry {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            date: draft.date,
            amount: draft.amount,
            kind: draft.kind,
            description: draft.description.clone(),
            category: draft.category.clone(),
            notes: draft.notes.clone(),
        }
    }

    /// Amount usable in a sum: finite and non-negative
    pub fn usable_amount(&self) -> Option<f64> {
        if self.amount.is_finite() && self.amount >= 0.0 {
            Some(self.amount)
        } else {
            None
        }
    }
}

// ============================================================================
// ENTRY DRAFT
// ============================================================================

/// The editable fields of an entry, used for inserts and updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub date: NaiveDate,
    pub amount: f64,
    pub kind: EntryKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub notes: String,
}

impl EntryDraft {
    pub fn validate(&self) -> Result<(), RecordError> {
        if !self.amount.is_finite() {
            return Err(RecordError::InvalidAmount(self.amount.to_string()));
        }
        if self.amount < 0.0 {
            return Err(RecordError::NegativeAmount(self.amount));
        }
        Ok(())
    }
}

// ============================================================================
// LISTING FILTER
// ============================================================================

/// Filter for the entries table: everything, or one kind only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindFilter {
    #[default]
    All,
    Only(EntryKind),
}

impl KindFilter {
    pub fn matches(&self, kind: EntryKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Only(k) => *k == kind,
        }
    }
}

impl FromStr for KindFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(KindFilter::All);
        }
        EntryKind::from_label(s)
            .map(KindFilter::Only)
            .ok_or_else(|| format!("unknown kind filter '{}' (expected all, income or expense)", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(amount: f64) -> EntryDraft {
        EntryDraft {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            amount,
            kind: EntryKind::Income,
            description: "Venda".to_string(),
            category: "vendas".to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(EntryKind::from_label("receita"), Some(EntryKind::Income));
        assert_eq!(EntryKind::from_label(" Despesa "), Some(EntryKind::Expense));
        assert_eq!(EntryKind::from_label("EXPENSE"), Some(EntryKind::Expense));
        assert_eq!(EntryKind::from_label("transfer"), None);
    }

    #[test]
    fn test_kind_serde_accepts_store_labels() {
        let kind: EntryKind = serde_json::from_str("\"despesa\"").unwrap();
        assert_eq!(kind, EntryKind::Expense);
        assert_eq!(serde_json::to_string(&EntryKind::Income).unwrap(), "\"income\"");
    }

    #[test]
    fn test_draft_validation() {
        assert!(draft(10.5).validate().is_ok());
        assert!(draft(0.0).validate().is_ok());
        assert!(matches!(draft(-1.0).validate(), Err(RecordError::NegativeAmount(_))));
        assert!(matches!(draft(f64::NAN).validate(), Err(RecordError::InvalidAmount(_))));
        assert!(draft(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_from_draft_assigns_identity() {
        let d = draft(25.0);
        let a = FinancialEntry::from_draft("user-1", &d);
        let b = FinancialEntry::from_draft("user-1", &d);

        assert_eq!(a.owner_id, "user-1");
        assert_eq!(a.amount, 25.0);
        assert_ne!(a.id, b.id, "each entry gets its own id");
    }

    #[test]
    fn test_kind_filter() {
        assert_eq!("all".parse::<KindFilter>().unwrap(), KindFilter::All);
        assert_eq!(
            "receita".parse::<KindFilter>().unwrap(),
            KindFilter::Only(EntryKind::Income)
        );
        assert!("whatever".parse::<KindFilter>().is_err());

        assert!(KindFilter::All.matches(EntryKind::Expense));
        assert!(!KindFilter::Only(EntryKind::Income).matches(EntryKind::Expense));
    }
}
