//! Entry validation: the pure balance checker and field-level rules

use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// Rounding tolerance under which debit and credit totals count as
/// balanced (one currency minor unit).
pub fn balance_tolerance() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

/// Result of checking a set of entries for double-entry balance.
///
/// This is the pre-submit contract: clients may call it on a draft at
/// any time, and the store runs it before a confirm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceCheck {
    /// True iff |total_debit - total_credit| is within tolerance
    pub is_balanced: bool,
    /// Sum of all debit amounts
    pub total_debit: BigDecimal,
    /// Sum of all credit amounts
    pub total_credit: BigDecimal,
    /// total_debit - total_credit
    pub difference: BigDecimal,
    /// Structural problems, one message per offending rule
    pub errors: Vec<String>,
}

impl BalanceCheck {
    /// True when the entries are both structurally sound and balanced.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.is_balanced
    }
}

/// Check a set of entries for structural soundness and balance.
///
/// Pure function, no storage access: account ids are known non-empty by
/// construction, but whether they resolve is checked by the store-level
/// validator. Rules: at least two entries; each entry carries exactly
/// one non-zero, non-negative side.
pub fn check_entries(entries: &[AccountingEntry]) -> BalanceCheck {
    let zero = BigDecimal::from(0);
    let mut errors = Vec::new();

    if entries.len() < 2 {
        errors.push("At least two entries are required for double-entry bookkeeping".to_string());
    }

    // Entries are numbered by position: builder output arrives before
    // the store assigns sequences.
    for (index, entry) in entries.iter().enumerate() {
        let line = index + 1;
        if entry.debit_amount < zero || entry.credit_amount < zero {
            errors.push(format!("Entry {} has a negative amount", line));
        }
        if entry.is_empty() {
            errors.push(format!(
                "Entry {} has neither a debit nor a credit amount",
                line
            ));
        }
        if entry.has_both_sides() {
            errors.push(format!("Entry {} sets both debit and credit amounts", line));
        }
    }

    let total_debit: BigDecimal = entries.iter().map(|e| &e.debit_amount).sum();
    let total_credit: BigDecimal = entries.iter().map(|e| &e.credit_amount).sum();
    let difference = &total_debit - &total_credit;
    let is_balanced = difference.abs() < balance_tolerance();

    BalanceCheck {
        is_balanced,
        total_debit,
        total_credit,
        difference,
        errors,
    }
}

/// Validate that a transaction description is usable
pub fn validate_description(description: &str) -> LedgerResult<()> {
    if description.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Description cannot be empty".to_string(),
        ));
    }
    if description.len() > 500 {
        return Err(LedgerError::Validation(
            "Description cannot exceed 500 characters".to_string(),
        ));
    }
    Ok(())
}

/// Group validator with the full structural rule set: default rules
/// plus description limits and duplicate account/side detection.
pub struct EnhancedGroupValidator;

impl GroupValidator for EnhancedGroupValidator {
    fn validate_structure(&self, group: &TransactionGroup) -> LedgerResult<()> {
        DefaultGroupValidator.validate_structure(group)?;
        validate_description(&group.description)?;

        // The same account cannot appear twice on the same side.
        let mut seen = std::collections::HashSet::new();
        let zero = BigDecimal::from(0);
        for entry in &group.entries {
            let side = entry.debit_amount > zero;
            if !seen.insert((&entry.account_id, side)) {
                return Err(LedgerError::Validation(format!(
                    "Account '{}' appears multiple times on the same side",
                    entry.account_id
                )));
            }
        }
        Ok(())
    }
}
