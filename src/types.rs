//! Core types and data structures for the transaction ledger

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque account identifier.
///
/// Parsed and validated once at the system boundary; graph and balance
/// logic never sees raw strings. Account ids are code-like: non-empty,
/// at most 50 characters, alphanumeric plus dashes and underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Parse and validate a raw account id.
    pub fn parse(raw: &str) -> LedgerResult<Self> {
        if raw.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account ID cannot be empty".to_string(),
            ));
        }
        if raw.len() > 50 {
            return Err(LedgerError::Validation(
                "Account ID cannot exceed 50 characters".to_string(),
            ));
        }
        if !raw
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(LedgerError::Validation(format!(
                "Account ID '{}' contains invalid characters",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = LedgerError;

    fn try_from(raw: String) -> LedgerResult<Self> {
        Self::parse(&raw)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque transaction group identifier.
///
/// The persisted form is a 24-character hex string. Malformed ids are
/// rejected here, at the boundary, rather than deep in the graph
/// resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(String);

impl TransactionId {
    /// Parse and validate a raw transaction id.
    pub fn parse(raw: &str) -> LedgerResult<Self> {
        if raw.len() != 24 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LedgerError::Validation(format!(
                "Transaction ID '{}' is not a 24-character hex identifier",
                raw
            )));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    /// Generate a fresh collision-resistant id.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(hex[..24].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TransactionId {
    type Error = LedgerError;

    fn try_from(raw: String) -> LedgerResult<Self> {
        Self::parse(&raw)
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account types following standard accounting principles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Assets - what the business owns (Cash, Inventory, Equipment, etc.)
    Asset,
    /// Liabilities - what the business owes (Loans, Accounts Payable, etc.)
    Liability,
    /// Equity - owner's interest in the business (Capital, Retained Earnings, etc.)
    Equity,
    /// Revenue - money earned by the business
    Revenue,
    /// Expenses - costs incurred by the business
    Expense,
}

impl AccountType {
    /// Returns the normal balance side for this account type.
    /// Assets and Expenses normally carry debit balances; Liabilities,
    /// Equity, and Revenue normally carry credit balances.
    pub fn normal_balance(&self) -> NormalBalance {
        match self {
            AccountType::Asset | AccountType::Expense => NormalBalance::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                NormalBalance::Credit
            }
        }
    }
}

/// The side on which an account naturally increases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    Debit,
    Credit,
}

/// Lifecycle status of a transaction group.
///
/// Draft groups are editable and may be unbalanced while being worked
/// on. Confirmed groups are locked and participate in availability
/// figures. Cancelled is terminal; the record is kept for historical
/// integrity but is excluded from all availability calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Draft,
    Confirmed,
    Cancelled,
}

impl TransactionStatus {
    /// Returns true if the group can be modified or deleted.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Returns true if the group counts toward funding consumption.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Returns true if no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Core account structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account
    pub id: AccountId,
    /// Chart-of-accounts code (e.g. "1000")
    pub code: String,
    /// Human-readable account name
    pub name: String,
    /// Type of account (Asset, Liability, etc.)
    pub account_type: AccountType,
    /// Side on which this account increases; derived from the type
    /// unless overridden for contra accounts
    pub normal_balance: NormalBalance,
    /// Opening balance the aggregator builds on
    pub initial_balance: BigDecimal,
    /// ISO currency code
    pub currency: String,
    /// Optional parent account for hierarchical chart of accounts
    pub parent_id: Option<AccountId>,
    /// Tenant scope
    pub organization_id: Option<String>,
    /// Soft-deactivation flag; accounts referenced by entries are
    /// never hard-deleted
    pub active: bool,
    /// When the account was created
    pub created_at: NaiveDateTime,
    /// When the account was last updated
    pub updated_at: NaiveDateTime,
}

impl Account {
    /// Create a new active account with the type's normal balance.
    pub fn new(
        id: AccountId,
        code: String,
        name: String,
        account_type: AccountType,
        parent_id: Option<AccountId>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            code,
            name,
            normal_balance: account_type.normal_balance(),
            account_type,
            initial_balance: BigDecimal::from(0),
            currency: "INR".to_string(),
            parent_id,
            organization_id: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Override the normal balance side (contra accounts).
    pub fn with_normal_balance(mut self, normal_balance: NormalBalance) -> Self {
        self.normal_balance = normal_balance;
        self
    }

    /// Set the opening balance.
    pub fn with_initial_balance(mut self, initial_balance: BigDecimal) -> Self {
        self.initial_balance = initial_balance;
        self
    }

    /// Set the currency.
    pub fn with_currency(mut self, currency: String) -> Self {
        self.currency = currency;
        self
    }

    /// Signed effect of an entry on this account's balance:
    /// positive on the normal side, negative on the opposite side.
    pub fn signed_effect(&self, entry: &AccountingEntry) -> BigDecimal {
        match self.normal_balance {
            NormalBalance::Debit => &entry.debit_amount - &entry.credit_amount,
            NormalBalance::Credit => &entry.credit_amount - &entry.debit_amount,
        }
    }
}

/// One debit or credit line embedded in a transaction group.
///
/// Entries never exist independently; the owning group is the unit of
/// consistency. A complete entry has exactly one non-zero side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingEntry {
    /// Ordering key within the group, starting at 1
    pub sequence: u32,
    /// Account being affected
    pub account_id: AccountId,
    /// Debit amount (zero for credit lines)
    pub debit_amount: BigDecimal,
    /// Credit amount (zero for debit lines)
    pub credit_amount: BigDecimal,
    /// Optional description for this specific line
    pub description: Option<String>,
    /// Optional category reference
    pub category_id: Option<String>,
    /// Documents which upstream transaction paid for this line.
    /// Informational; availability math works on group-level references.
    pub source_transaction_id: Option<TransactionId>,
}

impl AccountingEntry {
    /// Create a debit line. The sequence is assigned by the store.
    pub fn debit(account_id: AccountId, amount: BigDecimal) -> Self {
        Self {
            sequence: 0,
            account_id,
            debit_amount: amount,
            credit_amount: BigDecimal::from(0),
            description: None,
            category_id: None,
            source_transaction_id: None,
        }
    }

    /// Create a credit line. The sequence is assigned by the store.
    pub fn credit(account_id: AccountId, amount: BigDecimal) -> Self {
        Self {
            sequence: 0,
            account_id,
            debit_amount: BigDecimal::from(0),
            credit_amount: amount,
            description: None,
            category_id: None,
            source_transaction_id: None,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_category(mut self, category_id: String) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Record which upstream transaction funded this line.
    pub fn funded_by(mut self, source: TransactionId) -> Self {
        self.source_transaction_id = Some(source);
        self
    }

    /// True if both sides are zero (a placeholder line).
    pub fn is_empty(&self) -> bool {
        let zero = BigDecimal::from(0);
        self.debit_amount == zero && self.credit_amount == zero
    }

    /// True if both sides are non-zero (always invalid).
    pub fn has_both_sides(&self) -> bool {
        let zero = BigDecimal::from(0);
        self.debit_amount != zero && self.credit_amount != zero
    }
}

/// The atomic unit of the ledger: a balanced set of entries plus the
/// funding references tying it into the cross-transaction graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionGroup {
    /// Unique identifier
    pub id: TransactionId,
    /// Human-readable unique number, allocated by the store
    pub group_number: String,
    /// Description of the transaction
    pub description: String,
    /// Date when the transaction occurred
    pub transaction_date: NaiveDate,
    /// Tenant scope
    pub organization_id: Option<String>,
    /// Sum of debit amounts across entries; recomputed on every write
    pub total_amount: BigDecimal,
    /// Lifecycle status
    pub status: TransactionStatus,
    /// Ordered entries (2+ required to confirm)
    pub entries: Vec<AccountingEntry>,
    /// The single transaction that originally funded this one
    pub source_transaction_id: Option<TransactionId>,
    /// Transactions this group in turn funds (forward edges)
    pub linked_transaction_ids: Vec<TransactionId>,
    /// Who created the group
    pub created_by: Option<String>,
    /// When the group was created
    pub created_at: NaiveDateTime,
    /// When the group was last updated
    pub updated_at: NaiveDateTime,
    /// Optimistic-concurrency counter; bumped by the store on every
    /// successful write
    pub version: u64,
}

impl TransactionGroup {
    /// Sum of all debit amounts.
    pub fn total_debits(&self) -> BigDecimal {
        self.entries.iter().map(|e| &e.debit_amount).sum()
    }

    /// Sum of all credit amounts.
    pub fn total_credits(&self) -> BigDecimal {
        self.entries.iter().map(|e| &e.credit_amount).sum()
    }

    /// The deduplicated set of transactions this group draws funding
    /// from: the primary source plus any linked references, in the
    /// order they appear. Self-references are skipped; the resolver
    /// reports them as integrity anomalies.
    pub fn funding_sources(&self) -> Vec<TransactionId> {
        let mut sources = Vec::new();
        let candidates = self
            .source_transaction_id
            .iter()
            .chain(self.linked_transaction_ids.iter());
        for id in candidates {
            if *id != self.id && !sources.contains(id) {
                sources.push(id.clone());
            }
        }
        sources
    }

    /// True if this group references `id` as a funding source.
    pub fn references(&self, id: &TransactionId) -> bool {
        self.source_transaction_id.as_ref() == Some(id)
            || self.linked_transaction_ids.contains(id)
    }
}

/// Errors that can occur in the ledger system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid state transition: {0}")]
    StateTransition(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Funding graph integrity: {0}")]
    GraphIntegrity(String),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
