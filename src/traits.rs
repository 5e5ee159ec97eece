//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::*;

/// Storage abstraction for the ledger system
///
/// This trait allows the ledger core to work with any storage backend
/// (PostgreSQL, MySQL, SQLite, in-memory, etc.) by implementing these
/// methods. The TransactionGroup is the unit of consistency: every
/// group write is conditional on the caller-supplied `version` so that
/// concurrent writers are serialized (the loser receives
/// [`LedgerError::Conflict`]).
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Save a new account to storage
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Get an account by ID
    async fn get_account(&self, account_id: &AccountId) -> LedgerResult<Option<Account>>;

    /// List all accounts, optionally filtered by type
    async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>>;

    /// Update an existing account
    async fn update_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Insert a new transaction group. Fails with a validation error
    /// if the id or group number already exists.
    async fn insert_group(&mut self, group: &TransactionGroup) -> LedgerResult<()>;

    /// Get a transaction group by ID
    async fn get_group(&self, id: &TransactionId) -> LedgerResult<Option<TransactionGroup>>;

    /// List all transaction groups
    async fn list_groups(&self) -> LedgerResult<Vec<TransactionGroup>>;

    /// Groups whose funding-source set (sourceTransactionId or
    /// linkedTransactionIds) contains `id`, i.e. the direct consumers.
    async fn find_consumers(&self, id: &TransactionId) -> LedgerResult<Vec<TransactionGroup>>;

    /// Groups with at least one entry touching `account_id`, optionally
    /// bounded by transaction date.
    async fn find_account_groups(
        &self,
        account_id: &AccountId,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<Vec<TransactionGroup>>;

    /// Conditionally update a group. `group.version` must equal the
    /// stored version; on success the stored copy carries
    /// `group.version + 1`. A mismatch yields
    /// [`LedgerError::Conflict`] and leaves storage untouched.
    async fn update_group(&mut self, group: &TransactionGroup) -> LedgerResult<TransactionGroup>;

    /// Atomically revert a confirmed group to draft. `version` must
    /// match the stored version (a mismatch yields
    /// [`LedgerError::Conflict`]). Fails with a state-transition error
    /// if the group is not confirmed or any non-cancelled group still
    /// references it as a funding source. The consumer check and the
    /// status write are one step; a consumer inserted after the caller
    /// read the group still blocks the unlock.
    async fn unlock_group(
        &mut self,
        id: &TransactionId,
        version: u64,
    ) -> LedgerResult<TransactionGroup>;

    /// Remove a draft group outright. Fails with a state-transition
    /// error if the group is not a draft or any non-cancelled group
    /// references it as a funding source; the dependency check and the
    /// removal are one atomic step.
    async fn delete_group(&mut self, id: &TransactionId) -> LedgerResult<()>;

    /// Allocate the next human-readable group number (unique per store).
    async fn next_group_number(&mut self) -> LedgerResult<String>;
}

/// Trait for implementing custom account validation rules
pub trait AccountValidator: Send + Sync {
    /// Validate an account before saving
    fn validate_account(&self, account: &Account) -> LedgerResult<()>;
}

/// Trait for implementing custom transaction group validation rules.
///
/// Structural rules gate every write (drafts included); the full
/// balance check runs on confirm and through the pre-submit validator.
pub trait GroupValidator: Send + Sync {
    /// Validate the structural rules that hold even for drafts:
    /// non-negative amounts, no entry with both sides set.
    fn validate_structure(&self, group: &TransactionGroup) -> LedgerResult<()>;
}

/// Default account validator with basic rules
pub struct DefaultAccountValidator;

impl AccountValidator for DefaultAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        if account.name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account name cannot be empty".to_string(),
            ));
        }
        if account.code.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account code cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default group validator enforcing the draft-safe structural rules
pub struct DefaultGroupValidator;

impl GroupValidator for DefaultGroupValidator {
    fn validate_structure(&self, group: &TransactionGroup) -> LedgerResult<()> {
        let zero = bigdecimal::BigDecimal::from(0);
        for entry in &group.entries {
            if entry.debit_amount < zero || entry.credit_amount < zero {
                return Err(LedgerError::Validation(format!(
                    "Entry {} has a negative amount",
                    entry.sequence
                )));
            }
            if entry.has_both_sides() {
                return Err(LedgerError::Validation(format!(
                    "Entry {} sets both debit and credit amounts",
                    entry.sequence
                )));
            }
        }
        Ok(())
    }
}
