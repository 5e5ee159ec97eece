//! Transaction group lifecycle: CRUD, the status state machine, and
//! funding-reference maintenance

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing::debug;

use crate::ledger::funding::FundingResolver;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{check_entries, validate_description, BalanceCheck};

/// Input for creating a new transaction group. The store generates
/// the id, group number and totals.
#[derive(Debug, Clone)]
pub struct NewTransactionGroup {
    pub description: String,
    pub transaction_date: NaiveDate,
    pub organization_id: Option<String>,
    pub entries: Vec<AccountingEntry>,
    pub source_transaction_id: Option<TransactionId>,
    pub linked_transaction_ids: Vec<TransactionId>,
    pub created_by: Option<String>,
}

/// Partial update applied to a draft group. `None` leaves the field
/// untouched; the nested option on the funding source distinguishes
/// "clear it" from "keep it".
#[derive(Debug, Clone, Default)]
pub struct TransactionGroupPatch {
    pub description: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub entries: Option<Vec<AccountingEntry>>,
    pub source_transaction_id: Option<Option<TransactionId>>,
    pub linked_transaction_ids: Option<Vec<TransactionId>>,
}

/// Transaction manager owning the write path of the ledger.
///
/// Drafts may be unbalanced while being edited; balance is enforced at
/// confirm time. Every write goes through the storage version check,
/// so concurrent confirm/cancel pairs serialize instead of corrupting
/// status.
pub struct TransactionManager<S: LedgerStorage + Clone> {
    storage: S,
    resolver: FundingResolver<S>,
    validator: Box<dyn GroupValidator>,
}

impl<S: LedgerStorage + Clone> TransactionManager<S> {
    /// Create a new transaction manager
    pub fn new(storage: S) -> Self {
        Self {
            resolver: FundingResolver::new(storage.clone()),
            storage,
            validator: Box::new(DefaultGroupValidator),
        }
    }

    /// Create a new transaction manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn GroupValidator>) -> Self {
        Self {
            resolver: FundingResolver::new(storage.clone()),
            storage,
            validator,
        }
    }

    /// Create a draft group.
    ///
    /// Balance is not required yet, but entries must be individually
    /// well-formed, every account must resolve to an active account,
    /// and the funding references must exist without closing a cycle.
    pub async fn create(&mut self, new: NewTransactionGroup) -> LedgerResult<TransactionGroup> {
        validate_description(&new.description)?;

        let id = TransactionId::generate();
        let group_number = self.storage.next_group_number().await?;
        let now = chrono::Utc::now().naive_utc();

        let mut entries = new.entries;
        resequence(&mut entries);

        let mut group = TransactionGroup {
            id: id.clone(),
            group_number,
            description: new.description,
            transaction_date: new.transaction_date,
            organization_id: new.organization_id,
            total_amount: BigDecimal::from(0),
            status: TransactionStatus::Draft,
            entries,
            source_transaction_id: new.source_transaction_id,
            linked_transaction_ids: new.linked_transaction_ids,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        group.total_amount = group.total_debits();

        self.validator.validate_structure(&group)?;
        self.check_account_references(&group).await?;
        self.check_funding_references(&group).await?;

        self.storage.insert_group(&group).await?;
        debug!(group = %group.id, number = %group.group_number, "created draft group");
        Ok(group)
    }

    /// Get a group by ID
    pub async fn get(&self, id: &TransactionId) -> LedgerResult<Option<TransactionGroup>> {
        self.storage.get_group(id).await
    }

    /// Get a group by ID, returning an error if not found
    pub async fn get_required(&self, id: &TransactionId) -> LedgerResult<TransactionGroup> {
        self.storage
            .get_group(id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(id.to_string()))
    }

    /// Apply a patch to a draft group. Totals are recomputed and the
    /// write is conditional on the version read here.
    pub async fn update(
        &mut self,
        id: &TransactionId,
        patch: TransactionGroupPatch,
    ) -> LedgerResult<TransactionGroup> {
        let mut group = self.get_required(id).await?;
        if !group.status.is_editable() {
            return Err(LedgerError::StateTransition(format!(
                "Only draft groups can be edited; '{}' is {}",
                id, group.status
            )));
        }

        if let Some(description) = patch.description {
            validate_description(&description)?;
            group.description = description;
        }
        if let Some(date) = patch.transaction_date {
            group.transaction_date = date;
        }
        if let Some(mut entries) = patch.entries {
            resequence(&mut entries);
            group.entries = entries;
        }
        if let Some(source) = patch.source_transaction_id {
            group.source_transaction_id = source;
        }
        if let Some(linked) = patch.linked_transaction_ids {
            group.linked_transaction_ids = linked;
        }
        group.total_amount = group.total_debits();
        group.updated_at = chrono::Utc::now().naive_utc();

        self.validator.validate_structure(&group)?;
        self.check_account_references(&group).await?;
        self.check_funding_references(&group).await?;

        self.storage.update_group(&group).await
    }

    /// Confirm a balanced draft. Confirming anything but a draft is an
    /// error, including a second confirm of the same group.
    pub async fn confirm(&mut self, id: &TransactionId) -> LedgerResult<TransactionGroup> {
        let mut group = self.get_required(id).await?;
        if group.status != TransactionStatus::Draft {
            return Err(LedgerError::StateTransition(format!(
                "Only draft groups can be confirmed; '{}' is {}",
                id, group.status
            )));
        }

        let check = self.validate_balance(&group.entries).await?;
        if !check.is_valid() {
            return Err(LedgerError::StateTransition(format!(
                "Cannot confirm unbalanced group '{}': debits {} vs credits {}{}",
                id,
                check.total_debit,
                check.total_credit,
                if check.errors.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", check.errors.join("; "))
                }
            )));
        }

        group.status = TransactionStatus::Confirmed;
        group.updated_at = chrono::Utc::now().naive_utc();
        let confirmed = self.storage.update_group(&group).await?;
        debug!(group = %id, "group confirmed");
        Ok(confirmed)
    }

    /// Revert a confirmed group to draft. Blocked while any active
    /// (non-cancelled) transaction still references this group as a
    /// funding source, to prevent dangling availability. The consumer
    /// check and the status write happen in one storage step, so a
    /// consumer created concurrently still blocks the unlock.
    pub async fn unlock(&mut self, id: &TransactionId) -> LedgerResult<TransactionGroup> {
        let group = self.get_required(id).await?;
        let unlocked = self.storage.unlock_group(id, group.version).await?;
        debug!(group = %id, "group unlocked back to draft");
        Ok(unlocked)
    }

    /// Cancel a group. The record is kept for historical integrity;
    /// availability of anything it funded is freed automatically
    /// because cancelled consumers are excluded from the calculation.
    /// Cancelling an already cancelled group is a no-op.
    pub async fn cancel(&mut self, id: &TransactionId) -> LedgerResult<TransactionGroup> {
        let mut group = self.get_required(id).await?;
        if group.status == TransactionStatus::Cancelled {
            return Ok(group);
        }

        group.status = TransactionStatus::Cancelled;
        group.updated_at = chrono::Utc::now().naive_utc();
        let cancelled = self.storage.update_group(&group).await?;
        debug!(group = %id, "group cancelled");
        Ok(cancelled)
    }

    /// Delete a draft group nothing depends on. The draft-only and
    /// no-dependents rules are re-checked by the store in the same
    /// atomic step as the removal.
    pub async fn delete(&mut self, id: &TransactionId) -> LedgerResult<()> {
        let group = self.get_required(id).await?;
        if !group.linked_transaction_ids.is_empty() {
            return Err(LedgerError::StateTransition(format!(
                "Cannot delete '{}': it still carries funding links",
                id
            )));
        }

        self.storage.delete_group(id).await?;
        debug!(group = %id, "draft group deleted");
        Ok(())
    }

    /// Pre-submit balance check: the pure entry rules plus account
    /// resolution against the registry.
    pub async fn validate_balance(
        &self,
        entries: &[AccountingEntry],
    ) -> LedgerResult<BalanceCheck> {
        let mut check = check_entries(entries);
        for entry in entries {
            if self.storage.get_account(&entry.account_id).await?.is_none() {
                check
                    .errors
                    .push(format!("Account '{}' cannot be resolved", entry.account_id));
            }
        }
        Ok(check)
    }

    async fn check_account_references(&self, group: &TransactionGroup) -> LedgerResult<()> {
        for entry in &group.entries {
            let account = self
                .storage
                .get_account(&entry.account_id)
                .await?
                .ok_or_else(|| LedgerError::AccountNotFound(entry.account_id.to_string()))?;
            if !account.active {
                return Err(LedgerError::Validation(format!(
                    "Account '{}' is deactivated",
                    entry.account_id
                )));
            }
        }
        Ok(())
    }

    /// Every funding reference must resolve, and the combined edges
    /// must not let the group transitively fund itself.
    async fn check_funding_references(&self, group: &TransactionGroup) -> LedgerResult<()> {
        if group.source_transaction_id.as_ref() == Some(&group.id)
            || group.linked_transaction_ids.contains(&group.id)
        {
            return Err(LedgerError::Validation(format!(
                "Transaction '{}' cannot fund itself",
                group.id
            )));
        }

        let sources = group.funding_sources();
        for source_id in &sources {
            if self.storage.get_group(source_id).await?.is_none() {
                return Err(LedgerError::TransactionNotFound(source_id.to_string()));
            }
        }
        if self.resolver.would_cycle(&group.id, &sources).await? {
            return Err(LedgerError::Validation(format!(
                "Funding references of '{}' would close a cycle",
                group.id
            )));
        }
        Ok(())
    }
}

fn resequence(entries: &mut [AccountingEntry]) {
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.sequence = index as u32 + 1;
    }
}

/// Builder for assembling transaction group input
#[derive(Debug)]
pub struct GroupBuilder {
    new: NewTransactionGroup,
}

impl GroupBuilder {
    /// Start a new group for the given date.
    pub fn new(description: String, transaction_date: NaiveDate) -> Self {
        Self {
            new: NewTransactionGroup {
                description,
                transaction_date,
                organization_id: None,
                entries: Vec::new(),
                source_transaction_id: None,
                linked_transaction_ids: Vec::new(),
                created_by: None,
            },
        }
    }

    pub fn organization(mut self, organization_id: String) -> Self {
        self.new.organization_id = Some(organization_id);
        self
    }

    pub fn created_by(mut self, user: String) -> Self {
        self.new.created_by = Some(user);
        self
    }

    /// Add a debit line
    pub fn debit(mut self, account_id: AccountId, amount: BigDecimal) -> Self {
        self.new.entries.push(AccountingEntry::debit(account_id, amount));
        self
    }

    /// Add a credit line
    pub fn credit(mut self, account_id: AccountId, amount: BigDecimal) -> Self {
        self.new.entries.push(AccountingEntry::credit(account_id, amount));
        self
    }

    /// Add a custom entry
    pub fn entry(mut self, entry: AccountingEntry) -> Self {
        self.new.entries.push(entry);
        self
    }

    /// Set the primary funding source.
    pub fn funded_by(mut self, source: TransactionId) -> Self {
        self.new.source_transaction_id = Some(source);
        self
    }

    /// Add an additional funding reference.
    pub fn also_funded_by(mut self, source: TransactionId) -> Self {
        self.new.linked_transaction_ids.push(source);
        self
    }

    pub fn build(self) -> NewTransactionGroup {
        self.new
    }
}

/// Common pharmacy bookkeeping patterns
pub mod patterns {
    use super::*;

    /// Over-the-counter sale: debit cash, credit revenue.
    pub fn cash_sale(
        date: NaiveDate,
        description: String,
        cash_account: AccountId,
        revenue_account: AccountId,
        amount: BigDecimal,
    ) -> NewTransactionGroup {
        GroupBuilder::new(description, date)
            .debit(cash_account, amount.clone())
            .credit(revenue_account, amount)
            .build()
    }

    /// Stock purchase on supplier credit: debit inventory, credit the
    /// payable. The resulting group is the funding source a later
    /// payment draws on.
    pub fn credit_purchase(
        date: NaiveDate,
        description: String,
        inventory_account: AccountId,
        payable_account: AccountId,
        amount: BigDecimal,
    ) -> NewTransactionGroup {
        GroupBuilder::new(description, date)
            .debit(inventory_account, amount.clone())
            .credit(payable_account, amount)
            .build()
    }

    /// Payment settling a purchase payable, funded by the purchase
    /// group: debit the payable, credit cash.
    pub fn payment_against_payable(
        date: NaiveDate,
        description: String,
        payable_account: AccountId,
        cash_account: AccountId,
        amount: BigDecimal,
        purchase: TransactionId,
    ) -> NewTransactionGroup {
        GroupBuilder::new(description, date)
            .entry(
                AccountingEntry::debit(payable_account, amount.clone())
                    .funded_by(purchase.clone()),
            )
            .credit(cash_account, amount)
            .funded_by(purchase)
            .build()
    }

    /// Refund for stock returned to a supplier, funded by the original
    /// purchase group: debit cash, credit inventory.
    pub fn supplier_refund(
        date: NaiveDate,
        description: String,
        cash_account: AccountId,
        inventory_account: AccountId,
        amount: BigDecimal,
        purchase: TransactionId,
    ) -> NewTransactionGroup {
        GroupBuilder::new(description, date)
            .debit(cash_account, amount.clone())
            .entry(
                AccountingEntry::credit(inventory_account, amount)
                    .funded_by(purchase.clone()),
            )
            .funded_by(purchase)
            .build()
    }

    /// Owner capital injection: debit cash, credit equity.
    pub fn owner_investment(
        date: NaiveDate,
        description: String,
        cash_account: AccountId,
        equity_account: AccountId,
        amount: BigDecimal,
    ) -> NewTransactionGroup {
        GroupBuilder::new(description, date)
            .debit(cash_account, amount.clone())
            .credit(equity_account, amount)
            .build()
    }
}
