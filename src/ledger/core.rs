//! Main ledger orchestrator that coordinates accounts, transaction
//! groups, graph resolution and availability

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;

use crate::ledger::account::{chart, AccountManager, BalanceScope};
use crate::ledger::availability::{BalanceCalculator, BalanceReport, TransactionBalance};
use crate::ledger::funding::{FundingResolver, ResolveOptions, Traversal};
use crate::ledger::transaction::{NewTransactionGroup, TransactionGroupPatch, TransactionManager};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::BalanceCheck;

/// Main ledger system that orchestrates all operations over one
/// storage backend.
pub struct Ledger<S: LedgerStorage + Clone> {
    accounts: AccountManager<S>,
    transactions: TransactionManager<S>,
    resolver: FundingResolver<S>,
    calculator: BalanceCalculator<S>,
}

impl<S: LedgerStorage + Clone> Ledger<S> {
    /// Create a new ledger with the given storage backend
    pub fn new(storage: S) -> Self {
        Self {
            accounts: AccountManager::new(storage.clone()),
            transactions: TransactionManager::new(storage.clone()),
            resolver: FundingResolver::new(storage.clone()),
            calculator: BalanceCalculator::new(storage),
        }
    }

    /// Create a new ledger with custom validators
    pub fn with_validators(
        storage: S,
        account_validator: Box<dyn AccountValidator>,
        group_validator: Box<dyn GroupValidator>,
    ) -> Self {
        Self {
            accounts: AccountManager::with_validator(storage.clone(), account_validator),
            transactions: TransactionManager::with_validator(storage.clone(), group_validator),
            resolver: FundingResolver::new(storage.clone()),
            calculator: BalanceCalculator::new(storage),
        }
    }

    // Account operations
    /// Register a new account
    pub async fn create_account(&mut self, account: Account) -> LedgerResult<Account> {
        self.accounts.create_account(account).await
    }

    /// Get an account by ID
    pub async fn get_account(&self, account_id: &AccountId) -> LedgerResult<Option<Account>> {
        self.accounts.get_account(account_id).await
    }

    /// List all accounts
    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.accounts.list_accounts().await
    }

    /// List accounts by type
    pub async fn list_accounts_by_type(
        &self,
        account_type: AccountType,
    ) -> LedgerResult<Vec<Account>> {
        self.accounts.list_accounts_by_type(account_type).await
    }

    /// Update an account
    pub async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.accounts.update_account(account).await
    }

    /// Soft-deactivate an account
    pub async fn deactivate_account(&mut self, account_id: &AccountId) -> LedgerResult<()> {
        self.accounts.deactivate_account(account_id).await
    }

    /// Account balance: initial balance plus signed entry effects,
    /// recomputed on read
    pub async fn account_balance(
        &self,
        account_id: &AccountId,
        as_of: Option<NaiveDate>,
        scope: BalanceScope,
    ) -> LedgerResult<BigDecimal> {
        self.accounts.balance(account_id, as_of, scope).await
    }

    /// Direct children of a parent account
    pub async fn child_accounts(&self, parent_id: &AccountId) -> LedgerResult<Vec<Account>> {
        self.accounts.child_accounts(parent_id).await
    }

    /// Root-to-leaf path through the account hierarchy
    pub async fn account_path(&self, account_id: &AccountId) -> LedgerResult<Vec<Account>> {
        self.accounts.account_path(account_id).await
    }

    /// Seed the standard pharmacy chart of accounts
    pub async fn setup_pharmacy_chart(&mut self) -> LedgerResult<HashMap<String, Account>> {
        chart::create_pharmacy_chart(&mut self.accounts).await
    }

    // Transaction group operations
    /// Create a draft transaction group
    pub async fn create_group(&mut self, new: NewTransactionGroup) -> LedgerResult<TransactionGroup> {
        self.transactions.create(new).await
    }

    /// Fetch a group with its embedded entries
    pub async fn get_group(&self, id: &TransactionId) -> LedgerResult<Option<TransactionGroup>> {
        self.transactions.get(id).await
    }

    /// Patch a draft group
    pub async fn update_group(
        &mut self,
        id: &TransactionId,
        patch: TransactionGroupPatch,
    ) -> LedgerResult<TransactionGroup> {
        self.transactions.update(id, patch).await
    }

    /// Confirm a balanced draft
    pub async fn confirm(&mut self, id: &TransactionId) -> LedgerResult<TransactionGroup> {
        self.transactions.confirm(id).await
    }

    /// Unlock a confirmed group back to draft (guarded)
    pub async fn unlock(&mut self, id: &TransactionId) -> LedgerResult<TransactionGroup> {
        self.transactions.unlock(id).await
    }

    /// Cancel a group, keeping the record
    pub async fn cancel(&mut self, id: &TransactionId) -> LedgerResult<TransactionGroup> {
        self.transactions.cancel(id).await
    }

    /// Delete a draft group nothing depends on
    pub async fn delete_group(&mut self, id: &TransactionId) -> LedgerResult<()> {
        self.transactions.delete(id).await
    }

    /// Pre-submit balance check for a set of entries
    pub async fn validate_balance(
        &self,
        entries: &[AccountingEntry],
    ) -> LedgerResult<BalanceCheck> {
        self.transactions.validate_balance(entries).await
    }

    // Funding graph and availability
    /// Transactions this group draws funding from
    pub async fn resolve_sources(
        &self,
        id: &TransactionId,
        options: &ResolveOptions,
    ) -> LedgerResult<Traversal> {
        self.resolver.resolve_sources(id, options).await
    }

    /// Transactions that reference this group as a funding source
    pub async fn resolve_consumers(
        &self,
        id: &TransactionId,
        options: &ResolveOptions,
    ) -> LedgerResult<Traversal> {
        self.resolver.resolve_consumers(id, options).await
    }

    /// Batch availability figures
    pub async fn calculate_balances(&self, ids: &[TransactionId]) -> LedgerResult<BalanceReport> {
        self.calculator.calculate_balances(ids).await
    }

    /// Availability figures for one transaction
    pub async fn calculate_balance(&self, id: &TransactionId) -> LedgerResult<TransactionBalance> {
        self.calculator.calculate_balance(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::transaction::patterns;
    use crate::utils::memory_storage::MemoryStorage;

    #[tokio::test]
    async fn basic_sale_flow_and_balances() {
        let storage = MemoryStorage::new();
        let mut ledger = Ledger::new(storage);
        let accounts = ledger.setup_pharmacy_chart().await.unwrap();

        let sale = patterns::cash_sale(
            chrono::NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            "OTC sale".to_string(),
            accounts["cash"].id.clone(),
            accounts["drug_sales"].id.clone(),
            BigDecimal::from(1000),
        );
        let group = ledger.create_group(sale).await.unwrap();
        assert_eq!(group.status, TransactionStatus::Draft);
        assert_eq!(group.total_amount, BigDecimal::from(1000));

        // Draft counts toward the projected balance only.
        let official = ledger
            .account_balance(&accounts["cash"].id, None, BalanceScope::Confirmed)
            .await
            .unwrap();
        let projected = ledger
            .account_balance(&accounts["cash"].id, None, BalanceScope::Projected)
            .await
            .unwrap();
        assert_eq!(official, BigDecimal::from(0));
        assert_eq!(projected, BigDecimal::from(1000));

        ledger.confirm(&group.id).await.unwrap();
        let official = ledger
            .account_balance(&accounts["cash"].id, None, BalanceScope::Confirmed)
            .await
            .unwrap();
        assert_eq!(official, BigDecimal::from(1000));

        let revenue = ledger
            .account_balance(&accounts["drug_sales"].id, None, BalanceScope::Confirmed)
            .await
            .unwrap();
        assert_eq!(revenue, BigDecimal::from(1000));
    }

    #[tokio::test]
    async fn initial_balance_feeds_the_aggregator() {
        let storage = MemoryStorage::new();
        let mut ledger = Ledger::new(storage);

        let cash = ledger
            .create_account(
                Account::new(
                    AccountId::parse("cash").unwrap(),
                    "1000".to_string(),
                    "Cash".to_string(),
                    AccountType::Asset,
                    None,
                )
                .with_initial_balance(BigDecimal::from(250)),
            )
            .await
            .unwrap();

        let balance = ledger
            .account_balance(&cash.id, None, BalanceScope::Confirmed)
            .await
            .unwrap();
        assert_eq!(balance, BigDecimal::from(250));
    }

    #[tokio::test]
    async fn account_path_walks_hierarchy() {
        let storage = MemoryStorage::new();
        let mut ledger = Ledger::new(storage);

        let parent = ledger
            .create_account(Account::new(
                AccountId::parse("assets").unwrap(),
                "1".to_string(),
                "Assets".to_string(),
                AccountType::Asset,
                None,
            ))
            .await
            .unwrap();
        let child = ledger
            .create_account(Account::new(
                AccountId::parse("cash").unwrap(),
                "1000".to_string(),
                "Cash".to_string(),
                AccountType::Asset,
                Some(parent.id.clone()),
            ))
            .await
            .unwrap();

        let path = ledger.account_path(&child.id).await.unwrap();
        let ids: Vec<&str> = path.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["assets", "cash"]);
    }
}
