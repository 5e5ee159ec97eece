//! Account registry and account balance aggregation

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::traits::*;
use crate::types::*;

/// Which transaction groups feed into an account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceScope {
    /// Confirmed groups only (the official balance)
    Confirmed,
    /// Confirmed plus draft groups (the projected balance)
    Projected,
}

impl BalanceScope {
    fn includes(&self, status: TransactionStatus) -> bool {
        match self {
            Self::Confirmed => status == TransactionStatus::Confirmed,
            Self::Projected => status.is_active(),
        }
    }
}

/// Account manager: registry CRUD, hierarchy helpers, and the balance
/// aggregator.
pub struct AccountManager<S: LedgerStorage> {
    pub(crate) storage: S,
    validator: Box<dyn AccountValidator>,
}

impl<S: LedgerStorage> AccountManager<S> {
    /// Create a new account manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultAccountValidator),
        }
    }

    /// Create a new account manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn AccountValidator>) -> Self {
        Self { storage, validator }
    }

    /// Register a new account
    pub async fn create_account(&mut self, account: Account) -> LedgerResult<Account> {
        self.validator.validate_account(&account)?;

        if self.storage.get_account(&account.id).await?.is_some() {
            return Err(LedgerError::Validation(format!(
                "Account with ID '{}' already exists",
                account.id
            )));
        }

        if let Some(ref parent_id) = account.parent_id {
            if self.storage.get_account(parent_id).await?.is_none() {
                return Err(LedgerError::Validation(format!(
                    "Parent account '{}' does not exist",
                    parent_id
                )));
            }
        }

        self.storage.save_account(&account).await?;
        Ok(account)
    }

    /// Get an account by ID
    pub async fn get_account(&self, account_id: &AccountId) -> LedgerResult<Option<Account>> {
        self.storage.get_account(account_id).await
    }

    /// Get an account by ID, returning an error if not found
    pub async fn get_account_required(&self, account_id: &AccountId) -> LedgerResult<Account> {
        self.storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    /// List all accounts
    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(None).await
    }

    /// List accounts by type
    pub async fn list_accounts_by_type(
        &self,
        account_type: AccountType,
    ) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(Some(account_type)).await
    }

    /// Update an account (rename, re-parent, etc.)
    pub async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.validator.validate_account(account)?;

        if self.storage.get_account(&account.id).await?.is_none() {
            return Err(LedgerError::AccountNotFound(account.id.to_string()));
        }

        if let Some(ref parent_id) = account.parent_id {
            if self.storage.get_account(parent_id).await?.is_none() {
                return Err(LedgerError::Validation(format!(
                    "Parent account '{}' does not exist",
                    parent_id
                )));
            }
        }

        let mut updated = account.clone();
        updated.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_account(&updated).await
    }

    /// Soft-deactivate an account. Entries may keep referencing it
    /// historically; new entries may not.
    pub async fn deactivate_account(&mut self, account_id: &AccountId) -> LedgerResult<()> {
        let mut account = self.get_account_required(account_id).await?;
        account.active = false;
        account.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_account(&account).await
    }

    /// Balance of an account: initial balance plus the signed effect
    /// of every entry in scope. Recomputed on every read; there is no
    /// persisted running balance to go stale when draft history is
    /// edited.
    pub async fn balance(
        &self,
        account_id: &AccountId,
        as_of: Option<NaiveDate>,
        scope: BalanceScope,
    ) -> LedgerResult<BigDecimal> {
        let account = self.get_account_required(account_id).await?;
        let groups = self.storage.find_account_groups(account_id, as_of).await?;

        let mut balance = account.initial_balance.clone();
        for group in groups {
            if !scope.includes(group.status) {
                continue;
            }
            for entry in &group.entries {
                if entry.account_id == *account_id {
                    balance += account.signed_effect(entry);
                }
            }
        }
        Ok(balance)
    }

    /// Direct children of a parent account
    pub async fn child_accounts(&self, parent_id: &AccountId) -> LedgerResult<Vec<Account>> {
        let all = self.list_accounts().await?;
        Ok(all
            .into_iter()
            .filter(|account| account.parent_id.as_ref() == Some(parent_id))
            .collect())
    }

    /// Path from the root of the hierarchy down to the account.
    /// Iterative with a visited set; a parent loop in the data is a
    /// graph-integrity error, not a stack overflow.
    pub async fn account_path(&self, account_id: &AccountId) -> LedgerResult<Vec<Account>> {
        let mut path = Vec::new();
        let mut visited: HashSet<AccountId> = HashSet::new();
        let mut current = Some(account_id.clone());

        while let Some(id) = current {
            if !visited.insert(id.clone()) {
                return Err(LedgerError::GraphIntegrity(format!(
                    "Account hierarchy contains a cycle at '{}'",
                    id
                )));
            }
            let account = self.get_account_required(&id).await?;
            current = account.parent_id.clone();
            path.insert(0, account);
        }

        Ok(path)
    }
}

/// Utility functions for working with accounts
pub mod chart {
    use super::*;

    /// Seed the standard chart of accounts for a pharmacy.
    pub async fn create_pharmacy_chart<S: LedgerStorage>(
        manager: &mut AccountManager<S>,
    ) -> LedgerResult<HashMap<String, Account>> {
        let defs: [(&str, &str, &str, AccountType); 10] = [
            ("cash", "1000", "Cash", AccountType::Asset),
            ("bank", "1100", "Bank", AccountType::Asset),
            (
                "accounts_receivable",
                "1200",
                "Accounts Receivable",
                AccountType::Asset,
            ),
            ("inventory", "1300", "Pharmacy Inventory", AccountType::Asset),
            (
                "accounts_payable",
                "2000",
                "Accounts Payable",
                AccountType::Liability,
            ),
            ("owners_equity", "3000", "Owner's Equity", AccountType::Equity),
            ("drug_sales", "4000", "Drug Sales", AccountType::Revenue),
            (
                "consultation_revenue",
                "4100",
                "Consultation Revenue",
                AccountType::Revenue,
            ),
            (
                "cost_of_goods_sold",
                "5000",
                "Cost of Goods Sold",
                AccountType::Expense,
            ),
            ("rent_expense", "6000", "Rent Expense", AccountType::Expense),
        ];

        let mut accounts = HashMap::new();
        for (key, code, name, account_type) in defs {
            let account = manager
                .create_account(Account::new(
                    AccountId::parse(key)?,
                    code.to_string(),
                    name.to_string(),
                    account_type,
                    None,
                ))
                .await?;
            accounts.insert(key.to_string(), account);
        }
        Ok(accounts)
    }
}
