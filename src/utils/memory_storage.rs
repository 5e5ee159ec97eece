//! In-memory storage implementation for testing

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

/// In-memory storage implementation for testing and development.
///
/// Group updates are compare-and-swap on the version counter under a
/// single write lock, which gives this backend the conditional-update
/// guarantee the trait requires.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    accounts: Arc<RwLock<HashMap<AccountId, Account>>>,
    groups: Arc<RwLock<HashMap<TransactionId, TransactionGroup>>>,
    group_seq: Arc<RwLock<u64>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            groups: Arc::new(RwLock::new(HashMap::new())),
            group_seq: Arc::new(RwLock::new(0)),
        }
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.accounts.write().unwrap().clear();
        self.groups.write().unwrap().clear();
        *self.group_seq.write().unwrap() = 0;
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.accounts
            .write()
            .unwrap()
            .insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn get_account(&self, account_id: &AccountId) -> LedgerResult<Option<Account>> {
        Ok(self.accounts.read().unwrap().get(account_id).cloned())
    }

    async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>> {
        let accounts = self.accounts.read().unwrap();
        let filtered: Vec<Account> = accounts
            .values()
            .filter(|account| {
                account_type
                    .as_ref()
                    .is_none_or(|t| &account.account_type == t)
            })
            .cloned()
            .collect();
        Ok(filtered)
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        let mut accounts = self.accounts.write().unwrap();
        if accounts.contains_key(&account.id) {
            accounts.insert(account.id.clone(), account.clone());
            Ok(())
        } else {
            Err(LedgerError::AccountNotFound(account.id.to_string()))
        }
    }

    async fn insert_group(&mut self, group: &TransactionGroup) -> LedgerResult<()> {
        let mut groups = self.groups.write().unwrap();
        if groups.contains_key(&group.id) {
            return Err(LedgerError::Validation(format!(
                "Transaction group '{}' already exists",
                group.id
            )));
        }
        if groups
            .values()
            .any(|g| g.group_number == group.group_number)
        {
            return Err(LedgerError::Validation(format!(
                "Group number '{}' is already in use",
                group.group_number
            )));
        }
        groups.insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn get_group(&self, id: &TransactionId) -> LedgerResult<Option<TransactionGroup>> {
        Ok(self.groups.read().unwrap().get(id).cloned())
    }

    async fn list_groups(&self) -> LedgerResult<Vec<TransactionGroup>> {
        Ok(self.groups.read().unwrap().values().cloned().collect())
    }

    async fn find_consumers(&self, id: &TransactionId) -> LedgerResult<Vec<TransactionGroup>> {
        let groups = self.groups.read().unwrap();
        let mut consumers: Vec<TransactionGroup> = groups
            .values()
            .filter(|g| g.id != *id && g.references(id))
            .cloned()
            .collect();
        // Deterministic order for allocation and error messages.
        consumers.sort_by(|a, b| a.group_number.cmp(&b.group_number));
        Ok(consumers)
    }

    async fn find_account_groups(
        &self,
        account_id: &AccountId,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<Vec<TransactionGroup>> {
        let groups = self.groups.read().unwrap();
        let filtered: Vec<TransactionGroup> = groups
            .values()
            .filter(|g| {
                let touches = g.entries.iter().any(|e| e.account_id == *account_id);
                let in_range = as_of.is_none_or(|d| g.transaction_date <= d);
                touches && in_range
            })
            .cloned()
            .collect();
        Ok(filtered)
    }

    async fn update_group(&mut self, group: &TransactionGroup) -> LedgerResult<TransactionGroup> {
        let mut groups = self.groups.write().unwrap();
        let stored = groups
            .get(&group.id)
            .ok_or_else(|| LedgerError::TransactionNotFound(group.id.to_string()))?;
        if stored.version != group.version {
            return Err(LedgerError::Conflict(format!(
                "Transaction group '{}' was modified concurrently (expected version {}, found {})",
                group.id, group.version, stored.version
            )));
        }
        let mut updated = group.clone();
        updated.version += 1;
        groups.insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }

    async fn unlock_group(
        &mut self,
        id: &TransactionId,
        version: u64,
    ) -> LedgerResult<TransactionGroup> {
        let mut groups = self.groups.write().unwrap();
        let stored = groups
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::TransactionNotFound(id.to_string()))?;
        if stored.version != version {
            return Err(LedgerError::Conflict(format!(
                "Transaction group '{}' was modified concurrently (expected version {}, found {})",
                id, version, stored.version
            )));
        }
        if stored.status != TransactionStatus::Confirmed {
            return Err(LedgerError::StateTransition(format!(
                "Only confirmed groups can be unlocked; '{}' is {}",
                id, stored.status
            )));
        }
        let blockers = active_consumer_ids(&groups, id);
        if !blockers.is_empty() {
            return Err(LedgerError::StateTransition(format!(
                "Cannot unlock '{}': referenced as funding source by [{}]",
                id,
                blockers.join(", ")
            )));
        }
        let mut updated = stored;
        updated.status = TransactionStatus::Draft;
        updated.updated_at = chrono::Utc::now().naive_utc();
        updated.version += 1;
        groups.insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }

    async fn delete_group(&mut self, id: &TransactionId) -> LedgerResult<()> {
        let mut groups = self.groups.write().unwrap();
        let stored = groups
            .get(id)
            .ok_or_else(|| LedgerError::TransactionNotFound(id.to_string()))?;
        if !stored.status.is_editable() {
            return Err(LedgerError::StateTransition(format!(
                "Only draft groups can be deleted; '{}' is {}",
                id, stored.status
            )));
        }
        let blockers = active_consumer_ids(&groups, id);
        if !blockers.is_empty() {
            return Err(LedgerError::StateTransition(format!(
                "Cannot delete '{}': referenced as funding source by [{}]",
                id,
                blockers.join(", ")
            )));
        }
        groups.remove(id);
        Ok(())
    }

    async fn next_group_number(&mut self) -> LedgerResult<String> {
        let mut seq = self.group_seq.write().unwrap();
        *seq += 1;
        Ok(format!("TG-{:06}", *seq))
    }
}

/// Ids of the non-cancelled groups referencing `id` as a funding
/// source, in group-number order. Called with the write lock held so
/// the guarded transitions see a consistent view.
fn active_consumer_ids(
    groups: &HashMap<TransactionId, TransactionGroup>,
    id: &TransactionId,
) -> Vec<String> {
    let mut blockers: Vec<&TransactionGroup> = groups
        .values()
        .filter(|g| g.id != *id && g.references(id) && g.status.is_active())
        .collect();
    blockers.sort_by(|a, b| a.group_number.cmp(&b.group_number));
    blockers.into_iter().map(|g| g.id.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn draft_group(id: TransactionId, number: &str) -> TransactionGroup {
        let now = chrono::Utc::now().naive_utc();
        TransactionGroup {
            id,
            group_number: number.to_string(),
            description: "test".to_string(),
            transaction_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            organization_id: None,
            total_amount: BigDecimal::from(0),
            status: TransactionStatus::Draft,
            entries: Vec::new(),
            source_transaction_id: None,
            linked_transaction_ids: Vec::new(),
            created_by: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    #[tokio::test]
    async fn version_mismatch_is_a_conflict() {
        let mut storage = MemoryStorage::new();
        let group = draft_group(TransactionId::generate(), "TG-000001");
        storage.insert_group(&group).await.unwrap();

        let first = storage.update_group(&group).await.unwrap();
        assert_eq!(first.version, 1);

        // A writer still holding version 0 must lose.
        let err = storage.update_group(&group).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[tokio::test]
    async fn duplicate_group_number_rejected() {
        let mut storage = MemoryStorage::new();
        let a = draft_group(TransactionId::generate(), "TG-000001");
        let b = draft_group(TransactionId::generate(), "TG-000001");
        storage.insert_group(&a).await.unwrap();
        let err = storage.insert_group(&b).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn unlock_rechecks_consumers_in_the_same_step() {
        let mut storage = MemoryStorage::new();
        let mut source = draft_group(TransactionId::generate(), "TG-000001");
        source.status = TransactionStatus::Confirmed;
        storage.insert_group(&source).await.unwrap();

        // A consumer inserted after the caller read the source must
        // still block the unlock: the guard runs at write time, not at
        // read time.
        let mut consumer = draft_group(TransactionId::generate(), "TG-000002");
        consumer.source_transaction_id = Some(source.id.clone());
        storage.insert_group(&consumer).await.unwrap();

        let err = storage
            .unlock_group(&source.id, source.version)
            .await
            .unwrap_err();
        match err {
            LedgerError::StateTransition(msg) => assert!(msg.contains(consumer.id.as_str())),
            other => panic!("expected StateTransition, got {other:?}"),
        }

        consumer.status = TransactionStatus::Cancelled;
        storage.update_group(&consumer).await.unwrap();
        let unlocked = storage
            .unlock_group(&source.id, source.version)
            .await
            .unwrap();
        assert_eq!(unlocked.status, TransactionStatus::Draft);
        assert_eq!(unlocked.version, source.version + 1);
    }

    #[tokio::test]
    async fn delete_rechecks_consumers_in_the_same_step() {
        let mut storage = MemoryStorage::new();
        let source = draft_group(TransactionId::generate(), "TG-000001");
        storage.insert_group(&source).await.unwrap();
        let mut consumer = draft_group(TransactionId::generate(), "TG-000002");
        consumer.linked_transaction_ids = vec![source.id.clone()];
        storage.insert_group(&consumer).await.unwrap();

        let err = storage.delete_group(&source.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::StateTransition(_)));

        storage.delete_group(&consumer.id).await.unwrap();
        storage.delete_group(&source.id).await.unwrap();
        assert!(storage.get_group(&source.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn group_numbers_are_sequential() {
        let mut storage = MemoryStorage::new();
        assert_eq!(storage.next_group_number().await.unwrap(), "TG-000001");
        assert_eq!(storage.next_group_number().await.unwrap(), "TG-000002");
    }
}
