//! Availability calculation: how much of a transaction's value is
//! still unconsumed by downstream transactions

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ledger::funding::FundingResolver;
use crate::traits::*;
use crate::types::*;

/// Currency minor-unit scale used when rounding allocations.
pub const MINOR_UNIT_SCALE: i64 = 2;

/// One consumer's draw against a source transaction. Computed on
/// demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingReference {
    pub consumer_id: TransactionId,
    pub used_amount: BigDecimal,
    pub consumer_status: TransactionStatus,
}

/// Availability figures for a single transaction group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionBalance {
    pub transaction_id: TransactionId,
    pub total_amount: BigDecimal,
    pub used_amount: BigDecimal,
    pub available_amount: BigDecimal,
    pub referenced_by_count: usize,
    pub referenced_by: Vec<FundingReference>,
}

/// Batch calculation result. Integrity anomalies (unknown ids,
/// dangling references) become warnings; the remaining ids still
/// produce balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub balances: Vec<TransactionBalance>,
    pub warnings: Vec<String>,
}

/// Computes used and available amounts by netting out everything
/// active consumers draw from a source.
///
/// Figures are computed on read and never stored, so edits to draft
/// history can never leave a stale cached availability behind.
pub struct BalanceCalculator<S: LedgerStorage + Clone> {
    storage: S,
    resolver: FundingResolver<S>,
}

impl<S: LedgerStorage + Clone> BalanceCalculator<S> {
    pub fn new(storage: S) -> Self {
        Self {
            resolver: FundingResolver::new(storage.clone()),
            storage,
        }
    }

    /// Batch availability for a set of transaction ids.
    ///
    /// Each source's allocation is computed independently: a consumer
    /// appearing under two requested ids is charged against both
    /// capacities, since each source tracks its own use.
    pub async fn calculate_balances(&self, ids: &[TransactionId]) -> LedgerResult<BalanceReport> {
        let mut balances = Vec::new();
        let mut warnings = Vec::new();

        for id in ids {
            match self.calculate_balance(id).await {
                Ok(balance) => balances.push(balance),
                Err(LedgerError::TransactionNotFound(id)) => {
                    let msg = format!("transaction '{}' not found; skipped", id);
                    warn!("{}", msg);
                    warnings.push(msg);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(BalanceReport { balances, warnings })
    }

    /// Availability for a single transaction.
    pub async fn calculate_balance(&self, id: &TransactionId) -> LedgerResult<TransactionBalance> {
        let group = self
            .storage
            .get_group(id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(id.to_string()))?;

        let total = group.total_amount.clone();
        let zero = BigDecimal::from(0);
        let consumers = self.resolver.active_consumers(id).await?;

        let mut used = zero.clone();
        let mut referenced_by = Vec::new();

        for consumer in &consumers {
            let contribution = self
                .consumer_contribution(&group, consumer, &(&total - &used))
                .await?;
            used += &contribution;
            referenced_by.push(FundingReference {
                consumer_id: consumer.id.clone(),
                used_amount: contribution,
                consumer_status: consumer.status,
            });
        }

        // Defensive clamp against rounding drift or data anomalies.
        // A clamp that actually fires is a data-integrity signal and
        // must never pass silently.
        if used < zero {
            warn!(group = %id, used = %used, "negative used amount clamped to zero");
            used = zero.clone();
        }
        if used > total {
            warn!(
                group = %id,
                used = %used,
                total = %total,
                "used amount exceeds capacity; clamped"
            );
            used = total.clone();
        }

        let available = &total - &used;

        Ok(TransactionBalance {
            transaction_id: group.id,
            total_amount: total,
            used_amount: used,
            referenced_by_count: referenced_by.len(),
            referenced_by,
            available_amount: available,
        })
    }

    /// How much one consumer draws from `source`.
    ///
    /// A sole-source consumer draws its full total, capped at the
    /// source's remaining capacity. A consumer drawing from several
    /// sources at once is allocated proportionally to each source's
    /// total relative to the sum of all its sources' totals, rounded
    /// to the currency minor unit.
    async fn consumer_contribution(
        &self,
        source: &TransactionGroup,
        consumer: &TransactionGroup,
        remaining: &BigDecimal,
    ) -> LedgerResult<BigDecimal> {
        let zero = BigDecimal::from(0);
        let sources = consumer.funding_sources();

        if sources.len() <= 1 {
            let capacity = if *remaining > zero {
                remaining.clone()
            } else {
                zero
            };
            return Ok(if consumer.total_amount < capacity {
                consumer.total_amount.clone()
            } else {
                capacity
            });
        }

        let mut source_sum = zero.clone();
        for source_id in &sources {
            match self.storage.get_group(source_id).await? {
                Some(g) => source_sum += &g.total_amount,
                None => {
                    // Dangling reference: excluded from the
                    // denominator, reported by the resolver paths.
                    warn!(
                        consumer = %consumer.id,
                        source = %source_id,
                        "consumer references a missing funding source"
                    );
                }
            }
        }

        if source_sum == zero {
            return Ok(zero);
        }

        let raw = &consumer.total_amount * &source.total_amount / &source_sum;
        Ok(raw.with_scale_round(MINOR_UNIT_SCALE, RoundingMode::HalfUp))
    }
}
