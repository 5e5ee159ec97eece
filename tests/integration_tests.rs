//! Integration tests for ledger-core

use std::collections::HashMap;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use ledger_core::{
    patterns, Account, AccountingEntry, GroupBuilder, Ledger, LedgerError,
    MemoryStorage, ResolveOptions, TransactionStatus,
};

async fn setup() -> (Ledger<MemoryStorage>, HashMap<String, Account>) {
    let mut ledger = Ledger::new(MemoryStorage::new());
    let accounts = ledger.setup_pharmacy_chart().await.unwrap();
    (ledger, accounts)
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

#[tokio::test]
async fn create_get_round_trip_preserves_entry_order() {
    let (mut ledger, accounts) = setup().await;

    let new = GroupBuilder::new("Purchase batch".to_string(), date(1))
        .debit(accounts["inventory"].id.clone(), BigDecimal::from(700))
        .debit(accounts["cost_of_goods_sold"].id.clone(), BigDecimal::from(300))
        .credit(accounts["accounts_payable"].id.clone(), BigDecimal::from(1000))
        .build();
    let created = ledger.create_group(new).await.unwrap();

    let fetched = ledger.get_group(&created.id).await.unwrap().unwrap();
    assert_eq!(fetched.entries.len(), 3);
    let sequences: Vec<u32> = fetched.entries.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    assert_eq!(fetched.entries[0].debit_amount, BigDecimal::from(700));
    assert_eq!(fetched.entries[1].debit_amount, BigDecimal::from(300));
    assert_eq!(fetched.entries[2].credit_amount, BigDecimal::from(1000));
    assert_eq!(fetched.total_amount, BigDecimal::from(1000));
}

#[tokio::test]
async fn validate_balance_reports_totals() {
    let (mut ledger, _) = setup().await;

    let cash = ledger
        .create_account(Account::new(
            "CASH".to_string().try_into().unwrap(),
            "1001".to_string(),
            "Till".to_string(),
            ledger_core::AccountType::Asset,
            None,
        ))
        .await
        .unwrap();
    let payable = ledger
        .create_account(Account::new(
            "PAYABLE".to_string().try_into().unwrap(),
            "2001".to_string(),
            "Supplier Payable".to_string(),
            ledger_core::AccountType::Liability,
            None,
        ))
        .await
        .unwrap();

    let entries = vec![
        AccountingEntry::debit(cash.id.clone(), BigDecimal::from(1000)),
        AccountingEntry::credit(payable.id.clone(), BigDecimal::from(1000)),
    ];
    let check = ledger.validate_balance(&entries).await.unwrap();
    assert!(check.is_balanced);
    assert!(check.errors.is_empty());
    assert_eq!(check.total_debit, BigDecimal::from(1000));
    assert_eq!(check.total_credit, BigDecimal::from(1000));
}

#[tokio::test]
async fn confirming_unbalanced_draft_fails_and_stays_draft() {
    let (mut ledger, accounts) = setup().await;

    let new = GroupBuilder::new("Typo in the till".to_string(), date(2))
        .debit(accounts["cash"].id.clone(), BigDecimal::from(900))
        .credit(accounts["drug_sales"].id.clone(), BigDecimal::from(1000))
        .build();
    let group = ledger.create_group(new).await.unwrap();

    let err = ledger.confirm(&group.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::StateTransition(_)));

    let fetched = ledger.get_group(&group.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, TransactionStatus::Draft);
}

#[tokio::test]
async fn confirming_twice_is_an_error() {
    let (mut ledger, accounts) = setup().await;

    let sale = patterns::cash_sale(
        date(3),
        "OTC sale".to_string(),
        accounts["cash"].id.clone(),
        accounts["drug_sales"].id.clone(),
        BigDecimal::from(150),
    );
    let group = ledger.create_group(sale).await.unwrap();
    ledger.confirm(&group.id).await.unwrap();
    let err = ledger.confirm(&group.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::StateTransition(_)));
}

#[tokio::test]
async fn sole_source_drain_and_cancel_restores_availability() {
    let (mut ledger, accounts) = setup().await;

    // X: purchase on credit, total 500.
    let purchase = ledger
        .create_group(patterns::credit_purchase(
            date(4),
            "Stock purchase".to_string(),
            accounts["inventory"].id.clone(),
            accounts["accounts_payable"].id.clone(),
            BigDecimal::from(500),
        ))
        .await
        .unwrap();
    ledger.confirm(&purchase.id).await.unwrap();

    // Y: payment of 500 funded solely by X.
    let payment = ledger
        .create_group(patterns::payment_against_payable(
            date(5),
            "Settle supplier".to_string(),
            accounts["accounts_payable"].id.clone(),
            accounts["cash"].id.clone(),
            BigDecimal::from(500),
            purchase.id.clone(),
        ))
        .await
        .unwrap();
    ledger.confirm(&payment.id).await.unwrap();

    let balance = ledger.calculate_balance(&purchase.id).await.unwrap();
    assert_eq!(balance.used_amount, BigDecimal::from(500));
    assert_eq!(balance.available_amount, BigDecimal::from(0));
    assert_eq!(balance.referenced_by_count, 1);
    assert_eq!(balance.referenced_by[0].consumer_id, payment.id);

    // Cancelling the consumer frees the full capacity again.
    ledger.cancel(&payment.id).await.unwrap();
    let balance = ledger.calculate_balance(&purchase.id).await.unwrap();
    assert_eq!(balance.used_amount, BigDecimal::from(0));
    assert_eq!(balance.available_amount, BigDecimal::from(500));

    // Cancelling twice has no further effect.
    ledger.cancel(&payment.id).await.unwrap();
    let balance = ledger.calculate_balance(&purchase.id).await.unwrap();
    assert_eq!(balance.available_amount, BigDecimal::from(500));
}

#[tokio::test]
async fn proportional_allocation_across_two_sources() {
    let (mut ledger, accounts) = setup().await;

    let a = ledger
        .create_group(patterns::credit_purchase(
            date(6),
            "Purchase A".to_string(),
            accounts["inventory"].id.clone(),
            accounts["accounts_payable"].id.clone(),
            BigDecimal::from(100),
        ))
        .await
        .unwrap();
    let b = ledger
        .create_group(patterns::credit_purchase(
            date(6),
            "Purchase B".to_string(),
            accounts["inventory"].id.clone(),
            accounts["accounts_payable"].id.clone(),
            BigDecimal::from(200),
        ))
        .await
        .unwrap();
    ledger.confirm(&a.id).await.unwrap();
    ledger.confirm(&b.id).await.unwrap();

    // C draws 300 from A and B together.
    let c = ledger
        .create_group(
            GroupBuilder::new("Combined settlement".to_string(), date(7))
                .debit(accounts["accounts_payable"].id.clone(), BigDecimal::from(300))
                .credit(accounts["cash"].id.clone(), BigDecimal::from(300))
                .funded_by(a.id.clone())
                .also_funded_by(b.id.clone())
                .build(),
        )
        .await
        .unwrap();
    ledger.confirm(&c.id).await.unwrap();

    let report = ledger
        .calculate_balances(&[a.id.clone(), b.id.clone()])
        .await
        .unwrap();
    assert!(report.warnings.is_empty());
    assert_eq!(report.balances[0].used_amount, BigDecimal::from(100));
    assert_eq!(report.balances[0].available_amount, BigDecimal::from(0));
    assert_eq!(report.balances[1].used_amount, BigDecimal::from(200));
    assert_eq!(report.balances[1].available_amount, BigDecimal::from(0));
}

#[tokio::test]
async fn unlock_is_blocked_by_active_consumers_only() {
    let (mut ledger, accounts) = setup().await;

    let purchase = ledger
        .create_group(patterns::credit_purchase(
            date(8),
            "Stock purchase".to_string(),
            accounts["inventory"].id.clone(),
            accounts["accounts_payable"].id.clone(),
            BigDecimal::from(250),
        ))
        .await
        .unwrap();
    ledger.confirm(&purchase.id).await.unwrap();

    let payment = ledger
        .create_group(patterns::payment_against_payable(
            date(9),
            "Settle supplier".to_string(),
            accounts["accounts_payable"].id.clone(),
            accounts["cash"].id.clone(),
            BigDecimal::from(250),
            purchase.id.clone(),
        ))
        .await
        .unwrap();
    ledger.confirm(&payment.id).await.unwrap();

    let err = ledger.unlock(&purchase.id).await.unwrap_err();
    match err {
        LedgerError::StateTransition(msg) => {
            assert!(msg.contains(payment.id.as_str()));
        }
        other => panic!("expected StateTransition, got {other:?}"),
    }

    ledger.cancel(&payment.id).await.unwrap();
    let unlocked = ledger.unlock(&purchase.id).await.unwrap();
    assert_eq!(unlocked.status, TransactionStatus::Draft);
}

#[tokio::test]
async fn delete_rules() {
    let (mut ledger, accounts) = setup().await;

    let purchase = ledger
        .create_group(patterns::credit_purchase(
            date(10),
            "Stock purchase".to_string(),
            accounts["inventory"].id.clone(),
            accounts["accounts_payable"].id.clone(),
            BigDecimal::from(100),
        ))
        .await
        .unwrap();

    // A draft consumer pins the source even before confirm.
    let payment = ledger
        .create_group(patterns::payment_against_payable(
            date(11),
            "Settle supplier".to_string(),
            accounts["accounts_payable"].id.clone(),
            accounts["cash"].id.clone(),
            BigDecimal::from(100),
            purchase.id.clone(),
        ))
        .await
        .unwrap();

    let err = ledger.delete_group(&purchase.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::StateTransition(_)));

    // Deleting the dependent first unblocks the source.
    ledger.delete_group(&payment.id).await.unwrap();
    ledger.delete_group(&purchase.id).await.unwrap();
    assert!(ledger.get_group(&purchase.id).await.unwrap().is_none());
}

#[tokio::test]
async fn confirmed_groups_cannot_be_edited_or_deleted() {
    let (mut ledger, accounts) = setup().await;

    let sale = patterns::cash_sale(
        date(12),
        "OTC sale".to_string(),
        accounts["cash"].id.clone(),
        accounts["drug_sales"].id.clone(),
        BigDecimal::from(80),
    );
    let group = ledger.create_group(sale).await.unwrap();
    ledger.confirm(&group.id).await.unwrap();

    let patch = ledger_core::TransactionGroupPatch {
        description: Some("edited".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        ledger.update_group(&group.id, patch).await.unwrap_err(),
        LedgerError::StateTransition(_)
    ));
    assert!(matches!(
        ledger.delete_group(&group.id).await.unwrap_err(),
        LedgerError::StateTransition(_)
    ));
}

#[tokio::test]
async fn funding_cycles_are_rejected_at_write_time() {
    let (mut ledger, accounts) = setup().await;

    let a = ledger
        .create_group(patterns::credit_purchase(
            date(13),
            "Purchase A".to_string(),
            accounts["inventory"].id.clone(),
            accounts["accounts_payable"].id.clone(),
            BigDecimal::from(100),
        ))
        .await
        .unwrap();
    let b = ledger
        .create_group(
            GroupBuilder::new("Funded by A".to_string(), date(14))
                .debit(accounts["accounts_payable"].id.clone(), BigDecimal::from(100))
                .credit(accounts["cash"].id.clone(), BigDecimal::from(100))
                .funded_by(a.id.clone())
                .build(),
        )
        .await
        .unwrap();

    // Pointing A back at B would let A fund itself transitively.
    let patch = ledger_core::TransactionGroupPatch {
        source_transaction_id: Some(Some(b.id.clone())),
        ..Default::default()
    };
    let err = ledger.update_group(&a.id, patch).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn transitive_source_chain_resolves_in_order() {
    let (mut ledger, accounts) = setup().await;

    let prepayment = ledger
        .create_group(patterns::owner_investment(
            date(15),
            "Capital injection".to_string(),
            accounts["cash"].id.clone(),
            accounts["owners_equity"].id.clone(),
            BigDecimal::from(1000),
        ))
        .await
        .unwrap();
    ledger.confirm(&prepayment.id).await.unwrap();

    let purchase = ledger
        .create_group(
            GroupBuilder::new("Purchase from prepayment".to_string(), date(16))
                .debit(accounts["inventory"].id.clone(), BigDecimal::from(400))
                .credit(accounts["cash"].id.clone(), BigDecimal::from(400))
                .funded_by(prepayment.id.clone())
                .build(),
        )
        .await
        .unwrap();
    ledger.confirm(&purchase.id).await.unwrap();

    let payment = ledger
        .create_group(
            GroupBuilder::new("Onward payment".to_string(), date(17))
                .debit(accounts["accounts_payable"].id.clone(), BigDecimal::from(400))
                .credit(accounts["cash"].id.clone(), BigDecimal::from(400))
                .funded_by(purchase.id.clone())
                .build(),
        )
        .await
        .unwrap();

    let direct = ledger
        .resolve_sources(&payment.id, &ResolveOptions::direct())
        .await
        .unwrap();
    assert_eq!(direct.groups.len(), 1);
    assert_eq!(direct.groups[0].id, purchase.id);

    let chain = ledger
        .resolve_sources(&payment.id, &ResolveOptions::transitive())
        .await
        .unwrap();
    let ids: Vec<_> = chain.groups.iter().map(|g| g.id.clone()).collect();
    assert_eq!(ids, vec![purchase.id.clone(), prepayment.id.clone()]);
    assert!(chain.warnings.is_empty());
    assert!(!chain.truncated);

    let consumers = ledger
        .resolve_consumers(&prepayment.id, &ResolveOptions::transitive())
        .await
        .unwrap();
    let ids: Vec<_> = consumers.groups.iter().map(|g| g.id.clone()).collect();
    assert_eq!(ids, vec![purchase.id.clone(), payment.id.clone()]);
}

#[tokio::test]
async fn traversal_reports_dangling_references() {
    let (mut ledger, accounts) = setup().await;

    let purchase = ledger
        .create_group(patterns::credit_purchase(
            date(22),
            "Stock purchase".to_string(),
            accounts["inventory"].id.clone(),
            accounts["accounts_payable"].id.clone(),
            BigDecimal::from(100),
        ))
        .await
        .unwrap();
    let payment = ledger
        .create_group(patterns::payment_against_payable(
            date(23),
            "Settle supplier".to_string(),
            accounts["accounts_payable"].id.clone(),
            accounts["cash"].id.clone(),
            BigDecimal::from(100),
            purchase.id.clone(),
        ))
        .await
        .unwrap();

    // Cancelling the consumer unpins the source, which can then be
    // deleted, leaving the cancelled payment pointing at a missing id.
    ledger.cancel(&payment.id).await.unwrap();
    ledger.delete_group(&purchase.id).await.unwrap();

    let traversal = ledger
        .resolve_sources(&payment.id, &ResolveOptions::direct())
        .await
        .unwrap();
    assert!(traversal.groups.is_empty());
    assert_eq!(traversal.warnings.len(), 1);
    assert!(traversal.warnings[0].contains(purchase.id.as_str()));
    assert!(!traversal.truncated);
}

#[tokio::test]
async fn traversal_truncates_at_the_visit_cap() {
    let (mut ledger, accounts) = setup().await;

    let prepayment = ledger
        .create_group(patterns::owner_investment(
            date(24),
            "Capital injection".to_string(),
            accounts["cash"].id.clone(),
            accounts["owners_equity"].id.clone(),
            BigDecimal::from(1000),
        ))
        .await
        .unwrap();
    let purchase = ledger
        .create_group(
            GroupBuilder::new("Purchase from prepayment".to_string(), date(25))
                .debit(accounts["inventory"].id.clone(), BigDecimal::from(400))
                .credit(accounts["cash"].id.clone(), BigDecimal::from(400))
                .funded_by(prepayment.id.clone())
                .build(),
        )
        .await
        .unwrap();
    let payment = ledger
        .create_group(
            GroupBuilder::new("Onward payment".to_string(), date(26))
                .debit(accounts["accounts_payable"].id.clone(), BigDecimal::from(400))
                .credit(accounts["cash"].id.clone(), BigDecimal::from(400))
                .funded_by(purchase.id.clone())
                .build(),
        )
        .await
        .unwrap();

    // Cap of 2: the start plus one resolved node, then the walk stops
    // before reaching the prepayment.
    let options = ResolveOptions {
        max_visits: 2,
        ..ResolveOptions::transitive()
    };
    let chain = ledger.resolve_sources(&payment.id, &options).await.unwrap();
    assert!(chain.truncated);
    assert_eq!(chain.groups.len(), 1);
    assert_eq!(chain.groups[0].id, purchase.id);
}

#[tokio::test]
async fn account_path_rejects_parent_cycles() {
    let mut ledger = Ledger::new(MemoryStorage::new());
    let assets = ledger
        .create_account(Account::new(
            "assets".to_string().try_into().unwrap(),
            "1".to_string(),
            "Assets".to_string(),
            ledger_core::AccountType::Asset,
            None,
        ))
        .await
        .unwrap();
    let current = ledger
        .create_account(Account::new(
            "current-assets".to_string().try_into().unwrap(),
            "10".to_string(),
            "Current Assets".to_string(),
            ledger_core::AccountType::Asset,
            Some(assets.id.clone()),
        ))
        .await
        .unwrap();

    // Re-parenting the root under its own child closes a loop in the
    // stored data; the path walk must fail rather than spin.
    let mut looped = assets.clone();
    looped.parent_id = Some(current.id.clone());
    ledger.update_account(&looped).await.unwrap();

    let err = ledger.account_path(&current.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::GraphIntegrity(_)));
}

#[tokio::test]
async fn availability_stays_within_bounds_under_status_churn() {
    let (mut ledger, accounts) = setup().await;

    let source = ledger
        .create_group(patterns::credit_purchase(
            date(18),
            "Stock purchase".to_string(),
            accounts["inventory"].id.clone(),
            accounts["accounts_payable"].id.clone(),
            BigDecimal::from(300),
        ))
        .await
        .unwrap();
    ledger.confirm(&source.id).await.unwrap();

    // Two consumers that together overdraw the source.
    for amount in [250, 200] {
        let payment = ledger
            .create_group(patterns::payment_against_payable(
                date(19),
                "Partial settlement".to_string(),
                accounts["accounts_payable"].id.clone(),
                accounts["cash"].id.clone(),
                BigDecimal::from(amount),
                source.id.clone(),
            ))
            .await
            .unwrap();
        ledger.confirm(&payment.id).await.unwrap();
    }

    let balance = ledger.calculate_balance(&source.id).await.unwrap();
    let zero = BigDecimal::from(0);
    assert!(balance.used_amount >= zero && balance.used_amount <= balance.total_amount);
    assert!(balance.available_amount >= zero);
    assert_eq!(balance.used_amount, BigDecimal::from(300));
    assert_eq!(balance.available_amount, zero);
}

#[tokio::test]
async fn enhanced_validator_rejects_duplicate_account_side() {
    let mut ledger = Ledger::with_validators(
        MemoryStorage::new(),
        Box::new(ledger_core::DefaultAccountValidator),
        Box::new(ledger_core::utils::EnhancedGroupValidator),
    );
    let accounts = ledger.setup_pharmacy_chart().await.unwrap();

    let new = GroupBuilder::new("Split lines".to_string(), date(21))
        .debit(accounts["cash"].id.clone(), BigDecimal::from(10))
        .debit(accounts["cash"].id.clone(), BigDecimal::from(20))
        .credit(accounts["drug_sales"].id.clone(), BigDecimal::from(30))
        .build();
    let err = ledger.create_group(new).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn deactivated_accounts_reject_new_entries() {
    let (mut ledger, accounts) = setup().await;

    ledger
        .deactivate_account(&accounts["rent_expense"].id)
        .await
        .unwrap();

    let new = GroupBuilder::new("Rent".to_string(), date(20))
        .debit(accounts["rent_expense"].id.clone(), BigDecimal::from(50))
        .credit(accounts["cash"].id.clone(), BigDecimal::from(50))
        .build();
    let err = ledger.create_group(new).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}
