//! Integration tests for the vault accounting contract.
//!
//! These tests drive a vault through full deposit and exit lifecycles over
//! the in-memory ledger: entry and exit fees, preview/execution parity with
//! pending time-based fees, bound checks, ownership, and atomic rollback.

use chrono::{DateTime, Duration, TimeZone, Utc};
use vaultline_contracts::vault::{Vault, VaultError};
use vaultline_protocol::config::VaultConfig;
use vaultline_protocol::events::VaultEvent;
use vaultline_protocol::fees::FeeRates;
use vaultline_protocol::ledger::{
    IdleBalance, InMemoryLedger, LedgerError, ReportedValuation, ShareLedger, ValuationProvider,
};
use vaultline_protocol::math::MathError;

const COLLECTOR: &str = "collector";
const GOV: &str = "gov";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Helper: builds a vault with funded depositors.
fn vault<V: ValuationProvider>(
    rates: FeeRates,
    decimals_offset: u8,
    valuation: V,
) -> Vault<InMemoryLedger, V> {
    let mut config = VaultConfig::new(GOV, COLLECTOR);
    config.decimals_offset = decimals_offset;
    config.initial_rates = rates;

    let mut ledger = InMemoryLedger::new();
    for account in ["alice", "bob", COLLECTOR] {
        ledger.fund_account(account, 10_000_000).unwrap();
    }
    Vault::new(config, ledger, valuation, t0()).unwrap()
}

// ---------------------------------------------------------------------------
// Entry & Exit Fees
// ---------------------------------------------------------------------------

#[test]
fn deposit_with_one_percent_entry_fee_into_empty_vault() {
    let rates = FeeRates {
        entry_bps: 100,
        ..FeeRates::default()
    };
    let mut v = vault(rates, 3, IdleBalance);

    let quote = v.quote_deposit(1_000, t0()).unwrap();
    assert_eq!(quote.fee_assets, 10);

    let shares = v.deposit("alice", 1_000, "alice", t0()).unwrap();
    // 990 net assets at 10^3 shares per asset unit.
    assert_eq!(shares, 990_000);
    assert_eq!(v.ledger().share_balance(COLLECTOR), 10_000);
    assert_eq!(v.total_assets().unwrap(), 1_000);
    assert_eq!(v.ledger().asset_balance("alice"), 10_000_000 - 1_000);
}

#[test]
fn mint_mirrors_deposit_on_empty_vault() {
    let rates = FeeRates {
        entry_bps: 100,
        ..FeeRates::default()
    };
    let mut v = vault(rates, 3, IdleBalance);

    assert_eq!(v.preview_mint(990_000, t0()).unwrap(), 1_000);
    let assets = v.mint("alice", 990_000, "alice", t0()).unwrap();
    assert_eq!(assets, 1_000);
    assert_eq!(v.ledger().share_balance("alice"), 990_000);
    assert_eq!(v.ledger().share_balance(COLLECTOR), 10_000);
}

#[test]
fn sole_holder_withdraws_everything_with_exit_fee() {
    let rates = FeeRates {
        exit_bps: 150,
        ..FeeRates::default()
    };
    let mut v = vault(rates, 0, IdleBalance);
    v.deposit("alice", 1_000, "alice", t0()).unwrap();
    assert_eq!(v.ledger().share_balance("alice"), 1_000);

    let max = v.max_withdraw("alice", t0()).unwrap();
    assert_eq!(max, 985);

    let burned = v.withdraw("alice", 985, "alice", "alice", t0()).unwrap();
    assert_eq!(burned, 1_000);
    assert_eq!(v.ledger().share_balance("alice"), 0);
    assert_eq!(v.ledger().asset_balance("alice"), 10_000_000 - 15);

    // The 15 left behind belong to the collector.
    assert_eq!(v.ledger().share_balance(COLLECTOR), 15);
    assert_eq!(v.total_shares(), 15);
    assert_eq!(v.total_assets().unwrap(), 15);
}

#[test]
fn sole_holder_redeems_everything_with_exit_fee() {
    let rates = FeeRates {
        exit_bps: 150,
        ..FeeRates::default()
    };
    let mut v = vault(rates, 0, IdleBalance);
    v.deposit("alice", 1_000, "alice", t0()).unwrap();

    assert_eq!(v.max_redeem("alice", t0()).unwrap(), 1_000);
    let paid = v.redeem("alice", 1_000, "alice", "alice", t0()).unwrap();
    assert_eq!(paid, 985);
    assert_eq!(v.ledger().share_balance(COLLECTOR), 15);
    assert_eq!(v.total_assets().unwrap(), 15);
}

#[test]
fn fee_collector_pays_entry_fee_like_anyone_else() {
    let rates = FeeRates {
        entry_bps: 100,
        ..FeeRates::default()
    };
    let mut v = vault(rates, 3, IdleBalance);

    let quote = v.quote_deposit(1_000, t0()).unwrap();
    let shares = v.deposit(COLLECTOR, 1_000, COLLECTOR, t0()).unwrap();
    assert_eq!(shares, quote.shares);
    assert_eq!(quote.fee_assets, 10);
    // Principal and fee shares both land on the collector.
    assert_eq!(v.ledger().share_balance(COLLECTOR), 990_000 + 10_000);
}

// ---------------------------------------------------------------------------
// Preview / Execution Parity
// ---------------------------------------------------------------------------

#[test]
fn previews_match_execution_with_pending_time_fees() {
    let rates = FeeRates {
        entry_bps: 50,
        exit_bps: 100,
        management_bps: 200,
        performance_bps: 2_000,
    };
    let mut v = vault(rates, 3, ReportedValuation::new(0));
    v.deposit("alice", 1_000_000, "alice", t0()).unwrap();

    // 1. Deposit after a reported gain: both time-based fees are pending.
    let t1 = t0() + Duration::days(30);
    v.valuation_mut().report(50_000);
    let quote = v.quote_deposit(200_000, t1).unwrap();
    assert!(quote.accrued.management_shares > 0);
    assert!(quote.accrued.performance_shares > 0);
    assert_eq!(v.preview_deposit(200_000, t1).unwrap(), quote.shares);

    let collector_before = v.ledger().share_balance(COLLECTOR);
    let shares = v.deposit("bob", 200_000, "bob", t1).unwrap();
    assert_eq!(shares, quote.shares);
    assert_eq!(v.ledger().share_balance("bob"), quote.shares);
    assert_eq!(
        v.ledger().share_balance(COLLECTOR) - collector_before,
        quote.collector_shares().unwrap()
    );

    // 2. Mint with another month of management fees pending.
    let t2 = t1 + Duration::days(30);
    let quote = v.quote_mint(100_000_000, t2).unwrap();
    assert_eq!(v.preview_mint(100_000_000, t2).unwrap(), quote.assets);
    let bob_assets = v.ledger().asset_balance("bob");
    let assets = v.mint("bob", 100_000_000, "bob", t2).unwrap();
    assert_eq!(assets, quote.assets);
    assert_eq!(v.ledger().asset_balance("bob"), bob_assets - quote.assets);

    // 3. Withdraw.
    let t3 = t2 + Duration::days(30);
    let quote = v.quote_withdraw(100_000, t3).unwrap();
    assert_eq!(v.preview_withdraw(100_000, t3).unwrap(), quote.shares);
    let alice_shares = v.ledger().share_balance("alice");
    let burned = v.withdraw("alice", 100_000, "alice", "alice", t3).unwrap();
    assert_eq!(burned, quote.shares);
    assert_eq!(v.ledger().share_balance("alice"), alice_shares - quote.shares);

    // 4. Redeem.
    let t4 = t3 + Duration::days(30);
    let quote = v.quote_redeem(50_000_000, t4).unwrap();
    assert_eq!(v.preview_redeem(50_000_000, t4).unwrap(), quote.assets);
    let bob_assets = v.ledger().asset_balance("bob");
    let paid = v.redeem("bob", 50_000_000, "bob", "bob", t4).unwrap();
    assert_eq!(paid, quote.assets);
    assert_eq!(v.ledger().asset_balance("bob"), bob_assets + quote.assets);
}

#[test]
fn exit_previews_match_execution_with_pending_performance_fee() {
    let rates = FeeRates {
        exit_bps: 100,
        performance_bps: 2_000,
        ..FeeRates::default()
    };
    let mut v = vault(rates, 3, ReportedValuation::new(0));
    v.deposit("alice", 1_000_000, "alice", t0()).unwrap();
    v.deposit("bob", 500_000, "bob", t0()).unwrap();

    // Withdraw right after a reported gain.
    let t1 = t0() + Duration::days(1);
    v.valuation_mut().report(100_000);
    let quote = v.quote_withdraw(200_000, t1).unwrap();
    assert_eq!(quote.accrued.management_shares, 0);
    assert!(quote.accrued.performance_shares > 0);
    assert_eq!(v.preview_withdraw(200_000, t1).unwrap(), quote.shares);

    let collector_before = v.ledger().share_balance(COLLECTOR);
    let burned = v.withdraw("alice", 200_000, "alice", "alice", t1).unwrap();
    assert_eq!(burned, quote.shares);
    assert_eq!(
        v.ledger().share_balance(COLLECTOR) - collector_before,
        quote.collector_shares().unwrap()
    );

    // Redeem after a second gain past the new mark.
    let t2 = t1 + Duration::days(1);
    v.valuation_mut().report(150_000);
    let quote = v.quote_redeem(100_000_000, t2).unwrap();
    assert!(quote.accrued.performance_shares > 0);
    assert_eq!(v.preview_redeem(100_000_000, t2).unwrap(), quote.assets);

    let collector_before = v.ledger().share_balance(COLLECTOR);
    let bob_assets = v.ledger().asset_balance("bob");
    let paid = v.redeem("bob", 100_000_000, "bob", "bob", t2).unwrap();
    assert_eq!(paid, quote.assets);
    assert_eq!(v.ledger().asset_balance("bob"), bob_assets + quote.assets);
    assert_eq!(
        v.ledger().share_balance(COLLECTOR) - collector_before,
        quote.collector_shares().unwrap()
    );
}

#[test]
fn previews_do_not_mutate() {
    let rates = FeeRates {
        management_bps: 200,
        ..FeeRates::default()
    };
    let mut v = vault(rates, 3, IdleBalance);
    v.deposit("alice", 1_000, "alice", t0()).unwrap();
    v.drain_events();

    let later = t0() + Duration::days(100);
    let ledger_before = v.ledger().clone();
    let _ = v.preview_deposit(500, later).unwrap();
    let _ = v.preview_redeem(1_000, later).unwrap();
    let _ = v.max_withdraw("alice", later).unwrap();

    assert_eq!(v.ledger(), &ledger_before);
    assert_eq!(v.last_collection(), t0());
    assert!(v.events().is_empty());
}

// ---------------------------------------------------------------------------
// Bounds & Ownership
// ---------------------------------------------------------------------------

#[test]
fn deposit_cap_bounds_deposit_and_mint() {
    let mut config = VaultConfig::new(GOV, COLLECTOR);
    config.deposit_cap = Some(1_500);
    let mut ledger = InMemoryLedger::new();
    ledger.fund_account("alice", 10_000).unwrap();
    let mut v = Vault::new(config, ledger, IdleBalance, t0()).unwrap();

    v.deposit("alice", 1_000, "alice", t0()).unwrap();
    assert_eq!(v.max_deposit().unwrap(), 500);
    assert_eq!(
        v.deposit("alice", 501, "alice", t0()),
        Err(VaultError::ExceededMaxDeposit {
            assets: 501,
            max: 500
        })
    );

    let max_mint = v.max_mint(t0()).unwrap();
    assert_eq!(max_mint, v.preview_deposit(500, t0()).unwrap());
    assert!(matches!(
        v.mint("alice", max_mint + 1, "alice", t0()),
        Err(VaultError::ExceededMaxMint { .. })
    ));
    v.mint("alice", max_mint, "alice", t0()).unwrap();
    assert!(v.total_assets().unwrap() <= 1_500);
}

#[test]
fn uncapped_vault_has_unbounded_entry() {
    let v = vault(FeeRates::default(), 3, IdleBalance);
    assert_eq!(v.max_deposit().unwrap(), u64::MAX);
    assert_eq!(v.max_mint(t0()).unwrap(), u64::MAX);
}

#[test]
fn exits_above_max_are_rejected() {
    let mut v = vault(FeeRates::default(), 0, IdleBalance);
    v.deposit("alice", 1_000, "alice", t0()).unwrap();

    assert_eq!(
        v.redeem("alice", 1_001, "alice", "alice", t0()),
        Err(VaultError::ExceededMaxRedeem {
            owner: "alice".into(),
            shares: 1_001,
            max: 1_000
        })
    );
    assert_eq!(
        v.withdraw("alice", 1_001, "alice", "alice", t0()),
        Err(VaultError::ExceededMaxWithdraw {
            owner: "alice".into(),
            assets: 1_001,
            max: 1_000
        })
    );
}

#[test]
fn max_redeem_is_limited_by_idle_assets() {
    let mut v = vault(FeeRates::default(), 0, ReportedValuation::new(0));
    v.deposit("alice", 1_000, "alice", t0()).unwrap();
    v.valuation_mut().report(1_000);

    // Half the value sits outside the vault.
    assert_eq!(v.max_redeem("alice", t0()).unwrap(), 500);
    assert!(v.max_withdraw("alice", t0()).unwrap() <= v.ledger().idle_assets());
}

#[test]
fn only_owner_can_exit() {
    let mut v = vault(FeeRates::default(), 0, IdleBalance);
    v.deposit("alice", 1_000, "alice", t0()).unwrap();

    assert_eq!(
        v.redeem("bob", 10, "bob", "alice", t0()),
        Err(VaultError::NotOwner {
            caller: "bob".into(),
            owner: "alice".into()
        })
    );
    assert!(matches!(
        v.withdraw("bob", 10, "bob", "alice", t0()),
        Err(VaultError::NotOwner { .. })
    ));

    // Receiver may differ from the owner.
    v.redeem("alice", 100, "bob", "alice", t0()).unwrap();
    assert_eq!(v.ledger().asset_balance("bob"), 10_000_000 + 100);
}

// ---------------------------------------------------------------------------
// Atomicity
// ---------------------------------------------------------------------------

#[test]
fn failed_deposit_leaves_no_trace() {
    let rates = FeeRates {
        management_bps: 100,
        ..FeeRates::default()
    };
    let mut v = vault(rates, 0, IdleBalance);
    v.deposit("alice", 1_000, "alice", t0()).unwrap();
    v.drain_events();

    let later = t0() + Duration::days(365);
    let ledger_before = v.ledger().clone();
    let result = v.deposit("mallory", 500, "mallory", later);
    assert!(matches!(
        result,
        Err(VaultError::Ledger(LedgerError::InsufficientBalance { .. }))
    ));

    // Pending fees were neither minted nor forgotten.
    assert_eq!(v.ledger(), &ledger_before);
    assert_eq!(v.last_collection(), t0());
    assert!(v.events().is_empty());
    assert_eq!(v.accrued_fees(later).unwrap().management_shares, 10);
}

#[test]
fn deposit_overflow_is_a_math_error() {
    let mut v = vault(FeeRates::default(), 3, IdleBalance);
    let result = v.quote_deposit(u64::MAX, t0());
    assert!(matches!(result, Err(VaultError::Math(MathError::Overflow(_)))));
    assert!(v.deposit("alice", u64::MAX, "alice", t0()).is_err());
    assert_eq!(v.total_shares(), 0);
}

#[test]
fn journal_records_operations_in_order() {
    let rates = FeeRates {
        exit_bps: 100,
        ..FeeRates::default()
    };
    let mut v = vault(rates, 0, IdleBalance);
    v.deposit("alice", 1_000, "alice", t0()).unwrap();
    v.redeem("alice", 500, "alice", "alice", t0()).unwrap();

    let events = v.drain_events();
    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], VaultEvent::Deposit { assets: 1_000, .. }));
    assert!(matches!(events[1], VaultEvent::Withdraw { shares: 500, .. }));
    assert!(matches!(
        &events[2],
        VaultEvent::FeeCollected { breakdown, .. } if breakdown.exit_shares > 0
    ));
}
