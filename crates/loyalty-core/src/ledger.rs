//! # Points Ledger
//!
//! Per-customer, per-store points balances, changed only by deltas.
//!
//! ## Exactly-Once Application
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply(delta { sale_id: S1, +10 −50 })                                  │
//! │       │                                                                 │
//! │       ├── S1 in applied set? ──yes──► AlreadyApplied (no change)        │
//! │       │                                                                 │
//! │       ├── balance + delta < 0? ─yes─► Err(NegativeBalance)              │
//! │       │                                                                 │
//! │       └── balance += delta, total_purchases += total,                   │
//! │           history += earn/redeem, applied += S1 ──► Applied { balance } │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same shape backs the SQLite mirror in loyalty-db and the in-memory
//! remote used in tests, so all three agree on replay semantics.
//!
//! ## Rebasing on a Fresh Lookup
//! ```text
//! remote record { store-1: 50 }        (another terminal redeemed 100)
//!        +
//! deltas still queued here { store-1: +10 }
//!        =
//! local account { store-1: 60 }        floored at zero per store
//! ```
//! The remote is authoritative for everything it has already seen; the
//! queued deltas are the only local knowledge it lacks.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::money::Money;
use crate::types::{Customer, CustomerKey, LedgerDelta, PointsTransaction};

/// Result of a successful [`Ledger::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// The delta changed the balance.
    Applied { balance: i64 },
    /// This sale id was seen before; nothing changed.
    AlreadyApplied,
}

impl ApplyOutcome {
    pub fn was_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}

#[derive(Debug, Clone, Default)]
struct Account {
    balances: BTreeMap<String, i64>,
    total_purchases: Money,
    /// Contact details from the last successful lookup.
    profile: Option<Customer>,
}

/// The remote record with `queued` deltas for the same customer laid on top.
///
/// Balances are floored at zero per store. Deltas for other customers are
/// ignored.
pub fn overlay_queued(customer: &Customer, queued: &[LedgerDelta]) -> Customer {
    let mut view = customer.clone();
    for delta in queued.iter().filter(|d| d.customer_id == customer.id) {
        let balance = view.points_balance.entry(delta.store_id.clone()).or_insert(0);
        *balance = balance.saturating_add(delta.delta());
        view.total_purchases += delta.purchase_total;
    }
    for balance in view.points_balance.values_mut() {
        *balance = (*balance).max(0);
    }
    view
}

/// In-memory ledger.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    accounts: HashMap<String, Account>,
    applied: HashSet<String>,
    history: Vec<PointsTransaction>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger::default()
    }

    /// Applies a sale's delta at most once.
    pub fn apply(&mut self, delta: &LedgerDelta) -> Result<ApplyOutcome, LedgerError> {
        if delta.sale_id.trim().is_empty() {
            return Err(LedgerError::MissingSaleId);
        }
        if self.applied.contains(&delta.sale_id) {
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        let current = self.balance(&delta.customer_id, &delta.store_id);
        let next = current + delta.delta();
        if next < 0 {
            return Err(LedgerError::NegativeBalance {
                customer_id: delta.customer_id.clone(),
                store_id: delta.store_id.clone(),
                balance: current,
                delta: delta.delta(),
            });
        }

        let account = self.accounts.entry(delta.customer_id.clone()).or_default();
        account.balances.insert(delta.store_id.clone(), next);
        account.total_purchases += delta.purchase_total;

        self.history
            .extend(PointsTransaction::from_delta(delta, Utc::now()));
        self.applied.insert(delta.sale_id.clone());

        Ok(ApplyOutcome::Applied { balance: next })
    }

    /// Balance at one store, 0 if unknown.
    pub fn balance(&self, customer_id: &str, store_id: &str) -> i64 {
        self.accounts
            .get(customer_id)
            .and_then(|a| a.balances.get(store_id))
            .copied()
            .unwrap_or(0)
    }

    /// Balance summed across stores.
    pub fn total_points(&self, customer_id: &str) -> i64 {
        self.accounts
            .get(customer_id)
            .map(|a| a.balances.values().sum())
            .unwrap_or(0)
    }

    pub fn balances(&self, customer_id: &str) -> BTreeMap<String, i64> {
        self.accounts
            .get(customer_id)
            .map(|a| a.balances.clone())
            .unwrap_or_default()
    }

    pub fn total_purchases(&self, customer_id: &str) -> Money {
        self.accounts
            .get(customer_id)
            .map(|a| a.total_purchases)
            .unwrap_or_default()
    }

    /// Seeds an account from a looked-up customer record.
    ///
    /// Only stores the ledger has never seen are seeded, so a later lookup
    /// cannot overwrite balances already moved by local deltas. Returns
    /// whether anything was seeded.
    pub fn open_account(&mut self, customer: &Customer) -> bool {
        let is_new = !self.accounts.contains_key(&customer.id);
        let account = self.accounts.entry(customer.id.clone()).or_default();
        if is_new {
            account.total_purchases = customer.total_purchases;
        }

        let mut seeded = is_new;
        for (store_id, balance) in &customer.points_balance {
            if !account.balances.contains_key(store_id) {
                account.balances.insert(store_id.clone(), (*balance).max(0));
                seeded = true;
            }
        }
        seeded
    }

    /// Replaces an account with a fresh remote record plus the deltas this
    /// ledger has applied but the remote has not seen yet.
    ///
    /// Sale ids stay in the applied set, so a later replay of a queued
    /// sale is still a no-op here. Returns the rebased view.
    pub fn rebase_account(&mut self, customer: &Customer, queued: &[LedgerDelta]) -> Customer {
        let view = overlay_queued(customer, queued);
        let account = self.accounts.entry(customer.id.clone()).or_default();
        account.balances = view.points_balance.clone();
        account.total_purchases = view.total_purchases;
        account.profile = Some(view.clone());
        view
    }

    /// Finds a customer seen by an earlier lookup, with current balances.
    pub fn find_customer(&self, key: &CustomerKey) -> Option<Customer> {
        self.accounts
            .values()
            .filter_map(|account| account.profile.as_ref())
            .find(|profile| key.matches(profile))
            .map(|profile| self.customer_view(profile))
    }

    /// Projects the ledger's view of a customer onto the looked-up record.
    pub fn customer_view(&self, customer: &Customer) -> Customer {
        let mut view = customer.clone();
        if let Some(account) = self.accounts.get(&customer.id) {
            for (store_id, balance) in &account.balances {
                view.points_balance.insert(store_id.clone(), *balance);
            }
            view.total_purchases = account.total_purchases;
        }
        view
    }

    pub fn is_applied(&self, sale_id: &str) -> bool {
        self.applied.contains(sale_id)
    }

    /// Transactions for a customer, oldest first.
    pub fn history(&self, customer_id: &str) -> Vec<PointsTransaction> {
        self.history
            .iter()
            .filter(|t| t.customer_id == customer_id)
            .cloned()
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PointsTransactionKind;
    use proptest::prelude::*;

    fn delta(sale_id: &str, earned: i64, used: i64) -> LedgerDelta {
        LedgerDelta {
            sale_id: sale_id.into(),
            customer_id: "cust-1".into(),
            store_id: "store-1".into(),
            points_earned: earned,
            points_used: used,
            purchase_total: Money::from_major(100),
        }
    }

    fn customer_with(balance: i64) -> Customer {
        let mut points_balance = BTreeMap::new();
        points_balance.insert("store-1".to_string(), balance);
        Customer {
            id: "cust-1".into(),
            name: "Ana".into(),
            email: None,
            phone: None,
            points_balance,
            total_purchases: Money::zero(),
        }
    }

    #[test]
    fn test_unknown_balance_is_zero() {
        let ledger = Ledger::new();
        assert_eq!(ledger.balance("nobody", "store-1"), 0);
        assert_eq!(ledger.total_points("nobody"), 0);
    }

    #[test]
    fn test_scenario_b_redeem() {
        let mut ledger = Ledger::new();
        ledger.open_account(&customer_with(150));

        let outcome = ledger.apply(&delta("s1", 0, 50)).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied { balance: 100 });
        assert_eq!(ledger.balance("cust-1", "store-1"), 100);
    }

    #[test]
    fn test_apply_twice_is_noop() {
        let mut ledger = Ledger::new();
        ledger.apply(&delta("s1", 10, 0)).unwrap();
        let outcome = ledger.apply(&delta("s1", 10, 0)).unwrap();

        assert_eq!(outcome, ApplyOutcome::AlreadyApplied);
        assert_eq!(ledger.balance("cust-1", "store-1"), 10);
        assert_eq!(ledger.total_purchases("cust-1"), Money::from_major(100));
        assert_eq!(ledger.history("cust-1").len(), 1);
    }

    #[test]
    fn test_negative_result_rejected() {
        let mut ledger = Ledger::new();
        ledger.open_account(&customer_with(20));

        let err = ledger.apply(&delta("s1", 0, 50)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::NegativeBalance {
                customer_id: "cust-1".into(),
                store_id: "store-1".into(),
                balance: 20,
                delta: -50,
            }
        );
        // Rejected deltas are not marked applied
        assert!(!ledger.is_applied("s1"));
        assert_eq!(ledger.balance("cust-1", "store-1"), 20);
    }

    #[test]
    fn test_missing_sale_id() {
        let mut ledger = Ledger::new();
        assert_eq!(
            ledger.apply(&delta(" ", 1, 0)),
            Err(LedgerError::MissingSaleId)
        );
    }

    #[test]
    fn test_open_account_does_not_overwrite() {
        let mut ledger = Ledger::new();
        assert!(ledger.open_account(&customer_with(150)));
        ledger.apply(&delta("s1", 0, 50)).unwrap();

        // Stale lookup after the local redemption
        assert!(!ledger.open_account(&customer_with(150)));
        assert_eq!(ledger.balance("cust-1", "store-1"), 100);

        let view = ledger.customer_view(&customer_with(150));
        assert_eq!(view.balance_at("store-1"), 100);
    }

    #[test]
    fn test_history_entries() {
        let mut ledger = Ledger::new();
        ledger.open_account(&customer_with(100));
        ledger.apply(&delta("s1", 10, 50)).unwrap();

        let history = ledger.history("cust-1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, PointsTransactionKind::Redeem);
        assert_eq!(history[1].kind, PointsTransactionKind::Earn);
        assert!(ledger.history("other").is_empty());
    }

    #[test]
    fn test_multiple_stores() {
        let mut ledger = Ledger::new();
        ledger.apply(&delta("s1", 10, 0)).unwrap();
        let mut other = delta("s2", 20, 0);
        other.store_id = "store-2".into();
        ledger.apply(&other).unwrap();

        assert_eq!(ledger.balance("cust-1", "store-1"), 10);
        assert_eq!(ledger.balance("cust-1", "store-2"), 20);
        assert_eq!(ledger.total_points("cust-1"), 30);
        assert_eq!(ledger.balances("cust-1").len(), 2);
    }

    #[test]
    fn test_rebase_follows_remote() {
        let mut ledger = Ledger::new();
        ledger.open_account(&customer_with(150));
        ledger.apply(&delta("s1", 0, 50)).unwrap();

        // The remote saw s1 and another terminal's redemption of 30
        let view = ledger.rebase_account(&customer_with(70), &[]);
        assert_eq!(view.balance_at("store-1"), 70);
        assert_eq!(ledger.balance("cust-1", "store-1"), 70);

        // s1 is still applied
        assert_eq!(
            ledger.apply(&delta("s1", 0, 50)).unwrap(),
            ApplyOutcome::AlreadyApplied
        );
    }

    #[test]
    fn test_rebase_keeps_queued_deltas() {
        let mut ledger = Ledger::new();
        ledger.open_account(&customer_with(150));
        let queued = delta("s1", 10, 0);
        ledger.apply(&queued).unwrap();

        let mut remote = customer_with(50);
        remote.total_purchases = Money::from_major(400);
        let mut elsewhere = delta("s9", 0, 5);
        elsewhere.customer_id = "someone-else".into();

        let view = ledger.rebase_account(&remote, &[queued, elsewhere]);
        assert_eq!(view.balance_at("store-1"), 60);
        assert_eq!(view.total_purchases, Money::from_major(500));
        assert_eq!(ledger.total_purchases("cust-1"), Money::from_major(500));
    }

    #[test]
    fn test_rebase_floors_at_zero() {
        let mut ledger = Ledger::new();
        let mut queued = delta("s1", 0, 100);
        queued.store_id = "store-2".into();

        let view = ledger.rebase_account(&customer_with(20), &[delta("s2", 0, 50), queued]);
        assert_eq!(view.balance_at("store-1"), 0);
        assert_eq!(view.balance_at("store-2"), 0);
        assert_eq!(ledger.balance("cust-1", "store-1"), 0);
    }

    #[test]
    fn test_find_customer_by_any_key() {
        let mut ledger = Ledger::new();
        let mut customer = customer_with(150);
        customer.email = Some("ana@example.com".into());
        customer.phone = Some("841234567".into());

        // Seeding alone records no contact details
        ledger.open_account(&customer);
        assert!(ledger.find_customer(&CustomerKey::Id("cust-1".into())).is_none());

        ledger.rebase_account(&customer, &[]);
        ledger.apply(&delta("s1", 10, 0)).unwrap();

        for key in [
            CustomerKey::Id("cust-1".into()),
            CustomerKey::Email("ana@example.com".into()),
            CustomerKey::Phone("841234567".into()),
        ] {
            let found = ledger.find_customer(&key).unwrap();
            assert_eq!(found.name, "Ana");
            assert_eq!(found.balance_at("store-1"), 160);
        }
        assert!(ledger
            .find_customer(&CustomerKey::Phone("000".into()))
            .is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        #[test]
        fn prop_apply_idempotent(
            start in 0i64..10_000,
            earned in 0i64..100,
            used in 0i64..10_000,
            repeats in 1usize..5,
        ) {
            let mut once = Ledger::new();
            once.open_account(&customer_with(start));
            let first = once.apply(&delta("s1", earned, used));

            let mut many = Ledger::new();
            many.open_account(&customer_with(start));
            for _ in 0..repeats {
                let _ = many.apply(&delta("s1", earned, used));
            }

            prop_assert_eq!(once.balance("cust-1", "store-1"), many.balance("cust-1", "store-1"));
            prop_assert!(many.balance("cust-1", "store-1") >= 0);
            prop_assert_eq!(first.is_ok(), many.is_applied("s1"));
        }
    }
}
