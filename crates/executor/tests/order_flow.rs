use async_trait::async_trait;
use core_types::{Account, Instrument, OrderSide, SimulationParams};
use database::{MemoryStore, Store};
use executor::{HookError, OrderError, OrderExecutor, PostCommitHook};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

struct Fixture {
    store: MemoryStore,
    executor: OrderExecutor,
    account_id: Uuid,
    instrument_id: Uuid,
}

async fn fixture(balance: Decimal, price: Decimal) -> Fixture {
    let store = MemoryStore::new();
    let account = Account::new(balance);
    let instrument = Instrument::new("ACME", price, SimulationParams::default()).unwrap();
    store.create_account(&account).await.unwrap();
    store.create_instrument(&instrument).await.unwrap();

    Fixture {
        executor: OrderExecutor::new(Arc::new(store.clone())),
        store,
        account_id: account.account_id,
        instrument_id: instrument.instrument_id,
    }
}

/// Balance, open position quantity and transaction count, for "nothing changed" checks.
async fn snapshot(f: &Fixture) -> (Decimal, Option<i64>, usize) {
    let account = f.store.get_account(f.account_id).await.unwrap().unwrap();
    let positions = f.store.get_positions(f.account_id).await.unwrap();
    let quantity = positions.iter().find(|p| p.instrument_id == f.instrument_id).map(|p| p.quantity);
    (account.balance, quantity, f.store.transaction_count().await)
}

#[tokio::test]
async fn first_buy_debits_cash_and_opens_position_at_execution_price() {
    let f = fixture(dec!(1000), dec!(25.50)).await;

    let receipt = f
        .executor
        .execute_order(f.account_id, f.instrument_id, OrderSide::Buy, 10)
        .await
        .unwrap();

    assert_eq!(receipt.price, dec!(25.50));
    assert_eq!(receipt.total_amount, dec!(255.00));
    assert!(receipt.position_id.is_some());

    let positions = f.store.get_positions(f.account_id).await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].quantity, 10);
    assert_eq!(positions[0].average_cost, dec!(25.50));
    assert_eq!(Some(positions[0].position_id), receipt.position_id);

    let (balance, _, count) = snapshot(&f).await;
    assert_eq!(balance, dec!(745.00));
    assert_eq!(count, 1);
}

#[tokio::test]
async fn buying_into_an_existing_position_re_averages_the_cost() {
    let f = fixture(dec!(10000), dec!(10)).await;

    f.executor.execute_order(f.account_id, f.instrument_id, OrderSide::Buy, 30).await.unwrap();
    f.store.set_instrument_price(f.instrument_id, dec!(14)).await.unwrap();
    f.executor.execute_order(f.account_id, f.instrument_id, OrderSide::Buy, 10).await.unwrap();

    let position = f.store.get_positions(f.account_id).await.unwrap().remove(0);
    assert_eq!(position.quantity, 40);
    // (30 * 10 + 10 * 14) / 40
    assert_eq!(position.average_cost, dec!(11));
}

#[tokio::test]
async fn partial_sell_keeps_average_and_full_sell_removes_position() {
    let f = fixture(dec!(1000), dec!(20)).await;
    f.executor.execute_order(f.account_id, f.instrument_id, OrderSide::Buy, 10).await.unwrap();

    f.store.set_instrument_price(f.instrument_id, dec!(30)).await.unwrap();
    let partial = f
        .executor
        .execute_order(f.account_id, f.instrument_id, OrderSide::Sell, 4)
        .await
        .unwrap();
    assert!(partial.position_id.is_some());

    let position = f.store.get_positions(f.account_id).await.unwrap().remove(0);
    assert_eq!(position.quantity, 6);
    assert_eq!(position.average_cost, dec!(20));

    let full = f
        .executor
        .execute_order(f.account_id, f.instrument_id, OrderSide::Sell, 6)
        .await
        .unwrap();
    assert_eq!(full.position_id, None);
    assert!(f.store.get_positions(f.account_id).await.unwrap().is_empty());

    // 1000 - 200 + 120 + 180
    let (balance, _, count) = snapshot(&f).await;
    assert_eq!(balance, dec!(1100));
    assert_eq!(count, 3);
}

#[tokio::test]
async fn rejected_orders_leave_no_trace() {
    let f = fixture(dec!(100), dec!(10)).await;
    f.executor.execute_order(f.account_id, f.instrument_id, OrderSide::Buy, 5).await.unwrap();
    let before = snapshot(&f).await;

    // Oversell.
    let err = f
        .executor
        .execute_order(f.account_id, f.instrument_id, OrderSide::Sell, 6)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InsufficientShares { requested: 6, available: 5 }));
    assert_eq!(snapshot(&f).await, before);

    // Insufficient balance: 50 left, 6 * 10 needed.
    let err = f
        .executor
        .execute_order(f.account_id, f.instrument_id, OrderSide::Buy, 6)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InsufficientBalance { .. }));
    assert_eq!(snapshot(&f).await, before);

    // Non-positive quantity.
    let err = f
        .executor
        .execute_order(f.account_id, f.instrument_id, OrderSide::Buy, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidQuantity(0)));
    assert_eq!(snapshot(&f).await, before);

    // Frozen instrument, in both directions.
    f.store.set_instrument_flags(f.instrument_id, true, true).await.unwrap();
    for side in [OrderSide::Buy, OrderSide::Sell] {
        let err = f.executor.execute_order(f.account_id, f.instrument_id, side, 1).await.unwrap_err();
        assert!(matches!(err, OrderError::InstrumentNotTradable { frozen: true, .. }));
    }
    assert_eq!(snapshot(&f).await, before);

    // Inactive instrument.
    f.store.set_instrument_flags(f.instrument_id, false, false).await.unwrap();
    let err = f
        .executor
        .execute_order(f.account_id, f.instrument_id, OrderSide::Sell, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InstrumentNotTradable { active: false, .. }));
    assert!(err.is_validation());
    assert_eq!(snapshot(&f).await, before);
}

#[tokio::test]
async fn selling_without_a_position_is_a_validation_failure() {
    let f = fixture(dec!(100), dec!(10)).await;
    let err = f
        .executor
        .execute_order(f.account_id, f.instrument_id, OrderSide::Sell, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InsufficientShares { requested: 1, available: 0 }));
}

#[tokio::test]
async fn order_value_beyond_decimal_range_is_rejected() {
    let f = fixture(dec!(100), dec!(10000000000)).await;
    let before = snapshot(&f).await;

    let err = f
        .executor
        .execute_order(f.account_id, f.instrument_id, OrderSide::Buy, i64::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::AmountOverflow { quantity: i64::MAX, .. }));
    assert!(err.is_validation());
    assert_eq!(snapshot(&f).await, before);

    let err = f
        .executor
        .execute_order(f.account_id, f.instrument_id, OrderSide::Sell, i64::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::AmountOverflow { .. }));
    assert_eq!(snapshot(&f).await, before);
}

#[tokio::test]
async fn unknown_instrument_is_checked_before_quantity() {
    let f = fixture(dec!(100), dec!(10)).await;
    let err = f
        .executor
        .execute_order(f.account_id, Uuid::new_v4(), OrderSide::Buy, -3)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InstrumentNotFound(_)));
}

#[tokio::test]
async fn missing_account_is_a_consistency_failure_not_a_validation_failure() {
    let f = fixture(dec!(100), dec!(10)).await;
    let err = f
        .executor
        .execute_order(Uuid::new_v4(), f.instrument_id, OrderSide::Buy, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Consistency(_)));
    assert!(!err.is_validation());
    assert_eq!(f.store.transaction_count().await, 0);
}

#[tokio::test]
async fn cash_changes_sum_to_the_balance_change() {
    let f = fixture(dec!(5000), dec!(12.34)).await;
    let script = [
        (OrderSide::Buy, 40, dec!(12.34)),
        (OrderSide::Buy, 15, dec!(15.01)),
        (OrderSide::Sell, 30, dec!(17.77)),
        (OrderSide::Buy, 5, dec!(9.99)),
        (OrderSide::Sell, 30, dec!(11.50)),
    ];

    for (side, quantity, price) in script {
        f.store.set_instrument_price(f.instrument_id, price).await.unwrap();
        f.executor.execute_order(f.account_id, f.instrument_id, side, quantity).await.unwrap();
    }

    let account = f.store.get_account(f.account_id).await.unwrap().unwrap();
    let transactions = f.store.get_transactions(f.account_id).await.unwrap();
    let net: Decimal = transactions.iter().map(|t| t.cash_delta()).sum();

    assert_eq!(account.balance - account.initial_balance, net);
    assert!(transactions.iter().all(|t| t.quantity > 0 && t.price > Decimal::ZERO));
    assert!(f.store.get_positions(f.account_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_buys_never_overdraw_the_account() {
    let f = fixture(dec!(100), dec!(10)).await;
    let executor = Arc::new(f.executor);

    let mut handles = Vec::new();
    for _ in 0..25 {
        let executor = executor.clone();
        let (account_id, instrument_id) = (f.account_id, f.instrument_id);
        handles.push(tokio::spawn(async move {
            executor.execute_order(account_id, instrument_id, OrderSide::Buy, 1).await
        }));
    }

    let mut filled = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => filled += 1,
            Err(e) => assert!(matches!(e, OrderError::InsufficientBalance { .. })),
        }
    }

    assert_eq!(filled, 10);
    let account = f.store.get_account(f.account_id).await.unwrap().unwrap();
    assert_eq!(account.balance, Decimal::ZERO);
    assert_eq!(f.store.get_positions(f.account_id).await.unwrap()[0].quantity, 10);
}

struct FailingHook {
    seen: mpsc::UnboundedSender<Uuid>,
}

#[async_trait]
impl PostCommitHook for FailingHook {
    async fn order_committed(&self, account_id: Uuid) -> Result<(), HookError> {
        let _ = self.seen.send(account_id);
        Err(HookError("evaluator unavailable".to_string()))
    }
}

struct PanickingHook;

#[async_trait]
impl PostCommitHook for PanickingHook {
    async fn order_committed(&self, _account_id: Uuid) -> Result<(), HookError> {
        panic!("evaluator crashed");
    }
}

#[tokio::test]
async fn hook_failure_does_not_fail_the_order() {
    let f = fixture(dec!(100), dec!(10)).await;
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let executor = OrderExecutor::new(Arc::new(f.store.clone()))
        .with_hook(Arc::new(FailingHook { seen: seen_tx }));

    let receipt = executor.execute_order(f.account_id, f.instrument_id, OrderSide::Buy, 2).await;
    assert!(receipt.is_ok());

    let notified = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv()).await.unwrap();
    assert_eq!(notified, Some(f.account_id));
    assert_eq!(f.store.transaction_count().await, 1);
}

#[tokio::test]
async fn panicking_hook_does_not_fail_the_order() {
    let f = fixture(dec!(100), dec!(10)).await;
    let executor = OrderExecutor::new(Arc::new(f.store.clone())).with_hook(Arc::new(PanickingHook));

    executor.execute_order(f.account_id, f.instrument_id, OrderSide::Buy, 2).await.unwrap();
    executor.execute_order(f.account_id, f.instrument_id, OrderSide::Sell, 1).await.unwrap();

    assert_eq!(f.store.transaction_count().await, 2);
}

#[tokio::test]
async fn no_hook_is_fired_for_a_rejected_order() {
    let f = fixture(dec!(5), dec!(10)).await;
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let executor = OrderExecutor::new(Arc::new(f.store.clone()))
        .with_hook(Arc::new(FailingHook { seen: seen_tx }));

    assert!(executor.execute_order(f.account_id, f.instrument_id, OrderSide::Buy, 1).await.is_err());
    drop(executor);

    // The sender lives in the dropped executor's hook, so recv ends without a value.
    assert_eq!(seen_rx.recv().await, None);
}
