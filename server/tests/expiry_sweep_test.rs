//! Expiry sweeper against the in-memory store.
//!
//! Run with: `cargo test --test expiry_sweep_test`

mod common;

use chrono::{Duration, Utc};
use common::harness;
use ticketbook_server::models::PaymentStatus;
use ticketbook_server::services::ExpirySweeper;
use ticketbook_server::store::InventoryStore;

#[tokio::test]
async fn test_sweep_with_nothing_due_is_a_no_op() {
    let h = harness(10, 4).await;
    assert_eq!(h.state.sweeper.sweep().await.unwrap(), 0);

    let receipt = h
        .state
        .reservations
        .reserve(h.user_id, h.request(2))
        .await
        .unwrap();

    // Still inside the hold window.
    assert_eq!(h.state.sweeper.sweep().await.unwrap(), 0);
    let order = h.store.find_order(receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(h.sold_count().await, 2);
}

#[tokio::test]
async fn test_expired_hold_is_released_once() {
    let h = harness(10, 4).await;
    let receipt = h
        .state
        .reservations
        .reserve(h.user_id, h.request(3))
        .await
        .unwrap();
    h.store
        .set_expires_at(receipt.order_id, Utc::now() - Duration::seconds(1))
        .await;

    assert_eq!(h.state.sweeper.sweep().await.unwrap(), 1);
    assert_eq!(h.sold_count().await, 0);
    assert_eq!(h.booked_count().await, 0);

    let order = h.store.find_order(receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Expired);

    // A second pass finds nothing and leaves the counters alone.
    assert_eq!(h.state.sweeper.sweep().await.unwrap(), 0);
    assert_eq!(h.sold_count().await, 0);
}

#[tokio::test]
async fn test_only_due_orders_are_expired() {
    let h = harness(10, 4).await;
    let stale = h
        .state
        .reservations
        .reserve(h.user_id, h.request(1))
        .await
        .unwrap();
    let fresh = h
        .state
        .reservations
        .reserve(h.user_id, h.request(4))
        .await
        .unwrap();
    h.store
        .set_expires_at(stale.order_id, Utc::now() - Duration::minutes(5))
        .await;

    assert_eq!(h.state.sweeper.sweep().await.unwrap(), 1);
    assert_eq!(h.sold_count().await, 4);

    let fresh = h.store.find_order(fresh.order_id).await.unwrap().unwrap();
    assert_eq!(fresh.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_completed_orders_are_never_expired() {
    let h = harness(10, 4).await;
    let receipt = h
        .state
        .reservations
        .reserve(h.user_id, h.request(2))
        .await
        .unwrap();
    let body = common::payment_body("payment.captured", &receipt.gateway.order_id, "pay_ok");
    h.state
        .settlement
        .handle(&body, Some(common::sign(&body).as_str()))
        .await
        .unwrap();

    let expired = h
        .state
        .sweeper
        .sweep_at(Utc::now() + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(expired, 0);
    assert_eq!(h.sold_count().await, 2);
}

#[tokio::test]
async fn test_small_batches_drain_every_due_order() {
    let h = harness(20, 2).await;
    for _ in 0..7 {
        h.state
            .reservations
            .reserve(h.user_id, h.request(2))
            .await
            .unwrap();
    }
    assert_eq!(h.sold_count().await, 14);

    let sweeper = ExpirySweeper::new(h.store.clone(), 3);
    let expired = sweeper
        .sweep_at(Utc::now() + Duration::minutes(30))
        .await
        .unwrap();

    assert_eq!(expired, 7);
    assert_eq!(h.sold_count().await, 0);
    assert_eq!(h.booked_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sweeps_release_each_hold_once() {
    let h = harness(20, 4).await;
    for _ in 0..5 {
        h.state
            .reservations
            .reserve(h.user_id, h.request(3))
            .await
            .unwrap();
    }

    let at = Utc::now() + Duration::hours(1);
    let mut handles = Vec::new();
    for _ in 0..4 {
        let sweeper = ExpirySweeper::new(h.store.clone(), 2);
        handles.push(tokio::spawn(async move { sweeper.sweep_at(at).await }));
    }

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap().unwrap();
    }

    assert_eq!(total, 5);
    assert_eq!(h.sold_count().await, 0);
    assert_eq!(h.booked_count().await, 0);
}
