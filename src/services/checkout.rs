//! Checkout: turns the user's cart into a paid order in one transaction.
//!
//! Either the order, all of its items and the drained cart become visible
//! together, or nothing changes. A retry after a successful checkout sees an
//! empty cart and fails with [`CommerceError::EmptyCart`], so a lost response
//! can never produce a second order.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::aggregates::Order;
use crate::publisher::EventPublisher;
use crate::store::{CheckoutStore, CheckoutUnit};
use crate::{CommerceError, Result};

#[derive(Clone)]
pub struct CheckoutEngine {
    store: Arc<dyn CheckoutStore>,
    publisher: EventPublisher,
}

impl CheckoutEngine {
    pub fn new(store: Arc<dyn CheckoutStore>, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    #[instrument(skip(self))]
    pub async fn checkout(&self, user_id: Uuid) -> Result<Order> {
        let mut unit = self.store.begin().await?;
        let mut order = match place_order(unit.as_mut(), user_id).await {
            Ok(order) => order,
            Err(e) => {
                if let Err(rb) = unit.rollback().await {
                    warn!(error = %rb, "checkout rollback failed; transaction discarded on drop");
                }
                warn!(error = %e, "checkout rolled back");
                return Err(e);
            }
        };
        unit.commit().await?;

        info!(order_id = %order.id(), total = %order.total_amount(), items = order.items().len(), "order placed");
        self.publisher.publish_all(order.take_events()).await;
        Ok(order)
    }
}

async fn place_order(unit: &mut dyn CheckoutUnit, user_id: Uuid) -> Result<Order> {
    let cart = unit.lock_cart(user_id).await?
        .filter(|c| !c.is_empty())
        .ok_or(CommerceError::EmptyCart)?;
    let cart_id = cart.id.ok_or(CommerceError::EmptyCart)?;

    let mut order = Order::open(user_id);
    let order_id = order.id();
    unit.insert_order(&order).await?;

    // Prices come from the locked read above, never re-read per line. Lines
    // whose product was archived after being added are still sold at the
    // current catalog price, so the cart can always be drained.
    for (position, priced) in cart.lines.iter().enumerate() {
        let item = order.record_item(&priced.product, priced.line.quantity)?;
        unit.insert_item(order_id, position, item).await?;
    }

    let line_ids = cart.line_ids();
    let drained = unit.drain_cart(cart_id, &line_ids).await?;
    if drained != line_ids.len() as u64 {
        return Err(CommerceError::Conflict(format!("cart changed during checkout: drained {drained} of {} lines", line_ids.len())));
    }

    order.mark_paid()?;
    unit.finalize_order(&order).await?;
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{OrderStatus, Product};
    use crate::domain::value_objects::{Money, Quantity};
    use crate::store::{CartStore, FailPoint, MemoryStore, OrderStore};
    use rust_decimal::Decimal;

    async fn store_with_cart(user: Uuid, lines: &[(&Product, u32)]) -> MemoryStore {
        let store = MemoryStore::new();
        for (p, qty) in lines {
            store.insert_product((*p).clone()).await;
            store.add_line(user, p.id, Quantity::new(*qty).unwrap()).await.unwrap();
        }
        store
    }

    fn engine(store: &MemoryStore) -> CheckoutEngine {
        CheckoutEngine::new(Arc::new(store.clone()), EventPublisher::disabled())
    }

    #[tokio::test]
    async fn test_checkout_snapshots_and_totals() {
        let user = Uuid::now_v7();
        let p1 = Product::new("P1", Money::new(Decimal::new(1000, 2)));
        let p2 = Product::new("P2", Money::new(Decimal::new(550, 2)));
        let store = store_with_cart(user, &[(&p1, 2), (&p2, 1)]).await;

        let order = engine(&store).checkout(user).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Paid);
        assert_eq!(order.total_amount().amount(), Decimal::new(2550, 2));
        let subtotals: Vec<_> = order.items().iter().map(|i| i.subtotal.amount()).collect();
        assert_eq!(subtotals, vec![Decimal::new(2000, 2), Decimal::new(550, 2)]);

        let cart = store.load_priced(user).await.unwrap().unwrap();
        assert!(cart.is_empty());
        let stored = store.find_for_user(order.id(), user).await.unwrap().unwrap();
        assert_eq!(stored.total_amount(), order.total_amount());
        assert_eq!(stored.items(), order.items());
    }

    #[tokio::test]
    async fn test_empty_cart_creates_no_order() {
        let store = MemoryStore::new();
        let user = Uuid::now_v7();
        assert!(matches!(engine(&store).checkout(user).await, Err(CommerceError::EmptyCart)));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_retry_after_success_reports_empty_cart() {
        let user = Uuid::now_v7();
        let p = Product::new("P", Money::new(Decimal::new(3, 0)));
        let store = store_with_cart(user, &[(&p, 1)]).await;
        let engine = engine(&store);
        engine.checkout(user).await.unwrap();
        assert!(matches!(engine.checkout(user).await, Err(CommerceError::EmptyCart)));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_failure_at_any_step_leaves_no_trace() {
        for point in [FailPoint::InsertOrder, FailPoint::InsertItem, FailPoint::DrainCart, FailPoint::Finalize, FailPoint::Commit] {
            let user = Uuid::now_v7();
            let p1 = Product::new("P1", Money::new(Decimal::new(1000, 2)));
            let p2 = Product::new("P2", Money::new(Decimal::new(550, 2)));
            let store = store_with_cart(user, &[(&p1, 2), (&p2, 1)]).await;
            store.set_fail_point(Some(point)).await;

            let err = engine(&store).checkout(user).await.unwrap_err();
            assert!(matches!(err, CommerceError::Storage(_)), "{point:?}: {err}");
            assert_eq!(store.order_count().await, 0, "{point:?}");
            let cart = store.load_priced(user).await.unwrap().unwrap();
            assert_eq!(cart.lines.len(), 2, "{point:?}");

            store.set_fail_point(None).await;
            assert!(engine(&store).checkout(user).await.is_ok(), "{point:?}");
        }
    }

    #[tokio::test]
    async fn test_archived_product_is_still_checked_out_and_drained() {
        let user = Uuid::now_v7();
        let live = Product::new("Live", Money::new(Decimal::new(1000, 2)));
        let retired = Product::new("Retired", Money::new(Decimal::new(300, 2)));
        let store = store_with_cart(user, &[(&live, 1), (&retired, 2)]).await;
        store.update_product(retired.id, |p| p.archive()).await;

        let order = engine(&store).checkout(user).await.unwrap();
        assert_eq!(order.items().len(), 2);
        assert_eq!(order.items()[1].product_id, retired.id);
        assert_eq!(order.total_amount().amount(), Decimal::new(1600, 2));
        assert!(store.load_priced(user).await.unwrap().unwrap().lines.is_empty());

        store.add_line(user, live.id, Quantity::ONE).await.unwrap();
        assert!(engine(&store).checkout(user).await.is_ok());
        assert_eq!(store.order_count().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_place_one_order() {
        let user = Uuid::now_v7();
        let p = Product::new("P", Money::new(Decimal::new(7, 0)));
        let store = store_with_cart(user, &[(&p, 4)]).await;
        let (a, b) = (engine(&store), engine(&store));
        let (ra, rb) = tokio::join!(a.checkout(user), b.checkout(user));
        let placed = [&ra, &rb].iter().filter(|r| r.is_ok()).count();
        assert_eq!(placed, 1);
        let failed = if ra.is_err() { ra.unwrap_err() } else { rb.unwrap_err() };
        assert!(matches!(failed, CommerceError::EmptyCart | CommerceError::Conflict(_)));
        assert_eq!(store.order_count().await, 1);
    }
}
