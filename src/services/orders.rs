//! Order history lookups.

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::domain::aggregates::Order;
use crate::store::OrderStore;
use crate::{CommerceError, Result};

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    /// Orders of other users are reported as missing, not forbidden.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, order_id: Uuid, requesting_user_id: Uuid) -> Result<Order> {
        self.orders.find_for_user(order_id, requesting_user_id).await?
            .ok_or(CommerceError::OrderNotFound(order_id))
    }

    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        self.orders.list_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Product;
    use crate::domain::value_objects::{Money, Quantity};
    use crate::publisher::EventPublisher;
    use crate::services::CheckoutEngine;
    use crate::store::{CartStore, MemoryStore};
    use rust_decimal::Decimal;

    async fn place(store: &MemoryStore, user: Uuid, product: &Product, qty: u32) -> Order {
        store.add_line(user, product.id, Quantity::new(qty).unwrap()).await.unwrap();
        CheckoutEngine::new(Arc::new(store.clone()), EventPublisher::disabled()).checkout(user).await.unwrap()
    }

    #[tokio::test]
    async fn test_other_users_order_is_not_found() {
        let store = MemoryStore::new();
        let p = Product::new("P", Money::new(Decimal::new(4, 0)));
        store.insert_product(p.clone()).await;
        let (alice, bob) = (Uuid::now_v7(), Uuid::now_v7());
        let order = place(&store, alice, &p, 1).await;

        let orders = OrderService::new(Arc::new(store));
        assert_eq!(orders.get_by_id(order.id(), alice).await.unwrap().id(), order.id());
        assert!(matches!(orders.get_by_id(order.id(), bob).await, Err(CommerceError::OrderNotFound(id)) if id == order.id()));
        assert!(orders.list_for_user(bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_immune_to_price_changes() {
        let store = MemoryStore::new();
        let p = Product::new("P", Money::new(Decimal::new(4, 0)));
        store.insert_product(p.clone()).await;
        let user = Uuid::now_v7();
        let first = place(&store, user, &p, 1).await;
        let second = place(&store, user, &p, 2).await;
        store.update_product(p.id, |p| p.update_price(Money::new(Decimal::new(100, 0)))).await;

        let history = OrderService::new(Arc::new(store)).list_for_user(user).await.unwrap();
        let ids: Vec<_> = history.iter().map(Order::id).collect();
        assert_eq!(ids, vec![second.id(), first.id()]);
        assert_eq!(history[0].items()[0].product_price.amount(), Decimal::new(4, 0));
        assert_eq!(history[0].total_amount().amount(), Decimal::new(8, 0));
    }
}
