//! In-memory store for tests and local runs.
//!
//! A checkout unit holds the store lock for its whole lifetime and works on a
//! copy of the state; `commit` swaps the copy in, anything else discards it.
//!
//! There is one lock for the whole store, so a checkout in progress blocks
//! every other user's reads and writes until it commits or rolls back. The
//! Postgres store only serialises operations on the same cart row.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine, Order, OrderItem, OrderStatus, PricedCart, PricedLine, Product};
use crate::domain::value_objects::{Money, Quantity};
use crate::store::{CartStore, CatalogReader, CheckoutStore, CheckoutUnit, OrderStore, Page};
use crate::{CommerceError, Result};

/// Checkout step at which the next units fail with a storage error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertOrder,
    InsertItem,
    DrainCart,
    Finalize,
    Commit,
}

#[derive(Clone)]
struct StoredOrder {
    id: Uuid,
    user_id: Uuid,
    status: OrderStatus,
    total_amount: Money,
    created_at: DateTime<Utc>,
    items: Vec<OrderItem>,
}

impl StoredOrder {
    fn to_order(&self) -> Order {
        Order::restore(self.id, self.user_id, self.status, self.total_amount, self.created_at, self.items.clone())
    }
}

#[derive(Clone, Default)]
struct MemoryState {
    products: Vec<Product>,
    carts: HashMap<Uuid, Cart>,
    orders: Vec<StoredOrder>,
}

impl MemoryState {
    fn product(&self, id: Uuid) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// A line whose product is gone is a broken reference, which the
    /// Postgres foreign key rules out; report it rather than hide the line.
    fn priced_cart(&self, user_id: Uuid) -> Result<Option<PricedCart>> {
        let Some(cart) = self.carts.get(&user_id) else { return Ok(None) };
        let lines = cart.lines().iter()
            .map(|line| {
                let product = self.product(line.product_id).ok_or_else(|| {
                    CommerceError::Storage(format!("cart line {} references missing product {}", line.id, line.product_id))
                })?;
                Ok(PricedLine { line: line.clone(), product: product.clone() })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(PricedCart { id: Some(cart.id()), user_id, lines }))
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_point: Arc<RwLock<Option<FailPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        let mut state = self.state.lock().await;
        state.products.retain(|p| p.id != product.id);
        state.products.push(product);
    }

    /// Applies a catalog change, as the catalog service would.
    pub async fn update_product(&self, product_id: Uuid, change: impl FnOnce(&mut Product) + Send) -> bool {
        let mut state = self.state.lock().await;
        match state.products.iter_mut().find(|p| p.id == product_id) {
            Some(p) => { change(p); true }
            None => false,
        }
    }

    pub async fn set_fail_point(&self, point: Option<FailPoint>) {
        *self.fail_point.write().await = point;
    }

    /// Number of orders visible to readers, any status.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

#[async_trait]
impl CatalogReader for MemoryStore {
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>> {
        Ok(self.state.lock().await.product(product_id).cloned())
    }

    async fn list_active(&self, limit: i64, offset: i64) -> Result<Page<Product>> {
        let state = self.state.lock().await;
        let active: Vec<&Product> = state.products.iter().rev().filter(|p| p.is_active).collect();
        let skip = usize::try_from(offset).unwrap_or(0);
        let take = usize::try_from(limit).unwrap_or(0);
        Ok(Page {
            items: active.iter().skip(skip).take(take).map(|p| (*p).clone()).collect(),
            total: active.len() as i64,
        })
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn add_line(&self, user_id: Uuid, product_id: Uuid, quantity: Quantity) -> Result<CartLine> {
        let mut state = self.state.lock().await;
        if state.product(product_id).is_none() {
            return Err(CommerceError::ProductNotFound(product_id));
        }
        let cart = state.carts.entry(user_id).or_insert_with(|| Cart::for_user(user_id));
        Ok(cart.add_item(product_id, quantity)?.clone())
    }

    async fn load_priced(&self, user_id: Uuid) -> Result<Option<PricedCart>> {
        self.state.lock().await.priced_cart(user_id)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_for_user(&self, order_id: Uuid, user_id: Uuid) -> Result<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.iter().find(|o| o.id == order_id && o.user_id == user_id).map(StoredOrder::to_order))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<&StoredOrder> = state.orders.iter().filter(|o| o.user_id == user_id).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders.into_iter().map(StoredOrder::to_order).collect())
    }
}

#[async_trait]
impl CheckoutStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn CheckoutUnit>> {
        let fail_point = *self.fail_point.read().await;
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryCheckoutUnit { guard, working, fail_point }))
    }
}

struct MemoryCheckoutUnit {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_point: Option<FailPoint>,
}

impl MemoryCheckoutUnit {
    fn check(&self, point: FailPoint) -> Result<()> {
        if self.fail_point == Some(point) {
            return Err(CommerceError::Storage(format!("injected failure at {point:?}")));
        }
        Ok(())
    }

    fn order_mut(&mut self, order_id: Uuid) -> Result<&mut StoredOrder> {
        self.working.orders.iter_mut().find(|o| o.id == order_id)
            .ok_or_else(|| CommerceError::Storage(format!("order {order_id} not inserted")))
    }
}

#[async_trait]
impl CheckoutUnit for MemoryCheckoutUnit {
    async fn lock_cart(&mut self, user_id: Uuid) -> Result<Option<PricedCart>> {
        self.working.priced_cart(user_id)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.check(FailPoint::InsertOrder)?;
        self.working.orders.push(StoredOrder {
            id: order.id(), user_id: order.user_id(), status: order.status(),
            total_amount: order.total_amount(), created_at: order.created_at(), items: vec![],
        });
        Ok(())
    }

    async fn insert_item(&mut self, order_id: Uuid, position: usize, item: &OrderItem) -> Result<()> {
        self.check(FailPoint::InsertItem)?;
        let order = self.order_mut(order_id)?;
        if order.items.len() != position {
            return Err(CommerceError::Storage(format!("item position {position} out of sequence")));
        }
        order.items.push(item.clone());
        Ok(())
    }

    async fn drain_cart(&mut self, cart_id: Uuid, line_ids: &[Uuid]) -> Result<u64> {
        self.check(FailPoint::DrainCart)?;
        let removed = self.working.carts.values_mut()
            .find(|c| c.id() == cart_id)
            .map(|c| c.remove_lines(line_ids))
            .unwrap_or(0);
        Ok(removed as u64)
    }

    async fn finalize_order(&mut self, order: &Order) -> Result<()> {
        self.check(FailPoint::Finalize)?;
        let stored = self.order_mut(order.id())?;
        if stored.status != OrderStatus::Pending {
            return Err(CommerceError::Conflict(format!("order {} is no longer pending", order.id())));
        }
        stored.status = order.status();
        stored.total_amount = order.total_amount();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.check(FailPoint::Commit)?;
        let MemoryCheckoutUnit { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_line_with_missing_product_is_a_storage_error() {
        let store = MemoryStore::new();
        let user = Uuid::now_v7();
        let p = Product::new("P", Money::new(Decimal::new(100, 2)));
        store.insert_product(p.clone()).await;
        store.add_line(user, p.id, Quantity::ONE).await.unwrap();
        store.state.lock().await.products.clear();

        assert!(matches!(store.load_priced(user).await, Err(CommerceError::Storage(_))));
        let mut unit = store.begin().await.unwrap();
        assert!(matches!(unit.lock_cart(user).await, Err(CommerceError::Storage(_))));
        unit.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_add_line_past_i32_max_is_invalid_quantity() {
        let store = MemoryStore::new();
        let user = Uuid::now_v7();
        let p = Product::new("P", Money::new(Decimal::new(100, 2)));
        store.insert_product(p.clone()).await;
        let max = Quantity::new(i32::MAX as u32).unwrap();
        store.add_line(user, p.id, max).await.unwrap();
        assert!(matches!(store.add_line(user, p.id, Quantity::ONE).await, Err(CommerceError::InvalidQuantity(_))));
    }
}
