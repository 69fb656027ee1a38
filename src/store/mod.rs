//! Persistence ports and their adapters.
//!
//! Every operation may suspend on storage I/O. Nothing here caches cart or
//! order contents in process; the backing store is the only shared state.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{CartLine, Order, OrderItem, PricedCart, Product};
use crate::domain::value_objects::Quantity;
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::{FailPoint, MemoryStore};
pub use postgres::PgStore;

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Read access to the catalog owned by the catalog service.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Current name, price and active flag of a product, active or not.
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>>;

    /// Active products, newest first.
    async fn list_active(&self, limit: i64, offset: i64) -> Result<Page<Product>>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Find-or-create the user's cart and upsert the line for `product_id`,
    /// incrementing an existing line by `quantity`. Atomic per (user, product).
    async fn add_line(&self, user_id: Uuid, product_id: Uuid, quantity: Quantity) -> Result<CartLine>;

    /// The user's cart joined with live product data, `None` if no cart row exists.
    async fn load_priced(&self, user_id: Uuid) -> Result<Option<PricedCart>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// The order with its items, only when owned by `user_id`.
    async fn find_for_user(&self, order_id: Uuid, user_id: Uuid) -> Result<Option<Order>>;

    /// All of the user's orders with items, most recent first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>>;
}

/// Opens transactional units for checkout.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn CheckoutUnit>>;
}

/// One checkout transaction. Nothing written through a unit is visible to
/// other readers until `commit` succeeds; dropping a unit without committing
/// discards every write.
#[async_trait]
pub trait CheckoutUnit: Send {
    /// Loads the user's cart with live product data, locking it against
    /// concurrent checkouts and adds for the same user until the unit ends.
    async fn lock_cart(&mut self, user_id: Uuid) -> Result<Option<PricedCart>>;

    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    async fn insert_item(&mut self, order_id: Uuid, position: usize, item: &OrderItem) -> Result<()>;

    /// Deletes the given lines from the cart, returning how many were removed.
    async fn drain_cart(&mut self, cart_id: Uuid, line_ids: &[Uuid]) -> Result<u64>;

    /// Writes the final total and status of a pending order.
    async fn finalize_order(&mut self, order: &Order) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
