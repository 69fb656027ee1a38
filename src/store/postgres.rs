//! PostgreSQL store.
//!
//! Same-user writes serialise on the `carts` row: `add_line` takes its lock
//! through the upsert, checkout through `SELECT ... FOR UPDATE`. Different
//! users never contend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::aggregates::{CartLine, Order, OrderItem, OrderStatus, PricedCart, PricedLine, Product};
use crate::domain::value_objects::{Money, Quantity};
use crate::store::{CartStore, CatalogReader, CheckoutStore, CheckoutUnit, OrderStore, Page};
use crate::{CommerceError, Result};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow { id: Uuid, name: String, description: Option<String>, price: Decimal, is_active: bool }

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Product { id: r.id, name: r.name, description: r.description, price: Money::new(r.price), is_active: r.is_active }
    }
}

#[derive(sqlx::FromRow)]
struct CartLineRow { id: Uuid, cart_id: Uuid, product_id: Uuid, quantity: i32 }

impl TryFrom<CartLineRow> for CartLine {
    type Error = CommerceError;
    fn try_from(r: CartLineRow) -> Result<Self> {
        Ok(CartLine { id: r.id, cart_id: r.cart_id, product_id: r.product_id, quantity: stored_quantity(r.quantity)? })
    }
}

#[derive(sqlx::FromRow)]
struct PricedLineRow {
    line_id: Uuid, cart_id: Uuid, product_id: Uuid, quantity: i32,
    name: String, description: Option<String>, price: Decimal, is_active: bool,
}

impl TryFrom<PricedLineRow> for PricedLine {
    type Error = CommerceError;
    fn try_from(r: PricedLineRow) -> Result<Self> {
        Ok(PricedLine {
            line: CartLine { id: r.line_id, cart_id: r.cart_id, product_id: r.product_id, quantity: stored_quantity(r.quantity)? },
            product: Product { id: r.product_id, name: r.name, description: r.description, price: Money::new(r.price), is_active: r.is_active },
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow { id: Uuid, user_id: Uuid, total_amount: Decimal, status: String, created_at: DateTime<Utc> }

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid, order_id: Uuid, product_id: Uuid, product_name: String,
    product_price: Decimal, quantity: i32, subtotal: Decimal,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = CommerceError;
    fn try_from(r: OrderItemRow) -> Result<Self> {
        Ok(OrderItem {
            id: r.id, product_id: r.product_id, product_name: r.product_name,
            product_price: Money::new(r.product_price), quantity: stored_quantity(r.quantity)?, subtotal: Money::new(r.subtotal),
        })
    }
}

fn stored_quantity(q: i32) -> Result<Quantity> {
    Quantity::try_from(q).map_err(|e| CommerceError::Storage(format!("stored quantity {q}: {e}")))
}

fn restore_order(row: OrderRow, items: Vec<OrderItem>) -> Result<Order> {
    let status: OrderStatus = row.status.parse()?;
    Ok(Order::restore(row.id, row.user_id, status, Money::new(row.total_amount), row.created_at, items))
}

const PRODUCT_COLUMNS: &str = "id, name, description, price, is_active";

/// Lines of a cart joined with their products in one statement, so every
/// line is priced from the same snapshot.
async fn priced_lines(conn: &mut PgConnection, cart_id: Uuid) -> Result<Vec<PricedLine>> {
    let rows = sqlx::query_as::<_, PricedLineRow>(
        "SELECT l.id AS line_id, l.cart_id, l.product_id, l.quantity, p.name, p.description, p.price, p.is_active \
         FROM cart_lines l JOIN products p ON p.id = l.product_id WHERE l.cart_id = $1 ORDER BY l.seq")
        .bind(cart_id).fetch_all(conn).await?;
    rows.into_iter().map(PricedLine::try_from).collect()
}

#[async_trait]
impl CatalogReader for PgStore {
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(product_id).fetch_optional(&self.pool).await?;
        Ok(row.map(Product::from))
    }

    async fn list_active(&self, limit: i64, offset: i64) -> Result<Page<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active ORDER BY created_at DESC, id LIMIT $1 OFFSET $2"))
            .bind(limit).bind(offset).fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE is_active").fetch_one(&self.pool).await?;
        Ok(Page { items: rows.into_iter().map(Product::from).collect(), total: total.0 })
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn add_line(&self, user_id: Uuid, product_id: Uuid, quantity: Quantity) -> Result<CartLine> {
        let mut tx = self.pool.begin().await?;
        // The no-op update makes the upsert return the existing id and hold the row lock.
        let (cart_id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO carts (id, user_id, created_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id RETURNING id")
            .bind(Uuid::now_v7()).bind(user_id).fetch_one(&mut *tx).await?;
        let row = sqlx::query_as::<_, CartLineRow>(
            "INSERT INTO cart_lines (id, cart_id, product_id, quantity) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = cart_lines.quantity + EXCLUDED.quantity \
             RETURNING id, cart_id, product_id, quantity")
            .bind(Uuid::now_v7()).bind(cart_id).bind(product_id).bind(i32::from(quantity))
            .fetch_one(&mut *tx).await?;
        tx.commit().await?;
        row.try_into()
    }

    async fn load_priced(&self, user_id: Uuid) -> Result<Option<PricedCart>> {
        let mut conn = self.pool.acquire().await?;
        let cart: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM carts WHERE user_id = $1")
            .bind(user_id).fetch_optional(&mut *conn).await?;
        let Some((cart_id,)) = cart else { return Ok(None) };
        let lines = priced_lines(&mut *conn, cart_id).await?;
        Ok(Some(PricedCart { id: Some(cart_id), user_id, lines }))
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn find_for_user(&self, order_id: Uuid, user_id: Uuid) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, user_id, total_amount, status, created_at FROM orders WHERE id = $1 AND user_id = $2")
            .bind(order_id).bind(user_id).fetch_optional(&mut *conn).await?;
        let Some(row) = row else { return Ok(None) };
        let items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_id, product_name, product_price, quantity, subtotal \
             FROM order_items WHERE order_id = $1 ORDER BY position")
            .bind(order_id).fetch_all(&mut *conn).await?
            .into_iter().map(OrderItem::try_from).collect::<Result<Vec<_>>>()?;
        restore_order(row, items).map(Some)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, user_id, total_amount, status, created_at FROM orders WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC")
            .bind(user_id).fetch_all(&mut *conn).await?;
        if rows.is_empty() { return Ok(vec![]); }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_id, product_name, product_price, quantity, subtotal \
             FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position")
            .bind(&ids).fetch_all(&mut *conn).await?;
        for r in item_rows {
            let order_id = r.order_id;
            items.entry(order_id).or_default().push(r.try_into()?);
        }
        rows.into_iter().map(|r| { let its = items.remove(&r.id).unwrap_or_default(); restore_order(r, its) }).collect()
    }
}

#[async_trait]
impl CheckoutStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn CheckoutUnit>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgCheckoutUnit { tx }))
    }
}

struct PgCheckoutUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CheckoutUnit for PgCheckoutUnit {
    async fn lock_cart(&mut self, user_id: Uuid) -> Result<Option<PricedCart>> {
        let cart: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM carts WHERE user_id = $1 FOR UPDATE")
            .bind(user_id).fetch_optional(&mut *self.tx).await?;
        let Some((cart_id,)) = cart else { return Ok(None) };
        let lines = priced_lines(&mut *self.tx, cart_id).await?;
        Ok(Some(PricedCart { id: Some(cart_id), user_id, lines }))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query("INSERT INTO orders (id, user_id, total_amount, status, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(order.id()).bind(order.user_id()).bind(order.total_amount().amount())
            .bind(order.status().as_str()).bind(order.created_at())
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn insert_item(&mut self, order_id: Uuid, position: usize, item: &OrderItem) -> Result<()> {
        let position = i32::try_from(position).map_err(|_| CommerceError::Storage(format!("item position {position} out of range")))?;
        sqlx::query(
            "INSERT INTO order_items (id, order_id, position, product_id, product_name, product_price, quantity, subtotal) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
            .bind(item.id).bind(order_id).bind(position).bind(item.product_id).bind(&item.product_name)
            .bind(item.product_price.amount()).bind(i32::from(item.quantity)).bind(item.subtotal.amount())
            .execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn drain_cart(&mut self, cart_id: Uuid, line_ids: &[Uuid]) -> Result<u64> {
        let done = sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1 AND id = ANY($2)")
            .bind(cart_id).bind(line_ids).execute(&mut *self.tx).await?;
        Ok(done.rows_affected())
    }

    async fn finalize_order(&mut self, order: &Order) -> Result<()> {
        let done = sqlx::query("UPDATE orders SET total_amount = $2, status = $3 WHERE id = $1 AND status = 'pending'")
            .bind(order.id()).bind(order.total_amount().amount()).bind(order.status().as_str())
            .execute(&mut *self.tx).await?;
        if done.rows_affected() != 1 {
            return Err(CommerceError::Conflict(format!("order {} is no longer pending", order.id())));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
