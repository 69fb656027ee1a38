//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::Product;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, Quantity};

#[derive(Clone, Debug)]
pub struct Order {
    id: Uuid,
    user_id: Uuid,
    status: OrderStatus,
    total_amount: Money,
    items: Vec<OrderItem>,
    created_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

/// Copy of the product as it was bought. Never linked back to the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_price: Money,
    pub quantity: Quantity,
    pub subtotal: Money,
}

impl OrderItem {
    pub fn snapshot(product: &Product, quantity: Quantity) -> Self {
        Self {
            id: Uuid::now_v7(),
            product_id: product.id,
            product_name: product.name.clone(),
            product_price: product.price,
            quantity,
            subtotal: product.price.multiply(quantity),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Paid }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Paid => "paid" }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

impl Order {
    /// Starts a pending order with a zero total.
    pub fn open(user_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(), user_id, status: OrderStatus::Pending, total_amount: Money::zero(),
            items: vec![], created_at: Utc::now(), events: vec![],
        }
    }

    /// Rebuilds an order loaded from storage.
    pub fn restore(id: Uuid, user_id: Uuid, status: OrderStatus, total_amount: Money, created_at: DateTime<Utc>, items: Vec<OrderItem>) -> Self {
        Self { id, user_id, status, total_amount, items, created_at, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn total_amount(&self) -> Money { self.total_amount }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn is_paid(&self) -> bool { self.status == OrderStatus::Paid }

    /// Snapshots a product at the given quantity and adds it to the running total.
    pub fn record_item(&mut self, product: &Product, quantity: Quantity) -> Result<&OrderItem, OrderError> {
        if self.is_paid() { return Err(OrderError::Finalized); }
        let item = OrderItem::snapshot(product, quantity);
        self.total_amount = self.total_amount.add(&item.subtotal);
        self.items.push(item);
        Ok(&self.items[self.items.len() - 1])
    }

    pub fn mark_paid(&mut self) -> Result<(), OrderError> {
        if self.is_paid() { return Err(OrderError::Finalized); }
        if self.items.is_empty() { return Err(OrderError::NoItems); }
        self.status = OrderStatus::Paid;
        self.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: self.id, user_id: self.user_id, total: self.total_amount, item_count: self.items.len(),
        }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { NoItems, Finalized, UnknownStatus(String) }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems => write!(f, "No items"),
            Self::Finalized => write!(f, "Order already paid"),
            Self::UnknownStatus(s) => write!(f, "Unknown order status '{s}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_order_workflow() {
        let p1 = Product::new("P1", Money::new(Decimal::new(1000, 2)));
        let p2 = Product::new("P2", Money::new(Decimal::new(550, 2)));
        let mut order = Order::open(Uuid::now_v7());
        assert_eq!(order.status(), OrderStatus::Pending);
        order.record_item(&p1, Quantity::new(2).unwrap()).unwrap();
        order.record_item(&p2, Quantity::ONE).unwrap();
        order.mark_paid().unwrap();
        assert_eq!(order.status(), OrderStatus::Paid);
        assert_eq!(order.total_amount().amount(), Decimal::new(2550, 2));
        let subtotals: Money = order.items().iter().map(|i| i.subtotal).sum();
        assert_eq!(subtotals, order.total_amount());
        assert_eq!(order.take_events().len(), 1);
    }

    #[test]
    fn test_paid_order_is_frozen() {
        let p = Product::new("P", Money::new(Decimal::new(10, 0)));
        let mut order = Order::open(Uuid::now_v7());
        order.record_item(&p, Quantity::ONE).unwrap();
        order.mark_paid().unwrap();
        assert_eq!(order.record_item(&p, Quantity::ONE).unwrap_err(), OrderError::Finalized);
        assert_eq!(order.mark_paid().unwrap_err(), OrderError::Finalized);
        assert_eq!(order.total_amount().amount(), Decimal::new(10, 0));
    }

    #[test]
    fn test_empty_order_cannot_be_paid() {
        let mut order = Order::open(Uuid::now_v7());
        assert_eq!(order.mark_paid().unwrap_err(), OrderError::NoItems);
    }

    #[test]
    fn test_snapshot_ignores_later_price_change() {
        let mut p = Product::new("P", Money::new(Decimal::new(10, 0)));
        let item = OrderItem::snapshot(&p, Quantity::new(3).unwrap());
        p.update_price(Money::new(Decimal::new(99, 0)));
        assert_eq!(item.product_price.amount(), Decimal::new(10, 0));
        assert_eq!(item.subtotal.amount(), Decimal::new(30, 0));
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!("paid".parse::<OrderStatus>().unwrap(), OrderStatus::Paid);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
