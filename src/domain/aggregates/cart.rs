//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::Product;
use crate::domain::value_objects::{Money, Quantity, QuantityError};

/// A user's single mutable cart. Lines keep insertion order.
#[derive(Clone, Debug)]
pub struct Cart {
    id: Uuid,
    user_id: Uuid,
    lines: Vec<CartLine>,
    created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Quantity,
}

impl Cart {
    pub fn for_user(user_id: Uuid) -> Self {
        Self { id: Uuid::now_v7(), user_id, lines: vec![], created_at: Utc::now() }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    /// Adds `quantity` of a product. A product already in the cart has its
    /// line incremented instead of getting a second line.
    pub fn add_item(&mut self, product_id: Uuid, quantity: Quantity) -> Result<&CartLine, CartError> {
        let idx = match self.lines.iter().position(|l| l.product_id == product_id) {
            Some(idx) => {
                let line = &mut self.lines[idx];
                line.quantity = line.quantity.checked_add(quantity)?;
                idx
            }
            None => {
                self.lines.push(CartLine { id: Uuid::now_v7(), cart_id: self.id, product_id, quantity });
                self.lines.len() - 1
            }
        };
        Ok(&self.lines[idx])
    }

    /// Removes the given lines. Returns how many were actually present.
    pub fn remove_lines(&mut self, line_ids: &[Uuid]) -> usize {
        let before = self.lines.len();
        self.lines.retain(|l| !line_ids.contains(&l.id));
        before - self.lines.len()
    }
}

/// A cart line joined with the live catalog entry for its product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub line: CartLine,
    pub product: Product,
}

impl PricedLine {
    pub fn line_total(&self) -> Money { self.product.price.multiply(self.line.quantity) }
}

/// Read model of a cart priced against the current catalog.
///
/// `id` is `None` when the user has never added anything; such a cart is
/// reported as empty rather than missing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricedCart {
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub lines: Vec<PricedLine>,
}

impl PricedCart {
    pub fn empty(user_id: Uuid) -> Self { Self { id: None, user_id, lines: vec![] } }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn total(&self) -> Money { self.lines.iter().map(PricedLine::line_total).sum() }
    pub fn line_ids(&self) -> Vec<Uuid> { self.lines.iter().map(|l| l.line.id).collect() }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { Quantity(QuantityError) }
impl From<QuantityError> for CartError {
    fn from(e: QuantityError) -> Self { Self::Quantity(e) }
}
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::Quantity(e) => write!(f, "{e}") }
    }
}
