//! Product as seen through the catalog. This service never writes products.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Money,
    pub is_active: bool,
}

impl Product {
    pub fn new(name: impl Into<String>, price: Money) -> Self {
        Self { id: Uuid::now_v7(), name: name.into(), description: None, price, is_active: true }
    }

    /// Only active products can be put in a cart or bought.
    pub fn is_available(&self) -> bool { self.is_active }

    pub fn archive(&mut self) { self.is_active = false; }
    pub fn update_price(&mut self, new_price: Money) { self.price = new_price; }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    #[test]
    fn test_product_availability() {
        let mut p = Product::new("Widget", Money::new(Decimal::new(1999, 2)));
        assert!(p.is_available());
        p.archive();
        assert!(!p.is_available());
    }
}
