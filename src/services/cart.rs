//! Cart operations: add a product, view the cart priced against the live catalog.

use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{CartLine, PricedCart};
use crate::domain::value_objects::Quantity;
use crate::store::{CartStore, CatalogReader};
use crate::{CommerceError, Result};

#[derive(Clone)]
pub struct CartService {
    catalog: Arc<dyn CatalogReader>,
    carts: Arc<dyn CartStore>,
}

impl CartService {
    pub fn new(catalog: Arc<dyn CatalogReader>, carts: Arc<dyn CartStore>) -> Self {
        Self { catalog, carts }
    }

    /// Adds `quantity` of an active product to the user's cart, creating the
    /// cart on first use. Returns the line with its post-increment quantity.
    #[instrument(skip(self))]
    pub async fn add_item(&self, user_id: Uuid, product_id: Uuid, quantity: Quantity) -> Result<CartLine> {
        let product = self.catalog.get_product(product_id).await?
            .filter(|p| p.is_available())
            .ok_or(CommerceError::ProductNotFound(product_id))?;
        let line = self.carts.add_line(user_id, product.id, quantity).await?;
        debug!(line_id = %line.id, quantity = %line.quantity, "cart line updated");
        Ok(line)
    }

    /// The user's cart with live prices. A user without a cart gets an empty one.
    #[instrument(skip(self))]
    pub async fn view(&self, user_id: Uuid) -> Result<PricedCart> {
        Ok(self.carts.load_priced(user_id).await?.unwrap_or_else(|| PricedCart::empty(user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Product;
    use crate::domain::value_objects::Money;
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;

    async fn service_with(products: &[Product]) -> (CartService, MemoryStore) {
        let store = MemoryStore::new();
        for p in products { store.insert_product(p.clone()).await; }
        (CartService::new(Arc::new(store.clone()), Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn test_add_twice_increments_single_line() {
        let p1 = Product::new("P1", Money::new(Decimal::new(1000, 2)));
        let (carts, _) = service_with(&[p1.clone()]).await;
        let user = Uuid::now_v7();
        carts.add_item(user, p1.id, Quantity::ONE).await.unwrap();
        let line = carts.add_item(user, p1.id, Quantity::ONE).await.unwrap();
        assert_eq!(line.quantity.value(), 2);
        let cart = carts.view(user).await.unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].line.quantity.value(), 2);
    }

    #[tokio::test]
    async fn test_unknown_or_inactive_product_rejected() {
        let mut retired = Product::new("Old", Money::new(Decimal::new(5, 0)));
        retired.archive();
        let (carts, _) = service_with(&[retired.clone()]).await;
        let user = Uuid::now_v7();
        let missing = Uuid::now_v7();
        assert!(matches!(carts.add_item(user, missing, Quantity::ONE).await, Err(CommerceError::ProductNotFound(id)) if id == missing));
        assert!(matches!(carts.add_item(user, retired.id, Quantity::ONE).await, Err(CommerceError::ProductNotFound(_))));
        assert!(carts.view(user).await.unwrap().id.is_none());
    }

    #[tokio::test]
    async fn test_view_reflects_live_price() {
        let p = Product::new("P", Money::new(Decimal::new(10, 0)));
        let (carts, store) = service_with(&[p.clone()]).await;
        let user = Uuid::now_v7();
        carts.add_item(user, p.id, Quantity::new(3).unwrap()).await.unwrap();
        store.update_product(p.id, |p| p.update_price(Money::new(Decimal::new(12, 0)))).await;
        let cart = carts.view(user).await.unwrap();
        assert_eq!(cart.total().amount(), Decimal::new(36, 0));
    }
}
