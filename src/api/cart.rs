use axum::{extract::{Path, Query, State}, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::{AppState, CurrentUser};
use crate::domain::aggregates::{CartLine, PricedCart, Product};
use crate::domain::value_objects::{Money, Quantity};
use crate::{CommerceError, Result};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct AddToCartParams {
    #[validate(range(min = 1, max = 1000))]
    pub quantity: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AddToCartResponse { pub message: &'static str, pub line: CartLine }

#[derive(Debug, Serialize)]
pub struct CartItemResponse { pub id: Uuid, pub product_id: Uuid, pub quantity: Quantity, pub product: Product }

#[derive(Debug, Serialize)]
pub struct CartResponse { pub id: Option<Uuid>, pub user_id: Uuid, pub items: Vec<CartItemResponse>, pub total: Money }

impl From<PricedCart> for CartResponse {
    fn from(cart: PricedCart) -> Self {
        let total = cart.total();
        let items = cart.lines.into_iter()
            .map(|l| CartItemResponse { id: l.line.id, product_id: l.line.product_id, quantity: l.line.quantity, product: l.product })
            .collect();
        Self { id: cart.id, user_id: cart.user_id, items, total }
    }
}

pub async fn add_to_cart(
    State(s): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(product_id): Path<Uuid>,
    Query(p): Query<AddToCartParams>,
) -> Result<Json<AddToCartResponse>> {
    p.validate().map_err(|e| CommerceError::InvalidQuantity(e.to_string()))?;
    let quantity = Quantity::new(p.quantity.unwrap_or(1))?;
    let line = s.carts.add_item(user_id, product_id, quantity).await?;
    Ok(Json(AddToCartResponse { message: "Product added to cart", line }))
}

pub async fn view_cart(State(s): State<AppState>, CurrentUser(user_id): CurrentUser) -> Result<Json<CartResponse>> {
    Ok(Json(s.carts.view(user_id).await?.into()))
}
