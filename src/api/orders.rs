use axum::{extract::{Path, State}, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::{AppState, CurrentUser};
use crate::domain::aggregates::{Order, OrderItem, OrderStatus};
use crate::domain::value_objects::Money;
use crate::Result;

#[derive(Debug, Serialize)]
pub struct CheckoutResponse { pub message: &'static str, pub order_id: Uuid, pub total: Money }

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self { id: o.id(), total_amount: o.total_amount(), status: o.status(), created_at: o.created_at(), items: o.items().to_vec() }
    }
}

pub async fn checkout(State(s): State<AppState>, CurrentUser(user_id): CurrentUser) -> Result<Json<CheckoutResponse>> {
    let order = s.checkout.checkout(user_id).await?;
    Ok(Json(CheckoutResponse { message: "Order placed successfully", order_id: order.id(), total: order.total_amount() }))
}

pub async fn order_history(State(s): State<AppState>, CurrentUser(user_id): CurrentUser) -> Result<Json<Vec<OrderResponse>>> {
    let orders = s.orders.list_for_user(user_id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

pub async fn order_detail(
    State(s): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>> {
    Ok(Json(s.orders.get_by_id(order_id, user_id).await?.into()))
}
