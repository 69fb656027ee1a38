use axum::{extract::{Path, Query, State}, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::domain::aggregates::Product;
use crate::{CommerceError, Result};

#[derive(Debug, Default, Deserialize)] pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32> }
#[derive(Debug, Serialize)] pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32 }

pub async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<Product>>> {
    let page = p.page.unwrap_or(1).max(1); let per_page = p.per_page.unwrap_or(20).clamp(1, 100);
    let found = s.catalog.list_active(i64::from(per_page), i64::from(page - 1) * i64::from(per_page)).await?;
    Ok(Json(PaginatedResponse { data: found.items, total: found.total, page }))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Product>> {
    s.catalog.get_product(id).await?.filter(Product::is_available).map(Json).ok_or(CommerceError::ProductNotFound(id))
}
