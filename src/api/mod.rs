//! HTTP surface.

use std::sync::Arc;

use axum::{routing::{get, post}, Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::identity::IdentityProvider;
use crate::publisher::EventPublisher;
use crate::services::{CartService, CheckoutEngine, OrderService};
use crate::store::{CartStore, CatalogReader, CheckoutStore, OrderStore};

pub mod auth;
pub mod cart;
pub mod error;
pub mod orders;
pub mod products;

pub use auth::CurrentUser;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogReader>,
    pub carts: CartService,
    pub checkout: CheckoutEngine,
    pub orders: OrderService,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Wires every service onto one store.
    pub fn new<S>(store: S, identity: Arc<dyn IdentityProvider>, publisher: EventPublisher) -> Self
    where
        S: CatalogReader + CartStore + OrderStore + CheckoutStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            catalog: store.clone(),
            carts: CartService::new(store.clone(), store.clone()),
            checkout: CheckoutEngine::new(store.clone(), publisher),
            orders: OrderService::new(store),
            identity,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }))
        .route("/products", get(products::list_products))
        .route("/products/:id", get(products::get_product))
        .route("/cart", get(cart::view_cart))
        .route("/cart/", get(cart::view_cart))
        .route("/cart/add/:product_id", post(cart::add_to_cart))
        .route("/orders/checkout", post(orders::checkout))
        .route("/orders/my", get(orders::order_history))
        .route("/orders/:order_id", get(orders::order_detail))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
