//! Application services over the store ports.
pub mod cart;
pub mod checkout;
pub mod orders;

pub use cart::CartService;
pub use checkout::CheckoutEngine;
pub use orders::OrderService;
