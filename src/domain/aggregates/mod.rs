//! Aggregates module
pub mod catalog;
pub mod offers;
pub mod cart;
pub mod order;

pub use catalog::Catalog;
pub use offers::{OfferBook, OfferPolicy, ProductPrice};
pub use cart::{Cart, CartError};
pub use order::{CheckoutSummary, CouponState, DeliveryAddress, GatewayOrder, GatewayReceipt, OrderHistoryEntry, OrderStatus, PaymentMethod};
