//! Shop events
//!
//! Raised by successful operations and drained by the view layer, which
//! decides how to notify the shopper.
use crate::domain::aggregates::order::PaymentMethod;
use crate::domain::value_objects::ProductId;
use crate::LineKey;

#[derive(Clone, Debug, PartialEq)]
pub enum ShopEvent {
    Catalog(CatalogEvent),
    Cart(CartEvent),
    Checkout(CheckoutEvent),
    Session(SessionEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum CatalogEvent {
    ProductsRefreshed { count: usize },
    OffersRefreshed { count: usize },
    StockAdopted { product_id: ProductId, stock: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum CartEvent {
    Hydrated { lines: usize },
    LineAdded { key: LineKey, quantity: u32 },
    LineUpdated { key: LineKey, quantity: u32 },
    LineRemoved { key: LineKey },
    Cleared,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CheckoutEvent {
    CouponApplied { code: String },
    OrderPlaced { method: PaymentMethod },
    PaymentVerified { order_id: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    OtpSent { email: String },
    LoggedIn,
    /// Cleared by logout or by the backend rejecting the token.
    Ended { expired: bool },
}
