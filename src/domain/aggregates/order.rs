//! Checkout and order tracking

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::value_objects::{CouponCode, DiscountPercent, Money, ProductId};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CouponState {
    #[default]
    Unused,
    Applied(CouponCode),
    /// Consumed by a placed order; cannot be applied again this session.
    Redeemed,
}

impl CouponState {
    pub fn is_applied(&self) -> bool { matches!(self, Self::Applied(_)) }
}

/// Totals shown on the cart and place-order views.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSummary {
    pub subtotal: Money,
    pub discount: Money,
    /// Listed delivery fee. Shown as waived; never part of the total.
    pub delivery_fee: Money,
    pub total: Money,
    pub coupon_applied: bool,
}

impl CheckoutSummary {
    /// `total = subtotal - discount`. An empty cart lists no fee.
    pub fn compute(subtotal: Decimal, coupon: Option<DiscountPercent>, delivery_fee: Decimal, currency: &str) -> Self {
        let subtotal = Money::new(subtotal, currency);
        let discount = coupon.map_or_else(|| Money::zero(currency), |pct| subtotal.percent_of(pct));
        let fee = if subtotal.is_zero() { Decimal::ZERO } else { delivery_fee };
        let total = Money::new(subtotal.amount() - discount.amount(), currency);
        Self { subtotal, discount, delivery_fee: Money::new(fee, currency), total, coupon_applied: coupon.is_some() }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "cod")]
    CashOnDelivery,
    #[serde(rename = "razorpay")]
    Gateway,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Zipcode is required"))]
    pub zipcode: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
}

impl DeliveryAddress {
    pub fn full_name(&self) -> String { format!("{} {}", self.first_name, self.last_name) }
}

/// Gateway order created by the backend, handed to the client-side payment widget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayOrder {
    pub order_id: String,
    /// Smallest currency unit, as the gateway expects.
    pub amount: u64,
    pub currency: String,
    pub key_id: String,
}

/// What the payment widget hands back after the shopper pays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayReceipt {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderStatus { #[default] Placed, Packing, OutForDelivery, Delivered, Cancelled }

impl OrderStatus {
    /// Unknown backend statuses read as freshly placed.
    pub fn from_backend(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "packing" => Self::Packing,
            "out for delivery" => Self::OutForDelivery,
            "delivered" => Self::Delivered,
            "cancelled" => Self::Cancelled,
            _ => Self::Placed,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Placed => "Order Placed",
            Self::Packing => "Packing",
            Self::OutForDelivery => "Out for Delivery",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn is_final(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.label()) }
}

/// One purchased item, flattened out of its order for the "my orders" view.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderHistoryEntry {
    pub order_id: String,
    pub product_id: Option<ProductId>,
    pub name: String,
    pub size: Option<String>,
    pub quantity: u32,
    pub price: Decimal,
    pub final_price: Option<Decimal>,
    pub image_url: Option<String>,
    pub status: OrderStatus,
    pub paid: bool,
    pub payment_method: String,
    pub placed_at: Option<DateTime<Utc>>,
    pub coupon_applied: bool,
}

impl OrderHistoryEntry {
    /// Unit price paid, after the order's coupon.
    pub fn unit_price(&self, coupon: DiscountPercent) -> Decimal {
        let base = self.final_price.unwrap_or(self.price);
        if self.coupon_applied { base * (Decimal::ONE - coupon.fraction()) } else { base }
    }

    pub fn line_total(&self, coupon: DiscountPercent) -> Decimal { self.unit_price(coupon) * Decimal::from(self.quantity) }
}
