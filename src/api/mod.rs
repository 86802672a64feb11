//! Shop backend API.
//!
//! [`ShopApi`] is the seam between the state container and the remote
//! backend. [`http::HttpShopApi`] talks to the real service; tests use the
//! generated `MockShopApi`.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use validator::Validate;

use crate::domain::aggregates::order::{DeliveryAddress, GatewayOrder, GatewayReceipt, OrderHistoryEntry, OrderStatus, PaymentMethod};
use crate::domain::value_objects::{timestamp, ProductId};
use crate::session::SessionToken;
use crate::{Offer, Product};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),

    /// The backend no longer accepts the session token.
    #[error("{0}")]
    Unauthorized(String),

    /// A business failure reported by the backend, message verbatim.
    #[error("{message}")]
    Rejected { status: Option<u16>, message: String },
}

impl ApiError {
    pub fn rejected(message: impl Into<String>) -> Self { Self::Rejected { status: None, message: message.into() } }
}

/// Persisted cart: product id → size → quantity.
pub type CartSnapshot = BTreeMap<ProductId, BTreeMap<String, u32>>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartMutation {
    pub item_id: ProductId,
    pub size: String,
    pub quantity: u32,
}

/// Stock left after a successful cart mutation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    #[serde(default)]
    pub updated_stock: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(rename = "_id")]
    pub product_id: ProductId,
    pub name: String,
    pub size: String,
    pub quantity: u32,
    pub image_url: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub final_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub user_id: Option<String>,
    pub address: DeliveryAddress,
    pub items: Vec<OrderItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub coupon_applied: bool,
    pub estimated_delivery_date: DateTime<Utc>,
}

/// An order as returned by the order history endpoint.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub items: Vec<OrderRecordItem>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub payment: bool,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub coupon_applied: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecordItem {
    #[serde(rename = "_id", alias = "id", default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub final_price: Option<Decimal>,
    #[serde(default)]
    pub size: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl OrderRecord {
    pub fn status(&self) -> OrderStatus { OrderStatus::from_backend(&self.status) }

    pub fn into_entries(self) -> Vec<OrderHistoryEntry> {
        let status = self.status();
        self.items
            .into_iter()
            .map(|item| OrderHistoryEntry {
                order_id: self.id.clone(),
                product_id: item.product_id,
                name: item.name,
                size: item.size,
                quantity: item.quantity,
                price: item.price,
                final_price: item.final_price,
                image_url: item.image_url,
                status,
                paid: self.payment,
                payment_method: self.payment_method.clone(),
                placed_at: self.date,
                coupon_applied: self.coupon_applied,
            })
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ContactMessage {
    #[validate(length(min = 1, message = "Please enter your name"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Please enter a message"))]
    pub message: String,
}

#[automock]
#[async_trait]
pub trait ShopApi: Send + Sync {
    /// Full product catalog.
    async fn list_products(&self) -> Result<Vec<Product>, ApiError>;

    /// Currently active offers. An empty list is a valid answer.
    async fn active_offers(&self) -> Result<Vec<Offer>, ApiError>;

    /// The shopper's persisted cart.
    async fn fetch_cart(&self, token: &SessionToken) -> Result<CartSnapshot, ApiError>;

    /// Adds `quantity` units to a cart line.
    async fn add_to_cart(&self, token: &SessionToken, mutation: &CartMutation) -> Result<StockUpdate, ApiError>;

    /// Sets a cart line's quantity; 0 removes the line.
    async fn update_cart(&self, token: &SessionToken, mutation: &CartMutation) -> Result<StockUpdate, ApiError>;

    /// Places a cash-on-delivery order.
    async fn place_order(&self, token: &SessionToken, order: &OrderRequest) -> Result<(), ApiError>;

    /// Creates a payment-gateway order for the client-side payment widget.
    async fn create_gateway_order(&self, token: &SessionToken, order: &OrderRequest) -> Result<GatewayOrder, ApiError>;

    /// Verifies a completed gateway payment server-side.
    async fn verify_payment(&self, token: &SessionToken, receipt: &GatewayReceipt) -> Result<(), ApiError>;

    async fn user_orders(&self, token: &SessionToken, user_id: Option<String>) -> Result<Vec<OrderRecord>, ApiError>;

    async fn send_otp(&self, email: &str) -> Result<(), ApiError>;

    /// Exchanges an emailed one-time password for a session token.
    async fn verify_otp(&self, email: &str, otp: &str) -> Result<SessionToken, ApiError>;

    async fn subscribe_newsletter(&self, email: &str) -> Result<(), ApiError>;

    async fn send_contact_message(&self, message: &ContactMessage) -> Result<(), ApiError>;
}
