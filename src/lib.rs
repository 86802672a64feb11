//! Storefront
//!
//! Client-side state container for a clothing storefront backed by a remote
//! shop API.
//!
//! ## Features
//! - Product catalog and promotional offers
//! - Cart reconciliation against server-confirmed stock
//! - Offer and coupon pricing
//! - Checkout (cash on delivery and payment gateway)
//! - OTP login and order tracking

pub mod api;
pub mod config;
pub mod domain;
pub mod session;
pub mod shop;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

pub use crate::config::ShopConfig;
pub use crate::domain::value_objects::{CouponCode, DiscountPercent, Money, ProductId};

use crate::domain::value_objects::timestamp;
pub use crate::shop::Shop;

// =============================================================================
// Core Types
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(rename = "image", default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sizes: BTreeSet<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub bestseller: bool,
    #[serde(rename = "dateAdded", alias = "createdAt", default, deserialize_with = "timestamp::deserialize_opt")]
    pub date_added: Option<DateTime<Utc>>,
}

impl Product {
    pub fn primary_image(&self) -> Option<&str> { self.images.first().map(String::as_str) }
    pub fn is_in_stock(&self) -> bool { self.stock > 0 }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub discount_percent: DiscountPercent,
    pub valid_till: DateTime<Utc>,
    #[serde(default)]
    pub apply_to_all_products: bool,
    #[serde(default)]
    pub applicable_products: Vec<ProductRef>,
}

impl Offer {
    pub fn covers(&self, product: &ProductId) -> bool {
        self.apply_to_all_products || self.applicable_products.iter().any(|p| p.id() == product)
    }
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool { self.valid_till > now }
}

/// Offers list their products either as bare ids or as populated documents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductRef {
    Id(ProductId),
    Document {
        #[serde(rename = "_id")]
        id: ProductId,
    },
}

impl ProductRef {
    pub fn id(&self) -> &ProductId {
        match self { Self::Id(id) | Self::Document { id } => id }
    }
}

/// Identity of a cart line: one entry per product and size.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineKey {
    pub product_id: ProductId,
    pub size: String,
}

impl LineKey {
    pub fn new(product_id: impl Into<ProductId>, size: impl Into<String>) -> Self {
        Self { product_id: product_id.into(), size: size.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(rename = "id")]
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub final_price: Option<Decimal>,
    pub image_url: Option<String>,
    pub size: String,
    pub quantity: u32,
}

impl CartLine {
    pub fn key(&self) -> LineKey { LineKey::new(self.product_id.clone(), self.size.clone()) }
    pub fn matches(&self, key: &LineKey) -> bool { self.product_id == key.product_id && self.size == key.size }
    pub fn is_discounted(&self) -> bool { self.final_price.is_some_and(|f| f < self.price) }
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum ShopError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("This product is out of stock")]
    OutOfStock,

    #[error("Only {available} units available")]
    InsufficientStock { available: u32 },

    #[error("Cart item not found")]
    CartLineNotFound,

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Please log in to {0}")]
    LoginRequired(&'static str),

    #[error("Products are not loaded yet")]
    CatalogNotLoaded,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Invalid Coupon Code!")]
    InvalidCoupon,

    #[error("Coupon already applied")]
    CouponAlreadyApplied,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Order not found")]
    OrderNotFound,

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Superseded by a newer cart update")]
    Superseded,

    #[error("{0}")]
    Rejected(String),

    #[error("Failed to {action}")]
    Failed { action: &'static str, #[source] source: api::ApiError },

    #[error("Session storage error: {0}")]
    SessionStore(#[from] session::SessionStoreError),
}

impl ShopError {
    /// Rejected locally, before any request was sent.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ProductNotFound
                | Self::OutOfStock
                | Self::InsufficientStock { .. }
                | Self::CartLineNotFound
                | Self::InvalidQuantity
                | Self::LoginRequired(_)
                | Self::CatalogNotLoaded
                | Self::EmptyCart
                | Self::InvalidCoupon
                | Self::CouponAlreadyApplied
                | Self::InvalidInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ShopError>;
