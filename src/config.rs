//! Storefront configuration, read from the environment.

use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::aggregates::OfferPolicy;
use crate::domain::value_objects::{CouponCode, DiscountPercent};

#[derive(Debug, Clone)]
pub struct ShopConfig {
    pub backend_url: String,
    pub currency: String,
    pub delivery_fee: Decimal,
    pub coupon_code: CouponCode,
    pub coupon_percent: DiscountPercent,
    pub offer_policy: OfferPolicy,
    /// `None` uses the platform data directory.
    pub token_path: Option<PathBuf>,
    /// `None` leaves requests to the transport's own defaults.
    pub request_timeout: Option<Duration>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} has an invalid value `{value}`: {reason}")]
    Invalid { name: &'static str, value: String, reason: String },
}

impl ShopConfig {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
            currency: "₹".to_string(),
            delivery_fee: Decimal::new(150, 0),
            coupon_code: CouponCode::new("AF2025"),
            coupon_percent: DiscountPercent::new(Decimal::TEN).unwrap_or(DiscountPercent::ZERO),
            offer_policy: OfferPolicy::default(),
            token_path: None,
            request_timeout: None,
        }
    }

    /// Loads `.env` if present, then reads `STOREFRONT_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend_url = get("STOREFRONT_BACKEND_URL").ok_or(ConfigError::Missing("STOREFRONT_BACKEND_URL"))?;
        let mut config = Self::new(backend_url);

        if let Some(currency) = get("STOREFRONT_CURRENCY") { config.currency = currency; }
        if let Some(fee) = get("STOREFRONT_DELIVERY_FEE") { config.delivery_fee = parse("STOREFRONT_DELIVERY_FEE", &fee)?; }
        if let Some(code) = get("STOREFRONT_COUPON_CODE") { config.coupon_code = CouponCode::new(code); }
        if let Some(pct) = get("STOREFRONT_COUPON_PERCENT") {
            let value: Decimal = parse("STOREFRONT_COUPON_PERCENT", &pct)?;
            config.coupon_percent = DiscountPercent::new(value).map_err(|e| invalid("STOREFRONT_COUPON_PERCENT", &pct, e))?;
        }
        if let Some(policy) = get("STOREFRONT_OFFER_POLICY") { config.offer_policy = parse("STOREFRONT_OFFER_POLICY", &policy)?; }
        if let Some(path) = get("STOREFRONT_TOKEN_PATH") { config.token_path = Some(PathBuf::from(path)); }
        if let Some(secs) = get("STOREFRONT_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Some(Duration::from_secs(parse("STOREFRONT_REQUEST_TIMEOUT_SECS", &secs)?));
        }
        Ok(config)
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| invalid(name, value, e))
}

fn invalid(name: &'static str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid { name, value: value.to_string(), reason: reason.to_string() }
}
