//! Value Objects for the storefront

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend identifier of a catalog product.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self { Self::new(value) }
}

impl From<String> for ProductId {
    fn from(value: String) -> Self { Self(value) }
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn subtract(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount - other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }
    /// The share of this amount given by `percent`, unrounded.
    pub fn percent_of(&self, percent: DiscountPercent) -> Money {
        Money::new(self.amount * percent.fraction(), &self.currency)
    }
}

/// Rendered with two decimals, as every view shows prices.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self.amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        write!(f, "{}{:.2}", self.currency, rounded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { CurrencyMismatch }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Currency mismatch") }
}

/// Discount percentage in `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct DiscountPercent(Decimal);

impl DiscountPercent {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, PercentError> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED { return Err(PercentError::OutOfRange(value)); }
        Ok(Self(value))
    }
    pub fn value(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }
    /// `percent / 100`
    pub fn fraction(&self) -> Decimal { self.0 / Decimal::ONE_HUNDRED }
}

impl TryFrom<Decimal> for DiscountPercent {
    type Error = PercentError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<DiscountPercent> for Decimal {
    fn from(value: DiscountPercent) -> Self { value.0 }
}

impl fmt::Display for DiscountPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}%", self.0.normalize()) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum PercentError { OutOfRange(Decimal) }
impl std::error::Error for PercentError {}
impl fmt::Display for PercentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::OutOfRange(v) => write!(f, "discount percent {v} outside 0..=100") }
    }
}

/// Coupon code, normalized the way shoppers type it: trimmed, upper-cased.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CouponCode(String);

impl CouponCode {
    pub fn new(value: impl AsRef<str>) -> Self { Self(value.as_ref().trim().to_uppercase()) }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn matches(&self, entered: &str) -> bool { Self::new(entered) == *self }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Backend timestamps arrive as epoch milliseconds or as RFC 3339 text.
pub mod timestamp {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(DateTime<Utc>),
    }

    pub fn deserialize_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Millis(ms)) => Utc.timestamp_millis_opt(ms).single(),
            Some(Raw::Text(dt)) => Some(dt),
            None => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_timestamps_accept_millis_and_text() {
        #[derive(Deserialize)]
        struct Dated {
            #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
            at: Option<chrono::DateTime<chrono::Utc>>,
        }
        let millis: Dated = serde_json::from_str(r#"{"at":1735689600000}"#).unwrap();
        let text: Dated = serde_json::from_str(r#"{"at":"2025-01-01T00:00:00.000Z"}"#).unwrap();
        assert_eq!(millis.at, text.at);
        assert!(serde_json::from_str::<Dated>("{}").unwrap().at.is_none());
    }
    #[test]
    fn test_money_add() {
        let a = Money::new(Decimal::new(100, 0), "₹");
        let b = Money::new(Decimal::new(50, 0), "₹");
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
        assert_eq!(a.add(&Money::zero("$")), Err(MoneyError::CurrencyMismatch));
    }
    #[test]
    fn test_money_display() {
        assert_eq!(Money::new(Decimal::new(11184, 1), "₹").to_string(), "₹1118.40");
        assert_eq!(Money::zero("₹").to_string(), "₹0.00");
    }
    #[test]
    fn test_percent_bounds() {
        assert!(DiscountPercent::new(Decimal::new(101, 0)).is_err());
        assert!(DiscountPercent::new(Decimal::new(-1, 0)).is_err());
        assert_eq!(DiscountPercent::new(Decimal::new(20, 0)).unwrap().fraction(), Decimal::new(2, 1));
    }
    #[test]
    fn test_percent_deserializes_from_number() {
        let p: DiscountPercent = serde_json::from_str("15").unwrap();
        assert_eq!(p.value(), Decimal::new(15, 0));
        assert!(serde_json::from_str::<DiscountPercent>("150").is_err());
    }
    #[test]
    fn test_coupon_matching() {
        let code = CouponCode::new("AF2025");
        assert!(code.matches("  af2025 "));
        assert!(!code.matches("AF2024"));
    }
}
