//! Offer Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::pricing::discounted_price;
use crate::domain::value_objects::{DiscountPercent, ProductId};
use crate::{Offer, Product};

/// Which offer wins when several cover the same product.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OfferPolicy {
    /// The first covering offer in backend order.
    #[default]
    FirstMatch,
    /// The covering offer with the highest discount; earlier offers win ties.
    BestDiscount,
}

impl FromStr for OfferPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first-match" | "first" => Ok(Self::FirstMatch),
            "best-discount" | "best" => Ok(Self::BestDiscount),
            other => Err(format!("unknown offer policy `{other}`")),
        }
    }
}

/// Active offers, as last fetched.
#[derive(Clone, Debug, Default)]
pub struct OfferBook {
    offers: Vec<Offer>,
    policy: OfferPolicy,
}

/// Price shown for a product, with the offer that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductPrice {
    pub original: Decimal,
    pub offer: Option<Offer>,
    pub final_price: Decimal,
}

impl ProductPrice {
    pub fn is_discounted(&self) -> bool { self.final_price < self.original }
}

impl OfferBook {
    pub fn new(policy: OfferPolicy) -> Self { Self { offers: vec![], policy } }

    pub fn offers(&self) -> &[Offer] { &self.offers }
    pub fn policy(&self) -> OfferPolicy { self.policy }
    pub fn is_empty(&self) -> bool { self.offers.is_empty() }

    pub fn replace(&mut self, offers: Vec<Offer>) { self.offers = offers; }

    /// The offer applied to `product` at `now`, chosen by the book's policy
    /// among unexpired offers that cover it.
    pub fn applicable(&self, product: &ProductId, now: DateTime<Utc>) -> Option<&Offer> {
        let mut covering = self.offers.iter().filter(|o| o.covers(product) && o.is_valid_at(now));
        match self.policy {
            OfferPolicy::FirstMatch => covering.next(),
            OfferPolicy::BestDiscount => covering.fold(None, |best: Option<&Offer>, o| match best {
                Some(b) if b.discount_percent >= o.discount_percent => Some(b),
                _ => Some(o),
            }),
        }
    }

    pub fn discount_for(&self, product: &ProductId, now: DateTime<Utc>) -> DiscountPercent {
        self.applicable(product, now).map_or(DiscountPercent::ZERO, |o| o.discount_percent)
    }

    pub fn price_for(&self, product: &Product, now: DateTime<Utc>) -> ProductPrice {
        let offer = self.applicable(&product.id, now).cloned();
        let discount = offer.as_ref().map_or(DiscountPercent::ZERO, |o| o.discount_percent);
        ProductPrice { original: product.price, final_price: discounted_price(product.price, discount), offer }
    }
}
