//! Shared test utilities and mock infrastructure.

#![allow(dead_code, unused_imports)]

pub mod mock_backend;

use std::sync::Arc;
use storefront::api::http::HttpShopApi;
use storefront::session::{MemoryTokenStore, SessionToken};
use storefront::{Shop, ShopConfig};

use mock_backend::{MockBackend, MockResponse};

pub const PRODUCTS: &str = r#"{"success":true,"product":[
    {"_id":"p1","name":"Linen Shirt","price":699,"image":["shirt.jpg"],"sizes":["M","L"],"stock":5,
     "bestseller":true,"dateAdded":1735689600000},
    {"_id":"p2","name":"Denim Cap","price":199,"image":["cap.jpg"],"sizes":["One Size"],"stock":0,
     "dateAdded":1704067200000}
]}"#;

pub const OFFERS: &str = r#"{"success":true,"offers":[
    {"_id":"o1","title":"Summer Sale","discountPercent":20,"validTill":"2999-01-01T00:00:00Z",
     "applyToAllProducts":true,"applicableProducts":[]}
]}"#;

/// Queues the catalog and offer responses every storefront starts with.
pub async fn seed_catalog(mock: &MockBackend) {
    mock.enqueue("/api/product/list", MockResponse::json(PRODUCTS)).await;
    mock.enqueue("/api/offer/active", MockResponse::json(OFFERS)).await;
}

/// A shop against `mock`, logged in with `token` when given.
pub fn shop(mock: &MockBackend, token: Option<&str>) -> (Shop<HttpShopApi>, Arc<MemoryTokenStore>) {
    let config = ShopConfig::new(mock.base_url());
    let store = Arc::new(match token {
        Some(t) => MemoryTokenStore::with_token(SessionToken::new(t)),
        None => MemoryTokenStore::new(),
    });
    let api = HttpShopApi::from_config(&config).unwrap();
    (Shop::new(api, config, store.clone()).unwrap(), store)
}
