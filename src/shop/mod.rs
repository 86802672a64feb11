//! The shop state container.
//!
//! [`Shop`] owns the catalog, the active offers, the session and its cart.
//! Views read derived state through `&self` accessors and call the async
//! operations, which validate locally, ask the backend, and reconcile local
//! state from the answer. Every operation returns a [`Result`]; user-facing
//! notification is left to the caller, fed by [`Shop::take_events`].
//!
//! State sits behind one lock that is never held across a request, so
//! operations can overlap the way a shopper's clicks do.

mod account;
mod cart;
mod checkout;
mod inflight;

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::api::http::HttpShopApi;
use crate::api::{ApiError, ShopApi};
use crate::config::ShopConfig;
use crate::domain::aggregates::{Cart, Catalog, CheckoutSummary, CouponState, OfferBook, ProductPrice};
use crate::domain::events::{CatalogEvent, SessionEvent, ShopEvent};
use crate::domain::value_objects::{Money, ProductId};
use crate::session::{FileTokenStore, Session, TokenStore};
use crate::{CartLine, Offer, Product, Result, ShopError};

use self::inflight::InFlight;

/// Products shown in the "latest collection" strip.
pub const LATEST_COLLECTION_SIZE: usize = 8;

pub struct Shop<A = HttpShopApi> {
    api: A,
    config: ShopConfig,
    store: Arc<dyn TokenStore>,
    state: Mutex<ShopState>,
}

#[derive(Debug, Default)]
struct ShopState {
    catalog: Catalog,
    offers: OfferBook,
    cart: Cart,
    session: Option<Session>,
    coupon: CouponState,
    inflight: InFlight,
    events: Vec<ShopEvent>,
    last_error: Option<String>,
}

impl ShopState {
    fn subtotal(&self) -> Decimal {
        self.cart.subtotal(|id| self.catalog.price_of(id))
    }

    fn summary(&self, config: &ShopConfig) -> CheckoutSummary {
        let coupon = self.coupon.is_applied().then_some(config.coupon_percent);
        CheckoutSummary::compute(self.subtotal(), coupon, config.delivery_fee, &config.currency)
    }

    fn raise(&mut self, event: ShopEvent) { self.events.push(event); }

    fn adopt_stock(&mut self, product_id: &ProductId, stock: Option<u32>) {
        let Some(stock) = stock else { return };
        if self.catalog.adopt_stock(product_id, stock) {
            self.raise(ShopEvent::Catalog(CatalogEvent::StockAdopted { product_id: product_id.clone(), stock }));
        }
    }

    fn end_session(&mut self, expired: bool) {
        self.session = None;
        self.cart.clear();
        self.coupon = CouponState::Unused;
        self.raise(ShopEvent::Session(SessionEvent::Ended { expired }));
    }
}

impl Shop<HttpShopApi> {
    /// A shop talking to `config.backend_url`, with the token kept on disk.
    pub fn from_config(config: ShopConfig) -> Result<Self> {
        let api = HttpShopApi::from_config(&config).map_err(|source| ShopError::Failed { action: "reach the shop", source })?;
        let path = match &config.token_path {
            Some(path) => path.clone(),
            None => FileTokenStore::default_path()?,
        };
        Self::new(api, config, Arc::new(FileTokenStore::new(path)))
    }
}

impl<A: ShopApi> Shop<A> {
    /// Restores a saved session token, if any.
    pub fn new(api: A, config: ShopConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let session = store.load()?.map(Session::new);
        if session.is_some() {
            tracing::debug!("restored saved session");
        }
        let state = ShopState { offers: OfferBook::new(config.offer_policy), session, ..ShopState::default() };
        Ok(Self { api, config, store, state: Mutex::new(state) })
    }

    pub fn config(&self) -> &ShopConfig { &self.config }
    pub fn api(&self) -> &A { &self.api }

    /// Loads catalog and offers, then the saved cart when logged in and the
    /// catalog is not empty.
    pub async fn bootstrap(&self) -> Result<()> {
        let (products, offers) = tokio::join!(self.refresh_catalog(), self.refresh_offers());
        let hydrated = match &products {
            Ok(count) if *count > 0 && self.is_logged_in() => self.hydrate_cart().await.map(|_| ()),
            _ => Ok(()),
        };
        products.and(offers).and(hydrated)
    }

    /// Replaces the catalog. On failure the previous catalog stays.
    pub async fn refresh_catalog(&self) -> Result<usize> {
        match self.api.list_products().await {
            Ok(products) => {
                let count = products.len();
                let mut state = self.state.lock();
                state.catalog.replace(products);
                state.last_error = None;
                state.raise(ShopEvent::Catalog(CatalogEvent::ProductsRefreshed { count }));
                tracing::info!(count, "catalog refreshed");
                Ok(count)
            }
            Err(e) => Err(self.record_failure("fetch products", e)),
        }
    }

    /// Replaces the active offers. On failure the previous offers stay.
    pub async fn refresh_offers(&self) -> Result<usize> {
        match self.api.active_offers().await {
            Ok(offers) => {
                let count = offers.len();
                let mut state = self.state.lock();
                state.offers.replace(offers);
                state.raise(ShopEvent::Catalog(CatalogEvent::OffersRefreshed { count }));
                tracing::info!(count, "offers refreshed");
                Ok(count)
            }
            Err(e) => Err(self.record_failure("fetch offers", e)),
        }
    }

    // -------------------------------------------------------------------------
    // Derived state
    // -------------------------------------------------------------------------

    pub fn products(&self) -> Vec<Product> { self.state.lock().catalog.products().to_vec() }
    pub fn product(&self, id: &ProductId) -> Option<Product> { self.state.lock().catalog.get(id).cloned() }
    pub fn offers(&self) -> Vec<Offer> { self.state.lock().offers.offers().to_vec() }
    pub fn cart_lines(&self) -> Vec<CartLine> { self.state.lock().cart.lines().to_vec() }

    pub fn search(&self, query: &str) -> Vec<Product> {
        self.state.lock().catalog.search(query).into_iter().cloned().collect()
    }

    pub fn bestsellers(&self) -> Vec<Product> {
        self.state.lock().catalog.bestsellers().into_iter().cloned().collect()
    }

    pub fn latest_collection(&self) -> Vec<Product> {
        self.state.lock().catalog.latest(LATEST_COLLECTION_SIZE).into_iter().cloned().collect()
    }

    /// Original and offer price for the product page.
    pub fn product_price(&self, id: &ProductId) -> Option<ProductPrice> {
        let state = self.state.lock();
        state.catalog.get(id).map(|p| state.offers.price_for(p, Utc::now()))
    }

    /// Sum of all line quantities.
    pub fn cart_count(&self) -> u32 { self.state.lock().cart.item_count() }

    pub fn cart_subtotal(&self) -> Money { Money::new(self.state.lock().subtotal(), &self.config.currency) }

    pub fn checkout_summary(&self) -> CheckoutSummary { self.state.lock().summary(&self.config) }

    /// Local, optimistic stock check.
    pub fn is_in_stock(&self, id: &ProductId, quantity_needed: u32) -> bool {
        self.state.lock().catalog.has_stock(id, quantity_needed)
    }

    /// At least one unit in stock.
    pub fn is_available(&self, id: &ProductId) -> bool { self.is_in_stock(id, 1) }

    pub fn session(&self) -> Option<Session> { self.state.lock().session.clone() }
    pub fn is_logged_in(&self) -> bool { self.state.lock().session.is_some() }
    pub fn coupon(&self) -> CouponState { self.state.lock().coupon.clone() }

    /// The message of the last failed catalog or offer refresh.
    pub fn last_error(&self) -> Option<String> { self.state.lock().last_error.clone() }

    /// Drains events raised since the last call.
    pub fn take_events(&self) -> Vec<ShopEvent> { std::mem::take(&mut self.state.lock().events) }

    // -------------------------------------------------------------------------
    // Failure handling
    // -------------------------------------------------------------------------

    fn require_session(&self, action: &'static str) -> Result<Session> {
        self.state.lock().session.clone().ok_or(ShopError::LoginRequired(action))
    }

    fn record_failure(&self, action: &'static str, err: ApiError) -> ShopError {
        let err = self.api_failure(action, err);
        self.state.lock().last_error = Some(err.to_string());
        err
    }

    /// Maps a backend failure, ending the session when the token was refused.
    fn api_failure(&self, action: &'static str, err: ApiError) -> ShopError {
        match err {
            ApiError::Unauthorized(message) => {
                tracing::warn!(action, %message, "session rejected by backend");
                self.state.lock().end_session(true);
                if let Err(e) = self.store.clear() {
                    tracing::error!(error = %e, "failed to clear saved session");
                }
                ShopError::SessionExpired
            }
            ApiError::Rejected { message, .. } => {
                tracing::info!(action, %message, "backend rejected request");
                ShopError::Rejected(message)
            }
            source => {
                tracing::error!(action, error = %source, "backend request failed");
                ShopError::Failed { action, source }
            }
        }
    }
}

impl<A> std::fmt::Debug for Shop<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Shop")
            .field("backend_url", &self.config.backend_url)
            .field("products", &state.catalog.len())
            .field("cart_lines", &state.cart.lines().len())
            .field("logged_in", &state.session.is_some())
            .field("pending_updates", &state.inflight.len())
            .finish()
    }
}
