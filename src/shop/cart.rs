//! Cart operations: hydrate, add, update, remove.

use chrono::{DateTime, Utc};

use super::{Shop, ShopState};
use crate::api::{ApiError, CartMutation, ShopApi};
use crate::domain::aggregates::OfferBook;
use crate::domain::events::{CartEvent, ShopEvent};
use crate::domain::value_objects::ProductId;
use crate::session::Session;
use crate::{CartLine, LineKey, Product, Result, ShopError};

/// A new cart line for `product`, priced with the offer applicable at `now`.
fn line_for(product: &Product, offers: &OfferBook, size: &str, quantity: u32, now: DateTime<Utc>) -> CartLine {
    let price = offers.price_for(product, now);
    CartLine {
        product_id: product.id.clone(),
        name: product.name.clone(),
        price: product.price,
        final_price: Some(price.final_price),
        image_url: product.primary_image().map(str::to_string),
        size: size.to_string(),
        quantity,
    }
}

impl ShopState {
    /// A response is applied only while the session that sent it is still active.
    fn holds(&self, session: &Session) -> bool {
        self.session.as_ref().is_some_and(|s| s.token() == session.token())
    }
}

impl<A: ShopApi> Shop<A> {
    /// Rebuilds the cart from the backend. Returns the number of lines.
    pub async fn hydrate_cart(&self) -> Result<usize> {
        let session = {
            let state = self.state.lock();
            let session = state.session.clone().ok_or(ShopError::LoginRequired("view your cart"))?;
            if state.catalog.is_empty() {
                return Err(ShopError::CatalogNotLoaded);
            }
            session
        };

        let snapshot = self.api.fetch_cart(session.token()).await.map_err(|e| self.api_failure("load cart", e))?;

        let mut guard = self.state.lock();
        if !guard.holds(&session) {
            return Err(ShopError::LoginRequired("view your cart"));
        }
        let state = &mut *guard;
        let now = Utc::now();
        let mut lines = Vec::new();
        for (product_id, sizes) in &snapshot {
            let Some(product) = state.catalog.get(product_id) else {
                tracing::debug!(%product_id, "skipping cart entry for unknown product");
                continue;
            };
            for (size, &quantity) in sizes.iter().filter(|(_, q)| **q > 0) {
                lines.push(line_for(product, &state.offers, size, quantity, now));
            }
        }
        let count = lines.len();
        state.cart.replace(lines);
        state.raise(ShopEvent::Cart(CartEvent::Hydrated { lines: count }));
        tracing::info!(lines = count, "cart hydrated");
        Ok(count)
    }

    /// Adds `quantity` units of a product size, merging into an existing line.
    /// Returns the resulting line.
    pub async fn add_to_cart(&self, product_id: &ProductId, size: &str, quantity: u32) -> Result<CartLine> {
        if quantity == 0 {
            return Err(ShopError::InvalidQuantity);
        }
        let key = LineKey::new(product_id.clone(), size);

        let (session, line) = {
            let state = self.state.lock();
            let product = state.catalog.get(product_id).ok_or(ShopError::ProductNotFound)?;
            if product.stock == 0 {
                return Err(ShopError::OutOfStock);
            }
            if state.cart.quantity_of(&key).saturating_add(quantity) > product.stock {
                return Err(ShopError::InsufficientStock { available: product.stock });
            }
            let session = state.session.clone().ok_or(ShopError::LoginRequired("add items to cart"))?;
            (session, line_for(product, &state.offers, size, quantity, Utc::now()))
        };

        let mutation = CartMutation { item_id: product_id.clone(), size: size.to_string(), quantity };
        let update = self
            .api
            .add_to_cart(session.token(), &mutation)
            .await
            .map_err(|e| self.api_failure("add to cart", e))?;

        let mut state = self.state.lock();
        if !state.holds(&session) {
            return Err(ShopError::LoginRequired("add items to cart"));
        }
        state.cart.add_line(line.clone());
        state.adopt_stock(product_id, update.updated_stock);
        state.raise(ShopEvent::Cart(CartEvent::LineAdded { key: key.clone(), quantity }));
        tracing::info!(%product_id, size, quantity, "added to cart");
        Ok(state.cart.line(&key).cloned().unwrap_or(line))
    }

    /// Sets a line's quantity; 0 removes it. Returns the updated line, or
    /// `None` once removed.
    ///
    /// A newer update to the same line cancels this one with
    /// [`ShopError::Superseded`].
    pub async fn update_cart_line(&self, product_id: &ProductId, size: &str, quantity: u32) -> Result<Option<CartLine>> {
        self.set_line_quantity(product_id, size, quantity, "update cart").await
    }

    pub async fn remove_cart_line(&self, product_id: &ProductId, size: &str) -> Result<()> {
        self.set_line_quantity(product_id, size, 0, "remove items").await.map(|_| ())
    }

    async fn set_line_quantity(
        &self,
        product_id: &ProductId,
        size: &str,
        quantity: u32,
        action: &'static str,
    ) -> Result<Option<CartLine>> {
        let key = LineKey::new(product_id.clone(), size);

        let (session, mut ticket) = {
            let mut state = self.state.lock();
            let stock = state.catalog.get(product_id).ok_or(ShopError::ProductNotFound)?.stock;
            let current = state.cart.line(&key).ok_or(ShopError::CartLineNotFound)?.quantity;
            // The line's own units are already reserved server-side.
            if quantity > current && quantity - current > stock {
                return Err(ShopError::InsufficientStock { available: stock + current });
            }
            let session = state.session.clone().ok_or(ShopError::LoginRequired(action))?;
            (session, state.inflight.issue(&key))
        };

        let mutation = CartMutation { item_id: product_id.clone(), size: size.to_string(), quantity };
        let response = tokio::select! {
            biased;
            () = ticket.superseded() => None,
            result = self.api.update_cart(session.token(), &mutation) => Some(result),
        };

        let latest = self.state.lock().inflight.finish(&ticket);
        let Some(result) = response.filter(|_| latest) else {
            tracing::debug!(%product_id, size, generation = ticket.generation(), "cart update superseded");
            return Err(ShopError::Superseded);
        };
        let update = match result {
            Ok(update) => update,
            Err(e) => {
                // The request this one cancelled may already have been applied server-side.
                if ticket.displaced() && !matches!(e, ApiError::Unauthorized(_)) {
                    self.resync_cart().await;
                }
                return Err(self.api_failure(action, e));
            }
        };

        let mut state = self.state.lock();
        if !state.holds(&session) {
            return Err(ShopError::LoginRequired(action));
        }
        state.cart.set_quantity(&key, quantity).map_err(|_| ShopError::CartLineNotFound)?;
        state.adopt_stock(product_id, update.updated_stock);
        let event = if quantity == 0 {
            CartEvent::LineRemoved { key: key.clone() }
        } else {
            CartEvent::LineUpdated { key: key.clone(), quantity }
        };
        state.raise(ShopEvent::Cart(event));
        tracing::info!(%product_id, size, quantity, "cart line updated");
        Ok(state.cart.line(&key).cloned())
    }

    /// Reloads stock and cart lines from the backend after an update failed
    /// with an older one possibly applied.
    async fn resync_cart(&self) {
        tracing::info!("resyncing cart after a failed update");
        if let Err(e) = self.refresh_catalog().await {
            tracing::warn!(error = %e, "catalog not refreshed during cart resync");
        }
        if let Err(e) = self.hydrate_cart().await {
            tracing::warn!(error = %e, "cart not reloaded during resync");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::api::{ApiError, CartSnapshot, MockShopApi, StockUpdate};
    use crate::domain::events::CatalogEvent;
    use crate::session::{MemoryTokenStore, SessionToken, TokenStore};
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn stock(updated: u32) -> StockUpdate { StockUpdate { updated_stock: Some(updated) } }

    fn snapshot(entries: &[(&str, &str, u32)]) -> CartSnapshot {
        let mut snapshot: CartSnapshot = BTreeMap::new();
        for (id, size, qty) in entries {
            snapshot.entry(ProductId::new(*id)).or_default().insert(size.to_string(), *qty);
        }
        snapshot
    }

    #[tokio::test]
    async fn test_add_prices_line_with_offer() {
        let mut api = MockShopApi::new();
        api.expect_add_to_cart()
            .withf(|token, m| token.as_str() == "tok" && m.item_id.as_str() == "p1" && m.size == "M" && m.quantity == 2)
            .times(1)
            .returning(|_, _| Ok(stock(3)));
        let shop = shop(api, vec![product("p1", 699, 5)], vec![global_offer(20)], true).await;

        let line = shop.add_to_cart(&"p1".into(), "M", 2).await.unwrap();
        assert_eq!(line.final_price, Some(Decimal::new(559, 0)));
        assert_eq!(line.quantity, 2);
        assert_eq!(shop.cart_subtotal().amount(), Decimal::new(1118, 0));
        assert_eq!(shop.product(&"p1".into()).unwrap().stock, 3);
        assert!(shop
            .take_events()
            .contains(&ShopEvent::Catalog(CatalogEvent::StockAdopted { product_id: "p1".into(), stock: 3 })));
    }

    #[tokio::test]
    async fn test_add_merges_same_size() {
        let mut api = MockShopApi::new();
        api.expect_add_to_cart().times(2).returning(|_, _| Ok(StockUpdate::default()));
        let shop = shop(api, vec![product("p1", 100, 10)], vec![], true).await;

        shop.add_to_cart(&"p1".into(), "M", 1).await.unwrap();
        let line = shop.add_to_cart(&"p1".into(), "M", 2).await.unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(shop.cart_lines().len(), 1);
        assert_eq!(shop.cart_count(), 3);
    }

    #[tokio::test]
    async fn test_add_out_of_stock_never_calls_backend() {
        let mut api = MockShopApi::new();
        api.expect_add_to_cart().never();
        let shop = shop(api, vec![product("p1", 699, 0)], vec![], true).await;

        let err = shop.add_to_cart(&"p1".into(), "M", 1).await.unwrap_err();
        assert_eq!(err.to_string(), "This product is out of stock");
        assert!(shop.cart_lines().is_empty());
    }

    #[tokio::test]
    async fn test_add_beyond_stock_names_stock() {
        let mut api = MockShopApi::new();
        api.expect_add_to_cart().times(1).returning(|_, _| Ok(StockUpdate::default()));
        let shop = shop(api, vec![product("p1", 699, 3)], vec![], true).await;

        shop.add_to_cart(&"p1".into(), "M", 2).await.unwrap();
        let err = shop.add_to_cart(&"p1".into(), "M", 2).await.unwrap_err();
        assert_eq!(err.to_string(), "Only 3 units available");
        assert_eq!(shop.cart_count(), 2);
    }

    #[tokio::test]
    async fn test_add_checks_product_before_session() {
        let mut api = MockShopApi::new();
        api.expect_add_to_cart().never();
        let shop = shop(api, vec![product("p1", 699, 3)], vec![], false).await;

        let err = shop.add_to_cart(&"nope".into(), "M", 1).await.unwrap_err();
        assert!(matches!(err, ShopError::ProductNotFound));
        let err = shop.add_to_cart(&"p1".into(), "M", 1).await.unwrap_err();
        assert_eq!(err.to_string(), "Please log in to add items to cart");
        assert!(matches!(shop.add_to_cart(&"p1".into(), "M", 0).await, Err(ShopError::InvalidQuantity)));
    }

    #[tokio::test]
    async fn test_add_rejection_keeps_cart() {
        let mut api = MockShopApi::new();
        api.expect_add_to_cart().times(1).returning(|_, _| Err(ApiError::rejected("Only 1 left in stock")));
        let shop = shop(api, vec![product("p1", 699, 5)], vec![], true).await;

        let err = shop.add_to_cart(&"p1".into(), "M", 2).await.unwrap_err();
        assert_eq!(err.to_string(), "Only 1 left in stock");
        assert!(shop.cart_lines().is_empty());
        assert_eq!(shop.product(&"p1".into()).unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_hydrate_skips_unknown_and_empty_entries() {
        let mut api = MockShopApi::new();
        api.expect_fetch_cart()
            .times(1)
            .returning(|_| Ok(snapshot(&[("p1", "M", 2), ("p1", "L", 0), ("gone", "M", 1), ("p2", "S", 1)])));
        let shop = shop(api, vec![product("p1", 699, 5), product("p2", 200, 5)], vec![product_offer(20, &["p1"])], true).await;

        assert_eq!(shop.hydrate_cart().await.unwrap(), 2);
        let lines = shop.cart_lines();
        let p1 = lines.iter().find(|l| l.product_id.as_str() == "p1").unwrap();
        let p2 = lines.iter().find(|l| l.product_id.as_str() == "p2").unwrap();
        assert_eq!(p1.final_price, Some(Decimal::new(559, 0)));
        assert_eq!(p2.final_price, Some(Decimal::new(200, 0)));
        assert_eq!(shop.cart_subtotal().amount(), Decimal::new(1318, 0));
    }

    #[tokio::test]
    async fn test_hydrate_preconditions() {
        let anonymous = shop(MockShopApi::new(), vec![product("p1", 699, 5)], vec![], false).await;
        assert!(matches!(anonymous.hydrate_cart().await, Err(ShopError::LoginRequired(_))));

        let mut api = MockShopApi::new();
        api.expect_fetch_cart().never();
        let unloaded = shop(api, vec![], vec![], true).await;
        assert!(matches!(unloaded.hydrate_cart().await, Err(ShopError::CatalogNotLoaded)));
    }

    #[tokio::test]
    async fn test_hydrate_failure_keeps_lines() {
        let mut api = MockShopApi::new();
        api.expect_add_to_cart().times(1).returning(|_, _| Ok(StockUpdate::default()));
        api.expect_fetch_cart().times(1).returning(|_| Err(ApiError::Decode("truncated".into())));
        let shop = shop(api, vec![product("p1", 699, 5)], vec![], true).await;

        shop.add_to_cart(&"p1".into(), "M", 1).await.unwrap();
        let err = shop.hydrate_cart().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to load cart");
        assert_eq!(shop.cart_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_only_line_empties_cart() {
        let mut api = MockShopApi::new();
        api.expect_add_to_cart().times(1).returning(|_, _| Ok(stock(4)));
        api.expect_update_cart().withf(|_, m| m.quantity == 0).times(1).returning(|_, _| Ok(stock(5)));
        let shop = shop(api, vec![product("p1", 699, 5)], vec![], true).await;

        shop.add_to_cart(&"p1".into(), "M", 1).await.unwrap();
        shop.remove_cart_line(&"p1".into(), "M").await.unwrap();
        assert!(shop.cart_lines().is_empty());
        assert_eq!(shop.cart_subtotal().to_string(), "₹0.00");
        assert_eq!(shop.product(&"p1".into()).unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_update_beyond_reserved_stock() {
        let mut api = MockShopApi::new();
        api.expect_fetch_cart().times(1).returning(|_| Ok(snapshot(&[("p1", "M", 3)])));
        api.expect_update_cart().never();
        let shop = shop(api, vec![product("p1", 699, 0)], vec![], true).await;
        shop.hydrate_cart().await.unwrap();

        let err = shop.update_cart_line(&"p1".into(), "M", 4).await.unwrap_err();
        assert_eq!(err.to_string(), "Only 3 units available");
        assert_eq!(shop.cart_count(), 3);
    }

    #[tokio::test]
    async fn test_update_rejection_at_u32_limit() {
        let mut api = MockShopApi::new();
        api.expect_fetch_cart().times(1).returning(|_| Ok(snapshot(&[("p1", "M", 2)])));
        api.expect_update_cart().never();
        let shop = shop(api, vec![product("p1", 699, u32::MAX - 3)], vec![], true).await;
        shop.hydrate_cart().await.unwrap();

        let err = shop.update_cart_line(&"p1".into(), "M", u32::MAX).await.unwrap_err();
        assert!(matches!(err, ShopError::InsufficientStock { available } if available == u32::MAX - 1));
    }

    #[tokio::test]
    async fn test_update_sets_quantity() {
        let mut api = MockShopApi::new();
        api.expect_fetch_cart().times(1).returning(|_| Ok(snapshot(&[("p1", "M", 3)])));
        api.expect_update_cart().withf(|_, m| m.quantity == 1).times(1).returning(|_, _| Ok(stock(4)));
        let shop = shop(api, vec![product("p1", 699, 2)], vec![], true).await;
        shop.hydrate_cart().await.unwrap();

        let line = shop.update_cart_line(&"p1".into(), "M", 1).await.unwrap().unwrap();
        assert_eq!(line.quantity, 1);
        assert_eq!(shop.product(&"p1".into()).unwrap().stock, 4);
    }

    #[tokio::test]
    async fn test_update_unknown_line() {
        let shop = shop(MockShopApi::new(), vec![product("p1", 699, 2)], vec![], true).await;
        let err = shop.update_cart_line(&"p1".into(), "XL", 1).await.unwrap_err();
        assert_eq!(err.to_string(), "Cart item not found");
    }

    #[tokio::test]
    async fn test_invalid_token_ends_session() {
        let mut api = MockShopApi::new();
        api.expect_list_products().times(1).returning(|| Ok(vec![product("p1", 699, 5)]));
        api.expect_add_to_cart().times(1).returning(|_, _| Ok(StockUpdate::default()));
        api.expect_update_cart().times(1).returning(|_, _| Err(ApiError::Unauthorized("Invalid token".into())));
        let store = Arc::new(MemoryTokenStore::with_token(SessionToken::new("tok")));
        let shop = Shop::new(api, config(), store.clone()).unwrap();
        shop.refresh_catalog().await.unwrap();

        shop.add_to_cart(&"p1".into(), "M", 1).await.unwrap();
        let err = shop.update_cart_line(&"p1".into(), "M", 2).await.unwrap_err();
        assert!(matches!(err, ShopError::SessionExpired));
        assert!(!shop.is_logged_in());
        assert!(shop.cart_lines().is_empty());
        assert_eq!(store.load().unwrap(), None);
    }
}
