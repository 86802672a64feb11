//! Storefront - loads the shop state from the configured backend and prints a summary.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::{Shop, ShopConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ShopConfig::from_env().context("invalid storefront configuration")?;
    tracing::info!(backend = %config.backend_url, policy = ?config.offer_policy, "starting storefront");
    let shop = Shop::from_config(config)?;

    if let Err(e) = shop.bootstrap().await {
        tracing::warn!(error = %e, "storefront loaded with errors");
    }

    let summary = shop.checkout_summary();
    tracing::info!(
        products = shop.products().len(),
        offers = shop.offers().len(),
        logged_in = shop.is_logged_in(),
        cart_items = shop.cart_count(),
        subtotal = %summary.subtotal,
        total = %summary.total,
        "storefront ready"
    );
    for product in shop.latest_collection() {
        let price = shop.product_price(&product.id);
        let shown = price.map_or(product.price, |p| p.final_price);
        tracing::info!(id = %product.id, name = %product.name, price = %shown, stock = product.stock, "latest");
    }
    Ok(())
}
