//! Coupon and checkout operations.

use chrono::{Duration, Utc};
use validator::Validate;

use super::Shop;
use crate::api::{OrderItem, OrderRequest, ShopApi};
use crate::domain::aggregates::{CheckoutSummary, CouponState, DeliveryAddress, GatewayOrder, GatewayReceipt, PaymentMethod};
use crate::domain::events::{CartEvent, CheckoutEvent, ShopEvent};
use crate::domain::pricing::effective_unit_price;
use crate::domain::validation_message;
use crate::session::Session;
use crate::{Result, ShopError};

/// Days from order placement to the estimated delivery date.
const DELIVERY_DAYS: i64 = 4;

impl<A: ShopApi> Shop<A> {
    /// Applies the storefront coupon. Returns the updated totals.
    pub fn apply_coupon(&self, code: &str) -> Result<CheckoutSummary> {
        if !self.config.coupon_code.matches(code) {
            return Err(ShopError::InvalidCoupon);
        }
        let mut state = self.state.lock();
        if state.coupon != CouponState::Unused {
            return Err(ShopError::CouponAlreadyApplied);
        }
        state.coupon = CouponState::Applied(self.config.coupon_code.clone());
        state.raise(ShopEvent::Checkout(CheckoutEvent::CouponApplied { code: self.config.coupon_code.to_string() }));
        tracing::info!(code = %self.config.coupon_code, "coupon applied");
        Ok(state.summary(&self.config))
    }

    /// Places a cash-on-delivery order for the whole cart.
    pub async fn place_order(&self, address: &DeliveryAddress) -> Result<()> {
        let (session, order) = self.prepare_order(address, PaymentMethod::CashOnDelivery)?;
        self.api.place_order(session.token(), &order).await.map_err(|e| self.api_failure("place order", e))?;
        self.complete_order(PaymentMethod::CashOnDelivery);
        Ok(())
    }

    /// Creates a gateway order for the cart. The cart is kept until the
    /// payment is confirmed.
    pub async fn begin_gateway_payment(&self, address: &DeliveryAddress) -> Result<GatewayOrder> {
        let (session, order) = self.prepare_order(address, PaymentMethod::Gateway)?;
        let gateway = self
            .api
            .create_gateway_order(session.token(), &order)
            .await
            .map_err(|e| self.api_failure("start payment", e))?;
        tracing::info!(order_id = %gateway.order_id, amount = gateway.amount, "gateway order created");
        Ok(gateway)
    }

    pub async fn confirm_gateway_payment(&self, receipt: &GatewayReceipt) -> Result<()> {
        let session = self.require_session("place an order")?;
        self.api
            .verify_payment(session.token(), receipt)
            .await
            .map_err(|e| self.api_failure("verify payment", e))?;
        self.state
            .lock()
            .raise(ShopEvent::Checkout(CheckoutEvent::PaymentVerified { order_id: receipt.order_id.clone() }));
        self.complete_order(PaymentMethod::Gateway);
        Ok(())
    }

    fn prepare_order(&self, address: &DeliveryAddress, method: PaymentMethod) -> Result<(Session, OrderRequest)> {
        let state = self.state.lock();
        let session = state.session.clone().ok_or(ShopError::LoginRequired("place an order"))?;
        if state.cart.is_empty() {
            return Err(ShopError::EmptyCart);
        }
        address.validate().map_err(|e| ShopError::InvalidInput(validation_message(&e)))?;

        let items = state
            .cart
            .lines()
            .iter()
            .map(|line| OrderItem {
                product_id: line.product_id.clone(),
                name: line.name.clone(),
                size: line.size.clone(),
                quantity: line.quantity,
                image_url: line.image_url.clone(),
                price: line.price,
                final_price: effective_unit_price(line.final_price, state.catalog.price_of(&line.product_id), line.price),
            })
            .collect();
        let summary = state.summary(&self.config);

        let order = OrderRequest {
            user_id: session.user_id().map(str::to_string),
            address: address.clone(),
            items,
            amount: summary.total.amount(),
            payment_method: method,
            coupon_applied: summary.coupon_applied,
            estimated_delivery_date: Utc::now() + Duration::days(DELIVERY_DAYS),
        };
        Ok((session, order))
    }

    fn complete_order(&self, method: PaymentMethod) {
        let mut state = self.state.lock();
        state.cart.clear();
        if state.coupon.is_applied() {
            state.coupon = CouponState::Redeemed;
        }
        state.raise(ShopEvent::Cart(CartEvent::Cleared));
        state.raise(ShopEvent::Checkout(CheckoutEvent::OrderPlaced { method }));
        tracing::info!(?method, "order placed");
    }
}
