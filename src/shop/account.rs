//! Login, order tracking and the storefront's contact forms.

use std::cmp::Reverse;
use validator::Validate;

use super::Shop;
use crate::api::{ContactMessage, ShopApi};
use crate::domain::aggregates::{OrderHistoryEntry, OrderStatus};
use crate::domain::events::{SessionEvent, ShopEvent};
use crate::domain::validation_message;
use crate::session::Session;
use crate::{Result, ShopError};

fn checked_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ShopError::InvalidInput("Please enter an email".into()));
    }
    if !validator::validate_email(email) {
        return Err(ShopError::InvalidInput("Please enter a valid email".into()));
    }
    Ok(email)
}

impl<A: ShopApi> Shop<A> {
    /// Emails a one-time password.
    pub async fn request_otp(&self, email: &str) -> Result<()> {
        let email = checked_email(email)?;
        self.api.send_otp(email).await.map_err(|e| self.api_failure("send OTP", e))?;
        self.state.lock().raise(ShopEvent::Session(SessionEvent::OtpSent { email: email.to_string() }));
        Ok(())
    }

    /// Exchanges the emailed password for a session, saves its token and
    /// loads the shopper's cart.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<Session> {
        let email = checked_email(email)?;
        let otp = otp.trim();
        if otp.is_empty() {
            return Err(ShopError::InvalidInput("Please enter the OTP".into()));
        }
        let token = self.api.verify_otp(email, otp).await.map_err(|e| self.api_failure("verify OTP", e))?;
        self.store.save(&token)?;

        let session = Session::new(token);
        let catalog_loaded = {
            let mut state = self.state.lock();
            state.session = Some(session.clone());
            state.raise(ShopEvent::Session(SessionEvent::LoggedIn));
            !state.catalog.is_empty()
        };
        tracing::info!(user_id = session.user_id().unwrap_or("unknown"), "logged in");

        if catalog_loaded {
            if let Err(e) = self.hydrate_cart().await {
                tracing::warn!(error = %e, "cart not loaded after login");
            }
        }
        Ok(session)
    }

    /// Forgets the session, its saved token, the cart and any coupon.
    pub fn logout(&self) -> Result<()> {
        self.store.clear()?;
        self.state.lock().end_session(false);
        tracing::info!("logged out");
        Ok(())
    }

    /// Every purchased item across the shopper's orders, newest first.
    pub async fn order_history(&self) -> Result<Vec<OrderHistoryEntry>> {
        let session = self.require_session("view your orders")?;
        let records = self
            .api
            .user_orders(session.token(), session.user_id().map(str::to_string))
            .await
            .map_err(|e| self.api_failure("load orders", e))?;
        let mut entries: Vec<OrderHistoryEntry> = records.into_iter().rev().flat_map(|r| r.into_entries()).collect();
        entries.sort_by_key(|e| Reverse(e.placed_at));
        Ok(entries)
    }

    /// Refetches the shopper's orders and returns the current status of one.
    pub async fn track_order(&self, order_id: &str) -> Result<OrderStatus> {
        let session = self.require_session("track orders")?;
        let records = self
            .api
            .user_orders(session.token(), session.user_id().map(str::to_string))
            .await
            .map_err(|e| self.api_failure("track order", e))?;
        records.iter().find(|r| r.id == order_id).map(|r| r.status()).ok_or(ShopError::OrderNotFound)
    }

    pub async fn subscribe_newsletter(&self, email: &str) -> Result<()> {
        let email = checked_email(email)?;
        self.api.subscribe_newsletter(email).await.map_err(|e| self.api_failure("subscribe", e))?;
        tracing::info!("newsletter subscription sent");
        Ok(())
    }

    pub async fn send_contact_message(&self, message: &ContactMessage) -> Result<()> {
        message.validate().map_err(|e| ShopError::InvalidInput(validation_message(&e)))?;
        self.api.send_contact_message(message).await.map_err(|e| self.api_failure("send message", e))?;
        tracing::info!("contact message sent");
        Ok(())
    }
}
