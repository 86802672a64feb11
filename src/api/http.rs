//! reqwest-backed [`ShopApi`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{ApiError, CartMutation, CartSnapshot, ContactMessage, OrderRecord, OrderRequest, ShopApi, StockUpdate};
use crate::config::ShopConfig;
use crate::domain::aggregates::order::{GatewayOrder, GatewayReceipt};
use crate::session::SessionToken;
use crate::{Offer, Product};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// How a response signals success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Expect {
    /// 2xx and a body of `{"success": true, ...}`.
    Envelope,
    /// 2xx alone.
    Status,
}

#[derive(Debug, Clone)]
pub struct HttpShopApi {
    base_url: String,
    http: Client,
}

impl HttpShopApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_string(), http: Client::new() }
    }

    pub fn from_config(config: &ShopConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self { base_url: config.backend_url.trim_end_matches('/').to_string(), http: builder.build()? })
    }

    pub fn base_url(&self) -> &str { &self.base_url }

    fn url(&self, path: &str) -> String { format!("{}{}", self.base_url, path) }

    fn get(&self, path: &str) -> RequestBuilder { self.http.get(self.url(path)) }

    fn post(&self, path: &str, body: &impl serde::Serialize) -> RequestBuilder {
        self.http.post(self.url(path)).header(REQUEST_ID_HEADER, Uuid::now_v7().to_string()).json(body)
    }

    fn authed_post(&self, path: &str, token: &SessionToken, body: &impl serde::Serialize) -> RequestBuilder {
        self.post(path, body).bearer_auth(token.as_str())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, expect: Expect) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.bytes().await?;
        tracing::debug!(%url, status = status.as_u16(), bytes = body.len(), "backend response");
        let value = interpret(status, &body, expect)?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode(format!("{url}: {e}")))
    }
}

/// Maps a raw response onto success or the matching [`ApiError`].
fn interpret(status: StatusCode, body: &[u8], expect: Expect) -> Result<Value, ApiError> {
    let parsed: Option<Value> = if body.is_empty() { Some(Value::Null) } else { serde_json::from_slice(body).ok() };
    let message = parsed.as_ref().and_then(|v| {
        v.get("message").or_else(|| v.get("error")).and_then(Value::as_str).map(str::to_string)
    });

    if !status.is_success() {
        let message = message.unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
        if status == StatusCode::UNAUTHORIZED || is_invalid_token(&message) {
            return Err(ApiError::Unauthorized(message));
        }
        return Err(ApiError::Rejected { status: Some(status.as_u16()), message });
    }

    let value = match (parsed, expect) {
        (Some(value), _) => value,
        (None, Expect::Status) => Value::Null,
        (None, Expect::Envelope) => return Err(ApiError::Decode("response body is not JSON".into())),
    };

    if expect == Expect::Envelope && value.get("success").and_then(Value::as_bool) != Some(true) {
        let message = message.unwrap_or_else(|| "Request failed".to_string());
        if is_invalid_token(&message) {
            return Err(ApiError::Unauthorized(message));
        }
        return Err(ApiError::Rejected { status: None, message });
    }
    Ok(value)
}

fn is_invalid_token(message: &str) -> bool {
    message.trim().eq_ignore_ascii_case("invalid token")
}

/// Decodes each entry on its own, dropping the ones that do not parse.
fn decode_each<T: DeserializeOwned>(kind: &'static str, entries: Vec<Value>) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(kind, error = %e, "skipping malformed entry");
                None
            }
        })
        .collect()
}

#[derive(Deserialize)]
struct ProductList {
    #[serde(alias = "products", default)]
    product: Vec<Value>,
}

#[derive(Deserialize)]
struct OfferList {
    #[serde(default)]
    offers: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct CartBody {
    #[serde(rename = "cardData", alias = "cartData", default)]
    cart: CartSnapshot,
}

#[derive(Deserialize)]
struct GatewayBody {
    order: GatewayOrderBody,
    key_id: String,
}

#[derive(Deserialize)]
struct GatewayOrderBody {
    id: String,
    amount: u64,
    currency: String,
}

#[derive(Deserialize)]
struct OrdersBody {
    #[serde(default)]
    orders: Option<Vec<OrderRecord>>,
}

#[derive(Deserialize)]
struct TokenBody {
    token: String,
}

/// Bodies the storefront reads nothing from.
#[derive(Deserialize)]
struct Ignored {}

#[async_trait]
impl ShopApi for HttpShopApi {
    async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        let body: ProductList = self.send(self.get("/api/product/list"), Expect::Envelope).await?;
        Ok(decode_each("product", body.product))
    }

    async fn active_offers(&self) -> Result<Vec<Offer>, ApiError> {
        let body: OfferList = self.send(self.get("/api/offer/active"), Expect::Envelope).await?;
        Ok(decode_each("offer", body.offers.unwrap_or_default()))
    }

    async fn fetch_cart(&self, token: &SessionToken) -> Result<CartSnapshot, ApiError> {
        let body: CartBody = self.send(self.authed_post("/api/cart/get", token, &json!({})), Expect::Envelope).await?;
        Ok(body.cart)
    }

    async fn add_to_cart(&self, token: &SessionToken, mutation: &CartMutation) -> Result<StockUpdate, ApiError> {
        self.send(self.authed_post("/api/cart/add", token, mutation), Expect::Envelope).await
    }

    async fn update_cart(&self, token: &SessionToken, mutation: &CartMutation) -> Result<StockUpdate, ApiError> {
        self.send(self.authed_post("/api/cart/update", token, mutation), Expect::Envelope).await
    }

    async fn place_order(&self, token: &SessionToken, order: &OrderRequest) -> Result<(), ApiError> {
        let _: Ignored = self.send(self.authed_post("/api/order/place", token, order), Expect::Envelope).await?;
        Ok(())
    }

    async fn create_gateway_order(&self, token: &SessionToken, order: &OrderRequest) -> Result<GatewayOrder, ApiError> {
        let body: GatewayBody = self.send(self.authed_post("/api/order/razorpay", token, order), Expect::Envelope).await?;
        Ok(GatewayOrder { order_id: body.order.id, amount: body.order.amount, currency: body.order.currency, key_id: body.key_id })
    }

    async fn verify_payment(&self, token: &SessionToken, receipt: &GatewayReceipt) -> Result<(), ApiError> {
        let _: Ignored = self.send(self.authed_post("/api/order/verify", token, receipt), Expect::Envelope).await?;
        Ok(())
    }

    async fn user_orders(&self, token: &SessionToken, user_id: Option<String>) -> Result<Vec<OrderRecord>, ApiError> {
        let request = self.authed_post("/api/order/userorders", token, &json!({ "userId": user_id }));
        let body: OrdersBody = self.send(request, Expect::Envelope).await?;
        Ok(body.orders.unwrap_or_default())
    }

    async fn send_otp(&self, email: &str) -> Result<(), ApiError> {
        let _: Ignored = self.send(self.post("/api/user/send-otp", &json!({ "email": email })), Expect::Envelope).await?;
        Ok(())
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> Result<SessionToken, ApiError> {
        let request = self.post("/api/user/verify-otp", &json!({ "email": email, "otp": otp }));
        let body: TokenBody = self.send(request, Expect::Envelope).await?;
        Ok(SessionToken::new(body.token))
    }

    async fn subscribe_newsletter(&self, email: &str) -> Result<(), ApiError> {
        let _: Value = self.send(self.post("/api/newsletter/subscribe", &json!({ "email": email })), Expect::Status).await?;
        Ok(())
    }

    async fn send_contact_message(&self, message: &ContactMessage) -> Result<(), ApiError> {
        let _: Value = self.send(self.post("/api/contact", message), Expect::Status).await?;
        Ok(())
    }
}
