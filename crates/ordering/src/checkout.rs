//! Order submission to the menu site's checkout endpoint.
//!
//! The endpoint takes a form-encoded POST at
//! `/menu/{restaurant_slug}/{hashed_slug}/checkout/` and answers with JSON:
//! `{"order_id": ...}` on success or `{"message": "..."}` on failure.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use snap_menu_core::{DeliveryMode, OrderId};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, instrument, warn};
use url::Url;

use crate::config::{CheckoutConfig, RestaurantConfig};
use crate::session::{CheckoutBlocker, OrderSession, VerificationGateway};
use crate::storage::Storage;

/// Errors that can occur when placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A precondition is unmet; no request was sent.
    #[error("{0}")]
    Blocked(#[from] CheckoutBlocker),

    /// The restaurant slugs are not configured.
    #[error("Restaurant slug is not configured")]
    MissingSlug,

    /// The checkout URL could not be built.
    #[error("Invalid checkout URL: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP request failed.
    #[error("An error occurred while placing the order: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the order.
    #[error("Order placement failed: {message}")]
    Rejected { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    /// Path of the order confirmation page.
    pub redirect_path: String,
    pub mode: DeliveryMode,
    /// Message shown to the customer.
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    #[serde(default)]
    order_id: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the checkout endpoint.
#[derive(Clone)]
pub struct CheckoutClient {
    client: reqwest::Client,
    base_url: Url,
    restaurant_slug: String,
    hashed_slug: String,
    csrf_token: SecretString,
    redirect_floor: Duration,
}

impl std::fmt::Debug for CheckoutClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutClient")
            .field("base_url", &self.base_url.as_str())
            .field("restaurant_slug", &self.restaurant_slug)
            .field("hashed_slug", &self.hashed_slug)
            .field("csrf_token", &"[REDACTED]")
            .field("redirect_floor", &self.redirect_floor)
            .finish_non_exhaustive()
    }
}

impl CheckoutClient {
    /// Create a new checkout client.
    ///
    /// # Errors
    ///
    /// Returns error if a slug is blank or the HTTP client fails to build.
    pub fn new(
        config: &CheckoutConfig,
        restaurant: &RestaurantConfig,
    ) -> Result<Self, CheckoutError> {
        if restaurant.slug.trim().is_empty() || restaurant.hashed_slug.trim().is_empty() {
            return Err(CheckoutError::MissingSlug);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("snap-menu/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            restaurant_slug: restaurant.slug.trim().to_string(),
            hashed_slug: restaurant.hashed_slug.trim().to_string(),
            csrf_token: config.csrf_token.clone(),
            redirect_floor: config.redirect_floor,
        })
    }

    /// Menu page path for this restaurant.
    #[must_use]
    pub fn menu_path(&self) -> String {
        format!("/menu/{}/{}/", self.restaurant_slug, self.hashed_slug)
    }

    /// Absolute URL orders are posted to.
    ///
    /// # Errors
    ///
    /// Returns an error if the slugs do not form a valid path.
    pub fn checkout_url(&self) -> Result<Url, CheckoutError> {
        Ok(self.base_url.join(&format!("{}checkout/", self.menu_path()))?)
    }

    /// Path of the confirmation page for `order_id`.
    #[must_use]
    pub fn success_path(&self, order_id: OrderId) -> String {
        format!("{}{order_id}/order_success/", self.menu_path())
    }

    /// Place the session's order.
    ///
    /// Checks the session's preconditions first and sends nothing if one is
    /// unmet. On success the cart is cleared. A successful call never
    /// returns sooner than the configured redirect floor after it started.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Blocked` for unmet preconditions,
    /// `CheckoutError::Rejected` if the server refuses the order and
    /// `CheckoutError::Http` on transport failures. The cart is left
    /// untouched on every error.
    #[instrument(skip_all, fields(mode = %session.mode()))]
    pub async fn submit<S, G>(
        &self,
        session: &mut OrderSession<S, G>,
    ) -> Result<CheckoutReceipt, CheckoutError>
    where
        S: Storage,
        G: VerificationGateway,
    {
        let started = Instant::now();

        if let Some(blocker) = session.checkout_blocker() {
            return Err(blocker.into());
        }

        let mode = session.mode();
        let form = self.order_form(session)?;
        let url = self.checkout_url()?;
        let referer = self.base_url.join(&self.menu_path())?;

        let response = self
            .client
            .post(url)
            .header("X-CSRFToken", self.csrf_token.expose_secret())
            .header(reqwest::header::REFERER, referer.as_str())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body: Option<CheckoutResponse> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let message = body
                .and_then(|b| b.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
            warn!(status = status.as_u16(), %message, "Checkout request failed");
            return Err(CheckoutError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body = body.ok_or_else(|| CheckoutError::Parse(format!("unexpected response: {text}")))?;
        let Some(order_id) = body.order_id.as_ref().and_then(parse_order_id) else {
            let message = body.message.unwrap_or_else(|| "Unknown error".to_string());
            warn!(%message, "Checkout rejected");
            return Err(CheckoutError::Rejected {
                status: status.as_u16(),
                message,
            });
        };

        if let Err(e) = session.cart_mut().clear() {
            warn!(error = %e, "Order placed but the cart could not be cleared");
        }

        info!(%order_id, %mode, "Order placed");

        tokio::time::sleep_until(started + self.redirect_floor).await;

        Ok(CheckoutReceipt {
            order_id,
            redirect_path: self.success_path(order_id),
            mode,
            message: success_message(mode),
        })
    }

    fn order_form<S, G>(
        &self,
        session: &OrderSession<S, G>,
    ) -> Result<Vec<(&'static str, String)>, CheckoutError>
    where
        S: Storage,
        G: VerificationGateway,
    {
        let payment = session
            .payment_method()
            .ok_or(CheckoutBlocker::NoPaymentMethod)?;

        let mut form = vec![
            ("cart", session.cart().to_json()),
            ("payment_method", payment.label().to_string()),
            ("delivery_type", session.mode().as_str().to_string()),
        ];

        match session.mode() {
            DeliveryMode::Home => {
                let address = session.address().ok_or(CheckoutBlocker::MissingAddress)?;
                let address = serde_json::to_string(address)
                    .map_err(|e| CheckoutError::Parse(e.to_string()))?;
                form.push(("delivery_address", address));
            }
            DeliveryMode::Restaurant | DeliveryMode::Unknown => {
                form.push(("table_number", session.table_number().to_string()));
            }
        }

        form.push((
            "csrfmiddlewaretoken",
            self.csrf_token.expose_secret().to_string(),
        ));
        Ok(form)
    }
}

/// Accepts integral numbers (`42`, `42.0`) and numeric strings.
fn parse_order_id(value: &serde_json::Value) -> Option<OrderId> {
    let integral = |text: &str| {
        let id = Decimal::from_str(text.trim()).ok()?;
        id.fract().is_zero().then(|| id.to_i64()).flatten()
    };
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| integral(&n.to_string()))
            .map(OrderId::new),
        serde_json::Value::String(s) => integral(s).map(OrderId::new),
        _ => None,
    }
}

/// Confirmation text for a placed order.
#[must_use]
pub const fn success_message(mode: DeliveryMode) -> &'static str {
    match mode {
        DeliveryMode::Restaurant => "Please wait at your table, your order will be served soon.",
        DeliveryMode::Home | DeliveryMode::Unknown => {
            "Your order will be delivered to the address you provided."
        }
    }
}
