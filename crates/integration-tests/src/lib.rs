//! Integration tests for Snap Menu.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p snap-menu-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `checkout_flow` - Order submission against a fake checkout endpoint
//! - `cart_persistence` - Cart state shared through the file store
//! - `delivery_detection` - Location fixes driving the ordering session
//! - `image_cache` - Network-first image fetching over HTTP
//!
//! The fake backend is an in-process `axum` server bound to an ephemeral
//! port. It records every order it receives and answers with a configurable
//! [`Reply`]. It also serves menu images under `/media/` until switched
//! offline, after which they fail with `500`.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use snap_menu_core::Coordinate;
use snap_menu_ordering::config::{CheckoutConfig, RestaurantConfig};
use url::Url;

pub const RESTAURANT_SLUG: &str = "mama-kitchen";
pub const HASHED_SLUG: &str = "9f2c1e";
pub const CSRF_TOKEN: &str = "Zm9yLXRlc3RzLW9ubHktY3NyZi10b2tlbi12YWx1ZQ";

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0];

/// Body the backend serves for the image at `/media/{path}`.
#[must_use]
pub fn image_bytes(path: &str) -> Vec<u8> {
    let mut body = JPEG_MAGIC.to_vec();
    body.extend_from_slice(path.as_bytes());
    body
}

/// Restaurant position used throughout the tests (Accra).
#[must_use]
pub fn restaurant_location() -> Coordinate {
    Coordinate::new(5.6037, -0.187).unwrap()
}

/// About 80 m north of the restaurant.
#[must_use]
pub fn at_the_restaurant() -> Coordinate {
    Coordinate::new(5.604_42, -0.187).unwrap()
}

/// About 2 km from the restaurant.
#[must_use]
pub fn across_town() -> Coordinate {
    Coordinate::new(5.6217, -0.187).unwrap()
}

/// How the fake backend answers checkout requests.
#[derive(Debug, Clone)]
pub enum Reply {
    /// `200 {"order_id": id}`
    Placed(i64),
    /// `200 {"order_id": "id"}`
    PlacedAsString(String),
    /// `200 {"message": ...}` without an order id
    Refused(String),
    /// Non-2xx with an optional `{"message": ...}` body
    Status(u16, Option<String>),
}

/// One checkout request as seen by the backend.
#[derive(Debug, Clone)]
pub struct ReceivedOrder {
    pub restaurant_slug: String,
    pub hashed_slug: String,
    pub csrf_header: Option<String>,
    pub form: HashMap<String, String>,
}

impl ReceivedOrder {
    /// The `cart` field parsed back into JSON.
    #[must_use]
    pub fn cart(&self) -> serde_json::Value {
        serde_json::from_str(&self.form["cart"]).unwrap()
    }
}

#[derive(Clone)]
struct BackendState {
    reply: Arc<Mutex<Reply>>,
    received: Arc<Mutex<Vec<ReceivedOrder>>>,
    images_online: Arc<AtomicBool>,
    image_requests: Arc<AtomicUsize>,
}

/// Fake checkout endpoint.
pub struct FakeBackend {
    addr: SocketAddr,
    state: BackendState,
}

impl FakeBackend {
    /// Start a backend answering every order with `reply`.
    pub async fn start(reply: Reply) -> Self {
        let state = BackendState {
            reply: Arc::new(Mutex::new(reply)),
            received: Arc::new(Mutex::new(Vec::new())),
            images_online: Arc::new(AtomicBool::new(true)),
            image_requests: Arc::new(AtomicUsize::new(0)),
        };

        let app = Router::new()
            .route("/menu/{slug}/{hashed}/checkout/", post(checkout))
            .route("/media/{*path}", get(image))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.state.reply.lock().unwrap() = reply;
    }

    #[must_use]
    pub fn received(&self) -> Vec<ReceivedOrder> {
        self.state.received.lock().unwrap().clone()
    }

    /// Absolute URL of an image served under `/media/`.
    #[must_use]
    pub fn image_url(&self, path: &str) -> String {
        format!("http://{}/media/{path}", self.addr)
    }

    /// Serve images normally (`true`) or fail them with `500` (`false`).
    pub fn set_images_online(&self, online: bool) {
        self.state.images_online.store(online, Ordering::SeqCst);
    }

    #[must_use]
    pub fn image_requests(&self) -> usize {
        self.state.image_requests.load(Ordering::SeqCst)
    }

    /// Checkout settings pointing at this backend.
    #[must_use]
    pub fn checkout_config(&self, redirect_floor: Duration) -> CheckoutConfig {
        CheckoutConfig {
            base_url: self.base_url(),
            csrf_token: SecretString::from(CSRF_TOKEN),
            redirect_floor,
        }
    }
}

async fn checkout(
    State(state): State<BackendState>,
    Path((slug, hashed)): Path<(String, String)>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.received.lock().unwrap().push(ReceivedOrder {
        restaurant_slug: slug,
        hashed_slug: hashed,
        csrf_header: headers
            .get("x-csrftoken")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        form,
    });

    let reply = state.reply.lock().unwrap().clone();
    match reply {
        Reply::Placed(id) => Json(serde_json::json!({ "order_id": id })).into_response(),
        Reply::PlacedAsString(id) => Json(serde_json::json!({ "order_id": id })).into_response(),
        Reply::Refused(message) => Json(serde_json::json!({ "message": message })).into_response(),
        Reply::Status(code, message) => {
            let status = StatusCode::from_u16(code).unwrap();
            match message {
                Some(message) => {
                    (status, Json(serde_json::json!({ "message": message }))).into_response()
                }
                None => status.into_response(),
            }
        }
    }
}

async fn image(State(state): State<BackendState>, Path(path): Path<String>) -> Response {
    state.image_requests.fetch_add(1, Ordering::SeqCst);
    if !state.images_online.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([(header::CONTENT_TYPE, "image/jpeg")], image_bytes(&path)).into_response()
}

/// Restaurant identity matching the backend's routes.
#[must_use]
pub fn restaurant_config() -> RestaurantConfig {
    RestaurantConfig {
        slug: RESTAURANT_SLUG.to_string(),
        hashed_slug: HASHED_SLUG.to_string(),
        location: Some(restaurant_location()),
    }
}

/// A fresh store path under the system temp directory.
#[must_use]
pub fn temp_store(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("snap-menu-it-{}-{name}", std::process::id()));
    std::fs::remove_dir_all(&dir).ok();
    dir.join("storage.json")
}
