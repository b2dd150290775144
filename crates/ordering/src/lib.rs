//! Snap Menu ordering library.
//!
//! Customer-side ordering for a restaurant menu page: a cart persisted in a
//! local key/value store, dine-in versus delivery detection from the
//! device's location, and order submission to the menu site's checkout
//! endpoint.
//!
//! # Modules
//!
//! - [`storage`] - Key/value stores with local-storage semantics
//! - [`cart`] - Cart persisted under the `cart` and `backup_cart` keys
//! - [`menu`] - Menu catalog with categories and promotional prices
//! - [`geo`] - Distance functions and location providers
//! - [`delivery`] - Delivery-mode detector
//! - [`session`] - Per-customer ordering session and checkout preconditions
//! - [`checkout`] - Checkout endpoint client
//! - [`image_cache`] - Network-first image cache
//! - [`onboarding`] - Guest count selection
//! - [`config`] - Environment configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod config;
pub mod delivery;
pub mod error;
pub mod geo;
pub mod image_cache;
pub mod menu;
pub mod onboarding;
pub mod session;
pub mod storage;

pub use error::{OrderingError, Result};
