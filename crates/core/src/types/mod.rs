//! Core types for Snap Menu.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod contact;
pub mod geo;
pub mod id;
pub mod price;
pub mod status;

pub use contact::{AddressError, DeliveryAddress, PhoneError, PhoneNumber};
pub use geo::{Coordinate, CoordinateError};
pub use id::*;
pub use price::{CURRENCY_SYMBOL, format_money};
pub use status::*;
