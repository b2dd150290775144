//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe wrappers around numeric
//! server-assigned IDs. Product keys are strings because they come from page
//! markup and are used verbatim as JSON object keys in the stored cart.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe numeric ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `Display`
/// - A `new()` constructor
///
/// # Example
///
/// ```rust
/// # use snap_menu_core::define_id;
/// define_id!(TicketId);
/// define_id!(ReceiptId);
///
/// let ticket = TicketId::new(1);
/// let receipt = ReceiptId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: TicketId = receipt;
/// # let _ = (ticket, receipt);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// Server-assigned order identifier returned by the checkout endpoint.
define_id!(OrderId);

/// Errors that can occur when parsing a [`ProductId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductIdError {
    /// The input is empty or whitespace.
    #[error("product id cannot be empty")]
    Empty,
}

/// Key of a product in the menu and in the stored cart.
///
/// Stored exactly as it appears in markup (e.g. `"7"`), trimmed of
/// surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Parse a product id.
    ///
    /// # Errors
    ///
    /// Returns [`ProductIdError::Empty`] if the trimmed input is empty.
    pub fn parse(s: &str) -> Result<Self, ProductIdError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ProductIdError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for ProductId {
    type Err = ProductIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_roundtrips_through_json() {
        let id: OrderId = serde_json::from_str("42").unwrap();
        assert_eq!(id, OrderId::new(42));
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_product_id_trims() {
        let id = ProductId::parse("  7 ").unwrap();
        assert_eq!(id.as_str(), "7");
    }

    #[test]
    fn test_product_id_rejects_blank() {
        assert_eq!(ProductId::parse("   "), Err(ProductIdError::Empty));
    }
}
