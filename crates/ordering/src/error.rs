//! Unified error type for the ordering library.
//!
//! Each module has its own error enum; `OrderingError` wraps them so callers
//! driving a whole ordering flow can use a single `Result`.

use snap_menu_core::{CoordinateError, ProductIdError};
use thiserror::Error;

use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::geo::LocationError;
use crate::image_cache::ImageCacheError;
use crate::menu::MenuError;
use crate::onboarding::GuestCountError;
use crate::session::SessionError;
use crate::storage::StorageError;

/// Library-level error type.
#[derive(Debug, Error)]
pub enum OrderingError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("{0}")]
    Checkout(#[from] CheckoutError),

    #[error("Menu error: {0}")]
    Menu(#[from] MenuError),

    #[error("Image error: {0}")]
    Image(#[from] ImageCacheError),

    #[error("{0}")]
    GuestCount(#[from] GuestCountError),

    #[error("Invalid product id: {0}")]
    ProductId(#[from] ProductIdError),

    #[error("Invalid coordinate: {0}")]
    Coordinate(#[from] CoordinateError),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl OrderingError {
    /// Whether the error points at a fault worth reporting, as opposed to
    /// invalid input or an unmet precondition the customer can fix.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        match self {
            Self::Config(_) | Self::Storage(_) | Self::Menu(_) | Self::Image(_) => true,
            Self::Checkout(e) => matches!(e, CheckoutError::Http(_) | CheckoutError::Parse(_)),
            Self::GuestCount(e) => matches!(e, GuestCountError::Storage(_)),
            Self::Location(_)
            | Self::Session(_)
            | Self::ProductId(_)
            | Self::Coordinate(_)
            | Self::NotFound(_) => false,
        }
    }
}

/// Result type alias for `OrderingError`.
pub type Result<T> = std::result::Result<T, OrderingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CheckoutBlocker;

    #[test]
    fn test_ordering_error_display() {
        let err = OrderingError::NotFound("menu item 7".to_string());
        assert_eq!(err.to_string(), "Not found: menu item 7");

        let err = OrderingError::from(CheckoutError::from(CheckoutBlocker::EmptyCart));
        assert_eq!(err.to_string(), "Your cart is empty.");

        let err = OrderingError::from(LocationError::PermissionDenied);
        assert_eq!(err.to_string(), "Location error: location permission denied");
    }

    #[test]
    fn test_internal_classification() {
        assert!(!OrderingError::from(CheckoutError::from(CheckoutBlocker::Unverified)).is_internal());
        assert!(
            OrderingError::from(ConfigError::MissingEnvVar("SNAP_MENU_BASE_URL".to_string()))
                .is_internal()
        );
        assert!(
            !OrderingError::from(CheckoutError::Rejected {
                status: 400,
                message: "Item unavailable".to_string(),
            })
            .is_internal()
        );
    }
}
