//! Status enums for the ordering flow.

use serde::{Deserialize, Serialize};

/// How the order will reach the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// No location fix or decision yet.
    #[default]
    Unknown,
    /// Customer is at the restaurant; served at a table.
    Restaurant,
    /// Order is delivered to an address.
    Home,
}

impl DeliveryMode {
    /// Wire value sent as `delivery_type`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Restaurant => "restaurant",
            Self::Home => "home",
        }
    }

    /// Payment methods offered while in this mode.
    #[must_use]
    pub const fn payment_methods(&self) -> &'static [PaymentMethod] {
        match self {
            Self::Unknown => &[],
            Self::Restaurant => &[PaymentMethod::CashOnDelivery],
            Self::Home => &[PaymentMethod::CashOnDelivery, PaymentMethod::MobileMoney],
        }
    }
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "restaurant" | "dine_in" | "eat_in" => Ok(Self::Restaurant),
            "home" | "delivery" => Ok(Self::Home),
            _ => Err(format!("invalid delivery mode: {s}")),
        }
    }
}

/// Payment method chosen at checkout.
///
/// Serialized with the human-readable labels the checkout endpoint expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "Cash on Delivery")]
    CashOnDelivery,
    #[serde(rename = "Mobile Money")]
    MobileMoney,
}

impl PaymentMethod {
    /// Label sent as `payment_method`.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CashOnDelivery => "Cash on Delivery",
            Self::MobileMoney => "Mobile Money",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash on delivery" | "cash" | "cod" => Ok(Self::CashOnDelivery),
            "mobile money" | "mobile" | "momo" => Ok(Self::MobileMoney),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}
