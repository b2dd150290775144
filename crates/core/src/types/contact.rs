//! Delivery contact types: phone numbers and home delivery addresses.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input contains something other than ASCII digits.
    #[error("phone number must contain digits only")]
    NonDigit,
    /// The input is too short.
    #[error("phone number must have at least {min} digits")]
    TooShort {
        /// Minimum number of digits.
        min: usize,
    },
}

/// A phone number used for order verification.
///
/// ## Constraints
///
/// - ASCII digits only, surrounding whitespace trimmed
/// - At least 8 digits
///
/// ## Examples
///
/// ```
/// use snap_menu_core::PhoneNumber;
///
/// assert!(PhoneNumber::parse("0244123456").is_ok());
/// assert!(PhoneNumber::parse("1234567").is_err());   // too short
/// assert!(PhoneNumber::parse("+233 24 41").is_err()); // non-digits
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Minimum number of digits.
    pub const MIN_DIGITS: usize = 8;

    /// Parse a `PhoneNumber` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, contains non-digits,
    /// or has fewer than [`Self::MIN_DIGITS`] digits.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PhoneError::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PhoneError::NonDigit);
        }
        if s.len() < Self::MIN_DIGITS {
            return Err(PhoneError::TooShort {
                min: Self::MIN_DIGITS,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the phone number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur when building a [`DeliveryAddress`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// A required field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Home delivery address record.
///
/// Serialized with the field names the checkout endpoint expects inside the
/// `delivery_address` JSON string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryAddress {
    full_name: String,
    phone_number: String,
    address: String,
}

impl DeliveryAddress {
    /// Build an address, trimming every field.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::MissingField`] naming the first blank field.
    pub fn new(full_name: &str, phone_number: &str, address: &str) -> Result<Self, AddressError> {
        let full_name = full_name.trim();
        let phone_number = phone_number.trim();
        let address = address.trim();

        if full_name.is_empty() {
            return Err(AddressError::MissingField("full name"));
        }
        if phone_number.is_empty() {
            return Err(AddressError::MissingField("phone number"));
        }
        if address.is_empty() {
            return Err(AddressError::MissingField("address"));
        }

        Ok(Self {
            full_name: full_name.to_owned(),
            phone_number: phone_number.to_owned(),
            address: address.to_owned(),
        })
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    #[must_use]
    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}
