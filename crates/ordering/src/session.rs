//! Per-customer ordering session.
//!
//! [`OrderSession`] owns the cart, the delivery detector and the checkout
//! preconditions (payment method, delivery address, phone verification and
//! restaurant confirmation). Entering a delivery mode resets those
//! preconditions to what the mode requires.

use std::future::Future;
use std::time::Duration;

use snap_menu_core::{
    AddressError, Coordinate, DeliveryAddress, DeliveryMode, PaymentMethod, PhoneError,
    PhoneNumber,
};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::cart::{CartStore, CartSummary};
use crate::config::VerificationConfig;
use crate::delivery::{DeliveryDetector, FixOutcome, LocationTicket};
use crate::geo::{Geolocation, LocationError, Locator};
use crate::storage::Storage;

/// Table number used until the customer picks one.
pub const DEFAULT_TABLE_NUMBER: &str = "1";

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{method} is not available for {mode} orders")]
    PaymentNotOffered {
        method: PaymentMethod,
        mode: DeliveryMode,
    },

    #[error("Please fill in all fields for delivery address: {0}")]
    Address(#[from] AddressError),

    #[error("Please enter a valid phone number (at least 8 digits): {0}")]
    Phone(#[from] PhoneError),

    #[error("Verification failed. Please try again.")]
    VerificationRejected,

    #[error("The restaurant declined the order")]
    ConfirmationRejected,

    #[error("Restaurant confirmation timed out after {0:?}")]
    ConfirmationTimedOut(Duration),

    #[error("{0}")]
    Blocked(#[from] CheckoutBlocker),
}

/// First unmet checkout precondition.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutBlocker {
    #[error("Your cart is empty.")]
    EmptyCart,
    #[error("Please select a payment method.")]
    NoPaymentMethod,
    #[error("Please enter your full delivery address details.")]
    MissingAddress,
    #[error("Please verify your order details first.")]
    Unverified,
    #[error("Please request restaurant confirmation first.")]
    ConfirmationRequired,
    #[error("Please wait for the restaurant to confirm your order.")]
    ConfirmationPending,
}

/// Phone verification and restaurant confirmation backend.
pub trait VerificationGateway {
    /// Whether `phone` passed verification.
    fn verify_phone(&self, phone: &PhoneNumber) -> impl Future<Output = bool> + Send;

    /// Whether the restaurant accepted an order with these totals.
    fn confirm_order(&self, summary: &CartSummary) -> impl Future<Output = bool> + Send;
}

/// Gateway that approves everything after fixed delays.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedGateway {
    verify_delay: Duration,
    confirmation_delay: Duration,
}

impl SimulatedGateway {
    #[must_use]
    pub const fn new(verify_delay: Duration, confirmation_delay: Duration) -> Self {
        Self {
            verify_delay,
            confirmation_delay,
        }
    }

    #[must_use]
    pub const fn from_config(config: &VerificationConfig) -> Self {
        Self::new(config.verify_delay, config.admin_confirmation_delay)
    }
}

impl VerificationGateway for SimulatedGateway {
    async fn verify_phone(&self, _phone: &PhoneNumber) -> bool {
        tokio::time::sleep(self.verify_delay).await;
        true
    }

    async fn confirm_order(&self, _summary: &CartSummary) -> bool {
        tokio::time::sleep(self.confirmation_delay).await;
        true
    }
}

/// Holds the confirmation-in-progress flag up while a request is in flight.
/// Dropping it, including when the request future is cancelled, clears the
/// flag.
struct PendingConfirmation<'a>(&'a mut bool);

impl<'a> PendingConfirmation<'a> {
    fn start(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for PendingConfirmation<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// Ordering state for one customer.
#[derive(Debug)]
pub struct OrderSession<S, G> {
    cart: CartStore<S>,
    detector: DeliveryDetector,
    gateway: G,
    confirmation_timeout: Duration,
    payment_method: Option<PaymentMethod>,
    payment_verified: bool,
    admin_confirmed: bool,
    confirmation_in_progress: bool,
    address: Option<DeliveryAddress>,
    table_number: String,
}

impl<S: Storage, G: VerificationGateway> OrderSession<S, G> {
    pub fn new(
        cart: CartStore<S>,
        detector: DeliveryDetector,
        gateway: G,
        confirmation_timeout: Duration,
    ) -> Self {
        let mut session = Self {
            cart,
            detector,
            gateway,
            confirmation_timeout,
            payment_method: None,
            payment_verified: false,
            admin_confirmed: false,
            confirmation_in_progress: false,
            address: None,
            table_number: DEFAULT_TABLE_NUMBER.to_string(),
        };
        session.enter_mode(session.detector.mode());
        session
    }

    #[must_use]
    pub const fn cart(&self) -> &CartStore<S> {
        &self.cart
    }

    pub const fn cart_mut(&mut self) -> &mut CartStore<S> {
        &mut self.cart
    }

    #[must_use]
    pub const fn detector(&self) -> &DeliveryDetector {
        &self.detector
    }

    #[must_use]
    pub fn mode(&self) -> DeliveryMode {
        self.detector.mode()
    }

    #[must_use]
    pub const fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.payment_verified
    }

    #[must_use]
    pub const fn is_admin_confirmed(&self) -> bool {
        self.admin_confirmed
    }

    #[must_use]
    pub const fn is_confirmation_in_progress(&self) -> bool {
        self.confirmation_in_progress
    }

    #[must_use]
    pub const fn address(&self) -> Option<&DeliveryAddress> {
        self.address.as_ref()
    }

    #[must_use]
    pub fn table_number(&self) -> &str {
        &self.table_number
    }

    /// Set the dine-in table. Blank input restores the default.
    pub fn set_table_number(&mut self, table: &str) {
        let table = table.trim();
        self.table_number = if table.is_empty() {
            DEFAULT_TABLE_NUMBER.to_string()
        } else {
            table.to_string()
        };
    }

    // -------------------------------------------------------------------------
    // Delivery mode
    // -------------------------------------------------------------------------

    pub const fn begin_location_fix(&mut self) -> LocationTicket {
        self.detector.begin_fix()
    }

    pub fn apply_location_fix(
        &mut self,
        ticket: LocationTicket,
        coordinate: Coordinate,
    ) -> FixOutcome {
        let outcome = self.detector.apply_fix(ticket, coordinate);
        self.after_fix(outcome)
    }

    pub fn apply_location_failure(
        &mut self,
        ticket: LocationTicket,
        error: &LocationError,
    ) -> FixOutcome {
        let outcome = self.detector.apply_failure(ticket, error);
        self.after_fix(outcome)
    }

    /// Request a fix from `geolocation` and apply the result.
    #[instrument(skip_all)]
    pub async fn detect_location<L: Locator>(
        &mut self,
        geolocation: &Geolocation<L>,
    ) -> FixOutcome {
        let ticket = self.begin_location_fix();
        match geolocation.current_position().await {
            Ok(coordinate) => self.apply_location_fix(ticket, coordinate),
            Err(e) => self.apply_location_failure(ticket, &e),
        }
    }

    pub fn observe_distance(&mut self, meters: f64) -> DeliveryMode {
        let before = self.mode();
        let mode = self.detector.observe_distance(meters);
        self.transition(before, mode);
        mode
    }

    pub fn set_override(&mut self, mode: DeliveryMode) -> DeliveryMode {
        let before = self.mode();
        let mode = self.detector.set_override(mode);
        self.transition(before, mode);
        mode
    }

    pub fn clear_override(&mut self) -> DeliveryMode {
        let before = self.mode();
        let mode = self.detector.clear_override();
        self.transition(before, mode);
        mode
    }

    fn after_fix(&mut self, outcome: FixOutcome) -> FixOutcome {
        if let FixOutcome::Applied {
            mode,
            changed: true,
        } = outcome
        {
            self.enter_mode(mode);
        }
        outcome
    }

    fn transition(&mut self, before: DeliveryMode, after: DeliveryMode) {
        if before != after {
            self.enter_mode(after);
        }
    }

    fn enter_mode(&mut self, mode: DeliveryMode) {
        info!(%mode, "Entering delivery mode");
        self.confirmation_in_progress = false;
        match mode {
            DeliveryMode::Restaurant => {
                self.payment_method = Some(PaymentMethod::CashOnDelivery);
                self.payment_verified = true;
                self.admin_confirmed = true;
            }
            DeliveryMode::Home => {
                self.payment_method = Some(PaymentMethod::CashOnDelivery);
                self.payment_verified = false;
                self.admin_confirmed = false;
            }
            DeliveryMode::Unknown => {
                self.payment_method = None;
                self.payment_verified = false;
                self.admin_confirmed = false;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Checkout preconditions
    // -------------------------------------------------------------------------

    /// Choose a payment method offered in the current mode.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::PaymentNotOffered` for methods the mode does
    /// not offer.
    pub fn select_payment(&mut self, method: PaymentMethod) -> Result<(), SessionError> {
        let mode = self.mode();
        if !mode.payment_methods().contains(&method) {
            return Err(SessionError::PaymentNotOffered { method, mode });
        }

        self.payment_method = Some(method);
        if mode == DeliveryMode::Home {
            self.payment_verified = false;
            self.admin_confirmed = false;
        }
        Ok(())
    }

    /// Save the home delivery address.
    ///
    /// In home mode, a different contact phone drops an earlier verification
    /// and confirmation.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Address` if a field is blank.
    pub fn save_address(
        &mut self,
        full_name: &str,
        phone_number: &str,
        address: &str,
    ) -> Result<&DeliveryAddress, SessionError> {
        let address = DeliveryAddress::new(full_name, phone_number, address)?;
        let phone_changed = self
            .address
            .as_ref()
            .is_some_and(|previous| previous.phone_number() != address.phone_number());
        if phone_changed && self.mode() == DeliveryMode::Home {
            info!("Contact phone changed, verification required again");
            self.payment_verified = false;
            self.admin_confirmed = false;
        }
        Ok(self.address.insert(address))
    }

    /// Verify the customer's phone number through the gateway.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Phone` for malformed numbers and
    /// `SessionError::VerificationRejected` if the gateway refuses.
    #[instrument(skip_all)]
    pub async fn verify_phone(&mut self, phone: &str) -> Result<(), SessionError> {
        let phone = PhoneNumber::parse(phone)?;
        if self.gateway.verify_phone(&phone).await {
            info!("Phone verification succeeded");
            self.payment_verified = true;
            Ok(())
        } else {
            self.payment_verified = false;
            Err(SessionError::VerificationRejected)
        }
    }

    /// Whether the current mode and payment need restaurant confirmation.
    #[must_use]
    pub fn needs_admin_confirmation(&self) -> bool {
        self.mode() == DeliveryMode::Home
            && self.payment_method == Some(PaymentMethod::CashOnDelivery)
    }

    /// Ask the restaurant to confirm a cash-on-delivery home order.
    ///
    /// Returns immediately when no confirmation is needed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Blocked` if an earlier precondition is unmet,
    /// `SessionError::ConfirmationTimedOut` if the restaurant does not answer
    /// in time and `SessionError::ConfirmationRejected` if it declines.
    #[instrument(skip(self))]
    pub async fn request_admin_confirmation(&mut self) -> Result<(), SessionError> {
        match self.checkout_blocker() {
            None => return Ok(()),
            Some(CheckoutBlocker::ConfirmationRequired | CheckoutBlocker::ConfirmationPending) => {}
            Some(blocker) => return Err(blocker.into()),
        }

        let summary = self.cart.summary();
        let pending = PendingConfirmation::start(&mut self.confirmation_in_progress);
        let answer =
            tokio::time::timeout(self.confirmation_timeout, self.gateway.confirm_order(&summary))
                .await;
        drop(pending);

        match answer {
            Ok(true) => {
                info!("Restaurant confirmed the order");
                self.admin_confirmed = true;
                Ok(())
            }
            Ok(false) => {
                warn!("Restaurant declined the order");
                Err(SessionError::ConfirmationRejected)
            }
            Err(_) => {
                warn!(timeout = ?self.confirmation_timeout, "Restaurant confirmation timed out");
                Err(SessionError::ConfirmationTimedOut(self.confirmation_timeout))
            }
        }
    }

    /// First unmet checkout precondition, if any.
    #[must_use]
    pub fn checkout_blocker(&self) -> Option<CheckoutBlocker> {
        if self.cart.is_empty() {
            return Some(CheckoutBlocker::EmptyCart);
        }
        if self.payment_method.is_none() {
            return Some(CheckoutBlocker::NoPaymentMethod);
        }
        if self.mode() == DeliveryMode::Home {
            if self.address.is_none() {
                return Some(CheckoutBlocker::MissingAddress);
            }
            if !self.payment_verified {
                return Some(CheckoutBlocker::Unverified);
            }
        }
        if self.needs_admin_confirmation() && !self.admin_confirmed {
            return Some(if self.confirmation_in_progress {
                CheckoutBlocker::ConfirmationPending
            } else {
                CheckoutBlocker::ConfirmationRequired
            });
        }
        None
    }

    /// Label of the checkout button.
    #[must_use]
    pub fn checkout_label(&self) -> &'static str {
        if self.mode() != DeliveryMode::Home {
            return "Place Order";
        }
        if self.address.is_none() {
            "Enter Delivery Address"
        } else if !self.payment_verified {
            "Verify Order First"
        } else if self.confirmation_in_progress {
            "Waiting for Restaurant Confirmation..."
        } else if self.needs_admin_confirmation() && !self.admin_confirmed {
            "Request Restaurant Confirmation"
        } else {
            "Place Order"
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use snap_menu_core::ProductId;

    use super::*;
    use crate::cart::FeeSchedule;
    use crate::delivery::DetectorSettings;
    use crate::storage::MemoryStorage;

    /// Gateway that never answers the restaurant confirmation.
    struct SilentRestaurant;

    impl VerificationGateway for SilentRestaurant {
        async fn verify_phone(&self, _phone: &PhoneNumber) -> bool {
            true
        }

        async fn confirm_order(&self, _summary: &CartSummary) -> bool {
            std::future::pending::<bool>().await
        }
    }

    fn detector() -> DeliveryDetector {
        DeliveryDetector::new(
            Coordinate::new(5.6037, -0.187).unwrap(),
            DetectorSettings::default(),
        )
    }

    fn session<G: VerificationGateway>(gateway: G) -> OrderSession<MemoryStorage, G> {
        let cart = CartStore::open(MemoryStorage::new(), FeeSchedule::default());
        OrderSession::new(cart, detector(), gateway, Duration::from_millis(50))
    }

    fn instant() -> SimulatedGateway {
        SimulatedGateway::new(Duration::ZERO, Duration::ZERO)
    }

    fn add_burger<G: VerificationGateway>(session: &mut OrderSession<MemoryStorage, G>) {
        session
            .cart_mut()
            .add_item(ProductId::parse("7").unwrap(), "Burger", Decimal::new(500, 2), "img.jpg")
            .unwrap();
    }

    #[test]
    fn test_empty_cart_blocks_first() {
        let mut s = session(instant());
        s.observe_distance(40.0);
        assert_eq!(s.checkout_blocker(), Some(CheckoutBlocker::EmptyCart));
    }

    #[test]
    fn test_unknown_mode_has_no_payment_method() {
        let mut s = session(instant());
        add_burger(&mut s);
        assert_eq!(s.mode(), DeliveryMode::Unknown);
        assert_eq!(s.checkout_blocker(), Some(CheckoutBlocker::NoPaymentMethod));
    }

    #[test]
    fn test_restaurant_mode_is_ready_to_order() {
        let mut s = session(instant());
        add_burger(&mut s);
        assert_eq!(s.observe_distance(80.0), DeliveryMode::Restaurant);

        assert_eq!(s.payment_method(), Some(PaymentMethod::CashOnDelivery));
        assert!(s.is_verified());
        assert!(s.is_admin_confirmed());
        assert_eq!(s.checkout_blocker(), None);
        assert_eq!(s.checkout_label(), "Place Order");
    }

    #[test]
    fn test_restaurant_mode_rejects_mobile_money() {
        let mut s = session(instant());
        s.observe_distance(10.0);
        let err = s.select_payment(PaymentMethod::MobileMoney).unwrap_err();
        assert!(matches!(err, SessionError::PaymentNotOffered { .. }));
        assert_eq!(s.payment_method(), Some(PaymentMethod::CashOnDelivery));
    }

    #[test]
    fn test_save_address_requires_all_fields() {
        let mut s = session(instant());
        s.observe_distance(500.0);
        assert!(s.save_address("  ", "0241234567", "12 Ring Road").is_err());
        let saved = s.save_address(" Ama ", "0241234567", "12 Ring Road").unwrap();
        assert_eq!(saved.full_name(), "Ama");
    }

    #[tokio::test]
    async fn test_home_cash_on_delivery_walkthrough() {
        let mut s = session(instant());
        add_burger(&mut s);
        assert_eq!(s.observe_distance(120.0), DeliveryMode::Home);

        assert_eq!(s.checkout_blocker(), Some(CheckoutBlocker::MissingAddress));
        assert_eq!(s.checkout_label(), "Enter Delivery Address");

        s.save_address("Ama Mensah", "0241234567", "12 Ring Road").unwrap();
        assert_eq!(s.checkout_blocker(), Some(CheckoutBlocker::Unverified));
        assert_eq!(s.checkout_label(), "Verify Order First");

        assert!(matches!(
            s.verify_phone("1234").await,
            Err(SessionError::Phone(_))
        ));
        s.verify_phone("0241234567").await.unwrap();
        assert_eq!(s.checkout_blocker(), Some(CheckoutBlocker::ConfirmationRequired));
        assert_eq!(s.checkout_label(), "Request Restaurant Confirmation");

        s.request_admin_confirmation().await.unwrap();
        assert_eq!(s.checkout_blocker(), None);
        assert_eq!(s.checkout_label(), "Place Order");
    }

    #[tokio::test]
    async fn test_mobile_money_skips_restaurant_confirmation() {
        let mut s = session(instant());
        add_burger(&mut s);
        s.observe_distance(900.0);
        s.save_address("Kofi", "0201234567", "Osu").unwrap();
        s.select_payment(PaymentMethod::MobileMoney).unwrap();
        s.verify_phone("0201234567").await.unwrap();

        assert!(!s.needs_admin_confirmation());
        assert_eq!(s.checkout_blocker(), None);
    }

    #[tokio::test]
    async fn test_payment_change_resets_verification() {
        let mut s = session(instant());
        add_burger(&mut s);
        s.observe_distance(900.0);
        s.save_address("Kofi", "0201234567", "Osu").unwrap();
        s.verify_phone("0201234567").await.unwrap();

        s.select_payment(PaymentMethod::MobileMoney).unwrap();
        assert!(!s.is_verified());
        assert_eq!(s.checkout_blocker(), Some(CheckoutBlocker::Unverified));
    }

    #[tokio::test]
    async fn test_confirmation_timeout_clears_in_progress() {
        let mut s = session(SilentRestaurant);
        add_burger(&mut s);
        s.observe_distance(900.0);
        s.save_address("Kofi", "0201234567", "Osu").unwrap();
        s.verify_phone("0201234567").await.unwrap();

        let err = s.request_admin_confirmation().await.unwrap_err();
        assert!(matches!(err, SessionError::ConfirmationTimedOut(_)));
        assert!(!s.is_confirmation_in_progress());
        assert!(!s.is_admin_confirmed());
    }

    #[tokio::test]
    async fn test_confirmation_before_verification_is_blocked() {
        let mut s = session(instant());
        add_burger(&mut s);
        s.observe_distance(900.0);
        s.save_address("Kofi", "0201234567", "Osu").unwrap();

        let err = s.request_admin_confirmation().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Blocked(CheckoutBlocker::Unverified)
        ));
    }

    #[test]
    fn test_override_to_restaurant_applies_mode_effects() {
        let mut s = session(instant());
        s.observe_distance(900.0);
        assert!(!s.is_verified());

        s.set_override(DeliveryMode::Restaurant);
        assert!(s.is_verified());
        assert!(s.is_admin_confirmed());

        assert_eq!(s.clear_override(), DeliveryMode::Home);
        assert!(!s.is_verified());
    }

    #[test]
    fn test_table_number_defaults() {
        let mut s = session(instant());
        assert_eq!(s.table_number(), "1");
        s.set_table_number(" 12 ");
        assert_eq!(s.table_number(), "12");
        s.set_table_number("");
        assert_eq!(s.table_number(), DEFAULT_TABLE_NUMBER);
    }

    #[tokio::test]
    async fn test_cancelled_confirmation_clears_in_progress() {
        let slow = SimulatedGateway::new(Duration::ZERO, Duration::from_secs(5));
        let mut s = OrderSession::new(
            CartStore::open(MemoryStorage::new(), FeeSchedule::default()),
            detector(),
            slow,
            Duration::from_secs(60),
        );
        add_burger(&mut s);
        s.observe_distance(900.0);
        s.save_address("Kofi", "0201234567", "Osu").unwrap();
        s.verify_phone("0201234567").await.unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), s.request_admin_confirmation()).await;
        assert!(abandoned.is_err());

        assert!(!s.is_confirmation_in_progress());
        assert_eq!(s.checkout_blocker(), Some(CheckoutBlocker::ConfirmationRequired));
        assert_eq!(s.checkout_label(), "Request Restaurant Confirmation");
    }

    #[tokio::test]
    async fn test_new_phone_requires_verification_again() {
        let mut s = session(instant());
        add_burger(&mut s);
        s.observe_distance(900.0);
        s.save_address("Kofi", "0201234567", "Osu").unwrap();
        s.verify_phone("0201234567").await.unwrap();
        s.request_admin_confirmation().await.unwrap();

        s.save_address("Kofi", "0201234567", "Osu, near the mall").unwrap();
        assert!(s.is_verified());
        assert!(s.is_admin_confirmed());

        s.save_address("Kofi", "0557654321", "Osu, near the mall").unwrap();
        assert!(!s.is_verified());
        assert!(!s.is_admin_confirmed());
        assert_eq!(s.checkout_blocker(), Some(CheckoutBlocker::Unverified));
    }
}
