//! Checkout command.

use snap_menu_core::{DeliveryMode, PaymentMethod};
use snap_menu_ordering::OrderingError;
use snap_menu_ordering::checkout::CheckoutClient;
use snap_menu_ordering::config::OrderingConfig;
use snap_menu_ordering::delivery::DeliveryDetector;
use snap_menu_ordering::geo::{FixedLocator, Geolocation};
use snap_menu_ordering::session::{OrderSession, SimulatedGateway};

use super::open_cart;

/// Choices the customer would make on the checkout page.
pub struct OrderDetails {
    pub mode_override: Option<DeliveryMode>,
    pub payment: Option<PaymentMethod>,
    pub table: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub verify_phone: Option<String>,
}

impl OrderDetails {
    fn has_address(&self) -> bool {
        self.name.is_some() || self.phone.is_some() || self.address.is_some()
    }
}

/// Walk the checkout flow and submit the order.
#[allow(clippy::print_stdout)]
pub async fn run(
    config: &OrderingConfig,
    locator: FixedLocator,
    order: OrderDetails,
) -> Result<(), OrderingError> {
    let client = CheckoutClient::new(config.checkout()?, &config.restaurant)?;

    let detector = DeliveryDetector::new(config.restaurant_location()?, config.detector);
    let mut session = OrderSession::new(
        open_cart(config),
        detector,
        SimulatedGateway::from_config(&config.verification),
        config.verification.admin_confirmation_timeout,
    );

    session
        .detect_location(&Geolocation::new(locator, config.locate))
        .await;
    if let Some(mode) = order.mode_override {
        session.set_override(mode);
    }
    tracing::info!(mode = %session.mode(), "Delivery mode");

    if let Some(table) = &order.table {
        session.set_table_number(table);
    }
    if let Some(method) = order.payment {
        session.select_payment(method)?;
    }

    if session.mode() == DeliveryMode::Home {
        if order.has_address() {
            session.save_address(
                order.name.as_deref().unwrap_or_default(),
                order.phone.as_deref().unwrap_or_default(),
                order.address.as_deref().unwrap_or_default(),
            )?;
        }

        let verify_phone = order.verify_phone.as_deref().or(order.phone.as_deref());
        if let Some(phone) = verify_phone
            && session.address().is_some()
        {
            tracing::info!("Verifying phone number...");
            session.verify_phone(phone).await?;
        }

        if session.is_verified() && session.needs_admin_confirmation() {
            tracing::info!("Waiting for restaurant confirmation...");
            session.request_admin_confirmation().await?;
        }
    }

    tracing::info!(label = session.checkout_label(), "Submitting order");
    let receipt = client.submit(&mut session).await?;

    println!("Order Placed Successfully!");
    println!("{}", receipt.message);
    println!("Order #{}: {}", receipt.order_id, receipt.redirect_path);
    Ok(())
}
