//! Delivery-mode detection command.

use snap_menu_core::DeliveryMode;
use snap_menu_ordering::OrderingError;
use snap_menu_ordering::config::OrderingConfig;
use snap_menu_ordering::delivery::{DeliveryDetector, FixOutcome};
use snap_menu_ordering::geo::{FixedLocator, Geolocation};

/// Classify a position against the configured restaurant.
#[allow(clippy::print_stdout)]
pub async fn run(
    config: &OrderingConfig,
    locator: FixedLocator,
    mode_override: Option<DeliveryMode>,
) -> Result<(), OrderingError> {
    let mut detector = DeliveryDetector::new(config.restaurant_location()?, config.detector);
    let geolocation = Geolocation::new(locator, config.locate);

    let ticket = detector.begin_fix();
    let outcome = match geolocation.current_position().await {
        Ok(coordinate) => detector.apply_fix(ticket, coordinate),
        Err(e) => detector.apply_failure(ticket, &e),
    };
    if let FixOutcome::Applied { mode, .. } = outcome {
        tracing::debug!(%mode, "Location applied");
    }

    if let Some(mode) = mode_override {
        detector.set_override(mode);
    }

    println!("Mode:     {}", detector.mode());
    println!("Distance: {}", detector.distance_text());
    println!("Status:   {}", detector.status_text());
    println!(
        "Payment:  {}",
        detector
            .mode()
            .payment_methods()
            .iter()
            .map(|method| method.label())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}
