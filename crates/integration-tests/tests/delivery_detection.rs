//! Integration tests for location fixes driving an ordering session.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use snap_menu_core::{DeliveryMode, PaymentMethod};
use snap_menu_integration_tests::{across_town, at_the_restaurant, restaurant_location};
use snap_menu_ordering::cart::{CartStore, FeeSchedule};
use snap_menu_ordering::delivery::{
    DeliveryDetector, DetectorSettings, FixOutcome, OverridePolicy,
};
use snap_menu_ordering::geo::{FixedLocator, Geolocation, LocateOptions, LocationError};
use snap_menu_ordering::session::{OrderSession, SimulatedGateway};
use snap_menu_ordering::storage::MemoryStorage;

fn session(policy: OverridePolicy) -> OrderSession<MemoryStorage, SimulatedGateway> {
    let settings = DetectorSettings {
        override_policy: policy,
        ..DetectorSettings::default()
    };
    OrderSession::new(
        CartStore::open(MemoryStorage::new(), FeeSchedule::default()),
        DeliveryDetector::new(restaurant_location(), settings),
        SimulatedGateway::new(Duration::ZERO, Duration::ZERO),
        Duration::from_secs(1),
    )
}

fn options() -> LocateOptions {
    LocateOptions {
        retry_delay: Duration::from_millis(1),
        ..LocateOptions::default()
    }
}

#[tokio::test]
async fn test_fix_at_restaurant_enters_dine_in() {
    let mut s = session(OverridePolicy::Sticky);
    let geo = Geolocation::new(FixedLocator::at(at_the_restaurant()), options());

    let outcome = s.detect_location(&geo).await;
    assert_eq!(
        outcome,
        FixOutcome::Applied {
            mode: DeliveryMode::Restaurant,
            changed: true
        }
    );
    assert_eq!(s.payment_method(), Some(PaymentMethod::CashOnDelivery));
    assert!(s.is_verified());
    assert_eq!(s.detector().status_text(), "You're at the restaurant!");
}

#[tokio::test]
async fn test_fix_across_town_enters_home_delivery() {
    let mut s = session(OverridePolicy::Sticky);
    let geo = Geolocation::new(FixedLocator::at(across_town()), options());

    s.detect_location(&geo).await;
    assert_eq!(s.mode(), DeliveryMode::Home);
    assert_eq!(s.detector().distance_text(), "2.0 km away");
    assert_eq!(s.checkout_label(), "Enter Delivery Address");
}

#[tokio::test]
async fn test_permission_denied_defaults_to_home() {
    let mut s = session(OverridePolicy::Sticky);
    let geo = Geolocation::new(FixedLocator::failing(LocationError::PermissionDenied), options());

    s.detect_location(&geo).await;
    assert_eq!(s.mode(), DeliveryMode::Home);
    assert!(!s.is_verified());
}

#[tokio::test]
async fn test_failure_after_fix_keeps_last_position() {
    let mut s = session(OverridePolicy::Sticky);
    s.detect_location(&Geolocation::new(FixedLocator::at(at_the_restaurant()), options()))
        .await;

    let failing = Geolocation::new(FixedLocator::failing(LocationError::Timeout), options());
    s.detect_location(&failing).await;
    assert_eq!(s.mode(), DeliveryMode::Restaurant);
}

#[tokio::test]
async fn test_override_until_next_fix() {
    let mut s = session(OverridePolicy::UntilNextFix);
    s.detect_location(&Geolocation::new(FixedLocator::at(across_town()), options()))
        .await;
    s.set_override(DeliveryMode::Restaurant);
    assert_eq!(s.mode(), DeliveryMode::Restaurant);

    s.detect_location(&Geolocation::new(FixedLocator::at(across_town()), options()))
        .await;
    assert_eq!(s.mode(), DeliveryMode::Home);
    assert_eq!(s.detector().override_mode(), None);
}

#[tokio::test]
async fn test_stale_fix_does_not_change_mode() {
    let mut s = session(OverridePolicy::Sticky);
    let older = s.begin_location_fix();
    let newer = s.begin_location_fix();

    s.apply_location_fix(newer, across_town());
    assert_eq!(s.apply_location_fix(older, at_the_restaurant()), FixOutcome::Stale);
    assert_eq!(s.mode(), DeliveryMode::Home);
}
