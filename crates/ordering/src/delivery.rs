//! Dine-in versus home delivery detection.
//!
//! [`DeliveryDetector`] classifies the customer by their distance to the
//! restaurant. A user override takes precedence over the automatic result
//! until it is cleared, or until the next successful fix under
//! [`OverridePolicy::UntilNextFix`].
//!
//! Location requests are numbered with [`LocationTicket`]s. A fix or failure
//! carrying a ticket older than the newest one already applied is stale and
//! ignored.

use snap_menu_core::{Coordinate, DeliveryMode};
use tracing::{debug, info, warn};

use crate::geo::{LocationError, distance_meters};

/// Default dine-in radius in meters.
pub const DEFAULT_THRESHOLD_METERS: f64 = 100.0;

/// How long a user override lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverridePolicy {
    /// Until explicitly cleared.
    #[default]
    Sticky,
    /// Until the next successful location fix.
    UntilNextFix,
}

impl OverridePolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sticky => "sticky",
            Self::UntilNextFix => "until_next_fix",
        }
    }
}

impl std::fmt::Display for OverridePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OverridePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sticky" => Ok(Self::Sticky),
            "until_next_fix" | "until-next-fix" => Ok(Self::UntilNextFix),
            other => Err(format!(
                "invalid override policy: {other} (expected sticky or until_next_fix)"
            )),
        }
    }
}

/// Detector tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    /// Distances at or below this count as dine-in.
    pub threshold_meters: f64,
    pub override_policy: OverridePolicy,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            threshold_meters: DEFAULT_THRESHOLD_METERS,
            override_policy: OverridePolicy::Sticky,
        }
    }
}

/// Sequence number of a location request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocationTicket(u64);

impl LocationTicket {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Result of feeding a location outcome to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    /// The outcome was used; `mode` is the effective mode afterwards.
    Applied { mode: DeliveryMode, changed: bool },
    /// A newer request already completed.
    Stale,
}

/// Delivery-mode state machine.
#[derive(Debug, Clone)]
pub struct DeliveryDetector {
    restaurant: Coordinate,
    settings: DetectorSettings,
    detected: DeliveryMode,
    override_mode: Option<DeliveryMode>,
    last_coordinate: Option<Coordinate>,
    last_distance: Option<f64>,
    issued: u64,
    newest_applied: Option<u64>,
}

impl DeliveryDetector {
    #[must_use]
    pub const fn new(restaurant: Coordinate, settings: DetectorSettings) -> Self {
        Self {
            restaurant,
            settings,
            detected: DeliveryMode::Unknown,
            override_mode: None,
            last_coordinate: None,
            last_distance: None,
            issued: 0,
            newest_applied: None,
        }
    }

    /// Effective mode: the override if set, the detected mode otherwise.
    #[must_use]
    pub fn mode(&self) -> DeliveryMode {
        self.override_mode.unwrap_or(self.detected)
    }

    /// Mode from automatic detection alone.
    #[must_use]
    pub const fn detected_mode(&self) -> DeliveryMode {
        self.detected
    }

    #[must_use]
    pub const fn override_mode(&self) -> Option<DeliveryMode> {
        self.override_mode
    }

    #[must_use]
    pub const fn restaurant(&self) -> Coordinate {
        self.restaurant
    }

    #[must_use]
    pub const fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    #[must_use]
    pub const fn last_coordinate(&self) -> Option<Coordinate> {
        self.last_coordinate
    }

    #[must_use]
    pub const fn last_distance(&self) -> Option<f64> {
        self.last_distance
    }

    /// Issue a ticket for a new location request.
    pub const fn begin_fix(&mut self) -> LocationTicket {
        self.issued += 1;
        LocationTicket(self.issued)
    }

    /// Apply a successful fix.
    pub fn apply_fix(&mut self, ticket: LocationTicket, coordinate: Coordinate) -> FixOutcome {
        let before = self.mode();
        if !self.accept(ticket) {
            debug!(ticket = ticket.get(), "Discarding stale location fix");
            return FixOutcome::Stale;
        }

        if self.settings.override_policy == OverridePolicy::UntilNextFix
            && self.override_mode.take().is_some()
        {
            debug!("Location fix cleared the override");
        }

        self.last_coordinate = Some(coordinate);
        let meters = distance_meters(self.restaurant, coordinate);
        let mode = self.observe_distance(meters);
        FixOutcome::Applied {
            mode,
            changed: mode != before,
        }
    }

    /// Apply a failed location request.
    ///
    /// An active override is kept. Otherwise the last known coordinate is
    /// reused, and without one the detector falls back to home delivery.
    pub fn apply_failure(&mut self, ticket: LocationTicket, error: &LocationError) -> FixOutcome {
        let before = self.mode();
        if !self.accept(ticket) {
            debug!(ticket = ticket.get(), "Discarding stale location failure");
            return FixOutcome::Stale;
        }

        if let Some(mode) = self.override_mode {
            warn!(%error, %mode, "Location failed, keeping override");
        } else if let Some(coordinate) = self.last_coordinate {
            warn!(%error, %coordinate, "Location failed, reusing last known position");
            self.observe_distance(distance_meters(self.restaurant, coordinate));
        } else {
            warn!(%error, "Location failed, defaulting to home delivery");
            self.set_detected(DeliveryMode::Home);
        }

        let mode = self.mode();
        FixOutcome::Applied {
            mode,
            changed: mode != before,
        }
    }

    /// Classify a distance and record it. Returns the effective mode.
    pub fn observe_distance(&mut self, meters: f64) -> DeliveryMode {
        self.last_distance = Some(meters);
        let detected = if meters <= self.settings.threshold_meters {
            DeliveryMode::Restaurant
        } else {
            DeliveryMode::Home
        };
        self.set_detected(detected);
        self.mode()
    }

    /// Force a mode. Overriding to `Unknown` clears the override.
    pub fn set_override(&mut self, mode: DeliveryMode) -> DeliveryMode {
        if mode == DeliveryMode::Unknown {
            return self.clear_override();
        }
        info!(%mode, "Delivery mode overridden");
        self.override_mode = Some(mode);
        self.mode()
    }

    /// Resume automatic detection from the last distance, if any.
    pub fn clear_override(&mut self) -> DeliveryMode {
        if self.override_mode.take().is_some() {
            info!("Delivery mode override cleared");
        }
        if let Some(meters) = self.last_distance {
            return self.observe_distance(meters);
        }
        self.mode()
    }

    /// Human-readable distance to the restaurant.
    #[must_use]
    pub fn distance_text(&self) -> String {
        self.last_distance
            .map_or_else(|| "Detecting your location...".to_string(), format_distance)
    }

    /// Status line shown next to the distance.
    #[must_use]
    pub fn status_text(&self) -> &'static str {
        match self.last_distance {
            Some(meters) => proximity_status(meters, self.settings.threshold_meters),
            None if self.mode() == DeliveryMode::Home => "Delivery recommended",
            None => "Detecting your location...",
        }
    }

    fn accept(&mut self, ticket: LocationTicket) -> bool {
        if self.newest_applied.is_some_and(|newest| ticket.0 < newest) {
            return false;
        }
        self.newest_applied = Some(ticket.0);
        true
    }

    fn set_detected(&mut self, detected: DeliveryMode) {
        if self.detected != detected {
            info!(from = %self.detected, to = %detected, "Detected delivery mode changed");
            self.detected = detected;
        }
    }
}

/// Format a distance as shown to the customer.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_distance(meters: f64) -> String {
    if !meters.is_finite() || meters < 0.0 {
        return "Could not calculate distance".to_string();
    }
    if meters < 1000.0 {
        format!("{} meters away", meters.round() as i64)
    } else {
        format!("{:.1} km away", meters / 1000.0)
    }
}

/// Proximity status for a distance against the dine-in threshold.
#[must_use]
pub fn proximity_status(meters: f64, threshold_meters: f64) -> &'static str {
    if !meters.is_finite() {
        "Could not calculate distance"
    } else if meters <= threshold_meters {
        "You're at the restaurant!"
    } else {
        "Delivery recommended"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn restaurant() -> Coordinate {
        Coordinate::new(5.6037, -0.187).unwrap()
    }

    fn detector(policy: OverridePolicy) -> DeliveryDetector {
        DeliveryDetector::new(
            restaurant(),
            DetectorSettings {
                override_policy: policy,
                ..DetectorSettings::default()
            },
        )
    }

    // ~80 m and ~1.1 km north of the restaurant
    fn nearby() -> Coordinate {
        Coordinate::new(5.604_42, -0.187).unwrap()
    }

    fn far_away() -> Coordinate {
        Coordinate::new(5.6137, -0.187).unwrap()
    }

    #[test]
    fn test_threshold_classification() {
        let mut d = detector(OverridePolicy::Sticky);
        assert_eq!(d.mode(), DeliveryMode::Unknown);
        assert_eq!(d.observe_distance(80.0), DeliveryMode::Restaurant);
        assert_eq!(d.observe_distance(120.0), DeliveryMode::Home);
        assert_eq!(d.observe_distance(100.0), DeliveryMode::Restaurant);
    }

    #[test]
    fn test_fix_near_restaurant_is_dine_in() {
        let mut d = detector(OverridePolicy::Sticky);
        let ticket = d.begin_fix();
        assert_eq!(
            d.apply_fix(ticket, nearby()),
            FixOutcome::Applied {
                mode: DeliveryMode::Restaurant,
                changed: true
            }
        );
        assert_eq!(d.status_text(), "You're at the restaurant!");
        assert!(d.distance_text().ends_with("meters away"));
    }

    #[test]
    fn test_sticky_override_survives_fixes() {
        let mut d = detector(OverridePolicy::Sticky);
        d.set_override(DeliveryMode::Home);

        let ticket = d.begin_fix();
        d.apply_fix(ticket, nearby());
        assert_eq!(d.mode(), DeliveryMode::Home);
        assert_eq!(d.detected_mode(), DeliveryMode::Restaurant);

        assert_eq!(d.clear_override(), DeliveryMode::Restaurant);
    }

    #[test]
    fn test_until_next_fix_override_is_cleared_by_fix() {
        let mut d = detector(OverridePolicy::UntilNextFix);
        d.set_override(DeliveryMode::Home);
        assert_eq!(d.mode(), DeliveryMode::Home);

        let ticket = d.begin_fix();
        d.apply_fix(ticket, nearby());
        assert_eq!(d.override_mode(), None);
        assert_eq!(d.mode(), DeliveryMode::Restaurant);
    }

    #[test]
    fn test_stale_fix_is_discarded() {
        let mut d = detector(OverridePolicy::Sticky);
        let older = d.begin_fix();
        let newer = d.begin_fix();

        d.apply_fix(newer, far_away());
        assert_eq!(d.apply_fix(older, nearby()), FixOutcome::Stale);
        assert_eq!(d.mode(), DeliveryMode::Home);
    }

    #[test]
    fn test_failure_without_history_defaults_to_home() {
        let mut d = detector(OverridePolicy::Sticky);
        let ticket = d.begin_fix();
        d.apply_failure(ticket, &LocationError::PermissionDenied);
        assert_eq!(d.mode(), DeliveryMode::Home);
        assert_eq!(d.status_text(), "Delivery recommended");
    }

    #[test]
    fn test_failure_reuses_last_coordinate() {
        let mut d = detector(OverridePolicy::Sticky);
        let first = d.begin_fix();
        d.apply_fix(first, nearby());

        let second = d.begin_fix();
        let outcome = d.apply_failure(second, &LocationError::Timeout);
        assert_eq!(
            outcome,
            FixOutcome::Applied {
                mode: DeliveryMode::Restaurant,
                changed: false
            }
        );
    }

    #[test]
    fn test_failure_keeps_override() {
        let mut d = detector(OverridePolicy::UntilNextFix);
        d.set_override(DeliveryMode::Restaurant);
        let ticket = d.begin_fix();
        d.apply_failure(ticket, &LocationError::PositionUnavailable);
        assert_eq!(d.mode(), DeliveryMode::Restaurant);
        assert_eq!(d.override_mode(), Some(DeliveryMode::Restaurant));
    }

    #[test]
    fn test_override_policy_parsing() {
        assert_eq!("sticky".parse::<OverridePolicy>(), Ok(OverridePolicy::Sticky));
        assert_eq!(
            "Until_Next_Fix".parse::<OverridePolicy>(),
            Ok(OverridePolicy::UntilNextFix)
        );
        assert!("forever".parse::<OverridePolicy>().is_err());
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(80.4), "80 meters away");
        assert_eq!(format_distance(1234.0), "1.2 km away");
        assert_eq!(format_distance(f64::NAN), "Could not calculate distance");
        assert_eq!(proximity_status(f64::INFINITY, 100.0), "Could not calculate distance");
    }
}
