//! Device location providers.
//!
//! A [`Locator`] produces a single position fix. [`Geolocation`] wraps a
//! locator with the request options a browser geolocation call takes: a
//! cached fix younger than `maximum_age` is reused, each attempt is bounded
//! by `timeout`, and timeouts are retried after a short delay.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use snap_menu_core::Coordinate;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Why a position fix could not be obtained.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("location request timed out")]
    Timeout,
    #[error("geolocation is not supported on this device")]
    Unsupported,
}

/// Options for a location request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocateOptions {
    /// Reuse a cached fix no older than this.
    pub maximum_age: Duration,
    /// Upper bound for a single attempt.
    pub timeout: Duration,
    /// Ask the provider for its most precise fix.
    pub high_accuracy: bool,
    /// Extra attempts after a timeout.
    pub timeout_retries: u32,
    /// Pause before retrying a timed-out attempt.
    pub retry_delay: Duration,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            maximum_age: Duration::from_secs(60),
            timeout: Duration::from_secs(10),
            high_accuracy: true,
            timeout_retries: 1,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// A source of device position fixes.
pub trait Locator {
    /// Obtain one fix.
    fn locate(
        &self,
        options: &LocateOptions,
    ) -> impl Future<Output = Result<Coordinate, LocationError>> + Send;
}

/// Locator returning a preset result, for tests and manual entry.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocator {
    result: Result<Coordinate, LocationError>,
    latency: Duration,
}

impl FixedLocator {
    #[must_use]
    pub const fn at(coordinate: Coordinate) -> Self {
        Self {
            result: Ok(coordinate),
            latency: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn failing(error: LocationError) -> Self {
        Self {
            result: Err(error),
            latency: Duration::ZERO,
        }
    }

    /// Delay every fix by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Locator for FixedLocator {
    async fn locate(&self, _options: &LocateOptions) -> Result<Coordinate, LocationError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.result
    }
}

/// Locator for environments without any position source.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedLocator;

impl Locator for UnsupportedLocator {
    async fn locate(&self, _options: &LocateOptions) -> Result<Coordinate, LocationError> {
        Err(LocationError::Unsupported)
    }
}

/// Locator with fix caching, per-attempt timeout and timeout retries.
#[derive(Debug)]
pub struct Geolocation<L> {
    locator: L,
    options: LocateOptions,
    cached: Mutex<Option<(Coordinate, Instant)>>,
}

impl<L: Locator> Geolocation<L> {
    #[must_use]
    pub const fn new(locator: L, options: LocateOptions) -> Self {
        Self {
            locator,
            options,
            cached: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn options(&self) -> &LocateOptions {
        &self.options
    }

    /// Current position, from cache when fresh enough.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error once retries are exhausted.
    #[instrument(skip(self))]
    pub async fn current_position(&self) -> Result<Coordinate, LocationError> {
        if let Some(coordinate) = self.fresh_cached() {
            debug!(%coordinate, "Using cached position");
            return Ok(coordinate);
        }

        let mut retries_left = self.options.timeout_retries;
        loop {
            let attempt = tokio::time::timeout(self.options.timeout, self.locator.locate(&self.options))
                .await
                .unwrap_or(Err(LocationError::Timeout));

            match attempt {
                Ok(coordinate) => {
                    self.store(coordinate);
                    return Ok(coordinate);
                }
                Err(LocationError::Timeout) if retries_left > 0 => {
                    retries_left -= 1;
                    warn!(retries_left, "Location request timed out, retrying");
                    tokio::time::sleep(self.options.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fresh_cached(&self) -> Option<Coordinate> {
        let cached = self.cached.lock().ok()?;
        cached
            .filter(|(_, taken_at)| taken_at.elapsed() <= self.options.maximum_age)
            .map(|(coordinate, _)| coordinate)
    }

    fn store(&self, coordinate: Coordinate) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some((coordinate, Instant::now()));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Times out a fixed number of times, then succeeds.
    struct FlakyLocator {
        timeouts: u32,
        calls: AtomicU32,
        coordinate: Coordinate,
    }

    impl Locator for FlakyLocator {
        async fn locate(&self, _options: &LocateOptions) -> Result<Coordinate, LocationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.timeouts {
                Err(LocationError::Timeout)
            } else {
                Ok(self.coordinate)
            }
        }
    }

    fn fast_options(retries: u32) -> LocateOptions {
        LocateOptions {
            timeout_retries: retries,
            retry_delay: Duration::from_millis(1),
            ..LocateOptions::default()
        }
    }

    fn accra() -> Coordinate {
        Coordinate::new(5.6037, -0.187).unwrap()
    }

    #[tokio::test]
    async fn test_timeout_is_retried_once() {
        let locator = FlakyLocator {
            timeouts: 1,
            calls: AtomicU32::new(0),
            coordinate: accra(),
        };
        let geo = Geolocation::new(locator, fast_options(1));
        assert_eq!(geo.current_position().await, Ok(accra()));
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let locator = FlakyLocator {
            timeouts: 2,
            calls: AtomicU32::new(0),
            coordinate: accra(),
        };
        let geo = Geolocation::new(locator, fast_options(1));
        assert_eq!(geo.current_position().await, Err(LocationError::Timeout));
    }

    #[tokio::test]
    async fn test_permission_denied_is_not_retried() {
        let geo = Geolocation::new(
            FixedLocator::failing(LocationError::PermissionDenied),
            fast_options(3),
        );
        assert_eq!(
            geo.current_position().await,
            Err(LocationError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_slow_locator_times_out() {
        let options = LocateOptions {
            timeout: Duration::from_millis(5),
            timeout_retries: 0,
            ..LocateOptions::default()
        };
        let geo = Geolocation::new(
            FixedLocator::at(accra()).with_latency(Duration::from_millis(200)),
            options,
        );
        assert_eq!(geo.current_position().await, Err(LocationError::Timeout));
    }

    #[tokio::test]
    async fn test_fresh_fix_is_cached() {
        let locator = FlakyLocator {
            timeouts: 0,
            calls: AtomicU32::new(0),
            coordinate: accra(),
        };
        let geo = Geolocation::new(locator, fast_options(0));
        geo.current_position().await.unwrap();
        geo.current_position().await.unwrap();
        assert_eq!(geo.locator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsupported() {
        let geo = Geolocation::new(UnsupportedLocator, LocateOptions::default());
        assert_eq!(
            geo.current_position().await,
            Err(LocationError::Unsupported)
        );
    }
}
