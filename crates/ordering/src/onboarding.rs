//! Guest count chosen when the menu is first opened.

use thiserror::Error;

use crate::storage::{Storage, StorageError, keys};

/// Smallest party size offered.
pub const MIN_GUESTS: u8 = 1;

/// Largest party size offered.
pub const MAX_GUESTS: u8 = 12;

#[derive(Debug, Error)]
pub enum GuestCountError {
    #[error("guest count must be between 1 and 12 (got {0})")]
    OutOfRange(u8),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Party size, always within `MIN_GUESTS..=MAX_GUESTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GuestCount(u8);

impl GuestCount {
    /// # Errors
    ///
    /// Returns `GuestCountError::OutOfRange` outside `1..=12`.
    pub const fn new(count: u8) -> Result<Self, GuestCountError> {
        if count < MIN_GUESTS || count > MAX_GUESTS {
            return Err(GuestCountError::OutOfRange(count));
        }
        Ok(Self(count))
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for GuestCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Guest count persisted under [`keys::GUEST_COUNT`] and
/// [`keys::HAS_SELECTED_GUESTS`].
#[derive(Debug)]
pub struct GuestCountStore<S> {
    storage: S,
}

impl<S: Storage> GuestCountStore<S> {
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    /// The stored count, if both keys are present and valid.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn selected(&self) -> Result<Option<GuestCount>, StorageError> {
        if self.storage.get_json::<bool>(keys::HAS_SELECTED_GUESTS)? != Some(true) {
            return Ok(None);
        }
        let count = self
            .storage
            .get_json::<u8>(keys::GUEST_COUNT)?
            .and_then(|n| GuestCount::new(n).ok());
        Ok(count)
    }

    /// Whether the guest prompt should be shown.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn needs_prompt(&self) -> Result<bool, StorageError> {
        Ok(self.selected()?.is_none())
    }

    /// Record a party size.
    ///
    /// # Errors
    ///
    /// Returns an error for counts outside `1..=12` or if storage cannot be
    /// written.
    pub fn select(&mut self, count: u8) -> Result<GuestCount, GuestCountError> {
        let count = GuestCount::new(count)?;
        self.storage.set_json(keys::GUEST_COUNT, &count.get())?;
        self.storage.set_json(keys::HAS_SELECTED_GUESTS, &true)?;
        Ok(count)
    }

    /// Forget the selection.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.storage.remove(keys::GUEST_COUNT)?;
        self.storage.remove(keys::HAS_SELECTED_GUESTS)
    }

    pub fn into_inner(self) -> S {
        self.storage
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_select_writes_both_keys() {
        let mut store = GuestCountStore::new(MemoryStorage::new());
        assert!(store.needs_prompt().unwrap());

        store.select(4).unwrap();
        assert_eq!(store.selected().unwrap().map(GuestCount::get), Some(4));

        let storage = store.into_inner();
        assert_eq!(storage.get(keys::GUEST_COUNT).unwrap().as_deref(), Some("4"));
        assert_eq!(
            storage.get(keys::HAS_SELECTED_GUESTS).unwrap().as_deref(),
            Some("true")
        );
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut store = GuestCountStore::new(MemoryStorage::new());
        assert!(matches!(store.select(0), Err(GuestCountError::OutOfRange(0))));
        assert!(matches!(store.select(13), Err(GuestCountError::OutOfRange(13))));
        assert!(store.needs_prompt().unwrap());
    }

    #[test]
    fn test_count_without_flag_is_ignored() {
        let store = GuestCountStore::new(MemoryStorage::new().with(keys::GUEST_COUNT, "3"));
        assert_eq!(store.selected().unwrap(), None);
    }

    #[test]
    fn test_garbage_count_is_ignored() {
        let store = GuestCountStore::new(
            MemoryStorage::new()
                .with(keys::HAS_SELECTED_GUESTS, "true")
                .with(keys::GUEST_COUNT, "lots"),
        );
        assert_eq!(store.selected().unwrap(), None);
    }

    #[test]
    fn test_reset() {
        let mut store = GuestCountStore::new(MemoryStorage::new());
        store.select(2).unwrap();
        store.reset().unwrap();
        assert!(store.needs_prompt().unwrap());
    }
}
