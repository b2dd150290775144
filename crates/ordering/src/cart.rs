//! Shopping cart persisted in a [`Storage`] backend.
//!
//! The cart is stored under [`keys::CART`] as a JSON object mapping product
//! id to `[quantity, name, unit_price, image_url]`:
//!
//! ```json
//! {"7": [2, "Burger", 5.0, "img.jpg"]}
//! ```
//!
//! Every successful write is mirrored to [`keys::BACKUP_CART`]. When the
//! primary value is missing, empty or unreadable, the backup is used and
//! written back to the primary key.
//!
//! Quantities are always at least 1: an entry whose quantity would drop
//! below 1 is deleted, and such entries found in storage are skipped.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize, Serializer};
use snap_menu_core::{ProductId, format_money};
use tracing::{debug, warn};

use crate::menu::MenuItem;
use crate::storage::{Storage, StorageError, keys};

/// Fixed fees added on top of the cart subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    pub service_fee: Decimal,
    pub delivery_fee: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            service_fee: Decimal::new(25, 2),
            delivery_fee: Decimal::ZERO,
        }
    }
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEntry {
    pub quantity: u32,
    pub name: String,
    pub unit_price: Decimal,
    pub image_url: String,
}

impl CartEntry {
    /// Quantity × unit price.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl Serialize for CartEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Prices are stored as JSON numbers, as the menu page writes them
        let price = self.unit_price.to_f64().unwrap_or_default();
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&self.quantity)?;
        tuple.serialize_element(&self.name)?;
        tuple.serialize_element(&price)?;
        tuple.serialize_element(&self.image_url)?;
        tuple.end()
    }
}

/// Stored shape of an entry. Quantity is signed so out-of-range values can
/// be read and dropped; price accepts numbers and numeric strings.
#[derive(Deserialize)]
struct StoredEntry(i64, String, Decimal, String);

impl StoredEntry {
    fn into_entry(self) -> Option<CartEntry> {
        let Self(quantity, name, unit_price, image_url) = self;
        let quantity = u32::try_from(quantity).ok().filter(|q| *q >= 1)?;
        Some(CartEntry {
            quantity,
            name,
            unit_price,
            image_url,
        })
    }
}

/// Totals shown at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSummary {
    pub item_count: u64,
    pub subtotal: Decimal,
    pub service_fee: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
}

impl CartSummary {
    #[must_use]
    pub fn subtotal_display(&self) -> String {
        format_money(self.subtotal)
    }

    #[must_use]
    pub fn total_display(&self) -> String {
        format_money(self.total)
    }
}

/// Cart backed by a storage implementation.
///
/// Holds an in-memory snapshot loaded at [`CartStore::open`]; each mutation
/// is written through to storage before the snapshot is updated, so a failed
/// write leaves both unchanged.
#[derive(Debug)]
pub struct CartStore<S> {
    storage: S,
    entries: BTreeMap<ProductId, CartEntry>,
    fees: FeeSchedule,
}

impl<S: Storage> CartStore<S> {
    /// Open the cart stored in `storage`.
    ///
    /// Never fails: unreadable data is recovered from the backup key or
    /// treated as an empty cart.
    pub fn open(storage: S, fees: FeeSchedule) -> Self {
        let mut store = Self {
            storage,
            entries: BTreeMap::new(),
            fees,
        };
        store.reload();
        store
    }

    /// Re-read the cart from storage, discarding the in-memory snapshot.
    pub fn reload(&mut self) {
        if let Some(entries) = read_cart(&self.storage, keys::CART) {
            self.entries = entries;
            return;
        }

        match read_cart(&self.storage, keys::BACKUP_CART) {
            Some(backup) => {
                warn!(items = backup.len(), "Recovered cart from backup");
                if let Err(e) = self.storage.set_json(keys::CART, &backup) {
                    warn!(error = %e, "Failed to restore primary cart from backup");
                }
                self.entries = backup;
            }
            None => self.entries = BTreeMap::new(),
        }
    }

    /// Add one unit of a product, inserting it if absent.
    ///
    /// Returns the new quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be persisted.
    pub fn add_item(
        &mut self,
        id: ProductId,
        name: &str,
        unit_price: Decimal,
        image_url: &str,
    ) -> Result<u32, StorageError> {
        let mut next = self.entries.clone();
        let entry = next.entry(id).or_insert_with(|| CartEntry {
            quantity: 0,
            name: name.to_string(),
            unit_price,
            image_url: image_url.to_string(),
        });
        entry.quantity = entry.quantity.saturating_add(1);
        let quantity = entry.quantity;

        self.commit(next)?;
        Ok(quantity)
    }

    /// Add one unit of a menu item at its price on `date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be persisted.
    pub fn add_menu_item(&mut self, item: &MenuItem, date: NaiveDate) -> Result<u32, StorageError> {
        self.add_item(
            item.id.clone(),
            &item.name,
            item.effective_price(date),
            &item.image_url,
        )
    }

    /// Change a quantity by a signed delta.
    ///
    /// Returns the new quantity, or `None` if the entry was removed. Unknown
    /// ids are left alone and also return `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be persisted.
    pub fn change_quantity(
        &mut self,
        id: &ProductId,
        delta: i64,
    ) -> Result<Option<u32>, StorageError> {
        let Some(current) = self.entries.get(id) else {
            debug!(%id, "Ignoring quantity change for item not in cart");
            return Ok(None);
        };

        let mut next = self.entries.clone();
        let updated = i64::from(current.quantity).saturating_add(delta);
        let quantity = match u32::try_from(updated) {
            Ok(q) if q >= 1 => Some(q),
            Ok(_) => None,
            Err(_) if updated > 0 => Some(u32::MAX),
            Err(_) => None,
        };

        match quantity {
            Some(q) => {
                if let Some(entry) = next.get_mut(id) {
                    entry.quantity = q;
                }
            }
            None => {
                next.remove(id);
            }
        }

        self.commit(next)?;
        Ok(quantity)
    }

    /// Remove an entry. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be persisted.
    pub fn remove_item(&mut self, id: &ProductId) -> Result<bool, StorageError> {
        if !self.entries.contains_key(id) {
            return Ok(false);
        }
        let mut next = self.entries.clone();
        next.remove(id);
        self.commit(next)?;
        Ok(true)
    }

    /// Empty the cart and delete both the primary and backup keys.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.storage.remove(keys::CART)?;
        if let Err(e) = self.storage.remove(keys::BACKUP_CART) {
            warn!(error = %e, "Failed to remove backup cart");
        }
        self.entries.clear();
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&CartEntry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&ProductId, &CartEntry)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.entries.values().map(|e| u64::from(e.quantity)).sum()
    }

    /// Sum of quantity × unit price.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.entries.values().map(CartEntry::line_total).sum()
    }

    /// Subtotal plus service and delivery fees.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.subtotal() + self.fees.service_fee + self.fees.delivery_fee
    }

    #[must_use]
    pub fn summary(&self) -> CartSummary {
        CartSummary {
            item_count: self.item_count(),
            subtotal: self.subtotal(),
            service_fee: self.fees.service_fee,
            delivery_fee: self.fees.delivery_fee,
            total: self.total(),
        }
    }

    #[must_use]
    pub const fn fees(&self) -> FeeSchedule {
        self.fees
    }

    /// The cart in its stored JSON form, as submitted at checkout.
    #[must_use]
    pub fn to_json(&self) -> String {
        encode(&self.entries)
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    pub const fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    fn commit(&mut self, next: BTreeMap<ProductId, CartEntry>) -> Result<(), StorageError> {
        self.storage.set_json(keys::CART, &next)?;
        if let Err(e) = self.storage.set_json(keys::BACKUP_CART, &next) {
            warn!(error = %e, "Failed to mirror cart to backup");
        }
        self.entries = next;
        Ok(())
    }
}

fn encode(entries: &BTreeMap<ProductId, CartEntry>) -> String {
    // A map of strings to plain values cannot fail to serialize
    serde_json::to_string(entries).unwrap_or_else(|_| "{}".to_string())
}

/// Read a cart from `key`. `None` when missing, empty or unreadable.
fn read_cart<S: Storage>(storage: &S, key: &str) -> Option<BTreeMap<ProductId, CartEntry>> {
    let object = match storage.get_json::<serde_json::Map<String, serde_json::Value>>(key) {
        Ok(object) => object?,
        Err(e) => {
            warn!(key, error = %e, "Failed to read cart from storage");
            return None;
        }
    };

    let mut entries = BTreeMap::new();
    for (id, value) in object {
        let Ok(product_id) = ProductId::parse(&id) else {
            warn!(key, "Skipping cart entry with blank product id");
            continue;
        };
        match serde_json::from_value::<StoredEntry>(value) {
            Ok(stored) => {
                if let Some(entry) = stored.into_entry() {
                    entries.insert(product_id, entry);
                } else {
                    debug!(key, %product_id, "Dropping cart entry with quantity below 1");
                }
            }
            Err(e) => warn!(key, %product_id, error = %e, "Skipping malformed cart entry"),
        }
    }

    (!entries.is_empty()).then_some(entries)
}
