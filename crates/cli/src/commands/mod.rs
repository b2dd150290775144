//! Command implementations.
//!
//! Every command works on the file-backed store at
//! `OrderingConfig::storage_path`, so state carries over between runs the
//! way a browser's local storage does between page loads.

use snap_menu_ordering::cart::CartStore;
use snap_menu_ordering::config::OrderingConfig;
use snap_menu_ordering::storage::FileStorage;

pub mod cart;
pub mod checkout;
pub mod guests;
pub mod locate;
pub mod menu;

pub fn open_cart(config: &OrderingConfig) -> CartStore<FileStorage> {
    CartStore::open(FileStorage::new(&config.storage_path), config.fees)
}
