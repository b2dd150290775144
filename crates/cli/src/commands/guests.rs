//! Guest count commands.

use snap_menu_ordering::OrderingError;
use snap_menu_ordering::config::OrderingConfig;
use snap_menu_ordering::onboarding::GuestCountStore;
use snap_menu_ordering::storage::FileStorage;

pub fn open(config: &OrderingConfig) -> GuestCountStore<FileStorage> {
    GuestCountStore::new(FileStorage::new(&config.storage_path))
}

pub fn set(store: &mut GuestCountStore<FileStorage>, count: u8) -> Result<(), OrderingError> {
    let count = store.select(count)?;
    tracing::info!(%count, "Guest count recorded");
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn show(store: &GuestCountStore<FileStorage>) -> Result<(), OrderingError> {
    match store.selected()? {
        Some(count) => println!("{count}"),
        None => println!("No guest count selected"),
    }
    Ok(())
}

pub fn reset(store: &mut GuestCountStore<FileStorage>) -> Result<(), OrderingError> {
    store.reset()?;
    tracing::info!("Guest count cleared");
    Ok(())
}
