//! Menu browsing commands.

use std::path::Path;

use snap_menu_ordering::OrderingError;
use snap_menu_ordering::menu::{CategoryFilter, Menu};

#[allow(clippy::print_stdout)]
pub fn categories(menu_file: &Path) -> Result<(), OrderingError> {
    let menu = Menu::load(menu_file)?;
    println!("all");
    for category in menu.categories() {
        println!("{category}");
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn list(menu_file: &Path, category: &str) -> Result<(), OrderingError> {
    let menu = Menu::load(menu_file)?;
    let filter = match category.parse::<CategoryFilter>() {
        Ok(filter) => filter,
        Err(never) => match never {},
    };
    let today = chrono::Local::now().date_naive();

    for item in menu.filter(&filter).filter(|item| item.available) {
        let price = item.effective_price(today);
        let promo = if price == item.price { "" } else { " (promo)" };
        println!(
            "{:>6}  {:<28} {:>9}{promo}",
            item.id.as_str(),
            item.name,
            snap_menu_core::format_money(price)
        );
    }
    Ok(())
}
