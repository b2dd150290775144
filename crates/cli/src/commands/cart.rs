//! Cart commands.

use std::path::Path;

use rust_decimal::Decimal;
use snap_menu_core::ProductId;
use snap_menu_ordering::OrderingError;
use snap_menu_ordering::cart::CartStore;
use snap_menu_ordering::menu::Menu;
use snap_menu_ordering::storage::FileStorage;

type Cart = CartStore<FileStorage>;

pub fn add(
    cart: &mut Cart,
    id: &str,
    name: &str,
    price: Decimal,
    image: &str,
) -> Result<(), OrderingError> {
    let quantity = cart.add_item(ProductId::parse(id)?, name, price, image)?;
    tracing::info!(id, quantity, "Added to cart");
    show(cart);
    Ok(())
}

/// Add an item looked up in the menu file, priced for today.
pub fn add_from_menu(cart: &mut Cart, menu_file: &Path, id: &str) -> Result<(), OrderingError> {
    let menu = Menu::load(menu_file)?;
    let id = ProductId::parse(id)?;
    let item = menu
        .find(&id)
        .ok_or_else(|| OrderingError::NotFound(format!("menu item {id}")))?;

    let today = chrono::Local::now().date_naive();
    let quantity = cart.add_menu_item(item, today)?;
    tracing::info!(%id, quantity, price = %item.effective_price(today), "Added to cart");
    show(cart);
    Ok(())
}

pub fn change(cart: &mut Cart, id: &str, delta: i64) -> Result<(), OrderingError> {
    let id = ProductId::parse(id)?;
    if cart.get(&id).is_none() {
        return Err(OrderingError::NotFound(format!("cart item {id}")));
    }
    match cart.change_quantity(&id, delta)? {
        Some(quantity) => tracing::info!(%id, quantity, "Quantity changed"),
        None => tracing::info!(%id, "Removed from cart"),
    }
    show(cart);
    Ok(())
}

pub fn remove(cart: &mut Cart, id: &str) -> Result<(), OrderingError> {
    let id = ProductId::parse(id)?;
    if cart.remove_item(&id)? {
        tracing::info!(%id, "Removed from cart");
    } else {
        tracing::warn!(%id, "Item was not in the cart");
    }
    show(cart);
    Ok(())
}

pub fn clear(cart: &mut Cart) -> Result<(), OrderingError> {
    cart.clear()?;
    tracing::info!("Cart cleared");
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn show(cart: &Cart) {
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }

    for (id, entry) in cart.entries() {
        println!(
            "{id:>6}  {:<24} {:>3} x {:>8} = {:>9}",
            entry.name,
            entry.quantity,
            snap_menu_core::format_money(entry.unit_price),
            snap_menu_core::format_money(entry.line_total()),
        );
    }

    let summary = cart.summary();
    println!("{}", "-".repeat(60));
    println!("{:<40} {:>19}", "Subtotal", summary.subtotal_display());
    println!(
        "{:<40} {:>19}",
        "Service fee",
        snap_menu_core::format_money(summary.service_fee)
    );
    if !summary.delivery_fee.is_zero() {
        println!(
            "{:<40} {:>19}",
            "Delivery fee",
            snap_menu_core::format_money(summary.delivery_fee)
        );
    }
    println!(
        "{:<40} {:>19}",
        format!("Total ({} items)", summary.item_count),
        summary.total_display()
    );
}
