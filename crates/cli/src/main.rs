//! Snap Menu CLI - drive the ordering flow from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Add a menu item to the cart
//! snap-menu cart add 7 --name Burger --price 5.00 --image img.jpg
//!
//! # Show the cart with totals
//! snap-menu cart show
//!
//! # Detect the delivery mode from a position
//! snap-menu locate --lat 5.6043 --lon -0.1870
//!
//! # Place a home delivery order
//! snap-menu checkout --lat 5.62 --lon -0.17 \
//!     --name "Ama Mensah" --phone 0241234567 --address "12 Ring Road"
//! ```
//!
//! # Commands
//!
//! - `cart` - Add, change, remove and list cart entries
//! - `menu` - List menu categories and items
//! - `locate` - Detect dine-in or home delivery
//! - `checkout` - Place the cart as an order
//! - `guests` - Record the party size

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use snap_menu_core::{Coordinate, DeliveryMode, PaymentMethod};
use snap_menu_ordering::OrderingError;
use snap_menu_ordering::config::OrderingConfig;
use snap_menu_ordering::geo::{FixedLocator, LocationError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "snap-menu")]
#[command(author, version, about = "Snap Menu ordering client")]
struct Cli {
    /// Local store file (overrides `SNAP_MENU_STORAGE_PATH`)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Browse the menu
    Menu {
        /// Menu file (JSON list of items)
        #[arg(long, default_value = "menu.json")]
        file: PathBuf,

        #[command(subcommand)]
        action: MenuAction,
    },
    /// Detect dine-in or home delivery from a position
    Locate(LocationArgs),
    /// Place the cart as an order
    Checkout(CheckoutArgs),
    /// Record the party size
    Guests {
        #[command(subcommand)]
        action: GuestAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Add one unit of an item
    Add {
        /// Product id
        id: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Unit price
        #[arg(short, long)]
        price: Decimal,

        /// Image URL
        #[arg(short, long, default_value = "")]
        image: String,
    },
    /// Add one unit of an item from the menu file, at today's price
    AddFromMenu {
        /// Product id
        id: String,

        /// Menu file (JSON list of items)
        #[arg(long, default_value = "menu.json")]
        file: PathBuf,
    },
    /// Increase a quantity by one
    Inc {
        /// Product id
        id: String,
    },
    /// Decrease a quantity by one, removing the item at zero
    Dec {
        /// Product id
        id: String,
    },
    /// Remove an item
    Remove {
        /// Product id
        id: String,
    },
    /// List the cart with totals
    Show,
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum MenuAction {
    /// List categories in menu order
    Categories,
    /// List items, optionally filtered by category
    List {
        /// Category name, or `all`
        #[arg(short, long, default_value = "all")]
        category: String,
    },
}

#[derive(Subcommand)]
enum GuestAction {
    /// Record the number of diners (1-12)
    Set {
        count: u8,
    },
    /// Show the recorded number of diners
    Show,
    /// Forget the recorded number of diners
    Reset,
}

/// Where the device is, or why its position is unknown.
#[derive(Args, Clone)]
struct LocationArgs {
    /// Device latitude
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Device longitude
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Simulate a failed location request
    #[arg(long, value_enum, conflicts_with_all = ["lat", "lon"])]
    fail: Option<FailureKind>,

    /// Force a delivery mode (`restaurant` or `home`)
    #[arg(long = "mode")]
    mode_override: Option<DeliveryMode>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FailureKind {
    Denied,
    Unavailable,
    Timeout,
    Unsupported,
}

impl LocationArgs {
    fn locator(&self) -> Result<FixedLocator, OrderingError> {
        match (self.lat, self.lon, self.fail) {
            (Some(lat), Some(lon), _) => Ok(FixedLocator::at(Coordinate::new(lat, lon)?)),
            (_, _, Some(kind)) => Ok(FixedLocator::failing(match kind {
                FailureKind::Denied => LocationError::PermissionDenied,
                FailureKind::Unavailable => LocationError::PositionUnavailable,
                FailureKind::Timeout => LocationError::Timeout,
                FailureKind::Unsupported => LocationError::Unsupported,
            })),
            _ => Ok(FixedLocator::failing(LocationError::Unsupported)),
        }
    }
}

#[derive(Args)]
struct CheckoutArgs {
    #[command(flatten)]
    location: LocationArgs,

    /// Payment method (`cash` or `mobile`)
    #[arg(long)]
    payment: Option<PaymentMethod>,

    /// Table number for dine-in orders
    #[arg(long)]
    table: Option<String>,

    /// Full name for home delivery
    #[arg(long)]
    name: Option<String>,

    /// Contact phone for home delivery
    #[arg(long)]
    phone: Option<String>,

    /// Delivery address for home delivery
    #[arg(long)]
    address: Option<String>,

    /// Phone number to verify (defaults to the contact phone)
    #[arg(long)]
    verify_phone: Option<String>,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|d| !d.is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: std::env::var("SENTRY_ENVIRONMENT")
                .ok()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    // Initialize Sentry (must be done before tracing subscriber)
    let sentry_guard = init_sentry();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "snap_menu_ordering=info,snap_menu_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if sentry_guard.is_some() {
        tracing::info!("Sentry initialized");
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        if e.is_internal() {
            sentry::capture_error(&e);
        }
        tracing::error!("Command failed: {e}");
        // Flush pending Sentry events before exiting
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), OrderingError> {
    let mut config = OrderingConfig::from_env()?;
    if let Some(path) = cli.storage {
        config.storage_path = path;
    }

    match cli.command {
        Commands::Cart { action } => {
            let mut cart = commands::open_cart(&config);
            match action {
                CartAction::Add {
                    id,
                    name,
                    price,
                    image,
                } => commands::cart::add(&mut cart, &id, &name, price, &image)?,
                CartAction::AddFromMenu { id, file } => {
                    commands::cart::add_from_menu(&mut cart, &file, &id)?;
                }
                CartAction::Inc { id } => commands::cart::change(&mut cart, &id, 1)?,
                CartAction::Dec { id } => commands::cart::change(&mut cart, &id, -1)?,
                CartAction::Remove { id } => commands::cart::remove(&mut cart, &id)?,
                CartAction::Show => commands::cart::show(&cart),
                CartAction::Clear => commands::cart::clear(&mut cart)?,
            }
        }
        Commands::Menu { file, action } => match action {
            MenuAction::Categories => commands::menu::categories(&file)?,
            MenuAction::List { category } => commands::menu::list(&file, &category)?,
        },
        Commands::Locate(args) => {
            commands::locate::run(&config, args.locator()?, args.mode_override).await?;
        }
        Commands::Checkout(args) => {
            let locator = args.location.locator()?;
            let order = commands::checkout::OrderDetails {
                mode_override: args.location.mode_override,
                payment: args.payment,
                table: args.table,
                name: args.name,
                phone: args.phone,
                address: args.address,
                verify_phone: args.verify_phone,
            };
            commands::checkout::run(&config, locator, order).await?;
        }
        Commands::Guests { action } => {
            let mut guests = commands::guests::open(&config);
            match action {
                GuestAction::Set { count } => commands::guests::set(&mut guests, count)?,
                GuestAction::Show => commands::guests::show(&guests)?,
                GuestAction::Reset => commands::guests::reset(&mut guests)?,
            }
        }
    }
    Ok(())
}
