//! MommyPump CLI - Database migrations and store management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! mp-cli migrate
//!
//! # Load the product catalog from YAML (or the bundled demo catalog)
//! mp-cli seed products catalog.yaml
//! mp-cli seed products --demo
//!
//! # Review bookings and move them along
//! mp-cli bookings list --status pending
//! mp-cli bookings set-status 3f2a... confirmed --notes "Slip checked"
//! mp-cli bookings sweep-drafts --older-than-hours 24
//!
//! # Take a product off the storefront
//! mp-cli products set-status pump3 unavailable
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed products` - Upsert products from a catalog file
//! - `products` - List products and change their availability
//! - `bookings` - List bookings, change status, cancel abandoned drafts
//! - `customers list` - List customer profiles

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use mommypump_core::{BookingStatus, ProductStatus};
use mommypump_storefront::services::booking::DEFAULT_DRAFT_MAX_AGE_HOURS;

mod commands;

#[derive(Parser)]
#[command(name = "mp-cli")]
#[command(author, version, about = "MommyPump CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed the document store
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage products
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Manage bookings
    Bookings {
        #[command(subcommand)]
        action: BookingAction,
    },
    /// Manage customers
    Customers {
        #[command(subcommand)]
        action: CustomerAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert products from a YAML catalog
    Products {
        /// Path to the catalog file
        #[arg(required_unless_present = "demo")]
        file: Option<String>,

        /// Use the bundled demo catalog
        #[arg(long, conflicts_with = "file")]
        demo: bool,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// List all products
    List,
    /// Change a product's availability
    SetStatus {
        /// Product ID
        id: String,

        /// New status (`available`, `unavailable`, `rented`)
        status: ProductStatus,
    },
}

#[derive(Subcommand)]
enum BookingAction {
    /// List bookings, newest first
    List {
        /// Only bookings in this status
        #[arg(short, long)]
        status: Option<BookingStatus>,
    },
    /// Move a booking to a new status
    SetStatus {
        /// Booking ID
        id: String,

        /// New status (`pending`, `confirmed`, `delivered`, `returned`, `cancelled`)
        status: BookingStatus,

        /// Replace the booking's notes
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Cancel drafts whose payment never completed
    SweepDrafts {
        /// Minimum draft age in hours
        #[arg(long, default_value_t = DEFAULT_DRAFT_MAX_AGE_HOURS)]
        older_than_hours: i64,
    },
}

#[derive(Subcommand)]
enum CustomerAction {
    /// List all customer profiles
    List,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file, demo } => {
                commands::seed::products(file.as_deref(), demo).await?;
            }
        },
        Commands::Products { action } => match action {
            ProductAction::List => commands::products::list().await?,
            ProductAction::SetStatus { id, status } => {
                commands::products::set_status(&id, status).await?;
            }
        },
        Commands::Bookings { action } => match action {
            BookingAction::List { status } => commands::bookings::list(status).await?,
            BookingAction::SetStatus { id, status, notes } => {
                commands::bookings::set_status(&id, status, notes.as_deref()).await?;
            }
            BookingAction::SweepDrafts { older_than_hours } => {
                commands::bookings::sweep_drafts(older_than_hours).await?;
            }
        },
        Commands::Customers { action } => match action {
            CustomerAction::List => commands::customers::list().await?,
        },
    }
    Ok(())
}
