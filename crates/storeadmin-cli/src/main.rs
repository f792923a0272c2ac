//! storeadmin - command-line admin panel for the demo store API.
//!
//! Keeps a persisted session and refreshes it transparently; when the
//! session cannot be recovered the user is sent back to `storeadmin login`.

mod commands;
mod output;

use std::io;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use output::OutputFormat;

#[derive(Parser)]
#[command(name = "storeadmin")]
#[command(about = "Admin panel for the demo store API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login {
        /// Account email (defaults to STOREADMIN_EMAIL or the last one used)
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Logout and clear the stored session
    Logout,

    /// Show session status
    Status,

    /// Show the logged-in user's profile
    Whoami,

    /// Manage products
    Products {
        #[command(subcommand)]
        command: ProductCommands,
    },

    /// Manage categories
    Categories {
        #[command(subcommand)]
        command: CategoryCommands,
    },

    /// Manage users
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum ProductCommands {
    /// List products
    List {
        /// Filter by title
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        price_min: Option<f64>,
        #[arg(long)]
        price_max: Option<f64>,
        #[arg(long)]
        category_id: Option<i64>,
        #[arg(long)]
        offset: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show product details
    Show { id: i64 },
    /// Delete a product
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// List categories
    List,
    /// Show category details
    Show { id: i64 },
    /// Delete a category
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List users
    List,
    /// Show user details
    Show { id: i64 },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(default_level: &str) {
    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    info!("storeadmin starting");

    let format = cli.format;
    let ctx = match commands::Context::open(format) {
        Ok(ctx) => ctx,
        Err(e) => {
            output::print_error(&format!("{:#}", e), format);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Login { email } => commands::auth::login(&ctx, email).await,
        Commands::Logout => commands::auth::logout(&ctx),
        Commands::Status => commands::auth::status(&ctx),
        Commands::Whoami => commands::auth::whoami(&ctx).await,
        Commands::Products { command } => match command {
            ProductCommands::List {
                title,
                price_min,
                price_max,
                category_id,
                offset,
                limit,
            } => {
                let filter = storeadmin_core::models::ProductFilter {
                    title,
                    price_min,
                    price_max,
                    category_id,
                    offset,
                    limit,
                };
                commands::resources::list_products(&ctx, &filter).await
            }
            ProductCommands::Show { id } => commands::resources::show_product(&ctx, id).await,
            ProductCommands::Delete { id } => commands::resources::delete_product(&ctx, id).await,
        },
        Commands::Categories { command } => match command {
            CategoryCommands::List => commands::resources::list_categories(&ctx).await,
            CategoryCommands::Show { id } => commands::resources::show_category(&ctx, id).await,
            CategoryCommands::Delete { id } => {
                commands::resources::delete_category(&ctx, id).await
            }
        },
        Commands::Users { command } => match command {
            UserCommands::List => commands::resources::list_users(&ctx).await,
            UserCommands::Show { id } => commands::resources::show_user(&ctx, id).await,
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The session-expired notice has already been shown
            if ctx.session_expired() {
                debug!(error = %e, "Command failed after session expiry");
            } else {
                output::print_error(&format!("{:#}", e), format);
            }
            ExitCode::FAILURE
        }
    }
}
