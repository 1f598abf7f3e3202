//! Astro Dozi CLI - daily horoscopes and mystic readings from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Today's horoscope for a sign
//! astro horoscope leo
//!
//! # Remember a sign, then use it by default
//! astro select scorpio
//! astro horoscope
//!
//! # Paid reading, confirming the coin spend
//! astro feature tarot --yes
//!
//! # Render HTML instead of text
//! astro horoscope aries --html
//! ```
//!
//! # Commands
//!
//! - `signs` - List the zodiac catalog
//! - `horoscope` - Show today's horoscope
//! - `feature` - Request a mystic reading
//! - `select` - Select and remember a sign
//! - `balance` - Show the session: identity, coins, premium, sign
//! - `guest` - Continue without an account
//! - `sign-in` / `sign-out` - Manage the account session
//! - `buy` - Buy coins

#![cfg_attr(not(test), forbid(unsafe_code))]

use astro_dozi_app::{AppConfig, AstroApp};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

const DEFAULT_LOG_FILTER: &str = "astro_dozi_app=info,astro_dozi_cli=info";

#[derive(Parser)]
#[command(name = "astro")]
#[command(author, version, about = "Astro Dozi horoscope client")]
struct Cli {
    /// Sign to preselect before the session loads (e.g. from a link)
    #[arg(long, global = true)]
    sign: Option<String>,

    /// Print HTML instead of text
    #[arg(long, global = true)]
    html: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the zodiac signs
    Signs,
    /// Show today's horoscope
    Horoscope {
        /// Sign id (defaults to the selected sign)
        sign: Option<String>,
    },
    /// Request a mystic feature reading
    Feature {
        /// Feature id (`tarot`, `compatibility`, `aura`, `past-life`, `chakra`, `life-path`)
        feature: String,

        /// Confirm the coin spend
        #[arg(short, long)]
        yes: bool,
    },
    /// Select and remember a sign
    Select {
        /// Sign id
        sign: String,
    },
    /// Show the current session
    Balance,
    /// Continue without an account
    Guest,
    /// Sign in with the configured account
    SignIn,
    /// Sign out and clear local state
    SignOut,
    /// Buy coins
    Buy,
}

#[tokio::main]
async fn main() {
    // Load .env before reading RUST_LOG
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Signs = cli.command {
        commands::account::signs();
        return Ok(());
    }

    let config = AppConfig::from_env()?;
    let app = AstroApp::from_config(&config)?;
    if let Some(token) = &cli.sign {
        app.preselect_sign(token);
    }
    app.start().await;

    let mut notices = app.notices();
    match cli.command {
        Commands::Signs => {}
        Commands::Horoscope { sign } => {
            commands::reading::horoscope(&app, sign.as_deref(), cli.html).await?;
        }
        Commands::Feature { feature, yes } => {
            commands::reading::feature(&app, &feature, yes, cli.html).await?;
        }
        Commands::Select { sign } => commands::account::select(&app, &sign).await?,
        Commands::Balance => commands::account::balance(&app),
        Commands::Guest => commands::account::guest(&app)?,
        Commands::SignIn => commands::account::sign_in(&app).await?,
        Commands::SignOut => app.sign_out().await?,
        Commands::Buy => app.buy_coins(),
    }

    commands::print_notices(&mut notices);
    Ok(())
}
