//! Admin Console - Entry Point
//!
//! Serves the console pages and JSON API in front of the backend REST API.

use admin_console::{Config, ConsoleConfig, ConsoleServer, ConsoleState};
use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("Admin Console v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: admin-console [--help]");
        println!();
        println!("Environment variables:");
        println!("  CONSOLE_API_BASE_URL          Backend API base URL");
        println!("  CONSOLE_API_TIMEOUT_SECS      Backend request timeout (default: 15)");
        println!("  CONSOLE_BIND_ADDR             Bind address (default: 127.0.0.1)");
        println!("  CONSOLE_PORT                  Port (default: 8080)");
        println!("  CONSOLE_SESSION_EXPIRED_PATH  Redirect on 401");
        println!("  CONSOLE_FORBIDDEN_PATH        Redirect on 403");
        println!("  CONSOLE_LOGIN_PATH            Login surface (default: /login)");
        println!("  CONSOLE_SUPER_ADMIN_ROLE      Bypass role (default: super-admin)");
        println!("  CONSOLE_CACHE_ENABLED         Cache backend GETs (default: true)");
        println!("  CONSOLE_CACHE_TTL             Cache TTL in seconds (default: 60)");
        println!("  CONSOLE_CACHE_MAX_ENTRIES     Cache capacity (default: 10000)");
        println!("  CONSOLE_SECURE_COOKIES        Mark cookies Secure (default: false)");
        println!("  CONSOLE_LOG_REQUESTS          HTTP request tracing (default: true)");
        println!("  CONSOLE_LOG_JSON              JSON logs on stderr (default: false)");
        println!("  RUST_LOG                      Log filter (default: info)");
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_logs = std::env::var("CONSOLE_LOG_JSON")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("Admin Console v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("invalid configuration")?;
    let console_config = ConsoleConfig::from_env();
    let state = ConsoleState::from_config(&config, console_config.secure_cookies)
        .context("failed to build backend client")?;

    ConsoleServer::new(console_config, state)
        .run()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}
