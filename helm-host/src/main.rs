//! Helm host daemon — entry point.
//!
//! ```text
//! helm-host                      Run in the foreground
//! helm-host --config <path>      Load a custom config TOML
//! helm-host --gen-config         Write default config to stdout
//! helm-host --add-user <name>    Create an account (password on stdin)
//! ```

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use helm_core::{Capabilities, ServerContext, SessionRegistry, UserStore};
use helm_host::capability::HostCapabilities;
use helm_host::config::HostConfig;
use helm_host::service::HostService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "helm-host", about = "Helm remote-control host daemon")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "helm-host.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Create an account in the users file and exit. Reads the
    /// password from stdin.
    #[arg(long, value_name = "USERNAME")]
    add_user: Option<String>,
}

fn read_password(username: &str) -> std::io::Result<String> {
    print!("password for {username}: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&HostConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = HostConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // --add-user: account management, no daemon.
    if let Some(username) = cli.add_user {
        let users = UserStore::load(&config.auth.users_file)?;
        let password = read_password(&username)?;
        users.add_user(&username, &password, false)?;
        println!("account {username:?} created in {}", config.auth.users_file);
        return Ok(());
    }

    info!("helm-host v{}", env!("CARGO_PKG_VERSION"));
    info!("bind: {}", config.listen_addr());
    info!("users file: {}", config.auth.users_file);
    info!("file roots: {:?}", config.files.allowed_roots);

    let users = UserStore::load(&config.auth.users_file)?;
    if users.is_empty() {
        tracing::warn!("no accounts exist; use --add-user before operators can log in");
    }

    let ctx = ServerContext {
        registry: Arc::new(SessionRegistry::new()),
        users: Arc::new(users),
        capabilities: Arc::new(HostCapabilities::new(&config.files.allowed_roots))
            as Arc<dyn Capabilities>,
    };

    let service = HostService::new(config, ctx);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received — shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    service.run().await?;
    Ok(())
}
