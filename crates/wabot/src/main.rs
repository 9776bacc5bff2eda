#![forbid(unsafe_code)]

use wabot::collaborators::Collaborators;
use wabot::config::{load_config, Cli, Commands, Config};
use wabot::credentials::CredentialStore;
use wabot::gateway::GatewayConnector;
use wabot::health;
use wabot::presentation;
use wabot::runtime::{Runtime, Shutdown};

use clap::Parser;
use std::io::IsTerminal;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wabot_common::ConnectionState;

// ── ANSI style helpers ──────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

fn tty() -> bool {
    std::io::stdout().is_terminal()
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let directive = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::new(directive)
    };

    if let Some(ref path) = cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| anyhow::anyhow!("failed to open log file {path:?}: {e}"))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = load_config(cli.config.as_deref())?;

    if let Some(ref gateway) = cli.gateway {
        config.gateway = gateway.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    Ok(config)
}

fn report_shutdown(shutdown: &Shutdown) {
    if shutdown.exit_code() == 0 {
        info!("{shutdown}");
    } else {
        error!("{shutdown}");
    }
    let Some(hint) = shutdown.guidance() else {
        return;
    };
    if std::io::stderr().is_terminal() {
        eprintln!();
        eprintln!("  {RED}•{RESET} {shutdown}");
        eprintln!("    {DIM}{hint}{RESET}");
        eprintln!();
    } else {
        eprintln!("{shutdown}: {hint}");
    }
}

// ── Daemon ──────────────────────────────────────────────────────────

async fn run_daemon(cli: &Cli) -> anyhow::Result<i32> {
    let config = resolve_config(cli)?;

    if std::io::stderr().is_terminal() {
        let v = env!("CARGO_PKG_VERSION");
        eprintln!();
        eprintln!("  {BOLD}◈ {}{RESET} {DIM}v{v}{RESET}", config.bot_name);
        eprintln!("  {DIM}Mode{RESET}       {CYAN}{}{RESET}", config.mode.as_str());
        eprintln!("  {DIM}Prefix{RESET}     {}", config.prefix);
        eprintln!("  {DIM}Gateway{RESET}    {}", config.gateway);
        eprintln!("  {DIM}Health{RESET}     http://0.0.0.0:{}/", config.port);
        eprintln!();
    }

    info!(gateway = %config.gateway, mode = config.mode.as_str(), "starting wabot daemon");

    let config = Arc::new(config);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

    let health_handle = tokio::spawn({
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let bot_name = config.bot_name.clone();
        async move {
            if let Err(e) = health::start_health_server(addr, &bot_name, state_rx).await {
                error!("Health server error: {}", e);
            }
        }
    });

    let runtime = Runtime::new(
        config.clone(),
        CredentialStore::from_config(&config),
        GatewayConnector::new(config.gateway.as_str(), config.version_url.as_str()),
        Collaborators::logging(),
        state_tx,
    );

    let code = tokio::select! {
        shutdown = runtime.run() => {
            report_shutdown(&shutdown);
            shutdown.exit_code()
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
            0
        }
    };

    health_handle.abort();
    Ok(code)
}

// ── Check ───────────────────────────────────────────────────────────

fn run_check(cli: &Cli) -> i32 {
    let mut ok = true;

    let config = match resolve_config(cli) {
        Ok(cfg) => {
            if tty() {
                println!("  {GREEN}\u{2713}{RESET} Config valid");
            } else {
                println!("config: ok");
            }
            Some(cfg)
        }
        Err(e) => {
            ok = false;
            if tty() {
                println!("  {RED}\u{2717}{RESET} Config: {DIM}{e}{RESET}");
            } else {
                println!("config: error: {e}");
            }
            None
        }
    };

    if let Some(cfg) = config {
        let store = CredentialStore::from_config(&cfg);
        match store.bootstrap() {
            Ok(ready) => {
                if tty() {
                    println!(
                        "  {GREEN}\u{2713}{RESET} Credentials ready {DIM}({}){RESET}",
                        ready.creds_path.display()
                    );
                } else {
                    println!("credentials: ok: {}", ready.creds_path.display());
                }
            }
            Err(e) => {
                ok = false;
                if tty() {
                    println!("  {RED}\u{2717}{RESET} Credentials: {DIM}{e}{RESET}");
                } else {
                    println!("credentials: error: {e}");
                }
            }
        }
    }

    i32::from(!ok)
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("Failed to install rustls crypto provider - may already be installed or unsupported platform");
    }

    let cli = Cli::parse();

    init_tracing(&cli)?;

    let code = match &cli.command {
        Commands::Start => run_daemon(&cli).await?,

        Commands::Check => run_check(&cli),

        Commands::Greet => {
            let greeting = presentation::greeting();
            let time = presentation::current_time();
            if tty() {
                println!("  {BOLD}ɢᴏᴏᴅ {greeting}{RESET} {DIM}{time}{RESET}");
            } else {
                println!("{greeting} {time}");
            }
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
