use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use api_ingress::{ApiIngress, AppInfo};
use clap::{Parser, Subcommand};
use runtime::{AppConfig, CliArgs};

/// Service Template Server - HTTP service with uniform error handling
#[derive(Parser)]
#[command(name = "service-server")]
#[command(about = "Service Template Server - HTTP service with uniform error handling")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration
    Check,
}

fn app_info() -> AppInfo {
    AppInfo::new(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_DESCRIPTION"),
    )
    .with_homepage(env!("CARGO_PKG_HOMEPAGE"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.server.home_dir));
    tracing::info!("Service server starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(config),
    }
}

fn listen_addr(config: &AppConfig) -> Result<SocketAddr> {
    let host = config.server.host.trim();
    let ip: IpAddr = host
        .parse()
        .with_context(|| format!("invalid listen address '{host}'"))?;
    Ok(SocketAddr::new(ip, config.server.port))
}

async fn run_server(config: AppConfig) -> Result<()> {
    let addr = listen_addr(&config)?;
    let ingress = ApiIngress::from_app_config(&config, app_info())?;
    ingress.serve(addr, api_ingress::shutdown::signal()).await?;
    tracing::info!("Service server stopped");
    Ok(())
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    listen_addr(&config)?;
    let ingress = ApiIngress::from_app_config(&config, app_info())?;
    ingress.build_router()?;

    println!("Configuration check passed");
    println!("{}", config.to_yaml()?);
    Ok(())
}
