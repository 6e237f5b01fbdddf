use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::{Result, eyre::Context};
use http_rewrite::{
    adapters::HttpClientAdapter,
    config::{GatewayConfig, load_config},
    core::{Gateway, GatewayError, RouteRegistrar},
    ports::http_client::HttpClient,
    tracing_setup,
    utils::graceful_shutdown::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Configuration file
    #[clap(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Log filter directive (e.g. `debug`, `info,hyper=warn`); defaults to RUST_LOG, then `info`
    #[clap(long, global = true)]
    log_level: Option<String>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Check every route in the configuration file and exit
    Validate,
    /// Start the gateway (default)
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    tracing_setup::init_tracing(args.log_level.as_deref())?;

    let config = match load_config(&args.config).await {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %args.config.display(), error = %e, "Failed loading config");
            std::process::exit(1);
        }
    };

    let client: Arc<dyn HttpClient> =
        Arc::new(HttpClientAdapter::new().context("Failed to create HTTP client")?);

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Validate => validate_config_command(&args.config, &config, client),
        Commands::Serve => serve(config, client).await,
    }
}

async fn serve(config: GatewayConfig, client: Arc<dyn HttpClient>) -> Result<()> {
    let gateway = match Gateway::build(&config, client) {
        Ok(gateway) => gateway,
        Err(GatewayError::NoRoutes) => {
            tracing::error!("No APIs registered");
            std::process::exit(1);
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!(port = config.listen, "Starting server");

    let shutdown = GracefulShutdown::new();
    let signals = shutdown.clone();
    tokio::spawn(async move { signals.run_signal_handler().await });

    let app = gateway.into_router();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let reason = shutdown.wait_for_shutdown().await;
        tracing::info!(reason = ?reason, "Stopping server");
    })
    .await
    .context("Server error")
}

/// Register every route against a throwaway dispatcher and report each outcome.
fn validate_config_command(
    path: &std::path::Path,
    config: &GatewayConfig,
    client: Arc<dyn HttpClient>,
) -> Result<()> {
    println!("🔍 Validating configuration file: {}", path.display());

    let mut registrar = RouteRegistrar::new(client);
    let mut failures = 0usize;
    for api in &config.apis {
        match registrar.register(api) {
            Ok(route) => println!("✅ {:?} {}", route.methods, route.path),
            Err(e) => {
                failures += 1;
                eprintln!("❌ {}: {e}", api.input.path);
            }
        }
    }

    println!();
    println!("📋 Configuration Summary:");
    println!("   • Listen Port: {}", config.listen);
    println!("   • Routes: {} registered, {} rejected", registrar.registered().len(), failures);

    if registrar.registered().is_empty() {
        eprintln!("❌ No APIs registered");
        std::process::exit(1);
    }
    if failures > 0 {
        std::process::exit(1);
    }
    println!("🎉 Configuration is valid and ready to use!");
    Ok(())
}
