use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use fleet_balancer::admin::setup_admin_router;
use fleet_balancer::config::loader::load_config;
use fleet_balancer::config::validation::validate_config;
use fleet_balancer::config::FleetConfig;
use fleet_balancer::http::HttpServer;
use fleet_balancer::lifecycle::{bootstrap, wait_for_signal, Shutdown};
use fleet_balancer::observability::{logging, metrics};
use fleet_balancer::process::CommandLauncher;

#[derive(Parser)]
#[command(name = "fleet-balancer")]
#[command(about = "Load-balancing control plane for a pool of backend processes", long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend executable; started as `<path> <port>`
    #[arg(long)]
    backend_path: Option<String>,

    /// Inbound listener port
    #[arg(long)]
    port: Option<u16>,

    /// First backend port
    #[arg(long)]
    start_port: Option<u16>,

    #[arg(long)]
    min_servers: Option<usize>,

    #[arg(long)]
    max_servers: Option<usize>,
}

impl Args {
    fn apply(&self, config: &mut FleetConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(path) = &self.backend_path {
            config.pool.backend_command = format!("{} {{port}}", path);
        }
        if let Some(port) = self.port {
            let mut addr: SocketAddr = config.listener.bind_address.parse()?;
            addr.set_port(port);
            config.listener.bind_address = addr.to_string();
        }
        if let Some(start_port) = self.start_port {
            config.pool.start_port = start_port;
        }
        if let Some(min) = self.min_servers {
            config.pool.min_instances = min;
        }
        if let Some(max) = self.max_servers {
            config.pool.max_instances = max;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => FleetConfig::default(),
    };
    args.apply(&mut config)?;

    logging::init_logging(&config.observability);
    tracing::info!("fleet-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(field = error.field, message = %error.message, "Invalid configuration");
        }
        return Err(format!("configuration has {} error(s)", errors.len()).into());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend_command = %config.pool.backend_command,
        start_port = config.pool.start_port,
        min_instances = config.pool.min_instances,
        max_instances = config.pool.max_instances,
        strategy = %config.strategy.kind,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let launcher = Arc::new(CommandLauncher::new(config.pool.backend_command.clone()));
    let fleet = bootstrap(&config, launcher, &shutdown);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(&config, fleet.registry.clone(), fleet.strategy.clone());
    let inbound = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let admin = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");
        let app = setup_admin_router(fleet.admin_state(&config));
        let mut stop = shutdown.subscribe();
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await
        }))
    } else {
        None
    };

    wait_for_signal().await;
    shutdown.trigger();

    match inbound.await {
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
        Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
        Ok(Ok(())) => {}
    }
    if let Some(admin) = admin {
        match admin.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin server failed"),
            Err(e) => tracing::error!(error = %e, "Admin server task failed"),
            Ok(Ok(())) => {}
        }
    }

    let terminated = fleet.stop().await;
    tracing::info!(terminated, "Shutdown complete");
    Ok(())
}
