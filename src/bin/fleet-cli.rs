use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Map, Value};

use fleet_balancer::load_balancer::StrategyKind;

#[derive(Parser)]
#[command(name = "fleet-cli")]
#[command(about = "Management CLI for the fleet balancer", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    url: String,

    #[arg(short, long, env = "FLEET_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, strategy and pool counts
    Status,
    /// List instances with health, counters and usage
    Instances,
    /// Start one more backend instance
    Add,
    /// Remove an instance by id (host:port)
    Remove { id: String },
    /// Report health and usage for one instance
    Health {
        id: String,
        #[arg(long, conflicts_with = "unhealthy")]
        healthy: bool,
        #[arg(long)]
        unhealthy: bool,
        #[arg(long)]
        cpu: Option<f64>,
        #[arg(long)]
        memory: Option<f64>,
    },
    /// Show pool bounds, or update them when any flag is given
    Pool {
        #[arg(long)]
        min: Option<usize>,
        #[arg(long)]
        max: Option<usize>,
        #[arg(long)]
        scale_up_cpu: Option<f64>,
        #[arg(long)]
        scale_down_cpu: Option<f64>,
    },
    /// Switch the selection strategy
    Strategy { kind: StrategyKind },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    let url = |path: &str| format!("{}{}", cli.url.trim_end_matches('/'), path);

    let request = match cli.command {
        Commands::Status => client.get(url("/admin/status")),
        Commands::Instances => client.get(url("/admin/instances")),
        Commands::Add => client.post(url("/admin/instances")),
        Commands::Remove { id } => client.delete(url(&format!("/admin/instances/{}", id))),
        Commands::Health { id, healthy, unhealthy, cpu, memory } => {
            let update = json!([{
                "id": id,
                "healthy": healthy || !unhealthy,
                "cpu_usage": cpu,
                "memory_usage": memory,
            }]);
            client.put(url("/admin/health")).json(&update)
        }
        Commands::Pool { min, max, scale_up_cpu, scale_down_cpu } => {
            let mut update = Map::new();
            if let Some(min) = min {
                update.insert("min_instances".into(), json!(min));
            }
            if let Some(max) = max {
                update.insert("max_instances".into(), json!(max));
            }
            if let Some(up) = scale_up_cpu {
                update.insert("scale_up_cpu".into(), json!(up));
            }
            if let Some(down) = scale_down_cpu {
                update.insert("scale_down_cpu".into(), json!(down));
            }

            if update.is_empty() {
                client.get(url("/admin/pool"))
            } else {
                client.put(url("/admin/pool")).json(&Value::Object(update))
            }
        }
        Commands::Strategy { kind } => client
            .put(url("/admin/strategy"))
            .json(&json!({ "strategy": kind })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
