use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use voice_gateway::auth::TokenSigner;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the voice gateway", long_about = None)]
struct Cli {
    /// Admin API base URL.
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Admin API key.
    #[arg(short, long, env = "GATEWAY_ADMIN_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway status and config generation
    Status,
    /// List live connections
    Connections,
    /// Show the modules in the current snapshot
    Modules,
    /// Fetch and apply a new configuration
    Reload,
    /// Mint a device bearer token offline
    Token {
        #[arg(long)]
        device_id: String,
        #[arg(long)]
        client_id: Option<String>,
        /// Shared secret (auth.auth_key)
        #[arg(long, env = "GATEWAY_AUTH_KEY")]
        secret: String,
    },
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

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")),
        Commands::Connections => client.get(format!("{base}/admin/connections")),
        Commands::Modules => client.get(format!("{base}/admin/modules")),
        Commands::Reload => client.post(format!("{base}/admin/reload")),
        Commands::Token {
            device_id,
            client_id,
            secret,
        } => {
            let signer = TokenSigner::new(secret, None);
            println!("{}", signer.issue(client_id.as_deref(), &device_id));
            return Ok(());
        }
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
