use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Management CLI for the gatekeeper admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "GATE_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, banned and locked counts
    Status,
    /// List identifiers currently locked out
    Locked,
    /// Count identifiers currently locked out
    LockedCount,
    /// Clear every runtime lockout
    UnlockAll,
    /// Ban an IP address now
    Ban {
        ip: String,
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Show the blacklist
    Banned,
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

    let (method, path) = match &cli.command {
        Commands::Status => (Method::GET, "/admin/status".to_string()),
        Commands::Locked => (Method::GET, "/admin/security/locked".to_string()),
        Commands::LockedCount => (Method::GET, "/admin/security/locked/count".to_string()),
        Commands::UnlockAll => (Method::POST, "/admin/security/unlock-all".to_string()),
        Commands::Ban { ip, .. } => (Method::POST, format!("/admin/security/ban/{}", ip)),
        Commands::Banned => (Method::GET, "/admin/security/banned".to_string()),
    };

    let mut request = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers);
    if let Commands::Ban {
        reason: Some(reason),
        ..
    } = &cli.command
    {
        request = request.query(&[("reason", reason)]);
    }

    let res = request.send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
