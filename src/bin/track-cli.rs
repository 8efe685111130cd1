use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "track-cli")]
#[command(about = "Query client for the track server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "https://localhost:3024")]
    url: String,

    /// Accept self-signed or otherwise invalid certificates.
    #[arg(short = 'k', long)]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all activities, newest first
    List,
    /// Show the most recent activity
    Latest,
    /// Show one activity by id
    Get { id: String },
    /// List activities of one track type
    ByType { track_type: String },
    /// List activities between two dates (RFC 3339 or YYYY-MM-DD)
    Range { start: String, end: String },
    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(cli.insecure)
        .build()?;
    let base = cli.url.trim_end_matches('/');

    let request = match &cli.command {
        Commands::List => client.get(format!("{}/gpx", base)),
        Commands::Latest => client.get(format!("{}/gpx/latest", base)),
        Commands::Get { id } => client.get(format!("{}/gpx/{}", base, id)),
        Commands::ByType { track_type } => client.get(format!("{}/gpx/by-type/{}", base, track_type)),
        Commands::Range { start, end } => client
            .get(format!("{}/gpx/date-range", base))
            .query(&[("startDate", start), ("endDate", end)]),
        Commands::Health => client.get(format!("{}/health", base)),
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
