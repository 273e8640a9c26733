use clap::{Parser, Subcommand};
use reqwest::StatusCode;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "greetings-cli")]
#[command(about = "Client for the greeting services", long_about = None)]
struct Cli {
    /// Front service base URL
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Backend service base URL
    #[arg(short, long, default_value = "http://localhost:8081")]
    backend_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request greetings from the front service
    Greet {
        #[arg(short, long, default_value = "World")]
        name: String,

        #[arg(short, long, default_value_t = 1)]
        count: u32,
    },
    /// Call the backend once
    Backend {
        #[arg(short, long)]
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Greet { name, count } => {
            let (mut ok, mut failed, mut other) = (0u32, 0u32, 0u32);
            for _ in 0..count {
                let res = client
                    .get(format!("{}/greeting", cli.url.trim_end_matches('/')))
                    .query(&[("name", name.as_str())])
                    .send()
                    .await?;
                match res.status() {
                    StatusCode::OK => ok += 1,
                    StatusCode::INTERNAL_SERVER_ERROR => failed += 1,
                    _ => other += 1,
                }
                print_response(res).await?;
            }
            println!("200: {}  500: {}  other: {}", ok, failed, other);
        }
        Commands::Backend { id } => {
            let res = client
                .get(format!("{}/backend", cli.backend_url.trim_end_matches('/')))
                .query(&[("id", id)])
                .send()
                .await?;
            let status = res.status();
            println!("{} {}", status.as_u16(), res.text().await?);
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{} {}", status.as_u16(), serde_json::to_string(&json)?),
        Err(_) => println!("{} {}", status.as_u16(), text),
    }
    Ok(())
}
