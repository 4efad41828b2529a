use anyhow::Result;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Client;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::info;

use notification_archive::generator::{self, GeneratorConfig, RetryPolicy};
use notification_archive::logging;

/// Generates synthetic notifications and posts them to a running server.
#[derive(Parser, Debug)]
#[command(name = "load-test-data", version, about)]
struct Cli {
    /// Number of days before today to generate notifications
    #[arg(long, default_value_t = 14)]
    days_before: i64,

    /// Number of days after today to generate notifications
    #[arg(long, default_value_t = 14)]
    days_after: i64,

    /// Minimum number of notifications per day
    #[arg(long, default_value_t = 2)]
    min_per_day: u32,

    /// Maximum number of notifications per day
    #[arg(long, default_value_t = 5)]
    max_per_day: u32,

    /// Delay between notifications in milliseconds
    #[arg(long = "delay", default_value_t = 500)]
    delay_ms: u64,

    /// Server URL
    #[arg(long = "server", env = "SERVER_URL", default_value = "http://localhost:8080")]
    server_url: String,

    /// Comma-separated list of devices to generate notifications for
    #[arg(long, value_delimiter = ',', default_value = "phone1,phone2,tablet1")]
    devices: Vec<String>,

    /// Seed for reproducible batches
    #[arg(long)]
    seed: Option<u64>,
}

impl From<Cli> for GeneratorConfig {
    fn from(cli: Cli) -> Self {
        Self {
            days_before: cli.days_before,
            days_after: cli.days_after,
            min_per_day: cli.min_per_day,
            max_per_day: cli.max_per_day,
            delay: Duration::from_millis(cli.delay_ms),
            server_url: cli.server_url,
            devices: cli.devices,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::setup_logging();

    let cli = Cli::parse();
    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let config = GeneratorConfig::from(cli);
    config.validate()?;

    let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

    info!("Waiting for server at {} to be ready...", config.server_url);
    generator::wait_for_server(&client, &config.server_url, 10, Duration::from_secs(1)).await?;

    let batch = generator::generate(&config, OffsetDateTime::now_utc(), &mut rng);
    let batch = generator::shuffled(batch, &mut rng);
    info!(count = batch.len(), devices = ?config.devices, "Generated notifications");

    let sent = generator::send_all(&client, &config, &batch, &RetryPolicy::default()).await?;
    info!(sent, "Test data generation complete");
    Ok(())
}
