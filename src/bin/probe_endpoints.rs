//! Probe: judge API endpoints
//!
//! Fetches every resource once with the configured credentials and documents:
//! - Resolved target URL
//! - Latency
//! - Response shape (list length / object keys)
//! - Whether list records carry a numeric `id` usable for dedup

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use serde_json::Value;

use judge_feed::config::{AppConfig, CONFIG_PATH};
use judge_feed::{Fetch, JudgeClient, ResourceKind};

#[derive(Parser)]
#[command(name = "probe-endpoints", about = "Fetch every judge endpoint once and describe it")]
struct Args {
    /// Config file to load
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Contest id to scope submissions, judgings and problems to
    #[arg(long)]
    contest_id: Option<i64>,

    /// Print the first record of every list in full
    #[arg(long)]
    sample: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load(&args.config)?;
    config.apply_env_overrides();

    let mut client = JudgeClient::new(config.client_config())?;
    if let Some(cid) = args.contest_id.or(config.settings.contest_id) {
        client.inject_contest_id(cid);
    }

    println!("=== Probe: judge endpoints ===");
    println!("Base: {}", client.registry().base());
    println!();

    let mut failures = 0;
    for kind in ResourceKind::ALL {
        println!("--- {kind} ---");
        println!("Target: {}", client.target(kind));

        let start = Instant::now();
        let result = client.fetch_json::<Value>(kind).await;
        let latency = start.elapsed();
        println!("Latency: {latency:?}");

        match result {
            Ok(Value::Array(records)) => {
                println!("List of {} record(s)", records.len());
                let with_id = records
                    .iter()
                    .filter(|r| r.get("id").is_some_and(Value::is_i64))
                    .count();
                println!("  Records with numeric id: {with_id}");
                if let Some(first) = records.first() {
                    if let Some(obj) = first.as_object() {
                        println!("  Fields:");
                        for key in obj.keys() {
                            println!("    - {key}");
                        }
                    }
                    if args.sample {
                        println!("  Sample:\n{}", serde_json::to_string_pretty(first)?);
                    }
                }
            }
            Ok(Value::Object(obj)) => {
                println!("Object with {} key(s)", obj.len());
                for key in obj.keys() {
                    println!("  - {key}");
                }
            }
            Ok(other) => println!("Unexpected scalar response: {other}"),
            Err(e) => {
                failures += 1;
                println!("FAILED: {e}");
            }
        }
        println!();
    }

    println!("=== Probe complete ({failures} failure(s)) ===");
    if failures > 0 {
        anyhow::bail!("{failures} endpoint(s) failed");
    }
    Ok(())
}
