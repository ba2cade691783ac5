//! setup-judge — First-time setup for the judge feed.
//!
//! Expects `config.toml` to already exist (copied from `config.toml.template`).
//! Verifies the login by fetching the contest list, prints the contests the
//! account can see, and saves the credentials into the existing config file.
//!
//! By default, reads the password interactively (hidden input) to avoid
//! leaking it into shell history. Use `--password` only for scripted/CI use.

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;

use judge_feed::config::{AppConfig, CONFIG_PATH};
use judge_feed::types::Contest;
use judge_feed::{Fetch, JudgeClient, ResourceKind};

#[derive(Parser)]
#[command(
    name = "setup-judge",
    about = "Verify judge credentials, list contests, and save the login to config.toml"
)]
struct Cli {
    /// Judge API username
    #[arg(long)]
    username: String,

    /// Judge API password.
    /// If omitted, reads interactively with hidden input (recommended).
    #[arg(long)]
    password: Option<String>,

    /// Also store this contest id as the default contest
    #[arg(long)]
    contest_id: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = Path::new(CONFIG_PATH);

    // Load existing config
    let mut app_config = AppConfig::load(config_path).with_context(|| {
        format!(
            "{} not found — copy config.toml.template to config.toml first",
            config_path.display()
        )
    })?;

    println!("=== Judge Feed — Setup ===\n");

    // ── Step 1: Read password ──────────────────────────────────────
    let password = match cli.password {
        Some(password) => password,
        None => {
            let password = rpassword::prompt_password(format!("Password for {}: ", cli.username))
                .context("failed to read password")?;
            if password.is_empty() {
                bail!("password cannot be empty");
            }
            password
        }
    };

    app_config.judge.username = cli.username;
    app_config.judge.password = password;

    // ── Step 2: Verify login ───────────────────────────────────────
    println!("Contacting {}...", app_config.judge.base_url);
    let client = JudgeClient::new(app_config.client_config())?;
    let contests: Vec<Contest> = client
        .fetch_json(ResourceKind::Contests)
        .await
        .context("login check failed — verify URL and credentials")?;
    println!("  Login OK, {} contest(s) visible", contests.len());
    for contest in &contests {
        println!("    [{}] {} ({})", contest.id, contest.name, contest.shortname);
    }
    println!();

    if let Some(cid) = cli.contest_id {
        if !contests.iter().any(|c| c.id == cid) {
            bail!("contest {cid} is not visible to this account");
        }
        app_config.settings.contest_id = Some(cid);
    }

    // ── Step 3: Save config ────────────────────────────────────────
    println!("Updating credentials in {}...", config_path.display());
    app_config.save(config_path)?;
    println!("  Config updated successfully");
    println!();

    println!("Next steps:");
    println!("  cargo run --bin judge-feed -- --watch judgings --watch submissions");

    Ok(())
}
