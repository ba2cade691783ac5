use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use judge_feed::config::{AppConfig, CONFIG_PATH};
use judge_feed::types::{Category, Contest, JudgeConfig, Judging, Problem, Submission, Team};
use judge_feed::{
    DELIVERY_CHANNEL_CAPACITY, Identified, JudgeClient, PollError, PollMode, ResourceKind,
    poll_new_records, poll_replace, reporter,
};

#[derive(Parser)]
#[command(name = "judge-feed", about = "Stream new judge records to stdout as JSON lines")]
struct Args {
    /// Config file to load
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Resource to watch, e.g. `judgings` or `contests:replace` (repeatable)
    #[arg(long = "watch", value_parser = parse_watch, required = true)]
    watches: Vec<Watch>,

    /// Contest id to scope submissions, judgings and problems to
    #[arg(long)]
    contest_id: Option<i64>,

    /// Skip TLS certificate verification (unsafe)
    #[arg(long)]
    insecure: bool,

    /// Keep the last raw response of every endpoint under this directory
    #[arg(long)]
    archive_dir: Option<PathBuf>,

    /// Seconds between polls of the same resource
    #[arg(long)]
    interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct Watch {
    kind: ResourceKind,
    mode: PollMode,
}

/// `<kind>[:replace|:new]`. The config endpoint is a single object and
/// defaults to replace mode; everything else defaults to new records.
fn parse_watch(s: &str) -> Result<Watch, String> {
    let (kind, mode) = match s.split_once(':') {
        Some((kind, mode)) => (kind, Some(mode)),
        None => (s, None),
    };
    let kind = ResourceKind::from_str(kind, true)?;
    let mode = match mode {
        None if kind == ResourceKind::Configuration => PollMode::Replace,
        None | Some("new") => PollMode::NewRecords,
        Some("replace") => PollMode::Replace,
        Some(other) => return Err(format!("unknown mode `{other}` (expected replace or new)")),
    };
    if kind == ResourceKind::Configuration && mode != PollMode::Replace {
        return Err("config is a single object and can only be watched in replace mode".into());
    }
    Ok(Watch { kind, mode })
}

/// Each resource may be watched once: two loops on one endpoint would
/// double every delivery and race on its archive file.
fn ensure_unique(watches: &[Watch]) -> Result<()> {
    let mut seen = HashSet::new();
    for watch in watches {
        if !seen.insert(watch.kind) {
            bail!("`{}` is watched more than once", watch.kind);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();
    ensure_unique(&args.watches)?;

    let mut config = AppConfig::load(&args.config)?;
    config.apply_env_overrides();
    info!("Loaded config from {}", args.config.display());

    if args.insecure {
        config.judge.insecure = true;
    }
    if let Some(dir) = args.archive_dir {
        config.settings.archive_dir = Some(dir);
    }
    if let Some(secs) = args.interval_secs {
        config.settings.poll_interval_secs = secs;
    }
    if config.judge.username.is_empty() {
        warn!("No username configured; requests will likely be rejected");
    }

    let mut client =
        JudgeClient::new(config.client_config()).context("failed to set up judge client")?;
    match args.contest_id.or(config.settings.contest_id) {
        Some(cid) => {
            client.inject_contest_id(cid);
            info!("Bound to contest {cid}");
        }
        None => warn!("No contest id set; submissions, judgings and problems span all contests"),
    }
    // Targets are read-only from here on.
    let client = Arc::new(client);
    let interval = config.poll_interval();

    info!(
        "Starting {} poller(s) against {} (interval: {}s). Press Ctrl+C to stop.",
        args.watches.len(),
        client.registry().base(),
        interval.as_secs(),
    );

    let mut loops = JoinSet::new();
    for watch in args.watches.iter().copied() {
        let client = client.clone();
        match watch.kind {
            ResourceKind::Judgings => {
                spawn_watch::<Judging>(&mut loops, client, watch, interval)
            }
            ResourceKind::Submissions => {
                spawn_watch::<Submission>(&mut loops, client, watch, interval)
            }
            ResourceKind::Contests => {
                spawn_watch::<Contest>(&mut loops, client, watch, interval)
            }
            ResourceKind::Teams => spawn_watch::<Team>(&mut loops, client, watch, interval),
            ResourceKind::Problems => {
                spawn_watch::<Problem>(&mut loops, client, watch, interval)
            }
            ResourceKind::Categories => {
                spawn_watch::<Category>(&mut loops, client, watch, interval)
            }
            ResourceKind::Configuration => {
                let (tx, rx) = mpsc::channel::<JudgeConfig>(DELIVERY_CHANNEL_CAPACITY);
                spawn_reporter(rx, watch.kind);
                loops.spawn(async move {
                    poll_replace(client.as_ref(), watch.kind, interval, tx).await
                });
            }
        }
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                loops.abort_all();
                break;
            }
            joined = loops.join_next() => {
                match joined {
                    None => break,
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(PollError::FirstContact { kind, source }))) => {
                        return Err(source)
                            .with_context(|| format!("could not reach {kind} endpoint"));
                    }
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => return Err(e).context("poller task panicked"),
                }
            }
        }
    }

    Ok(())
}

fn spawn_watch<T>(
    loops: &mut JoinSet<Result<(), PollError>>,
    client: Arc<JudgeClient>,
    watch: Watch,
    interval: std::time::Duration,
) where
    T: Identified + DeserializeOwned + Serialize + Send + 'static,
{
    match watch.mode {
        PollMode::NewRecords => {
            let (tx, rx) = mpsc::channel::<T>(DELIVERY_CHANNEL_CAPACITY);
            spawn_reporter(rx, watch.kind);
            loops.spawn(async move {
                poll_new_records(client.as_ref(), watch.kind, interval, tx).await
            });
        }
        // Whole list, every cycle.
        PollMode::Replace => {
            let (tx, rx) = mpsc::channel::<Vec<T>>(DELIVERY_CHANNEL_CAPACITY);
            spawn_reporter(rx, watch.kind);
            loops.spawn(async move { poll_replace(client.as_ref(), watch.kind, interval, tx).await });
        }
    }
}

fn spawn_reporter<T>(mut rx: mpsc::Receiver<T>, kind: ResourceKind)
where
    T: Serialize + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            reporter::report_delivery(kind, &record);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_defaults() {
        let w = parse_watch("judgings").unwrap();
        assert_eq!(w.kind, ResourceKind::Judgings);
        assert_eq!(w.mode, PollMode::NewRecords);

        let w = parse_watch("config").unwrap();
        assert_eq!(w.kind, ResourceKind::Configuration);
        assert_eq!(w.mode, PollMode::Replace);
    }

    #[test]
    fn watch_explicit_mode() {
        let w = parse_watch("Contests:replace").unwrap();
        assert_eq!(w.kind, ResourceKind::Contests);
        assert_eq!(w.mode, PollMode::Replace);
    }

    #[test]
    fn watch_rejects_bad_input() {
        assert!(parse_watch("scoreboard").is_err());
        assert!(parse_watch("teams:sometimes").is_err());
        assert!(parse_watch("config:new").is_err());
    }

    #[test]
    fn repeated_kind_is_rejected() {
        let watches = [
            parse_watch("judgings").unwrap(),
            parse_watch("teams").unwrap(),
            parse_watch("judgings:replace").unwrap(),
        ];
        let err = ensure_unique(&watches).unwrap_err();
        assert!(err.to_string().contains("judgings"), "{err}");

        assert!(ensure_unique(&watches[..2]).is_ok());
    }
}
