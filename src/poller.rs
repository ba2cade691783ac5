//! Polling loops that feed judge records into a delivery channel.
//!
//! Each loop owns one resource kind and runs strictly sequentially:
//! fetch, deliver, sleep, repeat. A full channel blocks the loop at the
//! send, so a slow consumer only slows down its own resource.
//!
//! The very first fetch of a loop must succeed. Failing it almost always
//! means a wrong URL or bad credentials, so the loop returns
//! [`PollError::FirstContact`] and the caller is expected to exit. Every
//! later failure is logged and retried after the usual interval.

use std::collections::HashSet;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::client::{Fetch, FetchError};
use crate::endpoints::ResourceKind;
use crate::types::Identified;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("first fetch of {kind} failed: {source}")]
    FirstContact {
        kind: ResourceKind,
        #[source]
        source: FetchError,
    },
}

/// How decoded payloads turn into deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollMode {
    /// The endpoint returns one object; deliver it on every cycle.
    Replace,
    /// The endpoint returns a list; deliver only records with unseen ids.
    #[default]
    NewRecords,
}

/// Ids already delivered by one list-mode loop.
///
/// Lives as long as the loop and only ever grows.
#[derive(Debug, Default, Clone)]
pub struct SeenIds {
    ids: HashSet<i64>,
}

impl SeenIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` seen. Returns `true` if it was not seen before.
    pub fn admit(&mut self, id: i64) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Keep the records whose id is new, in their original order, and mark
    /// them seen.
    pub fn fresh_records<T: Identified>(&mut self, records: Vec<T>) -> Vec<T> {
        records
            .into_iter()
            .filter(|record| self.admit(record.id()))
            .collect()
    }
}

/// Poll `kind` forever, sending each decoded object to `sink`.
///
/// Delivers on every successful cycle, whether or not the object changed.
/// Returns `Ok(())` only once the receiving side of `sink` is gone.
pub async fn poll_replace<F, T>(
    fetcher: &F,
    kind: ResourceKind,
    interval: Duration,
    sink: mpsc::Sender<T>,
) -> Result<(), PollError>
where
    F: Fetch,
    T: DeserializeOwned + Send + 'static,
{
    info!(%kind, target = %fetcher.target(kind), "polling (replace mode)");
    run(fetcher, kind, interval, &sink, |record: T| vec![record]).await
}

/// Poll list endpoint `kind` forever, sending each record the first time its
/// id appears.
///
/// Records already delivered by this loop are dropped even if their content
/// changed. Returns `Ok(())` only once the receiving side of `sink` is gone.
pub async fn poll_new_records<F, T>(
    fetcher: &F,
    kind: ResourceKind,
    interval: Duration,
    sink: mpsc::Sender<T>,
) -> Result<(), PollError>
where
    F: Fetch,
    T: Identified + DeserializeOwned + Send + 'static,
{
    info!(%kind, target = %fetcher.target(kind), "polling (new records mode)");
    let mut seen = SeenIds::new();
    run(fetcher, kind, interval, &sink, |records: Vec<T>| {
        let total = records.len();
        let fresh = seen.fresh_records(records);
        debug!(%kind, total, new = fresh.len(), seen = seen.len(), "diffed list");
        fresh
    })
    .await
}

/// Runtime-selected variant of [`poll_replace`] / [`poll_new_records`].
pub async fn poll_into<F, T>(
    fetcher: &F,
    sink: mpsc::Sender<T>,
    kind: ResourceKind,
    interval: Duration,
    mode: PollMode,
) -> Result<(), PollError>
where
    F: Fetch,
    T: Identified + DeserializeOwned + Send + 'static,
{
    match mode {
        PollMode::Replace => poll_replace(fetcher, kind, interval, sink).await,
        PollMode::NewRecords => poll_new_records(fetcher, kind, interval, sink).await,
    }
}

async fn run<F, P, T>(
    fetcher: &F,
    kind: ResourceKind,
    interval: Duration,
    sink: &mpsc::Sender<T>,
    mut accept: impl FnMut(P) -> Vec<T>,
) -> Result<(), PollError>
where
    F: Fetch,
    P: DeserializeOwned + Send + 'static,
{
    let mut first = true;
    loop {
        if sink.is_closed() {
            info!(%kind, "delivery channel closed, stopping");
            return Ok(());
        }

        let fetched: Result<P, FetchError> = fetcher.fetch_json(kind).await;
        match fetched {
            Ok(payload) => {
                for record in accept(payload) {
                    if sink.send(record).await.is_err() {
                        info!(%kind, "delivery channel closed, stopping");
                        return Ok(());
                    }
                }
            }
            Err(source) if first => {
                error!(%kind, "error while fetching {}: {source}", source.url());
                return Err(PollError::FirstContact { kind, source });
            }
            Err(e) => warn!(%kind, "{e}"),
        }

        first = false;
        tokio::time::sleep(interval).await;
    }
}
