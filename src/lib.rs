pub mod archive;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod poller;
pub mod reporter;
pub mod types;

pub use client::{ClientConfig, ClientError, Credentials, Fetch, FetchError, JudgeClient};
pub use endpoints::{EndpointRegistry, ResourceKind};
pub use poller::{PollError, PollMode, SeenIds, poll_into, poll_new_records, poll_replace};
pub use types::Identified;

/// Default polling interval between fetches of the same resource.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Capacity of each loop's delivery channel. A full channel stalls that loop.
pub const DELIVERY_CHANNEL_CAPACITY: usize = 64;
