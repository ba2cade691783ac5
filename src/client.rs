use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::archive::ArchiveWriter;
use crate::endpoints::{EndpointRegistry, ResourceKind};

/// Basic-auth login for the judge API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to talk to one judge instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://judge.example.org/api/`.
    pub base_url: Url,
    pub credentials: Credentials,
    /// Skip TLS certificate verification. Unsafe; only for test judges.
    pub insecure: bool,
    /// When set, every successfully decoded response is also kept on disk.
    pub archive_dir: Option<PathBuf>,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: Url, credentials: Credentials) -> Self {
        Self {
            base_url,
            credentials,
            insecure: false,
            archive_dir: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid judge URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why a single fetch failed. Archival problems never show up here.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("got HTTP response \"{status}\" while fetching {url}")]
    Status { url: Url, status: StatusCode },
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: Url,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// The endpoint that failed.
    pub fn url(&self) -> &Url {
        match self {
            FetchError::Transport { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Decode { url, .. } => url,
        }
    }
}

/// One request/response cycle against a resource, decoded into `T`.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Where `kind` is fetched from. Used in diagnostics.
    fn target(&self, kind: ResourceKind) -> &Url;

    async fn fetch_json<T>(&self, kind: ResourceKind) -> Result<T, FetchError>
    where
        T: DeserializeOwned + Send + 'static;
}

/// Authenticated judge API client.
///
/// Bind the contest with [`inject_contest_id`](Self::inject_contest_id)
/// before sharing the client between polling loops; targets are read-only
/// afterwards.
#[derive(Debug)]
pub struct JudgeClient {
    http: reqwest::Client,
    credentials: Credentials,
    registry: EndpointRegistry,
    archive_dir: Option<PathBuf>,
}

impl JudgeClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder().timeout(config.request_timeout);
        if config.insecure {
            warn!(
                "YOU ARE NOT VERIFYING CERTIFICATES: TLS verification disabled for {}",
                config.base_url
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let registry = EndpointRegistry::new(&config.base_url)?;
        if let Some(dir) = &config.archive_dir {
            debug!("archiving raw responses under {}", dir.display());
        }

        Ok(Self {
            http: builder.build()?,
            credentials: config.credentials,
            registry,
            archive_dir: config.archive_dir,
        })
    }

    /// Scope submissions, judgings and problems to contest `id`.
    pub fn inject_contest_id(&mut self, id: i64) {
        self.registry.inject_contest_id(id);
        debug!(cid = id, "contest id injected");
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }
}

#[async_trait]
impl Fetch for JudgeClient {
    fn target(&self, kind: ResourceKind) -> &Url {
        self.registry.resolve(kind)
    }

    async fn fetch_json<T>(&self, kind: ResourceKind) -> Result<T, FetchError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.registry.resolve(kind);
        let transport = |source| FetchError::Transport {
            url: url.clone(),
            source,
        };

        let response = self
            .http
            .get(url.clone())
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.clone(),
                status,
            });
        }

        let mut archive = match &self.archive_dir {
            Some(root) => ArchiveWriter::open(root, &self.registry.archive_path(kind)).await,
            None => None,
        };

        // The stream owns the response; it is released on every return below.
        let mut stream = response.bytes_stream();
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(transport)?;
            if let Some(writer) = archive.as_mut() {
                writer.write(&chunk).await;
            }
            body.extend_from_slice(&chunk);
        }
        drop(stream);

        let value = serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url.clone(),
            source,
        })?;
        debug!(%kind, bytes = body.len(), "fetched");

        if let Some(writer) = archive {
            writer.commit().await;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Build a client while capturing everything it logs.
    fn logs_while_building(config: ClientConfig) -> String {
        let buf = LogBuffer::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            JudgeClient::new(config).unwrap();
        });
        buf.contents()
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("jury", "hunter2");
        let printed = format!("{creds:?}");
        assert!(printed.contains("jury"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn client_binds_contest_on_registry() {
        let config = ClientConfig::new(
            Url::parse("https://judge.example.org/api/").unwrap(),
            Credentials::new("u", "p"),
        );
        let mut client = JudgeClient::new(config).unwrap();
        client.inject_contest_id(4);
        assert_eq!(
            client.target(ResourceKind::Judgings).as_str(),
            "https://judge.example.org/api/judgings?cid=4"
        );
        assert_eq!(
            client.target(ResourceKind::Contests).as_str(),
            "https://judge.example.org/api/contests"
        );
    }

    #[test]
    fn insecure_client_warns_about_certificates() {
        let base = Url::parse("https://judge.example.org/api/").unwrap();
        let mut config = ClientConfig::new(base.clone(), Credentials::new("u", "p"));
        config.insecure = true;

        let logs = logs_while_building(config);
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("NOT VERIFYING CERTIFICATES"), "{logs}");
        assert!(logs.contains("judge.example.org"), "{logs}");

        let logs = logs_while_building(ClientConfig::new(base, Credentials::new("u", "p")));
        assert!(!logs.contains("CERTIFICATES"), "{logs}");
    }
}
