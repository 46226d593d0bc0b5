//! Locates a local development server by probing candidate ports and paths.
//!
//! This is a best-effort heuristic: anything on a candidate port that looks
//! like a permissive web server is taken to be the API. Only one known
//! collider (the macOS AirPlay receiver on port 5000) is filtered out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, SERVER};
use reqwest::{Client, StatusCode, Url};

use crate::config::ProbeSettings;
use crate::error::{Result, TodoError};

/// `Server` header prefixes of services that squat on candidate ports.
const NON_TARGET_SERVERS: &[&str] = &["AirTunes"];

/// The parts of a probe response the classifier looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: StatusCode,
    pub server: Option<String>,
    pub allows_cross_origin: bool,
}

impl ProbeResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            server: None,
            allows_cross_origin: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(String),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Is something usable listening on this port?
pub fn classify_base(resp: &ProbeResponse) -> Verdict {
    if let Some(server) = resp.server.as_deref() {
        if let Some(name) = NON_TARGET_SERVERS.iter().find(|n| server.starts_with(*n)) {
            return Verdict::Reject(format!("{} is not a todo backend", name));
        }
    }
    // 404 on the bare root still means a server is up, it just has no route there.
    if resp.allows_cross_origin || resp.status.is_success() || resp.status == StatusCode::NOT_FOUND
    {
        Verdict::Accept
    } else {
        Verdict::Reject(format!("status {}", resp.status))
    }
}

/// Does the locked base answer on this path?
pub fn classify_path(resp: &ProbeResponse) -> Verdict {
    if resp.status.is_success() || resp.status == StatusCode::NOT_FOUND {
        Verdict::Accept
    } else {
        Verdict::Reject(format!("status {}", resp.status))
    }
}

#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ProbeResponse>;
}

/// Probes over HTTP with a per-request timeout.
pub struct HttpProber {
    http: Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        // Candidates are local; a system proxy would only get in the way.
        let http = Client::builder().timeout(timeout).no_proxy().build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> Result<ProbeResponse> {
        let resp = self.http.get(url).send().await?;
        let headers = resp.headers();
        Ok(ProbeResponse {
            status: resp.status(),
            server: headers
                .get(SERVER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            allows_cross_origin: headers.contains_key(ACCESS_CONTROL_ALLOW_ORIGIN),
        })
    }
}

/// A `scheme://host:port` that passed the base probe. Only the resolver
/// hands these out, so path probing cannot start before a port is locked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedBase(String);

impl LockedBase {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The endpoint every CRUD call for the session goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub base: String,
    pub path: String,
}

impl ResolvedEndpoint {
    /// A known URL that needs no probing.
    pub fn fixed(url: impl Into<String>) -> Self {
        Self {
            base: url.into().trim_end_matches('/').to_string(),
            path: String::new(),
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base, self.path)
    }

    /// The collection URL with `id` appended as one escaped path segment.
    pub fn item_url(&self, id: &str) -> Result<Url> {
        let collection = self.url();
        let mut url = Url::parse(&collection)
            .map_err(|e| TodoError::Malformed(format!("bad endpoint {}: {}", collection, e)))?;
        url.path_segments_mut()
            .map_err(|_| TodoError::Malformed(format!("{} cannot take a record id", collection)))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }
}

/// One row of a [`EndpointResolver::survey`].
#[derive(Debug)]
pub struct SurveyEntry {
    pub port: u16,
    pub url: String,
    pub outcome: Result<Verdict>,
}

pub struct EndpointResolver<P> {
    prober: P,
    host: String,
    ports: Vec<u16>,
    paths: Vec<String>,
    timeout: Duration,
}

impl<P: Prober> EndpointResolver<P> {
    pub fn new(prober: P, settings: &ProbeSettings) -> Self {
        Self {
            prober,
            host: settings.host.clone(),
            ports: settings.ports.clone(),
            paths: settings.paths.clone(),
            timeout: settings.timeout(),
        }
    }

    fn base_url(&self, port: u16) -> String {
        format!("http://{}:{}", self.host, port)
    }

    /// Probe once, bounded by the timeout whatever the prober does.
    async fn probe(&self, url: &str) -> Result<ProbeResponse> {
        match tokio::time::timeout(self.timeout, self.prober.probe(url)).await {
            Ok(result) => result,
            Err(_) => Err(TodoError::Connectivity(format!(
                "probe of {} timed out after {} ms",
                url,
                self.timeout.as_millis()
            ))),
        }
    }

    /// Try candidate ports in order and lock the first acceptable one.
    pub async fn resolve_base(&self) -> Result<LockedBase> {
        for &port in &self.ports {
            let url = self.base_url(port);
            match self.probe(&url).await {
                Ok(resp) => match classify_base(&resp) {
                    Verdict::Accept => {
                        log::info!("Backend found at {} (status {})", url, resp.status);
                        return Ok(LockedBase(url));
                    }
                    Verdict::Reject(reason) => {
                        log::debug!("Skipping {}: {}", url, reason);
                    }
                },
                Err(e) => log::debug!("No answer from {}: {}", url, e),
            }
        }
        Err(TodoError::Connectivity(format!(
            "no backend answered on {} ports {:?}",
            self.host, self.ports
        )))
    }

    /// Try candidate paths in order against a locked base.
    pub async fn resolve_path(&self, base: &LockedBase) -> Result<String> {
        for path in &self.paths {
            let url = format!("{}{}", base.as_str(), path);
            match self.probe(&url).await {
                Ok(resp) => match classify_path(&resp) {
                    Verdict::Accept => {
                        log::info!("Using API path {}", path);
                        return Ok(path.clone());
                    }
                    Verdict::Reject(reason) => log::debug!("Skipping {}: {}", url, reason),
                },
                Err(e) => log::debug!("No answer from {}: {}", url, e),
            }
        }
        Err(TodoError::Connectivity(format!(
            "{} answered but none of the paths {:?} did",
            base.as_str(),
            self.paths
        )))
    }

    pub async fn resolve(&self) -> Result<ResolvedEndpoint> {
        let base = self.resolve_base().await?;
        let path = self.resolve_path(&base).await?;
        Ok(ResolvedEndpoint {
            base: base.0,
            path,
        })
    }

    /// Probe every candidate port without stopping at the first hit.
    pub async fn survey(&self) -> Vec<SurveyEntry> {
        let mut entries = Vec::with_capacity(self.ports.len());
        for &port in &self.ports {
            let url = self.base_url(port);
            let outcome = self.probe(&url).await.map(|resp| classify_base(&resp));
            entries.push(SurveyEntry { port, url, outcome });
        }
        entries
    }
}
