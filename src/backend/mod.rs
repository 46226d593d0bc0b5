pub mod envelope;
pub mod realtime;
pub mod resolver;
pub mod rest;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BackendKind, TodoConfig};
use crate::core::todo::Todo;
use crate::error::Result;
use realtime::{MemoryCollection, RealtimeBackend};
use resolver::{EndpointResolver, HttpProber, ResolvedEndpoint};
use rest::RestBackend;

pub use realtime::Subscription;

/// One way of storing todos. The controller does not care which.
#[async_trait]
pub trait TodoBackend: Send + Sync {
    /// Where this backend lives, for messages.
    fn describe(&self) -> String;

    async fn list(&self) -> Result<Vec<Todo>>;
    async fn create(&self, text: &str) -> Result<()>;
    async fn update(&self, id: &str, text: &str) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;

    /// Backends that push changes return a live view here.
    fn subscribe(&self) -> Option<Subscription> {
        None
    }
}

/// Build the backend the configuration asks for. For `auto` this probes
/// for a local server first and fails if none is found, before any CRUD call.
pub async fn connect(config: &TodoConfig, override_url: Option<&str>) -> Result<Box<dyn TodoBackend>> {
    let override_url = override_url.map(str::trim).filter(|u| !u.is_empty());

    match config.backend {
        BackendKind::Realtime => {
            let collection = Arc::new(MemoryCollection::open(TodoConfig::realtime_store_path()));
            Ok(Box::new(RealtimeBackend::new(collection)))
        }
        BackendKind::Auto if override_url.is_none() => {
            let endpoint = discover(config).await?;
            log::info!("Resolved endpoint: {}", endpoint.url());
            Ok(Box::new(RestBackend::new(endpoint)?))
        }
        _ => {
            let url = config.rest_url(override_url);
            log::info!("Using {} backend: {}", config.backend.as_str(), url);
            Ok(Box::new(RestBackend::new(ResolvedEndpoint::fixed(url))?))
        }
    }
}

/// Run the endpoint resolver with the configured probe settings.
pub async fn discover(config: &TodoConfig) -> Result<ResolvedEndpoint> {
    let prober = HttpProber::new(config.probe.timeout())?;
    EndpointResolver::new(prober, &config.probe).resolve().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HOSTED_API_URL, ProbeSettings};
    use crate::error::TodoError;
    use crate::test_http::closed_port;

    #[tokio::test]
    async fn hosted_by_default() {
        let backend = connect(&TodoConfig::default(), None).await.unwrap();
        assert_eq!(backend.describe(), HOSTED_API_URL);
        assert!(backend.subscribe().is_none());
    }

    #[tokio::test]
    async fn override_skips_discovery() {
        let config = TodoConfig {
            backend: BackendKind::Auto,
            ..Default::default()
        };
        let backend = connect(&config, Some("http://localhost:4321/api/todos"))
            .await
            .unwrap();
        assert_eq!(backend.describe(), "http://localhost:4321/api/todos");
    }

    #[tokio::test]
    async fn realtime_backend_is_live() {
        let config = TodoConfig {
            backend: BackendKind::Realtime,
            ..Default::default()
        };
        let backend = connect(&config, None).await.unwrap();
        assert!(backend.subscribe().is_some());
    }

    #[tokio::test]
    async fn auto_fails_before_any_crud_when_nothing_answers() {
        let config = TodoConfig {
            backend: BackendKind::Auto,
            probe: ProbeSettings {
                host: "127.0.0.1".into(),
                ports: vec![closed_port().await, closed_port().await],
                timeout_ms: 500,
                ..Default::default()
            },
            ..Default::default()
        };
        let result = connect(&config, None).await;
        assert!(matches!(result, Err(TodoError::Connectivity(_))));
    }
}
