//! Page snapshot acquisition.
//!
//! The browser and rendering machinery live outside this crate. A rendering
//! sidecar serves the current page as a JSON element tree; [`HttpSnapshotSource`]
//! fetches and decodes one per call. Each snapshot is an owned value, so the
//! resource is released as soon as the tick drops it, whatever the outcome.

use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::prelude::Result;
use crate::req::RenderClient;
use crate::tracker::config::SourceConfig;
use crate::tracker::logging::targets;
use crate::{Error, PageSnapshot, SnapshotError};

/// Something that can produce a page snapshot on demand.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Acquire the current page. Called at most once per tick.
    async fn acquire(&self) -> Result<PageSnapshot>;

    /// Release anything held for the process lifetime.
    async fn shutdown(&self) {}
}

/// Snapshot source backed by the rendering sidecar.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: RenderClient,
}

impl HttpSnapshotSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = RenderClient::new(config.render_url.clone(), config.snapshot_timeout())?;
        Ok(Self { client })
    }

    /// Build the source and check the sidecar once.
    ///
    /// Transport, HTTP and timeout failures are startup failures: the tracker
    /// cannot run without its rendering collaborator. A reachable sidecar
    /// serving a page that does not decode or has no content yet is accepted
    /// with a warning; the poll loop retries it every tick.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let source = Self::new(config).map_err(|e| Error::Startup(e.to_string()))?;
        match source.acquire().await {
            Ok(_) => {
                info!(target: targets::SOURCE, url = %config.render_url, "Rendering sidecar reachable");
            }
            Err(Error::Snapshot(
                e @ (SnapshotError::MissingStructure(_) | SnapshotError::Decode(_)),
            )) => {
                warn!(
                    target: targets::SOURCE,
                    url = %config.render_url,
                    error = %e,
                    "Rendering sidecar reachable, page not rendered yet"
                );
            }
            Err(e) => {
                return Err(Error::Startup(format!(
                    "rendering sidecar at {} unavailable: {e}",
                    config.render_url
                )));
            }
        }
        Ok(source)
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn acquire(&self) -> Result<PageSnapshot> {
        let started = Instant::now();
        let body = self.client.get().await?;
        let snapshot = PageSnapshot::from_json(&body)?;
        debug!(
            target: targets::SOURCE,
            url = %self.client.url(),
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Snapshot acquired"
        );
        Ok(snapshot)
    }

    async fn shutdown(&self) {
        info!(target: targets::SOURCE, "Snapshot source released");
    }
}
