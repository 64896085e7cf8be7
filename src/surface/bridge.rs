use std::{
    collections::HashSet,
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, bail, Context, Result};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

/// One widget as seen by a single discover-and-read pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScannedWidget {
    pub widget_id: String,
    pub widget_type: String,
    /// Marker payload; `None` when the widget was discovered but not read
    /// (unmounted mid-render, or deliberately skipped).
    pub markers: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageTier {
    pub name: String,
    pub entries: usize,
}

/// Entry counts across the persistent storage tiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageProbe {
    pub tiers: Vec<StorageTier>,
}

impl StorageProbe {
    pub fn total_entries(&self) -> usize {
        self.tiers.iter().map(|tier| tier.entries).sum()
    }
}

/// The rendered application, driven from outside.
///
/// Implementations wrap a browser automation session. All methods block; the
/// bridge runs them on a dedicated thread.
pub trait PageSurface: Send + 'static {
    /// Discover up to `max_widgets` visible widgets and read markers for every
    /// one not in `skip_reads`, in a single round trip.
    fn scan(
        &mut self,
        max_widgets: usize,
        skip_reads: &HashSet<String>,
    ) -> Result<Vec<ScannedWidget>>;
    fn navigate(&mut self, url: &str) -> Result<()>;
    /// Drop every persisted cache tier and in-memory cache flag.
    fn clear_persistent_state(&mut self) -> Result<()>;
    fn probe_storage(&mut self) -> Result<StorageProbe>;
    /// Stream request URLs observed since the last navigation.
    fn stream_requests(&mut self) -> Result<Vec<String>>;
    fn current_url(&mut self) -> Result<String>;
    fn click(&mut self, selector: &str) -> Result<()>;
    fn go_back(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceRequest {
    Scan {
        max_widgets: usize,
        skip_reads: HashSet<String>,
    },
    Navigate {
        url: String,
    },
    ClearPersistentState,
    ProbeStorage,
    StreamRequests,
    CurrentUrl,
    Click {
        selector: String,
    },
    GoBack,
}

impl SurfaceRequest {
    fn name(&self) -> &'static str {
        match self {
            SurfaceRequest::Scan { .. } => "scan",
            SurfaceRequest::Navigate { .. } => "navigate",
            SurfaceRequest::ClearPersistentState => "clear_persistent_state",
            SurfaceRequest::ProbeStorage => "probe_storage",
            SurfaceRequest::StreamRequests => "stream_requests",
            SurfaceRequest::CurrentUrl => "current_url",
            SurfaceRequest::Click { .. } => "click",
            SurfaceRequest::GoBack => "go_back",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceResponse {
    Widgets(Vec<ScannedWidget>),
    Storage(StorageProbe),
    Urls(Vec<String>),
    Url(String),
    Done,
}

type Reply = oneshot::Sender<Result<SurfaceResponse>>;

enum SurfaceCommand {
    Request(SurfaceRequest, Reply),
    Shutdown,
}

struct SurfaceInner {
    sender: mpsc::Sender<SurfaceCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for SurfaceInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(SurfaceCommand::Shutdown) {
                error!("Failed to send shutdown to surface thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join surface thread: {join_err:?}");
            }
        }
    }
}

fn dispatch(surface: &mut dyn PageSurface, request: SurfaceRequest) -> Result<SurfaceResponse> {
    match request {
        SurfaceRequest::Scan {
            max_widgets,
            skip_reads,
        } => surface
            .scan(max_widgets, &skip_reads)
            .map(|mut widgets| {
                widgets.truncate(max_widgets);
                SurfaceResponse::Widgets(widgets)
            }),
        SurfaceRequest::Navigate { url } => surface.navigate(&url).map(|_| SurfaceResponse::Done),
        SurfaceRequest::ClearPersistentState => surface
            .clear_persistent_state()
            .map(|_| SurfaceResponse::Done),
        SurfaceRequest::ProbeStorage => surface.probe_storage().map(SurfaceResponse::Storage),
        SurfaceRequest::StreamRequests => surface.stream_requests().map(SurfaceResponse::Urls),
        SurfaceRequest::CurrentUrl => surface.current_url().map(SurfaceResponse::Url),
        SurfaceRequest::Click { selector } => {
            surface.click(&selector).map(|_| SurfaceResponse::Done)
        }
        SurfaceRequest::GoBack => surface.go_back().map(|_| SurfaceResponse::Done),
    }
}

/// Cloneable handle to a page surface running on its own thread.
///
/// Every request is one message and one reply, so a scan is atomic with
/// respect to the page: discovery and marker reads happen in the same call.
#[derive(Clone)]
pub struct SurfaceHandle {
    inner: Arc<SurfaceInner>,
}

impl SurfaceHandle {
    pub fn spawn<S: PageSurface>(surface: S) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<SurfaceCommand>();

        let worker = thread::Builder::new()
            .name("widgetwatch-surface".into())
            .spawn(move || {
                let mut surface = surface;
                while let Ok(command) = command_rx.recv() {
                    match command {
                        SurfaceCommand::Request(request, reply) => {
                            let result = dispatch(&mut surface, request);
                            if reply.send(result).is_err() {
                                error!("Surface caller dropped before receiving result");
                            }
                        }
                        SurfaceCommand::Shutdown => break,
                    }
                }

                info!("Surface thread shutting down");
            })
            .with_context(|| "failed to spawn surface worker thread")?;

        Ok(Self {
            inner: Arc::new(SurfaceInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    pub async fn request(&self, request: SurfaceRequest) -> Result<SurfaceResponse> {
        let name = request.name();
        let (reply_tx, reply_rx) = oneshot::channel();

        self.inner
            .sender
            .send(SurfaceCommand::Request(request, reply_tx))
            .map_err(|err| anyhow!("failed to send {name} to surface thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("surface thread terminated during {name}"))?
            .with_context(|| format!("surface {name} failed"))
    }

    pub async fn scan(
        &self,
        max_widgets: usize,
        skip_reads: HashSet<String>,
    ) -> Result<Vec<ScannedWidget>> {
        match self
            .request(SurfaceRequest::Scan {
                max_widgets,
                skip_reads,
            })
            .await?
        {
            SurfaceResponse::Widgets(widgets) => Ok(widgets),
            other => bail!("unexpected scan response: {other:?}"),
        }
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.expect_done(SurfaceRequest::Navigate { url: url.into() })
            .await
    }

    pub async fn clear_persistent_state(&self) -> Result<()> {
        self.expect_done(SurfaceRequest::ClearPersistentState).await
    }

    pub async fn probe_storage(&self) -> Result<StorageProbe> {
        match self.request(SurfaceRequest::ProbeStorage).await? {
            SurfaceResponse::Storage(probe) => Ok(probe),
            other => bail!("unexpected storage probe response: {other:?}"),
        }
    }

    pub async fn stream_requests(&self) -> Result<Vec<String>> {
        match self.request(SurfaceRequest::StreamRequests).await? {
            SurfaceResponse::Urls(urls) => Ok(urls),
            other => bail!("unexpected stream log response: {other:?}"),
        }
    }

    pub async fn current_url(&self) -> Result<String> {
        match self.request(SurfaceRequest::CurrentUrl).await? {
            SurfaceResponse::Url(url) => Ok(url),
            other => bail!("unexpected url response: {other:?}"),
        }
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        self.expect_done(SurfaceRequest::Click {
            selector: selector.into(),
        })
        .await
    }

    pub async fn go_back(&self) -> Result<()> {
        self.expect_done(SurfaceRequest::GoBack).await
    }

    async fn expect_done(&self, request: SurfaceRequest) -> Result<()> {
        match self.request(request).await? {
            SurfaceResponse::Done => Ok(()),
            other => bail!("unexpected response: {other:?}"),
        }
    }
}
