use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use shared::{
    domain::Todo,
    error::{ApiError, ErrorCode},
    protocol::{ChangeEvent, FeedFrame},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

pub mod reducer;

const FEED_CHANNEL_CAPACITY: usize = 1024;
const VIEW_CHANNEL_CAPACITY: usize = 256;

/// Failures on the view's sync path. Both kinds are logged and swallowed; the
/// view keeps rendering its last-known-good collection.
#[derive(Debug, Error)]
pub enum SyncFailure {
    #[error("initial todo read failed: {0}")]
    Read(anyhow::Error),
    #[error("change notification handling failed: {0}")]
    Notification(String),
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("server url must start with http:// or https:// (got `{0}`)")]
    UnsupportedScheme(String),
    #[error("invalid change feed url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to connect change feed at {url}: {reason}")]
    Connect { url: String, reason: String },
}

/// Backend data service the view depends on. Injected explicitly so tests can
/// substitute a fake for the hosted backend.
#[async_trait]
pub trait TodoService: Send + Sync {
    /// All rows of the `todos` relation, ordered ascending by id.
    async fn fetch_todos(&self) -> Result<Vec<Todo>>;

    /// Live feed of row-level changes. Unsubscribing is dropping the receiver.
    fn subscribe_changes(&self) -> broadcast::Receiver<FeedFrame>;
}

/// The hosted backend: REST for the bulk read, websocket for the change feed.
pub struct RestTodoService {
    http: Client,
    base_url: String,
    feed: broadcast::Sender<FeedFrame>,
    feed_task: Mutex<Option<JoinHandle<()>>>,
}

impl RestTodoService {
    pub fn new(base_url: impl Into<String>) -> Arc<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let (feed, _) = broadcast::channel(FEED_CHANNEL_CAPACITY);
        Arc::new(Self {
            http: Client::new(),
            base_url,
            feed,
            feed_task: Mutex::new(None),
        })
    }

    /// Connects the change-feed websocket and starts forwarding frames to
    /// subscribers. Malformed frames are reported as error frames, not dropped
    /// silently; a close frame or read error ends the forwarder.
    pub async fn start_feed(self: &Arc<Self>) -> Result<(), FeedError> {
        let ws_url = feed_url(&self.base_url)?;
        let (ws_stream, _) =
            connect_async(&ws_url)
                .await
                .map_err(|err| FeedError::Connect {
                    url: ws_url.clone(),
                    reason: err.to_string(),
                })?;
        info!(url = %ws_url, "change feed connected");
        let (_, mut ws_reader) = ws_stream.split();

        let service = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<FeedFrame>(&text) {
                            Ok(frame) => {
                                let _ = service.feed.send(frame);
                            }
                            Err(err) => {
                                warn!(error = %err, raw = %text, "malformed change-feed frame");
                                let _ = service.feed.send(FeedFrame::Error(ApiError::new(
                                    ErrorCode::Validation,
                                    format!("malformed change-feed frame: {err}"),
                                )));
                            }
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "change feed receive failed");
                        break;
                    }
                }
            }
            info!("change feed reader stopped");
        });

        let previous = self.feed_task.lock().await.replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    pub async fn shutdown(&self) {
        if let Some(task) = self.feed_task.lock().await.take() {
            task.abort();
        }
    }
}

fn feed_url(base_url: &str) -> Result<String, FeedError> {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(FeedError::UnsupportedScheme(base_url.to_string()));
    };
    let ws_url = format!("{ws_base}/realtime/todos");
    url::Url::parse(&ws_url).map_err(|err| FeedError::InvalidUrl {
        url: ws_url.clone(),
        reason: err.to_string(),
    })?;
    Ok(ws_url)
}

#[async_trait]
impl TodoService for RestTodoService {
    async fn fetch_todos(&self) -> Result<Vec<Todo>> {
        let url = format!("{}/rest/todos", self.base_url);
        let todos: Vec<Todo> = self
            .http
            .get(&url)
            .query(&[("order", "id.asc")])
            .send()
            .await
            .with_context(|| format!("failed to fetch todos from {url}"))?
            .error_for_status()
            .context("backend rejected todo read")?
            .json()
            .await
            .context("invalid todo list payload")?;
        Ok(todos)
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<FeedFrame> {
        self.feed.subscribe()
    }
}

#[derive(Debug, Clone)]
pub enum ViewEvent {
    /// The full ordered collection after a snapshot replace or an applied
    /// change notification. Renderers redraw the whole list from this.
    ListChanged(Vec<Todo>),
}

struct ViewState {
    todos: Vec<Todo>,
    torn_down: bool,
}

/// Owns the in-memory mirror of the `todos` relation for the lifetime of the
/// view: populates it from one bulk read and patches it per change
/// notification until torn down.
pub struct TodoListView {
    service: Arc<dyn TodoService>,
    inner: Mutex<ViewState>,
    events: broadcast::Sender<ViewEvent>,
    feed_task: Mutex<Option<JoinHandle<()>>>,
}

impl TodoListView {
    pub fn new(service: Arc<dyn TodoService>) -> Arc<Self> {
        let (events, _) = broadcast::channel(VIEW_CHANNEL_CAPACITY);
        Arc::new(Self {
            service,
            inner: Mutex::new(ViewState {
                todos: Vec::new(),
                torn_down: false,
            }),
            events,
            feed_task: Mutex::new(None),
        })
    }

    /// Starts the feed pump, then performs the one-shot read and replaces the
    /// whole collection with the result. A failed read keeps the last-known
    /// collection (initially empty) and is reported through logging only. A
    /// read that completes after `teardown` is discarded.
    pub async fn initialize(self: &Arc<Self>) {
        self.spawn_feed_pump().await;

        match self.service.fetch_todos().await {
            Ok(todos) => {
                let snapshot = {
                    let mut inner = self.inner.lock().await;
                    if inner.torn_down {
                        debug!("discarding initial read that completed after teardown");
                        return;
                    }
                    inner.todos = todos;
                    inner.todos.clone()
                };
                info!(count = snapshot.len(), "initial todo snapshot applied");
                let _ = self.events.send(ViewEvent::ListChanged(snapshot));
            }
            Err(err) => {
                let failure = SyncFailure::Read(err);
                warn!(error = %failure, "keeping last-known todo list");
            }
        }
    }

    async fn spawn_feed_pump(self: &Arc<Self>) {
        let mut guard = self.feed_task.lock().await;
        if guard.is_some() {
            return;
        }
        // Checked while still holding the feed_task guard: a teardown that set
        // the flag before this point is seen here, and one that sets it later
        // blocks on the guard until the task is stored, then aborts it.
        if self.inner.lock().await.torn_down {
            return;
        }

        let mut frames = self.service.subscribe_changes();
        let view = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            loop {
                match frames.recv().await {
                    Ok(FeedFrame::Change(event)) => {
                        view.apply_change_notification(event).await;
                    }
                    Ok(FeedFrame::Error(err)) => {
                        let failure = SyncFailure::Notification(err.to_string());
                        warn!(error = %failure, "change feed reported an error frame");
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        let failure = SyncFailure::Notification(format!(
                            "{skipped} change notifications dropped"
                        ));
                        warn!(error = %failure, "change feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Applies one insert/update/delete notification, in arrival order. No-op
    /// after teardown.
    pub async fn apply_change_notification(&self, event: ChangeEvent) {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            if inner.torn_down {
                return;
            }
            let todos = std::mem::take(&mut inner.todos);
            inner.todos = reducer::apply_change(todos, &event);
            inner.todos.clone()
        };
        debug!(count = snapshot.len(), "applied change notification");
        let _ = self.events.send(ViewEvent::ListChanged(snapshot));
    }

    /// Releases the change-feed subscription. Idempotent and safe to call
    /// before `initialize`; the pump is stopped at most once.
    pub async fn teardown(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.torn_down {
                return;
            }
            inner.torn_down = true;
        }
        if let Some(task) = self.feed_task.lock().await.take() {
            task.abort();
        }
        info!("todo list view torn down");
    }

    pub async fn snapshot(&self) -> Vec<Todo> {
        self.inner.lock().await.todos.clone()
    }

    pub fn subscribe_view_events(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
