//! Bounded in-memory request history with pub/sub broadcast.
//!
//! The store keeps the most recent captures in arrival order and fans
//! each new entry out to live subscribers. Delivery is at-most-once by
//! design: a subscriber with a full buffer silently misses that event
//! rather than stalling the capture path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Default maximum number of requests to keep
pub const DEFAULT_MAX_REQUESTS: usize = 50;

/// Per-subscriber channel buffer
const SUBSCRIBER_BUFFER: usize = 10;

/// A file extracted from a multipart upload.
///
/// `data` carries a base64 preview and is present only for image parts
/// whose full size fits the image preview cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttachment {
    pub field_name: String,
    pub filename: String,
    pub content_type: String,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// A captured HTTP request, immutable once stored.
///
/// Header names are canonical-cased and unique; values of repeated
/// headers are joined with `,` before storage. The sorted map keeps
/// rendering deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedRequest {
    #[serde(default)]
    pub id: String,
    pub time: DateTime<Utc>,
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub host: String,
    pub proto: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileAttachment>,
}

/// A live listener registered with the store.
///
/// Dropping the receiver (or calling [`Store::unsubscribe`]) ends the
/// subscription; the id ties the two together.
pub struct Subscriber {
    pub id: u64,
    pub rx: mpsc::Receiver<CapturedRequest>,
}

struct StoreInner {
    requests: VecDeque<CapturedRequest>,
    max_size: usize,
    next_subscriber_id: u64,
    subscribers: HashMap<u64, mpsc::Sender<CapturedRequest>>,
}

/// Thread-safe request history shared by the capture handler and the
/// dashboard service.
pub struct Store {
    inner: RwLock<StoreInner>,
}

impl Store {
    /// Create a store holding at most `max_size` requests. A zero size
    /// falls back to [`DEFAULT_MAX_REQUESTS`].
    pub fn new(max_size: usize) -> Self {
        let max_size = if max_size == 0 {
            DEFAULT_MAX_REQUESTS
        } else {
            max_size
        };

        Self {
            inner: RwLock::new(StoreInner {
                requests: VecDeque::with_capacity(max_size),
                max_size,
                next_subscriber_id: 0,
                subscribers: HashMap::new(),
            }),
        }
    }

    /// Add a request, evicting the oldest entry at capacity, and
    /// broadcast it to all current subscribers.
    ///
    /// The fan-out runs against a snapshot of the registry taken under
    /// the write lock, but the sends themselves happen after the lock
    /// is released so a stalled consumer cannot block other writers.
    pub async fn add(&self, mut req: CapturedRequest) {
        if req.id.is_empty() {
            req.id = Uuid::new_v4().to_string();
        }

        let senders: Vec<mpsc::Sender<CapturedRequest>> = {
            let mut inner = self.inner.write().await;

            if inner.requests.len() >= inner.max_size {
                inner.requests.pop_front();
            }
            inner.requests.push_back(req.clone());

            inner.subscribers.values().cloned().collect()
        };

        for tx in senders {
            // Full buffer or gone receiver: drop this one delivery.
            if tx.try_send(req.clone()).is_err() {
                tracing::debug!(id = %req.id, "dropped broadcast to slow subscriber");
            }
        }
    }

    /// Snapshot of all stored requests, newest first.
    pub async fn get_all(&self) -> Vec<CapturedRequest> {
        self.inner
            .read()
            .await
            .requests
            .iter()
            .rev()
            .cloned()
            .collect()
    }

    /// Look up a single request by id.
    pub async fn get(&self, id: &str) -> Option<CapturedRequest> {
        self.inner
            .read()
            .await
            .requests
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Register a new listener with a buffered channel.
    pub async fn subscribe(&self) -> Subscriber {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);

        let mut inner = self.inner.write().await;
        let id = inner.next_subscriber_id;
        inner.next_subscriber_id += 1;
        inner.subscribers.insert(id, tx);

        Subscriber { id, rx }
    }

    /// Remove a listener. Dropping its sender closes the channel, so
    /// the receiver observes end-of-stream. No-op for unknown ids.
    pub async fn unsubscribe(&self, id: u64) {
        self.inner.write().await.subscribers.remove(&id);
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.requests.len()
    }

    pub async fn listener_count(&self) -> usize {
        self.inner.read().await.subscribers.len()
    }
}
