//! Sync controller
//!
//! Owns the definition, document and result buffers. Every edit to the first
//! two arms a debounce timer; when the quiet window elapses both buffers are
//! sent to the transport and the reply text is written into `result`.
//!
//! Each attempt gets a sequence number. With [`OrderingPolicy::LatestRequest`]
//! a reply older than the newest applied one is discarded, so a slow response
//! can never overwrite a fresher result. [`OrderingPolicy::LastResponse`]
//! applies replies in arrival order.
//!
//! The debounce only limits how often a sync starts. Requests already in
//! flight are never cancelled.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::protocol::{SyncRequest, SyncResponse};
use super::transport::{HttpTransport, SyncTransport};
use crate::buffer::{BufferId, EditorBuffer};
use crate::config::{Config, OrderingPolicy};
use crate::debounce::Debouncer;
use crate::error::SyncFailure;

/// Progress events published by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// An edit armed the debounce timer
    Scheduled { trigger: BufferId },
    /// Request `seq` was handed to the transport
    Sent { seq: u64 },
    /// Response to `seq` was written into the result buffer
    Applied { seq: u64 },
    /// Response to `seq` arrived after a newer one had been applied
    Discarded { seq: u64, newest: u64 },
    /// Request `seq` failed; the result buffer was left untouched
    Failed { seq: u64, failure: SyncFailure },
}

/// What happened to a single sync attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Discarded,
    Failed(SyncFailure),
}

pub struct SyncController {
    definition: EditorBuffer,
    document: EditorBuffer,
    result: EditorBuffer,
    transport: Arc<dyn SyncTransport>,
    debouncer: Debouncer,
    ordering: OrderingPolicy,
    next_seq: AtomicU64,
    /// Highest sequence number written into `result`
    applied_seq: Mutex<u64>,
    status: broadcast::Sender<SyncStatus>,
    started: AtomicBool,
}

impl SyncController {
    pub fn new(
        config: &Config,
        transport: Arc<dyn SyncTransport>,
        definition: impl Into<String>,
        document: impl Into<String>,
    ) -> Arc<Self> {
        let (status, _) = broadcast::channel(256);

        Arc::new(Self {
            definition: EditorBuffer::new(BufferId::Definition, definition),
            document: EditorBuffer::new(BufferId::Document, document),
            result: EditorBuffer::new(BufferId::Result, String::new()),
            transport,
            debouncer: Debouncer::new(config.debounce()),
            ordering: config.ordering,
            next_seq: AtomicU64::new(0),
            applied_seq: Mutex::new(0),
            status,
            started: AtomicBool::new(false),
        })
    }

    /// Controller posting to `config.endpoint` over HTTP
    pub fn with_http(
        config: &Config,
        definition: impl Into<String>,
        document: impl Into<String>,
    ) -> anyhow::Result<Arc<Self>> {
        let transport = Arc::new(HttpTransport::new(config)?);
        Ok(Self::new(config, transport, definition, document))
    }

    pub fn definition(&self) -> &EditorBuffer {
        &self.definition
    }

    pub fn document(&self) -> &EditorBuffer {
        &self.document
    }

    pub fn result(&self) -> &EditorBuffer {
        &self.result
    }

    pub fn buffer(&self, id: BufferId) -> &EditorBuffer {
        match id {
            BufferId::Definition => &self.definition,
            BufferId::Document => &self.document,
            BufferId::Result => &self.result,
        }
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Wire the change hooks of both editable buffers and run the initial sync.
    ///
    /// The returned handle drives the listener; it ends when the controller is
    /// dropped. A controller can only be started once.
    pub fn start(self: &Arc<Self>) -> anyhow::Result<JoinHandle<()>> {
        if self.started.swap(true, Ordering::AcqRel) {
            anyhow::bail!("sync controller already started");
        }

        // Subscribe before spawning so no edit made right after `start` is lost
        let mut definition_rx = self.definition.subscribe();
        let mut document_rx = self.document.subscribe();

        let initial = Arc::clone(self);
        tokio::spawn(async move {
            initial.initial_sync().await;
        });

        let weak: Weak<Self> = Arc::downgrade(self);
        let listener = tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    r = definition_rx.recv() => (BufferId::Definition, r),
                    r = document_rx.recv() => (BufferId::Document, r),
                };

                let id = match received {
                    (id, Ok(_)) | (id, Err(RecvError::Lagged(_))) => id,
                    (_, Err(RecvError::Closed)) => break,
                };

                match weak.upgrade() {
                    Some(controller) => controller.on_edit(id),
                    None => break,
                }
            }
            tracing::debug!("sync listener stopped");
        });

        Ok(listener)
    }

    /// Handle an edit to `id`: restart the quiet window.
    ///
    /// Edits to the result buffer are ignored.
    pub fn on_edit(self: &Arc<Self>, id: BufferId) {
        if !id.is_editable() {
            return;
        }

        let controller = Arc::clone(self);
        self.debouncer.schedule(async move {
            controller.sync().await;
        });

        tracing::debug!(trigger = %id, delay = ?self.debouncer.delay(), "sync scheduled");
        self.publish(SyncStatus::Scheduled { trigger: id });
    }

    /// Drop a scheduled sync that has not started yet
    pub fn cancel_pending(&self) -> bool {
        self.debouncer.cancel()
    }

    /// Sync once at startup, before any edit
    pub async fn initial_sync(&self) -> Outcome {
        tracing::info!("initial sync");
        self.sync().await
    }

    /// Send the current definition and document, apply the reply
    pub async fn sync(&self) -> Outcome {
        let seq = self.next_seq.fetch_add(1, Ordering::AcqRel) + 1;
        let request = SyncRequest::new(self.definition.get_value(), self.document.get_value());

        tracing::debug!(
            seq,
            definition_bytes = request.definition.len(),
            document_bytes = request.document.len(),
            "sending sync request"
        );
        self.publish(SyncStatus::Sent { seq });

        match self.transport.send(request).await {
            Ok(response) => self.apply(seq, response),
            Err(failure) => {
                tracing::warn!(seq, category = %failure.category, "sync failed: {}", failure.message);
                self.publish(SyncStatus::Failed {
                    seq,
                    failure: failure.clone(),
                });
                Outcome::Failed(failure)
            }
        }
    }

    fn apply(&self, seq: u64, response: SyncResponse) -> Outcome {
        let mut applied = self.applied_seq.lock();

        if self.ordering == OrderingPolicy::LatestRequest && seq < *applied {
            let newest = *applied;
            drop(applied);
            tracing::debug!(seq, newest, "discarding stale sync response");
            self.publish(SyncStatus::Discarded { seq, newest });
            return Outcome::Discarded;
        }

        *applied = (*applied).max(seq);
        self.result.overwrite(response.body);
        drop(applied);

        tracing::info!(seq, "sync result applied");
        self.publish(SyncStatus::Applied { seq });
        Outcome::Applied
    }

    fn publish(&self, status: SyncStatus) {
        let _ = self.status.send(status);
    }
}
