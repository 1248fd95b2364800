//! Editor buffers
//!
//! A buffer is a text value plus a change hook. The sync controller owns three
//! of them: `definition` and `document` are edited by the user, `result` is
//! only ever overwritten by the controller.

use anyhow::{bail, Result};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Identifies one of the three buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferId {
    /// Transformation definition ("jute" on the wire)
    Definition,
    /// Subject document ("source" on the wire)
    Document,
    /// Latest applied server response
    Result,
}

impl BufferId {
    /// Whether user edits to this buffer should trigger a sync
    pub fn is_editable(self) -> bool {
        !matches!(self, BufferId::Result)
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferId::Definition => "definition",
            BufferId::Document => "document",
            BufferId::Result => "result",
        };
        f.write_str(name)
    }
}

/// Change notification sent after every write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferChange {
    pub id: BufferId,
    /// Buffer version after the write
    pub version: u64,
}

/// Text buffer with a change-notification hook
pub struct EditorBuffer {
    id: BufferId,
    text: RwLock<String>,
    version: AtomicU64,
    changes: broadcast::Sender<BufferChange>,
}

impl EditorBuffer {
    /// Create a buffer with initial contents
    pub fn new(id: BufferId, initial: impl Into<String>) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            id,
            text: RwLock::new(initial.into()),
            version: AtomicU64::new(0),
            changes,
        }
    }

    /// Current text
    pub fn get_value(&self) -> String {
        self.text.read().clone()
    }

    /// Number of writes since creation
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Replace the text as a user edit.
    ///
    /// The result buffer is read-only and rejects this.
    pub fn set_value(&self, text: impl Into<String>) -> Result<()> {
        if !self.id.is_editable() {
            bail!("the {} buffer is read-only", self.id);
        }
        self.write(text.into());
        Ok(())
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<BufferChange> {
        self.changes.subscribe()
    }

    /// Write bypassing the read-only check; used by the controller for `result`
    pub(crate) fn overwrite(&self, text: impl Into<String>) {
        self.write(text.into());
    }

    fn write(&self, text: String) {
        // Version is bumped under the write lock so notifications are ordered
        let version = {
            let mut guard = self.text.write();
            *guard = text;
            self.version.fetch_add(1, Ordering::AcqRel) + 1
        };

        // No subscribers is fine
        let _ = self.changes.send(BufferChange {
            id: self.id,
            version,
        });
    }
}

impl fmt::Debug for EditorBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorBuffer")
            .field("id", &self.id)
            .field("version", &self.version())
            .field("len", &self.text.read().len())
            .finish()
    }
}
