//! File-backed buffers
//!
//! Binds the editable buffers to files on disk. Saving a bound file counts as
//! an edit: the new contents are pushed into the buffer, whose change hook
//! then arms the controller's debounce timer.

use anyhow::{anyhow, Context as _, Result};
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinError;

use crate::buffer::BufferId;
use crate::sync::SyncController;

/// Filesystem event coalescing window, separate from the sync quiet window
const FS_DEBOUNCE: Duration = Duration::from_millis(50);

/// A file feeding one buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBinding {
    pub path: PathBuf,
    pub buffer: BufferId,
}

impl FileBinding {
    pub fn new(path: impl Into<PathBuf>, buffer: BufferId) -> Self {
        Self {
            path: path.into(),
            buffer,
        }
    }
}

/// Read `path`, creating it with `default` first if it does not exist
pub async fn load_or_seed(path: &Path, default: &str) -> Result<String> {
    if tokio::fs::try_exists(path).await? {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read: {}", path.display()));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, default)
        .await
        .with_context(|| format!("Failed to seed: {}", path.display()))?;
    tracing::info!(path = %path.display(), "seeded missing file with sample contents");

    Ok(default.to_string())
}

/// Watch the bound files and push saved contents into the controller's buffers.
///
/// Runs until the watcher fails; abort the task to stop watching.
pub async fn watch_files(controller: Arc<SyncController>, bindings: Vec<FileBinding>) -> Result<()> {
    let bindings = bindings
        .into_iter()
        .map(|binding| {
            let path = binding
                .path
                .canonicalize()
                .with_context(|| format!("Cannot watch: {}", binding.path.display()))?;
            Ok(FileBinding::new(path, binding.buffer))
        })
        .collect::<Result<Vec<_>>>()?;

    let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();

    let mut debouncer = new_debouncer(FS_DEBOUNCE, None, move |result: DebounceEventResult| {
        match result {
            Ok(events) => {
                for debounced in events {
                    if !matches!(debounced.event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        continue;
                    }
                    for path in &debounced.event.paths {
                        let _ = tx.send(path.clone());
                    }
                }
            }
            Err(errors) => {
                for error in errors {
                    tracing::warn!(%error, "file watch error");
                }
            }
        }
    })?;

    // Watch the parent directories: many editors save by renaming a temp file
    let dirs: HashSet<&Path> = bindings.iter().filter_map(|b| b.path.parent()).collect();
    for dir in dirs {
        debouncer
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch: {}", dir.display()))?;
    }

    // Saves made before the watch was registered produced no event
    for binding in &bindings {
        tracing::info!(path = %binding.path.display(), buffer = %binding.buffer, "watching");
        reload(&controller, binding).await;
    }

    while let Some(path) = rx.recv().await {
        if let Some(binding) = bindings.iter().find(|b| b.path == path) {
            reload(&controller, binding).await;
        }
    }

    Ok(())
}

/// Turn the end of a spawned [`watch_files`] task into an error.
///
/// The watcher only returns when something went wrong, so even a clean exit
/// is reported.
pub fn watch_ended(joined: Result<Result<()>, JoinError>) -> anyhow::Error {
    match joined {
        Ok(Ok(())) => anyhow!("file watcher stopped"),
        Ok(Err(error)) => error.context("file watcher failed"),
        Err(error) => anyhow!("file watcher task ended: {}", error),
    }
}

async fn reload(controller: &SyncController, binding: &FileBinding) {
    let text = match tokio::fs::read_to_string(&binding.path).await {
        Ok(text) => text,
        // Mid-save; the next event brings the final contents
        Err(error) => {
            tracing::debug!(path = %binding.path.display(), %error, "skipping unreadable file");
            return;
        }
    };

    let buffer = controller.buffer(binding.buffer);
    if buffer.get_value() == text {
        return;
    }

    if let Err(error) = buffer.set_value(text) {
        tracing::warn!(buffer = %binding.buffer, %error, "cannot load file into buffer");
    }
}
