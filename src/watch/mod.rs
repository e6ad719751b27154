//! Live snapshots of the content directory
//!
//! A [`Subscription`] holds the latest `list_all()` result and is replaced
//! whenever files in the content directory change. Dropping the subscription
//! (or calling [`Subscription::cancel`]) stops the watcher.

use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode, DebounceEventResult};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};

use crate::content::{ContentError, ContentIndex, ContentItem, Result};

/// Quiet period before a burst of file events becomes one snapshot
const DEBOUNCE: Duration = Duration::from_millis(300);

/// How often the watcher thread checks for cancellation
const POLL: Duration = Duration::from_millis(100);

/// A live feed of content snapshots
pub struct Subscription {
    rx: watch::Receiver<Vec<ContentItem>>,
    guard: CancelGuard,
}

struct CancelGuard(Arc<AtomicBool>);

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Start watching the index's content directory.
///
/// The first snapshot is taken before this returns.
pub fn subscribe(index: Arc<ContentIndex>) -> Result<Subscription> {
    let root = index.root().to_path_buf();
    if !root.is_dir() {
        return Err(ContentError::SourceUnavailable { path: root });
    }

    let (tx, rx) = watch::channel(index.list_all()?);
    let cancelled = Arc::new(AtomicBool::new(false));
    let (ready_tx, ready_rx) = mpsc::channel();

    let flag = cancelled.clone();
    thread::Builder::new()
        .name("folio-watch".to_string())
        .spawn(move || run_watcher(index, tx, flag, ready_tx))
        .map_err(|e| ContentError::Watch {
            path: root.clone(),
            message: e.to_string(),
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            return Err(ContentError::Watch {
                path: root,
                message: "watcher thread exited during setup".to_string(),
            })
        }
    }

    tracing::debug!("Watching {:?}", root);
    Ok(Subscription {
        rx,
        guard: CancelGuard(cancelled),
    })
}

impl Subscription {
    /// The most recent snapshot
    pub fn snapshot(&self) -> Vec<ContentItem> {
        self.rx.borrow().clone()
    }

    /// Wait for the next snapshot. `None` once the feed has stopped.
    pub async fn changed(&mut self) -> Option<Vec<ContentItem>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Every snapshot as a stream, starting with the current one
    pub fn into_stream(self) -> impl Stream<Item = Vec<ContentItem>> {
        let Subscription { rx, guard } = self;
        WatchStream::new(rx).map(move |items| {
            let _guard = &guard;
            items
        })
    }

    /// Stop the feed
    pub fn cancel(self) {
        drop(self);
    }
}

fn run_watcher(
    index: Arc<ContentIndex>,
    tx: watch::Sender<Vec<ContentItem>>,
    cancelled: Arc<AtomicBool>,
    ready: mpsc::Sender<Result<()>>,
) {
    let root = index.root().to_path_buf();
    let watch_error = |e: &dyn std::fmt::Display| ContentError::Watch {
        path: root.clone(),
        message: e.to_string(),
    };

    let (event_tx, event_rx) = mpsc::channel::<DebounceEventResult>();
    let mut debouncer = match new_debouncer(DEBOUNCE, event_tx) {
        Ok(debouncer) => debouncer,
        Err(e) => {
            let _ = ready.send(Err(watch_error(&e)));
            return;
        }
    };
    if let Err(e) = debouncer.watcher().watch(&root, RecursiveMode::NonRecursive) {
        let _ = ready.send(Err(watch_error(&e)));
        return;
    }
    let _ = ready.send(Ok(()));

    while !cancelled.load(Ordering::Relaxed) && !tx.is_closed() {
        match event_rx.recv_timeout(POLL) {
            Ok(Ok(events)) => {
                if !events.iter().any(|e| is_relevant(&e.path)) {
                    continue;
                }
                for event in &events {
                    tracing::debug!("Changed: {:?}", event.path);
                }

                match index.list_all() {
                    Ok(items) => {
                        tracing::info!("Content changed, {} items", items.len());
                        if tx.send(items).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("Failed to reload content: {}", e),
                }
            }
            Ok(Err(e)) => tracing::warn!("Watch error: {:?}", e),
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::debug!("Stopped watching {:?}", root);
}

/// Editor backups and hidden files never affect the catalog
fn is_relevant(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    !name.starts_with('.') && !name.ends_with('~') && !name.ends_with(".swp")
}
