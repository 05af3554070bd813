use std::collections::HashMap;

use tokio::sync::{broadcast, mpsc};
use tracing::{Instrument, debug, warn};

use session::UserKey;

use super::{RemoteEvent, Subscription};
use crate::model::{DocumentPath, WatchlistDocument};

/// Per-document fan-out of committed remote writes.
///
/// Every remote implementation publishes the committed document (with its new
/// version) here after a successful `put`; each subscriber gets a forwarding
/// task that turns broadcast messages into [`RemoteEvent`]s for its user.
pub struct ChangeFeed {
    channels: parking_lot::Mutex<HashMap<DocumentPath, broadcast::Sender<WatchlistDocument>>>,
    capacity: usize,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: parking_lot::Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Returns the number of subscribers that will see the change.
    pub fn publish(&self, path: &DocumentPath, doc: WatchlistDocument) -> usize {
        let tx = {
            let channels = self.channels.lock();
            channels.get(path).cloned()
        };

        match tx {
            // SendError only means nobody is listening
            Some(tx) => tx.send(doc).unwrap_or(0),
            None => 0,
        }
    }

    pub fn subscribe(
        &self,
        user: &UserKey,
        path: &DocumentPath,
        sink: mpsc::Sender<RemoteEvent>,
    ) -> Subscription {
        let mut rx = {
            let mut channels = self.channels.lock();
            channels
                .entry(path.clone())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        let user = user.clone();
        let span = tracing::info_span!("remote_feed", user = %user, path = %path);

        let task = tokio::spawn(
            async move {
                debug!("subscription started");
                loop {
                    let event = match rx.recv().await {
                        Ok(doc) => RemoteEvent::Snapshot {
                            user: user.clone(),
                            version: doc.version,
                            entries: doc.entries,
                        },
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "subscriber lagged behind remote changes");
                            RemoteEvent::Error {
                                user: user.clone(),
                                message: format!("missed {missed} remote updates"),
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };

                    if sink.send(event).await.is_err() {
                        debug!("sink closed; ending subscription");
                        break;
                    }
                }
            }
            .instrument(span),
        );

        Subscription::new(task)
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(64)
    }
}
