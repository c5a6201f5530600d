//! The authoritative diagram document.

use tokio::sync::watch;

/// Holds the current document text and notifies subscribers on change.
///
/// The renderer (out of scope here) holds a [`watch::Receiver`] and redraws
/// whenever a new value is committed. Any string is accepted, including
/// empty; no diagram-syntax validation happens at this layer.
#[derive(Debug)]
pub struct DocumentStore {
    content: String,
    notify: watch::Sender<String>,
}

impl DocumentStore {
    #[must_use]
    pub fn new(seed: impl Into<String>) -> Self {
        let content = seed.into();
        let (notify, _) = watch::channel(content.clone());
        Self { content, notify }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replace the document and notify subscribers.
    pub fn commit(&mut self, new_text: impl Into<String>) {
        self.content = new_text.into();
        // send_replace never fails; a value with no receivers is still stored
        // for late subscribers.
        self.notify.send_replace(self.content.clone());
    }

    /// Subscribe to document changes. The receiver observes the value at
    /// subscription time plus every subsequent commit.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.notify.subscribe()
    }
}
