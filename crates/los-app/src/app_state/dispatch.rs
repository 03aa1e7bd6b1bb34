//! Turns domain events into toasts, sounds and store updates.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use los_api::{ApiClient, ApiError};
use los_common::{QueryId, ThreadMessage, Toast, ToastSink, STATUS_CLOSED};
use los_platform::SoundPlayer;
use los_realtime::{DomainEvent, EventKind};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::store::SharedStore;

/// Toast body when a new-message event carries no text.
const FALLBACK_MESSAGE: &str = "New message received";

/// Playback still running after this long is abandoned.
const SOUND_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of a thread's full message list, used when an event only says
/// "something changed".
#[async_trait]
pub trait MessageLoader: Send + Sync {
    async fn load_messages(&self, thread: &QueryId) -> Result<Vec<ThreadMessage>, ApiError>;
}

#[async_trait]
impl MessageLoader for ApiClient {
    async fn load_messages(&self, thread: &QueryId) -> Result<Vec<ThreadMessage>, ApiError> {
        self.messages(thread).await
    }
}

pub struct EventDispatcher {
    store: SharedStore,
    toasts: Arc<dyn ToastSink>,
    sound: Arc<dyn SoundPlayer>,
    loader: Arc<dyn MessageLoader>,
    sound_enabled: bool,
    unauthorized: Option<Arc<watch::Sender<bool>>>,
}

impl EventDispatcher {
    pub fn new(
        store: SharedStore,
        toasts: Arc<dyn ToastSink>,
        sound: Arc<dyn SoundPlayer>,
        loader: Arc<dyn MessageLoader>,
    ) -> Self {
        Self {
            store,
            toasts,
            sound,
            loader,
            sound_enabled: true,
            unauthorized: None,
        }
    }

    pub fn with_sound_enabled(mut self, enabled: bool) -> Self {
        self.sound_enabled = enabled;
        self
    }

    /// Set `signal` to `true` when the API rejects the token.
    pub fn with_unauthorized_signal(mut self, signal: Arc<watch::Sender<bool>>) -> Self {
        self.unauthorized = Some(signal);
        self
    }

    /// Dispatch events in arrival order until every sender is gone.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<DomainEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
        }
        debug!("Event stream ended");
    }

    /// Handle one event. Each call is independent; duplicates are not
    /// suppressed.
    pub async fn dispatch(&self, event: DomainEvent) {
        match &event.kind {
            EventKind::QueryMessage => self.on_query_message(&event).await,
            EventKind::QueryMessageClosed => self.on_query_closed(&event).await,
            EventKind::Other(kind) => match event.text() {
                Some(text) => self.toasts.show(Toast::info("Notification", text)),
                None => debug!(kind = %kind, "Ignoring event without message"),
            },
        }
    }

    async fn on_query_message(&self, event: &DomainEvent) {
        let body = event
            .text()
            .or_else(|| event.record().and_then(|r| r.message.as_deref()))
            .filter(|text| !text.is_empty())
            .unwrap_or(FALLBACK_MESSAGE);
        self.toasts.show(Toast::info("New Message", body));

        match (event.thread_id(), event.record()) {
            (Some(thread), Some(record)) => {
                self.store
                    .write()
                    .await
                    .merge_message(thread.clone(), record.clone());
            }
            (Some(thread), None) => self.reload(thread).await,
            (None, _) => debug!("New message without thread id"),
        }

        self.play_sound();
    }

    async fn on_query_closed(&self, event: &DomainEvent) {
        self.toasts.show(Toast::success("Query Closed"));
        match event.thread_id() {
            Some(thread) => {
                let found = self
                    .store
                    .write()
                    .await
                    .update_query_status(thread, STATUS_CLOSED);
                debug!(query = %thread, found, "Marked query closed");
            }
            None => debug!("Close event without thread id"),
        }
    }

    async fn reload(&self, thread: &QueryId) {
        match self.loader.load_messages(thread).await {
            Ok(messages) => {
                debug!(query = %thread, count = messages.len(), "Reloaded messages");
                self.store
                    .write()
                    .await
                    .set_messages(thread.clone(), messages);
            }
            Err(ApiError::Unauthorized) => {
                warn!(query = %thread, "Token rejected while reloading messages");
                if let Some(signal) = &self.unauthorized {
                    signal.send_replace(true);
                }
            }
            Err(e) => warn!(query = %thread, error = %e, "Failed to reload messages"),
        }
    }

    /// Start the notification sound without waiting for it.
    fn play_sound(&self) {
        if !self.sound_enabled {
            return;
        }
        let sound = Arc::clone(&self.sound);
        tokio::spawn(async move {
            match tokio::time::timeout(SOUND_TIMEOUT, sound.play()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Notification sound failed"),
                Err(_) => warn!(secs = SOUND_TIMEOUT.as_secs(), "Notification sound timed out"),
            }
        });
    }
}
