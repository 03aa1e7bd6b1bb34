//! Local query state: the dashboard list, the open thread and its messages.

use std::collections::HashMap;
use std::sync::Arc;

use los_common::{MessageId, QueryCounts, QueryId, QueryThread, ThreadMessage};
use tokio::sync::RwLock;

/// Store shared between the dispatcher and whatever renders it.
pub type SharedStore = Arc<RwLock<QueryStore>>;

#[derive(Debug, Default)]
pub struct QueryStore {
    queries: Vec<QueryThread>,
    selected: Option<QueryThread>,
    messages: HashMap<QueryId, Vec<ThreadMessage>>,
    counts: QueryCounts,
}

impl QueryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn set_queries(&mut self, queries: Vec<QueryThread>) {
        self.queries = queries;
    }

    pub fn queries(&self) -> &[QueryThread] {
        &self.queries
    }

    pub fn set_selected(&mut self, query: Option<QueryThread>) {
        self.selected = query;
    }

    pub fn selected(&self) -> Option<&QueryThread> {
        self.selected.as_ref()
    }

    pub fn set_messages(&mut self, thread: QueryId, messages: Vec<ThreadMessage>) {
        self.messages.insert(thread, messages);
    }

    pub fn messages(&self, thread: &QueryId) -> &[ThreadMessage] {
        self.messages.get(thread).map(Vec::as_slice).unwrap_or_default()
    }

    /// Merge into the message with the same id, or append.
    pub fn merge_message(&mut self, thread: QueryId, message: ThreadMessage) {
        let messages = self.messages.entry(thread).or_default();
        let existing = message
            .id
            .as_ref()
            .and_then(|id| messages.iter_mut().find(|m| m.id.as_ref() == Some(id)));
        match existing {
            Some(existing) => existing.merge(message),
            None => messages.push(message),
        }
    }

    /// Overlay `patch` on one message. Returns `false` if it is not loaded.
    pub fn update_message(&mut self, thread: &QueryId, id: &MessageId, patch: ThreadMessage) -> bool {
        let Some(message) = self
            .messages
            .get_mut(thread)
            .and_then(|messages| messages.iter_mut().find(|m| m.id.as_ref() == Some(id)))
        else {
            return false;
        };
        message.merge(patch);
        true
    }

    pub fn set_counts(&mut self, counts: QueryCounts) {
        self.counts = counts;
    }

    pub fn counts(&self) -> QueryCounts {
        self.counts
    }

    /// Set the status of every copy of query `id`. Returns `true` if any
    /// copy was found.
    pub fn update_query_status(&mut self, id: &QueryId, status: &str) -> bool {
        let mut found = false;
        for query in self.queries.iter_mut().filter(|q| &q.id == id) {
            query.status = status.to_string();
            found = true;
        }
        if let Some(selected) = self.selected.as_mut().filter(|q| &q.id == id) {
            selected.status = status.to_string();
            found = true;
        }
        found
    }
}
