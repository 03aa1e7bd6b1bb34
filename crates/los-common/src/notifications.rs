use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Severity level for toast notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A short-lived, user-visible notification.
#[derive(Debug, Clone)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub body: Option<String>,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl Toast {
    /// Creates an info toast with a 4-second TTL.
    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Info,
            title: title.into(),
            body: Some(body.into()),
            created_at: Instant::now(),
            ttl: Duration::from_secs(4),
        }
    }

    /// Creates a body-less success toast with a 3-second TTL.
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            title: title.into(),
            body: None,
            created_at: Instant::now(),
            ttl: Duration::from_secs(3),
        }
    }

    /// Creates an error toast with a 6-second TTL.
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            title: title.into(),
            body: Some(body.into()),
            created_at: Instant::now(),
            ttl: Duration::from_secs(6),
        }
    }

    /// Returns `true` if this toast has exceeded its TTL.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

/// Anything that can put a toast in front of the user.
pub trait ToastSink: Send + Sync {
    fn show(&self, toast: Toast);
}

/// A bounded queue of toasts that auto-evicts expired entries.
#[derive(Debug)]
pub struct ToastQueue {
    items: VecDeque<Toast>,
    capacity: usize,
}

impl ToastQueue {
    /// Creates a new queue with the given maximum capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Pushes a toast, evicting expired entries first.
    /// If still at capacity after eviction, the oldest entry is removed.
    pub fn push(&mut self, toast: Toast) {
        self.evict_expired();
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(toast);
    }

    /// Returns all currently visible (non-expired) toasts.
    pub fn visible(&mut self) -> Vec<&Toast> {
        self.evict_expired();
        self.items.iter().collect()
    }

    /// Removes and returns every queued toast, oldest first.
    pub fn drain(&mut self) -> Vec<Toast> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn evict_expired(&mut self) {
        self.items.retain(|t| !t.is_expired());
    }
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new(16)
    }
}

impl ToastSink for Mutex<ToastQueue> {
    fn show(&self, toast: Toast) {
        match self.lock() {
            Ok(mut queue) => queue.push(toast),
            Err(poisoned) => poisoned.into_inner().push(toast),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_level_and_ttl() {
        let t = Toast::info("New Message", "Hi");
        assert_eq!(t.level, ToastLevel::Info);
        assert_eq!(t.body.as_deref(), Some("Hi"));
        assert_eq!(t.ttl, Duration::from_secs(4));

        let t = Toast::success("Query Closed");
        assert_eq!(t.level, ToastLevel::Success);
        assert!(t.body.is_none());
        assert_eq!(t.ttl, Duration::from_secs(3));
    }

    #[test]
    fn queue_evicts_oldest_at_capacity() {
        let mut queue = ToastQueue::new(2);
        queue.push(Toast::info("a", "1"));
        queue.push(Toast::info("b", "2"));
        queue.push(Toast::info("c", "3"));
        let titles: Vec<_> = queue.visible().iter().map(|t| t.title.clone()).collect();
        assert_eq!(titles, vec!["b", "c"]);
    }

    #[test]
    fn expired_toasts_are_not_visible() {
        let mut queue = ToastQueue::new(4);
        let mut stale = Toast::info("old", "gone");
        stale.ttl = Duration::ZERO;
        queue.push(stale);
        assert!(queue.visible().is_empty());
    }

    #[test]
    fn mutex_queue_is_a_sink() {
        let sink = Mutex::new(ToastQueue::default());
        sink.show(Toast::success("done"));
        let drained = sink.lock().unwrap().drain();
        assert_eq!(drained.len(), 1);
        assert!(sink.lock().unwrap().is_empty());
    }
}
