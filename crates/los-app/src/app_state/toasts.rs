use std::io::Write;
use std::sync::Mutex;

use los_common::{Toast, ToastLevel, ToastQueue, ToastSink};

/// Keeps recent toasts in a bounded queue and prints each one to stdout.
#[derive(Debug)]
pub struct ConsoleToasts {
    queue: Mutex<ToastQueue>,
}

impl ConsoleToasts {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(ToastQueue::new(capacity)),
        }
    }

    /// Toasts still within their display time.
    pub fn visible_count(&self) -> usize {
        match self.queue.lock() {
            Ok(mut queue) => queue.visible().len(),
            Err(poisoned) => poisoned.into_inner().visible().len(),
        }
    }
}

pub(crate) fn render(toast: &Toast) -> String {
    let tag = match toast.level {
        ToastLevel::Info => "info",
        ToastLevel::Success => "ok",
        ToastLevel::Warning => "warn",
        ToastLevel::Error => "error",
    };
    match &toast.body {
        Some(body) => format!("[{tag}] {}: {body}", toast.title),
        None => format!("[{tag}] {}", toast.title),
    }
}

impl ToastSink for ConsoleToasts {
    fn show(&self, toast: Toast) {
        let line = render(&toast);
        let mut out = std::io::stdout().lock();
        // Nowhere better to report a broken stdout.
        let _ = writeln!(out, "{line}");
        self.queue.show(toast);
    }
}
