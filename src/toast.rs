use std::sync::{Mutex, MutexGuard};

/// Transient user-facing notification sink.
pub trait Toaster: Send + Sync + 'static {
    fn success(&self, message: &str);

    fn error(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

/// Toasts queued for the UI shell to drain and display.
#[derive(Debug, Default)]
pub struct ToastQueue {
    pending: Mutex<Vec<Toast>>,
}

impl ToastQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, Vec<Toast>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take every queued toast, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut *self.pending())
    }

    /// Number of toasts waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending().len()
    }

    /// True when no toast is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending().is_empty()
    }

    fn enqueue(&self, level: ToastLevel, message: &str) {
        self.pending().push(Toast {
            level,
            message: message.to_owned(),
        });
    }
}

impl Toaster for ToastQueue {
    fn success(&self, message: &str) {
        self.enqueue(ToastLevel::Success, message);
    }

    fn error(&self, message: &str) {
        self.enqueue(ToastLevel::Error, message);
    }
}

/// Sends toasts to `tracing` instead of a screen.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogToaster;

impl Toaster for LogToaster {
    fn success(&self, message: &str) {
        tracing::info!(toast = %message, "toast");
    }

    fn error(&self, message: &str) {
        tracing::warn!(toast = %message, "toast");
    }
}
