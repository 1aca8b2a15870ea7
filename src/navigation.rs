use std::sync::{Mutex, MutexGuard};

use url::Url;

/// Router surface the flows drive.
///
/// `replace` swaps the current history entry, `push` adds one.
pub trait Navigator: Send + Sync + 'static {
    fn replace(&self, path: &str);

    fn push(&self, path: &str);
}

/// A single navigation request, as recorded by [`MemoryHistory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Push(String),
    Replace(String),
}

impl Navigation {
    /// Destination path.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Push(p) | Self::Replace(p) => p,
        }
    }
}

#[derive(Debug, Default)]
struct HistoryState {
    entries: Vec<String>,
    log: Vec<Navigation>,
}

/// In-process history stack for headless embedders.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    state: Mutex<HistoryState>,
}

impl MemoryHistory {
    /// History with one entry, `initial`.
    #[must_use]
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(HistoryState {
                entries: vec![initial.into()],
                log: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Path of the current entry.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.state().entries.last().cloned()
    }

    /// Every entry on the stack, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.state().entries.clone()
    }

    /// Every navigation requested so far, oldest first.
    #[must_use]
    pub fn navigations(&self) -> Vec<Navigation> {
        self.state().log.clone()
    }
}

impl Navigator for MemoryHistory {
    fn replace(&self, path: &str) {
        let mut state = self.state();
        state.entries.pop();
        state.entries.push(path.to_owned());
        state.log.push(Navigation::Replace(path.to_owned()));
    }

    fn push(&self, path: &str) {
        let mut state = self.state();
        state.entries.push(path.to_owned());
        state.log.push(Navigation::Push(path.to_owned()));
    }
}

/// What the OAuth return navigation carried.
///
/// A `pending` ticket wins over a `code`; blank values count as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOAuthState {
    /// Ticket for the OTP completion step.
    Pending(String),
    /// One-time exchange code.
    Code(String),
    Missing,
}

impl PendingOAuthState {
    /// Parse a raw query string (with or without the leading `?`).
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut pending = None;
        let mut code = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "pending" if pending.is_none() => pending = Some(value.into_owned()),
                "code" if code.is_none() => code = Some(value.into_owned()),
                _ => {}
            }
        }
        match (pending, code) {
            (Some(ticket), _) => Self::Pending(ticket),
            (None, Some(code)) => Self::Code(code),
            (None, None) => Self::Missing,
        }
    }

    /// Parse the query of a full return URL.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        Self::from_query(url.query().unwrap_or_default())
    }
}
