//! User-facing notices (toasts) and the explicit editor context.
//!
//! The editing layer never reaches for ambient UI state. It is handed an
//! [`EditorContext`] carrying the locale and a [`NoticeBus`]; whatever draws
//! toasts subscribes to the bus.
//!
//! # Subjects
//!
//! Notices carry dot-separated subjects and subscribers filter with
//! wildcards:
//! - `*` matches exactly one token: `edit.*` matches `edit.rejected`
//! - `>` matches one or more trailing tokens: `>` matches everything
//!
//! | Subject          | Raised when                                  |
//! |------------------|----------------------------------------------|
//! | `edit.rejected`  | backend refused a save (value reverted)      |
//! | `edit.offline`   | backend unreachable (value reverted)         |
//! | `edit.invalid`   | edit failed validation before apply          |
//! | `drag.cycle`     | drop would nest a block inside itself        |

use std::time::Instant;

use tokio::sync::broadcast;

use hanji_blocks::Target;
use hanji_types::{Locale, Message};

use crate::error::EditError;

/// Default notice channel capacity.
pub const DEFAULT_NOTICE_CAPACITY: usize = 64;

/// A transient user-facing message.
#[derive(Clone, Debug)]
pub struct Notice {
    pub subject: &'static str,
    pub message: Message,
    /// `message` rendered in the context's locale.
    pub text: &'static str,
    pub target: Option<Target>,
    /// Technical detail for logs, not for display.
    pub detail: String,
    pub timestamp: Instant,
}

/// Check if a subject matches a wildcard pattern.
pub fn matches_subject(pattern: &str, subject: &str) -> bool {
    let mut pattern = pattern.split('.').peekable();
    let mut subject = subject.split('.');

    while let Some(token) = pattern.next() {
        match (token, subject.next()) {
            (">", Some(_)) => return pattern.peek().is_none(),
            ("*", Some(_)) => {}
            (t, Some(s)) if t == s => {}
            _ => return false,
        }
    }
    subject.next().is_none()
}

/// Broadcast channel of [`Notice`]s.
#[derive(Clone, Debug)]
pub struct NoticeBus {
    tx: broadcast::Sender<Notice>,
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_CAPACITY)
    }
}

impl NoticeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a notice. Returns the number of subscribers that received it.
    pub fn publish(&self, notice: Notice) -> usize {
        self.tx.send(notice).unwrap_or(0)
    }

    pub fn subscribe(&self, pattern: &str) -> NoticeSubscription {
        NoticeSubscription {
            pattern: pattern.to_string(),
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A filtered view of the notice bus.
pub struct NoticeSubscription {
    pattern: String,
    rx: broadcast::Receiver<Notice>,
}

impl NoticeSubscription {
    /// Wait for the next matching notice. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Notice> {
        loop {
            match self.rx.recv().await {
                Ok(notice) if matches_subject(&self.pattern, notice.subject) => return Some(notice),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        pattern = %self.pattern,
                        lagged = n,
                        "notice subscription lagged behind"
                    );
                }
            }
        }
    }

    /// Next matching notice if one is already queued.
    pub fn try_recv(&mut self) -> Option<Notice> {
        loop {
            match self.rx.try_recv() {
                Ok(notice) if matches_subject(&self.pattern, notice.subject) => return Some(notice),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!(
                        pattern = %self.pattern,
                        lagged = n,
                        "notice subscription lagged behind"
                    );
                }
                Err(_) => return None,
            }
        }
    }
}

impl std::fmt::Debug for NoticeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoticeSubscription")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// Explicit UI context handed to the editing layer.
#[derive(Clone, Debug, Default)]
pub struct EditorContext {
    pub locale: Locale,
    pub notices: NoticeBus,
}

impl EditorContext {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            notices: NoticeBus::default(),
        }
    }

    /// Publish the notice matching `err`, if it is one users should see.
    pub fn notify(&self, target: Option<Target>, err: &EditError) {
        let (subject, message) = match err {
            EditError::RemoteRejected(_) => ("edit.rejected", Message::SaveFailed),
            EditError::NetworkUnreachable(_) => ("edit.offline", Message::Offline),
            EditError::CycleRejected { .. } => ("drag.cycle", Message::MoveIntoSelf),
            EditError::TooLong { .. } => ("edit.invalid", Message::TooLong),
            _ => return,
        };
        self.notices.publish(Notice {
            subject,
            message,
            text: self.locale.text(message),
            target,
            detail: err.to_string(),
            timestamp: Instant::now(),
        });
    }
}
