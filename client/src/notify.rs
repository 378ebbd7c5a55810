//! The notification surface: user-visible status and error events.
//!
//! Controllers emit [`Notification`]s through a [`Notifier`]; nothing flows
//! back. The default sink logs through `tracing`; embedders supply their own
//! implementation to drive toasts or inline banners.

use crate::error::ClientError;

/// How a notification should be presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Neutral status update.
    Info,
    /// A completed operation worth celebrating.
    Success,
    /// A failure the user should see.
    Error,
}

/// A user-visible event emitted by a controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Presentation hint.
    pub severity: Severity,
    /// Message to display.
    pub message: String,
}

impl Notification {
    /// A neutral status notification.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    /// A success notification.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            message: message.into(),
        }
    }

    /// An error notification rendered from a classified failure.
    #[must_use]
    pub fn error(err: &ClientError) -> Self {
        Self {
            severity: Severity::Error,
            message: err.to_string(),
        }
    }
}

/// Sink for user-visible notifications. One-way by design: the surface never
/// feeds state back into the controllers.
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    fn notify(&self, notification: Notification);
}

/// Default sink: structured log events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Info | Severity::Success => {
                tracing::info!(message = %notification.message, "notification");
            },
            Severity::Error => {
                tracing::warn!(message = %notification.message, "notification");
            },
        }
    }
}

/// Capturing sink for tests: records every notification for later
/// assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    entries: std::sync::Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications recorded so far.
    #[must_use]
    pub fn entries(&self) -> Vec<Notification> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Messages of all recorded error notifications.
    #[must_use]
    pub fn error_messages(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|n| n.severity == Severity::Error)
            .map(|n| n.message)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_captures_in_order() {
        let recorder = RecordingNotifier::new();
        recorder.notify(Notification::info("searching"));
        recorder.notify(Notification::error(&ClientError::AuthRequired));

        let entries = recorder.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].severity, Severity::Info);
        assert_eq!(
            recorder.error_messages(),
            vec!["please sign in to continue".to_string()]
        );
    }
}
