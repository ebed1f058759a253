//! Notifications that represent live exposures.
//!
//! Every username, password and keyboard exposure is shown to the user as a
//! notification keyed by its [`ChannelTag`]. When the user discards one, the
//! notifier reports a [`Dismissal`] on a broadcast channel the coordinator
//! subscribes to for the lifetime of a session.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::channel::ChannelTag;
use crate::error::{Error, Result};

/// Buffered dismissals per subscriber before the oldest are dropped.
const DISMISSAL_BUFFER: usize = 16;

/// Icon shown next to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationIcon {
    /// A field that can be copied to the clipboard.
    Clipboard,
    /// Data waiting in the keyboard bridge.
    Keyboard,
}

/// A notification for one live exposure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Which exposure this represents.
    pub tag: ChannelTag,
    /// Session generation the notification belongs to.
    pub session: u64,
    /// Title line, usually the record title.
    pub title: String,
    /// Body text. Never contains secret values.
    pub body: String,
    /// Icon.
    pub icon: NotificationIcon,
}

/// The user discarded a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dismissal {
    /// Tag of the dismissed notification.
    pub tag: ChannelTag,
    /// Session generation the notification was shown for.
    pub session: u64,
}

/// The notification and display service.
pub trait Notifier: Send + Sync {
    /// Show (or replace) the notification for `notification.tag`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelUnavailable`] if notifications cannot be shown.
    fn show(&self, notification: Notification) -> Result<()>;

    /// Remove the notification for `tag`, if shown.
    fn cancel(&self, tag: ChannelTag);

    /// Show a short transient message.
    fn show_message(&self, message: &str);

    /// Subscribe to dismissals.
    fn dismissals(&self) -> broadcast::Receiver<Dismissal>;
}

#[derive(Debug, Default)]
struct MemoryNotifierState {
    shown: HashMap<ChannelTag, Notification>,
    history: VecDeque<Notification>,
    messages: VecDeque<String>,
    unavailable: bool,
}

/// Shown notifications and messages a [`MemoryNotifier`] remembers.
pub const HISTORY_LIMIT: usize = 64;

/// An in-memory notifier, for embedding and tests.
///
/// Only the last [`HISTORY_LIMIT`] notifications and messages are kept, so a
/// long-lived embedding does not grow without bound.
///
/// [`MemoryNotifier::dismiss`] plays the part of the user swiping a
/// notification away.
#[derive(Debug)]
pub struct MemoryNotifier {
    state: Mutex<MemoryNotifierState>,
    dismissals: broadcast::Sender<Dismissal>,
}

impl Default for MemoryNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNotifier {
    /// Create a notifier with nothing shown.
    #[must_use]
    pub fn new() -> Self {
        let (dismissals, _) = broadcast::channel(DISMISSAL_BUFFER);
        Self {
            state: Mutex::new(MemoryNotifierState::default()),
            dismissals,
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryNotifierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make [`Notifier::show`] fail as if the service were missing.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Dismiss the notification for `tag`.
    ///
    /// Returns `false` if no such notification is shown.
    pub fn dismiss(&self, tag: ChannelTag) -> bool {
        let Some(notification) = self.state().shown.remove(&tag) else {
            return false;
        };
        let _ = self.dismissals.send(Dismissal {
            tag,
            session: notification.session,
        });
        true
    }

    /// Whether a notification for `tag` is shown.
    #[must_use]
    pub fn is_shown(&self, tag: ChannelTag) -> bool {
        self.state().shown.contains_key(&tag)
    }

    /// Tags of shown notifications.
    #[must_use]
    pub fn shown_tags(&self) -> Vec<ChannelTag> {
        let mut tags: Vec<ChannelTag> = self.state().shown.keys().copied().collect();
        tags.sort();
        tags
    }

    /// Recently shown notifications, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Notification> {
        self.state().history.iter().cloned().collect()
    }

    /// Recent transient messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.state().messages.iter().cloned().collect()
    }
}

fn push_bounded<T>(log: &mut VecDeque<T>, item: T) {
    if log.len() == HISTORY_LIMIT {
        log.pop_front();
    }
    log.push_back(item);
}

impl Notifier for MemoryNotifier {
    fn show(&self, notification: Notification) -> Result<()> {
        let mut state = self.state();
        if state.unavailable {
            return Err(Error::channel_unavailable(
                "notifications",
                "notification service not running",
            ));
        }
        push_bounded(&mut state.history, notification.clone());
        state.shown.insert(notification.tag, notification);
        Ok(())
    }

    fn cancel(&self, tag: ChannelTag) {
        self.state().shown.remove(&tag);
    }

    fn show_message(&self, message: &str) {
        push_bounded(&mut self.state().messages, message.to_string());
    }

    fn dismissals(&self) -> broadcast::Receiver<Dismissal> {
        self.dismissals.subscribe()
    }
}

/// A notifier that writes to the log, for headless use.
///
/// Nothing can be dismissed, so exposures end by timeout or lock.
#[derive(Debug)]
pub struct LogNotifier {
    dismissals: broadcast::Sender<Dismissal>,
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LogNotifier {
    /// Create a log notifier.
    #[must_use]
    pub fn new() -> Self {
        let (dismissals, _) = broadcast::channel(1);
        Self { dismissals }
    }
}

impl Notifier for LogNotifier {
    fn show(&self, notification: Notification) -> Result<()> {
        info!(
            tag = %notification.tag,
            title = %notification.title,
            "{}",
            notification.body
        );
        Ok(())
    }

    fn cancel(&self, tag: ChannelTag) {
        debug!(%tag, "Notification withdrawn");
    }

    fn show_message(&self, message: &str) {
        info!("{message}");
    }

    fn dismissals(&self) -> broadcast::Receiver<Dismissal> {
        self.dismissals.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(tag: ChannelTag, session: u64) -> Notification {
        Notification {
            tag,
            session,
            title: "Mail".to_string(),
            body: "Tap to copy".to_string(),
            icon: NotificationIcon::Clipboard,
        }
    }

    #[test]
    fn test_show_and_cancel() {
        let notifier = MemoryNotifier::new();
        notifier.show(notification(ChannelTag::Password, 1)).unwrap();
        notifier.show(notification(ChannelTag::Username, 1)).unwrap();
        assert_eq!(
            notifier.shown_tags(),
            vec![ChannelTag::Password, ChannelTag::Username]
        );

        notifier.cancel(ChannelTag::Password);
        assert!(!notifier.is_shown(ChannelTag::Password));
        assert!(notifier.is_shown(ChannelTag::Username));
        assert_eq!(notifier.history().len(), 2);
    }

    #[test]
    fn test_dismiss_broadcasts_with_session() {
        let notifier = MemoryNotifier::new();
        let mut rx = notifier.dismissals();
        notifier.show(notification(ChannelTag::KeyboardData, 7)).unwrap();

        assert!(notifier.dismiss(ChannelTag::KeyboardData));
        assert_eq!(
            rx.try_recv().unwrap(),
            Dismissal {
                tag: ChannelTag::KeyboardData,
                session: 7
            }
        );
        assert!(!notifier.is_shown(ChannelTag::KeyboardData));
    }

    #[test]
    fn test_dismiss_unknown_tag() {
        let notifier = MemoryNotifier::new();
        let mut rx = notifier.dismissals();
        assert!(!notifier.dismiss(ChannelTag::Password));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unavailable() {
        let notifier = MemoryNotifier::new();
        notifier.set_unavailable(true);
        let err = notifier
            .show(notification(ChannelTag::Password, 1))
            .unwrap_err();
        assert!(err.is_channel_unavailable());
        assert!(notifier.history().is_empty());
    }

    #[test]
    fn test_messages() {
        let notifier = MemoryNotifier::new();
        notifier.show_message("Clipboard cleared");
        assert_eq!(notifier.messages(), vec!["Clipboard cleared".to_string()]);
    }

    #[test]
    fn test_history_keeps_most_recent() {
        let notifier = MemoryNotifier::new();
        for session in 0..100 {
            notifier.show(notification(ChannelTag::Password, session)).unwrap();
            notifier.show_message(&format!("message {session}"));
        }

        let history = notifier.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].session, 36);
        assert_eq!(history[HISTORY_LIMIT - 1].session, 99);

        let messages = notifier.messages();
        assert_eq!(messages.len(), HISTORY_LIMIT);
        assert_eq!(messages[0], "message 36");
        assert_eq!(messages[HISTORY_LIMIT - 1], "message 99");
    }

    #[test]
    fn test_log_notifier_accepts_everything() {
        let notifier = LogNotifier::new();
        assert!(notifier.show(notification(ChannelTag::Password, 1)).is_ok());
        notifier.cancel(ChannelTag::Password);
        notifier.show_message("hello");
        let mut rx = notifier.dismissals();
        assert!(rx.try_recv().is_err());
    }
}
