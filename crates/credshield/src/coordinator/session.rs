//! Working state for the record currently exposed.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::channel::{ChannelTag, ExposedChannels};
use crate::listener::ListenerRegistration;
use crate::record::{Record, RecordId};
use crate::timer::RetractionTimer;

/// A clipboard value waiting for its timed clear.
#[derive(Debug)]
pub(super) struct PendingClear {
    /// Distinguishes re-armed timers within one session.
    pub(super) seq: u64,
    /// The field whose value was copied.
    pub(super) field: ChannelTag,
    pub(super) timer: RetractionTimer,
}

/// One exposure session. Dropping it wipes the record snapshot and
/// unregisters its listeners.
#[derive(Debug)]
pub(super) struct ExposureSession {
    pub(super) generation: u64,
    pub(super) record: Record,
    pub(super) started_at: DateTime<Utc>,
    pub(super) exposed: ExposedChannels,
    pub(super) pending_clear: Option<PendingClear>,
    pub(super) dismissal_listener: Option<ListenerRegistration>,
    pub(super) lock_listener: Option<ListenerRegistration>,
    live: u32,
    live_tags: BTreeSet<ChannelTag>,
}

impl ExposureSession {
    pub(super) fn new(generation: u64, record: Record) -> Self {
        Self {
            generation,
            record,
            started_at: Utc::now(),
            exposed: ExposedChannels::none(),
            pending_clear: None,
            dismissal_listener: None,
            lock_listener: None,
            live: 0,
            live_tags: BTreeSet::new(),
        }
    }

    /// Count `tag` as live. Returns `false` if it already was.
    pub(super) fn acquire(&mut self, tag: ChannelTag) -> bool {
        if !self.live_tags.insert(tag) {
            return false;
        }
        self.live += 1;
        true
    }

    /// Stop counting `tag`. Returns `false` if it was not live, so a
    /// duplicate or late retraction never decrements twice.
    pub(super) fn release(&mut self, tag: ChannelTag) -> bool {
        if !self.live_tags.remove(&tag) {
            return false;
        }
        self.live -= 1;
        true
    }

    pub(super) fn live(&self) -> u32 {
        self.live
    }

    pub(super) fn live_tags(&self) -> Vec<ChannelTag> {
        self.live_tags.iter().copied().collect()
    }

    pub(super) fn display_title(&self) -> String {
        let title = self.record.title();
        if title.is_empty() {
            format!("Entry {}", &self.record.id.to_string()[..8])
        } else {
            title.to_string()
        }
    }

    pub(super) fn unregister_listeners(&mut self) {
        for registration in [&mut self.dismissal_listener, &mut self.lock_listener]
            .into_iter()
            .flatten()
        {
            registration.unregister();
        }
    }

    pub(super) fn status(&self) -> SessionStatus {
        SessionStatus {
            generation: self.generation,
            record_id: self.record.id,
            title: self.record.title().to_string(),
            live: self.live,
            live_tags: self.live_tags(),
            exposed: self.exposed,
            clipboard_clear_in: self.pending_clear.as_ref().map(|p| p.timer.remaining()),
            started_at: self.started_at,
        }
    }
}

/// Read-only snapshot of the active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    /// Session generation.
    pub generation: u64,
    /// Exposed record.
    pub record_id: RecordId,
    /// Record title.
    pub title: String,
    /// Live exposure count.
    pub live: u32,
    /// Live exposures.
    pub live_tags: Vec<ChannelTag>,
    /// Channels activated when the session started.
    pub exposed: ExposedChannels,
    /// Time left until the clipboard is cleared, if a clear is pending.
    pub clipboard_clear_in: Option<Duration>,
    /// When the session started.
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ExposureSession {
        ExposureSession::new(3, Record::new(RecordId::from_bytes([0xab; 16])))
    }

    #[test]
    fn test_acquire_release_counts_once() {
        let mut session = session();
        assert!(session.acquire(ChannelTag::Password));
        assert!(!session.acquire(ChannelTag::Password));
        assert!(session.acquire(ChannelTag::KeyboardData));
        assert_eq!(session.live(), 2);

        assert!(session.release(ChannelTag::Password));
        assert!(!session.release(ChannelTag::Password));
        assert!(!session.release(ChannelTag::Username));
        assert_eq!(session.live(), 1);
        assert_eq!(session.live_tags(), vec![ChannelTag::KeyboardData]);
    }

    #[test]
    fn test_display_title_falls_back_to_id() {
        let session = session();
        assert_eq!(session.display_title(), "Entry abababab");

        let titled = ExposureSession::new(
            1,
            Record::new(RecordId::from_bytes([1; 16])).with_field("title", "Mail"),
        );
        assert_eq!(titled.display_title(), "Mail");
    }

    #[test]
    fn test_status_snapshot() {
        let mut session = session();
        session.acquire(ChannelTag::Username);
        let status = session.status();
        assert_eq!(status.generation, 3);
        assert_eq!(status.live, 1);
        assert_eq!(status.live_tags, vec![ChannelTag::Username]);
        assert!(status.clipboard_clear_in.is_none());
    }
}
