//! Outward exposure channels.
//!
//! An exposure channel is a destination outside the process that secret data
//! is published to: the system clipboard or the keyboard bridge. Every live
//! exposure is identified by a [`ChannelTag`], which is also what dismissal
//! events carry back to the coordinator.

use std::fmt;

use serde::Serialize;

use crate::error::Result;

/// Identity of a live exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelTag {
    /// The password notification (copyable to the clipboard).
    Password,
    /// The username notification (copyable to the clipboard).
    Username,
    /// Data published to the keyboard bridge.
    KeyboardData,
    /// A clipboard value waiting for its timed clear.
    ClipboardClearPending,
}

impl ChannelTag {
    /// All tags.
    pub const ALL: [Self; 4] = [
        Self::Password,
        Self::Username,
        Self::KeyboardData,
        Self::ClipboardClearPending,
    ];

    /// Stable numeric tag used towards the notification service.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Password => 1,
            Self::Username => 2,
            Self::KeyboardData => 3,
            Self::ClipboardClearPending => 4,
        }
    }

    /// Reverse of [`ChannelTag::as_u32`].
    #[must_use]
    pub const fn from_u32(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(Self::Password),
            2 => Some(Self::Username),
            3 => Some(Self::KeyboardData),
            4 => Some(Self::ClipboardClearPending),
            _ => None,
        }
    }

    /// Whether this tag is backed by a user-visible notification.
    #[must_use]
    pub const fn has_notification(self) -> bool {
        !matches!(self, Self::ClipboardClearPending)
    }
}

impl fmt::Display for ChannelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password => write!(f, "password"),
            Self::Username => write!(f, "username"),
            Self::KeyboardData => write!(f, "keyboard_data"),
            Self::ClipboardClearPending => write!(f, "clipboard_clear_pending"),
        }
    }
}

/// Which channels an expose request activated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExposedChannels {
    /// A password notification was shown.
    pub password: bool,
    /// A username notification was shown.
    pub username: bool,
    /// The keyboard bridge received a dataset.
    pub keyboard: bool,
}

impl ExposedChannels {
    /// Nothing was exposed.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            password: false,
            username: false,
            keyboard: false,
        }
    }

    /// Whether no channel was activated.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.password && !self.username && !self.keyboard
    }

    /// Number of activated channels.
    #[must_use]
    pub fn count(&self) -> usize {
        [self.password, self.username, self.keyboard]
            .into_iter()
            .filter(|active| *active)
            .count()
    }
}

/// An outward destination for secret data.
///
/// Implementations must be cheap and non-blocking; the coordinator calls them
/// while holding its state lock.
pub trait ExposureChannel: Send + Sync {
    /// What gets published.
    type Payload: ?Sized;

    /// The name of this channel (for logging).
    fn name(&self) -> &'static str;

    /// Publish a payload, replacing whatever this channel published before.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying destination rejects the write.
    fn publish(&self, payload: &Self::Payload) -> Result<()>;

    /// Retract what this channel published.
    ///
    /// Returns `true` if data was actually removed from the destination.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying destination cannot be accessed.
    fn clear(&self) -> Result<bool>;

    /// Whether this channel currently holds published data.
    fn has_data(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_tag_numeric_round_trip() {
        for tag in ChannelTag::ALL {
            assert_eq!(ChannelTag::from_u32(tag.as_u32()), Some(tag));
        }
        assert_eq!(ChannelTag::from_u32(0), None);
        assert_eq!(ChannelTag::from_u32(99), None);
    }

    #[test]
    fn test_channel_tags_are_stable() {
        assert_eq!(ChannelTag::Password.as_u32(), 1);
        assert_eq!(ChannelTag::Username.as_u32(), 2);
        assert_eq!(ChannelTag::KeyboardData.as_u32(), 3);
        assert_eq!(ChannelTag::ClipboardClearPending.as_u32(), 4);
    }

    #[test]
    fn test_channel_tag_display() {
        assert_eq!(ChannelTag::Password.to_string(), "password");
        assert_eq!(ChannelTag::KeyboardData.to_string(), "keyboard_data");
    }

    #[test]
    fn test_has_notification() {
        assert!(ChannelTag::Password.has_notification());
        assert!(ChannelTag::KeyboardData.has_notification());
        assert!(!ChannelTag::ClipboardClearPending.has_notification());
    }

    #[test]
    fn test_exposed_channels() {
        let none = ExposedChannels::none();
        assert!(none.is_empty());
        assert_eq!(none.count(), 0);
        assert_eq!(none, ExposedChannels::default());

        let some = ExposedChannels {
            password: true,
            keyboard: true,
            ..ExposedChannels::none()
        };
        assert!(!some.is_empty());
        assert_eq!(some.count(), 2);
    }
}
