//! `credshield` - Controlled exposure of credential fields
//!
//! This library exposes the fields of a credential record on transient
//! channels (notifications backed by the clipboard, and a keyboard bridge)
//! and retracts them again: one by one as the user dismisses them, when the
//! clipboard timeout elapses, or all at once when the record store locks.
//! [`ExposureCoordinator`] owns that lifecycle.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod channel;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod keyboard;
pub mod listener;
pub mod logging;
pub mod notify;
pub mod record;
pub mod store;
pub mod timer;

pub use channel::{ChannelTag, ExposedChannels};
pub use config::Config;
pub use coordinator::{
    Collaborators, CoordinatorEvent, ExposeOptions, ExposureCoordinator, SessionStatus,
};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use record::{Record, RecordId};
