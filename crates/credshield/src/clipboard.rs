//! Clipboard exposure channel.
//!
//! The channel writes secret values to a [`ClipboardBackend`] and remembers a
//! BLAKE3 digest of what it wrote, never the plaintext. Clearing is always
//! compare-before-clear: the clipboard is only blanked while it still holds
//! the value this channel published, so content the user copied afterwards
//! survives.

use std::sync::{Arc, Mutex, PoisonError};
#[cfg(test)]
use std::sync::atomic::{AtomicU32, Ordering};

use clipboard_rs::{Clipboard, ClipboardContext};
use tracing::{debug, trace, warn};

use crate::channel::ExposureChannel;
use crate::error::{Error, Result};

/// Raw access to a clipboard.
pub trait ClipboardBackend: Send + Sync {
    /// Replace the clipboard contents. An empty value blanks it.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be written.
    fn write(&self, value: &str) -> Result<()>;

    /// Current text contents. Non-text or empty contents read as `""`.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be accessed at all.
    fn read(&self) -> Result<String>;
}

/// The operating system clipboard, via `clipboard-rs`.
///
/// A fresh context is opened per call so the type stays `Send + Sync`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    /// Create a handle to the system clipboard.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn context() -> Result<ClipboardContext> {
        ClipboardContext::new().map_err(|e| Error::clipboard(e.to_string()))
    }
}

impl ClipboardBackend for SystemClipboard {
    fn write(&self, value: &str) -> Result<()> {
        let ctx = Self::context()?;
        let written = if value.is_empty() {
            ctx.clear()
        } else {
            ctx.set_text(value.to_string())
        };
        written.map_err(|e| Error::clipboard(e.to_string()))
    }

    fn read(&self) -> Result<String> {
        let ctx = Self::context()?;
        // No text content or non-text clipboard is not an error
        Ok(ctx.get_text().unwrap_or_default())
    }
}

/// An in-process clipboard, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<String>,
}

impl MemoryClipboard {
    /// Create an empty clipboard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents.
    #[must_use]
    pub fn contents(&self) -> String {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn write(&self, value: &str) -> Result<()> {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = value.to_string();
        Ok(())
    }

    fn read(&self) -> Result<String> {
        Ok(self.contents())
    }
}

/// A [`MemoryClipboard`] that fails a set number of upcoming reads or writes.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FlakyClipboard {
    inner: MemoryClipboard,
    failing_reads: AtomicU32,
    failing_writes: AtomicU32,
}

#[cfg(test)]
impl FlakyClipboard {
    pub(crate) fn fail_reads(&self, count: u32) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    pub(crate) fn contents(&self) -> String {
        self.inner.contents()
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[cfg(test)]
impl ClipboardBackend for FlakyClipboard {
    fn write(&self, value: &str) -> Result<()> {
        if Self::take_failure(&self.failing_writes) {
            return Err(Error::clipboard("clipboard busy"));
        }
        self.inner.write(value)
    }

    fn read(&self) -> Result<String> {
        if Self::take_failure(&self.failing_reads) {
            return Err(Error::clipboard("clipboard busy"));
        }
        self.inner.read()
    }
}

/// Exposure channel over a clipboard backend.
pub struct ClipboardChannel {
    backend: Arc<dyn ClipboardBackend>,
    published: Mutex<Option<blake3::Hash>>,
}

impl std::fmt::Debug for ClipboardChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipboardChannel")
            .field("has_data", &self.has_data())
            .finish_non_exhaustive()
    }
}

impl ClipboardChannel {
    /// Create a channel writing to `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn ClipboardBackend>) -> Self {
        Self {
            backend,
            published: Mutex::new(None),
        }
    }

    /// Read the clipboard as it is right now.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be accessed.
    pub fn read(&self) -> Result<String> {
        self.backend.read()
    }

    /// Whether the clipboard still holds what this channel last published.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be accessed.
    pub fn still_holds_published(&self) -> Result<bool> {
        let published = *self.published.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(expected) = published else {
            return Ok(false);
        };
        let current = self.backend.read()?;
        Ok(blake3::hash(current.as_bytes()) == expected)
    }

    /// Blank the clipboard if it still holds the published value.
    ///
    /// Forgets the published value once the clipboard was blanked or found
    /// overwritten. Returns `true` if the clipboard was blanked.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be read or written. The
    /// published value is still remembered then, so the clear can be retried.
    pub fn clear_if_unchanged(&self) -> Result<bool> {
        let mut published = self.published.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(expected) = *published else {
            trace!("Nothing published to the clipboard");
            return Ok(false);
        };

        let current = self.backend.read()?;
        if blake3::hash(current.as_bytes()) != expected {
            debug!("Clipboard was overwritten since publishing, leaving it alone");
            *published = None;
            return Ok(false);
        }

        self.backend.write("")?;
        *published = None;
        debug!("Clipboard cleared");
        Ok(true)
    }
}

impl ExposureChannel for ClipboardChannel {
    type Payload = str;

    fn name(&self) -> &'static str {
        "clipboard"
    }

    /// A failed write leaves the clipboard as it was, so the digest of the
    /// previous publish stays and a later clear still removes that value.
    fn publish(&self, payload: &str) -> Result<()> {
        let mut published = self.published.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.backend.write(payload) {
            warn!(error = %e, "Failed to write clipboard, keeping previous digest");
            return Err(e);
        }
        *published = Some(blake3::hash(payload.as_bytes()));
        debug!(len = payload.len(), "Published value to clipboard");
        Ok(())
    }

    fn clear(&self) -> Result<bool> {
        self.clear_if_unchanged()
    }

    fn has_data(&self) -> bool {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
