//! The exposure coordinator.
//!
//! Exposing a record pushes its fields onto the enabled channels: username
//! and password notifications (with the primary field copied to the
//! clipboard) and the keyboard bridge. Every live exposure is counted. The
//! user retracts them one by one by dismissing notifications, the clipboard
//! timer retracts the copied value, and a store lock retracts everything at
//! once. When the count reaches zero the session shuts down.
//!
//! All state sits behind one mutex. Timer and listener tasks hold only a weak
//! reference to the coordinator and carry the session generation they were
//! created for, so a callback arriving after its session ended is ignored.

mod session;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, trace, warn};

use crate::channel::{ChannelTag, ExposedChannels, ExposureChannel};
use crate::clipboard::{ClipboardBackend, ClipboardChannel};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::keyboard::{
    activate_keyboard_input, InputMethodId, InputMethodService, KeyboardActivation,
    KeyboardBridge, KeyboardDataset,
};
use crate::listener::{spawn_dismissal_listener, spawn_lock_listener};
use crate::notify::{Dismissal, Notification, NotificationIcon, Notifier};
use crate::record::{Record, RecordId, StandardField};
use crate::store::RecordStore;
use crate::timer::RetractionTimer;

pub use session::SessionStatus;
use session::{ExposureSession, PendingClear};

/// Buffered coordinator events per subscriber.
const EVENT_BUFFER: usize = 64;

/// Something the coordinator did, for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// A session started with these channels.
    Exposed {
        /// Session generation.
        session: u64,
        /// Activated channels.
        channels: ExposedChannels,
    },
    /// An expose request activated no channel.
    NothingExposed,
    /// The clipboard still held our value and was blanked.
    ClipboardCleared {
        /// Session generation.
        session: u64,
    },
    /// Keyboard data was withdrawn while the session was live.
    KeyboardCleared {
        /// Session generation.
        session: u64,
    },
    /// A user-visible advisory, such as a channel that was skipped.
    Advisory {
        /// Message shown to the user.
        message: String,
    },
    /// The session ended and every channel is clear.
    ShutDown {
        /// Session generation.
        session: u64,
    },
}

/// Per-request options for an expose call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExposeOptions {
    /// The caller is closing after creating the record; bring the keyboard
    /// forward if configured to.
    pub close_after_create: bool,
}

/// Services the coordinator drives.
pub struct Collaborators {
    /// Where records come from.
    pub store: Arc<dyn RecordStore>,
    /// The system clipboard.
    pub clipboard: Arc<dyn ClipboardBackend>,
    /// The keyboard bridge.
    pub keyboard: Arc<KeyboardBridge>,
    /// Notifications and messages.
    pub notifier: Arc<dyn Notifier>,
    /// The input-method service.
    pub input_methods: Arc<dyn InputMethodService>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("keyboard", &self.keyboard)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct State {
    generation: u64,
    next_clear_seq: u64,
    session: Option<ExposureSession>,
}

struct Inner {
    config: Config,
    input_method: InputMethodId,
    runtime: Handle,
    store: Arc<dyn RecordStore>,
    clipboard: ClipboardChannel,
    keyboard: Arc<KeyboardBridge>,
    notifier: Arc<dyn Notifier>,
    input_methods: Arc<dyn InputMethodService>,
    events: broadcast::Sender<CoordinatorEvent>,
    active: watch::Sender<bool>,
    state: Mutex<State>,
}

/// Owns the exposure lifecycle of one record at a time.
///
/// Cloning is cheap and every clone drives the same coordinator. When the
/// last clone is dropped, anything still exposed is retracted.
#[derive(Clone)]
pub struct ExposureCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for ExposureCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();
        f.debug_struct("ExposureCoordinator")
            .field("generation", &state.generation)
            .field("session", &state.session.as_ref().map(|s| s.generation))
            .field("live", &state.session.as_ref().map_or(0, ExposureSession::live))
            .finish_non_exhaustive()
    }
}

impl ExposureCoordinator {
    /// Create a coordinator on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or no runtime is running.
    pub fn new(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|e| Error::internal(format!("coordinator needs a tokio runtime: {e}")))?;
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (active, _) = watch::channel(false);
        let input_method = InputMethodId::new(config.keyboard_input_method_id.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                input_method,
                runtime,
                store: collaborators.store,
                clipboard: ClipboardChannel::new(collaborators.clipboard),
                keyboard: collaborators.keyboard,
                notifier: collaborators.notifier,
                input_methods: collaborators.input_methods,
                events,
                active,
                state: Mutex::new(State::default()),
            }),
        })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Expose `record` on every enabled channel.
    ///
    /// Any previous session is retracted first. Returns the channels that
    /// were activated; if none were, the coordinator has already shut down.
    pub fn expose(&self, record: &Record, options: ExposeOptions) -> ExposedChannels {
        self.inner.expose(record, options)
    }

    /// Fetch a record from the store and expose it.
    ///
    /// A missing record (for example because the store closed concurrently)
    /// aborts the request and shuts the coordinator down.
    pub async fn expose_by_id(&self, id: &RecordId, options: ExposeOptions) -> ExposedChannels {
        match self.inner.store.record_by_id(id).await {
            Ok(record) => self.expose(&record, options),
            Err(e) => {
                warn!(record = %id, error = %e, "Cannot expose record");
                self.abort_request()
            }
        }
    }

    /// Expose the record the user opened most recently.
    pub async fn expose_last_opened(&self, options: ExposeOptions) -> ExposedChannels {
        match self.inner.store.last_opened_record().await {
            Some(record) => self.expose(&record, options),
            None => {
                warn!("No open record to expose");
                self.abort_request()
            }
        }
    }

    fn abort_request(&self) -> ExposedChannels {
        self.shutdown();
        self.inner.emit(CoordinatorEvent::NothingExposed);
        ExposedChannels::none()
    }

    /// Copy the username or password of the active session to the clipboard,
    /// restarting the clear timer.
    ///
    /// Returns `false` if there is no session or the field has no value.
    pub fn copy_to_clipboard(&self, tag: ChannelTag) -> bool {
        let mut state = self.inner.state();
        state.next_clear_seq += 1;
        let seq = state.next_clear_seq;
        let Some(session) = state.session.as_mut() else {
            debug!(%tag, "No session to copy from");
            return false;
        };
        self.inner.copy_field(session, tag, seq)
    }

    /// Retract one live exposure. Shuts down when it was the last one.
    ///
    /// Retracting something that is not live does nothing.
    pub fn retract_one(&self, tag: ChannelTag) {
        let mut state = self.inner.state();
        self.inner.retract_one_locked(&mut state, tag);
    }

    /// Retract every exposure and discard the session without signalling a
    /// shutdown. With `announce_keyboard`, clearing keyboard data that
    /// existed emits [`CoordinatorEvent::KeyboardCleared`].
    pub fn retract_all(&self, announce_keyboard: bool) {
        let mut state = self.inner.state();
        self.inner.retract_all_locked(&mut state, announce_keyboard);
        self.inner.active.send_replace(false);
    }

    /// Retract everything and stop. Calling this while idle does nothing.
    pub fn shutdown(&self) {
        let mut state = self.inner.state();
        self.inner.shutdown_locked(&mut state);
    }

    /// The record store locked: retract everything immediately.
    pub fn on_lock(&self) {
        info!("Record store locked, retracting all exposures");
        self.shutdown();
    }

    /// Handle a dismissed notification.
    pub fn on_dismissal(&self, dismissal: Dismissal) {
        self.inner.on_dismissal(dismissal);
    }

    /// Snapshot of the active session.
    #[must_use]
    pub fn status(&self) -> Option<SessionStatus> {
        self.inner.state().session.as_ref().map(ExposureSession::status)
    }

    /// Number of live exposures (zero when idle).
    #[must_use]
    pub fn live_count(&self) -> u32 {
        self.inner
            .state()
            .session
            .as_ref()
            .map_or(0, ExposureSession::live)
    }

    /// Whether a session is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self.inner.active.borrow()
    }

    /// Read the clipboard as it is now.
    ///
    /// # Errors
    ///
    /// Returns an error if the clipboard cannot be read.
    pub fn read_clipboard(&self) -> Result<String> {
        self.inner.clipboard.read()
    }

    /// The keyboard bridge.
    #[must_use]
    pub fn keyboard(&self) -> &Arc<KeyboardBridge> {
        &self.inner.keyboard
    }

    /// Follow coordinator events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until no session is active.
    pub async fn wait_for_shutdown(&self) {
        let mut active = self.inner.active.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = active.wait_for(|active| !*active).await;
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CoordinatorEvent) {
        trace!(?event, "Coordinator event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn advise(&self, message: String) {
        self.notifier.show_message(&message);
        self.emit(CoordinatorEvent::Advisory { message });
    }

    fn expose(self: &Arc<Self>, record: &Record, options: ExposeOptions) -> ExposedChannels {
        let mut state = self.state();

        if self.store.is_locked() {
            warn!(record = %record.id, "Record store is locked, nothing exposed");
            self.shutdown_locked(&mut state);
            self.emit(CoordinatorEvent::NothingExposed);
            return ExposedChannels::none();
        }
        self.retract_all_locked(&mut state, false);

        state.generation += 1;
        state.next_clear_seq += 1;
        let generation = state.generation;
        let clear_seq = state.next_clear_seq;
        // Subscribe before anything is shown so no dismissal is missed.
        let dismissals = self.notifier.dismissals();
        let session = state
            .session
            .insert(ExposureSession::new(generation, record.clone()));
        info!(session = generation, record = %record.id, "Starting exposure session");

        if record.has_standard_values() {
            if self.config.enable_clipboard_notifications {
                self.expose_clipboard_fields(session, clear_seq);
            }
            if self.config.enable_keyboard_bridge {
                self.expose_keyboard(session, options);
            }
        }

        let exposed = session.exposed;
        if session.live() == 0 {
            info!(session = generation, "Nothing to expose");
            self.emit(CoordinatorEvent::NothingExposed);
            self.shutdown_locked(&mut state);
            return exposed;
        }

        let weak = Arc::downgrade(self);
        session.dismissal_listener = Some(spawn_dismissal_listener(
            &self.runtime,
            dismissals,
            move |dismissal| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_dismissal(dismissal);
                }
            },
        ));
        let weak = Arc::downgrade(self);
        session.lock_listener = Some(spawn_lock_listener(
            &self.runtime,
            self.store.lock_state(),
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_lock(generation);
                }
            },
        ));

        debug!(
            session = generation,
            live = session.live(),
            channels = exposed.count(),
            "Exposure session live"
        );
        self.active.send_replace(true);
        self.emit(CoordinatorEvent::Exposed {
            session: generation,
            channels: exposed,
        });
        exposed
    }

    fn expose_clipboard_fields(self: &Arc<Self>, session: &mut ExposureSession, clear_seq: u64) {
        for (tag, field) in [
            (ChannelTag::Username, StandardField::Username),
            (ChannelTag::Password, StandardField::Password),
        ] {
            if session.record.non_empty(field).is_none() {
                continue;
            }
            let body = format!("{} available, select to copy", field.label());
            if self.show(session, tag, body, NotificationIcon::Clipboard) {
                match tag {
                    ChannelTag::Username => session.exposed.username = true,
                    _ => session.exposed.password = true,
                }
            }
        }

        let primary = if session.exposed.password {
            ChannelTag::Password
        } else if session.exposed.username {
            ChannelTag::Username
        } else {
            return;
        };
        self.copy_field(session, primary, clear_seq);
    }

    fn expose_keyboard(&self, session: &mut ExposureSession, options: ExposeOptions) {
        let dataset = KeyboardDataset::from_record(&session.record);
        if dataset.is_empty() {
            return;
        }
        if let Err(e) = self.keyboard.publish(&dataset) {
            warn!(error = %e, "Keyboard bridge rejected the record");
            self.advise(format!("Keyboard unavailable: {e}"));
            return;
        }

        let body = "Fields available in the credshield keyboard".to_string();
        if !self.show(session, ChannelTag::KeyboardData, body, NotificationIcon::Keyboard) {
            self.clear_keyboard(session.generation, false);
            return;
        }
        session.exposed.keyboard = true;

        if options.close_after_create && self.config.auto_open_keyboard_chooser {
            match activate_keyboard_input(self.input_methods.as_ref(), &self.input_method) {
                Ok(KeyboardActivation::OpenedSettings) => self.advise(format!(
                    "Enable the {} keyboard to fill in fields",
                    self.input_method
                )),
                Ok(activation) => debug!(?activation, "Keyboard activated"),
                Err(e) => {
                    warn!(error = %e, "Cannot activate keyboard");
                    self.advise(format!("Keyboard could not be opened: {e}"));
                }
            }
        }
    }

    /// Show the notification for `tag` and count it live. A notifier that
    /// refuses is reported and the channel skipped.
    fn show(
        &self,
        session: &mut ExposureSession,
        tag: ChannelTag,
        body: String,
        icon: NotificationIcon,
    ) -> bool {
        let notification = Notification {
            tag,
            session: session.generation,
            title: session.display_title(),
            body,
            icon,
        };
        match self.notifier.show(notification) {
            Ok(()) => {
                session.acquire(tag);
                true
            }
            Err(e) => {
                warn!(%tag, error = %e, "Skipping channel");
                self.advise(format!("Cannot show {tag} notification: {e}"));
                false
            }
        }
    }

    fn copy_field(self: &Arc<Self>, session: &mut ExposureSession, tag: ChannelTag, seq: u64) -> bool {
        let field = match tag {
            ChannelTag::Username => StandardField::Username,
            ChannelTag::Password => StandardField::Password,
            ChannelTag::KeyboardData | ChannelTag::ClipboardClearPending => return false,
        };
        let Some(value) = session.record.non_empty(field) else {
            debug!(%tag, "Nothing to copy");
            return false;
        };
        if let Err(e) = self.clipboard.publish(value.expose()) {
            warn!(%tag, error = %e, "Cannot copy to clipboard");
            self.advise(format!("Cannot copy {} to the clipboard: {e}", field.label()));
            return false;
        }
        debug!(session = session.generation, %tag, "Copied to clipboard");

        // A re-copy replaces the pending clear; the live count stays put.
        if let Some(mut previous) = session.pending_clear.take() {
            previous.timer.cancel();
            session.release(ChannelTag::ClipboardClearPending);
        }

        if let Some(delay) = self.config.clipboard_timeout() {
            let weak = Arc::downgrade(self);
            let generation = session.generation;
            let timer = RetractionTimer::arm(&self.runtime, delay, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_clipboard_timeout(generation, seq);
                }
            });
            session.pending_clear = Some(PendingClear {
                seq,
                field: tag,
                timer,
            });
            session.acquire(ChannelTag::ClipboardClearPending);
        }
        true
    }

    fn on_clipboard_timeout(&self, generation: u64, seq: u64) {
        let mut state = self.state();
        let Some(session) = state.session.as_mut() else {
            trace!(session = generation, "Clipboard timer fired while idle");
            return;
        };
        if session.generation != generation {
            trace!(session = generation, "Stale clipboard timer");
            return;
        }
        let field = match session.pending_clear.take() {
            Some(pending) if pending.seq == seq => pending.field,
            other => {
                session.pending_clear = other;
                trace!(session = generation, seq, "Clipboard timer was replaced");
                return;
            }
        };

        info!(session = generation, "Clipboard timeout elapsed");
        self.clear_clipboard(generation);
        self.retract_one_locked(&mut state, ChannelTag::ClipboardClearPending);
        self.retract_one_locked(&mut state, field);
    }

    fn on_dismissal(&self, dismissal: Dismissal) {
        let mut state = self.state();
        if state.session.as_ref().map(|s| s.generation) != Some(dismissal.session) {
            trace!(tag = %dismissal.tag, session = dismissal.session, "Stale dismissal");
            return;
        }
        debug!(tag = %dismissal.tag, session = dismissal.session, "Notification dismissed");
        self.retract_one_locked(&mut state, dismissal.tag);
    }

    fn on_lock(&self, generation: u64) {
        let mut state = self.state();
        if state.session.as_ref().map(|s| s.generation) != Some(generation) {
            trace!(session = generation, "Stale lock signal");
            return;
        }
        info!(session = generation, "Record store locked, retracting all exposures");
        self.shutdown_locked(&mut state);
    }

    fn retract_one_locked(&self, state: &mut State, tag: ChannelTag) {
        let Some(session) = state.session.as_mut() else {
            trace!(%tag, "No session, ignoring retraction");
            return;
        };
        if !session.release(tag) {
            debug!(%tag, "Exposure already retracted");
            return;
        }
        let generation = session.generation;

        match tag {
            ChannelTag::Username | ChannelTag::Password => self.notifier.cancel(tag),
            ChannelTag::KeyboardData => {
                self.notifier.cancel(tag);
                self.clear_keyboard(generation, true);
            }
            ChannelTag::ClipboardClearPending => {
                if let Some(mut pending) = session.pending_clear.take() {
                    pending.timer.cancel();
                }
                self.clear_clipboard(generation);
            }
        }

        let live = session.live();
        debug!(session = generation, %tag, live, "Exposure retracted");
        if live == 0 {
            self.shutdown_locked(state);
        }
    }

    /// Clear every channel and drop the session, if there is one.
    fn retract_all_locked(&self, state: &mut State, announce_keyboard: bool) {
        let Some(mut session) = state.session.take() else {
            return;
        };
        let generation = session.generation;

        if let Some(mut pending) = session.pending_clear.take() {
            pending.timer.cancel();
        }
        self.clear_clipboard(generation);
        for tag in session.live_tags() {
            if tag.has_notification() {
                self.notifier.cancel(tag);
            }
        }
        self.clear_keyboard(generation, announce_keyboard);
        session.unregister_listeners();
        debug!(session = generation, "All exposures retracted");
    }

    fn shutdown_locked(&self, state: &mut State) {
        let Some(generation) = state.session.as_ref().map(|s| s.generation) else {
            trace!("Already shut down");
            return;
        };
        self.retract_all_locked(state, true);
        info!(session = generation, "Exposure session shut down");
        self.emit(CoordinatorEvent::ShutDown {
            session: generation,
        });
        self.active.send_replace(false);
    }

    fn clear_clipboard(&self, generation: u64) {
        match self.clipboard.clear_if_unchanged() {
            Ok(true) => {
                info!(session = generation, "Clipboard cleared");
                self.notifier.show_message("Clipboard cleared");
                self.emit(CoordinatorEvent::ClipboardCleared {
                    session: generation,
                });
            }
            Ok(false) => {}
            Err(e) => warn!(session = generation, error = %e, "Cannot clear clipboard"),
        }
    }

    fn clear_keyboard(&self, generation: u64, announce: bool) {
        match self.keyboard.clear() {
            Ok(true) if announce => {
                debug!(session = generation, "Keyboard data cleared");
                self.emit(CoordinatorEvent::KeyboardCleared {
                    session: generation,
                });
            }
            Ok(_) => {}
            Err(e) => warn!(session = generation, error = %e, "Cannot clear keyboard data"),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let mut state = std::mem::take(self.state.get_mut().unwrap_or_else(PoisonError::into_inner));
        if state.session.is_some() {
            debug!("Coordinator dropped with a live session");
            self.retract_all_locked(&mut state, true);
        } else if self.clipboard.has_data() {
            debug!("Retrying clipboard clear on drop");
            self.clear_clipboard(state.generation);
        }
    }
}
