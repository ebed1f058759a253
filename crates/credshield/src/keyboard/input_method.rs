//! Switching the system input method to the credshield keyboard.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Identifier of an input method as known to the OS.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputMethodId(String);

impl InputMethodId {
    /// Wrap an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InputMethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// OS capability for inspecting and switching input methods.
pub trait InputMethodService: Send + Sync {
    /// The input method currently in use, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelUnavailable`] if there is no input-method service.
    fn active_input_method(&self) -> Result<Option<InputMethodId>>;

    /// Input methods the user has enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelUnavailable`] if there is no input-method service.
    fn enabled_input_methods(&self) -> Result<Vec<InputMethodId>>;

    /// Make `id` the active input method.
    ///
    /// # Errors
    ///
    /// Returns an error if the switch is refused.
    fn switch_to(&self, id: &InputMethodId) -> Result<()>;

    /// Show or hide the on-screen keyboard.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyboard cannot be toggled.
    fn toggle_visibility(&self) -> Result<()>;

    /// Open the system input-method settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be opened.
    fn open_settings(&self) -> Result<()>;
}

/// What [`activate_keyboard_input`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardActivation {
    /// Our keyboard was already active; its visibility was toggled.
    ToggledVisibility,
    /// Our keyboard is not enabled; settings were opened and the user must be prompted.
    OpenedSettings,
    /// The active input method was switched to our keyboard.
    Switched,
}

/// Bring the credshield keyboard to the foreground.
///
/// # Errors
///
/// Propagates errors from the input-method service.
pub fn activate_keyboard_input(
    service: &dyn InputMethodService,
    own: &InputMethodId,
) -> Result<KeyboardActivation> {
    if service.active_input_method()?.as_ref() == Some(own) {
        service.toggle_visibility()?;
        debug!(input_method = %own, "Toggled keyboard visibility");
        return Ok(KeyboardActivation::ToggledVisibility);
    }

    if !service.enabled_input_methods()?.contains(own) {
        info!(input_method = %own, "Keyboard not enabled, opening input method settings");
        service.open_settings()?;
        return Ok(KeyboardActivation::OpenedSettings);
    }

    service.switch_to(own)?;
    debug!(input_method = %own, "Switched input method");
    Ok(KeyboardActivation::Switched)
}

/// Input-method service for hosts without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableInputMethods;

impl UnavailableInputMethods {
    fn unavailable<T>() -> Result<T> {
        Err(Error::channel_unavailable(
            "input method service",
            "not available on this host",
        ))
    }
}

impl InputMethodService for UnavailableInputMethods {
    fn active_input_method(&self) -> Result<Option<InputMethodId>> {
        Self::unavailable()
    }

    fn enabled_input_methods(&self) -> Result<Vec<InputMethodId>> {
        Self::unavailable()
    }

    fn switch_to(&self, _id: &InputMethodId) -> Result<()> {
        Self::unavailable()
    }

    fn toggle_visibility(&self) -> Result<()> {
        Self::unavailable()
    }

    fn open_settings(&self) -> Result<()> {
        Self::unavailable()
    }
}

#[derive(Debug, Default)]
struct StaticState {
    active: Option<InputMethodId>,
    enabled: Vec<InputMethodId>,
    visible: bool,
    settings_opened: u32,
}

/// An in-memory input-method service, for embedding and tests.
#[derive(Debug, Default)]
pub struct StaticInputMethods {
    state: Mutex<StaticState>,
}

impl StaticInputMethods {
    /// Create a service with the given enabled methods and active method.
    #[must_use]
    pub fn new(enabled: Vec<InputMethodId>, active: Option<InputMethodId>) -> Self {
        Self {
            state: Mutex::new(StaticState {
                active,
                enabled,
                visible: false,
                settings_opened: 0,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StaticState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The active method.
    #[must_use]
    pub fn active(&self) -> Option<InputMethodId> {
        self.state().active.clone()
    }

    /// Whether the keyboard is shown.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.state().visible
    }

    /// How many times settings were opened.
    #[must_use]
    pub fn settings_opened(&self) -> u32 {
        self.state().settings_opened
    }
}

impl InputMethodService for StaticInputMethods {
    fn active_input_method(&self) -> Result<Option<InputMethodId>> {
        Ok(self.state().active.clone())
    }

    fn enabled_input_methods(&self) -> Result<Vec<InputMethodId>> {
        Ok(self.state().enabled.clone())
    }

    fn switch_to(&self, id: &InputMethodId) -> Result<()> {
        let mut state = self.state();
        if !state.enabled.contains(id) {
            return Err(Error::input_method(format!("{id} is not enabled")));
        }
        state.active = Some(id.clone());
        Ok(())
    }

    fn toggle_visibility(&self) -> Result<()> {
        let mut state = self.state();
        state.visible = !state.visible;
        Ok(())
    }

    fn open_settings(&self) -> Result<()> {
        self.state().settings_opened += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn own() -> InputMethodId {
        InputMethodId::new("credshield.keyboard")
    }

    fn other() -> InputMethodId {
        InputMethodId::new("system.latin")
    }

    #[test]
    fn test_toggles_when_already_active() {
        let service = StaticInputMethods::new(vec![own(), other()], Some(own()));
        let outcome = activate_keyboard_input(&service, &own()).unwrap();
        assert_eq!(outcome, KeyboardActivation::ToggledVisibility);
        assert!(service.is_visible());
        assert_eq!(service.settings_opened(), 0);
    }

    #[test]
    fn test_opens_settings_when_not_enabled() {
        let service = StaticInputMethods::new(vec![other()], Some(other()));
        let outcome = activate_keyboard_input(&service, &own()).unwrap();
        assert_eq!(outcome, KeyboardActivation::OpenedSettings);
        assert_eq!(service.settings_opened(), 1);
        assert_eq!(service.active(), Some(other()));
    }

    #[test]
    fn test_switches_when_enabled() {
        let service = StaticInputMethods::new(vec![other(), own()], Some(other()));
        let outcome = activate_keyboard_input(&service, &own()).unwrap();
        assert_eq!(outcome, KeyboardActivation::Switched);
        assert_eq!(service.active(), Some(own()));
        assert_eq!(service.settings_opened(), 0);
    }

    #[test]
    fn test_switches_when_nothing_active() {
        let service = StaticInputMethods::new(vec![own()], None);
        let outcome = activate_keyboard_input(&service, &own()).unwrap();
        assert_eq!(outcome, KeyboardActivation::Switched);
    }

    #[test]
    fn test_unavailable_service() {
        let err = activate_keyboard_input(&UnavailableInputMethods, &own()).unwrap_err();
        assert!(err.is_channel_unavailable());
    }

    #[test]
    fn test_switch_to_disabled_fails() {
        let service = StaticInputMethods::new(vec![other()], None);
        assert!(service.switch_to(&own()).is_err());
    }
}
