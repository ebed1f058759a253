//! Keyboard bridge exposure channel.
//!
//! The bridge holds the dataset a virtual keyboard offers for typing: one
//! entry per non-empty field of the exposed record. Standard fields come first
//! in a fixed order, then custom fields in their stored order.
//!
//! The dataset lives behind a [`tokio::sync::watch`] channel. Publishing swaps
//! in a complete new dataset in one step, so an input-method integration
//! subscribed through [`KeyboardBridge::subscribe`] never sees a partially
//! built set.

pub mod input_method;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::channel::ExposureChannel;
use crate::error::Result;
use crate::record::{Record, RecordId, SecretValue, StandardField};

pub use input_method::{
    activate_keyboard_input, InputMethodId, InputMethodService, KeyboardActivation,
    StaticInputMethods, UnavailableInputMethods,
};

/// One typeable entry: field key, display label and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardField {
    /// Field key (standard key or custom field name).
    pub key: String,
    /// Label shown by the keyboard.
    pub label: String,
    /// The secret value.
    pub value: SecretValue,
}

/// Everything the keyboard offers for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardDataset {
    /// Record the fields were taken from.
    pub entry_id: RecordId,
    /// Record title, possibly empty.
    pub entry_title: String,
    /// Ordered fields.
    pub fields: Vec<KeyboardField>,
}

impl KeyboardDataset {
    /// Build the dataset for a record.
    ///
    /// Empty values are skipped. The title is both the entry title and, when
    /// non-empty, the last standard field.
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        let standard = StandardField::KEYBOARD_ORDER
            .into_iter()
            .filter_map(|field| {
                record.non_empty(field).map(|value| KeyboardField {
                    key: field.key().to_string(),
                    label: field.label().to_string(),
                    value: value.clone(),
                })
            });

        let custom = record
            .custom_fields()
            .filter(|f| !f.value.is_empty())
            .map(|f| KeyboardField {
                key: f.name.clone(),
                label: f.name.clone(),
                value: f.value.clone(),
            });

        Self {
            entry_id: record.id,
            entry_title: record.title().to_string(),
            fields: standard.chain(custom).collect(),
        }
    }

    /// Whether there is nothing to type.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }
}

/// Holder of the dataset currently offered to the keyboard.
#[derive(Debug)]
pub struct KeyboardBridge {
    current: watch::Sender<Option<Arc<KeyboardDataset>>>,
}

impl Default for KeyboardBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardBridge {
    /// Create an empty bridge.
    #[must_use]
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    /// Replace the dataset in one step.
    pub fn replace_dataset(&self, dataset: KeyboardDataset) {
        debug!(
            entry = %dataset.entry_id,
            fields = dataset.fields.len(),
            "Replacing keyboard dataset"
        );
        self.current.send_replace(Some(Arc::new(dataset)));
    }

    /// The dataset as of now.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<KeyboardDataset>> {
        self.current.borrow().clone()
    }

    /// Follow dataset replacements and clears.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<KeyboardDataset>>> {
        self.current.subscribe()
    }
}

impl ExposureChannel for KeyboardBridge {
    type Payload = KeyboardDataset;

    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn publish(&self, payload: &KeyboardDataset) -> Result<()> {
        self.replace_dataset(payload.clone());
        Ok(())
    }

    fn clear(&self) -> Result<bool> {
        let previous = self.current.send_replace(None);
        if previous.is_some() {
            debug!("Keyboard dataset cleared");
        }
        Ok(previous.is_some())
    }

    fn has_data(&self) -> bool {
        self.current.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::new(RecordId::from_bytes([7; 16]))
            .with_field("title", "t")
            .with_field("pin", "1234")
            .with_field("password", "p")
            .with_field("username", "u")
    }

    #[test]
    fn test_dataset_order() {
        let dataset = KeyboardDataset::from_record(&record());
        let keys: Vec<&str> = dataset.keys().collect();
        assert_eq!(keys, vec!["username", "password", "title", "pin"]);
        assert_eq!(dataset.entry_title, "t");
        assert_eq!(dataset.entry_id, RecordId::from_bytes([7; 16]));
    }

    #[test]
    fn test_dataset_labels_and_values() {
        let dataset = KeyboardDataset::from_record(&record());
        assert_eq!(dataset.fields[0].label, "Username");
        assert_eq!(dataset.fields[0].value.expose(), "u");
        assert_eq!(dataset.fields[3].label, "pin");
        assert_eq!(dataset.fields[3].value.expose(), "1234");
    }

    #[test]
    fn test_dataset_skips_empty_values() {
        let record = Record::new(RecordId::from_bytes([1; 16]))
            .with_field("url", "")
            .with_field("notes", "n")
            .with_field("otp", "");
        let dataset = KeyboardDataset::from_record(&record);
        let keys: Vec<&str> = dataset.keys().collect();
        assert_eq!(keys, vec!["notes"]);
        assert_eq!(dataset.entry_title, "");
    }

    #[test]
    fn test_empty_dataset() {
        let record = Record::new(RecordId::from_bytes([1; 16]));
        assert!(KeyboardDataset::from_record(&record).is_empty());
    }

    #[test]
    fn test_bridge_publish_and_clear() {
        let bridge = KeyboardBridge::new();
        assert!(!bridge.has_data());
        assert!(!bridge.clear().unwrap());

        bridge
            .publish(&KeyboardDataset::from_record(&record()))
            .unwrap();
        assert!(bridge.has_data());
        assert_eq!(bridge.snapshot().unwrap().fields.len(), 4);

        assert!(bridge.clear().unwrap());
        assert!(!bridge.has_data());
        assert!(bridge.snapshot().is_none());
        assert!(!bridge.clear().unwrap());
    }

    #[test]
    fn test_subscriber_sees_whole_datasets() {
        let bridge = KeyboardBridge::new();
        let mut rx = bridge.subscribe();
        assert!(rx.borrow_and_update().is_none());

        bridge.replace_dataset(KeyboardDataset::from_record(&record()));
        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone().unwrap();
        assert_eq!(seen.fields.len(), 4);

        bridge.clear().unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
    }
}
