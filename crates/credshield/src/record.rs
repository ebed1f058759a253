//! Credential records as handed over by the record store.
//!
//! A [`Record`] is a read-only snapshot: an identifier plus an ordered list of
//! named fields. Values are wrapped in [`SecretValue`], which wipes its memory
//! when dropped and never prints its contents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Error;

/// Length in bytes of a record identifier.
pub const RECORD_ID_LEN: usize = 16;

/// Opaque, fixed-length record identifier.
///
/// Rendered and parsed as 32 lowercase hexadecimal characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId([u8; RECORD_ID_LEN]);

impl RecordId {
    /// Creates an identifier from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; RECORD_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; RECORD_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| Error::InvalidRecordId {
            input: s.to_string(),
            reason,
        };

        if s.len() != RECORD_ID_LEN * 2 {
            return Err(invalid("expected 32 hex characters"));
        }

        let mut bytes = [0u8; RECORD_ID_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = s
                .get(i * 2..i * 2 + 2)
                .ok_or_else(|| invalid("expected ASCII hex digits"))?;
            *byte = u8::from_str_radix(pair, 16).map_err(|_| invalid("expected hex digits"))?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for RecordId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.to_string()
    }
}

/// A secret field value that is zeroized on drop.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Deserialize)]
#[serde(transparent)]
pub struct SecretValue(String);

impl SecretValue {
    /// Wraps a value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrows the plaintext. Callers must not log or persist it.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue(<{} bytes>)", self.0.len())
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The fields every record may carry, as opposed to custom fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardField {
    /// Record title.
    Title,
    /// Account user name.
    Username,
    /// Account password.
    Password,
    /// Associated URL.
    Url,
    /// Free-form notes.
    Notes,
}

impl StandardField {
    /// All standard fields.
    pub const ALL: [Self; 5] = [
        Self::Title,
        Self::Username,
        Self::Password,
        Self::Url,
        Self::Notes,
    ];

    /// Order in which standard fields are handed to the keyboard bridge.
    pub const KEYBOARD_ORDER: [Self; 5] = [
        Self::Username,
        Self::Password,
        Self::Url,
        Self::Notes,
        Self::Title,
    ];

    /// Canonical field key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Username => "username",
            Self::Password => "password",
            Self::Url => "url",
            Self::Notes => "notes",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Username => "Username",
            Self::Password => "Password",
            Self::Url => "URL",
            Self::Notes => "Notes",
        }
    }

    /// Matches a field name against the standard keys, ignoring ASCII case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.key().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for StandardField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One named field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Field {
    /// Field name as stored.
    pub name: String,
    /// Field value.
    #[serde(default)]
    pub value: SecretValue,
}

impl Field {
    /// The standard field this one represents, if any.
    #[must_use]
    pub fn standard(&self) -> Option<StandardField> {
        StandardField::from_name(&self.name)
    }
}

/// A read-only snapshot of a credential record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Record {
    /// Record identifier.
    pub id: RecordId,
    /// Fields in their stored order.
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Record {
    /// Creates a record without fields.
    #[must_use]
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: Vec::new(),
        }
    }

    /// Appends a field, builder style.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: SecretValue::new(value),
        });
        self
    }

    /// Looks up a standard field. The first matching field wins.
    #[must_use]
    pub fn standard(&self, field: StandardField) -> Option<&SecretValue> {
        self.fields
            .iter()
            .find(|f| f.standard() == Some(field))
            .map(|f| &f.value)
    }

    /// A standard field's value, only when present and non-empty.
    #[must_use]
    pub fn non_empty(&self, field: StandardField) -> Option<&SecretValue> {
        self.standard(field).filter(|value| !value.is_empty())
    }

    /// The record title, or an empty string.
    #[must_use]
    pub fn title(&self) -> &str {
        self.standard(StandardField::Title)
            .map_or("", SecretValue::expose)
    }

    /// Custom fields in their stored order.
    pub fn custom_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.standard().is_none())
    }

    /// Whether any standard field carries a value.
    #[must_use]
    pub fn has_standard_values(&self) -> bool {
        StandardField::ALL
            .into_iter()
            .any(|field| self.non_empty(field).is_some())
    }
}
