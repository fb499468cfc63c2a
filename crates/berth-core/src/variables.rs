//! Environment variable records and copy-on-write variable sets.
//!
//! A [`VariableSet`] is an immutable snapshot: every edit returns a new set
//! and leaves the receiver untouched, so a reader holding an older snapshot
//! (a request still serializing a response, a save in flight) never observes
//! a later edit. Records are kept in insertion order; nothing is sorted or
//! deduplicated here.
//!
//! Secret flags follow one rule: editing a key reclassifies the record with
//! [`is_secret_key`]; editing a value or toggling the flag never does. A
//! manual toggle therefore sticks until the key is edited again.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::is_secret_key;

/// One key/value entry attached to a resource.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariable {
    /// Stable identity for the record's whole lifetime; never reused.
    pub id: Uuid,
    pub key: String,
    pub value: String,
    pub is_secret: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnvironmentVariable {
    /// A fresh record with an empty key and value.
    #[must_use]
    pub fn blank() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key: String::new(),
            value: String::new(),
            is_secret: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// A fresh record classified from its key.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            is_secret: is_secret_key(&key),
            key,
            value: value.into(),
            ..Self::blank()
        }
    }

    fn apply(&mut self, update: VariableUpdate) {
        match update {
            VariableUpdate::Key(key) => {
                self.is_secret = is_secret_key(&key);
                self.key = key;
            }
            VariableUpdate::Value(value) => self.value = value,
            VariableUpdate::IsSecret(flag) => self.is_secret = flag,
        }
        self.updated_at = Utc::now();
    }

    /// This record with `draft`'s fields applied. Identity and `created_at`
    /// are kept; `updated_at` moves only if something changed.
    fn revised(&self, draft: VariableDraft) -> Self {
        let mut next = self.clone();
        if draft.key != next.key {
            next.is_secret = is_secret_key(&draft.key);
            next.key = draft.key;
        }
        next.value = draft.value;
        if let Some(flag) = draft.is_secret {
            next.is_secret = flag;
        }
        if next != *self {
            next.updated_at = Utc::now();
        }
        next
    }
}

// Values never reach logs, secret or not.
impl fmt::Debug for EnvironmentVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentVariable")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("value", &"[redacted]")
            .field("is_secret", &self.is_secret)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

/// A single-field edit, as sent by the editor.
///
/// On the wire this is `{"field": "key" | "value" | "isSecret", "value": ...}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value")]
pub enum VariableUpdate {
    /// Set the key and reclassify.
    #[serde(rename = "key")]
    Key(String),
    /// Set the value; the secret flag is left alone.
    #[serde(rename = "value")]
    Value(String),
    /// Override the secret flag.
    #[serde(rename = "isSecret")]
    IsSecret(bool),
}

impl VariableUpdate {
    /// Field name as used on the wire.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Key(_) => "key",
            Self::Value(_) => "value",
            Self::IsSecret(_) => "isSecret",
        }
    }
}

impl fmt::Debug for VariableUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Self::Value(_) => f.debug_tuple("Value").field(&"[redacted]").finish(),
            Self::IsSecret(flag) => f.debug_tuple("IsSecret").field(flag).finish(),
        }
    }
}

/// One record as sent in a whole-set replace.
///
/// `id` ties the draft to an existing record; a missing `isSecret` keeps the
/// record's flag, or classifies the key when the key changed or the record
/// is new. Timestamps sent by the client are ignored.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDraft {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub is_secret: Option<bool>,
}

impl VariableDraft {
    fn into_fresh(self) -> EnvironmentVariable {
        let mut var = EnvironmentVariable::new(self.key, self.value);
        if let Some(flag) = self.is_secret {
            var.is_secret = flag;
        }
        var
    }
}

impl fmt::Debug for VariableDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableDraft")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("is_secret", &self.is_secret)
            .finish_non_exhaustive()
    }
}

/// Ordered, copy-on-write collection of [`EnvironmentVariable`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "Vec<EnvironmentVariable>",
    into = "Vec<EnvironmentVariable>"
)]
pub struct VariableSet {
    records: Arc<Vec<EnvironmentVariable>>,
}

impl VariableSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&EnvironmentVariable> {
        self.records.get(index)
    }

    #[must_use]
    pub fn find_by_id(&self, id: Uuid) -> Option<&EnvironmentVariable> {
        self.records.iter().find(|v| v.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvironmentVariable> {
        self.records.iter()
    }

    /// Append a blank record. Empty keys are allowed while editing.
    #[must_use]
    pub fn add(&self) -> Self {
        self.with_records(|records| records.push(EnvironmentVariable::blank()))
    }

    /// Drop the record at `index`. Out of range returns an identical set.
    #[must_use]
    pub fn remove_at(&self, index: usize) -> Self {
        if index >= self.len() {
            return self.clone();
        }
        self.with_records(|records| {
            records.remove(index);
        })
    }

    /// Apply `update` to the record at `index`, refreshing its `updated_at`.
    /// Out of range returns an identical set.
    #[must_use]
    pub fn update_field(&self, index: usize, update: VariableUpdate) -> Self {
        if index >= self.len() {
            return self.clone();
        }
        self.with_records(|records| records[index].apply(update))
    }

    /// Build the set that replaces this one from `drafts`, in draft order.
    ///
    /// A draft whose `id` names a record here revises that record in place.
    /// Missing or unknown ids, and any repeat of an id already claimed by an
    /// earlier draft, get a fresh record.
    #[must_use]
    pub fn reconcile(&self, drafts: impl IntoIterator<Item = VariableDraft>) -> Self {
        let mut claimed = HashSet::new();
        drafts
            .into_iter()
            .map(|draft| {
                let existing = draft
                    .id
                    .filter(|id| claimed.insert(*id))
                    .and_then(|id| self.find_by_id(id));
                match existing {
                    Some(current) => current.revised(draft),
                    None => draft.into_fresh(),
                }
            })
            .collect()
    }

    /// True when at least one record has a non-empty key.
    #[must_use]
    pub fn has_configured_key(&self) -> bool {
        self.records.iter().any(|v| !v.key.is_empty())
    }

    fn with_records(&self, edit: impl FnOnce(&mut Vec<EnvironmentVariable>)) -> Self {
        let mut next = self.records.as_ref().clone();
        edit(&mut next);
        Self {
            records: Arc::new(next),
        }
    }
}

impl From<Vec<EnvironmentVariable>> for VariableSet {
    fn from(records: Vec<EnvironmentVariable>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }
}

impl From<VariableSet> for Vec<EnvironmentVariable> {
    fn from(set: VariableSet) -> Self {
        Arc::unwrap_or_clone(set.records)
    }
}

impl FromIterator<EnvironmentVariable> for VariableSet {
    fn from_iter<I: IntoIterator<Item = EnvironmentVariable>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}
