//! Domain types for the todo service.
//!
//! # Design
//! `UpdateTodo` carries each field as a `Patch<T>` rather than `Option<T>`.
//! A key missing from the JSON body is `Patch::Unset` and leaves the stored
//! value alone; a present key is `Patch::Set`. `null` is not a valid value
//! for any patchable field, so the "absent vs. null" ambiguity never arises.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, StoreError};

/// A single todo item as stored and returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request payload for creating a new todo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTodo {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl CreateTodo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Reject a missing or whitespace-only title.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(StoreError::empty_field("title"));
        }
        Ok(())
    }
}

/// A field that is either left untouched or overwritten by an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Unset,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unset
    }
}

impl<T> Patch<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Set(value) => Some(value),
            Patch::Unset => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Patch::Set(value) => Some(value),
            Patch::Unset => None,
        }
    }
}

impl<T> From<T> for Patch<T> {
    fn from(value: T) -> Self {
        Patch::Set(value)
    }
}

// Only reached when the key is present; missing keys fall back to
// `#[serde(default)]` on the containing struct.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        T::deserialize(deserializer).map(Patch::Set)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Patch::Set(value) => value.serialize(serializer),
            Patch::Unset => serializer.serialize_none(),
        }
    }
}

/// Request payload for a partial update. Only the fields present in the JSON
/// are applied; omitted fields remain unchanged in the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTodo {
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub title: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub description: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub completed: Patch<bool>,
}

impl UpdateTodo {
    pub fn is_empty(&self) -> bool {
        self.title.is_unset() && self.description.is_unset() && self.completed.is_unset()
    }

    /// A title may be left out, but if present it must not be blank.
    pub fn validate(&self) -> Result<()> {
        if let Patch::Set(title) = &self.title {
            if title.trim().is_empty() {
                return Err(StoreError::empty_field("title"));
            }
        }
        Ok(())
    }
}
