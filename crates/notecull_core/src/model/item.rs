//! Item domain model.
//!
//! # Responsibility
//! - Define the decrypted item record the engine selects and mutates.
//! - Model soft deletion as a `Live -> Tombstoned` state transition.
//!
//! # Invariants
//! - `id` is stable for the item lifetime and owned by the Item Store.
//! - `state` is the source of truth for tombstone state.
//! - Tombstoning produces a new copy; a fetched collection is never edited in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Field key holding the item label (note title).
pub const LABEL_FIELD: &str = "title";
/// Field key holding the item body (note text).
pub const BODY_FIELD: &str = "text";

/// Opaque, store-assigned item identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh random identifier (UUID v4 text form).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Content type tag, e.g. `Note` or `Tag`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemType(String);

impl ItemType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn note() -> Self {
        Self("Note".to_string())
    }

    pub fn tag() -> Self {
        Self("Tag".to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for ItemType {
    fn default() -> Self {
        Self::note()
    }
}

impl Display for ItemType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Visible to the session.
    #[default]
    Live,
    /// Logically deleted; may still come back from a raw fetch.
    Tombstoned,
}

/// Decrypted item as returned by one Item Store fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(rename = "content_type")]
    pub item_type: ItemType,
    /// Named content fields. Label lives under `title`, body under `text`.
    pub fields: BTreeMap<String, String>,
    pub state: ItemState,
    /// Store-assigned metadata, opaque to the engine.
    pub created_at: Option<String>,
    /// Store-assigned metadata, opaque to the engine.
    pub updated_at: Option<String>,
}

impl Item {
    /// Creates a live item with the given identity and no fields.
    pub fn new(id: ItemId, item_type: ItemType) -> Self {
        Self {
            id,
            item_type,
            fields: BTreeMap::new(),
            state: ItemState::Live,
            created_at: None,
            updated_at: None,
        }
    }

    /// Builder-style helper that sets one named field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Builder-style helper that sets the label field.
    pub fn with_label(self, label: impl Into<String>) -> Self {
        self.with_field(LABEL_FIELD, label)
    }

    /// Builder-style helper that sets the body field.
    pub fn with_body(self, body: impl Into<String>) -> Self {
        self.with_field(BODY_FIELD, body)
    }

    pub fn label(&self) -> Option<&str> {
        self.field(LABEL_FIELD)
    }

    pub fn body(&self) -> Option<&str> {
        self.field(BODY_FIELD)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn is_deleted(&self) -> bool {
        self.state == ItemState::Tombstoned
    }

    pub fn is_live(&self) -> bool {
        !self.is_deleted()
    }

    /// Returns a tombstoned copy of this item.
    ///
    /// Applying it to an already tombstoned item is a no-op on the copy, so a
    /// batch built from these copies can be replayed safely.
    pub fn tombstoned(&self) -> Self {
        Self {
            state: ItemState::Tombstoned,
            ..self.clone()
        }
    }

    /// Lightweight reference view of this item.
    pub fn reference(&self) -> ItemReference {
        ItemReference {
            id: self.id.clone(),
            item_type: self.item_type.clone(),
        }
    }
}

/// Caller-supplied content for a new item. The store assigns identity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemDraft {
    pub item_type: ItemType,
    pub label: String,
    pub body: String,
    /// Extra named fields beyond label and body.
    pub extra: BTreeMap<String, String>,
}

impl ItemDraft {
    /// Draft for a note with the given label and body.
    pub fn note(label: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            item_type: ItemType::note(),
            label: label.into(),
            body: body.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Field mapping the created item should carry.
    pub fn fields(&self) -> BTreeMap<String, String> {
        let mut fields = self.extra.clone();
        fields.insert(LABEL_FIELD.to_string(), self.label.clone());
        fields.insert(BODY_FIELD.to_string(), self.body.clone());
        fields
    }

    /// Materializes the draft into a live item under a store-chosen id.
    pub fn into_item(self, id: ItemId) -> Item {
        let fields = self.fields();
        Item {
            id,
            item_type: self.item_type,
            fields,
            state: ItemState::Live,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Identifier plus type, used when full content is not needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemReference {
    pub id: ItemId,
    #[serde(rename = "content_type")]
    pub item_type: ItemType,
}
