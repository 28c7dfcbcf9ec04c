//! The item model shared by every storage backend.

use serde::{Deserialize, Serialize};

/// Opaque item identifier. Assigned by the store, stable for the item's
/// lifetime, never reused.
pub type ItemId = i64;

/// What an indexed item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Class,
    Method,
    Function,
    Variable,
    Interface,
    Enum,
    Namespace,
}

impl ItemKind {
    /// Storage form used by the persistent backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::File => "file",
            ItemKind::Class => "class",
            ItemKind::Method => "method",
            ItemKind::Function => "function",
            ItemKind::Variable => "variable",
            ItemKind::Interface => "interface",
            ItemKind::Enum => "enum",
            ItemKind::Namespace => "namespace",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(ItemKind::File),
            "class" => Some(ItemKind::Class),
            "method" => Some(ItemKind::Method),
            "function" => Some(ItemKind::Function),
            "variable" => Some(ItemKind::Variable),
            "interface" => Some(ItemKind::Interface),
            "enum" => Some(ItemKind::Enum),
            "namespace" => Some(ItemKind::Namespace),
            _ => None,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, ItemKind::File)
    }
}

/// One indexable entity: a workspace file or a declared symbol.
///
/// `path` is unique across items — workspace-relative for files, an
/// absolute-path anchor for symbols. `name` is the short label ranking works
/// on (basename for files, symbol name for symbols).
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub path: String,
    pub name: String,
    pub kind: ItemKind,
    /// Enclosing file item; deletion of the parent cascades here.
    pub parent_id: Option<ItemId>,
    /// Free-form attribute bag. The core only reads `container` and `range`.
    pub metadata: Option<serde_json::Value>,
}

impl Item {
    /// The container name from metadata, if any (e.g. the class a method
    /// belongs to).
    pub fn container(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("container"))
            .and_then(|v| v.as_str())
    }
}

/// Insertion payload; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub path: String,
    pub name: String,
    pub kind: ItemKind,
    pub parent_id: Option<ItemId>,
    pub metadata: Option<serde_json::Value>,
}

impl NewItem {
    /// A file item: name is the basename of the workspace-relative path.
    pub fn file(path: &str) -> Self {
        let name = path.rsplit(['/', '\\']).next().unwrap_or(path).to_string();
        Self {
            path: path.to_string(),
            name,
            kind: ItemKind::File,
            parent_id: None,
            metadata: None,
        }
    }
}

/// Partial update for [`Item`]. `None` leaves a field untouched; the nested
/// options distinguish "set to null" from "leave alone". Path changes are
/// delete + add, never a patch.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub kind: Option<ItemKind>,
    pub parent_id: Option<Option<ItemId>>,
    pub metadata: Option<Option<serde_json::Value>>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.kind.is_none()
            && self.parent_id.is_none()
            && self.metadata.is_none()
    }
}

/// A trigram posting row: `(trigram, item, position)`, unique as a triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrigramPosting {
    pub trigram: String,
    pub item_id: ItemId,
    pub position: u32,
}

/// A token posting row: `(token, item, position)`, unique as a triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPosting {
    pub token: String,
    pub item_id: ItemId,
    pub position: u32,
}

/// Index totals, derivable from the tables at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub items: u64,
    /// Distinct trigram terms.
    pub trigrams: u64,
    /// Distinct token terms.
    pub tokens: u64,
    /// Unix seconds of the last mutation.
    pub updated_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            ItemKind::File,
            ItemKind::Class,
            ItemKind::Method,
            ItemKind::Function,
            ItemKind::Variable,
            ItemKind::Interface,
            ItemKind::Enum,
            ItemKind::Namespace,
        ] {
            assert_eq!(ItemKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ItemKind::parse("module"), None);
    }

    #[test]
    fn test_file_item_name_is_basename() {
        let item = NewItem::file("src/query/engine.rs");
        assert_eq!(item.name, "engine.rs");
        assert_eq!(item.kind, ItemKind::File);

        let root = NewItem::file("README.md");
        assert_eq!(root.name, "README.md");
    }

    #[test]
    fn test_container_from_metadata() {
        let item = Item {
            id: 1,
            path: "/ws/src/user.rs#User.rename".to_string(),
            name: "rename".to_string(),
            kind: ItemKind::Method,
            parent_id: Some(7),
            metadata: Some(serde_json::json!({"container": "User", "range": [10, 14]})),
        };
        assert_eq!(item.container(), Some("User"));

        let bare = Item { metadata: None, ..item };
        assert_eq!(bare.container(), None);
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(ItemPatch::default().is_empty());
        let patch = ItemPatch {
            name: Some("new".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
