//! Logical structure tree (tagged PDF).

use super::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A kid of a structure element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructKid {
    /// Another structure element (arena index)
    Element(usize),
    /// Marked-content reference on a page
    Mcid { mcid: i64, page: Option<ObjectId> },
    /// Object reference to a link annotation
    Link { uri: Option<String> },
}

/// A structure element with its standard or custom role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructElement {
    /// `/S`
    pub role: String,
    /// `/Pg`
    pub page: Option<ObjectId>,
    /// `/K`; `None` when the element has no kids entry at all
    pub kids: Option<Vec<StructKid>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructTree {
    pub elements: Vec<StructElement>,
    /// Kids of the structure tree root
    pub root: Vec<StructKid>,
    /// `/RoleMap`, custom role to standard role
    pub role_map: BTreeMap<String, String>,
}

impl StructTree {
    /// Append an element and return its index.
    pub fn push(&mut self, role: impl Into<String>, page: Option<ObjectId>, kids: Vec<StructKid>) -> usize {
        self.elements.push(StructElement {
            role: role.into(),
            page,
            kids: Some(kids),
        });
        self.elements.len() - 1
    }
}
