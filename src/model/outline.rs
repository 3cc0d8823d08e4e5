//! Document outline (bookmarks).
//!
//! Items live in an arena and link by index exactly as `/First` and `/Next`
//! do in the file, which means a malformed outline can loop. Walkers must
//! track what they have seen.

use super::Action;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub items: Vec<OutlineItem>,
    /// First top-level item
    pub first: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineItem {
    pub title: String,
    pub action: Option<Action>,
    pub first_child: Option<usize>,
    pub next_sibling: Option<usize>,
}

impl Outline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an unlinked item and return its index.
    pub fn push(&mut self, title: impl Into<String>) -> usize {
        self.items.push(OutlineItem {
            title: title.into(),
            action: None,
            first_child: None,
            next_sibling: None,
        });
        self.items.len() - 1
    }

    /// Build a flat list of top-level items.
    pub fn from_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut outline = Outline::new();
        let mut prev: Option<usize> = None;
        for title in titles {
            let idx = outline.push(title);
            match prev {
                Some(p) => outline.items[p].next_sibling = Some(idx),
                None => outline.first = Some(idx),
            }
            prev = Some(idx);
        }
        outline
    }

    pub fn get(&self, index: usize) -> Option<&OutlineItem> {
        self.items.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_titles_links_siblings() {
        let outline = Outline::from_titles(["Intro", "Body", "End"]);
        assert_eq!(outline.first, Some(0));
        assert_eq!(outline.items[0].next_sibling, Some(1));
        assert_eq!(outline.items[1].next_sibling, Some(2));
        assert_eq!(outline.items[2].next_sibling, None);
    }
}
