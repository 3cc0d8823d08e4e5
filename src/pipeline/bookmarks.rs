//! Outline (bookmark) text.

use std::collections::HashSet;

use super::walker::Walk;
use crate::error::{Error, Result};
use crate::model::{ActionTrigger, Document, Outline};
use crate::render::Attributes;

/// Shared bounds of one outline walk.
struct OutlineBudget {
    seen: HashSet<usize>,
    items: usize,
    max_items: usize,
    max_depth: usize,
}

impl Walk<'_> {
    pub(super) fn extract_bookmarks(&mut self, doc: &Document) -> Result<()> {
        let Some(outline) = &doc.outline else {
            return Ok(());
        };
        let mut budget = OutlineBudget {
            seen: HashSet::new(),
            items: 0,
            max_items: self.options.max_bookmark_items,
            max_depth: self.options.max_recursion_depth,
        };
        self.bookmark_level(outline, outline.first, 0, &mut budget)
    }

    fn bookmark_level(
        &mut self,
        outline: &Outline,
        first: Option<usize>,
        depth: usize,
        budget: &mut OutlineBudget,
    ) -> Result<()> {
        let Some(first) = first else {
            return Ok(());
        };
        if depth > budget.max_depth {
            return self.catchable(Error::RecursionLimit(budget.max_depth));
        }

        self.start("ul", &Attributes::new())?;
        let mut current = Some(first);
        while let Some(index) = current {
            if budget.items >= budget.max_items || !budget.seen.insert(index) {
                break;
            }
            let Some(item) = outline.get(index) else {
                break;
            };
            budget.items += 1;
            self.element("li", &Attributes::new(), &item.title)?;
            self.handle_action(item.action.as_ref(), ActionTrigger::Bookmark)?;
            self.bookmark_level(outline, item.first_child, depth + 1, budget)?;
            current = item.next_sibling;
        }
        self.end("ul")
    }
}
