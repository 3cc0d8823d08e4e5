//! Tagged PDF: text emitted in structure-tree order.
//!
//! Glyph text is first gathered per (page, marked-content id). The
//! structure tree is then walked, each element mapped to an HTML tag and
//! each marked-content reference replaced by its text. Text the tree never
//! references is emitted afterwards as plain paragraphs.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;

use super::walker::Walk;
use crate::error::{Error, Result};
use crate::model::{Document, Glyph, StructKid, StructTree};
use crate::render::Attributes;

/// Text not inside any marked-content sequence.
const NO_MCID: i64 = -1;

const COMMON_TAGS: [(&str, &str); 18] = [
    ("document", "body"),
    ("div", "div"),
    ("p", "p"),
    ("span", "span"),
    ("table", "table"),
    ("thead", "thead"),
    ("tbody", "tbody"),
    ("tr", "tr"),
    ("th", "th"),
    ("td", "td"),
    ("l", "ul"),
    ("li", "li"),
    ("h1", "h1"),
    ("h2", "h2"),
    ("h3", "h3"),
    ("h4", "h4"),
    ("h5", "h5"),
    ("h6", "h6"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlTag {
    pub name: String,
    pub class: String,
}

impl HtmlTag {
    fn plain(name: &str) -> Self {
        Self {
            name: name.to_string(),
            class: String::new(),
        }
    }

    fn div(class: &str) -> Self {
        Self {
            name: "div".to_string(),
            class: class.to_string(),
        }
    }
}

fn common_tag(role: &str) -> Option<&'static str> {
    COMMON_TAGS
        .iter()
        .find(|(key, _)| *key == role)
        .map(|(_, tag)| *tag)
}

/// Structure roles to HTML tags. Custom roles resolve through the role
/// map; unknown roles become a `div` classed by the role.
pub struct TagMapper {
    tags: HashMap<String, HtmlTag>,
}

impl TagMapper {
    pub fn new(role_map: &BTreeMap<String, String>) -> Self {
        let tags = role_map
            .iter()
            .map(|(custom, standard)| {
                let lower = standard.to_lowercase();
                let tag = if COMMON_TAGS.iter().any(|(_, tag)| *tag == lower) {
                    HtmlTag::plain(&lower)
                } else {
                    HtmlTag::div(&lower)
                };
                (custom.clone(), tag)
            })
            .collect();
        Self { tags }
    }

    pub fn tag(&mut self, role: &str) -> HtmlTag {
        if let Some(tag) = self.tags.get(role) {
            return tag.clone();
        }
        let lower = role.to_lowercase();
        if let Some(tag) = common_tag(&lower) {
            return HtmlTag::plain(tag);
        }
        self.tags
            .entry(role.to_string())
            .or_insert_with(|| HtmlTag::div(&lower))
            .clone()
    }
}

/// Text of one page per marked-content id.
#[derive(Debug, Default)]
struct PageText {
    by_mcid: BTreeMap<i64, String>,
    last: Option<i64>,
    chars: usize,
    unmapped: usize,
}

impl PageText {
    fn push(&mut self, glyph: &Glyph) {
        self.chars += 1;
        if !glyph.is_mapped() {
            self.unmapped += 1;
        }
        let mcid = glyph.mcid.unwrap_or(NO_MCID);
        let text = self.by_mcid.entry(mcid).or_default();
        if mcid == NO_MCID && self.last != Some(NO_MCID) && !text.is_empty() {
            text.push('\n');
        }
        text.push_str(glyph.text());
        self.last = Some(mcid);
    }
}

/// State of one structure-tree walk.
struct MarkedContext<'t> {
    tree: &'t StructTree,
    mapper: TagMapper,
    /// (page index, mcid) to text
    texts: BTreeMap<(usize, i64), String>,
    processed: HashSet<(usize, i64)>,
    in_link: bool,
    uri: Option<String>,
    href: String,
}

impl Walk<'_> {
    pub(super) fn walk_marked(&mut self, doc: &Document) -> Result<()> {
        let Some(tree) = &doc.structure else {
            return Ok(());
        };
        debug!("walking the structure tree of {} elements", tree.elements.len());

        let mut texts = BTreeMap::new();
        let mut counters = Vec::with_capacity(doc.page_count());
        for page in &doc.pages {
            self.check_cancelled(page.index)?;
            let mut page_text = PageText::default();
            let mut collect = |glyph: &Glyph| -> Result<()> {
                page_text.push(glyph);
                Ok(())
            };
            if let Err(err) = self.provider.visit_glyphs(page.index, None, &mut collect) {
                self.catchable(err)?;
            }
            counters.push((page_text.chars, page_text.unmapped));
            for (mcid, text) in page_text.by_mcid {
                texts.insert((page.index, mcid), text);
            }
        }

        let mut ctx = MarkedContext {
            tree,
            mapper: TagMapper::new(&tree.role_map),
            texts,
            processed: HashSet::new(),
            in_link: false,
            uri: None,
            href: String::new(),
        };
        self.marked_kids(doc, &mut ctx, &tree.root, None, "", 0)?;

        if !ctx.href.is_empty() {
            let href = std::mem::take(&mut ctx.href);
            self.element("p", &Attributes::new(), &href)?;
        }
        for (key, text) in &ctx.texts {
            if ctx.processed.contains(key) {
                continue;
            }
            if key.1 != NO_MCID {
                debug!("marked content {key:?} is not referenced by the structure tree");
            }
            self.element("p", &Attributes::new(), text)?;
        }

        for (page, (chars, unmapped)) in doc.pages.iter().zip(counters) {
            self.check_cancelled(page.index)?;
            self.start_page(page)?;
            self.state.page_chars = chars;
            self.state.page_unmapped = unmapped;
            self.end_page(page)?;
        }
        Ok(())
    }

    fn marked_kids(
        &mut self,
        doc: &Document,
        ctx: &mut MarkedContext<'_>,
        kids: &[StructKid],
        page: Option<usize>,
        parent_role: &str,
        depth: usize,
    ) -> Result<()> {
        for kid in kids {
            match kid {
                StructKid::Element(index) => self.marked_element(doc, ctx, *index, page, depth + 1)?,
                StructKid::Mcid { mcid, page: kid_page } => {
                    let page = kid_page.and_then(|id| doc.page_index_of(id)).or(page);
                    let Some(key) = page.map(|page| (page, *mcid)) else {
                        continue;
                    };
                    let Some(text) = ctx.texts.get(&key) else {
                        debug!("no text for marked content {key:?}");
                        continue;
                    };
                    let text = if parent_role == "P" { text.trim() } else { text.as_str() };
                    if ctx.in_link {
                        ctx.href.push_str(text);
                    } else {
                        self.chars(text)?;
                    }
                    ctx.processed.insert(key);
                }
                StructKid::Link { uri } => ctx.uri = uri.clone(),
            }
        }
        Ok(())
    }

    fn marked_element(
        &mut self,
        doc: &Document,
        ctx: &mut MarkedContext<'_>,
        index: usize,
        page: Option<usize>,
        depth: usize,
    ) -> Result<()> {
        let max_depth = self.options.max_recursion_depth;
        if depth > max_depth {
            return self.catchable(Error::RecursionLimit(max_depth));
        }
        let tree = ctx.tree;
        let Some(element) = tree.elements.get(index) else {
            return Ok(());
        };
        let Some(kids) = &element.kids else {
            return Ok(());
        };
        let page = element.page.and_then(|id| doc.page_index_of(id)).or(page);

        let tag = ctx.mapper.tag(&element.role);
        let started_link = tag.class == "link";
        if started_link {
            ctx.in_link = true;
        }
        let ignored = tag.name == "span" || tag.class == "lbody";
        let emit = !ctx.in_link && !ignored;
        if emit {
            let mut attributes = Attributes::new();
            if !tag.class.trim().is_empty() {
                attributes.set("class", tag.class.as_str());
            }
            self.start(&tag.name, &attributes)?;
        }

        self.marked_kids(doc, ctx, kids, page, &element.role, depth)?;

        if started_link {
            self.write_link(ctx)?;
        } else if emit {
            self.end(&tag.name)?;
        }
        Ok(())
    }

    fn write_link(&mut self, ctx: &mut MarkedContext<'_>) -> Result<()> {
        let text = std::mem::take(&mut ctx.href);
        match ctx.uri.take().filter(|uri| !uri.trim().is_empty()) {
            Some(uri) => self.element("a", &Attributes::new().with("href", uri), &text)?,
            None => self.chars(&text)?,
        }
        ctx.in_link = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_and_unknown_roles() {
        let mut mapper = TagMapper::new(&BTreeMap::new());
        assert_eq!(mapper.tag("P"), HtmlTag::plain("p"));
        assert_eq!(mapper.tag("L"), HtmlTag::plain("ul"));
        assert_eq!(mapper.tag("Document"), HtmlTag::plain("body"));
        assert_eq!(mapper.tag("Link"), HtmlTag::div("link"));
        assert_eq!(mapper.tag("LBody"), HtmlTag::div("lbody"));
    }

    #[test]
    fn test_role_map() {
        let mut roles = BTreeMap::new();
        roles.insert("Heading".to_string(), "H1".to_string());
        roles.insert("Fancy".to_string(), "Sect".to_string());
        let mut mapper = TagMapper::new(&roles);
        assert_eq!(mapper.tag("Heading"), HtmlTag::plain("h1"));
        assert_eq!(mapper.tag("Fancy"), HtmlTag::div("sect"));
    }

    #[test]
    fn test_page_text_by_mcid() {
        let mut text = PageText::default();
        text.push(&Glyph::new("a", 0.0, 0.0, 5.0, 10.0).with_mcid(0));
        text.push(&Glyph::new("b", 5.0, 0.0, 5.0, 10.0));
        text.push(&Glyph::new("c", 10.0, 0.0, 5.0, 10.0).with_mcid(0));
        text.push(&Glyph::new("d", 15.0, 0.0, 5.0, 10.0));
        text.push(&Glyph::unmapped(20.0, 0.0, 5.0, 10.0).with_mcid(1));
        assert_eq!(text.by_mcid[&0], "ac");
        assert_eq!(text.by_mcid[&NO_MCID], "b\nd");
        assert_eq!(text.chars, 5);
        assert_eq!(text.unmapped, 1);
    }
}
