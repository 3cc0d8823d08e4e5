//! XFA form packets.
//!
//! The packet carries a template (field definitions in the
//! `xfa-template` namespace), a dataset (values under `xfa-data:data`) and
//! free text in presentation elements. Fields pair up with values by name.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::error::{Error, Result};

const TEMPLATE_NS_PREFIX: &str = "http://www.xfa.org/schema/xfa-template";
const DATA_NS: &str = "http://www.xfa.org/schema/xfa-data/1.0/";
const TEXT_ELEMENTS: [&str; 5] = ["speak", "text", "contents-richtext", "toolTip", "exData"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XfaField {
    pub name: String,
    /// Tool tip, shown instead of the name when present
    pub caption: Option<String>,
    pub value: Option<String>,
}

impl XfaField {
    /// "caption: value", falling back to the field name.
    pub fn label(&self) -> String {
        let shown = self
            .caption
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(&self.name);
        format!("{shown}: {}", self.value.as_deref().unwrap_or(""))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XfaContent {
    /// Text scraped from presentation elements, in document order
    pub paragraphs: Vec<String>,
    /// Template fields in declaration order
    pub fields: Vec<XfaField>,
}

/// An event detached from the reader buffers.
enum Node {
    Open {
        ns: Option<String>,
        local: String,
        name: Option<String>,
        empty: bool,
    },
    Close {
        ns: Option<String>,
        local: String,
    },
    Text(String),
    Eof,
    Other,
}

impl Node {
    fn closes(&self, ns: &Option<String>, local: &str) -> bool {
        matches!(self, Node::Close { ns: n, local: l } if n == ns && l == local)
    }
}

fn is_template(ns: &Option<String>) -> bool {
    ns.as_deref().is_some_and(|ns| ns.starts_with(TEMPLATE_NS_PREFIX))
}

fn namespace(resolved: ResolveResult) -> Option<String> {
    match resolved {
        ResolveResult::Bound(Namespace(ns)) => Some(String::from_utf8_lossy(ns).into_owned()),
        _ => None,
    }
}

fn xml_error(err: quick_xml::Error) -> Error {
    Error::PdfParse(format!("XFA packet is not well-formed: {err}"))
}

struct XfaReader<'x> {
    reader: NsReader<&'x [u8]>,
    buf: Vec<u8>,
}

impl<'x> XfaReader<'x> {
    fn new(bytes: &'x [u8]) -> Self {
        Self {
            reader: NsReader::from_reader(bytes),
            buf: Vec::new(),
        }
    }

    fn next(&mut self) -> Result<Node> {
        self.buf.clear();
        let (resolved, event) = self
            .reader
            .read_resolved_event_into(&mut self.buf)
            .map_err(xml_error)?;
        let ns = namespace(resolved);
        Ok(match event {
            Event::Start(e) => Node::Open {
                ns,
                local: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                name: name_attribute(&e),
                empty: false,
            },
            Event::Empty(e) => Node::Open {
                ns,
                local: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                name: name_attribute(&e),
                empty: true,
            },
            Event::End(e) => Node::Close {
                ns,
                local: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
            },
            Event::Text(e) => Node::Text(e.unescape().map_err(xml_error)?.into_owned()),
            Event::CData(e) => Node::Text(String::from_utf8_lossy(&e.into_inner()).into_owned()),
            Event::Eof => Node::Eof,
            _ => Node::Other,
        })
    }

    /// Text up to the end of the element just opened; `p` ends become
    /// line breaks.
    fn text_until(&mut self, ns: &Option<String>, local: &str) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.next()? {
                Node::Eof => break,
                Node::Text(t) => text.push_str(&t),
                node if node.closes(ns, local) => break,
                Node::Close { local: l, .. } if l == "p" => text.push('\n'),
                _ => {}
            }
        }
        Ok(text)
    }

    /// Paragraphs up to the end of the element just opened.
    fn paragraphs_until(&mut self, ns: &Option<String>, local: &str, out: &mut Vec<String>) -> Result<()> {
        let mut text = String::new();
        loop {
            match self.next()? {
                Node::Eof => break,
                Node::Text(t) => text.push_str(&t),
                node if node.closes(ns, local) => break,
                Node::Close { local: l, .. } if l == "p" => {
                    push_paragraph(out, std::mem::take(&mut text));
                }
                _ => {}
            }
        }
        push_paragraph(out, text);
        Ok(())
    }

    /// Element text of the dataset, keyed by element name.
    fn data(&mut self, values: &mut HashMap<String, String>) -> Result<()> {
        let mut text = String::new();
        loop {
            match self.next()? {
                Node::Eof => break,
                Node::Text(t) => text.push_str(&t),
                Node::Close { ns, local } => {
                    let value = std::mem::take(&mut text);
                    if !value.trim().is_empty() {
                        values.insert(local.clone(), value.trim().to_string());
                    }
                    if ns.as_deref() == Some(DATA_NS) && local == "data" {
                        break;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Tool tip of the template field just opened.
    fn field_tooltip(&mut self) -> Result<Option<String>> {
        let mut tooltip = None;
        loop {
            match self.next()? {
                Node::Eof => break,
                Node::Open { ns, local, empty: false, .. } if local == "toolTip" => {
                    tooltip = Some(self.text_until(&ns, &local)?);
                }
                Node::Close { ns, local } if is_template(&ns) && local == "field" => break,
                _ => {}
            }
        }
        Ok(tooltip)
    }
}

fn push_paragraph(out: &mut Vec<String>, text: String) {
    if !text.trim().is_empty() {
        out.push(text.trim().to_string());
    }
}

fn name_attribute(start: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"name")
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Parse an XFA packet into its fields and free text.
pub fn parse_xfa(bytes: &[u8]) -> Result<XfaContent> {
    let mut reader = XfaReader::new(bytes);
    let mut content = XfaContent::default();
    let mut fields: Vec<(String, Option<String>)> = Vec::new();
    let mut values = HashMap::new();

    loop {
        match reader.next()? {
            Node::Eof => break,
            Node::Open { ns, local, name, empty } => {
                if is_template(&ns) && local == "field" {
                    let tooltip = if empty { None } else { reader.field_tooltip()? };
                    if let Some(name) = name.filter(|n| !n.is_empty()) {
                        match fields.iter_mut().find(|(n, _)| *n == name) {
                            Some(existing) => existing.1 = tooltip,
                            None => fields.push((name, tooltip)),
                        }
                    }
                } else if empty {
                    continue;
                } else if ns.as_deref() == Some(DATA_NS) && local == "data" {
                    reader.data(&mut values)?;
                } else if TEXT_ELEMENTS.contains(&local.as_str()) {
                    reader.paragraphs_until(&ns, &local, &mut content.paragraphs)?;
                }
            }
            _ => {}
        }
    }

    content.fields = fields
        .into_iter()
        .map(|(name, caption)| XfaField {
            value: values.get(&name).cloned(),
            name,
            caption,
        })
        .collect();
    Ok(content)
}
