use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::dom::{Element, Node};

pub const SIDEBAR_ID: &str = "omnisearch-sidebar";
pub const CLOSE_ID: &str = "omnisearch-close";
pub const CONTENT_ID: &str = "omnisearch-content";
pub const STYLES_ID: &str = "omnisearch-styles";

const SIDEBAR_HTML: &str = include_str!("../../resources/sidebar.html");
const SIDEBAR_CSS: &str = include_str!("../../resources/sidebar.css");

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to load sidebar template: {0}")]
    Load(String),
    #[error("sidebar template is not well-formed: {0}")]
    Parse(String),
    #[error("sidebar template does not contain #omnisearch-sidebar as its root element")]
    MissingRoot,
}

/// Where the page agent gets the sidebar markup and stylesheet from.
pub trait SidebarResources: Send + Sync {
    /// Raw XHTML for the sidebar shell.
    fn sidebar_html(&self) -> anyhow::Result<String>;
    /// CSS injected alongside the sidebar.
    fn stylesheet(&self) -> anyhow::Result<String>;
}

/// Resources compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct BundledResources;

impl SidebarResources for BundledResources {
    fn sidebar_html(&self) -> anyhow::Result<String> {
        Ok(SIDEBAR_HTML.to_string())
    }

    fn stylesheet(&self) -> anyhow::Result<String> {
        Ok(SIDEBAR_CSS.to_string())
    }
}

/// Parse the sidebar template, insisting on the expected root element.
pub fn parse_sidebar(html: &str) -> Result<Element, TemplateError> {
    let root = parse_fragment(html)?;
    if root.id() != Some(SIDEBAR_ID) {
        return Err(TemplateError::MissingRoot);
    }
    Ok(root)
}

/// Parse a well-formed XHTML fragment and return its first root element.
/// Any non-blank text ahead of that element means there is no usable root.
pub fn parse_fragment(html: &str) -> Result<Element, TemplateError> {
    let mut reader = Reader::from_str(html);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => stack.push(element_from(e)?),
            Ok(Event::Empty(ref e)) => {
                let el = element_from(e)?;
                match stack.last_mut() {
                    Some(parent) => parent.append(el),
                    None => return Ok(el),
                }
            }
            Ok(Event::End(_)) => {
                let Some(el) = stack.pop() else {
                    return Err(TemplateError::Parse("unexpected closing tag".into()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(el)),
                    None => return Ok(el),
                }
            }
            Ok(Event::Text(ref t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| TemplateError::Parse(e.to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.append_text(text.into_owned()),
                    None if text.trim().is_empty() => {}
                    None => return Err(TemplateError::MissingRoot),
                }
            }
            Ok(Event::CData(t)) => {
                let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                match stack.last_mut() {
                    Some(parent) => parent.append_text(text),
                    None => return Err(TemplateError::MissingRoot),
                }
            }
            Ok(Event::Eof) => {
                return Err(if stack.is_empty() {
                    TemplateError::MissingRoot
                } else {
                    TemplateError::Parse("unclosed element".into())
                });
            }
            // comments, doctype, processing instructions
            Ok(_) => {}
            Err(e) => {
                return Err(TemplateError::Parse(format!(
                    "at position {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, TemplateError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut el = Element::new(tag);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| TemplateError::Parse(e.to_string()))?;
        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| TemplateError::Parse(e.to_string()))?;
        el.set_attr(&name, value.into_owned());
    }
    Ok(el)
}
