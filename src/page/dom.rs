//! Minimal document model for the results page.
//!
//! Text and attribute values are stored as plain strings and escaped only when
//! serialized, so nothing built through this API can turn into markup. Text
//! inside `<style>` is raw CSS; only `</` is neutralized there.

/// Behaviour attached to a clickable element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    /// Remove the sidebar and its stylesheet.
    CloseSidebar,
    /// Open the note at `path` in the desktop app.
    OpenNote { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];
const RAW_TEXT_TAGS: &[&str] = &["style"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
    pub on_click: Option<ClickAction>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
            on_click: None,
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_id(self, id: &str) -> Self {
        self.with_attr("id", id)
    }

    pub fn with_class(self, class: &str) -> Self {
        self.with_attr("class", class)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_click(mut self, action: ClickAction) -> Self {
        self.on_click = Some(action);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn append(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn append_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    pub fn clear_children(&mut self) {
        self.children.clear();
    }

    /// Direct element children, skipping text nodes.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// Concatenated text of this element and all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Element(el) => el.collect_text(out),
            }
        }
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        if self.id() == Some(id) {
            return Some(self);
        }
        self.elements().find_map(|el| el.find_by_id(id))
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        if self.id() == Some(id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(el) => el.find_by_id_mut(id),
            Node::Text(_) => None,
        })
    }

    /// Depth-first list of descendants carrying `class`.
    pub fn find_all_by_class(&self, class: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        for el in self.elements() {
            if el.has_class(class) {
                found.push(el);
            }
            found.extend(el.find_all_by_class(class));
        }
        found
    }

    /// Detach the first descendant with `id`. The element itself is never removed.
    pub fn remove_by_id(&mut self, id: &str) -> Option<Element> {
        let position = self
            .children
            .iter()
            .position(|node| matches!(node, Node::Element(el) if el.id() == Some(id)));
        if let Some(index) = position {
            return match self.children.remove(index) {
                Node::Element(el) => Some(el),
                Node::Text(_) => None,
            };
        }
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(el) => el.remove_by_id(id),
            Node::Text(_) => None,
        })
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attribute(value));
            out.push('"');
        }
        out.push('>');
        if VOID_TAGS.contains(&self.tag.as_str()) {
            return;
        }
        let raw = RAW_TEXT_TAGS.contains(&self.tag.as_str());
        for node in &self.children {
            match node {
                Node::Text(text) if raw => out.push_str(&text.replace("</", "<\\/")),
                Node::Text(text) => out.push_str(&escape_text(text)),
                Node::Element(el) => el.write_html(out),
            }
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

/// The page the agent runs in.
#[derive(Debug, Clone)]
pub struct Document {
    url: String,
    pub head: Element,
    pub body: Element,
}

impl Document {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            head: Element::new("head"),
            body: Element::new("body"),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<&Element> {
        self.head.find_by_id(id).or_else(|| self.body.find_by_id(id))
    }

    pub fn get_element_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        if self.head.find_by_id(id).is_some() {
            return self.head.find_by_id_mut(id);
        }
        self.body.find_by_id_mut(id)
    }

    /// Remove the element with `id` wherever it lives. Returns whether anything was removed.
    pub fn remove_element(&mut self, id: &str) -> bool {
        self.head.remove_by_id(id).is_some() || self.body.remove_by_id(id).is_some()
    }

    pub fn to_html(&self) -> String {
        format!(
            "<!DOCTYPE html><html>{}{}</html>",
            self.head.to_html(),
            self.body.to_html()
        )
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\'' if attribute => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_text(text: &str) -> String {
    escape(text, false)
}

pub fn escape_attribute(text: &str) -> String {
    escape(text, true)
}
