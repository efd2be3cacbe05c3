//! Content pane model.
//!
//! Tools render into a `Container`: a class set plus an ordered list of
//! fragments (progress indicator, messages, tables, forms). The container can
//! be serialized to HTML for a host page or to plain text for the terminal.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A container shared between a tool and the tasks it spawns.
pub type SharedPane = Arc<Mutex<Container>>;

pub fn shared_pane() -> SharedPane {
    Arc::new(Mutex::new(Container::default()))
}

// ---------------------------------------------------------------------------
// Inline content
// ---------------------------------------------------------------------------

/// A run of inline content: plain text or an anchor.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Link { href: String, text: String },
}

impl Inline {
    fn to_html(&self) -> String {
        match self {
            Inline::Text(t) => html_escape(t),
            Inline::Link { href, text } => {
                format!(r#"<a href="{}">{}</a>"#, html_escape(href), html_escape(text))
            }
        }
    }

    fn to_text(&self) -> String {
        match self {
            Inline::Text(t) => t.clone(),
            Inline::Link { href, text } if href == text => text.clone(),
            Inline::Link { href, text } => format!("{text} <{href}>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub class: Option<String>,
    pub content: Inline,
}

impl Cell {
    pub fn text(text: impl Into<String>) -> Self {
        Self { class: None, content: Inline::Text(text.into()) }
    }

    pub fn link(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            class: None,
            content: Inline::Link { href: href.into(), text: text.into() },
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    /// Visible text of the cell (anchor text for links).
    pub fn display(&self) -> &str {
        match &self.content {
            Inline::Text(t) => t,
            Inline::Link { text, .. } => text,
        }
    }

    pub fn href(&self) -> Option<&str> {
        match &self.content {
            Inline::Link { href, .. } => Some(href),
            Inline::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub id: Option<String>,
    pub class: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::from("<table");
        if let Some(id) = &self.id {
            out.push_str(&format!(r#" id="{}""#, html_escape(id)));
        }
        if let Some(class) = &self.class {
            out.push_str(&format!(r#" class="{}""#, html_escape(class)));
        }
        out.push_str("><tbody><tr>");
        for h in &self.headers {
            out.push_str(&format!("<th>{}</th>", html_escape(h)));
        }
        out.push_str("</tr>");
        for row in &self.rows {
            out.push_str("<tr>");
            for cell in row {
                match &cell.class {
                    Some(c) => out.push_str(&format!(r#"<td class="{}">"#, html_escape(c))),
                    None => out.push_str("<td>"),
                }
                out.push_str(&cell.content.to_html());
                out.push_str("</td>");
            }
            out.push_str("</tr>");
        }
        out.push_str("</tbody></table>");
        out
    }

    /// Column-aligned plain-text rendering for the terminal.
    pub fn to_text(&self) -> String {
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|c| c.content.to_text()).collect())
            .collect();

        let columns = self
            .headers
            .len()
            .max(rendered.iter().map(Vec::len).max().unwrap_or(0));
        let mut widths = vec![0usize; columns];
        for (i, h) in self.headers.iter().enumerate() {
            widths[i] = widths[i].max(h.chars().count());
        }
        for row in &rendered {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let format_line = |cells: &[String]| -> String {
            cells
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{c:<width$}", width = widths[i]))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut lines = Vec::with_capacity(rendered.len() + 2);
        lines.push(format_line(&self.headers));
        lines.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        for row in &rendered {
            lines.push(format_line(row));
        }
        lines.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Fragments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Indeterminate progress indicator shown while a job runs.
    Progress,
    /// A status or error message. `class` is the space-separated class list.
    Message { class: String, content: Vec<Inline> },
    Table(Table),
    /// Static markup owned by the tool (e.g. the log viewer form).
    Markup(String),
}

impl Fragment {
    pub fn error_message(content: Vec<Inline>) -> Self {
        Fragment::Message { class: "log error".to_string(), content }
    }

    fn to_html(&self) -> String {
        match self {
            Fragment::Progress => {
                r#"<sp-progress-circle class="pcircle" indeterminate size="l"></sp-progress-circle>"#
                    .to_string()
            }
            Fragment::Message { class, content } => format!(
                r#"<div class="{}">{}</div>"#,
                html_escape(class),
                content.iter().map(Inline::to_html).collect::<String>()
            ),
            Fragment::Table(t) => t.to_html(),
            Fragment::Markup(m) => m.clone(),
        }
    }

    fn to_text(&self) -> Option<String> {
        match self {
            Fragment::Progress => Some("…".to_string()),
            Fragment::Message { content, .. } => {
                Some(content.iter().map(Inline::to_text).collect())
            }
            Fragment::Table(t) => Some(t.to_text()),
            Fragment::Markup(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    classes: BTreeSet<String>,
    fragments: Vec<Fragment>,
}

impl Container {
    pub fn add_class(&mut self, class: &str) {
        self.classes.insert(class.to_string());
    }

    pub fn remove_class(&mut self, class: &str) {
        self.classes.remove(class);
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    /// Remove all fragments. Classes are kept.
    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    pub fn append(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    pub fn retain(&mut self, keep: impl FnMut(&Fragment) -> bool) {
        self.fragments.retain(keep);
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.fragments.iter().filter_map(|f| match f {
            Fragment::Table(t) => Some(t),
            _ => None,
        })
    }

    pub fn messages(&self) -> impl Iterator<Item = &[Inline]> {
        self.fragments.iter().filter_map(|f| match f {
            Fragment::Message { content, .. } => Some(content.as_slice()),
            _ => None,
        })
    }

    pub fn to_html(&self) -> String {
        let body: String = self.fragments.iter().map(Fragment::to_html).collect();
        if self.classes.is_empty() {
            format!("<div>{body}</div>")
        } else {
            let class = self.classes.iter().cloned().collect::<Vec<_>>().join(" ");
            format!(r#"<div class="{}">{body}</div>"#, html_escape(&class))
        }
    }

    pub fn to_text(&self) -> String {
        self.fragments
            .iter()
            .filter_map(Fragment::to_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Escape text for inclusion in HTML element content or attribute values.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
