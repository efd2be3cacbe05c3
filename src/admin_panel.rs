//! Admin panel: a side navigation of tools and a content pane.
//!
//! Selecting a tool resolves its module among the registered tools, unmounts
//! whatever was showing, clears the content pane and hands the pane to the
//! new tool together with its data, the search query and the site context.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::admin_api::AdminError;
use crate::context::SiteContext;
use crate::pane::{html_escape, shared_pane, SharedPane};
use crate::sidekick::{SidekickBridge, StatusLookup};

pub const TITLE: &str = "Admin";
pub const SEARCH_ENABLED: bool = true;

/// One row of the panel's tool sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEntry {
    /// Navigation label, also the selection key
    pub name: String,
    /// Module identifier of the tool that renders this entry
    pub module: String,
    /// Passed through to the tool untouched
    #[serde(default)]
    pub data: Value,
}

impl ToolEntry {
    pub fn new(name: &str, module: &str) -> Self {
        Self {
            name: name.to_string(),
            module: module.to_string(),
            data: Value::Null,
        }
    }
}

/// A tool the panel can show in its content pane.
pub trait AdminTool: Send + Sync {
    fn module(&self) -> &'static str;

    fn render<'a>(
        &'a self,
        pane: SharedPane,
        data: &'a Value,
        query: Option<&'a str>,
        ctx: &'a SiteContext,
    ) -> BoxFuture<'a, Result<(), AdminError>>;

    /// Called when another tool replaces this one.
    fn unmount(&self) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelError {
    UnknownTool(String),
    UnknownModule { tool: String, module: String },
    Tool(AdminError),
}

impl fmt::Display for PanelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelError::UnknownTool(name) => write!(f, "No admin tool named \"{name}\""),
            PanelError::UnknownModule { tool, module } => {
                write!(f, "Admin tool \"{tool}\" uses unknown module \"{module}\"")
            }
            PanelError::Tool(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PanelError {}

impl From<AdminError> for PanelError {
    fn from(e: AdminError) -> Self {
        PanelError::Tool(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavItem {
    pub name: String,
    pub active: bool,
}

pub struct AdminPanel {
    entries: Vec<ToolEntry>,
    tools: HashMap<&'static str, Arc<dyn AdminTool>>,
    content: SharedPane,
    context: SiteContext,
    query: Option<String>,
    bridge: Option<(Arc<SidekickBridge>, Duration)>,
    active: Option<usize>,
}

impl AdminPanel {
    pub fn new(entries: Vec<ToolEntry>, context: SiteContext) -> Self {
        Self {
            entries,
            tools: HashMap::new(),
            content: shared_pane(),
            context,
            query: None,
            bridge: None,
            active: None,
        }
    }

    /// Make `tool` available to entries naming its module. A tool registered
    /// later for the same module replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn AdminTool>) {
        self.tools.insert(tool.module(), tool);
    }

    /// Resolve the project status from the host before each tool is shown,
    /// waiting at most `wait`.
    pub fn attach_sidekick(&mut self, bridge: Arc<SidekickBridge>, wait: Duration) {
        self.bridge = Some((bridge, wait));
    }

    pub fn set_query(&mut self, query: Option<String>) {
        self.query = query.filter(|q| !q.is_empty());
    }

    pub fn content(&self) -> SharedPane {
        self.content.clone()
    }

    pub fn context(&self) -> &SiteContext {
        &self.context
    }

    pub fn entries(&self) -> &[ToolEntry] {
        &self.entries
    }

    pub fn active_tool(&self) -> Option<&ToolEntry> {
        self.active.map(|i| &self.entries[i])
    }

    /// Navigation items in sheet order.
    pub fn decorate(&self) -> Vec<NavItem> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| NavItem {
                name: entry.name.clone(),
                active: self.active == Some(i),
            })
            .collect()
    }

    /// Show the tool named `name` in the content pane.
    pub async fn select(&mut self, name: &str) -> Result<(), PanelError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| PanelError::UnknownTool(name.to_string()))?;
        let entry = &self.entries[index];
        let tool = self.tools.get(entry.module.as_str()).cloned().ok_or_else(|| {
            PanelError::UnknownModule {
                tool: entry.name.clone(),
                module: entry.module.clone(),
            }
        })?;

        if let Some(previous) = self.active.take() {
            if let Some(prev_tool) = self.tools.get(self.entries[previous].module.as_str()) {
                prev_tool.unmount();
            }
        }
        self.content.lock().clear();
        self.active = Some(index);

        if let Some((bridge, wait)) = &self.bridge {
            match bridge.lookup_status(*wait).await {
                StatusLookup::Fetched(status) => self.context.status = Some(status),
                StatusLookup::ReadyWithoutStatus => {
                    tracing::debug!("sidekick ready without status");
                }
                StatusLookup::TimedOut => {}
            }
        }

        let entry = &self.entries[index];
        tracing::info!(tool = %entry.name, module = %entry.module, site = %self.context, "showing admin tool");
        tool.render(
            self.content.clone(),
            &entry.data,
            self.query.as_deref(),
            &self.context,
        )
        .await?;
        Ok(())
    }

    /// Unmount the active tool, if any.
    pub fn close(&mut self) {
        if let Some(index) = self.active.take() {
            if let Some(tool) = self.tools.get(self.entries[index].module.as_str()) {
                tool.unmount();
            }
        }
    }

    /// Split layout with the navigation list and the current content pane.
    pub fn to_html(&self) -> String {
        let nav: String = self
            .decorate()
            .iter()
            .map(|item| {
                let name = html_escape(&item.name);
                let selected = if item.active { " selected" } else { "" };
                format!(r#"<sp-sidenav-item value="{name}" label="{name}"{selected}></sp-sidenav-item>"#)
            })
            .collect();
        format!(
            r#"<div class="admin-tools"><sp-split-view primary-size="350" dir="ltr" splitter-pos="250" resizable><div class="menu"><div class="list-container"><sp-sidenav>{nav}</sp-sidenav></div></div><div class="content">{}</div></sp-split-view></div>"#,
            self.content.lock().to_html()
        )
    }
}
