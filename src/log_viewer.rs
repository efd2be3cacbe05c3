//! Log viewer tool.
//!
//! Queries the admin log endpoint for a site over a date range and renders the
//! entries newest first. A 401 renders the login instruction, an empty result
//! renders the "no logs found" message; neither produces a table.

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::admin_api::{AdminApi, AdminError};
use crate::admin_panel::AdminTool;
use crate::context::SiteContext;
use crate::datetime::{format_local, parse_datetime};
use crate::pane::{Cell, Fragment, Inline, SharedPane, Table};

pub const MODULE: &str = "log-viewer";

const LOG_COLUMNS: &[&str] = &[
    "Timestamp",
    "Status",
    "Method",
    "Route",
    "Path",
    "User",
    "Errors",
    "Duration (ms)",
    "ContentBusID",
];

const FORM_MARKUP: &str = r#"<div class="hero"><h1>Log Viewer</h1></div>
<div class="form">
  <form>
    <p><strong>Optional Date/Time range: <i>(Default is past 24 hours)</i></strong></p>
    <label for="from-date-time">From: </label>
    <input id="from-date-time" name="from-date-time" type="text"
      title="Start of the range. Default is 24 hours before now."/>
    <label for="to-date-time">To: </label>
    <input id="to-date-time" name="to-date-time" type="text"
      title="End of the range. Default is now."/>
    <button type="submit" id="logSubmit" name="logSubmit">Submit</button>
  </form>
</div>"#;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A log entry as returned by the admin API. Only the fields the viewer
/// displays or uses for rewriting are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogEntry {
    pub timestamp: Option<Value>,
    pub status: Option<Value>,
    pub method: Option<String>,
    pub route: Option<String>,
    pub path: Option<String>,
    pub user: Option<String>,
    pub errors: Option<Value>,
    pub duration: Option<Value>,
    pub content_bus_id: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub repo: Option<String>,
    pub owner: Option<String>,
    pub source: Option<String>,
    pub changes: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LogResponse {
    #[serde(default)]
    pub entries: Vec<LogEntry>,
}

// ---------------------------------------------------------------------------
// Date range
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl LogRange {
    /// Resolve optional user input. Empty `from` means 24 hours before `now`,
    /// empty `to` means `now`.
    pub fn resolve(from: Option<&str>, to: Option<&str>, now: DateTime<Utc>) -> Result<Self, String> {
        let from = match non_empty(from) {
            Some(s) => parse_datetime(s).ok_or_else(|| format!("Invalid From date/time: {s}"))?,
            None => now - Duration::hours(24),
        };
        let to = match non_empty(to) {
            Some(s) => parse_datetime(s).ok_or_else(|| format!("Invalid To date/time: {s}"))?,
            None => now,
        };
        if from > to {
            return Err("From date/time must be before To date/time".to_string());
        }
        Ok(Self { from, to })
    }

    pub fn from_param(&self) -> String {
        self.from.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn to_param(&self) -> String {
        self.to.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Row rendering
// ---------------------------------------------------------------------------

/// Render a value the way a template literal with `|| ''` would: falsy
/// values (null, "", 0, false) become empty, arrays are comma-joined.
pub(crate) fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => String::new(),
        Some(Value::Bool(true)) => "true".to_string(),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => String::new(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => display_value(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(obj @ Value::Object(_)) => obj.to_string(),
    }
}

/// Format a log timestamp (epoch millis or ISO string) in `tz`, en-US style.
/// Unparseable strings are shown unchanged.
pub(crate) fn format_timestamp<Tz: TimeZone>(value: Option<&Value>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        Some(Value::String(s)) => parse_datetime(s),
        _ => None,
    };
    match parsed {
        Some(dt) => format_local(&dt.with_timezone(tz)),
        None => display_value(value),
    }
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

/// Build the table cells for one entry.
///
/// Preview and live requests link the path to the page on the matching host;
/// indexer entries show `indexer` as route and their changed paths as path.
pub fn log_row<Tz: TimeZone>(entry: &LogEntry, tz: &Tz) -> Vec<Cell>
where
    Tz::Offset: std::fmt::Display,
{
    let mut route = entry.route.clone().unwrap_or_default();
    let mut path_cell = Cell::text(entry.path.clone().unwrap_or_default());

    if let (Some(git_ref), Some(repo), Some(owner), Some(path), Some(r)) = (
        non_blank(&entry.git_ref),
        non_blank(&entry.repo),
        non_blank(&entry.owner),
        non_blank(&entry.path),
        non_blank(&entry.route),
    ) {
        let site = SiteContext::new(owner, repo, git_ref);
        match r {
            "preview" => path_cell = Cell::link(format!("{}{path}", site.preview_origin()), path),
            "live" => path_cell = Cell::link(format!("{}{path}", site.live_origin()), path),
            _ => {}
        }
    }

    if entry.source.as_deref() == Some("indexer") {
        route = "indexer".to_string();
        path_cell = Cell::text(display_value(entry.changes.as_ref()));
    }

    vec![
        Cell::text(format_timestamp(entry.timestamp.as_ref(), tz)).with_class("timestamp"),
        Cell::text(display_value(entry.status.as_ref())).with_class("status"),
        Cell::text(entry.method.clone().unwrap_or_default()).with_class("method"),
        Cell::text(route).with_class("route"),
        path_cell.with_class("path"),
        Cell::text(entry.user.clone().unwrap_or_default()).with_class("user"),
        Cell::text(display_value(entry.errors.as_ref())).with_class("errors"),
        Cell::text(display_value(entry.duration.as_ref())).with_class("duration"),
        Cell::text(entry.content_bus_id.clone().unwrap_or_default()).with_class("contentBusId"),
    ]
}

/// Entries arrive oldest first; the table shows newest first.
pub fn log_table<Tz: TimeZone>(entries: &[LogEntry], tz: &Tz) -> Table
where
    Tz::Offset: std::fmt::Display,
{
    let mut table = Table::new(LOG_COLUMNS);
    table.id = Some("logs".to_string());
    table.class = Some("list".to_string());
    table.rows = entries.iter().rev().map(|e| log_row(e, tz)).collect();
    table
}

pub(crate) fn unauthorized_message(login_url: &str) -> Vec<Inline> {
    vec![
        Inline::Text("401 Unauthorized. Please login to ".to_string()),
        Inline::Link { href: login_url.to_string(), text: login_url.to_string() },
        Inline::Text(
            " before viewing logs. You also need to have a role of author or admin to view logs"
                .to_string(),
        ),
    ]
}

pub(crate) fn no_logs_message(site: &SiteContext) -> Vec<Inline> {
    vec![Inline::Text(format!("No logs found for {}", site.host_label()))]
}

// ---------------------------------------------------------------------------
// Tool
// ---------------------------------------------------------------------------

/// Outcome of one form submission.
#[derive(Debug, Clone, PartialEq)]
pub enum LogView {
    InvalidRange(String),
    Unauthorized,
    Empty,
    Table(Table),
}

pub struct LogViewerTool<A: AdminApi> {
    api: Arc<A>,
}

impl<A: AdminApi> LogViewerTool<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Show the query form, replacing whatever the pane held.
    pub fn mount(&self, pane: &SharedPane) {
        let mut pane = pane.lock();
        pane.clear();
        pane.append(Fragment::Markup(FORM_MARKUP.to_string()));
    }

    /// Run a query with times rendered in the local timezone.
    pub async fn submit(
        &self,
        pane: &SharedPane,
        site: &SiteContext,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<LogView, AdminError> {
        self.submit_in(pane, site, from, to, Utc::now(), &chrono::Local).await
    }

    pub async fn submit_in<Tz: TimeZone>(
        &self,
        pane: &SharedPane,
        site: &SiteContext,
        from: Option<&str>,
        to: Option<&str>,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Result<LogView, AdminError>
    where
        Tz::Offset: std::fmt::Display,
    {
        // Previous results and messages go away on every submission
        pane.lock()
            .retain(|f| !matches!(f, Fragment::Message { .. } | Fragment::Table(_)));

        let range = match LogRange::resolve(from, to, now) {
            Ok(range) => range,
            Err(msg) => {
                pane.lock()
                    .append(Fragment::error_message(vec![Inline::Text(msg.clone())]));
                return Ok(LogView::InvalidRange(msg));
            }
        };

        let entries = if site.is_complete() {
            match self.api.fetch_logs(site, &range).await {
                Ok(entries) => entries,
                Err(AdminError::Unauthorized) => {
                    tracing::info!(%site, "log query rejected: not logged in");
                    pane.lock()
                        .append(Fragment::error_message(unauthorized_message(&self.api.login_url())));
                    return Ok(LogView::Unauthorized);
                }
                Err(e) => {
                    tracing::error!(%site, "log query failed: {e}");
                    pane.lock().append(Fragment::error_message(vec![Inline::Text(format!(
                        "Failed to fetch logs: {e}"
                    ))]));
                    return Err(e);
                }
            }
        } else {
            tracing::warn!(%site, "log query skipped: owner, repo or ref missing");
            Vec::new()
        };

        if entries.is_empty() {
            pane.lock().append(Fragment::error_message(no_logs_message(site)));
            return Ok(LogView::Empty);
        }

        tracing::debug!(%site, count = entries.len(), from = %range.from_param(), to = %range.to_param(), "logs fetched");
        let table = log_table(&entries, tz);
        pane.lock().append(Fragment::Table(table.clone()));
        Ok(LogView::Table(table))
    }
}

impl<A: AdminApi> AdminTool for LogViewerTool<A> {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn render<'a>(
        &'a self,
        pane: SharedPane,
        _data: &'a Value,
        _query: Option<&'a str>,
        _ctx: &'a SiteContext,
    ) -> BoxFuture<'a, Result<(), AdminError>> {
        Box::pin(async move {
            self.mount(&pane);
            Ok(())
        })
    }
}
