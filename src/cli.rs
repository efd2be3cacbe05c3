//! Command-line front end.
//!
//! The binary plays the host: it builds the admin panel from the configured
//! tool sheet, selects a tool and prints the content pane as text or HTML.

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

use crate::admin_api::AdminClient;
use crate::admin_panel::{AdminPanel, SEARCH_ENABLED, TITLE};
use crate::bulk_status::{self, BulkStatusTool, PollState};
use crate::config::{self, AdminConfig};
use crate::context::{parse_github_url, SiteContext, DEFAULT_REF};
use crate::log_viewer::{self, LogView, LogViewerTool};
use crate::pane::SharedPane;
use crate::sidekick::SidekickBridge;

#[derive(Parser, Debug)]
#[command(name = "sidekick-admin", version)]
#[command(about = "Bulk status checks and log queries against the admin API")]
pub struct Cli {
    /// Admin API base URL (overrides the config file)
    #[arg(long, global = true, env = "SIDEKICK_ADMIN_API")]
    pub api: Option<String>,

    /// Auth token sent with every request
    #[arg(long, global = true, env = "SIDEKICK_ADMIN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Debug logging (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a bulk status job for every page of a site
    Status {
        #[command(flatten)]
        site: SiteArgs,
        /// Milliseconds between job status checks
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Print the pane as HTML
        #[arg(long)]
        html: bool,
    },
    /// Query the admin log of a site
    Logs {
        #[command(flatten)]
        site: SiteArgs,
        /// Start of the range (default: 24 hours ago)
        #[arg(long)]
        from: Option<String>,
        /// End of the range (default: now)
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        html: bool,
    },
    /// List the tools in the admin panel
    Tools,
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration (token redacted)
    Show,
    /// Print the config file location
    Path,
    /// Write a default config file if none exists
    Init,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SiteArgs {
    /// https://github.com/{owner}/{repo}[/tree/{ref}]
    #[arg(long, conflicts_with_all = ["owner", "repo"])]
    pub github_url: Option<String>,
    #[arg(long)]
    pub owner: Option<String>,
    #[arg(long)]
    pub repo: Option<String>,
    #[arg(long = "ref", default_value = DEFAULT_REF)]
    pub git_ref: String,
}

impl SiteArgs {
    pub fn resolve(&self) -> Result<SiteContext, String> {
        if let Some(url) = &self.github_url {
            return parse_github_url(url);
        }
        match (&self.owner, &self.repo) {
            (Some(owner), Some(repo)) => Ok(SiteContext::new(owner, repo, &self.git_ref)),
            _ => Err("Provide --github-url or both --owner and --repo".to_string()),
        }
    }
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut AdminConfig) {
        if let Some(api) = &self.api {
            config.api_base = api.clone();
        }
        if let Some(token) = &self.token {
            config.auth_token = Some(token.clone());
        }
        if let Command::Status { interval_ms: Some(ms), .. } = &self.command {
            config.poll_interval_ms = *ms;
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

struct Session {
    panel: AdminPanel,
    bulk: Arc<BulkStatusTool<AdminClient>>,
    logs: Arc<LogViewerTool<AdminClient>>,
}

fn open_session(config: &AdminConfig, site: SiteContext) -> anyhow::Result<Session> {
    let api = Arc::new(AdminClient::new(config)?);
    let bulk = Arc::new(BulkStatusTool::new(
        api.clone(),
        Duration::from_millis(config.poll_interval_ms),
    ));
    let logs = Arc::new(LogViewerTool::new(api));

    let mut panel = AdminPanel::new(config.tools.clone(), site);
    panel.register(bulk.clone());
    panel.register(logs.clone());

    // No project status to hand over; the terminal host is ready at once
    let bridge = Arc::new(SidekickBridge::new());
    bridge.mark_ready();
    panel.attach_sidekick(bridge, Duration::from_millis(config.sidekick_wait_ms));

    Ok(Session { panel, bulk, logs })
}

/// Name of the first sheet entry rendered by `module`.
fn entry_for(panel: &AdminPanel, module: &str) -> anyhow::Result<String> {
    panel
        .entries()
        .iter()
        .find(|e| e.module == module)
        .map(|e| e.name.clone())
        .ok_or_else(|| anyhow!("No tool in the admin panel uses module \"{module}\""))
}

fn print_pane(pane: &SharedPane, html: bool) {
    let pane = pane.lock();
    if html {
        println!("{}", pane.to_html());
    } else {
        println!("{}", pane.to_text());
    }
}

async fn run_status(config: &AdminConfig, site: SiteContext, html: bool) -> anyhow::Result<()> {
    let mut session = open_session(config, site)?;
    let name = entry_for(&session.panel, bulk_status::MODULE)?;
    session.panel.select(&name).await?;
    let pane = session.panel.content();

    let state = tokio::select! {
        state = session.bulk.wait() => state,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, cancelling bulk status poll");
            session.panel.close();
            Some(PollState::Cancelled)
        }
    };

    print_pane(&pane, html);
    match state {
        Some(PollState::Done { rows }) => {
            tracing::info!(rows, "bulk status complete");
            Ok(())
        }
        Some(PollState::Failed(msg)) => bail!(msg),
        Some(PollState::Cancelled | PollState::Polling { .. }) => bail!("Bulk status cancelled"),
        None => bail!("Bulk status job was not started by the admin API"),
    }
}

async fn run_logs(
    config: &AdminConfig,
    site: SiteContext,
    from: Option<&str>,
    to: Option<&str>,
    html: bool,
) -> anyhow::Result<()> {
    let mut session = open_session(config, site)?;
    let name = entry_for(&session.panel, log_viewer::MODULE)?;
    session.panel.select(&name).await?;
    let pane = session.panel.content();

    let view = session
        .logs
        .submit(&pane, session.panel.context(), from, to)
        .await?;
    print_pane(&pane, html);
    match view {
        LogView::Table(table) => {
            tracing::debug!(rows = table.rows.len(), "log entries shown");
            Ok(())
        }
        LogView::Empty => Ok(()),
        LogView::InvalidRange(msg) => bail!(msg),
        LogView::Unauthorized => bail!("Not logged in to the admin API"),
    }
}

fn run_tools(config: &AdminConfig) {
    println!("{TITLE}{}", if SEARCH_ENABLED { " (search enabled)" } else { "" });
    for entry in &config.tools {
        println!("  {:<20} {}", entry.name, entry.module);
    }
}

fn redacted(config: &AdminConfig) -> AdminConfig {
    let mut shown = config.clone();
    if shown.auth_token.is_some() {
        shown.auth_token = Some("********".to_string());
    }
    shown
}

fn run_config(config: &AdminConfig, action: ConfigAction) -> anyhow::Result<()> {
    let path = config::admin_config_path();
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(&redacted(config))?);
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init => {
            if path.exists() {
                println!("Config already exists at {}", path.display());
            } else {
                config::save_admin_config(&AdminConfig::default()).map_err(|e| anyhow!(e))?;
                println!("Wrote {}", path.display());
            }
        }
    }
    Ok(())
}

pub async fn execute(cli: Cli, config: AdminConfig) -> anyhow::Result<()> {
    match cli.command {
        Command::Status { site, html, .. } => {
            let site = site.resolve().map_err(|e| anyhow!(e))?;
            run_status(&config, site, html)
                .await
                .context("bulk status failed")
        }
        Command::Logs { site, from, to, html } => {
            let site = site.resolve().map_err(|e| anyhow!(e))?;
            run_logs(&config, site, from.as_deref(), to.as_deref(), html).await
        }
        Command::Tools => {
            run_tools(&config);
            Ok(())
        }
        Command::Config { action } => run_config(&config, action),
    }
}
