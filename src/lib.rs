pub mod admin_api;
pub mod admin_panel;
pub mod bulk_status;
pub(crate) mod cli;
pub mod config;
pub mod context;
pub(crate) mod datetime;
pub mod job;
pub mod log_viewer;
pub(crate) mod logging;
pub mod pane;
pub mod retry;
pub mod sidekick;

use clap::Parser;

pub use admin_api::{AdminApi, AdminClient, AdminError};
pub use admin_panel::{AdminPanel, AdminTool, ToolEntry};
pub use context::SiteContext;

/// Entry point of the `sidekick-admin` binary.
pub fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    logging::init_tracing(cli.verbose);

    let mut config = config::load_admin_config();
    cli.apply_overrides(&mut config);
    tracing::debug!(api = config.api_base(), "configuration loaded");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cli::execute(cli, config))
}
