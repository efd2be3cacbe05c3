use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "sidekick_admin=info,sidekick_admin_lib=info";
const VERBOSE_FILTER: &str = "sidekick_admin=debug,sidekick_admin_lib=debug";

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean. `RUST_LOG` takes precedence over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbose))
        .try_init();

    if let Err(e) = result {
        eprintln!("[logging] subscriber already installed: {e}");
    }
}
