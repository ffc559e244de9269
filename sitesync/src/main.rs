use anyhow::Context;
use sitesync::config::{CliMode, SiteConfig, USAGE, parse_cli_mode};
use sitesync::sync::SyncEngine;
use tracing_subscriber::EnvFilter;

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = match parse_cli_mode(std::env::args())? {
        CliMode::Help => {
            println!("{USAGE}");
            return Ok(());
        }
        CliMode::Sync(args) => args,
    };
    init_tracing(args.debug);

    let mut config = SiteConfig::from_env()?;
    config.apply_root_override(&args);
    let client = config.client()?;
    let engine = SyncEngine::new(
        client,
        config.root_dir.clone(),
        config.rewrite_policy(),
        config.sync_options(&args),
    );

    let report = engine
        .run()
        .await
        .with_context(|| format!("cannot sync {}", config.root_dir.display()))?;
    tracing::debug!(?report, "done");
    Ok(())
}
