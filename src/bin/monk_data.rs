use clap::Parser;
use monk_data::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so STORE_DATA_DIR, APP_ENV, etc. apply
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("Starting monk-data in {:?} mode", monk_data::config::config().environment);

    if let Err(e) = monk_data::cli::run(cli).await {
        let verbose = matches!(std::env::var("CLI_VERBOSE").as_deref(), Ok("true") | Ok("1"));
        if verbose || monk_data::is_development!() {
            eprintln!("Error: {e:?}");
        }
        std::process::exit(1);
    }

    Ok(())
}
