mod app;
mod commands;
mod config;
mod event;
mod logging;
mod ui;

use clap::Parser;
use color_eyre::Result;
use fuelsync::resources::{self, StationBindings};
use fuelsync::rest::RestBackend;
use fuelsync::QueryClient;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fuelsync")]
#[command(about = "Terminal dashboard for fuel station data, served from a synchronized cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/fuelsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Resource to show first
  #[arg(short, long, default_value = resources::TANKS)]
  resource: String,

  /// Log filter directive, overrides log_level from the config file
  #[arg(long)]
  log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;

  let level = args.log_level.as_deref().unwrap_or(&config.log_level);
  let _log_guard = logging::init(level)?;

  let backend = RestBackend::new(&config.backend.url, config::Config::get_api_key()?)?;
  let client = QueryClient::new(config.cache.to_options());
  let station = StationBindings::with_options(&client, &backend, |resource| config.options_for(resource));

  info!(backend = %config.backend.url, resource = %args.resource, "starting dashboard");

  let mut app = app::App::new(config, station, &args.resource)?;
  let result = app.run().await;

  drop(app);
  client.shutdown();
  info!("dashboard closed");

  result
}
