use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use facturas_pro_tools::cli::Cli;
use facturas_pro_tools::commands::{self, Context};
use facturas_pro_tools::config;
use facturas_pro_tools::db;
use facturas_pro_tools::error::AppError;

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_filter = if cli.verbose {
    "facturas_pro_tools=debug"
  } else {
    "facturas_pro_tools=info"
  };
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into()),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("{err}");
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<(), AppError> {
  // Only a fallback for paths not given explicitly; nothing is created here.
  let app_dir = match db::resolve_app_dir() {
    Ok(dir) => Some(dir),
    Err(err) => {
      debug!(error = %err, "no local data directory");
      None
    }
  };
  let config = config::load_config(cli.config.as_deref(), app_dir.as_deref())?;
  commands::run(&Context { app_dir, config }, cli.command)
}
