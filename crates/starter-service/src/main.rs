//! Main entry point for the node starter.
//!
//! Loads the TOML configuration, runs the startup sequence and reports what
//! was resolved.

use clap::Parser;
use starter_config::Config;
use starter_service::bootstrap;
use std::path::PathBuf;

/// Command-line arguments for the node starter.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long)]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Loading configuration from file: {:?}", args.config);
	let config = Config::from_file(&args.config.to_string_lossy()).await?;

	let context = bootstrap(&config).await?;

	tracing::info!(
		keystore_dir = %context.keystore_dir.display(),
		account = ?context.account.map(|a| a.to_string()),
		orchestrator = config.node.orchestrator,
		broadcaster_prices = context.broadcaster_prices.len(),
		"Node bootstrap complete"
	);
	if let Some(record) = &context.orchestrator {
		tracing::info!(
			address = %record.address,
			activation_round = record.activation_round,
			deactivation_round = record.deactivation_round,
			"Orchestrator registration"
		);
	}

	Ok(())
}
