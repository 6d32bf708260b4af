//! Main entry point for the records retrieval service.
//!
//! Loads the configuration, wires the retrieval engine and runs it, together
//! with the HTTP API when `[api].enabled` is set.

use clap::Parser;
use retrieval_config::Config;
use retrieval_core::{EngineBuilder, RetrievalEngine};
use retrieval_storage::StorageFactory;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

/// Command-line arguments for the retrieval service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started retrieval service");

	let config_path = args
		.config
		.to_str()
		.ok_or("configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(build_engine(config.clone())?);

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			let api_engine = Arc::clone(&engine);

			tokio::select! {
				result = engine.run() => {
					tracing::info!("Engine finished");
					result?;
				}
				result = server::start_server(api_config, api_engine) => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("Starting engine only");
			engine.run().await?;
		},
	}

	tracing::info!("Stopped retrieval service");
	Ok(())
}

/// Builds the retrieval engine with every built-in storage backend.
fn build_engine(config: Config) -> Result<RetrievalEngine, Box<dyn std::error::Error>> {
	let storage_factories: HashMap<String, StorageFactory> =
		retrieval_storage::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect();

	Ok(EngineBuilder::new(config).build(storage_factories)?)
}
