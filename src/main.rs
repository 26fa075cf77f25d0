use std::{env, sync::Arc};

use prometheus_exporter_base::render_prometheus;
use tokio::task::spawn_blocking;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
	collector::UpsCollector,
	config::{ExporterOptions, DEFAULT_CONFIG_PATH},
	render::render_metrics,
	source::ApcupsdSource,
};

mod collector;
mod config;
mod render;
mod source;
mod status;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	init_tracing();

	let config_path = env::var("CONFIG_PATH").unwrap_or(DEFAULT_CONFIG_PATH.to_owned());
	let options = ExporterOptions::load(&config_path)?;
	info!(
		listen = %options.address,
		apcupsd = %format!("{}:{}", options.apcupsd.address, options.apcupsd.port),
		"starting apcupsd exporter"
	);

	let collector = Arc::new(UpsCollector::new(ApcupsdSource::new(&options.apcupsd)));
	// The NIS client blocks, so every scrape collects on the blocking pool.
	render_prometheus(options.into(), (), |_request, _| async move {
		let rendered = spawn_blocking(move || render_metrics(collector.as_ref())).await??;
		Ok(rendered)
	})
	.await;

	Ok(())
}

fn init_tracing() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).init();
}
