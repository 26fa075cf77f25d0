use std::{fs, net::SocketAddr, time::Duration};

use prometheus_exporter_base::prelude::{Authorization, ServerOptions, TlsOptions};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/prometheus/apcupsd_exporter_config.yaml";

/// Where to reach the apcupsd network information server.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApcupsdOptions {
	pub address: String,
	pub port: u16,
	pub timeout_ms: u64,
}

impl ApcupsdOptions {
	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout_ms)
	}
}

impl Default for ApcupsdOptions {
	fn default() -> Self {
		Self {
			address: "127.0.0.1".into(),
			port: 3551,
			timeout_ms: 500,
		}
	}
}

#[derive(Deserialize)]
#[serde(default)]
pub struct ExporterOptions {
	pub address: SocketAddr,
	pub authorization: Authorization,
	pub tls_options: Option<TlsOptions>,
	pub apcupsd: ApcupsdOptions,
}

impl Default for ExporterOptions {
	fn default() -> Self {
		ExporterOptions {
			address: SocketAddr::new([127, 0, 0, 1].into(), 9162),
			authorization: Default::default(),
			tls_options: Default::default(),
			apcupsd: Default::default(),
		}
	}
}

impl ExporterOptions {
	/// Loads the options from `path`, falling back to the defaults when the file doesn't exist.
	pub fn load(path: &str) -> Result<Self, ConfigError> {
		if !fs::exists(path)? {
			return Ok(Default::default());
		}
		let (options, ignored) = Self::from_yaml(&fs::read_to_string(path)?)?;
		for key in ignored {
			warn!(%key, "ignoring unknown configuration key");
		}
		Ok(options)
	}

	/// Deserializes the options, returning the paths of any keys that were not recognised.
	pub fn from_yaml(yaml: &str) -> Result<(Self, Vec<String>), ConfigError> {
		let mut ignored = Vec::new();
		let options = serde_ignored::deserialize(serde_yaml::Deserializer::from_str(yaml), |path| ignored.push(path.to_string()))?;
		Ok((options, ignored))
	}
}

impl From<ExporterOptions> for ServerOptions {
	fn from(val: ExporterOptions) -> Self {
		ServerOptions {
			addr: val.address,
			authorization: val.authorization,
			tls_options: val.tls_options,
		}
	}
}

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("failed to read configuration: {0}")]
	Io(#[from] std::io::Error),
	#[error("invalid configuration: {0}")]
	Yaml(#[from] serde_yaml::Error),
}
