use apcaccess::{APCAccess, APCAccessConfig};
use thiserror::Error;
use tracing::debug;

use crate::{
	config::ApcupsdOptions,
	status::{ParseStatusError, Status},
};

/// Something that can report the current status of a UPS.
pub trait StatusSource {
	fn status(&self) -> Result<Status, SourceError>;
}

#[derive(Error, Debug)]
pub enum SourceError {
	#[error("failed to query apcupsd: {0}")]
	Fetch(#[from] std::io::Error),
	#[error("malformed apcupsd status: {0}")]
	Parse(#[from] ParseStatusError),
}

/// Reads status from the apcupsd network information server, one connection per call.
pub struct ApcupsdSource {
	apc_access: APCAccess,
}

impl ApcupsdSource {
	pub fn new(options: &ApcupsdOptions) -> Self {
		Self {
			apc_access: APCAccess::new(Some(APCAccessConfig {
				host: options.address.clone(),
				port: options.port,
				timeout: options.timeout(),
				..Default::default()
			})),
		}
	}
}

impl StatusSource for ApcupsdSource {
	fn status(&self) -> Result<Status, SourceError> {
		let fields = self.apc_access.fetch()?;
		debug!(keys = fields.len(), "fetched apcupsd status");
		Ok(Status::from_fields(&fields)?)
	}
}
