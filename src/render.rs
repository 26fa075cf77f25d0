use prometheus_exporter_base::{MetricType, MissingValue, PrometheusInstance, PrometheusMetric};
use thiserror::Error;

use crate::{
	collector::{Collector, Kind, Metric},
	source::SourceError,
};

impl From<Kind> for MetricType {
	fn from(kind: Kind) -> Self {
		match kind {
			Kind::Gauge => MetricType::Gauge,
			Kind::Counter => MetricType::Counter,
		}
	}
}

fn prometheus_instance_with_labels<'a>(names: &[&'a str], values: &'a [String]) -> PrometheusInstance<'a, f64, MissingValue> {
	let mut instance = PrometheusInstance::new();
	for (name, value) in names.iter().zip(values) {
		instance = instance.with_label(*name, value.as_str());
	}
	instance
}

/// Runs one collection and renders it in the Prometheus text format.
///
/// Nothing is rendered if the collector reported an invalid metric.
pub fn render_metrics(collector: &impl Collector) -> Result<String, RenderMetricsError> {
	let mut samples = Vec::new();
	for metric in collector.collect() {
		match metric {
			Metric::Sample(sample) => samples.push(sample),
			Metric::Invalid(invalid) => {
				return Err(RenderMetricsError::Collect {
					metric: invalid.desc.name.clone(),
					source: invalid.error,
				})
			},
		}
	}

	let mut rendered = String::new();
	for desc in collector.describe() {
		let mut metric = PrometheusMetric::build()
			.with_name(&desc.name)
			.with_help(desc.help)
			.with_metric_type(desc.kind.into())
			.build();
		for sample in samples.iter().filter(|s| std::ptr::eq(s.desc, desc)) {
			metric.render_and_append_instance(&prometheus_instance_with_labels(desc.label_names, &sample.label_values).with_value(sample.value));
		}
		rendered += &metric.render();
	}
	Ok(rendered)
}

#[derive(Error, Debug)]
pub enum RenderMetricsError {
	#[error("{metric}: {source}")]
	Collect { metric: String, source: SourceError },
}

#[cfg(test)]
mod tests {
	use std::{fs, io, path::PathBuf};

	use insta::with_settings;
	use rstest::rstest;

	use crate::{
		collector::{
			tests::{online_status, FakeSource},
			Collector, UpsCollector, STATUS_FLAGS,
		},
		source::{SourceError, StatusSource},
		status::{fields_from_report, Status},
	};

	use super::{render_metrics, RenderMetricsError};

	/// Replays a recorded `apcaccess status` report.
	struct ReportSource(String);

	impl StatusSource for ReportSource {
		fn status(&self) -> Result<Status, SourceError> {
			let fields = fields_from_report(&self.0).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
			Ok(Status::from_fields(&fields)?)
		}
	}

	#[rstest]
	fn test_examples(#[files("tests/*_examples/*.status")] path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
		let collector = UpsCollector::new(ReportSource(fs::read_to_string(&path)?));
		let name = path.file_stem().and_then(|n| n.to_str()).ok_or("bad filename")?;
		let rendered = render_metrics(&collector)?;
		with_settings!(
			{
				prepend_module_to_snapshot => false,
				snapshot_path => "../tests/snapshots",
			},
			{ insta::assert_snapshot!(name, rendered) }
		);
		Ok(())
	}

	#[test]
	fn renders_every_series() {
		let collector = UpsCollector::new(FakeSource::Healthy(online_status()));
		let rendered = render_metrics(&collector).unwrap();

		for desc in collector.describe() {
			assert!(rendered.contains(&format!("# HELP {} {}\n", desc.name, desc.help)), "{}", desc.name);
		}
		assert!(rendered.contains("# TYPE apcupsd_battery_number_transfers_total counter"));
		assert!(rendered.contains("# TYPE apcupsd_ups_load_percent gauge"));
		assert_eq!(rendered.lines().filter(|l| l.starts_with("apcupsd_status{")).count(), STATUS_FLAGS.len());
		assert_eq!(rendered.lines().filter(|l| l.starts_with("# TYPE ")).count(), 18);

		let load = rendered.lines().find(|l| l.starts_with("apcupsd_ups_load_percent{")).unwrap();
		assert!(load.contains("ups_name=\"rack-ups\""), "{load}");
		assert!(load.contains("model=\"Back-UPS RS 1500G\""), "{load}");
		assert!(load.ends_with(" 12.5"), "{load}");

		let online = rendered.lines().find(|l| l.starts_with("apcupsd_status{") && l.contains("status=\"ONLINE\"")).unwrap();
		assert!(online.ends_with(" 1"), "{online}");
	}

	#[test]
	fn failed_fetch_fails_the_scrape() {
		let error = render_metrics(&UpsCollector::new(FakeSource::Down(io::ErrorKind::TimedOut))).unwrap_err();
		let RenderMetricsError::Collect { metric, source } = error;
		assert_eq!(metric, "apcupsd_info");
		assert!(matches!(source, SourceError::Fetch(e) if e.kind() == io::ErrorKind::TimedOut));
	}
}
