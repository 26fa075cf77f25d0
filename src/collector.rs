//! Maps a UPS [`Status`] onto the fixed set of `apcupsd_*` series.
//!
//! [`Collector::describe`] and [`Collector::collect`] walk the same ordered descriptor list,
//! so every collected sample belongs to an advertised descriptor.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{
	source::{SourceError, StatusSource},
	status::Status,
};

pub const NAMESPACE: &str = "apcupsd";

/// Tokens apcupsd may place in `STATUS`, in the order their indicators are emitted.
pub const STATUS_FLAGS: [&str; 13] = [
	"CAL",           // Calibration mode
	"TRIM",          // Smart trim active
	"BOOST",         // Smart boost active
	"ONLINE",        // UPS is online
	"ONBATT",        // UPS is on battery
	"OVERLOAD",      // UPS is overloaded
	"LOWBATT",       // UPS has a low battery
	"REPLACEBATT",   // UPS battery needs to be replaced
	"NOBATT",        // UPS has no battery
	"SLAVE",         // UPS is a slave
	"SLAVEDOWN",     // UPS is a slave and is down
	"COMMLOST",      // Communication has been lost
	"SHUTTING DOWN", // UPS is shutting down
];

const DEVICE_LABELS: &[&str] = &["ups_name", "hostname", "model"];
const FLAG_LABELS: &[&str] = &["ups_name", "hostname", "model", "status"];

/// A metric collector: advertises its descriptors up front and produces samples for them on demand.
pub trait Collector {
	fn describe(&self) -> &[Desc];
	fn collect(&self) -> Vec<Metric<'_>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
	Gauge,
	Counter,
}

/// What a descriptor reads from a [`Status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
	/// One sample per entry of [`STATUS_FLAGS`].
	Flags,
	Info,
	Field(Field),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
	LoadPercent,
	BatteryChargePercent,
	LineVoltage,
	NominalInputVoltage,
	OutputVoltage,
	BatteryVoltage,
	NominalBatteryVoltage,
	NumberTransfers,
	TimeLeft,
	TimeOnBattery,
	CumulativeTimeOnBattery,
	LastTransferOnBattery,
	LastTransferOffBattery,
	LastSelftest,
	NominalPower,
	InternalTemperature,
}

impl Field {
	pub fn read(self, status: &Status) -> f64 {
		match self {
			Field::LoadPercent => status.load_percent,
			Field::BatteryChargePercent => status.battery_charge_percent,
			Field::LineVoltage => status.line_voltage,
			Field::NominalInputVoltage => status.nominal_input_voltage,
			Field::OutputVoltage => status.output_voltage,
			Field::BatteryVoltage => status.battery_voltage,
			Field::NominalBatteryVoltage => status.nominal_battery_voltage,
			Field::NumberTransfers => status.number_transfers as f64,
			Field::TimeLeft => status.time_left.as_secs_f64(),
			Field::TimeOnBattery => status.time_on_battery.as_secs_f64(),
			Field::CumulativeTimeOnBattery => status.cumulative_time_on_battery.as_secs_f64(),
			Field::LastTransferOnBattery => timestamp(status.last_transfer_on_battery),
			Field::LastTransferOffBattery => timestamp(status.last_transfer_off_battery),
			Field::LastSelftest => timestamp(status.last_selftest),
			Field::NominalPower => f64::from(status.nominal_power_watts),
			Field::InternalTemperature => status.internal_temperature_celsius,
		}
	}
}

/// Position of the info series in [`METRICS`]; fetch failures are reported against it.
const INFO: usize = 1;

/// Name suffix, help, type and source of every exported series, in emission order.
const METRICS: [(&str, &str, Kind, Source); 18] = [
	("status", "Current UPS status.", Kind::Gauge, Source::Flags),
	("info", "Metadata about a given UPS.", Kind::Gauge, Source::Info),
	("ups_load_percent", "Current UPS load percentage.", Kind::Gauge, Source::Field(Field::LoadPercent)),
	(
		"battery_charge_percent",
		"Current UPS battery charge percentage.",
		Kind::Gauge,
		Source::Field(Field::BatteryChargePercent),
	),
	("line_volts", "Current AC input line voltage.", Kind::Gauge, Source::Field(Field::LineVoltage)),
	("line_nominal_volts", "Nominal AC input line voltage.", Kind::Gauge, Source::Field(Field::NominalInputVoltage)),
	("output_volts", "Current AC output voltage.", Kind::Gauge, Source::Field(Field::OutputVoltage)),
	("battery_volts", "Current UPS battery voltage.", Kind::Gauge, Source::Field(Field::BatteryVoltage)),
	("battery_nominal_volts", "Nominal UPS battery voltage.", Kind::Gauge, Source::Field(Field::NominalBatteryVoltage)),
	(
		"battery_number_transfers_total",
		"Total number of transfers to UPS battery power.",
		Kind::Counter,
		Source::Field(Field::NumberTransfers),
	),
	(
		"battery_time_left_seconds",
		"Number of seconds remaining of UPS battery power.",
		Kind::Gauge,
		Source::Field(Field::TimeLeft),
	),
	(
		"battery_time_on_seconds",
		"Number of seconds the UPS has been providing battery power due to an AC input line outage.",
		Kind::Gauge,
		Source::Field(Field::TimeOnBattery),
	),
	(
		"battery_cumulative_time_on_seconds_total",
		"Total number of seconds the UPS has provided battery power due to AC input line outages.",
		Kind::Counter,
		Source::Field(Field::CumulativeTimeOnBattery),
	),
	(
		"last_transfer_on_battery_time_seconds",
		"UNIX timestamp of last transfer to battery since apcupsd startup.",
		Kind::Gauge,
		Source::Field(Field::LastTransferOnBattery),
	),
	(
		"last_transfer_off_battery_time_seconds",
		"UNIX timestamp of last transfer from battery since apcupsd startup.",
		Kind::Gauge,
		Source::Field(Field::LastTransferOffBattery),
	),
	(
		"last_selftest_time_seconds",
		"UNIX timestamp of last selftest since apcupsd startup.",
		Kind::Gauge,
		Source::Field(Field::LastSelftest),
	),
	("nominal_power_watts", "Nominal power output in watts.", Kind::Gauge, Source::Field(Field::NominalPower)),
	(
		"internal_temperature_celsius",
		"Internal temperature in °C.",
		Kind::Gauge,
		Source::Field(Field::InternalTemperature),
	),
];

#[derive(Debug, PartialEq)]
pub struct Desc {
	pub name: String,
	pub help: &'static str,
	pub kind: Kind,
	pub label_names: &'static [&'static str],
	pub source: Source,
}

#[derive(Debug)]
pub struct Sample<'a> {
	pub desc: &'a Desc,
	pub label_values: Vec<String>,
	pub value: f64,
}

/// Emitted instead of any samples when the status could not be fetched.
#[derive(Debug)]
pub struct InvalidMetric<'a> {
	pub desc: &'a Desc,
	pub error: SourceError,
}

#[derive(Debug)]
pub enum Metric<'a> {
	Sample(Sample<'a>),
	Invalid(InvalidMetric<'a>),
}

pub struct UpsCollector<S> {
	descs: Vec<Desc>,
	source: S,
}

impl<S: StatusSource> UpsCollector<S> {
	pub fn new(source: S) -> Self {
		let descs = METRICS
			.iter()
			.map(|&(suffix, help, kind, reads)| Desc {
				name: format!("{NAMESPACE}_{suffix}"),
				help,
				kind,
				label_names: if reads == Source::Flags { FLAG_LABELS } else { DEVICE_LABELS },
				source: reads,
			})
			.collect();
		Self { descs, source }
	}
}

impl<S: StatusSource> Collector for UpsCollector<S> {
	fn describe(&self) -> &[Desc] {
		&self.descs
	}

	fn collect(&self) -> Vec<Metric<'_>> {
		let status = match self.source.status() {
			Ok(status) => status,
			Err(error) => {
				warn!(%error, "failed collecting UPS metrics");
				return vec![Metric::Invalid(InvalidMetric {
					desc: &self.descs[INFO],
					error,
				})];
			},
		};

		let device = [status.ups_name.clone(), status.hostname.clone(), status.model.clone()];
		let mut metrics = Vec::with_capacity(self.descs.len() + STATUS_FLAGS.len());
		for desc in &self.descs {
			match desc.source {
				Source::Flags => {
					for flag in STATUS_FLAGS {
						let mut label_values = device.to_vec();
						label_values.push(flag.to_string());
						metrics.push(Metric::Sample(Sample {
							desc,
							label_values,
							value: flag_value(&status.status, flag),
						}));
					}
				},
				Source::Info => metrics.push(Metric::Sample(Sample {
					desc,
					label_values: device.to_vec(),
					value: 1.,
				})),
				Source::Field(field) => metrics.push(Metric::Sample(Sample {
					desc,
					label_values: device.to_vec(),
					value: field.read(&status),
				})),
			}
		}
		metrics
	}
}

/// 1 when `flag` appears anywhere in `status`. This is a substring test, so `SLAVEDOWN` also raises `SLAVE`.
pub fn flag_value(status: &str, flag: &str) -> f64 {
	f64::from(status.contains(flag))
}

fn timestamp(t: Option<DateTime<Utc>>) -> f64 {
	t.map_or(0., |t| t.timestamp() as f64)
}
