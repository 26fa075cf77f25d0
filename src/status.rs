use std::{collections::HashMap, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// One reading of a UPS, as reported by the apcupsd network information server.
///
/// Keys missing from the report leave the matching field at its zero value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Status {
	pub ups_name: String,
	pub hostname: String,
	pub model: String,
	/// Space delimited status flags, e.g. `ONBATT LOWBATT`.
	pub status: String,

	pub load_percent: f64,
	pub battery_charge_percent: f64,
	pub line_voltage: f64,
	pub nominal_input_voltage: f64,
	pub output_voltage: f64,
	pub battery_voltage: f64,
	pub nominal_battery_voltage: f64,
	pub number_transfers: u64,

	pub time_left: Duration,
	pub time_on_battery: Duration,
	pub cumulative_time_on_battery: Duration,

	pub last_transfer_on_battery: Option<DateTime<Utc>>,
	pub last_transfer_off_battery: Option<DateTime<Utc>>,
	pub last_selftest: Option<DateTime<Utc>>,

	pub nominal_power_watts: u32,
	pub internal_temperature_celsius: f64,
}

impl Status {
	pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, ParseStatusError> {
		let fields = Fields(fields);
		Ok(Self {
			ups_name: fields.text("UPSNAME"),
			hostname: fields.text("HOSTNAME"),
			model: fields.text("MODEL"),
			status: fields.text("STATUS"),
			load_percent: fields.parse("LOADPCT", percentage)?,
			battery_charge_percent: fields.parse("BCHARGE", percentage)?,
			line_voltage: fields.parse("LINEV", voltage)?,
			nominal_input_voltage: fields.parse("NOMINV", voltage)?,
			output_voltage: fields.parse("OUTPUTV", voltage)?,
			battery_voltage: fields.parse("BATTV", voltage)?,
			nominal_battery_voltage: fields.parse("NOMBATTV", voltage)?,
			number_transfers: fields.parse("NUMXFERS", count)?,
			time_left: fields.parse("TIMELEFT", duration)?,
			time_on_battery: fields.parse("TONBATT", duration)?,
			cumulative_time_on_battery: fields.parse("CUMONBATT", duration)?,
			last_transfer_on_battery: fields.parse("XONBATT", timestamp)?,
			last_transfer_off_battery: fields.parse("XOFFBATT", timestamp)?,
			last_selftest: fields.parse("LASTSTEST", timestamp)?,
			nominal_power_watts: fields.parse("NOMPOWER", power)?,
			internal_temperature_celsius: fields.parse("ITEMP", temperature)?,
		})
	}
}

struct Fields<'a>(&'a HashMap<String, String>);

impl Fields<'_> {
	fn text(&self, key: &str) -> String {
		self.0.get(key).cloned().unwrap_or_default()
	}

	fn parse<T: Default>(&self, key: &str, parse: fn(&str) -> Result<T, ParseValueError>) -> Result<T, ParseStatusError> {
		match self.0.get(key) {
			Some(value) => parse(value).map_err(|error| ParseStatusError {
				key: key.to_string(),
				error,
			}),
			None => Ok(T::default()),
		}
	}
}

/// Values apcupsd reports in place of a timestamp that never happened.
const UNSET_TIMESTAMPS: [&str; 2] = ["", "N/A"];

/// Parses `<number> <unit>`. Older apcupsd releases trail the unit with a description
/// (`4.0 Percent Load Capacity`) and spell some units in lower case.
fn measurement<T: FromStr>(value: &str, unit: &str) -> Option<T> {
	let mut parts = value.split_whitespace();
	let number = parts.next()?;
	if !parts.next()?.eq_ignore_ascii_case(unit) {
		return None;
	}
	number.parse().ok()
}

/// A [`measurement`] that must also be a finite number.
fn reading(value: &str, unit: &str) -> Option<f64> {
	measurement::<f64>(value, unit).filter(|v| v.is_finite())
}

fn percentage(value: &str) -> Result<f64, ParseValueError> {
	reading(value, "Percent").ok_or_else(|| ParseValueError::InvalidPercentage(value.to_string()))
}

fn voltage(value: &str) -> Result<f64, ParseValueError> {
	reading(value, "Volts").ok_or_else(|| ParseValueError::InvalidVoltage(value.to_string()))
}

fn temperature(value: &str) -> Result<f64, ParseValueError> {
	reading(value, "C").ok_or_else(|| ParseValueError::InvalidTemperature(value.to_string()))
}

fn power(value: &str) -> Result<u32, ParseValueError> {
	measurement(value, "Watts").ok_or_else(|| ParseValueError::InvalidPower(value.to_string()))
}

fn count(value: &str) -> Result<u64, ParseValueError> {
	value.parse().map_err(|_| ParseValueError::InvalidCount(value.to_string()))
}

fn duration(value: &str) -> Result<Duration, ParseValueError> {
	let seconds = measurement::<f64>(value, "Seconds").or_else(|| measurement::<f64>(value, "Minutes").map(|m| m * 60.));
	seconds
		.and_then(|s| Duration::try_from_secs_f64(s).ok())
		.ok_or_else(|| ParseValueError::InvalidDuration(value.to_string()))
}

fn timestamp(value: &str) -> Result<Option<DateTime<Utc>>, ParseValueError> {
	if UNSET_TIMESTAMPS.contains(&value) {
		return Ok(None);
	}
	DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S %z")
		.or_else(|_| DateTime::parse_from_str(value, "%a %b %d %X %z %Y")) // Historic apcupsd date format
		.map(|t| Some(t.with_timezone(&Utc)))
		.map_err(|e| ParseValueError::InvalidTimestamp(value.to_string(), e.to_string()))
}

#[derive(Error, Debug)]
#[error("{key}: {error}")]
pub struct ParseStatusError {
	pub key: String,
	pub error: ParseValueError,
}

#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug, PartialEq)]
pub enum ParseValueError {
	#[error("invalid timestamp \"{0}\" {1}")]
	InvalidTimestamp(String, String),
	#[error("invalid duration \"{0}\"")]
	InvalidDuration(String),
	#[error("invalid percentage \"{0}\"")]
	InvalidPercentage(String),
	#[error("invalid voltage \"{0}\"")]
	InvalidVoltage(String),
	#[error("invalid temperature \"{0}\"")]
	InvalidTemperature(String),
	#[error("invalid count \"{0}\"")]
	InvalidCount(String),
	#[error("invalid power \"{0}\"")]
	InvalidPower(String),
}

/// Splits a recorded `apcaccess status` report into the key/value map the NIS client returns.
#[cfg(test)]
pub(crate) fn fields_from_report(report: &str) -> Result<HashMap<String, String>, String> {
	report
		.lines()
		.filter(|l| !l.trim().is_empty())
		.map(|l| {
			l.split_once(':')
				.map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
				.ok_or_else(|| format!("invalid report line \"{l}\""))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use std::{collections::HashMap, time::Duration};

	use chrono::{TimeZone, Utc};
	use rstest::rstest;

	use super::{fields_from_report, Status};

	const ONLINE: &str = include_str!("../tests/apcupsd_examples/online.status");
	const ON_BATTERY: &str = include_str!("../tests/apcupsd_examples/on_battery.status");
	const HISTORIC: &str = include_str!("../tests/apcupsd_examples/historic_dates.status");

	fn parse(report: &str) -> Status {
		Status::from_fields(&fields_from_report(report).unwrap()).unwrap()
	}

	#[test]
	fn online_report() {
		let status = parse(ONLINE);
		assert_eq!(status.ups_name, "rack-ups");
		assert_eq!(status.hostname, "nas01");
		assert_eq!(status.model, "Back-UPS RS 1500G");
		assert_eq!(status.status, "ONLINE");
		assert_eq!(status.load_percent, 12.5);
		assert_eq!(status.battery_charge_percent, 100.0);
		assert_eq!(status.line_voltage, 230.0);
		assert_eq!(status.nominal_input_voltage, 230.0);
		assert_eq!(status.battery_voltage, 27.2);
		assert_eq!(status.nominal_battery_voltage, 24.0);
		assert_eq!(status.number_transfers, 2);
		assert_eq!(status.time_left, Duration::from_secs(45 * 60));
		assert_eq!(status.time_on_battery, Duration::ZERO);
		assert_eq!(status.cumulative_time_on_battery, Duration::from_secs(18));
		assert_eq!(status.last_transfer_on_battery, Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap()));
		assert_eq!(status.last_transfer_off_battery, Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 9).unwrap()));
		assert_eq!(status.nominal_power_watts, 865);
		// Back-UPS models report neither output voltage nor temperature.
		assert_eq!(status.output_voltage, 0.0);
		assert_eq!(status.internal_temperature_celsius, 0.0);
	}

	#[test]
	fn on_battery_report() {
		let status = parse(ON_BATTERY);
		assert_eq!(status.status, "ONBATT LOWBATT");
		assert_eq!(status.time_on_battery, Duration::from_secs(95));
		assert_eq!(status.output_voltage, 229.6);
		assert_eq!(status.internal_temperature_celsius, 29.2);
		assert_eq!(status.last_transfer_off_battery, None);
	}

	#[test]
	fn historic_report_formats() {
		let status = parse(HISTORIC);
		assert_eq!(status.last_transfer_on_battery, Some(Utc.with_ymd_and_hms(2024, 3, 10, 14, 5, 12).unwrap()));
		assert_eq!(status.last_selftest, Some(Utc.with_ymd_and_hms(2024, 3, 10, 14, 5, 12).unwrap()));
		assert_eq!(status.load_percent, 4.0);
		assert_eq!(status.cumulative_time_on_battery, Duration::from_secs(4));
		assert_eq!(status.status, "ONLINE REPLACEBATT");
	}

	#[test]
	fn missing_keys_are_zero() {
		let status = parse("UPSNAME  : bare\nSTATUS   : COMMLOST\n");
		assert_eq!(
			status,
			Status {
				ups_name: "bare".into(),
				status: "COMMLOST".into(),
				..Default::default()
			}
		);
	}

	#[rstest]
	#[case("XONBATT", "N/A")]
	#[case("XOFFBATT", "")]
	fn unset_timestamps(#[case] key: &str, #[case] value: &str) {
		let fields: HashMap<String, String> = [(key.to_string(), value.to_string())].into();
		let status = Status::from_fields(&fields).unwrap();
		assert_eq!(status.last_transfer_on_battery, None);
		assert_eq!(status.last_transfer_off_battery, None);
	}

	#[rstest]
	#[case("LOADPCT", "12.5")]
	#[case("BCHARGE", "full Percent")]
	#[case("LINEV", "230.0 V")]
	#[case("BCHARGE", "NaN Percent")]
	#[case("OUTPUTV", "inf Volts")]
	#[case("ITEMP", "-inf C")]
	#[case("ITEMP", "29.2 F")]
	#[case("NOMPOWER", "865.5 Watts")]
	#[case("NUMXFERS", "-1")]
	#[case("TIMELEFT", "2 Hours")]
	#[case("TONBATT", "-3 Seconds")]
	#[case("CUMONBATT", "18")]
	#[case("LASTSTEST", "yesterday")]
	fn malformed_values_name_their_key(#[case] key: &str, #[case] value: &str) {
		let fields: HashMap<String, String> = [(key.to_string(), value.to_string())].into();
		let error = Status::from_fields(&fields).unwrap_err();
		assert_eq!(error.key, key);
		assert!(error.to_string().contains(value), "{error}");
	}
}
