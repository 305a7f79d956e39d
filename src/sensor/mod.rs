//! # Sensor Decoding Module
//!
//! Turns a message body into named physical quantities. Field units pack
//! their readings as indexed channel markers (`AIN2:14.7` for analog,
//! `DIN0:1` for digital); which channel carries which quantity depends on
//! the unit's sensor layout. A layout is a [`Mode`], and each mode owns a
//! declarative channel→field table — adding a layout means adding a table,
//! not new control flow.
//!
//! Decoding is total: it always produces a fully populated
//! [`SensorReading`], with only the mode-relevant fields overwritten and
//! everything else left at its default. The telemetry API receives the
//! full field set on every submit regardless of layout.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One complete reading as the telemetry API expects it.
///
/// Every field is always present; unused fields stay at the zero default.
/// A default is indistinguishable from a true zero reading on the wire —
/// the upstream consumer accepts that ambiguity, so it is preserved here.
///
/// Wire names follow the API contract where it diverges from the natural
/// Rust name (`debit` is the flow/velocity channel, `dissolve_oxygen` is
/// dissolved oxygen).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorReading {
    pub ph: f64,
    pub tds: f64,
    pub tss: f64,
    #[serde(rename = "debit")]
    pub flow: f64,
    pub rainfall: f64,
    pub water_height: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_direction: f64,
    pub wind_speed: f64,
    pub solar_radiation: f64,
    pub evaporation: f64,
    #[serde(rename = "dissolve_oxygen")]
    pub dissolved_oxygen: f64,
}

/// Named physical quantities a channel can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Ph,
    Tds,
    Tss,
    Flow,
    Rainfall,
    WaterHeight,
    Temperature,
    Humidity,
    WindDirection,
    WindSpeed,
    SolarRadiation,
    Evaporation,
    DissolvedOxygen,
}

impl SensorReading {
    fn set(&mut self, field: Field, value: f64) {
        match field {
            Field::Ph => self.ph = value,
            Field::Tds => self.tds = value,
            Field::Tss => self.tss = value,
            Field::Flow => self.flow = value,
            Field::Rainfall => self.rainfall = value,
            Field::WaterHeight => self.water_height = value,
            Field::Temperature => self.temperature = value,
            Field::Humidity => self.humidity = value,
            Field::WindDirection => self.wind_direction = value,
            Field::WindSpeed => self.wind_speed = value,
            Field::SolarRadiation => self.solar_radiation = value,
            Field::Evaporation => self.evaporation = value,
            Field::DissolvedOxygen => self.dissolved_oxygen = value,
        }
    }
}

/// Sensor layout profile of a field unit.
///
/// Closed set: every unit is one of these, and unknown identities fall
/// back to [`Mode::GenericStation`] (the most common deployment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Weather station: temperature, humidity, wind, radiation, evaporation.
    Climatology,
    /// Floating water-quality probe: dissolved oxygen, pH, TSS.
    FloatingStation,
    /// Fixed monitoring post: water height, pH, TSS, TDS.
    GenericStation,
}

/// Analog channel layout per mode.
const CLIMATOLOGY_ANALOG: &[(u8, Field)] = &[
    (0, Field::Temperature),
    (1, Field::Humidity),
    (2, Field::WindDirection),
    (3, Field::WindSpeed),
    (4, Field::SolarRadiation),
    (5, Field::Evaporation),
];

const FLOATING_ANALOG: &[(u8, Field)] = &[
    (0, Field::DissolvedOxygen),
    (1, Field::Ph),
    (2, Field::Tss),
];

const GENERIC_ANALOG: &[(u8, Field)] = &[
    (0, Field::WaterHeight),
    (1, Field::Ph),
    (2, Field::Tss),
    (3, Field::Tds),
];

/// Digital channel layout, shared by every mode.
const DIGITAL: &[(u8, Field)] = &[(0, Field::Rainfall)];

impl Mode {
    fn analog_table(self) -> &'static [(u8, Field)] {
        match self {
            Mode::Climatology => CLIMATOLOGY_ANALOG,
            Mode::FloatingStation => FLOATING_ANALOG,
            Mode::GenericStation => GENERIC_ANALOG,
        }
    }
}

/// Decode a message body under the given mode.
///
/// Every `AIN<idx>:<value>` occurrence is looked up in the mode's analog
/// table and every `DIN<idx>:<value>` in the shared digital table.
/// Channel indices the table does not list are ignored, and a value that
/// fails numeric parsing skips that single channel; neither aborts the
/// rest of the body.
pub fn decode(body: &str, mode: Mode) -> SensorReading {
    let mut reading = SensorReading::default();
    for (index, value) in scan_channels(body, "AIN") {
        if let Some(&(_, field)) = mode.analog_table().iter().find(|(i, _)| *i == index) {
            reading.set(field, value);
        }
    }
    for (index, value) in scan_channels(body, "DIN") {
        if let Some(&(_, field)) = DIGITAL.iter().find(|(i, _)| *i == index) {
            reading.set(field, value);
        }
    }
    reading
}

/// Scan `body` for `<prefix><index>:<number>` occurrences.
///
/// Numbers are unsigned decimals (`[0-9.]+`, matching what field units
/// emit). Occurrences whose index or value does not parse are dropped.
fn scan_channels(body: &str, prefix: &str) -> Vec<(u8, f64)> {
    let mut found = Vec::new();
    let mut search = body;
    while let Some(pos) = search.find(prefix) {
        let tail = &search[pos + prefix.len()..];
        search = tail;

        let digits = tail.len() - tail.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 || !tail[digits..].starts_with(':') {
            continue;
        }
        let value_start = &tail[digits + 1..];
        let value_len = value_start.len()
            - value_start
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.')
                .len();
        if value_len == 0 {
            continue;
        }
        let index = match tail[..digits].parse::<u8>() {
            Ok(i) => i,
            Err(_) => continue,
        };
        let value = match value_start[..value_len].parse::<f64>() {
            Ok(v) => v,
            Err(_) => continue, // e.g. "1.2.3" — skip this channel only
        };
        found.push((index, value));
    }
    found
}

/// Static identity → mode lookup with a generic fallback.
///
/// The directory is seeded from the `[stations]` config table. Lookup is
/// total: an identity the table does not know decodes as a generic
/// station, never as an error.
#[derive(Debug, Clone, Default)]
pub struct StationDirectory {
    stations: HashMap<String, Mode>,
}

impl StationDirectory {
    pub fn new(stations: HashMap<String, Mode>) -> Self {
        Self { stations }
    }

    /// Map a sender identity to its sensor layout.
    pub fn classify(&self, identity: &str) -> Mode {
        self.stations
            .get(identity)
            .copied()
            .unwrap_or(Mode::GenericStation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_all_defaults() {
        for mode in [Mode::Climatology, Mode::FloatingStation, Mode::GenericStation] {
            assert_eq!(decode("", mode), SensorReading::default());
        }
    }

    #[test]
    fn unknown_channel_index_ignored() {
        let reading = decode("AIN9:42.0;", Mode::FloatingStation);
        assert_eq!(reading, SensorReading::default());
    }

    #[test]
    fn bad_value_skips_only_that_channel() {
        let reading = decode("AIN0:1.2.3;AIN1:60.2,Normal;", Mode::Climatology);
        assert_eq!(reading.temperature, 0.0);
        assert_eq!(reading.humidity, 60.2);
    }

    #[test]
    fn rainfall_is_mode_independent() {
        for mode in [Mode::Climatology, Mode::FloatingStation, Mode::GenericStation] {
            assert_eq!(decode("DIN0:3;", mode).rainfall, 3.0);
        }
    }

    #[test]
    fn classify_falls_back_to_generic() {
        let dir = StationDirectory::new(HashMap::from([(
            "+628115013798".to_string(),
            Mode::Climatology,
        )]));
        assert_eq!(dir.classify("+628115013798"), Mode::Climatology);
        assert_eq!(dir.classify("+620000000000"), Mode::GenericStation);
        assert_eq!(dir.classify(""), Mode::GenericStation);
    }

    #[test]
    fn wire_names_follow_api_contract() {
        let json = serde_json::to_value(SensorReading::default()).unwrap();
        assert!(json.get("debit").is_some());
        assert!(json.get("dissolve_oxygen").is_some());
        assert!(json.get("flow").is_none());
    }
}
