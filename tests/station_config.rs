//! Integration tests for configuration loading and station classification
use std::collections::HashMap;

use smsgate::config::Config;
use smsgate::sensor::{Mode, StationDirectory};
use tempfile::TempDir;

#[tokio::test]
async fn default_config_round_trips_through_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let path_str = path.to_string_lossy().into_owned();

    Config::create_default(&path_str).await.unwrap();
    let loaded = Config::load(&path_str).await.unwrap();

    assert_eq!(loaded.gateway.poll_interval_secs, 10);
    assert_eq!(loaded.gateway.clock_offset_hours, 1);
    assert_eq!(loaded.gateway.modem_message_limit, 20);
    assert_eq!(loaded.modem.port, "/dev/ttyUSB0");
    assert_eq!(loaded.modem.baud_rate, 115200);
    assert_eq!(loaded.logging.level, "info");
}

#[tokio::test]
async fn missing_config_file_is_an_error() {
    assert!(Config::load("/nonexistent/config.toml").await.is_err());
}

#[test]
fn default_station_assignments_classify_as_configured() {
    let config = Config::default();
    let directory = StationDirectory::new(config.stations);

    assert_eq!(directory.classify("+628115013798"), Mode::Climatology);
    assert_eq!(directory.classify("+628115113495"), Mode::FloatingStation);
    assert_eq!(directory.classify("+6282195431503"), Mode::FloatingStation);
}

#[test]
fn unlisted_identities_fall_back_to_generic() {
    let directory = StationDirectory::new(HashMap::new());
    assert_eq!(directory.classify("+620000000000"), Mode::GenericStation);
    assert_eq!(directory.classify("anything"), Mode::GenericStation);
}

#[test]
fn clock_offset_accepts_zero_and_negative_values() {
    let toml_text = r#"
        [gateway]
        poll_interval_secs = 30
        clock_offset_hours = -2
        modem_message_limit = 50

        [modem]
        port = "/dev/ttyACM0"
        baud_rate = 9600

        [api]
        base_url = "https://t.example"
        username = "u"
        password = "p"

        [storage]
        data_dir = "/var/lib/smsgate"

        [logging]
        level = "debug"
    "#;
    let config: Config = toml::from_str(toml_text).unwrap();
    assert_eq!(config.gateway.clock_offset_hours, -2);
    assert!(config.stations.is_empty());
}
