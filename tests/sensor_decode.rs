//! Integration tests for channel decoding under each sensor layout
use smsgate::sensor::{decode, Mode, SensorReading};

const BODY: &str = "AIN0:21.5,Normal;AIN1:60.2,Normal;DIN0:1;";

#[test]
fn climatology_layout_maps_weather_channels() {
    let reading = decode(BODY, Mode::Climatology);
    assert_eq!(reading.temperature, 21.5);
    assert_eq!(reading.humidity, 60.2);
    assert_eq!(reading.rainfall, 1.0);
    // Everything the message didn't carry stays at the default
    assert_eq!(reading.ph, 0.0);
    assert_eq!(reading.water_height, 0.0);
    assert_eq!(reading.wind_speed, 0.0);
}

#[test]
fn generic_layout_maps_water_channels() {
    let reading = decode(BODY, Mode::GenericStation);
    assert_eq!(reading.water_height, 21.5);
    assert_eq!(reading.ph, 60.2);
    assert_eq!(reading.rainfall, 1.0);
    // Channels 2 and 3 are absent from the body
    assert_eq!(reading.tss, 0.0);
    assert_eq!(reading.tds, 0.0);
}

#[test]
fn floating_layout_maps_probe_channels() {
    let reading = decode("AIN0:6.8;AIN1:7.2;AIN2:140.0;", Mode::FloatingStation);
    assert_eq!(reading.dissolved_oxygen, 6.8);
    assert_eq!(reading.ph, 7.2);
    assert_eq!(reading.tss, 140.0);
}

#[test]
fn full_climatology_message_fills_all_six_channels() {
    let body = "AIN0:28.1;AIN1:75.0;AIN2:180.0;AIN3:4.2;AIN4:812.0;AIN5:3.1;DIN0:0.5;";
    let reading = decode(body, Mode::Climatology);
    assert_eq!(reading.temperature, 28.1);
    assert_eq!(reading.humidity, 75.0);
    assert_eq!(reading.wind_direction, 180.0);
    assert_eq!(reading.wind_speed, 4.2);
    assert_eq!(reading.solar_radiation, 812.0);
    assert_eq!(reading.evaporation, 3.1);
    assert_eq!(reading.rainfall, 0.5);
}

#[test]
fn empty_body_decodes_to_baseline() {
    for mode in [Mode::Climatology, Mode::FloatingStation, Mode::GenericStation] {
        assert_eq!(decode("", mode), SensorReading::default());
    }
}

#[test]
fn out_of_range_channel_index_is_ignored() {
    // Channel 5 only exists in the climatology layout
    let reading = decode("AIN5:9.9;", Mode::GenericStation);
    assert_eq!(reading, SensorReading::default());

    let reading = decode("AIN5:9.9;", Mode::Climatology);
    assert_eq!(reading.evaporation, 9.9);
}

#[test]
fn unparseable_value_skips_single_channel() {
    let reading = decode("AIN0:21.5.3;AIN1:60.2;DIN0:1;", Mode::Climatology);
    assert_eq!(reading.temperature, 0.0); // bad value dropped
    assert_eq!(reading.humidity, 60.2);
    assert_eq!(reading.rainfall, 1.0);
}

#[test]
fn later_occurrence_of_same_channel_wins() {
    let reading = decode("AIN0:10.0;AIN0:20.0;", Mode::Climatology);
    assert_eq!(reading.temperature, 20.0);
}

#[test]
fn digital_channels_beyond_zero_are_ignored() {
    let reading = decode("DIN1:1;DIN7:1;", Mode::Climatology);
    assert_eq!(reading, SensorReading::default());
}
